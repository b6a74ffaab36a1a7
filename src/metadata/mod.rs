//! Constraint metadata.
//!
//! - [`descriptor`]: declarations and resolved descriptors
//! - [`config`]: raw per-type configuration and the [`MetadataSource`] seam
//! - [`mapping`]: programmatic configuration
//! - [`document`]: JSON mapping and instance documents
//! - [`type_metadata`]: the aggregated, immutable view used by the engine
//! - [`manager`]: aggregation across hierarchy and sources, with caching

pub mod config;
pub mod descriptor;
pub mod document;
pub mod manager;
pub mod mapping;
pub mod type_metadata;

pub use config::{
    CascadingConfiguration, ContainerElementConfiguration, DefaultGroupSequenceProvider, ElementConfiguration,
    ExecutableConfiguration, MetadataSource, TypeConfiguration,
};
pub use descriptor::{ConstraintDeclaration, ConstraintDescriptor, ConstraintKind, DescriptorId};
pub use document::{instance_from_json, DocumentSource, MappingDocument};
pub use manager::MetadataManager;
pub use mapping::{BeanMapping, ConstraintMapping, ElementMapping, ExecutableMapping};
pub use type_metadata::{
    CascadingMetadata, ContainerElementMetadata, DefaultGroupSequence, ElementKind, ElementMetadata,
    ExecutableMetadata, GroupConversions, MetaConstraint, TypeMetadata,
};
