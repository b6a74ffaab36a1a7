//! Container value extraction.
//!
//! Container-element constraints and cascading into containers both need
//! the elements of a container together with the path qualifier locating
//! each one. Extractors are registered per container type and picked by
//! maximal specificity, like validators.

pub mod builtin;
pub mod registry;

pub use builtin::{MAP_KEY_TYPE_ARGUMENT, MAP_VALUE_TYPE_ARGUMENT};
pub use registry::{ExtractedValue, ValueExtractor, ValueExtractorRegistry};
