//! Constraint validators.
//!
//! - [`registry`]: constraint definitions and their validator implementations
//! - [`resolver`]: maximal-specificity choice of an implementation
//! - [`manager`]: initialised, shared validator instances
//! - [`builtin`]: the standard constraints

pub mod builtin;
pub mod manager;
pub mod registry;
pub mod resolver;

pub use manager::ConstraintValidatorManager;
pub use registry::{
    ConstraintDefinition, ConstraintDefinitionBuilder, ConstraintValidator, ConstraintValidatorContext,
    ConstraintValidatorRegistry, CustomViolation, ValidatorDescriptor, ValidatorFactory,
};
pub use resolver::{ResolverStats, ValidatorResolver};
