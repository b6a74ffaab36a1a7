//! Built-in constraint definitions.
//!
//! This module contains the standard constraints that ship with Verity.

mod basic;
mod numeric;
mod pattern;
mod size;

use crate::validators::registry::ConstraintValidatorRegistry;

/// Register all built-in constraints.
pub fn register_all(registry: &mut ConstraintValidatorRegistry) {
    basic::register(registry);
    numeric::register(registry);
    size::register(registry);
    pattern::register(registry);
}

// Re-export for direct access
pub use basic::{AssertFalseValidator, AssertTrueValidator, NotNullValidator, NullValidator};
pub use numeric::{BoundValidator, SignValidator};
pub use pattern::PatternValidator;
pub use size::{NotBlankValidator, NotEmptyValidator, SizeValidator};

use crate::metadata::descriptor::ConstraintDescriptor;

/// Read an integer attribute, reporting a readable error.
pub(crate) fn integer_attribute(descriptor: &ConstraintDescriptor, name: &str) -> Result<i64, String> {
    match descriptor.attribute(name) {
        Some(value) => value
            .as_integer()
            .ok_or_else(|| format!("attribute '{}' must be an integer, got {}", name, value)),
        None => Err(format!("attribute '{}' is required", name)),
    }
}
