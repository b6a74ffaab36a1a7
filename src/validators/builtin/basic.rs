//! Null and boolean constraints.

use crate::core::error::ValidatorError;
use crate::core::types::{well_known, Value};
use crate::validators::registry::{
    ConstraintDefinition, ConstraintValidator, ConstraintValidatorContext, ConstraintValidatorRegistry,
    ValidatorDescriptor,
};

/// Register null and boolean constraints.
pub fn register(registry: &mut ConstraintValidatorRegistry) {
    registry.register(
        ConstraintDefinition::builder("NotNull")
            .message("must not be null")
            .validator(ValidatorDescriptor::new("not-null", well_known::OBJECT, || {
                Box::new(NotNullValidator)
            }))
            .build(),
    );
    registry.register(
        ConstraintDefinition::builder("Null")
            .message("must be null")
            .validator(ValidatorDescriptor::new("null", well_known::OBJECT, || Box::new(NullValidator)))
            .build(),
    );
    registry.register(
        ConstraintDefinition::builder("AssertTrue")
            .message("must be true")
            .validator(ValidatorDescriptor::new("assert-true", well_known::BOOLEAN, || {
                Box::new(AssertTrueValidator)
            }))
            .build(),
    );
    registry.register(
        ConstraintDefinition::builder("AssertFalse")
            .message("must be false")
            .validator(ValidatorDescriptor::new("assert-false", well_known::BOOLEAN, || {
                Box::new(AssertFalseValidator)
            }))
            .build(),
    );
}

/// The value must not be null.
#[derive(Debug, Clone, Copy)]
pub struct NotNullValidator;

impl ConstraintValidator for NotNullValidator {
    fn is_valid(&self, value: &Value, _ctx: &mut ConstraintValidatorContext<'_>) -> Result<bool, ValidatorError> {
        Ok(!value.is_null())
    }
}

/// The value must be null.
#[derive(Debug, Clone, Copy)]
pub struct NullValidator;

impl ConstraintValidator for NullValidator {
    fn is_valid(&self, value: &Value, _ctx: &mut ConstraintValidatorContext<'_>) -> Result<bool, ValidatorError> {
        Ok(value.is_null())
    }
}

/// The value must be `true` (null is valid).
#[derive(Debug, Clone, Copy)]
pub struct AssertTrueValidator;

impl ConstraintValidator for AssertTrueValidator {
    fn is_valid(&self, value: &Value, _ctx: &mut ConstraintValidatorContext<'_>) -> Result<bool, ValidatorError> {
        Ok(value.as_bool().unwrap_or(true))
    }
}

/// The value must be `false` (null is valid).
#[derive(Debug, Clone, Copy)]
pub struct AssertFalseValidator;

impl ConstraintValidator for AssertFalseValidator {
    fn is_valid(&self, value: &Value, _ctx: &mut ConstraintValidatorContext<'_>) -> Result<bool, ValidatorError> {
        Ok(!value.as_bool().unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::descriptor::{ConstraintDeclaration, ConstraintDescriptor};

    fn check(kind: &str, value: Value) -> bool {
        let registry = ConstraintValidatorRegistry::with_builtins();
        let descriptor = ConstraintDescriptor::build(&ConstraintDeclaration::new(kind), &registry).unwrap();
        let validator = descriptor.validators()[0].create();
        let mut ctx = ConstraintValidatorContext::new(&descriptor);
        validator.is_valid(&value, &mut ctx).unwrap()
    }

    #[test]
    fn test_null_checks() {
        assert!(check("NotNull", Value::from("x")));
        assert!(!check("NotNull", Value::Null));
        assert!(check("Null", Value::Null));
        assert!(!check("Null", Value::from(1)));
    }

    #[test]
    fn test_boolean_checks() {
        assert!(check("AssertTrue", Value::from(true)));
        assert!(!check("AssertTrue", Value::from(false)));
        assert!(check("AssertTrue", Value::Null));
        assert!(check("AssertFalse", Value::from(false)));
        assert!(!check("AssertFalse", Value::from(true)));
        assert!(check("AssertFalse", Value::Null));
    }
}
