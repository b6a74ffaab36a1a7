//! Size and emptiness constraints for strings, collections, maps and arrays.

use super::integer_attribute;
use crate::core::error::ValidatorError;
use crate::core::types::{well_known, Value};
use crate::metadata::descriptor::ConstraintDescriptor;
use crate::validators::registry::{
    ConstraintDefinition, ConstraintValidator, ConstraintValidatorContext, ConstraintValidatorRegistry,
    ValidatorDescriptor,
};

/// Types whose size can be measured.
const SIZED_TYPES: [&str; 8] = [
    well_known::CHAR_SEQUENCE,
    well_known::COLLECTION,
    well_known::MAP,
    "Object[]",
    "boolean[]",
    "int[]",
    "long[]",
    "double[]",
];

/// Register size constraints.
pub fn register(registry: &mut ConstraintValidatorRegistry) {
    let mut size = ConstraintDefinition::builder("Size")
        .message("size must be between {min} and {max}")
        .attribute("min", 0)
        .attribute("max", i64::MAX);
    let mut not_empty = ConstraintDefinition::builder("NotEmpty").message("must not be empty");
    for accepted in SIZED_TYPES {
        let suffix = accepted.replace("[]", "-array").to_lowercase();
        size = size.validator(ValidatorDescriptor::new(
            format!("size-{}", suffix),
            accepted,
            || Box::new(SizeValidator::default()),
        ));
        not_empty = not_empty.validator(ValidatorDescriptor::new(
            format!("not-empty-{}", suffix),
            accepted,
            || Box::new(NotEmptyValidator),
        ));
    }
    registry.register(size.build());
    registry.register(not_empty.build());

    registry.register(
        ConstraintDefinition::builder("NotBlank")
            .message("must not be blank")
            .validator(ValidatorDescriptor::new("not-blank", well_known::CHAR_SEQUENCE, || {
                Box::new(NotBlankValidator)
            }))
            .build(),
    );
}

/// Inclusive size range from the `min` and `max` attributes.
#[derive(Debug, Clone, Default)]
pub struct SizeValidator {
    min: usize,
    max: usize,
}

impl ConstraintValidator for SizeValidator {
    fn initialize(&mut self, descriptor: &ConstraintDescriptor) -> Result<(), String> {
        let min = integer_attribute(descriptor, "min")?;
        let max = integer_attribute(descriptor, "max")?;
        if min < 0 {
            return Err("the min parameter cannot be negative".to_string());
        }
        if max < min {
            return Err("the length cannot be negative".to_string());
        }
        self.min = usize::try_from(min).map_err(|e| e.to_string())?;
        self.max = usize::try_from(max).unwrap_or(usize::MAX);
        Ok(())
    }

    fn is_valid(&self, value: &Value, _ctx: &mut ConstraintValidatorContext<'_>) -> Result<bool, ValidatorError> {
        if value.is_null() {
            return Ok(true);
        }
        let len = value
            .len()
            .ok_or_else(|| ValidatorError::new(format!("cannot measure the size of {}", value)))?;
        Ok(len >= self.min && len <= self.max)
    }
}

/// Not null and not empty.
#[derive(Debug, Clone, Copy)]
pub struct NotEmptyValidator;

impl ConstraintValidator for NotEmptyValidator {
    fn is_valid(&self, value: &Value, _ctx: &mut ConstraintValidatorContext<'_>) -> Result<bool, ValidatorError> {
        Ok(matches!(value.len(), Some(len) if len > 0))
    }
}

/// Not null and containing at least one non-whitespace character.
#[derive(Debug, Clone, Copy)]
pub struct NotBlankValidator;

impl ConstraintValidator for NotBlankValidator {
    fn is_valid(&self, value: &Value, _ctx: &mut ConstraintValidatorContext<'_>) -> Result<bool, ValidatorError> {
        Ok(value.as_str().is_some_and(|s| !s.trim().is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::TypeRef;
    use crate::metadata::descriptor::ConstraintDeclaration;

    fn check(declaration: ConstraintDeclaration, value: Value) -> bool {
        let registry = ConstraintValidatorRegistry::with_builtins();
        let descriptor = ConstraintDescriptor::build(&declaration, &registry).unwrap();
        let mut validator = descriptor.validators()[0].create();
        validator.initialize(&descriptor).unwrap();
        let mut ctx = ConstraintValidatorContext::new(&descriptor);
        validator.is_valid(&value, &mut ctx).unwrap()
    }

    #[test]
    fn test_size_bounds() {
        let size = || ConstraintDeclaration::new("Size").attribute("min", 2).attribute("max", 14);
        assert!(check(size(), Value::from("DD-AB-123")));
        assert!(!check(size(), Value::from("D")));
        assert!(check(size(), Value::list([Value::from(1), Value::from(2)])));
        assert!(check(size(), Value::Null));
        let array = Value::Array {
            element_type: TypeRef::named("Long"),
            items: vec![Value::from(1)],
        };
        assert!(!check(size(), array));
    }

    #[test]
    fn test_size_rejects_bad_attributes() {
        let registry = ConstraintValidatorRegistry::with_builtins();
        let declaration = ConstraintDeclaration::new("Size").attribute("min", 5).attribute("max", 1);
        let descriptor = ConstraintDescriptor::build(&declaration, &registry).unwrap();
        let mut validator = descriptor.validators()[0].create();
        assert!(validator.initialize(&descriptor).is_err());
    }

    #[test]
    fn test_not_empty_and_not_blank() {
        assert!(check(ConstraintDeclaration::new("NotEmpty"), Value::from("a")));
        assert!(!check(ConstraintDeclaration::new("NotEmpty"), Value::from("")));
        assert!(!check(ConstraintDeclaration::new("NotEmpty"), Value::Null));
        assert!(check(ConstraintDeclaration::new("NotBlank"), Value::from(" a ")));
        assert!(!check(ConstraintDeclaration::new("NotBlank"), Value::from("   ")));
        assert!(!check(ConstraintDeclaration::new("NotBlank"), Value::Null));
    }

    #[test]
    fn test_sized_types_registered() {
        let registry = ConstraintValidatorRegistry::with_builtins();
        let accepted: Vec<String> = registry
            .candidates(&"Size".into())
            .iter()
            .map(|v| v.accepts().to_string())
            .collect();
        assert!(accepted.contains(&"Map".to_string()));
        assert!(accepted.contains(&"Object[]".to_string()));
    }
}
