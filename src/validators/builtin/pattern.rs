//! Regular expression constraint.

use crate::core::error::ValidatorError;
use crate::core::types::{well_known, Value};
use crate::metadata::descriptor::ConstraintDescriptor;
use crate::validators::registry::{
    ConstraintDefinition, ConstraintValidator, ConstraintValidatorContext, ConstraintValidatorRegistry,
    ValidatorDescriptor,
};
use regex_lite::Regex;

/// Register the pattern constraint.
pub fn register(registry: &mut ConstraintValidatorRegistry) {
    registry.register(
        ConstraintDefinition::builder("Pattern")
            .message("must match \"{regexp}\"")
            .validator(ValidatorDescriptor::new("pattern", well_known::CHAR_SEQUENCE, || {
                Box::new(PatternValidator::default())
            }))
            .build(),
    );
}

/// The whole string must match the `regexp` attribute.
#[derive(Debug, Clone, Default)]
pub struct PatternValidator {
    regex: Option<Regex>,
}

impl ConstraintValidator for PatternValidator {
    fn initialize(&mut self, descriptor: &ConstraintDescriptor) -> Result<(), String> {
        let source = descriptor
            .attribute("regexp")
            .and_then(Value::as_str)
            .ok_or("attribute 'regexp' must be a string")?;
        let regex = Regex::new(&format!("^(?:{})$", source)).map_err(|e| format!("invalid regexp: {}", e))?;
        self.regex = Some(regex);
        Ok(())
    }

    fn is_valid(&self, value: &Value, _ctx: &mut ConstraintValidatorContext<'_>) -> Result<bool, ValidatorError> {
        let Some(text) = value.as_str() else {
            return Ok(value.is_null());
        };
        let regex = self
            .regex
            .as_ref()
            .ok_or_else(|| ValidatorError::new("pattern validator used before initialisation"))?;
        Ok(regex.is_match(text))
    }
}
