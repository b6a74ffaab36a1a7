//! Numeric bound and sign constraints.

use super::integer_attribute;
use crate::core::error::ValidatorError;
use crate::core::types::{well_known, Value};
use crate::metadata::descriptor::ConstraintDescriptor;
use crate::validators::registry::{
    ConstraintDefinition, ConstraintValidator, ConstraintValidatorContext, ConstraintValidatorRegistry,
    ValidatorDescriptor,
};
use std::cmp::Ordering;

/// Register numeric constraints.
pub fn register(registry: &mut ConstraintValidatorRegistry) {
    registry.register(
        ConstraintDefinition::builder("Min")
            .message("must be greater than or equal to {value}")
            .validator(ValidatorDescriptor::new("min-number", well_known::NUMBER, || {
                Box::new(BoundValidator::min())
            }))
            .build(),
    );
    registry.register(
        ConstraintDefinition::builder("Max")
            .message("must be less than or equal to {value}")
            .validator(ValidatorDescriptor::new("max-number", well_known::NUMBER, || {
                Box::new(BoundValidator::max())
            }))
            .build(),
    );
    registry.register(
        ConstraintDefinition::builder("Positive")
            .message("must be greater than 0")
            .validator(ValidatorDescriptor::new("positive-number", well_known::NUMBER, || {
                Box::new(SignValidator { allow_zero: false })
            }))
            .build(),
    );
    registry.register(
        ConstraintDefinition::builder("PositiveOrZero")
            .message("must be greater than or equal to 0")
            .validator(ValidatorDescriptor::new("positive-or-zero-number", well_known::NUMBER, || {
                Box::new(SignValidator { allow_zero: true })
            }))
            .build(),
    );
}

fn compare(value: &Value, bound: i64) -> Option<Ordering> {
    match value {
        Value::Integer(i) => Some(i.cmp(&bound)),
        Value::Float(f) => compare_float(*f, bound),
        _ => None,
    }
}

/// Exact comparison of a float with an integer: integral parts compare as
/// `i64`, the fraction breaks ties.
fn compare_float(f: f64, bound: i64) -> Option<Ordering> {
    const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
    if f.is_nan() {
        return None;
    }
    let integral = f.trunc();
    if integral >= TWO_POW_63 {
        return Some(Ordering::Greater);
    }
    if integral < -TWO_POW_63 {
        return Some(Ordering::Less);
    }
    match (integral as i64).cmp(&bound) {
        Ordering::Equal => (f - integral).partial_cmp(&0.0),
        unequal => Some(unequal),
    }
}

/// Inclusive lower (`Min`) or upper (`Max`) bound taken from the `value`
/// attribute.
#[derive(Debug, Clone)]
pub struct BoundValidator {
    lower: bool,
    bound: i64,
}

impl BoundValidator {
    /// Lower bound validator.
    pub fn min() -> Self {
        Self { lower: true, bound: 0 }
    }

    /// Upper bound validator.
    pub fn max() -> Self {
        Self { lower: false, bound: 0 }
    }
}

impl ConstraintValidator for BoundValidator {
    fn initialize(&mut self, descriptor: &ConstraintDescriptor) -> Result<(), String> {
        self.bound = integer_attribute(descriptor, "value")?;
        Ok(())
    }

    fn is_valid(&self, value: &Value, _ctx: &mut ConstraintValidatorContext<'_>) -> Result<bool, ValidatorError> {
        if value.is_null() {
            return Ok(true);
        }
        let ordering = compare(value, self.bound)
            .ok_or_else(|| ValidatorError::new(format!("{} is not comparable to a number", value)))?;
        Ok(match ordering {
            Ordering::Equal => true,
            Ordering::Greater => self.lower,
            Ordering::Less => !self.lower,
        })
    }
}

/// Strictly positive (or non-negative) numbers.
#[derive(Debug, Clone, Copy)]
pub struct SignValidator {
    allow_zero: bool,
}

impl ConstraintValidator for SignValidator {
    fn is_valid(&self, value: &Value, _ctx: &mut ConstraintValidatorContext<'_>) -> Result<bool, ValidatorError> {
        Ok(match compare(value, 0) {
            None => value.is_null(),
            Some(Ordering::Greater) => true,
            Some(Ordering::Equal) => self.allow_zero,
            Some(Ordering::Less) => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::descriptor::ConstraintDeclaration;

    fn check(declaration: ConstraintDeclaration, value: Value) -> Result<bool, ValidatorError> {
        let registry = ConstraintValidatorRegistry::with_builtins();
        let descriptor = ConstraintDescriptor::build(&declaration, &registry).unwrap();
        let mut validator = descriptor.validators()[0].create();
        validator.initialize(&descriptor).unwrap();
        let mut ctx = ConstraintValidatorContext::new(&descriptor);
        validator.is_valid(&value, &mut ctx)
    }

    #[test]
    fn test_min_max() {
        let min = || ConstraintDeclaration::new("Min").attribute("value", 2);
        assert!(check(min(), Value::from(2)).unwrap());
        assert!(!check(min(), Value::from(1)).unwrap());
        assert!(check(min(), Value::from(2.5)).unwrap());
        assert!(check(min(), Value::Null).unwrap());

        let max = || ConstraintDeclaration::new("Max").attribute("value", 10);
        assert!(check(max(), Value::from(10)).unwrap());
        assert!(!check(max(), Value::from(10.1)).unwrap());
        assert!(check(max(), Value::from(f64::NAN)).is_err());
    }

    #[test]
    fn test_large_bounds_compare_exactly() {
        let above_f64_precision: i64 = (1 << 53) + 1;
        let min = || ConstraintDeclaration::new("Min").attribute("value", above_f64_precision);
        assert!(!check(min(), Value::from(9_007_199_254_740_992.0)).unwrap());
        assert!(check(min(), Value::from(9_007_199_254_740_994.0)).unwrap());

        let max = || ConstraintDeclaration::new("Max").attribute("value", i64::MAX);
        assert!(!check(max(), Value::from(9_223_372_036_854_775_808.0)).unwrap());
        assert!(check(max(), Value::from(i64::MAX)).unwrap());

        let min = || ConstraintDeclaration::new("Min").attribute("value", i64::MIN);
        assert!(check(min(), Value::from(-9_223_372_036_854_775_808.0)).unwrap());
        assert!(!check(min(), Value::from(-9.3e18)).unwrap());
        assert!(!check(min(), Value::from(f64::NEG_INFINITY)).unwrap());
    }

    #[test]
    fn test_fraction_breaks_ties() {
        assert_eq!(compare_float(-0.5, 0), Some(Ordering::Less));
        assert_eq!(compare_float(2.25, 2), Some(Ordering::Greater));
        assert_eq!(compare_float(-3.0, -3), Some(Ordering::Equal));
        assert_eq!(compare_float(f64::NAN, 0), None);
    }

    #[test]
    fn test_sign() {
        assert!(check(ConstraintDeclaration::new("Positive"), Value::from(1)).unwrap());
        assert!(!check(ConstraintDeclaration::new("Positive"), Value::from(0)).unwrap());
        assert!(check(ConstraintDeclaration::new("PositiveOrZero"), Value::from(0)).unwrap());
        assert!(!check(ConstraintDeclaration::new("PositiveOrZero"), Value::from(-0.5)).unwrap());
    }

    #[test]
    fn test_missing_bound_is_a_declaration_error() {
        let registry = ConstraintValidatorRegistry::with_builtins();
        let descriptor = ConstraintDescriptor::build(&ConstraintDeclaration::new("Min"), &registry).unwrap();
        let mut validator = descriptor.validators()[0].create();
        assert!(validator.initialize(&descriptor).is_err());
    }
}
