//! Evaluation of one constraint, composing constraints included.

use crate::core::error::{ConfigurationError, ValidatorFailure, VerityResult};
use crate::core::path::Path;
use crate::core::types::{TypeRef, Value};
use crate::metadata::descriptor::ConstraintDescriptor;
use crate::validators::{ConstraintValidatorContext, ConstraintValidatorManager, ValidatorResolver};
use std::sync::Arc;

/// A failed check, before interpolation.
#[derive(Debug, Clone)]
pub(crate) struct Failure {
    pub descriptor: Arc<ConstraintDescriptor>,
    pub template: String,
    pub property: Option<String>,
}

impl Failure {
    fn default_for(descriptor: &Arc<ConstraintDescriptor>) -> Self {
        Self {
            descriptor: Arc::clone(descriptor),
            template: descriptor.message_template().to_string(),
            property: None,
        }
    }
}

/// Evaluates constraint trees against values.
#[derive(Clone, Copy)]
pub(crate) struct ConstraintTree<'a> {
    pub resolver: &'a ValidatorResolver,
    pub validators: &'a ConstraintValidatorManager,
}

impl<'a> ConstraintTree<'a> {
    /// Evaluate `descriptor` on `value`.
    ///
    /// Composing constraints run first, then the constraint's own validator
    /// if its kind has any. A composition reporting as a single violation
    /// collapses every failure into the parent's default violation.
    pub fn evaluate(
        &self,
        descriptor: &Arc<ConstraintDescriptor>,
        value: &Value,
        declared_type: Option<&TypeRef>,
        path: &Path,
    ) -> VerityResult<Vec<Failure>> {
        let mut failures = Vec::new();

        for child in descriptor.composing() {
            let child_failures = self.evaluate(child, value, declared_type, path)?;
            if child_failures.is_empty() {
                continue;
            }
            if descriptor.reports_as_single_violation() {
                return Ok(vec![Failure::default_for(descriptor)]);
            }
            failures.extend(child_failures);
        }

        if !descriptor.validators().is_empty() {
            let own = self.run_validator(descriptor, value, declared_type, path)?;
            if !own.is_empty() && descriptor.reports_as_single_violation() {
                return Ok(vec![Failure::default_for(descriptor)]);
            }
            failures.extend(own);
        }
        Ok(failures)
    }

    fn run_validator(
        &self,
        descriptor: &Arc<ConstraintDescriptor>,
        value: &Value,
        declared_type: Option<&TypeRef>,
        path: &Path,
    ) -> VerityResult<Vec<Failure>> {
        let value_type = value
            .runtime_type()
            .or_else(|| declared_type.cloned())
            .unwrap_or_else(TypeRef::object);

        let resolved = match self
            .resolver
            .resolve(descriptor.kind(), &value_type, descriptor.validators())
        {
            Ok(resolved) => resolved,
            // Null is valid for constraints that cannot judge it.
            Err(ConfigurationError::NoValidatorFound { .. }) if value.is_null() => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let instance = self.validators.get_or_initialize(descriptor, &resolved)?;

        let mut context = ConstraintValidatorContext::new(descriptor);
        let valid = instance
            .is_valid(value, &mut context)
            .map_err(|err| ValidatorFailure {
                constraint: descriptor.kind().clone(),
                validator: resolved.id().to_string(),
                path: path.to_string(),
                message: err.message,
            })?;
        if valid {
            return Ok(Vec::new());
        }

        let (default_violation, custom) = context.into_parts();
        let mut failures = Vec::with_capacity(custom.len() + 1);
        if default_violation {
            failures.push(Failure::default_for(descriptor));
        }
        failures.extend(custom.into_iter().map(|c| Failure {
            descriptor: Arc::clone(descriptor),
            template: c.template,
            property: c.property,
        }));
        Ok(failures)
    }
}
