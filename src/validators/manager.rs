//! Initialised validator instances, shared per constraint descriptor.

use crate::core::error::{ConfigResult, ConfigurationError};
use crate::metadata::descriptor::{ConstraintDescriptor, DescriptorId};
use crate::validators::registry::{ConstraintValidator, ValidatorDescriptor};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Creates each validator once per `(descriptor, implementation)` pair and
/// runs its `initialize` step exactly then.
#[derive(Default)]
pub struct ConstraintValidatorManager {
    instances: RwLock<HashMap<(DescriptorId, String), Arc<dyn ConstraintValidator>>>,
}

impl ConstraintValidatorManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the initialised instance of `validator` for `descriptor`.
    pub fn get_or_initialize(
        &self,
        descriptor: &ConstraintDescriptor,
        validator: &ValidatorDescriptor,
    ) -> ConfigResult<Arc<dyn ConstraintValidator>> {
        let key = (descriptor.id(), validator.id().to_string());
        if let Some(instance) = self.instances.read().get(&key) {
            return Ok(Arc::clone(instance));
        }

        let mut instance = validator.create();
        instance
            .initialize(descriptor)
            .map_err(|reason| ConfigurationError::InvalidConstraintDeclaration {
                constraint: descriptor.kind().clone(),
                reason,
            })?;
        let instance: Arc<dyn ConstraintValidator> = Arc::from(instance);

        let mut instances = self.instances.write();
        Ok(Arc::clone(instances.entry(key).or_insert(instance)))
    }

    /// Initialise every candidate of a descriptor and of its composing
    /// constraints, surfacing malformed attributes early.
    pub fn prepare(&self, descriptor: &ConstraintDescriptor) -> ConfigResult<()> {
        for validator in descriptor.validators() {
            self.get_or_initialize(descriptor, validator)?;
        }
        for child in descriptor.composing() {
            self.prepare(child)?;
        }
        Ok(())
    }

    /// Drop the instances created for `descriptor` and its composing
    /// constraints.
    pub fn release(&self, descriptor: &ConstraintDescriptor) {
        let mut ids = Vec::new();
        collect_ids(descriptor, &mut ids);
        self.instances.write().retain(|(id, _), _| !ids.contains(id));
    }

    /// Drop every instance.
    pub fn clear(&self) {
        self.instances.write().clear();
    }

    /// Number of live instances.
    pub fn len(&self) -> usize {
        self.instances.read().len()
    }

    /// Check if no instance has been created yet.
    pub fn is_empty(&self) -> bool {
        self.instances.read().is_empty()
    }
}

fn collect_ids(descriptor: &ConstraintDescriptor, ids: &mut Vec<DescriptorId>) {
    ids.push(descriptor.id());
    for child in descriptor.composing() {
        collect_ids(child, ids);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::descriptor::ConstraintDeclaration;
    use crate::validators::registry::{ConstraintDefinition, ConstraintValidatorRegistry};

    #[test]
    fn test_instances_are_shared() {
        let registry = ConstraintValidatorRegistry::with_builtins();
        let descriptor = ConstraintDescriptor::build(
            &ConstraintDeclaration::new("Size").attribute("max", 3),
            &registry,
        )
        .unwrap();
        let manager = ConstraintValidatorManager::new();
        let candidate = &descriptor.validators()[0];
        let first = manager.get_or_initialize(&descriptor, candidate).unwrap();
        let second = manager.get_or_initialize(&descriptor, candidate).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_prepare_reports_bad_attributes() {
        let registry = ConstraintValidatorRegistry::with_builtins();
        let descriptor = ConstraintDescriptor::build(
            &ConstraintDeclaration::new("Pattern").attribute("regexp", "(["),
            &registry,
        )
        .unwrap();
        let manager = ConstraintValidatorManager::new();
        assert!(matches!(
            manager.prepare(&descriptor),
            Err(ConfigurationError::InvalidConstraintDeclaration { .. })
        ));
    }

    #[test]
    fn test_release_drops_composed_instances() {
        let mut registry = ConstraintValidatorRegistry::with_builtins();
        registry.register(
            ConstraintDefinition::builder("Handle")
                .composed_of(ConstraintDeclaration::new("NotBlank"))
                .composed_of(ConstraintDeclaration::new("Size").attribute("max", 8))
                .build(),
        );
        let kept = ConstraintDescriptor::build(&ConstraintDeclaration::new("NotNull"), &registry).unwrap();
        let handle = ConstraintDescriptor::build(&ConstraintDeclaration::new("Handle"), &registry).unwrap();
        let manager = ConstraintValidatorManager::new();
        manager.prepare(&kept).unwrap();
        manager.prepare(&handle).unwrap();
        assert!(manager.len() >= 3);

        manager.release(&handle);
        assert_eq!(manager.len(), 1);

        manager.clear();
        assert!(manager.is_empty());
    }
}
