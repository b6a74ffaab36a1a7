//! Registry of constraint definitions and their validator implementations.

use crate::core::error::ValidatorError;
use crate::core::types::{TypeRef, Value};
use crate::metadata::descriptor::{ConstraintDeclaration, ConstraintDescriptor, ConstraintKind};
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// Checks one constraint against a value.
///
/// Instances are created through a [`ValidatorFactory`], initialised once
/// with the descriptor they serve and then shared across threads.
pub trait ConstraintValidator: Send + Sync {
    /// Read the constraint's attributes. An error marks the declaration as
    /// malformed.
    fn initialize(&mut self, _descriptor: &ConstraintDescriptor) -> Result<(), String> {
        Ok(())
    }

    /// Decide whether `value` satisfies the constraint.
    fn is_valid(&self, value: &Value, context: &mut ConstraintValidatorContext<'_>) -> Result<bool, ValidatorError>;
}

/// Factory function for creating validator instances.
pub type ValidatorFactory = Arc<dyn Fn() -> Box<dyn ConstraintValidator> + Send + Sync>;

/// A validator implementation registered for a constraint kind.
#[derive(Clone)]
pub struct ValidatorDescriptor {
    id: String,
    accepts: TypeRef,
    factory: ValidatorFactory,
}

impl ValidatorDescriptor {
    /// Describe a validator accepting values assignable to `accepts`.
    pub fn new<F>(id: impl Into<String>, accepts: impl Into<TypeRef>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn ConstraintValidator> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            accepts: accepts.into(),
            factory: Arc::new(factory),
        }
    }

    /// Describe a stateless validator backed by a closure over the value and
    /// the constraint's attributes.
    pub fn from_fn<F>(id: impl Into<String>, accepts: impl Into<TypeRef>, check: F) -> Self
    where
        F: Fn(&Value, &IndexMap<String, Value>) -> bool + Send + Sync + 'static,
    {
        let check: Arc<dyn Fn(&Value, &IndexMap<String, Value>) -> bool + Send + Sync> = Arc::new(check);
        Self::new(id, accepts, move || {
            Box::new(FnValidator {
                check: Arc::clone(&check),
                attributes: IndexMap::new(),
            })
        })
    }

    /// Implementation identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Type of values the implementation accepts.
    pub fn accepts(&self) -> &TypeRef {
        &self.accepts
    }

    /// Create a fresh, uninitialised instance.
    pub fn create(&self) -> Box<dyn ConstraintValidator> {
        (self.factory)()
    }
}

impl fmt::Debug for ValidatorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorDescriptor")
            .field("id", &self.id)
            .field("accepts", &self.accepts)
            .finish()
    }
}

struct FnValidator {
    check: Arc<dyn Fn(&Value, &IndexMap<String, Value>) -> bool + Send + Sync>,
    attributes: IndexMap<String, Value>,
}

impl ConstraintValidator for FnValidator {
    fn initialize(&mut self, descriptor: &ConstraintDescriptor) -> Result<(), String> {
        self.attributes = descriptor.attributes().clone();
        Ok(())
    }

    fn is_valid(&self, value: &Value, _context: &mut ConstraintValidatorContext<'_>) -> Result<bool, ValidatorError> {
        Ok((self.check)(value, &self.attributes))
    }
}

// ============================================================================
// Validator context
// ============================================================================

/// A violation added by a validator in place of (or besides) the default one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomViolation {
    /// Message template
    pub template: String,
    /// Property node appended to the current path
    pub property: Option<String>,
}

/// Passed to [`ConstraintValidator::is_valid`].
pub struct ConstraintValidatorContext<'a> {
    descriptor: &'a ConstraintDescriptor,
    default_violation: bool,
    custom: Vec<CustomViolation>,
}

impl<'a> ConstraintValidatorContext<'a> {
    /// Create a context for one evaluation.
    pub fn new(descriptor: &'a ConstraintDescriptor) -> Self {
        Self {
            descriptor,
            default_violation: true,
            custom: Vec::new(),
        }
    }

    /// The constraint being evaluated.
    pub fn descriptor(&self) -> &ConstraintDescriptor {
        self.descriptor
    }

    /// Suppress the violation built from the descriptor's template.
    pub fn disable_default_violation(&mut self) {
        self.default_violation = false;
    }

    /// Report an extra violation at the current path.
    pub fn add_violation(&mut self, template: impl Into<String>) {
        self.custom.push(CustomViolation {
            template: template.into(),
            property: None,
        });
    }

    /// Report an extra violation below the current path.
    pub fn add_property_violation(&mut self, template: impl Into<String>, property: impl Into<String>) {
        self.custom.push(CustomViolation {
            template: template.into(),
            property: Some(property.into()),
        });
    }

    pub(crate) fn into_parts(self) -> (bool, Vec<CustomViolation>) {
        (self.default_violation, self.custom)
    }
}

// ============================================================================
// Definitions
// ============================================================================

/// Everything known about a constraint kind.
#[derive(Clone)]
pub struct ConstraintDefinition {
    kind: ConstraintKind,
    default_message: String,
    default_attributes: IndexMap<String, Value>,
    validators: Vec<ValidatorDescriptor>,
    composing: Vec<ConstraintDeclaration>,
    report_as_single_violation: bool,
}

impl ConstraintDefinition {
    /// Start building a definition.
    pub fn builder(kind: impl Into<ConstraintKind>) -> ConstraintDefinitionBuilder {
        ConstraintDefinitionBuilder::new(kind.into())
    }

    /// Constraint kind.
    pub fn kind(&self) -> &ConstraintKind {
        &self.kind
    }

    /// Template used when a declaration has none.
    pub fn default_message(&self) -> &str {
        &self.default_message
    }

    /// Attribute defaults.
    pub fn default_attributes(&self) -> &IndexMap<String, Value> {
        &self.default_attributes
    }

    /// Validator implementations, in registration order.
    pub fn validators(&self) -> &[ValidatorDescriptor] {
        &self.validators
    }

    /// Composing constraints.
    pub fn composing(&self) -> &[ConstraintDeclaration] {
        &self.composing
    }

    /// Whether composition failures collapse into one violation.
    pub fn reports_as_single_violation(&self) -> bool {
        self.report_as_single_violation
    }
}

impl fmt::Debug for ConstraintDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstraintDefinition")
            .field("kind", &self.kind)
            .field("default_message", &self.default_message)
            .field("validators", &self.validators)
            .field("composing", &self.composing.len())
            .finish()
    }
}

/// Builder for [`ConstraintDefinition`].
pub struct ConstraintDefinitionBuilder {
    definition: ConstraintDefinition,
}

impl ConstraintDefinitionBuilder {
    fn new(kind: ConstraintKind) -> Self {
        Self {
            definition: ConstraintDefinition {
                default_message: format!("{{{}.message}}", kind),
                kind,
                default_attributes: IndexMap::new(),
                validators: Vec::new(),
                composing: Vec::new(),
                report_as_single_violation: false,
            },
        }
    }

    /// Set the default message template.
    pub fn message(mut self, template: impl Into<String>) -> Self {
        self.definition.default_message = template.into();
        self
    }

    /// Set a default attribute value.
    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.definition
            .default_attributes
            .insert(name.into(), value.into());
        self
    }

    /// Add a validator implementation.
    pub fn validator(mut self, validator: ValidatorDescriptor) -> Self {
        self.definition.validators.push(validator);
        self
    }

    /// Add a composing constraint.
    pub fn composed_of(mut self, declaration: ConstraintDeclaration) -> Self {
        self.definition.composing.push(declaration);
        self
    }

    /// Report composition failures as a single violation.
    pub fn report_as_single_violation(mut self) -> Self {
        self.definition.report_as_single_violation = true;
        self
    }

    /// Finish the definition.
    pub fn build(self) -> ConstraintDefinition {
        self.definition
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Registry for all known constraint kinds.
pub struct ConstraintValidatorRegistry {
    definitions: IndexMap<ConstraintKind, ConstraintDefinition>,
}

impl ConstraintValidatorRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            definitions: IndexMap::new(),
        }
    }

    /// Create a registry pre-populated with the built-in constraints.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::validators::builtin::register_all(&mut registry);
        registry
    }

    /// Register (or replace) a constraint definition.
    pub fn register(&mut self, definition: ConstraintDefinition) {
        self.definitions.insert(definition.kind.clone(), definition);
    }

    /// Add an implementation to an existing kind. Returns `false` if the
    /// kind is unknown.
    pub fn add_validator(&mut self, kind: &ConstraintKind, validator: ValidatorDescriptor) -> bool {
        match self.definitions.get_mut(kind) {
            Some(definition) => {
                definition.validators.push(validator);
                true
            }
            None => false,
        }
    }

    /// Get the definition of a kind.
    pub fn definition(&self, kind: &ConstraintKind) -> Option<&ConstraintDefinition> {
        self.definitions.get(kind)
    }

    /// Candidate validators for a kind.
    pub fn candidates(&self, kind: &ConstraintKind) -> &[ValidatorDescriptor] {
        self.definitions
            .get(kind)
            .map(|d| d.validators.as_slice())
            .unwrap_or(&[])
    }

    /// Check if a kind is registered.
    pub fn contains(&self, kind: &ConstraintKind) -> bool {
        self.definitions.contains_key(kind)
    }

    /// All registered kinds.
    pub fn kinds(&self) -> impl Iterator<Item = &ConstraintKind> {
        self.definitions.keys()
    }

    /// Unregister a kind.
    pub fn unregister(&mut self, kind: &ConstraintKind) -> bool {
        self.definitions.shift_remove(kind).is_some()
    }

    /// Get the total number of registered kinds.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl Default for ConstraintValidatorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn even() -> ConstraintDefinition {
        ConstraintDefinition::builder("Even")
            .message("must be even")
            .validator(ValidatorDescriptor::from_fn("even-long", "Long", |value, _| {
                value.as_integer().map_or(true, |i| i % 2 == 0)
            }))
            .build()
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ConstraintValidatorRegistry::new();
        registry.register(even());

        let kind = ConstraintKind::new("Even");
        assert!(registry.contains(&kind));
        assert_eq!(registry.candidates(&kind).len(), 1);
        assert_eq!(registry.candidates(&kind)[0].accepts(), &TypeRef::named("Long"));
        assert!(registry.candidates(&"Odd".into()).is_empty());
    }

    #[test]
    fn test_add_validator() {
        let mut registry = ConstraintValidatorRegistry::new();
        registry.register(even());
        let kind = ConstraintKind::new("Even");
        let extra = ValidatorDescriptor::from_fn("even-string", "String", |v, _| {
            v.as_str().map_or(true, |s| s.len() % 2 == 0)
        });
        assert!(registry.add_validator(&kind, extra.clone()));
        assert!(!registry.add_validator(&"Odd".into(), extra));
        assert_eq!(registry.candidates(&kind).len(), 2);
    }

    #[test]
    fn test_fn_validator_sees_attributes() {
        let mut registry = ConstraintValidatorRegistry::new();
        registry.register(
            ConstraintDefinition::builder("AtLeast")
                .attribute("value", 10)
                .validator(ValidatorDescriptor::from_fn("at-least", "Long", |v, attrs| {
                    let bound = attrs.get("value").and_then(Value::as_integer).unwrap_or(0);
                    v.as_integer().map_or(true, |i| i >= bound)
                }))
                .build(),
        );
        let descriptor =
            ConstraintDescriptor::build(&ConstraintDeclaration::new("AtLeast"), &registry).unwrap();
        let mut validator = descriptor.validators()[0].create();
        validator.initialize(&descriptor).unwrap();

        let mut ctx = ConstraintValidatorContext::new(&descriptor);
        assert!(validator.is_valid(&Value::Integer(12), &mut ctx).unwrap());
        assert!(!validator.is_valid(&Value::Integer(3), &mut ctx).unwrap());
    }

    #[test]
    fn test_context_custom_violations() {
        let registry = ConstraintValidatorRegistry::with_builtins();
        let descriptor =
            ConstraintDescriptor::build(&ConstraintDeclaration::new("NotNull"), &registry).unwrap();
        let mut ctx = ConstraintValidatorContext::new(&descriptor);
        ctx.disable_default_violation();
        ctx.add_property_violation("bad street", "street");
        let (default_violation, custom) = ctx.into_parts();
        assert!(!default_violation);
        assert_eq!(custom[0].property.as_deref(), Some("street"));
    }

    #[test]
    fn test_default_message_placeholder() {
        let definition = ConstraintDefinition::builder("Custom").build();
        assert_eq!(definition.default_message(), "{Custom.message}");
    }

    #[test]
    fn test_builtins_registered() {
        let mut registry = ConstraintValidatorRegistry::default();
        for kind in ["NotNull", "Null", "AssertTrue", "AssertFalse", "Min", "Max", "Positive",
                     "PositiveOrZero", "Size", "NotEmpty", "NotBlank", "Pattern"] {
            assert!(registry.contains(&kind.into()), "missing {}", kind);
        }
        assert!(registry.unregister(&"Null".into()));
        assert!(!registry.contains(&"Null".into()));
    }
}
