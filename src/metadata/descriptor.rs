//! Constraint declarations and the immutable descriptors built from them.
//!
//! A [`ConstraintDeclaration`] is what a configuration source states ("this
//! property is `Size(min = 2)` in group `CarChecks`"). A
//! [`ConstraintDescriptor`] is the resolved form: the declaration merged with
//! the registered [`ConstraintDefinition`](crate::validators::ConstraintDefinition)
//! (default message, candidate validators, composing constraints).

use crate::core::error::{ConfigResult, ConfigurationError};
use crate::core::types::Value;
use crate::groups::GroupId;
use crate::validators::registry::{ConstraintValidatorRegistry, ValidatorDescriptor};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Name of a constraint kind (`NotNull`, `Size`, ...).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstraintKind(Arc<str>);

impl ConstraintKind {
    /// Create a constraint kind.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// The kind as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConstraintKind {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Process-unique identity of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorId(u64);

impl DescriptorId {
    /// Allocate a fresh id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A constraint as stated by a configuration source.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintDeclaration {
    kind: ConstraintKind,
    attributes: IndexMap<String, Value>,
    groups: Vec<GroupId>,
    payload: Vec<String>,
    message: Option<String>,
}

impl ConstraintDeclaration {
    /// Declare a constraint of the given kind.
    pub fn new(kind: impl Into<ConstraintKind>) -> Self {
        Self {
            kind: kind.into(),
            attributes: IndexMap::new(),
            groups: Vec::new(),
            payload: Vec::new(),
            message: None,
        }
    }

    /// Set an attribute.
    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Set the groups (empty means `Default`).
    pub fn groups<I, G>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = G>,
        G: Into<GroupId>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    /// Add a payload marker.
    pub fn payload(mut self, payload: impl Into<String>) -> Self {
        self.payload.push(payload.into());
        self
    }

    /// Override the message template.
    pub fn message(mut self, template: impl Into<String>) -> Self {
        self.message = Some(template.into());
        self
    }

    /// Constraint kind.
    pub fn kind(&self) -> &ConstraintKind {
        &self.kind
    }

    /// Declared groups.
    pub fn declared_groups(&self) -> &[GroupId] {
        &self.groups
    }
}

/// Immutable, shared description of one declared constraint.
pub struct ConstraintDescriptor {
    id: DescriptorId,
    kind: ConstraintKind,
    attributes: IndexMap<String, Value>,
    groups: Vec<GroupId>,
    payload: Vec<String>,
    message_template: String,
    validators: Vec<ValidatorDescriptor>,
    composing: Vec<Arc<ConstraintDescriptor>>,
    report_as_single_violation: bool,
}

impl ConstraintDescriptor {
    /// Resolve a declaration against the registered definition of its kind.
    pub fn build(
        declaration: &ConstraintDeclaration,
        registry: &ConstraintValidatorRegistry,
    ) -> ConfigResult<Arc<Self>> {
        Self::build_with_parent(declaration, registry, None, 0)
    }

    fn build_with_parent(
        declaration: &ConstraintDeclaration,
        registry: &ConstraintValidatorRegistry,
        parent: Option<(&[GroupId], &[String])>,
        depth: usize,
    ) -> ConfigResult<Arc<Self>> {
        const MAX_COMPOSITION_DEPTH: usize = 32;

        let definition = registry.definition(&declaration.kind).ok_or_else(|| {
            ConfigurationError::UnknownConstraint {
                constraint: declaration.kind.clone(),
            }
        })?;
        if depth > MAX_COMPOSITION_DEPTH {
            return Err(ConfigurationError::InvalidConstraintDeclaration {
                constraint: declaration.kind.clone(),
                reason: "constraint composition is recursive".to_string(),
            });
        }

        let (groups, payload) = match parent {
            Some((groups, payload)) => (groups.to_vec(), payload.to_vec()),
            None if declaration.groups.is_empty() => {
                (vec![GroupId::default_group()], declaration.payload.clone())
            }
            None => {
                let mut groups: Vec<GroupId> = Vec::new();
                for group in &declaration.groups {
                    if !groups.contains(group) {
                        groups.push(group.clone());
                    }
                }
                (groups, declaration.payload.clone())
            }
        };

        let mut attributes = definition.default_attributes().clone();
        for (name, value) in &declaration.attributes {
            attributes.insert(name.clone(), value.clone());
        }

        let composing = definition
            .composing()
            .iter()
            .map(|child| {
                Self::build_with_parent(child, registry, Some((&groups, &payload)), depth + 1)
            })
            .collect::<ConfigResult<Vec<_>>>()?;

        Ok(Arc::new(Self {
            id: DescriptorId::next(),
            kind: declaration.kind.clone(),
            attributes,
            message_template: declaration
                .message
                .clone()
                .unwrap_or_else(|| definition.default_message().to_string()),
            groups,
            payload,
            validators: definition.validators().to_vec(),
            composing,
            report_as_single_violation: definition.reports_as_single_violation(),
        }))
    }

    /// Process-unique identity.
    pub fn id(&self) -> DescriptorId {
        self.id
    }

    /// Constraint kind.
    pub fn kind(&self) -> &ConstraintKind {
        &self.kind
    }

    /// All attributes, defaults included.
    pub fn attributes(&self) -> &IndexMap<String, Value> {
        &self.attributes
    }

    /// Look up one attribute.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Groups the constraint belongs to.
    pub fn groups(&self) -> &[GroupId] {
        &self.groups
    }

    /// Check group membership.
    pub fn belongs_to(&self, group: &GroupId) -> bool {
        self.groups.contains(group)
    }

    /// Payload markers.
    pub fn payload(&self) -> &[String] {
        &self.payload
    }

    /// Message template.
    pub fn message_template(&self) -> &str {
        &self.message_template
    }

    /// Candidate validators, in registration order.
    pub fn validators(&self) -> &[ValidatorDescriptor] {
        &self.validators
    }

    /// Composing constraints.
    pub fn composing(&self) -> &[Arc<ConstraintDescriptor>] {
        &self.composing
    }

    /// Whether failures of the composition are reported as one violation.
    pub fn reports_as_single_violation(&self) -> bool {
        self.report_as_single_violation
    }
}

impl fmt::Debug for ConstraintDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstraintDescriptor")
            .field("kind", &self.kind)
            .field("attributes", &self.attributes)
            .field("groups", &self.groups)
            .field("message_template", &self.message_template)
            .field("composing", &self.composing)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::registry::ConstraintDefinition;

    #[test]
    fn test_default_group_and_message() {
        let registry = ConstraintValidatorRegistry::with_builtins();
        let descriptor = ConstraintDescriptor::build(&ConstraintDeclaration::new("NotNull"), &registry).unwrap();
        assert_eq!(descriptor.groups(), &[GroupId::default_group()]);
        assert_eq!(descriptor.message_template(), "must not be null");
        assert!(!descriptor.validators().is_empty());
    }

    #[test]
    fn test_attributes_override_defaults() {
        let registry = ConstraintValidatorRegistry::with_builtins();
        let declaration = ConstraintDeclaration::new("Size")
            .attribute("min", 2)
            .groups(["CarChecks", "CarChecks"])
            .message("between {min} and {max}");
        let descriptor = ConstraintDescriptor::build(&declaration, &registry).unwrap();
        assert_eq!(descriptor.attribute("min"), Some(&Value::Integer(2)));
        assert_eq!(descriptor.attribute("max"), Some(&Value::Integer(i64::MAX)));
        assert_eq!(descriptor.groups(), &[GroupId::new("CarChecks")]);
        assert_eq!(descriptor.message_template(), "between {min} and {max}");
    }

    #[test]
    fn test_unknown_kind() {
        let registry = ConstraintValidatorRegistry::new();
        let err = ConstraintDescriptor::build(&ConstraintDeclaration::new("Bogus"), &registry).unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownConstraint { .. }));
    }

    #[test]
    fn test_composing_inherits_groups_and_payload() {
        let mut registry = ConstraintValidatorRegistry::with_builtins();
        registry.register(
            ConstraintDefinition::builder("LicensePlate")
                .message("invalid license plate")
                .composed_of(ConstraintDeclaration::new("NotNull"))
                .composed_of(ConstraintDeclaration::new("Size").attribute("min", 2))
                .report_as_single_violation()
                .build(),
        );
        let declaration = ConstraintDeclaration::new("LicensePlate")
            .groups(["CarChecks"])
            .payload("severity.error");
        let descriptor = ConstraintDescriptor::build(&declaration, &registry).unwrap();

        assert!(descriptor.reports_as_single_violation());
        assert_eq!(descriptor.composing().len(), 2);
        for child in descriptor.composing() {
            assert_eq!(child.groups(), &[GroupId::new("CarChecks")]);
            assert_eq!(child.payload(), &["severity.error".to_string()]);
        }
        assert_ne!(descriptor.composing()[0].id(), descriptor.composing()[1].id());
    }

    #[test]
    fn test_recursive_composition_rejected() {
        let mut registry = ConstraintValidatorRegistry::new();
        registry.register(
            ConstraintDefinition::builder("Loop")
                .composed_of(ConstraintDeclaration::new("Loop"))
                .build(),
        );
        let err = ConstraintDescriptor::build(&ConstraintDeclaration::new("Loop"), &registry).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidConstraintDeclaration { .. }));
    }
}
