//! Constraint violations.

use crate::core::bean::BeanRef;
use crate::core::path::Path;
use crate::core::types::{TypeName, Value};
use crate::metadata::descriptor::ConstraintDescriptor;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// One failed constraint.
#[derive(Clone)]
pub struct Violation {
    pub(crate) root_bean: Option<BeanRef>,
    pub(crate) leaf_bean: Option<BeanRef>,
    pub(crate) root_type: TypeName,
    pub(crate) descriptor: Arc<ConstraintDescriptor>,
    pub(crate) message_template: String,
    pub(crate) message: String,
    pub(crate) path: Path,
    pub(crate) invalid_value: Value,
}

impl Violation {
    /// Validated root bean; `None` for value validation.
    pub fn root_bean(&self) -> Option<&BeanRef> {
        self.root_bean.as_ref()
    }

    /// Bean owning the failing element.
    pub fn leaf_bean(&self) -> Option<&BeanRef> {
        self.leaf_bean.as_ref()
    }

    /// Type of the root.
    pub fn root_type(&self) -> &TypeName {
        &self.root_type
    }

    /// The failed constraint.
    pub fn descriptor(&self) -> &Arc<ConstraintDescriptor> {
        &self.descriptor
    }

    /// Uninterpolated message.
    pub fn message_template(&self) -> &str {
        &self.message_template
    }

    /// Interpolated message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Path from the root to the failing value.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The failing value.
    pub fn invalid_value(&self) -> &Value {
        &self.invalid_value
    }
}

impl fmt::Debug for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Violation")
            .field("root_type", &self.root_type)
            .field("constraint", self.descriptor.kind())
            .field("path", &self.path.to_string())
            .field("message", &self.message)
            .finish()
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_root() {
            write!(f, "{}: {}", self.root_type, self.message)
        } else {
            write!(f, "{}.{}: {}", self.root_type, self.path, self.message)
        }
    }
}

impl Serialize for Violation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Violation", 6)?;
        state.serialize_field("root_type", &self.root_type)?;
        state.serialize_field("path", &self.path)?;
        state.serialize_field("constraint", self.descriptor.kind())?;
        state.serialize_field("message", &self.message)?;
        state.serialize_field("message_template", &self.message_template)?;
        state.serialize_field("invalid_value", &self.invalid_value)?;
        state.end()
    }
}

/// Violations of one validation call, in discovery order.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ViolationSet {
    violations: Vec<Violation>,
}

impl ViolationSet {
    /// Wrap collected violations.
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    /// Number of violations.
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Check if the validated value is valid.
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Iterate over the violations.
    pub fn iter(&self) -> std::slice::Iter<'_, Violation> {
        self.violations.iter()
    }

    /// Rendered paths, in order.
    pub fn paths(&self) -> Vec<String> {
        self.violations.iter().map(|v| v.path.to_string()).collect()
    }

    /// Interpolated messages, in order.
    pub fn messages(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.message.as_str()).collect()
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Take the violations.
    pub fn into_vec(self) -> Vec<Violation> {
        self.violations
    }
}

impl IntoIterator for ViolationSet {
    type Item = Violation;
    type IntoIter = std::vec::IntoIter<Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.violations.into_iter()
    }
}

impl<'a> IntoIterator for &'a ViolationSet {
    type Item = &'a Violation;
    type IntoIter = std::slice::Iter<'a, Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.violations.iter()
    }
}
