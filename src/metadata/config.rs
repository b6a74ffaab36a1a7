//! Raw, per-type configuration as produced by a metadata source.
//!
//! Sources describe only what is declared directly on one type; merging
//! across the hierarchy and across sources happens in
//! [`MetadataManager`](crate::metadata::MetadataManager).

use crate::core::bean::BeanRef;
use crate::core::error::ConfigResult;
use crate::core::types::{TypeName, TypeRef};
use crate::groups::GroupId;
use crate::metadata::descriptor::ConstraintDeclaration;
use std::fmt;
use std::sync::Arc;

/// Supplies the default group sequence of a bean at validation time.
///
/// Called with `None` when a value is validated without an instance.
pub trait DefaultGroupSequenceProvider: Send + Sync {
    /// The default group sequence for `bean`.
    fn default_group_sequence(&self, bean: Option<&BeanRef>) -> Vec<GroupId>;
}

impl<F> DefaultGroupSequenceProvider for F
where
    F: Fn(Option<&BeanRef>) -> Vec<GroupId> + Send + Sync,
{
    fn default_group_sequence(&self, bean: Option<&BeanRef>) -> Vec<GroupId> {
        self(bean)
    }
}

/// Cascading declared on an element or container element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CascadingConfiguration {
    /// Whether the element is cascaded
    pub cascade: bool,
    /// `(from, to)` group conversions applied when cascading
    pub group_conversions: Vec<(GroupId, GroupId)>,
    /// Configuration of the element's container elements
    pub container_elements: Vec<ContainerElementConfiguration>,
}

/// Constraints and cascading declared on one type argument of a container.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerElementConfiguration {
    /// Index of the type argument (`0` for list elements and map keys, `1`
    /// for map values)
    pub type_argument: usize,
    /// Constraints on the elements
    pub constraints: Vec<ConstraintDeclaration>,
    /// Cascading of the elements
    pub cascading: CascadingConfiguration,
}

/// A property, parameter or return value.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementConfiguration {
    /// Property or parameter name
    pub name: String,
    /// Declared type, used to resolve validators for null values
    pub declared_type: Option<TypeRef>,
    /// Constraints on the element
    pub constraints: Vec<ConstraintDeclaration>,
    /// Cascading of the element
    pub cascading: CascadingConfiguration,
}

impl ElementConfiguration {
    /// An unconstrained element.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: None,
            constraints: Vec::new(),
            cascading: CascadingConfiguration::default(),
        }
    }
}

/// A method whose parameters or return value are constrained.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutableConfiguration {
    /// Method name
    pub name: String,
    /// Number of declared parameters
    pub parameter_count: usize,
    /// `(index, parameter)` pairs
    pub parameters: Vec<(usize, ElementConfiguration)>,
    /// Return value, if constrained or cascaded
    pub return_value: Option<ElementConfiguration>,
}

/// Everything a source declares directly on one type.
#[derive(Clone, Default)]
pub struct TypeConfiguration {
    /// Class-level constraints
    pub class_constraints: Vec<ConstraintDeclaration>,
    /// Properties, in declaration order
    pub properties: Vec<ElementConfiguration>,
    /// Constrained methods
    pub executables: Vec<ExecutableConfiguration>,
    /// Redefined default group sequence
    pub default_group_sequence: Option<Vec<GroupId>>,
    /// Dynamic default group sequence
    pub default_group_sequence_provider: Option<Arc<dyn DefaultGroupSequenceProvider>>,
}

impl fmt::Debug for TypeConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeConfiguration")
            .field("class_constraints", &self.class_constraints)
            .field("properties", &self.properties)
            .field("executables", &self.executables)
            .field("default_group_sequence", &self.default_group_sequence)
            .field("has_provider", &self.default_group_sequence_provider.is_some())
            .finish()
    }
}

/// A producer of raw type configuration.
pub trait MetadataSource: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Configuration declared directly on `type_name`, if any.
    fn configuration_for(&self, type_name: &TypeName) -> ConfigResult<Option<TypeConfiguration>>;

    /// Types this source knows about; they are aggregated eagerly when a
    /// validator is built.
    fn declared_types(&self) -> Vec<TypeName> {
        Vec::new()
    }
}
