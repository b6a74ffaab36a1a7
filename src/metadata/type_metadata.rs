//! Aggregated, immutable metadata of one type.

use crate::core::bean::BeanRef;
use crate::core::types::{TypeName, TypeRef};
use crate::groups::GroupId;
use crate::metadata::config::DefaultGroupSequenceProvider;
use crate::metadata::descriptor::ConstraintDescriptor;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// Where a constraint or cascade is declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// The bean itself (class-level constraints)
    Type,
    /// A property
    Property,
    /// A method parameter
    Parameter {
        /// Position of the parameter
        index: usize,
    },
    /// A method return value
    ReturnValue,
}

/// A constraint bound to the type that declared it.
#[derive(Debug, Clone)]
pub struct MetaConstraint {
    descriptor: Arc<ConstraintDescriptor>,
    declaring_type: TypeName,
}

impl MetaConstraint {
    /// Bind a descriptor to its declaring type.
    pub fn new(descriptor: Arc<ConstraintDescriptor>, declaring_type: TypeName) -> Self {
        Self {
            descriptor,
            declaring_type,
        }
    }

    /// The constraint.
    pub fn descriptor(&self) -> &Arc<ConstraintDescriptor> {
        &self.descriptor
    }

    /// Type that declared the constraint.
    pub fn declaring_type(&self) -> &TypeName {
        &self.declaring_type
    }

    /// Whether the constraint takes part in validating `group` for a bean of
    /// type `bean_type`.
    ///
    /// Constraints in `Default` also belong to the implicit group of their
    /// declaring type, and to the group of the bean type when that type
    /// redefines its default sequence.
    pub fn applies_to(&self, group: &GroupId, bean_type: &TypeName, redefines_default: bool) -> bool {
        if self.descriptor.belongs_to(group) {
            return true;
        }
        if !self.descriptor.belongs_to(&GroupId::default_group()) {
            return false;
        }
        group.as_str() == self.declaring_type.as_str()
            || (redefines_default && group.as_str() == bean_type.as_str())
    }
}

/// `from -> to` conversions of one cascaded element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupConversions {
    conversions: Vec<(GroupId, GroupId)>,
}

impl GroupConversions {
    pub(crate) fn push(&mut self, from: GroupId, to: GroupId) {
        self.conversions.push((from, to));
    }

    pub(crate) fn target(&self, from: &GroupId) -> Option<&GroupId> {
        self.conversions.iter().find(|(f, _)| f == from).map(|(_, t)| t)
    }

    /// Convert a group; unconverted groups map to themselves.
    pub fn convert(&self, group: &GroupId) -> GroupId {
        self.target(group).cloned().unwrap_or_else(|| group.clone())
    }

    /// All conversions.
    pub fn iter(&self) -> impl Iterator<Item = &(GroupId, GroupId)> {
        self.conversions.iter()
    }

    /// Check if there are no conversions.
    pub fn is_empty(&self) -> bool {
        self.conversions.is_empty()
    }
}

/// Cascading of an element or container element.
#[derive(Debug, Clone, Default)]
pub struct CascadingMetadata {
    pub(crate) cascade: bool,
    pub(crate) conversions: GroupConversions,
    pub(crate) container_elements: Vec<ContainerElementMetadata>,
}

impl CascadingMetadata {
    /// Whether the value itself is cascaded.
    pub fn is_cascading(&self) -> bool {
        self.cascade
    }

    /// Group conversions.
    pub fn conversions(&self) -> &GroupConversions {
        &self.conversions
    }

    /// Container elements, by type argument.
    pub fn container_elements(&self) -> &[ContainerElementMetadata] {
        &self.container_elements
    }

    /// Whether anything below this value needs the engine: cascading or
    /// container-element constraints.
    pub fn is_marked_for_traversal(&self) -> bool {
        self.cascade
            || self
                .container_elements
                .iter()
                .any(|c| !c.constraints.is_empty() || c.cascading.is_marked_for_traversal())
    }

    pub(crate) fn container_element_mut(&mut self, type_argument: usize) -> &mut ContainerElementMetadata {
        let position = match self
            .container_elements
            .iter()
            .position(|c| c.type_argument == type_argument)
        {
            Some(position) => position,
            None => {
                self.container_elements.push(ContainerElementMetadata {
                    type_argument,
                    constraints: Vec::new(),
                    cascading: CascadingMetadata::default(),
                });
                self.container_elements.len() - 1
            }
        };
        &mut self.container_elements[position]
    }
}

/// Constraints and cascading of one type argument of a container.
#[derive(Debug, Clone)]
pub struct ContainerElementMetadata {
    pub(crate) type_argument: usize,
    pub(crate) constraints: Vec<MetaConstraint>,
    pub(crate) cascading: CascadingMetadata,
}

impl ContainerElementMetadata {
    /// Type argument index.
    pub fn type_argument(&self) -> usize {
        self.type_argument
    }

    /// Constraints on the elements.
    pub fn constraints(&self) -> &[MetaConstraint] {
        &self.constraints
    }

    /// Cascading of the elements.
    pub fn cascading(&self) -> &CascadingMetadata {
        &self.cascading
    }
}

/// A property, parameter or return value.
#[derive(Debug, Clone)]
pub struct ElementMetadata {
    pub(crate) name: String,
    pub(crate) kind: ElementKind,
    pub(crate) declared_type: Option<TypeRef>,
    pub(crate) constraints: Vec<MetaConstraint>,
    pub(crate) cascading: CascadingMetadata,
}

impl ElementMetadata {
    pub(crate) fn new(name: impl Into<String>, kind: ElementKind) -> Self {
        Self {
            name: name.into(),
            kind,
            declared_type: None,
            constraints: Vec::new(),
            cascading: CascadingMetadata::default(),
        }
    }

    /// Element name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Element kind.
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Declared type, if configured.
    pub fn declared_type(&self) -> Option<&TypeRef> {
        self.declared_type.as_ref()
    }

    /// Constraints on the element itself.
    pub fn constraints(&self) -> &[MetaConstraint] {
        &self.constraints
    }

    /// Cascading.
    pub fn cascading(&self) -> &CascadingMetadata {
        &self.cascading
    }

    /// Whether the element has constraints or needs traversal.
    pub fn is_constrained(&self) -> bool {
        !self.constraints.is_empty() || self.cascading.is_marked_for_traversal()
    }
}

/// A constrained method.
#[derive(Debug, Clone)]
pub struct ExecutableMetadata {
    pub(crate) name: String,
    pub(crate) parameter_count: usize,
    pub(crate) parameters: Vec<ElementMetadata>,
    pub(crate) return_value: Option<ElementMetadata>,
}

impl ExecutableMetadata {
    /// Method name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of declared parameters.
    pub fn parameter_count(&self) -> usize {
        self.parameter_count
    }

    /// Constrained parameters, by index.
    pub fn parameters(&self) -> &[ElementMetadata] {
        &self.parameters
    }

    /// Return value metadata.
    pub fn return_value(&self) -> Option<&ElementMetadata> {
        self.return_value.as_ref()
    }
}

/// How the `Default` group is evaluated for a type.
#[derive(Clone, Default)]
pub enum DefaultGroupSequence {
    /// `Default` means the `Default` group
    #[default]
    Implicit,
    /// Redefined statically; groups are already expanded
    Static(Vec<GroupId>),
    /// Computed per instance
    Provider(Arc<dyn DefaultGroupSequenceProvider>),
}

impl DefaultGroupSequence {
    /// Whether `Default` is redefined for the type.
    pub fn is_redefined(&self) -> bool {
        !matches!(self, DefaultGroupSequence::Implicit)
    }
}

impl fmt::Debug for DefaultGroupSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultGroupSequence::Implicit => f.write_str("Implicit"),
            DefaultGroupSequence::Static(groups) => f.debug_tuple("Static").field(groups).finish(),
            DefaultGroupSequence::Provider(_) => f.write_str("Provider"),
        }
    }
}

/// Everything the engine needs to know about one type.
#[derive(Debug)]
pub struct TypeMetadata {
    pub(crate) type_name: TypeName,
    pub(crate) hierarchy: Arc<[TypeName]>,
    pub(crate) class_constraints: Vec<MetaConstraint>,
    pub(crate) properties: IndexMap<String, ElementMetadata>,
    pub(crate) executables: IndexMap<String, ExecutableMetadata>,
    pub(crate) default_group_sequence: DefaultGroupSequence,
}

impl TypeMetadata {
    /// The type.
    pub fn type_name(&self) -> &TypeName {
        &self.type_name
    }

    /// Linearised hierarchy, most specific first.
    pub fn hierarchy(&self) -> &[TypeName] {
        &self.hierarchy
    }

    /// Class-level constraints.
    pub fn class_constraints(&self) -> &[MetaConstraint] {
        &self.class_constraints
    }

    /// Properties in declaration order.
    pub fn properties(&self) -> impl Iterator<Item = &ElementMetadata> {
        self.properties.values()
    }

    /// Look up a property.
    pub fn property(&self, name: &str) -> Option<&ElementMetadata> {
        self.properties.get(name)
    }

    /// Properties that are cascaded or have container-element metadata.
    pub fn cascadables(&self) -> impl Iterator<Item = &ElementMetadata> {
        self.properties
            .values()
            .filter(|p| p.cascading.is_marked_for_traversal())
    }

    /// Look up a constrained method.
    pub fn executable(&self, name: &str) -> Option<&ExecutableMetadata> {
        self.executables.get(name)
    }

    /// Constrained methods.
    pub fn executables(&self) -> impl Iterator<Item = &ExecutableMetadata> {
        self.executables.values()
    }

    /// Default group handling.
    pub fn default_group_sequence(&self) -> &DefaultGroupSequence {
        &self.default_group_sequence
    }

    /// Whether the type redefines `Default`.
    pub fn is_default_group_sequence_redefined(&self) -> bool {
        self.default_group_sequence.is_redefined()
    }

    /// The default group sequence to use for `bean`, or `None` if `Default`
    /// is not redefined.
    pub fn resolve_default_group_sequence(&self, bean: Option<&BeanRef>) -> Option<Vec<GroupId>> {
        match &self.default_group_sequence {
            DefaultGroupSequence::Implicit => None,
            DefaultGroupSequence::Static(groups) => Some(groups.clone()),
            DefaultGroupSequence::Provider(provider) => Some(provider.default_group_sequence(bean)),
        }
    }

    /// Whether bean validation of this type can find anything at all.
    pub fn is_constrained(&self) -> bool {
        !self.class_constraints.is_empty() || self.properties.values().any(ElementMetadata::is_constrained)
    }

    /// Total number of declared constraints on the bean, container elements
    /// included.
    pub fn constraint_count(&self) -> usize {
        fn nested(cascading: &CascadingMetadata) -> usize {
            cascading
                .container_elements
                .iter()
                .map(|c| c.constraints.len() + nested(&c.cascading))
                .sum()
        }
        self.class_constraints.len()
            + self
                .properties
                .values()
                .map(|p| p.constraints.len() + nested(&p.cascading))
                .sum::<usize>()
    }

    /// Every constraint held by the type, executables included.
    pub(crate) fn descriptors(&self) -> Vec<&Arc<ConstraintDescriptor>> {
        fn element<'m>(element: &'m ElementMetadata, out: &mut Vec<&'m Arc<ConstraintDescriptor>>) {
            out.extend(element.constraints.iter().map(MetaConstraint::descriptor));
            nested(&element.cascading, out);
        }
        fn nested<'m>(cascading: &'m CascadingMetadata, out: &mut Vec<&'m Arc<ConstraintDescriptor>>) {
            for container in &cascading.container_elements {
                out.extend(container.constraints.iter().map(MetaConstraint::descriptor));
                nested(&container.cascading, out);
            }
        }

        let mut out: Vec<&Arc<ConstraintDescriptor>> =
            self.class_constraints.iter().map(MetaConstraint::descriptor).collect();
        for property in self.properties.values() {
            element(property, &mut out);
        }
        for executable in self.executables.values() {
            for parameter in executable.parameters.iter().chain(executable.return_value.iter()) {
                element(parameter, &mut out);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::descriptor::ConstraintDeclaration;
    use crate::validators::registry::ConstraintValidatorRegistry;

    fn meta(groups: &[&str], declaring: &str) -> MetaConstraint {
        let registry = ConstraintValidatorRegistry::with_builtins();
        let declaration = ConstraintDeclaration::new("NotNull").groups(groups.iter().copied());
        MetaConstraint::new(ConstraintDescriptor::build(&declaration, &registry).unwrap(), declaring.into())
    }

    #[test]
    fn test_implicit_group_membership() {
        let default = meta(&[], "Car");
        assert!(default.applies_to(&GroupId::default_group(), &"RentalCar".into(), false));
        assert!(default.applies_to(&GroupId::new("Car"), &"RentalCar".into(), false));
        assert!(!default.applies_to(&GroupId::new("RentalCar"), &"RentalCar".into(), false));
        assert!(default.applies_to(&GroupId::new("RentalCar"), &"RentalCar".into(), true));
        assert!(!default.applies_to(&GroupId::new("Checks"), &"Car".into(), true));

        let checks = meta(&["Checks"], "Car");
        assert!(checks.applies_to(&GroupId::new("Checks"), &"Car".into(), false));
        assert!(!checks.applies_to(&GroupId::new("Car"), &"Car".into(), true));
    }

    #[test]
    fn test_group_conversions() {
        let mut conversions = GroupConversions::default();
        conversions.push(GroupId::default_group(), GroupId::new("DriverChecks"));
        assert_eq!(conversions.convert(&GroupId::default_group()), GroupId::new("DriverChecks"));
        assert_eq!(conversions.convert(&GroupId::new("Other")), GroupId::new("Other"));
    }

    #[test]
    fn test_container_element_merge_by_index() {
        let mut cascading = CascadingMetadata::default();
        assert!(!cascading.is_marked_for_traversal());
        cascading.container_element_mut(1).constraints.push(meta(&[], "Car"));
        cascading.container_element_mut(1).cascading.cascade = true;
        cascading.container_element_mut(0);
        assert_eq!(cascading.container_elements().len(), 2);
        assert_eq!(cascading.container_elements()[0].constraints().len(), 1);
        assert!(cascading.is_marked_for_traversal());
    }
}
