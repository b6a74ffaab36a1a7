//! Programmatic constraint mapping.
//!
//! ```
//! use verity::metadata::{ConstraintDeclaration, ConstraintMapping};
//!
//! let mut mapping = ConstraintMapping::new();
//! mapping
//!     .bean("Car")
//!     .property("manufacturer", |p| p.constraint(ConstraintDeclaration::new("NotNull")))
//!     .property("driver", |p| p.valid().convert_group("Default", "DriverChecks"));
//! assert_eq!(mapping.len(), 1);
//! ```

use crate::core::error::ConfigResult;
use crate::core::types::{TypeName, TypeRef};
use crate::groups::GroupId;
use crate::metadata::config::{
    CascadingConfiguration, ContainerElementConfiguration, DefaultGroupSequenceProvider, ElementConfiguration,
    ExecutableConfiguration, MetadataSource, TypeConfiguration,
};
use crate::metadata::descriptor::ConstraintDeclaration;
use indexmap::IndexMap;
use std::sync::Arc;

/// In-memory [`MetadataSource`] filled through a fluent builder.
#[derive(Debug, Clone)]
pub struct ConstraintMapping {
    name: String,
    types: IndexMap<TypeName, TypeConfiguration>,
}

impl ConstraintMapping {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::named("programmatic")
    }

    /// Create an empty mapping with a source name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: IndexMap::new(),
        }
    }

    /// Start (or continue) the configuration of a bean type.
    pub fn bean(&mut self, type_name: impl Into<TypeName>) -> BeanMapping<'_> {
        BeanMapping {
            config: self.types.entry(type_name.into()).or_default(),
        }
    }

    /// Configured types.
    pub fn types(&self) -> impl Iterator<Item = &TypeName> {
        self.types.keys()
    }

    /// Number of configured types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if nothing is configured.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for ConstraintMapping {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataSource for ConstraintMapping {
    fn name(&self) -> &str {
        &self.name
    }

    fn configuration_for(&self, type_name: &TypeName) -> ConfigResult<Option<TypeConfiguration>> {
        Ok(self.types.get(type_name).cloned())
    }

    fn declared_types(&self) -> Vec<TypeName> {
        self.types.keys().cloned().collect()
    }
}

/// Builder for one bean type.
pub struct BeanMapping<'a> {
    config: &'a mut TypeConfiguration,
}

impl<'a> BeanMapping<'a> {
    /// Add a class-level constraint.
    pub fn constraint(self, declaration: ConstraintDeclaration) -> Self {
        self.config.class_constraints.push(declaration);
        self
    }

    /// Configure a property.
    pub fn property<F>(self, name: &str, configure: F) -> Self
    where
        F: FnOnce(ElementMapping) -> ElementMapping,
    {
        let element = configure(ElementMapping::new(name)).into_element();
        self.config.properties.push(element);
        self
    }

    /// Configure a method taking `parameter_count` arguments.
    pub fn method<F>(self, name: &str, parameter_count: usize, configure: F) -> Self
    where
        F: FnOnce(ExecutableMapping) -> ExecutableMapping,
    {
        let executable = configure(ExecutableMapping {
            config: ExecutableConfiguration {
                name: name.to_string(),
                parameter_count,
                parameters: Vec::new(),
                return_value: None,
            },
        });
        self.config.executables.push(executable.config);
        self
    }

    /// Redefine the default group sequence.
    pub fn default_group_sequence<I, G>(self, groups: I) -> Self
    where
        I: IntoIterator<Item = G>,
        G: Into<GroupId>,
    {
        self.config.default_group_sequence = Some(groups.into_iter().map(Into::into).collect());
        self
    }

    /// Compute the default group sequence per instance.
    pub fn default_group_sequence_provider<P>(self, provider: P) -> Self
    where
        P: DefaultGroupSequenceProvider + 'static,
    {
        self.config.default_group_sequence_provider = Some(Arc::new(provider));
        self
    }
}

/// Builder for a property, parameter, return value or container element.
#[derive(Debug, Clone)]
pub struct ElementMapping {
    element: ElementConfiguration,
}

impl ElementMapping {
    fn new(name: &str) -> Self {
        Self {
            element: ElementConfiguration::new(name),
        }
    }

    /// Set the declared type.
    pub fn declared_type(mut self, declared_type: impl Into<TypeRef>) -> Self {
        self.element.declared_type = Some(declared_type.into());
        self
    }

    /// Add a constraint.
    pub fn constraint(mut self, declaration: ConstraintDeclaration) -> Self {
        self.element.constraints.push(declaration);
        self
    }

    /// Mark for cascaded validation.
    pub fn valid(mut self) -> Self {
        self.element.cascading.cascade = true;
        self
    }

    /// Convert `from` into `to` when cascading.
    pub fn convert_group(mut self, from: impl Into<GroupId>, to: impl Into<GroupId>) -> Self {
        self.element
            .cascading
            .group_conversions
            .push((from.into(), to.into()));
        self
    }

    /// Configure the elements of one type argument.
    pub fn container_element<F>(mut self, type_argument: usize, configure: F) -> Self
    where
        F: FnOnce(ElementMapping) -> ElementMapping,
    {
        let nested = configure(ElementMapping::new("")).element;
        self.element
            .cascading
            .container_elements
            .push(ContainerElementConfiguration {
                type_argument,
                constraints: nested.constraints,
                cascading: nested.cascading,
            });
        self
    }

    fn into_element(self) -> ElementConfiguration {
        self.element
    }

    fn into_cascading(self) -> (Vec<ConstraintDeclaration>, CascadingConfiguration) {
        (self.element.constraints, self.element.cascading)
    }
}

/// Builder for a method.
pub struct ExecutableMapping {
    config: ExecutableConfiguration,
}

impl ExecutableMapping {
    /// Configure the parameter at `index`, named `arg{index}`.
    pub fn parameter<F>(self, index: usize, configure: F) -> Self
    where
        F: FnOnce(ElementMapping) -> ElementMapping,
    {
        self.named_parameter(index, &format!("arg{}", index), configure)
    }

    /// Configure the parameter at `index` with an explicit name.
    pub fn named_parameter<F>(mut self, index: usize, name: &str, configure: F) -> Self
    where
        F: FnOnce(ElementMapping) -> ElementMapping,
    {
        let element = configure(ElementMapping::new(name)).into_element();
        self.config.parameters.push((index, element));
        self
    }

    /// Configure the return value.
    pub fn return_value<F>(mut self, configure: F) -> Self
    where
        F: FnOnce(ElementMapping) -> ElementMapping,
    {
        let (constraints, cascading) = configure(ElementMapping::new("")).into_cascading();
        let mut element = ElementConfiguration::new(crate::core::path::RETURN_VALUE_NODE_NAME);
        element.constraints = constraints;
        element.cascading = cascading;
        self.config.return_value = Some(element);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bean::BeanRef;

    #[test]
    fn test_bean_configuration_accumulates() {
        let mut mapping = ConstraintMapping::new();
        mapping
            .bean("Car")
            .property("manufacturer", |p| p.constraint(ConstraintDeclaration::new("NotNull")));
        mapping
            .bean("Car")
            .property("seats", |p| p.declared_type("int").constraint(ConstraintDeclaration::new("Min")));

        let config = mapping.configuration_for(&"Car".into()).unwrap().unwrap();
        assert_eq!(config.properties.len(), 2);
        assert_eq!(config.properties[1].declared_type, Some(TypeRef::named("int")));
        assert!(mapping.configuration_for(&"Truck".into()).unwrap().is_none());
        assert_eq!(mapping.declared_types(), vec![TypeName::from("Car")]);
    }

    #[test]
    fn test_cascading_and_conversions() {
        let mut mapping = ConstraintMapping::new();
        mapping.bean("Car").property("fuelConsumption", |p| {
            p.container_element(0, |k| k.constraint(ConstraintDeclaration::new("NotNull")))
                .container_element(1, |v| v.valid().convert_group("Default", "Checks"))
        });
        let config = mapping.configuration_for(&"Car".into()).unwrap().unwrap();
        let cascading = &config.properties[0].cascading;
        assert!(!cascading.cascade);
        assert_eq!(cascading.container_elements.len(), 2);
        assert!(cascading.container_elements[1].cascading.cascade);
        assert_eq!(
            cascading.container_elements[1].cascading.group_conversions,
            vec![(GroupId::default_group(), GroupId::new("Checks"))]
        );
    }

    #[test]
    fn test_methods_and_sequences() {
        let mut mapping = ConstraintMapping::new();
        mapping
            .bean("RentalStation")
            .method("rent", 2, |m| {
                m.parameter(0, |p| p.constraint(ConstraintDeclaration::new("NotNull")))
                    .named_parameter(1, "days", |p| p.constraint(ConstraintDeclaration::new("Positive")))
                    .return_value(|r| r.valid())
            })
            .default_group_sequence(["RentalStation", "Checks"])
            .default_group_sequence_provider(|_: Option<&BeanRef>| Vec::new());

        let config = mapping.configuration_for(&"RentalStation".into()).unwrap().unwrap();
        let rent = &config.executables[0];
        assert_eq!(rent.parameter_count, 2);
        assert_eq!(rent.parameters[0].1.name, "arg0");
        assert_eq!(rent.parameters[1].1.name, "days");
        assert!(rent.return_value.as_ref().unwrap().cascading.cascade);
        assert_eq!(config.default_group_sequence.as_ref().unwrap().len(), 2);
        assert!(config.default_group_sequence_provider.is_some());
    }
}
