//! Metadata aggregation and caching.
//!
//! For a requested type the manager walks the linearised hierarchy (most
//! specific first) and asks every source, in registration order, for the
//! configuration declared directly on each type. Constraints and cascades
//! are additive; container-element metadata merges by type argument. The
//! result is validated, frozen and cached. Concurrent builders of the same
//! type race harmlessly: the first published instance wins.

use crate::core::error::{ConfigResult, ConfigurationError};
use crate::core::hierarchy::TypeHierarchy;
use crate::core::path::RETURN_VALUE_NODE_NAME;
use crate::core::types::TypeName;
use crate::groups::{GroupId, GroupOrderPlanner};
use crate::metadata::config::{
    CascadingConfiguration, DefaultGroupSequenceProvider, ElementConfiguration, ExecutableConfiguration,
    MetadataSource, TypeConfiguration,
};
use crate::metadata::descriptor::{ConstraintDeclaration, ConstraintDescriptor};
use crate::metadata::type_metadata::{
    CascadingMetadata, DefaultGroupSequence, ElementKind, ElementMetadata, ExecutableMetadata, MetaConstraint,
    TypeMetadata,
};
use crate::validators::{ConstraintValidatorManager, ConstraintValidatorRegistry};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Builds and caches [`TypeMetadata`].
pub struct MetadataManager {
    hierarchy: Arc<TypeHierarchy>,
    registry: Arc<ConstraintValidatorRegistry>,
    planner: Arc<GroupOrderPlanner>,
    validators: Arc<ConstraintValidatorManager>,
    sources: Vec<Arc<dyn MetadataSource>>,
    cache: RwLock<HashMap<TypeName, Arc<TypeMetadata>>>,
}

impl MetadataManager {
    /// Create a manager over the given sources (earlier sources take
    /// precedence for the default group sequence).
    pub fn new(
        hierarchy: Arc<TypeHierarchy>,
        registry: Arc<ConstraintValidatorRegistry>,
        planner: Arc<GroupOrderPlanner>,
        validators: Arc<ConstraintValidatorManager>,
        sources: Vec<Arc<dyn MetadataSource>>,
    ) -> Self {
        Self {
            hierarchy,
            registry,
            planner,
            validators,
            sources,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Metadata of a type, built on first request.
    pub fn type_metadata(&self, type_name: &TypeName) -> ConfigResult<Arc<TypeMetadata>> {
        if let Some(cached) = self.cache.read().get(type_name) {
            return Ok(Arc::clone(cached));
        }

        let built = Arc::new(self.build(type_name)?);
        log::debug!(
            "aggregated metadata for {}: {} constraints, default group sequence {:?}",
            type_name,
            built.constraint_count(),
            built.default_group_sequence()
        );

        let mut cache = self.cache.write();
        if let Some(winner) = cache.get(type_name) {
            // Lost the race: the instances prepared for our copy are unreachable.
            for descriptor in built.descriptors() {
                self.validators.release(descriptor);
            }
            return Ok(Arc::clone(winner));
        }
        cache.insert(type_name.clone(), Arc::clone(&built));
        Ok(built)
    }

    /// Types announced by the sources, each once.
    pub fn declared_types(&self) -> Vec<TypeName> {
        let mut types: Vec<TypeName> = Vec::new();
        for source in &self.sources {
            for declared in source.declared_types() {
                if !types.contains(&declared) {
                    types.push(declared);
                }
            }
        }
        types
    }

    /// Aggregate every announced type now, surfacing declaration errors.
    /// Returns the number of aggregated types.
    pub fn eager_load(&self) -> ConfigResult<usize> {
        let types = self.declared_types();
        for type_name in &types {
            self.type_metadata(type_name)?;
        }
        Ok(types.len())
    }

    /// Number of cached types.
    pub fn cached_types(&self) -> usize {
        self.cache.read().len()
    }

    /// Drop all cached metadata and the validator instances built for it.
    pub fn clear(&self) {
        let mut cache = self.cache.write();
        cache.clear();
        self.validators.clear();
    }

    /// The type hierarchy.
    pub fn hierarchy(&self) -> &Arc<TypeHierarchy> {
        &self.hierarchy
    }

    /// The group planner.
    pub fn planner(&self) -> &Arc<GroupOrderPlanner> {
        &self.planner
    }

    /// Shared validator instances.
    pub fn validators(&self) -> &Arc<ConstraintValidatorManager> {
        &self.validators
    }

    fn build(&self, type_name: &TypeName) -> ConfigResult<TypeMetadata> {
        let hierarchy = self.hierarchy.supertypes(type_name);
        let mut aggregation = Aggregation::new(self, type_name);

        for declaring in hierarchy.iter() {
            for source in &self.sources {
                if let Some(config) = source.configuration_for(declaring)? {
                    log::trace!("source '{}' configures {}", source.name(), declaring);
                    aggregation.add(declaring, &config)?;
                }
            }
        }
        aggregation.finish(hierarchy)
    }
}

// ============================================================================
// Aggregation
// ============================================================================

struct Aggregation<'a> {
    manager: &'a MetadataManager,
    type_name: TypeName,
    class_constraints: Vec<MetaConstraint>,
    properties: IndexMap<String, ElementMetadata>,
    executables: IndexMap<String, ExecutableMetadata>,
    default_sequence: Option<DefaultSequenceDeclaration>,
}

enum DefaultSequenceDeclaration {
    Static(Vec<GroupId>),
    Provider(Arc<dyn DefaultGroupSequenceProvider>),
}

impl<'a> Aggregation<'a> {
    fn new(manager: &'a MetadataManager, type_name: &TypeName) -> Self {
        Self {
            manager,
            type_name: type_name.clone(),
            class_constraints: Vec::new(),
            properties: IndexMap::new(),
            executables: IndexMap::new(),
            default_sequence: None,
        }
    }

    fn add(&mut self, declaring: &TypeName, config: &TypeConfiguration) -> ConfigResult<()> {
        let manager = self.manager;
        for declaration in &config.class_constraints {
            self.class_constraints.push(meta_constraint(manager, declaration, declaring)?);
        }

        for property in &config.properties {
            let element = self
                .properties
                .entry(property.name.clone())
                .or_insert_with(|| ElementMetadata::new(&property.name, ElementKind::Property));
            let location = format!("{}.{}", declaring, property.name);
            merge_element(manager, element, property, declaring, &location)?;
        }

        for executable in &config.executables {
            self.add_executable(declaring, executable)?;
        }

        // Default group sequences are not inherited.
        if declaring == &self.type_name && self.default_sequence.is_none() {
            self.default_sequence = match (&config.default_group_sequence, &config.default_group_sequence_provider) {
                (Some(_), Some(_)) => {
                    return Err(ConfigurationError::InvalidDefaultGroupSequence {
                        type_name: self.type_name.clone(),
                        reason: "a static sequence and a provider are both declared".to_string(),
                    })
                }
                (Some(groups), None) => Some(DefaultSequenceDeclaration::Static(groups.clone())),
                (None, Some(provider)) => Some(DefaultSequenceDeclaration::Provider(Arc::clone(provider))),
                (None, None) => None,
            };
        }
        Ok(())
    }

    fn add_executable(&mut self, declaring: &TypeName, config: &ExecutableConfiguration) -> ConfigResult<()> {
        let manager = self.manager;
        let executable = self
            .executables
            .entry(config.name.clone())
            .or_insert_with(|| ExecutableMetadata {
                name: config.name.clone(),
                parameter_count: config.parameter_count,
                parameters: Vec::new(),
                return_value: None,
            });

        for (index, parameter) in &config.parameters {
            executable.parameter_count = executable.parameter_count.max(index + 1);
            let kind = ElementKind::Parameter { index: *index };
            let position = match executable.parameters.iter().position(|p| p.kind == kind) {
                Some(position) => position,
                None => {
                    executable.parameters.push(ElementMetadata::new(&parameter.name, kind));
                    executable.parameters.len() - 1
                }
            };
            let location = format!("{}.{}.{}", declaring, config.name, parameter.name);
            merge_element(manager, &mut executable.parameters[position], parameter, declaring, &location)?;
        }
        executable.parameters.sort_by_key(|p| match p.kind {
            ElementKind::Parameter { index } => index,
            _ => usize::MAX,
        });

        if let Some(return_value) = &config.return_value {
            let element = executable
                .return_value
                .get_or_insert_with(|| ElementMetadata::new(RETURN_VALUE_NODE_NAME, ElementKind::ReturnValue));
            let location = format!("{}.{}.{}", declaring, config.name, RETURN_VALUE_NODE_NAME);
            merge_element(manager, element, return_value, declaring, &location)?;
        }
        Ok(())
    }

    fn finish(self, hierarchy: Arc<[TypeName]>) -> ConfigResult<TypeMetadata> {
        for property in self.properties.values() {
            check_conversions(&property.cascading, &format!("{}.{}", self.type_name, property.name))?;
        }
        for executable in self.executables.values() {
            for element in executable.parameters.iter().chain(executable.return_value.iter()) {
                let location = format!("{}.{}.{}", self.type_name, executable.name, element.name);
                check_conversions(&element.cascading, &location)?;
            }
        }

        let default_group_sequence = match self.default_sequence {
            None => DefaultGroupSequence::Implicit,
            Some(DefaultSequenceDeclaration::Static(groups)) => {
                let order = self.manager.planner.default_order(&self.type_name, &groups)?;
                DefaultGroupSequence::Static(order.flattened())
            }
            Some(DefaultSequenceDeclaration::Provider(provider)) => DefaultGroupSequence::Provider(provider),
        };

        Ok(TypeMetadata {
            type_name: self.type_name,
            hierarchy,
            class_constraints: self.class_constraints,
            properties: self.properties,
            executables: self.executables,
            default_group_sequence,
        })
    }
}

fn meta_constraint(
    manager: &MetadataManager,
    declaration: &ConstraintDeclaration,
    declaring: &TypeName,
) -> ConfigResult<MetaConstraint> {
    let descriptor = ConstraintDescriptor::build(declaration, &manager.registry)?;
    let catalog = manager.planner.catalog();
    if let Some(unknown) = descriptor.groups().iter().find(|g| !catalog.is_group_marker(g)) {
        return Err(ConfigurationError::NotAGroupMarker { group: unknown.clone() });
    }
    manager.validators.prepare(&descriptor)?;
    Ok(MetaConstraint::new(descriptor, declaring.clone()))
}

fn merge_element(
    manager: &MetadataManager,
    element: &mut ElementMetadata,
    config: &ElementConfiguration,
    declaring: &TypeName,
    location: &str,
) -> ConfigResult<()> {
    if element.declared_type.is_none() {
        element.declared_type = config.declared_type.clone();
    }
    for declaration in &config.constraints {
        element.constraints.push(meta_constraint(manager, declaration, declaring)?);
    }
    merge_cascading(manager, &mut element.cascading, &config.cascading, declaring, location)
}

fn merge_cascading(
    manager: &MetadataManager,
    cascading: &mut CascadingMetadata,
    config: &CascadingConfiguration,
    declaring: &TypeName,
    location: &str,
) -> ConfigResult<()> {
    cascading.cascade |= config.cascade;

    let catalog = manager.planner.catalog();
    let invalid = |reason: String| ConfigurationError::InvalidGroupConversion {
        location: location.to_string(),
        reason,
    };
    for (from, to) in &config.group_conversions {
        if catalog.sequence_members(from).is_some() {
            return Err(invalid(format!("'{}' is a group sequence and cannot be converted", from)));
        }
        for group in [from, to] {
            if !catalog.is_group_marker(group) {
                return Err(ConfigurationError::NotAGroupMarker { group: group.clone() });
            }
        }
        match cascading.conversions.target(from) {
            Some(existing) if existing != to => {
                return Err(invalid(format!("'{}' is converted more than once", from)));
            }
            Some(_) => {}
            None => cascading.conversions.push(from.clone(), to.clone()),
        }
    }

    for container in &config.container_elements {
        let element = cascading.container_element_mut(container.type_argument);
        for declaration in &container.constraints {
            element.constraints.push(meta_constraint(manager, declaration, declaring)?);
        }
        let nested = format!("{}<{}>", location, container.type_argument);
        merge_cascading(manager, &mut element.cascading, &container.cascading, declaring, &nested)?;
    }
    Ok(())
}

fn check_conversions(cascading: &CascadingMetadata, location: &str) -> ConfigResult<()> {
    if !cascading.conversions.is_empty() && !cascading.cascade {
        return Err(ConfigurationError::InvalidGroupConversion {
            location: location.to_string(),
            reason: "group conversions require the element to be cascaded".to_string(),
        });
    }
    for container in &cascading.container_elements {
        check_conversions(&container.cascading, &format!("{}<{}>", location, container.type_argument))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bean::BeanRef;
    use crate::core::types::TypeRef;
    use crate::groups::GroupCatalog;
    use crate::metadata::mapping::ConstraintMapping;
    use rayon::prelude::*;

    fn manager_with(mapping: ConstraintMapping, sources: Vec<Arc<dyn MetadataSource>>) -> MetadataManager {
        let mut hierarchy = TypeHierarchy::with_builtins();
        hierarchy
            .declare_interface("Vehicle", &[])
            .declare_class("Car", None, &["Vehicle"])
            .declare_class("RentalCar", Some("Car"), &[]);
        let mut catalog = GroupCatalog::new();
        catalog
            .define_group("CarChecks", Vec::<&str>::new())
            .define_group("DriverChecks", Vec::<&str>::new())
            .define_sequence("Complete", ["Default", "CarChecks"]);

        let mut all: Vec<Arc<dyn MetadataSource>> = vec![Arc::new(mapping)];
        all.extend(sources);
        MetadataManager::new(
            Arc::new(hierarchy),
            Arc::new(ConstraintValidatorRegistry::with_builtins()),
            Arc::new(GroupOrderPlanner::new(Arc::new(catalog))),
            Arc::new(ConstraintValidatorManager::new()),
            all,
        )
    }

    #[test]
    fn test_merges_hierarchy_most_specific_first() {
        let mut mapping = ConstraintMapping::new();
        mapping
            .bean("Vehicle")
            .property("manufacturer", |p| p.constraint(ConstraintDeclaration::new("NotNull")));
        mapping.bean("Car").property("manufacturer", |p| {
            p.declared_type("String")
                .constraint(ConstraintDeclaration::new("Size").attribute("min", 2))
        });
        mapping
            .bean("RentalCar")
            .property("rentalStation", |p| p.constraint(ConstraintDeclaration::new("NotNull")));

        let manager = manager_with(mapping, Vec::new());
        let metadata = manager.type_metadata(&"RentalCar".into()).unwrap();
        let manufacturer = metadata.property("manufacturer").unwrap();
        assert_eq!(manufacturer.constraints().len(), 2);
        assert_eq!(manufacturer.constraints()[0].declaring_type().as_str(), "Car");
        assert_eq!(manufacturer.constraints()[1].declaring_type().as_str(), "Vehicle");
        assert_eq!(manufacturer.declared_type(), Some(&TypeRef::named("String")));
        assert_eq!(metadata.constraint_count(), 3);
        assert_eq!(metadata.hierarchy()[0].as_str(), "RentalCar");
        assert!(metadata.is_constrained());
    }

    #[test]
    fn test_cache_publishes_once() {
        let manager = manager_with(ConstraintMapping::new(), Vec::new());
        let first = manager.type_metadata(&"Car".into()).unwrap();
        let second = manager.type_metadata(&"Car".into()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!first.is_constrained());
        assert_eq!(manager.cached_types(), 1);
        manager.clear();
        assert_eq!(manager.cached_types(), 0);
    }

    #[test]
    fn test_rebuild_after_clear_does_not_accumulate_instances() {
        let mut mapping = ConstraintMapping::new();
        mapping.bean("Car").property("manufacturer", |p| {
            p.constraint(ConstraintDeclaration::new("NotNull"))
                .constraint(ConstraintDeclaration::new("Size").attribute("max", 20))
        });
        let manager = manager_with(mapping, Vec::new());

        manager.type_metadata(&"Car".into()).unwrap();
        let prepared = manager.validators().len();
        assert!(prepared > 0);

        manager.clear();
        assert!(manager.validators().is_empty());
        manager.type_metadata(&"Car".into()).unwrap();
        assert_eq!(manager.validators().len(), prepared);
    }

    #[test]
    fn test_concurrent_builders_keep_one_set_of_instances() {
        let mapping = || {
            let mut mapping = ConstraintMapping::new();
            mapping
                .bean("Car")
                .property("manufacturer", |p| p.constraint(ConstraintDeclaration::new("NotNull")));
            mapping
        };
        let manager = manager_with(mapping(), Vec::new());
        let reference = manager_with(mapping(), Vec::new());
        reference.type_metadata(&"Car".into()).unwrap();

        let results: Vec<Arc<TypeMetadata>> = (0..8)
            .into_par_iter()
            .map(|_| manager.type_metadata(&"Car".into()).unwrap())
            .collect();
        assert!(results.iter().all(|m| Arc::ptr_eq(m, &results[0])));
        assert_eq!(manager.validators().len(), reference.validators().len());
    }

    #[test]
    fn test_static_default_sequence_is_expanded() {
        let mut mapping = ConstraintMapping::new();
        mapping.bean("Car").default_group_sequence(["Car", "CarChecks"]);
        let manager = manager_with(mapping, Vec::new());

        let car = manager.type_metadata(&"Car".into()).unwrap();
        match car.default_group_sequence() {
            DefaultGroupSequence::Static(groups) => {
                assert_eq!(groups, &vec![GroupId::new("Car"), GroupId::new("CarChecks")])
            }
            other => panic!("unexpected {:?}", other),
        }
        // Not inherited.
        let rental = manager.type_metadata(&"RentalCar".into()).unwrap();
        assert!(!rental.is_default_group_sequence_redefined());
    }

    #[test]
    fn test_invalid_default_sequences() {
        let mut missing_own = ConstraintMapping::new();
        missing_own.bean("Car").default_group_sequence(["CarChecks"]);
        let err = manager_with(missing_own, Vec::new())
            .type_metadata(&"Car".into())
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidDefaultGroupSequence { .. }));

        let mut both = ConstraintMapping::new();
        both.bean("Car")
            .default_group_sequence(["Car"])
            .default_group_sequence_provider(|_: Option<&BeanRef>| vec![GroupId::new("Car")]);
        let err = manager_with(both, Vec::new()).type_metadata(&"Car".into()).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidDefaultGroupSequence { .. }));
    }

    #[test]
    fn test_first_source_wins_for_default_sequence() {
        let mut first = ConstraintMapping::named("first");
        first.bean("Car").default_group_sequence(["Car", "CarChecks"]);
        let mut second = ConstraintMapping::named("second");
        second.bean("Car").default_group_sequence(["CarChecks", "Car"]);

        let second: Arc<dyn MetadataSource> = Arc::new(second);
        let manager = manager_with(first, vec![second]);
        let car = manager.type_metadata(&"Car".into()).unwrap();
        assert_eq!(
            car.resolve_default_group_sequence(None).unwrap()[0],
            GroupId::new("Car")
        );
    }

    #[test]
    fn test_group_conversion_rules() {
        let mut not_cascaded = ConstraintMapping::new();
        not_cascaded
            .bean("Car")
            .property("driver", |p| p.convert_group("Default", "DriverChecks"));
        let err = manager_with(not_cascaded, Vec::new())
            .type_metadata(&"Car".into())
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidGroupConversion { .. }));

        let mut from_sequence = ConstraintMapping::new();
        from_sequence
            .bean("Car")
            .property("driver", |p| p.valid().convert_group("Complete", "DriverChecks"));
        let err = manager_with(from_sequence, Vec::new())
            .type_metadata(&"Car".into())
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidGroupConversion { .. }));

        let mut duplicate = ConstraintMapping::new();
        duplicate.bean("Car").property("driver", |p| {
            p.valid()
                .convert_group("Default", "DriverChecks")
                .convert_group("Default", "CarChecks")
        });
        let err = manager_with(duplicate, Vec::new())
            .type_metadata(&"Car".into())
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidGroupConversion { .. }));

        // Cascade declared by a supertype legitimises the conversion.
        let mut split = ConstraintMapping::new();
        split.bean("Vehicle").property("driver", |p| p.valid());
        split
            .bean("Car")
            .property("driver", |p| p.convert_group("Default", "DriverChecks"));
        let metadata = manager_with(split, Vec::new()).type_metadata(&"Car".into()).unwrap();
        let driver = metadata.property("driver").unwrap();
        assert_eq!(
            driver.cascading().conversions().convert(&GroupId::default_group()),
            GroupId::new("DriverChecks")
        );
    }

    #[test]
    fn test_declaration_errors() {
        let mut unknown_group = ConstraintMapping::new();
        unknown_group.bean("Car").property("seats", |p| {
            p.constraint(ConstraintDeclaration::new("Min").groups(["Nope"]))
        });
        let err = manager_with(unknown_group, Vec::new())
            .type_metadata(&"Car".into())
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::NotAGroupMarker { .. }));

        let mut bad_pattern = ConstraintMapping::new();
        bad_pattern.bean("Car").property("plate", |p| {
            p.constraint(ConstraintDeclaration::new("Pattern").attribute("regexp", "(["))
        });
        let manager = manager_with(bad_pattern, Vec::new());
        assert!(matches!(
            manager.eager_load(),
            Err(ConfigurationError::InvalidConstraintDeclaration { .. })
        ));
    }

    #[test]
    fn test_executables_merge_by_index() {
        let mut mapping = ConstraintMapping::new();
        mapping.bean("Car").method("drive", 1, |m| {
            m.parameter(0, |p| p.constraint(ConstraintDeclaration::new("Max").attribute("value", 75)))
                .return_value(|r| r.constraint(ConstraintDeclaration::new("NotNull")))
        });
        mapping.bean("RentalCar").method("drive", 2, |m| {
            m.parameter(1, |p| p.constraint(ConstraintDeclaration::new("NotNull")))
        });
        let manager = manager_with(mapping, Vec::new());
        let metadata = manager.type_metadata(&"RentalCar".into()).unwrap();
        let drive = metadata.executable("drive").unwrap();
        assert_eq!(drive.parameter_count(), 2);
        assert_eq!(drive.parameters().len(), 2);
        assert_eq!(drive.parameters()[0].kind(), ElementKind::Parameter { index: 0 });
        assert_eq!(drive.return_value().unwrap().name(), RETURN_VALUE_NODE_NAME);
        assert_eq!(manager.declared_types().len(), 2);
    }
}
