//! The validation entry point.
//!
//! A [`Validator`] is built once from a type hierarchy, a group catalog, a
//! constraint registry and any number of metadata sources. It is cheap to
//! clone and safe to share between threads; every call gets its own
//! traversal state.

use crate::core::bean::BeanRef;
use crate::core::error::{ConfigResult, ConfigurationError, VerityResult};
use crate::core::hierarchy::TypeHierarchy;
use crate::core::path::{parse_property_path, ElementSelector, Path, PathQualifier, PathSegment};
use crate::core::types::{TypeName, TypeRef, Value};
use crate::engine::interpolation::{AttributeInterpolator, MessageInterpolator};
use crate::engine::traversal::{Services, Traversal};
use crate::engine::violation::ViolationSet;
use crate::extraction::{ExtractedValue, ValueExtractor, ValueExtractorRegistry};
use crate::groups::{GroupCatalog, GroupId, GroupOrder, GroupOrderPlanner};
use crate::metadata::config::MetadataSource;
use crate::metadata::document::{DocumentSource, MappingDocument};
use crate::metadata::mapping::ConstraintMapping;
use crate::metadata::type_metadata::TypeMetadata;
use crate::metadata::MetadataManager;
use crate::validators::resolver::DEFAULT_RESOLUTION_CACHE_CAPACITY;
use crate::validators::{
    ConstraintDefinition, ConstraintValidatorManager, ConstraintValidatorRegistry, ResolverStats, ValidatorResolver,
};
use rayon::prelude::*;
use std::sync::Arc;

// ============================================================================
// Options
// ============================================================================

/// Validation options.
#[derive(Debug, Clone)]
pub struct ValidationOptions {
    /// Stop the whole call at the first violation.
    pub fail_fast: bool,
    /// Stop after the first root-level member (property, parameter or the
    /// bean itself) that produced a violation, keeping all of its
    /// violations. Takes precedence over `fail_fast`.
    pub fail_fast_on_property: bool,
    /// Capacity of the validator resolution cache. Only read when the
    /// validator is built.
    pub resolution_cache_capacity: usize,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            fail_fast: false,
            fail_fast_on_property: false,
            resolution_cache_capacity: DEFAULT_RESOLUTION_CACHE_CAPACITY,
        }
    }
}

impl ValidationOptions {
    /// Create default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable/disable fail-fast.
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Enable/disable fail-fast on property.
    pub fn with_fail_fast_on_property(mut self, fail_fast_on_property: bool) -> Self {
        self.fail_fast_on_property = fail_fast_on_property;
        self
    }

    /// Set the resolution cache capacity.
    pub fn with_resolution_cache_capacity(mut self, capacity: usize) -> Self {
        self.resolution_cache_capacity = capacity;
        self
    }
}

// ============================================================================
// Validator
// ============================================================================

struct Shared {
    metadata: MetadataManager,
    resolver: ValidatorResolver,
    extractors: ValueExtractorRegistry,
    interpolator: Box<dyn MessageInterpolator>,
}

/// Validates beans, single properties, values and method calls.
#[derive(Clone)]
pub struct Validator {
    shared: Arc<Shared>,
    options: ValidationOptions,
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("cached_types", &self.shared.metadata.cached_types())
            .field("extractors", &self.shared.extractors.len())
            .field("options", &self.options)
            .finish()
    }
}

impl Validator {
    /// Start building a validator.
    pub fn builder() -> ValidatorBuilder {
        ValidatorBuilder::new()
    }

    /// A validator sharing all caches with `self` but using other options.
    pub fn with_options(&self, options: ValidationOptions) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            options,
        }
    }

    /// Current options.
    pub fn options(&self) -> &ValidationOptions {
        &self.options
    }

    /// Aggregated metadata of a type.
    pub fn type_metadata(&self, type_name: &TypeName) -> ConfigResult<Arc<TypeMetadata>> {
        self.shared.metadata.type_metadata(type_name)
    }

    /// The declared type hierarchy.
    pub fn hierarchy(&self) -> &TypeHierarchy {
        self.shared.metadata.hierarchy()
    }

    /// Validator resolution cache statistics.
    pub fn resolver_stats(&self) -> ResolverStats {
        self.shared.resolver.stats()
    }

    /// Validate a bean and everything reachable through cascaded elements.
    /// An empty group list means `Default`.
    pub fn validate(&self, bean: &BeanRef, groups: &[GroupId]) -> VerityResult<ViolationSet> {
        let bean_type = bean.bean_type();
        let meta = self.shared.metadata.type_metadata(&bean_type)?;
        let order = self.plan(groups)?;
        let violations = self
            .traversal(Some(Arc::clone(bean)), bean_type)
            .run_bean(Some(bean), &meta, &Path::root(), &order)?;
        Ok(ViolationSet::new(violations))
    }

    /// Validate the constraints of one property, reached through a path such
    /// as `driver.name` or `addresses[0].street`. Nothing is cascaded.
    pub fn validate_property(&self, bean: &BeanRef, property_path: &str, groups: &[GroupId]) -> VerityResult<ViolationSet> {
        let root_type = bean.bean_type();
        let (leaf, parents) = self.parse_path(&root_type, property_path)?;
        let order = self.plan(groups)?;

        let mut current = Arc::clone(bean);
        let mut path = Path::root();
        for segment in &parents {
            let meta = self.shared.metadata.type_metadata(&current.bean_type())?;
            let mut value = property_of(&current, &meta, &segment.name, property_path)?;
            path.add_property_node(segment.name.clone());

            if let Some(selector) = &segment.selector {
                let Some(element) = self.select_element(&value, selector)? else {
                    return Ok(ViolationSet::default());
                };
                path.add_container_element_node(None, &element.qualifier, element.type_parameter.as_deref());
                value = element.value;
            }
            if let Value::Optional(inner) = value {
                value = inner.map(|v| *v).unwrap_or(Value::Null);
            }

            current = match value {
                Value::Null => return Ok(ViolationSet::default()),
                Value::Bean(next) => next,
                other => {
                    return Err(invalid_path(
                        meta.type_name(),
                        property_path,
                        format!("'{}' is not a bean but {}", segment.name, other),
                    )
                    .into())
                }
            };
        }

        let meta = self.shared.metadata.type_metadata(&current.bean_type())?;
        property_of(&current, &meta, &leaf.name, property_path)?;
        let violations = self
            .traversal(Some(Arc::clone(bean)), root_type)
            .restricted_to(leaf.name, None)
            .run_bean(Some(&current), &meta, &path, &order)?;
        Ok(ViolationSet::new(violations))
    }

    /// Validate `value` against the constraints a property of `type_name`
    /// declares, without an instance. Intermediate segments follow declared
    /// property types.
    pub fn validate_value(
        &self,
        type_name: &TypeName,
        property_path: &str,
        value: Value,
        groups: &[GroupId],
    ) -> VerityResult<ViolationSet> {
        let (leaf, parents) = self.parse_path(type_name, property_path)?;
        if parents.iter().any(|s| s.selector.is_some()) {
            return Err(invalid_path(type_name, property_path, "element selectors need an instance").into());
        }
        let order = self.plan(groups)?;

        let mut meta = self.shared.metadata.type_metadata(type_name)?;
        let mut path = Path::root();
        for segment in &parents {
            let next = meta
                .property(&segment.name)
                .and_then(|p| p.declared_type())
                .and_then(TypeRef::name)
                .cloned()
                .ok_or_else(|| {
                    invalid_path(
                        meta.type_name(),
                        property_path,
                        format!("'{}' is not a property with a declared bean type", segment.name),
                    )
                })?;
            path.add_property_node(segment.name.clone());
            meta = self.shared.metadata.type_metadata(&next)?;
        }
        if meta.property(&leaf.name).is_none() {
            return Err(invalid_path(
                meta.type_name(),
                property_path,
                format!("'{}' is not a configured property", leaf.name),
            )
            .into());
        }

        let violations = self
            .traversal(None, type_name.clone())
            .restricted_to(leaf.name, Some(value))
            .run_bean(None, &meta, &path, &order)?;
        Ok(ViolationSet::new(violations))
    }

    /// Validate the arguments of a call to `method` on `bean`.
    pub fn validate_parameters(
        &self,
        bean: &BeanRef,
        method: &str,
        arguments: &[Value],
        groups: &[GroupId],
    ) -> VerityResult<ViolationSet> {
        let bean_type = bean.bean_type();
        let meta = self.shared.metadata.type_metadata(&bean_type)?;
        let executable = meta
            .executable(method)
            .ok_or_else(|| ConfigurationError::UnknownExecutable {
                type_name: bean_type.clone(),
                method: method.to_string(),
            })?;
        if arguments.len() != executable.parameter_count() {
            return Err(ConfigurationError::ParameterCountMismatch {
                method: method.to_string(),
                expected: executable.parameter_count(),
                actual: arguments.len(),
            }
            .into());
        }
        let order = self.plan(groups)?;

        let violations = self
            .traversal(Some(Arc::clone(bean)), bean_type)
            .run_parameters(bean, &meta, executable, arguments, &order)?;
        Ok(ViolationSet::new(violations))
    }

    /// Validate the value returned by a call to `method` on `bean`.
    pub fn validate_return_value(
        &self,
        bean: &BeanRef,
        method: &str,
        value: Value,
        groups: &[GroupId],
    ) -> VerityResult<ViolationSet> {
        let bean_type = bean.bean_type();
        let meta = self.shared.metadata.type_metadata(&bean_type)?;
        let executable = meta
            .executable(method)
            .ok_or_else(|| ConfigurationError::UnknownExecutable {
                type_name: bean_type.clone(),
                method: method.to_string(),
            })?;
        let order = self.plan(groups)?;

        let violations = self
            .traversal(Some(Arc::clone(bean)), bean_type)
            .run_return_value(bean, &meta, executable, value, &order)?;
        Ok(ViolationSet::new(violations))
    }

    /// Validate independent beans in parallel. Results keep the input order.
    pub fn validate_batch(&self, beans: &[BeanRef], groups: &[GroupId]) -> Vec<VerityResult<ViolationSet>> {
        beans.par_iter().map(|bean| self.validate(bean, groups)).collect()
    }

    fn plan(&self, groups: &[GroupId]) -> ConfigResult<GroupOrder> {
        if groups.is_empty() {
            return Ok(GroupOrder::default_group());
        }
        self.shared.metadata.planner().plan(groups)
    }

    fn traversal(&self, root_bean: Option<BeanRef>, root_type: TypeName) -> Traversal<'_> {
        let services = Services {
            metadata: &self.shared.metadata,
            resolver: &self.shared.resolver,
            extractors: &self.shared.extractors,
            interpolator: self.shared.interpolator.as_ref(),
        };
        Traversal::new(
            services,
            self.options.fail_fast,
            self.options.fail_fast_on_property,
            root_bean,
            root_type,
        )
    }

    fn parse_path(&self, type_name: &TypeName, property_path: &str) -> ConfigResult<(PathSegment, Vec<PathSegment>)> {
        let mut segments =
            parse_property_path(property_path).map_err(|reason| invalid_path(type_name, property_path, reason))?;
        let leaf = segments
            .pop()
            .ok_or_else(|| invalid_path(type_name, property_path, "empty path"))?;
        if leaf.selector.is_some() {
            return Err(invalid_path(
                type_name,
                property_path,
                "the last segment must name a property",
            ));
        }
        Ok((leaf, segments))
    }

    fn select_element(&self, container: &Value, selector: &ElementSelector) -> ConfigResult<Option<ExtractedValue>> {
        let elements = self.shared.extractors.extract(container, None)?;
        Ok(elements.into_iter().find(|element| match (selector, &element.qualifier) {
            (ElementSelector::Index(wanted), PathQualifier::Index(index)) => wanted == index,
            (ElementSelector::Key(wanted), PathQualifier::Key(key)) => key.to_string() == *wanted,
            _ => false,
        }))
    }
}

fn invalid_path(type_name: &TypeName, path: &str, reason: impl Into<String>) -> ConfigurationError {
    ConfigurationError::InvalidPropertyPath {
        type_name: type_name.clone(),
        path: path.to_string(),
        reason: reason.into(),
    }
}

/// Read a property, failing if neither the bean nor its metadata knows it.
fn property_of(bean: &BeanRef, meta: &TypeMetadata, name: &str, full_path: &str) -> ConfigResult<Value> {
    match bean.property(name) {
        Some(value) => Ok(value),
        None if meta.property(name).is_some() => Ok(Value::Null),
        None => Err(invalid_path(
            meta.type_name(),
            full_path,
            format!("unknown property '{}'", name),
        )),
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for a [`Validator`].
pub struct ValidatorBuilder {
    hierarchy: TypeHierarchy,
    catalog: GroupCatalog,
    registry: ConstraintValidatorRegistry,
    sources: Vec<Arc<dyn MetadataSource>>,
    extractors: Vec<(TypeRef, Arc<dyn ValueExtractor>)>,
    interpolator: Box<dyn MessageInterpolator>,
    options: ValidationOptions,
}

impl ValidatorBuilder {
    /// Create a builder with the built-in types, constraints and extractors.
    pub fn new() -> Self {
        Self {
            hierarchy: TypeHierarchy::with_builtins(),
            catalog: GroupCatalog::new(),
            registry: ConstraintValidatorRegistry::with_builtins(),
            sources: Vec::new(),
            extractors: Vec::new(),
            interpolator: Box::new(AttributeInterpolator),
            options: ValidationOptions::default(),
        }
    }

    /// Declare types.
    pub fn types<F>(mut self, declare: F) -> Self
    where
        F: FnOnce(&mut TypeHierarchy),
    {
        declare(&mut self.hierarchy);
        self
    }

    /// Declare groups and sequences.
    pub fn groups<F>(mut self, declare: F) -> Self
    where
        F: FnOnce(&mut GroupCatalog),
    {
        declare(&mut self.catalog);
        self
    }

    /// Register a constraint definition.
    pub fn constraint(mut self, definition: ConstraintDefinition) -> Self {
        self.registry.register(definition);
        self
    }

    /// Add a programmatic mapping.
    pub fn mapping(self, mapping: ConstraintMapping) -> Self {
        self.source(Arc::new(mapping))
    }

    /// Add a metadata source. Earlier sources take precedence for default
    /// group sequences.
    pub fn source(mut self, source: Arc<dyn MetadataSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Add a mapping document: its types, groups and bean constraints.
    pub fn document(mut self, name: impl Into<String>, document: &MappingDocument) -> Self {
        document.apply_types(&mut self.hierarchy);
        document.apply_groups(&mut self.catalog);
        self.sources.push(Arc::new(DocumentSource::new(name, document)));
        self
    }

    /// Register a value extractor for a container type.
    pub fn value_extractor<E>(mut self, container_type: impl Into<TypeRef>, extractor: E) -> Self
    where
        E: ValueExtractor + 'static,
    {
        let extractor: Arc<dyn ValueExtractor> = Arc::new(extractor);
        self.extractors.push((container_type.into(), extractor));
        self
    }

    /// Replace the message interpolator.
    pub fn message_interpolator<I>(mut self, interpolator: I) -> Self
    where
        I: MessageInterpolator + 'static,
    {
        self.interpolator = Box::new(interpolator);
        self
    }

    /// Set the options.
    pub fn options(mut self, options: ValidationOptions) -> Self {
        self.options = options;
        self
    }

    /// Build the validator, aggregating every type the sources announce.
    pub fn build(self) -> ConfigResult<Validator> {
        let hierarchy = Arc::new(self.hierarchy);
        let planner = Arc::new(GroupOrderPlanner::new(Arc::new(self.catalog)));
        let metadata = MetadataManager::new(
            Arc::clone(&hierarchy),
            Arc::new(self.registry),
            planner,
            Arc::new(ConstraintValidatorManager::new()),
            self.sources,
        );
        let loaded = metadata.eager_load()?;
        log::debug!("validator built with {} eagerly aggregated types", loaded);

        let resolver = ValidatorResolver::with_capacity(Arc::clone(&hierarchy), self.options.resolution_cache_capacity);
        let mut extractors = ValueExtractorRegistry::with_builtins(hierarchy);
        for (container_type, extractor) in self.extractors {
            extractors.register(container_type, extractor);
        }

        Ok(Validator {
            shared: Arc::new(Shared {
                metadata,
                resolver,
                extractors,
                interpolator: self.interpolator,
            }),
            options: self.options,
        })
    }
}

impl Default for ValidatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
