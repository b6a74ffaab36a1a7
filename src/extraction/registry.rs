//! Registry of value extractors, chosen by maximal specificity.

use crate::core::error::{ConfigResult, ConfigurationError};
use crate::core::hierarchy::TypeHierarchy;
use crate::core::path::PathQualifier;
use crate::core::types::{well_known, TypeRef, Value};
use crate::extraction::builtin::{
    ArrayValueExtractor, ListValueExtractor, MapValueExtractor, OptionalValueExtractor, SetValueExtractor,
};
use indexmap::IndexMap;
use std::sync::Arc;

/// One element pulled out of a container.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedValue {
    /// Name of the container element node (`<list element>`, ...)
    pub node_name: Option<String>,
    /// How the element is addressed in its container
    pub qualifier: PathQualifier,
    /// Type parameter to display in the path
    pub type_parameter: Option<String>,
    /// The element itself
    pub value: Value,
}

impl ExtractedValue {
    /// Create an extracted element.
    pub fn new(node_name: Option<&str>, qualifier: PathQualifier, value: Value) -> Self {
        Self {
            node_name: node_name.map(str::to_string),
            qualifier,
            type_parameter: None,
            value,
        }
    }

    /// Set the displayed type parameter.
    pub fn with_type_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.type_parameter = Some(parameter.into());
        self
    }

    /// A non-container value standing for itself.
    pub fn pseudo(value: &Value) -> Self {
        Self::new(None, PathQualifier::None, value.clone())
    }
}

/// Pulls the elements out of a container value.
pub trait ValueExtractor: Send + Sync {
    /// Extract the elements for `type_argument`; `None` asks for every
    /// element (used when cascading into a container as a whole).
    fn extract(&self, container: &Value, type_argument: Option<usize>) -> Vec<ExtractedValue>;
}

impl<E: ValueExtractor + ?Sized> ValueExtractor for Arc<E> {
    fn extract(&self, container: &Value, type_argument: Option<usize>) -> Vec<ExtractedValue> {
        (**self).extract(container, type_argument)
    }
}

/// Extractors registered per container type.
pub struct ValueExtractorRegistry {
    hierarchy: Arc<TypeHierarchy>,
    extractors: IndexMap<TypeRef, Arc<dyn ValueExtractor>>,
}

impl ValueExtractorRegistry {
    /// Create an empty registry.
    pub fn new(hierarchy: Arc<TypeHierarchy>) -> Self {
        Self {
            hierarchy,
            extractors: IndexMap::new(),
        }
    }

    /// Create a registry with extractors for lists, sets, maps, optionals
    /// and arrays.
    pub fn with_builtins(hierarchy: Arc<TypeHierarchy>) -> Self {
        let mut registry = Self::new(hierarchy);
        registry.register(well_known::LIST, ListValueExtractor);
        registry.register(well_known::SET, SetValueExtractor);
        registry.register(well_known::MAP, MapValueExtractor);
        registry.register(well_known::OPTIONAL, OptionalValueExtractor);
        for array in ["Object[]", "boolean[]", "byte[]", "short[]", "int[]", "long[]", "float[]", "double[]", "char[]"] {
            registry.register(array, ArrayValueExtractor);
        }
        registry
    }

    /// Register (or replace) the extractor for a container type.
    pub fn register<E>(&mut self, container_type: impl Into<TypeRef>, extractor: E)
    where
        E: ValueExtractor + 'static,
    {
        self.extractors.insert(container_type.into(), Arc::new(extractor));
    }

    /// Most specific extractor for a container type, if any.
    pub fn resolve(&self, container_type: &TypeRef) -> ConfigResult<Option<Arc<dyn ValueExtractor>>> {
        let compatible: Vec<(&TypeRef, &Arc<dyn ValueExtractor>)> = self
            .extractors
            .iter()
            .filter(|(accepted, _)| self.hierarchy.is_assignable(container_type, accepted))
            .collect();
        let accepted: Vec<&TypeRef> = compatible.iter().map(|(t, _)| *t).collect();

        match self.hierarchy.most_specific(&accepted).as_slice() {
            [] => Ok(None),
            [single] => Ok(Some(Arc::clone(compatible[*single].1))),
            several => Err(ConfigurationError::AmbiguousValueExtractor {
                container_type: container_type.clone(),
                candidates: several.iter().map(|&i| compatible[i].0.clone()).collect(),
            }),
        }
    }

    /// Extract the elements of `value`. Null yields nothing; a value without
    /// a matching extractor yields itself as a single pseudo-element.
    pub fn extract(&self, value: &Value, type_argument: Option<usize>) -> ConfigResult<Vec<ExtractedValue>> {
        let Some(runtime_type) = value.runtime_type() else {
            return Ok(Vec::new());
        };
        Ok(match self.resolve(&runtime_type)? {
            Some(extractor) => extractor.extract(value, type_argument),
            None => vec![ExtractedValue::pseudo(value)],
        })
    }

    /// Number of registered extractors.
    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }
}
