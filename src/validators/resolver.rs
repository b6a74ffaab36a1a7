//! Maximal-specificity validator resolution.
//!
//! Among the validators registered for a constraint kind, the compatible
//! ones are those whose accepted type the value's runtime type is assignable
//! to. The most specific compatible validator wins; no compatible validator
//! or several equally specific ones are configuration errors. Results are
//! cached per `(kind, type)` in a bounded LRU cache.

use crate::core::error::{ConfigResult, ConfigurationError};
use crate::core::hierarchy::TypeHierarchy;
use crate::core::types::TypeRef;
use crate::metadata::descriptor::ConstraintKind;
use crate::validators::registry::ValidatorDescriptor;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Default number of cached resolutions.
pub const DEFAULT_RESOLUTION_CACHE_CAPACITY: usize = 1024;

/// Resolution cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolverStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
}

impl ResolverStats {
    /// Calculate hit ratio.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}

struct ResolverState {
    cache: LruCache<(ConstraintKind, TypeRef), ValidatorDescriptor>,
    stats: ResolverStats,
}

/// Picks the validator implementation for a constraint and a value type.
pub struct ValidatorResolver {
    hierarchy: Arc<TypeHierarchy>,
    state: Mutex<ResolverState>,
}

impl ValidatorResolver {
    /// Create a resolver with the default cache capacity.
    pub fn new(hierarchy: Arc<TypeHierarchy>) -> Self {
        Self::with_capacity(hierarchy, DEFAULT_RESOLUTION_CACHE_CAPACITY)
    }

    /// Create a resolver caching at most `capacity` resolutions.
    pub fn with_capacity(hierarchy: Arc<TypeHierarchy>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            hierarchy,
            state: Mutex::new(ResolverState {
                cache: LruCache::new(capacity),
                stats: ResolverStats::default(),
            }),
        }
    }

    /// Resolve the validator of `kind` for values of `value_type`.
    pub fn resolve(
        &self,
        kind: &ConstraintKind,
        value_type: &TypeRef,
        candidates: &[ValidatorDescriptor],
    ) -> ConfigResult<ValidatorDescriptor> {
        let key = (kind.clone(), value_type.boxed());
        {
            let mut state = self.state.lock();
            if let Some(hit) = state.cache.get(&key).cloned() {
                state.stats.hits += 1;
                return Ok(hit);
            }
            state.stats.misses += 1;
        }

        let resolved = self.resolve_uncached(kind, value_type, candidates)?;
        log::trace!(
            "resolved validator '{}' for constraint {} on {}",
            resolved.id(),
            kind,
            value_type
        );
        self.state.lock().cache.put(key, resolved.clone());
        Ok(resolved)
    }

    fn resolve_uncached(
        &self,
        kind: &ConstraintKind,
        value_type: &TypeRef,
        candidates: &[ValidatorDescriptor],
    ) -> ConfigResult<ValidatorDescriptor> {
        let compatible: Vec<&ValidatorDescriptor> = candidates
            .iter()
            .filter(|c| self.hierarchy.is_assignable(value_type, c.accepts()))
            .collect();
        let accepted: Vec<&TypeRef> = compatible.iter().map(|c| c.accepts()).collect();
        let maximal = self.hierarchy.most_specific(&accepted);

        match maximal.as_slice() {
            [] => Err(ConfigurationError::NoValidatorFound {
                constraint: kind.clone(),
                value_type: value_type.clone(),
            }),
            [single] => Ok(compatible[*single].clone()),
            several => Err(ConfigurationError::AmbiguousValidator {
                constraint: kind.clone(),
                value_type: value_type.clone(),
                candidates: several.iter().map(|&i| compatible[i].id().to_string()).collect(),
            }),
        }
    }

    /// Get cache statistics.
    pub fn stats(&self) -> ResolverStats {
        self.state.lock().stats
    }

    /// Number of cached resolutions.
    pub fn cached(&self) -> usize {
        self.state.lock().cache.len()
    }

    /// Clear the cache.
    pub fn clear(&self) {
        self.state.lock().cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::registry::ConstraintValidatorRegistry;

    fn resolver() -> ValidatorResolver {
        let mut hierarchy = TypeHierarchy::with_builtins();
        hierarchy.declare_interface("Named", &[]);
        ValidatorResolver::new(Arc::new(hierarchy))
    }

    fn validator(id: &str, accepts: &str) -> ValidatorDescriptor {
        ValidatorDescriptor::from_fn(id, accepts, |_, _| true)
    }

    #[test]
    fn test_most_specific_wins() {
        let r = resolver();
        let candidates = vec![
            validator("object", "Object"),
            validator("number", "Number"),
            validator("long", "Long"),
        ];
        let kind = ConstraintKind::new("Check");
        assert_eq!(r.resolve(&kind, &"Long".into(), &candidates).unwrap().id(), "long");
        assert_eq!(r.resolve(&kind, &"Double".into(), &candidates).unwrap().id(), "number");
        assert_eq!(r.resolve(&kind, &"String".into(), &candidates).unwrap().id(), "object");
    }

    #[test]
    fn test_no_validator_found() {
        let r = resolver();
        let registry = ConstraintValidatorRegistry::with_builtins();
        let kind = ConstraintKind::new("Size");
        let err = r
            .resolve(&kind, &"Long".into(), registry.candidates(&kind))
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::NoValidatorFound { .. }));
    }

    #[test]
    fn test_ambiguous_validator() {
        let r = resolver();
        let candidates = vec![validator("number", "Number"), validator("comparable", "Comparable")];
        let err = r
            .resolve(&"Check".into(), &"Long".into(), &candidates)
            .unwrap_err();
        match err {
            ConfigurationError::AmbiguousValidator { candidates, .. } => {
                assert_eq!(candidates, vec!["number", "comparable"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_builtin_size_resolution() {
        let r = resolver();
        let registry = ConstraintValidatorRegistry::with_builtins();
        let kind = ConstraintKind::new("Size");
        let candidates = registry.candidates(&kind);
        assert_eq!(r.resolve(&kind, &"String".into(), candidates).unwrap().id(), "size-charsequence");
        assert_eq!(r.resolve(&kind, &"List".into(), candidates).unwrap().id(), "size-collection");
        assert_eq!(r.resolve(&kind, &"Long[]".into(), candidates).unwrap().id(), "size-object-array");
        assert_eq!(r.resolve(&kind, &"long[]".into(), candidates).unwrap().id(), "size-long-array");
    }

    #[test]
    fn test_cache_and_stats() {
        let r = resolver();
        let candidates = vec![validator("object", "Object")];
        let kind = ConstraintKind::new("Check");
        r.resolve(&kind, &"long".into(), &candidates).unwrap();
        r.resolve(&kind, &"Long".into(), &candidates).unwrap();
        assert_eq!(r.stats(), ResolverStats { hits: 1, misses: 1 });
        assert_eq!(r.cached(), 1);
        assert!((r.stats().hit_ratio() - 0.5).abs() < f64::EPSILON);
        r.clear();
        assert_eq!(r.cached(), 0);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let r = resolver();
        let candidates = vec![validator("a", "Object"), validator("b", "CharSequence")];
        let kind = ConstraintKind::new("Check");
        let first = r.resolve(&kind, &"String".into(), &candidates).unwrap();
        r.clear();
        let second = r.resolve(&kind, &"String".into(), &candidates).unwrap();
        assert_eq!(first.id(), second.id());
    }
}
