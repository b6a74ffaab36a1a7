//! Per-call validation state.
//!
//! A [`ValidationContext`] is created for every validation call and never
//! shared: it accumulates violations and remembers which beans and
//! constraints have already been handled so that cyclic graphs terminate and
//! no constraint is evaluated twice for the same value.

use crate::core::path::Path;
use crate::engine::violation::Violation;
use crate::groups::GroupId;
use crate::metadata::descriptor::DescriptorId;
use std::collections::{HashMap, HashSet};

/// Mutable state of one validation call.
#[derive(Debug, Default)]
pub struct ValidationContext {
    fail_fast: bool,
    fail_fast_on_property: bool,
    violations: Vec<Violation>,
    processed_groups: HashSet<(usize, GroupId)>,
    processed_paths: HashMap<usize, Vec<Path>>,
    processed_constraints: HashSet<(usize, String, DescriptorId)>,
    current_root_member: Option<String>,
    failed_root_member: Option<String>,
}

impl ValidationContext {
    /// Create a context. With both flags set the per-property policy applies.
    pub fn new(fail_fast: bool, fail_fast_on_property: bool) -> Self {
        Self {
            fail_fast,
            fail_fast_on_property,
            ..Self::default()
        }
    }

    /// Whether the whole call stops at the first violation.
    pub fn is_fail_fast(&self) -> bool {
        self.fail_fast && !self.fail_fast_on_property
    }

    /// Whether traversal must unwind now.
    pub fn should_stop(&self) -> bool {
        self.is_fail_fast() && !self.violations.is_empty()
    }

    /// Record a violation. Ignored once a fail-fast call has stopped.
    pub fn add_violation(&mut self, violation: Violation) {
        if self.should_stop() {
            return;
        }
        if self.fail_fast_on_property && self.failed_root_member.is_none() {
            self.failed_root_member = Some(self.current_root_member.clone().unwrap_or_default());
        }
        self.violations.push(violation);
    }

    /// Number of violations so far.
    pub fn violation_count(&self) -> usize {
        self.violations.len()
    }

    /// Take the collected violations.
    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }

    // ------------------------------------------------------------------------
    // Fail fast on property
    // ------------------------------------------------------------------------

    /// Set the root-level member (property, parameter or `""` for the bean
    /// itself) that is currently being evaluated.
    pub fn set_current_root_member(&mut self, member: Option<String>) {
        self.current_root_member = member;
    }

    /// Root member that produced the first violation, in per-property mode.
    pub fn failed_root_member(&self) -> Option<&str> {
        self.failed_root_member.as_deref()
    }

    /// Whether a root-level member must be skipped because another member
    /// already failed in per-property mode.
    pub fn skips_root_member(&self, member: &str) -> bool {
        matches!(&self.failed_root_member, Some(failed) if failed != member)
    }

    // ------------------------------------------------------------------------
    // Processed units
    // ------------------------------------------------------------------------

    /// Whether `bean` was already validated for `group` at a path related to
    /// `path` (the root, an ancestor or a descendant).
    pub fn is_bean_already_validated(&self, bean: usize, group: &GroupId, path: &Path) -> bool {
        if !self.processed_groups.contains(&(bean, group.clone())) {
            return false;
        }
        self.processed_paths.get(&bean).is_some_and(|paths| {
            paths.iter().any(|processed| {
                processed.is_root()
                    || path.is_root()
                    || processed.is_prefix_of(path)
                    || path.is_prefix_of(processed)
            })
        })
    }

    /// Mark `bean` as validated for `group` at `path`.
    pub fn mark_processed(&mut self, bean: usize, group: &GroupId, path: &Path) {
        self.processed_groups.insert((bean, group.clone()));
        let paths = self.processed_paths.entry(bean).or_default();
        if !paths.contains(path) {
            paths.push(path.clone());
        }
    }

    /// Claim the evaluation of a constraint on the value at `path` of `bean`.
    /// Returns `false` if it was already evaluated during this call.
    pub fn claim_constraint(&mut self, bean: usize, path: &Path, descriptor: DescriptorId) -> bool {
        self.processed_constraints
            .insert((bean, path.to_string(), descriptor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_guard_path_relation() {
        let mut ctx = ValidationContext::new(false, false);
        let group = GroupId::default_group();
        let root = Path::root();
        let a = root.with_property("a");

        assert!(!ctx.is_bean_already_validated(1, &group, &a));
        ctx.mark_processed(1, &group, &a);
        assert!(ctx.is_bean_already_validated(1, &group, &a.with_property("next")));
        assert!(!ctx.is_bean_already_validated(1, &GroupId::new("Other"), &a));
        // Sibling branches are validated independently.
        assert!(!ctx.is_bean_already_validated(1, &group, &root.with_property("b")));

        ctx.mark_processed(2, &group, &root);
        assert!(ctx.is_bean_already_validated(2, &group, &root.with_property("anything")));
    }

    #[test]
    fn test_claim_constraint_once() {
        let mut ctx = ValidationContext::new(false, false);
        let path = Path::root().with_property("name");
        let id = DescriptorId::next();
        assert!(ctx.claim_constraint(7, &path, id));
        assert!(!ctx.claim_constraint(7, &path, id));
        assert!(ctx.claim_constraint(8, &path, id));
    }

    #[test]
    fn test_fail_fast_flags() {
        assert!(ValidationContext::new(true, false).is_fail_fast());
        assert!(!ValidationContext::new(true, true).is_fail_fast());
        let ctx = ValidationContext::new(false, true);
        assert!(!ctx.skips_root_member("name"));
    }
}
