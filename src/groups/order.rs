//! Execution order of groups for one validation call.

use crate::core::error::{ConfigResult, ConfigurationError};
use crate::groups::catalog::{GroupCatalog, GroupId};
use indexmap::IndexMap;
use std::sync::Arc;

/// A group scheduled for evaluation, remembering the sequence (if any) it
/// was expanded from.
#[derive(Debug, Clone)]
pub struct Group {
    id: GroupId,
    sequence: Option<GroupId>,
}

impl Group {
    /// A plain group.
    pub fn new(id: GroupId) -> Self {
        Self { id, sequence: None }
    }

    /// A group defined by `sequence`.
    pub fn in_sequence(id: GroupId, sequence: GroupId) -> Self {
        Self {
            id,
            sequence: Some(sequence),
        }
    }

    /// The group token.
    pub fn id(&self) -> &GroupId {
        &self.id
    }

    /// Sequence the group was expanded from.
    pub fn sequence(&self) -> Option<&GroupId> {
        self.sequence.as_ref()
    }

    /// Check if this is the `Default` group.
    pub fn is_default(&self) -> bool {
        self.id.is_default()
    }
}

// Provenance does not take part in identity.
impl PartialEq for Group {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Group {}

/// A resolved group sequence: ordered groups with nested sequences flattened.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    id: GroupId,
    groups: Vec<Group>,
}

impl Sequence {
    /// Create a resolved sequence.
    pub fn new(id: GroupId, groups: Vec<Group>) -> Self {
        Self { id, groups }
    }

    /// Sequence token.
    pub fn id(&self) -> &GroupId {
        &self.id
    }

    /// Groups in evaluation order.
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Insert, after each group, the groups it inherits that are not already
    /// part of the sequence.
    pub fn expand_inherited_groups(&mut self, catalog: &GroupCatalog) {
        let mut expanded: Vec<Group> = Vec::with_capacity(self.groups.len());
        for group in &self.groups {
            if !expanded.contains(group) {
                expanded.push(group.clone());
            }
            let mut inherited = Vec::new();
            collect_inherited(catalog, group.id(), &mut inherited);
            for id in inherited {
                let candidate = Group::in_sequence(id, self.id.clone());
                if !expanded.contains(&candidate) && !self.groups.contains(&candidate) {
                    expanded.push(candidate);
                }
            }
        }
        self.groups = expanded;
    }
}

pub(crate) fn collect_inherited(catalog: &GroupCatalog, group: &GroupId, out: &mut Vec<GroupId>) {
    for parent in catalog.extended_groups(group) {
        if !out.contains(parent) {
            out.push(parent.clone());
            collect_inherited(catalog, parent, out);
        }
    }
}

/// Plain groups plus sequences requested by one call.
#[derive(Debug, Clone, Default)]
pub struct GroupOrder {
    groups: Vec<Group>,
    sequences: IndexMap<GroupId, Arc<Sequence>>,
}

impl GroupOrder {
    /// Create an empty order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Order validating only the `Default` group.
    pub fn default_group() -> Self {
        let mut order = Self::new();
        order.insert_group(Group::new(GroupId::default_group()));
        order
    }

    /// Add a plain group unless already present.
    pub fn insert_group(&mut self, group: Group) {
        if !self.groups.contains(&group) {
            self.groups.push(group);
        }
    }

    /// Add a sequence unless already present.
    pub fn insert_sequence(&mut self, sequence: Arc<Sequence>) {
        self.sequences
            .entry(sequence.id().clone())
            .or_insert(sequence);
    }

    /// Plain groups in insertion order.
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Sequences in insertion order.
    pub fn sequences(&self) -> impl Iterator<Item = &Arc<Sequence>> {
        self.sequences.values()
    }

    /// Number of sequences.
    pub fn sequence_count(&self) -> usize {
        self.sequences.len()
    }

    /// Whether this order only validates `Default`.
    pub fn is_default_group_only(&self) -> bool {
        self.sequences.is_empty() && self.groups.len() == 1 && self.groups[0].is_default()
    }

    /// Every group of every part of the order, plain groups first, each once.
    pub fn flattened(&self) -> Vec<GroupId> {
        let mut all: Vec<GroupId> = Vec::new();
        let sequence_groups = self.sequences.values().flat_map(|s| s.groups().iter());
        for group in self.groups.iter().chain(sequence_groups) {
            if !all.contains(group.id()) {
                all.push(group.id().clone());
            }
        }
        all
    }

    /// Check that a bean's redefined default sequence can replace `Default`
    /// inside every requested sequence.
    ///
    /// For a requested sequence containing `Default` at position `d`, each
    /// group of the default sequence may only appear in it directly around
    /// that position: the first group at `d - 1`, the last group at `d + 1`.
    pub fn assert_default_group_sequence_is_expandable(
        &self,
        default_sequence: &[GroupId],
    ) -> ConfigResult<()> {
        for sequence in self.sequences.values() {
            let groups = sequence.groups();
            let Some(default_index) = groups.iter().position(Group::is_default) else {
                continue;
            };
            let members: Vec<&GroupId> = default_sequence.iter().filter(|g| !g.is_default()).collect();
            let last = members.len().saturating_sub(1);

            for (i, member) in members.iter().enumerate() {
                let Some(index) = groups.iter().position(|g| g.id() == *member) else {
                    continue;
                };
                let adjacent_before = i == 0 && index + 1 == default_index;
                let adjacent_after = i == last && index == default_index + 1;
                if !(adjacent_before || adjacent_after) {
                    return Err(ConfigurationError::IllegalSequenceComposition {
                        sequence: sequence.id().clone(),
                        reason: format!(
                            "group '{}' of the redefined default sequence {:?} is also listed at a \
                             conflicting position",
                            member, default_sequence
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<GroupId> {
        names.iter().map(|n| GroupId::new(n)).collect()
    }

    fn sequence(name: &str, members: &[&str]) -> Arc<Sequence> {
        Arc::new(Sequence::new(
            GroupId::new(name),
            members
                .iter()
                .map(|m| Group::in_sequence(GroupId::new(m), GroupId::new(name)))
                .collect(),
        ))
    }

    #[test]
    fn test_insert_deduplicates() {
        let mut order = GroupOrder::new();
        order.insert_group(Group::new("A".into()));
        order.insert_group(Group::new("A".into()));
        order.insert_sequence(sequence("S", &["A", "B"]));
        order.insert_sequence(sequence("S", &["A", "B"]));
        assert_eq!(order.groups().len(), 1);
        assert_eq!(order.sequence_count(), 1);
        assert_eq!(order.flattened(), ids(&["A", "B"]));
    }

    #[test]
    fn test_default_only() {
        assert!(GroupOrder::default_group().is_default_group_only());
        let mut order = GroupOrder::default_group();
        order.insert_group(Group::new("A".into()));
        assert!(!order.is_default_group_only());
    }

    #[test]
    fn test_expand_inherited_groups() {
        let mut catalog = GroupCatalog::new();
        catalog
            .define_group("Base", Vec::<GroupId>::new())
            .define_group("Child", ["Base"]);
        let mut seq = Sequence::new("S".into(), vec![Group::in_sequence("Child".into(), "S".into())]);
        seq.expand_inherited_groups(&catalog);
        let names: Vec<&str> = seq.groups().iter().map(|g| g.id().as_str()).collect();
        assert_eq!(names, vec!["Child", "Base"]);
        assert_eq!(seq.groups()[1].sequence(), Some(&GroupId::new("S")));
    }

    #[test]
    fn test_default_sequence_expandable() {
        let mut order = GroupOrder::new();
        order.insert_sequence(sequence("S", &["A", "Default", "B"]));

        // A directly before Default and B directly after are fine.
        assert!(order
            .assert_default_group_sequence_is_expandable(&ids(&["A", "Car", "B"]))
            .is_ok());
        // Groups not mentioned by S are fine.
        assert!(order
            .assert_default_group_sequence_is_expandable(&ids(&["Car", "X"]))
            .is_ok());
        // B as the first default member would have to run before A.
        assert!(matches!(
            order.assert_default_group_sequence_is_expandable(&ids(&["B", "Car"])),
            Err(ConfigurationError::IllegalSequenceComposition { .. })
        ));
    }
}
