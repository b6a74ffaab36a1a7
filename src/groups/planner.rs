//! Group order planning.
//!
//! Turns the groups requested by a call into a [`GroupOrder`]: plain groups
//! are scheduled together with the groups they inherit, sequences are
//! expanded depth-first into flat, duplicate-free group lists. Cycles and
//! ill-formed compositions are rejected. Resolved sequences are cached per
//! sequence token since the catalog never changes after construction.

use crate::core::error::{ConfigResult, ConfigurationError};
use crate::core::types::TypeName;
use crate::groups::catalog::{GroupCatalog, GroupId};
use crate::groups::order::{collect_inherited, Group, GroupOrder, Sequence};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Plans group execution orders.
pub struct GroupOrderPlanner {
    catalog: Arc<GroupCatalog>,
    resolved: RwLock<HashMap<GroupId, Arc<Sequence>>>,
}

impl GroupOrderPlanner {
    /// Create a planner over a catalog.
    pub fn new(catalog: Arc<GroupCatalog>) -> Self {
        Self {
            catalog,
            resolved: RwLock::new(HashMap::new()),
        }
    }

    /// The catalog of known groups.
    pub fn catalog(&self) -> &GroupCatalog {
        &self.catalog
    }

    /// Plan the order for the requested groups.
    pub fn plan(&self, requested: &[GroupId]) -> ConfigResult<GroupOrder> {
        if requested.is_empty() {
            return Err(ConfigurationError::EmptyGroupSet);
        }
        if requested.len() == 1 && requested[0].is_default() {
            return Ok(GroupOrder::default_group());
        }

        for group in requested {
            if !self.catalog.is_group_marker(group) {
                return Err(ConfigurationError::NotAGroupMarker {
                    group: group.clone(),
                });
            }
        }

        let mut order = GroupOrder::new();
        for group in requested {
            if group.is_default() {
                order.insert_group(Group::new(group.clone()));
            } else if self.catalog.sequence_members(group).is_some() {
                order.insert_sequence(self.resolve_sequence(group)?);
            } else {
                order.insert_group(Group::new(group.clone()));
                let mut inherited = Vec::new();
                collect_inherited(&self.catalog, group, &mut inherited);
                for parent in inherited {
                    order.insert_group(Group::new(parent));
                }
            }
        }
        Ok(order)
    }

    /// Order for a single group reached through group conversion. Without
    /// `expand` the group is scheduled on its own.
    pub fn plan_single(&self, group: &GroupId, expand: bool) -> ConfigResult<GroupOrder> {
        if group.is_default() {
            return Ok(GroupOrder::default_group());
        }
        if expand {
            return self.plan(std::slice::from_ref(group));
        }
        let mut order = GroupOrder::new();
        order.insert_group(Group::new(group.clone()));
        Ok(order)
    }

    /// Validate and expand the default group sequence of `type_name`.
    ///
    /// The sequence must name the type itself and must not name `Default`.
    /// The result is not cached because providers may return a different
    /// sequence per instance.
    pub fn default_order(&self, type_name: &TypeName, members: &[GroupId]) -> ConfigResult<GroupOrder> {
        let own = GroupId::for_type(type_name);
        let invalid = |reason: &str| ConfigurationError::InvalidDefaultGroupSequence {
            type_name: type_name.clone(),
            reason: reason.to_string(),
        };

        if members.is_empty() {
            return Err(invalid("the sequence is empty"));
        }
        if members.iter().any(GroupId::is_default) {
            return Err(invalid("'Default' cannot be part of a default group sequence"));
        }
        if !members.contains(&own) {
            return Err(invalid("the sequence must contain the type itself"));
        }

        let mut stack = Vec::new();
        let mut sequence = self.expand(&own, members, Some(&own), &mut stack)?;
        sequence.expand_inherited_groups(&self.catalog);

        let mut order = GroupOrder::new();
        order.insert_sequence(Arc::new(sequence));
        Ok(order)
    }

    /// Resolve a declared sequence, using the cache.
    pub fn resolve_sequence(&self, id: &GroupId) -> ConfigResult<Arc<Sequence>> {
        if let Some(cached) = self.resolved.read().get(id) {
            return Ok(Arc::clone(cached));
        }

        let members = self
            .catalog
            .sequence_members(id)
            .ok_or_else(|| ConfigurationError::NotAGroupMarker { group: id.clone() })?;
        let mut stack = Vec::new();
        let mut sequence = self.expand(id, members, None, &mut stack)?;
        sequence.expand_inherited_groups(&self.catalog);
        log::debug!(
            "resolved group sequence {} -> {:?}",
            id,
            sequence.groups().iter().map(Group::id).collect::<Vec<_>>()
        );

        let mut cache = self.resolved.write();
        Ok(Arc::clone(cache.entry(id.clone()).or_insert_with(|| Arc::new(sequence))))
    }

    /// Number of cached sequences.
    pub fn cached_sequences(&self) -> usize {
        self.resolved.read().len()
    }

    fn expand(
        &self,
        id: &GroupId,
        members: &[GroupId],
        own_type: Option<&GroupId>,
        stack: &mut Vec<GroupId>,
    ) -> ConfigResult<Sequence> {
        if stack.contains(id) {
            let mut cycle = stack.clone();
            cycle.push(id.clone());
            return Err(ConfigurationError::CyclicSequence {
                sequence: id.clone(),
                cycle,
            });
        }
        stack.push(id.clone());

        let mut resolved: Vec<Group> = Vec::new();
        for member in members {
            if Some(member) == own_type {
                add_groups(id, &mut resolved, [Group::in_sequence(member.clone(), id.clone())])?;
                continue;
            }
            if !self.catalog.is_group_marker(member) {
                return Err(ConfigurationError::NotAGroupMarker {
                    group: member.clone(),
                });
            }
            match self.catalog.sequence_members(member) {
                Some(nested_members) => {
                    let nested = self.expand(member, nested_members, own_type, stack)?;
                    add_groups(id, &mut resolved, nested.groups().iter().cloned())?;
                }
                None => {
                    add_groups(id, &mut resolved, [Group::in_sequence(member.clone(), id.clone())])?;
                }
            }
        }

        stack.pop();
        Ok(Sequence::new(id.clone(), resolved))
    }
}

/// Append groups, tolerating a repeat of the last element only.
fn add_groups(
    sequence: &GroupId,
    resolved: &mut Vec<Group>,
    groups: impl IntoIterator<Item = Group>,
) -> ConfigResult<()> {
    for group in groups {
        match resolved.iter().position(|g| *g == group) {
            Some(index) if index + 1 < resolved.len() => {
                return Err(ConfigurationError::IllegalSequenceComposition {
                    sequence: sequence.clone(),
                    reason: format!("group '{}' is listed twice in the expansion", group.id()),
                });
            }
            Some(_) => {}
            None => resolved.push(group),
        }
    }
    Ok(())
}
