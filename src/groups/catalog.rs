//! Group tokens and the catalog of declared groups and sequences.

use crate::core::types::TypeName;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Name of the built-in default group.
pub const DEFAULT_GROUP: &str = "Default";

/// Token naming a group, a group sequence or (inside a default group
/// sequence) a bean type.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(Arc<str>);

impl GroupId {
    /// Create a group token.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// The built-in `Default` group.
    pub fn default_group() -> Self {
        Self::new(DEFAULT_GROUP)
    }

    /// The token standing for a type's own constraints.
    pub fn for_type(type_name: &TypeName) -> Self {
        Self::new(type_name.as_str())
    }

    /// Check if this is the `Default` group.
    pub fn is_default(&self) -> bool {
        &*self.0 == DEFAULT_GROUP
    }

    /// The token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<&GroupId> for GroupId {
    fn from(group: &GroupId) -> Self {
        group.clone()
    }
}

/// What a group token is declared as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupDefinition {
    /// Plain group, inheriting the listed groups
    Group {
        /// Inherited groups
        extends: Vec<GroupId>,
    },
    /// Ordered sequence of groups or sequences
    Sequence {
        /// Members in evaluation order
        members: Vec<GroupId>,
    },
}

/// Catalog of every group and sequence that may be requested or referenced.
#[derive(Debug, Clone)]
pub struct GroupCatalog {
    definitions: IndexMap<GroupId, GroupDefinition>,
}

impl GroupCatalog {
    /// Create a catalog holding only the `Default` group.
    pub fn new() -> Self {
        let mut definitions = IndexMap::new();
        definitions.insert(
            GroupId::default_group(),
            GroupDefinition::Group { extends: Vec::new() },
        );
        Self { definitions }
    }

    /// Declare a plain group.
    pub fn define_group<I, G>(&mut self, name: impl Into<GroupId>, extends: I) -> &mut Self
    where
        I: IntoIterator<Item = G>,
        G: Into<GroupId>,
    {
        self.definitions.insert(
            name.into(),
            GroupDefinition::Group {
                extends: extends.into_iter().map(Into::into).collect(),
            },
        );
        self
    }

    /// Declare a group sequence.
    pub fn define_sequence<I, G>(&mut self, name: impl Into<GroupId>, members: I) -> &mut Self
    where
        I: IntoIterator<Item = G>,
        G: Into<GroupId>,
    {
        self.definitions.insert(
            name.into(),
            GroupDefinition::Sequence {
                members: members.into_iter().map(Into::into).collect(),
            },
        );
        self
    }

    /// Whether the token is a declared group or sequence.
    pub fn is_group_marker(&self, group: &GroupId) -> bool {
        self.definitions.contains_key(group)
    }

    /// Definition of a token.
    pub fn definition(&self, group: &GroupId) -> Option<&GroupDefinition> {
        self.definitions.get(group)
    }

    /// Members of a sequence, `None` for plain groups and unknown tokens.
    pub fn sequence_members(&self, group: &GroupId) -> Option<&[GroupId]> {
        match self.definitions.get(group) {
            Some(GroupDefinition::Sequence { members }) => Some(members),
            _ => None,
        }
    }

    /// Directly inherited groups of a plain group.
    pub fn extended_groups(&self, group: &GroupId) -> &[GroupId] {
        match self.definitions.get(group) {
            Some(GroupDefinition::Group { extends }) => extends,
            _ => &[],
        }
    }

    /// All declared tokens.
    pub fn groups(&self) -> impl Iterator<Item = &GroupId> {
        self.definitions.keys()
    }
}

impl Default for GroupCatalog {
    fn default() -> Self {
        Self::new()
    }
}
