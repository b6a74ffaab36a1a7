//! Groups, group sequences and their execution order.
//!
//! - [`GroupCatalog`]: every group and sequence that may be referenced
//! - [`GroupOrderPlanner`]: expands requested groups into a [`GroupOrder`]
//! - [`GroupOrder`]: plain groups plus flattened sequences for one call

pub mod catalog;
pub mod order;
pub mod planner;

pub use catalog::{GroupCatalog, GroupDefinition, GroupId, DEFAULT_GROUP};
pub use order::{Group, GroupOrder, Sequence};
pub use planner::GroupOrderPlanner;
