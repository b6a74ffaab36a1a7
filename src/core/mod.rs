//! Core types and traits for Verity.
//!
//! This module contains the fundamental building blocks:
//! - [`Value`](types::Value): Values of a validated object graph
//! - [`Bean`](bean::Bean): Trait through which beans are inspected
//! - [`TypeHierarchy`](hierarchy::TypeHierarchy): Supertypes and assignability
//! - [`Path`](path::Path): Location of a value relative to the root
//! - [`ValidationContext`](context::ValidationContext): Per-call state
//! - [`error`]: Error types

pub mod bean;
pub mod context;
pub mod error;
pub mod hierarchy;
pub mod path;
pub mod types;

pub use bean::{bean_identity, Bean, BeanRef, DynamicBean};
pub use context::ValidationContext;
pub use error::{ConfigResult, ConfigurationError, ValidatorError, ValidatorFailure, VerityError, VerityResult};
pub use hierarchy::{TypeHierarchy, TypeKind};
pub use path::{Node, NodeKind, Path, PathQualifier};
pub use types::{value_from_json, well_known, TypeName, TypeRef, Value};
