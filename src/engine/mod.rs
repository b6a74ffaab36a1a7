//! The validation engine.
//!
//! - [`validator`]: the [`Validator`] entry point and its builder
//! - [`violation`]: violations returned as data
//! - [`interpolation`]: message templates
//!
//! Constraint trees and graph traversal are internal.

mod constraint_tree;
pub mod interpolation;
mod traversal;
pub mod validator;
pub mod violation;

pub use interpolation::{AttributeInterpolator, MessageInterpolator};
pub use validator::{ValidationOptions, Validator, ValidatorBuilder};
pub use violation::{Violation, ViolationSet};
