//! # Verity - Declarative Constraint Validation
//!
//! Verity validates object graphs against declared constraints. Constraints
//! are attached to types, properties, container elements and method
//! parameters, partitioned into groups, ordered by group sequences, and
//! followed across cascaded references.
//!
//! ## Features
//!
//! - **Groups and sequences**: run subsets of constraints, short-circuit on
//!   the first failing group, redefine `Default` per type
//! - **Cascading**: follow references and container elements, with group
//!   conversion per edge and cycle-safe traversal
//! - **Container elements**: constrain list items, map keys and map values
//!   independently
//! - **Maximal-specificity dispatch**: the most specific validator for the
//!   runtime type wins
//! - **Caching**: metadata, sequences and validator resolution are computed
//!   once and shared between threads
//!
//! ## Quick Start
//!
//! ```rust
//! use verity::prelude::*;
//!
//! let mut mapping = ConstraintMapping::new();
//! mapping
//!     .bean("Car")
//!     .property("manufacturer", |p| p.constraint(ConstraintDeclaration::new("NotNull")))
//!     .property("seatCount", |p| {
//!         p.constraint(ConstraintDeclaration::new("Min").attribute("value", 2))
//!     });
//!
//! let validator = Validator::builder().mapping(mapping).build().unwrap();
//!
//! let car = DynamicBean::new("Car").with("seatCount", 1).into_ref();
//! let violations = validator.validate(&car, &[]).unwrap();
//! assert_eq!(violations.paths(), vec!["manufacturer", "seatCount"]);
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: values, beans, the type hierarchy, paths and errors
//! - [`groups`]: group catalog and group order planning
//! - [`metadata`]: constraint declarations, configuration sources and
//!   aggregated type metadata
//! - [`validators`]: constraint definitions, built-in validators and
//!   validator resolution
//! - [`extraction`]: value extractors for container elements
//! - [`engine`]: the [`Validator`](engine::Validator) and its traversal
//!
//! ## Custom Constraints
//!
//! Register a [`ConstraintDefinition`](validators::ConstraintDefinition) with
//! one validator per accepted type:
//!
//! ```rust
//! use verity::prelude::*;
//!
//! let even = ConstraintDefinition::builder("Even")
//!     .message("must be even")
//!     .validator(ValidatorDescriptor::from_fn("even-number", "Number", |value, _| {
//!         value.as_integer().map_or(true, |n| n % 2 == 0)
//!     }))
//!     .build();
//!
//! let mut mapping = ConstraintMapping::new();
//! mapping
//!     .bean("Pair")
//!     .property("size", |p| p.constraint(ConstraintDeclaration::new("Even")));
//!
//! let validator = Validator::builder().constraint(even).mapping(mapping).build().unwrap();
//! let pair = DynamicBean::new("Pair").with("size", 3).into_ref();
//! assert_eq!(validator.validate(&pair, &[]).unwrap().messages(), vec!["must be even"]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod engine;
pub mod extraction;
pub mod groups;
pub mod metadata;
pub mod validators;

/// Prelude module for convenient imports.
///
/// Import everything commonly needed with:
/// ```rust
/// use verity::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use crate::core::types::{TypeName, TypeRef, Value};
    pub use crate::core::bean::{Bean, BeanRef, DynamicBean};
    pub use crate::core::hierarchy::TypeHierarchy;
    pub use crate::core::path::{Path, PathQualifier};

    // Errors
    pub use crate::core::error::{
        ConfigResult, ConfigurationError, ValidatorError, ValidatorFailure, VerityError, VerityResult,
    };

    // Groups
    pub use crate::groups::{GroupCatalog, GroupId};

    // Metadata
    pub use crate::metadata::{
        instance_from_json, ConstraintDeclaration, ConstraintMapping, MappingDocument, MetadataSource,
    };

    // Validators
    pub use crate::validators::{
        ConstraintDefinition, ConstraintValidator, ConstraintValidatorContext, ValidatorDescriptor,
    };

    // Extraction
    pub use crate::extraction::{ExtractedValue, ValueExtractor};

    // Engine
    pub use crate::engine::{
        AttributeInterpolator, MessageInterpolator, ValidationOptions, Validator, ValidatorBuilder, Violation,
        ViolationSet,
    };
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
        assert_eq!(super::NAME, "verity");
    }

    #[test]
    fn test_validator_from_documents() {
        let mapping = MappingDocument::from_json(
            r#"{
                "types": [{ "name": "Car" }],
                "beans": [{
                    "type": "Car",
                    "properties": [
                        { "name": "manufacturer", "constraints": [{ "kind": "NotNull" }] },
                        { "name": "licensePlate", "constraints": [
                            { "kind": "Size", "attributes": { "min": 2, "max": 14 } }
                        ] }
                    ]
                }]
            }"#,
        )
        .unwrap();
        let validator = Validator::builder().document("cars.json", &mapping).build().unwrap();

        let instance: serde_json::Value =
            serde_json::from_str(r#"{ "$type": "Car", "manufacturer": "VW", "licensePlate": "X" }"#).unwrap();
        let car = instance_from_json(&instance).unwrap();
        let car = car.as_bean().unwrap();

        let violations = validator.validate(car, &[]).unwrap();
        assert_eq!(violations.paths(), vec!["licensePlate"]);
        assert_eq!(violations.messages(), vec!["size must be between 2 and 14"]);
    }

    #[test]
    fn test_violations_serialize() {
        let mut mapping = ConstraintMapping::new();
        mapping
            .bean("Car")
            .property("manufacturer", |p| p.constraint(ConstraintDeclaration::new("NotNull")));
        let validator = Validator::builder().mapping(mapping).build().unwrap();

        let violations = validator.validate(&DynamicBean::new("Car").into_ref(), &[]).unwrap();
        let json: serde_json::Value = serde_json::from_str(&violations.to_json().unwrap()).unwrap();
        assert_eq!(json[0]["path"], "manufacturer");
        assert_eq!(json[0]["constraint"], "NotNull");
        assert_eq!(json[0]["root_type"], "Car");
    }
}
