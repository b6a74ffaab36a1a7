//! JSON mapping documents and instance documents.
//!
//! A [`MappingDocument`] declares types, groups and bean constraints in one
//! file:
//!
//! ```json
//! {
//!   "types":  [{ "name": "RentalCar", "superclass": "Car" }],
//!   "groups": [{ "name": "CarChecks" },
//!              { "name": "Complete", "sequence": ["Default", "CarChecks"] }],
//!   "beans":  [{ "type": "Car",
//!                "properties": [{ "name": "manufacturer",
//!                                 "constraints": [{ "kind": "NotNull" }] }] }]
//! }
//! ```
//!
//! Instance documents are plain JSON where objects carrying `"$type"` become
//! beans; see [`instance_from_json`].

use crate::core::bean::{BeanRef, DynamicBean};
use crate::core::error::{ConfigResult, VerityError, VerityResult};
use crate::core::hierarchy::TypeHierarchy;
use crate::core::types::{value_from_json, TypeName, TypeRef, Value};
use crate::groups::{GroupCatalog, GroupId};
use crate::metadata::config::{
    CascadingConfiguration, ContainerElementConfiguration, ElementConfiguration, ExecutableConfiguration,
    MetadataSource, TypeConfiguration,
};
use crate::metadata::descriptor::ConstraintDeclaration;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

// ============================================================================
// Document model
// ============================================================================

/// Class or interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKindDocument {
    /// A class
    #[default]
    Class,
    /// An interface
    Interface,
}

/// A declared type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDocument {
    /// Type name
    pub name: String,
    /// Class or interface
    #[serde(default)]
    pub kind: TypeKindDocument,
    /// Superclass of a class (defaults to `Object`)
    #[serde(default)]
    pub superclass: Option<String>,
    /// Implemented (or, for interfaces, extended) interfaces
    #[serde(default)]
    pub interfaces: Vec<String>,
}

/// A group or group sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupDocument {
    /// Group token
    pub name: String,
    /// Inherited groups of a plain group
    #[serde(default)]
    pub extends: Vec<String>,
    /// Members, if this is a sequence
    #[serde(default)]
    pub sequence: Option<Vec<String>>,
}

/// A constraint declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintDocument {
    /// Constraint kind
    pub kind: String,
    /// Attribute overrides
    #[serde(default)]
    pub attributes: IndexMap<String, serde_json::Value>,
    /// Groups (empty means `Default`)
    #[serde(default)]
    pub groups: Vec<String>,
    /// Payload markers
    #[serde(default)]
    pub payload: Vec<String>,
    /// Message template override
    #[serde(default)]
    pub message: Option<String>,
}

impl ConstraintDocument {
    fn to_declaration(&self) -> ConstraintDeclaration {
        let mut declaration = ConstraintDeclaration::new(self.kind.as_str()).groups(self.groups.iter().map(String::as_str));
        for (name, value) in &self.attributes {
            declaration = declaration.attribute(name.clone(), value_from_json(value));
        }
        for payload in &self.payload {
            declaration = declaration.payload(payload.clone());
        }
        if let Some(message) = &self.message {
            declaration = declaration.message(message.clone());
        }
        declaration
    }
}

/// A `from -> to` group conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionDocument {
    /// Group requested on the owning bean
    pub from: String,
    /// Group used for the cascaded value
    pub to: String,
}

/// A property, parameter, return value or container element.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementDocument {
    /// Property or parameter name
    pub name: String,
    /// Declared type
    #[serde(rename = "type")]
    pub declared_type: Option<String>,
    /// Constraints
    pub constraints: Vec<ConstraintDocument>,
    /// Cascaded validation
    pub valid: bool,
    /// Group conversions
    pub convert_groups: Vec<ConversionDocument>,
    /// Container elements by type argument
    pub container_elements: Vec<ContainerElementDocument>,
}

impl ElementDocument {
    fn cascading(&self) -> CascadingConfiguration {
        CascadingConfiguration {
            cascade: self.valid,
            group_conversions: self
                .convert_groups
                .iter()
                .map(|c| (GroupId::new(&c.from), GroupId::new(&c.to)))
                .collect(),
            container_elements: self
                .container_elements
                .iter()
                .map(|c| ContainerElementConfiguration {
                    type_argument: c.type_argument,
                    constraints: c.element.constraints.iter().map(ConstraintDocument::to_declaration).collect(),
                    cascading: c.element.cascading(),
                })
                .collect(),
        }
    }

    fn to_element(&self, name: &str) -> ElementConfiguration {
        ElementConfiguration {
            name: name.to_string(),
            declared_type: self.declared_type.as_deref().map(TypeRef::parse),
            constraints: self.constraints.iter().map(ConstraintDocument::to_declaration).collect(),
            cascading: self.cascading(),
        }
    }
}

/// Constraints on one type argument of a container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerElementDocument {
    /// Type argument index
    #[serde(default)]
    pub type_argument: usize,
    /// Element configuration
    #[serde(flatten)]
    pub element: ElementDocument,
}

/// A method parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterDocument {
    /// Parameter position
    pub index: usize,
    /// Element configuration; the name defaults to `arg{index}`
    #[serde(flatten)]
    pub element: ElementDocument,
}

/// A constrained method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodDocument {
    /// Method name
    pub name: String,
    /// Number of parameters (defaults to the highest configured index + 1)
    #[serde(default)]
    pub parameter_count: Option<usize>,
    /// Parameters
    #[serde(default)]
    pub parameters: Vec<ParameterDocument>,
    /// Return value
    #[serde(default)]
    pub return_value: Option<ElementDocument>,
}

/// Constraints of one bean type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeanDocument {
    /// Bean type
    #[serde(rename = "type")]
    pub type_name: String,
    /// Class-level constraints
    #[serde(default)]
    pub constraints: Vec<ConstraintDocument>,
    /// Properties
    #[serde(default)]
    pub properties: Vec<ElementDocument>,
    /// Methods
    #[serde(default)]
    pub methods: Vec<MethodDocument>,
    /// Redefined default group sequence
    #[serde(default)]
    pub default_group_sequence: Option<Vec<String>>,
}

impl BeanDocument {
    fn to_configuration(&self) -> TypeConfiguration {
        TypeConfiguration {
            class_constraints: self.constraints.iter().map(ConstraintDocument::to_declaration).collect(),
            properties: self.properties.iter().map(|p| p.to_element(&p.name)).collect(),
            executables: self.methods.iter().map(MethodDocument::to_configuration).collect(),
            default_group_sequence: self
                .default_group_sequence
                .as_ref()
                .map(|groups| groups.iter().map(GroupId::new).collect()),
            default_group_sequence_provider: None,
        }
    }
}

impl MethodDocument {
    fn to_configuration(&self) -> ExecutableConfiguration {
        let parameters: Vec<(usize, ElementConfiguration)> = self
            .parameters
            .iter()
            .map(|p| {
                let name = if p.element.name.is_empty() {
                    format!("arg{}", p.index)
                } else {
                    p.element.name.clone()
                };
                (p.index, p.element.to_element(&name))
            })
            .collect();
        let inferred = parameters.iter().map(|(i, _)| i + 1).max().unwrap_or(0);
        ExecutableConfiguration {
            name: self.name.clone(),
            parameter_count: self.parameter_count.unwrap_or(inferred),
            parameters,
            return_value: self
                .return_value
                .as_ref()
                .map(|r| r.to_element(crate::core::path::RETURN_VALUE_NODE_NAME)),
        }
    }
}

/// A complete mapping document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingDocument {
    /// Document format version
    #[serde(default = "MappingDocument::default_version")]
    pub version: String,
    /// Declared types
    #[serde(default)]
    pub types: Vec<TypeDocument>,
    /// Declared groups and sequences
    #[serde(default)]
    pub groups: Vec<GroupDocument>,
    /// Bean constraints
    #[serde(default)]
    pub beans: Vec<BeanDocument>,
}

impl MappingDocument {
    /// Current format version.
    pub const VERSION: &'static str = "1.0.0";

    fn default_version() -> String {
        Self::VERSION.to_string()
    }

    /// Create an empty document.
    pub fn new() -> Self {
        Self {
            version: Self::default_version(),
            types: Vec::new(),
            groups: Vec::new(),
            beans: Vec::new(),
        }
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load a document from a file.
    pub fn from_path(path: impl AsRef<Path>) -> VerityResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&text)?)
    }

    /// Declare the document's types in a hierarchy.
    pub fn apply_types(&self, hierarchy: &mut TypeHierarchy) {
        for declared in &self.types {
            let interfaces: Vec<&str> = declared.interfaces.iter().map(String::as_str).collect();
            match declared.kind {
                TypeKindDocument::Class => {
                    hierarchy.declare_class(declared.name.as_str(), declared.superclass.as_deref(), &interfaces);
                }
                TypeKindDocument::Interface => {
                    hierarchy.declare_interface(declared.name.as_str(), &interfaces);
                }
            }
        }
    }

    /// Declare the document's groups and sequences in a catalog.
    pub fn apply_groups(&self, catalog: &mut GroupCatalog) {
        for group in &self.groups {
            match &group.sequence {
                Some(members) => {
                    catalog.define_sequence(group.name.as_str(), members.iter().map(String::as_str));
                }
                None => {
                    catalog.define_group(group.name.as_str(), group.extends.iter().map(String::as_str));
                }
            }
        }
    }
}

impl Default for MappingDocument {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Metadata source
// ============================================================================

/// [`MetadataSource`] over the bean section of a [`MappingDocument`].
#[derive(Debug, Clone)]
pub struct DocumentSource {
    name: String,
    types: IndexMap<TypeName, Vec<TypeConfiguration>>,
}

impl DocumentSource {
    /// Create a source from a document.
    pub fn new(name: impl Into<String>, document: &MappingDocument) -> Self {
        let mut types: IndexMap<TypeName, Vec<TypeConfiguration>> = IndexMap::new();
        for bean in &document.beans {
            types
                .entry(TypeName::new(&bean.type_name))
                .or_default()
                .push(bean.to_configuration());
        }
        Self {
            name: name.into(),
            types,
        }
    }
}

impl MetadataSource for DocumentSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn configuration_for(&self, type_name: &TypeName) -> ConfigResult<Option<TypeConfiguration>> {
        let Some(entries) = self.types.get(type_name) else {
            return Ok(None);
        };
        let mut merged = TypeConfiguration::default();
        for entry in entries {
            merged.class_constraints.extend(entry.class_constraints.iter().cloned());
            merged.properties.extend(entry.properties.iter().cloned());
            merged.executables.extend(entry.executables.iter().cloned());
            if merged.default_group_sequence.is_none() {
                merged.default_group_sequence = entry.default_group_sequence.clone();
            }
        }
        Ok(Some(merged))
    }

    fn declared_types(&self) -> Vec<TypeName> {
        self.types.keys().cloned().collect()
    }
}

// ============================================================================
// Instance documents
// ============================================================================

/// Build a value graph from JSON.
///
/// - `{"$type": "Car", ...}` becomes a [`DynamicBean`]; an optional `"$id"`
///   names it so that `{"$ref": "<id>"}` can point back to it (cycles).
/// - `{"$set": [...]}`, `{"$optional": x}` and
///   `{"$array": "String", "items": [...]}` build sets, optionals and arrays.
/// - Other objects become maps with string keys; arrays become lists.
pub fn instance_from_json(json: &serde_json::Value) -> VerityResult<Value> {
    let mut beans: HashMap<String, BeanRef> = HashMap::new();
    convert(json, &mut beans)
}

fn convert(json: &serde_json::Value, beans: &mut HashMap<String, BeanRef>) -> VerityResult<Value> {
    match json {
        serde_json::Value::Array(items) => Ok(Value::List(
            items
                .iter()
                .map(|item| convert(item, beans))
                .collect::<VerityResult<_>>()?,
        )),
        serde_json::Value::Object(fields) => {
            if let Some(reference) = fields.get("$ref") {
                let id = reference
                    .as_str()
                    .ok_or_else(|| VerityError::Instance("'$ref' must be a string".to_string()))?;
                return beans
                    .get(id)
                    .map(|bean| Value::Bean(Arc::clone(bean)))
                    .ok_or_else(|| VerityError::Instance(format!("unknown bean reference '{}'", id)));
            }
            if let Some(bean_type) = fields.get("$type") {
                let bean_type = bean_type
                    .as_str()
                    .ok_or_else(|| VerityError::Instance("'$type' must be a string".to_string()))?;
                let bean = Arc::new(DynamicBean::new(bean_type));
                if let Some(id) = fields.get("$id").and_then(serde_json::Value::as_str) {
                    beans.insert(id.to_string(), bean.clone());
                }
                for (name, value) in fields.iter().filter(|(name, _)| !name.starts_with('$')) {
                    bean.set(name.clone(), convert(value, beans)?);
                }
                return Ok(Value::Bean(bean));
            }
            if let Some(items) = fields.get("$set") {
                return match convert(items, beans)? {
                    Value::List(items) => Ok(Value::Set(items)),
                    _ => Err(VerityError::Instance("'$set' must be an array".to_string())),
                };
            }
            if let Some(inner) = fields.get("$optional") {
                let inner = convert(inner, beans)?;
                return Ok(Value::optional((!inner.is_null()).then_some(inner)));
            }
            if let Some(element_type) = fields.get("$array") {
                let element_type = element_type
                    .as_str()
                    .ok_or_else(|| VerityError::Instance("'$array' must name the element type".to_string()))?;
                let items = match fields.get("items") {
                    Some(items) => match convert(items, beans)? {
                        Value::List(items) => items,
                        _ => return Err(VerityError::Instance("'items' must be an array".to_string())),
                    },
                    None => Vec::new(),
                };
                return Ok(Value::Array {
                    element_type: TypeRef::parse(element_type),
                    items,
                });
            }
            let mut entries = Vec::with_capacity(fields.len());
            for (key, value) in fields {
                entries.push((Value::String(key.clone()), convert(value, beans)?));
            }
            Ok(Value::Map(entries))
        }
        scalar => Ok(value_from_json(scalar)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bean::bean_identity;
    use std::io::Write;

    const CAR_MAPPING: &str = r#"{
        "types": [
            { "name": "Car" },
            { "name": "RentalCar", "superclass": "Car", "interfaces": ["Auditable"] },
            { "name": "Auditable", "kind": "interface" }
        ],
        "groups": [
            { "name": "CarChecks" },
            { "name": "Complete", "sequence": ["Default", "CarChecks"] }
        ],
        "beans": [
            {
                "type": "Car",
                "properties": [
                    { "name": "manufacturer", "type": "String",
                      "constraints": [{ "kind": "NotNull" }] },
                    { "name": "seatCount",
                      "constraints": [{ "kind": "Min", "attributes": { "value": 2 } }] },
                    { "name": "passedVehicleInspection",
                      "constraints": [{ "kind": "AssertTrue", "groups": ["CarChecks"],
                                        "message": "The car has to pass the vehicle inspection first" }] },
                    { "name": "fuelConsumption",
                      "container_elements": [
                          { "type_argument": 1, "constraints": [{ "kind": "Positive" }] }
                      ] }
                ],
                "methods": [
                    { "name": "drive",
                      "parameters": [{ "index": 1, "constraints": [{ "kind": "Max", "attributes": { "value": 75 } }] }] }
                ]
            }
        ]
    }"#;

    #[test]
    fn test_parse_and_apply() {
        let document = MappingDocument::from_json(CAR_MAPPING).unwrap();
        assert_eq!(document.version, MappingDocument::VERSION);

        let mut hierarchy = TypeHierarchy::with_builtins();
        document.apply_types(&mut hierarchy);
        assert!(hierarchy.is_subtype(&"RentalCar".into(), &"Auditable".into()));
        assert!(hierarchy.is_subtype(&"RentalCar".into(), &"Car".into()));

        let mut catalog = GroupCatalog::new();
        document.apply_groups(&mut catalog);
        assert_eq!(catalog.sequence_members(&GroupId::new("Complete")).map(|m| m.len()), Some(2));
        assert!(catalog.is_group_marker(&GroupId::new("CarChecks")));
    }

    #[test]
    fn test_document_source() {
        let document = MappingDocument::from_json(CAR_MAPPING).unwrap();
        let source = DocumentSource::new("cars.json", &document);
        assert_eq!(source.name(), "cars.json");
        assert_eq!(source.declared_types(), vec![TypeName::from("Car")]);

        let config = source.configuration_for(&"Car".into()).unwrap().unwrap();
        assert_eq!(config.properties.len(), 4);
        assert_eq!(config.properties[0].declared_type, Some(TypeRef::named("String")));
        assert_eq!(config.properties[2].constraints[0].declared_groups(), &[GroupId::new("CarChecks")]);
        assert_eq!(config.properties[3].cascading.container_elements[0].type_argument, 1);

        let drive = &config.executables[0];
        assert_eq!(drive.parameter_count, 2);
        assert_eq!(drive.parameters[0].1.name, "arg1");
        assert!(source.configuration_for(&"Truck".into()).unwrap().is_none());
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CAR_MAPPING.as_bytes()).unwrap();
        let document = MappingDocument::from_path(file.path()).unwrap();
        assert_eq!(document.beans.len(), 1);

        let roundtrip = MappingDocument::from_json(&document.to_json().unwrap()).unwrap();
        assert_eq!(roundtrip.types.len(), 3);
    }

    #[test]
    fn test_from_path_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(MappingDocument::from_path(&missing), Err(VerityError::Io(_))));

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{ not json").unwrap();
        assert!(matches!(MappingDocument::from_path(&broken), Err(VerityError::Document(_))));
    }

    #[test]
    fn test_instance_with_cycle() {
        let json = serde_json::json!({
            "$type": "Person", "$id": "alice", "name": "Alice",
            "friend": { "$type": "Person", "name": "Bob", "friend": { "$ref": "alice" } },
            "tags": { "$set": ["a", "b"] },
            "nickname": { "$optional": null },
            "scores": { "$array": "int", "items": [1, 2] },
            "mileage": { "HIGHWAY": 7 }
        });
        let root = instance_from_json(&json).unwrap();
        let alice = root.as_bean().unwrap();
        let bob = alice.property("friend").unwrap();
        let back = bob.as_bean().unwrap().property("friend").unwrap();
        assert_eq!(bean_identity(back.as_bean().unwrap()), bean_identity(alice));

        assert!(matches!(alice.property("tags"), Some(Value::Set(items)) if items.len() == 2));
        assert_eq!(alice.property("nickname"), Some(Value::Optional(None)));
        assert_eq!(
            alice.property("scores").and_then(|v| v.runtime_type()),
            Some(TypeRef::parse("int[]"))
        );
        assert_eq!(
            alice.property("mileage"),
            Some(Value::map([(Value::from("HIGHWAY"), Value::from(7))]))
        );
    }

    #[test]
    fn test_instance_unknown_reference() {
        let json = serde_json::json!({ "$type": "Person", "friend": { "$ref": "nobody" } });
        assert!(matches!(instance_from_json(&json), Err(VerityError::Instance(_))));
    }
}
