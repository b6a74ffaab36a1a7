//! Core value types that flow through a validated object graph.
//!
//! The value model uses an enum-based approach:
//! - Closed set of shapes: scalars, the four container kinds, arrays and beans
//! - Every non-null value reports a runtime [`TypeRef`] used for validator
//!   and extractor resolution
//! - Beans are shared by reference, so identity (not equality) is what the
//!   traversal tracks

use crate::core::bean::{bean_identity, BeanRef};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// Well-known type names registered by [`TypeHierarchy::with_builtins`](crate::core::hierarchy::TypeHierarchy::with_builtins).
pub mod well_known {
    /// Root of every class hierarchy.
    pub const OBJECT: &str = "Object";
    /// Boxed 64-bit integer; runtime type of [`Value::Integer`](super::Value::Integer).
    pub const LONG: &str = "Long";
    /// Boxed 32-bit integer.
    pub const INTEGER: &str = "Integer";
    /// Boxed 16-bit integer.
    pub const SHORT: &str = "Short";
    /// Boxed 8-bit integer.
    pub const BYTE: &str = "Byte";
    /// Boxed double; runtime type of [`Value::Float`](super::Value::Float).
    pub const DOUBLE: &str = "Double";
    /// Boxed float.
    pub const FLOAT: &str = "Float";
    /// Boxed character.
    pub const CHARACTER: &str = "Character";
    /// Boxed boolean.
    pub const BOOLEAN: &str = "Boolean";
    /// Abstract numeric supertype.
    pub const NUMBER: &str = "Number";
    /// String class.
    pub const STRING: &str = "String";
    /// Character sequence interface.
    pub const CHAR_SEQUENCE: &str = "CharSequence";
    /// Marker interface.
    pub const SERIALIZABLE: &str = "Serializable";
    /// Ordering interface.
    pub const COMPARABLE: &str = "Comparable";
    /// Iterable interface.
    pub const ITERABLE: &str = "Iterable";
    /// Collection interface.
    pub const COLLECTION: &str = "Collection";
    /// List interface.
    pub const LIST: &str = "List";
    /// Set interface.
    pub const SET: &str = "Set";
    /// Map interface.
    pub const MAP: &str = "Map";
    /// Optional container.
    pub const OPTIONAL: &str = "Optional";
}

// ============================================================================
// Type tokens
// ============================================================================

/// Interned name of a type (class, interface or primitive).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeName(Arc<str>);

impl TypeName {
    /// Create a type name.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this names a primitive (`int`, `long`, `boolean`, ...).
    pub fn is_primitive(&self) -> bool {
        boxed_name(&self.0).is_some()
    }

    /// The boxed counterpart of a primitive name, or the name itself.
    pub fn boxed(&self) -> TypeName {
        match boxed_name(&self.0) {
            Some(boxed) => TypeName::new(boxed),
            None => self.clone(),
        }
    }
}

fn boxed_name(name: &str) -> Option<&'static str> {
    Some(match name {
        "boolean" => well_known::BOOLEAN,
        "byte" => well_known::BYTE,
        "short" => well_known::SHORT,
        "int" => well_known::INTEGER,
        "long" => well_known::LONG,
        "float" => well_known::FLOAT,
        "double" => well_known::DOUBLE,
        "char" => well_known::CHARACTER,
        _ => return None,
    })
}

impl fmt::Debug for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TypeName {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl AsRef<str> for TypeName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Reference to a type: a named type or an array of some component type.
///
/// Serialized as a string, with `[]` suffixes for arrays (`"Long[]"`).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TypeRef {
    /// A class, interface or primitive.
    Named(TypeName),
    /// An array with the given component type.
    Array(Box<TypeRef>),
}

impl TypeRef {
    /// Reference a named type.
    pub fn named(name: impl Into<TypeName>) -> Self {
        TypeRef::Named(name.into())
    }

    /// Reference an array of `component`.
    pub fn array_of(component: TypeRef) -> Self {
        TypeRef::Array(Box::new(component))
    }

    /// Parse `"Foo"`, `"Foo[]"`, `"int[][]"`.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        match text.strip_suffix("[]") {
            Some(component) => TypeRef::array_of(TypeRef::parse(component)),
            None => TypeRef::named(text),
        }
    }

    /// `Object`.
    pub fn object() -> Self {
        TypeRef::named(well_known::OBJECT)
    }

    /// The name for `Named` references.
    pub fn name(&self) -> Option<&TypeName> {
        match self {
            TypeRef::Named(name) => Some(name),
            TypeRef::Array(_) => None,
        }
    }

    /// Whether this is an array type.
    pub fn is_array(&self) -> bool {
        matches!(self, TypeRef::Array(_))
    }

    /// Whether this is a named primitive.
    pub fn is_primitive(&self) -> bool {
        matches!(self, TypeRef::Named(name) if name.is_primitive())
    }

    /// Primitive names are replaced by their boxed counterparts; array
    /// components are left untouched (`int[]` is not `Integer[]`).
    pub fn boxed(&self) -> TypeRef {
        match self {
            TypeRef::Named(name) => TypeRef::Named(name.boxed()),
            TypeRef::Array(_) => self.clone(),
        }
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named(name) => write!(f, "{}", name),
            TypeRef::Array(component) => write!(f, "{}[]", component),
        }
    }
}

impl From<String> for TypeRef {
    fn from(text: String) -> Self {
        TypeRef::parse(&text)
    }
}

impl From<TypeRef> for String {
    fn from(type_ref: TypeRef) -> Self {
        type_ref.to_string()
    }
}

impl From<&str> for TypeRef {
    fn from(text: &str) -> Self {
        TypeRef::parse(text)
    }
}

impl From<TypeName> for TypeRef {
    fn from(name: TypeName) -> Self {
        TypeRef::Named(name)
    }
}

// ============================================================================
// Values
// ============================================================================

/// A value in a validated object graph.
#[derive(Debug, Clone)]
pub enum Value {
    /// Absence of a value
    Null,
    /// Boolean value
    Boolean(bool),
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit floating point number
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Ordered, indexed container
    List(Vec<Value>),
    /// Unindexed container
    Set(Vec<Value>),
    /// Ordered key/value entries
    Map(Vec<(Value, Value)>),
    /// Optional container holding zero or one value
    Optional(Option<Box<Value>>),
    /// Typed array
    Array {
        /// Component type of the array
        element_type: TypeRef,
        /// Array items
        items: Vec<Value>,
    },
    /// Reference to a bean
    Bean(BeanRef),
}

impl Value {
    /// Runtime type of a non-null value.
    pub fn runtime_type(&self) -> Option<TypeRef> {
        Some(match self {
            Value::Null => return None,
            Value::Boolean(_) => TypeRef::named(well_known::BOOLEAN),
            Value::Integer(_) => TypeRef::named(well_known::LONG),
            Value::Float(_) => TypeRef::named(well_known::DOUBLE),
            Value::String(_) => TypeRef::named(well_known::STRING),
            Value::List(_) => TypeRef::named(well_known::LIST),
            Value::Set(_) => TypeRef::named(well_known::SET),
            Value::Map(_) => TypeRef::named(well_known::MAP),
            Value::Optional(_) => TypeRef::named(well_known::OPTIONAL),
            Value::Array { element_type, .. } => TypeRef::array_of(element_type.clone()),
            Value::Bean(bean) => TypeRef::Named(bean.bean_type()),
        })
    }

    /// Check for null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as an integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get as a float; integers widen.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as a bean reference.
    pub fn as_bean(&self) -> Option<&BeanRef> {
        match self {
            Value::Bean(bean) => Some(bean),
            _ => None,
        }
    }

    /// Identity of a referenced bean.
    pub fn identity(&self) -> Option<usize> {
        self.as_bean().map(bean_identity)
    }

    /// Element count for strings (in characters) and containers.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::String(s) => Some(s.chars().count()),
            Value::List(items) | Value::Set(items) | Value::Array { items, .. } => Some(items.len()),
            Value::Map(entries) => Some(entries.len()),
            Value::Optional(inner) => Some(usize::from(inner.is_some())),
            _ => None,
        }
    }

    /// Whether [`len`](Self::len) is zero.
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Build a list.
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(items.into_iter().collect())
    }

    /// Build a map from entries.
    pub fn map(entries: impl IntoIterator<Item = (Value, Value)>) -> Self {
        Value::Map(entries.into_iter().collect())
    }

    /// Build an optional.
    pub fn optional(inner: Option<Value>) -> Self {
        Value::Optional(inner.map(Box::new))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) | (Value::Set(a), Value::Set(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Optional(a), Value::Optional(b)) => a == b,
            (
                Value::Array { element_type: ta, items: a },
                Value::Array { element_type: tb, items: b },
            ) => ta == tb && a == b,
            (Value::Bean(a), Value::Bean(b)) => bean_identity(a) == bean_identity(b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{}", s),
            Value::List(items) | Value::Set(items) | Value::Array { items, .. } => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}={}", key, value)?;
                }
                write!(f, "}}")
            }
            Value::Optional(Some(inner)) => write!(f, "Optional[{}]", inner),
            Value::Optional(None) => write!(f, "Optional.empty"),
            Value::Bean(bean) => write!(f, "{}@{:x}", bean.bean_type(), bean_identity(bean)),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::String(s) => serializer.serialize_str(s),
            Value::List(items) | Value::Set(items) | Value::Array { items, .. } => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(&key.to_string(), value)?;
                }
                map.end()
            }
            Value::Optional(inner) => match inner {
                Some(value) => value.serialize(serializer),
                None => serializer.serialize_unit(),
            },
            // Beans may be cyclic; only the type is emitted.
            Value::Bean(bean) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$type", bean.bean_type().as_str())?;
                map.end()
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<BeanRef> for Value {
    fn from(bean: BeanRef) -> Self {
        Value::Bean(bean)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Convert a JSON value into a [`Value`]; objects become maps.
pub fn value_from_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => Value::List(items.iter().map(value_from_json).collect()),
        serde_json::Value::Object(fields) => Value::Map(
            fields
                .iter()
                .map(|(k, v)| (Value::String(k.clone()), value_from_json(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bean::DynamicBean;

    #[test]
    fn test_type_ref_parse_and_display() {
        let t = TypeRef::parse("Long[][]");
        assert_eq!(t, TypeRef::array_of(TypeRef::array_of(TypeRef::named("Long"))));
        assert_eq!(t.to_string(), "Long[][]");
        assert_eq!(TypeRef::parse("Car").name().map(TypeName::as_str), Some("Car"));
    }

    #[test]
    fn test_primitive_boxing() {
        assert_eq!(TypeRef::named("long").boxed(), TypeRef::named("Long"));
        assert_eq!(TypeRef::named("Car").boxed(), TypeRef::named("Car"));
        let int_array = TypeRef::parse("int[]");
        assert_eq!(int_array.boxed(), int_array);
    }

    #[test]
    fn test_runtime_types() {
        assert_eq!(Value::from(3).runtime_type(), Some(TypeRef::named("Long")));
        assert_eq!(Value::from("x").runtime_type(), Some(TypeRef::named("String")));
        assert_eq!(Value::Null.runtime_type(), None);
        let bean = DynamicBean::new("Car").into_ref();
        assert_eq!(Value::Bean(bean).runtime_type(), Some(TypeRef::named("Car")));
    }

    #[test]
    fn test_bean_equality_is_identity() {
        let a = DynamicBean::new("Car").into_ref();
        let b = DynamicBean::new("Car").into_ref();
        assert_eq!(Value::Bean(a.clone()), Value::Bean(a));
        assert_ne!(Value::Bean(b), Value::Bean(DynamicBean::new("Car").into_ref()));
    }

    #[test]
    fn test_len() {
        assert_eq!(Value::from("héllo").len(), Some(5));
        assert_eq!(Value::list([Value::Null, Value::Null]).len(), Some(2));
        assert!(Value::map([]).is_empty());
        assert_eq!(Value::from(1).len(), None);
    }

    #[test]
    fn test_type_ref_serde() {
        let json = serde_json::to_string(&TypeRef::parse("String[]")).unwrap();
        assert_eq!(json, "\"String[]\"");
        let back: TypeRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TypeRef::parse("String[]"));
    }
}
