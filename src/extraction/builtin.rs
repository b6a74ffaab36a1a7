//! Extractors for the built-in container types.

use crate::core::path::{
    PathQualifier, ITERABLE_ELEMENT_NODE_NAME, LIST_ELEMENT_NODE_NAME, MAP_KEY_NODE_NAME, MAP_VALUE_NODE_NAME,
};
use crate::core::types::Value;
use crate::extraction::registry::{ExtractedValue, ValueExtractor};

/// Type argument index of map keys.
pub const MAP_KEY_TYPE_ARGUMENT: usize = 0;
/// Type argument index of map values.
pub const MAP_VALUE_TYPE_ARGUMENT: usize = 1;

/// Elements of a list, qualified by index.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListValueExtractor;

impl ValueExtractor for ListValueExtractor {
    fn extract(&self, container: &Value, _type_argument: Option<usize>) -> Vec<ExtractedValue> {
        match container {
            Value::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    ExtractedValue::new(Some(LIST_ELEMENT_NODE_NAME), PathQualifier::Index(i), item.clone())
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Elements of a set, marked as iterable without index.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetValueExtractor;

impl ValueExtractor for SetValueExtractor {
    fn extract(&self, container: &Value, _type_argument: Option<usize>) -> Vec<ExtractedValue> {
        match container {
            Value::Set(items) => items
                .iter()
                .map(|item| {
                    ExtractedValue::new(Some(ITERABLE_ELEMENT_NODE_NAME), PathQualifier::Iterable, item.clone())
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Keys (type argument 0) or values (type argument 1) of a map; both per
/// entry when no type argument is given.
#[derive(Debug, Clone, Copy, Default)]
pub struct MapValueExtractor;

impl MapValueExtractor {
    fn key(key: &Value) -> ExtractedValue {
        ExtractedValue::new(Some(MAP_KEY_NODE_NAME), PathQualifier::Iterable, key.clone()).with_type_parameter("K")
    }

    fn value(key: &Value, value: &Value) -> ExtractedValue {
        ExtractedValue::new(Some(MAP_VALUE_NODE_NAME), PathQualifier::Key(key.clone()), value.clone())
    }
}

impl ValueExtractor for MapValueExtractor {
    fn extract(&self, container: &Value, type_argument: Option<usize>) -> Vec<ExtractedValue> {
        let Value::Map(entries) = container else {
            return Vec::new();
        };
        match type_argument {
            Some(MAP_KEY_TYPE_ARGUMENT) => entries.iter().map(|(k, _)| Self::key(k)).collect(),
            Some(MAP_VALUE_TYPE_ARGUMENT) => entries.iter().map(|(k, v)| Self::value(k, v)).collect(),
            Some(_) => Vec::new(),
            None => entries
                .iter()
                .flat_map(|(k, v)| [Self::key(k), Self::value(k, v)])
                .collect(),
        }
    }
}

/// Content of an optional, unnamed and unqualified.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptionalValueExtractor;

impl ValueExtractor for OptionalValueExtractor {
    fn extract(&self, container: &Value, _type_argument: Option<usize>) -> Vec<ExtractedValue> {
        match container {
            Value::Optional(Some(inner)) => {
                vec![ExtractedValue::new(None, PathQualifier::None, (**inner).clone())]
            }
            _ => Vec::new(),
        }
    }
}

/// Array items, qualified by index.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrayValueExtractor;

impl ValueExtractor for ArrayValueExtractor {
    fn extract(&self, container: &Value, _type_argument: Option<usize>) -> Vec<ExtractedValue> {
        match container {
            Value::Array { items, .. } => items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    ExtractedValue::new(Some(ITERABLE_ELEMENT_NODE_NAME), PathQualifier::Index(i), item.clone())
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_elements_indexed() {
        let list = Value::list([Value::from("a"), Value::from("b")]);
        let elements = ListValueExtractor.extract(&list, Some(0));
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[1].qualifier, PathQualifier::Index(1));
        assert_eq!(elements[1].node_name.as_deref(), Some(LIST_ELEMENT_NODE_NAME));
    }

    #[test]
    fn test_map_keys_and_values() {
        let map = Value::map([(Value::from("HIGHWAY"), Value::from(-1))]);
        let keys = MapValueExtractor.extract(&map, Some(MAP_KEY_TYPE_ARGUMENT));
        assert_eq!(keys[0].type_parameter.as_deref(), Some("K"));
        assert_eq!(keys[0].qualifier, PathQualifier::Iterable);
        assert_eq!(keys[0].value, Value::from("HIGHWAY"));

        let values = MapValueExtractor.extract(&map, Some(MAP_VALUE_TYPE_ARGUMENT));
        assert_eq!(values[0].qualifier, PathQualifier::Key(Value::from("HIGHWAY")));
        assert_eq!(values[0].value, Value::from(-1));

        assert_eq!(MapValueExtractor.extract(&map, None).len(), 2);
        assert!(MapValueExtractor.extract(&map, Some(5)).is_empty());
    }

    #[test]
    fn test_optional_and_set() {
        let present = Value::optional(Some(Value::from(3)));
        let extracted = OptionalValueExtractor.extract(&present, Some(0));
        assert_eq!(extracted.len(), 1);
        assert!(extracted[0].node_name.is_none());
        assert!(OptionalValueExtractor.extract(&Value::optional(None), Some(0)).is_empty());

        let set = Value::Set(vec![Value::from(1)]);
        assert_eq!(SetValueExtractor.extract(&set, None)[0].qualifier, PathQualifier::Iterable);
    }
}
