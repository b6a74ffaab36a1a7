//! Property paths locating a violation relative to the validated root.
//!
//! A path is a list of nodes. Container information (type parameter, index
//! or key) lives on the node that follows the container, so a list element
//! property renders as `addresses[0].street` and a map key as
//! `fuelConsumption<K>[].<map key>`.

use crate::core::types::Value;
use serde::{Serialize, Serializer};
use std::fmt;

/// Name of the node for elements of iterables without an index.
pub const ITERABLE_ELEMENT_NODE_NAME: &str = "<iterable element>";
/// Name of the node for list elements.
pub const LIST_ELEMENT_NODE_NAME: &str = "<list element>";
/// Name of the node for map keys.
pub const MAP_KEY_NODE_NAME: &str = "<map key>";
/// Name of the node for map values.
pub const MAP_VALUE_NODE_NAME: &str = "<map value>";
/// Name of the node for a method's return value.
pub const RETURN_VALUE_NODE_NAME: &str = "<return value>";

/// What a path node designates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeKind {
    /// The bean itself (class-level constraints)
    Bean,
    /// A bean property
    Property,
    /// An element extracted from a container
    ContainerElement,
    /// A method whose parameters or return value are validated
    Method,
    /// A method parameter
    Parameter,
    /// A method return value
    ReturnValue,
}

/// How an extracted element is addressed inside its container.
#[derive(Debug, Clone, PartialEq)]
pub enum PathQualifier {
    /// Not addressable (optional content, pseudo-elements)
    None,
    /// Member of an unindexed iterable
    Iterable,
    /// Position in an indexed container
    Index(usize),
    /// Map key
    Key(Value),
}

/// A single path node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    name: Option<String>,
    kind: NodeKind,
    in_iterable: bool,
    index: Option<usize>,
    key: Option<Value>,
    type_parameter: Option<String>,
}

impl Node {
    fn new(name: Option<String>, kind: NodeKind) -> Self {
        Self {
            name,
            kind,
            in_iterable: false,
            index: None,
            key: None,
            type_parameter: None,
        }
    }

    /// Node name; unnamed nodes are not rendered.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Node kind.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Whether the node is an element of an iterable, list or map.
    pub fn is_in_iterable(&self) -> bool {
        self.in_iterable
    }

    /// Index inside an indexed container.
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// Key inside a map.
    pub fn key(&self) -> Option<&Value> {
        self.key.as_ref()
    }

    /// Type parameter displayed for multi-parameter containers.
    pub fn type_parameter(&self) -> Option<&str> {
        self.type_parameter.as_deref()
    }

    fn apply_qualifier(&mut self, qualifier: &PathQualifier) {
        match qualifier {
            PathQualifier::None => {}
            PathQualifier::Iterable => self.in_iterable = true,
            PathQualifier::Index(index) => {
                self.in_iterable = true;
                self.index = Some(*index);
            }
            PathQualifier::Key(key) => {
                self.in_iterable = true;
                self.key = Some(key.clone());
            }
        }
    }
}

/// Path from the validated root to a value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Path {
    nodes: Vec<Node>,
}

impl Path {
    /// The empty path designating the root.
    pub fn root() -> Self {
        Self::default()
    }

    /// All nodes, root first.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Check if this is the root path.
    pub fn is_root(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The last node.
    pub fn leaf(&self) -> Option<&Node> {
        self.nodes.last()
    }

    /// Add a property node. A trailing unnamed container element (left by
    /// cascading into a container) is replaced, keeping its index or key.
    pub fn add_property_node(&mut self, name: impl Into<String>) {
        if let Some(leaf) = self.nodes.last_mut() {
            if leaf.kind == NodeKind::ContainerElement && leaf.name.is_none() {
                leaf.name = Some(name.into());
                leaf.kind = NodeKind::Property;
                return;
            }
        }
        self.nodes.push(Node::new(Some(name.into()), NodeKind::Property));
    }

    /// Add a container element node.
    pub fn add_container_element_node(
        &mut self,
        name: Option<&str>,
        qualifier: &PathQualifier,
        type_parameter: Option<&str>,
    ) {
        let mut node = Node::new(name.map(str::to_string), NodeKind::ContainerElement);
        node.apply_qualifier(qualifier);
        node.type_parameter = type_parameter.map(str::to_string);
        self.nodes.push(node);
    }

    /// Add a method node.
    pub fn add_method_node(&mut self, name: impl Into<String>) {
        self.nodes.push(Node::new(Some(name.into()), NodeKind::Method));
    }

    /// Add a parameter node.
    pub fn add_parameter_node(&mut self, name: impl Into<String>) {
        self.nodes.push(Node::new(Some(name.into()), NodeKind::Parameter));
    }

    /// Add the return value node.
    pub fn add_return_value_node(&mut self) {
        self.nodes.push(Node::new(
            Some(RETURN_VALUE_NODE_NAME.to_string()),
            NodeKind::ReturnValue,
        ));
    }

    /// Clone with an extra property node.
    pub fn with_property(&self, name: &str) -> Path {
        let mut path = self.clone();
        path.add_property_node(name);
        path
    }

    /// Whether `self` is a prefix of `other` (or equal to it).
    pub fn is_prefix_of(&self, other: &Path) -> bool {
        self.nodes.len() <= other.nodes.len() && other.nodes[..self.nodes.len()] == self.nodes[..]
    }

    /// Name of the first named node.
    pub fn first_name(&self) -> Option<&str> {
        self.nodes.iter().find_map(Node::name)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut written = false;
        for node in &self.nodes {
            if let Some(parameter) = &node.type_parameter {
                write!(f, "<{}>", parameter)?;
                written = true;
            }
            if node.in_iterable {
                f.write_str("[")?;
                if let Some(index) = node.index {
                    write!(f, "{}", index)?;
                } else if let Some(key) = &node.key {
                    write!(f, "{}", key)?;
                }
                f.write_str("]")?;
                written = true;
            }
            if let Some(name) = &node.name {
                if written {
                    f.write_str(".")?;
                }
                f.write_str(name)?;
                written = true;
            }
        }
        Ok(())
    }
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ============================================================================
// Property path expressions
// ============================================================================

/// One step of a property path expression such as `addresses[0].street`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    /// Property name
    pub name: String,
    /// Optional `[index]` or `[key]` selecting an element of the property
    pub selector: Option<ElementSelector>,
}

/// Element selector inside a property path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementSelector {
    /// Numeric index
    Index(usize),
    /// Map key, compared against the key's display form
    Key(String),
}

/// Parse a property path expression.
pub fn parse_property_path(text: &str) -> Result<Vec<PathSegment>, String> {
    if text.trim().is_empty() {
        return Err("property path must not be empty".to_string());
    }

    let mut segments = Vec::new();
    for raw in text.split('.') {
        let (name, selector) = match raw.find('[') {
            Some(open) => {
                let close = raw
                    .strip_suffix(']')
                    .ok_or_else(|| format!("unclosed '[' in segment '{}'", raw))?;
                let inner = &close[open + 1..];
                let selector = match inner.parse::<usize>() {
                    Ok(index) => ElementSelector::Index(index),
                    Err(_) if !inner.is_empty() => ElementSelector::Key(inner.to_string()),
                    Err(_) => return Err(format!("empty selector in segment '{}'", raw)),
                };
                (&raw[..open], Some(selector))
            }
            None => (raw, None),
        };
        if name.is_empty() {
            return Err(format!("empty property name in '{}'", text));
        }
        segments.push(PathSegment {
            name: name.to_string(),
            selector,
        });
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_path_rendering() {
        let mut path = Path::root();
        path.add_property_node("driver");
        path.add_property_node("hasDrivingLicense");
        assert_eq!(path.to_string(), "driver.hasDrivingLicense");
    }

    #[test]
    fn test_cascaded_list_element_replaces_placeholder() {
        let mut path = Path::root();
        path.add_property_node("addresses");
        path.add_container_element_node(None, &PathQualifier::Index(0), None);
        path.add_property_node("street");
        assert_eq!(path.to_string(), "addresses[0].street");
        assert_eq!(path.nodes().len(), 2);
        assert_eq!(path.leaf().map(Node::kind), Some(NodeKind::Property));
    }

    #[test]
    fn test_map_key_and_value_rendering() {
        let mut key_path = Path::root();
        key_path.add_property_node("fuelConsumption");
        key_path.add_container_element_node(Some(MAP_KEY_NODE_NAME), &PathQualifier::Iterable, Some("K"));
        assert_eq!(key_path.to_string(), "fuelConsumption<K>[].<map key>");

        let mut value_path = Path::root();
        value_path.add_property_node("fuelConsumption");
        value_path.add_container_element_node(
            Some(MAP_VALUE_NODE_NAME),
            &PathQualifier::Key(Value::from("HIGHWAY")),
            None,
        );
        assert_eq!(value_path.to_string(), "fuelConsumption[HIGHWAY].<map value>");
    }

    #[test]
    fn test_unnamed_optional_node_not_rendered() {
        let mut path = Path::root();
        path.add_property_node("nickname");
        path.add_container_element_node(None, &PathQualifier::None, None);
        assert_eq!(path.to_string(), "nickname");
    }

    #[test]
    fn test_method_paths() {
        let mut path = Path::root();
        path.add_method_node("rent");
        let mut parameter = path.clone();
        parameter.add_parameter_node("arg0");
        assert_eq!(parameter.to_string(), "rent.arg0");
        path.add_return_value_node();
        assert_eq!(path.to_string(), "rent.<return value>");
    }

    #[test]
    fn test_prefix() {
        let a = Path::root().with_property("a");
        let ab = a.with_property("b");
        assert!(Path::root().is_prefix_of(&ab));
        assert!(a.is_prefix_of(&ab));
        assert!(!ab.is_prefix_of(&a));
    }

    #[test]
    fn test_parse_property_path() {
        let segments = parse_property_path("addresses[0].street").unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].selector, Some(ElementSelector::Index(0)));
        assert_eq!(segments[1].name, "street");

        let keyed = parse_property_path("fuel[HIGHWAY]").unwrap();
        assert_eq!(keyed[0].selector, Some(ElementSelector::Key("HIGHWAY".into())));

        assert!(parse_property_path("").is_err());
        assert!(parse_property_path("a..b").is_err());
        assert!(parse_property_path("a[0").is_err());
        assert!(parse_property_path("a[]").is_err());
    }
}
