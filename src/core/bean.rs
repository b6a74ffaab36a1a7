//! The bean abstraction: a typed object whose properties can be read by name.
//!
//! The traversal never inspects a bean other than through [`Bean`]; identity
//! is the address of the shared allocation, so two equal-looking beans are
//! still distinct nodes of the graph.

use crate::core::types::{TypeName, Value};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// An object participating in validation.
pub trait Bean: Send + Sync + fmt::Debug {
    /// The runtime type of this bean.
    fn bean_type(&self) -> TypeName;

    /// Read a property. `None` means the bean has no such property, which the
    /// engine treats like a null value.
    fn property(&self, name: &str) -> Option<Value>;
}

/// Shared reference to a bean.
pub type BeanRef = Arc<dyn Bean>;

/// Identity of a bean (address of its allocation).
pub fn bean_identity(bean: &BeanRef) -> usize {
    Arc::as_ptr(bean) as *const () as usize
}

/// A bean backed by a property map.
///
/// Properties can be set after construction, which is what allows building
/// cyclic graphs:
///
/// ```rust
/// use std::sync::Arc;
/// use verity::core::{bean::DynamicBean, types::Value};
///
/// let node = Arc::new(DynamicBean::new("Node"));
/// node.set("next", Value::Bean(node.clone()));
/// ```
pub struct DynamicBean {
    bean_type: TypeName,
    properties: RwLock<IndexMap<String, Value>>,
}

impl DynamicBean {
    /// Create an empty bean of the given type.
    pub fn new(bean_type: impl Into<TypeName>) -> Self {
        Self {
            bean_type: bean_type.into(),
            properties: RwLock::new(IndexMap::new()),
        }
    }

    /// Builder-style property setter.
    pub fn with(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.write().insert(name.into(), value.into());
        self
    }

    /// Set (or replace) a property.
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.properties.write().insert(name.into(), value.into());
    }

    /// Names of all properties, in insertion order.
    pub fn property_names(&self) -> Vec<String> {
        self.properties.read().keys().cloned().collect()
    }

    /// Wrap into a shared [`BeanRef`].
    pub fn into_ref(self) -> BeanRef {
        Arc::new(self)
    }
}

impl Bean for DynamicBean {
    fn bean_type(&self) -> TypeName {
        self.bean_type.clone()
    }

    fn property(&self, name: &str) -> Option<Value> {
        self.properties.read().get(name).cloned()
    }
}

impl fmt::Debug for DynamicBean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Property values may point back at this bean.
        f.debug_struct("DynamicBean")
            .field("type", &self.bean_type)
            .field("properties", &self.property_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dynamic_bean_properties() {
        let car = DynamicBean::new("Car").with("seats", 2).with("plate", "DD-AB-123");
        assert_eq!(car.property("seats"), Some(Value::Integer(2)));
        assert_eq!(car.property("missing"), None);
        assert_eq!(car.property_names(), vec!["seats", "plate"]);
    }

    #[test]
    fn test_cyclic_graph_identity() {
        let node = Arc::new(DynamicBean::new("Node"));
        node.set("next", Value::Bean(node.clone()));
        let as_ref: BeanRef = node.clone();
        let next = node.property("next").unwrap();
        assert_eq!(next.identity(), Some(bean_identity(&as_ref)));
        // Debug must not recurse through the cycle.
        assert!(format!("{:?}", node).contains("Node"));
    }
}
