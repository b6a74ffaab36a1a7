//! Type hierarchy: declared supertypes, linearised hierarchies and
//! assignability.
//!
//! Every type reachable from a bean must be declared here (or be one of the
//! built-ins). Unknown named types are treated as classes directly below
//! `Object`. The linearised hierarchy of a type is computed once and cached.

use crate::core::types::{well_known, TypeName, TypeRef};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Whether a declared type is a class or an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// Concrete or abstract class with at most one superclass
    Class,
    /// Interface, possibly extending several interfaces
    Interface,
}

#[derive(Debug, Clone)]
struct TypeDeclaration {
    kind: TypeKind,
    superclass: Option<TypeName>,
    interfaces: Vec<TypeName>,
}

/// Registry of declared types.
#[derive(Debug, Default)]
pub struct TypeHierarchy {
    declarations: HashMap<TypeName, TypeDeclaration>,
    linearized: RwLock<HashMap<TypeName, Arc<[TypeName]>>>,
}

impl TypeHierarchy {
    /// Create an empty hierarchy (only `Object` is implied).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a hierarchy with the built-in value and container types.
    pub fn with_builtins() -> Self {
        use well_known::*;

        let mut hierarchy = Self::new();
        for interface in [SERIALIZABLE, COMPARABLE, CHAR_SEQUENCE, ITERABLE, MAP] {
            hierarchy.declare_interface(interface, &[]);
        }
        hierarchy
            .declare_interface(COLLECTION, &[ITERABLE])
            .declare_interface(LIST, &[COLLECTION])
            .declare_interface(SET, &[COLLECTION])
            .declare_class(NUMBER, Some(OBJECT), &[SERIALIZABLE])
            .declare_class(STRING, Some(OBJECT), &[CHAR_SEQUENCE, COMPARABLE, SERIALIZABLE])
            .declare_class(BOOLEAN, Some(OBJECT), &[COMPARABLE, SERIALIZABLE])
            .declare_class(CHARACTER, Some(OBJECT), &[COMPARABLE, SERIALIZABLE])
            .declare_class(OPTIONAL, Some(OBJECT), &[]);
        for number in [LONG, INTEGER, SHORT, BYTE, DOUBLE, FLOAT] {
            hierarchy.declare_class(number, Some(NUMBER), &[COMPARABLE]);
        }
        hierarchy
    }

    /// Declare a class. A missing superclass means `Object`.
    pub fn declare_class(
        &mut self,
        name: impl Into<TypeName>,
        superclass: Option<&str>,
        interfaces: &[&str],
    ) -> &mut Self {
        let name = name.into();
        let superclass = if name.as_str() == well_known::OBJECT {
            None
        } else {
            Some(TypeName::new(superclass.unwrap_or(well_known::OBJECT)))
        };
        self.insert(
            name,
            TypeDeclaration {
                kind: TypeKind::Class,
                superclass,
                interfaces: interfaces.iter().map(|i| TypeName::new(i)).collect(),
            },
        )
    }

    /// Declare an interface extending the given interfaces.
    pub fn declare_interface(&mut self, name: impl Into<TypeName>, extends: &[&str]) -> &mut Self {
        self.insert(
            name.into(),
            TypeDeclaration {
                kind: TypeKind::Interface,
                superclass: None,
                interfaces: extends.iter().map(|i| TypeName::new(i)).collect(),
            },
        )
    }

    fn insert(&mut self, name: TypeName, declaration: TypeDeclaration) -> &mut Self {
        self.declarations.insert(name, declaration);
        self.linearized.get_mut().clear();
        self
    }

    /// Whether the type has been declared.
    pub fn is_declared(&self, name: &TypeName) -> bool {
        name.as_str() == well_known::OBJECT || self.declarations.contains_key(name)
    }

    /// Kind of a type; undeclared types are classes.
    pub fn kind(&self, name: &TypeName) -> TypeKind {
        self.declarations
            .get(name)
            .map(|d| d.kind)
            .unwrap_or(TypeKind::Class)
    }

    /// Number of declared types.
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    /// Check if no types have been declared.
    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Linearised hierarchy of `name`, most specific first: the type, its
    /// interfaces (depth first), then its superclass chain in the same
    /// manner. `Object` always comes last.
    pub fn supertypes(&self, name: &TypeName) -> Arc<[TypeName]> {
        if let Some(cached) = self.linearized.read().get(name) {
            return Arc::clone(cached);
        }

        let mut order = Vec::new();
        self.linearize(name, &mut order);
        let object = TypeName::new(well_known::OBJECT);
        order.retain(|t| *t != object);
        order.push(object);
        let computed: Arc<[TypeName]> = order.into();

        let mut cache = self.linearized.write();
        Arc::clone(cache.entry(name.clone()).or_insert(computed))
    }

    fn linearize(&self, name: &TypeName, order: &mut Vec<TypeName>) {
        if order.contains(name) {
            return;
        }
        order.push(name.clone());
        if let Some(declaration) = self.declarations.get(name) {
            for interface in &declaration.interfaces {
                self.linearize(interface, order);
            }
            if let Some(superclass) = &declaration.superclass {
                self.linearize(superclass, order);
            }
        }
    }

    /// Whether `sub` is `sup` or one of its subtypes.
    pub fn is_subtype(&self, sub: &TypeName, sup: &TypeName) -> bool {
        sub == sup || self.supertypes(sub).contains(sup)
    }

    /// Whether a value of type `from` can be used where `to` is expected.
    pub fn is_assignable(&self, from: &TypeRef, to: &TypeRef) -> bool {
        match (from.boxed(), to.boxed()) {
            (TypeRef::Named(from), TypeRef::Named(to)) => self.is_subtype(&from, &to),
            (TypeRef::Array(from), TypeRef::Array(to)) => {
                if from.is_primitive() || to.is_primitive() {
                    from == to
                } else {
                    self.is_assignable(&from, &to)
                }
            }
            (TypeRef::Array(_), TypeRef::Named(to)) => {
                to.as_str() == well_known::OBJECT || to.as_str() == well_known::SERIALIZABLE
            }
            (TypeRef::Named(_), TypeRef::Array(_)) => false,
        }
    }

    /// Indices of the maximally specific entries of `candidates`: those that
    /// are not a strict supertype of another candidate.
    pub fn most_specific(&self, candidates: &[&TypeRef]) -> Vec<usize> {
        (0..candidates.len())
            .filter(|&i| {
                !candidates.iter().enumerate().any(|(j, other)| {
                    j != i
                        && candidates[i] != *other
                        && self.is_assignable(other, candidates[i])
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[TypeName]) -> Vec<&str> {
        list.iter().map(TypeName::as_str).collect()
    }

    #[test]
    fn test_linearized_hierarchy() {
        let mut h = TypeHierarchy::with_builtins();
        h.declare_interface("Vehicle", &[])
            .declare_class("Car", None, &["Vehicle"])
            .declare_class("RentalCar", Some("Car"), &["Serializable"]);

        let supertypes = h.supertypes(&TypeName::new("RentalCar"));
        assert_eq!(
            names(&supertypes),
            vec!["RentalCar", "Serializable", "Car", "Vehicle", "Object"]
        );
    }

    #[test]
    fn test_supertypes_cached_and_invalidated() {
        let mut h = TypeHierarchy::new();
        h.declare_class("A", None, &[]);
        let first = h.supertypes(&TypeName::new("A"));
        let second = h.supertypes(&TypeName::new("A"));
        assert!(Arc::ptr_eq(&first, &second));

        h.declare_interface("I", &[]).declare_class("A", None, &["I"]);
        assert_eq!(names(&h.supertypes(&TypeName::new("A"))), vec!["A", "I", "Object"]);
    }

    #[test]
    fn test_assignability() {
        let h = TypeHierarchy::with_builtins();
        assert!(h.is_assignable(&"Long".into(), &"Number".into()));
        assert!(h.is_assignable(&"long".into(), &"Number".into()));
        assert!(h.is_assignable(&"String".into(), &"CharSequence".into()));
        assert!(h.is_assignable(&"List".into(), &"Collection".into()));
        assert!(!h.is_assignable(&"Map".into(), &"Collection".into()));
        assert!(h.is_assignable(&"Long[]".into(), &"Number[]".into()));
        assert!(h.is_assignable(&"Long[]".into(), &"Object".into()));
        assert!(!h.is_assignable(&"int[]".into(), &"Object[]".into()));
        assert!(h.is_assignable(&"int[]".into(), &"int[]".into()));
        assert!(!h.is_assignable(&"Object".into(), &"Long[]".into()));
    }

    #[test]
    fn test_most_specific() {
        let h = TypeHierarchy::with_builtins();
        let object = TypeRef::object();
        let number = TypeRef::named("Number");
        let comparable = TypeRef::named("Comparable");
        let long = TypeRef::named("Long");

        assert_eq!(h.most_specific(&[&object, &number, &long]), vec![2]);
        assert_eq!(h.most_specific(&[&number, &comparable]), vec![0, 1]);
    }

    #[test]
    fn test_unknown_type_is_object_subclass() {
        let h = TypeHierarchy::new();
        assert!(!h.is_declared(&TypeName::new("Ghost")));
        assert!(h.is_subtype(&TypeName::new("Ghost"), &TypeName::new("Object")));
        assert_eq!(h.kind(&TypeName::new("Ghost")), TypeKind::Class);
    }
}
