//! Session-wide type arena
//!
//! Type nodes live in a growable arena and refer to each other by [`TypeId`].
//! A slot is reserved first and filled later, exactly once, so cyclic graphs
//! are built without aliasing partially constructed nodes.

use super::print::TypeDisplay;
use super::ty::{BasicType, Func, InterfaceType, NamedType, Param, Signature, Type, TypeId};
use super::universe::{self, ERROR, PREDECLARED, PREDECLARED_COUNT};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

/// Arena of all type nodes decoded in one session
#[derive(Debug, Clone)]
pub struct TypeArena {
    /// Storage for all types, indexed by TypeId; `None` is a reserved slot
    slots: Vec<Option<Type>>,

    /// Canonical named types by (package path, name)
    named: FxHashMap<(Arc<str>, String), TypeId>,
}

impl Default for TypeArena {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeArena {
    /// Create an arena holding the predeclared types
    pub fn new() -> Self {
        let mut arena = TypeArena {
            slots: Vec::with_capacity(64),
            named: FxHashMap::default(),
        };

        for (i, name) in PREDECLARED.iter().enumerate() {
            let slot = universe::basic_kind(i).map(|kind| Type::Basic(BasicType { kind, name }));
            arena.slots.push(slot);
        }

        // error = interface{ Error() string }
        let string = TypeId(16);
        let sig = arena.alloc(Type::Signature(Signature {
            params: Vec::new(),
            results: vec![Param {
                name: String::new(),
                ty: string,
            }],
            variadic: false,
        }));
        let iface = arena.alloc(Type::Interface(InterfaceType {
            methods: vec![Func {
                name: "Error".to_string(),
                pkg: None,
                sig,
            }],
            embedded: Vec::new(),
        }));
        arena.fill(ERROR, Type::Named(NamedType::new("error".to_string(), None, iface)));

        debug_assert_eq!(arena.unfilled(), None);
        arena
    }

    /// Number of slots, filled or reserved
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the arena holds no types (never true: predeclared types are always present)
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Reserve a new slot to be filled later
    pub(crate) fn reserve(&mut self) -> TypeId {
        let id = TypeId(self.slots.len() as u32);
        self.slots.push(None);
        id
    }

    /// Reserve and immediately fill a slot
    pub(crate) fn alloc(&mut self, ty: Type) -> TypeId {
        let id = self.reserve();
        self.fill(id, ty);
        id
    }

    /// Fill a reserved slot. A slot is filled at most once: filling an
    /// already filled slot leaves it unchanged and returns `false`.
    pub(crate) fn fill(&mut self, id: TypeId, ty: Type) -> bool {
        match self.slots.get_mut(id.index()) {
            Some(slot @ None) => {
                *slot = Some(ty);
                true
            }
            _ => false,
        }
    }

    /// Whether the slot for `id` exists and has been filled
    pub fn is_filled(&self, id: TypeId) -> bool {
        matches!(self.slots.get(id.index()), Some(Some(_)))
    }

    /// The first reserved slot that was never filled
    pub fn unfilled(&self) -> Option<TypeId> {
        self.unfilled_since(0)
    }

    /// The first unfilled slot at or after index `start`
    pub(crate) fn unfilled_since(&self, start: usize) -> Option<TypeId> {
        self.slots
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, slot)| slot.is_none())
            .map(|(i, _)| TypeId(i as u32))
    }

    /// Get a type by its TypeId
    pub fn get(&self, id: TypeId) -> Option<&Type> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    /// Get a named type by its TypeId
    pub fn named(&self, id: TypeId) -> Option<&NamedType> {
        match self.get(id) {
            Some(Type::Named(named)) => Some(named),
            _ => None,
        }
    }

    pub(crate) fn named_mut(&mut self, id: TypeId) -> Option<&mut NamedType> {
        match self.slots.get_mut(id.index()) {
            Some(Some(Type::Named(named))) => Some(named),
            _ => None,
        }
    }

    /// The underlying type of `id` (itself unless `id` is named)
    pub fn underlying(&self, id: TypeId) -> TypeId {
        match self.get(id) {
            Some(Type::Named(named)) => named.underlying,
            _ => id,
        }
    }

    /// Whether `id` is one of the predeclared types
    pub fn is_predeclared(&self, id: TypeId) -> bool {
        id.0 < PREDECLARED_COUNT
    }

    /// Look up the canonical named type `name` declared in package `pkg`
    pub fn lookup_named(&self, pkg: &str, name: &str) -> Option<TypeId> {
        self.named.get(&(Arc::from(pkg), name.to_string())).copied()
    }

    pub(crate) fn register_named(&mut self, pkg: Arc<str>, name: String, id: TypeId) {
        self.named.entry((pkg, name)).or_insert(id);
    }

    /// Drop the canonical named types of `pkgs`, so the packages can be
    /// decoded again. Their nodes stay in the arena, unreachable.
    pub(crate) fn forget_packages(&mut self, pkgs: &[Arc<str>]) {
        self.named.retain(|(pkg, _), _| !pkgs.contains(pkg));
    }

    /// The method set of `id`: value-receiver methods for a named type,
    /// all methods for a pointer to a named type, and the (flattened)
    /// methods of an interface.
    pub fn method_set(&self, id: TypeId) -> Vec<&Func> {
        let underlying = self.underlying(id);
        if matches!(self.get(underlying), Some(Type::Interface(_))) {
            return self.interface_methods(underlying);
        }
        match self.get(id) {
            Some(Type::Named(named)) => named.value_methods().map(|m| &m.func).collect(),
            Some(Type::Pointer(elem)) => match self.named(*elem) {
                Some(named) if !self.is_interface(named.underlying) => {
                    named.methods.iter().map(|m| &m.func).collect()
                }
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    /// Look up a method in the method set of `id`
    pub fn lookup_method(&self, id: TypeId, name: &str) -> Option<&Func> {
        self.method_set(id).into_iter().find(|f| f.name == name)
    }

    fn is_interface(&self, id: TypeId) -> bool {
        matches!(self.get(id), Some(Type::Interface(_)))
    }

    /// Methods of interface `id` followed by those of its embedded
    /// interfaces, first declaration of each name kept
    pub(crate) fn interface_methods(&self, id: TypeId) -> Vec<&Func> {
        let mut methods: Vec<&Func> = Vec::new();
        let mut seen = FxHashSet::default();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let underlying = self.underlying(next);
            if !seen.insert(underlying) {
                continue;
            }
            if let Some(Type::Interface(iface)) = self.get(underlying) {
                for func in &iface.methods {
                    if !methods.iter().any(|m| m.name == func.name) {
                        methods.push(func);
                    }
                }
                stack.extend(iface.embedded.iter().rev().copied());
            }
        }
        methods
    }

    /// Render `id` as type syntax. Named types declared in `qualifier`'s
    /// package are written unqualified; others are prefixed with their path.
    pub fn display<'a>(&'a self, id: TypeId, qualifier: Option<&'a str>) -> TypeDisplay<'a> {
        TypeDisplay::new(self, id, qualifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ty::{Method, Type};

    #[test]
    fn test_universe_is_complete() {
        let arena = TypeArena::new();
        assert_eq!(arena.unfilled(), None);
        assert!(arena.len() > PREDECLARED.len());

        let error = arena.named(ERROR).unwrap();
        assert_eq!(error.name, "error");
        assert!(error.pkg.is_none());
        let methods = arena.method_set(ERROR);
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].name, "Error");
    }

    #[test]
    fn test_fill_once() {
        let mut arena = TypeArena::new();
        let id = arena.reserve();
        assert!(!arena.is_filled(id));
        assert_eq!(arena.unfilled(), Some(id));

        assert!(arena.fill(id, Type::Slice(TypeId(1))));
        assert!(!arena.fill(id, Type::Slice(TypeId(2))));
        assert_eq!(arena.get(id), Some(&Type::Slice(TypeId(1))));
        assert_eq!(arena.unfilled(), None);
    }

    #[test]
    fn test_self_referential_pointer() {
        let mut arena = TypeArena::new();
        let named = arena.reserve();
        let ptr = arena.alloc(Type::Pointer(named));
        let body = arena.alloc(Type::Struct(vec![crate::types::ty::Field {
            name: "next".into(),
            pkg: Some(Arc::from("list")),
            ty: ptr,
            embedded: false,
            tag: String::new(),
        }]));
        arena.fill(
            named,
            Type::Named(NamedType::new("Node".into(), Some(Arc::from("list")), body)),
        );

        let Some(Type::Struct(fields)) = arena.get(arena.underlying(named)) else {
            panic!("expected struct");
        };
        assert_eq!(arena.get(fields[0].ty), Some(&Type::Pointer(named)));
    }

    #[test]
    fn test_method_sets_by_receiver() {
        let mut arena = TypeArena::new();
        let pkg: Arc<str> = Arc::from("sync");
        let body = arena.alloc(Type::Struct(Vec::new()));
        let mutex = arena.alloc(Type::Named(NamedType::new(
            "Mutex".into(),
            Some(pkg.clone()),
            body,
        )));
        let sig = arena.alloc(Type::Signature(Signature {
            params: Vec::new(),
            results: Vec::new(),
            variadic: false,
        }));
        let named = arena.named_mut(mutex).unwrap();
        for (name, pointer_recv) in [("Lock", true), ("String", false)] {
            named.add_method(Method {
                func: Func {
                    name: name.into(),
                    pkg: Some(pkg.clone()),
                    sig,
                },
                recv: mutex,
                pointer_recv,
            });
        }
        let ptr = arena.alloc(Type::Pointer(mutex));

        assert!(arena.lookup_method(mutex, "Lock").is_none());
        assert!(arena.lookup_method(mutex, "String").is_some());
        let lock = arena.lookup_method(ptr, "Lock").unwrap();
        assert_eq!(lock.pkg_path(), "sync");
        assert_eq!(arena.method_set(ptr).len(), 2);
    }

    #[test]
    fn test_named_registry_keeps_first() {
        let mut arena = TypeArena::new();
        let a = arena.reserve();
        let b = arena.reserve();
        arena.register_named(Arc::from("p"), "T".into(), a);
        arena.register_named(Arc::from("p"), "T".into(), b);
        assert_eq!(arena.lookup_named("p", "T"), Some(a));
        assert_eq!(arena.lookup_named("q", "T"), None);
    }
}
