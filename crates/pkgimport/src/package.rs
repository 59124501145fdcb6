//! Packages, scopes and objects
//!
//! A [`Package`] is created as an empty placeholder the first time its path is
//! referenced and is completed exactly once, when its name, imports and scope
//! are published together. Until then its scope reads as empty.

use crate::constant::ConstValue;
use crate::types::{universe, TypeId};
use once_cell::sync::{Lazy, OnceCell};
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::{Arc, Weak};

/// Kind of a package-level object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// `const`
    Const,
    /// `var`
    Var,
    /// `func`
    Func,
    /// `type`
    TypeName,
}

/// Declaration position recorded by the compiler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    /// Source file name
    pub file: String,
    /// 1-based line
    pub line: u32,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// A package-level declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    kind: ObjectKind,
    name: String,
    pkg: Arc<str>,
    ty: TypeId,
    value: Option<ConstValue>,
    pos: Option<Position>,
}

impl Object {
    pub(crate) fn new(kind: ObjectKind, name: String, pkg: Arc<str>, ty: TypeId) -> Self {
        Self {
            kind,
            name,
            pkg,
            ty,
            value: None,
            pos: None,
        }
    }

    pub(crate) fn with_value(mut self, value: ConstValue) -> Self {
        self.value = Some(value);
        self
    }

    pub(crate) fn with_pos(mut self, pos: Option<Position>) -> Self {
        self.pos = pos;
        self
    }

    /// Object kind
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Declared name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the owning package
    pub fn pkg_path(&self) -> &str {
        &self.pkg
    }

    /// Type of the object; for type names, the named type itself; for
    /// functions, the signature
    pub fn ty(&self) -> TypeId {
        self.ty
    }

    /// Exact value of a constant
    pub fn value(&self) -> Option<&ConstValue> {
        self.value.as_ref()
    }

    /// Declaration position, when the export data carries one
    pub fn pos(&self) -> Option<&Position> {
        self.pos.as_ref()
    }
}

/// Mapping from declared name to object
#[derive(Debug, Clone, Default)]
pub struct Scope {
    objects: FxHashMap<String, Arc<Object>>,
}

static EMPTY_SCOPE: Lazy<Scope> = Lazy::new(Scope::default);

impl Scope {
    /// Look up an object by name
    pub fn lookup(&self, name: &str) -> Option<&Arc<Object>> {
        self.objects.get(name)
    }

    /// Declared names in sorted order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.objects.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Objects in name order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Object>> + '_ {
        self.names()
            .into_iter()
            .filter_map(move |name| self.objects.get(name))
    }

    /// Number of objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the scope is empty
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Insert an object, handing it back if the name is taken
    pub(crate) fn insert(&mut self, object: Object) -> Result<(), Object> {
        if self.objects.contains_key(&object.name) {
            return Err(object);
        }
        self.objects.insert(object.name.clone(), Arc::new(object));
        Ok(())
    }
}

#[derive(Debug)]
struct Contents {
    imports: Vec<Weak<Package>>,
    scope: Scope,
}

/// An imported package
pub struct Package {
    path: Arc<str>,
    name: OnceCell<String>,
    contents: OnceCell<Contents>,
}

impl Package {
    /// Create an incomplete placeholder for `path`
    pub(crate) fn placeholder(path: Arc<str>) -> Self {
        Self {
            path,
            name: OnceCell::new(),
            contents: OnceCell::new(),
        }
    }

    /// The predeclared `unsafe` package, complete from the start
    pub(crate) fn unsafe_package() -> Self {
        let path: Arc<str> = Arc::from("unsafe");
        let mut scope = Scope::default();
        // A fresh scope cannot already hold `Pointer`
        let _ = scope.insert(Object::new(
            ObjectKind::TypeName,
            "Pointer".to_string(),
            path.clone(),
            universe::UNSAFE_POINTER,
        ));
        let pkg = Self::placeholder(path);
        pkg.set_name("unsafe");
        pkg.complete(Vec::new(), scope);
        pkg
    }

    /// Import path, the package's identity within a registry
    pub fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn path_arc(&self) -> &Arc<str> {
        &self.path
    }

    /// Package name, empty until it is known
    pub fn name(&self) -> &str {
        self.name.get().map(String::as_str).unwrap_or("")
    }

    /// Record the package name; the first name recorded wins
    pub(crate) fn set_name(&self, name: &str) {
        if !name.is_empty() {
            let _ = self.name.set(name.to_string());
        }
    }

    /// Whether the package has been fully decoded
    pub fn is_complete(&self) -> bool {
        self.contents.get().is_some()
    }

    /// Package scope; empty while the package is incomplete
    pub fn scope(&self) -> &Scope {
        match self.contents.get() {
            Some(contents) => &contents.scope,
            None => &EMPTY_SCOPE,
        }
    }

    /// Packages referenced by this package's export data, in first-mention
    /// order. Packages no longer held by their registry are skipped.
    pub fn imports(&self) -> Vec<Arc<Package>> {
        self.contents
            .get()
            .map(|c| c.imports.iter().filter_map(Weak::upgrade).collect())
            .unwrap_or_default()
    }

    /// Publish imports and scope. Returns `false` if already complete.
    pub(crate) fn complete(&self, imports: Vec<Weak<Package>>, scope: Scope) -> bool {
        self.contents.set(Contents { imports, scope }).is_ok()
    }
}

impl fmt::Debug for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Package")
            .field("path", &self.path)
            .field("name", &self.name())
            .field("complete", &self.is_complete())
            .field("objects", &self.scope().len())
            .finish()
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "package {} ({:?})", self.name(), self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_is_empty_until_complete() {
        let pkg = Package::placeholder(Arc::from("math"));
        assert!(!pkg.is_complete());
        assert!(pkg.scope().is_empty());
        assert_eq!(pkg.name(), "");

        let mut scope = Scope::default();
        scope
            .insert(Object::new(
                ObjectKind::Func,
                "Sin".into(),
                Arc::from("math"),
                TypeId::new(0),
            ))
            .unwrap();
        pkg.set_name("math");
        assert!(pkg.complete(Vec::new(), scope));
        assert!(!pkg.complete(Vec::new(), Scope::default()));

        assert!(pkg.is_complete());
        assert_eq!(pkg.scope().names(), vec!["Sin"]);
        assert_eq!(pkg.to_string(), "package math (\"math\")");
    }

    #[test]
    fn test_scope_rejects_duplicates() {
        let mut scope = Scope::default();
        let obj = Object::new(ObjectKind::Var, "X".into(), Arc::from("p"), TypeId::new(1));
        assert!(scope.insert(obj.clone()).is_ok());
        assert_eq!(scope.insert(obj).unwrap_err().name(), "X");
        assert_eq!(scope.len(), 1);
    }

    #[test]
    fn test_first_name_wins() {
        let pkg = Package::placeholder(Arc::from("a/b"));
        pkg.set_name("");
        pkg.set_name("b");
        pkg.set_name("c");
        assert_eq!(pkg.name(), "b");
    }

    #[test]
    fn test_unsafe_package() {
        let pkg = Package::unsafe_package();
        assert!(pkg.is_complete());
        let pointer = pkg.scope().lookup("Pointer").unwrap();
        assert_eq!(pointer.ty(), universe::UNSAFE_POINTER);
        assert_eq!(pointer.kind(), ObjectKind::TypeName);
    }

    #[test]
    fn test_weak_imports_follow_owner() {
        let dep = Arc::new(Package::placeholder(Arc::from("dep")));
        let pkg = Package::placeholder(Arc::from("main"));
        pkg.complete(vec![Arc::downgrade(&dep)], Scope::default());
        assert_eq!(pkg.imports().len(), 1);
        drop(dep);
        assert!(pkg.imports().is_empty());
    }
}
