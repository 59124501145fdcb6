//! Core type definitions for imported packages

use std::fmt;
use std::sync::Arc;

/// Index of a type node in the session's [`TypeArena`](super::TypeArena)
///
/// Two `TypeId`s are equal exactly when they denote the same node, so
/// comparing ids is reference equality on the type graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) u32);

impl TypeId {
    /// Create a TypeId from a raw arena index
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw value of this TypeId
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({})", self.0)
    }
}

/// Kinds of predeclared basic types
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicKind {
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uintptr,
    Float32,
    Float64,
    Complex64,
    Complex128,
    String,
    UnsafePointer,
    UntypedBool,
    UntypedInt,
    UntypedRune,
    UntypedFloat,
    UntypedComplex,
    UntypedString,
    UntypedNil,
}

/// A predeclared basic type. `byte` and `rune` are distinct nodes with the
/// kinds of `uint8` and `int32` so they keep their spelling when printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BasicType {
    /// Kind of the type
    pub kind: BasicKind,
    /// Spelling of the type
    pub name: &'static str,
}

/// Channel direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChanDir {
    /// `chan T`
    Both,
    /// `chan<- T`
    Send,
    /// `<-chan T`
    Recv,
}

/// A parameter or result of a signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// Name, empty if unnamed
    pub name: String,
    /// Parameter type
    pub ty: TypeId,
}

/// Function signature: `(params) results`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Parameters in declaration order
    pub params: Vec<Param>,
    /// Results in declaration order
    pub results: Vec<Param>,
    /// Whether the last parameter is variadic (its type is a slice)
    pub variadic: bool,
}

/// Struct field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field name (for embedded fields, the embedded type's name)
    pub name: String,
    /// Package the field belongs to
    pub pkg: Option<Arc<str>>,
    /// Field type
    pub ty: TypeId,
    /// Whether the field is embedded
    pub embedded: bool,
    /// Struct tag, empty if none
    pub tag: String,
}

/// A function object attached to a type: an interface method or a method
/// of a named type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Func {
    /// Method name
    pub name: String,
    /// Declaring package, `None` for methods of predeclared types
    pub pkg: Option<Arc<str>>,
    /// Signature node
    pub sig: TypeId,
}

impl Func {
    /// Path of the declaring package, empty for predeclared methods
    pub fn pkg_path(&self) -> &str {
        self.pkg.as_deref().unwrap_or("")
    }
}

/// A method bound to a named receiver type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    /// Name, owning package and signature
    pub func: Func,
    /// The named type this method is declared on
    pub recv: TypeId,
    /// Whether the receiver is `*T` rather than `T`
    pub pointer_recv: bool,
}

impl Method {
    /// Method name
    pub fn name(&self) -> &str {
        &self.func.name
    }

    /// Path of the package that declared the receiver type
    pub fn pkg_path(&self) -> &str {
        self.func.pkg_path()
    }
}

/// Interface type
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InterfaceType {
    /// Explicitly declared methods, in encoded order
    pub methods: Vec<Func>,
    /// Embedded interfaces, in encoded order
    pub embedded: Vec<TypeId>,
}

/// A declared named type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedType {
    /// Type name
    pub name: String,
    /// Declaring package, `None` for predeclared `error`
    pub pkg: Option<Arc<str>>,
    /// Underlying type, never itself a named type
    pub underlying: TypeId,
    pub(crate) methods: Vec<Method>,
}

impl NamedType {
    pub(crate) fn new(name: String, pkg: Option<Arc<str>>, underlying: TypeId) -> Self {
        Self {
            name,
            pkg,
            underlying,
            methods: Vec::new(),
        }
    }

    /// All declared methods, in binding order
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// Look up a declared method by name
    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|m| m.func.name == name)
    }

    /// Methods with a value receiver
    pub fn value_methods(&self) -> impl Iterator<Item = &Method> {
        self.methods.iter().filter(|m| !m.pointer_recv)
    }

    /// Methods with a pointer receiver
    pub fn pointer_methods(&self) -> impl Iterator<Item = &Method> {
        self.methods.iter().filter(|m| m.pointer_recv)
    }

    /// Path of the declaring package, empty for predeclared types
    pub fn pkg_path(&self) -> &str {
        self.pkg.as_deref().unwrap_or("")
    }

    /// Append a method unless one with the same name is already bound.
    /// Returns whether the method was added.
    pub(crate) fn add_method(&mut self, method: Method) -> bool {
        if self.method(&method.func.name).is_some() {
            return false;
        }
        self.methods.push(method);
        true
    }
}

/// A node of the type graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    /// Predeclared basic type
    Basic(BasicType),
    /// Named type with methods
    Named(NamedType),
    /// `*T`
    Pointer(TypeId),
    /// `[N]T`
    Array {
        /// Length
        len: u64,
        /// Element type
        elem: TypeId,
    },
    /// `[]T`
    Slice(TypeId),
    /// `map[K]V`
    Map {
        /// Key type
        key: TypeId,
        /// Element type
        elem: TypeId,
    },
    /// Channel type
    Chan {
        /// Direction
        dir: ChanDir,
        /// Element type
        elem: TypeId,
    },
    /// `struct{...}` with fields in encoded order
    Struct(Vec<Field>),
    /// `interface{...}`
    Interface(InterfaceType),
    /// `func(...) ...`
    Signature(Signature),
}
