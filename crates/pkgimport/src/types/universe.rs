//! Predeclared types
//!
//! The first [`PREDECLARED_COUNT`] arena slots hold the predeclared types in a
//! fixed order. Export data refers to them by these indices, so the order is
//! part of the wire format.

use super::ty::{BasicKind, TypeId};

/// Spellings of the predeclared types, indexed by their type index
pub const PREDECLARED: [&str; 28] = [
    "bool",
    "int",
    "int8",
    "int16",
    "int32",
    "int64",
    "uint",
    "uint8",
    "uint16",
    "uint32",
    "uint64",
    "uintptr",
    "float32",
    "float64",
    "complex64",
    "complex128",
    "string",
    "byte",
    "rune",
    "error",
    "untyped bool",
    "untyped int",
    "untyped rune",
    "untyped float",
    "untyped complex",
    "untyped string",
    "untyped nil",
    "unsafe.Pointer",
];

/// Number of predeclared type indices
pub const PREDECLARED_COUNT: u32 = PREDECLARED.len() as u32;

/// The predeclared `error` interface type
pub const ERROR: TypeId = TypeId(19);

/// `unsafe.Pointer`
pub const UNSAFE_POINTER: TypeId = TypeId(27);

/// Look up a predeclared type by spelling
pub fn predeclared(name: &str) -> Option<TypeId> {
    PREDECLARED
        .iter()
        .position(|&n| n == name)
        .map(|i| TypeId(i as u32))
}

/// Basic kind of a predeclared index, `None` for `error`
pub(crate) fn basic_kind(index: usize) -> Option<BasicKind> {
    use BasicKind::*;
    const KINDS: [Option<BasicKind>; 28] = [
        Some(Bool),
        Some(Int),
        Some(Int8),
        Some(Int16),
        Some(Int32),
        Some(Int64),
        Some(Uint),
        Some(Uint8),
        Some(Uint16),
        Some(Uint32),
        Some(Uint64),
        Some(Uintptr),
        Some(Float32),
        Some(Float64),
        Some(Complex64),
        Some(Complex128),
        Some(String),
        Some(Uint8),
        Some(Int32),
        None,
        Some(UntypedBool),
        Some(UntypedInt),
        Some(UntypedRune),
        Some(UntypedFloat),
        Some(UntypedComplex),
        Some(UntypedString),
        Some(UntypedNil),
        Some(UnsafePointer),
    ];
    KINDS.get(index).copied().flatten()
}
