//! Type graph of imported packages
//!
//! All types decoded in one session live in a single [`TypeArena`] and refer
//! to each other by [`TypeId`]. Predeclared types occupy fixed ids.

mod arena;
mod print;
mod ty;
pub mod universe;

pub use arena::TypeArena;
pub use print::{object_string, TypeDisplay};
pub use ty::{
    BasicKind, BasicType, ChanDir, Field, Func, InterfaceType, Method, NamedType, Param, Signature,
    Type, TypeId,
};
