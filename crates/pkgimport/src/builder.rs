//! Type graph construction
//!
//! Links the type table of one decoded span into the session arena. Every
//! definition gets its arena slot in a first pass, before any body is built,
//! so forward and recursive references resolve to the same slot; the second
//! pass fills each slot exactly once.

use crate::decode::{ExportData, Local, RawSignature, RawType};
use crate::error::{DecodeError, DecodeErrorKind};
use crate::types::universe::PREDECLARED_COUNT;
use crate::types::{
    Field, Func, InterfaceType, NamedType, Param, Signature, Type, TypeArena, TypeId,
};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Mapping from a span's local type indices to arena ids
#[derive(Debug)]
pub(crate) struct Linked {
    locals: Vec<TypeId>,
}

impl Linked {
    pub fn resolve(&self, local: Local) -> TypeId {
        match local.checked_sub(PREDECLARED_COUNT) {
            None => TypeId(local),
            Some(i) => self
                .locals
                .get(i as usize)
                .copied()
                .unwrap_or(TypeId(local)),
        }
    }

    /// Allocate a signature node
    pub fn signature(&self, arena: &mut TypeArena, sig: &RawSignature) -> TypeId {
        arena.alloc(Type::Signature(self.build_signature(sig)))
    }

    fn build_signature(&self, sig: &RawSignature) -> Signature {
        let param = |p: &crate::decode::RawParam| Param {
            name: p.name.clone(),
            ty: self.resolve(p.ty),
        };
        Signature {
            params: sig.params.iter().map(param).collect(),
            results: sig.results.iter().map(param).collect(),
            variadic: sig.variadic,
        }
    }
}

/// Link the types of `data` into `arena`.
///
/// `paths` gives the package path of each entry of the span's package table.
/// Named types already known to the arena by (path, name) are reused as is;
/// their restated definitions are ignored.
pub(crate) fn link_types(
    arena: &mut TypeArena,
    data: &ExportData,
    paths: &[Arc<str>],
) -> Result<Linked, DecodeError> {
    let start = arena.len();
    let table = &data.types;
    let self_path = paths.first().cloned().unwrap_or_else(|| Arc::from(""));
    let path_of = |pkg: usize| paths.get(pkg).cloned().unwrap_or_else(|| self_path.clone());

    // Pass 1: a slot for every definition
    let mut locals = Vec::with_capacity(table.len());
    let mut fresh: FxHashMap<TypeId, Local> = FxHashMap::default();
    let mut owners: FxHashMap<Local, Arc<str>> = FxHashMap::default();
    let mut restated = 0usize;
    for local in table.locals() {
        let id = match table.get(local) {
            Some(RawType::Named {
                pkg,
                name,
                underlying,
            }) => {
                let path = path_of(*pkg);
                owners.insert(*underlying, path.clone());
                match arena.lookup_named(&path, name) {
                    Some(existing) => {
                        restated += 1;
                        existing
                    }
                    None => {
                        let id = arena.reserve();
                        arena.register_named(path, name.clone(), id);
                        fresh.insert(id, local);
                        id
                    }
                }
            }
            _ => arena.reserve(),
        };
        locals.push(id);
    }
    let linked = Linked { locals };

    // Pass 2: fill each new slot
    for local in table.locals() {
        let id = linked.resolve(local);
        let Some(raw) = table.get(local) else {
            continue;
        };
        let owner = owners
            .get(&local)
            .cloned()
            .unwrap_or_else(|| self_path.clone());
        let ty = match raw {
            RawType::Named {
                pkg,
                name,
                underlying,
            } => {
                if fresh.get(&id) != Some(&local) {
                    continue;
                }
                let underlying = chase(arena, data, &linked, &fresh, *underlying);
                Type::Named(NamedType::new(name.clone(), Some(path_of(*pkg)), underlying))
            }
            RawType::Pointer(elem) => Type::Pointer(linked.resolve(*elem)),
            RawType::Array { len, elem } => Type::Array {
                len: *len,
                elem: linked.resolve(*elem),
            },
            RawType::Slice(elem) => Type::Slice(linked.resolve(*elem)),
            RawType::Map { key, elem } => Type::Map {
                key: linked.resolve(*key),
                elem: linked.resolve(*elem),
            },
            RawType::Chan { dir, elem } => Type::Chan {
                dir: *dir,
                elem: linked.resolve(*elem),
            },
            RawType::Struct(fields) => Type::Struct(
                fields
                    .iter()
                    .map(|f| Field {
                        name: f.name.clone(),
                        pkg: Some(owner.clone()),
                        ty: linked.resolve(f.ty),
                        embedded: f.embedded,
                        tag: f.tag.clone(),
                    })
                    .collect(),
            ),
            RawType::Interface { embedded, methods } => {
                let methods = methods
                    .iter()
                    .map(|m| Func {
                        name: m.name.clone(),
                        pkg: Some(owner.clone()),
                        sig: linked.signature(arena, &m.sig),
                    })
                    .collect();
                Type::Interface(InterfaceType {
                    methods,
                    embedded: embedded.iter().map(|&e| linked.resolve(e)).collect(),
                })
            }
            RawType::Signature(sig) => Type::Signature(linked.build_signature(sig)),
        };
        arena.fill(id, ty);
    }

    if let Some(id) = arena.unfilled_since(start) {
        return Err(DecodeError::new(0, DecodeErrorKind::DanglingType(id.as_u32())));
    }
    if restated > 0 {
        tracing::trace!(restated, "reused known named types");
    }
    Ok(linked)
}

/// The underlying type for a named type whose declared underlying is `local`,
/// looking through named types
fn chase(
    arena: &TypeArena,
    data: &ExportData,
    linked: &Linked,
    fresh: &FxHashMap<TypeId, Local>,
    mut local: Local,
) -> TypeId {
    for _ in 0..=data.types.len() {
        let id = linked.resolve(local);
        match fresh.get(&id).and_then(|&def| data.types.get(def)) {
            Some(RawType::Named { underlying, .. }) => local = *underlying,
            _ => return arena.underlying(id),
        }
    }
    linked.resolve(local)
}
