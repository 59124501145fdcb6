//! Decoding export data into an intermediate form
//!
//! Both the binary and the legacy textual format decode into [`ExportData`]:
//! a package table, a table of type definitions addressed by local index,
//! and flat lists of objects and methods. Nothing here touches a registry
//! or the session's type arena, so a malformed span leaves no trace.
//!
//! Local type indices below [`PREDECLARED_COUNT`] denote the predeclared
//! types; every definition takes the next index in the order its tag is
//! read, before its body is decoded.

pub(crate) mod binary;
pub(crate) mod text;

use crate::constant::ConstValue;
use crate::error::{DecodeError, DecodeErrorKind};
use crate::format::ExportFormat;
use crate::package::Position;
use crate::types::universe::PREDECLARED_COUNT;
use crate::types::ChanDir;

/// Index into an [`ExportData`] type table
pub(crate) type Local = u32;

/// Options that bound a decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DecodeOptions {
    pub allow_legacy_text: bool,
    pub max_type_depth: usize,
}

/// A package mentioned by export data. Entry 0 is the package being decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PkgRef {
    pub name: String,
    /// Empty for the package being decoded
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawParam {
    pub name: String,
    pub ty: Local,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct RawSignature {
    pub params: Vec<RawParam>,
    pub results: Vec<RawParam>,
    pub variadic: bool,
}

impl RawSignature {
    fn refs(&self) -> impl Iterator<Item = Local> + '_ {
        self.params.iter().chain(self.results.iter()).map(|p| p.ty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawField {
    pub name: String,
    pub ty: Local,
    pub embedded: bool,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawFunc {
    pub name: String,
    pub sig: RawSignature,
}

/// A type definition as written in the export data
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RawType {
    Named {
        pkg: usize,
        name: String,
        underlying: Local,
    },
    Pointer(Local),
    Array {
        len: u64,
        elem: Local,
    },
    Slice(Local),
    Map {
        key: Local,
        elem: Local,
    },
    Chan {
        dir: ChanDir,
        elem: Local,
    },
    Struct(Vec<RawField>),
    Interface {
        embedded: Vec<Local>,
        methods: Vec<RawFunc>,
    },
    Signature(RawSignature),
}

impl RawType {
    /// Local indices this definition refers to
    pub fn refs(&self) -> Vec<Local> {
        match self {
            RawType::Named { underlying, .. } => vec![*underlying],
            RawType::Pointer(elem) | RawType::Slice(elem) => vec![*elem],
            RawType::Array { elem, .. } | RawType::Chan { elem, .. } => vec![*elem],
            RawType::Map { key, elem } => vec![*key, *elem],
            RawType::Struct(fields) => fields.iter().map(|f| f.ty).collect(),
            RawType::Interface { embedded, methods } => embedded
                .iter()
                .copied()
                .chain(methods.iter().flat_map(|m| m.sig.refs()))
                .collect(),
            RawType::Signature(sig) => sig.refs().collect(),
        }
    }
}

/// Type definitions of one span, addressed by local index
#[derive(Debug, Clone, Default)]
pub(crate) struct TypeTable {
    slots: Vec<Option<RawType>>,
    /// Span offset of each definition
    offsets: Vec<usize>,
    /// Every reference read, with the offset it was read at
    refs: Vec<(Local, usize)>,
}

impl TypeTable {
    /// Allocate the next local index for a definition starting at `offset`
    pub fn reserve(&mut self, offset: usize) -> Local {
        let local = PREDECLARED_COUNT + self.slots.len() as u32;
        self.slots.push(None);
        self.offsets.push(offset);
        local
    }

    /// Fill a reserved slot; a slot is filled at most once
    pub fn fill(&mut self, local: Local, ty: RawType) -> bool {
        match self.slot_mut(local) {
            Some(slot @ None) => {
                *slot = Some(ty);
                true
            }
            _ => false,
        }
    }

    /// Record a reference, which may point past the current end of the table
    pub fn note_ref(&mut self, local: Local, offset: usize) {
        if local >= PREDECLARED_COUNT {
            self.refs.push((local, offset));
        }
    }

    /// The definition at `local`, `None` for predeclared or unfilled indices
    pub fn get(&self, local: Local) -> Option<&RawType> {
        let index = local.checked_sub(PREDECLARED_COUNT)? as usize;
        self.slots.get(index).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, local: Local) -> Option<&mut Option<RawType>> {
        let index = local.checked_sub(PREDECLARED_COUNT)? as usize;
        self.slots.get_mut(index)
    }

    /// Whether `local` denotes a named type (predeclared `error` included)
    pub fn is_named(&self, local: Local) -> bool {
        local == crate::types::universe::ERROR.as_u32()
            || matches!(self.get(local), Some(RawType::Named { .. }))
    }

    /// Number of definitions
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Local indices of all definitions, in definition order
    pub fn locals(&self) -> impl Iterator<Item = Local> {
        PREDECLARED_COUNT..PREDECLARED_COUNT + self.slots.len() as u32
    }

    fn offset_of(&self, local: Local) -> usize {
        local
            .checked_sub(PREDECLARED_COUNT)
            .and_then(|i| self.offsets.get(i as usize))
            .copied()
            .unwrap_or(0)
    }

    /// Check that every reference resolves to a filled definition and that
    /// every cycle passes through a named type's underlying type.
    pub fn validate(&self) -> Result<(), DecodeError> {
        for &(local, offset) in &self.refs {
            if self.get(local).is_none() {
                return Err(DecodeError::new(offset, DecodeErrorKind::DanglingType(local)));
            }
        }
        if let Some(i) = self.slots.iter().position(Option::is_none) {
            let local = PREDECLARED_COUNT + i as u32;
            return Err(DecodeError::new(
                self.offset_of(local),
                DecodeErrorKind::DanglingType(local),
            ));
        }
        self.check_cycles()
    }

    /// Edges that may not form a cycle: a named type to a named underlying,
    /// and a composite type to its composite components.
    fn structural_edges(&self, local: Local) -> Vec<Local> {
        match self.get(local) {
            Some(RawType::Named { underlying, .. }) => {
                if matches!(self.get(*underlying), Some(RawType::Named { .. })) {
                    vec![*underlying]
                } else {
                    Vec::new()
                }
            }
            Some(ty) => ty
                .refs()
                .into_iter()
                .filter(|&r| self.get(r).is_some() && !self.is_named(r))
                .collect(),
            None => Vec::new(),
        }
    }

    fn check_cycles(&self) -> Result<(), DecodeError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            Active,
            Done,
        }
        let mut marks = vec![Mark::New; self.slots.len()];
        let index = |local: Local| (local - PREDECLARED_COUNT) as usize;

        for root in self.locals() {
            if marks[index(root)] != Mark::New {
                continue;
            }
            // iterative DFS: (node, remaining edges)
            let mut stack = vec![(root, self.structural_edges(root))];
            marks[index(root)] = Mark::Active;
            while let Some((node, edges)) = stack.last_mut() {
                let node = *node;
                let next = edges.pop();
                match next {
                    Some(next) => match marks[index(next)] {
                        Mark::Active => {
                            return Err(DecodeError::new(
                                self.offset_of(next),
                                DecodeErrorKind::InvalidRecursiveType(next),
                            ));
                        }
                        Mark::New => {
                            marks[index(next)] = Mark::Active;
                            let edges = self.structural_edges(next);
                            stack.push((next, edges));
                        }
                        Mark::Done => {}
                    },
                    None => {
                        marks[index(node)] = Mark::Done;
                        stack.pop();
                    }
                }
            }
        }
        Ok(())
    }
}

/// Declaration-specific part of an object
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RawDecl {
    Const { ty: Local, value: ConstValue },
    Var { ty: Local },
    Func { sig: RawSignature },
    TypeName { ty: Local },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawObject {
    /// Index into [`ExportData::packages`]
    pub pkg: usize,
    pub name: String,
    pub decl: RawDecl,
    pub pos: Option<Position>,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawMethod {
    pub recv: Local,
    pub pointer: bool,
    pub name: String,
    pub sig: RawSignature,
    pub offset: usize,
}

/// Everything one export-data span declares
#[derive(Debug, Clone)]
pub(crate) struct ExportData {
    pub format: ExportFormat,
    pub packages: Vec<PkgRef>,
    pub types: TypeTable,
    pub objects: Vec<RawObject>,
    pub methods: Vec<RawMethod>,
}

impl ExportData {
    /// Whether package table entry `index` is the package being decoded
    pub fn is_self(&self, index: usize, self_path: &str) -> bool {
        index == 0
            || self
                .packages
                .get(index)
                .is_some_and(|p| p.path.is_empty() || p.path == self_path)
    }

    /// Structural checks shared by both formats
    pub fn validate(&self) -> Result<(), DecodeError> {
        self.types.validate()?;
        for object in &self.objects {
            if let RawDecl::TypeName { ty } = object.decl {
                if !self.types.is_named(ty) {
                    return Err(DecodeError::new(object.offset, DecodeErrorKind::NotNamed(ty)));
                }
            }
        }
        Ok(())
    }
}

/// Decode a sniffed span
pub(crate) fn decode(
    span: &[u8],
    format: ExportFormat,
    body_offset: usize,
    options: DecodeOptions,
) -> Result<ExportData, DecodeError> {
    let data = match format {
        ExportFormat::BinaryV1 | ExportFormat::BinaryV2 => {
            binary::decode(span, format, body_offset, options.max_type_depth)?
        }
        ExportFormat::LegacyText => text::decode(span, body_offset, options.max_type_depth)?,
    };
    data.validate()?;
    Ok(data)
}
