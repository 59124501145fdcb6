//! Rendering types and objects in source syntax

use super::arena::TypeArena;
use super::ty::{ChanDir, Param, Signature, Type, TypeId};
use crate::package::{Object, ObjectKind};
use std::fmt::{self, Write};

/// Nesting beyond this is rendered as `...`; well-formed graphs only recurse
/// through named types, which print by name.
const MAX_PRINT_DEPTH: usize = 64;

/// [`fmt::Display`] adapter for a type in an arena
///
/// Named types whose package path equals the qualifier are written bare,
/// all others as `path.Name`.
pub struct TypeDisplay<'a> {
    arena: &'a TypeArena,
    id: TypeId,
    qualifier: Option<&'a str>,
}

impl<'a> TypeDisplay<'a> {
    pub(crate) fn new(arena: &'a TypeArena, id: TypeId, qualifier: Option<&'a str>) -> Self {
        Self {
            arena,
            id,
            qualifier,
        }
    }
}

impl fmt::Display for TypeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let printer = Printer {
            arena: self.arena,
            qualifier: self.qualifier,
        };
        printer.ty(f, self.id, 0)
    }
}

struct Printer<'a> {
    arena: &'a TypeArena,
    qualifier: Option<&'a str>,
}

impl Printer<'_> {
    fn ty(&self, w: &mut dyn Write, id: TypeId, depth: usize) -> fmt::Result {
        if depth > MAX_PRINT_DEPTH {
            return w.write_str("...");
        }
        let depth = depth + 1;
        let Some(ty) = self.arena.get(id) else {
            return w.write_str("invalid type");
        };
        match ty {
            Type::Basic(basic) => w.write_str(basic.name),
            Type::Named(named) => {
                if let Some(pkg) = named.pkg.as_deref() {
                    if self.qualifier != Some(pkg) {
                        write!(w, "{pkg}.")?;
                    }
                }
                w.write_str(&named.name)
            }
            Type::Pointer(elem) => {
                w.write_char('*')?;
                self.ty(w, *elem, depth)
            }
            Type::Array { len, elem } => {
                write!(w, "[{len}]")?;
                self.ty(w, *elem, depth)
            }
            Type::Slice(elem) => {
                w.write_str("[]")?;
                self.ty(w, *elem, depth)
            }
            Type::Map { key, elem } => {
                w.write_str("map[")?;
                self.ty(w, *key, depth)?;
                w.write_char(']')?;
                self.ty(w, *elem, depth)
            }
            Type::Chan { dir, elem } => {
                let prefix = match dir {
                    ChanDir::Both => "chan ",
                    ChanDir::Send => "chan<- ",
                    ChanDir::Recv => "<-chan ",
                };
                w.write_str(prefix)?;
                // chan (<-chan T) needs parentheses to parse back the same way
                let paren = *dir == ChanDir::Both
                    && matches!(
                        self.arena.get(*elem),
                        Some(Type::Chan {
                            dir: ChanDir::Recv,
                            ..
                        })
                    );
                if paren {
                    w.write_char('(')?;
                }
                self.ty(w, *elem, depth)?;
                if paren {
                    w.write_char(')')?;
                }
                Ok(())
            }
            Type::Struct(fields) => {
                w.write_str("struct{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        w.write_str("; ")?;
                    }
                    if !field.embedded {
                        write!(w, "{} ", field.name)?;
                    }
                    self.ty(w, field.ty, depth)?;
                    if !field.tag.is_empty() {
                        write!(w, " {:?}", field.tag)?;
                    }
                }
                w.write_char('}')
            }
            Type::Interface(_) => {
                // embedded interfaces are spelled out as their methods
                w.write_str("interface{")?;
                for (i, method) in self.arena.interface_methods(id).into_iter().enumerate() {
                    if i > 0 {
                        w.write_str("; ")?;
                    }
                    w.write_str(&method.name)?;
                    self.signature_of(w, method.sig, depth)?;
                }
                w.write_char('}')
            }
            Type::Signature(sig) => {
                w.write_str("func")?;
                self.signature(w, sig, depth)
            }
        }
    }

    fn signature_of(&self, w: &mut dyn Write, id: TypeId, depth: usize) -> fmt::Result {
        match self.arena.get(id) {
            Some(Type::Signature(sig)) => self.signature(w, sig, depth),
            _ => w.write_str("(invalid signature)"),
        }
    }

    /// `(params) results` without the leading `func`
    fn signature(&self, w: &mut dyn Write, sig: &Signature, depth: usize) -> fmt::Result {
        self.tuple(w, &sig.params, sig.variadic, depth)?;
        match sig.results.as_slice() {
            [] => Ok(()),
            [single] if single.name.is_empty() => {
                w.write_char(' ')?;
                self.ty(w, single.ty, depth)
            }
            results => {
                w.write_char(' ')?;
                self.tuple(w, results, false, depth)
            }
        }
    }

    fn tuple(
        &self,
        w: &mut dyn Write,
        params: &[Param],
        variadic: bool,
        depth: usize,
    ) -> fmt::Result {
        w.write_char('(')?;
        for (i, param) in params.iter().enumerate() {
            if i > 0 {
                w.write_str(", ")?;
            }
            if !param.name.is_empty() {
                write!(w, "{} ", param.name)?;
            }
            let last = i + 1 == params.len();
            match self.arena.get(param.ty) {
                Some(Type::Slice(elem)) if variadic && last => {
                    w.write_str("...")?;
                    self.ty(w, *elem, depth)?;
                }
                _ => self.ty(w, param.ty, depth)?,
            }
        }
        w.write_char(')')
    }
}

/// Render a package-level object the way a declaration would read:
/// `const Pi untyped float`, `func Sin(x float64) float64`,
/// `type Reader interface{...}`.
///
/// Objects and named types declared in `relative_to` are unqualified.
pub fn object_string(object: &Object, types: &TypeArena, relative_to: Option<&str>) -> String {
    let printer = Printer {
        arena: types,
        qualifier: relative_to,
    };
    let mut out = String::new();
    let keyword = match object.kind() {
        ObjectKind::Const => "const",
        ObjectKind::Var => "var",
        ObjectKind::Func => "func",
        ObjectKind::TypeName => "type",
    };
    out.push_str(keyword);
    out.push(' ');
    if relative_to != Some(object.pkg_path()) {
        out.push_str(object.pkg_path());
        out.push('.');
    }
    out.push_str(object.name());

    // Writing into a String cannot fail
    let _ = match object.kind() {
        ObjectKind::Func => printer.signature_of(&mut out, object.ty(), 0),
        ObjectKind::TypeName => {
            out.push(' ');
            printer.ty(&mut out, types.underlying(object.ty()), 0)
        }
        ObjectKind::Const | ObjectKind::Var => {
            out.push(' ');
            printer.ty(&mut out, object.ty(), 0)
        }
    };
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ty::{Field, Func, InterfaceType, NamedType};
    use crate::types::universe::predeclared;
    use std::sync::Arc;

    fn t(name: &str) -> TypeId {
        predeclared(name).unwrap()
    }

    fn param(name: &str, ty: TypeId) -> Param {
        Param {
            name: name.into(),
            ty,
        }
    }

    fn reader(arena: &mut TypeArena) -> TypeId {
        let bytes = arena.alloc(Type::Slice(t("byte")));
        let sig = arena.alloc(Type::Signature(Signature {
            params: vec![param("p", bytes)],
            results: vec![param("n", t("int")), param("err", t("error"))],
            variadic: false,
        }));
        let iface = arena.alloc(Type::Interface(InterfaceType {
            methods: vec![Func {
                name: "Read".into(),
                pkg: Some(Arc::from("io")),
                sig,
            }],
            embedded: Vec::new(),
        }));
        arena.alloc(Type::Named(NamedType::new(
            "Reader".into(),
            Some(Arc::from("io")),
            iface,
        )))
    }

    #[test]
    fn test_named_qualification() {
        let mut arena = TypeArena::new();
        let reader = reader(&mut arena);

        assert_eq!(arena.display(reader, Some("io")).to_string(), "Reader");
        assert_eq!(arena.display(reader, None).to_string(), "io.Reader");
        assert_eq!(
            arena.display(arena.underlying(reader), Some("io")).to_string(),
            "interface{Read(p []byte) (n int, err error)}"
        );
    }

    #[test]
    fn test_embedded_interfaces_are_flattened() {
        let mut arena = TypeArena::new();
        let reader = reader(&mut arena);
        let close = arena.alloc(Type::Signature(Signature {
            params: Vec::new(),
            results: vec![param("", t("error"))],
            variadic: false,
        }));
        let read_closer = arena.alloc(Type::Interface(InterfaceType {
            methods: vec![Func {
                name: "Close".into(),
                pkg: Some(Arc::from("io")),
                sig: close,
            }],
            embedded: vec![reader],
        }));
        assert_eq!(
            arena.display(read_closer, Some("io")).to_string(),
            "interface{Close() error; Read(p []byte) (n int, err error)}"
        );
    }

    #[test]
    fn test_composite_types() {
        let mut arena = TypeArena::new();
        let map = arena.alloc(Type::Map {
            key: t("string"),
            elem: t("int"),
        });
        let ptr = arena.alloc(Type::Pointer(map));
        let array = arena.alloc(Type::Array {
            len: 4,
            elem: ptr,
        });
        assert_eq!(arena.display(array, None).to_string(), "[4]*map[string]int");

        let recv = arena.alloc(Type::Chan {
            dir: ChanDir::Recv,
            elem: t("int"),
        });
        let chan = arena.alloc(Type::Chan {
            dir: ChanDir::Both,
            elem: recv,
        });
        assert_eq!(arena.display(chan, None).to_string(), "chan (<-chan int)");

        let strukt = arena.alloc(Type::Struct(vec![
            Field {
                name: "x".into(),
                pkg: None,
                ty: t("int"),
                embedded: false,
                tag: "json:\"x\"".into(),
            },
            Field {
                name: "error".into(),
                pkg: None,
                ty: t("error"),
                embedded: true,
                tag: String::new(),
            },
        ]));
        assert_eq!(
            arena.display(strukt, None).to_string(),
            "struct{x int \"json:\\\"x\\\"\"; error}"
        );
    }

    #[test]
    fn test_variadic_signature() {
        let mut arena = TypeArena::new();
        let any = arena.alloc(Type::Interface(InterfaceType::default()));
        let rest = arena.alloc(Type::Slice(any));
        let sig = arena.alloc(Type::Signature(Signature {
            params: vec![param("format", t("string")), param("a", rest)],
            results: vec![param("", t("string"))],
            variadic: true,
        }));
        assert_eq!(
            arena.display(sig, None).to_string(),
            "func(format string, a ...interface{}) string"
        );
    }

    #[test]
    fn test_unfilled_slot() {
        let mut arena = TypeArena::new();
        let hole = arena.reserve();
        let slice = arena.alloc(Type::Slice(hole));
        assert_eq!(arena.display(slice, None).to_string(), "[]invalid type");
    }
}
