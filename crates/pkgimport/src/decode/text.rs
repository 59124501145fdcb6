//! Legacy textual export data
//!
//! One declaration per line after the `$$` start line:
//!
//! ```text
//! package io
//! import errors "errors"
//! const SeekStart untyped int = 0
//! var EOF error
//! type Reader interface { Read(p []byte) (n int, err error) }
//! func (? *@"".LimitedReader) Read(p []byte) (n int, err error)
//! ```
//!
//! Qualified identifiers are written `@"path".name`; `@""` and bare names
//! refer to the package itself. Named types may be used before the line that
//! defines them.

use super::{
    ExportData, Local, PkgRef, RawDecl, RawField, RawFunc, RawMethod, RawObject, RawParam,
    RawSignature, RawType, TypeTable,
};
use crate::constant::ConstValue;
use crate::error::{DecodeError, DecodeErrorKind};
use crate::format::ExportFormat;
use crate::types::universe::{predeclared, PREDECLARED, UNSAFE_POINTER};
use crate::types::ChanDir;
use logos::Logos;
use rustc_hash::FxHashMap;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+")]
enum Tok {
    #[regex(r"\n")]
    Newline,

    // Keywords
    #[token("package")]
    Package,
    #[token("import")]
    Import,
    #[token("const")]
    Const,
    #[token("var")]
    Var,
    #[token("func")]
    Func,
    #[token("type")]
    Type,
    #[token("struct")]
    Struct,
    #[token("interface")]
    Interface,
    #[token("map")]
    Map,
    #[token("chan")]
    Chan,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[regex(r#""([^"\\\n]|\\.)*""#, unquote)]
    Str(String),

    #[regex(r"[0-9]+", |lex| lex.slice().to_string())]
    Int(String),

    #[regex(r"[0-9]+\.[0-9]*([eE][+-]?[0-9]+)?", |lex| lex.slice().to_string())]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+", |lex| lex.slice().to_string())]
    Float(String),

    #[regex(r"[0-9]+(\.[0-9]*)?([eE][+-]?[0-9]+)?i", |lex| {
        let s = lex.slice();
        s[..s.len() - 1].to_string()
    })]
    Imag(String),

    // Punctuation
    #[token("@")]
    At,
    #[token(".")]
    Dot,
    #[token("...")]
    Ellipsis,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("*")]
    Star,
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,
    #[token("=")]
    Assign,
    #[token("?")]
    Question,
    #[token("-")]
    Minus,
    #[token("+")]
    Plus,
    #[token("<-")]
    Arrow,
}

/// Undo the escapes of a quoted string literal
fn unquote(lex: &mut logos::Lexer<'_, Tok>) -> Option<String> {
    let s = lex.slice();
    let inner = &s[1..s.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            '\'' => out.push('\''),
            'x' => {
                let hex: String = chars.by_ref().take(2).collect();
                out.push(char::from(u8::from_str_radix(&hex, 16).ok()?));
            }
            'u' => {
                let hex: String = chars.by_ref().take(4).collect();
                out.push(char::from_u32(u32::from_str_radix(&hex, 16).ok()?)?);
            }
            _ => return None,
        }
    }
    Some(out)
}

/// Decode a textual span whose body starts at `body_offset`
pub(crate) fn decode(
    span: &[u8],
    body_offset: usize,
    max_depth: usize,
) -> Result<ExportData, DecodeError> {
    let body = span.get(body_offset..).unwrap_or_default();
    let source = std::str::from_utf8(body).map_err(|e| {
        DecodeError::new(body_offset + e.valid_up_to(), DecodeErrorKind::InvalidUtf8)
    })?;

    let mut tokens = Vec::new();
    let mut lexer = Tok::lexer(source);
    while let Some(tok) = lexer.next() {
        let offset = body_offset + lexer.span().start;
        match tok {
            Ok(tok) => tokens.push((tok, offset)),
            Err(()) => {
                return Err(DecodeError::new(
                    offset,
                    DecodeErrorKind::Syntax(format!("unexpected input {:?}", lexer.slice())),
                ))
            }
        }
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        end: span.len(),
        packages: Vec::new(),
        types: TypeTable::default(),
        named: FxHashMap::default(),
        names: FxHashMap::default(),
        defined: FxHashMap::default(),
        objects: Vec::new(),
        methods: Vec::new(),
        depth: 0,
        max_depth,
    };
    parser.file()?;

    tracing::trace!(
        types = parser.types.len(),
        objects = parser.objects.len(),
        methods = parser.methods.len(),
        "decoded textual export data"
    );
    Ok(ExportData {
        format: ExportFormat::LegacyText,
        packages: parser.packages,
        types: parser.types,
        objects: parser.objects,
        methods: parser.methods,
    })
}

struct Parser {
    tokens: Vec<(Tok, usize)>,
    pos: usize,
    /// Offset reported for errors at end of input
    end: usize,
    packages: Vec<PkgRef>,
    types: TypeTable,
    /// Named type slot by (package index, name)
    named: FxHashMap<(usize, String), Local>,
    /// Name of each named type slot
    names: FxHashMap<Local, String>,
    /// Named type slots that have a `type` declaration, with its offset
    defined: FxHashMap<Local, usize>,
    objects: Vec<RawObject>,
    methods: Vec<RawMethod>,
    depth: usize,
    max_depth: usize,
}

type PResult<T> = Result<T, DecodeError>;

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|(tok, _)| tok)
    }

    fn peek_at(&self, n: usize) -> Option<&Tok> {
        self.tokens.get(self.pos + n).map(|(tok, _)| tok)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|&(_, offset)| offset)
            .unwrap_or(self.end)
    }

    fn bump(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).map(|(tok, _)| tok.clone());
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    /// Step back over the token a `bump` returned, if it returned one
    fn rewind(&mut self, bumped: Option<Tok>) {
        if bumped.is_some() {
            self.pos -= 1;
        }
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn syntax(&self, expected: &str) -> DecodeError {
        let found = match self.peek() {
            Some(tok) => format!("{tok:?}"),
            None => "end of export data".to_string(),
        };
        DecodeError::new(
            self.offset(),
            DecodeErrorKind::Syntax(format!("expected {expected}, found {found}")),
        )
    }

    fn expect(&mut self, tok: Tok, expected: &str) -> PResult<()> {
        if self.eat(&tok) {
            Ok(())
        } else {
            Err(self.syntax(expected))
        }
    }

    fn ident(&mut self) -> PResult<String> {
        match self.peek() {
            Some(Tok::Ident(_)) => match self.bump() {
                Some(Tok::Ident(name)) => Ok(name),
                _ => Err(self.syntax("identifier")),
            },
            _ => Err(self.syntax("identifier")),
        }
    }

    fn string(&mut self) -> PResult<String> {
        match self.peek() {
            Some(Tok::Str(_)) => match self.bump() {
                Some(Tok::Str(s)) => Ok(s),
                _ => Err(self.syntax("string")),
            },
            _ => Err(self.syntax("string")),
        }
    }

    fn skip_newlines(&mut self) {
        while self.eat(&Tok::Newline) {}
    }

    fn end_of_decl(&mut self) -> PResult<()> {
        if self.peek().is_none() || self.eat(&Tok::Newline) {
            Ok(())
        } else {
            Err(self.syntax("end of line"))
        }
    }

    fn file(&mut self) -> PResult<()> {
        self.skip_newlines();
        self.expect(Tok::Package, "package clause")?;
        let name = self.ident()?;
        self.packages.push(PkgRef {
            name,
            path: String::new(),
        });
        self.end_of_decl()?;

        loop {
            self.skip_newlines();
            let offset = self.offset();
            match self.bump() {
                None => break,
                Some(Tok::Import) => {
                    let name = self.ident()?;
                    let path = self.string()?;
                    let index = self.package(&path);
                    if index != 0 {
                        self.packages[index].name = name;
                    }
                }
                Some(Tok::Const) => self.const_decl(offset)?,
                Some(Tok::Var) => {
                    let (pkg, name) = self.qualified()?;
                    let ty = self.ty()?;
                    self.push_object(pkg, name, RawDecl::Var { ty }, offset);
                }
                Some(Tok::Type) => self.type_decl(offset)?,
                Some(Tok::Func) if self.peek() == Some(&Tok::LParen) => self.method_decl(offset)?,
                Some(Tok::Func) => {
                    let (pkg, name) = self.qualified()?;
                    let sig = self.signature()?;
                    self.push_object(pkg, name, RawDecl::Func { sig }, offset);
                }
                Some(_) => {
                    self.pos -= 1;
                    return Err(self.syntax("declaration"));
                }
            }
            self.end_of_decl()?;
        }

        // every named type used must have been declared
        let mut missing: Vec<(Local, usize)> = self
            .named
            .values()
            .filter(|&&local| !self.defined.contains_key(&local))
            .map(|&local| (local, self.first_use(local)))
            .collect();
        missing.sort_unstable_by_key(|&(_, offset)| offset);
        if let Some(&(local, offset)) = missing.first() {
            return Err(DecodeError::new(offset, DecodeErrorKind::DanglingType(local)));
        }
        Ok(())
    }

    fn first_use(&self, local: Local) -> usize {
        self.types.offset_of(local)
    }

    fn push_object(&mut self, pkg: usize, name: String, decl: RawDecl, offset: usize) {
        self.objects.push(RawObject {
            pkg,
            name,
            decl,
            pos: None,
            offset,
        });
    }

    /// Index of the package with `path`, adding it if new
    fn package(&mut self, path: &str) -> usize {
        if path.is_empty() {
            return 0;
        }
        if let Some(i) = self.packages.iter().position(|p| p.path == path) {
            return i;
        }
        self.packages.push(PkgRef {
            name: String::new(),
            path: path.to_string(),
        });
        self.packages.len() - 1
    }

    /// `@"path".name` or a bare name of this package
    fn qualified(&mut self) -> PResult<(usize, String)> {
        if self.eat(&Tok::At) {
            let path = self.string()?;
            self.expect(Tok::Dot, "'.'")?;
            let name = self.ident()?;
            return Ok((self.package(&path), name));
        }
        Ok((0, self.ident()?))
    }

    /// The slot of a named type, reserved on first mention
    fn named_slot(&mut self, pkg: usize, name: String, offset: usize) -> Local {
        if let Some(&local) = self.named.get(&(pkg, name.clone())) {
            self.types.note_ref(local, offset);
            return local;
        }
        let local = self.types.reserve(offset);
        self.names.insert(local, name.clone());
        self.named.insert((pkg, name), local);
        local
    }

    fn const_decl(&mut self, offset: usize) -> PResult<()> {
        let (pkg, name) = self.qualified()?;
        let ty = if self.peek() == Some(&Tok::Assign) {
            None
        } else {
            Some(self.ty()?)
        };
        self.expect(Tok::Assign, "'='")?;
        let value_offset = self.offset();
        let value = self.value()?;
        let ty = match ty {
            Some(ty) => ty,
            None => default_type(&value).ok_or_else(|| {
                DecodeError::new(
                    value_offset,
                    DecodeErrorKind::Syntax("constant without type".to_string()),
                )
            })?,
        };
        self.push_object(pkg, name, RawDecl::Const { ty, value }, offset);
        Ok(())
    }

    fn type_decl(&mut self, offset: usize) -> PResult<()> {
        let (pkg, name) = self.qualified()?;
        if self.packages.get(pkg).is_some_and(|p| p.path == "unsafe") {
            return Err(DecodeError::new(offset, DecodeErrorKind::Redefined(name)));
        }
        let local = self.named_slot(pkg, name.clone(), offset);
        if self.defined.insert(local, offset).is_some() {
            return Err(DecodeError::new(offset, DecodeErrorKind::Redefined(name)));
        }
        let underlying = self.ty()?;
        self.types.fill(
            local,
            RawType::Named {
                pkg,
                name: name.clone(),
                underlying,
            },
        );
        self.push_object(pkg, name, RawDecl::TypeName { ty: local }, offset);
        Ok(())
    }

    /// `func (recv) Name(params) results`
    fn method_decl(&mut self, offset: usize) -> PResult<()> {
        self.expect(Tok::LParen, "'('")?;
        // optional receiver name
        let named_recv = matches!(self.peek(), Some(Tok::Ident(_)))
            && matches!(self.peek_at(1), Some(Tok::Ident(_) | Tok::Star | Tok::At));
        if named_recv || self.peek() == Some(&Tok::Question) {
            self.pos += 1;
        }
        let pointer = self.eat(&Tok::Star);
        let recv = self.type_name()?;
        self.expect(Tok::RParen, "')'")?;
        let name = self.ident()?;
        let sig = self.signature()?;
        self.methods.push(RawMethod {
            recv,
            pointer,
            name,
            sig,
            offset,
        });
        Ok(())
    }

    /// A predeclared or named type written as a name
    fn type_name(&mut self) -> PResult<Local> {
        let offset = self.offset();
        let (pkg, name) = self.qualified()?;
        if pkg == 0 {
            if let Some(id) = predeclared(&name) {
                return Ok(id.as_u32());
            }
        }
        if self.packages.get(pkg).is_some_and(|p| p.path == "unsafe") && name == "Pointer" {
            return Ok(UNSAFE_POINTER.as_u32());
        }
        Ok(self.named_slot(pkg, name, offset))
    }

    fn ty(&mut self) -> PResult<Local> {
        let offset = self.offset();
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(DecodeError::new(
                offset,
                DecodeErrorKind::TooDeep(self.max_depth),
            ));
        }
        let local = self.ty_inner(offset)?;
        self.depth -= 1;
        Ok(local)
    }

    fn ty_inner(&mut self, offset: usize) -> PResult<Local> {
        match self.peek() {
            Some(Tok::Ident(name)) if name == "untyped" => {
                self.pos += 1;
                let kind = self.ident()?;
                predeclared(&format!("untyped {kind}"))
                    .map(|id| id.as_u32())
                    .ok_or_else(|| {
                        DecodeError::new(
                            offset,
                            DecodeErrorKind::Syntax(format!("unknown untyped kind {kind}")),
                        )
                    })
            }
            Some(Tok::Ident(_)) | Some(Tok::At) => self.type_name(),
            Some(Tok::LParen) => {
                self.pos += 1;
                let ty = self.ty()?;
                self.expect(Tok::RParen, "')'")?;
                Ok(ty)
            }
            Some(Tok::Star) => {
                self.pos += 1;
                let local = self.types.reserve(offset);
                let elem = self.ty()?;
                self.types.fill(local, RawType::Pointer(elem));
                Ok(local)
            }
            Some(Tok::LBracket) => {
                self.pos += 1;
                let local = self.types.reserve(offset);
                let ty = match self.bump() {
                    Some(Tok::RBracket) => RawType::Slice(self.ty()?),
                    Some(Tok::Int(len)) => {
                        let len = len.parse::<u64>().map_err(|_| {
                            DecodeError::new(
                                offset,
                                DecodeErrorKind::Syntax(format!("array length {len}")),
                            )
                        })?;
                        self.expect(Tok::RBracket, "']'")?;
                        RawType::Array {
                            len,
                            elem: self.ty()?,
                        }
                    }
                    other => {
                        self.rewind(other);
                        return Err(self.syntax("']' or array length"));
                    }
                };
                self.types.fill(local, ty);
                Ok(local)
            }
            Some(Tok::Map) => {
                self.pos += 1;
                let local = self.types.reserve(offset);
                self.expect(Tok::LBracket, "'['")?;
                let key = self.ty()?;
                self.expect(Tok::RBracket, "']'")?;
                let elem = self.ty()?;
                self.types.fill(local, RawType::Map { key, elem });
                Ok(local)
            }
            Some(Tok::Chan) | Some(Tok::Arrow) => {
                let dir = if self.eat(&Tok::Arrow) {
                    self.expect(Tok::Chan, "'chan'")?;
                    ChanDir::Recv
                } else {
                    self.pos += 1;
                    if self.eat(&Tok::Arrow) {
                        ChanDir::Send
                    } else {
                        ChanDir::Both
                    }
                };
                let local = self.types.reserve(offset);
                let elem = self.ty()?;
                self.types.fill(local, RawType::Chan { dir, elem });
                Ok(local)
            }
            Some(Tok::Func) => {
                self.pos += 1;
                let local = self.types.reserve(offset);
                let sig = self.signature()?;
                self.types.fill(local, RawType::Signature(sig));
                Ok(local)
            }
            Some(Tok::Struct) => {
                self.pos += 1;
                let local = self.types.reserve(offset);
                let fields = self.fields()?;
                self.types.fill(local, RawType::Struct(fields));
                Ok(local)
            }
            Some(Tok::Interface) => {
                self.pos += 1;
                let local = self.types.reserve(offset);
                let (embedded, methods) = self.interface_body()?;
                self.types.fill(local, RawType::Interface { embedded, methods });
                Ok(local)
            }
            _ => Err(self.syntax("type")),
        }
    }

    /// Whether the next token can start a type
    fn at_type(&self) -> bool {
        self.type_starts_at(0)
    }

    /// Whether the token `n` ahead can start a type
    fn type_starts_at(&self, n: usize) -> bool {
        matches!(
            self.peek_at(n),
            Some(
                Tok::Ident(_)
                    | Tok::At
                    | Tok::LParen
                    | Tok::Star
                    | Tok::LBracket
                    | Tok::Map
                    | Tok::Chan
                    | Tok::Arrow
                    | Tok::Func
                    | Tok::Struct
                    | Tok::Interface
            )
        )
    }

    /// Name an embedded field gets from its type
    fn embedded_name(&self, local: Local) -> String {
        let local = match self.types.get(local) {
            Some(RawType::Pointer(elem)) => *elem,
            _ => local,
        };
        if let Some(name) = self.names.get(&local) {
            return name.clone();
        }
        let name = PREDECLARED.get(local as usize).copied().unwrap_or("");
        name.rsplit('.').next().unwrap_or(name).to_string()
    }

    fn fields(&mut self) -> PResult<Vec<RawField>> {
        self.expect(Tok::LBrace, "'{'")?;
        let mut fields = Vec::new();
        while !self.eat(&Tok::RBrace) {
            if !fields.is_empty() {
                self.expect(Tok::Semi, "';' or '}'")?;
                if self.eat(&Tok::RBrace) {
                    break;
                }
            }
            let field = if self.eat(&Tok::Question) {
                let ty = self.ty()?;
                RawField {
                    name: self.embedded_name(ty),
                    ty,
                    embedded: true,
                    tag: String::new(),
                }
            } else {
                let name = self.ident()?;
                let ty = self.ty()?;
                RawField {
                    name,
                    ty,
                    embedded: false,
                    tag: String::new(),
                }
            };
            let tag = if matches!(self.peek(), Some(Tok::Str(_))) {
                self.string()?
            } else {
                String::new()
            };
            fields.push(RawField { tag, ..field });
        }
        Ok(fields)
    }

    fn interface_body(&mut self) -> PResult<(Vec<Local>, Vec<RawFunc>)> {
        self.expect(Tok::LBrace, "'{'")?;
        let mut embedded = Vec::new();
        let mut methods = Vec::new();
        let mut first = true;
        while !self.eat(&Tok::RBrace) {
            if !first {
                self.expect(Tok::Semi, "';' or '}'")?;
                if self.eat(&Tok::RBrace) {
                    break;
                }
            }
            first = false;
            if self.eat(&Tok::Question) {
                embedded.push(self.ty()?);
            } else {
                let name = self.ident()?;
                let sig = self.signature()?;
                methods.push(RawFunc { name, sig });
            }
        }
        Ok((embedded, methods))
    }

    /// `(params) results`
    fn signature(&mut self) -> PResult<RawSignature> {
        let (params, variadic) = self.params(true)?;
        let results = if self.peek() == Some(&Tok::LParen) {
            self.params(false)?.0
        } else if self.at_type() {
            vec![RawParam {
                name: String::new(),
                ty: self.ty()?,
            }]
        } else {
            Vec::new()
        };
        Ok(RawSignature {
            params,
            results,
            variadic,
        })
    }

    fn params(&mut self, allow_variadic: bool) -> PResult<(Vec<RawParam>, bool)> {
        self.expect(Tok::LParen, "'('")?;
        let mut params = Vec::new();
        let mut variadic = false;
        while !self.eat(&Tok::RParen) {
            if !params.is_empty() {
                if variadic {
                    return Err(self.syntax("')' after variadic parameter"));
                }
                self.expect(Tok::Comma, "',' or ')'")?;
            }
            // `name T`, `name ...T`, `? T` or a bare type
            let named = matches!(self.peek(), Some(Tok::Ident(_)))
                && (self.type_starts_at(1) || self.peek_at(1) == Some(&Tok::Ellipsis));
            let name = if named {
                self.ident()?
            } else {
                self.eat(&Tok::Question);
                String::new()
            };
            let ty = if allow_variadic && self.peek() == Some(&Tok::Ellipsis) {
                let offset = self.offset();
                self.pos += 1;
                variadic = true;
                let local = self.types.reserve(offset);
                let elem = self.ty()?;
                self.types.fill(local, RawType::Slice(elem));
                local
            } else {
                self.ty()?
            };
            params.push(RawParam { name, ty });
        }
        Ok((params, variadic))
    }

    fn number(&mut self) -> PResult<(String, bool)> {
        let negative = self.eat(&Tok::Minus);
        let sign = if negative { "-" } else { "" };
        match self.bump() {
            Some(Tok::Int(digits)) => Ok((format!("{sign}{}", trim_zeros(&digits)), false)),
            Some(Tok::Float(text)) => Ok((format!("{sign}{text}"), true)),
            other => {
                self.rewind(other);
                Err(self.syntax("number"))
            }
        }
    }

    fn value(&mut self) -> PResult<ConstValue> {
        match self.peek() {
            Some(Tok::Ident(name)) if name == "true" || name == "false" => {
                let b = name == "true";
                self.pos += 1;
                Ok(ConstValue::Bool(b))
            }
            Some(Tok::Str(_)) => Ok(ConstValue::String(self.string()?)),
            Some(Tok::LParen) => {
                self.pos += 1;
                let (re, _) = self.number()?;
                let negative = match self.bump() {
                    Some(Tok::Plus) => false,
                    Some(Tok::Minus) => true,
                    other => {
                        self.rewind(other);
                        return Err(self.syntax("'+' or '-'"));
                    }
                };
                let im = match self.bump() {
                    Some(Tok::Imag(text)) if negative => format!("-{text}"),
                    Some(Tok::Imag(text)) => text,
                    other => {
                        self.rewind(other);
                        return Err(self.syntax("imaginary part"));
                    }
                };
                self.expect(Tok::RParen, "')'")?;
                Ok(ConstValue::Complex(re, im))
            }
            _ => match self.number()? {
                (text, false) => Ok(ConstValue::Int(text)),
                (text, true) => Ok(ConstValue::Float(text)),
            },
        }
    }
}

fn trim_zeros(digits: &str) -> &str {
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        "0"
    } else {
        trimmed
    }
}

/// The untyped type a constant without an explicit type takes
fn default_type(value: &ConstValue) -> Option<Local> {
    let name = match value {
        ConstValue::Bool(_) => "untyped bool",
        ConstValue::String(_) => "untyped string",
        ConstValue::Int(_) => "untyped int",
        ConstValue::Float(_) => "untyped float",
        ConstValue::Complex(..) => "untyped complex",
        ConstValue::Unknown => return None,
    };
    predeclared(name).map(|id| id.as_u32())
}
