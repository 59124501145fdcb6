//! Binary export data
//!
//! Layout after the header: the package's own reference, the imported
//! package references, the objects, the methods and an end tag. Types are
//! written inline at their first use and referred to by index afterwards.

use super::{
    ExportData, Local, PkgRef, RawDecl, RawField, RawFunc, RawMethod, RawObject, RawParam,
    RawSignature, RawType, TypeTable,
};
use crate::constant::{binary_float_to_decimal, magnitude_to_decimal, ConstValue};
use crate::error::{DecodeError, DecodeErrorKind};
use crate::format::ExportFormat;
use crate::package::Position;
use crate::reader::ExportReader;
use crate::types::ChanDir;

// Package reference
pub(crate) const PACKAGE_TAG: i64 = -1;

// Objects
pub(crate) const CONST_TAG: i64 = -2;
pub(crate) const TYPE_TAG: i64 = -3;
pub(crate) const VAR_TAG: i64 = -4;
pub(crate) const FUNC_TAG: i64 = -5;
pub(crate) const END_TAG: i64 = -6;

// Types
pub(crate) const NAMED_TAG: i64 = -7;
pub(crate) const ARRAY_TAG: i64 = -8;
pub(crate) const SLICE_TAG: i64 = -9;
pub(crate) const STRUCT_TAG: i64 = -10;
pub(crate) const POINTER_TAG: i64 = -11;
pub(crate) const SIGNATURE_TAG: i64 = -12;
pub(crate) const INTERFACE_TAG: i64 = -13;
pub(crate) const MAP_TAG: i64 = -14;
pub(crate) const CHAN_TAG: i64 = -15;

// Values
pub(crate) const FALSE_TAG: i64 = -16;
pub(crate) const TRUE_TAG: i64 = -17;
pub(crate) const INT64_TAG: i64 = -18;
pub(crate) const BIGINT_TAG: i64 = -19;
pub(crate) const FLOAT_TAG: i64 = -20;
pub(crate) const FRACTION_TAG: i64 = -21;
pub(crate) const COMPLEX_TAG: i64 = -22;
pub(crate) const STRING_TAG: i64 = -23;
pub(crate) const UNKNOWN_TAG: i64 = -24;

/// Decode a binary span whose body starts at `body_offset`
pub(crate) fn decode(
    span: &[u8],
    format: ExportFormat,
    body_offset: usize,
    max_depth: usize,
) -> Result<ExportData, DecodeError> {
    let mut d = Decoder {
        r: ExportReader::escaped(span, body_offset),
        interned: format == ExportFormat::BinaryV2,
        strings: vec![String::new()],
        packages: Vec::new(),
        types: TypeTable::default(),
        depth: 0,
        max_depth,
        last_file: String::new(),
        last_line: 0,
    };

    let offset = d.r.position();
    if d.pkg_ref()? != 0 {
        return Err(DecodeError::new(
            offset,
            DecodeErrorKind::InvalidIndex {
                what: "package",
                index: 0,
            },
        ));
    }
    for _ in 0..d.count()? {
        d.pkg_ref()?;
    }

    let mut objects = Vec::new();
    for _ in 0..d.count()? {
        objects.push(d.object()?);
    }
    let mut methods = Vec::new();
    for _ in 0..d.count()? {
        methods.push(d.method()?);
    }

    let offset = d.r.position();
    let tag = d.r.read_varint()?;
    if tag != END_TAG {
        return Err(DecodeError::new(offset, DecodeErrorKind::InvalidTag(tag)));
    }
    if d.r.has_more() {
        return Err(d.r.error(DecodeErrorKind::TrailingData));
    }

    tracing::trace!(
        types = d.types.len(),
        objects = objects.len(),
        methods = methods.len(),
        "decoded binary export data"
    );
    Ok(ExportData {
        format,
        packages: d.packages,
        types: d.types,
        objects,
        methods,
    })
}

struct Decoder<'a> {
    r: ExportReader<'a>,
    /// Version 2 interns strings
    interned: bool,
    strings: Vec<String>,
    packages: Vec<PkgRef>,
    types: TypeTable,
    depth: usize,
    max_depth: usize,
    last_file: String,
    last_line: i64,
}

impl Decoder<'_> {
    fn int(&mut self) -> Result<i64, DecodeError> {
        self.r.read_varint()
    }

    /// A non-negative count
    fn count(&mut self) -> Result<usize, DecodeError> {
        let offset = self.r.position();
        let n = self.int()?;
        usize::try_from(n).map_err(|_| DecodeError::new(offset, DecodeErrorKind::NegativeLength(n)))
    }

    fn bool(&mut self) -> Result<bool, DecodeError> {
        let offset = self.r.position();
        match self.int()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(DecodeError::new(
                offset,
                DecodeErrorKind::InvalidIndex {
                    what: "bool",
                    index: other,
                },
            )),
        }
    }

    fn string(&mut self) -> Result<String, DecodeError> {
        if !self.interned {
            return self.r.read_string();
        }
        let offset = self.r.position();
        let i = self.int()?;
        if i >= 0 {
            return usize::try_from(i)
                .ok()
                .and_then(|i| self.strings.get(i))
                .cloned()
                .ok_or_else(|| {
                    DecodeError::new(
                        offset,
                        DecodeErrorKind::InvalidIndex {
                            what: "string",
                            index: i,
                        },
                    )
                });
        }
        let len = usize::try_from(i.unsigned_abs())
            .map_err(|_| DecodeError::new(offset, DecodeErrorKind::UnexpectedEnd))?;
        let s = self.r.read_str(len)?;
        self.strings.push(s.clone());
        Ok(s)
    }

    /// Raw bytes: a uvarint length followed by the bytes
    fn bytes(&mut self) -> Result<Vec<u8>, DecodeError> {
        let len = self.r.read_uvarint()?;
        let len = usize::try_from(len).map_err(|_| self.r.error(DecodeErrorKind::UnexpectedEnd))?;
        self.r.read_bytes(len)
    }

    fn pkg_ref(&mut self) -> Result<usize, DecodeError> {
        let offset = self.r.position();
        let i = self.int()?;
        if i >= 0 {
            return usize::try_from(i)
                .ok()
                .filter(|&i| i < self.packages.len())
                .ok_or_else(|| {
                    DecodeError::new(
                        offset,
                        DecodeErrorKind::InvalidIndex {
                            what: "package",
                            index: i,
                        },
                    )
                });
        }
        if i != PACKAGE_TAG {
            return Err(DecodeError::new(offset, DecodeErrorKind::InvalidTag(i)));
        }
        let name = self.string()?;
        let path = self.string()?;
        self.packages.push(PkgRef { name, path });
        Ok(self.packages.len() - 1)
    }

    fn pos(&mut self) -> Result<Option<Position>, DecodeError> {
        if !self.interned {
            return Ok(None);
        }
        let file = self.string()?;
        if !file.is_empty() {
            self.last_file = file;
        }
        self.last_line = self.last_line.saturating_add(self.int()?);
        Ok(Some(Position {
            file: self.last_file.clone(),
            line: u32::try_from(self.last_line).unwrap_or(0),
        }))
    }

    fn object(&mut self) -> Result<RawObject, DecodeError> {
        let offset = self.r.position();
        let tag = self.int()?;
        if !matches!(tag, CONST_TAG | TYPE_TAG | VAR_TAG | FUNC_TAG) {
            return Err(DecodeError::new(offset, DecodeErrorKind::InvalidTag(tag)));
        }
        let pos = self.pos()?;
        let pkg = self.pkg_ref()?;
        let name = self.string()?;
        let decl = match tag {
            CONST_TAG => {
                let ty = self.type_ref()?;
                let value = self.value()?;
                RawDecl::Const { ty, value }
            }
            VAR_TAG => RawDecl::Var {
                ty: self.type_ref()?,
            },
            FUNC_TAG => RawDecl::Func {
                sig: self.signature()?,
            },
            _ => RawDecl::TypeName {
                ty: self.type_ref()?,
            },
        };
        Ok(RawObject {
            pkg,
            name,
            decl,
            pos,
            offset,
        })
    }

    fn method(&mut self) -> Result<RawMethod, DecodeError> {
        let offset = self.r.position();
        let recv = self.type_ref()?;
        let pointer = self.bool()?;
        let name = self.string()?;
        let sig = self.signature()?;
        Ok(RawMethod {
            recv,
            pointer,
            name,
            sig,
            offset,
        })
    }

    fn type_ref(&mut self) -> Result<Local, DecodeError> {
        let offset = self.r.position();
        let i = self.int()?;
        if i >= 0 {
            let local = u32::try_from(i).map_err(|_| {
                DecodeError::new(
                    offset,
                    DecodeErrorKind::InvalidIndex {
                        what: "type",
                        index: i,
                    },
                )
            })?;
            self.types.note_ref(local, offset);
            return Ok(local);
        }

        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(DecodeError::new(
                offset,
                DecodeErrorKind::TooDeep(self.max_depth),
            ));
        }
        // the slot exists before the body so the body can refer to it
        let local = self.types.reserve(offset);
        let ty = self.type_body(i, offset)?;
        self.types.fill(local, ty);
        self.depth -= 1;
        Ok(local)
    }

    fn type_body(&mut self, tag: i64, offset: usize) -> Result<RawType, DecodeError> {
        let ty = match tag {
            NAMED_TAG => {
                let pkg = self.pkg_ref()?;
                let name = self.string()?;
                let underlying = self.type_ref()?;
                RawType::Named {
                    pkg,
                    name,
                    underlying,
                }
            }
            ARRAY_TAG => {
                let len_offset = self.r.position();
                let len = self.int()?;
                let len = u64::try_from(len).map_err(|_| {
                    DecodeError::new(len_offset, DecodeErrorKind::NegativeLength(len))
                })?;
                RawType::Array {
                    len,
                    elem: self.type_ref()?,
                }
            }
            SLICE_TAG => RawType::Slice(self.type_ref()?),
            POINTER_TAG => RawType::Pointer(self.type_ref()?),
            STRUCT_TAG => {
                let mut fields = Vec::new();
                for _ in 0..self.count()? {
                    let name = self.string()?;
                    let ty = self.type_ref()?;
                    let embedded = self.bool()?;
                    let tag = self.string()?;
                    fields.push(RawField {
                        name,
                        ty,
                        embedded,
                        tag,
                    });
                }
                RawType::Struct(fields)
            }
            SIGNATURE_TAG => RawType::Signature(self.signature()?),
            INTERFACE_TAG => {
                let mut embedded = Vec::new();
                for _ in 0..self.count()? {
                    embedded.push(self.type_ref()?);
                }
                let mut methods = Vec::new();
                for _ in 0..self.count()? {
                    let name = self.string()?;
                    let sig = self.signature()?;
                    methods.push(RawFunc { name, sig });
                }
                RawType::Interface { embedded, methods }
            }
            MAP_TAG => {
                let key = self.type_ref()?;
                let elem = self.type_ref()?;
                RawType::Map { key, elem }
            }
            CHAN_TAG => {
                let dir_offset = self.r.position();
                let dir = match self.int()? {
                    0 => ChanDir::Both,
                    1 => ChanDir::Send,
                    2 => ChanDir::Recv,
                    other => {
                        return Err(DecodeError::new(
                            dir_offset,
                            DecodeErrorKind::InvalidIndex {
                                what: "channel direction",
                                index: other,
                            },
                        ))
                    }
                };
                RawType::Chan {
                    dir,
                    elem: self.type_ref()?,
                }
            }
            other => return Err(DecodeError::new(offset, DecodeErrorKind::InvalidTag(other))),
        };
        Ok(ty)
    }

    fn params(&mut self) -> Result<Vec<RawParam>, DecodeError> {
        let mut params = Vec::new();
        for _ in 0..self.count()? {
            let name = self.string()?;
            let ty = self.type_ref()?;
            params.push(RawParam { name, ty });
        }
        Ok(params)
    }

    fn signature(&mut self) -> Result<RawSignature, DecodeError> {
        let params = self.params()?;
        let results = self.params()?;
        let variadic = self.bool()?;
        Ok(RawSignature {
            params,
            results,
            variadic,
        })
    }

    fn value(&mut self) -> Result<ConstValue, DecodeError> {
        let offset = self.r.position();
        let tag = self.int()?;
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(DecodeError::new(
                offset,
                DecodeErrorKind::TooDeep(self.max_depth),
            ));
        }
        let value = match tag {
            FALSE_TAG => ConstValue::Bool(false),
            TRUE_TAG => ConstValue::Bool(true),
            INT64_TAG => ConstValue::Int(self.int()?.to_string()),
            BIGINT_TAG => {
                let negative = self.int()? < 0;
                let digits = magnitude_to_decimal(&self.bytes()?);
                if negative && digits != "0" {
                    ConstValue::Int(format!("-{digits}"))
                } else {
                    ConstValue::Int(digits)
                }
            }
            FLOAT_TAG => {
                let sign = self.int()?;
                if sign == 0 {
                    ConstValue::Float("0".to_string())
                } else {
                    let exp = self.int()?;
                    let mantissa = self.bytes()?;
                    ConstValue::Float(binary_float_to_decimal(sign < 0, &mantissa, exp))
                }
            }
            FRACTION_TAG => match (self.value()?, self.value()?) {
                (ConstValue::Int(num), ConstValue::Int(den)) => {
                    ConstValue::Float(format!("{num}/{den}"))
                }
                _ => return Err(DecodeError::new(offset, DecodeErrorKind::InvalidTag(tag))),
            },
            COMPLEX_TAG => match (self.value()?.exact_text(), self.value()?.exact_text()) {
                (Some(re), Some(im)) => ConstValue::Complex(re, im),
                _ => return Err(DecodeError::new(offset, DecodeErrorKind::InvalidTag(tag))),
            },
            STRING_TAG => ConstValue::String(self.string()?),
            UNKNOWN_TAG => ConstValue::Unknown,
            other => return Err(DecodeError::new(offset, DecodeErrorKind::InvalidTag(other))),
        };
        self.depth -= 1;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::sniff;
    use crate::testutil::ExportWriter;
    use crate::types::universe::{predeclared, PREDECLARED_COUNT};

    fn t(name: &str) -> i64 {
        i64::from(predeclared(name).unwrap().as_u32())
    }

    fn decode_span(span: &[u8]) -> Result<ExportData, DecodeError> {
        let sniffed = sniff(span, true).unwrap();
        let data = decode(span, sniffed.format, sniffed.body_offset, 64)?;
        data.validate()?;
        Ok(data)
    }

    #[test]
    fn test_empty_package() {
        let mut w = ExportWriter::v1();
        w.new_pkg("p", "").int(0).int(0).int(0).tag(END_TAG);
        let data = decode_span(&w.finish()).unwrap();

        assert_eq!(data.format, ExportFormat::BinaryV1);
        assert_eq!(data.packages[0].name, "p");
        assert!(data.objects.is_empty());
        assert_eq!(data.types.len(), 0);
    }

    #[test]
    fn test_const_and_func_v2() {
        // const Pi untyped float = 3.14...; func Sin(x float64) float64
        let mut w = ExportWriter::v2();
        w.new_pkg("math", "").int(0);
        w.int(2);
        w.tag(CONST_TAG).string("math.go").int(10).pkg(0).string("Pi");
        w.int(t("untyped float"));
        w.tag(FLOAT_TAG).int(1).int(-51);
        w.bytes(&7074237752028440u64.to_be_bytes());
        w.tag(FUNC_TAG).string("").int(5).pkg(0).string("Sin");
        w.int(1).string("x").int(t("float64"));
        w.int(1).string("").int(t("float64"));
        w.bool(false);
        w.int(0).tag(END_TAG);

        let data = decode_span(&w.finish()).unwrap();
        assert_eq!(data.objects.len(), 2);

        let pi = &data.objects[0];
        assert_eq!(pi.name, "Pi");
        assert_eq!(pi.pos.as_ref().unwrap().to_string(), "math.go:10");
        match &pi.decl {
            RawDecl::Const {
                value: ConstValue::Float(text),
                ..
            } => assert!(text.starts_with("3.14159265358979311")),
            other => panic!("unexpected {other:?}"),
        }

        let sin = &data.objects[1];
        assert_eq!(sin.pos.as_ref().unwrap().to_string(), "math.go:15");
        match &sin.decl {
            RawDecl::Func { sig } => {
                assert_eq!(sig.params[0].name, "x");
                assert_eq!(sig.results.len(), 1);
                assert!(!sig.variadic);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_interned_strings_are_reused() {
        let mut w = ExportWriter::v2();
        w.new_pkg("p", "").int(0);
        w.int(2);
        for name in ["A", "B"] {
            w.tag(VAR_TAG).string("p.go").int(1).pkg(0).string(name);
            w.int(t("int"));
        }
        w.int(0).tag(END_TAG);
        let data = decode_span(&w.finish()).unwrap();
        assert_eq!(data.objects[1].pos.as_ref().unwrap().file, "p.go");
        assert_eq!(data.objects[1].pos.as_ref().unwrap().line, 2);
    }

    #[test]
    fn test_self_referential_definition() {
        // type Node struct { next *Node }
        let node = i64::from(PREDECLARED_COUNT);
        let mut w = ExportWriter::v1();
        w.new_pkg("list", "").int(0);
        w.int(1);
        w.tag(TYPE_TAG).pkg(0).string("Node");
        w.tag(NAMED_TAG).pkg(0).string("Node");
        w.tag(STRUCT_TAG).int(1).string("next");
        w.tag(POINTER_TAG).int(node);
        w.bool(false).string("");
        w.int(0).tag(END_TAG);

        let data = decode_span(&w.finish()).unwrap();
        let node = node as Local;
        assert!(matches!(
            data.types.get(node),
            Some(RawType::Named { underlying, .. }) if *underlying == node + 1
        ));
        assert_eq!(data.types.get(node + 2), Some(&RawType::Pointer(node)));
    }

    #[test]
    fn test_forward_reference_resolves() {
        // var P *T declared before type T
        let first = i64::from(PREDECLARED_COUNT);
        let mut w = ExportWriter::v1();
        w.new_pkg("p", "").int(0);
        w.int(2);
        w.tag(VAR_TAG).pkg(0).string("P");
        w.tag(POINTER_TAG).int(first + 1);
        w.tag(TYPE_TAG).pkg(0).string("T");
        w.tag(NAMED_TAG).pkg(0).string("T").int(t("int"));
        w.int(0).tag(END_TAG);

        let data = decode_span(&w.finish()).unwrap();
        assert_eq!(data.types.len(), 2);
    }

    #[test]
    fn test_dangling_reference_is_reported() {
        let mut w = ExportWriter::v1();
        w.new_pkg("p", "").int(0);
        w.int(1);
        w.tag(VAR_TAG).pkg(0).string("X");
        w.int(i64::from(PREDECLARED_COUNT) + 3);
        w.int(0).tag(END_TAG);

        let err = decode_span(&w.finish()).unwrap_err();
        assert_eq!(
            err.kind,
            DecodeErrorKind::DanglingType(PREDECLARED_COUNT + 3)
        );
    }

    #[test]
    fn test_invalid_type_tag() {
        let mut w = ExportWriter::v1();
        w.new_pkg("p", "").int(0);
        w.int(1);
        w.tag(VAR_TAG).pkg(0).string("X");
        w.tag(-99);
        let err = decode_span(&w.finish()).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::InvalidTag(-99));
    }

    #[test]
    fn test_truncated_span() {
        let mut w = ExportWriter::v1();
        w.new_pkg("p", "").int(0);
        w.int(1);
        w.tag(VAR_TAG).pkg(0).string("X");
        w.tag(SLICE_TAG);
        let err = decode_span(&w.finish()).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::UnexpectedEnd);
    }

    #[test]
    fn test_trailing_data() {
        let mut w = ExportWriter::v1();
        w.new_pkg("p", "").int(0).int(0).int(0).tag(END_TAG).int(7);
        let err = decode_span(&w.finish()).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::TrailingData);
    }

    #[test]
    fn test_depth_limit() {
        let mut w = ExportWriter::v1();
        w.new_pkg("p", "").int(0);
        w.int(1);
        w.tag(VAR_TAG).pkg(0).string("X");
        for _ in 0..100 {
            w.tag(SLICE_TAG);
        }
        w.int(t("int"));
        w.int(0).tag(END_TAG);
        let err = decode_span(&w.finish()).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::TooDeep(64));
    }

    #[test]
    fn test_escaped_string_value() {
        let mut w = ExportWriter::v1();
        w.new_pkg("p", "").int(0);
        w.int(1);
        w.tag(CONST_TAG).pkg(0).string("Dollar");
        w.int(t("untyped string"));
        w.tag(STRING_TAG).string("$$|");
        w.int(0).tag(END_TAG);

        let span = w.finish();
        assert!(!span[4..].windows(2).any(|w| w == b"$$"));
        let data = decode_span(&span).unwrap();
        match &data.objects[0].decl {
            RawDecl::Const { value, .. } => {
                assert_eq!(value, &ConstValue::String("$$|".into()))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_big_and_complex_values() {
        let mut w = ExportWriter::v1();
        w.new_pkg("p", "").int(0);
        w.int(3);
        w.tag(CONST_TAG).pkg(0).string("Big");
        w.int(t("untyped int"));
        w.tag(BIGINT_TAG).int(-1).bytes(&[1, 0, 0, 0, 0, 0, 0, 0, 0]);
        w.tag(CONST_TAG).pkg(0).string("Third");
        w.int(t("untyped float"));
        w.tag(FRACTION_TAG);
        w.tag(INT64_TAG).int(1);
        w.tag(INT64_TAG).int(3);
        w.tag(CONST_TAG).pkg(0).string("I");
        w.int(t("untyped complex"));
        w.tag(COMPLEX_TAG);
        w.tag(INT64_TAG).int(0);
        w.tag(INT64_TAG).int(1);
        w.int(0).tag(END_TAG);

        let data = decode_span(&w.finish()).unwrap();
        let values: Vec<_> = data
            .objects
            .iter()
            .map(|o| match &o.decl {
                RawDecl::Const { value, .. } => value.to_string(),
                _ => String::new(),
            })
            .collect();
        assert_eq!(values, vec!["-18446744073709551616", "1/3", "(0 + 1i)"]);
    }
}
