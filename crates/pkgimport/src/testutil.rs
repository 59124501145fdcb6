//! Test helper that writes binary export data

use crate::reader::ESCAPE;
use rustc_hash::FxHashMap;

/// Builds a binary export-data span one primitive at a time
pub(crate) struct ExportWriter {
    interned: bool,
    body: Vec<u8>,
    strings: FxHashMap<String, i64>,
}

impl ExportWriter {
    /// Version 1: plain length-prefixed strings, no positions
    pub fn v1() -> Self {
        Self {
            interned: false,
            body: Vec::new(),
            strings: FxHashMap::default(),
        }
    }

    /// Version 2: interned strings and object positions
    pub fn v2() -> Self {
        Self {
            interned: true,
            ..Self::v1()
        }
    }

    pub fn uvarint(&mut self, mut u: u64) -> &mut Self {
        while u >= 0x80 {
            self.body.push((u as u8) | 0x80);
            u >>= 7;
        }
        self.body.push(u as u8);
        self
    }

    pub fn int(&mut self, v: i64) -> &mut Self {
        self.uvarint(((v << 1) ^ (v >> 63)) as u64)
    }

    pub fn tag(&mut self, tag: i64) -> &mut Self {
        self.int(tag)
    }

    pub fn bool(&mut self, b: bool) -> &mut Self {
        self.int(i64::from(b))
    }

    pub fn bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.uvarint(bytes.len() as u64);
        self.body.extend_from_slice(bytes);
        self
    }

    pub fn string(&mut self, s: &str) -> &mut Self {
        if !self.interned {
            return self.bytes(s.as_bytes());
        }
        if s.is_empty() {
            return self.int(0);
        }
        if let Some(&index) = self.strings.get(s) {
            return self.int(index);
        }
        let index = self.strings.len() as i64 + 1;
        self.strings.insert(s.to_string(), index);
        self.int(-(s.len() as i64));
        self.body.extend_from_slice(s.as_bytes());
        self
    }

    /// A new package reference
    pub fn new_pkg(&mut self, name: &str, path: &str) -> &mut Self {
        self.int(-1).string(name).string(path)
    }

    /// A reference to an earlier package
    pub fn pkg(&mut self, index: i64) -> &mut Self {
        self.int(index)
    }

    /// The export-data span: header and escaped body
    pub fn finish(&self) -> Vec<u8> {
        let mut out = if self.interned {
            b"$$B\nversion 2\n".to_vec()
        } else {
            b"$$B\nc".to_vec()
        };
        for &b in &self.body {
            match b {
                b'$' => out.extend_from_slice(&[ESCAPE, b'S']),
                ESCAPE => out.extend_from_slice(&[ESCAPE, ESCAPE]),
                other => out.push(other),
            }
        }
        out
    }

    /// An object-file artifact embedding the span
    pub fn artifact(&self) -> Vec<u8> {
        let mut out = b"go object linux amd64 go1.7\nbuild id \"test\"\n".to_vec();
        out.extend_from_slice(&self.finish());
        out.extend_from_slice(b"$$\n");
        out
    }
}
