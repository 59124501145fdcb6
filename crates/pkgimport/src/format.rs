//! Export-data format detection

use crate::error::FormatError;
use crate::reader::ExportReader;
use std::fmt;

/// Encoding of an export-data span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    /// Binary format, version 1 (length-prefixed strings)
    BinaryV1,
    /// Binary format, version 2 (interned strings and positions)
    BinaryV2,
    /// Legacy textual declarations
    LegacyText,
}

impl ExportFormat {
    /// The binary format version, if binary
    pub fn version(&self) -> Option<u64> {
        match self {
            ExportFormat::BinaryV1 => Some(1),
            ExportFormat::BinaryV2 => Some(2),
            ExportFormat::LegacyText => None,
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::BinaryV1 => f.write_str("binary v1"),
            ExportFormat::BinaryV2 => f.write_str("binary v2"),
            ExportFormat::LegacyText => f.write_str("legacy text"),
        }
    }
}

/// Result of sniffing a span
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sniffed {
    /// Detected format
    pub format: ExportFormat,
    /// Offset of the first body byte, after the header
    pub body_offset: usize,
}

/// The newest binary version this crate reads
pub const CURRENT_VERSION: u64 = 2;

/// Classify a span produced by [`find_export_data`](crate::find_export_data).
///
/// Only peeks at the header; the span itself is left to the decoder.
pub fn sniff(span: &[u8], allow_legacy_text: bool) -> Result<Sniffed, FormatError> {
    if let Some(rest) = span.strip_prefix(b"$$B\n") {
        let header = 4;
        return match rest.first() {
            Some(b'c') => Ok(Sniffed {
                format: ExportFormat::BinaryV1,
                body_offset: header + 1,
            }),
            Some(b'v') => {
                let mut reader = ExportReader::new(rest);
                let line = reader
                    .read_line()
                    .ok()
                    .and_then(|line| std::str::from_utf8(line).ok())
                    .ok_or(FormatError::UnknownHeader(b'v'))?;
                let version = line
                    .strip_prefix("version ")
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .ok_or(FormatError::UnknownHeader(b'v'))?;
                let format = match version {
                    1 => ExportFormat::BinaryV1,
                    CURRENT_VERSION => ExportFormat::BinaryV2,
                    other => return Err(FormatError::UnsupportedVersion(other)),
                };
                Ok(Sniffed {
                    format,
                    body_offset: header + reader.position(),
                })
            }
            Some(&other) => Err(FormatError::UnknownHeader(other)),
            None => Err(FormatError::UnknownHeader(0)),
        };
    }
    if span.starts_with(b"$$\n") {
        if !allow_legacy_text {
            return Err(FormatError::LegacyTextDisabled);
        }
        return Ok(Sniffed {
            format: ExportFormat::LegacyText,
            body_offset: 3,
        });
    }
    Err(FormatError::MissingStartDelimiter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_v1_marker() {
        let sniffed = sniff(b"$$B\nc\x02", true).unwrap();
        assert_eq!(sniffed.format, ExportFormat::BinaryV1);
        assert_eq!(sniffed.body_offset, 5);
    }

    #[test]
    fn test_version_line() {
        let sniffed = sniff(b"$$B\nversion 2\n\x00", true).unwrap();
        assert_eq!(sniffed.format, ExportFormat::BinaryV2);
        assert_eq!(sniffed.body_offset, 14);

        let sniffed = sniff(b"$$B\nversion 1\n", true).unwrap();
        assert_eq!(sniffed.format, ExportFormat::BinaryV1);
    }

    #[test]
    fn test_unsupported_version() {
        assert_eq!(
            sniff(b"$$B\nversion 7\n", true),
            Err(FormatError::UnsupportedVersion(7))
        );
    }

    #[test]
    fn test_unknown_header() {
        assert_eq!(sniff(b"$$B\nx", true), Err(FormatError::UnknownHeader(b'x')));
        assert_eq!(
            sniff(b"$$B\nversion two\n", true),
            Err(FormatError::UnknownHeader(b'v'))
        );
    }

    #[test]
    fn test_legacy_text() {
        let sniffed = sniff(b"$$\npackage p\n", true).unwrap();
        assert_eq!(sniffed.format, ExportFormat::LegacyText);
        assert_eq!(sniffed.body_offset, 3);
        assert_eq!(
            sniff(b"$$\npackage p\n", false),
            Err(FormatError::LegacyTextDisabled)
        );
    }

    #[test]
    fn test_sniff_does_not_need_body() {
        assert!(sniff(b"$$B\nc", true).is_ok());
        assert_eq!(sniff(b"", true), Err(FormatError::MissingStartDelimiter));
    }
}
