//! Locating the export-data span inside an artifact
//!
//! Artifacts are either `ar` archives whose `__.PKGDEF` member holds the
//! export data, or object files with the export data embedded after some
//! header lines. Either way only the delimited span is handed on.

use crate::error::FormatError;

/// `ar` archive magic
pub const ARCHIVE_MAGIC: &[u8] = b"!<arch>\n";

/// Name of the archive member holding the package definition
pub const PKGDEF: &str = "__.PKGDEF";

const HEADER_LEN: usize = 60;

/// Start delimiter of binary export data (followed by a newline)
const BINARY_START: &[u8] = b"$$B";
/// Start delimiter of textual export data and end delimiter of both
const TEXT_START: &[u8] = b"$$";

/// Find the export-data span in an artifact.
///
/// The span starts at the `$$B` or `$$` start line and ends before the end
/// delimiter, or at the end of the data if there is none.
pub fn find_export_data(data: &[u8]) -> Result<&[u8], FormatError> {
    let data = if data.starts_with(ARCHIVE_MAGIC) {
        pkgdef_member(data)?
    } else {
        data
    };

    let start = find_start(data).ok_or(FormatError::MissingStartDelimiter)?;
    let span = &data[start..];
    let end = if span.starts_with(b"$$B\n") {
        find(&span[4..], b"$$\n").map(|i| i + 4)
    } else {
        // text: the end delimiter is a line of its own
        find(&span[2..], b"\n$$\n").map(|i| i + 3)
    };
    Ok(&span[..end.unwrap_or(span.len())])
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Offset of the first line that is exactly `$$B` or `$$`
fn find_start(data: &[u8]) -> Option<usize> {
    let mut line_start = 0;
    while line_start < data.len() {
        let len = data[line_start..].iter().position(|&b| b == b'\n')?;
        let line = &data[line_start..line_start + len];
        if line == BINARY_START || line == TEXT_START {
            return Some(line_start);
        }
        line_start += len + 1;
    }
    None
}

/// Contents of the `__.PKGDEF` member of an archive
fn pkgdef_member(data: &[u8]) -> Result<&[u8], FormatError> {
    let mut pos = ARCHIVE_MAGIC.len();
    while pos < data.len() {
        let header = data
            .get(pos..pos + HEADER_LEN)
            .ok_or_else(|| FormatError::BadArchive(format!("truncated member header at {pos}")))?;
        if &header[58..60] != b"`\n" {
            return Err(FormatError::BadArchive(format!(
                "bad member header terminator at {pos}"
            )));
        }

        let name = String::from_utf8_lossy(&header[..16]);
        let name = name.trim_end_matches(' ').trim_end_matches('/');
        let size = std::str::from_utf8(&header[48..58])
            .ok()
            .and_then(|s| s.trim().parse::<usize>().ok())
            .ok_or_else(|| FormatError::BadArchive(format!("bad member size at {pos}")))?;

        let body = pos + HEADER_LEN;
        let member = data
            .get(body..body.saturating_add(size))
            .ok_or_else(|| FormatError::BadArchive(format!("member {name} extends past end")))?;
        if name == PKGDEF {
            return Ok(member);
        }
        // members are padded to even offsets
        pos = body + size + (size & 1);
    }
    Err(FormatError::MissingPkgDef)
}

#[cfg(test)]
pub(crate) fn archive(members: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = ARCHIVE_MAGIC.to_vec();
    for (name, body) in members {
        let header = format!(
            "{:<16}{:<12}{:<6}{:<6}{:<8}{:<10}`\n",
            name,
            0,
            0,
            0,
            644,
            body.len()
        );
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(body);
        if body.len() % 2 == 1 {
            out.push(b'\n');
        }
    }
    out
}
