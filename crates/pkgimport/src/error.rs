//! Error types for export data import
//!
//! Every failure is fatal for the import path it occurred in. Errors are
//! `Clone` so that the synchronized registry can hand the same outcome to
//! every caller waiting on one in-flight decode.

use std::path::PathBuf;
use thiserror::Error;

/// A malformed primitive or structure inside an export-data span.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} at offset {offset}")]
pub struct DecodeError {
    /// Byte offset within the export-data span
    pub offset: usize,
    /// What went wrong
    pub kind: DecodeErrorKind,
}

impl DecodeError {
    /// Create a decode error at the given span offset
    pub fn new(offset: usize, kind: DecodeErrorKind) -> Self {
        Self { offset, kind }
    }
}

/// Kinds of decode failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// The span ended before the declared data did
    #[error("unexpected end of export data")]
    UnexpectedEnd,

    /// A string was not valid UTF-8
    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    /// An escape byte was followed by something other than `S` or `|`
    #[error("invalid escape sequence |{0:#04x}")]
    BadEscape(u8),

    /// A variable-length integer did not terminate within 10 bytes
    #[error("variable-length integer overflows 64 bits")]
    VarintOverflow,

    /// A tag value is not valid in the position it was read
    #[error("invalid tag {0}")]
    InvalidTag(i64),

    /// An index into a decoder table is out of range
    #[error("invalid {what} index {index}")]
    InvalidIndex {
        /// Which table was indexed
        what: &'static str,
        /// The offending index
        index: i64,
    },

    /// A length or count was negative
    #[error("negative length {0}")]
    NegativeLength(i64),

    /// A type index is referenced but never defined
    #[error("dangling reference to type {0}")]
    DanglingType(u32),

    /// A type refers to itself without going through a named type
    #[error("invalid recursive type {0}")]
    InvalidRecursiveType(u32),

    /// A type name or receiver does not denote a named type
    #[error("type {0} is not a named type")]
    NotNamed(u32),

    /// Type nesting exceeds the configured depth limit
    #[error("type nesting exceeds depth limit {0}")]
    TooDeep(usize),

    /// A named type was defined twice in one span
    #[error("type {0} redefined")]
    Redefined(String),

    /// Legacy textual export data did not parse
    #[error("syntax error: {0}")]
    Syntax(String),

    /// Bytes remain after the end tag
    #[error("trailing data after end of export data")]
    TrailingData,
}

/// Missing or unrecognized framing around the export data
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FormatError {
    /// An archive member header is malformed
    #[error("malformed archive: {0}")]
    BadArchive(String),

    /// The archive has no package definition member
    #[error("archive has no __.PKGDEF member")]
    MissingPkgDef,

    /// No `$$B` or `$$` line was found
    #[error("export data start delimiter not found")]
    MissingStartDelimiter,

    /// The binary header names a version this decoder does not read
    #[error("unsupported export data version {0}")]
    UnsupportedVersion(u64),

    /// The binary header starts with an unknown byte
    #[error("unknown export data header byte {0:#04x}")]
    UnknownHeader(u8),

    /// Legacy textual export data was found but is disabled by configuration
    #[error("legacy textual export data is disabled")]
    LegacyTextDisabled,
}

/// Declarations that cannot be bound into a package
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolutionError {
    /// Two objects with the same name in one package scope
    #[error("{name} redeclared in package {pkg}")]
    DuplicateName {
        /// Package path
        pkg: String,
        /// Colliding name
        name: String,
    },

    /// A method names a receiver that is not a declared named type
    #[error("method {method} has unknown receiver type")]
    UnknownReceiver {
        /// Method name
        method: String,
    },

    /// A method is declared on a predeclared type
    #[error("method {method} declared on predeclared type {receiver}")]
    InvalidReceiver {
        /// Method name
        method: String,
        /// Receiver type name
        receiver: String,
    },
}

/// Failure of an import request
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ImportError {
    /// No artifact exists for the import path
    #[error("can't find import: {path} (tried: {tried:?})")]
    NotFound {
        /// Import path as requested
        path: String,
        /// Candidate files that were tried, in order
        tried: Vec<PathBuf>,
    },

    /// The artifact exists but could not be read
    #[error("reading export data for {path}: {message}")]
    Io {
        /// Import path
        path: String,
        /// Underlying I/O error message
        message: String,
    },

    /// Framing or version problem
    #[error("{path}: {source}")]
    Format {
        /// Import path
        path: String,
        /// Cause
        source: FormatError,
    },

    /// Malformed export data
    #[error("{path}: {source}")]
    Decode {
        /// Import path
        path: String,
        /// Cause, including the span offset
        source: DecodeError,
    },

    /// Declarations could not be bound
    #[error("{path}: {source}")]
    Resolution {
        /// Import path
        path: String,
        /// Cause
        source: ResolutionError,
    },

    /// The decode was abandoned to break an import cycle spanning threads.
    /// [`SyncRegistry`](crate::SyncRegistry) retries such imports itself, so
    /// its callers never receive this error.
    #[error("import of {path} abandoned: import cycle across threads")]
    Abandoned {
        /// Import path whose lookup would have deadlocked
        path: String,
    },

    /// A transitively imported package failed
    #[error("import {}: {source}", .chain.join(" -> "))]
    Dependency {
        /// Import paths from the outermost importer down to the failing package
        chain: Vec<String>,
        /// The failing package's own error
        source: Box<ImportError>,
    },
}

impl ImportError {
    /// The import path whose decode failed
    pub fn path(&self) -> &str {
        match self {
            ImportError::NotFound { path, .. }
            | ImportError::Io { path, .. }
            | ImportError::Format { path, .. }
            | ImportError::Decode { path, .. }
            | ImportError::Resolution { path, .. }
            | ImportError::Abandoned { path } => path,
            ImportError::Dependency { source, .. } => source.path(),
        }
    }

    /// Import paths leading to the failure, outermost first
    pub fn chain(&self) -> Vec<&str> {
        match self {
            ImportError::Dependency { chain, .. } => chain.iter().map(String::as_str).collect(),
            other => vec![other.path()],
        }
    }

    /// The error of the package that actually failed
    pub fn root_cause(&self) -> &ImportError {
        match self {
            ImportError::Dependency { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Annotate an error from a dependency with the package that imported it
    pub(crate) fn within(self, importer: &str) -> ImportError {
        match self {
            ImportError::Dependency { mut chain, source } => {
                chain.insert(0, importer.to_string());
                ImportError::Dependency { chain, source }
            }
            other => ImportError::Dependency {
                chain: vec![importer.to_string(), other.path().to_string()],
                source: Box::new(other),
            },
        }
    }

    pub(crate) fn decode(path: &str, source: DecodeError) -> Self {
        ImportError::Decode {
            path: path.to_string(),
            source,
        }
    }

    pub(crate) fn format(path: &str, source: FormatError) -> Self {
        ImportError::Format {
            path: path.to_string(),
            source,
        }
    }

    pub(crate) fn resolution(path: &str, source: ResolutionError) -> Self {
        ImportError::Resolution {
            path: path.to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn not_found(path: &str) -> ImportError {
        ImportError::NotFound {
            path: path.to_string(),
            tried: vec![PathBuf::from(format!("/pkg/{path}.a"))],
        }
    }

    #[test]
    fn test_decode_error_display_has_offset() {
        let err = DecodeError::new(17, DecodeErrorKind::InvalidTag(-99));
        assert_eq!(err.to_string(), "invalid tag -99 at offset 17");
    }

    #[test]
    fn test_dependency_chain_annotation() {
        let err = not_found("c").within("b").within("a");

        assert_eq!(err.chain(), vec!["a", "b", "c"]);
        assert_eq!(err.path(), "c");
        assert!(matches!(err.root_cause(), ImportError::NotFound { .. }));
        assert!(err.to_string().starts_with("import a -> b -> c: "));
    }

    #[test]
    fn test_chain_of_direct_error() {
        let err = not_found("fmt");
        assert_eq!(err.chain(), vec!["fmt"]);
    }
}
