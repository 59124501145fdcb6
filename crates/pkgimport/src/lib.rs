//! Compiled package export data importer
//!
//! This crate reconstructs the exported declarations of compiled packages
//! (constants, variables, functions, named types and their methods) from the
//! export data a compiler writes into its object files and archives, so a
//! type checker can use compiled dependencies without their source.
//!
//! - **Extraction**: find the export-data span in an object file or `ar`
//!   archive (`export` module) and sniff its format (`format` module)
//! - **Decoding**: binary (versions 1 and 2) and legacy textual export data
//!   decode into one intermediate form
//! - **Linking**: type definitions are linked into a session-wide
//!   [`TypeArena`]; recursive types become cycles of [`TypeId`]s
//! - **Registries**: [`Registry`] and the thread-safe [`SyncRegistry`]
//!   decode each package once per session and share it with every importer
//!
//! # Example
//!
//! ```rust,ignore
//! use pkgimport::{object_string, Registry};
//!
//! let mut registry = Registry::new();
//! let math = registry.import("math", "/usr/lib/go/pkg/linux_amd64")?;
//! let sin = math.scope().lookup("Sin").unwrap();
//! assert_eq!(
//!     object_string(sin, registry.types(), None),
//!     "func math.Sin(x float64) float64"
//! );
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod artifact;
pub mod config;
pub mod constant;
pub mod error;
pub mod export;
pub mod format;
pub mod package;
pub mod reader;
pub mod registry;
pub mod sync_registry;
pub mod types;

mod builder;
mod decode;
mod declare;
mod importer;
mod methods;

#[cfg(test)]
mod testutil;

pub use artifact::{is_local, package_id, ArtifactRequest, ArtifactSource, FsSource, MemorySource};
pub use config::ImportConfig;
pub use constant::ConstValue;
pub use error::{DecodeError, DecodeErrorKind, FormatError, ImportError, ResolutionError};
pub use export::find_export_data;
pub use format::{sniff, ExportFormat, Sniffed};
pub use package::{Object, ObjectKind, Package, Position, Scope};
pub use registry::{import, Registry, RegistryStats};
pub use sync_registry::SyncRegistry;
pub use types::{object_string, Type, TypeArena, TypeDisplay, TypeId};
