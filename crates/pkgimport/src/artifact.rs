//! Locating compiled artifacts
//!
//! Maps an import path and search directory to a package id and the raw
//! bytes of the artifact holding its export data. The id, never the file
//! path of the artifact, is what a registry keys packages by.

use crate::config::ImportConfig;
use crate::error::ImportError;
use rustc_hash::FxHashMap;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// One artifact lookup
#[derive(Debug, Clone, Copy)]
pub struct ArtifactRequest<'a> {
    /// Import path as written by the importer
    pub path: &'a str,
    /// Package id computed by [`package_id`]
    pub id: &'a str,
    /// Directory the import is resolved from
    pub src_dir: &'a Path,
}

/// Supplies artifact bytes for import requests
pub trait ArtifactSource {
    /// Fetch the raw bytes of the artifact for `req`
    fn fetch(&self, req: &ArtifactRequest<'_>) -> Result<Vec<u8>, ImportError>;
}

/// Whether `path` is relative to the importing directory or absolute
pub fn is_local(path: &str) -> bool {
    path == "."
        || path == ".."
        || path.starts_with("./")
        || path.starts_with("../")
        || Path::new(path).is_absolute()
}

/// Compute the registry key for an import path.
///
/// Local paths are joined onto `src_dir`, made absolute and cleaned
/// lexically, so `./p` and `././p` name the same package. Other paths are
/// their own id.
pub fn package_id(path: &str, src_dir: &Path) -> String {
    if !is_local(path) {
        return path.to_string();
    }
    let joined = src_dir.join(path);
    let absolute = std::path::absolute(&joined).unwrap_or(joined);
    clean(&absolute).to_string_lossy().into_owned()
}

/// Remove `.` components and fold `..` into its parent without touching the
/// file system
fn clean(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        return PathBuf::from(".");
    }
    parts.iter().collect()
}

/// Looks up artifacts on the file system
#[derive(Debug, Clone)]
pub struct FsSource {
    extensions: Vec<String>,
}

impl Default for FsSource {
    fn default() -> Self {
        Self::new(&ImportConfig::default())
    }
}

impl FsSource {
    /// Create a file-system source trying the configured extensions
    pub fn new(config: &ImportConfig) -> Self {
        Self {
            extensions: config.extensions.clone(),
        }
    }

    /// Candidate files for a request, in lookup order
    pub fn candidates(&self, req: &ArtifactRequest<'_>) -> Vec<PathBuf> {
        let base = if is_local(req.path) {
            PathBuf::from(req.id)
        } else {
            req.src_dir.join(req.path)
        };
        self.extensions
            .iter()
            .map(|ext| {
                let mut name = OsString::from(base.as_os_str());
                name.push(ext);
                PathBuf::from(name)
            })
            .collect()
    }
}

impl ArtifactSource for FsSource {
    fn fetch(&self, req: &ArtifactRequest<'_>) -> Result<Vec<u8>, ImportError> {
        let candidates = self.candidates(req);
        for candidate in &candidates {
            if candidate.is_file() {
                tracing::trace!(path = req.path, file = %candidate.display(), "found artifact");
                return std::fs::read(candidate).map_err(|e| ImportError::Io {
                    path: req.path.to_string(),
                    message: format!("{}: {}", candidate.display(), e),
                });
            }
        }
        Err(ImportError::NotFound {
            path: req.path.to_string(),
            tried: candidates,
        })
    }
}

/// Artifacts held in memory, keyed by package id
#[derive(Debug, Default)]
pub struct MemorySource {
    artifacts: FxHashMap<String, Vec<u8>>,
    fetches: AtomicUsize,
}

impl MemorySource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the artifact for a package id
    pub fn insert(&mut self, id: impl Into<String>, bytes: impl Into<Vec<u8>>) -> &mut Self {
        self.artifacts.insert(id.into(), bytes.into());
        self
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with(mut self, id: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(id, bytes);
        self
    }

    /// Number of successful fetches so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl ArtifactSource for MemorySource {
    fn fetch(&self, req: &ArtifactRequest<'_>) -> Result<Vec<u8>, ImportError> {
        match self.artifacts.get(req.id) {
            Some(bytes) => {
                self.fetches.fetch_add(1, Ordering::SeqCst);
                Ok(bytes.clone())
            }
            None => Err(ImportError::NotFound {
                path: req.path.to_string(),
                tried: Vec::new(),
            }),
        }
    }
}
