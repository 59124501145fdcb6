//! The import pipeline
//!
//! Turns the bytes of one artifact into a completed [`Package`]: locate the
//! span, sniff its format, decode, resolve the packages it mentions, then
//! link types, bind declarations and methods, and publish. Both registries
//! drive this pipeline; they differ only in how dependencies are looked up
//! and how the type arena is shared.

use crate::builder;
use crate::decode::{self, DecodeOptions, ExportData};
use crate::declare;
use crate::error::ImportError;
use crate::export::find_export_data;
use crate::format::sniff;
use crate::methods;
use crate::package::Package;
use crate::types::TypeArena;
use std::path::Path;
use std::sync::{Arc, Weak};

/// What the pipeline needs from the registry driving it
pub(crate) trait Resolve {
    /// Resolve a package mentioned by export data being decoded. A package
    /// still being decoded resolves to its placeholder.
    fn resolve_dependency(&mut self, path: &str, src_dir: &Path)
        -> Result<Arc<Package>, ImportError>;

    /// Run `f` with exclusive access to the session type arena
    fn link<R>(&mut self, f: impl FnOnce(&mut TypeArena) -> R) -> R;
}

/// Decode `bytes` into `package` and publish it.
///
/// On error `package` is left incomplete; removing its placeholder is up to
/// the registry.
pub(crate) fn load<C: Resolve>(
    cx: &mut C,
    package: &Arc<Package>,
    bytes: &[u8],
    src_dir: &Path,
    options: DecodeOptions,
) -> Result<(), ImportError> {
    let path = package.path();
    let span = find_export_data(bytes).map_err(|e| ImportError::format(path, e))?;
    let sniffed =
        sniff(span, options.allow_legacy_text).map_err(|e| ImportError::format(path, e))?;
    tracing::debug!(path, format = %sniffed.format, "decoding package");

    let data = decode::decode(span, sniffed.format, sniffed.body_offset, options)
        .map_err(|e| ImportError::decode(path, e))?;
    if let Some(name) = data.packages.first().map(|p| p.name.as_str()) {
        package.set_name(name);
    }

    let (paths, imports) = resolve_packages(cx, package, &data, src_dir)?;

    let objects =
        declare::local_objects(&data, path).map_err(|e| ImportError::resolution(path, e))?;
    methods::check(&data).map_err(|e| ImportError::resolution(path, e))?;

    let scope = cx.link(|arena| {
        let linked = builder::link_types(arena, &data, &paths)
            .map_err(|e| ImportError::decode(path, e))?;
        let scope = declare::bind(&objects, &linked, arena, package.path_arc())
            .map_err(|e| ImportError::resolution(path, e))?;
        methods::bind(&data, &linked, arena);
        Ok::<_, ImportError>(scope)
    })?;

    let objects = scope.len();
    package.complete(imports, scope);
    tracing::debug!(path, name = package.name(), objects, "package complete");
    Ok(())
}

/// The registry path of every package table entry, and the distinct
/// dependencies in first-mention order
fn resolve_packages<C: Resolve>(
    cx: &mut C,
    package: &Arc<Package>,
    data: &ExportData,
    src_dir: &Path,
) -> Result<(Vec<Arc<str>>, Vec<Weak<Package>>), ImportError> {
    let mut paths = Vec::with_capacity(data.packages.len());
    let mut deps: Vec<Arc<Package>> = Vec::new();
    for (index, pkg) in data.packages.iter().enumerate() {
        if data.is_self(index, package.path()) {
            paths.push(package.path_arc().clone());
            continue;
        }
        let dep = cx
            .resolve_dependency(&pkg.path, src_dir)
            .map_err(|e| e.within(package.path()))?;
        dep.set_name(&pkg.name);
        paths.push(dep.path_arc().clone());
        if !deps.iter().any(|d| Arc::ptr_eq(d, &dep)) {
            deps.push(dep);
        }
    }
    let imports = deps.iter().map(Arc::downgrade).collect();
    Ok((paths, imports))
}
