//! Declaration resolution
//!
//! Turns the decoded object list into the package scope. Objects that belong
//! to another package are restatements and never enter the scope.

use crate::builder::Linked;
use crate::decode::{ExportData, RawDecl, RawObject};
use crate::error::ResolutionError;
use crate::package::{Object, ObjectKind, Scope};
use crate::types::TypeArena;
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// The objects declared by the package itself, checked for name collisions
pub(crate) fn local_objects<'d>(
    data: &'d ExportData,
    self_path: &str,
) -> Result<Vec<&'d RawObject>, ResolutionError> {
    let mut seen = FxHashSet::default();
    let mut objects = Vec::with_capacity(data.objects.len());
    for object in &data.objects {
        if !data.is_self(object.pkg, self_path) {
            tracing::trace!(
                pkg = self_path,
                name = %object.name,
                "dropping restated declaration of another package"
            );
            continue;
        }
        if !seen.insert(object.name.as_str()) {
            return Err(ResolutionError::DuplicateName {
                pkg: self_path.to_string(),
                name: object.name.clone(),
            });
        }
        objects.push(object);
    }
    Ok(objects)
}

/// Build the scope of `pkg` from its objects
pub(crate) fn bind(
    objects: &[&RawObject],
    linked: &Linked,
    arena: &mut TypeArena,
    pkg: &Arc<str>,
) -> Result<Scope, ResolutionError> {
    let mut scope = Scope::default();
    for raw in objects {
        let object = match &raw.decl {
            RawDecl::Const { ty, value } => Object::new(
                ObjectKind::Const,
                raw.name.clone(),
                pkg.clone(),
                linked.resolve(*ty),
            )
            .with_value(value.clone()),
            RawDecl::Var { ty } => Object::new(
                ObjectKind::Var,
                raw.name.clone(),
                pkg.clone(),
                linked.resolve(*ty),
            ),
            RawDecl::Func { sig } => Object::new(
                ObjectKind::Func,
                raw.name.clone(),
                pkg.clone(),
                linked.signature(arena, sig),
            ),
            RawDecl::TypeName { ty } => Object::new(
                ObjectKind::TypeName,
                raw.name.clone(),
                pkg.clone(),
                linked.resolve(*ty),
            ),
        };
        scope
            .insert(object.with_pos(raw.pos.clone()))
            .map_err(|dup| ResolutionError::DuplicateName {
                pkg: pkg.to_string(),
                name: dup.name().to_string(),
            })?;
    }
    Ok(scope)
}
