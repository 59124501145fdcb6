//! Method binding
//!
//! Methods are attached to their receiver's named type. A method belongs to
//! the package that declared the receiver type, whichever package's export
//! data mentioned it; a restated method never replaces the one already bound.

use crate::builder::Linked;
use crate::decode::{ExportData, RawType};
use crate::error::ResolutionError;
use crate::types::universe::{PREDECLARED, PREDECLARED_COUNT};
use crate::types::{Func, Method, TypeArena};

/// Check every receiver before anything is bound
pub(crate) fn check(data: &ExportData) -> Result<(), ResolutionError> {
    for method in &data.methods {
        if method.recv < PREDECLARED_COUNT {
            return Err(ResolutionError::InvalidReceiver {
                method: method.name.clone(),
                receiver: PREDECLARED[method.recv as usize].to_string(),
            });
        }
        if !matches!(data.types.get(method.recv), Some(RawType::Named { .. })) {
            return Err(ResolutionError::UnknownReceiver {
                method: method.name.clone(),
            });
        }
    }
    Ok(())
}

/// Bind the methods of `data` to their receivers. Returns how many were new.
pub(crate) fn bind(data: &ExportData, linked: &Linked, arena: &mut TypeArena) -> usize {
    let mut bound = 0;
    for method in &data.methods {
        let recv = linked.resolve(method.recv);
        let sig = linked.signature(arena, &method.sig);
        let Some(named) = arena.named_mut(recv) else {
            continue;
        };
        let func = Func {
            name: method.name.clone(),
            pkg: named.pkg.clone(),
            sig,
        };
        if named.add_method(Method {
            func,
            recv,
            pointer_recv: method.pointer,
        }) {
            bound += 1;
        } else {
            tracing::trace!(
                receiver = %named.name,
                method = %method.name,
                "keeping first definition of restated method"
            );
        }
    }
    bound
}
