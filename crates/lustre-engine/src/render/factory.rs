//! Kind/backend dispatch for materials and shaders.

use crate::paint::GradientKind;

use super::material::GradientMaterial;
use super::shader::{GradientShader, LegacyShader, ModernShader};
use super::Backend;

/// Creates an empty material for `kind`.
///
/// Kinds without geometry have no material; that is logged and `None` is
/// returned, which callers treat as "nothing to draw".
pub fn create_material(kind: GradientKind) -> Option<GradientMaterial> {
    let material = GradientMaterial::for_kind(kind);
    if material.is_none() {
        log::warn!("invalid gradient type {kind:?}: no material");
    }
    material
}

/// Creates the shader for `kind` on `backend`; `None` for invalid kinds.
pub fn create_shader(kind: GradientKind, backend: Backend) -> Option<GradientShader> {
    if kind == GradientKind::Stops {
        log::warn!("invalid gradient type {kind:?}: no shader");
        return None;
    }

    Some(match backend {
        Backend::Legacy => GradientShader::Legacy(LegacyShader::new(kind)),
        Backend::Modern => GradientShader::Modern(ModernShader::new(kind)),
    })
}

/// Parses a raw host kind id, logging unknown values.
pub fn kind_from_raw(raw: u8) -> Option<GradientKind> {
    match GradientKind::try_from(raw) {
        Ok(kind) => Some(kind),
        Err(raw) => {
            log::warn!("invalid gradient type id {raw}");
            None
        }
    }
}
