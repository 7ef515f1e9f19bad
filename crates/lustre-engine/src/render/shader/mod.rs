//! Gradient shaders for the two rendering backends.
//!
//! Both backends are driven by the same per-kind payload description
//! ([`GradientMaterial::payload`](super::material::GradientMaterial::payload)):
//! the legacy backend turns it into named program uniforms, the modern one
//! into writes at fixed offsets of a packed uniform block.

mod legacy;
mod modern;

pub use legacy::{LegacyProgram, LegacyShader};
pub use modern::{ModernShader, RAMP_BINDING, RAMP_SAMPLER_BINDING, UNIFORM_BINDING};

use crate::paint::GradientKind;

use super::Backend;

/// A gradient shader of one kind for one backend.
#[derive(Debug)]
pub enum GradientShader {
    Legacy(LegacyShader),
    Modern(ModernShader),
}

impl GradientShader {
    pub fn kind(&self) -> GradientKind {
        match self {
            GradientShader::Legacy(s) => s.kind(),
            GradientShader::Modern(s) => s.kind(),
        }
    }

    pub fn backend(&self) -> Backend {
        match self {
            GradientShader::Legacy(_) => Backend::Legacy,
            GradientShader::Modern(_) => Backend::Modern,
        }
    }

    /// Program base name, e.g. `gradientlinear`.
    pub fn name(&self) -> &'static str {
        match self {
            GradientShader::Legacy(s) => s.name(),
            GradientShader::Modern(s) => s.name(),
        }
    }

    pub fn as_legacy_mut(&mut self) -> Option<&mut LegacyShader> {
        match self {
            GradientShader::Legacy(s) => Some(s),
            GradientShader::Modern(_) => None,
        }
    }

    pub fn as_modern_mut(&mut self) -> Option<&mut ModernShader> {
        match self {
            GradientShader::Modern(s) => Some(s),
            GradientShader::Legacy(_) => None,
        }
    }
}

/// Program base name of a drawable kind.
///
/// Only called for kinds that passed dispatch, so `Stops` never gets here.
fn program_name(kind: GradientKind) -> &'static str {
    kind.shader_name().unwrap_or("gradientstops")
}
