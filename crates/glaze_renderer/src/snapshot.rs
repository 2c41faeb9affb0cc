//! Context snapshots
//!
//! A snapshot deep-copies everything a tracker shadows so that renderer state
//! survives a context changing hands between surfaces or threads. Restoring
//! replays the copy through the tracker's own diffing paths and defensively
//! sweeps resources destroyed while the snapshot was parked.

use glaze_core::{RenderError, Result, TextureHandle, VariableType};

use crate::fixed_state::FixedFunctionState;
use crate::shader_state::AttributeSlot;
use crate::shared_state::SharedState;

/// Sparse copy of one initialized uniform's values, keyed by the uniform's
/// flattened index within its shader.
#[derive(Clone, Debug)]
pub struct UniformSnapshot {
    pub index: usize,
    pub ty: VariableType,
    pub length: usize,
    pub floats: Vec<f32>,
    pub ints: Vec<i32>,
    pub textures: Vec<Option<TextureHandle>>,
}

/// State captured from a fixed-function tracker.
#[derive(Clone, Debug)]
pub struct FixedFunctionSnapshot {
    pub shared: SharedState,
    pub fixed: FixedFunctionState,
}

/// State captured from a GLSL tracker. Uniforms are captured sparsely: only
/// those written since the shader was bound appear.
#[derive(Clone, Debug)]
pub struct ShaderSnapshot {
    pub shared: SharedState,
    pub attributes: Vec<AttributeSlot>,
    pub uniforms: Vec<UniformSnapshot>,
}

/// A complete renderer-state capture, tagged by the pipeline that produced
/// it. Restores pattern-match on the variant; handing a tracker the wrong
/// variant is an [`RenderError::InvalidValue`].
#[derive(Clone, Debug)]
pub enum ContextSnapshot {
    FixedFunction(Box<FixedFunctionSnapshot>),
    Shader(Box<ShaderSnapshot>),
}

impl ContextSnapshot {
    pub(crate) fn as_fixed_function(&self) -> Result<&FixedFunctionSnapshot> {
        match self {
            ContextSnapshot::FixedFunction(snap) => Ok(snap),
            ContextSnapshot::Shader(_) => Err(RenderError::InvalidValue(
                "shader snapshot handed to a fixed-function renderer".into(),
            )),
        }
    }

    pub(crate) fn as_shader(&self) -> Result<&ShaderSnapshot> {
        match self {
            ContextSnapshot::Shader(snap) => Ok(snap),
            ContextSnapshot::FixedFunction(_) => Err(RenderError::InvalidValue(
                "fixed-function snapshot handed to a shader renderer".into(),
            )),
        }
    }
}
