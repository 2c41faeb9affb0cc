//! Glaze renderer layer
//!
//! This crate sits between a renderer-facing API and a low-level driver. Every
//! mutating operation follows the same discipline:
//!
//! 1. **validate** the arguments, failing before any state changes,
//! 2. **compare** against the tracked shadow of the driver's state,
//! 3. on a real change, **mutate** the shadow and invoke exactly one driver
//!    hook; on no change, do nothing at all.
//!
//! The layer splits along the legacy/modern pipeline boundary:
//!
//! - [`RendererDelegate`] tracks the state shared by both pipelines
//!   (blending, depth, stencil, rasterization, viewport, bound resources).
//! - [`FixedFunctionRenderer`] adds the legacy multi-light, multi-texture
//!   pipeline on top of a delegate, including lazy model-view flushing.
//! - [`GlslRenderer`] adds programmable-shader state: generic attributes,
//!   uniforms, and automatic sampler texture-unit management.
//! - [`ShaderFixedFunctionEmulator`] exposes the fixed-function surface but
//!   routes everything through a [`GlslRenderer`] and a built-in emulation
//!   shader, for drivers without a legacy pipeline.
//!
//! Drivers plug in through the [`driver`] hook traits; hooks receive
//! already-validated, already-diffed values and just forward them.
//!
//! Contexts are single-threaded: one thread owns a renderer at a time and
//! snapshots ([`ContextSnapshot`]) carry state across ownership changes. The
//! only cross-thread hazard is resource destruction, which every snapshot
//! restore sweeps defensively.

pub mod delegate;
pub mod driver;
pub mod emulator;
pub mod fixed_function;
pub mod fixed_state;
pub mod glsl;
pub mod shader_state;
pub mod shaders;
pub mod shared_state;
pub mod snapshot;

#[cfg(test)]
pub(crate) mod mock;

pub use delegate::RendererDelegate;
pub use driver::{CommonDriver, FixedFunctionDriver, ShaderDriver};
pub use emulator::ShaderFixedFunctionEmulator;
pub use fixed_function::FixedFunctionRenderer;
pub use fixed_state::{FixedFunctionState, LightState, TextureState};
pub use glsl::GlslRenderer;
pub use shader_state::AttributeSlot;
pub use shared_state::{SharedState, StencilFace};
pub use snapshot::{ContextSnapshot, FixedFunctionSnapshot, ShaderSnapshot, UniformSnapshot};
