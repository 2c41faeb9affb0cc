//! Glaze core vocabulary
//!
//! This crate provides the shared types consumed by the Glaze renderer layer:
//!
//! - **Pipeline enums**: blend, depth, stencil, and polygon configuration
//! - **Fixed-function enums**: fog, lighting, texture combine, tex-gen
//! - **Shader variables**: the GLSL-facing variable type system
//! - **Resource handles**: buffer, texture, and shader handles produced by the
//!   resource-builder layer and consumed read-only by the state trackers
//! - **Errors**: the error taxonomy for every mutating renderer operation
//!
//! Handles are cheap to clone (`Arc`-backed), compare by identity, and carry a
//! destroyed flag that a lifecycle-management thread may flip asynchronously.

pub mod error;
pub mod fixed_function;
pub mod pipeline;
pub mod resource;
pub mod shader;

pub use error::{RenderError, Result};
pub use fixed_function::{
    ColorPurpose, CombineFunction, CombineOperand, CombineSource, FogMode, MatrixMode,
    TexCoordSource, VertexTarget, MAX_LIGHTS, MAX_TEXTURES,
};
pub use pipeline::{
    BlendFactor, BlendFunction, Comparison, DrawStyle, PolygonType, StencilUpdate,
};
pub use resource::{
    Attribute, AttributeHandle, AttributeSpec, BufferHandle, DataType, ShaderHandle,
    TextureHandle, TextureKind, TextureTarget, Uniform, UniformData, UniformHandle, UniformSpec,
    VertexAttribute,
};
pub use shader::{PrimitiveClass, VariableType};

// Re-export the math types used throughout the renderer API.
pub use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};
