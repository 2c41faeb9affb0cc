//! Legacy fixed-function pipeline vocabulary
//!
//! Enums describing the discrete state toggles of the legacy multi-light,
//! multi-texture pipeline: fog equations, material/light color slots, matrix
//! stack selection, vertex attribute targets, and the texture-environment
//! combine language.

/// Maximum number of lights tracked by the fixed-function state.
pub const MAX_LIGHTS: usize = 8;

/// Maximum number of fixed-function texture units.
pub const MAX_TEXTURES: usize = 4;

/// The three eye-distance fog equations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FogMode {
    Linear,
    Exp,
    ExpSquared,
}

/// Which color slot of a material or light is being configured. `Emissive`
/// only applies to materials.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorPurpose {
    Ambient,
    Diffuse,
    Specular,
    Emissive,
}

/// The driver exposes a single matrix-load entry point and a mode selector;
/// the active mode decides which matrix the load targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatrixMode {
    ModelView,
    Projection,
    Texture,
}

/// The per-vertex data streams of the legacy pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VertexTarget {
    Vertices,
    Normals,
    TexCoords,
    Colors,
}

/// Texture-environment combine functions. The Dot3 variants are only valid
/// for the RGB channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CombineFunction {
    Replace,
    Modulate,
    Add,
    AddSigned,
    Interpolate,
    Subtract,
    Dot3Rgb,
    Dot3Rgba,
}

impl CombineFunction {
    /// Stable integer encoding, used when the combine state is routed through
    /// shader uniforms.
    pub fn encode(self) -> i32 {
        match self {
            CombineFunction::Replace => 0,
            CombineFunction::Modulate => 1,
            CombineFunction::Add => 2,
            CombineFunction::AddSigned => 3,
            CombineFunction::Interpolate => 4,
            CombineFunction::Subtract => 5,
            CombineFunction::Dot3Rgb => 6,
            CombineFunction::Dot3Rgba => 7,
        }
    }
}

/// How a combine source operand is read. The color variants are only valid
/// for the RGB channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CombineOperand {
    Color,
    Alpha,
    OneMinusColor,
    OneMinusAlpha,
}

impl CombineOperand {
    /// Stable integer encoding, used when the combine state is routed through
    /// shader uniforms.
    pub fn encode(self) -> i32 {
        match self {
            CombineOperand::Color => 0,
            CombineOperand::Alpha => 1,
            CombineOperand::OneMinusColor => 2,
            CombineOperand::OneMinusAlpha => 3,
        }
    }
}

/// Where a combine operand's value comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CombineSource {
    /// The texture bound to the unit being configured
    CurrTex,
    /// The output of the previous texture unit
    PrevTex,
    /// The unit's constant color
    ConstColor,
    /// The untextured vertex color
    VertexColor,
    /// The texture bound to an explicit unit
    Tex(u8),
}

impl CombineSource {
    /// Stable integer encoding, used when the combine state is routed through
    /// shader uniforms.
    pub fn encode(self) -> i32 {
        match self {
            CombineSource::CurrTex => 0,
            CombineSource::PrevTex => 1,
            CombineSource::ConstColor => 2,
            CombineSource::VertexColor => 3,
            CombineSource::Tex(unit) => 4 + unit as i32,
        }
    }
}

/// How texture coordinates for a unit are produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TexCoordSource {
    /// Use the bound texture-coordinate vertex attribute (tex-gen disabled)
    Attribute,
    /// Generated from the eye-space position via the configured eye planes
    Eye,
    /// Generated from the object-space position via the configured planes
    Object,
    /// Sphere-mapped from the eye-space normal and position
    Sphere,
    /// The eye-space normal itself
    Normal,
    /// The eye-space reflection vector
    Reflection,
}

impl TexCoordSource {
    /// Stable integer encoding, used when tex-gen state is routed through
    /// shader uniforms.
    pub fn encode(self) -> i32 {
        match self {
            TexCoordSource::Attribute => 0,
            TexCoordSource::Object => 1,
            TexCoordSource::Eye => 2,
            TexCoordSource::Sphere => 3,
            TexCoordSource::Normal => 4,
            TexCoordSource::Reflection => 5,
        }
    }
}
