//! Shadow of the legacy fixed-function pipeline state
//!
//! Eye-space quantities (light positions, spotlight directions, texture eye
//! planes) are stored already transformed by the model-view that was current
//! when they were set. They are never recomputed when the model-view later
//! changes, matching the legacy pipeline's set-time transform semantics.

use glam::{Mat4, Vec3, Vec4};
use glaze_core::{
    CombineFunction, CombineOperand, CombineSource, Comparison, FogMode, MatrixMode,
    TexCoordSource, VertexAttribute, MAX_LIGHTS, MAX_TEXTURES,
};

/// Default diffuse material color, restored when the per-vertex color
/// binding is removed.
pub const DEFAULT_DIFFUSE: Vec4 = Vec4::new(0.8, 0.8, 0.8, 1.0);

/// State of one light source.
#[derive(Clone, Debug, PartialEq)]
pub struct LightState {
    /// Eye-space position; w = 0 for directional lights
    pub position: Vec4,
    /// Eye-space spotlight direction
    pub spot_direction: Vec3,
    pub ambient: Vec4,
    pub diffuse: Vec4,
    pub specular: Vec4,
    /// Constant, linear, and quadratic attenuation terms
    pub attenuation: Vec3,
    /// Half-angle of the spot cone in degrees; 180 disables the cone
    pub spot_angle: f32,
    pub spot_exponent: f32,
    pub enabled: bool,
}

impl LightState {
    fn new(index: usize) -> Self {
        // only light 0 contributes color out of the box
        let lit = if index == 0 { Vec4::ONE } else { Vec4::new(0.0, 0.0, 0.0, 1.0) };
        LightState {
            position: Vec4::new(0.0, 0.0, 1.0, 0.0),
            spot_direction: Vec3::new(0.0, 0.0, -1.0),
            ambient: Vec4::new(0.0, 0.0, 0.0, 1.0),
            diffuse: lit,
            specular: lit,
            attenuation: Vec3::new(1.0, 0.0, 0.0),
            spot_angle: 180.0,
            spot_exponent: 0.0,
            enabled: false,
        }
    }
}

/// Combine-environment and tex-gen state of one fixed-function texture unit.
///
/// Plane matrices hold the S/T/R/Q plane equations as rows; eye planes are
/// stored pre-multiplied by the inverse model-view of their set time.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureState {
    pub color: Vec4,
    pub rgb_func: CombineFunction,
    pub alpha_func: CombineFunction,
    pub src_rgb: [CombineSource; 3],
    pub src_alpha: [CombineSource; 3],
    pub op_rgb: [CombineOperand; 3],
    pub op_alpha: [CombineOperand; 3],
    pub coord_source: TexCoordSource,
    pub object_planes: Mat4,
    pub eye_planes: Mat4,
    pub texture_matrix: Mat4,
}

impl Default for TextureState {
    fn default() -> Self {
        // S and T planes default to x and y passthrough, R and Q to zero
        let planes = Mat4::from_cols(Vec4::X, Vec4::Y, Vec4::ZERO, Vec4::ZERO);
        TextureState {
            color: Vec4::ZERO,
            rgb_func: CombineFunction::Modulate,
            alpha_func: CombineFunction::Modulate,
            src_rgb: [
                CombineSource::CurrTex,
                CombineSource::PrevTex,
                CombineSource::ConstColor,
            ],
            src_alpha: [
                CombineSource::CurrTex,
                CombineSource::PrevTex,
                CombineSource::ConstColor,
            ],
            op_rgb: [
                CombineOperand::Color,
                CombineOperand::Color,
                CombineOperand::Alpha,
            ],
            op_alpha: [
                CombineOperand::Alpha,
                CombineOperand::Alpha,
                CombineOperand::Alpha,
            ],
            coord_source: TexCoordSource::Attribute,
            object_planes: planes,
            eye_planes: planes,
            texture_matrix: Mat4::IDENTITY,
        }
    }
}

/// The complete fixed-function shadow tracked on top of
/// [`crate::SharedState`].
#[derive(Clone, Debug)]
pub struct FixedFunctionState {
    pub alpha_test: Comparison,
    pub alpha_ref: f32,

    pub fog_color: Vec4,
    pub fog_start: f32,
    pub fog_end: f32,
    pub fog_density: f32,
    pub fog_mode: FogMode,
    pub fog_enabled: bool,

    pub global_ambient: Vec4,
    pub lighting_enabled: bool,
    pub lights: [LightState; MAX_LIGHTS],

    pub mat_ambient: Vec4,
    pub mat_diffuse: Vec4,
    pub mat_specular: Vec4,
    pub mat_emissive: Vec4,
    pub shininess: f32,

    pub textures: [TextureState; MAX_TEXTURES],

    pub vertices: Option<VertexAttribute>,
    pub normals: Option<VertexAttribute>,
    pub colors: Option<VertexAttribute>,
    pub tex_coords: [Option<VertexAttribute>; MAX_TEXTURES],
    pub active_client_texture: usize,

    pub matrix_mode: MatrixMode,
    pub model_view: Mat4,
    pub projection: Mat4,
}

impl Default for FixedFunctionState {
    fn default() -> Self {
        FixedFunctionState {
            alpha_test: Comparison::Always,
            alpha_ref: 1.0,

            fog_color: Vec4::ZERO,
            fog_start: 0.0,
            fog_end: 1.0,
            fog_density: 1.0,
            fog_mode: FogMode::Exp,
            fog_enabled: false,

            global_ambient: Vec4::new(0.2, 0.2, 0.2, 1.0),
            lighting_enabled: false,
            lights: std::array::from_fn(LightState::new),

            mat_ambient: Vec4::new(0.2, 0.2, 0.2, 1.0),
            mat_diffuse: DEFAULT_DIFFUSE,
            mat_specular: Vec4::new(0.0, 0.0, 0.0, 1.0),
            mat_emissive: Vec4::new(0.0, 0.0, 0.0, 1.0),
            shininess: 0.0,

            textures: std::array::from_fn(|_| TextureState::default()),

            vertices: None,
            normals: None,
            colors: None,
            tex_coords: std::array::from_fn(|_| None),
            active_client_texture: 0,

            matrix_mode: MatrixMode::ModelView,
            model_view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_light_defaults() {
        let state = FixedFunctionState::default();
        assert_eq!(state.lights[0].diffuse, Vec4::ONE);
        assert_eq!(state.lights[1].diffuse, Vec4::new(0.0, 0.0, 0.0, 1.0));
        assert_eq!(state.lights[0].position, Vec4::new(0.0, 0.0, 1.0, 0.0));
        assert!(!state.lights[0].enabled);
    }

    #[test]
    fn test_default_plane_rows() {
        let unit = TextureState::default();
        assert_eq!(unit.eye_planes.row(0), Vec4::X);
        assert_eq!(unit.eye_planes.row(1), Vec4::Y);
        assert_eq!(unit.eye_planes.row(2), Vec4::ZERO);
        assert_eq!(unit.eye_planes.row(3), Vec4::ZERO);
    }
}
