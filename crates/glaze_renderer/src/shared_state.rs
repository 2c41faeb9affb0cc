//! Shadow of the pipeline-independent driver state
//!
//! One instance lives inside every [`crate::RendererDelegate`]; setters diff
//! against it before touching the driver. The struct is also the shared half
//! of every context snapshot, so `Clone` deep-copies everything including the
//! resource handle references.

use glam::Vec4;
use glaze_core::{
    BlendFactor, BlendFunction, BufferHandle, Comparison, DrawStyle, ShaderHandle, StencilUpdate,
    TextureHandle,
};

/// Stencil configuration for one polygon face.
#[derive(Clone, Debug, PartialEq)]
pub struct StencilFace {
    pub test: Comparison,
    pub reference: i32,
    pub test_mask: u32,
    pub write_mask: u32,
    pub stencil_fail: StencilUpdate,
    pub depth_fail: StencilUpdate,
    pub depth_pass: StencilUpdate,
}

impl Default for StencilFace {
    fn default() -> Self {
        StencilFace {
            test: Comparison::Always,
            reference: 0,
            test_mask: !0,
            write_mask: !0,
            stencil_fail: StencilUpdate::Keep,
            depth_fail: StencilUpdate::Keep,
            depth_pass: StencilUpdate::Keep,
        }
    }
}

/// The state shared by the fixed-function and shader pipelines, mirroring the
/// driver's defaults after context creation.
#[derive(Clone, Debug)]
pub struct SharedState {
    pub blend_func_rgb: BlendFunction,
    pub blend_func_alpha: BlendFunction,
    pub blend_src_rgb: BlendFactor,
    pub blend_dst_rgb: BlendFactor,
    pub blend_src_alpha: BlendFactor,
    pub blend_dst_alpha: BlendFactor,
    pub blend_color: Vec4,
    pub blend_enabled: bool,

    pub color_mask: [bool; 4],

    pub depth_test: Comparison,
    pub depth_mask: bool,
    pub depth_offset_factor: f32,
    pub depth_offset_units: f32,
    pub depth_offset_enabled: bool,

    pub style_front: DrawStyle,
    pub style_back: DrawStyle,

    pub stencil_front: StencilFace,
    pub stencil_back: StencilFace,
    pub stencil_enabled: bool,

    pub line_width: f32,
    pub line_aa_enabled: bool,
    pub point_width: f32,
    pub point_aa_enabled: bool,
    pub poly_aa_enabled: bool,

    pub view_x: i32,
    pub view_y: i32,
    pub view_width: i32,
    pub view_height: i32,

    pub array_vbo: Option<BufferHandle>,
    pub element_vbo: Option<BufferHandle>,
    pub shader: Option<ShaderHandle>,
    /// One slot per hardware texture unit
    pub textures: Box<[Option<TextureHandle>]>,
    pub active_texture: usize,
}

impl SharedState {
    /// State of a freshly created context with `texture_units` units.
    pub fn new(texture_units: usize) -> Self {
        SharedState {
            blend_func_rgb: BlendFunction::Add,
            blend_func_alpha: BlendFunction::Add,
            blend_src_rgb: BlendFactor::One,
            blend_dst_rgb: BlendFactor::Zero,
            blend_src_alpha: BlendFactor::One,
            blend_dst_alpha: BlendFactor::Zero,
            blend_color: Vec4::ZERO,
            blend_enabled: false,

            color_mask: [true; 4],

            depth_test: Comparison::Less,
            depth_mask: true,
            depth_offset_factor: 0.0,
            depth_offset_units: 0.0,
            depth_offset_enabled: false,

            style_front: DrawStyle::Solid,
            style_back: DrawStyle::None,

            stencil_front: StencilFace::default(),
            stencil_back: StencilFace::default(),
            stencil_enabled: false,

            line_width: 1.0,
            line_aa_enabled: false,
            point_width: 1.0,
            point_aa_enabled: false,
            poly_aa_enabled: false,

            view_x: 0,
            view_y: 0,
            view_width: 0,
            view_height: 0,

            array_vbo: None,
            element_vbo: None,
            shader: None,
            textures: vec![None; texture_units].into_boxed_slice(),
            active_texture: 0,
        }
    }

    pub fn texture_units(&self) -> usize {
        self.textures.len()
    }
}
