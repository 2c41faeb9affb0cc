//! Driver hook traits
//!
//! The trackers in this crate funnel every real state change through one of
//! these hooks. By the time a hook fires its arguments have been validated
//! and compared against the shadow state, so implementations translate to the
//! wire format and forward; they never re-validate, re-diff, or fail.
//!
//! A driver implements [`CommonDriver`] plus whichever pipeline traits the
//! hardware supports. Capability is expressed through trait bounds on the
//! trackers rather than runtime queries.

use glam::{Mat4, Vec4};
use glaze_core::{
    BlendFactor, BlendFunction, BufferHandle, ColorPurpose, CombineFunction, CombineOperand,
    CombineSource, Comparison, DrawStyle, FogMode, MatrixMode, PolygonType, ShaderHandle,
    StencilUpdate, TexCoordSource, TextureHandle, TextureTarget, VariableType, VertexTarget,
};

/// Hooks for the state shared by every pipeline: blending, depth, stencil,
/// rasterization, viewport, draw dispatch, and context resource binding.
pub trait CommonDriver {
    fn set_blend_color(&mut self, color: Vec4);
    fn set_blend_equations(&mut self, rgb: BlendFunction, alpha: BlendFunction);
    fn set_blend_factors(
        &mut self,
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    );
    fn enable_blending(&mut self, enable: bool);

    fn set_color_mask(&mut self, red: bool, green: bool, blue: bool, alpha: bool);

    fn set_depth_test(&mut self, test: Comparison);
    fn set_depth_mask(&mut self, mask: bool);
    fn set_depth_offsets(&mut self, factor: f32, units: f32);
    fn enable_depth_offset(&mut self, enable: bool);

    fn set_draw_styles(&mut self, front: DrawStyle, back: DrawStyle);

    fn set_line_width(&mut self, width: f32);
    fn enable_line_anti_aliasing(&mut self, enable: bool);
    fn set_point_width(&mut self, width: f32);
    fn enable_point_anti_aliasing(&mut self, enable: bool);
    fn enable_polygon_anti_aliasing(&mut self, enable: bool);

    /// `front` selects which face's state is updated.
    fn set_stencil_test(&mut self, front: bool, test: Comparison, reference: i32, mask: u32);
    fn set_stencil_update(
        &mut self,
        front: bool,
        stencil_fail: StencilUpdate,
        depth_fail: StencilUpdate,
        depth_pass: StencilUpdate,
    );
    fn set_stencil_write_mask(&mut self, front: bool, mask: u32);
    fn enable_stencil_test(&mut self, enable: bool);

    fn set_viewport(&mut self, x: i32, y: i32, width: i32, height: i32);

    // Context binding points. Unlike the state hooks above these may also be
    // invoked un-diffed during snapshot restore, when the true driver binding
    // is unknown.
    fn bind_array_buffer(&mut self, buffer: Option<&BufferHandle>);
    fn bind_element_buffer(&mut self, buffer: Option<&BufferHandle>);
    fn bind_shader(&mut self, shader: Option<&ShaderHandle>);
    fn bind_texture(&mut self, unit: usize, texture: Option<&TextureHandle>);

    fn draw_arrays(&mut self, polygon: PolygonType, first: usize, count: usize);
    fn draw_elements(&mut self, polygon: PolygonType, offset: usize, count: usize);
}

/// Hooks for the legacy fixed-function pipeline.
///
/// Unit-scoped texture hooks (`enable_texture`, combine and tex-gen state)
/// apply to the unit last selected through `set_active_texture`.
pub trait FixedFunctionDriver: CommonDriver {
    fn set_matrix_mode(&mut self, mode: MatrixMode);
    /// Load `matrix` into the matrix selected by the current mode.
    fn load_matrix(&mut self, matrix: &Mat4);

    fn set_alpha_test(&mut self, test: Comparison, reference: f32);

    fn enable_fog(&mut self, enable: bool);
    fn set_fog_color(&mut self, color: Vec4);
    fn set_fog_mode(&mut self, mode: FogMode);
    fn set_fog_range(&mut self, start: f32, end: f32);
    fn set_fog_density(&mut self, density: f32);

    fn enable_lighting(&mut self, enable: bool);
    fn set_global_ambient(&mut self, color: Vec4);
    fn enable_light(&mut self, light: usize, enable: bool);
    fn set_light_color(&mut self, light: usize, purpose: ColorPurpose, color: Vec4);
    /// `position` is the caller's untransformed value; the tracker has
    /// already flushed the model-view it is relative to.
    fn set_light_position(&mut self, light: usize, position: Vec4);
    fn set_light_direction(&mut self, light: usize, direction: glam::Vec3);
    fn set_spotlight_angle(&mut self, light: usize, angle: f32);
    fn set_spotlight_exponent(&mut self, light: usize, exponent: f32);
    fn set_light_attenuation(&mut self, light: usize, constant: f32, linear: f32, quadratic: f32);

    fn set_material_color(&mut self, purpose: ColorPurpose, color: Vec4);
    fn set_material_shininess(&mut self, shininess: f32);

    fn set_active_texture(&mut self, unit: usize);
    fn enable_texture(&mut self, target: TextureTarget, enable: bool);
    fn set_texture_color(&mut self, color: Vec4);
    fn set_combine_function(&mut self, rgb: bool, function: CombineFunction);
    fn set_combine_source(&mut self, rgb: bool, operand: usize, source: CombineSource);
    fn set_combine_operand(&mut self, rgb: bool, operand: usize, operand_value: CombineOperand);
    fn set_tex_coord_source(&mut self, source: TexCoordSource);
    /// Rows of `planes` are the S/T/R/Q object-space plane equations.
    fn set_tex_object_planes(&mut self, planes: &Mat4);
    /// Rows of `planes` are the caller's untransformed S/T/R/Q eye planes;
    /// the tracker has already flushed the model-view they are relative to.
    fn set_tex_eye_planes(&mut self, planes: &Mat4);

    fn set_active_client_texture(&mut self, unit: usize);
    fn enable_attribute(&mut self, target: VertexTarget, enable: bool);
    /// The buffer has already been bound as the array buffer.
    fn set_attribute_pointer(
        &mut self,
        target: VertexTarget,
        buffer: &BufferHandle,
        offset: usize,
        stride: usize,
        element_size: usize,
    );
}

/// Hooks for the programmable-shader pipeline. Attribute hooks address
/// flattened slots; uniform hooks address flattened uniform indices.
pub trait ShaderDriver: CommonDriver {
    fn enable_attribute_slot(&mut self, slot: usize, enable: bool);
    /// The buffer has already been bound as the array buffer.
    fn set_attribute_slot_pointer(
        &mut self,
        slot: usize,
        buffer: &BufferHandle,
        offset: usize,
        stride: usize,
        element_size: usize,
    );
    /// Upload a constant attribute value; only the first `row_count` lanes
    /// are meaningful.
    fn set_attribute_slot_value(&mut self, slot: usize, row_count: usize, values: [f32; 4]);
    fn set_attribute_slot_value_int(
        &mut self,
        slot: usize,
        row_count: usize,
        signed: bool,
        values: [i32; 4],
    );

    /// Upload float-class uniform data starting at flattened `index`;
    /// `values` spans whole array elements of `ty`.
    fn set_uniform_floats(&mut self, index: usize, ty: VariableType, values: &[f32]);
    /// Upload int-class (or sampler-unit) uniform data starting at `index`.
    fn set_uniform_ints(&mut self, index: usize, ty: VariableType, values: &[i32]);
}
