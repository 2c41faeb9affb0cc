//! Recording driver for tracker tests
//!
//! Logs every hook invocation as a formatted string so tests can assert on
//! hook counts and ordering. Resource arguments are rendered by id.

use glam::{Mat4, Vec3, Vec4};
use glaze_core::{
    BlendFactor, BlendFunction, BufferHandle, ColorPurpose, CombineFunction, CombineOperand,
    CombineSource, Comparison, DrawStyle, FogMode, MatrixMode, PolygonType, ShaderHandle,
    StencilUpdate, TexCoordSource, TextureHandle, TextureTarget, VariableType, VertexTarget,
};

use crate::driver::{CommonDriver, FixedFunctionDriver, ShaderDriver};

/// Route tracker traces to the test writer; safe to call from every test.
pub(crate) fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub(crate) struct RecordingDriver {
    pub calls: Vec<String>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        init_test_logging();
        RecordingDriver { calls: Vec::new() }
    }

    /// Number of recorded calls starting with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.calls.iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn last(&self) -> Option<&str> {
        self.calls.last().map(String::as_str)
    }
}

fn buf(b: Option<&BufferHandle>) -> String {
    match b {
        Some(b) => format!("Some(#{})", b.id()),
        None => "None".into(),
    }
}

fn tex(t: Option<&TextureHandle>) -> String {
    match t {
        Some(t) => format!("Some(#{})", t.id()),
        None => "None".into(),
    }
}

impl CommonDriver for RecordingDriver {
    fn set_blend_color(&mut self, color: Vec4) {
        self.calls.push(format!("set_blend_color({color})"));
    }

    fn set_blend_equations(&mut self, rgb: BlendFunction, alpha: BlendFunction) {
        self.calls
            .push(format!("set_blend_equations({rgb:?}, {alpha:?})"));
    }

    fn set_blend_factors(
        &mut self,
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) {
        self.calls.push(format!(
            "set_blend_factors({src_rgb:?}, {dst_rgb:?}, {src_alpha:?}, {dst_alpha:?})"
        ));
    }

    fn enable_blending(&mut self, enable: bool) {
        self.calls.push(format!("enable_blending({enable})"));
    }

    fn set_color_mask(&mut self, red: bool, green: bool, blue: bool, alpha: bool) {
        self.calls
            .push(format!("set_color_mask({red}, {green}, {blue}, {alpha})"));
    }

    fn set_depth_test(&mut self, test: Comparison) {
        self.calls.push(format!("set_depth_test({test:?})"));
    }

    fn set_depth_mask(&mut self, mask: bool) {
        self.calls.push(format!("set_depth_mask({mask})"));
    }

    fn set_depth_offsets(&mut self, factor: f32, units: f32) {
        self.calls.push(format!("set_depth_offsets({factor}, {units})"));
    }

    fn enable_depth_offset(&mut self, enable: bool) {
        self.calls.push(format!("enable_depth_offset({enable})"));
    }

    fn set_draw_styles(&mut self, front: DrawStyle, back: DrawStyle) {
        self.calls.push(format!("set_draw_styles({front:?}, {back:?})"));
    }

    fn set_line_width(&mut self, width: f32) {
        self.calls.push(format!("set_line_width({width})"));
    }

    fn enable_line_anti_aliasing(&mut self, enable: bool) {
        self.calls.push(format!("enable_line_anti_aliasing({enable})"));
    }

    fn set_point_width(&mut self, width: f32) {
        self.calls.push(format!("set_point_width({width})"));
    }

    fn enable_point_anti_aliasing(&mut self, enable: bool) {
        self.calls.push(format!("enable_point_anti_aliasing({enable})"));
    }

    fn enable_polygon_anti_aliasing(&mut self, enable: bool) {
        self.calls
            .push(format!("enable_polygon_anti_aliasing({enable})"));
    }

    fn set_stencil_test(&mut self, front: bool, test: Comparison, reference: i32, mask: u32) {
        self.calls.push(format!(
            "set_stencil_test({front}, {test:?}, {reference}, {mask:#x})"
        ));
    }

    fn set_stencil_update(
        &mut self,
        front: bool,
        stencil_fail: StencilUpdate,
        depth_fail: StencilUpdate,
        depth_pass: StencilUpdate,
    ) {
        self.calls.push(format!(
            "set_stencil_update({front}, {stencil_fail:?}, {depth_fail:?}, {depth_pass:?})"
        ));
    }

    fn set_stencil_write_mask(&mut self, front: bool, mask: u32) {
        self.calls
            .push(format!("set_stencil_write_mask({front}, {mask:#x})"));
    }

    fn enable_stencil_test(&mut self, enable: bool) {
        self.calls.push(format!("enable_stencil_test({enable})"));
    }

    fn set_viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.calls
            .push(format!("set_viewport({x}, {y}, {width}, {height})"));
    }

    fn bind_array_buffer(&mut self, buffer: Option<&BufferHandle>) {
        self.calls.push(format!("bind_array_buffer({})", buf(buffer)));
    }

    fn bind_element_buffer(&mut self, buffer: Option<&BufferHandle>) {
        self.calls
            .push(format!("bind_element_buffer({})", buf(buffer)));
    }

    fn bind_shader(&mut self, shader: Option<&ShaderHandle>) {
        let id = match shader {
            Some(s) => format!("Some(#{})", s.id()),
            None => "None".into(),
        };
        self.calls.push(format!("bind_shader({id})"));
    }

    fn bind_texture(&mut self, unit: usize, texture: Option<&TextureHandle>) {
        self.calls
            .push(format!("bind_texture({unit}, {})", tex(texture)));
    }

    fn draw_arrays(&mut self, polygon: PolygonType, first: usize, count: usize) {
        self.calls
            .push(format!("draw_arrays({polygon:?}, {first}, {count})"));
    }

    fn draw_elements(&mut self, polygon: PolygonType, offset: usize, count: usize) {
        self.calls
            .push(format!("draw_elements({polygon:?}, {offset}, {count})"));
    }
}

impl FixedFunctionDriver for RecordingDriver {
    fn set_matrix_mode(&mut self, mode: MatrixMode) {
        self.calls.push(format!("set_matrix_mode({mode:?})"));
    }

    fn load_matrix(&mut self, matrix: &Mat4) {
        self.calls.push(format!("load_matrix({matrix})"));
    }

    fn set_alpha_test(&mut self, test: Comparison, reference: f32) {
        self.calls.push(format!("set_alpha_test({test:?}, {reference})"));
    }

    fn enable_fog(&mut self, enable: bool) {
        self.calls.push(format!("enable_fog({enable})"));
    }

    fn set_fog_color(&mut self, color: Vec4) {
        self.calls.push(format!("set_fog_color({color})"));
    }

    fn set_fog_mode(&mut self, mode: FogMode) {
        self.calls.push(format!("set_fog_mode({mode:?})"));
    }

    fn set_fog_range(&mut self, start: f32, end: f32) {
        self.calls.push(format!("set_fog_range({start}, {end})"));
    }

    fn set_fog_density(&mut self, density: f32) {
        self.calls.push(format!("set_fog_density({density})"));
    }

    fn enable_lighting(&mut self, enable: bool) {
        self.calls.push(format!("enable_lighting({enable})"));
    }

    fn set_global_ambient(&mut self, color: Vec4) {
        self.calls.push(format!("set_global_ambient({color})"));
    }

    fn enable_light(&mut self, light: usize, enable: bool) {
        self.calls.push(format!("enable_light({light}, {enable})"));
    }

    fn set_light_color(&mut self, light: usize, purpose: ColorPurpose, color: Vec4) {
        self.calls
            .push(format!("set_light_color({light}, {purpose:?}, {color})"));
    }

    fn set_light_position(&mut self, light: usize, position: Vec4) {
        self.calls
            .push(format!("set_light_position({light}, {position})"));
    }

    fn set_light_direction(&mut self, light: usize, direction: Vec3) {
        self.calls
            .push(format!("set_light_direction({light}, {direction})"));
    }

    fn set_spotlight_angle(&mut self, light: usize, angle: f32) {
        self.calls.push(format!("set_spotlight_angle({light}, {angle})"));
    }

    fn set_spotlight_exponent(&mut self, light: usize, exponent: f32) {
        self.calls
            .push(format!("set_spotlight_exponent({light}, {exponent})"));
    }

    fn set_light_attenuation(&mut self, light: usize, constant: f32, linear: f32, quadratic: f32) {
        self.calls.push(format!(
            "set_light_attenuation({light}, {constant}, {linear}, {quadratic})"
        ));
    }

    fn set_material_color(&mut self, purpose: ColorPurpose, color: Vec4) {
        self.calls
            .push(format!("set_material_color({purpose:?}, {color})"));
    }

    fn set_material_shininess(&mut self, shininess: f32) {
        self.calls.push(format!("set_material_shininess({shininess})"));
    }

    fn set_active_texture(&mut self, unit: usize) {
        self.calls.push(format!("set_active_texture({unit})"));
    }

    fn enable_texture(&mut self, target: TextureTarget, enable: bool) {
        self.calls.push(format!("enable_texture({target:?}, {enable})"));
    }

    fn set_texture_color(&mut self, color: Vec4) {
        self.calls.push(format!("set_texture_color({color})"));
    }

    fn set_combine_function(&mut self, rgb: bool, function: CombineFunction) {
        self.calls
            .push(format!("set_combine_function({rgb}, {function:?})"));
    }

    fn set_combine_source(&mut self, rgb: bool, operand: usize, source: CombineSource) {
        self.calls
            .push(format!("set_combine_source({rgb}, {operand}, {source:?})"));
    }

    fn set_combine_operand(&mut self, rgb: bool, operand: usize, operand_value: CombineOperand) {
        self.calls.push(format!(
            "set_combine_operand({rgb}, {operand}, {operand_value:?})"
        ));
    }

    fn set_tex_coord_source(&mut self, source: TexCoordSource) {
        self.calls.push(format!("set_tex_coord_source({source:?})"));
    }

    fn set_tex_object_planes(&mut self, planes: &Mat4) {
        self.calls.push(format!("set_tex_object_planes({planes})"));
    }

    fn set_tex_eye_planes(&mut self, planes: &Mat4) {
        self.calls.push(format!("set_tex_eye_planes({planes})"));
    }

    fn set_active_client_texture(&mut self, unit: usize) {
        self.calls.push(format!("set_active_client_texture({unit})"));
    }

    fn enable_attribute(&mut self, target: VertexTarget, enable: bool) {
        self.calls.push(format!("enable_attribute({target:?}, {enable})"));
    }

    fn set_attribute_pointer(
        &mut self,
        target: VertexTarget,
        buffer: &BufferHandle,
        offset: usize,
        stride: usize,
        element_size: usize,
    ) {
        self.calls.push(format!(
            "set_attribute_pointer({target:?}, #{}, {offset}, {stride}, {element_size})",
            buffer.id()
        ));
    }
}

impl ShaderDriver for RecordingDriver {
    fn enable_attribute_slot(&mut self, slot: usize, enable: bool) {
        self.calls.push(format!("enable_attribute_slot({slot}, {enable})"));
    }

    fn set_attribute_slot_pointer(
        &mut self,
        slot: usize,
        buffer: &BufferHandle,
        offset: usize,
        stride: usize,
        element_size: usize,
    ) {
        self.calls.push(format!(
            "set_attribute_slot_pointer({slot}, #{}, {offset}, {stride}, {element_size})",
            buffer.id()
        ));
    }

    fn set_attribute_slot_value(&mut self, slot: usize, row_count: usize, values: [f32; 4]) {
        self.calls.push(format!(
            "set_attribute_slot_value({slot}, {row_count}, {values:?})"
        ));
    }

    fn set_attribute_slot_value_int(
        &mut self,
        slot: usize,
        row_count: usize,
        signed: bool,
        values: [i32; 4],
    ) {
        self.calls.push(format!(
            "set_attribute_slot_value_int({slot}, {row_count}, {signed}, {values:?})"
        ));
    }

    fn set_uniform_floats(&mut self, index: usize, ty: VariableType, values: &[f32]) {
        self.calls
            .push(format!("set_uniform_floats({index}, {ty:?}, {values:?})"));
    }

    fn set_uniform_ints(&mut self, index: usize, ty: VariableType, values: &[i32]) {
        self.calls
            .push(format!("set_uniform_ints({index}, {ty:?}, {values:?})"));
    }
}
