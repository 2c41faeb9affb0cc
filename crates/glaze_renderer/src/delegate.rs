//! Shared-state tracker
//!
//! [`RendererDelegate`] owns the driver and the shadow of every piece of
//! state common to both pipelines. The pipeline trackers wrap a delegate and
//! forward the operations below unchanged.
//!
//! Every setter validates first, then compares against the shadow; the driver
//! hook fires only when the tracked value actually changes. Related values
//! diff as independent groups (blend equations separately from blend factors,
//! each stencil face separately), so a partial change emits the one hook that
//! covers it.

use glam::Vec4;
use glaze_core::{
    BlendFactor, BlendFunction, BufferHandle, Comparison, DataType, DrawStyle, PolygonType,
    RenderError, Result, ShaderHandle, StencilUpdate, TextureHandle,
};
use tracing::trace;

use crate::driver::CommonDriver;
use crate::shared_state::SharedState;

fn clamp_color(color: Vec4) -> Vec4 {
    color.clamp(Vec4::ZERO, Vec4::ONE)
}

pub struct RendererDelegate<D: CommonDriver> {
    pub(crate) driver: D,
    pub(crate) state: SharedState,
    default_state: SharedState,
}

impl<D: CommonDriver> RendererDelegate<D> {
    /// Wrap `driver`, assuming it currently holds the defaults of a freshly
    /// created context with `texture_units` texture units.
    pub fn new(driver: D, texture_units: usize) -> Self {
        RendererDelegate {
            driver,
            state: SharedState::new(texture_units),
            default_state: SharedState::new(texture_units),
        }
    }

    /// Fix up the viewport for a surface of the given dimensions.
    pub fn activate(&mut self, width: i32, height: i32) -> Result<()> {
        self.set_viewport(0, 0, width, height)
    }

    /// Replay the default state of a fresh context.
    pub fn reset(&mut self) -> Result<()> {
        let defaults = self.default_state.clone();
        self.set_current_state(&defaults)
    }

    // ---- blending ----

    pub fn set_blend_color(&mut self, color: Vec4) -> Result<()> {
        let color = clamp_color(color);
        if self.state.blend_color != color {
            self.state.blend_color = color;
            self.driver.set_blend_color(color);
        }
        Ok(())
    }

    /// Configure both the RGB and alpha halves of the blend equation.
    pub fn set_blend_mode(
        &mut self,
        function: BlendFunction,
        src: BlendFactor,
        dst: BlendFactor,
    ) -> Result<()> {
        validate_dst_factor(dst)?;
        let s = &mut self.state;
        if s.blend_func_rgb != function || s.blend_func_alpha != function {
            s.blend_func_rgb = function;
            s.blend_func_alpha = function;
            self.driver.set_blend_equations(function, function);
        }
        let s = &mut self.state;
        if s.blend_src_rgb != src
            || s.blend_dst_rgb != dst
            || s.blend_src_alpha != src
            || s.blend_dst_alpha != dst
        {
            s.blend_src_rgb = src;
            s.blend_dst_rgb = dst;
            s.blend_src_alpha = src;
            s.blend_dst_alpha = dst;
            self.driver.set_blend_factors(src, dst, src, dst);
        }
        Ok(())
    }

    pub fn set_blend_mode_rgb(
        &mut self,
        function: BlendFunction,
        src: BlendFactor,
        dst: BlendFactor,
    ) -> Result<()> {
        validate_dst_factor(dst)?;
        if self.state.blend_func_rgb != function {
            self.state.blend_func_rgb = function;
            self.driver
                .set_blend_equations(function, self.state.blend_func_alpha);
        }
        if self.state.blend_src_rgb != src || self.state.blend_dst_rgb != dst {
            self.state.blend_src_rgb = src;
            self.state.blend_dst_rgb = dst;
            self.driver.set_blend_factors(
                src,
                dst,
                self.state.blend_src_alpha,
                self.state.blend_dst_alpha,
            );
        }
        Ok(())
    }

    pub fn set_blend_mode_alpha(
        &mut self,
        function: BlendFunction,
        src: BlendFactor,
        dst: BlendFactor,
    ) -> Result<()> {
        validate_dst_factor(dst)?;
        if self.state.blend_func_alpha != function {
            self.state.blend_func_alpha = function;
            self.driver
                .set_blend_equations(self.state.blend_func_rgb, function);
        }
        if self.state.blend_src_alpha != src || self.state.blend_dst_alpha != dst {
            self.state.blend_src_alpha = src;
            self.state.blend_dst_alpha = dst;
            self.driver.set_blend_factors(
                self.state.blend_src_rgb,
                self.state.blend_dst_rgb,
                src,
                dst,
            );
        }
        Ok(())
    }

    pub fn enable_blending(&mut self, enable: bool) -> Result<()> {
        if self.state.blend_enabled != enable {
            self.state.blend_enabled = enable;
            self.driver.enable_blending(enable);
        }
        Ok(())
    }

    // ---- masks and depth ----

    pub fn set_color_write_mask(
        &mut self,
        red: bool,
        green: bool,
        blue: bool,
        alpha: bool,
    ) -> Result<()> {
        let mask = [red, green, blue, alpha];
        if self.state.color_mask != mask {
            self.state.color_mask = mask;
            self.driver.set_color_mask(red, green, blue, alpha);
        }
        Ok(())
    }

    pub fn set_depth_test(&mut self, test: Comparison) -> Result<()> {
        if self.state.depth_test != test {
            self.state.depth_test = test;
            self.driver.set_depth_test(test);
        }
        Ok(())
    }

    pub fn set_depth_write_mask(&mut self, mask: bool) -> Result<()> {
        if self.state.depth_mask != mask {
            self.state.depth_mask = mask;
            self.driver.set_depth_mask(mask);
        }
        Ok(())
    }

    pub fn set_depth_offsets(&mut self, factor: f32, units: f32) -> Result<()> {
        if self.state.depth_offset_factor != factor || self.state.depth_offset_units != units {
            self.state.depth_offset_factor = factor;
            self.state.depth_offset_units = units;
            self.driver.set_depth_offsets(factor, units);
        }
        Ok(())
    }

    pub fn enable_depth_offset(&mut self, enable: bool) -> Result<()> {
        if self.state.depth_offset_enabled != enable {
            self.state.depth_offset_enabled = enable;
            self.driver.enable_depth_offset(enable);
        }
        Ok(())
    }

    // ---- rasterization ----

    pub fn set_draw_style(&mut self, front: DrawStyle, back: DrawStyle) -> Result<()> {
        if self.state.style_front != front || self.state.style_back != back {
            self.state.style_front = front;
            self.state.style_back = back;
            self.driver.set_draw_styles(front, back);
        }
        Ok(())
    }

    pub fn set_line_width(&mut self, width: f32) -> Result<()> {
        if !(width >= 1.0) {
            return Err(RenderError::InvalidValue(format!(
                "line width must be at least 1, got {width}"
            )));
        }
        if self.state.line_width != width {
            self.state.line_width = width;
            self.driver.set_line_width(width);
        }
        Ok(())
    }

    pub fn enable_line_anti_aliasing(&mut self, enable: bool) -> Result<()> {
        if self.state.line_aa_enabled != enable {
            self.state.line_aa_enabled = enable;
            self.driver.enable_line_anti_aliasing(enable);
        }
        Ok(())
    }

    pub fn set_point_width(&mut self, width: f32) -> Result<()> {
        if !(width >= 1.0) {
            return Err(RenderError::InvalidValue(format!(
                "point width must be at least 1, got {width}"
            )));
        }
        if self.state.point_width != width {
            self.state.point_width = width;
            self.driver.set_point_width(width);
        }
        Ok(())
    }

    pub fn enable_point_anti_aliasing(&mut self, enable: bool) -> Result<()> {
        if self.state.point_aa_enabled != enable {
            self.state.point_aa_enabled = enable;
            self.driver.enable_point_anti_aliasing(enable);
        }
        Ok(())
    }

    pub fn enable_polygon_anti_aliasing(&mut self, enable: bool) -> Result<()> {
        if self.state.poly_aa_enabled != enable {
            self.state.poly_aa_enabled = enable;
            self.driver.enable_polygon_anti_aliasing(enable);
        }
        Ok(())
    }

    // ---- stencil ----

    pub fn set_stencil_test(&mut self, test: Comparison, reference: i32, mask: u32) -> Result<()> {
        self.set_stencil_test_front(test, reference, mask)?;
        self.set_stencil_test_back(test, reference, mask)
    }

    pub fn set_stencil_test_front(
        &mut self,
        test: Comparison,
        reference: i32,
        mask: u32,
    ) -> Result<()> {
        let face = &mut self.state.stencil_front;
        if face.test != test || face.reference != reference || face.test_mask != mask {
            face.test = test;
            face.reference = reference;
            face.test_mask = mask;
            self.driver.set_stencil_test(true, test, reference, mask);
        }
        Ok(())
    }

    pub fn set_stencil_test_back(
        &mut self,
        test: Comparison,
        reference: i32,
        mask: u32,
    ) -> Result<()> {
        let face = &mut self.state.stencil_back;
        if face.test != test || face.reference != reference || face.test_mask != mask {
            face.test = test;
            face.reference = reference;
            face.test_mask = mask;
            self.driver.set_stencil_test(false, test, reference, mask);
        }
        Ok(())
    }

    pub fn set_stencil_update(
        &mut self,
        stencil_fail: StencilUpdate,
        depth_fail: StencilUpdate,
        depth_pass: StencilUpdate,
    ) -> Result<()> {
        self.set_stencil_update_front(stencil_fail, depth_fail, depth_pass)?;
        self.set_stencil_update_back(stencil_fail, depth_fail, depth_pass)
    }

    pub fn set_stencil_update_front(
        &mut self,
        stencil_fail: StencilUpdate,
        depth_fail: StencilUpdate,
        depth_pass: StencilUpdate,
    ) -> Result<()> {
        let face = &mut self.state.stencil_front;
        if face.stencil_fail != stencil_fail
            || face.depth_fail != depth_fail
            || face.depth_pass != depth_pass
        {
            face.stencil_fail = stencil_fail;
            face.depth_fail = depth_fail;
            face.depth_pass = depth_pass;
            self.driver
                .set_stencil_update(true, stencil_fail, depth_fail, depth_pass);
        }
        Ok(())
    }

    pub fn set_stencil_update_back(
        &mut self,
        stencil_fail: StencilUpdate,
        depth_fail: StencilUpdate,
        depth_pass: StencilUpdate,
    ) -> Result<()> {
        let face = &mut self.state.stencil_back;
        if face.stencil_fail != stencil_fail
            || face.depth_fail != depth_fail
            || face.depth_pass != depth_pass
        {
            face.stencil_fail = stencil_fail;
            face.depth_fail = depth_fail;
            face.depth_pass = depth_pass;
            self.driver
                .set_stencil_update(false, stencil_fail, depth_fail, depth_pass);
        }
        Ok(())
    }

    pub fn set_stencil_write_mask(&mut self, mask: u32) -> Result<()> {
        self.set_stencil_write_mask_front(mask)?;
        self.set_stencil_write_mask_back(mask)
    }

    pub fn set_stencil_write_mask_front(&mut self, mask: u32) -> Result<()> {
        if self.state.stencil_front.write_mask != mask {
            self.state.stencil_front.write_mask = mask;
            self.driver.set_stencil_write_mask(true, mask);
        }
        Ok(())
    }

    pub fn set_stencil_write_mask_back(&mut self, mask: u32) -> Result<()> {
        if self.state.stencil_back.write_mask != mask {
            self.state.stencil_back.write_mask = mask;
            self.driver.set_stencil_write_mask(false, mask);
        }
        Ok(())
    }

    pub fn enable_stencil_test(&mut self, enable: bool) -> Result<()> {
        if self.state.stencil_enabled != enable {
            self.state.stencil_enabled = enable;
            self.driver.enable_stencil_test(enable);
        }
        Ok(())
    }

    // ---- viewport ----

    pub fn set_viewport(&mut self, x: i32, y: i32, width: i32, height: i32) -> Result<()> {
        if x < 0 || y < 0 || width < 0 || height < 0 {
            return Err(RenderError::InvalidValue(format!(
                "viewport arguments must be non-negative, got ({x}, {y}, {width}, {height})"
            )));
        }
        let s = &mut self.state;
        if s.view_x != x || s.view_y != y || s.view_width != width || s.view_height != height {
            s.view_x = x;
            s.view_y = y;
            s.view_width = width;
            s.view_height = height;
            self.driver.set_viewport(x, y, width, height);
        }
        Ok(())
    }

    // ---- indices and draw dispatch ----

    /// Bind or unbind the element buffer used by indexed rendering.
    pub fn set_indices(&mut self, indices: Option<&BufferHandle>) -> Result<()> {
        if let Some(vbo) = indices {
            if vbo.is_destroyed() {
                return Err(RenderError::DestroyedResource("element buffer"));
            }
            let dt = vbo.data_type();
            if dt.is_decimal() || dt.is_signed() || dt == DataType::IntBitField {
                return Err(RenderError::InvalidValue(format!(
                    "element buffers require an unsigned integer type, got {dt:?}"
                )));
            }
        }
        self.bind_element_vbo(indices);
        Ok(())
    }

    /// Issue the draw call: indexed when an element buffer is bound,
    /// otherwise straight from the bound arrays. Returns the number of
    /// polygons rendered.
    pub fn render(&mut self, polygon: PolygonType, offset: usize, count: usize) -> usize {
        if self.state.element_vbo.is_some() {
            self.driver.draw_elements(polygon, offset, count);
        } else {
            self.driver.draw_arrays(polygon, offset, count);
        }
        polygon.polygon_count(count)
    }

    // ---- context bindings (shadowed, shared with the pipeline trackers) ----

    pub(crate) fn bind_array_vbo(&mut self, buffer: Option<&BufferHandle>) {
        if self.state.array_vbo.as_ref() != buffer {
            self.driver.bind_array_buffer(buffer);
            self.state.array_vbo = buffer.cloned();
        }
    }

    pub(crate) fn bind_element_vbo(&mut self, buffer: Option<&BufferHandle>) {
        if self.state.element_vbo.as_ref() != buffer {
            self.driver.bind_element_buffer(buffer);
            self.state.element_vbo = buffer.cloned();
        }
    }

    pub(crate) fn bind_shader_handle(&mut self, shader: Option<&ShaderHandle>) {
        if self.state.shader.as_ref() != shader {
            self.driver.bind_shader(shader);
            self.state.shader = shader.cloned();
        }
    }

    pub(crate) fn bind_texture_at(&mut self, unit: usize, texture: Option<&TextureHandle>) {
        if self.state.textures[unit].as_ref() != texture {
            self.driver.bind_texture(unit, texture);
            self.state.textures[unit] = texture.cloned();
        }
    }

    // ---- snapshots ----

    /// Deep copy of the tracked shared state.
    pub fn current_state(&self) -> SharedState {
        self.state.clone()
    }

    /// Replay `state` into the driver. Value state goes through the public
    /// setters and diffs as usual; resource bindings are force-rebound
    /// through the bind hooks because the true driver bindings are unknown
    /// after a context change. Destroyed resources are swept afterwards.
    pub fn set_current_state(&mut self, state: &SharedState) -> Result<()> {
        self.set_blend_color(state.blend_color)?;
        self.set_blend_mode_rgb(state.blend_func_rgb, state.blend_src_rgb, state.blend_dst_rgb)?;
        self.set_blend_mode_alpha(
            state.blend_func_alpha,
            state.blend_src_alpha,
            state.blend_dst_alpha,
        )?;
        self.enable_blending(state.blend_enabled)?;

        let [r, g, b, a] = state.color_mask;
        self.set_color_write_mask(r, g, b, a)?;

        self.set_depth_test(state.depth_test)?;
        self.set_depth_write_mask(state.depth_mask)?;
        self.set_depth_offsets(state.depth_offset_factor, state.depth_offset_units)?;
        self.enable_depth_offset(state.depth_offset_enabled)?;

        self.set_draw_style(state.style_front, state.style_back)?;

        self.set_line_width(state.line_width)?;
        self.enable_line_anti_aliasing(state.line_aa_enabled)?;
        self.set_point_width(state.point_width)?;
        self.enable_point_anti_aliasing(state.point_aa_enabled)?;
        self.enable_polygon_anti_aliasing(state.poly_aa_enabled)?;

        let front = state.stencil_front.clone();
        self.set_stencil_test_front(front.test, front.reference, front.test_mask)?;
        self.set_stencil_update_front(front.stencil_fail, front.depth_fail, front.depth_pass)?;
        self.set_stencil_write_mask_front(front.write_mask)?;
        let back = state.stencil_back.clone();
        self.set_stencil_test_back(back.test, back.reference, back.test_mask)?;
        self.set_stencil_update_back(back.stencil_fail, back.depth_fail, back.depth_pass)?;
        self.set_stencil_write_mask_back(back.write_mask)?;
        self.enable_stencil_test(state.stencil_enabled)?;

        self.set_viewport(state.view_x, state.view_y, state.view_width, state.view_height)?;

        // The driver bindings left by the previous context owner are
        // unknown, so rebind everything without diffing.
        self.driver.bind_array_buffer(state.array_vbo.as_ref());
        self.state.array_vbo = state.array_vbo.clone();
        self.driver.bind_element_buffer(state.element_vbo.as_ref());
        self.state.element_vbo = state.element_vbo.clone();
        self.driver.bind_shader(state.shader.as_ref());
        self.state.shader = state.shader.clone();
        for unit in 0..self.state.textures.len() {
            let texture = state.textures.get(unit).and_then(|t| t.as_ref());
            self.driver.bind_texture(unit, texture);
            self.state.textures[unit] = texture.cloned();
        }
        // active_texture mirrors the driver's unit selector, which only the
        // fixed-function tracker drives; it is not replayed here

        self.sweep_destroyed();
        Ok(())
    }

    /// Unbind any tracked resource destroyed while this state was parked.
    fn sweep_destroyed(&mut self) {
        if self.state.shader.as_ref().is_some_and(|s| s.is_destroyed()) {
            trace!("unbinding destroyed shader");
            self.driver.bind_shader(None);
            self.state.shader = None;
        }
        if self.state.array_vbo.as_ref().is_some_and(|b| b.is_destroyed()) {
            trace!("unbinding destroyed array buffer");
            self.driver.bind_array_buffer(None);
            self.state.array_vbo = None;
        }
        if self.state.element_vbo.as_ref().is_some_and(|b| b.is_destroyed()) {
            trace!("unbinding destroyed element buffer");
            self.driver.bind_element_buffer(None);
            self.state.element_vbo = None;
        }
        for unit in 0..self.state.textures.len() {
            if self.state.textures[unit]
                .as_ref()
                .is_some_and(|t| t.is_destroyed())
            {
                trace!(unit, "unbinding destroyed texture");
                self.driver.bind_texture(unit, None);
                self.state.textures[unit] = None;
            }
        }
    }
}

fn validate_dst_factor(dst: BlendFactor) -> Result<()> {
    if dst == BlendFactor::SrcAlphaSaturate {
        return Err(RenderError::InvalidValue(
            "SrcAlphaSaturate is not a valid destination blend factor".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingDriver;
    use glaze_core::{TextureKind, TextureTarget};

    fn delegate() -> RendererDelegate<RecordingDriver> {
        RendererDelegate::new(RecordingDriver::new(), 4)
    }

    #[test]
    fn test_identical_setter_elided() {
        let mut d = delegate();
        d.set_depth_test(Comparison::Lequal).unwrap();
        d.set_depth_test(Comparison::Lequal).unwrap();
        d.set_depth_test(Comparison::Lequal).unwrap();
        assert_eq!(d.driver.count("set_depth_test"), 1);
    }

    #[test]
    fn test_default_setter_is_noop() {
        let mut d = delegate();
        d.set_depth_test(Comparison::Less).unwrap();
        d.enable_blending(false).unwrap();
        d.set_line_width(1.0).unwrap();
        assert!(d.driver.calls.is_empty());
    }

    #[test]
    fn test_blend_halves_diff_independently() {
        let mut d = delegate();
        d.set_blend_mode_rgb(BlendFunction::Add, BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha)
            .unwrap();
        // equation unchanged (Add is the default for both halves), so only
        // the factor hook fires
        assert_eq!(d.driver.count("set_blend_equations"), 0);
        assert_eq!(d.driver.count("set_blend_factors"), 1);

        d.set_blend_mode_alpha(BlendFunction::Max, BlendFactor::One, BlendFactor::Zero)
            .unwrap();
        assert_eq!(d.driver.count("set_blend_equations"), 1);
        // alpha factors already One/Zero
        assert_eq!(d.driver.count("set_blend_factors"), 1);
    }

    #[test]
    fn test_src_alpha_saturate_rejected_as_dst() {
        let mut d = delegate();
        let err = d.set_blend_mode(
            BlendFunction::Add,
            BlendFactor::One,
            BlendFactor::SrcAlphaSaturate,
        );
        assert!(err.is_err());
        assert_eq!(d.state.blend_dst_rgb, BlendFactor::Zero);
        assert!(d.driver.calls.is_empty());
    }

    #[test]
    fn test_stencil_faces_diff_independently() {
        let mut d = delegate();
        d.set_stencil_test_front(Comparison::Equal, 1, 0xff).unwrap();
        assert_eq!(d.driver.count("set_stencil_test"), 1);
        assert_eq!(d.state.stencil_back.test, Comparison::Always);
        d.set_stencil_test_back(Comparison::Equal, 1, 0xff).unwrap();
        assert_eq!(d.driver.count("set_stencil_test"), 2);
    }

    #[test]
    fn test_viewport_rejects_negative() {
        let mut d = delegate();
        assert!(d.set_viewport(0, 0, -1, 100).is_err());
        assert_eq!(d.state.view_width, 0);
        assert!(d.driver.calls.is_empty());
    }

    #[test]
    fn test_line_width_below_one_rejected() {
        let mut d = delegate();
        assert!(d.set_line_width(0.5).is_err());
        assert_eq!(d.state.line_width, 1.0);
    }

    #[test]
    fn test_render_dispatch_on_element_binding() {
        let mut d = delegate();
        assert_eq!(d.render(PolygonType::Triangles, 0, 9), 3);
        assert_eq!(d.driver.count("draw_arrays"), 1);

        let indices = BufferHandle::new(DataType::UnsignedInt);
        d.set_indices(Some(&indices)).unwrap();
        assert_eq!(d.render(PolygonType::TriangleStrip, 0, 9), 7);
        assert_eq!(d.driver.count("draw_elements"), 1);
    }

    #[test]
    fn test_indices_require_unsigned_ints() {
        let mut d = delegate();
        let floats = BufferHandle::new(DataType::Float);
        assert!(d.set_indices(Some(&floats)).is_err());
        let signed = BufferHandle::new(DataType::Int);
        assert!(d.set_indices(Some(&signed)).is_err());
        let ok = BufferHandle::new(DataType::UnsignedShort);
        assert!(d.set_indices(Some(&ok)).is_ok());
    }

    #[test]
    fn test_snapshot_restore_is_idempotent() {
        let mut d = delegate();
        d.set_depth_test(Comparison::Gequal).unwrap();
        d.enable_blending(true).unwrap();
        d.set_viewport(0, 0, 640, 480).unwrap();
        let snap = d.current_state();

        d.set_current_state(&snap).unwrap();
        let value_hooks_after_first = d.driver.count("set_depth_test");
        d.driver.calls.clear();

        // second restore of the same snapshot re-fires only the un-diffed
        // bind hooks
        d.set_current_state(&snap).unwrap();
        assert_eq!(d.driver.count("set_depth_test"), 0);
        assert_eq!(d.driver.count("enable_blending"), 0);
        assert_eq!(d.driver.count("set_viewport"), 0);
        assert_eq!(value_hooks_after_first, 0);
        assert_eq!(d.state.depth_test, Comparison::Gequal);
    }

    #[test]
    fn test_destroyed_texture_swept_once_on_restore() {
        let mut d = delegate();
        let tex = TextureHandle::new(TextureTarget::Tex2d, TextureKind::Color, DataType::Float);
        d.bind_texture_at(1, Some(&tex));
        let snap = d.current_state();

        tex.mark_destroyed();
        d.set_current_state(&snap).unwrap();
        // force rebind of unit 1, then exactly one unbind from the sweep
        assert_eq!(d.driver.count("bind_texture(1, None"), 1);
        assert!(d.state.textures[1].is_none());
    }
}
