//! Fixed-function pipeline tracker
//!
//! Wraps a [`RendererDelegate`] with the legacy multi-light, multi-texture
//! state. Two pieces of machinery sit on top of plain diffing:
//!
//! - **Lazy model-view flushing.** `set_model_view` only marks the matrix
//!   dirty; the driver load happens at the points whose semantics depend on
//!   the current model-view (light positions, spotlight directions, texture
//!   eye planes) and before every draw. Consecutive model-view changes
//!   between draws collapse into one load.
//! - **Set-time eye-space transforms.** Light positions, spotlight
//!   directions, and eye planes are stored transformed by the model-view that
//!   was current when they were set, and never recomputed. Drivers receive
//!   the caller's untransformed values after the flush, so driver and shadow
//!   agree.
//!
//! The matrix-mode selector is also cached; the mode hook fires only on a
//! real switch, and the tracker leaves MODELVIEW active after any replay.

use glam::{Mat3, Mat4, Vec3, Vec4};
use glaze_core::{
    BlendFactor, BlendFunction, BufferHandle, ColorPurpose, CombineFunction, CombineOperand,
    CombineSource, Comparison, DrawStyle, FogMode, MatrixMode, PolygonType, RenderError, Result,
    StencilUpdate, TexCoordSource, TextureHandle, TextureKind, TextureTarget, VertexAttribute,
    VertexTarget, MAX_LIGHTS, MAX_TEXTURES,
};
use tracing::trace;

use crate::delegate::RendererDelegate;
use crate::driver::FixedFunctionDriver;
use crate::fixed_state::{FixedFunctionState, DEFAULT_DIFFUSE};
use crate::snapshot::{ContextSnapshot, FixedFunctionSnapshot};

fn clamp_color(color: Vec4) -> Vec4 {
    color.clamp(Vec4::ZERO, Vec4::ONE)
}

/// Light and ambient colors have no upper bound in the legacy pipeline.
fn clamp_positive(color: Vec4) -> Vec4 {
    color.max(Vec4::ZERO)
}

pub struct FixedFunctionRenderer<D: FixedFunctionDriver> {
    delegate: RendererDelegate<D>,
    state: FixedFunctionState,
    model_view_dirty: bool,
    inverse_model_view: Mat4,
    inverse_dirty: bool,
}

impl<D: FixedFunctionDriver> FixedFunctionRenderer<D> {
    pub fn new(driver: D) -> Self {
        FixedFunctionRenderer {
            delegate: RendererDelegate::new(driver, MAX_TEXTURES),
            state: FixedFunctionState::default(),
            model_view_dirty: false,
            inverse_model_view: Mat4::IDENTITY,
            inverse_dirty: false,
        }
    }

    pub fn activate(&mut self, width: i32, height: i32) -> Result<()> {
        self.delegate.activate(width, height)
    }

    pub fn reset(&mut self) -> Result<()> {
        let defaults = FixedFunctionSnapshot {
            shared: crate::shared_state::SharedState::new(MAX_TEXTURES),
            fixed: FixedFunctionState::default(),
        };
        self.restore(&defaults)
    }

    // ---- matrices ----

    fn set_matrix_mode(&mut self, mode: MatrixMode) {
        if self.state.matrix_mode != mode {
            self.state.matrix_mode = mode;
            self.delegate.driver.set_matrix_mode(mode);
        }
    }

    /// Load the model-view into the driver if it changed since the last
    /// flush. Leaves MODELVIEW the active matrix mode.
    fn flush_model_view(&mut self) {
        if self.model_view_dirty {
            self.set_matrix_mode(MatrixMode::ModelView);
            self.delegate.driver.load_matrix(&self.state.model_view);
            self.model_view_dirty = false;
        }
    }

    fn inverse_model_view(&mut self) -> Mat4 {
        if self.inverse_dirty {
            self.inverse_model_view = self.state.model_view.inverse();
            self.inverse_dirty = false;
        }
        self.inverse_model_view
    }

    /// Record a new model-view without touching the driver; the load is
    /// deferred to the next flush point.
    pub fn set_model_view(&mut self, matrix: &Mat4) -> Result<()> {
        if self.state.model_view != *matrix {
            self.state.model_view = *matrix;
            self.model_view_dirty = true;
            self.inverse_dirty = true;
        }
        Ok(())
    }

    pub fn set_projection(&mut self, matrix: &Mat4) -> Result<()> {
        if self.state.projection != *matrix {
            self.state.projection = *matrix;
            self.set_matrix_mode(MatrixMode::Projection);
            self.delegate.driver.load_matrix(matrix);
        }
        Ok(())
    }

    // ---- alpha test and fog ----

    pub fn set_alpha_test(&mut self, test: Comparison, reference: f32) -> Result<()> {
        if self.state.alpha_test != test || self.state.alpha_ref != reference {
            self.state.alpha_test = test;
            self.state.alpha_ref = reference;
            self.delegate.driver.set_alpha_test(test, reference);
        }
        Ok(())
    }

    pub fn set_fog_color(&mut self, color: Vec4) -> Result<()> {
        let color = clamp_color(color);
        if self.state.fog_color != color {
            self.state.fog_color = color;
            self.delegate.driver.set_fog_color(color);
        }
        Ok(())
    }

    pub fn set_fog_linear(&mut self, start: f32, end: f32) -> Result<()> {
        if !(end > start) {
            return Err(RenderError::InvalidValue(format!(
                "linear fog requires end > start, got [{start}, {end}]"
            )));
        }
        if self.state.fog_mode != FogMode::Linear {
            self.state.fog_mode = FogMode::Linear;
            self.delegate.driver.set_fog_mode(FogMode::Linear);
        }
        if self.state.fog_start != start || self.state.fog_end != end {
            self.state.fog_start = start;
            self.state.fog_end = end;
            self.delegate.driver.set_fog_range(start, end);
        }
        Ok(())
    }

    pub fn set_fog_exponential(&mut self, density: f32, squared: bool) -> Result<()> {
        if !(density >= 0.0) {
            return Err(RenderError::InvalidValue(format!(
                "fog density must be non-negative, got {density}"
            )));
        }
        let mode = if squared { FogMode::ExpSquared } else { FogMode::Exp };
        if self.state.fog_mode != mode {
            self.state.fog_mode = mode;
            self.delegate.driver.set_fog_mode(mode);
        }
        if self.state.fog_density != density {
            self.state.fog_density = density;
            self.delegate.driver.set_fog_density(density);
        }
        Ok(())
    }

    pub fn enable_fog(&mut self, enable: bool) -> Result<()> {
        if self.state.fog_enabled != enable {
            self.state.fog_enabled = enable;
            self.delegate.driver.enable_fog(enable);
        }
        Ok(())
    }

    // ---- lighting ----

    pub fn enable_lighting(&mut self, enable: bool) -> Result<()> {
        if self.state.lighting_enabled != enable {
            self.state.lighting_enabled = enable;
            self.delegate.driver.enable_lighting(enable);
        }
        Ok(())
    }

    pub fn set_global_ambient(&mut self, color: Vec4) -> Result<()> {
        let color = clamp_positive(color);
        if self.state.global_ambient != color {
            self.state.global_ambient = color;
            self.delegate.driver.set_global_ambient(color);
        }
        Ok(())
    }

    pub fn enable_light(&mut self, light: usize, enable: bool) -> Result<()> {
        check_light(light)?;
        if self.state.lights[light].enabled != enable {
            self.state.lights[light].enabled = enable;
            self.delegate.driver.enable_light(light, enable);
        }
        Ok(())
    }

    pub fn set_light_color(
        &mut self,
        light: usize,
        purpose: ColorPurpose,
        color: Vec4,
    ) -> Result<()> {
        check_light(light)?;
        if purpose == ColorPurpose::Emissive {
            return Err(RenderError::InvalidValue(
                "lights have no emissive color".into(),
            ));
        }
        let color = clamp_positive(color);
        let slot = match purpose {
            ColorPurpose::Ambient => &mut self.state.lights[light].ambient,
            ColorPurpose::Diffuse => &mut self.state.lights[light].diffuse,
            ColorPurpose::Specular => &mut self.state.lights[light].specular,
            ColorPurpose::Emissive => unreachable!(),
        };
        if *slot != color {
            *slot = color;
            self.delegate.driver.set_light_color(light, purpose, color);
        }
        Ok(())
    }

    /// Position the light relative to the current model-view. `position.w`
    /// must be 0 (directional) or 1 (point/spot); the eye-space result is
    /// stored and never re-derived when the model-view later changes.
    pub fn set_light_position(&mut self, light: usize, position: Vec4) -> Result<()> {
        check_light(light)?;
        if position.w != 0.0 && position.w != 1.0 {
            return Err(RenderError::InvalidValue(format!(
                "light position w must be 0 or 1, got {}",
                position.w
            )));
        }
        self.state.lights[light].position = self.state.model_view * position;
        self.flush_model_view();
        self.delegate.driver.set_light_position(light, position);
        Ok(())
    }

    /// Configure the spot cone and direction. `angle` is in degrees, either
    /// within [0, 90] or exactly 180 to disable the cone.
    pub fn set_spotlight(
        &mut self,
        light: usize,
        direction: Vec3,
        angle: f32,
        exponent: f32,
    ) -> Result<()> {
        check_light(light)?;
        if !(0.0..=90.0).contains(&angle) && angle != 180.0 {
            return Err(RenderError::InvalidValue(format!(
                "spotlight angle must be in [0, 90] or 180, got {angle}"
            )));
        }
        if !(0.0..=128.0).contains(&exponent) {
            return Err(RenderError::InvalidValue(format!(
                "spotlight exponent must be in [0, 128], got {exponent}"
            )));
        }
        if self.state.lights[light].spot_angle != angle {
            self.state.lights[light].spot_angle = angle;
            self.delegate.driver.set_spotlight_angle(light, angle);
        }
        if self.state.lights[light].spot_exponent != exponent {
            self.state.lights[light].spot_exponent = exponent;
            self.delegate.driver.set_spotlight_exponent(light, exponent);
        }
        // direction transforms like a vector (w = 0)
        self.state.lights[light].spot_direction =
            Mat3::from_mat4(self.state.model_view) * direction;
        self.flush_model_view();
        self.delegate.driver.set_light_direction(light, direction);
        Ok(())
    }

    pub fn set_light_attenuation(
        &mut self,
        light: usize,
        constant: f32,
        linear: f32,
        quadratic: f32,
    ) -> Result<()> {
        check_light(light)?;
        if !(constant >= 0.0) || !(linear >= 0.0) || !(quadratic >= 0.0) {
            return Err(RenderError::InvalidValue(format!(
                "attenuation terms must be non-negative, got ({constant}, {linear}, {quadratic})"
            )));
        }
        let atten = Vec3::new(constant, linear, quadratic);
        if self.state.lights[light].attenuation != atten {
            self.state.lights[light].attenuation = atten;
            self.delegate
                .driver
                .set_light_attenuation(light, constant, linear, quadratic);
        }
        Ok(())
    }

    // ---- materials ----

    pub fn set_material(
        &mut self,
        ambient: Vec4,
        diffuse: Vec4,
        specular: Vec4,
        emissive: Vec4,
    ) -> Result<()> {
        self.set_material_color(ColorPurpose::Ambient, ambient)?;
        self.set_material_color(ColorPurpose::Diffuse, diffuse)?;
        self.set_material_color(ColorPurpose::Specular, specular)?;
        self.set_material_color(ColorPurpose::Emissive, emissive)
    }

    pub fn set_material_color(&mut self, purpose: ColorPurpose, color: Vec4) -> Result<()> {
        let color = clamp_color(color);
        let slot = match purpose {
            ColorPurpose::Ambient => &mut self.state.mat_ambient,
            ColorPurpose::Diffuse => &mut self.state.mat_diffuse,
            ColorPurpose::Specular => &mut self.state.mat_specular,
            ColorPurpose::Emissive => &mut self.state.mat_emissive,
        };
        if *slot != color {
            *slot = color;
            self.delegate.driver.set_material_color(purpose, color);
        }
        Ok(())
    }

    pub fn set_material_shininess(&mut self, shininess: f32) -> Result<()> {
        if !(0.0..=128.0).contains(&shininess) {
            return Err(RenderError::InvalidValue(format!(
                "shininess must be in [0, 128], got {shininess}"
            )));
        }
        if self.state.shininess != shininess {
            self.state.shininess = shininess;
            self.delegate.driver.set_material_shininess(shininess);
        }
        Ok(())
    }

    // ---- textures ----

    fn set_texture_unit(&mut self, unit: usize) {
        if self.delegate.state.active_texture != unit {
            self.delegate.state.active_texture = unit;
            self.delegate.driver.set_active_texture(unit);
        }
    }

    /// Switch the target enables for `unit` to match `texture`, without
    /// binding anything.
    fn enable_texture_unit(&mut self, unit: usize, texture: Option<&TextureHandle>) {
        let old = self.delegate.state.textures[unit].as_ref().map(|t| t.target());
        let new = texture.map(|t| t.target());
        if old != new {
            self.set_texture_unit(unit);
            if let Some(target) = old {
                self.delegate.driver.enable_texture(target, false);
            }
            if let Some(target) = new {
                self.delegate.driver.enable_texture(target, true);
            }
        }
    }

    pub fn set_texture(&mut self, unit: usize, texture: Option<&TextureHandle>) -> Result<()> {
        check_unit(unit)?;
        if let Some(t) = texture {
            if t.is_destroyed() {
                return Err(RenderError::DestroyedResource("texture"));
            }
            let supported = match (t.target(), t.kind()) {
                (TextureTarget::Tex1d | TextureTarget::Tex2d | TextureTarget::TexCube,
                    TextureKind::Color) => true,
                (TextureTarget::Tex2d, TextureKind::Depth { .. }) => true,
                _ => false,
            };
            if !supported {
                return Err(RenderError::Unsupported(format!(
                    "the fixed-function pipeline cannot sample a {:?} {:?} texture",
                    t.target(),
                    t.kind()
                )));
            }
        }
        self.enable_texture_unit(unit, texture);
        self.delegate.bind_texture_at(unit, texture);
        Ok(())
    }

    pub fn set_texture_color(&mut self, unit: usize, color: Vec4) -> Result<()> {
        check_unit(unit)?;
        let color = clamp_color(color);
        if self.state.textures[unit].color != color {
            self.state.textures[unit].color = color;
            self.set_texture_unit(unit);
            self.delegate.driver.set_texture_color(color);
        }
        Ok(())
    }

    pub fn set_combine_rgb(
        &mut self,
        unit: usize,
        function: CombineFunction,
        sources: [CombineSource; 3],
        operands: [CombineOperand; 3],
    ) -> Result<()> {
        check_unit(unit)?;
        check_combine_sources(&sources)?;
        if self.state.textures[unit].rgb_func != function {
            self.state.textures[unit].rgb_func = function;
            self.set_texture_unit(unit);
            self.delegate.driver.set_combine_function(true, function);
        }
        for i in 0..3 {
            if self.state.textures[unit].src_rgb[i] != sources[i] {
                self.state.textures[unit].src_rgb[i] = sources[i];
                self.set_texture_unit(unit);
                self.delegate.driver.set_combine_source(true, i, sources[i]);
            }
            if self.state.textures[unit].op_rgb[i] != operands[i] {
                self.state.textures[unit].op_rgb[i] = operands[i];
                self.set_texture_unit(unit);
                self.delegate.driver.set_combine_operand(true, i, operands[i]);
            }
        }
        Ok(())
    }

    pub fn set_combine_alpha(
        &mut self,
        unit: usize,
        function: CombineFunction,
        sources: [CombineSource; 3],
        operands: [CombineOperand; 3],
    ) -> Result<()> {
        check_unit(unit)?;
        check_combine_sources(&sources)?;
        if matches!(function, CombineFunction::Dot3Rgb | CombineFunction::Dot3Rgba) {
            return Err(RenderError::InvalidValue(
                "Dot3 combine functions only apply to the RGB channel".into(),
            ));
        }
        for op in operands {
            if matches!(op, CombineOperand::Color | CombineOperand::OneMinusColor) {
                return Err(RenderError::InvalidValue(
                    "color operands are not valid for the alpha combine channel".into(),
                ));
            }
        }
        if self.state.textures[unit].alpha_func != function {
            self.state.textures[unit].alpha_func = function;
            self.set_texture_unit(unit);
            self.delegate.driver.set_combine_function(false, function);
        }
        for i in 0..3 {
            if self.state.textures[unit].src_alpha[i] != sources[i] {
                self.state.textures[unit].src_alpha[i] = sources[i];
                self.set_texture_unit(unit);
                self.delegate.driver.set_combine_source(false, i, sources[i]);
            }
            if self.state.textures[unit].op_alpha[i] != operands[i] {
                self.state.textures[unit].op_alpha[i] = operands[i];
                self.set_texture_unit(unit);
                self.delegate.driver.set_combine_operand(false, i, operands[i]);
            }
        }
        Ok(())
    }

    pub fn set_tex_coord_source(&mut self, unit: usize, source: TexCoordSource) -> Result<()> {
        check_unit(unit)?;
        if self.state.textures[unit].coord_source != source {
            self.state.textures[unit].coord_source = source;
            self.set_texture_unit(unit);
            self.delegate.driver.set_tex_coord_source(source);
        }
        Ok(())
    }

    /// Rows of `planes` are the S/T/R/Q object-space plane equations.
    pub fn set_texture_object_planes(&mut self, unit: usize, planes: &Mat4) -> Result<()> {
        check_unit(unit)?;
        if self.state.textures[unit].object_planes != *planes {
            self.state.textures[unit].object_planes = *planes;
            self.set_texture_unit(unit);
            self.delegate.driver.set_tex_object_planes(planes);
        }
        Ok(())
    }

    /// Rows of `planes` are the S/T/R/Q eye planes relative to the current
    /// model-view. The stored copy is pre-multiplied by the inverse
    /// model-view so it survives later model-view changes.
    pub fn set_texture_eye_planes(&mut self, unit: usize, planes: &Mat4) -> Result<()> {
        check_unit(unit)?;
        let inverse = self.inverse_model_view();
        self.state.textures[unit].eye_planes = *planes * inverse;
        self.flush_model_view();
        self.set_texture_unit(unit);
        self.delegate.driver.set_tex_eye_planes(planes);
        Ok(())
    }

    pub fn set_texture_transform(&mut self, unit: usize, matrix: &Mat4) -> Result<()> {
        check_unit(unit)?;
        if self.state.textures[unit].texture_matrix != *matrix {
            self.state.textures[unit].texture_matrix = *matrix;
            self.set_texture_unit(unit);
            self.set_matrix_mode(MatrixMode::Texture);
            self.delegate.driver.load_matrix(matrix);
        }
        Ok(())
    }

    // ---- vertex bindings ----

    pub fn set_vertices(&mut self, binding: Option<&VertexAttribute>) -> Result<()> {
        if let Some(b) = binding {
            check_binding(b, "vertex")?;
            if b.element_size == 1 {
                return Err(RenderError::InvalidValue(
                    "vertices require 2 to 4 components per element".into(),
                ));
            }
            let dt = b.buffer.data_type();
            if dt.is_normalized() || dt.is_byte() {
                return Err(RenderError::InvalidValue(format!(
                    "vertices cannot source from a {dt:?} buffer"
                )));
            }
        }
        self.set_vertex_binding(VertexTarget::Vertices, 0, binding);
        Ok(())
    }

    pub fn set_normals(&mut self, binding: Option<&VertexAttribute>) -> Result<()> {
        if let Some(b) = binding {
            check_binding(b, "normal")?;
            if b.element_size != 3 {
                return Err(RenderError::InvalidValue(
                    "normals require exactly 3 components per element".into(),
                ));
            }
            if !b.buffer.data_type().is_decimal() {
                return Err(RenderError::InvalidValue(
                    "normals require a decimal buffer type".into(),
                ));
            }
        }
        self.set_vertex_binding(VertexTarget::Normals, 0, binding);
        Ok(())
    }

    /// Bind per-vertex diffuse colors. Removing the binding restores the
    /// default diffuse material color.
    pub fn set_colors(&mut self, binding: Option<&VertexAttribute>) -> Result<()> {
        if let Some(b) = binding {
            check_binding(b, "color")?;
            if b.element_size != 3 && b.element_size != 4 {
                return Err(RenderError::InvalidValue(
                    "colors require 3 or 4 components per element".into(),
                ));
            }
            if !b.buffer.data_type().is_decimal() {
                return Err(RenderError::InvalidValue(
                    "colors require a decimal buffer type".into(),
                ));
            }
        }
        let had = self.state.colors.is_some();
        self.set_vertex_binding(VertexTarget::Colors, 0, binding);
        if binding.is_none() && had {
            // without per-vertex colors the diffuse material applies again
            self.state.mat_diffuse = DEFAULT_DIFFUSE;
            self.delegate
                .driver
                .set_material_color(ColorPurpose::Diffuse, DEFAULT_DIFFUSE);
        }
        Ok(())
    }

    pub fn set_texture_coordinates(
        &mut self,
        unit: usize,
        binding: Option<&VertexAttribute>,
    ) -> Result<()> {
        check_unit(unit)?;
        if let Some(b) = binding {
            check_binding(b, "texture coordinate")?;
            let dt = b.buffer.data_type();
            if dt.is_normalized() || dt.is_byte() {
                return Err(RenderError::InvalidValue(format!(
                    "texture coordinates cannot source from a {dt:?} buffer"
                )));
            }
        }
        self.set_vertex_binding(VertexTarget::TexCoords, unit, binding);
        Ok(())
    }

    fn binding_slot(&mut self, target: VertexTarget, unit: usize) -> &mut Option<VertexAttribute> {
        match target {
            VertexTarget::Vertices => &mut self.state.vertices,
            VertexTarget::Normals => &mut self.state.normals,
            VertexTarget::Colors => &mut self.state.colors,
            VertexTarget::TexCoords => &mut self.state.tex_coords[unit],
        }
    }

    fn set_vertex_binding(
        &mut self,
        target: VertexTarget,
        unit: usize,
        binding: Option<&VertexAttribute>,
    ) {
        let had = {
            let slot = self.binding_slot(target, unit);
            if slot.as_ref() == binding {
                return;
            }
            slot.is_some()
        };
        if target == VertexTarget::TexCoords && self.state.active_client_texture != unit {
            self.state.active_client_texture = unit;
            self.delegate.driver.set_active_client_texture(unit);
        }
        match binding {
            Some(b) => {
                if !had {
                    self.delegate.driver.enable_attribute(target, true);
                }
                self.delegate.bind_array_vbo(Some(&b.buffer));
                self.delegate.driver.set_attribute_pointer(
                    target,
                    &b.buffer,
                    b.offset,
                    b.stride,
                    b.element_size,
                );
            }
            None => {
                if had {
                    self.delegate.driver.enable_attribute(target, false);
                }
            }
        }
        *self.binding_slot(target, unit) = binding.cloned();
    }

    // ---- draw dispatch ----

    /// Flush any pending model-view, then issue the draw call. Returns the
    /// number of polygons rendered.
    pub fn render(&mut self, polygon: PolygonType, offset: usize, count: usize) -> usize {
        self.flush_model_view();
        self.delegate.render(polygon, offset, count)
    }

    // ---- snapshots ----

    pub fn current_state(&self) -> ContextSnapshot {
        ContextSnapshot::FixedFunction(Box::new(FixedFunctionSnapshot {
            shared: self.delegate.current_state(),
            fixed: self.state.clone(),
        }))
    }

    pub fn set_current_state(&mut self, snapshot: &ContextSnapshot) -> Result<()> {
        let snap = snapshot.as_fixed_function()?;
        self.restore(snap)
    }

    fn restore(&mut self, snap: &FixedFunctionSnapshot) -> Result<()> {
        trace!("restoring fixed-function context state");
        let f = &snap.fixed;

        self.set_alpha_test(f.alpha_test, f.alpha_ref)?;
        self.set_fog_color(f.fog_color)?;
        match f.fog_mode {
            FogMode::Linear => self.set_fog_linear(f.fog_start, f.fog_end)?,
            FogMode::Exp => self.set_fog_exponential(f.fog_density, false)?,
            FogMode::ExpSquared => self.set_fog_exponential(f.fog_density, true)?,
        }
        self.enable_fog(f.fog_enabled)?;
        self.set_global_ambient(f.global_ambient)?;
        self.enable_lighting(f.lighting_enabled)?;
        self.set_material(f.mat_ambient, f.mat_diffuse, f.mat_specular, f.mat_emissive)?;
        self.set_material_shininess(f.shininess)?;
        self.set_projection(&f.projection)?;

        // stored light positions, spot directions, and eye planes are
        // already in eye space, so they replay against the identity
        // model-view and pass through unchanged
        self.state.model_view = Mat4::IDENTITY;
        self.model_view_dirty = true;
        self.inverse_dirty = true;
        self.flush_model_view();

        for i in 0..MAX_LIGHTS {
            let light = &f.lights[i];
            self.enable_light(i, light.enabled)?;
            self.set_light_position(i, light.position)?;
            self.set_spotlight(i, light.spot_direction, light.spot_angle, light.spot_exponent)?;
            self.set_light_color(i, ColorPurpose::Ambient, light.ambient)?;
            self.set_light_color(i, ColorPurpose::Diffuse, light.diffuse)?;
            self.set_light_color(i, ColorPurpose::Specular, light.specular)?;
            self.set_light_attenuation(
                i,
                light.attenuation.x,
                light.attenuation.y,
                light.attenuation.z,
            )?;
        }

        for i in 0..MAX_TEXTURES {
            self.enable_texture_unit(i, snap.shared.textures[i].as_ref());
            let t = &f.textures[i];
            self.set_texture_color(i, t.color)?;
            self.set_combine_rgb(i, t.rgb_func, t.src_rgb, t.op_rgb)?;
            self.set_combine_alpha(i, t.alpha_func, t.src_alpha, t.op_alpha)?;
            self.set_tex_coord_source(i, t.coord_source)?;
            self.set_texture_object_planes(i, &t.object_planes)?;
            self.set_texture_eye_planes(i, &t.eye_planes)?;
            self.set_texture_transform(i, &t.texture_matrix)?;
        }

        // the true model-view is recorded but left unflushed
        self.state.model_view = f.model_view;
        self.model_view_dirty = true;
        self.inverse_dirty = true;

        self.set_vertex_binding(VertexTarget::Vertices, 0, f.vertices.as_ref());
        self.set_vertex_binding(VertexTarget::Normals, 0, f.normals.as_ref());
        self.set_vertex_binding(VertexTarget::Colors, 0, f.colors.as_ref());
        for i in 0..MAX_TEXTURES {
            self.set_vertex_binding(VertexTarget::TexCoords, i, f.tex_coords[i].as_ref());
        }

        self.delegate.set_current_state(&snap.shared)?;

        // sweep attribute buffers destroyed while the snapshot was parked
        for target in [VertexTarget::Vertices, VertexTarget::Normals, VertexTarget::Colors] {
            if self
                .binding_slot(target, 0)
                .as_ref()
                .is_some_and(|b| b.buffer.is_destroyed())
            {
                trace!(?target, "unbinding destroyed vertex buffer");
                self.set_vertex_binding(target, 0, None);
            }
        }
        for i in 0..MAX_TEXTURES {
            if self
                .binding_slot(VertexTarget::TexCoords, i)
                .as_ref()
                .is_some_and(|b| b.buffer.is_destroyed())
            {
                trace!(unit = i, "unbinding destroyed texture coordinate buffer");
                self.set_vertex_binding(VertexTarget::TexCoords, i, None);
            }
        }
        // the shared sweep nulls destroyed textures; switch their target
        // enables off as well
        for i in 0..MAX_TEXTURES {
            if let Some(texture) = &snap.shared.textures[i] {
                if self.delegate.state.textures[i].is_none() {
                    self.set_texture_unit(i);
                    self.delegate.driver.enable_texture(texture.target(), false);
                }
            }
        }

        self.set_matrix_mode(MatrixMode::ModelView);
        Ok(())
    }

    // ---- shared-state pass-throughs ----

    pub fn set_blend_color(&mut self, color: Vec4) -> Result<()> {
        self.delegate.set_blend_color(color)
    }

    pub fn set_blend_mode(
        &mut self,
        function: BlendFunction,
        src: BlendFactor,
        dst: BlendFactor,
    ) -> Result<()> {
        self.delegate.set_blend_mode(function, src, dst)
    }

    pub fn set_blend_mode_rgb(
        &mut self,
        function: BlendFunction,
        src: BlendFactor,
        dst: BlendFactor,
    ) -> Result<()> {
        self.delegate.set_blend_mode_rgb(function, src, dst)
    }

    pub fn set_blend_mode_alpha(
        &mut self,
        function: BlendFunction,
        src: BlendFactor,
        dst: BlendFactor,
    ) -> Result<()> {
        self.delegate.set_blend_mode_alpha(function, src, dst)
    }

    pub fn enable_blending(&mut self, enable: bool) -> Result<()> {
        self.delegate.enable_blending(enable)
    }

    pub fn set_color_write_mask(
        &mut self,
        red: bool,
        green: bool,
        blue: bool,
        alpha: bool,
    ) -> Result<()> {
        self.delegate.set_color_write_mask(red, green, blue, alpha)
    }

    pub fn set_depth_test(&mut self, test: Comparison) -> Result<()> {
        self.delegate.set_depth_test(test)
    }

    pub fn set_depth_write_mask(&mut self, mask: bool) -> Result<()> {
        self.delegate.set_depth_write_mask(mask)
    }

    pub fn set_depth_offsets(&mut self, factor: f32, units: f32) -> Result<()> {
        self.delegate.set_depth_offsets(factor, units)
    }

    pub fn enable_depth_offset(&mut self, enable: bool) -> Result<()> {
        self.delegate.enable_depth_offset(enable)
    }

    pub fn set_draw_style(&mut self, front: DrawStyle, back: DrawStyle) -> Result<()> {
        self.delegate.set_draw_style(front, back)
    }

    pub fn set_line_width(&mut self, width: f32) -> Result<()> {
        self.delegate.set_line_width(width)
    }

    pub fn enable_line_anti_aliasing(&mut self, enable: bool) -> Result<()> {
        self.delegate.enable_line_anti_aliasing(enable)
    }

    pub fn set_point_width(&mut self, width: f32) -> Result<()> {
        self.delegate.set_point_width(width)
    }

    pub fn enable_point_anti_aliasing(&mut self, enable: bool) -> Result<()> {
        self.delegate.enable_point_anti_aliasing(enable)
    }

    pub fn enable_polygon_anti_aliasing(&mut self, enable: bool) -> Result<()> {
        self.delegate.enable_polygon_anti_aliasing(enable)
    }

    pub fn set_stencil_test(&mut self, test: Comparison, reference: i32, mask: u32) -> Result<()> {
        self.delegate.set_stencil_test(test, reference, mask)
    }

    pub fn set_stencil_test_front(
        &mut self,
        test: Comparison,
        reference: i32,
        mask: u32,
    ) -> Result<()> {
        self.delegate.set_stencil_test_front(test, reference, mask)
    }

    pub fn set_stencil_test_back(
        &mut self,
        test: Comparison,
        reference: i32,
        mask: u32,
    ) -> Result<()> {
        self.delegate.set_stencil_test_back(test, reference, mask)
    }

    pub fn set_stencil_update(
        &mut self,
        stencil_fail: StencilUpdate,
        depth_fail: StencilUpdate,
        depth_pass: StencilUpdate,
    ) -> Result<()> {
        self.delegate
            .set_stencil_update(stencil_fail, depth_fail, depth_pass)
    }

    pub fn set_stencil_update_front(
        &mut self,
        stencil_fail: StencilUpdate,
        depth_fail: StencilUpdate,
        depth_pass: StencilUpdate,
    ) -> Result<()> {
        self.delegate
            .set_stencil_update_front(stencil_fail, depth_fail, depth_pass)
    }

    pub fn set_stencil_update_back(
        &mut self,
        stencil_fail: StencilUpdate,
        depth_fail: StencilUpdate,
        depth_pass: StencilUpdate,
    ) -> Result<()> {
        self.delegate
            .set_stencil_update_back(stencil_fail, depth_fail, depth_pass)
    }

    pub fn set_stencil_write_mask(&mut self, mask: u32) -> Result<()> {
        self.delegate.set_stencil_write_mask(mask)
    }

    pub fn set_stencil_write_mask_front(&mut self, mask: u32) -> Result<()> {
        self.delegate.set_stencil_write_mask_front(mask)
    }

    pub fn set_stencil_write_mask_back(&mut self, mask: u32) -> Result<()> {
        self.delegate.set_stencil_write_mask_back(mask)
    }

    pub fn enable_stencil_test(&mut self, enable: bool) -> Result<()> {
        self.delegate.enable_stencil_test(enable)
    }

    pub fn set_viewport(&mut self, x: i32, y: i32, width: i32, height: i32) -> Result<()> {
        self.delegate.set_viewport(x, y, width, height)
    }

    pub fn set_indices(&mut self, indices: Option<&BufferHandle>) -> Result<()> {
        self.delegate.set_indices(indices)
    }
}

fn check_light(light: usize) -> Result<()> {
    if light >= MAX_LIGHTS {
        return Err(RenderError::InvalidValue(format!(
            "light index {light} out of range, only {MAX_LIGHTS} lights are available"
        )));
    }
    Ok(())
}

fn check_unit(unit: usize) -> Result<()> {
    if unit >= MAX_TEXTURES {
        return Err(RenderError::InvalidValue(format!(
            "texture unit {unit} out of range, only {MAX_TEXTURES} units are available"
        )));
    }
    Ok(())
}

fn check_combine_sources(sources: &[CombineSource; 3]) -> Result<()> {
    for src in sources {
        if let CombineSource::Tex(unit) = src {
            if *unit as usize >= MAX_TEXTURES {
                return Err(RenderError::InvalidValue(format!(
                    "combine source references texture unit {unit}, only {MAX_TEXTURES} exist"
                )));
            }
        }
    }
    Ok(())
}

fn check_binding(binding: &VertexAttribute, label: &'static str) -> Result<()> {
    if binding.buffer.is_destroyed() {
        return Err(RenderError::DestroyedResource("vertex buffer"));
    }
    if binding.element_size == 0 || binding.element_size > 4 {
        return Err(RenderError::InvalidValue(format!(
            "{label} bindings require 1 to 4 components per element, got {}",
            binding.element_size
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingDriver;
    use glaze_core::DataType;

    fn renderer() -> FixedFunctionRenderer<RecordingDriver> {
        FixedFunctionRenderer::new(RecordingDriver::new())
    }

    fn driver_of(r: &FixedFunctionRenderer<RecordingDriver>) -> &RecordingDriver {
        &r.delegate.driver
    }

    #[test]
    fn test_model_view_flush_batches() {
        let mut r = renderer();
        let m1 = Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0));
        let m2 = Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0));
        r.set_model_view(&m1).unwrap();
        r.set_model_view(&m2).unwrap();
        assert_eq!(driver_of(&r).count("load_matrix"), 0);

        r.render(PolygonType::Triangles, 0, 3);
        assert_eq!(driver_of(&r).count("load_matrix"), 1);

        // no change, no reload
        r.render(PolygonType::Triangles, 0, 3);
        assert_eq!(driver_of(&r).count("load_matrix"), 1);
    }

    #[test]
    fn test_matrix_mode_cached() {
        let mut r = renderer();
        r.set_projection(&Mat4::perspective_rh_gl(1.0, 1.3, 0.1, 100.0))
            .unwrap();
        assert_eq!(driver_of(&r).count("set_matrix_mode(Projection)"), 1);
        r.set_projection(&Mat4::perspective_rh_gl(1.1, 1.3, 0.1, 100.0))
            .unwrap();
        // still in projection mode, only the load fires
        assert_eq!(driver_of(&r).count("set_matrix_mode(Projection)"), 1);
        assert_eq!(driver_of(&r).count("load_matrix"), 2);
    }

    #[test]
    fn test_light_position_transformed_at_set_time() {
        let mut r = renderer();
        let m1 = Mat4::from_translation(Vec3::new(0.0, 5.0, 0.0));
        r.set_model_view(&m1).unwrap();
        let p = Vec4::new(1.0, 2.0, 3.0, 1.0);
        r.set_light_position(0, p).unwrap();

        // stored value is m1 * p and the pending model-view was flushed
        assert_eq!(r.state.lights[0].position, m1 * p);
        assert_eq!(driver_of(&r).count("load_matrix"), 1);
        // the hook received the caller's untransformed position
        assert_eq!(
            driver_of(&r).last(),
            Some(format!("set_light_position(0, {p})").as_str())
        );

        // a later model-view change must not disturb the stored position
        r.set_model_view(&Mat4::from_translation(Vec3::new(9.0, 9.0, 9.0)))
            .unwrap();
        assert_eq!(r.state.lights[0].position, m1 * p);
    }

    #[test]
    fn test_light_position_w_validation_leaves_state() {
        let mut r = renderer();
        let before = r.state.lights[2].position;
        let err = r.set_light_position(2, Vec4::new(1.0, 1.0, 1.0, 0.5));
        assert!(err.is_err());
        assert_eq!(r.state.lights[2].position, before);
        assert!(driver_of(&r).calls.is_empty());
    }

    #[test]
    fn test_spotlight_angle_validation() {
        let mut r = renderer();
        assert!(r.set_spotlight(0, Vec3::NEG_Z, 91.0, 0.0).is_err());
        assert!(r.set_spotlight(0, Vec3::NEG_Z, 180.0, 0.0).is_ok());
        assert!(r.set_spotlight(0, Vec3::NEG_Z, 45.0, 129.0).is_err());
    }

    #[test]
    fn test_fog_validation_leaves_fog_state() {
        let mut r = renderer();
        r.set_fog_linear(1.0, 10.0).unwrap();
        let err = r.set_fog_linear(5.0, 2.0);
        assert!(err.is_err());
        assert_eq!(r.state.fog_start, 1.0);
        assert_eq!(r.state.fog_end, 10.0);
        assert_eq!(r.state.fog_mode, FogMode::Linear);
    }

    #[test]
    fn test_combine_alpha_updates_third_alpha_source() {
        let mut r = renderer();
        let sources = [
            CombineSource::CurrTex,
            CombineSource::PrevTex,
            CombineSource::VertexColor,
        ];
        let operands = [CombineOperand::Alpha; 3];
        r.set_combine_alpha(0, CombineFunction::Modulate, sources, operands)
            .unwrap();
        assert_eq!(r.state.textures[0].src_alpha[2], CombineSource::VertexColor);
        // the rgb sources are untouched
        assert_eq!(r.state.textures[0].src_rgb[2], CombineSource::ConstColor);
    }

    #[test]
    fn test_combine_alpha_rejects_color_operands() {
        let mut r = renderer();
        let sources = [CombineSource::CurrTex; 3];
        let bad = [
            CombineOperand::Alpha,
            CombineOperand::Color,
            CombineOperand::Alpha,
        ];
        assert!(r
            .set_combine_alpha(0, CombineFunction::Modulate, sources, bad)
            .is_err());
        assert!(r
            .set_combine_alpha(0, CombineFunction::Dot3Rgb, sources, [CombineOperand::Alpha; 3])
            .is_err());
    }

    #[test]
    fn test_unbinding_colors_restores_default_diffuse() {
        let mut r = renderer();
        let buffer = BufferHandle::new(DataType::Float);
        let binding = VertexAttribute::new(buffer, 0, 0, 4);
        r.set_colors(Some(&binding)).unwrap();
        r.set_material_color(ColorPurpose::Diffuse, Vec4::new(1.0, 0.0, 0.0, 1.0))
            .unwrap();

        r.set_colors(None).unwrap();
        assert_eq!(r.state.mat_diffuse, DEFAULT_DIFFUSE);
        assert_eq!(driver_of(&r).count("enable_attribute(Colors, false)"), 1);
    }

    #[test]
    fn test_vertices_reject_scalar_and_byte() {
        let mut r = renderer();
        let floats = BufferHandle::new(DataType::Float);
        assert!(r
            .set_vertices(Some(&VertexAttribute::new(floats.clone(), 0, 0, 1)))
            .is_err());
        let bytes = BufferHandle::new(DataType::NormalizedByte);
        assert!(r
            .set_vertices(Some(&VertexAttribute::new(bytes, 0, 0, 3)))
            .is_err());
        assert!(r
            .set_vertices(Some(&VertexAttribute::new(floats, 0, 0, 3)))
            .is_ok());
    }

    #[test]
    fn test_texture_kind_validation() {
        let mut r = renderer();
        let volume = TextureHandle::new(TextureTarget::Tex3d, TextureKind::Color, DataType::Float);
        assert!(matches!(
            r.set_texture(0, Some(&volume)),
            Err(RenderError::Unsupported(_))
        ));
        let depth = TextureHandle::new(
            TextureTarget::Tex2d,
            TextureKind::Depth { comparison: Some(Comparison::Lequal) },
            DataType::Float,
        );
        assert!(r.set_texture(0, Some(&depth)).is_ok());
    }

    #[test]
    fn test_eye_planes_invariant_under_later_model_view() {
        let mut r = renderer();
        let m1 = Mat4::from_translation(Vec3::new(0.0, 0.0, -3.0));
        r.set_model_view(&m1).unwrap();
        let planes = Mat4::from_cols(Vec4::X, Vec4::Y, Vec4::ZERO, Vec4::ZERO);
        r.set_texture_eye_planes(1, &planes).unwrap();
        let stored = r.state.textures[1].eye_planes;
        assert_eq!(stored, planes * m1.inverse());

        r.set_model_view(&Mat4::IDENTITY).unwrap();
        assert_eq!(r.state.textures[1].eye_planes, stored);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut r = renderer();
        let m = Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0));
        r.set_model_view(&m).unwrap();
        r.set_light_position(1, Vec4::new(0.0, 0.0, 0.0, 1.0)).unwrap();
        r.enable_light(1, true).unwrap();
        r.set_fog_linear(0.5, 8.0).unwrap();
        r.enable_fog(true).unwrap();

        let snap = r.current_state();
        let stored_light = r.state.lights[1].position;

        let mut other = renderer();
        other.set_current_state(&snap).unwrap();
        assert_eq!(other.state.lights[1].position, stored_light);
        assert_eq!(other.state.fog_mode, FogMode::Linear);
        assert_eq!(other.state.model_view, m);
        assert_eq!(other.state.matrix_mode, MatrixMode::ModelView);
        // model-view is pending, not flushed
        assert!(other.model_view_dirty);
    }
}
