//! Fixed-function emulation over the programmable pipeline
//!
//! [`ShaderFixedFunctionEmulator`] exposes the full fixed-function surface of
//! [`FixedFunctionRenderer`](crate::FixedFunctionRenderer) but lowers every
//! call onto a [`GlslRenderer`] driving the built-in emulation shader from
//! [`shaders`](crate::shaders). Pipeline matrices become plain uniforms, the
//! material diffuse rides the color attribute as a constant, and fog, alpha
//! test, texturing and combining are packed into the integer and vector
//! uniforms the fragment shader decodes.
//!
//! Eye-space semantics match the native tracker: light positions, spotlight
//! directions and tex-gen eye planes are transformed with the model-view
//! cached at set time, never re-derived at draw time.

use glam::{Mat3, Mat4, Vec3, Vec4};
use glaze_core::{
    AttributeHandle, BlendFactor, BlendFunction, BufferHandle, ColorPurpose, CombineFunction,
    CombineOperand, CombineSource, Comparison, DrawStyle, FogMode, PolygonType, RenderError,
    Result, ShaderHandle, StencilUpdate, TexCoordSource, TextureHandle, TextureKind,
    TextureTarget, UniformHandle, VertexAttribute, MAX_LIGHTS, MAX_TEXTURES,
};
use tracing::debug;

use crate::driver::ShaderDriver;
use crate::fixed_state::{FixedFunctionState, DEFAULT_DIFFUSE};
use crate::glsl::GlslRenderer;
use crate::shaders;
use crate::snapshot::ContextSnapshot;

/// Resolved handles into the emulation shader, cloned per use.
#[derive(Clone)]
struct EmulatorVars {
    model_view: UniformHandle,
    projection: UniformHandle,
    normal_matrix: UniformHandle,

    alpha_ref: UniformHandle,
    alpha_comparison: UniformHandle,

    enable_fog: UniformHandle,
    fog_config: UniformHandle,
    fog_color: UniformHandle,

    enable_lighting: UniformHandle,
    global_ambient: UniformHandle,
    enable_light: UniformHandle,
    light_position: UniformHandle,
    light_ambient: UniformHandle,
    light_diffuse: UniformHandle,
    light_specular: UniformHandle,
    spot_direction: UniformHandle,
    spot_cutoff: UniformHandle,
    spot_exponent: UniformHandle,
    light_attenuation: UniformHandle,

    mat_ambient: UniformHandle,
    mat_specular: UniformHandle,
    mat_emissive: UniformHandle,
    shininess: UniformHandle,

    tex_1d: UniformHandle,
    tex_2d: UniformHandle,
    tex_3d: UniformHandle,
    tex_cube: UniformHandle,
    tex_config: UniformHandle,
    depth_comparison: UniformHandle,

    combine_src_rgb: UniformHandle,
    combine_src_alpha: UniformHandle,
    combine_op_rgb: UniformHandle,
    combine_op_alpha: UniformHandle,
    combine_func_rgb: UniformHandle,
    combine_func_alpha: UniformHandle,
    combine_color: UniformHandle,

    texture_matrix: UniformHandle,
    object_planes: UniformHandle,
    eye_planes: UniformHandle,
    coord_source: UniformHandle,

    vertices: AttributeHandle,
    normals: AttributeHandle,
    colors: AttributeHandle,
    tex_coords: AttributeHandle,
}

impl EmulatorVars {
    fn resolve(shader: &ShaderHandle) -> Result<Self> {
        let uniform = |name: &str| -> Result<UniformHandle> {
            shader.uniform(name).ok_or_else(|| {
                RenderError::Unsupported(format!("emulation shader is missing uniform {name}"))
            })
        };
        let attribute = |name: &str| -> Result<AttributeHandle> {
            shader.attribute(name).ok_or_else(|| {
                RenderError::Unsupported(format!("emulation shader is missing attribute {name}"))
            })
        };

        Ok(EmulatorVars {
            model_view: uniform("uModelview")?,
            projection: uniform("uProjection")?,
            normal_matrix: uniform("uNormalMatrix")?,

            alpha_ref: uniform("uAlphaRefValue")?,
            alpha_comparison: uniform("uAlphaComparison")?,

            enable_fog: uniform("uEnableFog")?,
            fog_config: uniform("uFogConfig")?,
            fog_color: uniform("uFogColor")?,

            enable_lighting: uniform("uEnableLighting")?,
            global_ambient: uniform("uGlobalLight")?,
            enable_light: uniform("uEnableLight")?,
            light_position: uniform("uLightPos")?,
            light_ambient: uniform("uLightAmbient")?,
            light_diffuse: uniform("uLightDiffuse")?,
            light_specular: uniform("uLightSpecular")?,
            spot_direction: uniform("uSpotlightDirection")?,
            spot_cutoff: uniform("uSpotlightCutoff")?,
            spot_exponent: uniform("uSpotlightExponent")?,
            light_attenuation: uniform("uLightAttenuation")?,

            mat_ambient: uniform("uMatAmbient")?,
            mat_specular: uniform("uMatSpecular")?,
            mat_emissive: uniform("uMatEmissive")?,
            shininess: uniform("uMatShininess")?,

            tex_1d: uniform("uTex1D")?,
            tex_2d: uniform("uTex2D")?,
            tex_3d: uniform("uTex3D")?,
            tex_cube: uniform("uTexCube")?,
            tex_config: uniform("uTexConfig")?,
            depth_comparison: uniform("uDepthComparison")?,

            combine_src_rgb: uniform("uCombineSrcRGB")?,
            combine_src_alpha: uniform("uCombineSrcAlpha")?,
            combine_op_rgb: uniform("uCombineOpRGB")?,
            combine_op_alpha: uniform("uCombineOpAlpha")?,
            combine_func_rgb: uniform("uCombineFuncRGB")?,
            combine_func_alpha: uniform("uCombineFuncAlpha")?,
            combine_color: uniform("uCombineColor")?,

            texture_matrix: uniform("uTextureMatrix")?,
            object_planes: uniform("uTexGenObjPlanes")?,
            eye_planes: uniform("uTexGenEyePlanes")?,
            coord_source: uniform("uTexCoordSource")?,

            vertices: attribute("aVertex")?,
            normals: attribute("aNormal")?,
            colors: attribute("aDiffuse")?,
            tex_coords: attribute("aTexCoord")?,
        })
    }
}

pub struct ShaderFixedFunctionEmulator<D: ShaderDriver> {
    glsl: GlslRenderer<D>,
    vars: Option<EmulatorVars>,
    default_state: Option<ContextSnapshot>,
    model_view: Mat4,
    inverse_model_view: Mat4,
}

impl<D: ShaderDriver> ShaderFixedFunctionEmulator<D> {
    pub fn new(driver: D, texture_units: usize) -> Self {
        ShaderFixedFunctionEmulator {
            glsl: GlslRenderer::new(driver, texture_units),
            vars: None,
            default_state: None,
            model_view: Mat4::IDENTITY,
            inverse_model_view: Mat4::IDENTITY,
        }
    }

    /// Make this context current. The first activation compiles the built-in
    /// emulation sources through `build_shader`, resolves every uniform and
    /// attribute by name, pushes the documented fixed-function defaults and
    /// snapshots them as the default state.
    pub fn activate<F>(&mut self, width: i32, height: i32, build_shader: F) -> Result<()>
    where
        F: FnOnce(&str, &str) -> Result<ShaderHandle>,
    {
        self.glsl.activate(width, height)?;
        if self.vars.is_none() {
            debug!("building fixed-function emulation shader");
            let shader = build_shader(
                shaders::EMULATION_VERTEX_SHADER,
                shaders::EMULATION_FRAGMENT_SHADER,
            )?;
            let vars = EmulatorVars::resolve(&shader)?;
            self.glsl.set_shader(Some(&shader))?;
            self.vars = Some(vars);
            self.load_defaults()?;
            self.default_state = Some(self.glsl.current_state());
        }
        Ok(())
    }

    /// No-op until the first activation has established a default state.
    pub fn reset(&mut self) -> Result<()> {
        let Some(default) = self.default_state.clone() else {
            return Ok(());
        };
        self.set_current_state(&default)
    }

    fn vars(&self) -> Result<EmulatorVars> {
        self.vars.clone().ok_or_else(|| {
            RenderError::Unsupported(
                "fixed-function emulation requires an activated context".into(),
            )
        })
    }

    fn check_light(&self, light: usize) -> Result<()> {
        if light >= MAX_LIGHTS {
            return Err(RenderError::InvalidValue(format!(
                "light index {light} exceeds the supported {MAX_LIGHTS} lights"
            )));
        }
        Ok(())
    }

    fn check_unit(&self, unit: usize) -> Result<()> {
        if unit >= MAX_TEXTURES {
            return Err(RenderError::InvalidValue(format!(
                "texture unit {unit} exceeds the supported {MAX_TEXTURES} units"
            )));
        }
        Ok(())
    }

    // ---- transforms ----

    pub fn set_model_view(&mut self, matrix: &Mat4) -> Result<()> {
        let v = self.vars()?;
        self.model_view = *matrix;
        self.inverse_model_view = matrix.inverse();
        self.glsl.set_uniform_mat4(&v.model_view, 0, matrix)?;
        let normal = Mat3::from_mat4(self.inverse_model_view).transpose();
        self.glsl.set_uniform_mat3(&v.normal_matrix, 0, &normal)
    }

    pub fn set_projection(&mut self, matrix: &Mat4) -> Result<()> {
        let v = self.vars()?;
        self.glsl.set_uniform_mat4(&v.projection, 0, matrix)
    }

    // ---- alpha test and fog ----

    pub fn set_alpha_test(&mut self, test: Comparison, reference: f32) -> Result<()> {
        let v = self.vars()?;
        // -1 turns the shader's alpha test off entirely
        let code = if test == Comparison::Always { -1 } else { test.encode() };
        self.glsl.set_uniform_i32(&v.alpha_comparison, 0, code)?;
        self.glsl.set_uniform_f32(&v.alpha_ref, 0, reference)
    }

    pub fn set_fog_color(&mut self, color: Vec4) -> Result<()> {
        let v = self.vars()?;
        self.glsl.set_uniform_vec4(&v.fog_color, 0, color)
    }

    pub fn set_fog_linear(&mut self, start: f32, end: f32) -> Result<()> {
        if !(end > start) {
            return Err(RenderError::InvalidValue(format!(
                "linear fog requires start < end, got [{start}, {end}]"
            )));
        }
        let v = self.vars()?;
        self.glsl
            .set_uniform_vec3(&v.fog_config, 0, Vec3::new(start, end, 0.0))
    }

    pub fn set_fog_exponential(&mut self, density: f32, squared: bool) -> Result<()> {
        if !(density >= 0.0) {
            return Err(RenderError::InvalidValue(format!(
                "fog density must not be negative, got {density}"
            )));
        }
        let v = self.vars()?;
        let signal = if squared { -1.0 } else { 1.0 };
        self.glsl
            .set_uniform_vec3(&v.fog_config, 0, Vec3::new(density, 0.0, signal))
    }

    pub fn enable_fog(&mut self, enable: bool) -> Result<()> {
        let v = self.vars()?;
        self.glsl.set_uniform_i32(&v.enable_fog, 0, enable as i32)
    }

    // ---- lighting ----

    pub fn enable_lighting(&mut self, enable: bool) -> Result<()> {
        let v = self.vars()?;
        self.glsl
            .set_uniform_i32(&v.enable_lighting, 0, enable as i32)
    }

    pub fn set_global_ambient(&mut self, color: Vec4) -> Result<()> {
        let v = self.vars()?;
        self.glsl.set_uniform_vec4(&v.global_ambient, 0, color)
    }

    pub fn enable_light(&mut self, light: usize, enable: bool) -> Result<()> {
        self.check_light(light)?;
        let v = self.vars()?;
        self.glsl
            .set_uniform_i32(&v.enable_light, light, enable as i32)
    }

    pub fn set_light_color(
        &mut self,
        light: usize,
        purpose: ColorPurpose,
        color: Vec4,
    ) -> Result<()> {
        self.check_light(light)?;
        let v = self.vars()?;
        let uniform = match purpose {
            ColorPurpose::Ambient => &v.light_ambient,
            ColorPurpose::Diffuse => &v.light_diffuse,
            ColorPurpose::Specular => &v.light_specular,
            ColorPurpose::Emissive => {
                return Err(RenderError::InvalidValue(
                    "lights have no emissive color".into(),
                ))
            }
        };
        self.glsl.set_uniform_vec4(uniform, light, color)
    }

    /// The position is transformed into eye space with the current model-view
    /// before upload; later model-view changes do not move the light.
    pub fn set_light_position(&mut self, light: usize, position: Vec4) -> Result<()> {
        self.check_light(light)?;
        if position.w != 0.0 && position.w != 1.0 {
            return Err(RenderError::InvalidValue(format!(
                "light positions require w of 0 or 1, got {}",
                position.w
            )));
        }
        let v = self.vars()?;
        let eye = self.model_view * position;
        self.glsl.set_uniform_vec4(&v.light_position, light, eye)
    }

    pub fn set_spotlight(
        &mut self,
        light: usize,
        direction: Vec3,
        angle: f32,
        exponent: f32,
    ) -> Result<()> {
        self.check_light(light)?;
        if !((0.0..=90.0).contains(&angle) || angle == 180.0) {
            return Err(RenderError::InvalidValue(format!(
                "spotlight angles must be in [0, 90] or exactly 180, got {angle}"
            )));
        }
        if !(0.0..=128.0).contains(&exponent) {
            return Err(RenderError::InvalidValue(format!(
                "spotlight exponents must be in [0, 128], got {exponent}"
            )));
        }
        let v = self.vars()?;
        let eye_dir = (Mat3::from_mat4(self.model_view) * direction).normalize_or_zero();
        self.glsl
            .set_uniform_vec3(&v.spot_direction, light, eye_dir)?;
        // 180 degrees disables the cone; the shader keys on exactly -1
        let cutoff = if angle == 180.0 { -1.0 } else { angle.to_radians().cos() };
        self.glsl.set_uniform_f32(&v.spot_cutoff, light, cutoff)?;
        self.glsl.set_uniform_f32(&v.spot_exponent, light, exponent)
    }

    pub fn set_light_attenuation(
        &mut self,
        light: usize,
        constant: f32,
        linear: f32,
        quadratic: f32,
    ) -> Result<()> {
        self.check_light(light)?;
        if !(constant >= 0.0 && linear >= 0.0 && quadratic >= 0.0) {
            return Err(RenderError::InvalidValue(format!(
                "attenuation terms must not be negative, got ({constant}, {linear}, {quadratic})"
            )));
        }
        let v = self.vars()?;
        self.glsl.set_uniform_vec3(
            &v.light_attenuation,
            light,
            Vec3::new(constant, linear, quadratic),
        )
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
        let v = self.vars()?;
        match purpose {
            ColorPurpose::Ambient => self.glsl.set_uniform_vec4(&v.mat_ambient, 0, color),
            ColorPurpose::Specular => self.glsl.set_uniform_vec4(&v.mat_specular, 0, color),
            ColorPurpose::Emissive => self.glsl.set_uniform_vec4(&v.mat_emissive, 0, color),
            // the diffuse color rides the color attribute as a constant
            ColorPurpose::Diffuse => self.glsl.set_attribute_vec4(&v.colors, 0, color),
        }
    }

    pub fn set_material_shininess(&mut self, shininess: f32) -> Result<()> {
        if !(0.0..=128.0).contains(&shininess) {
            return Err(RenderError::InvalidValue(format!(
                "shininess must be in [0, 128], got {shininess}"
            )));
        }
        let v = self.vars()?;
        self.glsl.set_uniform_f32(&v.shininess, 0, shininess)
    }

    // ---- texturing ----

    /// Route the texture to the sampler array of its dimensionality and tag
    /// the unit's config so the fragment shader knows which sampler to read.
    pub fn set_texture(&mut self, unit: usize, texture: Option<&TextureHandle>) -> Result<()> {
        self.check_unit(unit)?;
        let v = self.vars()?;
        let Some(texture) = texture else {
            self.glsl.set_uniform_i32(&v.tex_config, unit, -1)?;
            return self.glsl.set_uniform_i32(&v.depth_comparison, unit, -1);
        };
        if texture.is_destroyed() {
            return Err(RenderError::DestroyedResource("texture"));
        }
        let (sampler, config) = match texture.target() {
            TextureTarget::Tex1d => (&v.tex_1d, 0),
            TextureTarget::Tex2d => (&v.tex_2d, 1),
            TextureTarget::Tex3d => (&v.tex_3d, 2),
            TextureTarget::TexCube => (&v.tex_cube, 3),
            other => {
                return Err(RenderError::Unsupported(format!(
                    "{other:?} textures have no fixed-function binding"
                )))
            }
        };
        let comparison = match texture.kind() {
            TextureKind::Color => -1,
            TextureKind::Depth { comparison } => {
                if texture.target() != TextureTarget::Tex2d {
                    return Err(RenderError::Unsupported(
                        "only 2D depth maps can be combined".into(),
                    ));
                }
                comparison.map_or(-1, Comparison::encode)
            }
        };
        self.glsl.set_uniform_sampler_unchecked(sampler, unit, texture)?;
        self.glsl.set_uniform_i32(&v.tex_config, unit, config)?;
        self.glsl
            .set_uniform_i32(&v.depth_comparison, unit, comparison)
    }

    pub fn set_texture_color(&mut self, unit: usize, color: Vec4) -> Result<()> {
        self.check_unit(unit)?;
        let v = self.vars()?;
        self.glsl.set_uniform_vec4(&v.combine_color, unit, color)
    }

    pub fn set_combine_rgb(
        &mut self,
        unit: usize,
        function: CombineFunction,
        sources: [CombineSource; 3],
        operands: [CombineOperand; 3],
    ) -> Result<()> {
        self.check_unit(unit)?;
        check_combine_sources(&sources)?;
        let v = self.vars()?;
        self.glsl
            .set_uniform_i32(&v.combine_func_rgb, unit, function.encode())?;
        self.glsl.set_uniform_ivec3(
            &v.combine_src_rgb,
            unit,
            [sources[0].encode(), sources[1].encode(), sources[2].encode()],
        )?;
        self.glsl.set_uniform_ivec3(
            &v.combine_op_rgb,
            unit,
            [operands[0].encode(), operands[1].encode(), operands[2].encode()],
        )
    }

    pub fn set_combine_alpha(
        &mut self,
        unit: usize,
        function: CombineFunction,
        sources: [CombineSource; 3],
        operands: [CombineOperand; 3],
    ) -> Result<()> {
        self.check_unit(unit)?;
        check_combine_sources(&sources)?;
        if matches!(function, CombineFunction::Dot3Rgb | CombineFunction::Dot3Rgba) {
            return Err(RenderError::InvalidValue(
                "dot3 combining only applies to the rgb half".into(),
            ));
        }
        for operand in operands {
            if matches!(operand, CombineOperand::Color | CombineOperand::OneMinusColor) {
                return Err(RenderError::InvalidValue(
                    "alpha combining cannot read color operands".into(),
                ));
            }
        }
        let v = self.vars()?;
        self.glsl
            .set_uniform_i32(&v.combine_func_alpha, unit, function.encode())?;
        self.glsl.set_uniform_ivec3(
            &v.combine_src_alpha,
            unit,
            [sources[0].encode(), sources[1].encode(), sources[2].encode()],
        )?;
        self.glsl.set_uniform_ivec3(
            &v.combine_op_alpha,
            unit,
            [operands[0].encode(), operands[1].encode(), operands[2].encode()],
        )
    }

    pub fn set_tex_coord_source(&mut self, unit: usize, source: TexCoordSource) -> Result<()> {
        self.check_unit(unit)?;
        let v = self.vars()?;
        self.glsl
            .set_uniform_i32(&v.coord_source, unit, source.encode())
    }

    pub fn set_texture_object_planes(&mut self, unit: usize, planes: &Mat4) -> Result<()> {
        self.check_unit(unit)?;
        let v = self.vars()?;
        self.glsl.set_uniform_mat4(&v.object_planes, unit, planes)
    }

    /// Planes are pre-multiplied by the inverse of the current model-view so
    /// the shader can evaluate them against draw-time eye coordinates.
    pub fn set_texture_eye_planes(&mut self, unit: usize, planes: &Mat4) -> Result<()> {
        self.check_unit(unit)?;
        let v = self.vars()?;
        let eye = *planes * self.inverse_model_view;
        self.glsl.set_uniform_mat4(&v.eye_planes, unit, &eye)
    }

    pub fn set_texture_transform(&mut self, unit: usize, matrix: &Mat4) -> Result<()> {
        self.check_unit(unit)?;
        let v = self.vars()?;
        self.glsl.set_uniform_mat4(&v.texture_matrix, unit, matrix)
    }

    // ---- vertex streams ----

    pub fn set_vertices(&mut self, binding: Option<&VertexAttribute>) -> Result<()> {
        let v = self.vars()?;
        match binding {
            Some(b) => {
                if b.element_size == 1 {
                    return Err(RenderError::InvalidValue(
                        "vertices require at least 2 components per element".into(),
                    ));
                }
                if b.buffer.data_type().is_normalized() || b.buffer.data_type().is_byte() {
                    return Err(RenderError::InvalidValue(format!(
                        "{:?} buffers cannot hold vertices",
                        b.buffer.data_type()
                    )));
                }
                self.glsl.bind_attribute(&v.vertices, 0, 0, Some(b))
            }
            None => self
                .glsl
                .set_attribute_vec4(&v.vertices, 0, Vec4::new(0.0, 0.0, 0.0, 1.0)),
        }
    }

    pub fn set_normals(&mut self, binding: Option<&VertexAttribute>) -> Result<()> {
        let v = self.vars()?;
        match binding {
            Some(b) => {
                if b.element_size != 3 {
                    return Err(RenderError::InvalidValue(
                        "normals require exactly 3 components per element".into(),
                    ));
                }
                self.glsl.bind_attribute(&v.normals, 0, 0, Some(b))
            }
            None => self.glsl.set_attribute_vec3(&v.normals, 0, Vec3::Z),
        }
    }

    pub fn set_colors(&mut self, binding: Option<&VertexAttribute>) -> Result<()> {
        let v = self.vars()?;
        match binding {
            Some(b) => {
                if b.element_size != 3 && b.element_size != 4 {
                    return Err(RenderError::InvalidValue(
                        "colors require 3 or 4 components per element".into(),
                    ));
                }
                self.glsl.bind_attribute(&v.colors, 0, 0, Some(b))
            }
            // unbinding re-establishes the default material diffuse
            None => self.glsl.set_attribute_vec4(&v.colors, 0, DEFAULT_DIFFUSE),
        }
    }

    pub fn set_texture_coordinates(
        &mut self,
        unit: usize,
        binding: Option<&VertexAttribute>,
    ) -> Result<()> {
        self.check_unit(unit)?;
        let v = self.vars()?;
        match binding {
            Some(b) => {
                if b.buffer.data_type().is_normalized() || b.buffer.data_type().is_byte() {
                    return Err(RenderError::InvalidValue(format!(
                        "{:?} buffers cannot hold texture coordinates",
                        b.buffer.data_type()
                    )));
                }
                self.glsl.bind_attribute(&v.tex_coords, unit, 0, Some(b))
            }
            None => self
                .glsl
                .set_attribute_vec4(&v.tex_coords, unit, Vec4::new(0.0, 0.0, 0.0, 1.0)),
        }
    }

    // ---- draw dispatch and snapshots ----

    /// Issue the draw call; returns the number of polygons rendered.
    pub fn render(&mut self, polygon: PolygonType, offset: usize, count: usize) -> usize {
        self.glsl.render(polygon, offset, count)
    }

    pub fn current_state(&self) -> ContextSnapshot {
        self.glsl.current_state()
    }

    pub fn set_current_state(&mut self, snapshot: &ContextSnapshot) -> Result<()> {
        self.glsl.set_current_state(snapshot)?;
        // resync the cached transforms from the restored uniform storage
        if let Some(v) = &self.vars {
            let data = v.model_view.data();
            if data.initialized {
                let restored = Mat4::from_cols_slice(&data.floats);
                drop(data);
                self.model_view = restored;
                self.inverse_model_view = restored.inverse();
            }
        }
        Ok(())
    }

    fn load_defaults(&mut self) -> Result<()> {
        let d = FixedFunctionState::default();

        self.set_model_view(&d.model_view)?;
        self.set_projection(&d.projection)?;
        self.set_alpha_test(d.alpha_test, d.alpha_ref)?;

        self.set_fog_color(d.fog_color)?;
        match d.fog_mode {
            FogMode::Linear => self.set_fog_linear(d.fog_start, d.fog_end)?,
            FogMode::Exp => self.set_fog_exponential(d.fog_density, false)?,
            FogMode::ExpSquared => self.set_fog_exponential(d.fog_density, true)?,
        }
        self.enable_fog(d.fog_enabled)?;

        self.enable_lighting(d.lighting_enabled)?;
        self.set_global_ambient(d.global_ambient)?;
        for (i, light) in d.lights.iter().enumerate() {
            self.enable_light(i, light.enabled)?;
            self.set_light_position(i, light.position)?;
            self.set_light_color(i, ColorPurpose::Ambient, light.ambient)?;
            self.set_light_color(i, ColorPurpose::Diffuse, light.diffuse)?;
            self.set_light_color(i, ColorPurpose::Specular, light.specular)?;
            self.set_spotlight(i, light.spot_direction, light.spot_angle, light.spot_exponent)?;
            self.set_light_attenuation(
                i,
                light.attenuation.x,
                light.attenuation.y,
                light.attenuation.z,
            )?;
        }

        self.set_material(d.mat_ambient, d.mat_diffuse, d.mat_specular, d.mat_emissive)?;
        self.set_material_shininess(d.shininess)?;

        for (i, tex) in d.textures.iter().enumerate() {
            self.set_texture(i, None)?;
            self.set_texture_color(i, tex.color)?;
            self.set_combine_rgb(i, tex.rgb_func, tex.src_rgb, tex.op_rgb)?;
            self.set_combine_alpha(i, tex.alpha_func, tex.src_alpha, tex.op_alpha)?;
            self.set_tex_coord_source(i, tex.coord_source)?;
            self.set_texture_object_planes(i, &tex.object_planes)?;
            self.set_texture_eye_planes(i, &tex.eye_planes)?;
            self.set_texture_transform(i, &tex.texture_matrix)?;
            self.set_texture_coordinates(i, None)?;
        }

        self.set_vertices(None)?;
        self.set_normals(None)?;
        self.set_colors(None)?;
        Ok(())
    }

    // ---- shared-state pass-throughs ----

    pub fn set_blend_color(&mut self, color: Vec4) -> Result<()> {
        self.glsl.set_blend_color(color)
    }

    pub fn set_blend_mode(
        &mut self,
        function: BlendFunction,
        src: BlendFactor,
        dst: BlendFactor,
    ) -> Result<()> {
        self.glsl.set_blend_mode(function, src, dst)
    }

    pub fn set_blend_mode_rgb(
        &mut self,
        function: BlendFunction,
        src: BlendFactor,
        dst: BlendFactor,
    ) -> Result<()> {
        self.glsl.set_blend_mode_rgb(function, src, dst)
    }

    pub fn set_blend_mode_alpha(
        &mut self,
        function: BlendFunction,
        src: BlendFactor,
        dst: BlendFactor,
    ) -> Result<()> {
        self.glsl.set_blend_mode_alpha(function, src, dst)
    }

    pub fn enable_blending(&mut self, enable: bool) -> Result<()> {
        self.glsl.enable_blending(enable)
    }

    pub fn set_color_write_mask(
        &mut self,
        red: bool,
        green: bool,
        blue: bool,
        alpha: bool,
    ) -> Result<()> {
        self.glsl.set_color_write_mask(red, green, blue, alpha)
    }

    pub fn set_depth_test(&mut self, test: Comparison) -> Result<()> {
        self.glsl.set_depth_test(test)
    }

    pub fn set_depth_write_mask(&mut self, mask: bool) -> Result<()> {
        self.glsl.set_depth_write_mask(mask)
    }

    pub fn set_depth_offsets(&mut self, factor: f32, units: f32) -> Result<()> {
        self.glsl.set_depth_offsets(factor, units)
    }

    pub fn enable_depth_offset(&mut self, enable: bool) -> Result<()> {
        self.glsl.enable_depth_offset(enable)
    }

    pub fn set_draw_style(&mut self, front: DrawStyle, back: DrawStyle) -> Result<()> {
        self.glsl.set_draw_style(front, back)
    }

    pub fn set_line_width(&mut self, width: f32) -> Result<()> {
        self.glsl.set_line_width(width)
    }

    pub fn enable_line_anti_aliasing(&mut self, enable: bool) -> Result<()> {
        self.glsl.enable_line_anti_aliasing(enable)
    }

    pub fn set_point_width(&mut self, width: f32) -> Result<()> {
        self.glsl.set_point_width(width)
    }

    pub fn enable_point_anti_aliasing(&mut self, enable: bool) -> Result<()> {
        self.glsl.enable_point_anti_aliasing(enable)
    }

    pub fn enable_polygon_anti_aliasing(&mut self, enable: bool) -> Result<()> {
        self.glsl.enable_polygon_anti_aliasing(enable)
    }

    pub fn set_stencil_test(&mut self, test: Comparison, reference: i32, mask: u32) -> Result<()> {
        self.glsl.set_stencil_test(test, reference, mask)
    }

    pub fn set_stencil_test_front(
        &mut self,
        test: Comparison,
        reference: i32,
        mask: u32,
    ) -> Result<()> {
        self.glsl.set_stencil_test_front(test, reference, mask)
    }

    pub fn set_stencil_test_back(
        &mut self,
        test: Comparison,
        reference: i32,
        mask: u32,
    ) -> Result<()> {
        self.glsl.set_stencil_test_back(test, reference, mask)
    }

    pub fn set_stencil_update(
        &mut self,
        stencil_fail: StencilUpdate,
        depth_fail: StencilUpdate,
        depth_pass: StencilUpdate,
    ) -> Result<()> {
        self.glsl.set_stencil_update(stencil_fail, depth_fail, depth_pass)
    }

    pub fn set_stencil_update_front(
        &mut self,
        stencil_fail: StencilUpdate,
        depth_fail: StencilUpdate,
        depth_pass: StencilUpdate,
    ) -> Result<()> {
        self.glsl
            .set_stencil_update_front(stencil_fail, depth_fail, depth_pass)
    }

    pub fn set_stencil_update_back(
        &mut self,
        stencil_fail: StencilUpdate,
        depth_fail: StencilUpdate,
        depth_pass: StencilUpdate,
    ) -> Result<()> {
        self.glsl
            .set_stencil_update_back(stencil_fail, depth_fail, depth_pass)
    }

    pub fn set_stencil_write_mask(&mut self, mask: u32) -> Result<()> {
        self.glsl.set_stencil_write_mask(mask)
    }

    pub fn set_stencil_write_mask_front(&mut self, mask: u32) -> Result<()> {
        self.glsl.set_stencil_write_mask_front(mask)
    }

    pub fn set_stencil_write_mask_back(&mut self, mask: u32) -> Result<()> {
        self.glsl.set_stencil_write_mask_back(mask)
    }

    pub fn enable_stencil_test(&mut self, enable: bool) -> Result<()> {
        self.glsl.enable_stencil_test(enable)
    }

    pub fn set_viewport(&mut self, x: i32, y: i32, width: i32, height: i32) -> Result<()> {
        self.glsl.set_viewport(x, y, width, height)
    }

    pub fn set_indices(&mut self, indices: Option<&BufferHandle>) -> Result<()> {
        self.glsl.set_indices(indices)
    }
}

fn check_combine_sources(sources: &[CombineSource; 3]) -> Result<()> {
    for source in sources {
        if let CombineSource::Tex(unit) = source {
            if *unit as usize >= MAX_TEXTURES {
                return Err(RenderError::InvalidValue(format!(
                    "combine source references texture unit {unit}, only {MAX_TEXTURES} exist"
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingDriver;
    use glaze_core::DataType;

    fn activated() -> (ShaderFixedFunctionEmulator<RecordingDriver>, ShaderHandle) {
        let mut emu = ShaderFixedFunctionEmulator::new(RecordingDriver::new(), 16);
        let mut built = None;
        emu.activate(640, 480, |_vert, _frag| {
            let shader = ShaderHandle::new(shaders::uniform_specs(), shaders::attribute_specs());
            built = Some(shader.clone());
            Ok(shader)
        })
        .unwrap();
        (emu, built.unwrap())
    }

    fn uniform_ints(shader: &ShaderHandle, name: &str) -> Vec<i32> {
        shader.uniform(name).unwrap().data().ints.clone()
    }

    fn uniform_floats(shader: &ShaderHandle, name: &str) -> Vec<f32> {
        shader.uniform(name).unwrap().data().floats.clone()
    }

    #[test]
    fn test_activation_builds_defaults_once() {
        let (mut emu, shader) = activated();
        assert!(emu.default_state.is_some());
        // alpha test defaults to always-pass, tagged -1
        assert_eq!(uniform_ints(&shader, "uAlphaComparison"), vec![-1]);
        assert_eq!(uniform_ints(&shader, "uTexConfig"), vec![-1; 4]);
        // fog defaults to exponential density 1
        assert_eq!(uniform_floats(&shader, "uFogConfig"), vec![1.0, 0.0, 1.0]);

        // re-activating must not rebuild
        emu.activate(640, 480, |_, _| {
            panic!("shader rebuilt on second activation");
        })
        .unwrap();
    }

    #[test]
    fn test_calls_before_activation_are_rejected() {
        let mut emu = ShaderFixedFunctionEmulator::new(RecordingDriver::new(), 16);
        assert!(emu.set_model_view(&Mat4::IDENTITY).is_err());
        // reset without a default state is a quiet no-op
        assert!(emu.reset().is_ok());
    }

    #[test]
    fn test_light_position_uploaded_in_eye_space() {
        let (mut emu, shader) = activated();
        let m = Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0));
        emu.set_model_view(&m).unwrap();
        emu.set_light_position(1, Vec4::new(1.0, 2.0, 3.0, 1.0)).unwrap();

        let floats = uniform_floats(&shader, "uLightPos");
        assert_eq!(&floats[4..8], &[6.0, 2.0, 3.0, 1.0]);
    }

    #[test]
    fn test_fog_packing() {
        let (mut emu, shader) = activated();
        emu.set_fog_linear(2.0, 10.0).unwrap();
        assert_eq!(uniform_floats(&shader, "uFogConfig"), vec![2.0, 10.0, 0.0]);
        emu.set_fog_exponential(0.5, true).unwrap();
        assert_eq!(uniform_floats(&shader, "uFogConfig"), vec![0.5, 0.0, -1.0]);
        assert!(emu.set_fog_linear(10.0, 2.0).is_err());
    }

    #[test]
    fn test_texture_routing_by_target() {
        let (mut emu, shader) = activated();
        let tex3d = TextureHandle::new(TextureTarget::Tex3d, TextureKind::Color, DataType::Float);
        emu.set_texture(2, Some(&tex3d)).unwrap();
        assert_eq!(uniform_ints(&shader, "uTexConfig")[2], 2);
        assert_eq!(
            shader.uniform("uTex3D").unwrap().data().textures[2].clone(),
            Some(tex3d)
        );

        let depth = TextureHandle::new(
            TextureTarget::Tex2d,
            TextureKind::Depth { comparison: Some(Comparison::Lequal) },
            DataType::Float,
        );
        emu.set_texture(0, Some(&depth)).unwrap();
        assert_eq!(uniform_ints(&shader, "uTexConfig")[0], 1);
        assert_eq!(
            uniform_ints(&shader, "uDepthComparison")[0],
            Comparison::Lequal.encode()
        );

        emu.set_texture(0, None).unwrap();
        assert_eq!(uniform_ints(&shader, "uTexConfig")[0], -1);
        assert_eq!(uniform_ints(&shader, "uDepthComparison")[0], -1);
    }

    #[test]
    fn test_combine_packs_codes() {
        let (mut emu, shader) = activated();
        emu.set_combine_rgb(
            1,
            CombineFunction::Interpolate,
            [CombineSource::Tex(3), CombineSource::PrevTex, CombineSource::ConstColor],
            [CombineOperand::Color, CombineOperand::OneMinusColor, CombineOperand::Alpha],
        )
        .unwrap();
        let srcs = uniform_ints(&shader, "uCombineSrcRGB");
        assert_eq!(&srcs[3..6], &[7, 1, 2]);
        let ops = uniform_ints(&shader, "uCombineOpRGB");
        assert_eq!(&ops[3..6], &[0, 2, 1]);
        assert_eq!(uniform_ints(&shader, "uCombineFuncRGB")[1], 4);

        assert!(emu
            .set_combine_alpha(
                0,
                CombineFunction::Dot3Rgb,
                [CombineSource::CurrTex; 3],
                [CombineOperand::Alpha; 3],
            )
            .is_err());
    }

    #[test]
    fn test_eye_planes_premultiplied() {
        let (mut emu, shader) = activated();
        let m = Mat4::from_translation(Vec3::new(0.0, 3.0, 0.0));
        emu.set_model_view(&m).unwrap();
        emu.set_texture_eye_planes(0, &Mat4::IDENTITY).unwrap();

        let floats = uniform_floats(&shader, "uTexGenEyePlanes");
        let stored = Mat4::from_cols_slice(&floats[..16]);
        assert_eq!(stored, m.inverse());
    }

    #[test]
    fn test_reset_restores_defaults() {
        let (mut emu, shader) = activated();
        emu.set_alpha_test(Comparison::Greater, 0.5).unwrap();
        emu.set_model_view(&Mat4::from_scale(Vec3::splat(2.0))).unwrap();
        assert_eq!(uniform_ints(&shader, "uAlphaComparison"), vec![1]);

        emu.reset().unwrap();
        assert_eq!(uniform_ints(&shader, "uAlphaComparison"), vec![-1]);
        // cached transforms resynced from the restored uniforms
        assert_eq!(emu.model_view, Mat4::IDENTITY);
    }

    #[test]
    fn test_material_diffuse_rides_color_attribute() {
        let (mut emu, _) = activated();
        let before = emu.glsl.driver_calls("set_attribute_slot_value");
        emu.set_material_color(ColorPurpose::Diffuse, Vec4::new(0.1, 0.2, 0.3, 1.0))
            .unwrap();
        assert_eq!(emu.glsl.driver_calls("set_attribute_slot_value"), before + 1);
    }

    #[test]
    fn test_tex_coord_source_codes() {
        let (mut emu, shader) = activated();
        emu.set_tex_coord_source(3, TexCoordSource::Sphere).unwrap();
        assert_eq!(uniform_ints(&shader, "uTexCoordSource")[3], 3);
    }
}
