//! Programmable-shader pipeline tracker
//!
//! Wraps a [`RendererDelegate`] with generic attribute and uniform state.
//! Uniform values are diffed against the interior-mutable store on the shader
//! handle itself, so all contexts sharing a shader agree on what the driver
//! holds.
//!
//! Sampler uniforms never expose texture units to callers. When a shader is
//! bound for the first time each sampler element is assigned a free unit
//! first-fit, the unit is written into the uniform's int storage and uploaded
//! once, and from then on the assignment is permanent for the life of the
//! shader. Binding a texture through a sampler uniform binds it at the
//! memoized unit.

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};
use glaze_core::{
    AttributeHandle, BlendFactor, BlendFunction, BufferHandle, Comparison, DataType, DrawStyle,
    PolygonType, PrimitiveClass, RenderError, Result, ShaderHandle, StencilUpdate, TextureHandle,
    TextureKind, TextureTarget, UniformHandle, VariableType, VertexAttribute,
};
use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use tracing::trace;

use crate::delegate::RendererDelegate;
use crate::driver::ShaderDriver;
use crate::shader_state::AttributeSlot;
use crate::snapshot::{ContextSnapshot, ShaderSnapshot, UniformSnapshot};

pub struct GlslRenderer<D: ShaderDriver> {
    delegate: RendererDelegate<D>,
    attributes: Vec<AttributeSlot>,
}

impl<D: ShaderDriver> GlslRenderer<D> {
    pub fn new(driver: D, texture_units: usize) -> Self {
        GlslRenderer {
            delegate: RendererDelegate::new(driver, texture_units),
            attributes: Vec::new(),
        }
    }

    pub fn activate(&mut self, width: i32, height: i32) -> Result<()> {
        self.delegate.activate(width, height)
    }

    pub fn reset(&mut self) -> Result<()> {
        self.set_shader(None)?;
        self.delegate.reset()
    }

    // ---- shader binding ----

    pub fn set_shader(&mut self, shader: Option<&ShaderHandle>) -> Result<()> {
        if let Some(s) = shader {
            if s.is_destroyed() {
                return Err(RenderError::DestroyedResource("shader"));
            }
        }
        if self.delegate.state.shader.as_ref() == shader {
            return Ok(());
        }

        // retire the previous shader's attribute arrays
        for slot in 0..self.attributes.len() {
            if self.attributes[slot].binding.take().is_some() {
                self.delegate.driver.enable_attribute_slot(slot, false);
            }
        }

        self.delegate.driver.bind_shader(shader);
        self.delegate.state.shader = shader.cloned();

        match shader {
            None => {
                for slot in self.attributes.iter_mut() {
                    slot.reset(DataType::Float, 4);
                }
            }
            Some(s) => {
                self.attributes = vec![AttributeSlot::default(); s.attribute_slot_count()];
                for attr in s.attributes() {
                    let constant_type = match attr.ty().primitive_class() {
                        PrimitiveClass::Float => DataType::Float,
                        PrimitiveClass::Int => DataType::Int,
                        PrimitiveClass::UnsignedInt => DataType::UnsignedInt,
                        PrimitiveClass::Sampler => continue,
                    };
                    let rows = attr.ty().row_count();
                    let cols = attr.ty().column_count();
                    for element in 0..attr.length() * cols {
                        self.attributes[attr.index() + element].reset(constant_type, rows);
                    }
                }
                self.configure_samplers(s)?;
            }
        }
        Ok(())
    }

    /// Reserve the memoized texture units of already-initialized sampler
    /// uniforms and rebind their textures, then first-fit free units for the
    /// rest. Unit assignments live in the uniform's int storage and are
    /// permanent for the shader's lifetime.
    fn configure_samplers(&mut self, shader: &ShaderHandle) -> Result<()> {
        let unit_count = self.delegate.state.texture_units();
        let mut reserved: FxHashSet<usize> = FxHashSet::default();

        for uniform in shader.uniforms() {
            if !uniform.ty().is_sampler() {
                continue;
            }
            let mut data = uniform.data();
            if !data.initialized {
                continue;
            }
            for k in 0..uniform.length() {
                let unit = data.ints[k] as usize;
                reserved.insert(unit);
                if data.textures[k].as_ref().is_some_and(|t| t.is_destroyed()) {
                    trace!(uniform = uniform.name(), unit, "dropping destroyed sampler texture");
                    data.textures[k] = None;
                }
                let texture = data.textures[k].clone();
                drop(data);
                self.delegate.bind_texture_at(unit, texture.as_ref());
                data = uniform.data();
            }
        }

        for uniform in shader.uniforms() {
            if !uniform.ty().is_sampler() {
                continue;
            }
            let mut data = uniform.data();
            if data.initialized {
                continue;
            }
            for k in 0..uniform.length() {
                let unit = (0..unit_count)
                    .find(|u| !reserved.contains(u))
                    .ok_or_else(|| {
                        RenderError::Unsupported(format!(
                            "shader requires more than {unit_count} sampler units"
                        ))
                    })?;
                reserved.insert(unit);
                data.ints[k] = unit as i32;
                trace!(uniform = uniform.name(), element = k, unit, "assigned sampler unit");
                drop(data);
                self.delegate.bind_texture_at(unit, None);
                data = uniform.data();
            }
            data.initialized = true;
            self.delegate
                .driver
                .set_uniform_ints(uniform.index(), uniform.ty(), &data.ints);
        }
        Ok(())
    }

    fn check_attr_owner(&self, attr: &AttributeHandle) -> Result<()> {
        match &self.delegate.state.shader {
            Some(s) if s.id() == attr.owner() => Ok(()),
            _ => Err(RenderError::InvalidValue(format!(
                "attribute {} does not belong to the bound shader",
                attr.name()
            ))),
        }
    }

    fn check_uniform_owner(&self, uniform: &UniformHandle) -> Result<()> {
        match &self.delegate.state.shader {
            Some(s) if s.id() == uniform.owner() => Ok(()),
            _ => Err(RenderError::InvalidValue(format!(
                "uniform {} does not belong to the bound shader",
                uniform.name()
            ))),
        }
    }

    // ---- attributes ----

    /// Bind one column of a generic attribute to a vertex stream, or remove
    /// the binding. Removal installs a typed zero constant.
    pub fn bind_attribute(
        &mut self,
        attr: &AttributeHandle,
        index: usize,
        column: usize,
        binding: Option<&VertexAttribute>,
    ) -> Result<()> {
        self.check_attr_owner(attr)?;
        let cols = attr.ty().column_count();
        if index >= attr.length() {
            return Err(RenderError::InvalidValue(format!(
                "array index {index} out of range for attribute {}",
                attr.name()
            )));
        }
        if column >= cols {
            return Err(RenderError::InvalidValue(format!(
                "column {column} out of range for attribute {}",
                attr.name()
            )));
        }
        if let Some(b) = binding {
            if b.buffer.is_destroyed() {
                return Err(RenderError::DestroyedResource("vertex buffer"));
            }
            if b.element_size == 0 || b.element_size > 4 {
                return Err(RenderError::InvalidValue(format!(
                    "bindings require 1 to 4 components per element, got {}",
                    b.element_size
                )));
            }
            check_buffer_class(attr.ty().primitive_class(), b.buffer.data_type())?;
        }

        let slot = attr.index() + index * cols + column;
        match binding {
            Some(b) => {
                if self.attributes[slot].binding.as_ref() == Some(b) {
                    return Ok(());
                }
                if self.attributes[slot].binding.is_none() {
                    self.delegate.driver.enable_attribute_slot(slot, true);
                }
                self.delegate.bind_array_vbo(Some(&b.buffer));
                self.delegate.driver.set_attribute_slot_pointer(
                    slot,
                    &b.buffer,
                    b.offset,
                    b.stride,
                    b.element_size,
                );
                self.attributes[slot].binding = Some(b.clone());
            }
            None => {
                if self.attributes[slot].binding.take().is_some() {
                    self.delegate.driver.enable_attribute_slot(slot, false);
                    let rows = attr.ty().row_count();
                    match attr.ty().primitive_class() {
                        PrimitiveClass::Float => {
                            self.attributes[slot].reset(DataType::Float, rows);
                            self.delegate
                                .driver
                                .set_attribute_slot_value(slot, rows, [0.0; 4]);
                        }
                        PrimitiveClass::Int => {
                            self.attributes[slot].reset(DataType::Int, rows);
                            self.delegate
                                .driver
                                .set_attribute_slot_value_int(slot, rows, true, [0; 4]);
                        }
                        PrimitiveClass::UnsignedInt => {
                            self.attributes[slot].reset(DataType::UnsignedInt, rows);
                            self.delegate
                                .driver
                                .set_attribute_slot_value_int(slot, rows, false, [0; 4]);
                        }
                        PrimitiveClass::Sampler => unreachable!("samplers are not attributes"),
                    }
                }
            }
        }
        Ok(())
    }

    pub fn set_attribute_f32(&mut self, attr: &AttributeHandle, index: usize, value: f32) -> Result<()> {
        self.set_attribute_floats(attr, index, VariableType::Float, [value, 0.0, 0.0, 0.0])
    }

    pub fn set_attribute_vec2(&mut self, attr: &AttributeHandle, index: usize, value: Vec2) -> Result<()> {
        self.set_attribute_floats(attr, index, VariableType::Vec2, [value.x, value.y, 0.0, 0.0])
    }

    pub fn set_attribute_vec3(&mut self, attr: &AttributeHandle, index: usize, value: Vec3) -> Result<()> {
        self.set_attribute_floats(
            attr,
            index,
            VariableType::Vec3,
            [value.x, value.y, value.z, 0.0],
        )
    }

    pub fn set_attribute_vec4(&mut self, attr: &AttributeHandle, index: usize, value: Vec4) -> Result<()> {
        self.set_attribute_floats(attr, index, VariableType::Vec4, value.to_array())
    }

    /// Constant attribute writes are not diffed: the driver value survives
    /// neither shader switches nor context changes, so every call uploads.
    fn set_attribute_floats(
        &mut self,
        attr: &AttributeHandle,
        index: usize,
        expected: VariableType,
        values: [f32; 4],
    ) -> Result<()> {
        self.check_attr_owner(attr)?;
        if attr.ty() != expected {
            return Err(RenderError::InvalidValue(format!(
                "attribute {} is {:?}, not {:?}",
                attr.name(),
                attr.ty(),
                expected
            )));
        }
        if index >= attr.length() {
            return Err(RenderError::InvalidValue(format!(
                "array index {index} out of range for attribute {}",
                attr.name()
            )));
        }
        let slot = attr.index() + index;
        let rows = expected.row_count();
        if self.attributes[slot].binding.take().is_some() {
            self.delegate.driver.enable_attribute_slot(slot, false);
        }
        let state = &mut self.attributes[slot];
        state.floats = values;
        state.constant_type = DataType::Float;
        state.row_count = rows;
        self.delegate.driver.set_attribute_slot_value(slot, rows, values);
        Ok(())
    }

    /// Integer constant attribute write; `values` must span the attribute's
    /// row count.
    pub fn set_attribute_ints(
        &mut self,
        attr: &AttributeHandle,
        index: usize,
        values: &[i32],
    ) -> Result<()> {
        self.check_attr_owner(attr)?;
        let class = attr.ty().primitive_class();
        let signed = match class {
            PrimitiveClass::Int => true,
            PrimitiveClass::UnsignedInt => false,
            _ => {
                return Err(RenderError::InvalidValue(format!(
                    "attribute {} is not integer-typed",
                    attr.name()
                )))
            }
        };
        let rows = attr.ty().row_count();
        if values.len() != rows {
            return Err(RenderError::InvalidValue(format!(
                "attribute {} requires {rows} components, got {}",
                attr.name(),
                values.len()
            )));
        }
        if index >= attr.length() {
            return Err(RenderError::InvalidValue(format!(
                "array index {index} out of range for attribute {}",
                attr.name()
            )));
        }
        let slot = attr.index() + index;
        if self.attributes[slot].binding.take().is_some() {
            self.delegate.driver.enable_attribute_slot(slot, false);
        }
        let mut padded = [0; 4];
        padded[..rows].copy_from_slice(values);
        let state = &mut self.attributes[slot];
        state.ints = padded;
        state.constant_type = if signed { DataType::Int } else { DataType::UnsignedInt };
        state.row_count = rows;
        self.delegate
            .driver
            .set_attribute_slot_value_int(slot, rows, signed, padded);
        Ok(())
    }

    // ---- uniforms ----

    pub fn set_uniform_f32(&mut self, uniform: &UniformHandle, index: usize, value: f32) -> Result<()> {
        check_uniform_type(uniform, &[VariableType::Float])?;
        self.write_uniform_floats(uniform, index, &[value], false)
    }

    pub fn set_uniform_vec2(&mut self, uniform: &UniformHandle, index: usize, value: Vec2) -> Result<()> {
        check_uniform_type(uniform, &[VariableType::Vec2])?;
        self.write_uniform_floats(uniform, index, &value.to_array(), false)
    }

    pub fn set_uniform_vec3(&mut self, uniform: &UniformHandle, index: usize, value: Vec3) -> Result<()> {
        check_uniform_type(uniform, &[VariableType::Vec3])?;
        self.write_uniform_floats(uniform, index, &value.to_array(), false)
    }

    pub fn set_uniform_vec4(&mut self, uniform: &UniformHandle, index: usize, value: Vec4) -> Result<()> {
        check_uniform_type(uniform, &[VariableType::Vec4])?;
        self.write_uniform_floats(uniform, index, &value.to_array(), false)
    }

    pub fn set_uniform_mat3(&mut self, uniform: &UniformHandle, index: usize, value: &Mat3) -> Result<()> {
        check_uniform_type(uniform, &[VariableType::Mat3])?;
        self.write_uniform_floats(uniform, index, &value.to_cols_array(), true)
    }

    pub fn set_uniform_mat4(&mut self, uniform: &UniformHandle, index: usize, value: &Mat4) -> Result<()> {
        check_uniform_type(uniform, &[VariableType::Mat4])?;
        self.write_uniform_floats(uniform, index, &value.to_cols_array(), true)
    }

    pub fn set_uniform_i32(&mut self, uniform: &UniformHandle, index: usize, value: i32) -> Result<()> {
        check_uniform_type(
            uniform,
            &[VariableType::Int, VariableType::UInt, VariableType::Bool],
        )?;
        self.write_uniform_ints(uniform, index, &[value])
    }

    pub fn set_uniform_ivec2(&mut self, uniform: &UniformHandle, index: usize, value: [i32; 2]) -> Result<()> {
        check_uniform_type(
            uniform,
            &[VariableType::IVec2, VariableType::UVec2, VariableType::BVec2],
        )?;
        self.write_uniform_ints(uniform, index, &value)
    }

    pub fn set_uniform_ivec3(&mut self, uniform: &UniformHandle, index: usize, value: [i32; 3]) -> Result<()> {
        check_uniform_type(
            uniform,
            &[VariableType::IVec3, VariableType::UVec3, VariableType::BVec3],
        )?;
        self.write_uniform_ints(uniform, index, &value)
    }

    pub fn set_uniform_ivec4(&mut self, uniform: &UniformHandle, index: usize, value: [i32; 4]) -> Result<()> {
        check_uniform_type(
            uniform,
            &[VariableType::IVec4, VariableType::UVec4, VariableType::BVec4],
        )?;
        self.write_uniform_ints(uniform, index, &value)
    }

    /// Bind `texture` through a sampler uniform at its memoized unit.
    pub fn set_uniform_sampler(
        &mut self,
        uniform: &UniformHandle,
        index: usize,
        texture: &TextureHandle,
    ) -> Result<()> {
        self.check_sampler_args(uniform, index, texture)?;
        check_sampler_compatible(uniform.ty(), texture)?;
        self.write_sampler(uniform, index, texture)
    }

    /// Sampler bind that skips the texture-kind compatibility check. Used by
    /// the fixed-function emulation, whose fragment shader performs depth
    /// comparison itself and so reads comparison-enabled depth maps through a
    /// plain sampler.
    pub(crate) fn set_uniform_sampler_unchecked(
        &mut self,
        uniform: &UniformHandle,
        index: usize,
        texture: &TextureHandle,
    ) -> Result<()> {
        self.check_sampler_args(uniform, index, texture)?;
        self.write_sampler(uniform, index, texture)
    }

    fn check_sampler_args(
        &self,
        uniform: &UniformHandle,
        index: usize,
        texture: &TextureHandle,
    ) -> Result<()> {
        self.check_uniform_owner(uniform)?;
        if index >= uniform.length() {
            return Err(RenderError::InvalidValue(format!(
                "array index {index} out of range for uniform {}",
                uniform.name()
            )));
        }
        if !uniform.ty().is_sampler() {
            return Err(RenderError::InvalidValue(format!(
                "uniform {} is not a sampler",
                uniform.name()
            )));
        }
        if texture.is_destroyed() {
            return Err(RenderError::DestroyedResource("texture"));
        }
        Ok(())
    }

    fn write_sampler(
        &mut self,
        uniform: &UniformHandle,
        index: usize,
        texture: &TextureHandle,
    ) -> Result<()> {
        let mut data = uniform.data();
        if data.textures[index].as_ref() == Some(texture) {
            return Ok(());
        }
        let unit = data.ints[index] as usize;
        data.textures[index] = Some(texture.clone());
        drop(data);
        self.delegate.bind_texture_at(unit, Some(texture));
        Ok(())
    }

    fn write_uniform_floats(
        &mut self,
        uniform: &UniformHandle,
        index: usize,
        values: &[f32],
        always_upload: bool,
    ) -> Result<()> {
        self.check_uniform_owner(uniform)?;
        if index >= uniform.length() {
            return Err(RenderError::InvalidValue(format!(
                "array index {index} out of range for uniform {}",
                uniform.name()
            )));
        }
        let per = uniform.ty().primitive_count();
        let offset = index * per;
        let mut data = uniform.data();
        if data.initialized && !always_upload && data.floats[offset..offset + per] == *values {
            return Ok(());
        }
        data.floats[offset..offset + per].copy_from_slice(values);
        data.initialized = true;
        drop(data);
        self.delegate.driver.set_uniform_floats(
            uniform.index() + index * uniform.ty().column_count(),
            uniform.ty(),
            values,
        );
        Ok(())
    }

    fn write_uniform_ints(
        &mut self,
        uniform: &UniformHandle,
        index: usize,
        values: &[i32],
    ) -> Result<()> {
        self.check_uniform_owner(uniform)?;
        if index >= uniform.length() {
            return Err(RenderError::InvalidValue(format!(
                "array index {index} out of range for uniform {}",
                uniform.name()
            )));
        }
        let per = uniform.ty().primitive_count();
        let offset = index * per;
        let mut data = uniform.data();
        if data.initialized && data.ints[offset..offset + per] == *values {
            return Ok(());
        }
        data.ints[offset..offset + per].copy_from_slice(values);
        data.initialized = true;
        drop(data);
        self.delegate.driver.set_uniform_ints(
            uniform.index() + index * uniform.ty().column_count(),
            uniform.ty(),
            values,
        );
        Ok(())
    }

    // ---- draw dispatch ----

    /// Issue the draw call; returns the number of polygons rendered.
    pub fn render(&mut self, polygon: PolygonType, offset: usize, count: usize) -> usize {
        self.delegate.render(polygon, offset, count)
    }

    // ---- snapshots ----

    pub fn current_state(&self) -> ContextSnapshot {
        let uniforms = match &self.delegate.state.shader {
            Some(shader) => shader
                .uniforms()
                .iter()
                .filter_map(|u| {
                    let data = u.data();
                    if !data.initialized {
                        return None;
                    }
                    Some(UniformSnapshot {
                        index: u.index(),
                        ty: u.ty(),
                        length: u.length(),
                        floats: data.floats.clone(),
                        ints: data.ints.clone(),
                        textures: data.textures.clone(),
                    })
                })
                .collect(),
            None => Vec::new(),
        };
        ContextSnapshot::Shader(Box::new(ShaderSnapshot {
            shared: self.delegate.current_state(),
            attributes: self.attributes.clone(),
            uniforms,
        }))
    }

    pub fn set_current_state(&mut self, snapshot: &ContextSnapshot) -> Result<()> {
        let snap = snapshot.as_shader()?;
        trace!("restoring shader context state");

        self.delegate.set_current_state(&snap.shared)?;

        self.attributes = snap.attributes.clone();
        for slot in 0..self.attributes.len() {
            let state = self.attributes[slot].clone();
            match &state.binding {
                Some(b) if !b.buffer.is_destroyed() => {
                    self.delegate.driver.enable_attribute_slot(slot, true);
                    self.delegate.bind_array_vbo(Some(&b.buffer));
                    self.delegate.driver.set_attribute_slot_pointer(
                        slot,
                        &b.buffer,
                        b.offset,
                        b.stride,
                        b.element_size,
                    );
                }
                other => {
                    if other.is_some() {
                        // buffer destroyed while parked; the cached constant
                        // takes over
                        trace!(slot, "replacing destroyed attribute buffer with its constant");
                        self.attributes[slot].binding = None;
                    }
                    self.delegate.driver.enable_attribute_slot(slot, false);
                    match state.constant_type {
                        DataType::Int => self.delegate.driver.set_attribute_slot_value_int(
                            slot,
                            state.row_count,
                            true,
                            state.ints,
                        ),
                        DataType::UnsignedInt => self.delegate.driver.set_attribute_slot_value_int(
                            slot,
                            state.row_count,
                            false,
                            state.ints,
                        ),
                        _ => self.delegate.driver.set_attribute_slot_value(
                            slot,
                            state.row_count,
                            state.floats,
                        ),
                    }
                }
            }
        }

        if let Some(shader) = self.delegate.state.shader.clone() {
            for captured in &snap.uniforms {
                let Some(live) = true_uniform(&shader, captured.index) else {
                    continue;
                };
                if live.ty() != captured.ty || live.length() != captured.length {
                    continue;
                }
                match live.ty().primitive_class() {
                    PrimitiveClass::Float => {
                        let mut data = live.data();
                        if !data.initialized || data.floats != captured.floats {
                            data.floats.clone_from(&captured.floats);
                            data.initialized = true;
                            drop(data);
                            self.delegate.driver.set_uniform_floats(
                                live.index(),
                                live.ty(),
                                &captured.floats,
                            );
                        }
                    }
                    PrimitiveClass::Int | PrimitiveClass::UnsignedInt => {
                        let mut data = live.data();
                        if !data.initialized || data.ints != captured.ints {
                            data.ints.clone_from(&captured.ints);
                            data.initialized = true;
                            drop(data);
                            self.delegate.driver.set_uniform_ints(
                                live.index(),
                                live.ty(),
                                &captured.ints,
                            );
                        }
                    }
                    PrimitiveClass::Sampler => {
                        // the live int storage holds the authoritative units
                        let mut rebinds: SmallVec<[(usize, Option<TextureHandle>); 4]> =
                            SmallVec::new();
                        let mut data = live.data();
                        for k in 0..captured.length {
                            let desired = captured.textures[k]
                                .clone()
                                .filter(|t| !t.is_destroyed());
                            if data.textures[k] != desired {
                                let unit = data.ints[k] as usize;
                                data.textures[k] = desired.clone();
                                rebinds.push((unit, desired));
                            }
                        }
                        drop(data);
                        for (unit, texture) in rebinds {
                            self.delegate.bind_texture_at(unit, texture.as_ref());
                        }
                    }
                }
            }
        }
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

#[cfg(test)]
impl GlslRenderer<crate::mock::RecordingDriver> {
    pub(crate) fn driver_calls(&self, prefix: &str) -> usize {
        self.delegate.driver.count(prefix)
    }
}

/// Locate the bound shader's live uniform for a captured index via binary
/// search over the sorted uniform list.
fn true_uniform(shader: &ShaderHandle, index: usize) -> Option<UniformHandle> {
    shader
        .uniforms()
        .binary_search_by_key(&index, |u| u.index())
        .ok()
        .map(|i| shader.uniforms()[i].clone())
}

fn check_uniform_type(uniform: &UniformHandle, accepted: &[VariableType]) -> Result<()> {
    if !accepted.contains(&uniform.ty()) {
        return Err(RenderError::InvalidValue(format!(
            "uniform {} is {:?}, which this setter cannot write",
            uniform.name(),
            uniform.ty()
        )));
    }
    Ok(())
}

fn check_buffer_class(class: PrimitiveClass, dt: DataType) -> Result<()> {
    let compatible = match class {
        PrimitiveClass::Float => dt.is_decimal(),
        PrimitiveClass::Int => dt.is_signed() && !dt.is_decimal(),
        PrimitiveClass::UnsignedInt => {
            !dt.is_signed() && !dt.is_decimal() && dt != DataType::IntBitField
        }
        PrimitiveClass::Sampler => false,
    };
    if !compatible {
        return Err(RenderError::InvalidValue(format!(
            "a {dt:?} buffer cannot feed a {class:?} attribute"
        )));
    }
    Ok(())
}

fn check_sampler_compatible(ty: VariableType, texture: &TextureHandle) -> Result<()> {
    use VariableType::*;

    let expected_target = match ty {
        Sampler1d | ISampler1d | USampler1d => TextureTarget::Tex1d,
        Sampler1dArray | ISampler1dArray | USampler1dArray => TextureTarget::Tex1dArray,
        Sampler2d | Sampler2dShadow | ISampler2d | USampler2d => TextureTarget::Tex2d,
        Sampler2dArray | ISampler2dArray | USampler2dArray => TextureTarget::Tex2dArray,
        Sampler3d | ISampler3d | USampler3d => TextureTarget::Tex3d,
        SamplerCube | SamplerCubeShadow | ISamplerCube | USamplerCube => TextureTarget::TexCube,
        _ => unreachable!("checked to be a sampler"),
    };
    if texture.target() != expected_target {
        return Err(RenderError::InvalidValue(format!(
            "a {:?} texture cannot be sampled by a {ty:?} uniform",
            texture.target()
        )));
    }

    let shadow = matches!(ty, Sampler2dShadow | SamplerCubeShadow);
    if shadow {
        match texture.kind() {
            TextureKind::Depth { comparison: Some(_) } => {}
            _ => {
                return Err(RenderError::InvalidValue(format!(
                    "{ty:?} requires a depth texture with a comparison configured"
                )))
            }
        }
        return Ok(());
    }
    if let TextureKind::Depth { comparison: Some(_) } = texture.kind() {
        return Err(RenderError::InvalidValue(format!(
            "{ty:?} cannot sample a depth texture while its comparison is enabled"
        )));
    }

    let dt = texture.data_type();
    let data_ok = match ty {
        ISampler1d | ISampler1dArray | ISampler2d | ISampler2dArray | ISampler3d | ISamplerCube => {
            dt.is_signed() && !dt.is_decimal() && dt != DataType::IntBitField
        }
        USampler1d | USampler1dArray | USampler2d | USampler2dArray | USampler3d | USamplerCube => {
            !dt.is_signed() && !dt.is_decimal() && dt != DataType::IntBitField
        }
        _ => dt.is_decimal() || dt == DataType::IntBitField,
    };
    if !data_ok {
        return Err(RenderError::InvalidValue(format!(
            "a {dt:?} texture cannot be sampled by a {ty:?} uniform"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingDriver;
    use glaze_core::{AttributeSpec, UniformSpec};

    fn renderer() -> GlslRenderer<RecordingDriver> {
        GlslRenderer::new(RecordingDriver::new(), 8)
    }

    fn sampler_shader() -> ShaderHandle {
        ShaderHandle::new(
            vec![
                UniformSpec::new("uColor", VariableType::Vec4, 1),
                UniformSpec::new("uDiffuseMap", VariableType::Sampler2d, 1),
                UniformSpec::new("uShadowMap", VariableType::Sampler2dShadow, 1),
            ],
            vec![AttributeSpec::new("aPos", VariableType::Vec4, 1)],
        )
    }

    #[test]
    fn test_sampler_units_allocated_per_shader() {
        let mut r = renderer();
        let a = sampler_shader();
        let b = sampler_shader();

        r.set_shader(Some(&a)).unwrap();
        let a_units: Vec<i32> = a
            .uniforms()
            .iter()
            .filter(|u| u.ty().is_sampler())
            .map(|u| u.data().ints[0])
            .collect();
        assert_eq!(a_units, vec![0, 1]);

        // a fresh shader starts its own allocation from unit 0
        r.set_shader(Some(&b)).unwrap();
        let b_units: Vec<i32> = b
            .uniforms()
            .iter()
            .filter(|u| u.ty().is_sampler())
            .map(|u| u.data().ints[0])
            .collect();
        assert_eq!(b_units, vec![0, 1]);
    }

    #[test]
    fn test_sampler_units_memoized_across_rebinds() {
        let mut r = renderer();
        let shader = sampler_shader();
        r.set_shader(Some(&shader)).unwrap();
        let uploads_after_first = r.delegate.driver.count("set_uniform_ints");
        assert_eq!(uploads_after_first, 2);

        r.set_shader(None).unwrap();
        r.set_shader(Some(&shader)).unwrap();
        // already initialized: units are reserved, not re-assigned or
        // re-uploaded
        assert_eq!(r.delegate.driver.count("set_uniform_ints"), 2);
    }

    #[test]
    fn test_uniform_diff_elision() {
        let mut r = renderer();
        let shader = sampler_shader();
        r.set_shader(Some(&shader)).unwrap();
        let color = shader.uniform("uColor").unwrap();

        r.set_uniform_vec4(&color, 0, Vec4::ONE).unwrap();
        r.set_uniform_vec4(&color, 0, Vec4::ONE).unwrap();
        assert_eq!(r.delegate.driver.count("set_uniform_floats"), 1);

        r.set_uniform_vec4(&color, 0, Vec4::ZERO).unwrap();
        assert_eq!(r.delegate.driver.count("set_uniform_floats"), 2);
    }

    #[test]
    fn test_uniform_owner_and_type_checked() {
        let mut r = renderer();
        let bound = sampler_shader();
        let other = sampler_shader();
        r.set_shader(Some(&bound)).unwrap();

        let foreign = other.uniform("uColor").unwrap();
        assert!(r.set_uniform_vec4(&foreign, 0, Vec4::ONE).is_err());

        let color = bound.uniform("uColor").unwrap();
        assert!(r.set_uniform_f32(&color, 0, 1.0).is_err());
        assert!(r.set_uniform_vec4(&color, 1, Vec4::ONE).is_err());
    }

    #[test]
    fn test_sampler_binds_at_memoized_unit() {
        let mut r = renderer();
        let shader = sampler_shader();
        r.set_shader(Some(&shader)).unwrap();
        let map = shader.uniform("uDiffuseMap").unwrap();
        let unit = map.data().ints[0] as usize;

        let tex = TextureHandle::new(TextureTarget::Tex2d, TextureKind::Color, DataType::Float);
        r.set_uniform_sampler(&map, 0, &tex).unwrap();
        assert_eq!(
            r.delegate.driver.count(&format!("bind_texture({unit}, Some(#{})", tex.id())),
            1
        );
        // identical bind is elided
        r.set_uniform_sampler(&map, 0, &tex).unwrap();
        assert_eq!(
            r.delegate.driver.count(&format!("bind_texture({unit}, Some(#{})", tex.id())),
            1
        );
    }

    #[test]
    fn test_sampler_compatibility_matrix() {
        let mut r = renderer();
        let shader = sampler_shader();
        r.set_shader(Some(&shader)).unwrap();
        let map = shader.uniform("uDiffuseMap").unwrap();
        let shadow = shader.uniform("uShadowMap").unwrap();

        let depth_cmp = TextureHandle::new(
            TextureTarget::Tex2d,
            TextureKind::Depth { comparison: Some(Comparison::Lequal) },
            DataType::Float,
        );
        let depth_plain = TextureHandle::new(
            TextureTarget::Tex2d,
            TextureKind::Depth { comparison: None },
            DataType::Float,
        );
        let cube = TextureHandle::new(TextureTarget::TexCube, TextureKind::Color, DataType::Float);

        // plain 2d samplers reject comparison depth, shadow samplers require it
        assert!(r.set_uniform_sampler(&map, 0, &depth_cmp).is_err());
        assert!(r.set_uniform_sampler(&map, 0, &depth_plain).is_ok());
        assert!(r.set_uniform_sampler(&shadow, 0, &depth_plain).is_err());
        assert!(r.set_uniform_sampler(&shadow, 0, &depth_cmp).is_ok());
        assert!(r.set_uniform_sampler(&map, 0, &cube).is_err());
    }

    #[test]
    fn test_bind_attribute_buffer_class_checked() {
        let mut r = renderer();
        let shader = sampler_shader();
        r.set_shader(Some(&shader)).unwrap();
        let pos = shader.attribute("aPos").unwrap();

        let ints = BufferHandle::new(DataType::Int);
        assert!(r
            .bind_attribute(&pos, 0, 0, Some(&VertexAttribute::new(ints, 0, 0, 4)))
            .is_err());
        let floats = BufferHandle::new(DataType::Float);
        assert!(r
            .bind_attribute(&pos, 0, 0, Some(&VertexAttribute::new(floats, 0, 0, 4)))
            .is_ok());
    }

    #[test]
    fn test_constant_attribute_not_diffed() {
        let mut r = renderer();
        let shader = sampler_shader();
        r.set_shader(Some(&shader)).unwrap();
        let pos = shader.attribute("aPos").unwrap();

        r.set_attribute_vec4(&pos, 0, Vec4::ONE).unwrap();
        r.set_attribute_vec4(&pos, 0, Vec4::ONE).unwrap();
        assert_eq!(r.delegate.driver.count("set_attribute_slot_value"), 2);
    }

    #[test]
    fn test_snapshot_uniforms_sparse_and_restored() {
        let mut r = renderer();
        let shader = sampler_shader();
        r.set_shader(Some(&shader)).unwrap();
        let color = shader.uniform("uColor").unwrap();
        r.set_uniform_vec4(&color, 0, Vec4::new(0.5, 0.25, 0.0, 1.0))
            .unwrap();

        let snap = r.current_state();
        match &snap {
            ContextSnapshot::Shader(s) => {
                // uColor plus the two auto-initialized samplers
                assert_eq!(s.uniforms.len(), 3);
            }
            _ => panic!("expected a shader snapshot"),
        }

        // clobber, then restore
        r.set_uniform_vec4(&color, 0, Vec4::ZERO).unwrap();
        r.set_current_state(&snap).unwrap();
        assert_eq!(
            color.data().floats,
            vec![0.5, 0.25, 0.0, 1.0],
        );
    }

    #[test]
    fn test_wrong_snapshot_variant_rejected() {
        let mut r = renderer();
        let snap = ContextSnapshot::FixedFunction(Box::new(crate::snapshot::FixedFunctionSnapshot {
            shared: crate::shared_state::SharedState::new(4),
            fixed: crate::fixed_state::FixedFunctionState::default(),
        }));
        assert!(r.set_current_state(&snap).is_err());
    }

    #[test]
    fn test_destroyed_sampler_texture_dropped_on_rebind() {
        let mut r = renderer();
        let shader = sampler_shader();
        r.set_shader(Some(&shader)).unwrap();
        let map = shader.uniform("uDiffuseMap").unwrap();
        let tex = TextureHandle::new(TextureTarget::Tex2d, TextureKind::Color, DataType::Float);
        r.set_uniform_sampler(&map, 0, &tex).unwrap();

        r.set_shader(None).unwrap();
        tex.mark_destroyed();
        r.set_shader(Some(&shader)).unwrap();
        assert!(map.data().textures[0].is_none());
    }
}
