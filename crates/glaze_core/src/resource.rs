//! Resource handles consumed by the state trackers
//!
//! The resource-builder layer (out of scope here) validates formats, uploads
//! data, and hands back these handles. The renderer layer consumes them
//! read-only, except for the interior-mutable value store on shader uniforms,
//! which the GLSL tracker uses to diff uniform writes and to memoize sampler
//! texture-unit assignments.
//!
//! Handles compare by identity and may be flagged destroyed at any time by a
//! lifecycle-management thread; state-replay paths must re-check the flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::pipeline::Comparison;
use crate::shader::{PrimitiveClass, VariableType};

/// Element type of a buffer or texture, as negotiated by the resource builder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataType {
    Float,
    HalfFloat,
    Int,
    UnsignedInt,
    Short,
    UnsignedShort,
    Byte,
    UnsignedByte,
    NormalizedInt,
    NormalizedUnsignedInt,
    NormalizedShort,
    NormalizedUnsignedShort,
    NormalizedByte,
    NormalizedUnsignedByte,
    /// Packed formats that sample as decimal values
    IntBitField,
}

impl DataType {
    /// True if values sample as decimal numbers (floating point or
    /// normalized integers).
    pub fn is_decimal(self) -> bool {
        use DataType::*;
        matches!(
            self,
            Float
                | HalfFloat
                | NormalizedInt
                | NormalizedUnsignedInt
                | NormalizedShort
                | NormalizedUnsignedShort
                | NormalizedByte
                | NormalizedUnsignedByte
        )
    }

    /// True if the underlying integer representation is signed. Decimal
    /// floating-point formats are signed by definition.
    pub fn is_signed(self) -> bool {
        use DataType::*;
        matches!(
            self,
            Float
                | HalfFloat
                | Int
                | Short
                | Byte
                | NormalizedInt
                | NormalizedShort
                | NormalizedByte
        )
    }

    /// True if a normalized integer format.
    pub fn is_normalized(self) -> bool {
        use DataType::*;
        matches!(
            self,
            NormalizedInt
                | NormalizedUnsignedInt
                | NormalizedShort
                | NormalizedUnsignedShort
                | NormalizedByte
                | NormalizedUnsignedByte
        )
    }

    /// True for single-byte formats, which the legacy vertex paths reject.
    pub fn is_byte(self) -> bool {
        use DataType::*;
        matches!(self, Byte | UnsignedByte | NormalizedByte | NormalizedUnsignedByte)
    }
}

fn next_resource_id() -> u64 {
    use std::sync::atomic::AtomicU64;
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

// ---------------------------------------------------------------------------
// Buffers
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct BufferInner {
    id: u64,
    data_type: DataType,
    destroyed: AtomicBool,
}

/// Handle to a vertex or element buffer living on the driver.
#[derive(Clone, Debug)]
pub struct BufferHandle(Arc<BufferInner>);

impl BufferHandle {
    pub fn new(data_type: DataType) -> Self {
        BufferHandle(Arc::new(BufferInner {
            id: next_resource_id(),
            data_type,
            destroyed: AtomicBool::new(false),
        }))
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn data_type(&self) -> DataType {
        self.0.data_type
    }

    pub fn is_destroyed(&self) -> bool {
        self.0.destroyed.load(Ordering::Acquire)
    }

    /// Flag the resource destroyed. Safe to call from any thread; the state
    /// trackers unbind stale references on the next state replay.
    pub fn mark_destroyed(&self) {
        self.0.destroyed.store(true, Ordering::Release);
    }
}

impl PartialEq for BufferHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for BufferHandle {}

// ---------------------------------------------------------------------------
// Textures
// ---------------------------------------------------------------------------

/// Driver-side texture target a handle binds to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    Tex1d,
    Tex1dArray,
    Tex2d,
    Tex2dArray,
    Tex3d,
    TexCube,
}

/// The sampler-facing kind of a texture: a plain color texture or a depth map
/// with an optional comparison mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureKind {
    Color,
    Depth {
        comparison: Option<Comparison>,
    },
}

#[derive(Debug)]
struct TextureInner {
    id: u64,
    target: TextureTarget,
    kind: TextureKind,
    data_type: DataType,
    destroyed: AtomicBool,
}

/// Handle to a texture living on the driver.
#[derive(Clone, Debug)]
pub struct TextureHandle(Arc<TextureInner>);

impl TextureHandle {
    pub fn new(target: TextureTarget, kind: TextureKind, data_type: DataType) -> Self {
        TextureHandle(Arc::new(TextureInner {
            id: next_resource_id(),
            target,
            kind,
            data_type,
            destroyed: AtomicBool::new(false),
        }))
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn target(&self) -> TextureTarget {
        self.0.target
    }

    pub fn kind(&self) -> TextureKind {
        self.0.kind
    }

    pub fn data_type(&self) -> DataType {
        self.0.data_type
    }

    /// The configured depth comparison, if this is a depth map.
    pub fn depth_comparison(&self) -> Option<Comparison> {
        match self.0.kind {
            TextureKind::Depth { comparison } => comparison,
            TextureKind::Color => None,
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.0.destroyed.load(Ordering::Acquire)
    }

    pub fn mark_destroyed(&self) {
        self.0.destroyed.store(true, Ordering::Release);
    }
}

impl PartialEq for TextureHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for TextureHandle {}

// ---------------------------------------------------------------------------
// Shaders
// ---------------------------------------------------------------------------

/// Declaration of a uniform used when assembling a [`ShaderHandle`].
#[derive(Clone, Debug)]
pub struct UniformSpec {
    pub name: String,
    pub ty: VariableType,
    /// Array length; 1 for non-arrays
    pub length: usize,
}

impl UniformSpec {
    pub fn new(name: impl Into<String>, ty: VariableType, length: usize) -> Self {
        UniformSpec {
            name: name.into(),
            ty,
            length,
        }
    }
}

/// Declaration of an attribute used when assembling a [`ShaderHandle`].
#[derive(Clone, Debug)]
pub struct AttributeSpec {
    pub name: String,
    pub ty: VariableType,
    pub length: usize,
}

impl AttributeSpec {
    pub fn new(name: impl Into<String>, ty: VariableType, length: usize) -> Self {
        AttributeSpec {
            name: name.into(),
            ty,
            length,
        }
    }
}

/// Mutable value store of a uniform.
///
/// The GLSL tracker diffs against and updates these values; for sampler
/// uniforms `ints` holds the memoized texture-unit assignment and `textures`
/// the handle last bound to that unit through the uniform.
#[derive(Debug)]
pub struct UniformData {
    pub floats: Vec<f32>,
    pub ints: Vec<i32>,
    pub textures: Vec<Option<TextureHandle>>,
    /// False until the first value is written through the tracker
    pub initialized: bool,
}

/// A uniform variable declared by a shader.
///
/// Metadata is immutable; values live behind a mutex only so the handle stays
/// `Send + Sync`. The lock is uncontended on the context thread.
#[derive(Debug)]
pub struct Uniform {
    owner: u64,
    name: String,
    ty: VariableType,
    length: usize,
    index: usize,
    data: Mutex<UniformData>,
}

impl Uniform {
    pub fn owner(&self) -> u64 {
        self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> VariableType {
        self.ty
    }

    /// Array length; 1 for non-arrays.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Flattened slot index. Stable sort key within the owning shader.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn data(&self) -> parking_lot::MutexGuard<'_, UniformData> {
        self.data.lock()
    }
}

/// Shared reference to a uniform of some shader.
pub type UniformHandle = Arc<Uniform>;

/// An attribute variable declared by a shader.
#[derive(Debug)]
pub struct Attribute {
    owner: u64,
    name: String,
    ty: VariableType,
    length: usize,
    index: usize,
}

impl Attribute {
    pub fn owner(&self) -> u64 {
        self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> VariableType {
        self.ty
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// First flattened attribute slot occupied by this variable.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Shared reference to an attribute of some shader.
pub type AttributeHandle = Arc<Attribute>;

#[derive(Debug)]
struct ShaderInner {
    id: u64,
    uniforms: Vec<UniformHandle>,
    attributes: Vec<AttributeHandle>,
    destroyed: AtomicBool,
}

/// Handle to a linked shader program and its reflected variable lists.
///
/// Both lists are kept sorted by flattened slot index so state replay can
/// recover the authoritative live uniform from a cloned snapshot by binary
/// search.
#[derive(Clone, Debug)]
pub struct ShaderHandle(Arc<ShaderInner>);

impl ShaderHandle {
    /// Assemble a shader handle from reflected variable declarations. Slot
    /// indices are assigned in declaration order, one slot per column per
    /// array element, mirroring driver location assignment.
    pub fn new(uniforms: Vec<UniformSpec>, attributes: Vec<AttributeSpec>) -> Self {
        let id = next_resource_id();

        let mut uniform_list = Vec::with_capacity(uniforms.len());
        let mut next_index = 0;
        for spec in uniforms {
            let class = spec.ty.primitive_class();
            let prims = spec.ty.primitive_count() * spec.length;
            let data = UniformData {
                floats: if class == PrimitiveClass::Float {
                    vec![0.0; prims]
                } else {
                    Vec::new()
                },
                ints: if class != PrimitiveClass::Float {
                    vec![0; prims]
                } else {
                    Vec::new()
                },
                textures: if class == PrimitiveClass::Sampler {
                    vec![None; spec.length]
                } else {
                    Vec::new()
                },
                initialized: false,
            };
            uniform_list.push(Arc::new(Uniform {
                owner: id,
                name: spec.name,
                ty: spec.ty,
                length: spec.length,
                index: next_index,
                data: Mutex::new(data),
            }));
            next_index += spec.ty.column_count() * spec.length;
        }

        let mut attribute_list = Vec::with_capacity(attributes.len());
        let mut next_slot = 0;
        for spec in attributes {
            attribute_list.push(Arc::new(Attribute {
                owner: id,
                name: spec.name,
                ty: spec.ty,
                length: spec.length,
                index: next_slot,
            }));
            next_slot += spec.ty.column_count() * spec.length;
        }

        ShaderHandle(Arc::new(ShaderInner {
            id,
            uniforms: uniform_list,
            attributes: attribute_list,
            destroyed: AtomicBool::new(false),
        }))
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    /// Uniform list, sorted by flattened slot index.
    pub fn uniforms(&self) -> &[UniformHandle] {
        &self.0.uniforms
    }

    /// Attribute list, sorted by flattened slot index.
    pub fn attributes(&self) -> &[AttributeHandle] {
        &self.0.attributes
    }

    pub fn uniform(&self, name: &str) -> Option<UniformHandle> {
        self.0
            .uniforms
            .iter()
            .find(|u| u.name() == name)
            .cloned()
    }

    pub fn attribute(&self, name: &str) -> Option<AttributeHandle> {
        self.0
            .attributes
            .iter()
            .find(|a| a.name() == name)
            .cloned()
    }

    /// Total number of flattened attribute slots consumed by the shader.
    pub fn attribute_slot_count(&self) -> usize {
        self.0
            .attributes
            .last()
            .map(|a| a.index() + a.ty().column_count() * a.length())
            .unwrap_or(0)
    }

    pub fn is_destroyed(&self) -> bool {
        self.0.destroyed.load(Ordering::Acquire)
    }

    pub fn mark_destroyed(&self) {
        self.0.destroyed.store(true, Ordering::Release);
    }
}

impl PartialEq for ShaderHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ShaderHandle {}

// ---------------------------------------------------------------------------
// Vertex attribute descriptor
// ---------------------------------------------------------------------------

/// Caller-facing description of a vertex stream inside a buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    pub buffer: BufferHandle,
    /// Element offset of the first vertex
    pub offset: usize,
    /// Elements skipped between consecutive vertices
    pub stride: usize,
    /// Components per vertex, 1 to 4
    pub element_size: usize,
}

impl VertexAttribute {
    pub fn new(buffer: BufferHandle, offset: usize, stride: usize, element_size: usize) -> Self {
        VertexAttribute {
            buffer,
            offset,
            stride,
            element_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_identity() {
        let a = BufferHandle::new(DataType::Float);
        let b = BufferHandle::new(DataType::Float);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_destroyed_flag_is_shared() {
        let a = BufferHandle::new(DataType::Float);
        let b = a.clone();
        assert!(!b.is_destroyed());
        a.mark_destroyed();
        assert!(b.is_destroyed());
    }

    #[test]
    fn test_shader_slot_assignment() {
        let shader = ShaderHandle::new(
            vec![
                UniformSpec::new("uProjection", VariableType::Mat4, 1),
                UniformSpec::new("uLightPos", VariableType::Vec4, 8),
                UniformSpec::new("uTex", VariableType::Sampler2d, 4),
            ],
            vec![
                AttributeSpec::new("aVertex", VariableType::Vec4, 1),
                AttributeSpec::new("aModel", VariableType::Mat4, 1),
            ],
        );

        let indices: Vec<usize> = shader.uniforms().iter().map(|u| u.index()).collect();
        assert_eq!(indices, vec![0, 4, 12]);
        assert!(indices.windows(2).all(|w| w[0] < w[1]));

        assert_eq!(shader.attribute("aModel").unwrap().index(), 1);
        assert_eq!(shader.attribute_slot_count(), 5);
    }

    #[test]
    fn test_uniform_storage_shapes() {
        let shader = ShaderHandle::new(
            vec![
                UniformSpec::new("uColor", VariableType::Vec4, 2),
                UniformSpec::new("uTex", VariableType::Sampler2d, 3),
            ],
            vec![],
        );
        let color = shader.uniform("uColor").unwrap();
        assert_eq!(color.data().floats.len(), 8);
        let tex = shader.uniform("uTex").unwrap();
        let data = tex.data();
        assert_eq!(data.ints.len(), 3);
        assert_eq!(data.textures.len(), 3);
        assert!(!data.initialized);
    }
}
