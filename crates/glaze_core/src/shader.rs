//! Shader variable type system
//!
//! Every uniform and attribute declared by a shader carries one of these
//! types. Matrix variables occupy one flattened slot per column, which is why
//! the renderer layer indexes slot space through [`VariableType::column_count`].

/// The primitive class backing a variable's storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimitiveClass {
    Float,
    Int,
    UnsignedInt,
    /// Sampler variables store a texture-unit index, not a value
    Sampler,
}

/// The declared type of a shader uniform or attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VariableType {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
    Int,
    IVec2,
    IVec3,
    IVec4,
    UInt,
    UVec2,
    UVec3,
    UVec4,
    Bool,
    BVec2,
    BVec3,
    BVec4,

    Sampler1d,
    Sampler1dArray,
    Sampler2d,
    Sampler2dArray,
    Sampler2dShadow,
    Sampler3d,
    SamplerCube,
    SamplerCubeShadow,
    ISampler1d,
    ISampler1dArray,
    ISampler2d,
    ISampler2dArray,
    ISampler3d,
    ISamplerCube,
    USampler1d,
    USampler1dArray,
    USampler2d,
    USampler2dArray,
    USampler3d,
    USamplerCube,
}

impl VariableType {
    /// The storage class of this type.
    pub fn primitive_class(self) -> PrimitiveClass {
        use VariableType::*;
        match self {
            Float | Vec2 | Vec3 | Vec4 | Mat2 | Mat3 | Mat4 => PrimitiveClass::Float,
            Int | IVec2 | IVec3 | IVec4 | Bool | BVec2 | BVec3 | BVec4 => PrimitiveClass::Int,
            UInt | UVec2 | UVec3 | UVec4 => PrimitiveClass::UnsignedInt,
            _ => PrimitiveClass::Sampler,
        }
    }

    /// True for the sampler varieties.
    pub fn is_sampler(self) -> bool {
        self.primitive_class() == PrimitiveClass::Sampler
    }

    /// Number of columns the type spans in flattened slot space.
    pub fn column_count(self) -> usize {
        use VariableType::*;
        match self {
            Mat2 => 2,
            Mat3 => 3,
            Mat4 => 4,
            _ => 1,
        }
    }

    /// Number of rows in a single column of the type.
    pub fn row_count(self) -> usize {
        use VariableType::*;
        match self {
            Float | Int | UInt | Bool => 1,
            Vec2 | IVec2 | UVec2 | BVec2 | Mat2 => 2,
            Vec3 | IVec3 | UVec3 | BVec3 | Mat3 => 3,
            Vec4 | IVec4 | UVec4 | BVec4 | Mat4 => 4,
            // samplers store a single unit index
            _ => 1,
        }
    }

    /// Number of primitives in one element of this type.
    pub fn primitive_count(self) -> usize {
        self.column_count() * self.row_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_slot_layout() {
        assert_eq!(VariableType::Mat4.column_count(), 4);
        assert_eq!(VariableType::Mat4.primitive_count(), 16);
        assert_eq!(VariableType::Mat3.primitive_count(), 9);
        assert_eq!(VariableType::Vec4.column_count(), 1);
    }

    #[test]
    fn test_primitive_classes() {
        assert_eq!(
            VariableType::BVec3.primitive_class(),
            PrimitiveClass::Int
        );
        assert!(VariableType::Sampler2dShadow.is_sampler());
        assert!(!VariableType::UVec4.is_sampler());
    }
}
