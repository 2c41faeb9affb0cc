//! Common pipeline state enums
//!
//! These cover the state shared by the fixed-function and shader pipelines:
//! blending, depth and stencil testing, polygon rasterization style, and the
//! primitive topology used by draw calls.

/// Source and destination factors used by the blend equation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    /// Only usable as a source factor
    SrcAlphaSaturate,
    DstColor,
    OneMinusDstColor,
    DstAlpha,
    OneMinusDstAlpha,
    ConstantColor,
    ConstantAlpha,
    OneMinusConstantColor,
    OneMinusConstantAlpha,
}

/// How the weighted source and destination colors are combined.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendFunction {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

/// A comparison between two values producing a boolean, used by the depth,
/// stencil, and alpha tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    Greater,
    Less,
    Gequal,
    Lequal,
    NotEqual,
    Never,
    Always,
}

impl Comparison {
    /// Stable integer encoding, used when a comparison is routed through
    /// shader uniforms.
    pub fn encode(self) -> i32 {
        match self {
            Comparison::Equal => 0,
            Comparison::Greater => 1,
            Comparison::Less => 2,
            Comparison::Gequal => 3,
            Comparison::Lequal => 4,
            Comparison::NotEqual => 5,
            Comparison::Never => 6,
            Comparison::Always => 7,
        }
    }
}

/// How a polygon face is rasterized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawStyle {
    Solid,
    Line,
    Point,
    /// The face is culled
    None,
}

/// Update applied to a stencil value when a fragment passes or fails the
/// stencil and depth tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StencilUpdate {
    Keep,
    Zero,
    Replace,
    Increment,
    Decrement,
    Invert,
    IncrementWrap,
    DecrementWrap,
}

/// How consecutive vertices form primitives in a draw call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolygonType {
    Points,
    Lines,
    Triangles,
    TriangleStrip,
    Quads,
}

impl PolygonType {
    /// Number of fully-formed primitives implied by `count` vertices.
    /// Extra vertices that do not complete a primitive are ignored.
    pub fn polygon_count(self, count: usize) -> usize {
        match self {
            PolygonType::Points => count,
            PolygonType::Lines => count / 2,
            PolygonType::Triangles => count / 3,
            PolygonType::TriangleStrip => count.saturating_sub(2),
            PolygonType::Quads => count / 4,
        }
    }

    /// Number of vertices in a single primitive of this topology.
    pub fn polygon_size(self) -> usize {
        match self {
            PolygonType::Points => 1,
            PolygonType::Lines => 2,
            PolygonType::Triangles | PolygonType::TriangleStrip => 3,
            PolygonType::Quads => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polygon_counts() {
        assert_eq!(PolygonType::Points.polygon_count(5), 5);
        assert_eq!(PolygonType::Lines.polygon_count(7), 3);
        assert_eq!(PolygonType::Triangles.polygon_count(9), 3);
        assert_eq!(PolygonType::TriangleStrip.polygon_count(9), 7);
        assert_eq!(PolygonType::Quads.polygon_count(8), 2);
    }

    #[test]
    fn test_strip_underflow() {
        assert_eq!(PolygonType::TriangleStrip.polygon_count(0), 0);
        assert_eq!(PolygonType::TriangleStrip.polygon_count(2), 0);
    }
}
