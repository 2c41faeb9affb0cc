//! Shadow of the programmable-pipeline attribute state
//!
//! Uniform values are not shadowed here: they live in the interior-mutable
//! store on the shader handle itself, so several contexts sharing a shader
//! agree on its values. Attribute slots are per-context and tracked below.

use glaze_core::{DataType, VertexAttribute};

/// Tracked state of one flattened generic attribute slot.
///
/// A slot either sources from a buffer binding or holds a constant value.
/// Both constant arrays are retained so a snapshot restore can fall back to
/// the cached constant when a bound buffer has been destroyed; `constant_type`
/// tags which array is live.
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeSlot {
    pub binding: Option<VertexAttribute>,
    pub floats: [f32; 4],
    pub ints: [i32; 4],
    pub constant_type: DataType,
    pub row_count: usize,
}

impl Default for AttributeSlot {
    fn default() -> Self {
        AttributeSlot {
            binding: None,
            floats: [0.0; 4],
            ints: [0; 4],
            constant_type: DataType::Float,
            row_count: 4,
        }
    }
}

impl AttributeSlot {
    /// Reset to a typed zero constant, dropping any buffer binding.
    pub fn reset(&mut self, constant_type: DataType, row_count: usize) {
        self.binding = None;
        self.floats = [0.0; 4];
        self.ints = [0; 4];
        self.constant_type = constant_type;
        self.row_count = row_count;
    }
}
