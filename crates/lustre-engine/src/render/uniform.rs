//! Uniform block layout shared by every modern gradient shader.
//!
//! | bytes    | content                         |
//! |----------|---------------------------------|
//! | [0, 64)  | combined matrix (`mat4x4<f32>`) |
//! | [64, 80) | kind payload (`vec4<f32>`)      |
//! | [80, 84) | opacity (`f32`)                 |
//!
//! The WGSL struct rounds its size up to 96 bytes. These offsets are the
//! binary contract with the compiled shaders and must not move.

use core::ops::Range;

use crate::coords::Mat4;

pub const MATRIX_OFFSET: usize = 0;
pub const MATRIX_SIZE: usize = 64;
pub const PAYLOAD_OFFSET: usize = 64;
pub const PAYLOAD_SIZE: usize = 16;
pub const OPACITY_OFFSET: usize = 80;
pub const OPACITY_SIZE: usize = 4;

/// Bytes read by the shaders.
pub const UNIFORM_DATA_SIZE: usize = OPACITY_OFFSET + OPACITY_SIZE;

/// Size of the GPU buffer backing one block.
pub const UNIFORM_BUFFER_SIZE: usize = 96;

const _: () = assert!(MATRIX_OFFSET + MATRIX_SIZE == PAYLOAD_OFFSET);
const _: () = assert!(PAYLOAD_OFFSET + PAYLOAD_SIZE == OPACITY_OFFSET);
const _: () = assert!(UNIFORM_DATA_SIZE <= UNIFORM_BUFFER_SIZE && UNIFORM_BUFFER_SIZE % 16 == 0);

/// Bitmask over the three independently written regions of a block.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct DirtyRegions(u8);

impl DirtyRegions {
    pub const NONE: DirtyRegions = DirtyRegions(0);
    pub const MATRIX: DirtyRegions = DirtyRegions(1 << 0);
    pub const PAYLOAD: DirtyRegions = DirtyRegions(1 << 1);
    pub const OPACITY: DirtyRegions = DirtyRegions(1 << 2);
    pub const ALL: DirtyRegions = DirtyRegions(0b111);

    const REGIONS: [(DirtyRegions, Range<usize>); 3] = [
        (Self::MATRIX, MATRIX_OFFSET..MATRIX_OFFSET + MATRIX_SIZE),
        (Self::PAYLOAD, PAYLOAD_OFFSET..PAYLOAD_OFFSET + PAYLOAD_SIZE),
        (Self::OPACITY, OPACITY_OFFSET..OPACITY_OFFSET + OPACITY_SIZE),
    ];

    #[inline]
    pub fn contains(self, other: DirtyRegions) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn insert(&mut self, other: DirtyRegions) {
        self.0 |= other.0;
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Byte ranges to upload, in ascending order, adjacent regions merged.
    pub fn ranges(self) -> Vec<Range<usize>> {
        let mut out: Vec<Range<usize>> = Vec::with_capacity(3);
        for (region, range) in Self::REGIONS {
            if !self.contains(region) {
                continue;
            }
            match out.last_mut() {
                Some(last) if last.end == range.start => last.end = range.end,
                _ => out.push(range),
            }
        }
        out
    }
}

/// A value written into a uniform slot.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec4([f32; 4]),
    Mat4(Mat4),
}

impl UniformValue {
    pub fn as_floats(&self) -> &[f32] {
        match self {
            UniformValue::Float(v) => core::slice::from_ref(v),
            UniformValue::Vec2(v) => v,
            UniformValue::Vec4(v) => v,
            UniformValue::Mat4(m) => bytemuck::cast_slice(&m.cols),
        }
    }

    #[inline]
    pub fn byte_len(&self) -> usize {
        self.as_floats().len() * 4
    }
}

/// One kind-specific uniform: its legacy program name and its block offset.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PayloadField {
    pub name: &'static str,
    pub offset: usize,
    pub value: UniformValue,
}

impl PayloadField {
    #[inline]
    pub const fn new(name: &'static str, offset: usize, value: UniformValue) -> Self {
        Self { name, offset, value }
    }
}

/// The up to three payload fields of one gradient kind, in block order.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct KindPayload {
    fields: [PayloadField; 3],
    len: usize,
}

impl KindPayload {
    const UNUSED: PayloadField = PayloadField::new("", PAYLOAD_OFFSET, UniformValue::Float(0.0));

    pub fn new(fields: &[PayloadField]) -> Self {
        debug_assert!(fields.len() <= 3);
        let mut out = [Self::UNUSED; 3];
        let len = fields.len().min(3);
        out[..len].copy_from_slice(&fields[..len]);
        Self { fields: out, len }
    }

    #[inline]
    pub fn fields(&self) -> &[PayloadField] {
        &self.fields[..self.len]
    }
}

/// CPU copy of one uniform block plus the regions written since the last drain.
///
/// Bytes outside a write are never touched, so the block doubles as the
/// snapshot of what the GPU buffer currently holds.
#[derive(Debug, Clone)]
pub struct UniformBlock {
    data: [u8; UNIFORM_BUFFER_SIZE],
    dirty: DirtyRegions,
}

impl Default for UniformBlock {
    fn default() -> Self {
        Self { data: [0; UNIFORM_BUFFER_SIZE], dirty: DirtyRegions::NONE }
    }
}

impl UniformBlock {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn dirty(&self) -> DirtyRegions {
        self.dirty
    }

    /// Returns and resets the dirty mask.
    #[inline]
    pub fn take_dirty(&mut self) -> DirtyRegions {
        core::mem::take(&mut self.dirty)
    }

    pub fn write_matrix(&mut self, matrix: &Mat4) {
        self.write_bytes(MATRIX_OFFSET, matrix.as_bytes());
        self.dirty.insert(DirtyRegions::MATRIX);
    }

    /// Writes one payload field at its absolute block offset.
    pub fn write_field(&mut self, field: &PayloadField) {
        debug_assert!(
            field.offset >= PAYLOAD_OFFSET
                && field.offset + field.value.byte_len() <= PAYLOAD_OFFSET + PAYLOAD_SIZE,
            "payload field `{}` escapes the payload region",
            field.name
        );
        self.write_bytes(field.offset, bytemuck::cast_slice(field.value.as_floats()));
        self.dirty.insert(DirtyRegions::PAYLOAD);
    }

    pub fn write_opacity(&mut self, opacity: f32) {
        self.write_bytes(OPACITY_OFFSET, bytemuck::bytes_of(&opacity));
        self.dirty.insert(DirtyRegions::OPACITY);
    }

    /// Reads back the float at `offset`.
    pub fn f32_at(&self, offset: usize) -> f32 {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.data[offset..offset + 4]);
        f32::from_ne_bytes(raw)
    }

    fn write_bytes(&mut self, offset: usize, bytes: &[u8]) {
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }
}
