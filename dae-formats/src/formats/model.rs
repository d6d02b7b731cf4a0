//! Model binary format (.dmodel)
//!
//! Deduplicated, optionally skinned triangle meshes with materials.
//!
//! # Layout
//! ```text
//! Header (40 bytes):
//! 0x00: endianness marker u32 (6666)
//! 0x04: version u32
//! 0x08: feature flags u8 (bit0 = animation)
//! 0x09: vertex declaration u8 (see VertexDeclaration)
//! 0x0A: index size u8 (2 or 4 bytes)
//! 0x0B: reserved u8
//! 0x0C: mesh count u32
//! 0x10: bounds min f32 × 3
//! 0x1C: bounds max f32 × 3
//!
//! Per mesh:
//!   name            UTF-8, null-terminated
//!   vertex_count    u32
//!   index_count     u32
//!   bounds          f32 × 6 (min xyz, max xyz)
//!   vertices        vertex_count × declaration stride
//!   indices         index_count × index size
//!   material        emissive, ambient, diffuse, specular (f32 × 4 each),
//!                   shininess f32, texture name (UTF-8, null-terminated)
//!   skeleton        node_count u16, then per node: parent i32 + name,
//!                   then node_count × inverse bind matrix (f32 × 16, column-major)
//! ```
//!
//! Vertex elements are written in declaration-bit order:
//! position f32×3, normal f32×3, uv f32×2, colour f32×4, weights f32×4,
//! joint indices u32×4.

/// Endianness/check marker at offset 0 of every model file.
pub const MODEL_ENDIANNESS_MARKER: u32 = 6666;

/// Current model format version.
pub const MODEL_VERSION: u32 = 1;

/// Feature bit: the file carries skin weights, joint indices and skeletons.
pub const FEATURE_ANIMATION: u8 = 1 << 0;

/// Floats in a material block before the texture name.
pub const MATERIAL_FLOAT_COUNT: usize = 17;

/// Floats in one inverse bind matrix.
pub const INVERSE_BIND_MATRIX_FLOATS: usize = 16;

/// Bit set of the vertex elements present in every vertex record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VertexDeclaration(pub u8);

impl VertexDeclaration {
    pub const POSITION: Self = Self(1 << 0);
    pub const NORMAL: Self = Self(1 << 1);
    pub const UV: Self = Self(1 << 2);
    pub const COLOUR: Self = Self(1 << 3);
    pub const WEIGHTS: Self = Self(1 << 4);
    pub const JOINT_INDICES: Self = Self(1 << 5);

    /// Elements in the order they are laid out in a vertex record, with their byte size.
    pub const ELEMENTS: [(Self, usize); 6] = [
        (Self::POSITION, 12),
        (Self::NORMAL, 12),
        (Self::UV, 8),
        (Self::COLOUR, 16),
        (Self::WEIGHTS, 16),
        (Self::JOINT_INDICES, 16),
    ];

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// Size of one vertex record in bytes.
    pub fn stride(self) -> usize {
        Self::ELEMENTS
            .iter()
            .filter(|(element, _)| self.contains(*element))
            .map(|(_, size)| size)
            .sum()
    }
}

impl std::ops::BitOr for VertexDeclaration {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Model file header (40 bytes)
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct ModelHeader {
    pub endianness_marker: u32,
    pub version: u32,
    pub features: u8,
    pub vertex_declaration: VertexDeclaration,
    /// 2 or 4
    pub index_size: u8,
    pub reserved: u8,
    pub mesh_count: u32,
    pub bounds_min: [f32; 3],
    pub bounds_max: [f32; 3],
}

impl ModelHeader {
    pub const SIZE: usize = 40;

    pub fn new(
        features: u8,
        vertex_declaration: VertexDeclaration,
        index_size: u8,
        mesh_count: u32,
        bounds_min: [f32; 3],
        bounds_max: [f32; 3],
    ) -> Self {
        Self {
            endianness_marker: MODEL_ENDIANNESS_MARKER,
            version: MODEL_VERSION,
            features,
            vertex_declaration,
            index_size,
            reserved: 0,
            mesh_count,
            bounds_min,
            bounds_max,
        }
    }

    pub fn is_animated(&self) -> bool {
        self.features & FEATURE_ANIMATION != 0
    }

    /// Write header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.endianness_marker.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.version.to_le_bytes());
        bytes[8] = self.features;
        bytes[9] = self.vertex_declaration.bits();
        bytes[10] = self.index_size;
        bytes[11] = self.reserved;
        bytes[12..16].copy_from_slice(&self.mesh_count.to_le_bytes());
        for (i, f) in self.bounds_min.iter().chain(&self.bounds_max).enumerate() {
            let at = 16 + i * 4;
            bytes[at..at + 4].copy_from_slice(&f.to_le_bytes());
        }
        bytes
    }

    /// Read header from bytes. Rejects a wrong endianness marker.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        let u32_at = |at: usize| {
            u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };
        let f32_at = |at: usize| f32::from_bits(u32_at(at));

        let endianness_marker = u32_at(0);
        if endianness_marker != MODEL_ENDIANNESS_MARKER {
            return None;
        }
        Some(Self {
            endianness_marker,
            version: u32_at(4),
            features: bytes[8],
            vertex_declaration: VertexDeclaration(bytes[9]),
            index_size: bytes[10],
            reserved: bytes[11],
            mesh_count: u32_at(12),
            bounds_min: [f32_at(16), f32_at(20), f32_at(24)],
            bounds_max: [f32_at(28), f32_at(32), f32_at(36)],
        })
    }

    /// Validate header
    pub fn validate(&self) -> bool {
        self.version == MODEL_VERSION
            && matches!(self.index_size, 2 | 4)
            && self.vertex_declaration.contains(VertexDeclaration::POSITION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_header_roundtrip() {
        let decl = VertexDeclaration::POSITION | VertexDeclaration::NORMAL | VertexDeclaration::UV;
        let header = ModelHeader::new(
            FEATURE_ANIMATION,
            decl,
            4,
            3,
            [-1.0, -2.0, -3.0],
            [1.0, 2.0, 3.0],
        );

        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), ModelHeader::SIZE);
        assert_eq!(&bytes[0..4], &6666u32.to_le_bytes());

        let parsed = ModelHeader::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, header);
        assert!(parsed.is_animated());
        assert!(parsed.validate());
    }

    #[test]
    fn test_model_header_rejects_bad_marker() {
        let header = ModelHeader::new(0, VertexDeclaration::POSITION, 2, 1, [0.0; 3], [0.0; 3]);
        let mut bytes = header.to_bytes();
        bytes[0] = 0;
        assert!(ModelHeader::from_bytes(&bytes).is_none());
    }

    #[test]
    fn test_vertex_stride() {
        assert_eq!(VertexDeclaration::POSITION.stride(), 12);
        let full = VertexDeclaration::POSITION
            | VertexDeclaration::NORMAL
            | VertexDeclaration::UV
            | VertexDeclaration::COLOUR
            | VertexDeclaration::WEIGHTS
            | VertexDeclaration::JOINT_INDICES;
        assert_eq!(full.stride(), 12 + 12 + 8 + 16 + 16 + 16);
        assert_eq!(full.bits(), 0b11_1111);
    }

    #[test]
    fn test_declaration_insert_remove() {
        let mut decl = VertexDeclaration::empty();
        decl.insert(VertexDeclaration::WEIGHTS);
        assert!(decl.contains(VertexDeclaration::WEIGHTS));
        assert!(!decl.contains(VertexDeclaration::JOINT_INDICES));
        decl.remove(VertexDeclaration::WEIGHTS);
        assert_eq!(decl, VertexDeclaration::empty());
    }
}
