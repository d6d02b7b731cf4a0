//! Animation data types

/// Size of one serialized joint transform (40 bytes)
pub const JOINT_TRANSFORM_SIZE: usize = 40;

/// Local transform of one joint in one frame (40 bytes)
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct JointTransform {
    pub translation: [f32; 3],
    /// Unit quaternion [x, y, z, w]
    pub rotation: [f32; 4],
    /// Non-uniform scale [x, y, z]
    pub scale: [f32; 3],
}

impl Default for JointTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl JointTransform {
    /// Identity transform (no rotation, no translation, unit scale)
    pub const IDENTITY: Self = Self {
        translation: [0.0, 0.0, 0.0],
        rotation: [0.0, 0.0, 0.0, 1.0],
        scale: [1.0, 1.0, 1.0],
    };

    pub const SIZE: usize = JOINT_TRANSFORM_SIZE;

    /// Write to raw bytes (40 bytes)
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        let floats = self
            .translation
            .iter()
            .chain(&self.rotation)
            .chain(&self.scale);
        for (i, f) in floats.enumerate() {
            bytes[i * 4..(i + 1) * 4].copy_from_slice(&f.to_le_bytes());
        }
        bytes
    }

    /// Parse from raw bytes (40 bytes)
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        let f = |i: usize| {
            let at = i * 4;
            f32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };
        Some(Self {
            translation: [f(0), f(1), f(2)],
            rotation: [f(3), f(4), f(5), f(6)],
            scale: [f(7), f(8), f(9)],
        })
    }
}
