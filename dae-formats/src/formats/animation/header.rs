//! Animation header structure and operations

use super::JOINT_TRANSFORM_SIZE;

/// Check value at offset 0 of every animation file.
pub const ANIMATION_CHECK_VALUE: u32 = 7777;

/// Current animation format version.
pub const ANIMATION_VERSION: u32 = 1;

/// Animation header (17 bytes)
///
/// Note: Not packed - we use explicit byte serialization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationHeader {
    pub check_value: u32,
    pub version: u32,
    /// Reserved feature flags (must be 0)
    pub features: u8,
    pub frame_count: u16,
    pub joint_count: i16,
    pub frame_rate: f32,
}

impl AnimationHeader {
    pub const SIZE: usize = 17;

    pub fn new(frame_count: u16, joint_count: i16, frame_rate: f32) -> Self {
        Self {
            check_value: ANIMATION_CHECK_VALUE,
            version: ANIMATION_VERSION,
            features: 0,
            frame_count,
            joint_count,
            frame_rate,
        }
    }

    /// Write header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.check_value.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.version.to_le_bytes());
        bytes[8] = self.features;
        bytes[9..11].copy_from_slice(&self.frame_count.to_le_bytes());
        bytes[11..13].copy_from_slice(&self.joint_count.to_le_bytes());
        bytes[13..17].copy_from_slice(&self.frame_rate.to_le_bytes());
        bytes
    }

    /// Read header from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            check_value: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            version: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            features: bytes[8],
            frame_count: u16::from_le_bytes([bytes[9], bytes[10]]),
            joint_count: i16::from_le_bytes([bytes[11], bytes[12]]),
            frame_rate: f32::from_le_bytes([bytes[13], bytes[14], bytes[15], bytes[16]]),
        })
    }

    /// Validate header
    pub fn validate(&self) -> bool {
        self.check_value == ANIMATION_CHECK_VALUE
            && self.version == ANIMATION_VERSION
            && self.features == 0
            && self.frame_count > 0
            && self.joint_count > 0
            && self.frame_rate > 0.0
    }

    /// Bytes of one frame (all joints)
    pub fn frame_size(&self) -> usize {
        self.joint_count.max(0) as usize * JOINT_TRANSFORM_SIZE
    }

    /// Calculate expected data size (excluding header)
    pub fn data_size(&self) -> usize {
        self.frame_count as usize * self.frame_size()
    }

    /// Calculate total file size (header + data)
    pub fn file_size(&self) -> usize {
        Self::SIZE + self.data_size()
    }
}
