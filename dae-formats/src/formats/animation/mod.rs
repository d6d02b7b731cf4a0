//! Animation binary format (.danim)
//!
//! Skeletal animation clip of sampled per-joint local transforms.
//!
//! # Layout
//! ```text
//! Header (17 bytes):
//! 0x00: check value u32 (7777)
//! 0x04: version u32
//! 0x08: features u8          - Reserved, must be 0
//! 0x09: frame_count u16
//! 0x0B: joint_count i16
//! 0x0D: frame_rate f32       - Frames per second
//!
//! Frame Data (frame_count × joint_count × 40 bytes):
//! - translation: f32 × 3
//! - rotation: f32 × 4 (x, y, z, w)
//! - scale: f32 × 3
//! ```
//!
//! Frame data is stored sequentially: [frame0_joint0, frame0_joint1, ..., frame1_joint0, ...]
//! with joints in the skeleton order of the matching model file.

mod header;
mod types;

#[cfg(test)]
mod tests;

pub use header::{AnimationHeader, ANIMATION_CHECK_VALUE, ANIMATION_VERSION};
pub use types::{JointTransform, JOINT_TRANSFORM_SIZE};
