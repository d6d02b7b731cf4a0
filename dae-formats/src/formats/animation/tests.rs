//! Tests for animation format

use super::*;

// ========================================================================
// Header Tests
// ========================================================================

#[test]
fn test_animation_header_roundtrip() {
    let header = AnimationHeader::new(90, 25, 30.0);
    assert_eq!(header.check_value, 7777);
    assert_eq!(header.features, 0);

    let bytes = header.to_bytes();
    assert_eq!(bytes.len(), AnimationHeader::SIZE);
    assert_eq!(&bytes[0..4], &7777u32.to_le_bytes());

    let parsed = AnimationHeader::from_bytes(&bytes).unwrap();
    assert_eq!(parsed, header);
}

#[test]
fn test_animation_header_field_offsets() {
    let bytes = AnimationHeader::new(0x0102, -2, 24.0).to_bytes();
    assert_eq!(&bytes[9..11], &[0x02, 0x01]);
    assert_eq!(&bytes[11..13], &(-2i16).to_le_bytes());
    assert_eq!(&bytes[13..17], &24.0f32.to_le_bytes());
}

#[test]
fn test_animation_file_size() {
    // 40 joints, 60 frames: 17 + 60 × 40 × 40
    let header = AnimationHeader::new(60, 40, 30.0);
    assert_eq!(header.frame_size(), 1600);
    assert_eq!(header.file_size(), 17 + 96_000);
}

#[test]
fn test_animation_header_from_short_bytes() {
    assert!(AnimationHeader::from_bytes(&[0u8; 16]).is_none());
}

#[test]
fn test_header_validation() {
    assert!(AnimationHeader::new(10, 4, 30.0).validate());
    assert!(!AnimationHeader::new(0, 4, 30.0).validate());
    assert!(!AnimationHeader::new(10, 0, 30.0).validate());
    assert!(!AnimationHeader::new(10, 4, 0.0).validate());

    let mut wrong_check = AnimationHeader::new(10, 4, 30.0);
    wrong_check.check_value = 6666;
    assert!(!wrong_check.validate());
}

// ========================================================================
// Joint Transform Tests
// ========================================================================

#[test]
fn test_joint_transform_layout() {
    let t = JointTransform {
        translation: [1.0, 2.0, 3.0],
        rotation: [0.0, 0.0, 0.0, 1.0],
        scale: [4.0, 5.0, 6.0],
    };
    let bytes = t.to_bytes();
    assert_eq!(bytes.len(), JOINT_TRANSFORM_SIZE);
    assert_eq!(&bytes[0..4], &1.0f32.to_le_bytes());
    assert_eq!(&bytes[24..28], &1.0f32.to_le_bytes(), "rotation w at float 6");
    assert_eq!(&bytes[36..40], &6.0f32.to_le_bytes());
    assert_eq!(JointTransform::from_bytes(&bytes), Some(t));
}

#[test]
fn test_joint_transform_default_is_identity() {
    assert_eq!(JointTransform::default(), JointTransform::IDENTITY);
}
