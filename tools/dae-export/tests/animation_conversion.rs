//! Animation conversion integration tests

mod common;

use dae_export::animation::{self, ConvertedAnimation};
use dae_export::{AnimationHeader, ConversionSettings, JointTransform};
use common::*;
use tempfile::tempdir;

fn convert(xml: &str, transforms: Option<&str>) -> anyhow::Result<ConvertedAnimation> {
    let dir = tempdir().expect("Failed to create temp dir");
    let input = write_dae(dir.path(), "clip.dae", xml);
    let settings = ConversionSettings {
        transforms: transforms.map(String::from),
        ..Default::default()
    };
    let mut ctx = settings.build_context().expect("Invalid settings");
    animation::convert_collada_animation_to_memory(&input, &mut ctx)
}

fn assert_translation(transform: &JointTransform, expected: [f32; 3]) {
    for (actual, expected) in transform.translation.iter().zip(expected) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "translation {:?} != {:?}",
            transform.translation,
            expected
        );
    }
}

#[test]
fn test_frames_and_rate() {
    let clip = convert(&skinned_dae(), None).expect("Conversion failed");

    assert_eq!(clip.frame_count(), FRAME_COUNT);
    assert_eq!(clip.joint_count, JOINT_COUNT);
    assert!((clip.frame_rate - FRAME_RATE).abs() < 1e-6);
    assert!(clip.frames.iter().all(|f| f.len() == JOINT_COUNT));

    assert_translation(&clip.frames[2][0], [2.0, 0.0, 0.0]);
    assert_translation(&clip.frames[1][2], [0.0, 1.0, 1.0]);
    for frame in &clip.frames {
        let [x, y, z, w] = frame[0].rotation;
        assert!(x.abs() < 1e-6 && y.abs() < 1e-6 && z.abs() < 1e-6);
        assert!((w - 1.0).abs() < 1e-6);
        assert_eq!(frame[0].scale, [1.0, 1.0, 1.0]);
    }
}

#[test]
fn test_unanimated_joint_holds_bind_pose() {
    let clip = convert(&skinned_dae(), None).expect("Conversion failed");

    // B has no channel and keeps its node transform in every frame
    for frame in &clip.frames {
        assert_translation(&frame[1], [0.0, 1.0, 0.0]);
    }
}

#[test]
fn test_swap_yz_applies_to_keys() {
    let clip = convert(&skinned_dae(), Some("y")).expect("Conversion failed");

    assert_translation(&clip.frames[2][2], [0.0, 2.0, 1.0]);
    assert_translation(&clip.frames[0][1], [0.0, 0.0, 1.0]);
}

#[test]
fn test_animation_file_layout() {
    let dir = tempdir().expect("Failed to create temp dir");
    let input = write_dae(dir.path(), "clip.dae", &skinned_dae());
    let output = dir.path().join("clip.danim");
    let mut ctx = ConversionSettings::default()
        .build_context()
        .expect("Invalid settings");

    animation::convert_collada_animation(&input, &output, &mut ctx).expect("Conversion failed");

    let bytes = std::fs::read(&output).expect("Failed to read output");
    assert_eq!(
        bytes.len(),
        AnimationHeader::SIZE + FRAME_COUNT * JOINT_COUNT * JointTransform::SIZE
    );
    let header = AnimationHeader::from_bytes(&bytes).expect("Invalid header");
    assert!(header.validate());
    assert_eq!(header.frame_count as usize, FRAME_COUNT);
    assert_eq!(header.joint_count as usize, JOINT_COUNT);
    assert_eq!(header.frame_rate, FRAME_RATE);

    // Frame 2, joint A
    let offset = AnimationHeader::SIZE + 2 * header.frame_size();
    let transform = JointTransform::from_bytes(&bytes[offset..]).expect("Invalid record");
    assert_translation(&transform, [2.0, 0.0, 0.0]);
}

#[test]
fn test_frame_count_mismatch_is_fatal() {
    let channels = matrix_channel("A", &[0.0, 0.5, 1.0], &[[0.0; 3], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]])
        + &matrix_channel("C", &[0.0, 1.0], &[[0.0, 1.0, 0.0], [0.0, 1.0, 2.0]]);
    let err = convert(&skinned_dae_with(&channels), None).unwrap_err();

    assert!(format!("{:#}", err).contains("frames"), "{:#}", err);
}

#[test]
fn test_frame_rate_mismatch_is_fatal() {
    let channels = matrix_channel("A", &[0.0, 0.5, 1.0], &[[0.0; 3], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]])
        + &matrix_channel("C", &[0.0, 1.0, 2.0], &[[0.0; 3], [0.0; 3], [0.0; 3]]);
    let err = convert(&skinned_dae_with(&channels), None).unwrap_err();

    assert!(format!("{:#}", err).contains("fps"), "{:#}", err);
}

#[test]
fn test_no_matching_channel_is_fatal() {
    let channels = matrix_channel("Z", &[0.0, 1.0], &[[0.0; 3], [1.0, 0.0, 0.0]]);
    assert!(convert(&skinned_dae_with(&channels), None).is_err());
}

#[test]
fn test_scene_without_joints_is_fatal() {
    assert!(convert(&triangle_dae(), None).is_err());
}

#[test]
fn test_non_matrix_channel_is_skipped() {
    // B is posed by <translate> and keyed through it; only matrices are sampled
    let channels = default_channels()
        + &translate_channel("B", &[0.0, 0.5, 1.0], &[[0.0, 1.0, 0.0], [0.0, 2.0, 0.0], [0.0, 3.0, 0.0]]);
    let xml = skinned_dae_with_b(r#"<translate sid="translate">0 1 0</translate>"#, &channels);
    let clip = convert(&xml, None).expect("Conversion failed");

    assert_eq!(clip.frame_count(), FRAME_COUNT);
    for frame in &clip.frames {
        assert_translation(&frame[1], [0.0, 1.0, 0.0]);
    }
    assert_translation(&clip.frames[2][0], [2.0, 0.0, 0.0]);
}

#[test]
fn test_channel_for_other_transform_sid_is_skipped() {
    // B keeps its matrix but the extra channel addresses a sid it does not have
    let channels = default_channels()
        + &translate_channel("B", &[0.0, 1.0], &[[0.0, 5.0, 0.0], [0.0, 6.0, 0.0]]);
    let clip = convert(&skinned_dae_with(&channels), None).expect("Conversion failed");

    for frame in &clip.frames {
        assert_translation(&frame[1], [0.0, 1.0, 0.0]);
    }
}
