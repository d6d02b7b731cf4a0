//! Animation converter (COLLADA -> .danim)
//!
//! Samples baked matrix channels per skeleton joint and decomposes every
//! sampled matrix into translation, rotation and scale. Joint order is the
//! skeleton order of the model converter, so frame records line up with the
//! joint indices stored in the model.

use std::path::Path;

use anyhow::{bail, Context, Result};
use glam::{Mat4, Quat};

use crate::collada::{
    self, find_input, Animation, Channel, ColladaError, Document, Semantic, SourceView,
};
use crate::context::ConversionContext;
use crate::model::Skeleton;
use crate::transform::swap_yz_matrix;
use crate::{formats, validate, JointTransform};

/// Frame rate of a clip with a single key.
pub const DEFAULT_FRAME_RATE: f32 = 30.0;

/// Accepted frame-rate difference between channels of one clip.
pub const FRAME_RATE_TOLERANCE: f32 = 1e-3;

/// Result of an animation conversion
#[derive(Debug, Clone)]
pub struct ConvertedAnimation {
    pub frame_rate: f32,
    pub joint_count: usize,
    /// `frames[f][j]` is joint `j` at frame `f`
    pub frames: Vec<Vec<JointTransform>>,
}

impl ConvertedAnimation {
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

/// Keyframes of one channel.
struct SampledChannel {
    frame_rate: f32,
    matrices: Vec<Mat4>,
}

/// `(node, sid)` of a channel target. Targets addressing a member of a
/// transform (`node/sid.X`, `node/sid(0)(1)`) are not supported.
fn split_target(target: &str) -> Option<(&str, &str)> {
    let (node, sid) = target.split_once('/')?;
    if sid.contains(['.', '(', '/']) {
        return None;
    }
    Some((node, sid))
}

fn sample(animation: &Animation, channel: &Channel) -> Result<SampledChannel, ColladaError> {
    let sampler = animation.sampler(&channel.source)?;
    let missing = |semantic| ColladaError::MissingInput {
        owner: "sampler",
        id: sampler.id.clone(),
        semantic,
    };
    let input = find_input(&sampler.inputs, &Semantic::Input).ok_or_else(|| missing("INPUT"))?;
    let output = find_input(&sampler.inputs, &Semantic::Output).ok_or_else(|| missing("OUTPUT"))?;

    let times = SourceView::with_siblings(animation.source(&input.source)?, animation.sources())?;
    let values = SourceView::with_siblings(animation.source(&output.source)?, animation.sources())?;
    if values.stride() != 16 {
        return Err(ColladaError::BadStride {
            semantic: "OUTPUT",
            source_id: values.id().to_string(),
            stride: values.stride(),
            min: 16,
        });
    }
    if values.count() != times.count() {
        return Err(ColladaError::CountMismatch {
            element: "OUTPUT",
            id: values.id().to_string(),
            declared: times.count(),
            found: values.count(),
        });
    }
    if times.count() == 0 {
        return Err(ColladaError::Invalid(format!(
            "sampler '{}' has no keys",
            sampler.id
        )));
    }

    let n = times.count();
    let frame_rate = if n == 1 {
        DEFAULT_FRAME_RATE
    } else {
        let duration = times.float(n - 1)? - times.float(0)?;
        if duration <= 0.0 {
            return Err(ColladaError::Invalid(format!(
                "sampler '{}' has non-increasing key times",
                sampler.id
            )));
        }
        (n - 1) as f32 / duration
    };
    let matrices = (0..n).map(|i| values.matrix(i)).collect::<Result<_, _>>()?;
    Ok(SampledChannel {
        frame_rate,
        matrices,
    })
}

/// Decompose a matrix, keeping the quaternion in the hemisphere of `previous`.
fn decompose(m: Mat4, previous: Option<Quat>) -> (JointTransform, Quat) {
    let (scale, rotation, translation) = m.to_scale_rotation_translation();
    let mut rotation = rotation.normalize();
    if let Some(previous) = previous {
        if previous.dot(rotation) < 0.0 {
            rotation = -rotation;
        }
    }
    let transform = JointTransform {
        translation: translation.to_array(),
        rotation: rotation.to_array(),
        scale: scale.to_array(),
    };
    (transform, rotation)
}

/// Convert the animation library of a document against its skeleton.
pub fn convert_animation(
    doc: &Document,
    skeleton: &Skeleton,
    ctx: &mut ConversionContext,
) -> Result<ConvertedAnimation> {
    if skeleton.is_empty() {
        bail!("Scene has no JOINT nodes to animate");
    }
    if skeleton.len() > i16::MAX as usize {
        bail!(
            "Skeleton has {} joints, the animation format holds at most {}",
            skeleton.len(),
            i16::MAX
        );
    }
    validate::check_skeleton(skeleton.len(), skeleton.len(), ctx);

    // Sampled channel per skeleton joint
    let mut channels: Vec<Option<SampledChannel>> = skeleton.nodes.iter().map(|_| None).collect();
    for animation in &doc.animations {
        for channel in animation.channels() {
            let Some((node_id, sid)) = split_target(&channel.target) else {
                tracing::debug!("Skipping channel target '{}'", channel.target);
                continue;
            };
            let joint = skeleton
                .nodes
                .iter()
                .position(|joint| joint.id == node_id || joint.sid.as_deref() == Some(node_id));
            let Some(joint) = joint else {
                tracing::debug!("Channel '{}' targets no skeleton joint", channel.target);
                continue;
            };
            // Only baked matrices are sampled
            if doc.node(skeleton.nodes[joint].node).matrix_sid.as_deref() != Some(sid) {
                tracing::debug!(
                    "Channel '{}' does not address the matrix of joint '{}'",
                    channel.target,
                    skeleton.nodes[joint].id
                );
                continue;
            }
            if channels[joint].is_some() {
                tracing::debug!("Joint '{}' has several channels; first used", skeleton.nodes[joint].id);
                continue;
            }
            let sampled = sample(animation, channel)
                .with_context(|| format!("Failed to sample channel '{}'", channel.target))?;
            channels[joint] = Some(sampled);
        }
    }

    // Every channel must agree on frame count and rate
    let mut clip: Option<(usize, f32, &str)> = None;
    for (joint, channel) in skeleton.nodes.iter().zip(&channels) {
        let Some(channel) = channel else {
            continue;
        };
        let id = joint.id.as_str();
        let count = channel.matrices.len();
        match clip {
            None => clip = Some((count, channel.frame_rate, id)),
            Some((first_count, first_rate, first_id)) => {
                if count != first_count {
                    bail!(
                        "Joint '{}' has {} frames but joint '{}' has {}",
                        id,
                        count,
                        first_id,
                        first_count
                    );
                }
                if (channel.frame_rate - first_rate).abs() > FRAME_RATE_TOLERANCE {
                    bail!(
                        "Joint '{}' runs at {} fps but joint '{}' runs at {} fps",
                        id,
                        channel.frame_rate,
                        first_id,
                        first_rate
                    );
                }
            }
        }
    }
    let Some((frame_count, frame_rate, _)) = clip else {
        bail!("No animation channel targets a skeleton joint");
    };
    if frame_count > u16::MAX as usize {
        bail!(
            "Animation has {} frames, the format holds at most {}",
            frame_count,
            u16::MAX
        );
    }

    let swap = ctx.options.swap_yz;
    let mut previous: Vec<Option<Quat>> = vec![None; skeleton.len()];
    let mut frames = Vec::with_capacity(frame_count);
    for frame in 0..frame_count {
        let mut transforms = Vec::with_capacity(skeleton.len());
        for (j, joint) in skeleton.nodes.iter().enumerate() {
            let mut matrix = match &channels[j] {
                Some(channel) => channel.matrices[frame],
                None => doc.node(joint.node).local_transform,
            };
            if swap {
                matrix = swap_yz_matrix(matrix);
            }
            let (transform, rotation) = decompose(matrix, previous[j]);
            previous[j] = Some(rotation);
            transforms.push(transform);
        }
        frames.push(transforms);
    }

    Ok(ConvertedAnimation {
        frame_rate,
        joint_count: skeleton.len(),
        frames,
    })
}

/// Parse and convert the animation of a COLLADA file.
pub fn convert_collada_animation_to_memory(
    input: &Path,
    ctx: &mut ConversionContext,
) -> Result<ConvertedAnimation> {
    let doc = collada::parse_file(input, ctx)?;
    let skeleton = Skeleton::from_scene(&doc, doc.active_scene()?)?;
    convert_animation(&doc, &skeleton, ctx)
        .with_context(|| format!("Failed to convert animation: {}", input.display()))
}

/// Convert the animation of a COLLADA file to a .danim file.
pub fn convert_collada_animation(
    input: &Path,
    output: &Path,
    ctx: &mut ConversionContext,
) -> Result<()> {
    let animation = convert_collada_animation_to_memory(input, ctx)?;
    formats::write_animation_file(output, &animation)?;
    tracing::info!(
        "Converted animation: {} frames, {} joints, {:.2} fps -> {}",
        animation.frame_count(),
        animation.joint_count,
        animation.frame_rate,
        output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_split_target() {
        assert_eq!(split_target("hip/transform"), Some(("hip", "transform")));
        assert_eq!(split_target("hip/translate.X"), None);
        assert_eq!(split_target("hip/transform(0)(3)"), None);
        assert_eq!(split_target("hip"), None);
    }

    #[test]
    fn test_decompose_non_uniform_scale() {
        let m = Mat4::from_scale_rotation_translation(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_rotation_y(0.5),
            Vec3::new(4.0, 5.0, 6.0),
        );
        let (t, _) = decompose(m, None);
        let scale = Vec3::from_array(t.scale);
        assert!((scale - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-5);
        assert_eq!(t.translation, [4.0, 5.0, 6.0]);
        let q = Quat::from_array(t.rotation);
        assert!((q.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_decompose_keeps_hemisphere() {
        let m = Mat4::from_quat(Quat::from_rotation_z(0.3));
        let (_, q) = decompose(m, None);
        let (t, flipped) = decompose(m, Some(-q));
        assert!(flipped.dot(-q) > 0.0);
        assert_eq!(Quat::from_array(t.rotation), flipped);
    }
}
