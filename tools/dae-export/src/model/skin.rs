//! Skin binding: per-vertex influences and inverse bind matrices
//! expressed against the flattened skeleton.

use glam::Mat4;
use smallvec::SmallVec;

use super::skeleton::Skeleton;
use crate::collada::{find_input, find_source, ColladaError, Semantic, Skin, SourceView};
use crate::context::{ConversionContext, Warning};

/// Maximum influences stored per vertex.
pub const MAX_INFLUENCES: usize = 4;

/// Accepted deviation of a vertex's weight sum from 1.
pub const WEIGHT_SUM_TOLERANCE: f32 = 0.0001;

/// (skeleton index, weight) pairs of one vertex.
pub type Influences = SmallVec<[(u32, f32); MAX_INFLUENCES]>;

/// A skin resolved against the skeleton.
#[derive(Debug, Clone)]
pub struct SkinBinding {
    pub bind_shape_matrix: Mat4,
    /// Indexed by the geometry's position index
    pub influences: Vec<Influences>,
    /// One per skeleton node, in skeleton order
    pub inverse_bind_matrices: Vec<Mat4>,
}

impl SkinBinding {
    /// Weights and joint indices of a vertex, zero-padded to four slots.
    pub fn slots(&self, position_index: usize) -> Result<([f32; 4], [u32; 4]), ColladaError> {
        let influences =
            self.influences
                .get(position_index)
                .ok_or_else(|| ColladaError::IndexOutOfRange {
                    source_id: "vertex_weights".to_string(),
                    index: position_index,
                    count: self.influences.len(),
                })?;
        let mut weights = [0.0; 4];
        let mut joints = [0; 4];
        for (slot, &(joint, weight)) in influences.iter().enumerate() {
            weights[slot] = weight;
            joints[slot] = joint;
        }
        Ok((weights, joints))
    }
}

/// Map every name of a joint-name source to its skeleton index.
fn map_joints(view: &SourceView<'_>, skeleton: &Skeleton) -> Result<Vec<u32>, ColladaError> {
    view.names()?
        .into_iter()
        .map(|name| {
            skeleton
                .find(name)
                .map(|index| index as u32)
                .ok_or_else(|| ColladaError::UnresolvedReference {
                    kind: "joint",
                    id: name.to_string(),
                })
        })
        .collect()
}

/// Resolve a skin's joints, weights and inverse bind matrices.
pub fn bind_skin(
    controller_id: &str,
    skin: &Skin,
    skeleton: &Skeleton,
    ctx: &mut ConversionContext,
) -> Result<SkinBinding, ColladaError> {
    let weights = &skin.weights;
    let missing = |semantic| ColladaError::MissingInput {
        owner: "skin",
        id: controller_id.to_string(),
        semantic,
    };

    let weight_joint_input =
        find_input(&weights.inputs, &Semantic::Joint).ok_or_else(|| missing("JOINT"))?;
    let weight_input =
        find_input(&weights.inputs, &Semantic::Weight).ok_or_else(|| missing("WEIGHT"))?;
    let joint_input = find_input(&skin.joint_inputs, &Semantic::Joint).unwrap_or(weight_joint_input);

    // Inverse bind matrices, remapped from skin order to skeleton order
    let joint_view = SourceView::new(find_source(&skin.sources, &joint_input.source)?, &skin.sources)?;
    let skin_joints = map_joints(&joint_view, skeleton)?;
    let mut inverse_bind_matrices = vec![Mat4::IDENTITY; skeleton.len()];
    if let Some(input) = find_input(&skin.joint_inputs, &Semantic::InvBindMatrix) {
        let view = SourceView::new(find_source(&skin.sources, &input.source)?, &skin.sources)?;
        if view.count() != skin_joints.len() {
            return Err(ColladaError::CountMismatch {
                element: "INV_BIND_MATRIX",
                id: view.id().to_string(),
                declared: skin_joints.len(),
                found: view.count(),
            });
        }
        for (i, &joint) in skin_joints.iter().enumerate() {
            inverse_bind_matrices[joint as usize] = view.matrix(i)?;
        }
    }

    // Influences
    let influence_joints = if weight_joint_input.source == joint_input.source {
        skin_joints.clone()
    } else {
        let view = SourceView::new(
            find_source(&skin.sources, &weight_joint_input.source)?,
            &skin.sources,
        )?;
        map_joints(&view, skeleton)?
    };
    let weight_view =
        SourceView::new(find_source(&skin.sources, &weight_input.source)?, &skin.sources)?;

    if weights.vcount.len() != weights.count {
        return Err(ColladaError::CountMismatch {
            element: "vcount",
            id: controller_id.to_string(),
            declared: weights.count,
            found: weights.vcount.len(),
        });
    }
    let stride = crate::collada::input_stride(&weights.inputs);
    let pairs: usize = weights.vcount.iter().map(|&n| n as usize).sum();
    if pairs * stride != weights.v.len() {
        return Err(ColladaError::CountMismatch {
            element: "v",
            id: controller_id.to_string(),
            declared: pairs * stride,
            found: weights.v.len(),
        });
    }

    let mut influences = Vec::with_capacity(weights.count);
    let mut truncated = 0;
    let mut bad_sums = 0;
    let mut cursor = 0;
    for &n in &weights.vcount {
        let mut vertex = Influences::new();
        let mut dropped = false;
        for _ in 0..n {
            let joint = weights.v[cursor + weight_joint_input.offset];
            let weight_index = weights.v[cursor + weight_input.offset];
            cursor += stride;

            // -1 binds to the bind shape itself
            if joint < 0 {
                continue;
            }
            if vertex.len() == MAX_INFLUENCES {
                dropped = true;
                continue;
            }
            let joint = *influence_joints.get(joint as usize).ok_or_else(|| {
                ColladaError::IndexOutOfRange {
                    source_id: weight_joint_input.source.clone(),
                    index: joint as usize,
                    count: influence_joints.len(),
                }
            })?;
            let weight_index = usize::try_from(weight_index).map_err(|_| {
                ColladaError::Invalid(format!("negative weight index {weight_index}"))
            })?;
            vertex.push((joint, weight_view.float(weight_index)?));
        }

        if dropped {
            truncated += 1;
        }
        let sum: f32 = vertex.iter().map(|&(_, w)| w).sum();
        if !vertex.is_empty() && (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            bad_sums += 1;
        }
        influences.push(vertex);
    }

    if truncated > 0 {
        ctx.warn(Warning::InfluencesTruncated {
            skin: controller_id.to_string(),
            vertices: truncated,
        });
    }
    if bad_sums > 0 {
        ctx.warn(Warning::WeightSum {
            skin: controller_id.to_string(),
            vertices: bad_sums,
        });
    }

    Ok(SkinBinding {
        bind_shape_matrix: skin.bind_shape_matrix,
        influences,
        inverse_bind_matrices,
    })
}
