//! Option consistency and output limit checks
//!
//! Nothing here fails a conversion: problems are reported as warnings, and
//! contradictory options are corrected in place.

use dae_formats::VertexDeclaration;

use crate::context::{ConversionContext, Warning};
use crate::model::OutputModel;

/// Largest index count (and index value) that fits 16-bit index buffers.
pub const MAX_INDEX_COUNT: usize = 65536;

/// Largest skeleton a runtime accepts.
pub const MAX_SKELETON_NODES: usize = 256;

/// Largest number of joints a skinned draw can bind.
pub const MAX_JOINTS: usize = 60;

/// Check and correct the options before conversion.
pub fn check_options(ctx: &mut ConversionContext) {
    let declaration = ctx.options.vertex_declaration;
    let weights = declaration.contains(VertexDeclaration::WEIGHTS);
    let joints = declaration.contains(VertexDeclaration::JOINT_INDICES);

    if !declaration.contains(VertexDeclaration::POSITION) {
        ctx.options.vertex_declaration.insert(VertexDeclaration::POSITION);
        ctx.warn(Warning::PositionForced);
    }
    if ctx.options.animated && !(weights && joints) {
        ctx.warn(Warning::AnimationWithoutSkinElements);
    }
    if !ctx.options.animated && (weights || joints) {
        ctx.warn(Warning::SkinElementsWithoutAnimation);
    }
    if ctx.options.animated && ctx.options.combine_meshes {
        ctx.options.combine_meshes = false;
        ctx.warn(Warning::CombineMeshesDisabled);
    }
}

/// Index count and index value limits of one mesh.
pub fn check_indices(mesh: &str, indices: &[u32], ctx: &mut ConversionContext) {
    if indices.len() > MAX_INDEX_COUNT {
        ctx.warn(Warning::IndexCountExceeded {
            mesh: mesh.to_string(),
            count: indices.len(),
            limit: MAX_INDEX_COUNT,
        });
    }
    if let Some(&index) = indices.iter().max() {
        if index as usize > MAX_INDEX_COUNT {
            ctx.warn(Warning::IndexValueExceeded {
                mesh: mesh.to_string(),
                index,
                limit: MAX_INDEX_COUNT as u32,
            });
        }
    }
}

/// Skeleton size and joint count limits.
pub fn check_skeleton(node_count: usize, joint_count: usize, ctx: &mut ConversionContext) {
    if node_count > MAX_SKELETON_NODES {
        ctx.warn(Warning::SkeletonTooLarge {
            count: node_count,
            limit: MAX_SKELETON_NODES,
        });
    }
    if joint_count > MAX_JOINTS {
        ctx.warn(Warning::TooManyJoints {
            count: joint_count,
            limit: MAX_JOINTS,
        });
    }
}

/// Run every output check on a converted model.
pub fn check_model(model: &OutputModel, ctx: &mut ConversionContext) {
    for mesh in &model.meshes {
        check_indices(&mesh.name, &mesh.indices, ctx);
    }
    // Every skeleton entry is a JOINT-tagged node
    check_skeleton(model.skeleton.len(), model.skeleton.len(), ctx);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ConversionOptions;

    fn ctx_with(vertex_format: &str, animated: bool, combine: bool) -> ConversionContext {
        ConversionContext::new(ConversionOptions {
            vertex_declaration: ConversionOptions::parse_vertex_format(vertex_format).unwrap(),
            animated,
            combine_meshes: combine,
            ..Default::default()
        })
    }

    #[test]
    fn test_index_count_boundary() {
        let mut ctx = ConversionContext::default();
        check_indices("m", &vec![0; 65536], &mut ctx);
        assert!(ctx.warnings().is_empty());

        check_indices("m", &vec![0; 65537], &mut ctx);
        assert!(ctx.has_warning(|w| matches!(w, Warning::IndexCountExceeded { count: 65537, .. })));
    }

    #[test]
    fn test_index_value_boundary() {
        let mut ctx = ConversionContext::default();
        check_indices("m", &[0, 65536, 1], &mut ctx);
        assert!(ctx.warnings().is_empty());

        check_indices("m", &[0, 65537, 1], &mut ctx);
        assert!(ctx.has_warning(|w| matches!(w, Warning::IndexValueExceeded { index: 65537, .. })));
    }

    #[test]
    fn test_skeleton_boundaries() {
        let mut ctx = ConversionContext::default();
        check_skeleton(256, 60, &mut ctx);
        assert!(ctx.warnings().is_empty());

        check_skeleton(257, 60, &mut ctx);
        assert_eq!(
            ctx.warnings(),
            &[Warning::SkeletonTooLarge {
                count: 257,
                limit: 256
            }]
        );

        let mut ctx = ConversionContext::default();
        check_skeleton(61, 61, &mut ctx);
        assert_eq!(
            ctx.warnings(),
            &[Warning::TooManyJoints {
                count: 61,
                limit: 60
            }]
        );
    }

    #[test]
    fn test_animation_without_skin_elements() {
        let mut ctx = ctx_with("pnw", true, false);
        check_options(&mut ctx);
        assert_eq!(ctx.warnings(), &[Warning::AnimationWithoutSkinElements]);
    }

    #[test]
    fn test_skin_elements_without_animation() {
        let mut ctx = ctx_with("pj", false, false);
        check_options(&mut ctx);
        assert_eq!(ctx.warnings(), &[Warning::SkinElementsWithoutAnimation]);
    }

    #[test]
    fn test_combine_meshes_forced_off_when_animated() {
        let mut ctx = ctx_with("pwj", true, true);
        check_options(&mut ctx);
        assert!(!ctx.options.combine_meshes);
        assert_eq!(ctx.warnings(), &[Warning::CombineMeshesDisabled]);
    }

    #[test]
    fn test_position_always_written() {
        let mut ctx = ctx_with("nt", false, false);
        check_options(&mut ctx);
        assert!(ctx.options.vertex_declaration.contains(VertexDeclaration::POSITION));
        assert_eq!(ctx.warnings(), &[Warning::PositionForced]);
    }

    #[test]
    fn test_consistent_options_are_quiet() {
        let mut ctx = ctx_with("pntwj", true, false);
        check_options(&mut ctx);
        assert!(ctx.warnings().is_empty());
    }
}
