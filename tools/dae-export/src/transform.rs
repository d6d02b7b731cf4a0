//! Post-transforms applied to a converted model
//!
//! Both transforms are their own inverse: the Y/Z swap only permutes values,
//! and the V flip is `1 - v`.

use glam::{Mat4, Vec3};

use crate::context::ConversionOptions;
use crate::model::{Bounds, OutputModel};

/// Swap the Y and Z components of a vector.
pub fn swap_yz(v: Vec3) -> Vec3 {
    Vec3::new(v.x, v.z, v.y)
}

fn swap_yz_array(v: &mut [f32; 3]) {
    v.swap(1, 2);
}

/// Conjugate a matrix by the Y/Z permutation (`P · M · P`): rows 1 and 2 and
/// columns 1 and 2 are exchanged, so the result maps swapped points exactly
/// as the input maps the originals.
pub fn swap_yz_matrix(m: Mat4) -> Mat4 {
    let mut cols = m.to_cols_array_2d();
    cols.swap(1, 2);
    for col in &mut cols {
        col.swap(1, 2);
    }
    Mat4::from_cols_array_2d(&cols)
}

fn swap_yz_bounds(bounds: &mut Bounds) {
    if !bounds.is_empty() {
        bounds.min = swap_yz(bounds.min);
        bounds.max = swap_yz(bounds.max);
    }
}

/// Flip a texture V coordinate.
pub fn flip_v(v: f32) -> f32 {
    1.0 - v
}

/// Apply the Y/Z swap to every spatial value of the model.
pub fn swap_model_yz(model: &mut OutputModel) {
    swap_yz_bounds(&mut model.bounds);
    for mesh in &mut model.meshes {
        swap_yz_bounds(&mut mesh.bounds);
        for vertex in &mut mesh.vertices {
            swap_yz_array(&mut vertex.position);
            swap_yz_array(&mut vertex.normal);
        }
        for ibm in &mut mesh.inverse_bind_matrices {
            *ibm = swap_yz_matrix(*ibm);
        }
    }
}

/// Flip V of every texture coordinate of the model.
pub fn flip_model_v(model: &mut OutputModel) {
    for vertex in model.meshes.iter_mut().flat_map(|m| m.vertices.iter_mut()) {
        vertex.uv[1] = flip_v(vertex.uv[1]);
    }
}

/// Apply the transforms selected in `options`.
pub fn apply_to_model(model: &mut OutputModel, options: &ConversionOptions) {
    if options.swap_yz {
        tracing::debug!("Swapping Y/Z axes");
        swap_model_yz(model);
    }
    if options.flip_v {
        tracing::debug!("Flipping texture V");
        flip_model_v(model);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    #[test]
    fn test_swap_matrix_matches_point_swap() {
        let m = Mat4::from_scale_rotation_translation(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_rotation_x(0.5),
            Vec3::new(4.0, 5.0, 6.0),
        );
        let p = Vec3::new(0.25, -1.5, 2.0);
        let expected = swap_yz(m.transform_point3(p));
        let actual = swap_yz_matrix(m).transform_point3(swap_yz(p));
        assert!((expected - actual).length() < 1e-5);
    }

    #[test]
    fn test_swap_matrix_twice_is_exact() {
        let m = Mat4::from_cols_array(&[
            0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0, 1.1, 1.2, 1.3, 1.4, 1.5, 1.6,
        ]);
        assert_eq!(swap_yz_matrix(swap_yz_matrix(m)), m);
    }

    #[test]
    fn test_swap_translation_moves_to_z() {
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let swapped = swap_yz_matrix(m);
        assert_eq!(swapped.w_axis.to_array(), [1.0, 3.0, 2.0, 1.0]);
    }

    #[test]
    fn test_flip_v_twice_restores_dyadic_values() {
        for v in [0.0, 0.25, 0.5, 0.75, 1.0, 0.625] {
            assert_eq!(flip_v(flip_v(v)), v);
        }
    }
}
