//! Model converter (COLLADA -> .dmodel)
//!
//! Walks the exported part of the scene, resolves geometry and skins,
//! welds vertices, and flattens the skeleton.

mod builder;
mod material;
mod skeleton;
mod skin;
mod vertex;

use std::path::Path;

use anyhow::{Context, Result};
use glam::{Mat4, Vec3};

use crate::collada::{self, Document};
use crate::context::ConversionContext;
use crate::{formats, transform, validate};
use builder::ModelBuilder;

pub use material::OutputMaterial;
pub use skeleton::{JointEntry, Skeleton, SkeletonNode};
pub use skin::{bind_skin, Influences, SkinBinding, MAX_INFLUENCES, WEIGHT_SUM_TOLERANCE};
pub use vertex::{Vertex, VertexWelder};

/// Axis-aligned bounds, empty until a point is included.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn include(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x
    }

    /// `(min, max)` as written to disk; empty bounds are all zeros.
    pub fn to_arrays(&self) -> ([f32; 3], [f32; 3]) {
        if self.is_empty() {
            ([0.0; 3], [0.0; 3])
        } else {
            (self.min.to_array(), self.max.to_array())
        }
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// One named mesh of the output model.
#[derive(Debug, Clone)]
pub struct OutputMesh {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub material: OutputMaterial,
    pub bounds: Bounds,
    /// One per skeleton node when the mesh is skinned and animated
    pub inverse_bind_matrices: Vec<Mat4>,
}

impl OutputMesh {
    pub fn is_skinned(&self) -> bool {
        !self.inverse_bind_matrices.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Converted model, ready for post-transform and serialization.
#[derive(Debug, Clone)]
pub struct OutputModel {
    pub meshes: Vec<OutputMesh>,
    pub bounds: Bounds,
    pub skeleton: Skeleton,
    pub vertex_declaration: dae_formats::VertexDeclaration,
    pub animated: bool,
}

impl OutputModel {
    pub fn mesh(&self, name: &str) -> Option<&OutputMesh> {
        self.meshes.iter().find(|m| m.name == name)
    }
}

/// Convert a parsed document with the options in `ctx`.
pub fn convert_document(doc: &Document, ctx: &mut ConversionContext) -> Result<OutputModel> {
    let scene = doc.active_scene()?;
    let skeleton = Skeleton::from_scene(doc, scene)?;
    tracing::debug!("Skeleton: {} joints", skeleton.len());

    let mut builder = ModelBuilder::new(doc, &skeleton, ctx);
    for &root in &scene.roots {
        builder.visit_root(root)?;
    }
    let bounds = builder.bounds;
    let meshes = builder.finish();

    Ok(OutputModel {
        meshes,
        bounds,
        vertex_declaration: ctx.options.vertex_declaration,
        animated: ctx.options.animated,
        skeleton,
    })
}

/// Parse, convert, post-transform and validate a COLLADA file.
pub fn convert_collada_to_memory(input: &Path, ctx: &mut ConversionContext) -> Result<OutputModel> {
    validate::check_options(ctx);
    let doc = collada::parse_file(input, ctx)?;
    let mut model = convert_document(&doc, ctx)
        .with_context(|| format!("Failed to convert model: {}", input.display()))?;
    transform::apply_to_model(&mut model, &ctx.options);
    validate::check_model(&model, ctx);
    Ok(model)
}

/// Convert a COLLADA file to a .dmodel file.
pub fn convert_collada(input: &Path, output: &Path, ctx: &mut ConversionContext) -> Result<()> {
    let model = convert_collada_to_memory(input, ctx)?;
    formats::write_model_file(output, &model)?;

    let vertices: usize = model.meshes.iter().map(|m| m.vertices.len()).sum();
    let triangles: usize = model.meshes.iter().map(|m| m.triangle_count()).sum();
    tracing::info!(
        "Converted model: {} meshes, {} vertices, {} triangles, {} joints -> {}",
        model.meshes.len(),
        vertices,
        triangles,
        model.skeleton.len(),
        output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_include() {
        let mut bounds = Bounds::EMPTY;
        assert!(bounds.is_empty());
        assert_eq!(bounds.to_arrays(), ([0.0; 3], [0.0; 3]));

        bounds.include(Vec3::new(1.0, -2.0, 3.0));
        bounds.include(Vec3::new(-1.0, 5.0, 0.0));
        assert_eq!(
            bounds.to_arrays(),
            ([-1.0, -2.0, 0.0], [1.0, 5.0, 3.0])
        );
    }
}
