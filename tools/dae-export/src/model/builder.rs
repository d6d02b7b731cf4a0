//! Scene walk and vertex assembly

use glam::{Mat3, Mat4, Vec3};
use hashbrown::HashMap;

use super::material::OutputMaterial;
use super::skeleton::Skeleton;
use super::skin::{bind_skin, SkinBinding};
use super::vertex::{Vertex, VertexWelder};
use super::{Bounds, OutputMesh};
use crate::collada::{
    find_input, find_source, fragment, ColladaError, Document, Geometry, Input, Instance,
    MaterialBinding, Mesh, NodeIndex, Semantic, SourceView, TriangleGroup,
};
use crate::context::{ConversionContext, Warning};
use dae_formats::VertexDeclaration;

/// A mesh under construction.
struct PendingMesh {
    name: String,
    welder: VertexWelder,
    indices: Vec<u32>,
    material: OutputMaterial,
    bounds: Bounds,
    inverse_bind_matrices: Vec<Mat4>,
}

/// One resolved vertex stream of a triangle group.
struct Stream<'a> {
    view: SourceView<'a>,
    /// Column of the group's index buffer
    offset: usize,
}

impl<'a> Stream<'a> {
    fn resolve(
        mesh: &'a Mesh,
        input: &Input,
        offset: usize,
        semantic: &'static str,
        min_stride: usize,
    ) -> Result<Self, ColladaError> {
        let view = SourceView::new(find_source(&mesh.sources, &input.source)?, &mesh.sources)?;
        if view.stride() < min_stride {
            return Err(ColladaError::BadStride {
                semantic,
                source_id: view.id().to_string(),
                stride: view.stride(),
                min: min_stride,
            });
        }
        Ok(Self { view, offset })
    }

    fn index(&self, corner: &[u32]) -> usize {
        corner[self.offset] as usize
    }
}

/// Streams of one triangle group.
struct Streams<'a> {
    position: Stream<'a>,
    normal: Option<Stream<'a>>,
    uv: Option<Stream<'a>>,
    colour: Option<Stream<'a>>,
}

/// Lowest-set TEXCOORD input.
fn texcoord_input(inputs: &[Input]) -> Option<&Input> {
    inputs
        .iter()
        .filter(|i| i.semantic == Semantic::TexCoord)
        .min_by_key(|i| i.set.unwrap_or(0))
}

impl<'a> Streams<'a> {
    fn resolve(geometry: &Geometry, mesh: &'a Mesh, group: &TriangleGroup) -> Result<Self, ColladaError> {
        // Inputs of <vertices> share the VERTEX column
        let (vertex_inputs, vertex_offset): (&[Input], usize) =
            match find_input(&group.inputs, &Semantic::Vertex) {
                Some(vertex) => {
                    let vertices = mesh
                        .vertices
                        .as_ref()
                        .filter(|v| v.id == fragment(&vertex.source))
                        .ok_or_else(|| ColladaError::UnresolvedReference {
                            kind: "vertices",
                            id: fragment(&vertex.source).to_string(),
                        })?;
                    (vertices.inputs.as_slice(), vertex.offset)
                }
                None => (&[] as &[Input], 0),
            };

        let pick = |semantic: &Semantic| {
            find_input(&group.inputs, semantic)
                .map(|i| (i, i.offset))
                .or_else(|| find_input(vertex_inputs, semantic).map(|i| (i, vertex_offset)))
        };

        let (position, offset) = pick(&Semantic::Position).ok_or_else(|| ColladaError::MissingInput {
            owner: "geometry",
            id: geometry.id.clone(),
            semantic: "POSITION",
        })?;
        let position = Stream::resolve(mesh, position, offset, "POSITION", 3)?;

        let normal = pick(&Semantic::Normal)
            .map(|(input, offset)| Stream::resolve(mesh, input, offset, "NORMAL", 3))
            .transpose()?;
        let uv = texcoord_input(&group.inputs)
            .map(|i| (i, i.offset))
            .or_else(|| texcoord_input(vertex_inputs).map(|i| (i, vertex_offset)))
            .map(|(input, offset)| Stream::resolve(mesh, input, offset, "TEXCOORD", 2))
            .transpose()?;
        let colour = pick(&Semantic::Color)
            .map(|(input, offset)| Stream::resolve(mesh, input, offset, "COLOR", 3))
            .transpose()?;

        Ok(Self {
            position,
            normal,
            uv,
            colour,
        })
    }
}

/// Builds the output meshes of one scene.
pub(crate) struct ModelBuilder<'d, 'c> {
    doc: &'d Document,
    skeleton: &'d Skeleton,
    ctx: &'c mut ConversionContext,
    meshes: Vec<PendingMesh>,
    by_name: HashMap<String, usize>,
    pub bounds: Bounds,
}

impl<'d, 'c> ModelBuilder<'d, 'c> {
    pub fn new(doc: &'d Document, skeleton: &'d Skeleton, ctx: &'c mut ConversionContext) -> Self {
        Self {
            doc,
            skeleton,
            ctx,
            meshes: Vec::new(),
            by_name: HashMap::new(),
            bounds: Bounds::EMPTY,
        }
    }

    /// Visit a scene root and its subtree.
    pub fn visit_root(&mut self, root: NodeIndex) -> anyhow::Result<()> {
        // (node, parent world, parent exported)
        let doc = self.doc;
        let mut stack = vec![(root, Mat4::IDENTITY, false)];
        while let Some((index, parent_world, parent_exported)) = stack.pop() {
            let node = doc.node(index);
            let world = parent_world * node.local_transform;
            let exported = parent_exported
                || self.ctx.options.roots.is_empty()
                || self.ctx.options.is_root(&node.id);

            if exported {
                for instance in &node.instances {
                    self.add_instance(instance, world).map_err(|e| {
                        anyhow::Error::new(e)
                            .context(format!("Failed to convert node '{}'", node.id))
                    })?;
                }
            }
            for &child in node.children.iter().rev() {
                stack.push((child, world, exported));
            }
        }
        Ok(())
    }

    fn add_instance(&mut self, instance: &Instance, world: Mat4) -> Result<(), ColladaError> {
        let doc = self.doc;
        match instance {
            Instance::Geometry { url, materials } => {
                let geometry = doc.geometry(url)?;
                self.add_geometry(geometry, world, None, materials)
            }
            Instance::Controller { url, materials, .. } => {
                let controller = doc.controller(url)?;
                let skin = controller.skin.as_ref().ok_or_else(|| {
                    ColladaError::Invalid(format!("controller '{}' has no skin", controller.id))
                })?;
                let geometry = doc.geometry(&skin.source)?;
                let binding = if self.ctx.options.animated {
                    bind_skin(&controller.id, skin, self.skeleton, self.ctx)?
                } else {
                    SkinBinding {
                        bind_shape_matrix: skin.bind_shape_matrix,
                        influences: Vec::new(),
                        inverse_bind_matrices: Vec::new(),
                    }
                };
                self.add_geometry(geometry, world, Some(&binding), materials)
            }
            Instance::Light { .. } | Instance::Camera { .. } => Ok(()),
        }
    }

    fn add_geometry(
        &mut self,
        geometry: &Geometry,
        world: Mat4,
        skin: Option<&SkinBinding>,
        bindings: &[MaterialBinding],
    ) -> Result<(), ColladaError> {
        let Some(mesh) = &geometry.mesh else {
            tracing::debug!("Geometry '{}' has no mesh, skipped", geometry.id);
            return Ok(());
        };
        let multiple = mesh.groups.len() > 1;

        for group in &mesh.groups {
            if multiple && group.material.is_none() {
                return Err(ColladaError::Invalid(format!(
                    "geometry '{}' has several triangle groups and one has no material",
                    geometry.id
                )));
            }
            let target = group
                .material
                .as_deref()
                .and_then(|symbol| bindings.iter().find(|b| b.symbol == symbol))
                .map(|b| b.target.as_str());

            let name = match (self.ctx.options.combine_meshes, target) {
                (true, Some(target)) => fragment(target).to_string(),
                _ if multiple => format!(
                    "{}-{}",
                    geometry.display_name(),
                    group.material.as_deref().unwrap_or_default()
                ),
                _ => geometry.display_name().to_string(),
            };
            let material = match target {
                Some(target) => OutputMaterial::resolve(self.doc, target)?,
                None => OutputMaterial::default(),
            };

            let slot = self.mesh_slot(name, material);
            self.add_group(slot, geometry, mesh, group, world, skin)?;
        }
        Ok(())
    }

    fn mesh_slot(&mut self, name: String, material: OutputMaterial) -> usize {
        if let Some(&slot) = self.by_name.get(&name) {
            return slot;
        }
        let slot = self.meshes.len();
        self.by_name.insert(name.clone(), slot);
        self.meshes.push(PendingMesh {
            name,
            welder: VertexWelder::new(),
            indices: Vec::new(),
            material,
            bounds: Bounds::EMPTY,
            inverse_bind_matrices: Vec::new(),
        });
        slot
    }

    fn add_group(
        &mut self,
        slot: usize,
        geometry: &Geometry,
        mesh: &Mesh,
        group: &TriangleGroup,
        world: Mat4,
        skin: Option<&SkinBinding>,
    ) -> Result<(), ColladaError> {
        let streams = Streams::resolve(geometry, mesh, group)?;
        let declaration = self.ctx.options.vertex_declaration;
        let skinning = self.ctx.options.animated && skin.is_some_and(|s| !s.influences.is_empty());

        let mesh_name = self.meshes[slot].name.clone();
        let wants = |element| declaration.contains(element);
        let checks = [
            (VertexDeclaration::NORMAL, streams.normal.is_some(), "normal"),
            (VertexDeclaration::UV, streams.uv.is_some(), "texcoord"),
            (VertexDeclaration::COLOUR, streams.colour.is_some(), "colour"),
            (VertexDeclaration::WEIGHTS, skinning, "weights"),
            (VertexDeclaration::JOINT_INDICES, skinning, "joint indices"),
        ];
        for (element, present, label) in checks {
            if wants(element) && !present {
                self.ctx.warn(Warning::MissingVertexElement {
                    mesh: mesh_name.clone(),
                    element: label,
                });
            }
        }

        let normals = streams.normal.as_ref().filter(|_| wants(VertexDeclaration::NORMAL));
        let uvs = streams.uv.as_ref().filter(|_| wants(VertexDeclaration::UV));
        let colours = streams.colour.as_ref().filter(|_| wants(VertexDeclaration::COLOUR));
        let influences = skin.filter(|_| skinning);

        let bind_shape = skin.map(|s| s.bind_shape_matrix).unwrap_or(Mat4::IDENTITY);
        let position_matrix = world * bind_shape;
        let normal_matrix = Mat3::from_mat4(position_matrix);

        let stride = group.stride();
        let target = &mut self.meshes[slot];
        for corner in group.indices.chunks_exact(stride) {
            let mut vertex = Vertex::default();

            let position_index = streams.position.index(corner);
            let p = streams.position.view.floats(position_index)?;
            let position = position_matrix.transform_point3(Vec3::new(p[0], p[1], p[2]));
            vertex.position = position.to_array();

            if let Some(stream) = normals {
                let n = stream.view.floats(stream.index(corner))?;
                vertex.normal = (normal_matrix * Vec3::new(n[0], n[1], n[2]))
                    .normalize_or_zero()
                    .to_array();
            }
            if let Some(stream) = uvs {
                let t = stream.view.floats(stream.index(corner))?;
                vertex.uv = [t[0], t[1]];
            }
            if let Some(stream) = colours {
                let c = stream.view.floats(stream.index(corner))?;
                vertex.colour = [c[0], c[1], c[2], c.get(3).copied().unwrap_or(1.0)];
            }
            if let Some(skin) = influences {
                let (weights, joints) = skin.slots(position_index)?;
                if wants(VertexDeclaration::WEIGHTS) {
                    vertex.weights = weights;
                }
                if wants(VertexDeclaration::JOINT_INDICES) {
                    vertex.joint_indices = joints;
                }
            }

            target.bounds.include(position);
            self.bounds.include(position);
            let index = target.welder.insert(vertex);
            target.indices.push(index);
        }

        if let Some(skin) = influences {
            target.inverse_bind_matrices = skin.inverse_bind_matrices.clone();
        }
        Ok(())
    }

    pub fn finish(self) -> Vec<OutputMesh> {
        self.meshes
            .into_iter()
            .map(|m| OutputMesh {
                name: m.name,
                vertices: m.welder.into_vertices(),
                indices: m.indices,
                material: m.material,
                bounds: m.bounds,
                inverse_bind_matrices: m.inverse_bind_matrices,
            })
            .collect()
    }
}
