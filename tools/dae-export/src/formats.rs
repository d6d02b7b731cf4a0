//! File writers for the converted formats
//!
//! Writers take any [`Write`] so they can target memory in tests; the
//! `*_file` variants go through [`write_atomically`], which only replaces the
//! destination once the whole payload has been written.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use tempfile::NamedTempFile;

use crate::animation::ConvertedAnimation;
use crate::font::FontFile;
use crate::model::{OutputModel, Vertex};
use dae_formats::{
    AnimationHeader, FontHeader, LeReader, LeWriter, ModelHeader, VertexDeclaration,
    FEATURE_ANIMATION, INVERSE_BIND_MATRIX_FLOATS, MATERIAL_FLOAT_COUNT,
};

/// Index width in bytes: 2 unless some index does not fit 16 bits.
pub fn index_size(model: &OutputModel) -> u8 {
    let wide = model
        .meshes
        .iter()
        .flat_map(|m| m.indices.iter())
        .any(|&i| i > u16::MAX as u32);
    if wide { 4 } else { 2 }
}

fn write_vertex<W: Write>(
    w: &mut LeWriter<W>,
    declaration: VertexDeclaration,
    vertex: &Vertex,
) -> Result<()> {
    if declaration.contains(VertexDeclaration::POSITION) {
        w.write_f32s(&vertex.position)?;
    }
    if declaration.contains(VertexDeclaration::NORMAL) {
        w.write_f32s(&vertex.normal)?;
    }
    if declaration.contains(VertexDeclaration::UV) {
        w.write_f32s(&vertex.uv)?;
    }
    if declaration.contains(VertexDeclaration::COLOUR) {
        w.write_f32s(&vertex.colour)?;
    }
    if declaration.contains(VertexDeclaration::WEIGHTS) {
        w.write_f32s(&vertex.weights)?;
    }
    if declaration.contains(VertexDeclaration::JOINT_INDICES) {
        for &joint in &vertex.joint_indices {
            w.write_u32(joint)?;
        }
    }
    Ok(())
}

/// Write a complete model file.
pub fn write_model<W: Write>(out: &mut W, model: &OutputModel) -> Result<()> {
    let mut w = LeWriter::new(out);
    let index_size = index_size(model);
    let features = if model.animated { FEATURE_ANIMATION } else { 0 };
    let (min, max) = model.bounds.to_arrays();
    let header = ModelHeader::new(
        features,
        model.vertex_declaration,
        index_size,
        model.meshes.len() as u32,
        min,
        max,
    );
    w.write_bytes(&header.to_bytes())?;

    for mesh in &model.meshes {
        w.write_cstr(&mesh.name)?;
        w.write_u32(mesh.vertices.len() as u32)?;
        w.write_u32(mesh.indices.len() as u32)?;
        let (min, max) = mesh.bounds.to_arrays();
        w.write_f32s(&min)?;
        w.write_f32s(&max)?;

        for vertex in &mesh.vertices {
            write_vertex(&mut w, model.vertex_declaration, vertex)?;
        }
        for &index in &mesh.indices {
            w.write_index(index, index_size)?;
        }

        let material = &mesh.material;
        w.write_f32s(&material.emissive)?;
        w.write_f32s(&material.ambient)?;
        w.write_f32s(&material.diffuse)?;
        w.write_f32s(&material.specular)?;
        w.write_f32(material.shininess)?;
        w.write_cstr(material.texture.as_deref().unwrap_or_default())?;

        let skeleton = if model.animated && mesh.is_skinned() {
            &model.skeleton.nodes[..]
        } else {
            &[]
        };
        let Ok(node_count) = u16::try_from(skeleton.len()) else {
            bail!("Skeleton of mesh '{}' has {} nodes", mesh.name, skeleton.len());
        };
        w.write_u16(node_count)?;
        for node in skeleton {
            w.write_i32(node.parent)?;
            w.write_cstr(&node.name)?;
        }
        for i in 0..skeleton.len() {
            let matrix = mesh.inverse_bind_matrices.get(i).copied().unwrap_or_default();
            w.write_f32s(&matrix.to_cols_array())?;
        }
    }
    w.flush()?;
    Ok(())
}

/// Write a complete animation file.
pub fn write_animation<W: Write>(out: &mut W, animation: &ConvertedAnimation) -> Result<()> {
    let Ok(frame_count) = u16::try_from(animation.frame_count()) else {
        bail!("Animation has {} frames", animation.frame_count());
    };
    let Ok(joint_count) = i16::try_from(animation.joint_count) else {
        bail!("Animation has {} joints", animation.joint_count);
    };

    let mut w = LeWriter::new(out);
    let header = AnimationHeader::new(frame_count, joint_count, animation.frame_rate);
    w.write_bytes(&header.to_bytes())?;
    for frame in &animation.frames {
        for transform in frame {
            w.write_bytes(&transform.to_bytes())?;
        }
    }
    w.flush()?;
    Ok(())
}

/// Write a complete font file.
pub fn write_font<W: Write>(out: &mut W, font: &FontFile) -> Result<()> {
    let Ok(image_count) = u16::try_from(font.glyphs.len()) else {
        bail!("Font has {} glyphs", font.glyphs.len());
    };

    let mut w = LeWriter::new(out);
    let header = FontHeader::new(
        image_count,
        font.atlas_width,
        font.atlas_height,
        font.line_height,
    );
    w.write_bytes(&header.to_bytes())?;
    for glyph in &font.glyphs {
        w.write_bytes(&glyph.to_bytes())?;
    }
    w.write_cstr(&font.alphabet)?;
    w.flush()?;
    Ok(())
}

/// Write `path` through a temporary file in the same directory, renamed over
/// the destination only after `write` succeeded and the data was flushed.
pub fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create output in {}", dir.display()))?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        write(&mut writer)?;
        writer
            .flush()
            .with_context(|| format!("Failed to write output: {}", path.display()))?;
    }
    temp.as_file()
        .sync_all()
        .with_context(|| format!("Failed to sync output: {}", path.display()))?;
    temp.persist(path)
        .with_context(|| format!("Failed to create output: {}", path.display()))?;
    Ok(())
}

pub fn write_model_file(path: &Path, model: &OutputModel) -> Result<()> {
    write_atomically(path, |w| write_model(w, model))
}

pub fn write_animation_file(path: &Path, animation: &ConvertedAnimation) -> Result<()> {
    write_atomically(path, |w| write_animation(w, animation))
}

pub fn write_font_file(path: &Path, font: &FontFile) -> Result<()> {
    write_atomically(path, |w| write_font(w, font))
}

// ============================================================================
// Readers
// ============================================================================

/// One mesh record as stored on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshRecord {
    pub name: String,
    pub vertex_count: u32,
    pub bounds_min: [f32; 3],
    pub bounds_max: [f32; 3],
    /// Raw vertex records, `vertex_count × declaration stride` bytes
    pub vertex_data: Vec<u8>,
    pub indices: Vec<u32>,
    /// Emissive, ambient, diffuse, specular RGBA followed by shininess
    pub material: [f32; MATERIAL_FLOAT_COUNT],
    pub texture: String,
    /// (parent, name) per skeleton node
    pub skeleton: Vec<(i32, String)>,
    pub inverse_bind_matrices: Vec<[f32; INVERSE_BIND_MATRIX_FLOATS]>,
}

/// A decoded model file.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelFile {
    pub header: ModelHeader,
    pub meshes: Vec<MeshRecord>,
}

fn truncated() -> anyhow::Error {
    anyhow::anyhow!("Unexpected end of data")
}

fn read_mesh(r: &mut LeReader<'_>, header: &ModelHeader) -> Option<MeshRecord> {
    let name = r.read_cstr()?.to_string();
    let vertex_count = r.read_u32()?;
    let index_count = r.read_u32()?;
    let bounds_min = r.read_f32s::<3>()?;
    let bounds_max = r.read_f32s::<3>()?;
    let stride = header.vertex_declaration.stride();
    let vertex_data = r.read_bytes(vertex_count as usize * stride)?.to_vec();
    let indices = (0..index_count)
        .map(|_| r.read_index(header.index_size))
        .collect::<Option<Vec<_>>>()?;
    let material = r.read_f32s::<MATERIAL_FLOAT_COUNT>()?;
    let texture = r.read_cstr()?.to_string();
    let node_count = r.read_u16()?;
    let skeleton = (0..node_count)
        .map(|_| Some((r.read_i32()?, r.read_cstr()?.to_string())))
        .collect::<Option<Vec<_>>>()?;
    let inverse_bind_matrices = (0..node_count)
        .map(|_| r.read_f32s::<INVERSE_BIND_MATRIX_FLOATS>())
        .collect::<Option<Vec<_>>>()?;
    Some(MeshRecord {
        name,
        vertex_count,
        bounds_min,
        bounds_max,
        vertex_data,
        indices,
        material,
        texture,
        skeleton,
        inverse_bind_matrices,
    })
}

/// Decode a model file.
pub fn read_model(bytes: &[u8]) -> Result<ModelFile> {
    let header = ModelHeader::from_bytes(bytes).context("Invalid model header")?;
    if !header.validate() {
        bail!("Unsupported model version {}", header.version);
    }
    let mut r = LeReader::new(&bytes[ModelHeader::SIZE..]);
    let meshes = (0..header.mesh_count)
        .map(|_| read_mesh(&mut r, &header))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(truncated)?;
    Ok(ModelFile { header, meshes })
}
