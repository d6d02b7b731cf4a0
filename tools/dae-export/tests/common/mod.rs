//! Programmatic COLLADA generation for integration tests.
//!
//! Generates small but complete documents:
//! - A static triangle mesh with positions, normals and UVs
//! - A skinned triangle bound to a 3-joint chain (A -> B -> C)
//! - Matrix animation channels for joints A and C (B is left unanimated)

#![allow(dead_code)]

use std::path::{Path, PathBuf};

/// Joint count of the skinned fixture
pub const JOINT_COUNT: usize = 3;
/// Keyframes per animated joint
pub const FRAME_COUNT: usize = 3;
/// Key times 0, 0.5 and 1 give two frames per second
pub const FRAME_RATE: f32 = 2.0;

/// Write `xml` to `dir/name` and return the path.
pub fn write_dae(dir: &Path, name: &str, xml: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, xml).expect("Failed to write fixture");
    path
}

fn floats(values: impl IntoIterator<Item = f32>) -> String {
    values
        .into_iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Row-major text of a translation matrix.
pub fn translation(x: f32, y: f32, z: f32) -> String {
    floats([
        1.0, 0.0, 0.0, x, //
        0.0, 1.0, 0.0, y, //
        0.0, 0.0, 1.0, z, //
        0.0, 0.0, 0.0, 1.0,
    ])
}

fn float_source(id: &str, values: &[f32], stride: usize, params: &[&str], ty: &str) -> String {
    let params: String = params
        .iter()
        .map(|p| format!(r#"<param name="{p}" type="{ty}"/>"#))
        .collect();
    format!(
        r##"<source id="{id}">
          <float_array id="{id}-array" count="{len}">{data}</float_array>
          <technique_common>
            <accessor source="#{id}-array" count="{count}" stride="{stride}">{params}</accessor>
          </technique_common>
        </source>"##,
        len = values.len(),
        data = floats(values.iter().copied()),
        count = values.len() / stride,
    )
}

/// Triangle geometry with one position, normal and uv per corner.
/// `p` holds one index per corner, shared by all three inputs.
pub fn triangle_geometry(id: &str, positions: &[[f32; 3]], uvs: &[[f32; 2]], p: &[u32]) -> String {
    let pos: Vec<f32> = positions.iter().flatten().copied().collect();
    let normals: Vec<f32> = positions.iter().flat_map(|_| [0.0, 0.0, 1.0]).collect();
    let uv: Vec<f32> = uvs.iter().flatten().copied().collect();
    let indices: String = p
        .iter()
        .map(|i| format!("{i} {i} {i}"))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        r##"<geometry id="{id}" name="{id}">
      <mesh>
        {positions}
        {normals}
        {uvs}
        <vertices id="{id}-verts"><input semantic="POSITION" source="#{id}-pos"/></vertices>
        <triangles count="{count}">
          <input semantic="VERTEX" source="#{id}-verts" offset="0"/>
          <input semantic="NORMAL" source="#{id}-nrm" offset="1"/>
          <input semantic="TEXCOORD" source="#{id}-uv" offset="2" set="0"/>
          <p>{indices}</p>
        </triangles>
      </mesh>
    </geometry>"##,
        positions = float_source(&format!("{id}-pos"), &pos, 3, &["X", "Y", "Z"], "float"),
        normals = float_source(&format!("{id}-nrm"), &normals, 3, &["X", "Y", "Z"], "float"),
        uvs = float_source(&format!("{id}-uv"), &uv, 2, &["S", "T"], "float"),
        count = p.len() / 3,
    )
}

fn document(libraries: &str, scene: &str) -> String {
    format!(
        r##"<?xml version="1.0" encoding="utf-8"?>
<COLLADA xmlns="http://www.collada.org/2005/11/COLLADASchema" version="1.4.1">
  <asset><up_axis>Y_UP</up_axis></asset>
  {libraries}
  <library_visual_scenes>
    <visual_scene id="scene">{scene}</visual_scene>
  </library_visual_scenes>
  <scene><instance_visual_scene url="#scene"/></scene>
</COLLADA>"##
    )
}

pub const TRIANGLE_POSITIONS: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [2.0, 0.0, -1.0], [0.0, 3.0, 0.5]];
pub const TRIANGLE_UVS: [[f32; 2]; 3] = [[0.0, 0.0], [1.0, 0.25], [0.5, 0.75]];

/// One static triangle with three distinct corners under node "root".
pub fn triangle_dae() -> String {
    geometry_dae(&triangle_geometry("tri", &TRIANGLE_POSITIONS, &TRIANGLE_UVS, &[0, 1, 2]))
}

/// A triangle whose three corners are the same vertex.
pub fn degenerate_dae() -> String {
    geometry_dae(&triangle_geometry("tri", &TRIANGLE_POSITIONS, &TRIANGLE_UVS, &[1, 1, 1]))
}

fn geometry_dae(geometry: &str) -> String {
    document(
        &format!("<library_geometries>{geometry}</library_geometries>"),
        r##"<node id="root" name="root"><instance_geometry url="#tri"/></node>"##,
    )
}

/// Joint chain A -> B -> C, each joint one unit above its parent.
/// `b_transform` is the transform element of joint B.
fn joint_nodes(b_transform: &str) -> String {
    format!(
        r##"<node id="A" sid="A" name="A" type="JOINT">
        <matrix sid="transform">{a}</matrix>
        <node id="B" sid="B" name="B" type="JOINT">
          {b_transform}
          <node id="C" sid="C" name="C" type="JOINT">
            <matrix sid="transform">{c}</matrix>
          </node>
        </node>
      </node>"##,
        a = translation(0.0, 0.0, 0.0),
        c = translation(0.0, 1.0, 0.0),
    )
}

fn skin_controller() -> String {
    // Inverse bind matrices move each joint back to the origin
    let ibms: Vec<f32> = [0.0, -1.0, -2.0]
        .iter()
        .flat_map(|&y| {
            [
                1.0, 0.0, 0.0, 0.0, //
                0.0, 1.0, 0.0, y, //
                0.0, 0.0, 1.0, 0.0, //
                0.0, 0.0, 0.0, 1.0,
            ]
        })
        .collect();
    format!(
        r##"<library_controllers>
    <controller id="skin" name="skin">
      <skin source="#tri">
        <bind_shape_matrix>{identity}</bind_shape_matrix>
        <source id="skin-joints">
          <Name_array id="skin-joints-array" count="3">A B C</Name_array>
          <technique_common>
            <accessor source="#skin-joints-array" count="3" stride="1"><param name="JOINT" type="name"/></accessor>
          </technique_common>
        </source>
        {ibm}
        {weights}
        <joints>
          <input semantic="JOINT" source="#skin-joints"/>
          <input semantic="INV_BIND_MATRIX" source="#skin-ibm"/>
        </joints>
        <vertex_weights count="3">
          <input semantic="JOINT" source="#skin-joints" offset="0"/>
          <input semantic="WEIGHT" source="#skin-weights" offset="1"/>
          <vcount>1 2 1</vcount>
          <v>0 0 1 1 2 1 2 0</v>
        </vertex_weights>
      </skin>
    </controller>
  </library_controllers>"##,
        identity = translation(0.0, 0.0, 0.0),
        ibm = float_source("skin-ibm", &ibms, 16, &["TRANSFORM"], "float4x4"),
        weights = float_source("skin-weights", &[1.0, 0.5], 1, &["WEIGHT"], "float"),
    )
}

/// Matrix channel for `joint` with one key per entry of `keys`.
pub fn matrix_channel(joint: &str, times: &[f32], keys: &[[f32; 3]]) -> String {
    let matrices: Vec<f32> = keys
        .iter()
        .flat_map(|&[x, y, z]| {
            [
                1.0, 0.0, 0.0, x, //
                0.0, 1.0, 0.0, y, //
                0.0, 0.0, 1.0, z, //
                0.0, 0.0, 0.0, 1.0,
            ]
        })
        .collect();
    format!(
        r##"<animation id="{joint}-anim">
      {input}
      {output}
      <sampler id="{joint}-sampler">
        <input semantic="INPUT" source="#{joint}-time"/>
        <input semantic="OUTPUT" source="#{joint}-matrix"/>
      </sampler>
      <channel source="#{joint}-sampler" target="{joint}/transform"/>
    </animation>"##,
        input = float_source(&format!("{joint}-time"), times, 1, &["TIME"], "float"),
        output = float_source(&format!("{joint}-matrix"), &matrices, 16, &["TRANSFORM"], "float4x4"),
    )
}

/// Translate channel for `joint` (`<joint>/translate`, stride 3).
pub fn translate_channel(joint: &str, times: &[f32], keys: &[[f32; 3]]) -> String {
    let values: Vec<f32> = keys.iter().flatten().copied().collect();
    format!(
        r##"<animation id="{joint}-translate-anim">
      {input}
      {output}
      <sampler id="{joint}-translate-sampler">
        <input semantic="INPUT" source="#{joint}-translate-time"/>
        <input semantic="OUTPUT" source="#{joint}-translate-value"/>
      </sampler>
      <channel source="#{joint}-translate-sampler" target="{joint}/translate"/>
    </animation>"##,
        input = float_source(&format!("{joint}-translate-time"), times, 1, &["TIME"], "float"),
        output = float_source(&format!("{joint}-translate-value"), &values, 3, &["X", "Y", "Z"], "float"),
    )
}

/// Default channels: A slides along X, C rises along Z.
pub fn default_channels() -> String {
    let times = [0.0, 0.5, 1.0];
    matrix_channel("A", &times, &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]])
        + &matrix_channel("C", &times, &[[0.0, 1.0, 0.0], [0.0, 1.0, 1.0], [0.0, 1.0, 2.0]])
}

/// Skinned triangle on the A/B/C chain, animated by `channels`.
pub fn skinned_dae_with(channels: &str) -> String {
    let b_matrix = format!(
        r#"<matrix sid="transform">{}</matrix>"#,
        translation(0.0, 1.0, 0.0)
    );
    skinned_dae_with_b(&b_matrix, channels)
}

/// As [`skinned_dae_with`], with `b_transform` as joint B's transform element.
pub fn skinned_dae_with_b(b_transform: &str, channels: &str) -> String {
    let positions = [[0.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 2.0, 0.5]];
    let uvs = [[0.0, 0.0], [1.0, 0.5], [0.25, 1.0]];
    let libraries = format!(
        "<library_geometries>{}</library_geometries>{}<library_animations>{}</library_animations>",
        triangle_geometry("tri", &positions, &uvs, &[0, 1, 2]),
        skin_controller(),
        channels,
    );
    let scene = format!(
        r##"{joints}
      <node id="body" name="body">
        <instance_controller url="#skin"><skeleton>#A</skeleton></instance_controller>
      </node>"##,
        joints = joint_nodes(b_transform),
    );
    document(&libraries, &scene)
}

pub fn skinned_dae() -> String {
    skinned_dae_with(&default_channels())
}
