//! In-memory COLLADA document
//!
//! Libraries are keyed by element id. Scene nodes live in one flat arena
//! ([`Document::nodes`]) and reference each other by [`NodeIndex`]; the
//! id → index map is built once when parsing finishes.

use glam::Mat4;
use hashbrown::HashMap;

use super::ColladaError;
use crate::context::{ConversionContext, Warning};

/// Index of a node in [`Document::nodes`].
pub type NodeIndex = usize;

/// Strip the `#` of a local URL fragment.
pub fn fragment(url: &str) -> &str {
    url.strip_prefix('#').unwrap_or(url)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpAxis {
    XUp,
    #[default]
    YUp,
    ZUp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    pub up_axis: UpAxis,
    pub unit_meter: f32,
}

impl Default for Asset {
    fn default() -> Self {
        Self {
            up_axis: UpAxis::YUp,
            unit_meter: 1.0,
        }
    }
}

// ============================================================================
// Sources and accessors
// ============================================================================

/// Typed payload of a source array.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    Float(Vec<f32>),
    Name(Vec<String>),
}

impl ArrayData {
    pub fn len(&self) -> usize {
        match self {
            ArrayData::Float(v) => v.len(),
            ArrayData::Name(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ArrayData::Float(_) => "float",
            ArrayData::Name(_) => "name",
        }
    }
}

/// One `<param>` of an accessor. Unnamed params are skipped positions.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Option<String>,
    pub ty: String,
}

/// Stride/count view description over an array.
#[derive(Debug, Clone, PartialEq)]
pub struct Accessor {
    /// Id of the viewed array (URL fragment)
    pub source: String,
    pub count: usize,
    pub stride: usize,
    pub offset: usize,
    pub params: Vec<Param>,
}

/// A named flat array plus the accessor describing how to read it.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub id: String,
    /// Id of the contained array element, if it had one
    pub array_id: Option<String>,
    pub data: ArrayData,
    pub accessor: Option<Accessor>,
}

// ============================================================================
// Inputs
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Semantic {
    Vertex,
    Position,
    Normal,
    TexCoord,
    Color,
    Joint,
    Weight,
    InvBindMatrix,
    Input,
    Output,
    Interpolation,
    Other(String),
}

impl Semantic {
    pub fn parse(s: &str) -> Self {
        const TABLE: &[(&str, Semantic)] = &[
            ("VERTEX", Semantic::Vertex),
            ("POSITION", Semantic::Position),
            ("NORMAL", Semantic::Normal),
            ("TEXCOORD", Semantic::TexCoord),
            ("COLOR", Semantic::Color),
            ("JOINT", Semantic::Joint),
            ("WEIGHT", Semantic::Weight),
            ("INV_BIND_MATRIX", Semantic::InvBindMatrix),
            ("INPUT", Semantic::Input),
            ("OUTPUT", Semantic::Output),
            ("INTERPOLATION", Semantic::Interpolation),
        ];
        TABLE
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
            .map(|(_, semantic)| semantic.clone())
            .unwrap_or_else(|| Semantic::Other(s.to_string()))
    }
}

/// `<input>` binding of a semantic to a source.
#[derive(Debug, Clone, PartialEq)]
pub struct Input {
    pub semantic: Semantic,
    /// Source id (URL fragment)
    pub source: String,
    pub offset: usize,
    pub set: Option<u32>,
}

/// Index stride of an input list: one column per distinct offset.
pub fn input_stride(inputs: &[Input]) -> usize {
    inputs.iter().map(|i| i.offset + 1).max().unwrap_or(0)
}

pub fn find_input<'a>(inputs: &'a [Input], semantic: &Semantic) -> Option<&'a Input> {
    inputs.iter().find(|i| &i.semantic == semantic)
}

// ============================================================================
// Geometry
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Vertices {
    pub id: String,
    pub inputs: Vec<Input>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    Triangles,
    Polylist,
}

/// A `<triangles>` (or all-triangle `<polylist>`) element.
#[derive(Debug, Clone, PartialEq)]
pub struct TriangleGroup {
    pub kind: PrimitiveKind,
    /// Material symbol, bound per instance via `<instance_material>`
    pub material: Option<String>,
    /// Triangle count
    pub count: usize,
    pub inputs: Vec<Input>,
    /// Flat index buffer, `stride()` indices per corner
    pub indices: Vec<u32>,
}

impl TriangleGroup {
    pub fn stride(&self) -> usize {
        input_stride(&self.inputs)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mesh {
    pub sources: Vec<Source>,
    pub vertices: Option<Vertices>,
    pub groups: Vec<TriangleGroup>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub id: String,
    pub name: Option<String>,
    pub mesh: Option<Mesh>,
}

impl Geometry {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

// ============================================================================
// Controllers
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default)]
pub struct VertexWeights {
    pub count: usize,
    pub inputs: Vec<Input>,
    pub vcount: Vec<u32>,
    pub v: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Skin {
    /// Skinned geometry URL
    pub source: String,
    pub bind_shape_matrix: Mat4,
    pub sources: Vec<Source>,
    pub joint_inputs: Vec<Input>,
    pub weights: VertexWeights,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Controller {
    pub id: String,
    pub name: Option<String>,
    pub skin: Option<Skin>,
}

// ============================================================================
// Materials and effects
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub id: String,
    pub name: Option<String>,
    pub init_from: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub id: String,
    pub name: Option<String>,
    /// Effect URL from `<instance_effect>`
    pub effect: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NewParamValue {
    Surface { init_from: String },
    Sampler2D { source: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewParam {
    pub sid: String,
    pub value: Option<NewParamValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColorOrTexture {
    Color([f32; 4]),
    Texture {
        texture: String,
        texcoord: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadingModel {
    Blinn,
    Phong,
    Lambert,
    Constant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shading {
    pub model: ShadingModel,
    pub emission: Option<ColorOrTexture>,
    pub ambient: Option<ColorOrTexture>,
    pub diffuse: Option<ColorOrTexture>,
    pub specular: Option<ColorOrTexture>,
    pub shininess: Option<f32>,
}

impl Shading {
    pub fn new(model: ShadingModel) -> Self {
        Self {
            model,
            emission: None,
            ambient: None,
            diffuse: None,
            specular: None,
            shininess: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Effect {
    pub id: String,
    pub name: Option<String>,
    pub params: Vec<NewParam>,
    pub shading: Option<Shading>,
}

impl Effect {
    pub fn param(&self, sid: &str) -> Option<&NewParam> {
        self.params.iter().find(|p| p.sid == sid)
    }
}

// ============================================================================
// Scene graph
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Base,
    Joint,
    Geometry,
    Controller,
    Light,
    Camera,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialBinding {
    pub symbol: String,
    /// Material URL
    pub target: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instance {
    Geometry {
        url: String,
        materials: Vec<MaterialBinding>,
    },
    Controller {
        url: String,
        skeletons: Vec<String>,
        materials: Vec<MaterialBinding>,
    },
    Light {
        url: String,
    },
    Camera {
        url: String,
    },
}

impl Instance {
    pub fn kind(&self) -> NodeKind {
        match self {
            Instance::Geometry { .. } => NodeKind::Geometry,
            Instance::Controller { .. } => NodeKind::Controller,
            Instance::Light { .. } => NodeKind::Light,
            Instance::Camera { .. } => NodeKind::Camera,
        }
    }

    pub fn material_bindings(&self) -> &[MaterialBinding] {
        match self {
            Instance::Geometry { materials, .. } | Instance::Controller { materials, .. } => {
                materials
            }
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub name: Option<String>,
    pub sid: Option<String>,
    pub kind: NodeKind,
    pub parent: Option<NodeIndex>,
    pub children: Vec<NodeIndex>,
    /// Composition of the node's transform elements in document order
    pub local_transform: Mat4,
    /// sid of the `<matrix>` element, the target of baked animation channels
    pub matrix_sid: Option<String>,
    pub instances: Vec<Instance>,
}

impl Node {
    pub fn new(id: String) -> Self {
        Self {
            id,
            name: None,
            sid: None,
            kind: NodeKind::Base,
            parent: None,
            children: Vec::new(),
            local_transform: Mat4::IDENTITY,
            matrix_sid: None,
            instances: Vec::new(),
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn is_joint(&self) -> bool {
        self.kind == NodeKind::Joint
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VisualScene {
    pub id: String,
    pub name: Option<String>,
    pub roots: Vec<NodeIndex>,
}

// ============================================================================
// Animations
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Sampler {
    pub id: String,
    pub inputs: Vec<Input>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    /// Sampler URL
    pub source: String,
    /// `<node id>/<transform sid>` address
    pub target: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnimationElement {
    Source(Source),
    Sampler(Sampler),
    Channel(Channel),
}

/// One `<animation>`; nested animations are flattened into the library.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Animation {
    pub id: Option<String>,
    pub name: Option<String>,
    pub elements: Vec<AnimationElement>,
}

impl Animation {
    pub fn sources(&self) -> impl Iterator<Item = &Source> {
        self.elements.iter().filter_map(|e| match e {
            AnimationElement::Source(s) => Some(s),
            _ => None,
        })
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.elements.iter().filter_map(|e| match e {
            AnimationElement::Channel(c) => Some(c),
            _ => None,
        })
    }

    pub fn source(&self, url: &str) -> Result<&Source, ColladaError> {
        let id = fragment(url);
        self.sources()
            .find(|s| s.id == id)
            .ok_or_else(|| ColladaError::UnresolvedReference {
                kind: "source",
                id: id.to_string(),
            })
    }

    pub fn sampler(&self, url: &str) -> Result<&Sampler, ColladaError> {
        let id = fragment(url);
        self.elements
            .iter()
            .find_map(|e| match e {
                AnimationElement::Sampler(s) if s.id == id => Some(s),
                _ => None,
            })
            .ok_or_else(|| ColladaError::UnresolvedReference {
                kind: "sampler",
                id: id.to_string(),
            })
    }
}

// ============================================================================
// Document
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Document {
    pub asset: Asset,
    pub images: HashMap<String, Image>,
    pub materials: HashMap<String, Material>,
    pub effects: HashMap<String, Effect>,
    pub geometries: HashMap<String, Geometry>,
    pub controllers: HashMap<String, Controller>,
    /// In document order
    pub visual_scenes: Vec<VisualScene>,
    /// URL of the instanced visual scene
    pub scene: Option<String>,
    pub animations: Vec<Animation>,
    pub nodes: Vec<Node>,
    node_ids: HashMap<String, NodeIndex>,
}

fn lookup<'a, T>(
    map: &'a HashMap<String, T>,
    url: &str,
    kind: &'static str,
) -> Result<&'a T, ColladaError> {
    let id = fragment(url);
    map.get(id).ok_or_else(|| ColladaError::UnresolvedReference {
        kind,
        id: id.to_string(),
    })
}

impl Document {
    /// Build the node id map. Called once after parsing.
    pub fn finish(&mut self, ctx: &mut ConversionContext) {
        self.node_ids.clear();
        for (index, node) in self.nodes.iter().enumerate() {
            if self.node_ids.contains_key(&node.id) {
                ctx.warn(Warning::DuplicateNodeId(node.id.clone()));
                continue;
            }
            self.node_ids.insert(node.id.clone(), index);
        }
    }

    pub fn geometry(&self, url: &str) -> Result<&Geometry, ColladaError> {
        lookup(&self.geometries, url, "geometry")
    }

    pub fn controller(&self, url: &str) -> Result<&Controller, ColladaError> {
        lookup(&self.controllers, url, "controller")
    }

    pub fn material(&self, url: &str) -> Result<&Material, ColladaError> {
        lookup(&self.materials, url, "material")
    }

    pub fn effect(&self, url: &str) -> Result<&Effect, ColladaError> {
        lookup(&self.effects, url, "effect")
    }

    pub fn image(&self, url: &str) -> Result<&Image, ColladaError> {
        lookup(&self.images, url, "image")
    }

    pub fn node(&self, index: NodeIndex) -> &Node {
        &self.nodes[index]
    }

    pub fn node_by_id(&self, url: &str) -> Result<NodeIndex, ColladaError> {
        let id = fragment(url);
        self.node_ids
            .get(id)
            .copied()
            .ok_or_else(|| ColladaError::UnresolvedReference {
                kind: "node",
                id: id.to_string(),
            })
    }

    /// The scene to convert: the instanced visual scene, or the first one
    /// when the document has no `<scene>`.
    pub fn active_scene(&self) -> Result<&VisualScene, ColladaError> {
        match &self.scene {
            Some(url) => {
                let id = fragment(url);
                self.visual_scenes
                    .iter()
                    .find(|s| s.id == id)
                    .ok_or_else(|| ColladaError::UnresolvedReference {
                        kind: "visual scene",
                        id: id.to_string(),
                    })
            }
            None => self
                .visual_scenes
                .first()
                .ok_or_else(|| ColladaError::Invalid("document has no visual scene".to_string())),
        }
    }

    /// Product of every ancestor's local transform and the node's own.
    pub fn world_transform(&self, index: NodeIndex) -> Mat4 {
        let node = &self.nodes[index];
        match node.parent {
            Some(parent) => self.world_transform(parent) * node.local_transform,
            None => node.local_transform,
        }
    }

    /// Nodes of a scene in depth-first document order.
    pub fn scene_nodes(&self, scene: &VisualScene) -> Vec<NodeIndex> {
        let mut order = Vec::new();
        let mut stack: Vec<NodeIndex> = scene.roots.iter().rev().copied().collect();
        while let Some(index) = stack.pop() {
            order.push(index);
            stack.extend(self.nodes[index].children.iter().rev().copied());
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn chain_document() -> Document {
        let mut doc = Document::default();
        let mut a = Node::new("a".into());
        a.local_transform = Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0));
        a.children = vec![1, 2];
        let mut b = Node::new("b".into());
        b.parent = Some(0);
        b.local_transform = Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0));
        let mut c = Node::new("c".into());
        c.parent = Some(0);
        doc.nodes = vec![a, b, c];
        doc.visual_scenes.push(VisualScene {
            id: "scene".into(),
            name: None,
            roots: vec![0],
        });
        doc.finish(&mut ConversionContext::default());
        doc
    }

    #[test]
    fn test_world_transform_composes_ancestors() {
        let doc = chain_document();
        let world = doc.world_transform(1);
        assert_eq!(world.transform_point3(Vec3::ZERO), Vec3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn test_node_lookup_and_unresolved() {
        let doc = chain_document();
        assert_eq!(doc.node_by_id("#b").unwrap(), 1);
        let err = doc.node_by_id("#missing").unwrap_err();
        assert!(matches!(err, ColladaError::UnresolvedReference { kind: "node", .. }));
    }

    #[test]
    fn test_scene_nodes_depth_first() {
        let doc = chain_document();
        let scene = doc.active_scene().unwrap();
        assert_eq!(doc.scene_nodes(scene), vec![0, 1, 2]);
    }

    #[test]
    fn test_duplicate_node_id_warns() {
        let mut doc = Document::default();
        doc.nodes = vec![Node::new("x".into()), Node::new("x".into())];
        let mut ctx = ConversionContext::default();
        doc.finish(&mut ctx);
        assert_eq!(doc.node_by_id("x").unwrap(), 0);
        assert_eq!(ctx.warnings(), &[Warning::DuplicateNodeId("x".into())]);
    }

    #[test]
    fn test_input_stride_counts_offsets() {
        let input = |offset| Input {
            semantic: Semantic::Vertex,
            source: String::new(),
            offset,
            set: None,
        };
        assert_eq!(input_stride(&[input(0), input(1), input(2)]), 3);
        assert_eq!(input_stride(&[input(0), input(0)]), 1);
        assert_eq!(input_stride(&[]), 0);
    }

    #[test]
    fn test_semantic_parse_is_case_insensitive() {
        assert_eq!(Semantic::parse("texcoord"), Semantic::TexCoord);
        assert_eq!(Semantic::parse("INV_BIND_MATRIX"), Semantic::InvBindMatrix);
        assert_eq!(Semantic::parse("TANGENT"), Semantic::Other("TANGENT".into()));
    }
}
