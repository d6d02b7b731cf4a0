//! Event-driven COLLADA reader
//!
//! Elements are recognised through [`ELEMENT_TABLE`] (case-insensitive) and
//! tracked on a stack of [`Frame`]s, one per open recognised element. A frame
//! owns the value being built; when its element closes the value is attached
//! to the nearest frame that can hold it. Unrecognised elements, and
//! recognised ones in a place they carry no meaning, are skipped together
//! with their whole subtree. Data-bearing elements outside their required
//! parent are fatal.

use std::io::Read;

use glam::{Mat4, Vec3};
use xml::attribute::OwnedAttribute;
use xml::reader::{ParserConfig, XmlEvent};

use super::accessor::row_major_matrix;
use super::document::*;
use super::ColladaError;
use crate::context::ConversionContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Element {
    Collada,
    Asset,
    UpAxis,
    Unit,
    LibraryImages,
    Image,
    InitFrom,
    LibraryMaterials,
    Material,
    InstanceEffect,
    LibraryEffects,
    Effect,
    ProfileCommon,
    NewParam,
    Surface,
    Sampler2D,
    Technique,
    Blinn,
    Phong,
    Lambert,
    Constant,
    Emission,
    Ambient,
    Diffuse,
    Specular,
    Shininess,
    Color,
    Float,
    Texture,
    LibraryGeometries,
    Geometry,
    Mesh,
    Source,
    FloatArray,
    NameArray,
    IdrefArray,
    TechniqueCommon,
    Accessor,
    Param,
    Vertices,
    Triangles,
    Polylist,
    Input,
    P,
    VCount,
    V,
    LibraryControllers,
    Controller,
    Skin,
    BindShapeMatrix,
    Joints,
    VertexWeights,
    LibraryVisualScenes,
    VisualScene,
    Node,
    Matrix,
    Translate,
    Rotate,
    Scale,
    InstanceGeometry,
    InstanceController,
    InstanceLight,
    InstanceCamera,
    Skeleton,
    BindMaterial,
    InstanceMaterial,
    LibraryAnimations,
    Animation,
    Sampler,
    Channel,
    Scene,
    InstanceVisualScene,
}

static ELEMENT_TABLE: &[(&str, Element)] = &[
    ("COLLADA", Element::Collada),
    ("asset", Element::Asset),
    ("up_axis", Element::UpAxis),
    ("unit", Element::Unit),
    ("library_images", Element::LibraryImages),
    ("image", Element::Image),
    ("init_from", Element::InitFrom),
    ("library_materials", Element::LibraryMaterials),
    ("material", Element::Material),
    ("instance_effect", Element::InstanceEffect),
    ("library_effects", Element::LibraryEffects),
    ("effect", Element::Effect),
    ("profile_COMMON", Element::ProfileCommon),
    ("newparam", Element::NewParam),
    ("surface", Element::Surface),
    ("sampler2D", Element::Sampler2D),
    ("technique", Element::Technique),
    ("blinn", Element::Blinn),
    ("phong", Element::Phong),
    ("lambert", Element::Lambert),
    ("constant", Element::Constant),
    ("emission", Element::Emission),
    ("ambient", Element::Ambient),
    ("diffuse", Element::Diffuse),
    ("specular", Element::Specular),
    ("shininess", Element::Shininess),
    ("color", Element::Color),
    ("float", Element::Float),
    ("texture", Element::Texture),
    ("library_geometries", Element::LibraryGeometries),
    ("geometry", Element::Geometry),
    ("mesh", Element::Mesh),
    ("source", Element::Source),
    ("float_array", Element::FloatArray),
    ("Name_array", Element::NameArray),
    ("IDREF_array", Element::IdrefArray),
    ("technique_common", Element::TechniqueCommon),
    ("accessor", Element::Accessor),
    ("param", Element::Param),
    ("vertices", Element::Vertices),
    ("triangles", Element::Triangles),
    ("polylist", Element::Polylist),
    ("input", Element::Input),
    ("p", Element::P),
    ("vcount", Element::VCount),
    ("v", Element::V),
    ("library_controllers", Element::LibraryControllers),
    ("controller", Element::Controller),
    ("skin", Element::Skin),
    ("bind_shape_matrix", Element::BindShapeMatrix),
    ("joints", Element::Joints),
    ("vertex_weights", Element::VertexWeights),
    ("library_visual_scenes", Element::LibraryVisualScenes),
    ("visual_scene", Element::VisualScene),
    ("node", Element::Node),
    ("matrix", Element::Matrix),
    ("translate", Element::Translate),
    ("rotate", Element::Rotate),
    ("scale", Element::Scale),
    ("instance_geometry", Element::InstanceGeometry),
    ("instance_controller", Element::InstanceController),
    ("instance_light", Element::InstanceLight),
    ("instance_camera", Element::InstanceCamera),
    ("skeleton", Element::Skeleton),
    ("bind_material", Element::BindMaterial),
    ("instance_material", Element::InstanceMaterial),
    ("library_animations", Element::LibraryAnimations),
    ("animation", Element::Animation),
    ("sampler", Element::Sampler),
    ("channel", Element::Channel),
    ("scene", Element::Scene),
    ("instance_visual_scene", Element::InstanceVisualScene),
];

impl Element {
    fn lookup(name: &str) -> Option<Element> {
        ELEMENT_TABLE
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|&(_, e)| e)
    }

    fn name(self) -> &'static str {
        ELEMENT_TABLE
            .iter()
            .find(|&&(_, e)| e == self)
            .map(|&(n, _)| n)
            .unwrap_or("?")
    }
}

/// Text content being collected for a leaf element.
#[derive(Debug)]
struct TextFrame {
    element: Element,
    id: Option<String>,
    sid: Option<String>,
    count: Option<usize>,
    text: String,
}

#[derive(Debug)]
struct TrianglesFrame {
    group: TriangleGroup,
    vcount: Option<Vec<u32>>,
}

#[derive(Debug)]
enum Frame {
    Pass(Element),
    Text(TextFrame),
    Image(Image),
    Material(Material),
    Effect(Effect),
    NewParam(NewParam),
    Shading(Shading),
    Slot(Element, Option<ColorOrTexture>),
    Geometry(Geometry),
    Mesh(Mesh),
    Source(Source),
    Accessor(Accessor),
    Vertices(Vertices),
    Triangles(TrianglesFrame),
    Controller(Controller),
    Skin(Skin),
    Joints(Vec<Input>),
    VertexWeights(VertexWeights),
    VisualScene(VisualScene),
    Node(NodeIndex),
    Instance(Instance),
    Animation(Animation),
    Sampler(Sampler),
}

/// Innermost open frame of the given variant.
macro_rules! nearest {
    ($frames:expr, $variant:ident) => {
        $frames.iter_mut().rev().find_map(|frame| match frame {
            Frame::$variant(inner) => Some(inner),
            _ => None,
        })
    };
}

fn attr<'a>(attributes: &'a [OwnedAttribute], name: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|a| a.name.local_name.eq_ignore_ascii_case(name))
        .map(|a| a.value.as_str())
}

fn owned_attr(attributes: &[OwnedAttribute], name: &str) -> Option<String> {
    attr(attributes, name).map(str::to_string)
}

fn parse_number<T: std::str::FromStr>(element: Element, token: &str) -> Result<T, ColladaError> {
    token.trim().parse().map_err(|_| ColladaError::BadNumber {
        element: element.name(),
        token: token.to_string(),
    })
}

fn number_attr<T: std::str::FromStr>(
    element: Element,
    attributes: &[OwnedAttribute],
    name: &str,
) -> Result<Option<T>, ColladaError> {
    attr(attributes, name)
        .map(|value| parse_number(element, value))
        .transpose()
}

fn parse_list<T: std::str::FromStr>(element: Element, text: &str) -> Result<Vec<T>, ColladaError> {
    text.split_whitespace()
        .map(|token| parse_number(element, token))
        .collect()
}

fn parse_input(element: Element, attributes: &[OwnedAttribute]) -> Result<Input, ColladaError> {
    Ok(Input {
        semantic: Semantic::parse(attr(attributes, "semantic").unwrap_or_default()),
        source: owned_attr(attributes, "source").unwrap_or_default(),
        offset: number_attr(element, attributes, "offset")?.unwrap_or(0),
        set: number_attr(element, attributes, "set")?,
    })
}

struct Parser<'c> {
    doc: Document,
    frames: Vec<Frame>,
    /// Depth inside a skipped subtree
    skip_depth: usize,
    ctx: &'c mut ConversionContext,
}

impl<'c> Parser<'c> {
    fn new(ctx: &'c mut ConversionContext) -> Self {
        Self {
            doc: Document::default(),
            frames: Vec::new(),
            skip_depth: 0,
            ctx,
        }
    }

    fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    fn top_is(&self, element: Element) -> bool {
        matches!(self.top(), Some(Frame::Pass(e)) if *e == element)
    }

    fn text_frame(element: Element, attributes: &[OwnedAttribute]) -> Result<Frame, ColladaError> {
        Ok(Frame::Text(TextFrame {
            element,
            id: owned_attr(attributes, "id"),
            sid: owned_attr(attributes, "sid"),
            count: number_attr(element, attributes, "count")?,
            text: String::new(),
        }))
    }

    fn unexpected(element: Element, expected: &'static str) -> ColladaError {
        ColladaError::UnexpectedElement {
            element: element.name(),
            expected,
        }
    }

    fn start(&mut self, name: &str, attributes: &[OwnedAttribute]) -> Result<(), ColladaError> {
        if self.skip_depth > 0 {
            self.skip_depth += 1;
            return Ok(());
        }
        let Some(element) = Element::lookup(name) else {
            tracing::trace!("skipping <{}>", name);
            self.skip_depth = 1;
            return Ok(());
        };
        match self.open(element, attributes)? {
            Some(frame) => self.frames.push(frame),
            None => {
                tracing::trace!("skipping misplaced <{}>", name);
                self.skip_depth = 1;
            }
        }
        Ok(())
    }

    /// Frame for a newly opened element, or `None` to skip its subtree.
    fn open(
        &mut self,
        element: Element,
        attributes: &[OwnedAttribute],
    ) -> Result<Option<Frame>, ColladaError> {
        use Element as E;

        let frame = match element {
            E::Collada
            | E::Asset
            | E::LibraryImages
            | E::LibraryMaterials
            | E::LibraryEffects
            | E::LibraryGeometries
            | E::LibraryControllers
            | E::LibraryVisualScenes
            | E::LibraryAnimations
            | E::Scene
            | E::TechniqueCommon
            | E::ProfileCommon
            | E::Shininess => Frame::Pass(element),

            E::UpAxis => Self::text_frame(element, attributes)?,
            E::Unit => {
                if self.top_is(E::Asset) {
                    if let Some(meter) = number_attr(element, attributes, "meter")? {
                        self.doc.asset.unit_meter = meter;
                    }
                }
                Frame::Pass(element)
            }

            E::Image => Frame::Image(Image {
                id: owned_attr(attributes, "id").unwrap_or_default(),
                name: owned_attr(attributes, "name"),
                init_from: String::new(),
            }),
            E::InitFrom => match self.top() {
                Some(Frame::Image(_)) | Some(Frame::Pass(E::Surface)) => {
                    Self::text_frame(element, attributes)?
                }
                _ => return Err(Self::unexpected(element, "image")),
            },

            E::Material => Frame::Material(Material {
                id: owned_attr(attributes, "id").unwrap_or_default(),
                name: owned_attr(attributes, "name"),
                effect: String::new(),
            }),
            E::InstanceEffect => {
                if let Some(Frame::Material(material)) = self.frames.last_mut() {
                    material.effect = owned_attr(attributes, "url").unwrap_or_default();
                }
                Frame::Pass(element)
            }

            E::Effect => Frame::Effect(Effect {
                id: owned_attr(attributes, "id").unwrap_or_default(),
                name: owned_attr(attributes, "name"),
                params: Vec::new(),
                shading: None,
            }),
            E::NewParam => Frame::NewParam(NewParam {
                sid: owned_attr(attributes, "sid").unwrap_or_default(),
                value: None,
            }),
            E::Surface | E::Sampler2D => match self.top() {
                Some(Frame::NewParam(_)) => Frame::Pass(element),
                _ => return Ok(None),
            },
            E::Technique => {
                if !self.top_is(E::ProfileCommon) {
                    return Ok(None);
                }
                Frame::Pass(element)
            }
            E::Blinn | E::Phong | E::Lambert | E::Constant => {
                if !self.top_is(E::Technique) {
                    return Ok(None);
                }
                let model = match element {
                    E::Blinn => ShadingModel::Blinn,
                    E::Phong => ShadingModel::Phong,
                    E::Lambert => ShadingModel::Lambert,
                    _ => ShadingModel::Constant,
                };
                Frame::Shading(Shading::new(model))
            }
            E::Emission | E::Ambient | E::Diffuse | E::Specular => match self.top() {
                Some(Frame::Shading(_)) => Frame::Slot(element, None),
                _ => return Ok(None),
            },
            E::Color => match self.top() {
                Some(Frame::Slot(..)) => Self::text_frame(element, attributes)?,
                _ => return Ok(None),
            },
            E::Float => {
                if !self.top_is(E::Shininess) {
                    return Ok(None);
                }
                Self::text_frame(element, attributes)?
            }
            E::Texture => match self.frames.last_mut() {
                Some(Frame::Slot(_, value)) => {
                    *value = Some(ColorOrTexture::Texture {
                        texture: owned_attr(attributes, "texture").unwrap_or_default(),
                        texcoord: owned_attr(attributes, "texcoord"),
                    });
                    Frame::Pass(element)
                }
                _ => return Ok(None),
            },

            E::Geometry => Frame::Geometry(Geometry {
                id: owned_attr(attributes, "id").unwrap_or_default(),
                name: owned_attr(attributes, "name"),
                mesh: None,
            }),
            E::Mesh => match self.top() {
                Some(Frame::Geometry(_)) => Frame::Mesh(Mesh::default()),
                _ => return Ok(None),
            },
            E::Source => match self.top() {
                Some(Frame::Pass(E::Sampler2D)) => Self::text_frame(element, attributes)?,
                Some(Frame::Mesh(_)) | Some(Frame::Skin(_)) | Some(Frame::Animation(_)) => {
                    Frame::Source(Source {
                        id: owned_attr(attributes, "id").unwrap_or_default(),
                        array_id: None,
                        data: ArrayData::Float(Vec::new()),
                        accessor: None,
                    })
                }
                _ => return Ok(None),
            },
            E::FloatArray | E::NameArray | E::IdrefArray => match self.top() {
                Some(Frame::Source(_)) => Self::text_frame(element, attributes)?,
                _ => return Err(Self::unexpected(element, "source")),
            },
            E::Accessor => {
                let under_source = self.top_is(E::TechniqueCommon)
                    && matches!(
                        self.frames.iter().rev().nth(1),
                        Some(Frame::Source(_))
                    );
                if !under_source {
                    return Err(Self::unexpected(element, "source"));
                }
                Frame::Accessor(Accessor {
                    source: owned_attr(attributes, "source").unwrap_or_default(),
                    count: number_attr(element, attributes, "count")?.unwrap_or(0),
                    stride: number_attr(element, attributes, "stride")?.unwrap_or(1),
                    offset: number_attr(element, attributes, "offset")?.unwrap_or(0),
                    params: Vec::new(),
                })
            }
            E::Param => match self.frames.last_mut() {
                Some(Frame::Accessor(accessor)) => {
                    accessor.params.push(Param {
                        name: owned_attr(attributes, "name"),
                        ty: owned_attr(attributes, "type").unwrap_or_default(),
                    });
                    Frame::Pass(element)
                }
                _ => return Ok(None),
            },
            E::Vertices => match self.top() {
                Some(Frame::Mesh(_)) => Frame::Vertices(Vertices {
                    id: owned_attr(attributes, "id").unwrap_or_default(),
                    inputs: Vec::new(),
                }),
                _ => return Ok(None),
            },
            E::Triangles | E::Polylist => match self.top() {
                Some(Frame::Mesh(_)) => Frame::Triangles(TrianglesFrame {
                    group: TriangleGroup {
                        kind: if element == E::Polylist {
                            PrimitiveKind::Polylist
                        } else {
                            PrimitiveKind::Triangles
                        },
                        material: owned_attr(attributes, "material"),
                        count: number_attr(element, attributes, "count")?.unwrap_or(0),
                        inputs: Vec::new(),
                        indices: Vec::new(),
                    },
                    vcount: None,
                }),
                _ => return Ok(None),
            },
            E::Input => {
                let input = parse_input(element, attributes)?;
                match self.frames.last_mut() {
                    Some(Frame::Vertices(v)) => v.inputs.push(input),
                    Some(Frame::Triangles(t)) => t.group.inputs.push(input),
                    Some(Frame::Joints(inputs)) => inputs.push(input),
                    Some(Frame::VertexWeights(w)) => w.inputs.push(input),
                    Some(Frame::Sampler(s)) => s.inputs.push(input),
                    _ => {
                        return Err(Self::unexpected(
                            element,
                            "vertices, triangles, polylist, joints, vertex_weights or sampler",
                        ));
                    }
                }
                Frame::Pass(element)
            }
            E::P => match self.top() {
                Some(Frame::Triangles(_)) => Self::text_frame(element, attributes)?,
                _ => return Err(Self::unexpected(element, "triangles or polylist")),
            },
            E::VCount => match self.top() {
                Some(Frame::Triangles(_)) | Some(Frame::VertexWeights(_)) => {
                    Self::text_frame(element, attributes)?
                }
                _ => return Err(Self::unexpected(element, "polylist or vertex_weights")),
            },
            E::V => match self.top() {
                Some(Frame::VertexWeights(_)) => Self::text_frame(element, attributes)?,
                _ => return Err(Self::unexpected(element, "vertex_weights")),
            },

            E::Controller => Frame::Controller(Controller {
                id: owned_attr(attributes, "id").unwrap_or_default(),
                name: owned_attr(attributes, "name"),
                skin: None,
            }),
            E::Skin => match self.top() {
                Some(Frame::Controller(_)) => Frame::Skin(Skin {
                    source: owned_attr(attributes, "source").unwrap_or_default(),
                    bind_shape_matrix: Mat4::IDENTITY,
                    sources: Vec::new(),
                    joint_inputs: Vec::new(),
                    weights: VertexWeights::default(),
                }),
                _ => return Ok(None),
            },
            E::BindShapeMatrix => match self.top() {
                Some(Frame::Skin(_)) => Self::text_frame(element, attributes)?,
                _ => return Err(Self::unexpected(element, "skin")),
            },
            E::Joints => match self.top() {
                Some(Frame::Skin(_)) => Frame::Joints(Vec::new()),
                _ => return Ok(None),
            },
            E::VertexWeights => match self.top() {
                Some(Frame::Skin(_)) => Frame::VertexWeights(VertexWeights {
                    count: number_attr(element, attributes, "count")?.unwrap_or(0),
                    ..Default::default()
                }),
                _ => return Ok(None),
            },

            E::VisualScene => Frame::VisualScene(VisualScene {
                id: owned_attr(attributes, "id").unwrap_or_default(),
                name: owned_attr(attributes, "name"),
                roots: Vec::new(),
            }),
            E::Node => return self.open_node(attributes),
            E::Matrix => match self.top() {
                Some(Frame::Node(_)) => Self::text_frame(element, attributes)?,
                _ => return Err(Self::unexpected(element, "node")),
            },
            E::Translate | E::Rotate | E::Scale => match self.top() {
                Some(Frame::Node(_)) => Self::text_frame(element, attributes)?,
                _ => return Ok(None),
            },
            E::InstanceGeometry | E::InstanceController | E::InstanceLight | E::InstanceCamera => {
                if !matches!(self.top(), Some(Frame::Node(_))) {
                    return Ok(None);
                }
                let url = owned_attr(attributes, "url").unwrap_or_default();
                Frame::Instance(match element {
                    E::InstanceGeometry => Instance::Geometry {
                        url,
                        materials: Vec::new(),
                    },
                    E::InstanceController => Instance::Controller {
                        url,
                        skeletons: Vec::new(),
                        materials: Vec::new(),
                    },
                    E::InstanceLight => Instance::Light { url },
                    _ => Instance::Camera { url },
                })
            }
            E::Skeleton => match self.top() {
                Some(Frame::Instance(Instance::Controller { .. })) => {
                    Self::text_frame(element, attributes)?
                }
                _ => return Ok(None),
            },
            E::BindMaterial => match self.top() {
                Some(Frame::Instance(_)) => Frame::Pass(element),
                _ => return Ok(None),
            },
            E::InstanceMaterial => {
                let under_bind_material = self.top_is(E::TechniqueCommon)
                    && matches!(
                        self.frames.iter().rev().nth(1),
                        Some(Frame::Pass(E::BindMaterial))
                    );
                if !under_bind_material {
                    return Err(Self::unexpected(element, "bind_material"));
                }
                let binding = MaterialBinding {
                    symbol: owned_attr(attributes, "symbol").unwrap_or_default(),
                    target: owned_attr(attributes, "target").unwrap_or_default(),
                };
                match nearest!(self.frames, Instance) {
                    Some(Instance::Geometry { materials, .. })
                    | Some(Instance::Controller { materials, .. }) => materials.push(binding),
                    _ => {}
                }
                Frame::Pass(element)
            }

            E::Animation => match self.top() {
                Some(Frame::Pass(E::LibraryAnimations)) | Some(Frame::Animation(_)) => {
                    Frame::Animation(Animation {
                        id: owned_attr(attributes, "id"),
                        name: owned_attr(attributes, "name"),
                        elements: Vec::new(),
                    })
                }
                _ => return Ok(None),
            },
            E::Sampler => match self.top() {
                Some(Frame::Animation(_)) => Frame::Sampler(Sampler {
                    id: owned_attr(attributes, "id").unwrap_or_default(),
                    inputs: Vec::new(),
                }),
                _ => return Err(Self::unexpected(element, "animation")),
            },
            E::Channel => match self.frames.last_mut() {
                Some(Frame::Animation(animation)) => {
                    animation.elements.push(AnimationElement::Channel(Channel {
                        source: owned_attr(attributes, "source").unwrap_or_default(),
                        target: owned_attr(attributes, "target").unwrap_or_default(),
                    }));
                    Frame::Pass(element)
                }
                _ => return Err(Self::unexpected(element, "animation")),
            },
            E::InstanceVisualScene => {
                if self.top_is(E::Scene) {
                    self.doc.scene = owned_attr(attributes, "url");
                }
                Frame::Pass(element)
            }
        };
        Ok(Some(frame))
    }

    fn open_node(&mut self, attributes: &[OwnedAttribute]) -> Result<Option<Frame>, ColladaError> {
        let parent = match self.top() {
            Some(Frame::Node(parent)) => Some(*parent),
            Some(Frame::VisualScene(_)) => None,
            _ => return Ok(None),
        };

        let index = self.doc.nodes.len();
        let id = owned_attr(attributes, "id").unwrap_or_else(|| format!("node{index}"));
        let mut node = Node::new(id);
        node.name = owned_attr(attributes, "name");
        node.sid = owned_attr(attributes, "sid");
        if attr(attributes, "type").is_some_and(|t| t.eq_ignore_ascii_case("JOINT")) {
            node.kind = NodeKind::Joint;
        }
        node.parent = parent;
        self.doc.nodes.push(node);

        match parent {
            Some(parent) => self.doc.nodes[parent].children.push(index),
            None => {
                if let Some(scene) = nearest!(self.frames, VisualScene) {
                    scene.roots.push(index);
                }
            }
        }
        Ok(Some(Frame::Node(index)))
    }

    fn end(&mut self) -> Result<(), ColladaError> {
        if self.skip_depth > 0 {
            self.skip_depth -= 1;
            return Ok(());
        }
        match self.frames.pop() {
            Some(frame) => self.close(frame),
            None => Ok(()),
        }
    }

    fn characters(&mut self, text: &str) {
        if self.skip_depth > 0 {
            return;
        }
        if let Some(Frame::Text(frame)) = self.frames.last_mut() {
            frame.text.push_str(text);
        }
    }

    /// Attach a finished frame's value to its container.
    fn close(&mut self, frame: Frame) -> Result<(), ColladaError> {
        match frame {
            Frame::Pass(_) | Frame::Node(_) => {}
            Frame::Text(text) => self.close_text(text)?,
            Frame::Image(image) => {
                self.doc.images.insert(image.id.clone(), image);
            }
            Frame::Material(material) => {
                self.doc.materials.insert(material.id.clone(), material);
            }
            Frame::Effect(effect) => {
                self.doc.effects.insert(effect.id.clone(), effect);
            }
            Frame::NewParam(param) => {
                if let Some(effect) = nearest!(self.frames, Effect) {
                    effect.params.push(param);
                }
            }
            Frame::Shading(shading) => {
                if let Some(effect) = nearest!(self.frames, Effect) {
                    effect.shading = Some(shading);
                }
            }
            Frame::Slot(element, value) => {
                if let Some(Frame::Shading(shading)) = self.frames.last_mut() {
                    let slot = match element {
                        Element::Emission => &mut shading.emission,
                        Element::Ambient => &mut shading.ambient,
                        Element::Diffuse => &mut shading.diffuse,
                        _ => &mut shading.specular,
                    };
                    *slot = value;
                }
            }
            Frame::Geometry(geometry) => {
                self.doc.geometries.insert(geometry.id.clone(), geometry);
            }
            Frame::Mesh(mesh) => {
                if let Some(Frame::Geometry(geometry)) = self.frames.last_mut() {
                    geometry.mesh = Some(mesh);
                }
            }
            Frame::Source(source) => match self.frames.last_mut() {
                Some(Frame::Mesh(mesh)) => mesh.sources.push(source),
                Some(Frame::Skin(skin)) => skin.sources.push(source),
                Some(Frame::Animation(animation)) => {
                    animation.elements.push(AnimationElement::Source(source))
                }
                _ => {}
            },
            Frame::Accessor(accessor) => {
                if let Some(source) = nearest!(self.frames, Source) {
                    source.accessor = Some(accessor);
                }
            }
            Frame::Vertices(vertices) => {
                if let Some(Frame::Mesh(mesh)) = self.frames.last_mut() {
                    mesh.vertices = Some(vertices);
                }
            }
            Frame::Triangles(triangles) => self.close_triangles(triangles)?,
            Frame::Controller(controller) => {
                self.doc.controllers.insert(controller.id.clone(), controller);
            }
            Frame::Skin(skin) => {
                if let Some(Frame::Controller(controller)) = self.frames.last_mut() {
                    controller.skin = Some(skin);
                }
            }
            Frame::Joints(inputs) => {
                if let Some(Frame::Skin(skin)) = self.frames.last_mut() {
                    skin.joint_inputs = inputs;
                }
            }
            Frame::VertexWeights(weights) => {
                if let Some(Frame::Skin(skin)) = self.frames.last_mut() {
                    skin.weights = weights;
                }
            }
            Frame::VisualScene(scene) => self.doc.visual_scenes.push(scene),
            Frame::Instance(instance) => {
                if let Some(&mut index) = nearest!(self.frames, Node) {
                    let node = &mut self.doc.nodes[index];
                    if node.kind == NodeKind::Base {
                        node.kind = instance.kind();
                    }
                    node.instances.push(instance);
                }
            }
            Frame::Animation(animation) => {
                if !animation.elements.is_empty() {
                    self.doc.animations.push(animation);
                }
            }
            Frame::Sampler(sampler) => {
                if let Some(Frame::Animation(animation)) = self.frames.last_mut() {
                    animation.elements.push(AnimationElement::Sampler(sampler));
                }
            }
        }
        Ok(())
    }

    fn close_text(&mut self, frame: TextFrame) -> Result<(), ColladaError> {
        use Element as E;

        let TextFrame {
            element,
            id,
            sid,
            count,
            text,
        } = frame;
        let trimmed = text.trim();

        match element {
            E::UpAxis => {
                self.doc.asset.up_axis = match trimmed.to_ascii_uppercase().as_str() {
                    "X_UP" => UpAxis::XUp,
                    "Z_UP" => UpAxis::ZUp,
                    _ => UpAxis::YUp,
                };
            }
            E::InitFrom => match self.frames.last_mut() {
                Some(Frame::Image(image)) => image.init_from = trimmed.to_string(),
                _ => {
                    if let Some(param) = nearest!(self.frames, NewParam) {
                        param.value = Some(NewParamValue::Surface {
                            init_from: trimmed.to_string(),
                        });
                    }
                }
            },
            E::Source => {
                if let Some(param) = nearest!(self.frames, NewParam) {
                    param.value = Some(NewParamValue::Sampler2D {
                        source: trimmed.to_string(),
                    });
                }
            }
            E::Float => {
                let value: f32 = parse_number(element, trimmed)?;
                if let Some(shading) = nearest!(self.frames, Shading) {
                    shading.shininess = Some(value);
                }
            }
            E::Color => {
                let values: Vec<f32> = parse_list(element, trimmed)?;
                if values.len() < 3 {
                    return Err(ColladaError::Invalid(format!(
                        "<color> needs at least 3 components, found {}",
                        values.len()
                    )));
                }
                let color = [
                    values[0],
                    values[1],
                    values[2],
                    values.get(3).copied().unwrap_or(1.0),
                ];
                if let Some(Frame::Slot(_, value)) = self.frames.last_mut() {
                    *value = Some(ColorOrTexture::Color(color));
                }
            }
            E::FloatArray | E::NameArray | E::IdrefArray => {
                let data = if element == E::FloatArray {
                    ArrayData::Float(parse_list(element, trimmed)?)
                } else {
                    ArrayData::Name(trimmed.split_whitespace().map(str::to_string).collect())
                };
                match count {
                    Some(declared) if declared != data.len() => {
                        return Err(ColladaError::CountMismatch {
                            element: element.name(),
                            id: id.unwrap_or_default(),
                            declared,
                            found: data.len(),
                        });
                    }
                    _ => {}
                }
                if let Some(Frame::Source(source)) = self.frames.last_mut() {
                    source.array_id = id;
                    source.data = data;
                }
            }
            E::P => {
                let indices: Vec<u32> = parse_list(element, trimmed)?;
                if let Some(Frame::Triangles(triangles)) = self.frames.last_mut() {
                    triangles.group.indices.extend(indices);
                }
            }
            E::VCount => {
                let counts: Vec<u32> = parse_list(element, trimmed)?;
                match self.frames.last_mut() {
                    Some(Frame::Triangles(triangles)) => triangles.vcount = Some(counts),
                    Some(Frame::VertexWeights(weights)) => weights.vcount = counts,
                    _ => {}
                }
            }
            E::V => {
                let values: Vec<i64> = parse_list(element, trimmed)?;
                if let Some(Frame::VertexWeights(weights)) = self.frames.last_mut() {
                    weights.v = values;
                }
            }
            E::BindShapeMatrix => {
                let matrix = matrix_from_text(element, trimmed)?;
                if let Some(Frame::Skin(skin)) = self.frames.last_mut() {
                    skin.bind_shape_matrix = matrix;
                }
            }
            E::Matrix | E::Translate | E::Rotate | E::Scale => {
                let transform = match element {
                    E::Matrix => matrix_from_text(element, trimmed)?,
                    E::Translate => Mat4::from_translation(vec3_from_text(element, trimmed)?),
                    E::Scale => Mat4::from_scale(vec3_from_text(element, trimmed)?),
                    _ => rotation_from_text(element, trimmed)?,
                };
                if let Some(Frame::Node(index)) = self.frames.last() {
                    let node = &mut self.doc.nodes[*index];
                    node.local_transform *= transform;
                    if element == E::Matrix && sid.is_some() {
                        node.matrix_sid = sid;
                    }
                }
            }
            E::Skeleton => {
                if let Some(Instance::Controller { skeletons, .. }) = nearest!(self.frames, Instance)
                {
                    skeletons.push(trimmed.to_string());
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn close_triangles(&mut self, frame: TrianglesFrame) -> Result<(), ColladaError> {
        let TrianglesFrame { group, vcount } = frame;
        let geometry = nearest!(self.frames, Geometry)
            .map(|g| g.id.clone())
            .unwrap_or_default();

        if group.kind == PrimitiveKind::Polylist {
            let vcount = vcount.unwrap_or_default();
            if vcount.len() != group.count {
                return Err(ColladaError::CountMismatch {
                    element: "vcount",
                    id: geometry,
                    declared: group.count,
                    found: vcount.len(),
                });
            }
            if let Some(&bad) = vcount.iter().find(|&&n| n != 3) {
                return Err(ColladaError::NonTriangle {
                    geometry,
                    count: bad,
                });
            }
        }

        let expected = group.count * 3 * group.stride();
        if group.indices.len() != expected {
            return Err(ColladaError::IndexCount {
                geometry,
                expected,
                found: group.indices.len(),
            });
        }

        if let Some(Frame::Mesh(mesh)) = self.frames.last_mut() {
            mesh.groups.push(group);
        }
        Ok(())
    }
}

fn matrix_from_text(element: Element, text: &str) -> Result<Mat4, ColladaError> {
    let values: Vec<f32> = parse_list(element, text)?;
    if values.len() != 16 {
        return Err(ColladaError::Invalid(format!(
            "<{}> needs 16 values, found {}",
            element.name(),
            values.len()
        )));
    }
    Ok(row_major_matrix(&values))
}

fn vec3_from_text(element: Element, text: &str) -> Result<Vec3, ColladaError> {
    let values: Vec<f32> = parse_list(element, text)?;
    match values.as_slice() {
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => Err(ColladaError::Invalid(format!(
            "<{}> needs 3 values, found {}",
            element.name(),
            values.len()
        ))),
    }
}

fn rotation_from_text(element: Element, text: &str) -> Result<Mat4, ColladaError> {
    let values: Vec<f32> = parse_list(element, text)?;
    match values.as_slice() {
        [x, y, z, degrees] => {
            let axis = Vec3::new(*x, *y, *z);
            if axis.length_squared() == 0.0 {
                return Ok(Mat4::IDENTITY);
            }
            Ok(Mat4::from_axis_angle(axis.normalize(), degrees.to_radians()))
        }
        _ => Err(ColladaError::Invalid(format!(
            "<rotate> needs 4 values, found {}",
            values.len()
        ))),
    }
}

/// Read a whole COLLADA document.
pub fn parse_reader<R: Read>(reader: R, ctx: &mut ConversionContext) -> Result<Document, ColladaError> {
    let mut events = ParserConfig::new()
        .whitespace_to_characters(true)
        .cdata_to_characters(true)
        .ignore_comments(true)
        .create_reader(reader);
    let mut parser = Parser::new(ctx);

    loop {
        match events.next() {
            Ok(XmlEvent::StartElement {
                name, attributes, ..
            }) => parser.start(&name.local_name, &attributes)?,
            Ok(XmlEvent::EndElement { .. }) => parser.end()?,
            Ok(XmlEvent::Characters(text)) => parser.characters(&text),
            Ok(XmlEvent::EndDocument) => break,
            Ok(_) => {}
            Err(e) => return Err(ColladaError::Xml(e.to_string())),
        }
    }

    let Parser { mut doc, ctx, .. } = parser;
    doc.finish(ctx);
    tracing::debug!(
        geometries = doc.geometries.len(),
        controllers = doc.controllers.len(),
        nodes = doc.nodes.len(),
        animations = doc.animations.len(),
        "parsed COLLADA document"
    );
    Ok(doc)
}
