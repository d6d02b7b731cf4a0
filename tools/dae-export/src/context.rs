//! Conversion options and diagnostics
//!
//! Everything a conversion run needs to know or report travels in one
//! [`ConversionContext`] passed down the pipeline. Warnings are logged as they
//! happen and also kept, so library callers can inspect them afterwards.

use dae_formats::VertexDeclaration;
use serde::Deserialize;
use thiserror::Error;

/// Options controlling a model or animation conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionOptions {
    /// Root node ids to export (matched case-insensitively). Empty exports every scene root.
    pub roots: Vec<String>,
    /// Vertex elements written for every vertex
    pub vertex_declaration: VertexDeclaration,
    /// Emit skinning data and skeletons
    pub animated: bool,
    /// Merge triangle groups sharing a material into one mesh
    pub combine_meshes: bool,
    /// Swap the Y and Z axes of every spatial value
    pub swap_yz: bool,
    /// Flip texture V (`v' = 1 - v`)
    pub flip_v: bool,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            vertex_declaration: VertexDeclaration::POSITION
                | VertexDeclaration::NORMAL
                | VertexDeclaration::UV,
            animated: false,
            combine_meshes: false,
            swap_yz: false,
            flip_v: false,
        }
    }
}

/// Malformed option strings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptionsError {
    #[error("unknown vertex element code '{0}' (expected letters from \"pntcwj\")")]
    UnknownVertexElement(char),

    #[error("unknown feature code '{0}' (expected \"a\")")]
    UnknownFeature(char),
}

impl ConversionOptions {
    /// Parse a vertex format code: `p` position, `n` normal, `t` texcoord,
    /// `c` colour, `w` weights, `j` joint indices.
    pub fn parse_vertex_format(code: &str) -> Result<VertexDeclaration, OptionsError> {
        let mut declaration = VertexDeclaration::empty();
        for c in code.chars() {
            let element = match c.to_ascii_lowercase() {
                'p' => VertexDeclaration::POSITION,
                'n' => VertexDeclaration::NORMAL,
                't' => VertexDeclaration::UV,
                'c' => VertexDeclaration::COLOUR,
                'w' => VertexDeclaration::WEIGHTS,
                'j' => VertexDeclaration::JOINT_INDICES,
                other => return Err(OptionsError::UnknownVertexElement(other)),
            };
            declaration.insert(element);
        }
        Ok(declaration)
    }

    /// Parse a feature code. `a` enables animation.
    pub fn parse_features(code: &str) -> Result<bool, OptionsError> {
        let mut animated = false;
        for c in code.chars() {
            match c.to_ascii_lowercase() {
                'a' => animated = true,
                other => return Err(OptionsError::UnknownFeature(other)),
            }
        }
        Ok(animated)
    }

    /// Apply a transform code: `y` swaps Y/Z, `v` flips texture V.
    /// Unknown letters are reported and ignored.
    pub fn apply_transform_code(&mut self, code: &str, ctx: &mut ConversionContext) {
        for c in code.chars() {
            match c.to_ascii_lowercase() {
                'y' => self.swap_yz = true,
                'v' => self.flip_v = true,
                other => ctx.warn(Warning::UnknownTransformCode(other)),
            }
        }
    }

    /// Build options from the CLI / manifest code strings.
    pub fn from_codes(
        vertex_format: Option<&str>,
        features: Option<&str>,
        transforms: Option<&str>,
        ctx: &mut ConversionContext,
    ) -> Result<Self, OptionsError> {
        let mut options = Self::default();
        if let Some(code) = vertex_format {
            options.vertex_declaration = Self::parse_vertex_format(code)?;
        }
        if let Some(code) = features {
            options.animated = Self::parse_features(code)?;
        }
        if let Some(code) = transforms {
            options.apply_transform_code(code, ctx);
        }
        Ok(options)
    }

    pub fn is_root(&self, id: &str) -> bool {
        self.roots.iter().any(|root| root.eq_ignore_ascii_case(id))
    }
}

/// Option strings as given on the command line or in a manifest entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, clap::Args)]
pub struct ConversionSettings {
    /// Vertex elements: p position, n normal, t texcoord, c colour, w weights, j joint indices
    #[arg(long)]
    #[serde(default)]
    pub vertex_format: Option<String>,

    /// Features: a animation
    #[arg(long)]
    #[serde(default)]
    pub features: Option<String>,

    /// Transforms: y swap Y/Z, v flip texture V
    #[arg(long)]
    #[serde(default)]
    pub transforms: Option<String>,

    /// Root node ids to export (comma separated, default: every scene root)
    #[arg(long, value_delimiter = ',')]
    #[serde(default)]
    pub roots: Vec<String>,

    /// Merge triangle groups sharing a material into one mesh
    #[arg(long)]
    #[serde(default)]
    pub combine_meshes: bool,
}

impl ConversionSettings {
    /// Parse the option strings into a fresh context. Unknown transform
    /// letters are already recorded as warnings.
    pub fn build_context(&self) -> Result<ConversionContext, OptionsError> {
        let mut ctx = ConversionContext::default();
        let mut options = ConversionOptions::from_codes(
            self.vertex_format.as_deref(),
            self.features.as_deref(),
            self.transforms.as_deref(),
            &mut ctx,
        )?;
        options.roots = self.roots.clone();
        options.combine_meshes = self.combine_meshes;
        ctx.options = options;
        Ok(ctx)
    }
}

/// Non-fatal conditions reported during a conversion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Warning {
    #[error("mesh '{mesh}' has {count} indices, more than the 16-bit limit of {limit}")]
    IndexCountExceeded {
        mesh: String,
        count: usize,
        limit: usize,
    },

    #[error("mesh '{mesh}' uses vertex index {index}, more than the 16-bit limit of {limit}")]
    IndexValueExceeded { mesh: String, index: u32, limit: u32 },

    #[error("skeleton has {count} nodes, more than the limit of {limit}")]
    SkeletonTooLarge { count: usize, limit: usize },

    #[error("skeleton has {count} joints, more than the limit of {limit}")]
    TooManyJoints { count: usize, limit: usize },

    #[error("animation feature enabled without both weight and joint-index vertex elements")]
    AnimationWithoutSkinElements,

    #[error("weight or joint-index vertex elements enabled without the animation feature")]
    SkinElementsWithoutAnimation,

    #[error("combine-meshes cannot be used together with animation; combine-meshes disabled")]
    CombineMeshesDisabled,

    #[error("position vertex element is always written; added to the vertex format")]
    PositionForced,

    #[error("unknown transform code '{0}' ignored")]
    UnknownTransformCode(char),

    #[error("mesh '{mesh}' has no {element} data; default values written")]
    MissingVertexElement { mesh: String, element: &'static str },

    #[error("skin '{skin}': {vertices} vertices have weights that do not sum to 1")]
    WeightSum { skin: String, vertices: usize },

    #[error("skin '{skin}': {vertices} vertices have more than 4 influences; extra influences dropped")]
    InfluencesTruncated { skin: String, vertices: usize },

    #[error("duplicate node id '{0}'; the first definition is used")]
    DuplicateNodeId(String),
}

/// State threaded through one conversion run.
#[derive(Debug, Default)]
pub struct ConversionContext {
    pub options: ConversionOptions,
    warnings: Vec<Warning>,
}

impl ConversionContext {
    pub fn new(options: ConversionOptions) -> Self {
        Self {
            options,
            warnings: Vec::new(),
        }
    }

    /// Report a warning: logged immediately and kept for inspection.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn has_warning(&self, predicate: impl Fn(&Warning) -> bool) -> bool {
        self.warnings.iter().any(predicate)
    }
}
