//! dae-export library
//!
//! COLLADA conversion pipeline used by the `dae-export` binary and by batch
//! tooling: parse a `.dae` document, convert it to a model or animation,
//! post-transform, validate and serialize.

pub mod animation;
pub mod atlas;
pub mod collada;
pub mod context;
pub mod font;
pub mod formats;
pub mod manifest;
pub mod model;
pub mod transform;
pub mod validate;

// Re-export format constants and headers from dae-formats
pub use dae_formats::{
    AnimationHeader, FontGlyphRecord, FontHeader, JointTransform, ModelHeader,
    VertexDeclaration, ASSET_FORMAT,
};

// Re-export key types for conversion
pub use context::{ConversionContext, ConversionOptions, ConversionSettings, Warning};

pub use model::{convert_collada_to_memory, convert_document, OutputMesh, OutputModel};

pub use animation::{convert_collada_animation_to_memory, ConvertedAnimation};

pub use font::{build_alphabet, glyph_char, FontOptions, FontSettings};
