//! Binary asset formats written by the COLLADA export pipeline
//!
//! This crate holds the on-disk layouts shared between:
//! - `dae-export` (asset pipeline)
//! - runtime loaders that read the converted files
//!
//! # Modules
//!
//! - [`formats`] - Model, animation and font headers and record layouts
//! - [`writer`] - Little-endian writer primitive used by every format
//! - [`asset_format`] - File extensions, check values and versions

pub mod asset_format;
pub mod formats;
pub mod writer;

pub use asset_format::{AssetFormat, ASSET_FORMAT};

pub use formats::{
    // Constants
    ANIMATION_CHECK_VALUE,
    ANIMATION_VERSION,
    BinarySerializable,
    FEATURE_ANIMATION,
    FONT_VERSION,
    // Headers and records
    AnimationHeader,
    FontGlyphRecord,
    FontHeader,
    INVERSE_BIND_MATRIX_FLOATS,
    JointTransform,
    MATERIAL_FLOAT_COUNT,
    MODEL_ENDIANNESS_MARKER,
    MODEL_VERSION,
    ModelHeader,
    VertexDeclaration,
    JOINT_TRANSFORM_SIZE,
};

pub use writer::{LeReader, LeWriter, WriteError};
