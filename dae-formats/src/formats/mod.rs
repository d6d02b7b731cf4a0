//! Binary layouts of the converted assets
//!
//! All formats are little-endian. The model and animation formats start with
//! a check value so a loader can reject foreign or byte-swapped files; the
//! font format is headerless POD like the atlas it describes.
//!
//! Fixed-size headers implement the [`BinarySerializable`] trait for
//! consistent serialization/deserialization.

pub mod animation;
pub mod font;
pub mod model;
mod serialization;

pub use animation::*;
pub use font::*;
pub use model::*;
pub use serialization::BinarySerializable;
