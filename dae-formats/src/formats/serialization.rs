//! Binary serialization trait for format headers.
//!
//! Each header keeps its own `to_bytes()` returning a fixed-size array; this
//! trait gives generic code (tests, loaders) one interface over all of them.

/// Trait for binary-serializable format headers.
///
/// Returns `Vec<u8>` because `[u8; Self::SIZE]` in a trait return type is not
/// expressible on stable Rust.
pub trait BinarySerializable: Sized {
    /// Size of the serialized header in bytes.
    const SIZE: usize;

    fn serialize(&self) -> Vec<u8>;

    /// Returns `None` if the byte slice is too short or contains invalid data.
    fn deserialize(bytes: &[u8]) -> Option<Self>;
}

macro_rules! impl_binary_serializable {
    ($($ty:ty),* $(,)?) => {
        $(
            impl BinarySerializable for $ty {
                const SIZE: usize = <$ty>::SIZE;

                fn serialize(&self) -> Vec<u8> {
                    self.to_bytes().to_vec()
                }

                fn deserialize(bytes: &[u8]) -> Option<Self> {
                    Self::from_bytes(bytes)
                }
            }
        )*
    };
}

impl_binary_serializable!(
    super::ModelHeader,
    super::AnimationHeader,
    super::JointTransform,
    super::FontHeader,
    super::FontGlyphRecord,
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::{
        AnimationHeader, FontGlyphRecord, FontHeader, JointTransform, ModelHeader,
        VertexDeclaration,
    };

    fn assert_trait_matches<T: BinarySerializable>(value: &T) {
        let bytes = value.serialize();
        assert_eq!(bytes.len(), T::SIZE);
        assert!(T::deserialize(&bytes).is_some());
        assert!(T::deserialize(&bytes[..T::SIZE - 1]).is_none());
    }

    #[test]
    fn test_all_headers_serialize_to_declared_size() {
        assert_trait_matches(&ModelHeader::new(
            0,
            VertexDeclaration::POSITION,
            2,
            1,
            [0.0; 3],
            [1.0; 3],
        ));
        assert_trait_matches(&AnimationHeader::new(10, 3, 24.0));
        assert_trait_matches(&JointTransform::IDENTITY);
        assert_trait_matches(&FontHeader::new(2, 64, 32, 12));
        assert_trait_matches(&FontGlyphRecord::default());
    }
}
