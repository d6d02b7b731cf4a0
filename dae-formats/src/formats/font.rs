//! Font binary format (.dfont)
//!
//! Glyph table for a packed bitmap-font atlas. POD format - no magic bytes.
//!
//! # Layout
//! ```text
//! Header (10 bytes):
//! 0x00: image_count u16
//! 0x02: version u16
//! 0x04: atlas_width u16
//! 0x06: atlas_height u16
//! 0x08: line_height u16
//!
//! Per image (16 bytes, see FontGlyphRecord)
//!
//! Alphabet: UTF-8, null-terminated; the n-th char belongs to the n-th image
//! ```

/// Current font format version.
pub const FONT_VERSION: u16 = 1;

/// Font header (10 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontHeader {
    pub image_count: u16,
    pub version: u16,
    pub atlas_width: u16,
    pub atlas_height: u16,
    pub line_height: u16,
}

impl FontHeader {
    pub const SIZE: usize = 10;

    pub fn new(image_count: u16, atlas_width: u16, atlas_height: u16, line_height: u16) -> Self {
        Self {
            image_count,
            version: FONT_VERSION,
            atlas_width,
            atlas_height,
            line_height,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        let fields = [
            self.image_count,
            self.version,
            self.atlas_width,
            self.atlas_height,
            self.line_height,
        ];
        for (i, v) in fields.iter().enumerate() {
            bytes[i * 2..i * 2 + 2].copy_from_slice(&v.to_le_bytes());
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        let u = |i: usize| u16::from_le_bytes([bytes[i * 2], bytes[i * 2 + 1]]);
        Some(Self {
            image_count: u(0),
            version: u(1),
            atlas_width: u(2),
            atlas_height: u(3),
            line_height: u(4),
        })
    }
}

/// Placement of one glyph image (16 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FontGlyphRecord {
    /// Top-left of the cropped glyph inside the atlas
    pub atlas_x: u16,
    pub atlas_y: u16,
    /// Size after transparent borders were cropped
    pub cropped_width: u16,
    pub cropped_height: u16,
    /// Offset of the cropped rectangle inside the source image
    pub crop_x: u16,
    pub crop_y: u16,
    /// Size of the source image before cropping
    pub original_width: u16,
    pub original_height: u16,
}

impl FontGlyphRecord {
    pub const SIZE: usize = 16;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        let fields = [
            self.atlas_x,
            self.atlas_y,
            self.cropped_width,
            self.cropped_height,
            self.crop_x,
            self.crop_y,
            self.original_width,
            self.original_height,
        ];
        for (i, v) in fields.iter().enumerate() {
            bytes[i * 2..i * 2 + 2].copy_from_slice(&v.to_le_bytes());
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        let u = |i: usize| u16::from_le_bytes([bytes[i * 2], bytes[i * 2 + 1]]);
        Some(Self {
            atlas_x: u(0),
            atlas_y: u(1),
            cropped_width: u(2),
            cropped_height: u(3),
            crop_x: u(4),
            crop_y: u(5),
            original_width: u(6),
            original_height: u(7),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_font_header_layout() {
        let header = FontHeader::new(3, 256, 128, 18);
        let bytes = header.to_bytes();
        assert_eq!(&bytes[0..2], &3u16.to_le_bytes());
        assert_eq!(&bytes[2..4], &FONT_VERSION.to_le_bytes());
        assert_eq!(&bytes[8..10], &18u16.to_le_bytes());
        assert_eq!(FontHeader::from_bytes(&bytes), Some(header));
    }

    #[test]
    fn test_glyph_record_field_order() {
        let record = FontGlyphRecord {
            atlas_x: 1,
            atlas_y: 2,
            cropped_width: 3,
            cropped_height: 4,
            crop_x: 5,
            crop_y: 6,
            original_width: 7,
            original_height: 8,
        };
        let bytes = record.to_bytes();
        let words: Vec<u16> = bytes
            .chunks(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        assert_eq!(words, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(FontGlyphRecord::from_bytes(&bytes), Some(record));
    }
}
