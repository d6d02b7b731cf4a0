//! Asset format constants
//!
//! One place for the extensions and identifying values of every file the
//! exporter writes, so tools and loaders agree on them.

/// Identifying constants for the converted asset family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetFormat {
    /// Model file extension without dot (e.g., "dmodel")
    pub model_ext: &'static str,

    /// Animation file extension without dot (e.g., "danim")
    pub animation_ext: &'static str,

    /// Font file extension without dot (e.g., "dfont")
    pub font_ext: &'static str,

    /// Atlas image extension written next to a font
    pub atlas_image_ext: &'static str,
}

impl AssetFormat {
    pub const fn new(
        model_ext: &'static str,
        animation_ext: &'static str,
        font_ext: &'static str,
        atlas_image_ext: &'static str,
    ) -> Self {
        Self {
            model_ext,
            animation_ext,
            font_ext,
            atlas_image_ext,
        }
    }

    /// Returns the extension for an output kind name ("model", "animation", "font").
    pub fn ext_for(&self, kind: &str) -> Option<&'static str> {
        match kind {
            "model" => Some(self.model_ext),
            "animation" | "anim" => Some(self.animation_ext),
            "font" => Some(self.font_ext),
            _ => None,
        }
    }
}

/// The asset family written by `dae-export`.
pub const ASSET_FORMAT: AssetFormat = AssetFormat::new("dmodel", "danim", "dfont", "png");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ext_for_known_kinds() {
        assert_eq!(ASSET_FORMAT.ext_for("model"), Some("dmodel"));
        assert_eq!(ASSET_FORMAT.ext_for("anim"), Some("danim"));
        assert_eq!(ASSET_FORMAT.ext_for("animation"), Some("danim"));
        assert_eq!(ASSET_FORMAT.ext_for("font"), Some("dfont"));
        assert_eq!(ASSET_FORMAT.ext_for("texture"), None);
    }
}
