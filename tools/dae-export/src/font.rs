//! Bitmap font builder (glyph PNGs -> .dfont + atlas .png)
//!
//! Every glyph is one image named after its code point: exactly four hex
//! digits, a dot and an extension (`0041.png` is `A`). The glyphs are packed
//! into one atlas and the font file records where each one landed.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use dae_formats::FontGlyphRecord;
use image::{ImageFormat, RgbaImage};
use serde::Deserialize;
use thiserror::Error;

use crate::atlas::{self, Heuristic, PackSettings, SizeRule, DEFAULT_MAX_SIZE};
use crate::formats;

/// Prefix of the working directory created next to the output.
pub const TEMP_DIR_PREFIX: &str = "_temp-font-";

/// Default transparent border around each glyph.
pub const DEFAULT_PADDING: u32 = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AlphabetError {
    #[error("glyph file name '{0}' must be four hex digits and an extension, e.g. 0041.png")]
    BadFileName(String),

    #[error("glyph file name '{name}' is not a valid character (U+{code:04X})")]
    InvalidCodePoint { name: String, code: u32 },
}

/// Character encoded by a glyph file name.
pub fn glyph_char(path: &Path) -> Result<char, AlphabetError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let bad = || AlphabetError::BadFileName(name.clone());

    let (stem, extension) = name.split_once('.').ok_or_else(bad)?;
    if stem.len() != 4 || !stem.bytes().all(|b| b.is_ascii_hexdigit()) || extension.is_empty() {
        return Err(bad());
    }
    let code = u32::from_str_radix(stem, 16).map_err(|_| bad())?;
    char::from_u32(code).ok_or(AlphabetError::InvalidCodePoint {
        name: name.clone(),
        code,
    })
}

/// Characters of the glyph files, in file order.
pub fn build_alphabet(paths: &[PathBuf]) -> Result<String, AlphabetError> {
    paths.iter().map(|p| glyph_char(p)).collect()
}

/// Build one axis rule from the size options. A fixed size wins over a
/// list of valid sizes, which wins over a maximum.
pub fn size_rule(
    fixed: Option<u32>,
    valid: Option<&str>,
    max: Option<u32>,
    divisible_by: Option<u32>,
) -> Result<SizeRule> {
    if let Some(size) = fixed {
        if size == 0 {
            bail!("Atlas size must be positive");
        }
        return Ok(SizeRule::Fixed(size));
    }
    if let Some(list) = valid {
        return SizeRule::parse_valid(list);
    }
    if max.is_none() && divisible_by.is_none() {
        return Ok(SizeRule::default());
    }
    Ok(SizeRule::Max {
        max: max.unwrap_or(DEFAULT_MAX_SIZE),
        divisible_by: divisible_by.unwrap_or(1),
    })
}

#[derive(Debug, Clone, Default)]
pub struct FontSettings {
    pub pack: PackSettings,
    /// 0 uses the tallest glyph
    pub line_height: u16,
}

/// Packing options as given on the command line or in a manifest entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, clap::Args)]
#[serde(default)]
pub struct FontOptions {
    /// Fixed atlas width
    #[arg(long)]
    pub width: Option<u32>,

    /// Fixed atlas height
    #[arg(long)]
    pub height: Option<u32>,

    /// Allowed atlas widths, e.g. 128:256:512
    #[arg(long)]
    pub valid_widths: Option<String>,

    /// Allowed atlas heights, e.g. 128:256:512
    #[arg(long)]
    pub valid_heights: Option<String>,

    #[arg(long)]
    pub max_width: Option<u32>,

    #[arg(long)]
    pub max_height: Option<u32>,

    /// Atlas sizes must be multiples of this
    #[arg(long)]
    pub divisible_by: Option<u32>,

    /// Transparent border around each glyph [default: 2]
    #[arg(long)]
    pub padding: Option<u32>,

    /// Placement tie-break [default: bottomright]
    #[arg(long, value_enum)]
    pub heuristic: Option<Heuristic>,

    /// Line height in pixels [default: tallest glyph]
    #[arg(long)]
    pub line_height: Option<u16>,
}

impl FontOptions {
    pub fn settings(&self) -> Result<FontSettings> {
        let width = size_rule(
            self.width,
            self.valid_widths.as_deref(),
            self.max_width,
            self.divisible_by,
        )
        .context("Invalid atlas width options")?;
        let height = size_rule(
            self.height,
            self.valid_heights.as_deref(),
            self.max_height,
            self.divisible_by,
        )
        .context("Invalid atlas height options")?;
        Ok(FontSettings {
            pack: PackSettings {
                width,
                height,
                padding: self.padding.unwrap_or(DEFAULT_PADDING),
                heuristic: self.heuristic.unwrap_or_default(),
            },
            line_height: self.line_height.unwrap_or(0),
        })
    }
}

/// Contents of a .dfont file.
#[derive(Debug, Clone, PartialEq)]
pub struct FontFile {
    pub atlas_width: u16,
    pub atlas_height: u16,
    pub line_height: u16,
    pub glyphs: Vec<FontGlyphRecord>,
    pub alphabet: String,
}

fn is_png(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("png"))
}

/// PNG files in `dir` and its immediate subdirectories, sorted by file name.
pub fn collect_glyphs(dir: &Path) -> Result<Vec<PathBuf>> {
    let read = |dir: &Path| -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(dir)
            .with_context(|| format!("Failed to read glyph directory: {}", dir.display()))?;
        entries
            .map(|entry| Ok(entry?.path()))
            .collect::<Result<Vec<_>>>()
    };

    let mut glyphs = Vec::new();
    for path in read(dir)? {
        if path.is_dir() {
            glyphs.extend(read(&path)?.into_iter().filter(|p| is_png(p)));
        } else if is_png(&path) {
            glyphs.push(path);
        }
    }
    glyphs.sort_by(|a, b| a.file_name().cmp(&b.file_name()).then_with(|| a.cmp(b)));
    Ok(glyphs)
}

fn to_u16(value: u32, what: &str) -> Result<u16> {
    u16::try_from(value).with_context(|| format!("{} {} does not fit 16 bits", what, value))
}

/// Pack glyph images into a font and its atlas.
pub fn build_font(paths: &[PathBuf], settings: &FontSettings) -> Result<(FontFile, RgbaImage)> {
    if paths.is_empty() {
        bail!("No glyph images to build a font from");
    }
    let alphabet = build_alphabet(paths)?;
    let images = paths
        .iter()
        .map(|path| {
            image::open(path)
                .map(|img| img.into_rgba8())
                .with_context(|| format!("Failed to load glyph: {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;
    let names: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();

    let packed = atlas::pack(&images, &names, &settings.pack)?;
    let glyphs = packed
        .placements
        .iter()
        .map(|p| {
            Ok(FontGlyphRecord {
                atlas_x: to_u16(p.atlas_x, "Glyph x")?,
                atlas_y: to_u16(p.atlas_y, "Glyph y")?,
                cropped_width: to_u16(p.cropped_width, "Glyph width")?,
                cropped_height: to_u16(p.cropped_height, "Glyph height")?,
                crop_x: to_u16(p.crop_x, "Crop x")?,
                crop_y: to_u16(p.crop_y, "Crop y")?,
                original_width: to_u16(p.original_width, "Glyph width")?,
                original_height: to_u16(p.original_height, "Glyph height")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let line_height = if settings.line_height == 0 {
        glyphs.iter().map(|g| g.original_height).max().unwrap_or(0)
    } else {
        settings.line_height
    };
    let font = FontFile {
        atlas_width: to_u16(packed.width(), "Atlas width")?,
        atlas_height: to_u16(packed.height(), "Atlas height")?,
        line_height,
        glyphs,
        alphabet,
    };
    Ok((font, packed.image))
}

/// Path of the atlas image written beside a font file.
pub fn atlas_path(output: &Path) -> PathBuf {
    output.with_extension("png")
}

/// Build a font from a glyph directory, writing `output` and its atlas.
pub fn convert_font(input: &Path, output: &Path, settings: &FontSettings) -> Result<()> {
    let paths = collect_glyphs(input)?;
    tracing::debug!("Found {} glyphs in {}", paths.len(), input.display());
    let (font, atlas) = build_font(&paths, settings)?;

    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let work = tempfile::Builder::new()
        .prefix(TEMP_DIR_PREFIX)
        .tempdir_in(dir)
        .with_context(|| format!("Failed to create working directory in {}", dir.display()))?;

    let temp_font = work.path().join("font.dfont");
    let temp_atlas = work.path().join("atlas.png");
    formats::write_font_file(&temp_font, &font)?;
    atlas
        .save_with_format(&temp_atlas, ImageFormat::Png)
        .with_context(|| format!("Failed to write atlas: {}", temp_atlas.display()))?;

    let final_atlas = atlas_path(output);
    fs::rename(&temp_atlas, &final_atlas)
        .with_context(|| format!("Failed to create output: {}", final_atlas.display()))?;
    fs::rename(&temp_font, output)
        .with_context(|| format!("Failed to create output: {}", output.display()))?;
    work.close()
        .with_context(|| format!("Failed to remove working directory in {}", dir.display()))?;

    tracing::info!(
        "Built font: {} glyphs, {}x{} atlas -> {}",
        font.glyphs.len(),
        font.atlas_width,
        font.atlas_height,
        output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dae_formats::FontHeader;
    use image::Rgba;

    fn write_glyph(path: &Path, width: u32, height: u32) {
        RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]))
            .save_with_format(path, ImageFormat::Png)
            .unwrap();
    }

    #[test]
    fn test_glyph_char() {
        assert_eq!(glyph_char(Path::new("0041.png")), Ok('A'));
        assert_eq!(glyph_char(Path::new("glyphs/00e9.png")), Ok('é'));
        assert!(matches!(
            glyph_char(Path::new("zz.png")),
            Err(AlphabetError::BadFileName(_))
        ));
        assert!(matches!(
            glyph_char(Path::new("00411.png")),
            Err(AlphabetError::BadFileName(_))
        ));
        assert!(glyph_char(Path::new("0041")).is_err());
        assert!(glyph_char(Path::new("0041.")).is_err());
        assert!(matches!(
            glyph_char(Path::new("D800.png")),
            Err(AlphabetError::InvalidCodePoint { code: 0xD800, .. })
        ));
    }

    #[test]
    fn test_build_alphabet_keeps_order() {
        let paths = vec![PathBuf::from("0048.png"), PathBuf::from("0069.png")];
        assert_eq!(build_alphabet(&paths).unwrap(), "Hi");
    }

    #[test]
    fn test_size_rule_precedence() {
        assert_eq!(size_rule(Some(64), Some("32:64"), None, None).unwrap(), SizeRule::Fixed(64));
        assert_eq!(
            size_rule(None, None, Some(100), None).unwrap(),
            SizeRule::Max {
                max: 100,
                divisible_by: 1
            }
        );
        assert_eq!(size_rule(None, None, None, None).unwrap(), SizeRule::default());
        assert!(size_rule(Some(0), None, None, None).is_err());
    }

    #[test]
    fn test_font_options_defaults() {
        let settings = FontOptions::default().settings().unwrap();
        assert_eq!(settings.pack.padding, DEFAULT_PADDING);
        assert_eq!(settings.pack.heuristic, Heuristic::BottomRight);
        assert_eq!(settings.line_height, 0);

        let options = FontOptions {
            valid_widths: Some("64:x".into()),
            ..Default::default()
        };
        assert!(options.settings().is_err());
    }

    #[test]
    fn test_convert_font_writes_font_and_atlas() {
        let dir = tempfile::tempdir().unwrap();
        let glyphs = dir.path().join("glyphs");
        fs::create_dir_all(glyphs.join("upper")).unwrap();
        write_glyph(&glyphs.join("upper").join("0042.png"), 4, 6);
        write_glyph(&glyphs.join("0041.png"), 5, 7);
        fs::write(glyphs.join("notes.txt"), "ignored").unwrap();

        let output = dir.path().join("out").join("ui.dfont");
        fs::create_dir_all(output.parent().unwrap()).unwrap();
        convert_font(&glyphs, &output, &FontOptions::default().settings().unwrap()).unwrap();

        let bytes = fs::read(&output).unwrap();
        let header = FontHeader::from_bytes(&bytes).unwrap();
        assert_eq!(header.image_count, 2);
        assert_eq!(header.line_height, 7);
        assert!(bytes.ends_with(b"AB\0"));
        assert!(atlas_path(&output).is_file());

        let leftovers: Vec<_> = fs::read_dir(output.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(TEMP_DIR_PREFIX))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_bad_glyph_name_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        write_glyph(&dir.path().join("zz.png"), 2, 2);
        let output = dir.path().join("bad.dfont");
        assert!(convert_font(dir.path(), &output, &FontSettings::default()).is_err());
        assert!(!output.exists());
    }
}
