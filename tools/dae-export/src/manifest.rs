//! Manifest parsing and batch builds
//!
//! Parses assets.toml and converts every entry it lists. Source paths are
//! relative to the manifest's directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::context::ConversionSettings;
use crate::font::FontOptions;
use crate::{animation, font, model, ASSET_FORMAT};

/// Root manifest structure
#[derive(Debug, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub models: BTreeMap<String, ConversionEntry>,
    #[serde(default)]
    pub animations: BTreeMap<String, ConversionEntry>,
    #[serde(default)]
    pub fonts: BTreeMap<String, FontEntry>,

    /// Directory the manifest was loaded from
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("assets/")
}

/// A model or animation source.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ConversionEntry {
    Simple(PathBuf),
    Detailed(DetailedConversion),
}

#[derive(Debug, Deserialize)]
pub struct DetailedConversion {
    pub path: PathBuf,
    #[serde(flatten)]
    pub settings: ConversionSettings,
}

impl ConversionEntry {
    pub fn path(&self) -> &Path {
        match self {
            ConversionEntry::Simple(p) => p,
            ConversionEntry::Detailed(d) => &d.path,
        }
    }

    pub fn settings(&self) -> ConversionSettings {
        match self {
            ConversionEntry::Simple(_) => ConversionSettings::default(),
            ConversionEntry::Detailed(d) => d.settings.clone(),
        }
    }
}

/// A glyph directory.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum FontEntry {
    Simple(PathBuf),
    Detailed(DetailedFont),
}

#[derive(Debug, Deserialize)]
pub struct DetailedFont {
    pub path: PathBuf,
    #[serde(flatten)]
    pub options: FontOptions,
}

impl FontEntry {
    pub fn path(&self) -> &Path {
        match self {
            FontEntry::Simple(p) => p,
            FontEntry::Detailed(d) => &d.path,
        }
    }

    pub fn options(&self) -> FontOptions {
        match self {
            FontEntry::Simple(_) => FontOptions::default(),
            FontEntry::Detailed(d) => d.options.clone(),
        }
    }
}

impl Manifest {
    pub fn parse(content: &str, base_dir: &Path) -> Result<Self> {
        let mut manifest: Manifest = toml::from_str(content)?;
        manifest.base_dir = base_dir.to_path_buf();
        Ok(manifest)
    }

    /// Resolve a manifest-relative path.
    pub fn source(&self, path: &Path) -> PathBuf {
        self.base_dir.join(path)
    }

    pub fn output_dir(&self, output_override: Option<&Path>) -> PathBuf {
        match output_override {
            Some(dir) => dir.to_path_buf(),
            None => self.base_dir.join(&self.output.dir),
        }
    }

    pub fn entry_count(&self) -> usize {
        self.models.len() + self.animations.len() + self.fonts.len()
    }
}

/// Load and parse a manifest file
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
    let base_dir = path.parent().unwrap_or(Path::new(""));
    Manifest::parse(&content, base_dir)
        .with_context(|| format!("Failed to parse manifest: {}", path.display()))
}

/// Validate a manifest without building: every source must exist and every
/// option string must parse.
pub fn validate(manifest: &Manifest) -> Result<()> {
    for (kind, entries) in [("Model", &manifest.models), ("Animation", &manifest.animations)] {
        for (name, entry) in entries {
            let source = manifest.source(entry.path());
            if !source.is_file() {
                bail!("{} '{}' source not found: {}", kind, name, source.display());
            }
            entry
                .settings()
                .build_context()
                .with_context(|| format!("{} '{}' has invalid options", kind, name))?;
        }
    }
    for (name, entry) in &manifest.fonts {
        let source = manifest.source(entry.path());
        if !source.is_dir() {
            bail!("Font '{}' glyph directory not found: {}", name, source.display());
        }
        entry
            .options()
            .settings()
            .with_context(|| format!("Font '{}' has invalid options", name))?;
    }
    Ok(())
}

/// Outcome of a batch build.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    pub models: usize,
    pub animations: usize,
    pub fonts: usize,
    pub warnings: usize,
}

/// Build all assets from a manifest
pub fn build_all(manifest: &Manifest, output_override: Option<&Path>) -> Result<BuildSummary> {
    let output_dir = manifest.output_dir(output_override);
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;
    let mut summary = BuildSummary::default();

    for (name, entry) in &manifest.models {
        let output = output_dir.join(format!("{}.{}", name, ASSET_FORMAT.model_ext));
        tracing::info!("Converting model: {} -> {}", name, output.display());
        let mut ctx = entry
            .settings()
            .build_context()
            .with_context(|| format!("Model '{}' has invalid options", name))?;
        model::convert_collada(&manifest.source(entry.path()), &output, &mut ctx)
            .with_context(|| format!("Failed to build model '{}'", name))?;
        summary.models += 1;
        summary.warnings += ctx.warnings().len();
    }

    for (name, entry) in &manifest.animations {
        let output = output_dir.join(format!("{}.{}", name, ASSET_FORMAT.animation_ext));
        tracing::info!("Converting animation: {} -> {}", name, output.display());
        let mut ctx = entry
            .settings()
            .build_context()
            .with_context(|| format!("Animation '{}' has invalid options", name))?;
        animation::convert_collada_animation(&manifest.source(entry.path()), &output, &mut ctx)
            .with_context(|| format!("Failed to build animation '{}'", name))?;
        summary.animations += 1;
        summary.warnings += ctx.warnings().len();
    }

    for (name, entry) in &manifest.fonts {
        let output = output_dir.join(format!("{}.{}", name, ASSET_FORMAT.font_ext));
        tracing::info!("Building font: {} -> {}", name, output.display());
        let settings = entry
            .options()
            .settings()
            .with_context(|| format!("Font '{}' has invalid options", name))?;
        font::convert_font(&manifest.source(entry.path()), &output, &settings)
            .with_context(|| format!("Failed to build font '{}'", name))?;
        summary.fonts += 1;
    }

    Ok(summary)
}
