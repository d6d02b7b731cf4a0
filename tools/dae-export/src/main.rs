//! dae-export - COLLADA asset export tool
//!
//! Converts COLLADA scenes and glyph images to compact binary formats
//! (.dmodel, .danim, .dfont)

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use dae_export::{animation, font, manifest, model, ConversionSettings, FontOptions, ASSET_FORMAT};

#[derive(Parser)]
#[command(name = "dae-export")]
#[command(about = "COLLADA asset export tool")]
#[command(version)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a COLLADA scene to a model file
    Model {
        /// Input .dae file
        #[arg(short, long)]
        input: PathBuf,

        /// Output .dmodel file
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        settings: ConversionSettings,
    },

    /// Convert the animation of a COLLADA scene to an animation file
    Anim {
        /// Input .dae file
        #[arg(short, long)]
        input: PathBuf,

        /// Output .danim file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Transforms: y swap Y/Z
        #[arg(long)]
        transforms: Option<String>,
    },

    /// Build a bitmap font from a directory of glyph images
    Font {
        /// Directory of glyph PNGs named by code point (0041.png)
        #[arg(short, long)]
        input: PathBuf,

        /// Output .dfont file (the atlas is written beside it as .png)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        options: FontOptions,
    },

    /// Build assets from a manifest file
    Build {
        /// Path to assets.toml manifest
        #[arg(default_value = "assets.toml")]
        manifest: PathBuf,

        /// Output directory (overrides manifest)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate manifest without building
    Check {
        /// Path to assets.toml manifest
        #[arg(default_value = "assets.toml")]
        manifest: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .init();

    match cli.command {
        Commands::Model {
            input,
            output,
            settings,
        } => {
            let output = output.unwrap_or_else(|| input.with_extension(ASSET_FORMAT.model_ext));
            tracing::info!("Converting {} -> {}", input.display(), output.display());
            let mut ctx = settings.build_context()?;
            model::convert_collada(&input, &output, &mut ctx)?;
            report_warnings(ctx.warnings().len());
        }

        Commands::Anim {
            input,
            output,
            transforms,
        } => {
            let output =
                output.unwrap_or_else(|| input.with_extension(ASSET_FORMAT.animation_ext));
            tracing::info!("Converting {} -> {}", input.display(), output.display());
            let settings = ConversionSettings {
                transforms,
                ..Default::default()
            };
            let mut ctx = settings.build_context()?;
            animation::convert_collada_animation(&input, &output, &mut ctx)?;
            report_warnings(ctx.warnings().len());
        }

        Commands::Font {
            input,
            output,
            options,
        } => {
            let output = output.unwrap_or_else(|| input.with_extension(ASSET_FORMAT.font_ext));
            tracing::info!("Building font {} -> {}", input.display(), output.display());
            font::convert_font(&input, &output, &options.settings()?)?;
        }

        Commands::Build { manifest, output } => {
            tracing::info!("Building assets from {}", manifest.display());
            let config = manifest::load_manifest(&manifest)?;
            let summary = manifest::build_all(&config, output.as_deref())?;
            tracing::info!(
                "Build complete: {} models, {} animations, {} fonts",
                summary.models,
                summary.animations,
                summary.fonts
            );
            report_warnings(summary.warnings);
        }

        Commands::Check { manifest } => {
            tracing::info!("Checking manifest {}", manifest.display());
            let config = manifest::load_manifest(&manifest)?;
            manifest::validate(&config)?;
            tracing::info!("Manifest is valid ({} entries)", config.entry_count());
        }
    }

    Ok(())
}

fn report_warnings(count: usize) {
    if count > 0 {
        tracing::warn!("Finished with {} warning(s)", count);
    }
}
