//! CLI module - Command line interface definitions and handlers

pub mod render;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::analysis::FocusArea;
use crate::core::FormatKind;

/// DWF Drill - carve embedded images and metadata hints out of DWF drawings
///
/// Scans the raw bytes of a drawing for embedded raster images, recovers
/// header, layer and object hints from its text, and optionally sends the
/// primary image to a multimodal model. Source files are never modified.
#[derive(Parser, Debug)]
#[command(name = "dwf-drill")]
#[command(author = "Ryan Cashmoney <tunclon@proton.me>")]
#[command(version)]
#[command(about = "Carve embedded images and metadata out of DWF drawings", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Output format for machine parsing
    #[arg(long, value_enum, global = true)]
    pub output: Option<OutputFormat>,

    /// Config file (default: platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn output_format(&self) -> OutputFormat {
        self.output.unwrap_or_default()
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Header, layers, object hints and text samples
    Metadata(MetadataArgs),

    /// Carve embedded image streams, optionally saving them
    Extract(ExtractArgs),

    /// Re-encode an image file to PNG (placeholder on failure)
    Normalize(NormalizeArgs),

    /// Send the primary image to the inference endpoint with a focus prompt
    Analyze(AnalyzeArgs),

    /// Metadata, extraction summary and visual analysis in one report
    Comprehensive(ComprehensiveArgs),

    /// Supported versions, image formats and focus areas
    Formats,

    /// Check image processing and inference configuration
    Health(HealthArgs),

    /// Show or initialize the config file
    Config(ConfigArgs),
}

#[derive(Debug, Clone, Parser)]
pub struct MetadataArgs {
    /// DWF file to parse
    #[arg(required = true)]
    pub file: PathBuf,
}

#[derive(Debug, Clone, Parser)]
pub struct ExtractArgs {
    /// DWF file to scan
    #[arg(required = true)]
    pub file: PathBuf,

    /// Write every stream to disk
    #[arg(long, short)]
    pub save: bool,

    /// Output directory (default: [extract] output_dir from config)
    #[arg(long, short = 'd')]
    pub output_dir: Option<PathBuf>,

    /// Only run these passes (e.g., png,jpeg)
    #[arg(long, short, value_enum, value_delimiter = ',')]
    pub kinds: Option<Vec<KindFilter>>,

    /// Run passes sequentially
    #[arg(long)]
    pub sequential: bool,

    /// List skipped occurrences as well
    #[arg(long)]
    pub show_skipped: bool,
}

#[derive(Debug, Clone, Parser)]
pub struct NormalizeArgs {
    /// Image file to normalize
    #[arg(required = true)]
    pub input: PathBuf,

    /// Output PNG path (default: input with .png extension)
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Clone, Parser)]
pub struct AnalyzeArgs {
    /// DWF file to analyze
    #[arg(required = true)]
    pub file: PathBuf,

    /// Analysis focus (default: [analysis] focus from config)
    #[arg(long, short, value_enum)]
    pub focus: Option<FocusArea>,

    /// Leave container metadata out of the report
    #[arg(long)]
    pub no_metadata: bool,
}

#[derive(Debug, Clone, Parser)]
pub struct ComprehensiveArgs {
    /// DWF file to analyze
    #[arg(required = true)]
    pub file: PathBuf,
}

#[derive(Debug, Clone, Parser)]
pub struct HealthArgs {
    /// Also try to reach the inference endpoint
    #[arg(long)]
    pub probe: bool,
}

#[derive(Debug, Clone, Parser)]
pub struct ConfigArgs {
    /// Write a commented sample config
    #[arg(long)]
    pub init: bool,

    /// Overwrite an existing file with --init
    #[arg(long)]
    pub force: bool,
}

/// Scanner pass selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindFilter {
    /// Container-declared embedded chunks
    Embedded,
    Png,
    Jpeg,
    Bmp,
}

impl From<KindFilter> for FormatKind {
    fn from(filter: KindFilter) -> Self {
        match filter {
            KindFilter::Embedded => FormatKind::ContainerEmbedded,
            KindFilter::Png => FormatKind::Png,
            KindFilter::Jpeg => FormatKind::Jpeg,
            KindFilter::Bmp => FormatKind::Bmp,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human readable (default)
    #[default]
    Human,
    /// JSON output
    Json,
}
