//! Visual analysis - focus prompts, primary-image inference, reports.
//!
//! The first extracted stream is the primary image. It is normalized to PNG
//! (placeholder included) before being handed to the inference client, so a
//! drawing with any image at all always produces an analysis record.

mod client;

pub use client::*;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::carve::{ExtractedStream, Scanner};
use crate::config::InferenceConfig;
use crate::core::{parse_buffer, ParseResult, RawBuffer};
use crate::error::DrillError;
use crate::extract::{Extraction, ExtractionSummary, StreamInfo};
use crate::normalize::{normalize_to_canonical, placeholder_png, FallbackReason, NormalizeStatus};

/// Note used when a container holds no images
pub const NO_IMAGES_NOTE: &str = "No images found for visual analysis";

/// Advertised maximum input size
pub const MAX_FILE_SIZE_MB: u64 = 100;

/// Format versions the header inference is known to handle
pub const SUPPORTED_DWF_VERSIONS: [&str; 4] = ["V00.22", "V00.30", "V00.55", "V06.00"];

/// Image encodings the normalizer decodes
pub const SUPPORTED_IMAGE_FORMATS: [&str; 5] = ["PNG", "JPEG", "BMP", "GIF", "WEBP"];

const BASE_PROMPT: &str = "Analyze this drawing image and extract the following information:

1. **Drawing Type**: Architectural, mechanical, electrical, etc.
2. **Main Components**: Lines, circles, dimensions, text, symbols, etc.
3. **Numerical Information**: All visible dimensions, coordinates, measurements
4. **Structural Elements**: Walls, doors, windows, columns, etc. (for architectural drawings)
5. **Connectivity**: Line connections, intersections, closed curve areas
6. **Text Information**: All text and labels shown in the drawing
7. **Scale/Units**: Drawing scale or unit information";

const OUTPUT_INSTRUCTION: &str = "Provide the analysis results in a structured format.";

// ============================================================================
// Focus Areas
// ============================================================================

/// What the visual analysis should concentrate on
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum FocusArea {
    #[default]
    General,
    Structural,
    Dimensions,
    Connectivity,
    Annotations,
}

impl FocusArea {
    pub const ALL: [FocusArea; 5] = [
        FocusArea::General,
        FocusArea::Structural,
        FocusArea::Dimensions,
        FocusArea::Connectivity,
        FocusArea::Annotations,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FocusArea::General => "general",
            FocusArea::Structural => "structural",
            FocusArea::Dimensions => "dimensions",
            FocusArea::Connectivity => "connectivity",
            FocusArea::Annotations => "annotations",
        }
    }

    fn prompt_addition(&self) -> Option<&'static str> {
        match self {
            FocusArea::General => None,
            FocusArea::Structural => Some(
                "Focus particularly on structural elements (walls, columns, beams, doors, windows).",
            ),
            FocusArea::Dimensions => Some(
                "Focus particularly on all dimensions and measurements, read them accurately.",
            ),
            FocusArea::Connectivity => Some(
                "Focus particularly on line connections and closed curve area identification.",
            ),
            FocusArea::Annotations => {
                Some("Focus particularly on all text, labels, and annotation information.")
            }
        }
    }

    /// Full prompt: checklist, optional focus line, output instruction
    pub fn prompt(&self) -> String {
        let mut prompt = BASE_PROMPT.to_string();
        if let Some(addition) = self.prompt_addition() {
            prompt.push_str("\n\n");
            prompt.push_str(addition);
        }
        prompt.push_str("\n\n");
        prompt.push_str(OUTPUT_INSTRUCTION);
        prompt
    }
}

impl std::fmt::Display for FocusArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Reports
// ============================================================================

/// Analysis of a single image stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualAnalysis {
    pub stream: StreamInfo,
    pub focus: FocusArea,
    pub normalize_status: NormalizeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalize_fallback: Option<FallbackReason>,
    pub analysis_method: String,
    pub result: InferenceOutcome,
    pub timestamp: String,
}

/// Visual section of a report: an analysis, or a note explaining its absence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VisualSection {
    Analysis(Box<VisualAnalysis>),
    Note { note: String },
}

impl VisualSection {
    fn no_images() -> Self {
        VisualSection::Note {
            note: NO_IMAGES_NOTE.to_string(),
        }
    }
}

/// Output of a focused visual analysis of one container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualReport {
    pub file_path: String,
    pub focus_area: FocusArea,
    pub visual_analysis: VisualSection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ParseResult>,
}

/// Image extraction part of a comprehensive report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageExtractionSection {
    pub summary: ExtractionSummary,
    pub images_found: usize,
}

/// Metadata, extraction summary and primary-image analysis in one record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComprehensiveReport {
    pub file_path: String,
    pub analysis_type: String,
    pub metadata: ParseResult,
    pub image_extraction: ImageExtractionSection,
    pub visual_analysis: VisualSection,
    pub timestamp: String,
}

fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Normalize one stream and run it through the client
pub fn analyze_stream(
    client: &dyn InferenceClient,
    index: usize,
    stream: &ExtractedStream,
    focus: FocusArea,
) -> VisualAnalysis {
    tracing::info!(
        index,
        kind = %stream.kind,
        size = stream.size,
        %focus,
        "Starting image analysis"
    );

    let normalized = normalize_to_canonical(stream.data());
    let normalize_status = normalized.status();
    let normalize_fallback = normalized.fallback_reason().cloned();

    let result = infer(client, &focus.prompt(), normalized.bytes());
    let analysis_method = if result.is_fallback() {
        "fallback_image_analysis"
    } else {
        "visual_inference"
    };

    VisualAnalysis {
        stream: StreamInfo::from_stream(index, stream),
        focus,
        normalize_status,
        normalize_fallback,
        analysis_method: analysis_method.to_string(),
        result,
        timestamp: timestamp(),
    }
}

fn primary_section(
    client: &dyn InferenceClient,
    extraction: &Extraction,
    focus: FocusArea,
) -> VisualSection {
    match extraction.streams().first() {
        Some(stream) => {
            VisualSection::Analysis(Box::new(analyze_stream(client, 0, stream, focus)))
        }
        None => {
            tracing::info!(source = %extraction.source().display(), "{}", NO_IMAGES_NOTE);
            VisualSection::no_images()
        }
    }
}

/// Focused visual analysis of a container's primary image
pub fn analyze_container(
    client: &dyn InferenceClient,
    path: &Path,
    focus: FocusArea,
    include_metadata: bool,
) -> Result<VisualReport, DrillError> {
    let buf = RawBuffer::from_file(path)?;
    let extraction = Extraction::from_buffer(path, &buf, &Scanner::default());

    Ok(VisualReport {
        file_path: path.display().to_string(),
        focus_area: focus,
        visual_analysis: primary_section(client, &extraction, focus),
        metadata: include_metadata.then(|| parse_buffer(path, &buf)),
    })
}

/// Metadata, extraction summary and general analysis of the primary image
pub fn comprehensive_analysis(
    client: &dyn InferenceClient,
    path: &Path,
) -> Result<ComprehensiveReport, DrillError> {
    tracing::info!(path = %path.display(), "Starting comprehensive analysis");

    let buf = RawBuffer::from_file(path)?;
    let (metadata, extraction) = rayon::join(
        || parse_buffer(path, &buf),
        || Extraction::from_buffer(path, &buf, &Scanner::default()),
    );

    let visual_analysis = primary_section(client, &extraction, FocusArea::General);

    tracing::info!(
        path = %path.display(),
        images = extraction.len(),
        "Comprehensive analysis complete"
    );

    Ok(ComprehensiveReport {
        file_path: path.display().to_string(),
        analysis_type: "comprehensive".to_string(),
        metadata,
        image_extraction: ImageExtractionSection {
            summary: extraction.summary(),
            images_found: extraction.len(),
        },
        visual_analysis,
        timestamp: timestamp(),
    })
}

// ============================================================================
// Capabilities & Health
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capabilities {
    pub supported_dwf_versions: Vec<String>,
    pub supported_image_formats: Vec<String>,
    pub analysis_focus_areas: Vec<FocusArea>,
    pub max_file_size_mb: u64,
}

pub fn capabilities() -> Capabilities {
    Capabilities {
        supported_dwf_versions: SUPPORTED_DWF_VERSIONS.iter().map(|s| s.to_string()).collect(),
        supported_image_formats: SUPPORTED_IMAGE_FORMATS.iter().map(|s| s.to_string()).collect(),
        analysis_focus_areas: FocusArea::ALL.to_vec(),
        max_file_size_mb: MAX_FILE_SIZE_MB,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceStatus {
    pub endpoint: String,
    pub model: String,
    pub configured: bool,
    pub credential_present: bool,
    /// Only set when a probe was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reachable: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub service: String,
    pub version: String,
    pub image_processing: String,
    pub inference: InferenceStatus,
    pub timestamp: String,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Check image encoding and inference configuration; optionally probe the endpoint
pub fn health_check(config: &InferenceConfig, probe: bool) -> HealthReport {
    let image_ok = placeholder_png().is_ok();
    let configured = config.is_configured();

    let reachable = (probe && configured)
        .then(|| HttpInferenceClient::from_config(config).probe());

    let status = if image_ok && configured && reachable != Some(false) {
        "healthy"
    } else {
        "degraded"
    };

    HealthReport {
        status: status.to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        image_processing: if image_ok { "available" } else { "not_available" }.to_string(),
        inference: InferenceStatus {
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            configured,
            credential_present: config.api_key().is_some(),
            reachable,
        },
        timestamp: timestamp(),
    }
}
