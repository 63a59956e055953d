//! DWF Drill Library
//!
//! Best-effort scanner for DWF drawing files. Finds embedded raster images
//! and human-readable metadata fragments in the raw bytes without decoding
//! the container's record grammar.
//!
//! # Features
//!
//! - **Signature Carving**: PNG, JPEG, BMP and container-declared image chunks
//! - **Zero-Copy Slices**: Extracted streams share the source buffer
//! - **Header Inference**: Format version and authoring application
//! - **Text Heuristics**: Layer names and coarse object hints
//! - **PNG Normalization**: With a deterministic placeholder on failure
//! - **Never Panics**: Malformed input degrades to partial or empty results
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use dwf_drill::extract::{extract_streams, persist_streams};
//!
//! fn main() -> anyhow::Result<()> {
//!     let streams = extract_streams(Path::new("plan.dwf"))?;
//!     println!("Found {} embedded images", streams.len());
//!
//!     let report = persist_streams(&streams, "plan", Path::new("out"))?;
//!     println!("Wrote {} files", report.written.len());
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod carve;
pub mod cli;
pub mod config;
pub mod core;
pub mod display;
pub mod error;
pub mod extract;
pub mod normalize;
pub mod text;

// Re-export commonly used types
pub use analysis::{FocusArea, HttpInferenceClient, InferenceClient, InferenceOutcome};
pub use carve::{ExtractedStream, ScanOptions, Scanner, SkippedOccurrence};
pub use config::Config;
pub use core::{parse_container, FormatKind, HeaderInfo, ParseFailure, ParseResult, RawBuffer};
pub use error::{DrillError, ErrorKind, SkipReason};
pub use extract::{extract_streams, persist_streams, Extraction, PersistReport};
pub use normalize::{normalize_to_canonical, NormalizeStatus, Normalized};
pub use text::{LayerCandidate, ObjectHint};
