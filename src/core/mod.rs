//! Core module - shared types and the container parse session
//!
//! Holds the source buffer, the format taxonomy, header inference and
//! the top-level metadata parse.

mod header;
mod parser;

pub use header::{infer_header, HeaderInfo};
pub use parser::{parse_buffer, parse_container, FileInfo, ObjectSummary, ParseFailure, ParseResult};

use std::ops::Range;
use std::path::Path;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::DrillError;

/// Embedded stream format categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatKind {
    Png,
    Jpeg,
    Bmp,
    Gif,
    Webp,
    /// Heuristic chunk following a textual embed marker, not format-verified
    ContainerEmbedded,
    Unknown,
}

impl FormatKind {
    /// Tag used in summaries and output file names
    pub fn tag(&self) -> &'static str {
        match self {
            FormatKind::Png => "png",
            FormatKind::Jpeg => "jpeg",
            FormatKind::Bmp => "bmp",
            FormatKind::Gif => "gif",
            FormatKind::Webp => "webp",
            FormatKind::ContainerEmbedded => "dwg_embedded",
            FormatKind::Unknown => "unknown",
        }
    }

    /// File extension for persisted streams
    pub fn extension(&self) -> &'static str {
        match self {
            FormatKind::Png => "png",
            FormatKind::Jpeg => "jpeg",
            FormatKind::Bmp => "bmp",
            FormatKind::Gif => "gif",
            FormatKind::Webp => "webp",
            FormatKind::ContainerEmbedded | FormatKind::Unknown => "bin",
        }
    }

    /// Declared image format, "unknown" for unverified chunks
    pub fn format_name(&self) -> &'static str {
        match self {
            FormatKind::ContainerEmbedded => "unknown",
            other => other.tag(),
        }
    }

    pub fn is_image(&self) -> bool {
        !matches!(self, FormatKind::ContainerEmbedded | FormatKind::Unknown)
    }
}

impl std::fmt::Display for FormatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Immutable bytes of one source file.
///
/// Read once per session. Slices handed out by [`RawBuffer::slice`] share
/// the same allocation.
#[derive(Debug, Clone, Default)]
pub struct RawBuffer {
    data: Bytes,
}

impl RawBuffer {
    /// Read a whole file into a buffer
    pub fn from_file(path: &Path) -> Result<Self, DrillError> {
        if !path.exists() {
            return Err(DrillError::SourceNotFound(path.to_path_buf()));
        }

        let data = std::fs::read(path).map_err(|source| DrillError::ReadFailure {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!(path = %path.display(), size = data.len(), "Source buffer loaded");

        Ok(Self {
            data: Bytes::from(data),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Shared slice, `None` when the range is empty or out of bounds
    pub fn slice(&self, range: Range<usize>) -> Option<Bytes> {
        if range.start >= range.end || range.end > self.data.len() {
            return None;
        }
        Some(self.data.slice(range))
    }
}

impl From<Vec<u8>> for RawBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self {
            data: Bytes::from(data),
        }
    }
}

impl From<&[u8]> for RawBuffer {
    fn from(data: &[u8]) -> Self {
        Self {
            data: Bytes::copy_from_slice(data),
        }
    }
}
