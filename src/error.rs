//! Error taxonomy for the scanner core.
//!
//! Only whole-file failures ([`DrillError::SourceNotFound`],
//! [`DrillError::ReadFailure`]) abort an operation. Everything that can go
//! wrong with a single occurrence or a single output file is recorded as a
//! value and the enclosing scan keeps going.

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::FormatKind;

/// Errors surfaced by the library operations
#[derive(Debug, Error)]
pub enum DrillError {
    /// Input path does not exist
    #[error("source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// I/O error while reading the whole source file
    #[error("failed to read {}: {source}", path.display())]
    ReadFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// One candidate's declared boundaries are inconsistent
    #[error("malformed {kind} segment at offset {offset}: {reason}")]
    MalformedSegment {
        kind: FormatKind,
        offset: usize,
        reason: SkipReason,
    },

    /// Text or image decode of one fragment failed
    #[error("decode failure: {0}")]
    DecodeFailure(String),

    /// Writing one output file (or creating its directory) failed
    #[error("failed to persist {}: {source}", path.display())]
    PersistFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A heuristic pattern could not be built
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl DrillError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DrillError::SourceNotFound(_) => ErrorKind::SourceNotFound,
            DrillError::ReadFailure { .. } => ErrorKind::ReadFailure,
            DrillError::MalformedSegment { .. } => ErrorKind::MalformedSegment,
            DrillError::DecodeFailure(_) | DrillError::Pattern(_) => ErrorKind::DecodeFailure,
            DrillError::PersistFailure { .. } => ErrorKind::PersistFailure,
        }
    }
}

/// Stable, serializable error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SourceNotFound,
    ReadFailure,
    MalformedSegment,
    DecodeFailure,
    PersistFailure,
}

/// Why a single signature occurrence was not emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum SkipReason {
    /// No end-of-stream marker anywhere after the start
    #[error("no terminator after signature")]
    MissingTerminator,

    /// Terminator found but its trailing bytes run past the buffer
    #[error("terminator trailer runs past end of buffer")]
    TruncatedTrailer,

    /// Not enough bytes left to read the length field
    #[error("header truncated before length field")]
    TruncatedHeader,

    /// Declared length field is zero
    #[error("declared size is zero")]
    ZeroDeclaredSize,

    /// Declared length points past the end of the buffer
    #[error("declared size {declared} exceeds {available} available bytes")]
    DeclaredPastEnd { declared: u64, available: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let missing = DrillError::SourceNotFound(PathBuf::from("x.dwf"));
        assert_eq!(missing.kind(), ErrorKind::SourceNotFound);

        let segment = DrillError::MalformedSegment {
            kind: FormatKind::Png,
            offset: 4,
            reason: SkipReason::MissingTerminator,
        };
        assert_eq!(segment.kind(), ErrorKind::MalformedSegment);
        assert_eq!(
            segment.to_string(),
            "malformed png segment at offset 4: no terminator after signature"
        );
    }

    #[test]
    fn test_skip_reason_display() {
        let reason = SkipReason::DeclaredPastEnd {
            declared: 4096,
            available: 100,
        };
        assert_eq!(
            reason.to_string(),
            "declared size 4096 exceeds 100 available bytes"
        );
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::SourceNotFound).unwrap();
        assert_eq!(json, "\"source_not_found\"");
    }
}
