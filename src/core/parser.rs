//! Container metadata parse: header, layers, object summary, text samples.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::header::{infer_header, HeaderInfo};
use super::RawBuffer;
use crate::error::{DrillError, ErrorKind};
use crate::text::{mine_layers, mine_objects, text_runs, LayerCandidate};

/// Number of text runs echoed in the result
pub const SAMPLE_SECTIONS: usize = 5;

/// Source file facts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: String,
    pub size_bytes: u64,
    /// Size in MiB, rounded to two decimals
    pub size_mb: f64,
}

impl FileInfo {
    pub fn new(path: &Path, size_bytes: u64) -> Self {
        let mb = size_bytes as f64 / (1024.0 * 1024.0);
        Self {
            path: path.display().to_string(),
            size_bytes,
            size_mb: (mb * 100.0).round() / 100.0,
        }
    }
}

/// Object hint counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSummary {
    pub total_objects: usize,
    pub types: BTreeMap<String, usize>,
}

/// Everything recovered from one container. Contains no timestamps, so
/// parsing the same bytes twice yields an identical value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseResult {
    pub header: HeaderInfo,
    pub layers: Vec<LayerCandidate>,
    pub objects_summary: ObjectSummary,
    pub file_info: FileInfo,
    pub ascii_sections: Vec<String>,
}

/// Structured failure for a whole-file error
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct ParseFailure {
    /// Always true; marks the record as an error result
    pub error: bool,
    pub kind: ErrorKind,
    pub message: String,
    /// Present whenever the file size could still be read
    pub file_info: Option<FileInfo>,
}

impl ParseFailure {
    fn from_error(path: &Path, err: &DrillError) -> Self {
        let file_info = std::fs::metadata(path)
            .ok()
            .map(|meta| FileInfo::new(path, meta.len()));

        Self {
            error: true,
            kind: err.kind(),
            message: err.to_string(),
            file_info,
        }
    }
}

/// Read and parse a container file
pub fn parse_container(path: &Path) -> Result<ParseResult, ParseFailure> {
    tracing::info!(path = %path.display(), "Starting container parse");

    let buf = RawBuffer::from_file(path).map_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "Container parse failed");
        ParseFailure::from_error(path, &e)
    })?;

    Ok(parse_buffer(path, &buf))
}

/// Parse an already loaded buffer. Never fails.
pub fn parse_buffer(path: &Path, buf: &RawBuffer) -> ParseResult {
    let data = buf.as_bytes();
    let size = buf.len() as u64;

    let (header, runs) = rayon::join(|| infer_header(data, size), || text_runs(data));

    let layers = mine_layers(&runs, Some(&header));
    let objects = mine_objects(&runs);

    let mut types = BTreeMap::new();
    for hint in &objects {
        *types.entry(hint.object_type.clone()).or_insert(0) += 1;
    }

    tracing::info!(
        path = %path.display(),
        version = %header.version,
        layers = layers.len(),
        objects = objects.len(),
        "Container parse complete"
    );

    ParseResult {
        header,
        layers,
        objects_summary: ObjectSummary {
            total_objects: objects.len(),
            types,
        },
        file_info: FileInfo::new(path, size),
        ascii_sections: runs.into_iter().take(SAMPLE_SECTIONS).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_dwf(dir: &Path, name: &str, data: &[u8]) -> std::path::PathBuf {
        let p = dir.join(name);
        std::fs::write(&p, data).unwrap();
        p
    }

    #[test]
    fn test_parse_recovers_layers_and_objects() {
        let dir = tempfile::tempdir().unwrap();
        let mut data = b"(DWF V06.00)\x00\x00".to_vec();
        data.extend_from_slice(b"(Layer Electrical Plan)\x00");
        data.extend_from_slice(b"Named View 3 of 4\x00");
        data.extend_from_slice(b"mime image/png embedded\x00");
        let path = write_dwf(dir.path(), "plan.dwf", &data);

        let result = parse_container(&path).unwrap();
        assert_eq!(result.header.version, "V06.00");
        let names: Vec<&str> = result.layers.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Electrical", "Electrical Plan"]);
        assert_eq!(result.objects_summary.total_objects, 2);
        assert_eq!(result.objects_summary.types.get("view"), Some(&1));
        assert_eq!(result.objects_summary.types.get("image"), Some(&1));
        assert_eq!(result.file_info.size_bytes, data.len() as u64);
        assert_eq!(result.ascii_sections.len(), 4);
    }

    #[test]
    fn test_parse_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_dwf(dir.path(), "same.dwf", b"(DWF V00.55) Layer Roof sheet\x00");

        let first = serde_json::to_vec(&parse_container(&path).unwrap()).unwrap();
        let second = serde_json::to_vec(&parse_container(&path).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_sample_sections_capped() {
        let mut data = Vec::new();
        for i in 0..12 {
            data.extend_from_slice(format!("printable section {}", i).as_bytes());
            data.push(0);
        }
        let result = parse_buffer(Path::new("many.dwf"), &RawBuffer::from(data));
        assert_eq!(result.ascii_sections.len(), SAMPLE_SECTIONS);
        assert_eq!(result.ascii_sections[0], "printable section 0");
    }

    #[test]
    fn test_parse_missing_file_is_structured_failure() {
        let failure = parse_container(Path::new("/nonexistent/plan.dwf")).unwrap_err();
        assert!(failure.error);
        assert_eq!(failure.kind, ErrorKind::SourceNotFound);
        assert!(failure.file_info.is_none());
    }

    #[test]
    fn test_size_mb_rounding() {
        let info = FileInfo::new(Path::new("x.dwf"), 1_572_864);
        assert_eq!(info.size_mb, 1.5);
        assert_eq!(FileInfo::new(Path::new("x.dwf"), 0).size_mb, 0.0);
    }
}
