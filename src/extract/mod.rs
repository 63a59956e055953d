//! Sub-stream extractor - merge scanner output, summarize, persist.
//!
//! Persistence is a separate, optional step: each stream is written on its
//! own, and a failed write is recorded without touching the extraction
//! result or the remaining writes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::carve::{ExtractedStream, ScanOptions, Scanner, SkippedOccurrence};
use crate::core::{FormatKind, RawBuffer};
use crate::error::DrillError;

/// Serializable description of one extracted stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Ordinal in the extraction
    pub index: usize,
    /// Kind tag assigned by the scanner pass
    #[serde(rename = "type")]
    pub kind: String,
    /// Declared image format ("unknown" for unverified chunks)
    pub format: String,
    pub size: u64,
    /// Byte offset in the source file
    pub position: u64,
    pub blake3: String,
}

impl StreamInfo {
    pub fn from_stream(index: usize, stream: &ExtractedStream) -> Self {
        Self {
            index,
            kind: stream.kind.tag().to_string(),
            format: stream.kind.format_name().to_string(),
            size: stream.size as u64,
            position: stream.offset as u64,
            blake3: stream.digest(),
        }
    }
}

/// Aggregate view of an extraction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionSummary {
    pub total_images: usize,
    pub image_types: BTreeMap<String, usize>,
    pub total_size: u64,
    pub largest_image: Option<StreamInfo>,
}

/// One item that could not be written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistFailure {
    pub index: usize,
    pub path: PathBuf,
    pub error: String,
}

/// Result of writing streams to disk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistReport {
    pub output_dir: PathBuf,
    /// Paths written successfully, in stream order
    pub written: Vec<PathBuf>,
    pub failures: Vec<PersistFailure>,
}

/// Serializable record of one extraction run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub file_path: String,
    pub summary: ExtractionSummary,
    pub images: Vec<StreamInfo>,
    pub skipped: Vec<SkippedOccurrence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persisted: Option<PersistReport>,
}

/// All streams found in one source file
#[derive(Debug, Clone)]
pub struct Extraction {
    source: PathBuf,
    buffer_size: usize,
    streams: Vec<ExtractedStream>,
    skipped: Vec<SkippedOccurrence>,
}

impl Extraction {
    /// Read and scan a file
    pub fn from_file(path: &Path, options: ScanOptions) -> Result<Self, DrillError> {
        let buf = RawBuffer::from_file(path)?;
        Ok(Self::from_buffer(path, &buf, &Scanner::new(options)))
    }

    /// Scan an already loaded buffer. Never fails.
    pub fn from_buffer(source: &Path, buf: &RawBuffer, scanner: &Scanner) -> Self {
        let report = scanner.scan(buf);

        tracing::info!(
            source = %source.display(),
            buffer_size = buf.len(),
            streams = report.streams.len(),
            skipped = report.skipped.len(),
            "Stream extraction complete"
        );

        Self {
            source: source.to_path_buf(),
            buffer_size: buf.len(),
            streams: report.streams,
            skipped: report.skipped,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn streams(&self) -> &[ExtractedStream] {
        &self.streams
    }

    pub fn into_streams(self) -> Vec<ExtractedStream> {
        self.streams
    }

    /// Occurrences that were matched but not emitted
    pub fn skipped(&self) -> &[SkippedOccurrence] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.streams.iter().map(|s| s.size as u64).sum()
    }

    pub fn counts_by_kind(&self) -> BTreeMap<FormatKind, usize> {
        let mut counts = BTreeMap::new();
        for stream in &self.streams {
            *counts.entry(stream.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Largest stream by size; the first one wins a tie
    pub fn largest(&self) -> Option<(usize, &ExtractedStream)> {
        self.streams
            .iter()
            .enumerate()
            .reduce(|best, candidate| {
                if candidate.1.size > best.1.size {
                    candidate
                } else {
                    best
                }
            })
    }

    pub fn summary(&self) -> ExtractionSummary {
        ExtractionSummary {
            total_images: self.streams.len(),
            image_types: self
                .counts_by_kind()
                .into_iter()
                .map(|(kind, count)| (kind.tag().to_string(), count))
                .collect(),
            total_size: self.total_bytes(),
            largest_image: self
                .largest()
                .map(|(index, stream)| StreamInfo::from_stream(index, stream)),
        }
    }

    pub fn stream_infos(&self) -> Vec<StreamInfo> {
        self.streams
            .iter()
            .enumerate()
            .map(|(i, s)| StreamInfo::from_stream(i, s))
            .collect()
    }

    pub fn report(&self, persisted: Option<PersistReport>) -> ExtractionReport {
        ExtractionReport {
            file_path: self.source.display().to_string(),
            summary: self.summary(),
            images: self.stream_infos(),
            skipped: self.skipped.clone(),
            persisted,
        }
    }

    /// Base name of the source file without extension
    pub fn stem(&self) -> String {
        source_stem(&self.source)
    }

    /// Write every stream under `output_dir`
    pub fn persist(&self, output_dir: &Path) -> Result<PersistReport, DrillError> {
        persist_streams(&self.streams, &self.stem(), output_dir)
    }
}

/// Read a file and return every stream the scanner finds.
///
/// An input with no recognizable streams yields an empty vector.
pub fn extract_streams(path: &Path) -> Result<Vec<ExtractedStream>, DrillError> {
    Ok(Extraction::from_file(path, ScanOptions::default())?.into_streams())
}

/// Deterministic output name: `<stem>_image_<index>_<tag>.<ext>`
pub fn output_file_name(stem: &str, index: usize, kind: FormatKind) -> String {
    format!("{}_image_{}_{}.{}", stem, index, kind.tag(), kind.extension())
}

pub fn source_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "stream".to_string())
}

/// Write each stream to its own file, creating `output_dir` if needed.
///
/// Only a failure to create the directory is returned as an error; a
/// failed item write is logged, recorded in the report, and skipped.
pub fn persist_streams(
    streams: &[ExtractedStream],
    stem: &str,
    output_dir: &Path,
) -> Result<PersistReport, DrillError> {
    std::fs::create_dir_all(output_dir).map_err(|source| DrillError::PersistFailure {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let mut report = PersistReport {
        output_dir: output_dir.to_path_buf(),
        ..Default::default()
    };

    for (i, stream) in streams.iter().enumerate() {
        let out_path = output_dir.join(output_file_name(stem, i, stream.kind));
        match std::fs::write(&out_path, stream.data()) {
            Ok(()) => {
                tracing::debug!(
                    path = %out_path.display(),
                    size = stream.size,
                    "Stream saved"
                );
                report.written.push(out_path);
            }
            Err(e) => {
                let err = DrillError::PersistFailure {
                    path: out_path.clone(),
                    source: e,
                };
                tracing::warn!(
                    index = i,
                    offset = stream.offset,
                    size = stream.size,
                    error = %err,
                    "Failed to write extracted stream"
                );
                report.failures.push(PersistFailure {
                    index: i,
                    path: out_path,
                    error: err.to_string(),
                });
            }
        }
    }

    tracing::info!(
        output_dir = %output_dir.display(),
        written = report.written.len(),
        failed = report.failures.len(),
        "Persisted extracted streams"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carve::signatures::PNG_MAGIC;

    fn sample_buffer() -> Vec<u8> {
        let mut data = b"header Embed raster image\n".to_vec();
        data.extend_from_slice(PNG_MAGIC);
        data.extend_from_slice(b"pixels");
        data.extend_from_slice(b"IEND\x00\x00\x00\x00");
        data.extend_from_slice(&[0xFF, 0xD8, 0xFF, 0xE0, 9, 9, 0xFF, 0xD9]);
        data
    }

    fn extraction(data: Vec<u8>) -> Extraction {
        Extraction::from_buffer(
            Path::new("/drawings/site plan.dwf"),
            &RawBuffer::from(data),
            &Scanner::default(),
        )
    }

    #[test]
    fn test_summary_counts_and_largest() {
        let ex = extraction(sample_buffer());
        let summary = ex.summary();

        assert_eq!(summary.total_images, 3);
        assert_eq!(summary.image_types.get("dwg_embedded"), Some(&1));
        assert_eq!(summary.image_types.get("png"), Some(&1));
        assert_eq!(summary.image_types.get("jpeg"), Some(&1));
        assert_eq!(summary.total_size, ex.total_bytes());

        // The container window runs to the end of the buffer
        let largest = summary.largest_image.unwrap();
        assert_eq!(largest.kind, "dwg_embedded");
        assert_eq!(largest.format, "unknown");
        assert_eq!(largest.index, 0);
    }

    #[test]
    fn test_report_lists_streams_and_skips() {
        let mut data = sample_buffer();
        data.extend_from_slice(b"BM\x00\x10\x00\x00");
        let report = extraction(data).report(None);

        assert_eq!(report.images.len(), 3);
        assert_eq!(report.images[2].kind, "jpeg");
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].kind, FormatKind::Bmp);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["skipped"][0]["reason"], "declared_past_end");
        assert!(json.get("persisted").is_none());
    }

    #[test]
    fn test_largest_tie_prefers_first() {
        let mut data = vec![0xFF, 0xD8, 0xFF, 0x01, 0xFF, 0xD9];
        data.extend_from_slice(&[0xFF, 0xD8, 0xFF, 0x02, 0xFF, 0xD9]);
        let ex = extraction(data);

        let (index, stream) = ex.largest().unwrap();
        assert_eq!(index, 0);
        assert_eq!(stream.offset, 0);
    }

    #[test]
    fn test_empty_summary() {
        let summary = extraction(vec![0u8; 64]).summary();
        assert_eq!(summary, ExtractionSummary::default());
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(
            output_file_name("plan", 2, FormatKind::Png),
            "plan_image_2_png.png"
        );
        assert_eq!(
            output_file_name("plan", 0, FormatKind::ContainerEmbedded),
            "plan_image_0_dwg_embedded.bin"
        );
        assert_eq!(source_stem(Path::new("/a/b/site plan.dwf")), "site plan");
    }

    #[test]
    fn test_persist_writes_every_stream() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("out");
        let ex = extraction(sample_buffer());

        let report = ex.persist(&out).unwrap();
        assert_eq!(report.written.len(), 3);
        assert!(report.failures.is_empty());

        let png = std::fs::read(out.join("site plan_image_1_png.png")).unwrap();
        assert!(png.starts_with(PNG_MAGIC));
        assert_eq!(png.len(), ex.streams()[1].size);
    }

    #[test]
    fn test_persist_skips_failed_item() {
        let dir = tempfile::tempdir().unwrap();
        let ex = extraction(sample_buffer());

        // A directory squatting on the second file name makes that write fail
        std::fs::create_dir_all(dir.path().join("site plan_image_1_png.png")).unwrap();

        let report = ex.persist(dir.path()).unwrap();
        assert_eq!(report.written.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 1);
        assert!(report.written[1].ends_with("site plan_image_2_jpeg.jpeg"));
        assert_eq!(ex.len(), 3);
    }

    #[test]
    fn test_extract_streams_missing_file() {
        let err = extract_streams(Path::new("/nonexistent/x.dwf")).unwrap_err();
        assert!(matches!(err, DrillError::SourceNotFound(_)));
    }
}
