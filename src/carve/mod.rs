//! Signature scanner - locate embedded image streams in a raw container buffer.
//!
//! The container is treated as an undifferentiated byte sequence. Each
//! scanner pass is a pure function over the shared read-only buffer:
//!
//! - **Magic passes** (PNG, JPEG, BMP) match a fixed byte prefix and then
//!   resolve the end of the stream from a terminator marker or a declared
//!   length field
//! - **Container pass** matches loose textual embed markers and grabs a
//!   fixed-size window after each one, without verifying the format
//!
//! Every occurrence of a signature yields an [`Occurrence`]: either a found
//! stream or a skip with its reason. Passes never fail as a whole, and the
//! search for each magic resumes one byte after the previous match, so
//! overlapping candidates are all reported.

pub mod signatures;

use std::ops::Range;

use bytes::Bytes;
use rayon::prelude::*;
use regex::bytes::RegexBuilder;
use serde::{Deserialize, Serialize};

use crate::core::{FormatKind, RawBuffer};
use crate::error::{DrillError, SkipReason};
use signatures::*;

/// A contiguous byte range believed to encode one embedded image
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedStream {
    /// Kind assigned by the pass that found it
    pub kind: FormatKind,
    /// Byte offset in the source buffer where the stream starts
    pub offset: usize,
    /// Stream length in bytes
    pub size: usize,
    #[serde(skip)]
    data: Bytes,
}

impl ExtractedStream {
    fn new(kind: FormatKind, offset: usize, data: Bytes) -> Self {
        Self {
            kind,
            offset,
            size: data.len(),
            data,
        }
    }

    /// Exclusive end offset in the source buffer
    pub fn end(&self) -> usize {
        self.offset + self.size
    }

    pub fn range(&self) -> Range<usize> {
        self.offset..self.end()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Blake3 digest of the stream bytes, hex encoded
    pub fn digest(&self) -> String {
        hex::encode(blake3::hash(&self.data).as_bytes())
    }
}

/// A signature occurrence that was not emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedOccurrence {
    pub kind: FormatKind,
    pub offset: usize,
    #[serde(flatten)]
    pub reason: SkipReason,
}

impl SkippedOccurrence {
    pub fn to_error(&self) -> DrillError {
        DrillError::MalformedSegment {
            kind: self.kind,
            offset: self.offset,
            reason: self.reason,
        }
    }
}

/// Outcome of one signature occurrence
#[derive(Debug, Clone)]
pub enum Occurrence {
    Found(ExtractedStream),
    Skipped(SkippedOccurrence),
}

/// One independent scanner pass
#[derive(Debug, Clone, Copy)]
pub enum ScanPass {
    /// Textual embed markers followed by a fixed window
    ContainerEmbedded,
    /// Magic-number match with a format-specific boundary rule
    Magic(StreamSignature),
}

impl ScanPass {
    pub fn kind(&self) -> FormatKind {
        match self {
            ScanPass::ContainerEmbedded => FormatKind::ContainerEmbedded,
            ScanPass::Magic(sig) => sig.kind,
        }
    }

    /// Run this pass over the buffer
    pub fn run(&self, buf: &RawBuffer) -> Vec<Occurrence> {
        match self {
            ScanPass::ContainerEmbedded => scan_container_markers(buf),
            ScanPass::Magic(sig) => scan_magic(buf, sig),
        }
    }
}

/// All passes in result order
pub fn all_passes() -> Vec<ScanPass> {
    let mut passes = vec![ScanPass::ContainerEmbedded];
    passes.extend(magic_signatures().into_iter().map(ScanPass::Magic));
    passes
}

/// Options for a scan
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Only run passes for these kinds (None = all)
    pub kinds: Option<Vec<FormatKind>>,
    /// Run passes on the rayon pool
    pub parallel: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            kinds: None,
            parallel: true,
        }
    }
}

/// Everything the passes produced, in pass order then match order
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub streams: Vec<ExtractedStream>,
    pub skipped: Vec<SkippedOccurrence>,
}

impl ScanReport {
    fn absorb(&mut self, occurrences: Vec<Occurrence>) {
        for occurrence in occurrences {
            match occurrence {
                Occurrence::Found(stream) => self.streams.push(stream),
                Occurrence::Skipped(skip) => self.skipped.push(skip),
            }
        }
    }
}

/// The signature scanner
pub struct Scanner {
    passes: Vec<ScanPass>,
    parallel: bool,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new(ScanOptions::default())
    }
}

impl Scanner {
    pub fn new(options: ScanOptions) -> Self {
        let mut passes = all_passes();
        if let Some(ref kinds) = options.kinds {
            passes.retain(|p| kinds.contains(&p.kind()));
        }

        Self {
            passes,
            parallel: options.parallel,
        }
    }

    pub fn passes(&self) -> &[ScanPass] {
        &self.passes
    }

    /// Run every pass over the buffer. Never fails.
    pub fn scan(&self, buf: &RawBuffer) -> ScanReport {
        let per_pass: Vec<Vec<Occurrence>> = if self.parallel {
            self.passes.par_iter().map(|pass| pass.run(buf)).collect()
        } else {
            self.passes.iter().map(|pass| pass.run(buf)).collect()
        };

        let mut report = ScanReport::default();
        for occurrences in per_pass {
            report.absorb(occurrences);
        }

        tracing::debug!(
            buffer_size = buf.len(),
            passes = self.passes.len(),
            streams = report.streams.len(),
            skipped = report.skipped.len(),
            "Signature scan complete"
        );

        report
    }
}

/// Scan for one magic signature, resolving each occurrence's end offset
fn scan_magic(buf: &RawBuffer, sig: &StreamSignature) -> Vec<Occurrence> {
    let data = buf.as_bytes();
    let mut cursor = match sig.boundary {
        Boundary::Terminator { marker, .. } => Some(TerminatorCursor::new(data, marker)),
        Boundary::DeclaredLength { .. } => None,
    };

    find_all(data, sig.magic)
        .map(|start| {
            let end = match (sig.boundary, cursor.as_mut()) {
                (Boundary::Terminator { marker, trailer }, Some(cursor)) => {
                    terminator_end(cursor, start, marker.len() + trailer, data.len())
                }
                (Boundary::DeclaredLength { offset }, _) => declared_end(data, start, offset),
                (Boundary::Terminator { .. }, None) => Err(SkipReason::MissingTerminator),
            };

            let outcome = end.and_then(|end| {
                buf.slice(start..end).ok_or(SkipReason::DeclaredPastEnd {
                    declared: end.saturating_sub(start) as u64,
                    available: data.len().saturating_sub(start) as u64,
                })
            });

            match outcome {
                Ok(bytes) => Occurrence::Found(ExtractedStream::new(sig.kind, start, bytes)),
                Err(reason) => {
                    let skip = SkippedOccurrence {
                        kind: sig.kind,
                        offset: start,
                        reason,
                    };
                    tracing::debug!(error = %skip.to_error(), "Skipping occurrence");
                    Occurrence::Skipped(skip)
                }
            }
        })
        .collect()
}

/// End offset for a terminator-delimited stream
fn terminator_end(
    cursor: &mut TerminatorCursor<'_>,
    start: usize,
    tail_len: usize,
    buffer_len: usize,
) -> Result<usize, SkipReason> {
    let hit = cursor.next_from(start).ok_or(SkipReason::MissingTerminator)?;
    let end = hit.checked_add(tail_len).ok_or(SkipReason::TruncatedTrailer)?;
    if end > buffer_len {
        return Err(SkipReason::TruncatedTrailer);
    }
    Ok(end)
}

/// End offset for a stream that declares its own total length
fn declared_end(data: &[u8], start: usize, field_offset: usize) -> Result<usize, SkipReason> {
    let field = start
        .checked_add(field_offset)
        .ok_or(SkipReason::TruncatedHeader)?;
    let declared = read_u32_le(data, field).ok_or(SkipReason::TruncatedHeader)?;
    if declared == 0 {
        return Err(SkipReason::ZeroDeclaredSize);
    }

    let available = data.len() - start;
    if declared as usize > available {
        return Err(SkipReason::DeclaredPastEnd {
            declared: declared as u64,
            available: available as u64,
        });
    }
    Ok(start + declared as usize)
}

/// Grab a fixed window after each textual embed marker
fn scan_container_markers(buf: &RawBuffer) -> Vec<Occurrence> {
    let data = buf.as_bytes();
    let mut occurrences = Vec::new();

    for pattern in CONTAINER_MARKERS {
        let re = match RegexBuilder::new(pattern)
            .case_insensitive(true)
            .unicode(false)
            .build()
        {
            Ok(re) => re,
            Err(e) => {
                tracing::warn!(pattern, error = %e, "Skipping container marker pattern");
                continue;
            }
        };

        for m in re.find_iter(data) {
            let start = m.start();
            let end = start.saturating_add(CONTAINER_WINDOW).min(data.len());
            match buf.slice(start..end) {
                Some(bytes) => occurrences.push(Occurrence::Found(ExtractedStream::new(
                    FormatKind::ContainerEmbedded,
                    start,
                    bytes,
                ))),
                None => occurrences.push(Occurrence::Skipped(SkippedOccurrence {
                    kind: FormatKind::ContainerEmbedded,
                    offset: start,
                    reason: SkipReason::TruncatedHeader,
                })),
            }
        }
    }

    occurrences
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(body: &[u8]) -> Vec<u8> {
        let mut data = PNG_MAGIC.to_vec();
        data.extend_from_slice(body);
        data.extend_from_slice(b"IEND");
        data.extend_from_slice(&[0xAE, 0x42, 0x60, 0x82]);
        data
    }

    fn scan_kind(data: Vec<u8>, kind: FormatKind) -> ScanReport {
        Scanner::new(ScanOptions {
            kinds: Some(vec![kind]),
            parallel: false,
        })
        .scan(&RawBuffer::from(data))
    }

    // =====================================================================
    // PNG boundary resolution
    // =====================================================================

    #[test]
    fn test_png_ends_after_iend_crc() {
        let mut data = vec![0u8; 16];
        data.extend(png_bytes(b"\x00\x00\x00\x0dIHDR-some-body"));
        data.extend_from_slice(&[0u8; 32]);
        let iend = find_bytes(&data, b"IEND", 0).unwrap();

        let report = scan_kind(data, FormatKind::Png);
        assert_eq!(report.streams.len(), 1);
        let stream = &report.streams[0];
        assert_eq!(stream.kind, FormatKind::Png);
        assert_eq!(stream.offset, 16);
        assert_eq!(stream.end(), iend + 8);
        assert_eq!(stream.size, stream.data().len());
        assert!(stream.data().starts_with(PNG_MAGIC));
    }

    #[test]
    fn test_png_without_iend_is_skipped() {
        let mut data = PNG_MAGIC.to_vec();
        data.extend_from_slice(&[0x11u8; 200]);

        let report = scan_kind(data, FormatKind::Png);
        assert!(report.streams.is_empty());
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].reason, SkipReason::MissingTerminator);
    }

    #[test]
    fn test_png_with_cut_crc_is_skipped() {
        let mut data = PNG_MAGIC.to_vec();
        data.extend_from_slice(b"bodyIEND\xAE\x42");

        let report = scan_kind(data, FormatKind::Png);
        assert!(report.streams.is_empty());
        assert_eq!(report.skipped[0].reason, SkipReason::TruncatedTrailer);
    }

    #[test]
    fn test_two_pngs_share_no_terminator() {
        let mut data = png_bytes(b"first");
        data.extend(png_bytes(b"second"));

        let report = scan_kind(data, FormatKind::Png);
        assert_eq!(report.streams.len(), 2);
        assert!(report.streams[0].end() <= report.streams[1].offset);
    }

    // =====================================================================
    // JPEG boundary resolution
    // =====================================================================

    #[test]
    fn test_jpeg_footer() {
        let mut data = vec![0u8; 100];
        data[10..14].copy_from_slice(&[0xFF, 0xD8, 0xFF, 0xE0]);
        data[60] = 0xFF;
        data[61] = 0xD9;

        let report = scan_kind(data, FormatKind::Jpeg);
        assert_eq!(report.streams.len(), 1);
        assert_eq!(report.streams[0].offset, 10);
        assert_eq!(report.streams[0].end(), 62);
    }

    #[test]
    fn test_overlapping_jpeg_starts_both_reported() {
        // Two SOI markers before one EOI: both candidates end at the same EOI
        let mut data = vec![0xFF, 0xD8, 0xFF, 0xD8, 0xFF, 0xE0];
        data.extend_from_slice(&[0x22; 20]);
        data.extend_from_slice(&[0xFF, 0xD9]);

        let report = scan_kind(data, FormatKind::Jpeg);
        assert_eq!(report.streams.len(), 2);
        assert_eq!(report.streams[0].offset, 0);
        assert_eq!(report.streams[1].offset, 2);
        assert_eq!(report.streams[0].end(), report.streams[1].end());
    }

    #[test]
    fn test_jpeg_without_eoi_is_skipped() {
        let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0];
        data.extend_from_slice(&[0x00; 64]);

        let report = scan_kind(data, FormatKind::Jpeg);
        assert!(report.streams.is_empty());
        assert_eq!(report.skipped.len(), 1);
    }

    // =====================================================================
    // BMP declared length
    // =====================================================================

    #[test]
    fn test_bmp_declared_size() {
        let mut data = vec![0u8; 8];
        data.extend_from_slice(b"BM");
        data.extend_from_slice(&64u32.to_le_bytes());
        data.resize(8 + 64 + 10, 0);

        let report = scan_kind(data, FormatKind::Bmp);
        assert_eq!(report.streams.len(), 1);
        assert_eq!(report.streams[0].offset, 8);
        assert_eq!(report.streams[0].size, 64);
    }

    #[test]
    fn test_bmp_past_end_is_skipped() {
        let mut data = b"BM".to_vec();
        data.extend_from_slice(&4096u32.to_le_bytes());
        data.resize(100, 0);

        let report = scan_kind(data, FormatKind::Bmp);
        assert!(report.streams.is_empty());
        assert_eq!(
            report.skipped[0].reason,
            SkipReason::DeclaredPastEnd {
                declared: 4096,
                available: 100
            }
        );
    }

    #[test]
    fn test_bmp_zero_and_truncated_headers() {
        let mut data = b"BM\x00\x00\x00\x00".to_vec();
        data.extend_from_slice(b"xxBM\x01");

        let report = scan_kind(data, FormatKind::Bmp);
        assert!(report.streams.is_empty());
        let reasons: Vec<SkipReason> = report.skipped.iter().map(|s| s.reason).collect();
        assert_eq!(
            reasons,
            vec![SkipReason::ZeroDeclaredSize, SkipReason::TruncatedHeader]
        );
    }

    #[test]
    fn test_skipped_occurrence_is_malformed_segment() {
        let mut data = b"BM".to_vec();
        data.extend_from_slice(&4096u32.to_le_bytes());

        let report = scan_kind(data, FormatKind::Bmp);
        let err = report.skipped[0].to_error();
        assert_eq!(err.kind(), crate::error::ErrorKind::MalformedSegment);
        assert_eq!(
            err.to_string(),
            "malformed bmp segment at offset 0: declared size 4096 exceeds 6 available bytes"
        );
    }

    // =====================================================================
    // Container markers
    // =====================================================================

    #[test]
    fn test_container_marker_window_is_capped() {
        let mut data = vec![0u8; 10];
        data.extend_from_slice(b"IMAGE/VND.DWG");
        data.resize(10 + CONTAINER_WINDOW + 500, 0x41);

        let report = scan_kind(data, FormatKind::ContainerEmbedded);
        assert_eq!(report.streams.len(), 1);
        assert_eq!(report.streams[0].offset, 10);
        assert_eq!(report.streams[0].size, CONTAINER_WINDOW);
    }

    #[test]
    fn test_container_marker_window_stops_at_buffer_end() {
        let data = b"..embedded raster image..".to_vec();
        let report = scan_kind(data, FormatKind::ContainerEmbedded);
        assert_eq!(report.streams.len(), 1);
        assert_eq!(report.streams[0].offset, 2);
        assert_eq!(report.streams[0].end(), 25);
    }

    #[test]
    fn test_container_marker_does_not_cross_newline() {
        let data = b"Embed\nimage".to_vec();
        let report = scan_kind(data, FormatKind::ContainerEmbedded);
        assert!(report.streams.is_empty());
    }

    // =====================================================================
    // Whole scanner
    // =====================================================================

    #[test]
    fn test_pass_order_is_stable() {
        let kinds: Vec<FormatKind> = all_passes().iter().map(|p| p.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                FormatKind::ContainerEmbedded,
                FormatKind::Png,
                FormatKind::Jpeg,
                FormatKind::Bmp
            ]
        );
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut data = b"AutoCAD raster image follows ".to_vec();
        data.extend(png_bytes(b"payload"));
        data.extend_from_slice(&[0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3, 0xFF, 0xD9]);
        data.extend_from_slice(b"BM\x0a\x00\x00\x00abcd");
        let buf = RawBuffer::from(data);

        let seq = Scanner::new(ScanOptions {
            kinds: None,
            parallel: false,
        })
        .scan(&buf);
        let par = Scanner::default().scan(&buf);

        let seq_ranges: Vec<_> = seq.streams.iter().map(|s| (s.kind, s.range())).collect();
        let par_ranges: Vec<_> = par.streams.iter().map(|s| (s.kind, s.range())).collect();
        assert_eq!(seq_ranges, par_ranges);
        assert_eq!(seq_ranges[0].0, FormatKind::ContainerEmbedded);
    }

    #[test]
    fn test_empty_buffer_yields_nothing() {
        let report = Scanner::default().scan(&RawBuffer::default());
        assert!(report.streams.is_empty());
        assert!(report.skipped.is_empty());
    }
}
