//! Signature table for the embedded-stream scanner.
//!
//! Each signature defines the magic bytes that open a stream and how its
//! end is found: a terminator marker plus trailing bytes, or a declared
//! length field read from the stream's own header.

use crate::core::FormatKind;

pub const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
pub const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
pub const BMP_MAGIC: &[u8] = b"BM";
pub const GIF87_MAGIC: &[u8] = b"GIF87a";
pub const GIF89_MAGIC: &[u8] = b"GIF89a";
pub const RIFF_MAGIC: &[u8] = b"RIFF";
pub const WEBP_FOURCC: &[u8] = b"WEBP";

/// Largest window grabbed after a textual embed marker
pub const CONTAINER_WINDOW: usize = 50_000;

/// Case-insensitive markers for images embedded by the authoring application.
/// `.` never crosses a newline byte.
pub const CONTAINER_MARKERS: [&str; 3] = [r"image/vnd\.dwg", r"Embed.*?image", r"AutoCAD.*?image"];

/// How the end of a stream is located
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// First occurrence of `marker` at or after the start, plus `marker.len() + trailer` bytes
    Terminator {
        marker: &'static [u8],
        trailer: usize,
    },
    /// Little-endian u32 total length at `offset` bytes past the start
    DeclaredLength { offset: usize },
}

/// A magic-number signature for one scanner pass
#[derive(Debug, Clone, Copy)]
pub struct StreamSignature {
    pub kind: FormatKind,
    pub magic: &'static [u8],
    pub boundary: Boundary,
}

/// PNG ends at `IEND` followed by its 4-byte CRC
pub const PNG: StreamSignature = StreamSignature {
    kind: FormatKind::Png,
    magic: PNG_MAGIC,
    boundary: Boundary::Terminator {
        marker: b"IEND",
        trailer: 4,
    },
};

/// JPEG ends at the EOI marker
pub const JPEG: StreamSignature = StreamSignature {
    kind: FormatKind::Jpeg,
    magic: JPEG_MAGIC,
    boundary: Boundary::Terminator {
        marker: &[0xFF, 0xD9],
        trailer: 0,
    },
};

/// BMP carries its total file size at bytes 2-5
pub const BMP: StreamSignature = StreamSignature {
    kind: FormatKind::Bmp,
    magic: BMP_MAGIC,
    boundary: Boundary::DeclaredLength { offset: 2 },
};

/// Magic-number passes in scan order
pub fn magic_signatures() -> [StreamSignature; 3] {
    [PNG, JPEG, BMP]
}

/// Find `needle` in `haystack` starting at `from`
pub(crate) fn find_bytes(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    let nlen = needle.len();
    if nlen == 0 || from >= haystack.len() || haystack.len() - from < nlen {
        return None;
    }

    haystack[from..]
        .windows(nlen)
        .position(|w| w == needle)
        .map(|pos| pos + from)
}

/// Iterator over every start offset of `needle`, resuming one byte after each match
pub(crate) fn find_all<'a>(
    haystack: &'a [u8],
    needle: &'static [u8],
) -> impl Iterator<Item = usize> + 'a {
    let mut next = 0usize;
    std::iter::from_fn(move || {
        let pos = find_bytes(haystack, needle, next)?;
        next = pos + 1;
        Some(pos)
    })
}

/// Memoized forward search for a terminator marker.
///
/// Successive lookups from increasing start offsets reuse the previous
/// hit while it is still ahead of the start, and stop searching entirely
/// once the marker is known to be absent from the rest of the buffer.
pub(crate) struct TerminatorCursor<'a> {
    haystack: &'a [u8],
    marker: &'static [u8],
    last_hit: Option<usize>,
    exhausted_from: Option<usize>,
}

impl<'a> TerminatorCursor<'a> {
    pub fn new(haystack: &'a [u8], marker: &'static [u8]) -> Self {
        Self {
            haystack,
            marker,
            last_hit: None,
            exhausted_from: None,
        }
    }

    /// First marker position at or after `from`
    pub fn next_from(&mut self, from: usize) -> Option<usize> {
        if let Some(hit) = self.last_hit {
            if hit >= from {
                return Some(hit);
            }
        }
        if let Some(exhausted) = self.exhausted_from {
            if from >= exhausted {
                return None;
            }
        }

        match find_bytes(self.haystack, self.marker, from) {
            Some(hit) => {
                self.last_hit = Some(hit);
                Some(hit)
            }
            None => {
                self.exhausted_from = Some(from);
                None
            }
        }
    }
}

/// Read a little-endian u32 at `pos`
pub(crate) fn read_u32_le(data: &[u8], pos: usize) -> Option<u32> {
    let end = pos.checked_add(4)?;
    let bytes = data.get(pos..end)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Detect a stream's true format from its leading magic bytes
pub fn sniff_format(data: &[u8]) -> FormatKind {
    if data.starts_with(PNG_MAGIC) {
        FormatKind::Png
    } else if data.starts_with(JPEG_MAGIC) {
        FormatKind::Jpeg
    } else if data.starts_with(BMP_MAGIC) {
        FormatKind::Bmp
    } else if data.starts_with(GIF87_MAGIC) || data.starts_with(GIF89_MAGIC) {
        FormatKind::Gif
    } else if data.starts_with(RIFF_MAGIC)
        && find_bytes(&data[..data.len().min(12)], WEBP_FOURCC, 0).is_some()
    {
        FormatKind::Webp
    } else {
        FormatKind::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_bytes_basic() {
        assert_eq!(find_bytes(b"abcIENDxyz", b"IEND", 0), Some(3));
        assert_eq!(find_bytes(b"abcIENDxyz", b"IEND", 4), None);
        assert_eq!(find_bytes(b"ab", b"IEND", 0), None);
        assert_eq!(find_bytes(b"", b"x", 0), None);
        assert_eq!(find_bytes(b"abc", b"c", 9), None);
    }

    #[test]
    fn test_find_all_overlapping() {
        let hits: Vec<usize> = find_all(b"BMBMBBM", BMP_MAGIC).collect();
        assert_eq!(hits, vec![0, 2, 5]);
    }

    #[test]
    fn test_terminator_cursor_reuses_hit() {
        let data = b"....IEND....IEND";
        let mut cursor = TerminatorCursor::new(data, b"IEND");
        assert_eq!(cursor.next_from(0), Some(4));
        assert_eq!(cursor.next_from(2), Some(4));
        assert_eq!(cursor.next_from(5), Some(12));
        assert_eq!(cursor.next_from(13), None);
        assert_eq!(cursor.next_from(14), None);
    }

    #[test]
    fn test_read_u32_le_bounds() {
        assert_eq!(read_u32_le(&[0x00, 0x04, 0, 0], 0), Some(1024));
        assert_eq!(read_u32_le(&[1, 2, 3], 0), None);
        assert_eq!(read_u32_le(&[1, 2, 3, 4], usize::MAX), None);
    }

    #[test]
    fn test_sniff_format() {
        assert_eq!(sniff_format(PNG_MAGIC), FormatKind::Png);
        assert_eq!(sniff_format(&[0xFF, 0xD8, 0xFF, 0xE0]), FormatKind::Jpeg);
        assert_eq!(sniff_format(b"BM\x00\x00"), FormatKind::Bmp);
        assert_eq!(sniff_format(b"GIF89a...."), FormatKind::Gif);
        assert_eq!(sniff_format(b"RIFF\x10\x00\x00\x00WEBPVP8 "), FormatKind::Webp);
        assert_eq!(sniff_format(b"RIFF\x10\x00\x00\x00WAVE"), FormatKind::Unknown);
        assert_eq!(sniff_format(b"hello"), FormatKind::Unknown);
        assert_eq!(sniff_format(&[]), FormatKind::Unknown);
    }
}
