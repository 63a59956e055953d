//! Header/version inference from the raw buffer

use regex::bytes::Regex;
use serde::{Deserialize, Serialize};

use crate::carve::signatures::find_bytes;
use crate::error::DrillError;

/// Version string used when no marker is present
pub const UNKNOWN_VERSION: &str = "Unknown";

/// Release tags checked when no explicit application marker is found
const RELEASE_TAGS: [&str; 4] = ["r13", "r14", "r2000", "AutoCAD"];

/// Declared format version and authoring application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderInfo {
    /// `V<major>.<minor>` or `Unknown`
    pub version: String,
    pub file_size: u64,
    pub application: Option<String>,
}

impl HeaderInfo {
    pub fn unknown(file_size: u64) -> Self {
        Self {
            version: UNKNOWN_VERSION.to_string(),
            file_size,
            application: None,
        }
    }
}

/// Infer the header. Never fails; any problem yields [`HeaderInfo::unknown`].
pub fn infer_header(data: &[u8], file_size: u64) -> HeaderInfo {
    match try_infer_header(data, file_size) {
        Ok(header) => header,
        Err(e) => {
            tracing::warn!(error = %e, "Header inference failed, using unknown header");
            HeaderInfo::unknown(file_size)
        }
    }
}

fn try_infer_header(data: &[u8], file_size: u64) -> Result<HeaderInfo, DrillError> {
    let version_re = Regex::new(r"(?-u)DWF V([0-9]+\.[0-9]+)")?;
    let version = version_re
        .captures(data)
        .and_then(|caps| caps.get(1))
        .map(|m| format!("V{}", ascii_lossy(m.as_bytes())))
        .unwrap_or_else(|| UNKNOWN_VERSION.to_string());

    let app_re = Regex::new(r"(?-u)AutoCAD[- ]([^\x00-\x0F]+)")?;
    let application = app_re
        .captures(data)
        .and_then(|caps| caps.get(1))
        .map(|m| ascii_lossy(m.as_bytes()).trim().to_string())
        .filter(|app| !app.is_empty())
        .or_else(|| first_release_tag(data).map(str::to_string));

    Ok(HeaderInfo {
        version,
        file_size,
        application,
    })
}

/// The release tag appearing earliest in the buffer
fn first_release_tag(data: &[u8]) -> Option<&'static str> {
    RELEASE_TAGS
        .iter()
        .filter_map(|tag| find_bytes(data, tag.as_bytes(), 0).map(|pos| (pos, *tag)))
        .min_by_key(|&(pos, _)| pos)
        .map(|(_, tag)| tag)
}

/// Decode as ASCII, dropping any byte outside the ASCII range
fn ascii_lossy(bytes: &[u8]) -> String {
    bytes
        .iter()
        .filter(|b| b.is_ascii())
        .map(|&b| b as char)
        .collect()
}
