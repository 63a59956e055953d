//! Text heuristics miner - printable runs, layer names, object hints.
//!
//! Only the first [`MAX_TEXT_RUNS`] printable runs in the buffer are ever
//! considered. Layer recovery downstream depends on that truncation, so the
//! cap and the other limits here are fixed, not tunable.

use std::collections::{BTreeMap, HashSet};

use regex::bytes::Regex as BytesRegex;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

use crate::core::HeaderInfo;
use crate::error::DrillError;

/// Minimum length of a printable run
pub const MIN_RUN_LEN: usize = 10;
/// Hard cap on the number of runs matched
pub const MAX_TEXT_RUNS: usize = 20;
/// Runs whose trimmed length is not above this are dropped
pub const MIN_TRIMMED_LEN: usize = 5;
/// Characters of a run kept in a view hint
pub const VIEW_DATA_CHARS: usize = 100;

/// Sentinel root layer name
pub const ROOT_LAYER: &str = "0";
/// Version used for the default layer when no header is available
pub const DEFAULT_LAYER_VERSION: &str = "V00.22";

/// Ordered layer-name patterns, all case-insensitive
const LAYER_PATTERNS: [&str; 3] = [
    r"Layer\s*([\w_-]+)",
    r"\(Layer\s+([^)]+)\)",
    r"layer\s*:?\s*([\w_-]+)",
];

/// A recovered layer name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerCandidate {
    pub name: String,
    pub visible: bool,
    pub color: Option<String>,
    pub objects_count: usize,
}

impl LayerCandidate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visible: true,
            color: None,
            objects_count: 0,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

/// A coarse, purely informational object hint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectHint {
    pub object_type: String,
    pub layer: String,
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl ObjectHint {
    fn new(object_type: &str, key: &str, value: serde_json::Value) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert(key.to_string(), value);
        Self {
            object_type: object_type.to_string(),
            layer: ROOT_LAYER.to_string(),
            properties,
        }
    }
}

/// Printable ASCII runs retained for mining, in buffer order
pub fn text_runs(data: &[u8]) -> Vec<String> {
    match try_text_runs(data) {
        Ok(runs) => runs,
        Err(e) => {
            tracing::warn!(error = %e, "Text run extraction failed");
            Vec::new()
        }
    }
}

fn try_text_runs(data: &[u8]) -> Result<Vec<String>, DrillError> {
    let run_re = BytesRegex::new(&format!(r"(?-u)[\x20-\x7E]{{{},}}", MIN_RUN_LEN))?;

    let runs = run_re
        .find_iter(data)
        .take(MAX_TEXT_RUNS)
        .filter_map(|m| match std::str::from_utf8(m.as_bytes()) {
            Ok(text) => Some(text.to_string()),
            Err(e) => {
                tracing::debug!(offset = m.start(), error = %e, "Skipping undecodable run");
                None
            }
        })
        .filter(|text| text.trim().len() > MIN_TRIMMED_LEN)
        .collect();

    Ok(runs)
}

/// Recover layer names from the retained runs.
///
/// With no matches, or if the pass fails as a whole, returns the two
/// default layers.
pub fn mine_layers(runs: &[String], header: Option<&HeaderInfo>) -> Vec<LayerCandidate> {
    match try_mine_layers(runs) {
        Ok(layers) if !layers.is_empty() => layers,
        Ok(_) => default_layers(header),
        Err(e) => {
            tracing::warn!(error = %e, "Layer mining failed, using default layers");
            default_layers(header)
        }
    }
}

fn try_mine_layers(runs: &[String]) -> Result<Vec<LayerCandidate>, DrillError> {
    let patterns = LAYER_PATTERNS
        .iter()
        .map(|p| RegexBuilder::new(p).case_insensitive(true).build())
        .collect::<Result<Vec<_>, _>>()?;

    let mut seen = HashSet::new();
    let mut layers = Vec::new();

    for run in runs {
        for pattern in &patterns {
            for caps in pattern.captures_iter(run) {
                let Some(name) = caps.get(1).map(|m| m.as_str().trim()) else {
                    continue;
                };
                if !name.is_empty() && seen.insert(name.to_string()) {
                    layers.push(LayerCandidate::new(name));
                }
            }
        }
    }

    Ok(layers)
}

/// Root layer plus one named after the format version
pub fn default_layers(header: Option<&HeaderInfo>) -> Vec<LayerCandidate> {
    let version = header
        .map(|h| h.version.as_str())
        .unwrap_or(DEFAULT_LAYER_VERSION);

    vec![
        LayerCandidate::new(ROOT_LAYER).with_color("white"),
        LayerCandidate::new(format!("DWF {}", version)),
    ]
}

/// Object hints from the retained runs. One run can yield both kinds.
pub fn mine_objects(runs: &[String]) -> Vec<ObjectHint> {
    let mut hints = Vec::new();

    for run in runs {
        let lower = run.to_lowercase();

        if lower.contains("image/") || lower.contains("embed") {
            hints.push(ObjectHint::new(
                "image",
                "content_type",
                serde_json::Value::from("embedded_image"),
            ));
        }

        if lower.contains("view") && run.chars().any(|c| c.is_ascii_digit()) {
            let view_data: String = run.chars().take(VIEW_DATA_CHARS).collect();
            hints.push(ObjectHint::new(
                "view",
                "view_data",
                serde_json::Value::from(view_data),
            ));
        }
    }

    hints
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runs(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_runs_split_on_non_printable() {
        let data = b"\x00\x01short\x00this is long enough\x7Fanother long run\x00";
        assert_eq!(
            text_runs(data),
            vec!["this is long enough", "another long run"]
        );
    }

    #[test]
    fn test_runs_cap_keeps_first_twenty_in_order() {
        let mut data = Vec::new();
        for i in 0..30 {
            data.extend_from_slice(format!("text section number {:02}", i).as_bytes());
            data.push(0);
        }

        let found = text_runs(&data);
        assert_eq!(found.len(), MAX_TEXT_RUNS);
        assert_eq!(found[0], "text section number 00");
        assert_eq!(found[19], "text section number 19");
    }

    #[test]
    fn test_cap_applies_before_trim_filter() {
        // 20 whitespace-heavy runs fill the cap; the real run after them is never seen
        let mut data = Vec::new();
        for _ in 0..MAX_TEXT_RUNS {
            data.extend_from_slice(b"   ab       ");
            data.push(0);
        }
        data.extend_from_slice(b"Layer Walls here");

        assert!(text_runs(&data).is_empty());
    }

    #[test]
    fn test_layer_patterns() {
        let found = mine_layers(
            &runs(&["(Layer Doors and Windows)", "layer: A-WALL stuff"]),
            None,
        );
        let names: Vec<&str> = found.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Doors", "Doors and Windows", "A-WALL"]);
        assert!(found.iter().all(|l| l.visible && l.objects_count == 0));
    }

    #[test]
    fn test_layers_deduplicated_case_sensitively() {
        let found = mine_layers(
            &runs(&["Layer Walls, Layer walls", "LAYER Walls again"]),
            None,
        );
        let names: Vec<&str> = found.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Walls", "walls"]);
    }

    #[test]
    fn test_default_layers_when_nothing_matches() {
        let header = HeaderInfo {
            version: "V06.00".to_string(),
            file_size: 10,
            application: None,
        };
        let found = mine_layers(&runs(&["nothing relevant here"]), Some(&header));
        assert_eq!(
            found,
            vec![
                LayerCandidate::new("0").with_color("white"),
                LayerCandidate::new("DWF V06.00"),
            ]
        );

        let without_header = mine_layers(&[], None);
        assert_eq!(without_header[1].name, "DWF V00.22");
    }

    #[test]
    fn test_object_hints() {
        let hints = mine_objects(&runs(&[
            "content image/png stream",
            "Named View 12 embedded",
            "plain text only",
        ]));

        let kinds: Vec<&str> = hints.iter().map(|h| h.object_type.as_str()).collect();
        assert_eq!(kinds, vec!["image", "image", "view"]);
        assert_eq!(
            hints[2].properties["view_data"],
            serde_json::json!("Named View 12 embedded")
        );
        assert!(hints.iter().all(|h| h.layer == ROOT_LAYER));
    }

    #[test]
    fn test_view_hint_truncates_to_hundred_chars() {
        let long = format!("view 1 {}", "x".repeat(300));
        let hints = mine_objects(&[long]);
        let data = hints[0].properties["view_data"].as_str().unwrap();
        assert_eq!(data.len(), VIEW_DATA_CHARS);
    }

    #[test]
    fn test_view_without_digit_is_ignored() {
        assert!(mine_objects(&runs(&["overview of plan"])).is_empty());
    }
}
