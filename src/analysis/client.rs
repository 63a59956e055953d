//! Multimodal inference client - prompt plus PNG in, free text out.
//!
//! Backends:
//! - OpenAI-compatible chat completions over HTTP (LM Studio, Ollama, hosted)
//! - Anything else implementing [`InferenceClient`] (tests use a canned client)

use std::time::Duration;

use anyhow::{Context, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::config::InferenceConfig;

/// Characters of the prompt echoed in a fallback payload
pub const FALLBACK_PROMPT_CHARS: usize = 200;

// ============================================================================
// Client Trait
// ============================================================================

/// Trait for multimodal inference backends
pub trait InferenceClient: Send + Sync {
    /// Send a prompt and one PNG image, return the model's text
    fn describe(&self, prompt: &str, png: &[u8]) -> Result<String>;

    /// Backend name for reports
    fn backend(&self) -> &str;
}

// ============================================================================
// HTTP Client
// ============================================================================

/// OpenAI-compatible chat completions client with image input
pub struct HttpInferenceClient {
    endpoint: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
    api_key: Option<String>,
}

impl HttpInferenceClient {
    pub fn from_config(config: &InferenceConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout: config.timeout(),
            api_key: config.api_key(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Quick reachability check against the server's model listing
    pub fn probe(&self) -> bool {
        let models_url = self.endpoint.replace("/chat/completions", "/models");
        let mut request = ureq::get(&models_url).timeout(Duration::from_secs(2));
        if let Some(key) = &self.api_key {
            request = request.set("Authorization", &format!("Bearer {}", key));
        }
        request.call().is_ok()
    }

    fn payload(&self, prompt: &str, png: &[u8]) -> serde_json::Value {
        let image_b64 = base64::engine::general_purpose::STANDARD.encode(png);

        serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt },
                    {
                        "type": "image_url",
                        "image_url": { "url": format!("data:image/png;base64,{}", image_b64) }
                    }
                ]
            }]
        })
    }
}

impl InferenceClient for HttpInferenceClient {
    fn describe(&self, prompt: &str, png: &[u8]) -> Result<String> {
        let payload = self.payload(prompt, png);

        let mut request = ureq::post(&self.endpoint)
            .timeout(self.timeout)
            .set("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            request = request.set("Authorization", &format!("Bearer {}", key));
        }

        let response = request
            .send_json(&payload)
            .context("Failed to send image analysis request")?;

        let json: serde_json::Value = response
            .into_json()
            .context("Failed to parse JSON response")?;

        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .context("No message content in response")?;

        tracing::info!(chars = content.len(), "Image analysis response received");
        Ok(content.to_string())
    }

    fn backend(&self) -> &str {
        "http-chat-completions"
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Result of one inference call: real model text, or the canned fallback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InferenceOutcome {
    Real { text: String },
    Fallback { reason: String, payload: serde_json::Value },
}

impl InferenceOutcome {
    pub fn is_fallback(&self) -> bool {
        matches!(self, InferenceOutcome::Fallback { .. })
    }
}

/// Run the client; any error becomes a fallback outcome
pub fn infer(client: &dyn InferenceClient, prompt: &str, png: &[u8]) -> InferenceOutcome {
    tracing::info!(
        backend = client.backend(),
        png_size = png.len(),
        "Invoking image analysis model"
    );

    match client.describe(prompt, png) {
        Ok(text) => InferenceOutcome::Real { text },
        Err(e) => {
            tracing::warn!(
                error = %format!("{:#}", e),
                "Image analysis failed, using fallback analysis"
            );
            InferenceOutcome::Fallback {
                reason: format!("{:#}", e),
                payload: fallback_payload(prompt, png),
            }
        }
    }
}

/// Canned analysis used when the model cannot be reached
pub fn fallback_payload(prompt: &str, png: &[u8]) -> serde_json::Value {
    serde_json::json!({
        "analysis_method": "fallback_image_analysis",
        "note": "Image analysis model failed, using basic analysis",
        "prompt": truncate_prompt(prompt),
        "image_available": !png.is_empty(),
        "image_size_base64": base64_len(png.len()),
        "recommendation": "Check the inference endpoint configuration and try again.",
        "basic_analysis": {
            "image_detected": !png.is_empty(),
            "analysis_possible": "Image successfully extracted, detailed analysis available once the model is reachable",
            "suggested_analysis": [
                "Drawing type identification",
                "Structural element recognition",
                "Dimension and numerical information extraction",
                "Text and label recognition",
                "Line connectivity analysis"
            ]
        }
    })
}

fn truncate_prompt(prompt: &str) -> String {
    if prompt.chars().count() > FALLBACK_PROMPT_CHARS {
        let head: String = prompt.chars().take(FALLBACK_PROMPT_CHARS).collect();
        format!("{}...", head)
    } else {
        prompt.to_string()
    }
}

/// Length of the padded base64 encoding of `n` bytes
fn base64_len(n: usize) -> usize {
    n.div_ceil(3) * 4
}
