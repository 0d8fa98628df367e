/// Gemini-backed decision oracle
///
/// Sends the system instruction, the few-shot exchanges and the live request
/// (plus the chart image when there is one) in a single `generateContent`
/// call with JSON-constrained output.
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::prompt::{render_request, FewShotAssets};
use super::{parse_decision, DecisionOracle};
use crate::error::BotError;
use crate::models::{Decision, DecisionRequest};
use crate::Result;

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.5-pro";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<Blob>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Blob {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: i32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    fn image(mime_type: &str, bytes: &[u8]) -> Self {
        Self {
            text: None,
            inline_data: Some(Blob {
                mime_type: mime_type.to_string(),
                data: base64::engine::general_purpose::STANDARD.encode(bytes),
            }),
        }
    }
}

impl GenerateResponse {
    /// Answer text of the first candidate, thoughts left out
    fn answer_text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter(|p| !p.thought)
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

/// Concatenate the answer text of every `data:` event in an SSE body
fn collect_stream(body: &str) -> Result<String> {
    let mut text = String::new();

    for line in body.lines() {
        let Some(payload) = line.strip_prefix("data:") else {
            continue;
        };
        let chunk: GenerateResponse = serde_json::from_str(payload.trim()).map_err(|e| {
            BotError::OracleUnavailable(format!("bad stream chunk: {} ({})", e, payload))
        })?;
        text.push_str(&chunk.answer_text());
    }

    Ok(text)
}

pub struct GeminiOracle {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    stream: bool,
    thinking_budget: Option<i32>,
    assets: FewShotAssets,
}

impl GeminiOracle {
    /// `api_key` may be absent; every `decide` call then fails as unavailable
    pub fn new(
        api_key: Option<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
        assets: FewShotAssets,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BotError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            stream: false,
            thinking_budget: None,
            assets,
        })
    }

    /// Use `streamGenerateContent` and stitch the chunks together
    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// `-1` lets the model pick its own thinking budget
    pub fn with_thinking_budget(mut self, budget: Option<i32>) -> Self {
        self.thinking_budget = budget;
        self
    }

    fn build_request(&self, request: &DecisionRequest) -> Result<GenerateRequest> {
        let mut contents = Vec::with_capacity(self.assets.examples.len() * 2 + 1);

        for example in &self.assets.examples {
            contents.push(Content {
                role: Some("user"),
                parts: vec![Part::text(example.request.clone())],
            });
            contents.push(Content {
                role: Some("model"),
                parts: vec![
                    Part::text(example.reasoning.clone()),
                    Part::text(example.response.clone()),
                ],
            });
        }

        let mut live_parts = vec![Part::text(render_request(&self.assets, request)?)];
        if let Some(chart) = &request.chart {
            live_parts.push(Part::image(&chart.mime_type, &chart.bytes));
        }
        contents.push(Content {
            role: Some("user"),
            parts: live_parts,
        });

        Ok(GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part::text(self.assets.system_instruction.clone())],
            },
            contents,
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                thinking_config: self
                    .thinking_budget
                    .map(|thinking_budget| ThinkingConfig { thinking_budget }),
            },
        })
    }

    fn endpoint(&self) -> String {
        if self.stream {
            format!(
                "{}/models/{}:streamGenerateContent?alt=sse",
                self.base_url, self.model
            )
        } else {
            format!("{}/models/{}:generateContent", self.base_url, self.model)
        }
    }

    /// Raw answer text from the model
    async fn generate(&self, api_key: &str, body: &GenerateRequest) -> Result<String> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| BotError::OracleUnavailable(format!("network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::OracleUnavailable(format!(
                "Gemini API error {}: {}",
                status, body
            )));
        }

        if self.stream {
            let body = response
                .text()
                .await
                .map_err(|e| BotError::OracleUnavailable(format!("stream read error: {}", e)))?;
            collect_stream(&body)
        } else {
            let parsed: GenerateResponse = response
                .json()
                .await
                .map_err(|e| BotError::OracleUnavailable(format!("JSON decode error: {}", e)))?;
            Ok(parsed.answer_text())
        }
    }
}

#[async_trait]
impl DecisionOracle for GeminiOracle {
    async fn decide(&self, request: &DecisionRequest) -> Result<Decision> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| BotError::OracleUnavailable("GEMINI_API_KEY is not set".to_string()))?;

        let body = self.build_request(request)?;
        tracing::debug!(
            model = %self.model,
            turns = body.contents.len(),
            image = request.chart.is_some(),
            "Requesting decision"
        );

        let text = self.generate(api_key, &body).await?;
        tracing::debug!("Oracle raw response: {}", text);

        parse_decision(&text)
    }
}
