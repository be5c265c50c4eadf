//! Google Gemini `generateContent` client.

use std::time::Duration;

use assessa_core::conversation::{Part, Turn};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{AiError, GenerateRequest, LanguageModel};

const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl GeminiSettings {
    /// Read `GEMINI_*` variables. A missing API key is an error.
    pub fn from_env() -> Result<Self, AiError> {
        let api_key = non_empty_env("GEMINI_API_KEY")
            .ok_or_else(|| AiError::Config("GEMINI_API_KEY must be set".to_string()))?;
        let timeout_secs = non_empty_env("GEMINI_TIMEOUT_SECS")
            .map(|raw| {
                raw.parse::<u64>().map_err(|_| {
                    AiError::Config(format!("GEMINI_TIMEOUT_SECS must be an integer, got '{raw}'"))
                })
            })
            .transpose()?
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Ok(Self {
            api_key,
            model: non_empty_env("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: non_empty_env("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    settings: GeminiSettings,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(settings: GeminiSettings) -> Result<Self, AiError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;
        Ok(Self { settings, client })
    }

    fn api_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.model
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentBody<'a> {
    contents: &'a [Turn],
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 1.0,
            top_k: 1,
            max_output_tokens: 2048,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate.
    fn text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate(&self, request: GenerateRequest) -> Result<String, AiError> {
        let body = GenerateContentBody {
            contents: &request.contents,
            system_instruction: request.system_instruction.map(|text| SystemInstruction {
                parts: vec![Part { text }],
            }),
            generation_config: GenerationConfig::default(),
        };

        let response = self
            .client
            .post(self.api_url())
            .header("x-goog-api-key", &self.settings.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                status = status.as_u16(),
                model = %self.settings.model,
                "Gemini request returned non-success status"
            );
            return Err(AiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed = response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| AiError::Malformed(e.to_string()))?;

        parsed.text().ok_or(AiError::EmptyResponse)
    }
}
