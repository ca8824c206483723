use agro_contracts::forms::FormInputs;
use agro_contracts::modules::AdvisoryModule;
use agro_contracts::prompts::{compose_prompt, ComposedPrompt};
use agro_contracts::schema::{AdvisoryResult, SchemaDescriptor};
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use crate::config::GatewayConfig;
use crate::error::AdvisoryError;
use crate::media::{encode_file, InlineMedia, MediaSummary};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// One structured-output request as handed to a backend.
#[derive(Debug, Clone)]
pub struct GenerateRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub response_schema: Value,
    pub media: Option<&'a InlineMedia>,
}

/// The remote model. Returns the raw reply text; the gateway owns
/// cleaning and parsing it.
pub trait QueryBackend: Send + Sync {
    fn name(&self) -> &str;
    fn generate(&self, api_key: &str, request: &GenerateRequest<'_>)
        -> Result<String, AdvisoryError>;
}

pub struct GeminiBackend {
    api_base: String,
    http: HttpClient,
}

impl GeminiBackend {
    pub fn new(api_base: &str) -> Self {
        Self {
            api_base: api_base.trim().trim_end_matches('/').to_string(),
            http: HttpClient::new(),
        }
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    /// Media part first, prompt text last.
    fn build_payload(request: &GenerateRequest<'_>) -> Value {
        let mut parts = Vec::new();
        if let Some(media) = request.media {
            parts.push(media.to_part());
        }
        parts.push(json!({ "text": request.prompt }));
        json!({
            "contents": [{
                "role": "user",
                "parts": parts,
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": request.response_schema,
            },
        })
    }

    fn extract_text(response_payload: &Value) -> Result<String, AdvisoryError> {
        let candidate = response_payload
            .get("candidates")
            .and_then(Value::as_array)
            .and_then(|rows| rows.first());
        let text = candidate
            .and_then(|candidate| candidate.get("content"))
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|part| part.get("text").and_then(Value::as_str))
                    .collect::<String>()
            })
            .unwrap_or_default();
        if !text.trim().is_empty() {
            return Ok(text);
        }

        let reason = response_payload
            .get("promptFeedback")
            .and_then(|feedback| feedback.get("blockReason"))
            .or_else(|| candidate.and_then(|candidate| candidate.get("finishReason")))
            .and_then(Value::as_str);
        Err(AdvisoryError::Parse(match reason {
            Some(reason) => format!("Gemini returned no text (reason: {reason})"),
            None => "Gemini returned no text".to_string(),
        }))
    }

    fn error_detail(body: &str) -> String {
        serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|payload| {
                payload
                    .get("error")
                    .and_then(|error| error.get("message"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| truncate_text(body.trim(), 512))
    }
}

impl QueryBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate(
        &self,
        api_key: &str,
        request: &GenerateRequest<'_>,
    ) -> Result<String, AdvisoryError> {
        let endpoint = self.endpoint_for_model(request.model);
        let payload = Self::build_payload(request);
        debug!(
            endpoint = %endpoint,
            has_media = request.media.is_some(),
            prompt_chars = request.prompt.chars().count(),
            "sending generateContent request"
        );

        let response = self
            .http
            .post(&endpoint)
            .header(API_KEY_HEADER, api_key)
            .json(&payload)
            .send()
            .map_err(|err| {
                AdvisoryError::Transport(format!("Gemini request failed: {}", err.without_url()))
            })?;
        let status = response.status();
        let body = response.text().map_err(|err| {
            AdvisoryError::Transport(format!(
                "Gemini response body read failed: {}",
                err.without_url()
            ))
        })?;
        if !status.is_success() {
            return Err(AdvisoryError::Transport(format!(
                "Gemini request failed ({}): {}",
                status.as_u16(),
                Self::error_detail(&body)
            )));
        }
        let parsed: Value = serde_json::from_str(&body).map_err(|err| {
            AdvisoryError::Parse(format!("Gemini returned invalid JSON payload: {err}"))
        })?;
        Self::extract_text(&parsed)
    }
}

/// A validated module reply and, when a file was attached, what was sent.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleAnswer {
    pub result: AdvisoryResult,
    pub media: Option<MediaSummary>,
}

/// Single chokepoint for every remote-model call.
pub struct AiQueryGateway {
    config: GatewayConfig,
    backend: Box<dyn QueryBackend>,
}

impl AiQueryGateway {
    pub fn new(config: GatewayConfig) -> Self {
        let backend = GeminiBackend::new(&config.api_base);
        Self::with_backend(config, backend)
    }

    pub fn with_backend<B: QueryBackend + 'static>(config: GatewayConfig, backend: B) -> Self {
        if !config.has_credential() {
            warn!("API key not configured; every advisory query will fail until it is set");
        }
        Self {
            config,
            backend: Box::new(backend),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn ensure_credential(&self) -> Result<&str, AdvisoryError> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(AdvisoryError::missing_credential)
    }

    /// Sends `prompt` (after `media`, if any) constrained to `schema` and
    /// parses the reply. One attempt, no retries.
    pub fn query(
        &self,
        prompt: &str,
        schema: &SchemaDescriptor,
        media: Option<&InlineMedia>,
    ) -> Result<Value, AdvisoryError> {
        self.query_unlogged(prompt, schema, media)
            .inspect_err(|err| log_failure("query", err))
    }

    /// Encodes the attachment, queries with the module schema and checks
    /// the reply against it.
    pub fn query_module(&self, composed: &ComposedPrompt) -> Result<ModuleAnswer, AdvisoryError> {
        self.query_module_unlogged(composed)
            .inspect_err(|err| log_failure(composed.module.slug(), err))
    }

    /// Composes the module prompt from `form`, then runs `query_module`.
    pub fn ask(
        &self,
        module: AdvisoryModule,
        form: &FormInputs,
    ) -> Result<ModuleAnswer, AdvisoryError> {
        let composed = compose_prompt(module, form).map_err(AdvisoryError::InvalidInput)?;
        self.query_module(&composed)
    }

    fn query_module_unlogged(
        &self,
        composed: &ComposedPrompt,
    ) -> Result<ModuleAnswer, AdvisoryError> {
        self.ensure_credential()?;
        let media = composed
            .attachment
            .as_deref()
            .map(encode_file)
            .transpose()?;
        let schema = composed.module.schema();
        let value = self.query_unlogged(&composed.prompt, schema, media.as_ref())?;
        let result = AdvisoryResult::from_value(schema, value).map_err(|detail| {
            AdvisoryError::Parse(format!("respuesta con formato inesperado: {detail}")).localized()
        })?;
        Ok(ModuleAnswer {
            result,
            media: media.as_ref().map(InlineMedia::summary),
        })
    }

    fn query_unlogged(
        &self,
        prompt: &str,
        schema: &SchemaDescriptor,
        media: Option<&InlineMedia>,
    ) -> Result<Value, AdvisoryError> {
        let api_key = self.ensure_credential()?;
        let request = GenerateRequest {
            model: &self.config.model,
            prompt,
            response_schema: schema.to_response_schema(),
            media,
        };
        let raw = self
            .backend
            .generate(api_key, &request)
            .map_err(AdvisoryError::localized)?;
        let cleaned = strip_json_fence(&raw);
        serde_json::from_str(cleaned).map_err(|err| {
            AdvisoryError::Parse(format!("la respuesta no es JSON válido: {err}")).localized()
        })
    }
}

fn log_failure(scope: &str, err: &AdvisoryError) {
    error!(scope, kind = err.kind(), error = %err, "advisory query failed");
}

/// Trims the reply and removes a surrounding markdown code fence
/// (```` ```json ```` or bare ```` ``` ````). Unfenced text comes back trimmed.
pub fn strip_json_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
    else {
        return trimmed;
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
