use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use crate::config::GatewayConfig;
use crate::error::AdvisoryError;
use crate::gateway::{GenerateRequest, QueryBackend};

/// What the stub saw for one `generate` call.
#[derive(Debug, Clone)]
pub(crate) struct SeenRequest {
    pub model: String,
    pub prompt: String,
    pub response_schema: Value,
    pub media_mime: Option<String>,
}

/// Canned backend. Replies are served in order; the last one repeats.
pub(crate) struct StubBackend {
    replies: Mutex<VecDeque<Result<String, AdvisoryError>>>,
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<SeenRequest>>>,
}

impl StubBackend {
    pub fn replying<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_results(replies.into_iter().map(|reply| Ok(reply.into())))
    }

    pub fn failing(err: AdvisoryError) -> Self {
        Self::with_results([Err(err)])
    }

    pub fn with_results<I>(results: I) -> Self
    where
        I: IntoIterator<Item = Result<String, AdvisoryError>>,
    {
        Self {
            replies: Mutex::new(results.into_iter().collect()),
            calls: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    pub fn requests(&self) -> Arc<Mutex<Vec<SeenRequest>>> {
        Arc::clone(&self.requests)
    }
}

impl QueryBackend for StubBackend {
    fn name(&self) -> &str {
        "stub"
    }

    fn generate(
        &self,
        _api_key: &str,
        request: &GenerateRequest<'_>,
    ) -> Result<String, AdvisoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(SeenRequest {
                model: request.model.to_string(),
                prompt: request.prompt.to_string(),
                response_schema: request.response_schema.clone(),
                media_mime: request.media.map(|media| media.mime_type.clone()),
            });
        }
        let mut replies = self
            .replies
            .lock()
            .map_err(|_| AdvisoryError::Transport("stub lock poisoned".to_string()))?;
        let next = if replies.len() > 1 {
            replies.pop_front()
        } else {
            replies.front().cloned()
        };
        next.unwrap_or_else(|| Err(AdvisoryError::Transport("stub has no reply".to_string())))
    }
}

pub(crate) fn keyed_config() -> GatewayConfig {
    GatewayConfig::new(Some("test-key".to_string()))
}

pub(crate) fn clima_reply(forecast: &str) -> Value {
    json!({
        "forecast": { "title": "Pronóstico", "content": forecast },
        "recommendations": { "title": "Acciones", "items": ["Regar de noche", "Cubrir plántulas"] },
        "practice": { "title": "Práctica", "content": "Cobertura vegetal" },
        "geolocation": { "title": "Geolocalización", "content": "Requisito UE" },
    })
}
