//! Advisory query engine: the Gemini gateway, inline media encoding and the
//! per-module controllers that drive them.

mod config;
mod controller;
mod error;
mod gateway;
mod media;
#[cfg(test)]
mod testing;

pub use config::{non_empty_env, GatewayConfig, DEFAULT_API_BASE, DEFAULT_MODEL};
pub use controller::{
    Completion, ControllerState, ControllerView, ModuleController, PreparedQuery, Ticket,
};
pub use error::AdvisoryError;
pub use gateway::{
    strip_json_fence, AiQueryGateway, GeminiBackend, GenerateRequest, ModuleAnswer, QueryBackend,
};
pub use media::{encode_bytes, encode_file, mime_for_path, InlineMedia, MediaSummary};
