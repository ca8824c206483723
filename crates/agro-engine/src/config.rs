use std::env;
use std::fmt;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Credential lookup order.
const API_KEY_VARS: &[&str] = &["API_KEY", "GEMINI_API_KEY", "GOOGLE_API_KEY"];

/// Settings for the gateway, read once at startup and handed to it
/// explicitly.
#[derive(Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
}

impl GatewayConfig {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(non_empty_env)
    }

    /// Builds the config from any variable source; `from_env` passes the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = API_KEY_VARS.iter().find_map(|key| lookup(*key));
        let mut config = Self::new(api_key);
        if let Some(api_base) = lookup("GEMINI_API_BASE") {
            config = config.with_api_base(&api_base);
        }
        if let Some(model) = lookup("AGRO_MODEL") {
            config = config.with_model(&model);
        }
        config
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        let trimmed = api_key.trim();
        self.api_key = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        let trimmed = api_base.trim().trim_end_matches('/');
        if !trimmed.is_empty() {
            self.api_base = trimmed.to_string();
        }
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        let trimmed = model.trim();
        if !trimmed.is_empty() {
            self.model = trimmed.to_string();
        }
        self
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish()
    }
}

pub fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{GatewayConfig, DEFAULT_API_BASE, DEFAULT_MODEL};

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_any_variables() {
        let config = GatewayConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config.api_key, None);
        assert!(!config.has_credential());
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.model, DEFAULT_MODEL);
    }

    #[test]
    fn credential_lookup_prefers_api_key_then_gemini() {
        let config = GatewayConfig::from_lookup(lookup_from(&[
            ("GOOGLE_API_KEY", "google"),
            ("GEMINI_API_KEY", "gemini"),
        ]));
        assert_eq!(config.api_key.as_deref(), Some("gemini"));

        let config = GatewayConfig::from_lookup(lookup_from(&[
            ("API_KEY", "primary"),
            ("GEMINI_API_KEY", "gemini"),
        ]));
        assert_eq!(config.api_key.as_deref(), Some("primary"));
    }

    #[test]
    fn overrides_trim_and_ignore_blanks() {
        let config = GatewayConfig::from_lookup(lookup_from(&[
            ("GEMINI_API_BASE", "http://127.0.0.1:9000/v1beta/"),
            ("AGRO_MODEL", " gemini-2.5-pro "),
        ]))
        .with_model("   ")
        .with_api_key("  ");
        assert_eq!(config.api_base, "http://127.0.0.1:9000/v1beta");
        assert_eq!(config.model, "gemini-2.5-pro");
        assert_eq!(config.api_key, None);
    }

    #[test]
    fn debug_output_redacts_the_key() {
        let config = GatewayConfig::new(Some("secret-key".to_string()));
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret-key"));
        assert!(rendered.contains("<redacted>"));
    }
}
