use thiserror::Error;

/// Shown ahead of every model or parse failure.
pub(crate) const MODEL_ERROR_PREFIX: &str =
    "Error al contactar el modelo de IA o procesar su respuesta";

/// Why an advisory query failed. Each variant carries the message shown to
/// the user; nothing else survives to the view.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdvisoryError {
    /// No API credential. Every query fails until the process is
    /// reconfigured.
    #[error("{0}")]
    Configuration(String),

    /// The remote call failed or returned a non-success status.
    #[error("{0}")]
    Transport(String),

    /// The remote call succeeded but its text is not the declared shape.
    #[error("{0}")]
    Parse(String),

    /// The attached file could not be read or encoded.
    #[error("{0}")]
    Media(String),

    /// The form is incomplete or holds a value the field does not accept.
    #[error("{0}")]
    InvalidInput(String),
}

impl AdvisoryError {
    pub fn missing_credential() -> Self {
        AdvisoryError::Configuration(
            "La clave de API no está configurada. Por favor, contacte al soporte técnico."
                .to_string(),
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AdvisoryError::Configuration(_) => "configuration",
            AdvisoryError::Transport(_) => "transport",
            AdvisoryError::Parse(_) => "parse",
            AdvisoryError::Media(_) => "media",
            AdvisoryError::InvalidInput(_) => "invalid_input",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AdvisoryError::Configuration(message)
            | AdvisoryError::Transport(message)
            | AdvisoryError::Parse(message)
            | AdvisoryError::Media(message)
            | AdvisoryError::InvalidInput(message) => message.as_str(),
        }
    }

    /// Adds the user-facing model-error prefix to transport and parse
    /// failures. Other kinds pass through untouched.
    pub(crate) fn localized(self) -> Self {
        match self {
            AdvisoryError::Transport(detail) => {
                AdvisoryError::Transport(format!("{MODEL_ERROR_PREFIX}: {detail}"))
            }
            AdvisoryError::Parse(detail) => {
                AdvisoryError::Parse(format!("{MODEL_ERROR_PREFIX}: {detail}"))
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AdvisoryError;

    #[test]
    fn display_is_the_bare_message() {
        let err = AdvisoryError::Media("no se pudo leer".to_string());
        assert_eq!(err.to_string(), "no se pudo leer");
        assert_eq!(err.message(), "no se pudo leer");
        assert_eq!(err.kind(), "media");
    }

    #[test]
    fn localized_prefixes_only_model_failures() {
        let transport = AdvisoryError::Transport("timeout".to_string()).localized();
        assert_eq!(
            transport.to_string(),
            "Error al contactar el modelo de IA o procesar su respuesta: timeout"
        );
        assert_eq!(transport.kind(), "transport");

        let config = AdvisoryError::missing_credential().localized();
        assert_eq!(config.kind(), "configuration");
        assert!(config.message().starts_with("La clave de API no está configurada"));
    }
}
