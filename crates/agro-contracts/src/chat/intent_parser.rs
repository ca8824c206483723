use std::collections::BTreeMap;

use serde_json::Value;

use super::command_registry::{
    CommandSpec, FIELD_COMMAND, NO_ARG_COMMANDS, RAW_ARG_COMMANDS, SINGLE_PATH_COMMANDS,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: String,
    pub raw: String,
    pub command_args: BTreeMap<String, Value>,
}

impl Intent {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            command_args: BTreeMap::new(),
        }
    }

    fn with_arg(mut self, key: &str, value: impl Into<String>) -> Self {
        self.command_args
            .insert(key.to_string(), Value::String(value.into()));
        self
    }

    pub fn arg(&self, key: &str) -> Option<&str> {
        self.command_args.get(key).and_then(Value::as_str)
    }
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

/// Strips one level of shell quoting. Unquoted text is kept verbatim so
/// backslashes in values and Windows paths survive.
fn unquote(arg: &str) -> String {
    let trimmed = arg.trim();
    if !trimmed.starts_with(['"', '\'']) {
        return trimmed.to_string();
    }
    match shell_words::split(trimmed) {
        Ok(parts) if parts.len() == 1 => parts[0].clone(),
        _ => trimmed.to_string(),
    }
}

/// Splits `campo valor...` or `campo=valor...`.
fn parse_field_arg(arg: &str) -> Option<(String, String)> {
    let trimmed = arg.trim();
    let name_len = trimmed
        .chars()
        .take_while(|ch| !ch.is_whitespace() && *ch != '=')
        .map(char::len_utf8)
        .sum::<usize>();
    if name_len == 0 {
        return None;
    }
    let name = &trimmed[..name_len];
    let rest = trimmed[name_len..].trim_start();
    let rest = rest.strip_prefix('=').unwrap_or(rest);
    Some((name.to_string(), unquote(rest)))
}

pub fn parse_intent(text: &str) -> Intent {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return Intent::new("noop", text);
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let arg = slash_tail[command_len..].trim();

            if let Some(action) = find_action(&command, RAW_ARG_COMMANDS) {
                return Intent::new(action, text).with_arg("arg", arg);
            }

            if let Some(action) = find_action(&command, SINGLE_PATH_COMMANDS) {
                return Intent::new(action, text).with_arg("path", unquote(arg));
            }

            if command == FIELD_COMMAND.command {
                return match parse_field_arg(arg) {
                    Some((name, value)) => Intent::new(FIELD_COMMAND.action, text)
                        .with_arg("field", name)
                        .with_arg("value", value),
                    None => Intent::new("unknown", text)
                        .with_arg("command", command)
                        .with_arg("arg", arg),
                };
            }

            if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
                return Intent::new(action, text);
            }

            return Intent::new("unknown", text)
                .with_arg("command", command)
                .with_arg("arg", arg);
        }
    }

    if raw_trimmed.contains('=') {
        if let Some((name, value)) = parse_field_arg(raw_trimmed) {
            return Intent::new(FIELD_COMMAND.action, text)
                .with_arg("field", name)
                .with_arg("value", value);
        }
    }

    Intent::new("unknown", text).with_arg("arg", raw_trimmed)
}
