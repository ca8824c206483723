use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::events::now_utc_iso;

/// One answered query, as exported by `ask --out`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryReport {
    pub module: String,
    pub module_name: String,
    pub model: String,
    pub prompt: String,
    pub started_at: String,
    pub finished_at: String,
    pub result: Value,
}

pub fn write_report(
    path: &Path,
    report: &QueryReport,
    extra: Option<&Map<String, Value>>,
) -> anyhow::Result<()> {
    let mut payload = match serde_json::to_value(report)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    payload.insert("ts".to_string(), Value::String(now_utc_iso()));
    if let Some(extra) = extra {
        for (key, value) in extra {
            payload.insert(key.clone(), value.clone());
        }
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, serde_json::to_string_pretty(&Value::Object(payload))?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Value};

    use super::{write_report, QueryReport};

    #[test]
    fn write_report_generates_expected_payload() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("out").join("report.json");

        let report = QueryReport {
            module: "clima".to_string(),
            module_name: "Clima Inteligente".to_string(),
            model: "gemini-2.5-flash".to_string(),
            prompt: "Actúa como un experto".to_string(),
            started_at: "2026-02-19T00:00:00+00:00".to_string(),
            finished_at: "2026-02-19T00:00:04+00:00".to_string(),
            result: json!({ "forecast": { "title": "Pronóstico", "content": "Heladas" } }),
        };
        let mut extra = Map::new();
        extra.insert("session_id".to_string(), json!("session-1"));
        write_report(&path, &report, Some(&extra))?;

        let parsed: Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        assert_eq!(parsed["module"], json!("clima"));
        assert_eq!(parsed["result"]["forecast"]["content"], json!("Heladas"));
        assert_eq!(parsed["session_id"], json!("session-1"));
        assert!(parsed.get("ts").and_then(Value::as_str).is_some());

        let round: QueryReport = serde_json::from_value(parsed)?;
        assert_eq!(round.module_name, "Clima Inteligente");
        Ok(())
    }
}
