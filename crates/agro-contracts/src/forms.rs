use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    LongText,
    Choice(&'static [&'static str]),
    Flag,
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub placeholder: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Flag(bool),
    File(PathBuf),
}

/// Values entered for one submission, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormInputs {
    values: BTreeMap<String, FieldValue>,
}

impl FormInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_text(name, value);
        self
    }

    pub fn with_flag(mut self, name: &str, value: bool) -> Self {
        self.set_flag(name, value);
        self
    }

    pub fn with_file(mut self, name: &str, path: impl Into<PathBuf>) -> Self {
        self.set_file(name, path);
        self
    }

    pub fn set_text(&mut self, name: &str, value: impl Into<String>) {
        self.values
            .insert(name.to_string(), FieldValue::Text(value.into()));
    }

    pub fn set_flag(&mut self, name: &str, value: bool) {
        self.values.insert(name.to_string(), FieldValue::Flag(value));
    }

    pub fn set_file(&mut self, name: &str, path: impl Into<PathBuf>) {
        self.values
            .insert(name.to_string(), FieldValue::File(path.into()));
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.values.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(FieldValue::Text(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn flag(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(FieldValue::Flag(true)))
    }

    pub fn file(&self, name: &str) -> Option<&Path> {
        match self.values.get(name) {
            Some(FieldValue::File(path)) => Some(path.as_path()),
            _ => None,
        }
    }

    /// First attached file, whatever field carries it.
    pub fn attachment(&self) -> Option<&Path> {
        self.values.values().find_map(|value| match value {
            FieldValue::File(path) => Some(path.as_path()),
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Parses `name=value` pairs as given on the command line. Every value
    /// lands as text; `normalize` converts it to the field's kind.
    pub fn from_assignments<I, S>(assignments: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut form = Self::new();
        for raw in assignments {
            let raw = raw.as_ref();
            let Some((name, value)) = raw.split_once('=') else {
                return Err(format!("Expected campo=valor, got '{raw}'."));
            };
            let name = name.trim();
            if name.is_empty() {
                return Err(format!("Missing field name in '{raw}'."));
            }
            form.set_text(name, value.trim());
        }
        Ok(form)
    }

    /// Checks the form against `fields` and returns a canonical copy:
    /// choices snap to their listed spelling, unset selects take their first
    /// option, flags become booleans and image fields become paths.
    pub fn normalize(&self, fields: &[FieldSpec]) -> Result<FormInputs, String> {
        if let Some(unknown) = self
            .values
            .keys()
            .find(|key| !fields.iter().any(|field| field.name == key.as_str()))
        {
            let known = fields
                .iter()
                .map(|field| field.name)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(format!("Campo desconocido '{unknown}' (campos: {known})."));
        }

        let mut out = FormInputs::new();
        for field in fields {
            let value = self.values.get(field.name);
            match field.kind {
                FieldKind::Text | FieldKind::LongText => {
                    let text = text_value(value).unwrap_or_default();
                    if text.is_empty() && field.required {
                        return Err(missing_field(field));
                    }
                    out.set_text(field.name, text);
                }
                FieldKind::Number => {
                    let text = text_value(value).unwrap_or_default();
                    if text.is_empty() {
                        if field.required {
                            return Err(missing_field(field));
                        }
                        continue;
                    }
                    match text.replace(',', "").parse::<f64>() {
                        Ok(number) if number.is_finite() && number >= 0.0 => {
                            out.set_text(field.name, text);
                        }
                        _ => {
                            return Err(format!(
                                "El campo '{}' debe ser un número válido, se recibió '{text}'.",
                                field.label
                            ));
                        }
                    }
                }
                FieldKind::Choice(options) => {
                    let text = text_value(value).unwrap_or_default();
                    let chosen = if text.is_empty() {
                        options.first().copied()
                    } else {
                        options
                            .iter()
                            .find(|option| option.to_lowercase() == text.to_lowercase())
                            .copied()
                    };
                    let Some(chosen) = chosen else {
                        return Err(format!(
                            "Opción '{text}' no válida para '{}' (opciones: {}).",
                            field.label,
                            options.join(", ")
                        ));
                    };
                    out.set_text(field.name, chosen);
                }
                FieldKind::Flag => {
                    let flag = match value {
                        None => false,
                        Some(FieldValue::Flag(flag)) => *flag,
                        Some(FieldValue::Text(raw)) => parse_flag(raw).ok_or_else(|| {
                            format!(
                                "El campo '{}' espera sí/no, se recibió '{raw}'.",
                                field.label
                            )
                        })?,
                        Some(FieldValue::File(_)) => {
                            return Err(format!("El campo '{}' espera sí/no.", field.label));
                        }
                    };
                    out.set_flag(field.name, flag);
                }
                FieldKind::Image => match value {
                    Some(FieldValue::File(path)) => out.set_file(field.name, path.clone()),
                    Some(FieldValue::Text(raw)) if !raw.trim().is_empty() => {
                        out.set_file(field.name, PathBuf::from(raw.trim()));
                    }
                    Some(FieldValue::Flag(_)) => {
                        return Err(format!(
                            "El campo '{}' espera una ruta de imagen.",
                            field.label
                        ));
                    }
                    _ => {
                        if field.required {
                            return Err(missing_field(field));
                        }
                    }
                },
            }
        }
        Ok(out)
    }
}

fn text_value(value: Option<&FieldValue>) -> Option<String> {
    match value {
        Some(FieldValue::Text(text)) => Some(text.trim().to_string()),
        _ => None,
    }
}

fn missing_field(field: &FieldSpec) -> String {
    format!("El campo '{}' es obligatorio.", field.label)
}

pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "si" | "sí" | "s" | "yes" | "y" | "true" | "1" | "on" | "x" => Some(true),
        "no" | "n" | "false" | "0" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{parse_flag, FieldKind, FieldSpec, FieldValue, FormInputs};

    const FIELDS: &[FieldSpec] = &[
        FieldSpec {
            name: "cultivo",
            label: "Tipo de Cultivo",
            kind: FieldKind::Choice(&["Café", "Cacao"]),
            required: true,
            placeholder: None,
        },
        FieldSpec {
            name: "ubicacion",
            label: "Ubicación",
            kind: FieldKind::Text,
            required: true,
            placeholder: Some("Ej: Jaén"),
        },
        FieldSpec {
            name: "monto",
            label: "Monto",
            kind: FieldKind::Number,
            required: false,
            placeholder: None,
        },
        FieldSpec {
            name: "seguro",
            label: "Seguro",
            kind: FieldKind::Flag,
            required: false,
            placeholder: None,
        },
        FieldSpec {
            name: "foto",
            label: "Foto",
            kind: FieldKind::Image,
            required: false,
            placeholder: None,
        },
    ];

    #[test]
    fn normalize_snaps_choice_and_defaults_unset_select() {
        let form = FormInputs::new()
            .with_text("cultivo", "cacao")
            .with_text("ubicacion", "  Jaén ");
        let normalized = form.normalize(FIELDS).unwrap();
        assert_eq!(normalized.text("cultivo"), Some("Cacao"));
        assert_eq!(normalized.text("ubicacion"), Some("Jaén"));
        assert!(!normalized.flag("seguro"));
        assert!(normalized.file("foto").is_none());

        let defaulted = FormInputs::new()
            .with_text("ubicacion", "Jaén")
            .normalize(FIELDS)
            .unwrap();
        assert_eq!(defaulted.text("cultivo"), Some("Café"));
    }

    #[test]
    fn normalize_rejects_missing_required_and_bad_values() {
        let err = FormInputs::new().normalize(FIELDS).unwrap_err();
        assert_eq!(err, "El campo 'Ubicación' es obligatorio.");

        let err = FormInputs::new()
            .with_text("ubicacion", "Jaén")
            .with_text("cultivo", "Trigo")
            .normalize(FIELDS)
            .unwrap_err();
        assert!(err.contains("Opción 'Trigo' no válida"));

        let err = FormInputs::new()
            .with_text("ubicacion", "Jaén")
            .with_text("monto", "mucho")
            .normalize(FIELDS)
            .unwrap_err();
        assert!(err.contains("número válido"));

        let err = FormInputs::new()
            .with_text("ubicacion", "Jaén")
            .with_text("color", "verde")
            .normalize(FIELDS)
            .unwrap_err();
        assert!(err.starts_with("Campo desconocido 'color'"));
    }

    #[test]
    fn normalize_converts_text_to_flags_and_paths() {
        let form = FormInputs::from_assignments([
            "ubicacion=Jaén",
            "seguro=sí",
            "foto=/tmp/hoja.png",
            "monto=5,000",
        ])
        .unwrap();
        let normalized = form.normalize(FIELDS).unwrap();
        assert!(normalized.flag("seguro"));
        assert_eq!(normalized.file("foto"), Some(Path::new("/tmp/hoja.png")));
        assert_eq!(normalized.attachment(), Some(Path::new("/tmp/hoja.png")));
        assert_eq!(
            normalized.get("monto"),
            Some(&FieldValue::Text("5,000".to_string()))
        );
    }

    #[test]
    fn assignments_require_name_and_separator() {
        assert!(FormInputs::from_assignments(["cultivo"]).is_err());
        assert!(FormInputs::from_assignments(["=Café"]).is_err());
        let form = FormInputs::from_assignments(["destino=Países Bajos = NL"]).unwrap();
        assert_eq!(form.text("destino"), Some("Países Bajos = NL"));
    }

    #[test]
    fn flag_parsing_accepts_spanish_and_english() {
        assert_eq!(parse_flag("Sí"), Some(true));
        assert_eq!(parse_flag("yes"), Some(true));
        assert_eq!(parse_flag("no"), Some(false));
        assert_eq!(parse_flag(""), Some(false));
        assert_eq!(parse_flag("tal vez"), None);
    }
}
