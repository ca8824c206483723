use serde_json::{json, Map, Value};

/// Shape of one top-level section in a module reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionShape {
    /// `{ title, content }`
    Text,
    /// `{ title, items: [string] }`
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaField {
    pub key: &'static str,
    pub shape: SectionShape,
}

/// Declared reply shape for a module. Every section and every sub-field is
/// required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaDescriptor {
    pub fields: &'static [SchemaField],
}

impl SchemaDescriptor {
    pub const fn new(fields: &'static [SchemaField]) -> Self {
        Self { fields }
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|field| field.key)
    }

    pub fn shape_of(&self, key: &str) -> Option<SectionShape> {
        self.fields
            .iter()
            .find(|field| field.key == key)
            .map(|field| field.shape)
    }

    /// Renders the Gemini `responseSchema` object.
    pub fn to_response_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in self.fields {
            let section = match field.shape {
                SectionShape::Text => json!({
                    "type": "OBJECT",
                    "properties": {
                        "title": { "type": "STRING" },
                        "content": { "type": "STRING" },
                    },
                    "required": ["title", "content"],
                }),
                SectionShape::List => json!({
                    "type": "OBJECT",
                    "properties": {
                        "title": { "type": "STRING" },
                        "items": { "type": "ARRAY", "items": { "type": "STRING" } },
                    },
                    "required": ["title", "items"],
                }),
            };
            properties.insert(field.key.to_string(), section);
        }
        json!({
            "type": "OBJECT",
            "properties": Value::Object(properties),
            "required": self.keys().collect::<Vec<_>>(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionBody {
    Text(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSection {
    pub key: String,
    pub title: String,
    pub body: SectionBody,
}

/// A reply that matched its module's schema. The parsed object is kept as
/// received so callers can show or store it verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvisoryResult {
    sections: Vec<ResultSection>,
    raw: Value,
}

impl AdvisoryResult {
    /// Validates `value` against `schema`. Any missing or mistyped field
    /// rejects the whole reply.
    pub fn from_value(schema: &SchemaDescriptor, value: Value) -> Result<Self, String> {
        let object = value
            .as_object()
            .ok_or_else(|| format!("expected a JSON object, got {}", type_name(&value)))?;
        let mut sections = Vec::with_capacity(schema.fields.len());
        for field in schema.fields {
            let section = object
                .get(field.key)
                .and_then(Value::as_object)
                .ok_or_else(|| format!("section '{}' is missing or not an object", field.key))?;
            let title = section
                .get("title")
                .and_then(Value::as_str)
                .ok_or_else(|| format!("section '{}' has no string 'title'", field.key))?
                .to_string();
            let body = match field.shape {
                SectionShape::Text => SectionBody::Text(
                    section
                        .get("content")
                        .and_then(Value::as_str)
                        .ok_or_else(|| {
                            format!("section '{}' has no string 'content'", field.key)
                        })?
                        .to_string(),
                ),
                SectionShape::List => {
                    let items = section
                        .get("items")
                        .and_then(Value::as_array)
                        .ok_or_else(|| format!("section '{}' has no 'items' array", field.key))?;
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        let text = item.as_str().ok_or_else(|| {
                            format!("section '{}' has a non-string item", field.key)
                        })?;
                        out.push(text.to_string());
                    }
                    SectionBody::List(out)
                }
            };
            sections.push(ResultSection {
                key: field.key.to_string(),
                title,
                body,
            });
        }
        Ok(Self {
            sections,
            raw: value,
        })
    }

    pub fn sections(&self) -> &[ResultSection] {
        self.sections.as_slice()
    }

    pub fn section(&self, key: &str) -> Option<&ResultSection> {
        self.sections.iter().find(|section| section.key == key)
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
