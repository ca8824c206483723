//! Terminal presentation: every function returns the text to print so the
//! chat loop and `ask` share one rendering path.

use std::fmt::Write as _;

use agro_contracts::forms::{FieldKind, FieldValue, FormInputs};
use agro_contracts::modules::{ModuleCatalog, ModuleSpec, SectionIcon};
use agro_contracts::schema::{AdvisoryResult, SectionBody, SectionShape};
use agro_engine::ControllerView;

pub const APP_TITLE: &str = "AgroConecta Perú";
const WELCOME_TITLE: &str = "Bienvenido a AgroConecta Perú";
const WELCOME_INTRO: &str = "Su plataforma integral para potenciar la agricultura peruana. \
Seleccione un módulo con /module <nombre> para comenzar.";
const SPINNER_FRAMES: &[char] = &['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

fn rule(width: usize) -> String {
    "─".repeat(width)
}

/// Title line underlined to its own width.
pub fn titled_block(title: &str, body: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{}", rule(title.chars().count().max(3)));
    if !body.is_empty() {
        let _ = writeln!(out, "{body}");
    }
    out
}

pub fn bullet_list(items: &[&str]) -> String {
    items.iter().map(|item| format!("  • {item}\n")).collect()
}

pub fn welcome(catalog: &ModuleCatalog) -> String {
    let mut out = titled_block(WELCOME_TITLE, WELCOME_INTRO);
    for spec in catalog.list() {
        let _ = writeln!(out);
        let _ = writeln!(out, "  [{}] {}", spec.module.slug(), spec.name);
        let _ = writeln!(out, "      {}", spec.tagline);
    }
    out
}

/// One line per module, for `agroconecta modules` and `/modules`.
pub fn module_list(catalog: &ModuleCatalog) -> String {
    let width = catalog
        .slugs()
        .iter()
        .map(|slug| slug.len())
        .max()
        .unwrap_or(0);
    catalog
        .list()
        .map(|spec| format!("{:<width$}  {}\n", spec.module.slug(), spec.name))
        .collect()
}

pub fn module_header(spec: &ModuleSpec) -> String {
    let mut out = titled_block(spec.name, spec.tagline);
    let _ = writeln!(out);
    out.push_str("Funcionalidades Clave\n");
    out.push_str(&bullet_list(spec.features));
    out
}

fn kind_hint(kind: FieldKind) -> String {
    match kind {
        FieldKind::Text => "texto".to_string(),
        FieldKind::LongText => "texto largo".to_string(),
        FieldKind::Number => "número".to_string(),
        FieldKind::Flag => "sí/no".to_string(),
        FieldKind::Image => "ruta de imagen".to_string(),
        FieldKind::Choice(options) => options.join(" | "),
    }
}

fn field_value(value: Option<&FieldValue>) -> Option<String> {
    match value? {
        FieldValue::Text(text) if text.trim().is_empty() => None,
        FieldValue::Text(text) => Some(text.clone()),
        FieldValue::Flag(flag) => Some(if *flag { "sí" } else { "no" }.to_string()),
        FieldValue::File(path) => Some(path.display().to_string()),
    }
}

/// The module's form with whatever the user has filled in so far.
pub fn form_fields(spec: &ModuleSpec, form: &FormInputs) -> String {
    let mut out = String::new();
    for field in spec.fields {
        let marker = if field.required { "*" } else { " " };
        let current = field_value(form.get(field.name))
            .or_else(|| field.placeholder.map(|hint| format!("({hint})")))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{marker} {:<16} {} [{}] {current}",
            field.name,
            field.label,
            kind_hint(field.kind)
        );
    }
    let _ = writeln!(out, "  /submit → {}", spec.submit_label);
    out
}

/// The response shape a module asks the model for.
pub fn schema_listing(spec: &ModuleSpec) -> String {
    spec.schema
        .fields
        .iter()
        .map(|field| {
            let shape = match field.shape {
                SectionShape::Text => "{ title, content }",
                SectionShape::List => "{ title, items[] }",
            };
            format!("{:<16} {shape}\n", field.key)
        })
        .collect()
}

pub fn loading_line(label: &str, frame: usize) -> String {
    let spinner = SPINNER_FRAMES[frame % SPINNER_FRAMES.len()];
    format!("{spinner} {label}")
}

pub fn error_banner(message: &str) -> String {
    format!("✖ Error: {message}\n")
}

pub fn placeholder(text: &str) -> String {
    format!("{text}\n")
}

fn icon_label(icon: SectionIcon) -> String {
    format!("[{}]", icon.name())
}

/// Result sections in the module's display order.
pub fn result_sections(spec: &ModuleSpec, result: &AdvisoryResult) -> String {
    let mut out = String::new();
    for shown in spec.layout {
        let Some(section) = result.section(shown.key) else {
            continue;
        };
        if !out.is_empty() {
            out.push('\n');
        }
        let _ = writeln!(out, "{} {}", icon_label(shown.icon), section.title);
        match &section.body {
            SectionBody::Text(content) => {
                let _ = writeln!(out, "  {content}");
            }
            SectionBody::List(items) => {
                for item in items {
                    let _ = writeln!(out, "  ✔ {item}");
                }
            }
        }
    }
    out
}

pub fn controller_view(spec: &ModuleSpec, view: ControllerView<'_>) -> String {
    match view {
        ControllerView::Idle { placeholder: text } => placeholder(text),
        ControllerView::Loading { label } => format!("{}\n", loading_line(label, 0)),
        ControllerView::Failed(message) => error_banner(message),
        ControllerView::Succeeded(result) => result_sections(spec, result),
    }
}

#[cfg(test)]
mod tests {
    use agro_contracts::forms::FormInputs;
    use agro_contracts::modules::{AdvisoryModule, ModuleCatalog};
    use agro_contracts::schema::AdvisoryResult;
    use agro_engine::ControllerView;
    use serde_json::json;

    use super::{
        controller_view, form_fields, loading_line, module_header, module_list, result_sections,
        schema_listing, welcome,
    };

    #[test]
    fn welcome_lists_every_module_card() {
        let text = welcome(&ModuleCatalog::new());
        assert!(text.starts_with("Bienvenido a AgroConecta Perú\n"));
        for module in AdvisoryModule::ALL {
            assert!(text.contains(module.display_name()));
            assert!(text.contains(module.spec().tagline));
        }
    }

    #[test]
    fn module_list_aligns_slugs() {
        let text = module_list(&ModuleCatalog::new());
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "mercado    Mercado & Negocio");
        assert_eq!(lines[5], "logistica  Logística & Exportación");
    }

    #[test]
    fn header_shows_tagline_and_features() {
        let spec = AdvisoryModule::CreditoProteccion.spec();
        let text = module_header(spec);
        assert!(text.starts_with("Crédito & Protección\n"));
        assert!(text.contains(spec.tagline));
        assert_eq!(text.matches("  • ").count(), spec.features.len());
    }

    #[test]
    fn form_shows_values_or_placeholders() {
        let spec = AdvisoryModule::RedAgro.spec();
        let form = FormInputs::new()
            .with_text("ubicacion", "Piura")
            .with_flag("agrupacion", true);
        let text = form_fields(spec, &form);
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[3], "  /submit → Publicar en la Red");
        assert!(lines[0].ends_with("[sí/no] sí"));
        assert!(lines[1].starts_with("* ubicacion"));
        assert!(lines[1].ends_with("Piura"));
        assert!(lines[2].contains("(Ej: Ofrezco servicio"));
    }

    #[test]
    fn schema_listing_marks_list_sections() {
        let text = schema_listing(AdvisoryModule::SaberAgricola.spec());
        assert!(text.contains("diagnosis        { title, items[] }"));
        assert!(text.contains("training         { title, content }"));
    }

    #[test]
    fn result_sections_follow_layout_order() -> anyhow::Result<()> {
        let spec = AdvisoryModule::MercadoNegocio.spec();
        let value = json!({
            "trends": { "title": "Tendencias", "content": "Demanda creciente" },
            "prices": { "title": "Precios", "content": "S/ 10-12 por kg" },
            "buyers": { "title": "Compradores", "items": ["Exportadora A", "Cooperativa B"] },
            "requirements": { "title": "Requisitos", "items": ["Rainforest Alliance"] },
            "differentiation": { "title": "Diferenciación", "content": "Origen único" },
        });
        let result = AdvisoryResult::from_value(&spec.schema, value)
            .map_err(anyhow::Error::msg)?;
        let text = result_sections(spec, &result);
        let titles = text
            .lines()
            .filter(|line| line.starts_with('['))
            .collect::<Vec<_>>();
        assert_eq!(
            titles,
            vec![
                "[trend] Tendencias",
                "[price-tag] Precios",
                "[lightbulb] Diferenciación",
                "[target] Compradores",
                "[checklist] Requisitos",
            ]
        );
        assert!(text.contains("  ✔ Exportadora A\n"));
        assert!(text.contains("  Demanda creciente\n"));
        Ok(())
    }

    #[test]
    fn controller_views_render_placeholder_spinner_and_error() {
        let spec = AdvisoryModule::ClimaInteligente.spec();
        assert_eq!(
            controller_view(
                spec,
                ControllerView::Idle {
                    placeholder: spec.placeholder
                }
            ),
            "Sus alertas y guías climáticas aparecerán aquí.\n"
        );
        assert_eq!(loading_line("Generando...", 11), "⠙ Generando...");
        assert_eq!(
            controller_view(spec, ControllerView::Failed("sin conexión")),
            "✖ Error: sin conexión\n"
        );
    }
}
