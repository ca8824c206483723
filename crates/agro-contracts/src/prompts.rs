use std::path::PathBuf;

use crate::forms::FormInputs;
use crate::modules::AdvisoryModule;

/// A prompt ready for the gateway, plus the file (if any) to attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedPrompt {
    pub module: AdvisoryModule,
    pub prompt: String,
    pub attachment: Option<PathBuf>,
    pub form: FormInputs,
}

/// Validates `form` against the module's fields and renders its template.
pub fn compose_prompt(module: AdvisoryModule, form: &FormInputs) -> Result<ComposedPrompt, String> {
    let form = form.normalize(module.spec().fields)?;
    let prompt = render_template(module, &form);
    let attachment = form.attachment().map(PathBuf::from);
    Ok(ComposedPrompt {
        module,
        prompt,
        attachment,
        form,
    })
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Sí"
    } else {
        "No"
    }
}

fn render_template(module: AdvisoryModule, form: &FormInputs) -> String {
    let field = |name: &str| form.text(name).unwrap_or_default().to_string();
    match module {
        AdvisoryModule::MercadoNegocio => format!(
            "Actúa como un experto en agronegocios peruanos. Un productor ha proporcionado la siguiente información:
- Cultivo/Producto: {cultivo}
- Ubicación: {ubicacion}
- Mercado Objetivo: {mercado}

Basado en esta información, proporciona un análisis de mercado conciso y útil en formato JSON.
Debes proveer títulos claros y accionables para cada sección.
- trends: Describe las tendencias actuales para este producto.
- prices: Ofrece un rango de precios estimado.
- buyers: Nombra 2-3 compradores potenciales.
- requirements: Menciona 1-2 certificaciones o requisitos importantes.
- differentiation: Sugiere una forma de diferenciar su producto.",
            cultivo = field("cultivo"),
            ubicacion = field("ubicacion"),
            mercado = field("mercado"),
        ),
        AdvisoryModule::SaberAgricola => {
            let image_note = if form.attachment().is_some() {
                " Se adjunta una imagen de una planta o cultivo con un problema."
            } else {
                ""
            };
            let basis = if form.attachment().is_some() {
                "Basado en el análisis de la IMAGEN y la información proporcionada"
            } else {
                "Basado en la información proporcionada"
            };
            let visual = if form.attachment().is_some() {
                ", priorizando el diagnóstico visual de la imagen"
            } else {
                ""
            };
            format!(
                "Actúa como un ingeniero agrónomo experto y asesor técnico para agricultores en Perú.{image_note}
El productor necesita ayuda con lo siguiente:
- Problema reportado: \"{problema}\"
- Interés de capacitación: \"{interes}\"

{basis}, proporciona una respuesta útil y estructurada en formato JSON, con títulos claros y accionables para cada sección:

- diagnosis: Ofrece 2-3 posibles causas del problema{visual}.
- recommendations: Sugiere 2-3 acciones claras e inmediatas para tratar el problema identificado.
- training: Recomienda 1-2 cursos o guías relevantes.
- experts: Sugiere qué tipo de institución local (INIA, SENASA, etc.) podría ayudar.",
                problema = field("problema"),
                interes = field("interes"),
            )
        }
        AdvisoryModule::CreditoProteccion => format!(
            "Actúa como un asesor financiero especializado en el sector agrícola de Perú. Un productor ha compartido sus necesidades:
- Necesidad de crédito: S/ {necesidad}
- Tiene titulación de tierras: {titulacion}
- Interesado en seguro agrícola: {seguro}

Analiza esta información y proporciona una recomendación clara en formato JSON, con títulos claros y accionables:

- financing: Sugiere 2-3 entidades financieras y tipos de producto.
- requirements: Lista 3-4 requisitos generales para el crédito.
- insurance: Explica brevemente el beneficio de un seguro y sugiere una opción.
- nextStep: Aconseja cuál sería el primer paso práctico que debería dar.",
            necesidad = field("necesidad"),
            titulacion = yes_no(form.flag("titulacion")),
            seguro = yes_no(form.flag("seguro")),
        ),
        AdvisoryModule::ClimaInteligente => format!(
            "Actúa como un experto en agrometeorología y adaptación al cambio climático en el contexto peruano. Un productor provee los siguientes datos de su parcela:
- Cultivo: {cultivo}
- Ubicación: {geolocalizacion}
- Etapa fenológica del cultivo: {etapa}

Genera un informe de \"Clima Inteligente\" en formato JSON con títulos claros y accionables:

- forecast: Describe los riesgos climáticos más probables para las próximas 2 semanas.
- recommendations: Ofrece 2-3 recomendaciones de manejo adaptativo específicas.
- practice: Recomienda una práctica agrícola sostenible a mediano plazo.
- geolocation: Explica brevemente la importancia de la geolocalización para exportaciones.",
            cultivo = field("cultivo"),
            geolocalizacion = field("geolocalizacion"),
            etapa = field("etapa"),
        ),
        AdvisoryModule::RedAgro => {
            let agrupacion = if form.flag("agrupacion") {
                "Busca unirse a una cooperativa/asociación"
            } else {
                "Busca ofrecer/encontrar un servicio"
            };
            format!(
                "Actúa como un facilitador de redes y alianzas para el sector agrícola peruano. Un productor está buscando conectarse:
- Interés: {agrupacion}
- Ubicación: {ubicacion}
- Detalles adicionales: \"{servicio}\"

Con esta información, genera una respuesta en formato JSON que fomente la colaboración, usando títulos claros y accionables:

- connections: Sugiere 2 tipos de organizaciones o cooperativas modelo en la región.
- draft: Crea un borrador de mensaje corto y efectivo para un foro.
- advice: Ofrece un consejo práctico sobre cómo establecer alianzas exitosas.
- support: Menciona un programa estatal peruano de apoyo (AGROIDEAS, AGRORURAL).",
                ubicacion = field("ubicacion"),
                servicio = field("servicio"),
            )
        }
        AdvisoryModule::LogisticaExportacion => format!(
            "Actúa como un experto en logística y agroexportación peruana. Un productor quiere exportar y necesita una guía clara.
- Producto: {producto}
- Volumen: {volumen}
- País de Destino: {destino}

Analiza esta solicitud y proporciona una guía práctica y concisa en formato JSON, con títulos claros y accionables:

- costing: Estima 3-4 componentes clave del costo de exportación.
- documents: Lista 2-3 documentos esenciales para esta operación.
- phytosanitary: Describe el requisito fitosanitario más importante para este producto y destino.
- nextStep: Aconseja cuál es el primer paso práctico y vital que el productor debe tomar.",
            producto = field("producto"),
            volumen = field("volumen"),
            destino = field("destino"),
        ),
    }
}
