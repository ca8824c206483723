use indexmap::IndexMap;

use crate::forms::{FieldKind, FieldSpec};
use crate::schema::{SchemaDescriptor, SchemaField, SectionShape};

/// The six advisory modules, in side-navigation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AdvisoryModule {
    MercadoNegocio,
    SaberAgricola,
    CreditoProteccion,
    ClimaInteligente,
    RedAgro,
    LogisticaExportacion,
}

impl AdvisoryModule {
    pub const ALL: [AdvisoryModule; 6] = [
        AdvisoryModule::MercadoNegocio,
        AdvisoryModule::SaberAgricola,
        AdvisoryModule::CreditoProteccion,
        AdvisoryModule::ClimaInteligente,
        AdvisoryModule::RedAgro,
        AdvisoryModule::LogisticaExportacion,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            AdvisoryModule::MercadoNegocio => "mercado",
            AdvisoryModule::SaberAgricola => "saber",
            AdvisoryModule::CreditoProteccion => "credito",
            AdvisoryModule::ClimaInteligente => "clima",
            AdvisoryModule::RedAgro => "red",
            AdvisoryModule::LogisticaExportacion => "logistica",
        }
    }

    pub fn display_name(self) -> &'static str {
        self.spec().name
    }

    pub fn spec(self) -> &'static ModuleSpec {
        match self {
            AdvisoryModule::MercadoNegocio => &MERCADO_NEGOCIO,
            AdvisoryModule::SaberAgricola => &SABER_AGRICOLA,
            AdvisoryModule::CreditoProteccion => &CREDITO_PROTECCION,
            AdvisoryModule::ClimaInteligente => &CLIMA_INTELIGENTE,
            AdvisoryModule::RedAgro => &RED_AGRO,
            AdvisoryModule::LogisticaExportacion => &LOGISTICA_EXPORTACION,
        }
    }

    pub fn schema(self) -> &'static SchemaDescriptor {
        &self.spec().schema
    }

    /// Accepts a slug or a display name; case and accents are ignored.
    pub fn parse(raw: &str) -> Option<Self> {
        let wanted = fold(raw);
        if wanted.is_empty() {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|module| module.slug() == wanted || fold(module.display_name()) == wanted)
    }
}

impl std::fmt::Display for AdvisoryModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

fn fold(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|ch| match ch {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' | 'ü' => 'u',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionIcon {
    Trend,
    PriceTag,
    Lightbulb,
    Target,
    Checklist,
    Diagnosis,
    Action,
    Book,
    Expert,
    Bank,
    Shield,
    NextStep,
    Cloud,
    Leaf,
    Gps,
    Network,
    Pencil,
    Handshake,
    Gov,
    Cost,
    Document,
}

impl SectionIcon {
    pub fn name(self) -> &'static str {
        match self {
            SectionIcon::Trend => "trend",
            SectionIcon::PriceTag => "price-tag",
            SectionIcon::Lightbulb => "lightbulb",
            SectionIcon::Target => "target",
            SectionIcon::Checklist => "checklist",
            SectionIcon::Diagnosis => "diagnosis",
            SectionIcon::Action => "action",
            SectionIcon::Book => "book",
            SectionIcon::Expert => "expert",
            SectionIcon::Bank => "bank",
            SectionIcon::Shield => "shield",
            SectionIcon::NextStep => "next-step",
            SectionIcon::Cloud => "cloud",
            SectionIcon::Leaf => "leaf",
            SectionIcon::Gps => "gps",
            SectionIcon::Network => "network",
            SectionIcon::Pencil => "pencil",
            SectionIcon::Handshake => "handshake",
            SectionIcon::Gov => "gov",
            SectionIcon::Cost => "cost",
            SectionIcon::Document => "document",
        }
    }
}

/// Where a result section is drawn and with which icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplaySection {
    pub key: &'static str,
    pub icon: SectionIcon,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSpec {
    pub module: AdvisoryModule,
    pub name: &'static str,
    pub tagline: &'static str,
    pub features: &'static [&'static str],
    pub fields: &'static [FieldSpec],
    pub schema: SchemaDescriptor,
    pub layout: &'static [DisplaySection],
    pub placeholder: &'static str,
    pub submit_label: &'static str,
    pub busy_label: &'static str,
    pub fallback_error: &'static str,
}

impl ModuleSpec {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn accepts_image(&self) -> bool {
        self.fields
            .iter()
            .any(|field| field.kind == FieldKind::Image)
    }
}

/// Ordered lookup over the module specs, keyed by slug.
#[derive(Debug, Clone)]
pub struct ModuleCatalog {
    modules: IndexMap<&'static str, &'static ModuleSpec>,
}

impl Default for ModuleCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleCatalog {
    pub fn new() -> Self {
        let modules = AdvisoryModule::ALL
            .into_iter()
            .map(|module| (module.slug(), module.spec()))
            .collect();
        Self { modules }
    }

    pub fn get(&self, slug: &str) -> Option<&'static ModuleSpec> {
        self.modules.get(slug).copied()
    }

    pub fn resolve(&self, raw: &str) -> Option<&'static ModuleSpec> {
        AdvisoryModule::parse(raw).and_then(|module| self.get(module.slug()))
    }

    pub fn list(&self) -> impl Iterator<Item = &'static ModuleSpec> + '_ {
        self.modules.values().copied()
    }

    pub fn slugs(&self) -> Vec<&'static str> {
        self.modules.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

const fn text(key: &'static str) -> SchemaField {
    SchemaField {
        key,
        shape: SectionShape::Text,
    }
}

const fn list(key: &'static str) -> SchemaField {
    SchemaField {
        key,
        shape: SectionShape::List,
    }
}

const fn shown(key: &'static str, icon: SectionIcon) -> DisplaySection {
    DisplaySection { key, icon }
}

static MERCADO_NEGOCIO: ModuleSpec = ModuleSpec {
    module: AdvisoryModule::MercadoNegocio,
    name: "Mercado & Negocio",
    tagline: "Inteligencia de Mercados y Comercialización para impulsar sus ventas.",
    features: &[
        "Análisis de Tendencias de Mercado en tiempo real.",
        "Requisitos de Acceso a Mercados (Normativas y Certificaciones).",
        "Conexión directa con Compradores nacionales e internacionales.",
        "Identificación de Oportunidades de Diferenciación y nichos.",
    ],
    fields: &[
        FieldSpec {
            name: "cultivo",
            label: "Tipo de Cultivo/Producto",
            kind: FieldKind::Choice(&[
                "Café",
                "Cacao",
                "Banano",
                "Papa",
                "Mango",
                "Uva",
                "Espárrago",
                "Palta",
            ]),
            required: true,
            placeholder: None,
        },
        FieldSpec {
            name: "ubicacion",
            label: "Ubicación del Productor",
            kind: FieldKind::Text,
            required: true,
            placeholder: Some("Ej: Cajamarca, Jaén"),
        },
        FieldSpec {
            name: "mercado",
            label: "Mercado Objetivo",
            kind: FieldKind::Choice(&["Nacional", "Internacional"]),
            required: true,
            placeholder: None,
        },
    ],
    schema: SchemaDescriptor {
        fields: &[
            text("trends"),
            text("prices"),
            list("buyers"),
            list("requirements"),
            text("differentiation"),
        ],
    },
    layout: &[
        shown("trends", SectionIcon::Trend),
        shown("prices", SectionIcon::PriceTag),
        shown("differentiation", SectionIcon::Lightbulb),
        shown("buyers", SectionIcon::Target),
        shown("requirements", SectionIcon::Checklist),
    ],
    placeholder: "Los resultados de su análisis aparecerán aquí.",
    submit_label: "Analizar Mercado",
    busy_label: "Analizando...",
    fallback_error: "Ocurrió un error al generar el análisis.",
};

static SABER_AGRICOLA: ModuleSpec = ModuleSpec {
    module: AdvisoryModule::SaberAgricola,
    name: "Saber Agrícola",
    tagline: "Su centro de Asistencia Técnica y Capacitación. Potenciado con diagnóstico por imagen.",
    features: &[
        "Herramientas para diagnóstico de plagas y enfermedades con IA visual.",
        "Biblioteca de Mejores Prácticas agrícolas.",
        "Cursos y tutoriales online en video e infografías.",
        "Conexión con expertos del INIA y la Red CITE.",
    ],
    fields: &[
        FieldSpec {
            name: "problema",
            label: "Reportar Problema",
            kind: FieldKind::Text,
            required: true,
            placeholder: Some("Ej: Hojas amarillas en mi cafeto"),
        },
        FieldSpec {
            name: "imagen",
            label: "Evidencia Visual (Recomendado)",
            kind: FieldKind::Image,
            required: false,
            placeholder: Some("PNG, JPG, GIF hasta 10MB"),
        },
        FieldSpec {
            name: "interes",
            label: "Intereses de Capacitación",
            kind: FieldKind::Choice(&[
                "Agricultura orgánica",
                "Riego eficiente",
                "Manejo post-cosecha",
                "Manejo de plagas y enfermedades",
                "Gestión empresarial",
            ]),
            required: true,
            placeholder: None,
        },
    ],
    schema: SchemaDescriptor {
        fields: &[
            list("diagnosis"),
            list("recommendations"),
            text("training"),
            text("experts"),
        ],
    },
    layout: &[
        shown("diagnosis", SectionIcon::Diagnosis),
        shown("recommendations", SectionIcon::Action),
        shown("training", SectionIcon::Book),
        shown("experts", SectionIcon::Expert),
    ],
    placeholder: "Sus recomendaciones personalizadas aparecerán aquí.",
    submit_label: "Buscar Soluciones",
    busy_label: "Analizando...",
    fallback_error: "Ocurrió un error al buscar soluciones.",
};

static CREDITO_PROTECCION: ModuleSpec = ModuleSpec {
    module: AdvisoryModule::CreditoProteccion,
    name: "Crédito & Protección",
    tagline: "Acceso a Financiamiento y Seguros para asegurar su inversión.",
    features: &[
        "Información detallada sobre líneas de crédito de Agrobanco, cajas rurales, etc.",
        "Asistencia para simplificar la solicitud de créditos y seguros.",
        "Contenido de educación financiera para mejorar la gestión.",
        "Guías para la formalización y titulación de tierras.",
    ],
    fields: &[
        FieldSpec {
            name: "necesidad",
            label: "Necesidad de Crédito",
            kind: FieldKind::Number,
            required: true,
            placeholder: Some("Monto en S/"),
        },
        FieldSpec {
            name: "titulacion",
            label: "Cuento con titulación de tierras",
            kind: FieldKind::Flag,
            required: false,
            placeholder: None,
        },
        FieldSpec {
            name: "seguro",
            label: "Interesado en Seguro Agrícola",
            kind: FieldKind::Flag,
            required: false,
            placeholder: None,
        },
    ],
    schema: SchemaDescriptor {
        fields: &[
            list("financing"),
            list("requirements"),
            text("insurance"),
            text("nextStep"),
        ],
    },
    layout: &[
        shown("financing", SectionIcon::Bank),
        shown("requirements", SectionIcon::Checklist),
        shown("insurance", SectionIcon::Shield),
        shown("nextStep", SectionIcon::NextStep),
    ],
    placeholder: "Sus opciones de crédito y seguro sugeridas aparecerán aquí.",
    submit_label: "Buscar Opciones",
    busy_label: "Buscando...",
    fallback_error: "Ocurrió un error al buscar opciones.",
};

static CLIMA_INTELIGENTE: ModuleSpec = ModuleSpec {
    module: AdvisoryModule::ClimaInteligente,
    name: "Clima Inteligente",
    tagline: "Herramientas para la Adaptación al Cambio Climático.",
    features: &[
        "Pronósticos Agrometeorológicos detallados y localizados.",
        "Recomendaciones de adaptación (manejo de agua, variedades, etc.).",
        "Monitoreo de salud del suelo y biodiversidad.",
        "Geolocalización de parcelas para cumplir normativas de exportación.",
    ],
    fields: &[
        FieldSpec {
            name: "cultivo",
            label: "Tipo de Cultivo",
            kind: FieldKind::Text,
            required: true,
            placeholder: Some("Ej: Café, Papa"),
        },
        FieldSpec {
            name: "geolocalizacion",
            label: "Ubicación del Cultivo",
            kind: FieldKind::Text,
            required: true,
            placeholder: Some("Ej: Jaén, Cajamarca"),
        },
        FieldSpec {
            name: "etapa",
            label: "Etapa Fenológica",
            kind: FieldKind::Choice(&["Siembra", "Crecimiento", "Floración", "Cosecha"]),
            required: true,
            placeholder: None,
        },
    ],
    schema: SchemaDescriptor {
        fields: &[
            text("forecast"),
            list("recommendations"),
            text("practice"),
            text("geolocation"),
        ],
    },
    layout: &[
        shown("forecast", SectionIcon::Cloud),
        shown("recommendations", SectionIcon::Action),
        shown("practice", SectionIcon::Leaf),
        shown("geolocation", SectionIcon::Gps),
    ],
    placeholder: "Sus alertas y guías climáticas aparecerán aquí.",
    submit_label: "Generar Pronóstico",
    busy_label: "Generando...",
    fallback_error: "Ocurrió un error al generar el pronóstico.",
};

static RED_AGRO: ModuleSpec = ModuleSpec {
    module: AdvisoryModule::RedAgro,
    name: "Red Agro",
    tagline: "Plataforma de Colaboración y Alianzas para crecer juntos.",
    features: &[
        "Directorio de Organizaciones de Productores a nivel nacional.",
        "Foros de discusión para compartir experiencias y resolver dudas.",
        "Facilitador de Alianzas Público-Privadas (AGRORURAL, AGROIDEAS).",
        "Espacio para compartir recursos (maquinaria, transporte).",
    ],
    fields: &[
        FieldSpec {
            name: "agrupacion",
            label: "Busco unirme a una cooperativa/asociación",
            kind: FieldKind::Flag,
            required: false,
            placeholder: None,
        },
        FieldSpec {
            name: "ubicacion",
            label: "Ubicación (Distrito/Región)",
            kind: FieldKind::Text,
            required: true,
            placeholder: Some("Ej: Jaén, Cajamarca"),
        },
        FieldSpec {
            name: "servicio",
            label: "Ofrecer/Buscar Servicio (Opcional)",
            kind: FieldKind::LongText,
            required: false,
            placeholder: Some("Ej: Ofrezco servicio de transporte refrigerado en la región norte."),
        },
    ],
    schema: SchemaDescriptor {
        fields: &[
            text("connections"),
            text("draft"),
            text("advice"),
            text("support"),
        ],
    },
    layout: &[
        shown("connections", SectionIcon::Network),
        shown("draft", SectionIcon::Pencil),
        shown("advice", SectionIcon::Handshake),
        shown("support", SectionIcon::Gov),
    ],
    placeholder: "Las conexiones y oportunidades sugeridas aparecerán aquí.",
    submit_label: "Publicar en la Red",
    busy_label: "Publicando...",
    fallback_error: "Ocurrió un error al publicar en la red.",
};

static LOGISTICA_EXPORTACION: ModuleSpec = ModuleSpec {
    module: AdvisoryModule::LogisticaExportacion,
    name: "Logística & Exportación",
    tagline: "Guía para simplificar y planificar su proceso de exportación.",
    features: &[
        "Estimación de costos de la cadena logística de exportación.",
        "Identificación de requisitos de acceso y certificaciones por mercado.",
        "Generación de checklists de documentación necesaria.",
        "Conexión con operadores logísticos y agentes de aduana.",
    ],
    fields: &[
        FieldSpec {
            name: "producto",
            label: "Producto a Exportar",
            kind: FieldKind::Text,
            required: true,
            placeholder: Some("Ej: Palta Hass, Café Orgánico"),
        },
        FieldSpec {
            name: "volumen",
            label: "Volumen",
            kind: FieldKind::Text,
            required: true,
            placeholder: Some("Ej: 1 contenedor de 40 pies, 500 kg"),
        },
        FieldSpec {
            name: "destino",
            label: "País de Destino",
            kind: FieldKind::Text,
            required: true,
            placeholder: Some("Ej: Países Bajos, Estados Unidos"),
        },
    ],
    schema: SchemaDescriptor {
        fields: &[
            list("costing"),
            list("documents"),
            text("phytosanitary"),
            text("nextStep"),
        ],
    },
    layout: &[
        shown("costing", SectionIcon::Cost),
        shown("documents", SectionIcon::Document),
        shown("phytosanitary", SectionIcon::Shield),
        shown("nextStep", SectionIcon::NextStep),
    ],
    placeholder: "Su guía de exportación personalizada aparecerá aquí.",
    submit_label: "Generar Guía de Exportación",
    busy_label: "Generando...",
    fallback_error: "Ocurrió un error al generar la guía.",
};
