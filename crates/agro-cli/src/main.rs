mod render;

use std::collections::BTreeMap;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use agro_contracts::chat::{parse_intent, Intent, CHAT_HELP_COMMANDS};
use agro_contracts::events::{
    now_utc_iso, EventPayload, EventWriter, MODULE_SELECTED, SESSION_FINISHED, SESSION_STARTED,
};
use agro_contracts::forms::{parse_flag, FieldKind, FormInputs};
use agro_contracts::modules::{AdvisoryModule, ModuleCatalog, ModuleSelector, SelectorView};
use agro_contracts::prompts::compose_prompt;
use agro_contracts::reports::{write_report, QueryReport};
use agro_engine::{AiQueryGateway, ControllerState, GatewayConfig, ModuleController};
use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "agroconecta",
    version,
    about = "AgroConecta Perú: asesoría agrícola generada con IA"
)]
struct Cli {
    /// Gemini model (overrides AGRO_MODEL).
    #[arg(long, global = true)]
    model: Option<String>,
    /// API base URL (overrides GEMINI_API_BASE).
    #[arg(long, global = true)]
    api_base: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the advisory modules.
    Modules,
    /// Show a module's form fields and response shape.
    Schema(SchemaArgs),
    /// Run one query and print the result.
    Ask(AskArgs),
    /// Interactive session.
    Chat(ChatArgs),
}

#[derive(Debug, Parser)]
struct SchemaArgs {
    module: String,
    /// Print the Gemini responseSchema instead.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Parser)]
struct AskArgs {
    module: String,
    #[arg(long = "field", value_name = "CAMPO=VALOR")]
    fields: Vec<String>,
    #[arg(long)]
    image: Option<PathBuf>,
    /// Print the raw result object.
    #[arg(long)]
    json: bool,
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[arg(long)]
    events: Option<PathBuf>,
}

const SPINNER_TICK: Duration = Duration::from_millis(120);

/// Exit code for a query that reached the model path and failed.
const EXIT_QUERY_FAILED: i32 = 2;

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("agroconecta error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config = gateway_config(cli.model.as_deref(), cli.api_base.as_deref());
    match cli.command {
        Command::Modules => {
            print!("{}", render::module_list(&ModuleCatalog::new()));
            Ok(0)
        }
        Command::Schema(args) => run_schema(args),
        Command::Ask(args) => run_ask(args, config),
        Command::Chat(args) => {
            run_chat(args, config)?;
            Ok(0)
        }
    }
}

fn gateway_config(model: Option<&str>, api_base: Option<&str>) -> GatewayConfig {
    let mut config = GatewayConfig::from_env();
    if let Some(model) = model {
        config = config.with_model(model);
    }
    if let Some(api_base) = api_base {
        config = config.with_api_base(api_base);
    }
    config
}

fn resolve_module(raw: &str) -> Result<AdvisoryModule> {
    ModuleSelector::default()
        .select_named(raw)
        .map_err(anyhow::Error::msg)
}

fn run_schema(args: SchemaArgs) -> Result<i32> {
    let spec = resolve_module(&args.module)?.spec();
    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&spec.schema.to_response_schema())?
        );
        return Ok(0);
    }
    print!("{}", render::titled_block(spec.name, ""));
    println!("Campos (* obligatorio):");
    print!("{}", render::form_fields(spec, &FormInputs::new()));
    println!();
    println!("Respuesta:");
    print!("{}", render::schema_listing(spec));
    Ok(0)
}

/// Puts `path` into the module's image field.
fn attach_image(module: AdvisoryModule, form: &mut FormInputs, path: &Path) -> Result<()> {
    let Some(field) = module
        .spec()
        .fields
        .iter()
        .find(|field| field.kind == FieldKind::Image)
    else {
        bail!("El módulo '{}' no admite imágenes.", module.display_name());
    };
    form.set_file(field.name, path);
    Ok(())
}

fn run_ask(args: AskArgs, config: GatewayConfig) -> Result<i32> {
    let module = resolve_module(&args.module)?;
    let mut form = FormInputs::from_assignments(&args.fields).map_err(anyhow::Error::msg)?;
    if let Some(image) = &args.image {
        attach_image(module, &mut form, image)?;
    }

    let events = args
        .events
        .as_ref()
        .map(|path| EventWriter::for_new_session(path.as_path()));
    let model = config.model.clone();
    let gateway = Arc::new(AiQueryGateway::new(config));
    emit(
        events.as_ref(),
        SESSION_STARTED,
        fields([
            ("mode", json!("ask")),
            ("model", json!(model)),
            ("backend", json!(gateway.backend_name())),
        ]),
    );
    emit(
        events.as_ref(),
        MODULE_SELECTED,
        fields([("module", json!(module.slug()))]),
    );

    let mut controller = ModuleController::new(module, gateway);
    if let Some(events) = &events {
        controller = controller.with_events(events.clone());
    }
    let started_at = now_utc_iso();
    controller.submit(&form);
    wait_with_spinner(&mut controller, !args.json)?;
    let finished_at = now_utc_iso();

    let spec = module.spec();
    let code = match controller.state() {
        ControllerState::Succeeded(result) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(result.raw())?);
            } else {
                print!("{}", render::titled_block(spec.name, ""));
                print!("{}", render::result_sections(spec, result));
            }
            if let Some(out) = &args.out {
                let prompt = compose_prompt(module, &form)
                    .map(|composed| composed.prompt)
                    .unwrap_or_default();
                let report = QueryReport {
                    module: module.slug().to_string(),
                    module_name: spec.name.to_string(),
                    model: model.clone(),
                    prompt,
                    started_at,
                    finished_at,
                    result: result.raw().clone(),
                };
                let mut extra = Map::new();
                if let Some(events) = &events {
                    extra.insert("session_id".to_string(), json!(events.session_id()));
                }
                write_report(out, &report, Some(&extra))?;
                eprintln!("Reporte guardado en {}", out.display());
            }
            0
        }
        ControllerState::Failed(message) => {
            eprint!("{}", render::error_banner(message));
            EXIT_QUERY_FAILED
        }
        ControllerState::Idle | ControllerState::Loading { .. } => {
            bail!("query for '{}' never settled", module.slug())
        }
    };
    emit(
        events.as_ref(),
        SESSION_FINISHED,
        fields([("mode", json!("ask")), ("exit_code", json!(code))]),
    );
    Ok(code)
}

/// Blocks on the controller, drawing the busy label on stderr while it
/// runs.
fn wait_with_spinner(controller: &mut ModuleController, show: bool) -> Result<()> {
    let label = controller.module().spec().busy_label;
    let mut stderr = io::stderr();
    let mut frame = 0;
    while !controller.wait_timeout(SPINNER_TICK) {
        if show {
            write!(stderr, "\r{}", render::loading_line(label, frame))?;
            stderr.flush()?;
        }
        frame += 1;
    }
    if show && frame > 0 {
        write!(stderr, "\r{}\r", " ".repeat(label.chars().count() + 2))?;
        stderr.flush()?;
    }
    Ok(())
}

fn fields<const N: usize>(pairs: [(&str, Value); N]) -> EventPayload {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

fn emit(events: Option<&EventWriter>, event_type: &str, payload: EventPayload) {
    if let Some(events) = events {
        if let Err(err) = events.emit(event_type, payload) {
            tracing::warn!(event_type, error = %err, "failed to write event");
        }
    }
}

enum ChatStep {
    Continue(String),
    Quit,
}

/// State behind the interactive loop: which module is shown, the form being
/// filled for each module, and one controller per module.
struct ChatSession {
    gateway: Arc<AiQueryGateway>,
    events: Option<EventWriter>,
    selector: ModuleSelector,
    forms: BTreeMap<AdvisoryModule, FormInputs>,
    controllers: BTreeMap<AdvisoryModule, ModuleController>,
    submissions: u64,
}

impl ChatSession {
    fn new(gateway: Arc<AiQueryGateway>, events: Option<EventWriter>) -> Self {
        Self {
            gateway,
            events,
            selector: ModuleSelector::default(),
            forms: BTreeMap::new(),
            controllers: BTreeMap::new(),
            submissions: 0,
        }
    }

    fn controller(&mut self, module: AdvisoryModule) -> &mut ModuleController {
        let gateway = &self.gateway;
        let events = &self.events;
        self.controllers.entry(module).or_insert_with(|| {
            let controller = ModuleController::new(module, Arc::clone(gateway));
            match events {
                Some(events) => controller.with_events(events.clone()),
                None => controller,
            }
        })
    }

    fn form(&mut self, module: AdvisoryModule) -> &mut FormInputs {
        self.forms.entry(module).or_default()
    }

    fn current(&self) -> Result<AdvisoryModule, String> {
        self.selector
            .selected()
            .ok_or_else(|| "Seleccione un módulo primero: /module <nombre>.".to_string())
    }

    /// What the main area shows right now.
    fn screen(&self) -> String {
        match self.selector.view() {
            SelectorView::Welcome => render::welcome(self.selector.catalog()),
            SelectorView::Module(module) => {
                let spec = module.spec();
                let mut out = render::module_header(spec);
                out.push('\n');
                out.push_str(&render::form_fields(
                    spec,
                    self.forms.get(&module).unwrap_or(&FormInputs::default()),
                ));
                out.push('\n');
                out.push_str(&self.result_view(module));
                out
            }
        }
    }

    fn result_view(&self, module: AdvisoryModule) -> String {
        let spec = module.spec();
        match self.controllers.get(&module) {
            Some(controller) => render::controller_view(spec, controller.view()),
            None => render::placeholder(spec.placeholder),
        }
    }

    /// The raw result object, as `ask --json` prints it.
    fn result_json(&self, module: AdvisoryModule) -> Result<String, String> {
        let result = self
            .controllers
            .get(&module)
            .and_then(ModuleController::result)
            .ok_or_else(|| format!("{} todavía no tiene resultado.", module.display_name()))?;
        serde_json::to_string_pretty(result.raw())
            .map(|text| format!("{text}\n"))
            .map_err(|err| err.to_string())
    }

    /// Applies finished queries. Returns a notice per module that settled.
    fn poll(&mut self) -> Vec<String> {
        let selected = self.selector.selected();
        let mut notices = Vec::new();
        let settled = self
            .controllers
            .iter_mut()
            .filter_map(|(module, controller)| controller.poll().then_some(*module))
            .collect::<Vec<_>>();
        for module in settled {
            if Some(module) == selected {
                notices.push(self.result_view(module));
            } else {
                notices.push(format!(
                    "{} terminó. Use /result {} para verla.\n",
                    module.display_name(),
                    module.slug()
                ));
            }
        }
        notices
    }

    fn handle(&mut self, intent: &Intent) -> ChatStep {
        match self.dispatch(intent) {
            Ok(step) => step,
            Err(message) => ChatStep::Continue(format!("{message}\n")),
        }
    }

    fn dispatch(&mut self, intent: &Intent) -> Result<ChatStep, String> {
        let text = match intent.action.as_str() {
            "noop" => String::new(),
            "help" => format!(
                "Comandos: {}\nTambién puede escribir campo=valor.\n",
                CHAT_HELP_COMMANDS.join(" ")
            ),
            "list_modules" => render::module_list(self.selector.catalog()),
            "home" => {
                self.selector.clear();
                self.screen()
            }
            "select_module" => {
                let module = self.selector.select_named(intent.arg("arg").unwrap_or(""))?;
                emit(
                    self.events.as_ref(),
                    MODULE_SELECTED,
                    fields([("module", json!(module.slug()))]),
                );
                self.screen()
            }
            "show_form" => {
                let module = self.current()?;
                render::form_fields(module.spec(), self.form(module))
            }
            "show_schema" => render::schema_listing(self.current()?.spec()),
            "set_field" => {
                let module = self.current()?;
                let name = intent.arg("field").unwrap_or("");
                let value = intent.arg("value").unwrap_or("");
                self.set_field(module, name, value)?
            }
            "unset_field" => {
                let module = self.current()?;
                let name = intent.arg("arg").unwrap_or("").trim();
                match self.form(module).remove(name) {
                    Some(_) => format!("{name} borrado.\n"),
                    None => format!("{name} no tenía valor.\n"),
                }
            }
            "set_image" => {
                let module = self.current()?;
                let path = intent.arg("path").unwrap_or("");
                if path.is_empty() {
                    return Err("/image requiere una ruta.".to_string());
                }
                let form = self.forms.entry(module).or_default();
                attach_image(module, form, Path::new(path)).map_err(|err| err.to_string())?;
                format!("Imagen adjunta: {path}\n")
            }
            "clear_form" => {
                let module = self.current()?;
                self.forms.remove(&module);
                self.controller(module).reset();
                render::placeholder(module.spec().placeholder)
            }
            "submit" => {
                let module = self.current()?;
                let form = self.forms.get(&module).cloned().unwrap_or_default();
                let controller = self.controller(module);
                controller.submit(&form);
                self.submissions += 1;
                format!(
                    "{}\n",
                    render::loading_line(module.spec().busy_label, 0)
                )
            }
            "status" => {
                let module = self.current()?;
                self.controller(module).poll();
                self.result_view(module)
            }
            "wait" => {
                let module = self.current()?;
                wait_with_spinner(self.controller(module), true).map_err(|err| err.to_string())?;
                self.result_view(module)
            }
            "show_result" => {
                let raw = intent.arg("arg").unwrap_or("").trim();
                let (name, as_json) = match raw.strip_suffix("json") {
                    Some(rest) if rest.is_empty() || rest.ends_with(char::is_whitespace) => {
                        (rest.trim(), true)
                    }
                    _ => (raw, false),
                };
                let module = if name.is_empty() {
                    self.current()?
                } else {
                    AdvisoryModule::parse(name)
                        .ok_or_else(|| format!("Módulo desconocido '{name}'."))?
                };
                if as_json {
                    self.result_json(module)?
                } else {
                    self.result_view(module)
                }
            }
            "quit" => return Ok(ChatStep::Quit),
            _ => match intent.arg("command") {
                Some(command) => {
                    format!("Comando desconocido /{command}. Escriba /help.\n")
                }
                None => "Escriba /help para ver los comandos, o campo=valor para llenar el \
formulario.\n"
                    .to_string(),
            },
        };
        Ok(ChatStep::Continue(text))
    }

    fn set_field(&mut self, module: AdvisoryModule, name: &str, value: &str) -> Result<String, String> {
        let spec = module.spec();
        let Some(field) = spec.field(name) else {
            let known = spec
                .fields
                .iter()
                .map(|field| field.name)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(format!("Campo desconocido '{name}' (campos: {known})."));
        };
        let form = self.form(module);
        match field.kind {
            FieldKind::Flag => {
                let flag = parse_flag(value)
                    .ok_or_else(|| format!("'{}' espera sí/no.", field.label))?;
                form.set_flag(field.name, flag);
            }
            FieldKind::Image => form.set_file(field.name, value),
            _ => form.set_text(field.name, value),
        }
        Ok(format!("{} = {value}\n", field.label))
    }
}

fn run_chat(args: ChatArgs, config: GatewayConfig) -> Result<()> {
    let events = args
        .events
        .as_ref()
        .map(|path| EventWriter::for_new_session(path.as_path()));
    let model = config.model.clone();
    let gateway = Arc::new(AiQueryGateway::new(config));
    emit(
        events.as_ref(),
        SESSION_STARTED,
        fields([
            ("mode", json!("chat")),
            ("model", json!(model)),
            ("backend", json!(gateway.backend_name())),
        ]),
    );
    let mut session = ChatSession::new(gateway, events.clone());

    println!("{}. Escriba /help para ver los comandos.", render::APP_TITLE);
    print!("{}", session.screen());

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        for notice in session.poll() {
            print!("{notice}");
        }
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let input = line.trim_end_matches(['\n', '\r']);
        match session.handle(&parse_intent(input)) {
            ChatStep::Continue(text) => print!("{text}"),
            ChatStep::Quit => break,
        }
    }

    emit(
        events.as_ref(),
        SESSION_FINISHED,
        fields([
            ("mode", json!("chat")),
            ("submissions", json!(session.submissions)),
        ]),
    );
    Ok(())
}
