use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use agro_contracts::events::{
    EventPayload, EventWriter, QUERY_FAILED, QUERY_STARTED, QUERY_SUCCEEDED,
};
use agro_contracts::forms::FormInputs;
use agro_contracts::modules::AdvisoryModule;
use agro_contracts::prompts::{compose_prompt, ComposedPrompt};
use agro_contracts::schema::AdvisoryResult;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::AdvisoryError;
use crate::gateway::AiQueryGateway;
use crate::media::MediaSummary;

/// Identifies one submission. Tickets grow monotonically per controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

impl Ticket {
    pub fn value(self) -> u64 {
        self.0
    }
}

/// Exactly one of idle, loading, result or error holds at a time.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerState {
    Idle,
    Loading { ticket: Ticket },
    Succeeded(AdvisoryResult),
    Failed(String),
}

/// What the presentation layer draws for the module's result area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControllerView<'a> {
    Idle { placeholder: &'static str },
    Loading { label: &'static str },
    Failed(&'a str),
    Succeeded(&'a AdvisoryResult),
}

/// A submission whose ticket is issued but whose query has not run.
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    pub ticket: Ticket,
    pub module: AdvisoryModule,
    pub request: Result<ComposedPrompt, AdvisoryError>,
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub ticket: Ticket,
    pub module: AdvisoryModule,
    pub outcome: Result<AdvisoryResult, AdvisoryError>,
    pub media: Option<MediaSummary>,
    pub elapsed_ms: u64,
}

/// Form-submission state machine for one module.
///
/// `submit` moves to `Loading` and runs the query on a worker thread with a
/// channel of its own; the outcome is applied by `poll` or `wait`. A worker
/// that dies without answering settles its ticket as a failure.
/// Only the newest ticket may settle the state, so a slow earlier
/// submission can never overwrite a later one.
pub struct ModuleController {
    module: AdvisoryModule,
    gateway: Arc<AiQueryGateway>,
    state: ControllerState,
    next_ticket: u64,
    latest: Option<Ticket>,
    in_flight: Vec<(Ticket, Receiver<Completion>)>,
    events: Option<EventWriter>,
}

impl ModuleController {
    pub fn new(module: AdvisoryModule, gateway: Arc<AiQueryGateway>) -> Self {
        Self {
            module,
            gateway,
            state: ControllerState::Idle,
            next_ticket: 1,
            latest: None,
            in_flight: Vec::new(),
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self
    }

    pub fn module(&self) -> AdvisoryModule {
        self.module
    }

    /// Issues a ticket, clears any previous outcome and composes the prompt.
    /// A form that fails validation still gets a ticket; its completion
    /// carries the `InvalidInput` error.
    pub fn prepare(&mut self, form: &FormInputs) -> PreparedQuery {
        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        self.latest = Some(ticket);
        self.state = ControllerState::Loading { ticket };

        let request = compose_prompt(self.module, form).map_err(AdvisoryError::InvalidInput);
        if let Ok(composed) = &request {
            self.emit(
                QUERY_STARTED,
                payload([
                    ("module", json!(self.module.slug())),
                    ("ticket", json!(ticket.value())),
                    ("model", json!(self.gateway.config().model)),
                    ("has_attachment", json!(composed.attachment.is_some())),
                ]),
            );
        }
        PreparedQuery {
            ticket,
            module: self.module,
            request,
        }
    }

    /// Runs a prepared query to completion. Holds no controller state, so
    /// it can run on any thread.
    pub fn execute(gateway: &AiQueryGateway, prepared: PreparedQuery) -> Completion {
        let started = Instant::now();
        let (outcome, media) = match prepared.request {
            Ok(composed) => match gateway.query_module(&composed) {
                Ok(answer) => (Ok(answer.result), answer.media),
                Err(err) => (Err(err), None),
            },
            Err(err) => (Err(err), None),
        };
        Completion {
            ticket: prepared.ticket,
            module: prepared.module,
            outcome,
            media,
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Applies `completion` if it belongs to the newest submission. Returns
    /// whether the state changed.
    pub fn complete(&mut self, completion: Completion) -> bool {
        if self.latest != Some(completion.ticket) {
            debug!(
                module = self.module.slug(),
                ticket = completion.ticket.value(),
                "dropping stale completion"
            );
            return false;
        }
        self.latest = None;

        let ticket = completion.ticket.value();
        match completion.outcome {
            Ok(result) => {
                let mut fields = payload([
                    ("module", json!(self.module.slug())),
                    ("ticket", json!(ticket)),
                    ("elapsed_ms", json!(completion.elapsed_ms)),
                    ("sections", json!(result.sections().len())),
                ]);
                if let Some(media) = &completion.media {
                    fields.insert(
                        "media".to_string(),
                        json!({
                            "mime_type": media.mime_type,
                            "bytes": media.bytes,
                            "sha256": media.sha256,
                        }),
                    );
                }
                self.emit(QUERY_SUCCEEDED, fields);
                self.state = ControllerState::Succeeded(result);
            }
            Err(err) => {
                let message = if err.message().trim().is_empty() {
                    self.module.spec().fallback_error.to_string()
                } else {
                    err.message().to_string()
                };
                self.emit(
                    QUERY_FAILED,
                    payload([
                        ("module", json!(self.module.slug())),
                        ("ticket", json!(ticket)),
                        ("elapsed_ms", json!(completion.elapsed_ms)),
                        ("kind", json!(err.kind())),
                        ("error", json!(message)),
                    ]),
                );
                self.state = ControllerState::Failed(message);
            }
        }
        true
    }

    /// Starts a submission on a worker thread.
    pub fn submit(&mut self, form: &FormInputs) -> Ticket {
        let prepared = self.prepare(form);
        let ticket = prepared.ticket;
        let gateway = Arc::clone(&self.gateway);
        let (sender, receiver) = mpsc::channel();
        self.in_flight.push((ticket, receiver));
        thread::spawn(move || {
            let completion = Self::execute(&gateway, prepared);
            let _ = sender.send(completion);
        });
        ticket
    }

    /// Applies every completion that has already arrived.
    pub fn poll(&mut self) -> bool {
        let module = self.module;
        let mut arrived = Vec::new();
        self.in_flight
            .retain(|(ticket, receiver)| match receiver.try_recv() {
                Ok(completion) => {
                    arrived.push(completion);
                    false
                }
                Err(TryRecvError::Empty) => true,
                Err(TryRecvError::Disconnected) => {
                    arrived.push(abandoned(*ticket, module));
                    false
                }
            });
        arrived
            .into_iter()
            .fold(false, |changed, completion| self.complete(completion) | changed)
    }

    /// Blocks until the newest submitted query settles. A ticket from a bare
    /// `prepare` has no worker, so it is left loading for `complete`.
    pub fn wait(&mut self) -> &ControllerState {
        while let Some((ticket, receiver)) = self.take_latest_receiver() {
            let completion = receiver
                .recv()
                .unwrap_or_else(|_| abandoned(ticket, self.module));
            self.complete(completion);
        }
        &self.state
    }

    /// Like `wait`, but gives up after `timeout`. Returns false only on
    /// timeout.
    pub fn wait_timeout(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while let Some((ticket, receiver)) = self.take_latest_receiver() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match receiver.recv_timeout(remaining) {
                Ok(completion) => {
                    self.complete(completion);
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.complete(abandoned(ticket, self.module));
                }
                Err(RecvTimeoutError::Timeout) => {
                    self.in_flight.push((ticket, receiver));
                    return false;
                }
            }
        }
        true
    }

    fn take_latest_receiver(&mut self) -> Option<(Ticket, Receiver<Completion>)> {
        let latest = self.latest?;
        let index = self
            .in_flight
            .iter()
            .position(|(ticket, _)| *ticket == latest)?;
        Some(self.in_flight.swap_remove(index))
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, ControllerState::Loading { .. })
    }

    pub fn result(&self) -> Option<&AdvisoryResult> {
        match &self.state {
            ControllerState::Succeeded(result) => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            ControllerState::Failed(message) => Some(message.as_str()),
            _ => None,
        }
    }

    pub fn view(&self) -> ControllerView<'_> {
        let spec = self.module.spec();
        match &self.state {
            ControllerState::Idle => ControllerView::Idle {
                placeholder: spec.placeholder,
            },
            ControllerState::Loading { .. } => ControllerView::Loading {
                label: spec.busy_label,
            },
            ControllerState::Failed(message) => ControllerView::Failed(message),
            ControllerState::Succeeded(result) => ControllerView::Succeeded(result),
        }
    }

    /// Back to idle. Anything still in flight is dropped.
    pub fn reset(&mut self) {
        self.latest = None;
        self.in_flight.clear();
        self.state = ControllerState::Idle;
    }

    fn emit(&self, event_type: &str, fields: EventPayload) {
        if let Some(events) = &self.events {
            if let Err(err) = events.emit(event_type, fields) {
                warn!(event_type, error = %err, "failed to write event");
            }
        }
    }
}

/// Settles a ticket whose worker went away without sending a completion.
fn abandoned(ticket: Ticket, module: AdvisoryModule) -> Completion {
    Completion {
        ticket,
        module,
        outcome: Err(AdvisoryError::Transport(
            "La consulta terminó sin respuesta.".to_string(),
        )),
        media: None,
        elapsed_ms: 0,
    }
}

fn payload<const N: usize>(pairs: [(&str, Value); N]) -> EventPayload {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use agro_contracts::events::EventWriter;
    use agro_contracts::forms::FormInputs;
    use agro_contracts::modules::AdvisoryModule;
    use agro_contracts::schema::{SchemaDescriptor, SectionBody, SectionShape};
    use serde_json::{json, Map, Value};

    use super::{ControllerState, ControllerView, ModuleController};
    use crate::error::AdvisoryError;
    use crate::gateway::{AiQueryGateway, GenerateRequest, QueryBackend};
    use crate::testing::{clima_reply, keyed_config, StubBackend};

    fn reply_for(schema: &SchemaDescriptor) -> Value {
        let mut object = Map::new();
        for field in schema.fields {
            let section = match field.shape {
                SectionShape::Text => {
                    json!({ "title": format!("Título {}", field.key), "content": "Contenido" })
                }
                SectionShape::List => {
                    json!({ "title": format!("Título {}", field.key), "items": ["uno", "dos"] })
                }
            };
            object.insert(field.key.to_string(), section);
        }
        Value::Object(object)
    }

    fn valid_form(module: AdvisoryModule) -> FormInputs {
        match module {
            AdvisoryModule::MercadoNegocio => FormInputs::new().with_text("ubicacion", "Jaén"),
            AdvisoryModule::SaberAgricola => {
                FormInputs::new().with_text("problema", "Hojas amarillas")
            }
            AdvisoryModule::CreditoProteccion => {
                FormInputs::new().with_text("necesidad", "15000")
            }
            AdvisoryModule::ClimaInteligente => FormInputs::new()
                .with_text("cultivo", "Café")
                .with_text("geolocalizacion", "Jaén"),
            AdvisoryModule::RedAgro => FormInputs::new().with_text("ubicacion", "Piura"),
            AdvisoryModule::LogisticaExportacion => FormInputs::new()
                .with_text("producto", "Palta Hass")
                .with_text("volumen", "1 contenedor")
                .with_text("destino", "Países Bajos"),
        }
    }

    fn controller(module: AdvisoryModule, backend: StubBackend) -> ModuleController {
        ModuleController::new(
            module,
            Arc::new(AiQueryGateway::with_backend(keyed_config(), backend)),
        )
    }

    #[test]
    fn every_module_moves_from_idle_through_loading_to_result() {
        for module in AdvisoryModule::ALL {
            let reply = reply_for(module.schema());
            let mut controller =
                controller(module, StubBackend::replying([reply.to_string()]));
            assert_eq!(controller.state(), &ControllerState::Idle);
            assert_eq!(
                controller.view(),
                ControllerView::Idle {
                    placeholder: module.spec().placeholder
                }
            );

            let prepared = controller.prepare(&valid_form(module));
            assert!(controller.is_loading());
            assert_eq!(
                controller.view(),
                ControllerView::Loading {
                    label: module.spec().busy_label
                }
            );
            assert!(controller.result().is_none());
            assert!(controller.error().is_none());

            let completion = ModuleController::execute(&controller.gateway, prepared);
            assert!(controller.complete(completion));
            assert!(!controller.is_loading());
            let result = controller.result().expect("result for module");
            assert_eq!(result.raw(), &reply, "{module}");
            assert_eq!(result.sections().len(), module.schema().fields.len());
            assert!(controller.error().is_none());
        }
    }

    #[test]
    fn failure_shows_message_and_clears_previous_result() {
        let backend = StubBackend::with_results([
            Ok(clima_reply("Lluvias").to_string()),
            Err(AdvisoryError::Transport("timeout".to_string())),
        ]);
        let mut controller = controller(AdvisoryModule::ClimaInteligente, backend);
        let form = valid_form(AdvisoryModule::ClimaInteligente);

        controller.submit(&form);
        controller.wait();
        assert!(controller.result().is_some());

        controller.submit(&form);
        assert!(controller.result().is_none());
        controller.wait();
        assert_eq!(
            controller.error(),
            Some("Error al contactar el modelo de IA o procesar su respuesta: timeout")
        );
        assert!(controller.result().is_none());
        assert!(matches!(controller.view(), ControllerView::Failed(_)));
    }

    #[test]
    fn every_module_reports_backend_errors_or_its_fallback_text() {
        for module in AdvisoryModule::ALL {
            let mut failing = controller(
                module,
                StubBackend::failing(AdvisoryError::Transport("sin red".to_string())),
            );
            failing.submit(&valid_form(module));
            failing.wait();
            assert_eq!(
                failing.error(),
                Some("Error al contactar el modelo de IA o procesar su respuesta: sin red"),
                "{module}"
            );
            assert!(failing.result().is_none());

            let mut silent = controller(
                module,
                StubBackend::failing(AdvisoryError::Media(String::new())),
            );
            silent.submit(&valid_form(module));
            silent.wait();
            assert_eq!(silent.error(), Some(module.spec().fallback_error), "{module}");
        }
    }

    #[test]
    fn invalid_form_fails_without_calling_backend() {
        let backend = StubBackend::replying(["{}"]);
        let calls = backend.calls();
        let mut controller = controller(AdvisoryModule::LogisticaExportacion, backend);

        controller.submit(&FormInputs::new().with_text("producto", "Mango"));
        controller.wait();
        assert_eq!(controller.error(), Some("El campo 'Volumen' es obligatorio."));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn newest_submission_wins_regardless_of_arrival_order() {
        let backend = StubBackend::replying([
            clima_reply("primero").to_string(),
            clima_reply("segundo").to_string(),
        ]);
        let mut controller = controller(AdvisoryModule::ClimaInteligente, backend);
        let form = valid_form(AdvisoryModule::ClimaInteligente);

        let first = controller.prepare(&form);
        let second = controller.prepare(&form);
        assert!(second.ticket > first.ticket);
        let first_done = ModuleController::execute(&controller.gateway, first);
        let second_done = ModuleController::execute(&controller.gateway, second);

        assert!(!controller.complete(first_done.clone()));
        assert!(controller.is_loading());
        assert!(controller.complete(second_done));
        assert!(!controller.complete(first_done));

        let forecast = controller
            .result()
            .and_then(|result| result.section("forecast"))
            .map(|section| section.body.clone());
        assert_eq!(forecast, Some(SectionBody::Text("segundo".to_string())));
    }

    #[test]
    fn reset_drops_in_flight_submission() {
        let mut controller = controller(
            AdvisoryModule::ClimaInteligente,
            StubBackend::replying([clima_reply("tarde").to_string()]),
        );
        let prepared = controller.prepare(&valid_form(AdvisoryModule::ClimaInteligente));
        controller.reset();
        let completion = ModuleController::execute(&controller.gateway, prepared);
        assert!(!controller.complete(completion));
        assert_eq!(controller.state(), &ControllerState::Idle);
        assert!(controller.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn wait_returns_when_the_ticket_has_no_worker() {
        let mut controller = controller(
            AdvisoryModule::ClimaInteligente,
            StubBackend::replying([clima_reply("Sol").to_string()]),
        );
        let prepared = controller.prepare(&valid_form(AdvisoryModule::ClimaInteligente));
        assert!(matches!(controller.wait(), ControllerState::Loading { .. }));
        assert!(controller.wait_timeout(Duration::from_millis(10)));
        assert!(!controller.poll());

        let completion = ModuleController::execute(&controller.gateway, prepared);
        assert!(controller.complete(completion));
        assert!(controller.result().is_some());
    }

    struct PanickingBackend;

    impl QueryBackend for PanickingBackend {
        fn name(&self) -> &str {
            "panicking"
        }

        fn generate(
            &self,
            _api_key: &str,
            _request: &GenerateRequest<'_>,
        ) -> Result<String, AdvisoryError> {
            panic!("backend exploded")
        }
    }

    #[test]
    fn worker_panic_settles_as_failure() {
        let gateway = Arc::new(AiQueryGateway::with_backend(keyed_config(), PanickingBackend));
        let form = valid_form(AdvisoryModule::RedAgro);

        let mut waited = ModuleController::new(AdvisoryModule::RedAgro, Arc::clone(&gateway));
        waited.submit(&form);
        assert_eq!(
            waited.wait(),
            &ControllerState::Failed("La consulta terminó sin respuesta.".to_string())
        );

        let mut timed = ModuleController::new(AdvisoryModule::RedAgro, Arc::clone(&gateway));
        timed.submit(&form);
        assert!(timed.wait_timeout(Duration::from_secs(5)));
        assert_eq!(timed.error(), Some("La consulta terminó sin respuesta."));

        let mut polled = ModuleController::new(AdvisoryModule::RedAgro, gateway);
        polled.submit(&form);
        let deadline = Instant::now() + Duration::from_secs(5);
        while polled.is_loading() && Instant::now() < deadline {
            polled.poll();
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(polled.error(), Some("La consulta terminó sin respuesta."));
    }

    #[test]
    fn worker_thread_result_is_applied_by_poll() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let events_path = temp.path().join("events.jsonl");
        let mut controller = controller(
            AdvisoryModule::ClimaInteligente,
            StubBackend::replying([clima_reply("Heladas").to_string()]),
        )
        .with_events(EventWriter::new(&events_path, "session-1"));

        controller.submit(&valid_form(AdvisoryModule::ClimaInteligente));
        assert!(controller.wait_timeout(Duration::from_secs(5)));
        assert!(!controller.poll());
        assert!(controller.result().is_some());

        let events = fs::read_to_string(&events_path)?
            .lines()
            .map(serde_json::from_str::<Value>)
            .collect::<Result<Vec<_>, _>>()?;
        let types = events
            .iter()
            .filter_map(|event| event["type"].as_str())
            .collect::<Vec<_>>();
        assert_eq!(types, vec!["query_started", "query_succeeded"]);
        assert_eq!(events[0]["module"], json!("clima"));
        assert_eq!(events[1]["sections"], json!(4));
        assert_eq!(events[1]["session_id"], json!("session-1"));
        Ok(())
    }
}
