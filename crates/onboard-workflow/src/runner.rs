use crate::clock::{Clock, StepClock};
use crate::errors::WorkflowError;
use crate::retry::RetryPolicy;
use chrono::{DateTime, Duration, Utc};
use log::{debug, error, info, warn};
use onboard_domain::{DeliveryAdapter, DeliveryReceipt, MemberStatus, MemberStatusSink, SequenceDefinition, Step};
use onboard_ledger::{AppendResult, DeliveryEvent, EmailFailedPayload, EmailSentPayload, EventPayload,
                     EventRecorder, EventType, LedgerError, PersistResult, RunState, RunStatus, RunStore,
                     SequenceCompletedPayload, SequenceStartedPayload};
use std::sync::Arc;
use uuid::Uuid;

/// Reintentos de `abort` ante conflictos de versión.
const ABORT_ATTEMPTS: usize = 3;

/// Referencia a un run recién creado.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHandle {
    pub run_id: Uuid,
    pub user_id: String,
    pub total_steps: u32,
    /// Momento a partir del cual se envía el primer paso.
    pub resume_not_before: DateTime<Utc>,
}

/// Resultado de una llamada a `SequenceRunner::advance`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Todavía no vence; no se hizo nada.
    Waiting { until: DateTime<Utc> },
    /// Se enviaron pasos y el run quedó suspendido hasta el siguiente.
    Suspended { until: DateTime<Utc> },
    /// Fallo transitorio: el mismo paso se reintenta en `until`.
    RetryScheduled { until: DateTime<Utc>, attempt: u32 },
    Completed,
    /// El run ya no está en curso (completado o abortado).
    Inactive(RunStatus),
    /// Otro worker reclamó o modificó el run; no hubo efectos.
    Contended,
}

enum StepResult {
    Delivered,
    PermanentlyFailed,
    RetryLater,
    /// El run cambió desde el reclamo (abortado u otro escritor); no se envió.
    Preempted(AdvanceOutcome),
}

/// Ejecuta runs de secuencias como una máquina de estados con checkpoint.
///
/// Cada llamada a `advance` reclama el run (escritura con versión esperada),
/// ejecuta los pasos vencidos uno a uno, guarda el checkpoint tras cada paso
/// y se detiene persistiendo `resume_not_before` cuando el siguiente paso
/// requiere esperar. Nunca duerme en proceso.
pub struct SequenceRunner {
    runs: Arc<dyn RunStore>,
    recorder: Arc<dyn EventRecorder>,
    delivery: Arc<dyn DeliveryAdapter>,
    status_sink: Arc<dyn MemberStatusSink>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    claim_lease: Duration,
}

impl SequenceRunner {
    pub fn new(runs: Arc<dyn RunStore>,
               recorder: Arc<dyn EventRecorder>,
               delivery: Arc<dyn DeliveryAdapter>,
               status_sink: Arc<dyn MemberStatusSink>,
               clock: Arc<dyn Clock>)
               -> Self {
        Self { runs,
               recorder,
               delivery,
               status_sink,
               clock,
               retry: RetryPolicy::default(),
               claim_lease: Duration::minutes(5) }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_claim_lease(mut self, lease: Duration) -> Self {
        self.claim_lease = lease;
        self
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Inscribe a `user_id` con un snapshot de `definition`.
    ///
    /// Falla con `EmptySequence` si la definición falta o no tiene pasos, y con
    /// `AlreadyEnrolled` si el usuario ya tiene un run `Running`.
    pub fn start(&self,
                 user_id: &str,
                 contact_address: &str,
                 definition: Option<&SequenceDefinition>)
                 -> Result<RunHandle, WorkflowError> {
        let definition = match definition {
            Some(d) if !d.is_empty() => d,
            _ => return Err(WorkflowError::EmptySequence(user_id.to_string())),
        };
        if let Some(active) = self.runs.find_active_run(user_id)? {
            return Err(WorkflowError::AlreadyEnrolled { user_id: user_id.to_string(),
                                                        run_id: Some(active.run_id) });
        }

        let now = self.clock.now();
        let mut state = RunState::new(Uuid::new_v4(), user_id, contact_address, definition, now);
        let first_day = state.front().map(Step::day).unwrap_or(0);
        state.resume_not_before = StepClock::resume_at(now, 0, first_day);
        if let PersistResult::Conflict = self.runs.create_run(&state)? {
            return Err(WorkflowError::AlreadyEnrolled { user_id: user_id.to_string(),
                                                        run_id: None });
        }
        info!("Run {} iniciado para {} ({} pasos, primer envío {})",
              state.run_id, user_id, state.total_steps, state.resume_not_before);

        // Si falla aquí, `advance` lo vuelve a intentar antes del primer paso.
        if let Err(e) = self.record(&state, &Self::started_payload(&state)) {
            warn!("sequence_started no registrado para run {}: {}", state.run_id, e);
        }
        self.set_status_best_effort(user_id, &MemberStatus::Pending);

        let handle = RunHandle { run_id: state.run_id,
                                 user_id: state.user_id.clone(),
                                 total_steps: state.total_steps,
                                 resume_not_before: state.resume_not_before };
        if state.resume_not_before <= now {
            self.advance(&state.run_id)?;
        }
        Ok(handle)
    }

    /// Avanza el run si ya venció: envía los pasos pendientes hasta que uno
    /// requiera esperar, falle de forma transitoria o la secuencia termine.
    pub fn advance(&self, run_id: &Uuid) -> Result<AdvanceOutcome, WorkflowError> {
        let mut state = self.runs.load_run(run_id)?;
        if !state.is_active() {
            return Ok(AdvanceOutcome::Inactive(state.status));
        }
        let now = self.clock.now();
        if state.resume_not_before > now {
            return Ok(AdvanceOutcome::Waiting { until: state.resume_not_before });
        }

        // Reclamo: mientras dure el lease el run no aparece como vencido.
        state.resume_not_before = now + self.claim_lease;
        state.updated_at = now;
        if !self.checkpoint(&mut state)? {
            debug!("Run {} reclamado por otro worker", run_id);
            return Ok(AdvanceOutcome::Contended);
        }
        if state.next_step_index == 0 {
            self.record_durably(&state, &Self::started_payload(&state))?;
        }

        loop {
            let step = match state.front() {
                Some(step) => step.clone(),
                None => return self.complete(state),
            };
            match self.execute_step(&state, &step)? {
                StepResult::Delivered => {
                    state.finish_front(true);
                }
                StepResult::PermanentlyFailed => {
                    state.finish_front(false);
                }
                StepResult::Preempted(outcome) => return Ok(outcome),
                StepResult::RetryLater => {
                    let now = self.clock.now();
                    state.attempt += 1;
                    let until = now + self.retry.backoff(state.attempt);
                    state.resume_not_before = until;
                    state.updated_at = now;
                    if !self.checkpoint(&mut state)? {
                        return Ok(AdvanceOutcome::Contended);
                    }
                    warn!("Reintento {} del día {} (run {}) programado para {}",
                          state.attempt,
                          step.day(),
                          state.run_id,
                          until);
                    return Ok(AdvanceOutcome::RetryScheduled { until, attempt: state.attempt });
                }
            }

            let now = self.clock.now();
            state.updated_at = now;
            let wait = state.front()
                            .map(|next| StepClock::offset_from(state.cursor_day, next.day()))
                            .unwrap_or_else(Duration::zero);
            if wait > Duration::zero() {
                let until = now + wait;
                state.resume_not_before = until;
                if !self.checkpoint(&mut state)? {
                    return Ok(AdvanceOutcome::Contended);
                }
                debug!("Run {} suspendido hasta {}", state.run_id, until);
                return Ok(AdvanceOutcome::Suspended { until });
            }
            // Sin espera: se guarda el progreso y se sigue con el lease vigente.
            state.resume_not_before = now + self.claim_lease;
            if !self.checkpoint(&mut state)? {
                return Ok(AdvanceOutcome::Contended);
            }
        }
    }

    /// Marca como `Aborted` el run activo del usuario. Los pasos ya enviados y
    /// sus eventos se conservan.
    pub fn abort(&self, user_id: &str) -> Result<Option<Uuid>, WorkflowError> {
        for _ in 0..ABORT_ATTEMPTS {
            let mut state = match self.runs.find_active_run(user_id)? {
                Some(state) => state,
                None => {
                    debug!("Sin run activo que abortar para {}", user_id);
                    return Ok(None);
                }
            };
            state.status = RunStatus::Aborted;
            state.updated_at = self.clock.now();
            if self.checkpoint(&mut state)? {
                info!("Run {} abortado para {}", state.run_id, user_id);
                self.set_status_best_effort(user_id, &MemberStatus::Cancelled);
                return Ok(Some(state.run_id));
            }
        }
        Err(WorkflowError::Contended(user_id.to_string()))
    }

    fn execute_step(&self, state: &RunState, step: &Step) -> Result<StepResult, WorkflowError> {
        let run_id = state.run_id;
        let index = state.next_step_index;
        let same_step = |e: &DeliveryEvent| e.run_id == run_id && e.step_index() == Some(index);

        if self.recorder.has_event(&state.user_id, EventType::EmailSent, &same_step)? {
            info!("Día {} del run {} ya enviado; no se reenvía", step.day(), run_id);
            return Ok(StepResult::Delivered);
        }
        let permanent_failure = |e: &DeliveryEvent| same_step(e) && e.is_permanent_failure();
        if self.recorder.has_event(&state.user_id, EventType::EmailFailed, &permanent_failure)? {
            info!("Día {} del run {} ya marcado como fallo permanente", step.day(), run_id);
            return Ok(StepResult::PermanentlyFailed);
        }

        let current = self.runs.load_run(&run_id)?;
        if !current.is_active() {
            info!("Run {} pasó a {:?} antes del día {}; no se envía", run_id, current.status, step.day());
            return Ok(StepResult::Preempted(AdvanceOutcome::Inactive(current.status)));
        }
        if current.version != state.version {
            debug!("Run {} modificado por otro escritor antes del día {}", run_id, step.day());
            return Ok(StepResult::Preempted(AdvanceOutcome::Contended));
        }

        match self.delivery.send(&state.contact_address, step.subject(), step.body()) {
            Ok(receipt) => {
                let receipt = DeliveryReceipt::new(receipt.delivery_id);
                // Latencia acumulada desde el inicio del run.
                let latency_ms = (self.clock.now() - state.started_at).num_milliseconds().max(0) as u64;
                let payload = EventPayload::EmailSent(EmailSentPayload { step: index,
                                                                         day: step.day(),
                                                                         delivery_id: receipt.delivery_id.clone(),
                                                                         latency_ms,
                                                                         subject: step.subject().to_string() });
                self.record_durably(state, &payload)?;
                info!("Día {} enviado a {} (run {}, entrega {}, {} ms)",
                      step.day(),
                      state.user_id,
                      run_id,
                      receipt.delivery_id,
                      latency_ms);
                self.set_status_best_effort(&state.user_id, &MemberStatus::DaySent(step.day()));
                Ok(StepResult::Delivered)
            }
            Err(err) => {
                let permanent = err.is_permanent();
                let payload = EventPayload::EmailFailed(EmailFailedPayload { step: index,
                                                                             day: step.day(),
                                                                             subject: step.subject().to_string(),
                                                                             error: err.to_string(),
                                                                             permanent,
                                                                             attempt: state.attempt + 1 });
                if permanent {
                    self.record_durably(state, &payload)?;
                    warn!("Día {} del run {} descartado: {}", step.day(), run_id, err);
                    self.set_status_best_effort(&state.user_id, &MemberStatus::DayFailed(step.day()));
                    Ok(StepResult::PermanentlyFailed)
                } else {
                    if let Err(e) = self.record(state, &payload) {
                        warn!("email_failed no registrado para run {}: {}", run_id, e);
                    }
                    Ok(StepResult::RetryLater)
                }
            }
        }
    }

    fn complete(&self, mut state: RunState) -> Result<AdvanceOutcome, WorkflowError> {
        let payload = EventPayload::SequenceCompleted(SequenceCompletedPayload { total_days: state.total_steps });
        self.record_durably(&state, &payload)?;
        let now = self.clock.now();
        state.status = RunStatus::Completed;
        state.resume_not_before = now;
        state.updated_at = now;
        if !self.checkpoint(&mut state)? {
            return Ok(AdvanceOutcome::Contended);
        }
        info!("Run {} completado para {} ({} pasos)", state.run_id, state.user_id, state.total_steps);
        self.set_status_best_effort(&state.user_id, &MemberStatus::Completed);
        Ok(AdvanceOutcome::Completed)
    }

    fn started_payload(state: &RunState) -> EventPayload {
        EventPayload::SequenceStarted(SequenceStartedPayload { sequence_length: state.total_steps })
    }

    /// Guarda `state` con su versión actual como esperada. `false` si otro
    /// escritor se adelantó.
    fn checkpoint(&self, state: &mut RunState) -> Result<bool, WorkflowError> {
        match self.runs.save_run(state, state.version)? {
            PersistResult::Ok { new_version } => {
                state.version = new_version;
                Ok(true)
            }
            PersistResult::Conflict => {
                debug!("Conflicto de versión en run {} (esperada {})", state.run_id, state.version);
                Ok(false)
            }
        }
    }

    fn record(&self, state: &RunState, payload: &EventPayload) -> Result<AppendResult, LedgerError> {
        let event = DeliveryEvent::from_payload(state.run_id, &state.user_id, payload, self.clock.now())?;
        self.recorder.append(&event)
    }

    /// Registra un evento que no puede perderse: reintenta en proceso y, si
    /// sigue fallando, escala con `RecorderUnavailable`.
    fn record_durably(&self, state: &RunState, payload: &EventPayload) -> Result<(), WorkflowError> {
        let attempts = self.retry.record_attempts.max(1);
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            match self.record(state, payload) {
                Ok(AppendResult::Appended) => return Ok(()),
                Ok(AppendResult::Duplicate) => {
                    debug!("{} ya registrado para run {}", payload.event_type(), state.run_id);
                    return Ok(());
                }
                Err(LedgerError::Validation(msg)) => return Err(LedgerError::Validation(msg).into()),
                Err(e) => {
                    warn!("Fallo registrando {} del run {} (intento {}/{}): {}",
                          payload.event_type(),
                          state.run_id,
                          attempt,
                          attempts,
                          e);
                    last_error = e.to_string();
                }
            }
        }
        error!("Recorder no disponible: {} del run {} sin registrar tras {} intentos: {}",
               payload.event_type(),
               state.run_id,
               attempts,
               last_error);
        Err(WorkflowError::RecorderUnavailable { run_id: state.run_id,
                                                 event_type: payload.event_type().to_string(),
                                                 reason: last_error })
    }

    fn set_status_best_effort(&self, user_id: &str, status: &MemberStatus) {
        if let Err(e) = self.status_sink.set_status(user_id, status) {
            warn!("No se pudo marcar '{}' para {}: {}", status, user_id, e);
        }
    }
}
