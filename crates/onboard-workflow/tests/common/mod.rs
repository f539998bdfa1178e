#![allow(dead_code)]
use chrono::{DateTime, Duration, TimeZone, Utc};
use onboard_domain::{InMemoryContentRepository, ScriptedDeliveryAdapter, SequenceDefinition, Step};
use onboard_ledger::{AppendResult, DeliveryEvent, DueRun, EventRecorder, EventType, InMemoryLedger, LedgerError,
                     PersistResult, RunState, RunStatus, RunStore};
use onboard_workflow::{AdvanceOutcome, ManualClock, RetryPolicy, SequenceRunner};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub fn t0() -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2026, 2, 2, 9, 0, 0).unwrap()
}

pub fn steps(entries: &[(u32, &str)]) -> SequenceDefinition {
  SequenceDefinition::new(entries.iter()
                              .map(|(day, subject)| Step::new(*day, subject, &format!("cuerpo {}", subject)).unwrap())
                              .collect()).unwrap()
}

pub struct Harness {
  pub ledger: Arc<InMemoryLedger>,
  pub delivery: Arc<ScriptedDeliveryAdapter>,
  pub content: Arc<InMemoryContentRepository>,
  pub clock: Arc<ManualClock>,
  pub runner: Arc<SequenceRunner>,
}

pub fn harness() -> Harness {
  let ledger = Arc::new(InMemoryLedger::new());
  harness_with(ledger.clone(), ledger.clone(), ledger, RetryPolicy::default())
}

pub fn harness_with(ledger: Arc<InMemoryLedger>,
                    runs: Arc<dyn RunStore>,
                    recorder: Arc<dyn EventRecorder>,
                    retry: RetryPolicy)
                    -> Harness {
  let delivery = Arc::new(ScriptedDeliveryAdapter::new());
  let content = Arc::new(InMemoryContentRepository::new());
  let clock = Arc::new(ManualClock::new(t0()));
  let runner = SequenceRunner::new(runs, recorder, delivery.clone(), content.clone(), clock.clone())
    .with_retry_policy(retry)
    .with_claim_lease(Duration::minutes(5));
  Harness { ledger,
            delivery,
            content,
            clock,
            runner: Arc::new(runner) }
}

impl Harness {
  /// Avanza el run moviendo el reloj a cada instante de reanudación hasta
  /// que termina.
  pub fn drive(&self, run_id: &Uuid) -> Vec<AdvanceOutcome> {
    let mut outcomes = Vec::new();
    for _ in 0..100 {
      let outcome = self.runner.advance(run_id).expect("advance");
      outcomes.push(outcome.clone());
      match outcome {
        AdvanceOutcome::Completed | AdvanceOutcome::Inactive(_) => return outcomes,
        AdvanceOutcome::Waiting { until }
        | AdvanceOutcome::Suspended { until }
        | AdvanceOutcome::RetryScheduled { until, .. } => self.clock.set(until),
        AdvanceOutcome::Contended => panic!("unexpected contention"),
      }
    }
    panic!("run did not finish");
  }

  pub fn event_kinds(&self, user: &str) -> Vec<EventType> {
    self.ledger.read_events(user).unwrap().iter().map(|e| e.event_type).collect()
  }

  pub fn sent_subjects(&self) -> Vec<String> {
    self.delivery.sent().into_iter().map(|m| m.subject).collect()
  }
}

/// Qué hacer con la próxima llamada a `save_run`.
#[derive(Debug, Clone, Copy)]
pub enum SaveScript {
  Pass,
  Conflict,
  Fail,
  /// Guarda y, justo después, otro escritor marca el run como abortado.
  PassThenAbort,
}

/// `RunStore` que delega en el ledger salvo lo programado para `save_run`.
pub struct ScriptedRunStore {
  pub inner: Arc<InMemoryLedger>,
  script: Mutex<VecDeque<SaveScript>>,
}

impl ScriptedRunStore {
  pub fn new(inner: Arc<InMemoryLedger>) -> Self {
    Self { inner,
           script: Mutex::new(VecDeque::new()) }
  }

  pub fn push(&self, step: SaveScript) {
    self.script.lock().unwrap().push_back(step);
  }
}

impl RunStore for ScriptedRunStore {
  fn create_run(&self, state: &RunState) -> Result<PersistResult, LedgerError> {
    self.inner.create_run(state)
  }
  fn load_run(&self, run_id: &Uuid) -> Result<RunState, LedgerError> {
    self.inner.load_run(run_id)
  }
  fn save_run(&self, state: &RunState, expected_version: i64) -> Result<PersistResult, LedgerError> {
    let next = self.script.lock().unwrap().pop_front().unwrap_or(SaveScript::Pass);
    match next {
      SaveScript::Pass => self.inner.save_run(state, expected_version),
      SaveScript::Conflict => Ok(PersistResult::Conflict),
      SaveScript::Fail => Err(LedgerError::Storage("db caída".into())),
      SaveScript::PassThenAbort => {
        let saved = self.inner.save_run(state, expected_version)?;
        if let PersistResult::Ok { new_version } = saved {
          let mut aborted = state.clone();
          aborted.status = RunStatus::Aborted;
          self.inner.save_run(&aborted, new_version)?;
        }
        Ok(saved)
      }
    }
  }
  fn find_active_run(&self, user_id: &str) -> Result<Option<RunState>, LedgerError> {
    self.inner.find_active_run(user_id)
  }
  fn list_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<DueRun>, LedgerError> {
    self.inner.list_due(now, limit)
  }
}

/// `EventRecorder` cuyo `append` falla las próximas `n` veces para un tipo.
pub struct FlakyRecorder {
  pub inner: Arc<InMemoryLedger>,
  failing: EventType,
  remaining: AtomicUsize,
}

impl FlakyRecorder {
  pub fn new(inner: Arc<InMemoryLedger>, failing: EventType, times: usize) -> Self {
    Self { inner,
           failing,
           remaining: AtomicUsize::new(times) }
  }
}

impl EventRecorder for FlakyRecorder {
  fn append(&self, event: &DeliveryEvent) -> Result<AppendResult, LedgerError> {
    if event.event_type == self.failing
       && self.remaining
              .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
              .is_ok()
    {
      return Err(LedgerError::Storage("recorder caído".into()));
    }
    self.inner.append(event)
  }
  fn has_event(&self, user_id: &str, event_type: EventType, predicate: &dyn Fn(&DeliveryEvent) -> bool)
               -> Result<bool, LedgerError> {
    self.inner.has_event(user_id, event_type, predicate)
  }
  fn read_events(&self, user_id: &str) -> Result<Vec<DeliveryEvent>, LedgerError> {
    self.inner.read_events(user_id)
  }
  fn list_events(&self, event_type: Option<EventType>, limit: usize) -> Result<Vec<DeliveryEvent>, LedgerError> {
    self.inner.list_events(event_type, limit)
  }
}
