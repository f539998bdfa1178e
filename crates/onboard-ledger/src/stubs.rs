// Archivo: stubs.rs
// Propósito: implementación en memoria de `RunStore` y `EventRecorder` para
// pruebas y desarrollo.
use crate::domain::{AppendResult, DeliveryEvent, DueRun, EventType, PersistResult, RunState};
use crate::errors::{LedgerError, Result};
use crate::repository::{EventRecorder, RunStore};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::debug;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Ledger en memoria.
///
/// Los runs viven en un `DashMap` con un índice `user_id -> run_id` de runs
/// activos; los eventos en un `Vec` protegido por mutex, en orden de registro.
/// Nunca se mantiene un guard de `runs` mientras se modifica `active_by_user`.
pub struct InMemoryLedger {
    runs: DashMap<Uuid, RunState>,
    active_by_user: DashMap<String, Uuid>,
    events: Mutex<Vec<DeliveryEvent>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self { runs: DashMap::new(),
               active_by_user: DashMap::new(),
               events: Mutex::new(Vec::new()) }
    }

    fn lock<'a, T>(&'a self, m: &'a Mutex<T>) -> std::result::Result<MutexGuard<'a, T>, LedgerError> {
        m.lock().map_err(|e| LedgerError::Storage(format!("mutex poisoned: {:?}", e)))
    }

    /// Número de eventos de `event_type` registrados (útil en tests).
    pub fn count_events(&self, event_type: EventType) -> usize {
        self.events
            .lock()
            .map(|evs| evs.iter().filter(|e| e.event_type == event_type).count())
            .unwrap_or(0)
    }

    /// Runs registrados para el usuario, activos o archivados.
    pub fn runs_for_user(&self, user_id: &str) -> Vec<RunState> {
        self.runs.iter().filter(|r| r.user_id == user_id).map(|r| r.value().clone()).collect()
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStore for InMemoryLedger {
    fn create_run(&self, state: &RunState) -> Result<PersistResult> {
        if !state.is_active() {
            return Err(LedgerError::Validation("sólo se crean runs en estado running".into()));
        }
        if self.runs.contains_key(&state.run_id) {
            return Err(LedgerError::Conflict(format!("run {} ya existe", state.run_id)));
        }
        let mut stored = state.clone();
        stored.version = 0;
        // El run se inserta con la entrada del índice tomada: el alta es
        // atómica por usuario.
        match self.active_by_user.entry(state.user_id.clone()) {
            Entry::Occupied(mut slot) => {
                let still_active = self.runs.get(slot.get()).map(|r| r.is_active()).unwrap_or(false);
                if still_active {
                    return Ok(PersistResult::Conflict);
                }
                self.runs.insert(state.run_id, stored);
                slot.insert(state.run_id);
            }
            Entry::Vacant(slot) => {
                self.runs.insert(state.run_id, stored);
                slot.insert(state.run_id);
            }
        }
        Ok(PersistResult::Ok { new_version: 0 })
    }

    fn load_run(&self, run_id: &Uuid) -> Result<RunState> {
        self.runs
            .get(run_id)
            .map(|r| r.value().clone())
            .ok_or(LedgerError::NotFound(format!("run {}", run_id)))
    }

    fn save_run(&self, state: &RunState, expected_version: i64) -> Result<PersistResult> {
        {
            let mut current = self.runs
                                  .get_mut(&state.run_id)
                                  .ok_or(LedgerError::NotFound(format!("run {}", state.run_id)))?;
            if current.version != expected_version {
                debug!("save_run en conflicto: run={} esperada={} actual={}",
                       state.run_id, expected_version, current.version);
                return Ok(PersistResult::Conflict);
            }
            let mut next = state.clone();
            next.version = expected_version + 1;
            *current = next;
        }
        if !state.is_active() {
            self.active_by_user.remove_if(&state.user_id, |_, id| *id == state.run_id);
        }
        Ok(PersistResult::Ok { new_version: expected_version + 1 })
    }

    fn find_active_run(&self, user_id: &str) -> Result<Option<RunState>> {
        let run_id = match self.active_by_user.get(user_id) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self.runs.get(&run_id).map(|r| r.value().clone()).filter(|r| r.is_active()))
    }

    fn list_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<DueRun>> {
        let mut due: Vec<DueRun> = self.runs
                                       .iter()
                                       .filter(|r| r.is_active() && r.resume_not_before <= now)
                                       .map(|r| DueRun { run_id: r.run_id,
                                                         user_id: r.user_id.clone(),
                                                         resume_not_before: r.resume_not_before })
                                       .collect();
        due.sort_by_key(|d| d.resume_not_before);
        due.truncate(limit);
        Ok(due)
    }
}

impl EventRecorder for InMemoryLedger {
    fn append(&self, event: &DeliveryEvent) -> Result<AppendResult> {
        event.validate()?;
        let mut events = self.lock(&self.events)?;
        if events.iter().any(|e| e.command_id == event.command_id) {
            return Ok(AppendResult::Duplicate);
        }
        events.push(event.clone());
        Ok(AppendResult::Appended)
    }

    fn has_event(&self, user_id: &str, event_type: EventType, predicate: &dyn Fn(&DeliveryEvent) -> bool)
                 -> Result<bool> {
        let events = self.lock(&self.events)?;
        Ok(events.iter()
                 .any(|e| e.user_id == user_id && e.event_type == event_type && predicate(e)))
    }

    fn read_events(&self, user_id: &str) -> Result<Vec<DeliveryEvent>> {
        let events = self.lock(&self.events)?;
        Ok(events.iter().filter(|e| e.user_id == user_id).cloned().collect())
    }

    fn list_events(&self, event_type: Option<EventType>, limit: usize) -> Result<Vec<DeliveryEvent>> {
        let events = self.lock(&self.events)?;
        Ok(events.iter()
                 .rev()
                 .filter(|e| event_type.map_or(true, |t| e.event_type == t))
                 .take(limit)
                 .cloned()
                 .collect())
    }
}
