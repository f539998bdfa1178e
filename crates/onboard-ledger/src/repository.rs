// Archivo: repository.rs
// Propósito: contratos de persistencia del ledger.
use crate::domain::{AppendResult, DeliveryEvent, DueRun, EventType, PersistResult, RunState};
use crate::errors::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Registro append-only de eventos de auditoría.
pub trait EventRecorder: Send + Sync {
    /// Añade un evento. Un `command_id` ya presente devuelve
    /// `AppendResult::Duplicate` sin modificar nada.
    fn append(&self, event: &DeliveryEvent) -> Result<AppendResult>;

    /// `true` si existe algún evento de `event_type` del usuario que cumpla
    /// `predicate`.
    fn has_event(&self, user_id: &str, event_type: EventType, predicate: &dyn Fn(&DeliveryEvent) -> bool)
                 -> Result<bool>;

    /// Eventos del usuario en orden de registro.
    fn read_events(&self, user_id: &str) -> Result<Vec<DeliveryEvent>>;

    /// Eventos más recientes primero, opcionalmente filtrados por tipo.
    fn list_events(&self, event_type: Option<EventType>, limit: usize) -> Result<Vec<DeliveryEvent>>;
}

/// Almacén de checkpoints de runs con locking optimista.
pub trait RunStore: Send + Sync {
    /// Inserta un run nuevo. Devuelve `Conflict` si el usuario ya tiene un
    /// run `Running`; en caso contrario `Ok { new_version: 0 }`.
    fn create_run(&self, state: &RunState) -> Result<PersistResult>;

    fn load_run(&self, run_id: &Uuid) -> Result<RunState>;

    /// Reemplaza el run si su versión almacenada es `expected_version`; la
    /// nueva versión es `expected_version + 1`.
    fn save_run(&self, state: &RunState, expected_version: i64) -> Result<PersistResult>;

    /// Run `Running` del usuario, si existe.
    fn find_active_run(&self, user_id: &str) -> Result<Option<RunState>>;

    /// Runs `Running` con `resume_not_before <= now`, los más atrasados
    /// primero, como máximo `limit`.
    fn list_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<DueRun>>;
}
