// Archivo: domain.rs
// Propósito: tipos persistidos por el ledger (estado de run y eventos).
use crate::errors::LedgerError;
use chrono::{DateTime, Utc};
use onboard_domain::{SequenceDefinition, Step};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Estado de vida de un run. `Completed` y `Aborted` son terminales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Aborted,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Aborted => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "aborted" => Ok(RunStatus::Aborted),
            other => Err(LedgerError::Validation(format!("estado de run desconocido: {}", other))),
        }
    }
}

/// Tipos de evento de auditoría.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SequenceStarted,
    EmailSent,
    EmailFailed,
    SequenceCompleted,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::SequenceStarted => "sequence_started",
            EventType::EmailSent => "email_sent",
            EventType::EmailFailed => "email_failed",
            EventType::SequenceCompleted => "sequence_completed",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequence_started" => Ok(EventType::SequenceStarted),
            "email_sent" => Ok(EventType::EmailSent),
            "email_failed" => Ok(EventType::EmailFailed),
            "sequence_completed" => Ok(EventType::SequenceCompleted),
            other => Err(LedgerError::Validation(format!("tipo de evento desconocido: {}", other))),
        }
    }
}

/// Checkpoint durable de un run: una fila por (usuario, inscripción).
///
/// `steps_remaining` es el snapshot ordenado de los pasos aún no resueltos;
/// el frente se retira cuando el paso se envía o falla de forma permanente.
/// `cursor_day` es el día del último paso retirado (enviado o fallido) y es el
/// punto de partida del siguiente cálculo de espera; `last_completed_day` sólo
/// avanza con envíos exitosos y nunca decrece.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: Uuid,
    pub user_id: String,
    pub contact_address: String,
    pub steps_remaining: Vec<Step>,
    pub total_steps: u32,
    pub next_step_index: u32,
    pub last_completed_day: u32,
    pub cursor_day: u32,
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    pub resume_not_before: DateTime<Utc>,
    pub status: RunStatus,
    pub sequence_hash: String,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl RunState {
    /// Crea un run `Running` con el snapshot de `definition`. El llamador fija
    /// `resume_not_before` según la espera del primer paso.
    pub fn new(run_id: Uuid,
               user_id: &str,
               contact_address: &str,
               definition: &SequenceDefinition,
               started_at: DateTime<Utc>)
               -> Self {
        Self { run_id,
               user_id: user_id.to_string(),
               contact_address: contact_address.to_string(),
               steps_remaining: definition.steps().to_vec(),
               total_steps: definition.len() as u32,
               next_step_index: 0,
               last_completed_day: 0,
               cursor_day: 0,
               attempt: 0,
               started_at,
               resume_not_before: started_at,
               status: RunStatus::Running,
               sequence_hash: definition.content_hash().to_string(),
               version: 0,
               updated_at: started_at }
    }

    pub fn front(&self) -> Option<&Step> {
        self.steps_remaining.first()
    }

    pub fn is_active(&self) -> bool {
        self.status == RunStatus::Running
    }

    /// Retira el paso del frente. `delivered` indica si se envió (avanza
    /// `last_completed_day`) o si falló de forma permanente.
    pub fn finish_front(&mut self, delivered: bool) -> Option<Step> {
        if self.steps_remaining.is_empty() {
            return None;
        }
        let step = self.steps_remaining.remove(0);
        self.next_step_index += 1;
        self.cursor_day = step.day();
        if delivered {
            self.last_completed_day = self.last_completed_day.max(step.day());
        }
        self.attempt = 0;
        Some(step)
    }
}

/// Evento de auditoría inmutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryEvent {
    pub id: Uuid,
    pub run_id: Uuid,
    pub user_id: String,
    pub event_type: EventType,
    pub command_id: Uuid,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl DeliveryEvent {
    /// Índice del paso al que se refiere el evento, si aplica.
    pub fn step_index(&self) -> Option<u32> {
        self.payload.get("step").and_then(|v| v.as_u64()).map(|v| v as u32)
    }

    /// `true` si es un `email_failed` permanente.
    pub fn is_permanent_failure(&self) -> bool {
        self.event_type == EventType::EmailFailed
        && self.payload.get("permanent").and_then(|v| v.as_bool()).unwrap_or(false)
    }
}

/// Resultado de una escritura con control optimista.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistResult {
    Ok { new_version: i64 },
    Conflict,
}

/// Resultado de `EventRecorder::append`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendResult {
    Appended,
    Duplicate,
}

/// Entrada de la lista de runs vencidos.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueRun {
    pub run_id: Uuid,
    pub user_id: String,
    pub resume_not_before: DateTime<Utc>,
}
