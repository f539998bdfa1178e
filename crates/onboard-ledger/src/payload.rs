// Archivo: payload.rs
// Propósito: formas tipadas de los payloads de evento y su validación.
use crate::domain::{DeliveryEvent, EventType};
use crate::errors::{LedgerError, Result};
use crate::idempotency::command_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceStartedPayload {
    pub sequence_length: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailSentPayload {
    pub step: u32,
    pub day: u32,
    pub delivery_id: String,
    /// Milisegundos desde el inicio del run (acumulado, no por paso).
    pub latency_ms: u64,
    pub subject: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailFailedPayload {
    pub step: u32,
    pub day: u32,
    pub subject: String,
    pub error: String,
    pub permanent: bool,
    pub attempt: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceCompletedPayload {
    pub total_days: u32,
}

/// Payload de evento con su tipo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    SequenceStarted(SequenceStartedPayload),
    EmailSent(EmailSentPayload),
    EmailFailed(EmailFailedPayload),
    SequenceCompleted(SequenceCompletedPayload),
}

impl EventPayload {
    pub fn event_type(&self) -> EventType {
        match self {
            EventPayload::SequenceStarted(_) => EventType::SequenceStarted,
            EventPayload::EmailSent(_) => EventType::EmailSent,
            EventPayload::EmailFailed(_) => EventType::EmailFailed,
            EventPayload::SequenceCompleted(_) => EventType::SequenceCompleted,
        }
    }

    /// (paso, intento) que entran en el `command_id`.
    fn idempotency_parts(&self) -> (u32, u32) {
        match self {
            EventPayload::SequenceStarted(_) | EventPayload::SequenceCompleted(_) => (0, 0),
            EventPayload::EmailSent(p) => (p.step, 0),
            EventPayload::EmailFailed(p) => (p.step, p.attempt),
        }
    }

    pub fn to_value(&self) -> Result<serde_json::Value> {
        let value = match self {
            EventPayload::SequenceStarted(p) => serde_json::to_value(p)?,
            EventPayload::EmailSent(p) => serde_json::to_value(p)?,
            EventPayload::EmailFailed(p) => serde_json::to_value(p)?,
            EventPayload::SequenceCompleted(p) => serde_json::to_value(p)?,
        };
        Ok(value)
    }

    /// Interpreta y valida `value` según `event_type`.
    pub fn parse(event_type: EventType, value: &serde_json::Value) -> Result<Self> {
        let payload = match event_type {
            EventType::SequenceStarted => EventPayload::SequenceStarted(serde_json::from_value(value.clone())?),
            EventType::EmailSent => EventPayload::EmailSent(serde_json::from_value(value.clone())?),
            EventType::EmailFailed => EventPayload::EmailFailed(serde_json::from_value(value.clone())?),
            EventType::SequenceCompleted => EventPayload::SequenceCompleted(serde_json::from_value(value.clone())?),
        };
        payload.validate()?;
        Ok(payload)
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            EventPayload::SequenceStarted(p) if p.sequence_length == 0 => {
                Err(LedgerError::Validation("sequence_started con sequenceLength = 0".into()))
            }
            EventPayload::EmailSent(p) if p.day == 0 => Err(LedgerError::Validation("email_sent con day = 0".into())),
            EventPayload::EmailSent(p) if p.delivery_id.trim().is_empty() => {
                Err(LedgerError::Validation("email_sent sin deliveryId".into()))
            }
            EventPayload::EmailFailed(p) if p.day == 0 => {
                Err(LedgerError::Validation("email_failed con day = 0".into()))
            }
            EventPayload::EmailFailed(p) if p.error.trim().is_empty() => {
                Err(LedgerError::Validation("email_failed sin mensaje de error".into()))
            }
            _ => Ok(()),
        }
    }
}

impl DeliveryEvent {
    /// Construye un evento con id aleatorio y `command_id` determinista.
    pub fn from_payload(run_id: Uuid, user_id: &str, payload: &EventPayload, at: DateTime<Utc>) -> Result<Self> {
        payload.validate()?;
        let (step, attempt) = payload.idempotency_parts();
        let event_type = payload.event_type();
        Ok(Self { id: Uuid::new_v4(),
                  run_id,
                  user_id: user_id.to_string(),
                  event_type,
                  command_id: command_id(&run_id, event_type, step, attempt),
                  payload: payload.to_value()?,
                  created_at: at })
    }

    /// Payload tipado (valida la forma almacenada).
    pub fn typed_payload(&self) -> Result<EventPayload> {
        EventPayload::parse(self.event_type, &self.payload)
    }

    pub fn validate(&self) -> Result<()> {
        self.typed_payload().map(|_| ())
    }
}
