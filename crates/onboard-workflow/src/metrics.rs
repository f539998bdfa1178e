use crate::errors::WorkflowError;
use onboard_ledger::{DeliveryEvent, EventPayload, EventRecorder};
use std::collections::BTreeMap;

/// Envíos y fallos de un día de la secuencia.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayStats {
    pub sent: usize,
    pub failed: usize,
}

/// Métricas de entrega calculadas a partir de los eventos registrados.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliverySummary {
    pub sequences_started: usize,
    pub emails_sent: usize,
    pub emails_failed: usize,
    pub permanent_failures: usize,
    pub sequences_completed: usize,
    /// Media de `latencyMs` de los `email_sent` considerados.
    pub avg_latency_ms: Option<u64>,
    /// `completed / started` en porcentaje entero (0 si no hay inicios).
    pub completion_rate_pct: u32,
    pub per_day: BTreeMap<u32, DayStats>,
}

impl DeliverySummary {
    pub fn from_events(events: &[DeliveryEvent]) -> Self {
        let mut summary = DeliverySummary::default();
        let mut latency_total: u128 = 0;
        for event in events {
            // Eventos con payload inválido no cuentan.
            let Ok(payload) = event.typed_payload() else { continue };
            match payload {
                EventPayload::SequenceStarted(_) => summary.sequences_started += 1,
                EventPayload::EmailSent(p) => {
                    summary.emails_sent += 1;
                    latency_total += u128::from(p.latency_ms);
                    summary.per_day.entry(p.day).or_default().sent += 1;
                }
                EventPayload::EmailFailed(p) => {
                    summary.emails_failed += 1;
                    if p.permanent {
                        summary.permanent_failures += 1;
                    }
                    summary.per_day.entry(p.day).or_default().failed += 1;
                }
                EventPayload::SequenceCompleted(_) => summary.sequences_completed += 1,
            }
        }
        if summary.emails_sent > 0 {
            summary.avg_latency_ms = Some((latency_total / summary.emails_sent as u128) as u64);
        }
        if summary.sequences_started > 0 {
            let pct = (summary.sequences_completed as f64 / summary.sequences_started as f64) * 100.0;
            summary.completion_rate_pct = pct.round() as u32;
        }
        summary
    }

    /// Resume los `limit` eventos más recientes del recorder.
    pub fn collect(recorder: &dyn EventRecorder, limit: usize) -> Result<Self, WorkflowError> {
        let events = recorder.list_events(None, limit)?;
        Ok(Self::from_events(&events))
    }
}
