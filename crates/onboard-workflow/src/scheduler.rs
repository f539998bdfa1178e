use crate::errors::WorkflowError;
use crate::runner::{AdvanceOutcome, SequenceRunner};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use onboard_ledger::RunStore;
use rayon::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

/// Resumen de un tick del poller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub due: usize,
    pub suspended: usize,
    pub completed: usize,
    pub retries: usize,
    /// Runs que ya no estaban vencidos, activos o que otro worker reclamó.
    pub skipped: usize,
    pub failed: Vec<(Uuid, String)>,
}

/// Lista los runs vencidos y los avanza en paralelo, uno por tarea.
pub struct DuePoller {
    runner: Arc<SequenceRunner>,
    runs: Arc<dyn RunStore>,
    batch: usize,
}

impl DuePoller {
    pub fn new(runner: Arc<SequenceRunner>, runs: Arc<dyn RunStore>, batch: usize) -> Self {
        Self { runner,
               runs,
               batch: batch.max(1) }
    }

    pub fn tick(&self, now: DateTime<Utc>) -> Result<TickReport, WorkflowError> {
        let due = self.runs.list_due(now, self.batch)?;
        if due.is_empty() {
            debug!("Sin runs vencidos a {}", now);
            return Ok(TickReport::default());
        }
        let outcomes: Vec<(Uuid, Result<AdvanceOutcome, WorkflowError>)> =
            due.par_iter().map(|d| (d.run_id, self.runner.advance(&d.run_id))).collect();

        let mut report = TickReport { due: due.len(),
                                      ..TickReport::default() };
        for (run_id, outcome) in outcomes {
            match outcome {
                Ok(AdvanceOutcome::Suspended { .. }) => report.suspended += 1,
                Ok(AdvanceOutcome::Completed) => report.completed += 1,
                Ok(AdvanceOutcome::RetryScheduled { .. }) => report.retries += 1,
                Ok(AdvanceOutcome::Waiting { .. } | AdvanceOutcome::Inactive(_) | AdvanceOutcome::Contended) => {
                    report.skipped += 1
                }
                Err(e) => {
                    warn!("No se pudo avanzar el run {}: {}", run_id, e);
                    report.failed.push((run_id, e.to_string()));
                }
            }
        }
        info!("Tick: {} vencidos, {} suspendidos, {} completados, {} reintentos, {} errores",
              report.due,
              report.suspended,
              report.completed,
              report.retries,
              report.failed.len());
        Ok(report)
    }
}
