use crate::clock::Clock;
use crate::errors::WorkflowError;
use crate::scheduler::DuePoller;
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Bucle del worker: ejecuta `DuePoller::tick` cada `interval` hasta que
/// `shutdown` pase a `true` (o se cierre el emisor). El tick es bloqueante y
/// corre en `spawn_blocking`. Devuelve cuántos ticks completaron.
pub async fn run_worker(poller: Arc<DuePoller>,
                        clock: Arc<dyn Clock>,
                        interval: Duration,
                        mut shutdown: watch::Receiver<bool>)
                        -> Result<u64, WorkflowError> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut ticks = 0u64;
    info!("Worker iniciado (intervalo {:?})", interval);
    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            _ = ticker.tick() => {
                let poller = Arc::clone(&poller);
                let now = clock.now();
                match tokio::task::spawn_blocking(move || poller.tick(now)).await {
                    Ok(Ok(_report)) => ticks += 1,
                    Ok(Err(e)) => error!("Tick fallido: {}", e),
                    Err(e) => error!("Tarea de tick abortada: {}", e),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    info!("Worker detenido tras {} ticks", ticks);
    Ok(ticks)
}
