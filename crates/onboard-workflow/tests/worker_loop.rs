mod common;

use chrono::Duration;
use common::{harness, steps, t0};
use onboard_ledger::EventType;
use onboard_workflow::{run_worker, Clock, DuePoller};
use std::sync::Arc;
use tokio::sync::watch;

#[test]
fn worker_ticks_until_shutdown() {
  let h = harness();
  h.runner.start("u1", "u1@example.com", Some(&steps(&[(1, "a"), (1, "b")]))).unwrap();
  h.clock.set(t0() + Duration::days(1));
  let poller = Arc::new(DuePoller::new(h.runner.clone(), h.ledger.clone(), 10));
  let clock: Arc<dyn Clock> = h.clock.clone();

  let ticks = tokio_test::block_on(async move {
    let (tx, rx) = watch::channel(false);
    let worker = tokio::spawn(run_worker(poller, clock, std::time::Duration::from_millis(10), rx));
    tokio::time::sleep(std::time::Duration::from_millis(80)).await;
    tx.send(true).unwrap();
    worker.await.unwrap().unwrap()
  });

  assert!(ticks >= 1);
  assert_eq!(h.sent_subjects(), vec!["a", "b"]);
  assert_eq!(h.ledger.count_events(EventType::SequenceCompleted), 1);
}

#[test]
fn worker_stops_when_sender_is_dropped() {
  let h = harness();
  let poller = Arc::new(DuePoller::new(h.runner.clone(), h.ledger.clone(), 10));
  let clock: Arc<dyn Clock> = h.clock.clone();
  let ticks = tokio_test::block_on(async move {
    let (tx, rx) = watch::channel(false);
    let worker = tokio::spawn(run_worker(poller, clock, std::time::Duration::from_secs(3600), rx));
    // el primer tick del intervalo es inmediato
    tokio::task::yield_now().await;
    drop(tx);
    worker.await.unwrap().unwrap()
  });
  assert!(ticks <= 1);
  assert!(h.delivery.sent().is_empty());
}
