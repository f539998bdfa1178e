use chrono::{Duration, TimeZone, Utc};
use onboard_domain::{SequenceDefinition, Step};
use onboard_ledger::{AppendResult, DeliveryEvent, EmailSentPayload, EventPayload, EventRecorder, EventType,
                     LedgerError, PersistResult, RunState, RunStatus, RunStore, SequenceStartedPayload};
use onboard_persistence::{Database, DieselLedgerRepository};
use uuid::Uuid;

// Base SQLite en un fichero temporal por test.
fn sqlite_repo() -> Option<DieselLedgerRepository> {
  if cfg!(feature = "pg") {
    eprintln!("skipping sqlite-only persistence test because 'pg' feature is enabled");
    return None;
  }
  let tmp_path = std::env::temp_dir().join(format!("onboard_ledger_{}.db", Uuid::new_v4()));
  let db = Database::connect(tmp_path.to_str().unwrap()).expect("db connect");
  Some(db.ledger())
}

fn new_run(user: &str) -> RunState {
  let t0 = Utc.with_ymd_and_hms(2026, 3, 2, 8, 30, 0).unwrap();
  let def = SequenceDefinition::new(vec![Step::new(1, "Uno", "hola\nmundo").unwrap(),
                                         Step::new(2, "Dos", "b").unwrap()]).unwrap();
  let mut run = RunState::new(Uuid::new_v4(), user, "m@example.com", &def, t0);
  run.resume_not_before = t0 + Duration::days(1);
  run
}

fn sent(run: &RunState, step: u32, at: chrono::DateTime<Utc>) -> DeliveryEvent {
  let p = EventPayload::EmailSent(EmailSentPayload { step,
                                                     day: step + 1,
                                                     delivery_id: format!("re_{}", step),
                                                     latency_ms: 1000,
                                                     subject: "Uno".into() });
  DeliveryEvent::from_payload(run.run_id, &run.user_id, &p, at).unwrap()
}

#[test]
fn diesel_run_roundtrip_and_optimistic_save() {
  let Some(repo) = sqlite_repo() else { return };
  let mut run = new_run("u1");
  assert_eq!(repo.create_run(&run).unwrap(), PersistResult::Ok { new_version: 0 });

  let loaded = repo.load_run(&run.run_id).unwrap();
  assert_eq!(loaded.steps_remaining, run.steps_remaining);
  assert_eq!(loaded.resume_not_before, run.resume_not_before);
  assert_eq!(loaded.sequence_hash, run.sequence_hash);
  assert_eq!(loaded.status, RunStatus::Running);

  run.finish_front(true);
  assert_eq!(repo.save_run(&run, 0).unwrap(), PersistResult::Ok { new_version: 1 });
  assert_eq!(repo.save_run(&run, 0).unwrap(), PersistResult::Conflict);
  let loaded = repo.load_run(&run.run_id).unwrap();
  assert_eq!(loaded.version, 1);
  assert_eq!(loaded.next_step_index, 1);
  assert_eq!(loaded.last_completed_day, 1);
  assert_eq!(loaded.steps_remaining.len(), 1);

  assert!(matches!(repo.load_run(&Uuid::new_v4()), Err(LedgerError::NotFound(_))));
  assert!(matches!(repo.save_run(&new_run("ghost"), 0), Err(LedgerError::NotFound(_))));
}

#[test]
fn diesel_single_running_run_per_user() {
  let Some(repo) = sqlite_repo() else { return };
  let mut first = new_run("u1");
  repo.create_run(&first).unwrap();
  assert_eq!(repo.create_run(&new_run("u1")).unwrap(), PersistResult::Conflict);
  assert_eq!(repo.find_active_run("u1").unwrap().map(|r| r.run_id), Some(first.run_id));

  first.status = RunStatus::Completed;
  repo.save_run(&first, 0).unwrap();
  assert!(repo.find_active_run("u1").unwrap().is_none());
  assert_eq!(repo.create_run(&new_run("u1")).unwrap(), PersistResult::Ok { new_version: 0 });
}

#[test]
fn diesel_list_due_respects_time_status_and_limit() {
  let Some(repo) = sqlite_repo() else { return };
  let mut a = new_run("a");
  let mut b = new_run("b");
  let c = new_run("c");
  let t0 = a.started_at;
  a.resume_not_before = t0 + Duration::hours(2);
  b.resume_not_before = t0 + Duration::hours(1);
  for r in [&a, &b, &c] {
    repo.create_run(r).unwrap();
  }
  let due = repo.list_due(t0 + Duration::hours(3), 10).unwrap();
  assert_eq!(due.iter().map(|d| d.user_id.as_str()).collect::<Vec<_>>(), vec!["b", "a"]);
  assert_eq!(repo.list_due(t0 + Duration::hours(3), 1).unwrap()[0].run_id, b.run_id);

  b.status = RunStatus::Aborted;
  repo.save_run(&b, 0).unwrap();
  let due = repo.list_due(t0 + Duration::days(2), 10).unwrap();
  assert_eq!(due.len(), 2);
  assert!(due.iter().all(|d| d.run_id != b.run_id));
}

#[test]
fn diesel_events_are_deduplicated_and_ordered() {
  let Some(repo) = sqlite_repo() else { return };
  let run = new_run("u1");
  let at = run.started_at;
  let started = EventPayload::SequenceStarted(SequenceStartedPayload { sequence_length: 2 });
  let started = DeliveryEvent::from_payload(run.run_id, "u1", &started, at).unwrap();

  assert_eq!(repo.append(&started).unwrap(), AppendResult::Appended);
  // mismo instante: el orden lo fija el número de secuencia
  assert_eq!(repo.append(&sent(&run, 0, at)).unwrap(), AppendResult::Appended);
  assert_eq!(repo.append(&sent(&run, 0, at)).unwrap(), AppendResult::Duplicate);
  assert_eq!(repo.append(&sent(&run, 1, at + Duration::days(1))).unwrap(), AppendResult::Appended);

  let events = repo.read_events("u1").unwrap();
  let kinds: Vec<(EventType, Option<u32>)> = events.iter().map(|e| (e.event_type, e.step_index())).collect();
  assert_eq!(kinds,
             vec![(EventType::SequenceStarted, None),
                  (EventType::EmailSent, Some(0)),
                  (EventType::EmailSent, Some(1))]);
  assert_eq!(events[1].payload["deliveryId"], "re_0");
  assert_eq!(events[0], started);

  let run_id = run.run_id;
  assert!(repo.has_event("u1", EventType::EmailSent, &|e| e.run_id == run_id && e.step_index() == Some(1))
              .unwrap());
  assert!(!repo.has_event("u1", EventType::SequenceCompleted, &|_| true).unwrap());

  let latest = repo.list_events(Some(EventType::EmailSent), 1).unwrap();
  assert_eq!(latest.len(), 1);
  assert_eq!(latest[0].step_index(), Some(1));
  assert_eq!(repo.list_events(None, 10).unwrap().len(), 3);
}

#[test]
fn diesel_append_rejects_malformed_payload() {
  let Some(repo) = sqlite_repo() else { return };
  let mut bad = sent(&new_run("u1"), 0, Utc::now());
  bad.payload = serde_json::json!({"step": 0});
  assert!(matches!(repo.append(&bad), Err(LedgerError::Validation(_))));
  assert!(repo.read_events("u1").unwrap().is_empty());
}
