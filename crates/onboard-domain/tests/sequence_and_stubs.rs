use onboard_domain::{ContentRepository, DeliveryAdapter, DeliveryError, DomainError, DomainStubs,
                     InMemoryContentRepository, InMemoryTriggerSource, MemberStatus, MemberStatusSink,
                     ScriptedDeliveryAdapter, SequenceDefinition, Step, TriggerSource};
use onboard_domain::{EnrollmentEvent, MembershipEndedEvent};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn step(day: u32, subject: &str) -> Step {
  Step::new(day, subject, "body").expect("valid step")
}

#[test]
fn definition_sorts_by_day_and_keeps_input_order_for_ties() {
  let def = SequenceDefinition::new(vec![step(5, "e"), step(1, "a"), step(3, "c1"), step(3, "c2")]).unwrap();
  let order: Vec<&str> = def.steps().iter().map(|s| s.subject()).collect();
  assert_eq!(order, vec!["a", "c1", "c2", "e"]);
  assert_eq!(def.len(), 4);
}

#[test]
fn day_zero_and_blank_subject_are_rejected() {
  assert!(matches!(Step::new(0, "hola", "x"), Err(DomainError::ValidationError(_))));
  assert!(matches!(Step::new(1, "   ", "x"), Err(DomainError::ValidationError(_))));
  let raw = r#"[{"day":0,"subject":"s","body":"b"}]"#;
  assert!(SequenceDefinition::from_json(raw).is_err());
}

#[test]
fn content_hash_ignores_input_order_but_tracks_content() {
  let a = SequenceDefinition::new(vec![step(1, "a"), step(2, "b")]).unwrap();
  let b = SequenceDefinition::new(vec![step(2, "b"), step(1, "a")]).unwrap();
  let c = SequenceDefinition::new(vec![step(1, "a"), step(2, "changed")]).unwrap();
  assert_eq!(a.content_hash(), b.content_hash());
  assert_ne!(a.content_hash(), c.content_hash());
  assert_eq!(a.content_hash().len(), 64);
}

#[test]
fn json_accepts_content_alias_and_roundtrips() {
  let raw = r#"[{"day":2,"subject":"Dos","content":"linea"},{"day":1,"subject":"Uno","body":"hola"}]"#;
  let def = SequenceDefinition::from_json(raw).unwrap();
  assert_eq!(def.steps()[0].subject(), "Uno");
  assert_eq!(def.steps()[1].body(), "linea");
  let again = SequenceDefinition::from_json(&def.to_json().unwrap()).unwrap();
  assert_eq!(again, def);
}

#[test]
fn default_sequence_has_five_days() {
  let def = DomainStubs::default_sequence().unwrap();
  let days: Vec<u32> = def.steps().iter().map(|s| s.day()).collect();
  assert_eq!(days, vec![1, 2, 3, 4, 5]);
  assert_eq!(def.steps()[0].subject(), "Welcome to the Community!");
  assert!(SequenceDefinition::empty().is_empty());
}

#[test]
fn member_status_labels() {
  assert_eq!(MemberStatus::DaySent(3).to_string(), "Day 3: Sent");
  assert_eq!(MemberStatus::DayFailed(1).to_string(), "Day 1: Failed");
  assert_eq!(MemberStatus::Completed.to_string(), "completed");
}

#[test]
fn in_memory_content_repo_and_status_sink() {
  let repo = DomainStubs::sample_repo("u1");
  assert_eq!(repo.get_active_sequence("u1").unwrap().unwrap().len(), 5);
  assert!(repo.get_active_sequence("nobody").unwrap().is_none());

  repo.set_status("u1", &MemberStatus::DaySent(1)).unwrap();
  assert_eq!(repo.status_of("u1").as_deref(), Some("Day 1: Sent"));

  repo.set_status_failure(true);
  assert!(repo.set_status("u1", &MemberStatus::Completed).is_err());
  assert_eq!(repo.status_of("u1").as_deref(), Some("Day 1: Sent"));

  let empty = InMemoryContentRepository::new();
  empty.save_sequence("u2", &SequenceDefinition::empty()).unwrap();
  assert!(empty.get_active_sequence("u2").unwrap().unwrap().is_empty());
}

#[test]
fn scripted_adapter_fails_by_subject_then_recovers() {
  let adapter = ScriptedDeliveryAdapter::new();
  adapter.fail_subject("b", DeliveryError::Transient("429".into()), 2);
  assert!(adapter.send("x@y.z", "a", "1").is_ok());
  assert_eq!(adapter.send("x@y.z", "b", "2"), Err(DeliveryError::Transient("429".into())));
  assert!(adapter.send("x@y.z", "b", "2").is_err());
  let ok = adapter.send("x@y.z", "b", "2").unwrap();
  assert_eq!(adapter.attempts(), 4);
  assert_eq!(adapter.sent().len(), 2);
  assert_eq!(adapter.sent()[1].delivery_id, ok.delivery_id);
}

#[test]
fn trigger_source_dispatches_to_every_callback() {
  let source = InMemoryTriggerSource::new();
  let seen = Arc::new(AtomicUsize::new(0));
  let ended = Arc::new(AtomicUsize::new(0));
  for _ in 0..2 {
    let seen = seen.clone();
    source.on_enrollment(Box::new(move |ev: &EnrollmentEvent| {
                           assert_eq!(ev.user_id, "u1");
                           seen.fetch_add(1, Ordering::SeqCst);
                         }));
  }
  let e = ended.clone();
  source.on_membership_ended(Box::new(move |_ev: &MembershipEndedEvent| {
                               e.fetch_add(1, Ordering::SeqCst);
                             }));

  let delivered = source.emit_enrollment(&EnrollmentEvent { user_id: "u1".into(),
                                                            contact_address: "a@b.c".into() });
  assert_eq!(delivered, 2);
  assert_eq!(seen.load(Ordering::SeqCst), 2);
  assert_eq!(source.emit_membership_ended(&MembershipEndedEvent { user_id: "u1".into() }), 1);
  assert_eq!(ended.load(Ordering::SeqCst), 1);
}
