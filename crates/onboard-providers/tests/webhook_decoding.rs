use onboard_domain::{EnrollmentEvent, InMemoryTriggerSource, MembershipEndedEvent, TriggerSource};
use onboard_providers::{decode_event, dispatch, sign_body, ProviderError, WebhookEvent, WebhookVerifier};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const BODY: &[u8] = br#"{"action":"membership.went_valid","data":{"user_id":"user_123","email":"ana@example.com"}}"#;

#[test]
fn valid_signature_is_accepted() {
  let verifier = WebhookVerifier::new(Some("whsec".into()));
  let signature = sign_body("whsec", BODY).unwrap();
  assert!(verifier.verify(BODY, Some(&signature)).is_ok());
  assert_eq!(verifier.parse(BODY, Some(&signature)).unwrap(),
             WebhookEvent::Enrolled(EnrollmentEvent { user_id: "user_123".into(),
                                                      contact_address: "ana@example.com".into() }));
}

#[test]
fn bad_or_missing_signature_is_rejected() {
  let verifier = WebhookVerifier::new(Some("whsec".into()));
  let other = sign_body("otro", BODY).unwrap();
  assert!(matches!(verifier.verify(BODY, Some(&other)), Err(ProviderError::Signature(_))));
  assert!(matches!(verifier.verify(BODY, Some("zz")), Err(ProviderError::Signature(_))));
  assert!(matches!(verifier.verify(BODY, None), Err(ProviderError::Signature(_))));

  let signature = sign_body("whsec", BODY).unwrap();
  let tampered = br#"{"action":"membership.went_valid","data":{"user_id":"user_999","email":"ana@example.com"}}"#;
  assert!(verifier.verify(tampered, Some(&signature)).is_err());
}

#[test]
fn no_secret_disables_verification() {
  let verifier = WebhookVerifier::new(Some(String::new()));
  assert!(!verifier.is_enabled());
  assert!(verifier.verify(BODY, None).is_ok());
}

#[test]
fn actions_map_to_events() {
  let nested = br#"{"action":"membership.created","data":{"user":{"id":"u2","email":"b@example.com"}}}"#;
  assert_eq!(decode_event(nested).unwrap(),
             WebhookEvent::Enrolled(EnrollmentEvent { user_id: "u2".into(),
                                                      contact_address: "b@example.com".into() }));

  let ended = br#"{"action":"membership.went_invalid","data":{"membership":{"user_id":"u3"}}}"#;
  assert_eq!(decode_event(ended).unwrap(),
             WebhookEvent::Ended(MembershipEndedEvent { user_id: "u3".into() }));

  let legacy = br#"{"event":"membership_deactivated","data":{"user_id":"u4"}}"#;
  assert_eq!(decode_event(legacy).unwrap(),
             WebhookEvent::Ended(MembershipEndedEvent { user_id: "u4".into() }));

  let payment = br#"{"action":"payment.succeeded","data":{"id":"pay_1"}}"#;
  assert_eq!(decode_event(payment).unwrap(),
             WebhookEvent::Ignored { action: "payment.succeeded".into() });
}

#[test]
fn malformed_payloads_are_errors() {
  assert!(matches!(decode_event(b"no json"), Err(ProviderError::Json(_))));
  assert!(matches!(decode_event(br#"{"data":{}}"#), Err(ProviderError::Payload(_))));
  let no_email = br#"{"action":"membership.went_valid","data":{"user_id":"u1"}}"#;
  assert!(matches!(decode_event(no_email), Err(ProviderError::Payload(_))));
  let blank_user = br#"{"action":"membership.went_invalid","data":{"user_id":"  "}}"#;
  assert!(matches!(decode_event(blank_user), Err(ProviderError::Payload(_))));
}

#[test]
fn dispatch_reaches_registered_callbacks() {
  let source = InMemoryTriggerSource::new();
  let enrolled = Arc::new(AtomicUsize::new(0));
  let ended = Arc::new(AtomicUsize::new(0));
  let e = enrolled.clone();
  source.on_enrollment(Box::new(move |_: &EnrollmentEvent| {
          e.fetch_add(1, Ordering::SeqCst);
        }));
  let n = ended.clone();
  source.on_membership_ended(Box::new(move |_: &MembershipEndedEvent| {
          n.fetch_add(1, Ordering::SeqCst);
        }));

  assert_eq!(dispatch(&source, &decode_event(BODY).unwrap()), 1);
  assert_eq!(dispatch(&source, &WebhookEvent::Ignored { action: "x".into() }), 0);
  dispatch(&source, &WebhookEvent::Ended(MembershipEndedEvent { user_id: "u1".into() }));
  assert_eq!(enrolled.load(Ordering::SeqCst), 1);
  assert_eq!(ended.load(Ordering::SeqCst), 1);
}
