mod content_repository;
mod delivery;
mod domain_stubs;
mod errors;
mod member;
mod sequence;
mod step;
mod trigger;

pub use content_repository::{ContentRepository, InMemoryContentRepository, MemberStatusSink};
pub use delivery::{DeliveryAdapter, DeliveryError, DeliveryReceipt, UNKNOWN_DELIVERY_ID};
pub use errors::DomainError;
pub use member::MemberStatus;
pub use sequence::SequenceDefinition;
pub use step::Step;
pub use trigger::{EnrollmentCallback, EnrollmentEvent, InMemoryTriggerSource, MembershipEndedCallback,
                  MembershipEndedEvent, TriggerSource};
// Dobles de prueba reutilizados por los crates de workflow y el binario
pub use domain_stubs::{DomainStubs, ScriptedDeliveryAdapter, SentMessage};
