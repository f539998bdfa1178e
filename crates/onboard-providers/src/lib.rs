//! onboard-providers: integraciones con servicios externos
//!
//! - `ResendDeliveryAdapter`: implementa `DeliveryAdapter` sobre la API HTTP
//!   de Resend y clasifica las respuestas en fallos transitorios o permanentes.
//! - `LoggingDeliveryAdapter`: modo sin envío real, sólo registra en el log.
//! - `webhook`: verificación de firma y decodificación de los webhooks de
//!   membresía de Whop en eventos de inscripción / baja.

pub mod errors;
pub mod render;
pub mod resend;
pub mod webhook;

pub use errors::ProviderError;
pub use render::body_to_html;
pub use resend::{classify_status, LoggingDeliveryAdapter, ResendConfig, ResendDeliveryAdapter};
pub use webhook::{decode_event, dispatch, sign_body, WebhookEvent, WebhookVerifier};
