use crate::errors::ProviderError;
use hmac::{Hmac, Mac};
use log::{debug, info};
use onboard_domain::{EnrollmentEvent, InMemoryTriggerSource, MembershipEndedEvent};
use serde_json::Value;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Cabecera con la firma hex del cuerpo.
pub const SIGNATURE_HEADER: &str = "x-whop-signature";

/// Evento de membresía ya decodificado.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    Enrolled(EnrollmentEvent),
    Ended(MembershipEndedEvent),
    /// Acción sin efecto sobre las secuencias (pagos, reembolsos, etc.).
    Ignored { action: String },
}

/// Verifica la firma HMAC-SHA256 (hex) del cuerpo crudo del webhook.
///
/// Sin secreto configurado la verificación queda desactivada (modo
/// desarrollo).
#[derive(Clone, Debug, Default)]
pub struct WebhookVerifier {
    secret: Option<String>,
}

impl WebhookVerifier {
    pub fn new(secret: Option<String>) -> Self {
        Self { secret: secret.filter(|s| !s.is_empty()) }
    }

    /// Lee `WHOP_WEBHOOK_SECRET`.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::new(std::env::var("WHOP_WEBHOOK_SECRET").ok())
    }

    pub fn is_enabled(&self) -> bool {
        self.secret.is_some()
    }

    pub fn verify(&self, body: &[u8], signature: Option<&str>) -> Result<(), ProviderError> {
        let secret = match &self.secret {
            Some(secret) => secret,
            None => {
                debug!("Verificación de firma desactivada");
                return Ok(());
            }
        };
        let signature = signature.map(str::trim)
                                 .filter(|s| !s.is_empty())
                                 .ok_or_else(|| ProviderError::Signature(format!("falta {}", SIGNATURE_HEADER)))?;
        let expected = hex::decode(signature).map_err(|_| ProviderError::Signature("no es hex".into()))?;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| ProviderError::Config(format!("secreto HMAC inválido: {}", e)))?;
        mac.update(body);
        mac.verify_slice(&expected)
           .map_err(|_| ProviderError::Signature("no coincide".into()))
    }

    /// Verifica y decodifica en un solo paso.
    pub fn parse(&self, body: &[u8], signature: Option<&str>) -> Result<WebhookEvent, ProviderError> {
        self.verify(body, signature)?;
        decode_event(body)
    }
}

/// Firma hex de `body` con `secret`, tal como la envía el emisor del webhook.
pub fn sign_body(secret: &str, body: &[u8]) -> Result<String, ProviderError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ProviderError::Config(format!("secreto HMAC inválido: {}", e)))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn first_str<'a>(data: &'a Value, paths: &[&[&str]]) -> Option<&'a str> {
    paths.iter()
         .filter_map(|path| path.iter().try_fold(data, |v, key| v.get(*key)))
         .filter_map(Value::as_str)
         .map(str::trim)
         .find(|s| !s.is_empty())
}

const USER_ID_PATHS: &[&[&str]] = &[&["user_id"], &["user", "id"], &["membership", "user_id"]];
const EMAIL_PATHS: &[&[&str]] = &[&["email"], &["user", "email"], &["membership", "user", "email"]];

/// Decodifica el cuerpo `{action, data}` de un webhook de membresía. También
/// acepta la forma antigua `{event, data}` con `membership_activated` /
/// `membership_deactivated`.
pub fn decode_event(body: &[u8]) -> Result<WebhookEvent, ProviderError> {
    let root: Value = serde_json::from_slice(body)?;
    let action = root.get("action")
                     .or_else(|| root.get("event"))
                     .and_then(Value::as_str)
                     .ok_or_else(|| ProviderError::Payload("falta 'action'".into()))?;
    let data = root.get("data").unwrap_or(&Value::Null);

    match action {
        "membership.went_valid" | "membership.created" | "membership_activated" => {
            let user_id = first_str(data, USER_ID_PATHS)
                .ok_or_else(|| ProviderError::Payload(format!("{} sin user_id", action)))?;
            let email = first_str(data, EMAIL_PATHS)
                .ok_or_else(|| ProviderError::Payload(format!("{} sin email para {}", action, user_id)))?;
            Ok(WebhookEvent::Enrolled(EnrollmentEvent { user_id: user_id.to_string(),
                                                        contact_address: email.to_string() }))
        }
        "membership.went_invalid" | "membership_deactivated" => {
            let user_id = first_str(data, USER_ID_PATHS)
                .ok_or_else(|| ProviderError::Payload(format!("{} sin user_id", action)))?;
            Ok(WebhookEvent::Ended(MembershipEndedEvent { user_id: user_id.to_string() }))
        }
        other => Ok(WebhookEvent::Ignored { action: other.to_string() }),
    }
}

/// Entrega el evento a los callbacks de `source`; devuelve cuántos lo
/// recibieron (0 para eventos ignorados).
pub fn dispatch(source: &InMemoryTriggerSource, event: &WebhookEvent) -> usize {
    match event {
        WebhookEvent::Enrolled(e) => {
            info!("Webhook: alta de {}", e.user_id);
            source.emit_enrollment(e)
        }
        WebhookEvent::Ended(e) => {
            info!("Webhook: baja de {}", e.user_id);
            source.emit_membership_ended(e)
        }
        WebhookEvent::Ignored { action } => {
            debug!("Webhook ignorado: {}", action);
            0
        }
    }
}
