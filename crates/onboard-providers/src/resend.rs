use crate::errors::ProviderError;
use crate::render::body_to_html;
use log::{debug, info, warn};
use onboard_domain::{DeliveryAdapter, DeliveryError, DeliveryReceipt};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub const DEFAULT_FROM: &str = "Onboarding <onboarding@resend.dev>";
pub const DEFAULT_BASE_URL: &str = "https://api.resend.com";

#[derive(Clone, Debug)]
pub struct ResendConfig {
    pub api_key: String,
    pub from: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl ResendConfig {
    pub fn new(api_key: &str) -> Self {
        ResendConfig { api_key: api_key.to_string(),
                       from: DEFAULT_FROM.to_string(),
                       base_url: DEFAULT_BASE_URL.to_string(),
                       timeout: Duration::from_secs(10) }
    }

    /// Lee `RESEND_API_KEY` (obligatoria), `ONBOARD_FROM_ADDRESS` y
    /// `RESEND_BASE_URL`, cargando `.env` si existe.
    pub fn from_env() -> Result<Self, ProviderError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ProviderError>
        where F: Fn(&str) -> Option<String>
    {
        let value = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let api_key = value("RESEND_API_KEY").ok_or_else(|| ProviderError::Config("falta RESEND_API_KEY".into()))?;
        let mut config = ResendConfig::new(&api_key);
        if let Some(from) = value("ONBOARD_FROM_ADDRESS") {
            config.from = from;
        }
        if let Some(base) = value("RESEND_BASE_URL") {
            config.base_url = base.trim_end_matches('/').to_string();
        }
        Ok(config)
    }
}

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: String,
}

#[derive(Deserialize)]
struct SendEmailResponse {
    id: Option<String>,
}

/// Clasifica un estado HTTP de error de la API de correo.
///
/// 400 y 422 indican un mensaje que nunca será aceptado (destinatario o
/// campos inválidos). 401 y 403 son problemas de credenciales que se corrigen
/// fuera del run, así que se reintentan igual que 429 y los 5xx.
pub fn classify_status(status: u16, detail: &str) -> DeliveryError {
    let message = format!("HTTP {}: {}", status, detail);
    match status {
        400 | 404 | 422 => DeliveryError::Permanent(message),
        401 | 403 | 408 | 409 | 429 => DeliveryError::Transient(message),
        500..=599 => DeliveryError::Transient(message),
        _ => DeliveryError::Permanent(message),
    }
}

/// Envía correos con la API HTTP de Resend (`POST /emails`).
///
/// Usa el cliente bloqueante de `reqwest`: el runner es síncrono y el worker
/// lo ejecuta en `spawn_blocking`.
pub struct ResendDeliveryAdapter {
    client: reqwest::blocking::Client,
    config: ResendConfig,
}

impl ResendDeliveryAdapter {
    pub fn new(config: ResendConfig) -> Result<Self, ProviderError> {
        if config.api_key.is_empty() {
            return Err(ProviderError::Config("api_key vacía".into()));
        }
        let client = reqwest::blocking::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self, ProviderError> {
        Self::new(ResendConfig::from_env()?)
    }

    fn endpoint(&self) -> String {
        format!("{}/emails", self.config.base_url)
    }
}

impl DeliveryAdapter for ResendDeliveryAdapter {
    fn send(&self, address: &str, subject: &str, body: &str) -> Result<DeliveryReceipt, DeliveryError> {
        let request = SendEmailRequest { from: &self.config.from,
                                         to: [address],
                                         subject,
                                         html: body_to_html(body) };
        let response = self.client
                           .post(self.endpoint())
                           .bearer_auth(&self.config.api_key)
                           .json(&request)
                           .send()
                           .map_err(|e| DeliveryError::Transient(format!("error de red: {}", e)))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            let err = classify_status(status.as_u16(), detail.trim());
            debug!("Resend rechazó el envío a {}: {}", address, err);
            return Err(err);
        }
        // El correo ya fue aceptado: una respuesta ilegible no debe provocar
        // un reenvío.
        let delivery_id = match response.json::<SendEmailResponse>() {
            Ok(SendEmailResponse { id: Some(id) }) if !id.trim().is_empty() => id,
            Ok(_) | Err(_) => {
                warn!("Respuesta de Resend sin id para {} ('{}')", address, subject);
                String::new()
            }
        };
        Ok(DeliveryReceipt::new(delivery_id))
    }
}

/// Adaptador que no envía nada: registra cada mensaje en el log. Útil en
/// desarrollo cuando no hay `RESEND_API_KEY`.
#[derive(Default)]
pub struct LoggingDeliveryAdapter {
    counter: AtomicU64,
}

impl LoggingDeliveryAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeliveryAdapter for LoggingDeliveryAdapter {
    fn send(&self, address: &str, subject: &str, body: &str) -> Result<DeliveryReceipt, DeliveryError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        info!("[dry-run] correo a {} | {} | {} bytes", address, subject, body.len());
        Ok(DeliveryReceipt { delivery_id: format!("dry-{}", n) })
    }
}
