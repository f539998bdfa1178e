// delivery.rs
use thiserror::Error;

/// Id usado cuando el proveedor acepta el envío sin devolver identificador.
pub const UNKNOWN_DELIVERY_ID: &str = "desconocido";

/// Identificador devuelto por el proveedor de correo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
  pub delivery_id: String,
}

impl DeliveryReceipt {
  /// Un id vacío o en blanco se sustituye por `UNKNOWN_DELIVERY_ID`.
  pub fn new(delivery_id: impl Into<String>) -> Self {
    let delivery_id = delivery_id.into();
    if delivery_id.trim().is_empty() {
      Self { delivery_id: UNKNOWN_DELIVERY_ID.to_string() }
    } else {
      Self { delivery_id }
    }
  }
}

/// Un envío puede fallar de forma transitoria (se reintenta con backoff) o
/// permanente (se registra y la secuencia continúa).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
  #[error("Fallo transitorio de entrega: {0}")]
  Transient(String),
  #[error("Fallo permanente de entrega: {0}")]
  Permanent(String),
}

impl DeliveryError {
  pub fn is_permanent(&self) -> bool {
    matches!(self, DeliveryError::Permanent(_))
  }
}

pub trait DeliveryAdapter: Send + Sync {
  /// Envía un mensaje a `address`. No reintenta: eso lo decide el runner.
  fn send(&self, address: &str, subject: &str, body: &str) -> Result<DeliveryReceipt, DeliveryError>;
}
