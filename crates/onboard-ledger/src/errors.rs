// Archivo: errors.rs
// Propósito: errores del registro de runs/eventos y alias Result<T>.
use thiserror::Error;
/// Errores del ledger.
///
/// - `NotFound`: run inexistente.
/// - `Conflict`: violación de una invariante de concurrencia.
/// - `Storage`: fallo del almacenamiento (BD, mutex envenenado, pool).
/// - `Validation`: evento o estado con forma inválida.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
  #[error("No encontrado: {0}")]
  NotFound(String),
  #[error("Conflicto: {0}")]
  Conflict(String),
  #[error("Error de almacenamiento: {0}")]
  Storage(String),
  #[error("Payload inválido: {0}")]
  Validation(String),
}

impl From<serde_json::Error> for LedgerError {
  fn from(e: serde_json::Error) -> Self {
    LedgerError::Validation(e.to_string())
  }
}

/// Alias de resultado usado por las APIs del crate.
pub type Result<T> = std::result::Result<T, LedgerError>;
