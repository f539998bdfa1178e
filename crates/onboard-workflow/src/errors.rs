use onboard_domain::DomainError;
use onboard_ledger::LedgerError;
use thiserror::Error;
use uuid::Uuid;

// Errores del motor de secuencias.
//
// `EmptySequence` y `AlreadyEnrolled` son terminales para la inscripción y
// no se reintentan. `RecorderUnavailable` deja el checkpoint intacto para que
// el siguiente tick reintente.
#[derive(Error, Debug)]
pub enum WorkflowError {
  /// No hay secuencia activa o no tiene pasos.
  #[error("Secuencia vacía o ausente para el usuario {0}")]
  EmptySequence(String),

  /// El usuario ya tiene un run en curso.
  #[error("El usuario {user_id} ya tiene un run activo")]
  AlreadyEnrolled { user_id: String, run_id: Option<Uuid> },

  /// El registro de un evento obligatorio falló tras los reintentos.
  #[error("Recorder no disponible para {event_type} del run {run_id}: {reason}")]
  RecorderUnavailable { run_id: Uuid, event_type: String, reason: String },

  /// Otro proceso modificó el run de forma repetida.
  #[error("Contención sobre el run de {0}")]
  Contended(String),

  /// Errores originados por el ledger (runs/eventos).
  #[error("Error del ledger: {0}")]
  Ledger(#[from] LedgerError),

  /// Errores del dominio (contenido, estado de miembros).
  #[error("Error de dominio: {0}")]
  Domain(#[from] DomainError),

  /// Variables de entorno ausentes o inválidas.
  #[error("Error de configuración: {0}")]
  Config(String),
}
