// step.rs
use crate::DomainError;
use serde::{Deserialize, Serialize};

/// Un paso de la secuencia: el correo que se envía el día `day` contado desde
/// la inscripción.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Step {
  day: u32,
  subject: String,
  #[serde(alias = "content")]
  body: String,
}

impl Step {
  pub fn new(day: u32, subject: &str, body: &str) -> Result<Self, DomainError> {
    let step = Self { day,
                      subject: subject.trim().to_string(),
                      body: body.to_string() };
    step.validate()?;
    Ok(step)
  }

  /// Revalida un paso que llegó deserializado (serde no pasa por `new`).
  pub fn validate(&self) -> Result<(), DomainError> {
    if self.day == 0 {
      return Err(DomainError::ValidationError("El día de un paso debe ser >= 1".to_string()));
    }
    if self.subject.trim().is_empty() {
      return Err(DomainError::ValidationError(format!("El asunto del día {} no puede estar vacío", self.day)));
    }
    Ok(())
  }

  pub fn day(&self) -> u32 {
    self.day
  }

  pub fn subject(&self) -> &str {
    &self.subject
  }

  pub fn body(&self) -> &str {
    &self.body
  }
}
