// sequence.rs
use crate::{DomainError, Step};
use log::warn;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Snapshot ordenado de los pasos de una secuencia.
///
/// La entrada puede venir desordenada: se ordena de forma estable por `day`, de
/// modo que días repetidos conservan el orden en que llegaron. El hash de
/// contenido se calcula sobre los pasos ya ordenados.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceDefinition {
  steps: Vec<Step>,
  content_hash: String,
}

impl SequenceDefinition {
  pub fn new(steps: Vec<Step>) -> Result<Self, DomainError> {
    for step in &steps {
      step.validate()?;
    }
    let mut steps = steps;
    steps.sort_by_key(|s| s.day());
    if steps.windows(2).any(|w| w[0].day() == w[1].day()) {
      warn!("Secuencia con días repetidos; se enviarán en el orden de entrada");
    }
    let content_hash = Self::compute_hash(&steps);
    Ok(Self { steps, content_hash })
  }

  pub fn empty() -> Self {
    Self { steps: Vec::new(),
           content_hash: Self::compute_hash(&[]) }
  }

  /// Construye la definición a partir del JSON almacenado por el editor de
  /// contenido (`[{day, subject, body}, ...]`).
  pub fn from_json(value: &str) -> Result<Self, DomainError> {
    let steps: Vec<Step> = serde_json::from_str(value)?;
    Self::new(steps)
  }

  pub fn to_json(&self) -> Result<String, DomainError> {
    Ok(serde_json::to_string(&self.steps)?)
  }

  fn compute_hash(steps: &[Step]) -> String {
    let mut hasher = Sha256::new();
    for s in steps {
      hasher.update(s.day().to_be_bytes());
      hasher.update(s.subject().as_bytes());
      hasher.update([0u8]);
      hasher.update(s.body().as_bytes());
      hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
  }

  pub fn steps(&self) -> &[Step] {
    &self.steps
  }

  pub fn len(&self) -> usize {
    self.steps.len()
  }

  pub fn is_empty(&self) -> bool {
    self.steps.is_empty()
  }

  pub fn content_hash(&self) -> &str {
    &self.content_hash
  }
}
