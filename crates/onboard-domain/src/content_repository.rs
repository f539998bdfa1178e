use crate::{DomainError, MemberStatus, SequenceDefinition};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Fuente externa del contenido de las secuencias.
pub trait ContentRepository: Send + Sync {
    /// Devuelve la secuencia activa del usuario, o `None` si no tiene.
    fn get_active_sequence(&self, user_id: &str) -> Result<Option<SequenceDefinition>, DomainError>;

    /// Reemplaza (upsert) la secuencia activa del usuario. Los runs ya en
    /// curso conservan su snapshot.
    fn save_sequence(&self, user_id: &str, definition: &SequenceDefinition) -> Result<(), DomainError>;
}

/// Destino del marcador de estado del miembro. Es best-effort: quien lo llama
/// registra el error y sigue.
pub trait MemberStatusSink: Send + Sync {
    fn set_status(&self, user_id: &str, status: &MemberStatus) -> Result<(), DomainError>;
}

/// Implementación en memoria para tests y desarrollo.
#[derive(Default)]
pub struct InMemoryContentRepository {
    sequences: Arc<Mutex<HashMap<String, SequenceDefinition>>>,
    statuses: Arc<Mutex<HashMap<String, String>>>,
    fail_status_writes: AtomicBool,
}

impl InMemoryContentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock<'a, T>(&self, m: &'a Mutex<T>) -> Result<MutexGuard<'a, T>, DomainError> {
        m.lock().map_err(|_| DomainError::ExternalError("mutex poisoned".into()))
    }

    /// Último marcador escrito para `user_id`.
    pub fn status_of(&self, user_id: &str) -> Option<String> {
        self.statuses.lock().ok().and_then(|m| m.get(user_id).cloned())
    }

    /// Hace que `set_status` falle, para ejercitar la ruta best-effort.
    pub fn set_status_failure(&self, fail: bool) {
        self.fail_status_writes.store(fail, Ordering::SeqCst);
    }
}

impl ContentRepository for InMemoryContentRepository {
    fn get_active_sequence(&self, user_id: &str) -> Result<Option<SequenceDefinition>, DomainError> {
        let map = self.lock(&self.sequences)?;
        Ok(map.get(user_id).cloned())
    }

    fn save_sequence(&self, user_id: &str, definition: &SequenceDefinition) -> Result<(), DomainError> {
        let mut map = self.lock(&self.sequences)?;
        map.insert(user_id.to_string(), definition.clone());
        Ok(())
    }
}

impl MemberStatusSink for InMemoryContentRepository {
    fn set_status(&self, user_id: &str, status: &MemberStatus) -> Result<(), DomainError> {
        if self.fail_status_writes.load(Ordering::SeqCst) {
            return Err(DomainError::ExternalError("status sink no disponible".into()));
        }
        let mut map = self.lock(&self.statuses)?;
        map.insert(user_id.to_string(), status.to_string());
        Ok(())
    }
}
