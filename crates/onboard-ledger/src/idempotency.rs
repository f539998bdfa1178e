// Archivo: idempotency.rs
// Propósito: derivar `command_id` deterministas para los eventos.
use crate::domain::EventType;
use uuid::Uuid;

/// Deriva el `command_id` de un evento a partir de (run, tipo, paso, intento).
///
/// El mismo evento lógico produce siempre el mismo id, de modo que un
/// reintento tras un reinicio es detectado como duplicado por el recorder.
pub fn command_id(run_id: &Uuid, event_type: EventType, step_index: u32, attempt: u32) -> Uuid {
    let mut hasher = blake3::Hasher::new();
    hasher.update(run_id.as_bytes());
    hasher.update(event_type.as_str().as_bytes());
    hasher.update(&step_index.to_be_bytes());
    hasher.update(&attempt.to_be_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest.as_bytes()[..16]);
    Uuid::from_bytes(bytes)
}
