//! Crate `onboard-ledger`: estado durable de los runs y registro de eventos
//!
//! Define el checkpoint por run (`RunState`), los eventos de auditoría
//! inmutables (`DeliveryEvent`) con sus payloads tipados, los contratos de
//! persistencia `RunStore` y `EventRecorder`, y una implementación en memoria
//! (`InMemoryLedger`) para pruebas.
//!
//! Diseño resumido:
//! - Checkpoint explícito por paso: `steps_remaining` + `next_step_index` +
//!   `resume_not_before` bastan para reanudar tras un reinicio.
//! - Idempotencia: cada evento lleva un `command_id` determinista; un segundo
//!   `append` con el mismo id devuelve `AppendResult::Duplicate`.
//! - Locking optimista: `save_run` recibe `expected_version` y devuelve
//!   `PersistResult::Conflict` si otro proceso escribió antes.
//!
//! Ejemplo rápido:
//! ```rust
//! use onboard_ledger::{InMemoryLedger, RunStore};
//! let ledger = InMemoryLedger::new();
//! assert!(ledger.find_active_run("u1").unwrap().is_none());
//! ```
pub mod domain;
pub mod errors;
pub mod idempotency;
pub mod payload;
pub mod repository;
pub mod stubs;

pub use domain::*;
pub use errors::*;
pub use idempotency::*;
pub use payload::*;
pub use repository::*;
pub use stubs::*;
