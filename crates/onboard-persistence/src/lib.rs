//! Persistencia Diesel del motor de onboarding.
//!
//! Expone `Database` (pool r2d2 + migraciones embebidas) y los repositorios
//! que implementan los contratos del ledger (`RunStore`, `EventRecorder`) y
//! del dominio (`ContentRepository`, `MemberStatusSink`). SQLite por defecto;
//! Postgres con la feature `pg`.

mod connection;
mod content_persistence;
mod ledger_persistence;
pub mod schema;

pub use connection::{database_url_from_env, new_from_env, Database, PersistenceError, MIGRATIONS};
pub use content_persistence::DieselContentRepository;
pub use ledger_persistence::DieselLedgerRepository;
