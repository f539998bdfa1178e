use crate::content_persistence::DieselContentRepository;
use crate::ledger_persistence::DieselLedgerRepository;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::info;
use onboard_domain::DomainError;
use onboard_ledger::LedgerError;
use std::sync::Arc;
use thiserror::Error;
#[cfg(not(feature = "pg"))]
use diesel::connection::SimpleConnection;
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");
#[cfg(feature = "pg")]
pub(crate) type DbConn = PgConnection;
#[cfg(not(feature = "pg"))]
pub(crate) type DbConn = SqliteConnection;
#[cfg(feature = "pg")]
pub(crate) type DbBackend = diesel::pg::Pg;
#[cfg(not(feature = "pg"))]
pub(crate) type DbBackend = diesel::sqlite::Sqlite;
pub(crate) type DbPool = Pool<ConnectionManager<DbConn>>;
pub(crate) type PooledConn = PooledConnection<ConnectionManager<DbConn>>;
#[derive(Debug, Error)]
pub enum PersistenceError {
  #[error("Configuración de base de datos inválida: {0}")]
  Config(String),
  #[error("Error del pool de conexiones: {0}")]
  Pool(String),
  #[error("Error aplicando migraciones: {0}")]
  Migration(String),
  #[error("Error de base de datos: {0}")]
  Query(#[from] diesel::result::Error),
}
impl From<PersistenceError> for LedgerError {
  fn from(e: PersistenceError) -> Self {
    LedgerError::Storage(e.to_string())
  }
}
impl From<PersistenceError> for DomainError {
  fn from(e: PersistenceError) -> Self {
    DomainError::ExternalError(e.to_string())
  }
}
/// Aplica `busy_timeout` a cada conexión SQLite que entrega el pool.
#[cfg(not(feature = "pg"))]
#[derive(Debug)]
struct SqlitePragmas;
#[cfg(not(feature = "pg"))]
impl diesel::r2d2::CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqlitePragmas {
  fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
    conn.batch_execute("PRAGMA busy_timeout = 5000; PRAGMA foreign_keys = ON;")
        .map_err(diesel::r2d2::Error::QueryError)
  }
}
/// Pool compartido por los repositorios Diesel.
#[derive(Clone)]
pub struct Database {
  pool: Arc<DbPool>,
}
impl Database {
  /// Abre el pool y aplica las migraciones pendientes.
  pub fn connect(database_url: &str) -> Result<Self, PersistenceError> {
    let manager = ConnectionManager::<DbConn>::new(database_url);
    let builder = Pool::builder().max_size(4);
    #[cfg(not(feature = "pg"))]
    let builder = builder.connection_customizer(Box::new(SqlitePragmas));
    let pool = builder.build(manager).map_err(|e| PersistenceError::Pool(e.to_string()))?;
    let db = Database { pool: Arc::new(pool) };
    db.migrate()?;
    Ok(db)
  }
  fn migrate(&self) -> Result<(), PersistenceError> {
    let mut pooled = self.conn()?;
    let conn: &mut DbConn = &mut pooled;
    #[cfg(not(feature = "pg"))]
    conn.batch_execute("PRAGMA journal_mode = WAL;")?;
    let applied = conn.run_pending_migrations(MIGRATIONS)
                      .map_err(|e| PersistenceError::Migration(e.to_string()))?;
    if !applied.is_empty() {
      info!("Migraciones aplicadas: {}", applied.len());
    }
    Ok(())
  }
  pub(crate) fn conn(&self) -> Result<PooledConn, PersistenceError> {
    self.pool.get().map_err(|e| PersistenceError::Pool(e.to_string()))
  }
  pub fn ledger(&self) -> DieselLedgerRepository {
    DieselLedgerRepository::new(self.clone())
  }
  pub fn content(&self) -> DieselContentRepository {
    DieselContentRepository::new(self.clone())
  }
}
/// URL de la base de datos: `ONBOARD_DB_URL`, luego `DATABASE_URL`. Sin `pg`
/// se usa `onboard.sqlite` en el directorio actual si ninguna está definida.
pub fn database_url_from_env() -> Result<String, PersistenceError> {
  let _ = dotenvy::dotenv();
  let url = std::env::var("ONBOARD_DB_URL").or_else(|_| std::env::var("DATABASE_URL"))
                                           .ok()
                                           .filter(|u| !u.trim().is_empty());
  match url {
    Some(url) => Ok(url),
    None if cfg!(feature = "pg") => {
      Err(PersistenceError::Config("ONBOARD_DB_URL o DATABASE_URL es obligatoria con la feature pg".into()))
    }
    None => Ok("onboard.sqlite".to_string()),
  }
}
/// Construye `Database` desde el entorno (carga `.env` si existe).
pub fn new_from_env() -> Result<Database, PersistenceError> {
  Database::connect(&database_url_from_env()?)
}
