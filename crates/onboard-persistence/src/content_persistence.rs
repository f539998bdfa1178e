use crate::connection::{Database, PooledConn};
use crate::schema;
use crate::schema::members::dsl as members_dsl;
use crate::schema::sequences::dsl as seq_dsl;
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use onboard_domain::{ContentRepository, DomainError, MemberStatus, MemberStatusSink, SequenceDefinition};
/// Repo Diesel del contenido de secuencias y del estado visible de miembros.
pub struct DieselContentRepository {
  db: Database,
}
#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::sequences)]
struct SequenceRow {
  pub user_id: String,
  pub content: String,
  pub content_hash: String,
  pub active: bool,
  pub updated_at_ts: i64,
}
#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::members)]
struct MemberRow {
  pub user_id: String,
  pub status: String,
  pub updated_at_ts: i64,
}
fn map_db_err(e: DieselError) -> DomainError {
  DomainError::ExternalError(format!("db: {}", e))
}
impl DieselContentRepository {
  pub fn new(db: Database) -> Self {
    Self { db }
  }
  fn conn(&self) -> Result<PooledConn, DomainError> {
    Ok(self.db.conn()?)
  }
  /// Último marcador de estado escrito para el miembro.
  pub fn member_status(&self, user_id: &str) -> Result<Option<String>, DomainError> {
    let mut conn = self.conn()?;
    members_dsl::members.filter(members_dsl::user_id.eq(user_id))
                        .select(members_dsl::status)
                        .first::<String>(&mut conn)
                        .optional()
                        .map_err(map_db_err)
  }
  /// Desactiva la secuencia del usuario sin borrarla.
  pub fn deactivate_sequence(&self, user_id: &str) -> Result<(), DomainError> {
    let mut conn = self.conn()?;
    diesel::update(seq_dsl::sequences.filter(seq_dsl::user_id.eq(user_id)))
      .set((seq_dsl::active.eq(false), seq_dsl::updated_at_ts.eq(Utc::now().timestamp_millis())))
      .execute(&mut conn)
      .map_err(map_db_err)?;
    Ok(())
  }
}
impl ContentRepository for DieselContentRepository {
  fn get_active_sequence(&self, user_id: &str) -> Result<Option<SequenceDefinition>, DomainError> {
    let mut conn = self.conn()?;
    let row = seq_dsl::sequences.filter(seq_dsl::user_id.eq(user_id))
                                .filter(seq_dsl::active.eq(true))
                                .first::<SequenceRow>(&mut conn)
                                .optional()
                                .map_err(map_db_err)?;
    row.map(|r| SequenceDefinition::from_json(&r.content)).transpose()
  }
  fn save_sequence(&self, user_id: &str, definition: &SequenceDefinition) -> Result<(), DomainError> {
    let row = SequenceRow { user_id: user_id.to_string(),
                            content: definition.to_json()?,
                            content_hash: definition.content_hash().to_string(),
                            active: true,
                            updated_at_ts: Utc::now().timestamp_millis() };
    let mut conn = self.conn()?;
    diesel::insert_into(seq_dsl::sequences).values(&row)
                                           .on_conflict(seq_dsl::user_id)
                                           .do_update()
                                           .set((seq_dsl::content.eq(&row.content),
                                                 seq_dsl::content_hash.eq(&row.content_hash),
                                                 seq_dsl::active.eq(true),
                                                 seq_dsl::updated_at_ts.eq(row.updated_at_ts)))
                                           .execute(&mut conn)
                                           .map_err(map_db_err)?;
    Ok(())
  }
}
impl MemberStatusSink for DieselContentRepository {
  fn set_status(&self, user_id: &str, status: &MemberStatus) -> Result<(), DomainError> {
    let row = MemberRow { user_id: user_id.to_string(),
                          status: status.to_string(),
                          updated_at_ts: Utc::now().timestamp_millis() };
    let mut conn = self.conn()?;
    diesel::insert_into(members_dsl::members).values(&row)
                                             .on_conflict(members_dsl::user_id)
                                             .do_update()
                                             .set((members_dsl::status.eq(&row.status),
                                                   members_dsl::updated_at_ts.eq(row.updated_at_ts)))
                                             .execute(&mut conn)
                                             .map_err(map_db_err)?;
    Ok(())
  }
}
