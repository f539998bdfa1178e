use crate::connection::{Database, DbBackend, PooledConn};
use crate::schema;
use crate::schema::member_events::dsl as ev_dsl;
use crate::schema::runs::dsl as runs_dsl;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use log::debug;
use onboard_domain::Step;
use onboard_ledger::{AppendResult, DeliveryEvent, DueRun, EventRecorder, EventType, LedgerError, PersistResult,
                     Result, RunState, RunStatus, RunStore};
use uuid::Uuid;
/// Repo Diesel que implementa `RunStore` y `EventRecorder`.
pub struct DieselLedgerRepository {
  db: Database,
}
impl DieselLedgerRepository {
  pub fn new(db: Database) -> Self {
    Self { db }
  }
  fn conn(&self) -> Result<PooledConn> {
    Ok(self.db.conn()?)
  }
}
#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::runs)]
struct RunRow {
  pub id: String,
  pub user_id: String,
  pub contact_address: String,
  pub steps_remaining: String,
  pub total_steps: i64,
  pub next_step_index: i64,
  pub last_completed_day: i64,
  pub cursor_day: i64,
  pub attempt: i64,
  pub sequence_hash: String,
  pub started_at_ts: i64,
  pub resume_at_ts: i64,
  pub status: String,
  pub version: i64,
  pub updated_at_ts: i64,
}
/// Columnas mutables de un run (todo salvo identidad y arranque).
#[derive(Debug, AsChangeset)]
#[diesel(table_name = schema::runs)]
struct RunChanges {
  pub steps_remaining: String,
  pub next_step_index: i64,
  pub last_completed_day: i64,
  pub cursor_day: i64,
  pub attempt: i64,
  pub resume_at_ts: i64,
  pub status: String,
  pub version: i64,
  pub updated_at_ts: i64,
}
#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::member_events)]
struct EventRow {
  pub id: String,
  pub run_id: String,
  pub user_id: String,
  pub event_type: String,
  pub command_id: String,
  pub payload: String,
  pub seq_no: i64,
  pub created_at_ts: i64,
}
fn map_db_err(e: DieselError) -> LedgerError {
  LedgerError::Storage(format!("db: {}", e))
}
fn from_ms(ms: i64) -> Result<DateTime<Utc>> {
  DateTime::from_timestamp_millis(ms).ok_or_else(|| LedgerError::Storage(format!("timestamp inválido: {}", ms)))
}
fn to_u32(v: i64, field: &str) -> Result<u32> {
  u32::try_from(v).map_err(|_| LedgerError::Storage(format!("{} fuera de rango: {}", field, v)))
}
fn parse_uuid(s: &str) -> Result<Uuid> {
  Uuid::parse_str(s).map_err(|e| LedgerError::Storage(format!("uuid inválido '{}': {}", s, e)))
}
impl RunRow {
  fn from_state(state: &RunState, version: i64) -> Result<Self> {
    Ok(RunRow { id: state.run_id.to_string(),
                user_id: state.user_id.clone(),
                contact_address: state.contact_address.clone(),
                steps_remaining: serde_json::to_string(&state.steps_remaining)?,
                total_steps: i64::from(state.total_steps),
                next_step_index: i64::from(state.next_step_index),
                last_completed_day: i64::from(state.last_completed_day),
                cursor_day: i64::from(state.cursor_day),
                attempt: i64::from(state.attempt),
                sequence_hash: state.sequence_hash.clone(),
                started_at_ts: state.started_at.timestamp_millis(),
                resume_at_ts: state.resume_not_before.timestamp_millis(),
                status: state.status.as_str().to_string(),
                version,
                updated_at_ts: state.updated_at.timestamp_millis() })
  }
  fn into_state(self) -> Result<RunState> {
    let steps_remaining: Vec<Step> = serde_json::from_str(&self.steps_remaining)?;
    Ok(RunState { run_id: parse_uuid(&self.id)?,
                  user_id: self.user_id,
                  contact_address: self.contact_address,
                  steps_remaining,
                  total_steps: to_u32(self.total_steps, "total_steps")?,
                  next_step_index: to_u32(self.next_step_index, "next_step_index")?,
                  last_completed_day: to_u32(self.last_completed_day, "last_completed_day")?,
                  cursor_day: to_u32(self.cursor_day, "cursor_day")?,
                  attempt: to_u32(self.attempt, "attempt")?,
                  started_at: from_ms(self.started_at_ts)?,
                  resume_not_before: from_ms(self.resume_at_ts)?,
                  status: self.status.parse::<RunStatus>()?,
                  sequence_hash: self.sequence_hash,
                  version: self.version,
                  updated_at: from_ms(self.updated_at_ts)? })
  }
}
impl RunChanges {
  fn from_state(state: &RunState, version: i64) -> Result<Self> {
    Ok(RunChanges { steps_remaining: serde_json::to_string(&state.steps_remaining)?,
                    next_step_index: i64::from(state.next_step_index),
                    last_completed_day: i64::from(state.last_completed_day),
                    cursor_day: i64::from(state.cursor_day),
                    attempt: i64::from(state.attempt),
                    resume_at_ts: state.resume_not_before.timestamp_millis(),
                    status: state.status.as_str().to_string(),
                    version,
                    updated_at_ts: state.updated_at.timestamp_millis() })
  }
}
impl EventRow {
  fn into_event(self) -> Result<DeliveryEvent> {
    Ok(DeliveryEvent { id: parse_uuid(&self.id)?,
                       run_id: parse_uuid(&self.run_id)?,
                       user_id: self.user_id,
                       event_type: self.event_type.parse::<EventType>()?,
                       command_id: parse_uuid(&self.command_id)?,
                       payload: serde_json::from_str(&self.payload)?,
                       created_at: from_ms(self.created_at_ts)? })
  }
}
fn rows_to_events(rows: Vec<EventRow>) -> Result<Vec<DeliveryEvent>> {
  rows.into_iter().map(EventRow::into_event).collect()
}
impl RunStore for DieselLedgerRepository {
  fn create_run(&self, state: &RunState) -> Result<PersistResult> {
    if !state.is_active() {
      return Err(LedgerError::Validation("sólo se crean runs en estado running".into()));
    }
    let row = RunRow::from_state(state, 0)?;
    let mut conn = self.conn()?;
    let res = conn.transaction::<PersistResult, DieselError, _>(|c| {
                    let existing = runs_dsl::runs.filter(runs_dsl::user_id.eq(&row.user_id))
                                                 .filter(runs_dsl::status.eq(RunStatus::Running.as_str()))
                                                 .select(runs_dsl::id)
                                                 .first::<String>(c)
                                                 .optional()?;
                    if existing.is_some() {
                      return Ok(PersistResult::Conflict);
                    }
                    diesel::insert_into(runs_dsl::runs).values(&row).execute(c)?;
                    Ok(PersistResult::Ok { new_version: 0 })
                  });
    match res {
      Ok(r) => Ok(r),
      // El índice parcial único también detecta la carrera entre procesos.
      Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info)) => {
        debug!("create_run en conflicto para {}: {}", state.user_id, info.message());
        Ok(PersistResult::Conflict)
      }
      Err(e) => Err(map_db_err(e)),
    }
  }
  fn load_run(&self, run_id: &Uuid) -> Result<RunState> {
    let mut conn = self.conn()?;
    runs_dsl::runs.filter(runs_dsl::id.eq(run_id.to_string()))
                  .first::<RunRow>(&mut conn)
                  .optional()
                  .map_err(map_db_err)?
                  .ok_or(LedgerError::NotFound(format!("run {}", run_id)))?
                  .into_state()
  }
  fn save_run(&self, state: &RunState, expected_version: i64) -> Result<PersistResult> {
    let changes = RunChanges::from_state(state, expected_version + 1)?;
    let id_s = state.run_id.to_string();
    let mut conn = self.conn()?;
    let updated = diesel::update(runs_dsl::runs.filter(runs_dsl::id.eq(&id_s))
                                               .filter(runs_dsl::version.eq(expected_version)))
                  .set(&changes)
                  .execute(&mut conn)
                  .map_err(map_db_err)?;
    if updated == 1 {
      return Ok(PersistResult::Ok { new_version: expected_version + 1 });
    }
    let exists = runs_dsl::runs.filter(runs_dsl::id.eq(&id_s))
                               .select(runs_dsl::id)
                               .first::<String>(&mut conn)
                               .optional()
                               .map_err(map_db_err)?;
    match exists {
      Some(_) => Ok(PersistResult::Conflict),
      None => Err(LedgerError::NotFound(format!("run {}", state.run_id))),
    }
  }
  fn find_active_run(&self, user_id: &str) -> Result<Option<RunState>> {
    let mut conn = self.conn()?;
    let row = runs_dsl::runs.filter(runs_dsl::user_id.eq(user_id))
                            .filter(runs_dsl::status.eq(RunStatus::Running.as_str()))
                            .first::<RunRow>(&mut conn)
                            .optional()
                            .map_err(map_db_err)?;
    row.map(RunRow::into_state).transpose()
  }
  fn list_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<DueRun>> {
    let mut conn = self.conn()?;
    let rows = runs_dsl::runs.filter(runs_dsl::status.eq(RunStatus::Running.as_str()))
                             .filter(runs_dsl::resume_at_ts.le(now.timestamp_millis()))
                             .order(runs_dsl::resume_at_ts.asc())
                             .limit(limit as i64)
                             .select((runs_dsl::id, runs_dsl::user_id, runs_dsl::resume_at_ts))
                             .load::<(String, String, i64)>(&mut conn)
                             .map_err(map_db_err)?;
    rows.into_iter()
        .map(|(id, user_id, resume_ts)| {
          Ok(DueRun { run_id: parse_uuid(&id)?,
                      user_id,
                      resume_not_before: from_ms(resume_ts)? })
        })
        .collect()
  }
}
impl EventRecorder for DieselLedgerRepository {
  fn append(&self, event: &DeliveryEvent) -> Result<AppendResult> {
    event.validate()?;
    let mut row = EventRow { id: event.id.to_string(),
                             run_id: event.run_id.to_string(),
                             user_id: event.user_id.clone(),
                             event_type: event.event_type.as_str().to_string(),
                             command_id: event.command_id.to_string(),
                             payload: event.payload.to_string(),
                             seq_no: 0,
                             created_at_ts: event.created_at.timestamp_millis() };
    let mut conn = self.conn()?;
    let res = conn.transaction::<AppendResult, DieselError, _>(|c| {
                    let existing = ev_dsl::member_events.filter(ev_dsl::command_id.eq(&row.command_id))
                                                        .select(ev_dsl::id)
                                                        .first::<String>(c)
                                                        .optional()?;
                    if existing.is_some() {
                      return Ok(AppendResult::Duplicate);
                    }
                    let last: Option<i64> = ev_dsl::member_events.filter(ev_dsl::user_id.eq(&row.user_id))
                                                                 .select(diesel::dsl::max(ev_dsl::seq_no))
                                                                 .first(c)?;
                    row.seq_no = last.unwrap_or(0) + 1;
                    diesel::insert_into(ev_dsl::member_events).values(&row).execute(c)?;
                    Ok(AppendResult::Appended)
                  });
    match res {
      Ok(r) => Ok(r),
      Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => Ok(AppendResult::Duplicate),
      Err(e) => Err(map_db_err(e)),
    }
  }
  fn has_event(&self, user_id: &str, event_type: EventType, predicate: &dyn Fn(&DeliveryEvent) -> bool)
               -> Result<bool> {
    let mut conn = self.conn()?;
    let rows = ev_dsl::member_events.filter(ev_dsl::user_id.eq(user_id))
                                    .filter(ev_dsl::event_type.eq(event_type.as_str()))
                                    .order(ev_dsl::seq_no.asc())
                                    .load::<EventRow>(&mut conn)
                                    .map_err(map_db_err)?;
    for ev in rows_to_events(rows)? {
      if predicate(&ev) {
        return Ok(true);
      }
    }
    Ok(false)
  }
  fn read_events(&self, user_id: &str) -> Result<Vec<DeliveryEvent>> {
    let mut conn = self.conn()?;
    let rows = ev_dsl::member_events.filter(ev_dsl::user_id.eq(user_id))
                                    .order(ev_dsl::seq_no.asc())
                                    .load::<EventRow>(&mut conn)
                                    .map_err(map_db_err)?;
    rows_to_events(rows)
  }
  fn list_events(&self, event_type: Option<EventType>, limit: usize) -> Result<Vec<DeliveryEvent>> {
    let mut conn = self.conn()?;
    let mut query = ev_dsl::member_events.into_boxed::<DbBackend>();
    if let Some(t) = event_type {
      query = query.filter(ev_dsl::event_type.eq(t.as_str()));
    }
    let rows = query.order((ev_dsl::created_at_ts.desc(), ev_dsl::seq_no.desc()))
                    .limit(limit as i64)
                    .load::<EventRow>(&mut conn)
                    .map_err(map_db_err)?;
    rows_to_events(rows)
  }
}
