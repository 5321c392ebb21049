// libs/appointment-cell/src/store/sqlite.rs
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::{debug, info};
use uuid::Uuid;

use provider_cell::models::time_format;
use provider_cell::ProviderSchedule;
use shared_database::sqlite::{open_database, open_memory_database};
use shared_database::DatabaseError;
use shared_models::auth::Role;

use super::{AppointmentStore, Participant, TransitionGuard};
use crate::models::{Account, Appointment, AppointmentFilter, AppointmentStatus, ProviderListing};

const APPOINTMENT_COLUMNS: &str =
    "id, patient_id, provider_id, date, time, reason, notes, status, created_at, updated_at";

/// Single-connection SQLite backend. Blocking calls run on the blocking pool.
#[derive(Clone)]
pub struct SqliteAppointmentStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteAppointmentStore {
    pub fn open(path: &str) -> Result<Self, DatabaseError> {
        info!("Opening SQLite appointment store at {}", path);
        Ok(Self::from_connection(open_database(path)?))
    }

    pub fn in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::from_connection(open_memory_database()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Inserts or replaces an account row. Accounts normally arrive from the
    /// identity layer; this is how local databases and tests are seeded.
    pub async fn register_account(&self, account: &Account) -> Result<(), DatabaseError> {
        let account = account.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO accounts (id, role, full_name, email) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    role = excluded.role,
                    full_name = excluded.full_name,
                    email = excluded.email",
                params![
                    account.id.to_string(),
                    account.role.as_str(),
                    account.full_name,
                    account.email
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn run<T, F>(&self, work: F) -> Result<T, DatabaseError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, DatabaseError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
            work(&mut guard)
        })
        .await
        .map_err(|e| DatabaseError::Task(e.to_string()))?
    }
}

#[async_trait]
impl AppointmentStore for SqliteAppointmentStore {
    async fn get_account(&self, account_id: Uuid) -> Result<Option<Account>, DatabaseError> {
        self.run(move |conn| {
            let row = conn
                .query_row(
                    "SELECT id, role, full_name, email FROM accounts WHERE id = ?1",
                    params![account_id.to_string()],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                        ))
                    },
                )
                .optional()?;

            row.map(|(id, role, full_name, email)| -> Result<Account, DatabaseError> {
                Ok(Account {
                    id: decode_uuid(&id)?,
                    role: Role::from_str(&role).map_err(DatabaseError::Decode)?,
                    full_name,
                    email,
                })
            })
            .transpose()
        })
        .await
    }

    async fn list_providers(&self) -> Result<Vec<ProviderListing>, DatabaseError> {
        self.run(|conn| {
            let mut stmt = conn.prepare(
                "SELECT a.id, a.full_name, a.email, s.window_start, s.window_end, s.slot_minutes
                 FROM accounts a
                 LEFT JOIN provider_schedules s ON s.provider_id = a.id
                 WHERE a.role = 'provider'
                 ORDER BY a.full_name, a.id",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, Option<u32>>(5)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(id, full_name, email, start, end, slot_minutes)| -> Result<ProviderListing, DatabaseError> {
                    let id = decode_uuid(&id)?;
                    let schedule = match slot_minutes {
                        Some(slot_minutes) => Some(ProviderSchedule {
                            provider_id: id,
                            window_start: start.as_deref().map(decode_time).transpose()?,
                            window_end: end.as_deref().map(decode_time).transpose()?,
                            slot_minutes,
                        }),
                        None => None,
                    };
                    let account = Account {
                        id,
                        role: Role::Provider,
                        full_name,
                        email,
                    };
                    Ok(ProviderListing::new(account, schedule))
                })
                .collect()
        })
        .await
    }

    async fn get_schedule(&self, provider_id: Uuid) -> Result<Option<ProviderSchedule>, DatabaseError> {
        self.run(move |conn| {
            let row = conn
                .query_row(
                    "SELECT window_start, window_end, slot_minutes
                     FROM provider_schedules WHERE provider_id = ?1",
                    params![provider_id.to_string()],
                    |row| {
                        Ok((
                            row.get::<_, Option<String>>(0)?,
                            row.get::<_, Option<String>>(1)?,
                            row.get::<_, u32>(2)?,
                        ))
                    },
                )
                .optional()?;

            row.map(|(start, end, slot_minutes)| -> Result<ProviderSchedule, DatabaseError> {
                Ok(ProviderSchedule {
                    provider_id,
                    window_start: start.as_deref().map(decode_time).transpose()?,
                    window_end: end.as_deref().map(decode_time).transpose()?,
                    slot_minutes,
                })
            })
            .transpose()
        })
        .await
    }

    async fn upsert_schedule(&self, schedule: &ProviderSchedule) -> Result<ProviderSchedule, DatabaseError> {
        let schedule = schedule.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO provider_schedules (provider_id, window_start, window_end, slot_minutes, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(provider_id) DO UPDATE SET
                    window_start = excluded.window_start,
                    window_end = excluded.window_end,
                    slot_minutes = excluded.slot_minutes,
                    updated_at = excluded.updated_at",
                params![
                    schedule.provider_id.to_string(),
                    schedule.window_start.as_ref().map(time_format::format_time),
                    schedule.window_end.as_ref().map(time_format::format_time),
                    schedule.slot_minutes,
                    Utc::now().to_rfc3339(),
                ],
            )?;
            debug!("Stored schedule for provider {}", schedule.provider_id);
            Ok(schedule)
        })
        .await
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, DatabaseError> {
        self.run(move |conn| fetch_appointment(conn, appointment_id)).await
    }

    async fn list_appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, DatabaseError> {
        let filter = filter.clone();
        self.run(move |conn| {
            let mut sql = format!("SELECT {} FROM appointments WHERE 1 = 1", APPOINTMENT_COLUMNS);
            let mut values: Vec<String> = Vec::new();

            if let Some(patient_id) = filter.patient_id {
                values.push(patient_id.to_string());
                sql.push_str(&format!(" AND patient_id = ?{}", values.len()));
            }
            if let Some(provider_id) = filter.provider_id {
                values.push(provider_id.to_string());
                sql.push_str(&format!(" AND provider_id = ?{}", values.len()));
            }
            if let Some(date) = filter.date {
                values.push(encode_date(date));
                sql.push_str(&format!(" AND date = ?{}", values.len()));
            }
            if filter.slot_holding_only {
                let placeholders = bind_statuses(&mut values, &AppointmentStatus::slot_holding());
                sql.push_str(&format!(" AND status IN ({})", placeholders));
            }
            sql.push_str(" ORDER BY date, time");

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), read_appointment_row)?
                .collect::<Result<Vec<_>, _>>()?;

            rows.into_iter().map(Appointment::try_from).collect()
        })
        .await
    }

    async fn slot_taken(
        &self,
        participant: Participant,
        participant_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<bool, DatabaseError> {
        self.run(move |conn| {
            let mut values = vec![
                participant_id.to_string(),
                encode_date(date),
                time_format::format_time(&time),
            ];
            let placeholders = bind_statuses(&mut values, &AppointmentStatus::slot_holding());
            let sql = format!(
                "SELECT EXISTS(
                    SELECT 1 FROM appointments
                    WHERE {} = ?1 AND date = ?2 AND time = ?3 AND status IN ({})
                 )",
                participant.column(),
                placeholders
            );
            let taken = conn.query_row(&sql, params_from_iter(values.iter()), |row| {
                row.get::<_, bool>(0)
            })?;
            Ok(taken)
        })
        .await
    }

    async fn insert_appointment(&self, appointment: &Appointment) -> Result<Appointment, DatabaseError> {
        let appointment = appointment.clone();
        self.run(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO appointments ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    APPOINTMENT_COLUMNS
                ),
                params![
                    appointment.id.to_string(),
                    appointment.patient_id.to_string(),
                    appointment.provider_id.to_string(),
                    encode_date(appointment.date),
                    time_format::format_time(&appointment.time),
                    appointment.reason,
                    appointment.notes,
                    appointment.status.as_str(),
                    appointment.created_at.to_rfc3339(),
                    appointment.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(appointment)
        })
        .await
    }

    async fn transition_status(
        &self,
        appointment_id: Uuid,
        guard: &TransitionGuard,
        new_status: AppointmentStatus,
    ) -> Result<Option<Appointment>, DatabaseError> {
        let guard = guard.clone();
        self.run(move |conn| {
            let mut values: Vec<String> = vec![
                new_status.as_str().to_string(),
                Utc::now().to_rfc3339(),
                appointment_id.to_string(),
            ];

            let status_placeholders = bind_statuses(&mut values, &guard.allowed_from);

            let mut sql = format!(
                "UPDATE appointments SET status = ?1, updated_at = ?2
                 WHERE id = ?3 AND status IN ({})",
                status_placeholders
            );

            if let Some((participant, owner_id)) = guard.owner {
                values.push(owner_id.to_string());
                sql.push_str(&format!(" AND {} = ?{}", participant.column(), values.len()));
            }

            let changed = conn.execute(&sql, params_from_iter(values.iter()))?;
            if changed == 0 {
                debug!("No eligible row for transition of appointment {}", appointment_id);
                return Ok(None);
            }

            fetch_appointment(conn, appointment_id)
        })
        .await
    }

    async fn delete_account(&self, account_id: Uuid) -> Result<Option<usize>, DatabaseError> {
        self.run(move |conn| {
            let id = account_id.to_string();
            let tx = conn.transaction()?;

            let exists = tx
                .query_row("SELECT 1 FROM accounts WHERE id = ?1", params![id], |_| Ok(()))
                .optional()?
                .is_some();
            if !exists {
                return Ok(None);
            }

            let removed = tx.execute(
                "DELETE FROM appointments WHERE patient_id = ?1 OR provider_id = ?1",
                params![id],
            )?;
            tx.execute("DELETE FROM provider_schedules WHERE provider_id = ?1", params![id])?;
            tx.execute("DELETE FROM accounts WHERE id = ?1", params![id])?;
            tx.commit()?;

            Ok(Some(removed))
        })
        .await
    }
}

fn fetch_appointment(conn: &Connection, appointment_id: Uuid) -> Result<Option<Appointment>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM appointments WHERE id = ?1", APPOINTMENT_COLUMNS),
            params![appointment_id.to_string()],
            read_appointment_row,
        )
        .optional()?;

    row.map(Appointment::try_from).transpose()
}

// ==============================================================================
// ROW DECODING
// ==============================================================================

struct AppointmentRow {
    id: String,
    patient_id: String,
    provider_id: String,
    date: String,
    time: String,
    reason: String,
    notes: Option<String>,
    status: String,
    created_at: String,
    updated_at: String,
}

fn read_appointment_row(row: &Row<'_>) -> rusqlite::Result<AppointmentRow> {
    Ok(AppointmentRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        provider_id: row.get(2)?,
        date: row.get(3)?,
        time: row.get(4)?,
        reason: row.get(5)?,
        notes: row.get(6)?,
        status: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = DatabaseError;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        Ok(Appointment {
            id: decode_uuid(&row.id)?,
            patient_id: decode_uuid(&row.patient_id)?,
            provider_id: decode_uuid(&row.provider_id)?,
            date: NaiveDate::parse_from_str(&row.date, "%Y-%m-%d")
                .map_err(|e| DatabaseError::Decode(format!("date '{}': {}", row.date, e)))?,
            time: decode_time(&row.time)?,
            reason: row.reason,
            notes: row.notes,
            status: AppointmentStatus::from_str(&row.status)
                .map_err(|e| DatabaseError::Decode(e.to_string()))?,
            created_at: decode_timestamp(&row.created_at)?,
            updated_at: decode_timestamp(&row.updated_at)?,
        })
    }
}

/// Appends `statuses` to the bound values and returns their numbered placeholders.
fn bind_statuses(values: &mut Vec<String>, statuses: &[AppointmentStatus]) -> String {
    statuses
        .iter()
        .map(|status| {
            values.push(status.as_str().to_string());
            format!("?{}", values.len())
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn encode_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn decode_uuid(raw: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(raw).map_err(|e| DatabaseError::Decode(format!("id '{}': {}", raw, e)))
}

fn decode_time(raw: &str) -> Result<NaiveTime, DatabaseError> {
    time_format::parse_time(raw).ok_or_else(|| DatabaseError::Decode(format!("time '{}'", raw)))
}

fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Decode(format!("timestamp '{}': {}", raw, e)))
}
