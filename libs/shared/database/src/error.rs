use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    /// A unique constraint rejected the write (PostgREST 409 / SQLITE_CONSTRAINT_UNIQUE).
    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("Failed to decode row: {0}")]
    Decode(String),

    #[error("Migration v{version} failed: {reason}")]
    Migration { version: i64, reason: String },

    #[error("Database connection lock poisoned")]
    LockPoisoned,

    #[error("Blocking database task failed: {0}")]
    Task(String),
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(error: rusqlite::Error) -> Self {
        match &error {
            rusqlite::Error::SqliteFailure(failure, message)
                if failure.code == ErrorCode::ConstraintViolation
                    && failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                DatabaseError::Conflict(
                    message.clone().unwrap_or_else(|| "unique constraint failed".to_string()),
                )
            }
            _ => DatabaseError::Sqlite(error),
        }
    }
}

impl From<serde_json::Error> for DatabaseError {
    fn from(error: serde_json::Error) -> Self {
        DatabaseError::Decode(error.to_string())
    }
}

impl DatabaseError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, DatabaseError::Conflict(_))
    }
}
