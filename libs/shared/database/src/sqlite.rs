use std::path::Path;

use rusqlite::Connection;
use tracing::info;

use crate::error::DatabaseError;

const MIGRATIONS: &[(i64, &str)] = &[
    (1, include_str!("../migrations/sqlite/001_scheduling.sql")),
];

/// Open a SQLite database at `path` and bring its schema up to date.
/// `":memory:"` opens a private in-memory database.
pub fn open_database(path: &str) -> Result<Connection, DatabaseError> {
    if path == ":memory:" {
        return open_memory_database();
    }

    let mut conn = Connection::open(Path::new(path))?;
    configure_pragmas(&conn)?;
    run_migrations(&mut conn)?;
    Ok(conn)
}

pub fn open_memory_database() -> Result<Connection, DatabaseError> {
    let mut conn = Connection::open_in_memory()?;
    configure_pragmas(&conn)?;
    run_migrations(&mut conn)?;
    Ok(conn)
}

fn configure_pragmas(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "PRAGMA foreign_keys=ON;
         PRAGMA busy_timeout=5000;",
    )?;
    Ok(())
}

pub fn run_migrations(conn: &mut Connection) -> Result<(), DatabaseError> {
    apply_migrations(conn, MIGRATIONS)
}

/// Each pending migration runs in its own transaction, so a failing batch leaves
/// the schema at the previous version.
fn apply_migrations(conn: &mut Connection, migrations: &[(i64, &str)]) -> Result<(), DatabaseError> {
    let current_version = current_version(conn)?;

    for (version, sql) in migrations {
        if *version > current_version {
            info!("Running migration v{}", version);
            let failed = |e: rusqlite::Error| DatabaseError::Migration {
                version: *version,
                reason: e.to_string(),
            };
            let tx = conn.transaction().map_err(failed)?;
            tx.execute_batch(sql).map_err(failed)?;
            tx.commit().map_err(failed)?;
        }
    }

    Ok(())
}

/// 0 when the schema has never been initialised.
fn current_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let initialised: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version')",
        [],
        |row| row.get(0),
    )?;
    if !initialised {
        return Ok(0);
    }

    let version = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, Option<i64>>(0)
    })?;
    Ok(version.unwrap_or(0))
}
