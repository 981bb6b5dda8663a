pub mod migrations;
pub mod repository;

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

use crate::error::AppError;

pub const DB_FILE_NAME: &str = "receipts.sqlite3";

/// Opens a connection with the pragmas every caller relies on. Foreign keys
/// are per-connection in SQLite, so each job connection goes through here too.
pub fn open(db_path: &Path) -> Result<Connection, AppError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

/// Opens the store and brings its schema to the latest version.
pub fn open_store(db_path: &Path) -> Result<Connection, AppError> {
    let mut conn = open(db_path)?;
    migrations::run_migrations(&mut conn)?;
    Ok(conn)
}
