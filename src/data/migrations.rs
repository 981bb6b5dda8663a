use rusqlite::{params, Connection};

use crate::error::AppError;
use crate::models::settings::{
    CURRENT_SCHEMA_VERSION_KEY, DEFAULT_LIMIT_KEY, LAST_DIRECTORY_KEY, OCR_ENGINE_KEY,
    PDFTOPPM_PATH_KEY, TESSDATA_PATH_KEY,
};

const OBSOLETE_POPPLER_PATH_KEY: &str = "poppler_path";
const OBSOLETE_TESSERACT_CMD_KEY: &str = "tesseract_cmd";

const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS directories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT UNIQUE
);

CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT UNIQUE NOT NULL,
    directory_id INTEGER NOT NULL,
    FOREIGN KEY(directory_id) REFERENCES directories(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS images (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT UNIQUE NOT NULL,
    directory_id INTEGER NOT NULL,
    document_id INTEGER,
    page INTEGER,
    FOREIGN KEY(directory_id) REFERENCES directories(id) ON DELETE CASCADE,
    FOREIGN KEY(document_id) REFERENCES documents(id)
);

CREATE TABLE IF NOT EXISTS texts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    text TEXT NOT NULL,
    "left" INTEGER NOT NULL,
    "top" INTEGER NOT NULL,
    width INTEGER NOT NULL,
    height INTEGER NOT NULL,
    image_id INTEGER NOT NULL,
    FOREIGN KEY(image_id) REFERENCES images(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT,
    help TEXT,
    type TEXT,
    hidden INTEGER NOT NULL DEFAULT 0
);
"#;

const SCHEMA_V5_INDEXES: &str = "
CREATE INDEX IF NOT EXISTS idx_texts_image ON texts(image_id);
CREATE INDEX IF NOT EXISTS idx_images_directory ON images(directory_id);
CREATE INDEX IF NOT EXISTS idx_images_document ON images(document_id);
";

type MigrationStep = fn(&Connection) -> Result<(), AppError>;

/// Step `i` moves the schema from version `i` to `i + 1`.
const MIGRATIONS: &[MigrationStep] = &[
    migrate_v1,
    migrate_v2,
    migrate_v3,
    migrate_v4,
    migrate_v5,
    migrate_v6,
];

pub const LATEST_SCHEMA_VERSION: i64 = MIGRATIONS.len() as i64;

fn seed_setting(
    conn: &Connection,
    key: &str,
    value: &str,
    help: &str,
    kind: &str,
    hidden: bool,
) -> Result<(), AppError> {
    conn.execute(
        "INSERT OR IGNORE INTO settings (key, value, help, type, hidden) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![key, value, help, kind, hidden],
    )?;
    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<(), AppError> {
    conn.execute_batch(SCHEMA_V1)?;
    seed_setting(
        conn,
        CURRENT_SCHEMA_VERSION_KEY,
        "0",
        "Schema version of this database.",
        "int",
        true,
    )?;
    seed_setting(
        conn,
        OCR_ENGINE_KEY,
        "tesseract",
        "OCR engine used to extract text from images.",
        "str",
        false,
    )?;
    seed_setting(
        conn,
        OBSOLETE_TESSERACT_CMD_KEY,
        "",
        "Path to the tesseract executable. Leave empty to use the one on PATH.",
        "file",
        false,
    )?;
    seed_setting(
        conn,
        OBSOLETE_POPPLER_PATH_KEY,
        "",
        "Directory containing the poppler binaries.",
        "dir",
        false,
    )
}

fn migrate_v2(conn: &Connection) -> Result<(), AppError> {
    seed_setting(
        conn,
        DEFAULT_LIMIT_KEY,
        "50",
        "Default maximum number of search results.",
        "int",
        false,
    )
}

fn migrate_v3(conn: &Connection) -> Result<(), AppError> {
    seed_setting(
        conn,
        PDFTOPPM_PATH_KEY,
        "pdftoppm",
        "Path to the pdftoppm executable (or the directory holding it). Leave empty to use the one on PATH.",
        "file",
        false,
    )?;
    conn.execute(
        "DELETE FROM settings WHERE key = ?1",
        params![OBSOLETE_POPPLER_PATH_KEY],
    )?;
    Ok(())
}

fn migrate_v4(conn: &Connection) -> Result<(), AppError> {
    conn.execute(
        "UPDATE settings SET value = '' WHERE key = ?1",
        params![PDFTOPPM_PATH_KEY],
    )?;
    Ok(())
}

fn migrate_v5(conn: &Connection) -> Result<(), AppError> {
    conn.execute_batch(SCHEMA_V5_INDEXES)?;
    seed_setting(
        conn,
        LAST_DIRECTORY_KEY,
        "",
        "Directory most recently added for indexing.",
        "dir",
        true,
    )
}

fn migrate_v6(conn: &Connection) -> Result<(), AppError> {
    seed_setting(
        conn,
        TESSDATA_PATH_KEY,
        "",
        "Directory with the tesseract language data. Leave empty for the system default.",
        "dir",
        false,
    )?;
    conn.execute(
        "DELETE FROM settings WHERE key = ?1",
        params![OBSOLETE_TESSERACT_CMD_KEY],
    )?;
    Ok(())
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool, AppError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Reads the stored schema version; a database without a settings table is
/// version 0.
pub fn current_schema_version(conn: &Connection) -> Result<i64, AppError> {
    if !table_exists(conn, "settings")? {
        return Ok(0);
    }

    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![CURRENT_SCHEMA_VERSION_KEY],
            |row| row.get(0),
        )
        .or_else(|err| match err {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;

    Ok(raw.and_then(|v| v.trim().parse::<i64>().ok()).unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i64) -> Result<(), AppError> {
    conn.execute(
        "UPDATE settings SET value = ?1 WHERE key = ?2",
        params![version.to_string(), CURRENT_SCHEMA_VERSION_KEY],
    )?;
    Ok(())
}

/// Applies every pending migration inside one transaction and returns the
/// resulting schema version. Nothing is committed if a step fails.
pub fn run_migrations(conn: &mut Connection) -> Result<i64, AppError> {
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;

    let tx = conn.transaction()?;
    let start = current_schema_version(&tx)?;
    if start > LATEST_SCHEMA_VERSION {
        return Err(AppError::Migration {
            version: start,
            reason: format!(
                "database schema is newer than this build (latest known v{LATEST_SCHEMA_VERSION})"
            ),
        });
    }

    let mut version = start;
    for step in MIGRATIONS.iter().skip(start.max(0) as usize) {
        let next = version + 1;
        step(&tx).map_err(|err| AppError::Migration {
            version: next,
            reason: err.to_string(),
        })?;
        set_schema_version(&tx, next)?;
        log::info!("migrated schema v{version} -> v{next}");
        version = next;
    }

    tx.commit()?;
    Ok(version)
}
