use std::collections::BTreeMap;
use std::path::PathBuf;

use rusqlite::{params, Connection};

use crate::error::AppError;
use crate::models::fragment::TextFragment;
use crate::models::search::SearchResult;
use crate::models::settings::{
    AppConfig, SettingEntry, DEFAULT_LIMIT_KEY, OCR_ENGINE_KEY, PDFTOPPM_PATH_KEY,
    TESSDATA_PATH_KEY,
};

/// Registers a root directory, returning the existing id when it is already known.
pub fn begin_directory(conn: &Connection, path: &str) -> Result<i64, AppError> {
    conn.execute(
        "INSERT OR IGNORE INTO directories (path) VALUES (?1)",
        params![path],
    )?;
    let id = conn.query_row(
        "SELECT id FROM directories WHERE path = ?1",
        params![path],
        |row| row.get(0),
    )?;
    Ok(id)
}

pub fn get_directory_id(conn: &Connection, path: &str) -> Result<Option<i64>, AppError> {
    let id = conn
        .query_row(
            "SELECT id FROM directories WHERE path = ?1",
            params![path],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

pub fn list_directories(conn: &Connection) -> Result<Vec<String>, AppError> {
    let mut stmt = conn.prepare("SELECT path FROM directories ORDER BY id ASC")?;
    let paths = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(paths)
}

pub fn is_image_indexed(conn: &Connection, path: &str) -> Result<bool, AppError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM images WHERE path = ?1",
        params![path],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn is_document_indexed(conn: &Connection, path: &str) -> Result<bool, AppError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM documents WHERE path = ?1",
        params![path],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn insert_image(conn: &Connection, path: &str, directory_id: i64) -> Result<i64, AppError> {
    conn.execute(
        "INSERT INTO images (path, directory_id) VALUES (?1, ?2)",
        params![path, directory_id],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Stores the non-blank fragments of one image, returning how many were written.
pub fn insert_text_fragments(
    conn: &Connection,
    image_id: i64,
    fragments: &[TextFragment],
) -> Result<usize, AppError> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO texts (text, \"left\", \"top\", width, height, image_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;

    let mut written = 0;
    for fragment in fragments.iter().filter(|f| !f.is_blank()) {
        stmt.execute(params![
            fragment.text,
            fragment.left,
            fragment.top,
            fragment.width,
            fragment.height,
            image_id,
        ])?;
        written += 1;
    }
    Ok(written)
}

/// Attaches a rasterized page to its source document, creating the document
/// row on first use. Returns the document id.
pub fn link_document_page(
    conn: &Connection,
    image_id: i64,
    doc_path: &str,
    directory_id: i64,
    page: u32,
) -> Result<i64, AppError> {
    conn.execute(
        "INSERT OR IGNORE INTO documents (path, directory_id) VALUES (?1, ?2)",
        params![doc_path, directory_id],
    )?;
    let document_id: i64 = conn.query_row(
        "SELECT id FROM documents WHERE path = ?1",
        params![doc_path],
        |row| row.get(0),
    )?;
    conn.execute(
        "UPDATE images SET document_id = ?1, page = ?2 WHERE id = ?3",
        params![document_id, page, image_id],
    )?;
    Ok(document_id)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovedDirectory {
    pub images: usize,
    pub documents: usize,
    /// Page images the indexer generated for this directory's PDFs.
    pub generated_files: Vec<PathBuf>,
}

/// Deletes a directory and everything indexed under it in one transaction.
/// Generated files are reported, not deleted; the caller removes them once
/// the rows are gone.
pub fn delete_directory(
    conn: &mut Connection,
    path: &str,
) -> Result<Option<RemovedDirectory>, AppError> {
    let tx = conn.transaction()?;
    let Some(directory_id) = get_directory_id(&tx, path)? else {
        return Ok(None);
    };

    let generated_files = {
        let mut stmt = tx.prepare(
            "SELECT path FROM images WHERE directory_id = ?1 AND document_id IS NOT NULL",
        )?;
        let files = stmt
            .query_map(params![directory_id], |row| row.get::<_, String>(0))?
            .map(|row| row.map(PathBuf::from))
            .collect::<Result<Vec<PathBuf>, _>>()?;
        files
    };

    // images first: documents are referenced by images without a cascade
    let images = tx.execute(
        "DELETE FROM images WHERE directory_id = ?1",
        params![directory_id],
    )?;
    let documents = tx.execute(
        "DELETE FROM documents WHERE directory_id = ?1",
        params![directory_id],
    )?;
    tx.execute(
        "DELETE FROM directories WHERE id = ?1",
        params![directory_id],
    )?;
    tx.commit()?;

    Ok(Some(RemovedDirectory {
        images,
        documents,
        generated_files,
    }))
}

fn escape_like(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len() + 2);
    escaped.push('%');
    for ch in pattern.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

/// Substring search over text fragments, in insertion order.
pub fn search(
    conn: &Connection,
    pattern: &str,
    limit: Option<usize>,
    case_sensitive: bool,
) -> Result<Vec<SearchResult>, AppError> {
    let filter = if case_sensitive {
        "instr(texts.text, ?1) > 0"
    } else {
        "lower(texts.text) LIKE lower(?1) ESCAPE '\\'"
    };
    let sql = format!(
        "SELECT images.path, texts.text, images.page, documents.path,
                texts.\"left\", texts.\"top\", texts.width, texts.height
         FROM texts
         JOIN images ON texts.image_id = images.id
         LEFT JOIN documents ON images.document_id = documents.id
         WHERE {filter}
         ORDER BY texts.id ASC
         LIMIT ?2"
    );
    let needle = if case_sensitive {
        pattern.to_string()
    } else {
        escape_like(pattern)
    };
    // SQLite treats a negative LIMIT as unbounded
    let limit = limit.map(|l| l as i64).unwrap_or(-1);

    let mut stmt = conn.prepare(&sql)?;
    let results = stmt
        .query_map(params![needle, limit], |row| {
            Ok(SearchResult {
                image_path: row.get(0)?,
                text: row.get(1)?,
                page: row.get(2)?,
                document_path: row.get(3)?,
                left: row.get(4)?,
                top: row.get(5)?,
                width: row.get(6)?,
                height: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(results)
}

pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>, AppError> {
    let value: Option<Option<String>> = conn
        .query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value.flatten())
}

/// Updates an existing setting. Hidden settings are writable here; the
/// user-facing path goes through `set_settings`.
pub fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<(), AppError> {
    let updated = conn.execute(
        "UPDATE settings SET value = ?1 WHERE key = ?2",
        params![value, key],
    )?;
    if updated == 0 {
        return Err(AppError::InvalidSetting {
            key: key.to_string(),
            reason: "unknown setting".to_string(),
        });
    }
    Ok(())
}

/// Visible settings keyed by name.
pub fn get_settings(conn: &Connection) -> Result<BTreeMap<String, SettingEntry>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT key, value, help, type FROM settings WHERE hidden = 0 ORDER BY key ASC",
    )?;
    let settings = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                SettingEntry {
                    value: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    help: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    kind: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                },
            ))
        })?
        .collect::<Result<BTreeMap<_, _>, _>>()?;
    Ok(settings)
}

fn validate_setting(key: &str, kind: &str, value: &str) -> Result<(), AppError> {
    if kind == "int" && !value.trim().is_empty() && value.trim().parse::<u64>().is_err() {
        return Err(AppError::InvalidSetting {
            key: key.to_string(),
            reason: format!("expected a non-negative integer, got '{value}'"),
        });
    }
    if key == OCR_ENGINE_KEY {
        value
            .parse::<crate::models::settings::OcrEngineKind>()
            .map_err(|reason| AppError::InvalidSetting {
                key: key.to_string(),
                reason,
            })?;
    }
    Ok(())
}

/// Writes user-editable settings atomically. Unknown and hidden keys are rejected.
pub fn set_settings(
    conn: &mut Connection,
    settings: &BTreeMap<String, String>,
) -> Result<(), AppError> {
    let tx = conn.transaction()?;
    for (key, value) in settings {
        let kind: Option<String> = tx
            .query_row(
                "SELECT type FROM settings WHERE key = ?1 AND hidden = 0",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        let Some(kind) = kind else {
            return Err(AppError::InvalidSetting {
                key: key.clone(),
                reason: "unknown or read-only setting".to_string(),
            });
        };
        validate_setting(key, &kind, value)?;
        tx.execute(
            "UPDATE settings SET value = ?1 WHERE key = ?2",
            params![value, key],
        )?;
    }
    tx.commit()?;
    Ok(())
}

fn non_empty_path(value: Option<String>) -> Option<PathBuf> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

pub fn load_config(conn: &Connection) -> Result<AppConfig, AppError> {
    let defaults = AppConfig::default();
    Ok(AppConfig {
        ocr_engine: get_setting(conn, OCR_ENGINE_KEY)?
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.ocr_engine),
        tessdata_path: non_empty_path(get_setting(conn, TESSDATA_PATH_KEY)?),
        pdftoppm_path: non_empty_path(get_setting(conn, PDFTOPPM_PATH_KEY)?),
        default_limit: get_setting(conn, DEFAULT_LIMIT_KEY)?
            .and_then(|v| v.trim().parse::<usize>().ok()),
        pdf_dpi: defaults.pdf_dpi,
    })
}

// Needed for rusqlite optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error>;
}

impl<T> OptionalExt<T> for Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
