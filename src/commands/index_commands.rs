use std::path::PathBuf;

use crate::data::repository;
use crate::error::AppError;
use crate::models::settings::LAST_DIRECTORY_KEY;
use crate::scope_path;
use crate::services::indexing_service::{self, IndexJob};
use crate::services::ocr_service::OcrExtractor;
use crate::state::AppState;

fn new_job(root: &str, state: &AppState) -> Result<IndexJob, AppError> {
    let extractor = OcrExtractor::from_config(&state.config(), state.pages_dir())?;
    Ok(IndexJob::new(root, &state.db_path, extractor))
}

/// Validates a root and remembers it as the last directory used.
fn prepare_root(directory: &str, state: &AppState) -> Result<String, AppError> {
    let root = scope_path::normalize(directory.trim());
    if !PathBuf::from(&root).is_dir() {
        return Err(AppError::General(format!("{root} is not a directory")));
    }
    repository::set_setting(&state.conn(), LAST_DIRECTORY_KEY, &root)?;
    Ok(root)
}

/// Returns an idle job indexing `directory`; the caller starts it.
pub fn add_directory(directory: String, state: &AppState) -> Result<IndexJob, AppError> {
    let root = prepare_root(&directory, state)?;
    new_job(&root, state)
}

/// Indexes files added to an already registered directory.
pub fn update_directory(directory: String, state: &AppState) -> Result<IndexJob, AppError> {
    let root = scope_path::normalize(directory.trim());
    if repository::get_directory_id(&state.conn(), &root)?.is_none() {
        return Err(AppError::General(format!("{root} is not indexed")));
    }
    let root = prepare_root(&root, state)?;
    new_job(&root, state)
}

/// Drops everything indexed under `directory`, then returns a fresh job for it.
///
/// The removal is committed here, before the job runs. Cancelling or failing
/// the returned job leaves the directory unindexed; it does not bring back
/// the previous rows.
pub fn reindex_directory(directory: String, state: &AppState) -> Result<IndexJob, AppError> {
    let root = scope_path::normalize(directory.trim());
    indexing_service::remove_directory(&mut state.conn(), &root)?;
    let root = prepare_root(&root, state)?;
    new_job(&root, state)
}

pub fn remove_directory(directory: String, state: &AppState) -> Result<bool, AppError> {
    indexing_service::remove_directory(&mut state.conn(), directory.trim())
}

pub fn get_directories(state: &AppState) -> Result<Vec<String>, AppError> {
    repository::list_directories(&state.conn())
}
