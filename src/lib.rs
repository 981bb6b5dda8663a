pub mod commands;
pub mod data;
pub mod error;
pub mod models;
pub(crate) mod scope_path;
pub mod services;
pub mod state;

use std::path::Path;

pub use error::AppError;
pub use models::job::JobStatus;
pub use models::search::SearchResult;
pub use services::indexing_service::IndexJob;
pub use state::AppState;

/// Opens the receipt store, in `data_dir` when given and in the platform data
/// directory otherwise. Migrations run before this returns.
pub fn init_db(data_dir: Option<&Path>) -> Result<AppState, AppError> {
    let state = match data_dir {
        Some(dir) => AppState::open(dir),
        None => AppState::open_default(),
    };
    state.map_err(AppError::capture)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_db_in_explicit_dir() {
        let dir = tempfile::tempdir().unwrap();
        let state = init_db(Some(dir.path())).unwrap();
        assert_eq!(state.data_dir, dir.path());
        assert!(dir.path().join(data::DB_FILE_NAME).exists());
    }
}
