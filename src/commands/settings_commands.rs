use std::collections::BTreeMap;

use crate::data::repository;
use crate::error::AppError;
use crate::models::settings::{AppConfig, SettingEntry, LAST_DIRECTORY_KEY};
use crate::state::AppState;

pub fn get_settings(state: &AppState) -> Result<BTreeMap<String, SettingEntry>, AppError> {
    repository::get_settings(&state.conn())
}

/// Saves the given settings and returns the refreshed configuration. Jobs
/// already running keep the configuration they started with.
pub fn set_settings(
    settings: BTreeMap<String, String>,
    state: &AppState,
) -> Result<AppConfig, AppError> {
    repository::set_settings(&mut state.conn(), &settings)?;
    state.reload_config()
}

/// The last directory passed to add/update/reindex, else the home directory.
pub fn get_last_directory(state: &AppState) -> Result<String, AppError> {
    let last = repository::get_setting(&state.conn(), LAST_DIRECTORY_KEY)?
        .filter(|dir| !dir.trim().is_empty());
    Ok(last.unwrap_or_else(|| {
        directories::UserDirs::new()
            .map(|dirs| dirs.home_dir().to_string_lossy().to_string())
            .unwrap_or_default()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::settings::{DEFAULT_LIMIT_KEY, OCR_ENGINE_KEY, PDFTOPPM_PATH_KEY};

    fn test_state() -> (tempfile::TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::open(dir.path()).unwrap();
        (dir, state)
    }

    #[test]
    fn get_settings_hides_internal_keys() {
        let (_dir, state) = test_state();
        let settings = get_settings(&state).unwrap();

        assert!(settings.contains_key(OCR_ENGINE_KEY));
        assert!(settings.contains_key(DEFAULT_LIMIT_KEY));
        assert!(!settings.contains_key(LAST_DIRECTORY_KEY));
        assert!(!settings.contains_key("current_schema_version"));
        assert_eq!(settings[DEFAULT_LIMIT_KEY].kind, "int");
    }

    #[test]
    fn set_settings_refreshes_config() {
        let (_dir, state) = test_state();
        let mut changes = BTreeMap::new();
        changes.insert(DEFAULT_LIMIT_KEY.to_string(), "12".to_string());
        changes.insert(PDFTOPPM_PATH_KEY.to_string(), "/opt/poppler/bin".to_string());

        let config = set_settings(changes, &state).unwrap();
        assert_eq!(config.default_limit, Some(12));
        assert_eq!(state.config(), config);
        assert_eq!(
            get_settings(&state).unwrap()[PDFTOPPM_PATH_KEY].value,
            "/opt/poppler/bin"
        );
    }

    #[test]
    fn rejected_settings_leave_config_untouched() {
        let (_dir, state) = test_state();
        let mut changes = BTreeMap::new();
        changes.insert(DEFAULT_LIMIT_KEY.to_string(), "7".to_string());
        changes.insert(OCR_ENGINE_KEY.to_string(), "cuneiform".to_string());

        assert!(set_settings(changes, &state).is_err());
        assert_eq!(state.config().default_limit, Some(50));
        assert_eq!(get_settings(&state).unwrap()[DEFAULT_LIMIT_KEY].value, "50");
    }

    #[test]
    fn last_directory_defaults_then_follows_setting() {
        let (_dir, state) = test_state();
        let default = get_last_directory(&state).unwrap();
        if let Some(dirs) = directories::UserDirs::new() {
            assert_eq!(default, dirs.home_dir().to_string_lossy());
        }

        repository::set_setting(&state.conn(), LAST_DIRECTORY_KEY, "/scans/2024").unwrap();
        assert_eq!(get_last_directory(&state).unwrap(), "/scans/2024");
    }
}
