use image::RgbaImage;

use crate::models::search::SearchResult;
use crate::services::preview_service;
use crate::services::search_service::SearchEngine;
use crate::state::AppState;

/// Search never fails towards the caller; store errors are logged and
/// yield no results.
pub fn search(
    query: String,
    limit: Option<usize>,
    case_sensitive: bool,
    state: &AppState,
) -> Vec<SearchResult> {
    let engine = SearchEngine::new(&state.config());
    let conn = state.conn();
    engine
        .search(&conn, &query, limit, case_sensitive)
        .unwrap_or_else(|err| {
            err.capture();
            Vec::new()
        })
}

pub fn preview(result: &SearchResult) -> Option<RgbaImage> {
    preview_service::render(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::repository;
    use crate::models::fragment::TextFragment;

    #[test]
    fn search_uses_configured_default_limit() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::open(dir.path()).unwrap();
        {
            let conn = state.conn();
            let dir_id = repository::begin_directory(&conn, "/scans").unwrap();
            let image_id = repository::insert_image(&conn, "/scans/a.png", dir_id).unwrap();
            let fragments: Vec<TextFragment> = (0..60)
                .map(|i| TextFragment::new(format!("line {i}"), 0, i, 10, 1))
                .collect();
            repository::insert_text_fragments(&conn, image_id, &fragments).unwrap();
        }

        assert_eq!(search("line".to_string(), None, false, &state).len(), 50);
        assert_eq!(search("line".to_string(), Some(3), false, &state).len(), 3);
        assert!(search("LINE".to_string(), None, true, &state).is_empty());
    }

    #[test]
    fn search_degrades_to_empty_on_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::open(dir.path()).unwrap();
        state.conn().execute_batch("DROP TABLE texts;").unwrap();

        assert!(search("invoice".to_string(), None, false, &state).is_empty());
    }

    #[test]
    fn preview_of_missing_file_is_none() {
        let result = SearchResult {
            image_path: "/nonexistent/receipts/a.png".to_string(),
            text: "INVOICE".to_string(),
            page: None,
            document_path: None,
            left: 0,
            top: 0,
            width: 1,
            height: 1,
        };
        assert!(preview(&result).is_none());
    }
}
