use rusqlite::Connection;

use crate::data::repository;
use crate::error::AppError;
use crate::models::search::SearchResult;
use crate::models::settings::AppConfig;

/// Substring search over indexed text, configured once from settings.
#[derive(Debug, Clone, Default)]
pub struct SearchEngine {
    default_limit: Option<usize>,
}

impl SearchEngine {
    /// A stored limit of 0 means "no default".
    pub fn new(config: &AppConfig) -> Self {
        Self {
            default_limit: config.default_limit.filter(|limit| *limit > 0),
        }
    }

    /// Fragments containing `pattern`, oldest first. `limit` falls back to the
    /// configured default; with neither the result is unbounded.
    pub fn search(
        &self,
        conn: &Connection,
        pattern: &str,
        limit: Option<usize>,
        case_sensitive: bool,
    ) -> Result<Vec<SearchResult>, AppError> {
        let limit = limit.or(self.default_limit);
        if pattern.trim().is_empty() || limit == Some(0) {
            return Ok(Vec::new());
        }
        let results = repository::search(conn, pattern, limit, case_sensitive)?;
        log::debug!("search {pattern:?} returned {} results", results.len());
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::migrations::run_migrations;
    use crate::models::fragment::TextFragment;

    fn setup_db() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        run_migrations(&mut conn).unwrap();
        conn
    }

    fn add_image(conn: &Connection, path: &str, fragments: &[TextFragment]) {
        let dir_id = repository::begin_directory(conn, "/scans").unwrap();
        let image_id = repository::insert_image(conn, path, dir_id).unwrap();
        repository::insert_text_fragments(conn, image_id, fragments).unwrap();
    }

    #[test]
    fn test_invoice_round_trip() {
        let conn = setup_db();
        add_image(
            &conn,
            "/scans/a.png",
            &[TextFragment::new("INVOICE", 10, 20, 30, 40)],
        );

        let results = SearchEngine::default()
            .search(&conn, "invoice", None, false)
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].bounding_box(), (10, 20, 30, 40));
        assert_eq!(results[0].path(), "/scans/a.png");
        assert_eq!(results[0].page, None);

        let exact = SearchEngine::default()
            .search(&conn, "invoice", None, true)
            .unwrap();
        assert!(exact.is_empty());
    }

    #[test]
    fn test_blank_pattern_and_zero_limit_return_nothing() {
        let conn = setup_db();
        add_image(&conn, "/scans/a.png", &[TextFragment::new("Total", 0, 0, 1, 1)]);
        let engine = SearchEngine::default();

        assert!(engine.search(&conn, "", None, false).unwrap().is_empty());
        assert!(engine.search(&conn, "   ", None, false).unwrap().is_empty());
        assert!(engine.search(&conn, "tot", Some(0), false).unwrap().is_empty());
    }

    #[test]
    fn test_default_limit_applies_when_omitted() {
        let conn = setup_db();
        let fragments: Vec<TextFragment> = (0..5)
            .map(|i| TextFragment::new(format!("item {i}"), i, 0, 1, 1))
            .collect();
        add_image(&conn, "/scans/a.png", &fragments);

        let engine = SearchEngine::new(&AppConfig {
            default_limit: Some(3),
            ..AppConfig::default()
        });
        let limited = engine.search(&conn, "item", None, false).unwrap();
        assert_eq!(
            limited.iter().map(|r| r.left).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(engine.search(&conn, "item", Some(5), false).unwrap().len(), 5);

        let unbounded = SearchEngine::new(&AppConfig {
            default_limit: Some(0),
            ..AppConfig::default()
        });
        assert_eq!(unbounded.search(&conn, "item", None, false).unwrap().len(), 5);
    }
}
