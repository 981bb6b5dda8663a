use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub image_path: String,
    pub text: String,
    pub page: Option<u32>,
    pub document_path: Option<String>,
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
}

impl SearchResult {
    /// The path shown to the user: the parent PDF for rasterized pages.
    pub fn path(&self) -> &str {
        self.document_path.as_deref().unwrap_or(&self.image_path)
    }

    pub fn bounding_box(&self) -> (i64, i64, i64, i64) {
        (self.left, self.top, self.width, self.height)
    }
}
