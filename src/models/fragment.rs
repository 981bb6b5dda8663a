use serde::{Deserialize, Serialize};

/// One recognized token with its pixel box in the image's coordinate space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
}

impl TextFragment {
    pub fn new(text: impl Into<String>, left: i64, top: i64, width: i64, height: i64) -> Self {
        Self {
            text: text.into(),
            left,
            top,
            width,
            height,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}
