use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const CURRENT_SCHEMA_VERSION_KEY: &str = "current_schema_version";
pub const OCR_ENGINE_KEY: &str = "ocr_engine";
pub const TESSDATA_PATH_KEY: &str = "tessdata_path";
pub const PDFTOPPM_PATH_KEY: &str = "pdftoppm_path";
pub const DEFAULT_LIMIT_KEY: &str = "default_limit";
pub const LAST_DIRECTORY_KEY: &str = "last_directory";

pub const DEFAULT_PDF_DPI: u32 = 300;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingEntry {
    pub value: String,
    pub help: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OcrEngineKind {
    Tesseract,
}

impl std::fmt::Display for OcrEngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tesseract => write!(f, "tesseract"),
        }
    }
}

impl std::str::FromStr for OcrEngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tesseract" => Ok(Self::Tesseract),
            _ => Err(format!("unknown OCR engine: {s}")),
        }
    }
}

/// Snapshot of the `settings` table handed to jobs and searches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub ocr_engine: String,
    pub tessdata_path: Option<PathBuf>,
    pub pdftoppm_path: Option<PathBuf>,
    pub default_limit: Option<usize>,
    pub pdf_dpi: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ocr_engine: OcrEngineKind::Tesseract.to_string(),
            tessdata_path: None,
            pdftoppm_path: None,
            default_limit: None,
            pdf_dpi: DEFAULT_PDF_DPI,
        }
    }
}
