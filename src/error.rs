use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Migration to schema v{version} failed: {reason}")]
    Migration { version: i64, reason: String },

    #[error("Invalid setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("{0}")]
    General(String),

    #[error("OCR error: {0}")]
    Ocr(String),

    #[error("Rasterizer error: {0}")]
    Rasterizer(String),
}

impl AppError {
    pub fn capture(self) -> Self {
        log::error!("{self}");
        self
    }

    /// Errors that leave the run's transaction unusable. Everything else is
    /// scoped to the file being processed.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Database(err) => matches!(
                err.sqlite_error_code(),
                Some(
                    rusqlite::ErrorCode::DatabaseBusy
                        | rusqlite::ErrorCode::DatabaseLocked
                        | rusqlite::ErrorCode::DiskFull
                        | rusqlite::ErrorCode::DatabaseCorrupt
                        | rusqlite::ErrorCode::ReadOnly
                        | rusqlite::ErrorCode::SystemIoFailure
                        | rusqlite::ErrorCode::CannotOpen
                )
            ),
            Self::Migration { .. } => true,
            _ => false,
        }
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
