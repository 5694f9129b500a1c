use std::path::PathBuf;

/// Errors raised by the file-facing commands. The text normalizer itself never fails.
#[derive(Debug, thiserror::Error)]
pub enum SiteError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("walk: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("report: {0}")]
    Report(String),
}

pub type Result<T> = std::result::Result<T, SiteError>;

impl SiteError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SiteError::Io {
            path: path.into(),
            source,
        }
    }
}
