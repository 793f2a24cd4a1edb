use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum SiteError {
    #[error("missing configuration: {0}")]
    ConfigMissing(String),
    #[error("failed to parse settings file {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("could not decode {} with any supported encoding", path.display())]
    Decode { path: PathBuf },
}

impl SiteError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        SiteError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}
