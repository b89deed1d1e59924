use std::{io, path::PathBuf};

use thiserror::Error;

use crate::model::AnnotationError;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Configuration parse error: {0}")]
    Parse(#[from] config::ConfigError),

    #[error(transparent)]
    Paths(#[from] livesync_paths::Error),
}

/// Errores fatales del escaneo. Los fallos por fichero no llegan aquí: se
/// acumulan en el [`ScanReport`](crate::scanner::ScanReport).
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory {path} is unreadable: {source}")]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("Scan task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] refinery::Error),

    #[error("Could not prepare the catalog location: {0}")]
    Paths(#[from] livesync_paths::Error),

    #[error("No project is catalogued at {0}")]
    NotFound(PathBuf),

    #[error(transparent)]
    Annotation(#[from] AnnotationError),

    #[error("Catalog connection lock was poisoned")]
    Poisoned,
}

/// Error de una pasada completa de escaneo + reconciliación.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Reconciliation task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
