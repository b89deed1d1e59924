use std::path::PathBuf;

use crate::{
    library_config::{DatabaseBackend, LibraryConfig},
    metadata::LocalMetadataConfig,
    reconcile::MissingPolicy,
    scanner::LocalScannerConfig,
    storage::{DatabaseConfig, LocalStorageConfig},
};

/// Configuración ya repartida entre los componentes del [`LibraryManager`](crate::LibraryManager).
#[derive(Debug, Clone)]
pub struct ConfigManager {
    pub source_dir: PathBuf,
    pub scanner: LocalScannerConfig,
    pub metadata: LocalMetadataConfig,
    pub storage: LocalStorageConfig,
    pub missing_files: MissingPolicy,
}

impl ConfigManager {
    pub fn new() -> Self {
        LibraryConfig::default().into()
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl From<LibraryConfig> for ConfigManager {
    fn from(config: LibraryConfig) -> Self {
        let database = match config.database {
            DatabaseBackend::Sqlite(path) => DatabaseConfig::Sqlite(path),
        };

        ConfigManager {
            source_dir: config.source_dir,
            scanner: LocalScannerConfig {
                recursive: config.recursive,
                follow_symlinks: config.follow_symlinks,
                skip_backups: config.skip_backups,
                min_file_size: config.min_file_size,
            },
            metadata: LocalMetadataConfig {
                workers: config.decode_workers,
            },
            storage: LocalStorageConfig { database },
            missing_files: config.missing_files,
        }
    }
}

#[cfg(test)]
mod tests {
    use bytesize::ByteSize;

    use super::*;
    use crate::library_config::LibraryConfigBuilder;

    #[test]
    fn splits_library_config_per_component() {
        let config = LibraryConfigBuilder::default()
            .source_dir("/sets")
            .recursive(true)
            .min_file_size(ByteSize::kib(2))
            .decode_workers(2usize)
            .missing_files(MissingPolicy::Prune)
            .database(DatabaseBackend::Sqlite("/tmp/catalog.db".into()))
            .build()
            .unwrap();

        let manager = ConfigManager::from(config);
        assert_eq!(manager.source_dir, PathBuf::from("/sets"));
        assert!(manager.scanner.recursive);
        assert_eq!(manager.scanner.min_file_size, Some(ByteSize::kib(2)));
        assert_eq!(manager.metadata.workers, Some(2));
        assert_eq!(manager.missing_files, MissingPolicy::Prune);
        assert_eq!(
            manager.storage.database,
            DatabaseConfig::Sqlite("/tmp/catalog.db".into())
        );
    }
}
