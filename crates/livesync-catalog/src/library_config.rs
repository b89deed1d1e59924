use std::path::{Path, PathBuf};

use bytesize::ByteSize;
use config::{Config, File, FileFormat};
use derive_builder::Builder;
use livesync_paths::UserDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{error::ConfigError, reconcile::MissingPolicy};

/// Backends de base de datos
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "path")]
pub enum DatabaseBackend {
    Sqlite(PathBuf),
}

impl Default for DatabaseBackend {
    fn default() -> Self {
        DatabaseBackend::Sqlite("file_manager.db".into())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(setter(into, strip_option), default)]
#[serde(default)]
pub struct LibraryConfig {
    /// Carpeta donde se buscan los Live Sets.
    pub source_dir: PathBuf,
    pub recursive: bool,
    pub follow_symlinks: bool,
    pub skip_backups: bool,
    pub min_file_size: Option<ByteSize>,
    pub missing_files: MissingPolicy,
    pub decode_workers: Option<usize>,
    pub database: DatabaseBackend,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        LibraryConfig {
            source_dir: default_source_dir(),
            recursive: false,
            follow_symlinks: true,
            skip_backups: true,
            min_file_size: None,
            missing_files: MissingPolicy::Retain,
            decode_workers: None,
            database: DatabaseBackend::default(),
        }
    }
}

/// El escritorio del usuario; si no se puede resolver, `./Desktop`.
fn default_source_dir() -> PathBuf {
    UserDirs::new()
        .and_then(|dirs| {
            dirs.desktop_dir()
                .map(Path::to_path_buf)
                .or_else(|| Some(dirs.home_dir().join("Desktop")))
        })
        .unwrap_or_else(|| PathBuf::from("Desktop"))
}

impl LibraryConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_string_lossy().into_owned();
        let cfg = Config::builder()
            .add_source(File::new(&path, FileFormat::Toml))
            .build()
            .map_err(ConfigError::Parse)?;
        let lc = cfg
            .try_deserialize::<LibraryConfig>()
            .map_err(ConfigError::Parse)?;
        Ok(lc)
    }

    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            livesync_paths::ensure_dir(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Lee `path` si existe; si no, escribe la configuración por defecto ahí.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if path.exists() {
            debug!("Leyendo configuración de {}", path.display());
            return Self::from_file(path);
        }

        info!("No hay configuración en {}, creando una por defecto", path.display());
        let config = LibraryConfig::default();
        config.to_file(path)?;
        Ok(config)
    }

    /// Resuelve las rutas relativas (base de datos y carpeta de proyectos) contra `base`.
    pub fn resolve_relative(mut self, base: &Path) -> Self {
        let DatabaseBackend::Sqlite(db) = &mut self.database;
        if db.is_relative() {
            *db = base.join(&*db);
        }
        if self.source_dir.is_relative() {
            self.source_dir = base.join(&self.source_dir);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_the_rest() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("settings.toml");
        fs::write(
            &path,
            r#"
source_dir = "/music/projects"
recursive = true
missing_files = "prune"
"#,
        )
        .unwrap();

        let config = LibraryConfig::from_file(&path).unwrap();
        assert_eq!(config.source_dir, PathBuf::from("/music/projects"));
        assert!(config.recursive);
        assert_eq!(config.missing_files, MissingPolicy::Prune);
        assert!(config.follow_symlinks);
        assert!(config.skip_backups);
        assert_eq!(config.database, DatabaseBackend::default());
    }

    #[test]
    fn load_or_default_writes_a_file_that_reads_back() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("settings.toml");

        let written = LibraryConfig::load_or_default(&path).unwrap();
        assert!(path.is_file());

        let read = LibraryConfig::load_or_default(&path).unwrap();
        assert_eq!(read, written);
    }

    #[test]
    fn builder_and_resolution() {
        let config = LibraryConfigBuilder::default()
            .source_dir("projects")
            .decode_workers(4usize)
            .build()
            .unwrap()
            .resolve_relative(Path::new("/base"));

        assert_eq!(config.source_dir, PathBuf::from("/base/projects"));
        assert_eq!(config.decode_workers, Some(4));
        assert_eq!(
            config.database,
            DatabaseBackend::Sqlite(PathBuf::from("/base/file_manager.db"))
        );
    }

    #[test]
    fn unknown_policy_is_a_parse_error() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("settings.toml");
        fs::write(&path, "missing_files = \"shred\"\n").unwrap();

        assert!(matches!(LibraryConfig::from_file(&path), Err(ConfigError::Parse(_))));
    }
}
