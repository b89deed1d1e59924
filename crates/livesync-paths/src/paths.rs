use std::{env, fs::File, path::PathBuf};

use directories::UserDirs;

use crate::{errors::Error, fs_utils};

/// Nombre de la ENV var para override de ruta base (modo “portable”)
const ENV_BASE_DIR: &str = "LIVESYNC_BASE_DIR";

/// Carpeta (dentro del home) donde vive todo el estado de livesync
const BASE_DIR_NAME: &str = "livesync";

/// Contenedor de todas las rutas y ficheros importantes de la app
#[derive(Debug, Clone)]
pub struct LivesyncPaths {
    pub base_dir: PathBuf,
    pub settings_file: PathBuf,
    pub catalog_db: PathBuf,
    pub log_file: PathBuf,
    pub lock_file: PathBuf,
}

impl LivesyncPaths {
    pub fn new() -> Result<Self, Error> {
        let base_dir = match env::var(ENV_BASE_DIR) {
            Ok(base) if !base.trim().is_empty() => PathBuf::from(base),
            _ => UserDirs::new()
                .map(|ud| ud.home_dir().join(BASE_DIR_NAME))
                .ok_or(Error::NoHome)?,
        };

        let paths = Self::with_base(base_dir);

        paths.ensure_structure()?;
        paths.validate_structure()?;

        Ok(paths)
    }

    /// Calcula las rutas bajo `base_dir` sin tocar el disco.
    pub fn with_base(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();

        LivesyncPaths {
            settings_file: base_dir.join("settings.toml"),
            catalog_db: base_dir.join("file_manager.db"),
            log_file: base_dir.join("livesync.log"),
            lock_file: base_dir.join("livesync.lock"),
            base_dir,
        }
    }

    /// Adquiere un advisory-lock excluyente en `livesync.lock`.
    /// Mantén vivo el File retornado para conservar el lock.
    pub fn lock(&self) -> Result<File, Error> {
        fs_utils::lock_file(&self.lock_file)
    }

    /// Se asegura de que la carpeta base y el log existen.
    pub fn ensure_structure(&self) -> Result<(), Error> {
        fs_utils::ensure_dir(&self.base_dir)?;
        fs_utils::ensure_file(&self.log_file)?;
        Ok(())
    }

    /// Valida que la carpeta base existe Y es escribible.
    pub fn validate_structure(&self) -> Result<(), Error> {
        if !self.base_dir.exists() {
            fs_utils::ensure_dir(&self.base_dir)?;
        }
        fs_utils::check_writable(&self.base_dir)
    }
}
