use fs2::FileExt;
use std::{fs, fs::OpenOptions, io, path::Path};

use tracing::{Level, instrument};

use crate::errors::Error;

/// Asegura que la carpeta `path` existe (creándola recursivamente si hace falta).
#[instrument(level = Level::TRACE, err)]
pub fn ensure_dir(path: &Path) -> Result<(), Error> {
    fs::create_dir_all(path)?;
    Ok(())
}

/// Asegura que el fichero `path` existe (creando su carpeta padre si hace falta).
#[instrument(level = Level::TRACE, err)]
pub fn ensure_file(path: &Path) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    if !path.exists() {
        fs::File::create(path)?;
    }

    Ok(())
}

/// Intenta adquirir un lock exclusivo sobre `path` sin bloquear.
/// Mientras conserves el `File` devuelto, el lock se mantiene.
#[instrument(level = Level::TRACE, err)]
pub fn lock_file(path: &Path) -> Result<fs::File, Error> {
    ensure_file(path)?;
    let file = OpenOptions::new().read(true).write(true).open(path)?;

    match file.try_lock_exclusive() {
        Ok(()) => Ok(file),
        Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
            Err(Error::AlreadyLocked(path.display().to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Comprueba que se puede escribir en la carpeta `dir` creando y borrando un fichero de prueba.
#[instrument(level = Level::TRACE, err)]
pub fn check_writable(dir: &Path) -> Result<(), Error> {
    let probe = dir.join(".livesync-write-probe");

    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&probe)
        .map_err(|e| io::Error::new(e.kind(), format!("{} is not writable: {e}", dir.display())))?;
    fs::remove_file(&probe)?;

    Ok(())
}
