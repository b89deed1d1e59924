use std::io;

/// Errores genéricos del crate
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// No se pudo determinar el directorio personal del usuario
    #[error(
        "Could not determine the home directory, the system probably does not provide a valid $HOME path."
    )]
    NoHome,

    /// Otro proceso mantiene el lock del catálogo
    #[error("The catalog is already in use by another livesync process ({0})")]
    AlreadyLocked(String),

    /// Error de IO al crear dirs, ficheros, locks...
    #[error(transparent)]
    Io(#[from] io::Error),
}
