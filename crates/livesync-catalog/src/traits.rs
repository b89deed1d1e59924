use std::path::Path;

use crate::{error::StoreError, model::ProjectRecord};

/// Lo que la reconciliación necesita del catálogo persistente.
pub trait CatalogStore {
    fn list_all(&self) -> Result<Vec<ProjectRecord>, StoreError>;

    /// Inserta `record` si su ruta no existe; si existe, solo actualiza los
    /// campos derivados y deja las anotaciones como estén en disco.
    fn refresh_derived(&self, record: &ProjectRecord) -> Result<(), StoreError>;

    fn remove(&self, path: &Path) -> Result<bool, StoreError>;
}
