mod embedded;

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};

use rusqlite::Connection;
use tracing::{debug, info, trace};

use embedded::migrations::runner;

use crate::{
    error::StoreError,
    model::{AnnotationField, ProjectRecord},
    traits::CatalogStore,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseConfig {
    Sqlite(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalStorageConfig {
    pub database: DatabaseConfig,
}

/// Catálogo persistente. Una sola conexión compartida detrás de un `Mutex`:
/// cada operación toma el lock, así que nunca hay dos escritores a la vez.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    conn: Arc<Mutex<Connection>>,
}

impl LocalStorage {
    pub fn new(config: LocalStorageConfig) -> Result<Self, StoreError> {
        let conn = match &config.database {
            DatabaseConfig::Sqlite(path) => {
                info!("Abriendo conexión con la base de datos en {}", path.display());
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    livesync_paths::ensure_dir(parent)?;
                }
                Connection::open(path)?
            }
        };

        let storage = LocalStorage {
            conn: Arc::new(Mutex::new(conn)),
        };
        storage.initialize()?;

        Ok(storage)
    }

    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::new(LocalStorageConfig {
            database: DatabaseConfig::Sqlite(path.into()),
        })
    }

    /// Configura la conexión y aplica las migraciones pendientes. Idempotente.
    pub fn initialize(&self) -> Result<(), StoreError> {
        let mut conn = self.conn()?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        // Espera hasta 5 segundos si la base de datos está ocupada antes de fallar.
        conn.pragma_update(None, "busy_timeout", 5000)?;

        info!("Ejecutando migraciones de la base de datos...");

        let report = runner().run(&mut *conn)?;
        for migration in report.applied_migrations() {
            trace!("Migración aplicada: {}", migration);
        }

        info!("Migraciones completadas exitosamente.");
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl LocalStorage {
    /// Inserta o reemplaza todos los campos del registro.
    pub fn upsert(&self, record: &ProjectRecord) -> Result<(), StoreError> {
        let conn = self.conn()?;
        queries::upsert(&conn, record)?;
        Ok(())
    }

    pub fn get(&self, path: &Path) -> Result<Option<ProjectRecord>, StoreError> {
        let conn = self.conn()?;
        Ok(queries::get(&conn, path)?)
    }

    /// Todo el catálogo, ordenado por nombre.
    pub fn list_all(&self) -> Result<Vec<ProjectRecord>, StoreError> {
        let conn = self.conn()?;
        Ok(queries::list_all(&conn)?)
    }

    pub fn refresh_derived(&self, record: &ProjectRecord) -> Result<(), StoreError> {
        let conn = self.conn()?;
        queries::refresh_derived(&conn, record)?;
        Ok(())
    }

    pub fn remove(&self, path: &Path) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        Ok(queries::remove(&conn, path)? > 0)
    }

    /// Edición directa desde la capa de presentación: lee, aplica y escribe
    /// en una sola transacción, sin pasar por el escaneo.
    pub fn annotate(
        &self,
        path: &Path,
        field: AnnotationField,
        value: &str,
    ) -> Result<ProjectRecord, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let mut record = queries::get(&tx, path)?.ok_or_else(|| StoreError::NotFound(path.to_path_buf()))?;
        record.annotations.set(field, value)?;
        queries::upsert(&tx, &record)?;

        tx.commit()?;
        debug!(path = %path.display(), %field, "Anotación guardada");
        Ok(record)
    }

    pub fn set_flag(&self, name: &str, value: bool) -> Result<(), StoreError> {
        let conn = self.conn()?;
        queries::set_flag(&conn, name, value)?;
        Ok(())
    }

    pub fn flag(&self, name: &str) -> Result<Option<bool>, StoreError> {
        let conn = self.conn()?;
        Ok(queries::flag(&conn, name)?)
    }
}

impl CatalogStore for LocalStorage {
    fn list_all(&self) -> Result<Vec<ProjectRecord>, StoreError> {
        LocalStorage::list_all(self)
    }

    fn refresh_derived(&self, record: &ProjectRecord) -> Result<(), StoreError> {
        LocalStorage::refresh_derived(self, record)
    }

    fn remove(&self, path: &Path) -> Result<bool, StoreError> {
        LocalStorage::remove(self, path)
    }
}

mod queries {
    use chrono::{DateTime, NaiveDate, Utc};
    use rusqlite::{OptionalExtension, Row, params};

    use super::*;
    use crate::model::Annotations;

    const COLUMNS: &str = r#"path, name, size, bpm, live_version, genre, status, "key", grade,
        release_date, created_at, modified_at"#;

    /// La clave es la ruta exacta; una ruta no UTF-8 no se guarda nunca.
    fn path_key(path: &Path) -> rusqlite::Result<&str> {
        path.to_str().ok_or_else(|| {
            let msg = format!("path is not valid UTF-8: {}", path.display());
            rusqlite::Error::ToSqlConversionFailure(msg.into())
        })
    }

    fn size_to_sql(size: u64) -> i64 {
        i64::try_from(size).unwrap_or(i64::MAX)
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<ProjectRecord> {
        let size: i64 = row.get(2)?;

        Ok(ProjectRecord {
            path: PathBuf::from(row.get::<_, String>(0)?),
            name: row.get(1)?,
            size_bytes: u64::try_from(size).unwrap_or_default(),
            tempo_bpm: row.get(3)?,
            live_version: row.get(4)?,
            annotations: Annotations {
                genre: row.get(5)?,
                status: row.get(6)?,
                key: row.get(7)?,
                grade: row.get(8)?,
                release_date: row.get::<_, Option<NaiveDate>>(9)?,
            },
            created_at: row.get::<_, Option<DateTime<Utc>>>(10)?,
            modified_at: row.get::<_, Option<DateTime<Utc>>>(11)?,
        })
    }

    pub fn upsert(conn: &Connection, record: &ProjectRecord) -> rusqlite::Result<usize> {
        let ann = &record.annotations;
        conn.execute(
            &format!(
                r#"INSERT INTO projects ({COLUMNS})
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                   ON CONFLICT(path) DO UPDATE SET
                       name = excluded.name,
                       size = excluded.size,
                       bpm = excluded.bpm,
                       live_version = excluded.live_version,
                       genre = excluded.genre,
                       status = excluded.status,
                       "key" = excluded."key",
                       grade = excluded.grade,
                       release_date = excluded.release_date,
                       created_at = excluded.created_at,
                       modified_at = excluded.modified_at"#
            ),
            params![
                path_key(&record.path)?,
                record.name,
                size_to_sql(record.size_bytes),
                record.tempo_bpm,
                record.live_version,
                ann.genre,
                ann.status,
                ann.key,
                ann.grade,
                ann.release_date,
                record.created_at,
                record.modified_at,
            ],
        )
    }

    /// Igual que `upsert` al insertar; al actualizar no toca las anotaciones.
    pub fn refresh_derived(conn: &Connection, record: &ProjectRecord) -> rusqlite::Result<usize> {
        let ann = &record.annotations;
        conn.execute(
            &format!(
                r#"INSERT INTO projects ({COLUMNS})
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                   ON CONFLICT(path) DO UPDATE SET
                       name = excluded.name,
                       size = excluded.size,
                       bpm = excluded.bpm,
                       live_version = excluded.live_version,
                       created_at = excluded.created_at,
                       modified_at = excluded.modified_at"#
            ),
            params![
                path_key(&record.path)?,
                record.name,
                size_to_sql(record.size_bytes),
                record.tempo_bpm,
                record.live_version,
                ann.genre,
                ann.status,
                ann.key,
                ann.grade,
                ann.release_date,
                record.created_at,
                record.modified_at,
            ],
        )
    }

    pub fn get(conn: &Connection, path: &Path) -> rusqlite::Result<Option<ProjectRecord>> {
        conn.query_row(
            &format!("SELECT {COLUMNS} FROM projects WHERE path = ?1"),
            [path_key(path)?],
            from_row,
        )
        .optional()
    }

    pub fn list_all(conn: &Connection) -> rusqlite::Result<Vec<ProjectRecord>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM projects ORDER BY name COLLATE NOCASE, path"
        ))?;

        let records = stmt.query_map([], from_row)?;
        records.collect()
    }

    pub fn remove(conn: &Connection, path: &Path) -> rusqlite::Result<usize> {
        conn.execute("DELETE FROM projects WHERE path = ?1", [path_key(path)?])
    }

    pub fn set_flag(conn: &Connection, name: &str, value: bool) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO settings (name, value) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET value = excluded.value",
            params![name, value],
        )
    }

    pub fn flag(conn: &Connection, name: &str) -> rusqlite::Result<Option<bool>> {
        conn.query_row("SELECT value FROM settings WHERE name = ?1", [name], |row| row.get(0))
            .optional()
    }
}
