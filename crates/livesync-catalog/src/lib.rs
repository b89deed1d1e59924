pub mod als;
pub mod config_manager;
pub mod error;
pub mod extensions;
pub mod library_config;
pub mod metadata;
pub mod model;
pub mod reconcile;
pub mod scanner;
pub mod storage;
pub mod traits;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use tokio::{sync::Mutex, task::spawn_blocking};
use tracing::{info, warn};

pub use crate::{
    config_manager::ConfigManager,
    error::{ConfigError, ScanError, StoreError, SyncError},
    library_config::LibraryConfig,
    model::{AnnotationField, Annotations, ProjectRecord},
    reconcile::{MissingPolicy, ReconcileReport},
    scanner::ScanFailure,
};

use crate::{metadata::ProjectMetadata, reconcile::Reconciler, scanner::LocalScanner, storage::LocalStorage};

/// Flag de la tabla `settings` que marca que ya hubo al menos una pasada.
const HAS_RUN_FLAG: &str = "has_run";

/// Resultado de una pasada completa: escaneo + reconciliación.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub root: PathBuf,
    pub scanned: usize,
    pub scan_failures: Vec<ScanFailure>,
    pub reconcile: ReconcileReport,
}

#[derive(Debug)]
pub struct LibraryManager {
    scanner: Arc<LocalScanner>,
    storage: Arc<LocalStorage>,
    reconciler: Reconciler,
    source_dir: PathBuf,
    /// Dos pasadas nunca se intercalan.
    pass_lock: Mutex<()>,
}

impl LibraryManager {
    pub fn new(config: ConfigManager) -> Result<Self, StoreError> {
        let metadata = ProjectMetadata::new(config.metadata);
        let scanner = LocalScanner::new(config.scanner, metadata);
        let storage = LocalStorage::new(config.storage)?;

        Ok(Self {
            scanner: Arc::new(scanner),
            storage: Arc::new(storage),
            reconciler: Reconciler::new(config.missing_files),
            source_dir: config.source_dir,
            pass_lock: Mutex::new(()),
        })
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    /// Escanea la carpeta de proyectos y reconcilia el resultado con el catálogo.
    pub async fn scan(&self) -> Result<SyncReport, SyncError> {
        let _pass = self.pass_lock.lock().await;
        let start_time = Instant::now();

        info!("Starting project scan in {}...", self.source_dir.display());
        let report = self.scanner.scan(&self.source_dir).await?;

        let decoded = report.records.len();
        let decode_failures = report.decode_failures();
        if decode_failures > 0 {
            warn!("{decode_failures} of {decoded} files failed to decode");
        }
        let other_failures = report.failures.len() - decode_failures;
        if other_failures > 0 {
            warn!("{other_failures} files could not be read");
        }

        let storage = Arc::clone(&self.storage);
        let reconciler = self.reconciler.clone();
        let root = report.root.clone();
        let unverified = report.unverified_paths();
        let records = report.records;

        let reconcile = spawn_blocking(move || {
            reconciler.reconcile(storage.as_ref(), &root, records, &unverified)
        })
        .await??;

        info!("Scan and reconciliation took {} ms", start_time.elapsed().as_millis());

        Ok(SyncReport {
            root: report.root,
            scanned: decoded,
            scan_failures: report.failures,
            reconcile,
        })
    }

    /// Catálogo completo ordenado por nombre, listo para la capa de presentación.
    pub fn catalog(&self) -> Result<Vec<ProjectRecord>, StoreError> {
        self.storage.list_all()
    }

    /// Edición de una anotación desde la capa de presentación; se guarda al momento.
    pub fn annotate(
        &self,
        path: &Path,
        field: AnnotationField,
        value: &str,
    ) -> Result<ProjectRecord, StoreError> {
        self.storage.annotate(path, field, value)
    }

    pub fn is_first_run(&self) -> Result<bool, StoreError> {
        Ok(!self.storage.flag(HAS_RUN_FLAG)?.unwrap_or(false))
    }

    pub fn mark_has_run(&self) -> Result<(), StoreError> {
        self.storage.set_flag(HAS_RUN_FLAG, true)
    }
}
