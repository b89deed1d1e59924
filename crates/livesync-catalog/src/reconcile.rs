//! Reconciliación del escaneo con el catálogo persistente.
//!
//! Los campos derivados (tamaño, fechas, tempo, versión de Live) siempre se
//! toman del escaneo; las anotaciones del usuario solo se escriben al crear
//! el registro. Las rutas que ya no están en disco se conservan o se borran
//! según [`MissingPolicy`]; las que el escaneo no pudo comprobar (ilegibles,
//! saltadas o bajo un directorio que falló) nunca cuentan como ausentes.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{Level, debug, info, instrument, warn};

use crate::{
    error::StoreError,
    model::{Annotations, ProjectRecord},
    traits::CatalogStore,
};

/// Qué hacer con los registros cuyo fichero ya no aparece en el escaneo.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingPolicy {
    #[default]
    Retain,
    Prune,
}

/// Decisión para una ruta escaneada.
#[derive(Debug, Clone, PartialEq)]
pub enum Merge {
    Insert(ProjectRecord),
    Update(ProjectRecord),
    Unchanged,
}

/// Combina el registro persistido (si existe) con el recién escaneado.
pub fn merge(existing: Option<&ProjectRecord>, scanned: ProjectRecord) -> Merge {
    match existing {
        None => Merge::Insert(ProjectRecord {
            annotations: Annotations::default(),
            ..scanned
        }),
        Some(e) if e.same_derived(&scanned) => Merge::Unchanged,
        Some(e) => Merge::Update(e.refreshed_from(&scanned)),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileFailure {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub inserted: Vec<PathBuf>,
    pub updated: Vec<PathBuf>,
    pub unchanged: usize,
    /// En el catálogo bajo la raíz escaneada pero no en disco (política `Retain`).
    pub missing: Vec<PathBuf>,
    pub pruned: Vec<PathBuf>,
    pub failed: Vec<ReconcileFailure>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    policy: MissingPolicy,
}

impl Reconciler {
    pub fn new(policy: MissingPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> MissingPolicy {
        self.policy
    }

    /// Aplica `scanned` (todo lo observado bajo `root`) sobre `store`.
    ///
    /// Un registro cuya ruta es igual a una de `unverified`, o cuelga de ella,
    /// no se da por desaparecido aunque no venga en `scanned`.
    ///
    /// Solo falla si no se puede leer el catálogo; los errores al escribir un
    /// registro concreto se acumulan en el informe y se sigue con el resto.
    #[instrument(level = Level::INFO, skip(self, store, scanned, unverified), fields(root = %root.display(), scanned = scanned.len()))]
    pub fn reconcile<S>(
        &self,
        store: &S,
        root: &Path,
        scanned: Vec<ProjectRecord>,
        unverified: &[PathBuf],
    ) -> Result<ReconcileReport, StoreError>
    where
        S: CatalogStore + ?Sized,
    {
        let index: HashMap<PathBuf, ProjectRecord> = store
            .list_all()?
            .into_iter()
            .map(|r| (r.path.clone(), r))
            .collect();

        // Una misma ruta solo puede aparecer una vez; gana la última observación.
        let mut observed: HashMap<PathBuf, ProjectRecord> = HashMap::with_capacity(scanned.len());
        for record in scanned {
            observed.insert(record.path.clone(), record);
        }

        let mut report = ReconcileReport::default();

        for (path, record) in observed.iter() {
            let (merged, bucket) = match merge(index.get(path), record.clone()) {
                Merge::Unchanged => {
                    report.unchanged += 1;
                    continue;
                }
                Merge::Insert(r) => (r, &mut report.inserted),
                Merge::Update(r) => (r, &mut report.updated),
            };

            match store.refresh_derived(&merged) {
                Ok(()) => bucket.push(path.clone()),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "No se pudo guardar el proyecto, sigo");
                    report.failed.push(ReconcileFailure {
                        path: path.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let missing = index.keys().filter(|p| {
            if !p.starts_with(root) || observed.contains_key(*p) {
                return false;
            }
            let unchecked = unverified.iter().any(|u| p.starts_with(u));
            if unchecked {
                debug!(path = %p.display(), "Sin verificar en este escaneo, se conserva");
            }
            !unchecked
        });

        for path in missing {
            match self.policy {
                MissingPolicy::Retain => report.missing.push(path.clone()),
                MissingPolicy::Prune => match store.remove(path) {
                    Ok(_) => {
                        debug!(path = %path.display(), "Proyecto eliminado del catálogo");
                        report.pruned.push(path.clone());
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "No se pudo eliminar el proyecto");
                        report.failed.push(ReconcileFailure {
                            path: path.clone(),
                            error: e.to_string(),
                        });
                    }
                },
            }
        }

        info!(
            inserted = report.inserted.len(),
            updated = report.updated.len(),
            unchanged = report.unchanged,
            missing = report.missing.len(),
            pruned = report.pruned.len(),
            failed = report.failed.len(),
            "Reconciliación completada"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, collections::BTreeMap};

    use super::*;

    /// Catálogo en memoria; las rutas de `poisoned` fallan al escribir.
    #[derive(Default)]
    struct MemoryStore {
        rows: RefCell<BTreeMap<PathBuf, ProjectRecord>>,
        poisoned: Vec<PathBuf>,
    }

    impl CatalogStore for MemoryStore {
        fn list_all(&self) -> Result<Vec<ProjectRecord>, StoreError> {
            Ok(self.rows.borrow().values().cloned().collect())
        }

        fn refresh_derived(&self, record: &ProjectRecord) -> Result<(), StoreError> {
            if self.poisoned.contains(&record.path) {
                return Err(StoreError::NotFound(record.path.clone()));
            }
            let mut rows = self.rows.borrow_mut();
            let merged = match rows.get(&record.path) {
                Some(existing) => existing.refreshed_from(record),
                None => record.clone(),
            };
            rows.insert(record.path.clone(), merged);
            Ok(())
        }

        fn remove(&self, path: &Path) -> Result<bool, StoreError> {
            Ok(self.rows.borrow_mut().remove(path).is_some())
        }
    }

    fn scanned(path: &str, size: u64, tempo: Option<f64>) -> ProjectRecord {
        let mut rec = ProjectRecord::new(path);
        rec.size_bytes = size;
        rec.tempo_bpm = tempo;
        rec
    }

    #[test]
    fn merge_inserts_with_default_annotations() {
        let mut rec = scanned("/root/a.als", 1, None);
        rec.annotations.genre = "should not survive".into();

        match merge(None, rec) {
            Merge::Insert(r) => assert_eq!(r.annotations, Annotations::default()),
            other => panic!("esperaba Insert, obtuve {other:?}"),
        }
    }

    #[test]
    fn merge_detects_unchanged_records() {
        let mut existing = scanned("/root/a.als", 1, Some(90.0));
        existing.annotations.genre = "Jazz".into();

        assert_eq!(merge(Some(&existing), scanned("/root/a.als", 1, Some(90.0))), Merge::Unchanged);
    }

    #[test]
    fn reconcile_preserves_annotations_on_update() {
        let store = MemoryStore::default();
        let mut existing = scanned("/root/a.als", 1, Some(90.0));
        existing.annotations.genre = "Jazz".into();
        store.rows.borrow_mut().insert(existing.path.clone(), existing);

        let report = Reconciler::default()
            .reconcile(&store, Path::new("/root"), vec![scanned("/root/a.als", 500, Some(128.0))], &[])
            .unwrap();

        assert_eq!(report.updated, vec![PathBuf::from("/root/a.als")]);
        let row = store.rows.borrow()[Path::new("/root/a.als")].clone();
        assert_eq!(row.size_bytes, 500);
        assert_eq!(row.tempo_bpm, Some(128.0));
        assert_eq!(row.annotations.genre, "Jazz");
    }

    #[test]
    fn duplicate_paths_in_one_scan_collapse_to_one_row() {
        let store = MemoryStore::default();
        let report = Reconciler::default()
            .reconcile(
                &store,
                Path::new("/root"),
                vec![scanned("/root/a.als", 1, None), scanned("/root/a.als", 2, None)],
                &[],
            )
            .unwrap();

        assert_eq!(report.inserted.len(), 1);
        assert_eq!(store.rows.borrow().len(), 1);
        assert_eq!(store.rows.borrow()[Path::new("/root/a.als")].size_bytes, 2);
    }

    #[test]
    fn write_failures_are_collected_and_the_rest_commits() {
        let store = MemoryStore {
            poisoned: vec![PathBuf::from("/root/bad.als")],
            ..Default::default()
        };

        let report = Reconciler::default()
            .reconcile(
                &store,
                Path::new("/root"),
                vec![
                    scanned("/root/bad.als", 1, None),
                    scanned("/root/good.als", 1, None),
                ],
                &[],
            )
            .unwrap();

        assert_eq!(report.inserted, vec![PathBuf::from("/root/good.als")]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].path, PathBuf::from("/root/bad.als"));
        assert!(!report.is_clean());
    }

    #[test]
    fn missing_files_follow_the_policy_and_stay_inside_the_root() {
        let seed = || {
            let store = MemoryStore::default();
            for path in ["/root/gone.als", "/other/elsewhere.als"] {
                store.rows.borrow_mut().insert(PathBuf::from(path), scanned(path, 1, None));
            }
            store
        };

        let store = seed();
        let report = Reconciler::new(MissingPolicy::Retain)
            .reconcile(&store, Path::new("/root"), Vec::new(), &[])
            .unwrap();
        assert_eq!(report.missing, vec![PathBuf::from("/root/gone.als")]);
        assert_eq!(store.rows.borrow().len(), 2);

        let store = seed();
        let report = Reconciler::new(MissingPolicy::Prune)
            .reconcile(&store, Path::new("/root"), Vec::new(), &[])
            .unwrap();
        assert_eq!(report.pruned, vec![PathBuf::from("/root/gone.als")]);
        assert!(store.rows.borrow().contains_key(Path::new("/other/elsewhere.als")));
        assert_eq!(store.rows.borrow().len(), 1);
    }

    #[test]
    fn unverified_paths_and_their_descendants_are_never_pruned() {
        let store = MemoryStore::default();
        for path in [
            "/root/locked.als",
            "/root/broken dir/a.als",
            "/root/broken dir/deep/b.als",
            "/root/gone.als",
        ] {
            store.rows.borrow_mut().insert(PathBuf::from(path), scanned(path, 1, None));
        }

        let unverified = [PathBuf::from("/root/locked.als"), PathBuf::from("/root/broken dir")];
        let report = Reconciler::new(MissingPolicy::Prune)
            .reconcile(&store, Path::new("/root"), Vec::new(), &unverified)
            .unwrap();

        assert_eq!(report.pruned, vec![PathBuf::from("/root/gone.als")]);
        assert!(report.missing.is_empty());
        let rows = store.rows.borrow();
        assert_eq!(rows.len(), 3);
        assert!(rows.contains_key(Path::new("/root/locked.als")));
        assert!(rows.contains_key(Path::new("/root/broken dir/deep/b.als")));
    }

    #[test]
    fn unverified_root_protects_the_whole_catalog() {
        let store = MemoryStore::default();
        for path in ["/root/a.als", "/root/sub/b.als"] {
            store.rows.borrow_mut().insert(PathBuf::from(path), scanned(path, 1, None));
        }

        let report = Reconciler::new(MissingPolicy::Prune)
            .reconcile(&store, Path::new("/root"), Vec::new(), &[PathBuf::from("/root")])
            .unwrap();

        assert!(report.pruned.is_empty());
        assert_eq!(store.rows.borrow().len(), 2);
    }

    #[test]
    fn sibling_with_a_shared_prefix_is_not_protected() {
        let store = MemoryStore::default();
        store
            .rows
            .borrow_mut()
            .insert(PathBuf::from("/root/song.als.bak/x.als"), scanned("/root/song.als.bak/x.als", 1, None));
        store
            .rows
            .borrow_mut()
            .insert(PathBuf::from("/root/songs/y.als"), scanned("/root/songs/y.als", 1, None));

        let report = Reconciler::new(MissingPolicy::Prune)
            .reconcile(&store, Path::new("/root"), Vec::new(), &[PathBuf::from("/root/song")])
            .unwrap();

        assert_eq!(report.pruned.len(), 2);
        assert!(store.rows.borrow().is_empty());
    }
}
