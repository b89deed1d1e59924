use std::{fs, path::Path, sync::Arc};

use futures::{StreamExt, stream};
use tokio::task::{JoinError, spawn_blocking};
use tracing::{error, warn};

use crate::{
    als,
    model::ProjectRecord,
    scanner::{FileIssue, ProjectFile, ScanFailure},
};

/// Etapa de decodificación: convierte cada [`ProjectFile`] en un registro.
#[derive(Debug, Clone)]
pub struct ProjectMetadata {
    config: Arc<LocalMetadataConfig>,
}

impl ProjectMetadata {
    pub fn new(config: LocalMetadataConfig) -> Self {
        ProjectMetadata {
            config: config.into(),
        }
    }

    fn max_workers(&self) -> usize {
        self.config.workers.unwrap_or_else(num_cpus::get).clamp(1, 64)
    }

    /// Decodifica todos los ficheros con un pool acotado y espera a que
    /// terminen todos antes de devolver.
    pub async fn process(&self, files: Vec<ProjectFile>) -> (Vec<ProjectRecord>, Vec<ScanFailure>) {
        let permits = self.max_workers();
        let mut records = Vec::with_capacity(files.len());
        let mut failures = Vec::new();

        let futures = files.into_iter().map(|file| async move {
            let fallback = attributes_only(&file);
            settle(fallback, spawn_blocking(move || read_project(file)).await)
        });

        let mut stream = stream::iter(futures).buffer_unordered(permits);

        while let Some((record, failure)) = stream.next().await {
            records.push(record);
            failures.extend(failure);
        }

        (records, failures)
    }
}

/// Si la tarea de decodificación muere, el fichero se cataloga igual con
/// solo sus atributos.
fn settle(
    fallback: ProjectRecord,
    joined: Result<(ProjectRecord, Option<ScanFailure>), JoinError>,
) -> (ProjectRecord, Option<ScanFailure>) {
    match joined {
        Ok(done) => done,
        Err(join_e) => {
            error!(path = %fallback.path.display(), error = %join_e, "panic al decodificar, sigo");
            let failure = scan_failure(&fallback.path, FileIssue::Unreadable(join_e.to_string()));
            (fallback, Some(failure))
        }
    }
}

fn attributes_only(file: &ProjectFile) -> ProjectRecord {
    let mut record = ProjectRecord::new(file.path.clone());
    record.size_bytes = file.size_bytes;
    record.created_at = file.created_at;
    record.modified_at = file.modified_at;
    record
}

/// Lee y decodifica un único proyecto. Los atributos del fichero siempre
/// llegan al registro; el tempo solo si la decodificación tuvo éxito.
pub fn read_project(file: ProjectFile) -> (ProjectRecord, Option<ScanFailure>) {
    let mut record = attributes_only(&file);

    let bytes = match fs::read(&record.path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %record.path.display(), error = %e, "No se pudo leer el proyecto");
            let failure = scan_failure(&record.path, FileIssue::Unreadable(e.to_string()));
            return (record, Some(failure));
        }
    };

    match als::decode(&bytes) {
        Ok(meta) => {
            record.tempo_bpm = Some(meta.tempo_bpm);
            record.live_version = meta.creator;
            (record, None)
        }
        Err(e) => {
            warn!(path = %record.path.display(), error = %e, "No se pudo decodificar el Live Set");
            let failure = scan_failure(&record.path, FileIssue::Decode(e));
            (record, Some(failure))
        }
    }
}

fn scan_failure(path: &Path, issue: FileIssue) -> ScanFailure {
    ScanFailure {
        path: path.to_path_buf(),
        issue,
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LocalMetadataConfig {
    /// Decodificaciones simultáneas. `None` usa un hilo por CPU.
    pub workers: Option<usize>,
}

#[cfg(test)]
mod tests {
    use std::{fs, path::PathBuf};

    use tempfile::tempdir;

    use super::*;
    use crate::{als::tests::als_bytes, extensions::SupportedExtension};

    fn project_file(path: PathBuf, size: u64) -> ProjectFile {
        ProjectFile {
            path,
            extension: SupportedExtension::Als,
            size_bytes: size,
            created_at: None,
            modified_at: None,
        }
    }

    #[test]
    fn vanished_file_keeps_its_attributes() {
        let tmp = tempdir().unwrap();
        let (record, failure) = read_project(project_file(tmp.path().join("gone.als"), 42));

        assert_eq!(record.size_bytes, 42);
        assert_eq!(record.tempo_bpm, None);
        assert!(matches!(failure.unwrap().issue, FileIssue::Unreadable(_)));
    }

    #[tokio::test]
    async fn panicked_decode_still_yields_a_record() {
        let tmp = tempdir().unwrap();
        let file = project_file(tmp.path().join("crash.als"), 7);
        let task: tokio::task::JoinHandle<(ProjectRecord, Option<ScanFailure>)> =
            tokio::spawn(async { panic!("decoder crashed") });

        let (record, failure) = settle(attributes_only(&file), task.await);

        assert_eq!(record.path, file.path);
        assert_eq!(record.size_bytes, 7);
        assert_eq!(record.tempo_bpm, None);
        assert!(matches!(failure.unwrap().issue, FileIssue::Unreadable(_)));
    }

    #[tokio::test]
    async fn process_joins_every_file() {
        let tmp = tempdir().unwrap();
        let mut files = Vec::new();
        for i in 0..20 {
            let path = tmp.path().join(format!("set-{i}.als"));
            fs::write(&path, als_bytes(60.0 + i as f64)).unwrap();
            files.push(project_file(path, 1));
        }

        let metadata = ProjectMetadata::new(LocalMetadataConfig { workers: Some(3) });
        let (records, failures) = metadata.process(files).await;

        assert_eq!(records.len(), 20);
        assert!(failures.is_empty());
        assert!(records.iter().all(|r| r.tempo_bpm.is_some()));
    }
}
