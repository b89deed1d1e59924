use std::{
    ffi::OsStr,
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use bytesize::ByteSize;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{Level, debug, info, instrument, warn};
use walkdir::{DirEntry, WalkDir};

use crate::{
    als::DecodeError,
    error::ScanError,
    extensions::SupportedExtension,
    metadata::ProjectMetadata,
    model::ProjectRecord,
};

/// Carpeta donde Live guarda las copias automáticas de un set.
const BACKUP_DIR: &str = "Backup";

/// Un candidato encontrado en disco, con sus atributos del sistema de ficheros.
#[derive(Debug, Clone)]
pub struct ProjectFile {
    pub path: PathBuf,
    pub extension: SupportedExtension,
    pub size_bytes: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

/// Problema con un fichero concreto. Nunca aborta el escaneo.
#[derive(Debug, Clone, PartialEq)]
pub enum FileIssue {
    /// El recorrido del directorio falló en esta entrada.
    Walk(String),
    /// No se pudieron leer los atributos o los bytes del fichero.
    Unreadable(String),
    /// Se leyó el fichero pero no se pudo decodificar.
    Decode(DecodeError),
    /// La ruta no es UTF-8 y el catálogo no la puede guardar sin alterarla.
    NonUtf8Path,
}

impl fmt::Display for FileIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileIssue::Walk(e) => write!(f, "walk error: {e}"),
            FileIssue::Unreadable(e) => write!(f, "unreadable: {e}"),
            FileIssue::Decode(e) => write!(f, "decode error: {e}"),
            FileIssue::NonUtf8Path => f.write_str("path is not valid UTF-8"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanFailure {
    pub path: PathBuf,
    pub issue: FileIssue,
}

/// Resultado de un escaneo: lo que hay en disco ahora mismo. No persiste nada.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub root: PathBuf,
    pub records: Vec<ProjectRecord>,
    pub failures: Vec<ScanFailure>,
    /// `.als` presentes en disco que la configuración deja fuera de este escaneo
    /// (por debajo de `min_file_size` o enlaces simbólicos sin seguir).
    pub skipped: Vec<PathBuf>,
}

impl ScanReport {
    /// Rutas que este escaneo no pudo comprobar: siguen (o pueden seguir) en
    /// disco aunque no haya registro. Un error del recorrido cubre todo lo que
    /// cuelga de esa ruta.
    pub fn unverified_paths(&self) -> Vec<PathBuf> {
        self.failures
            .iter()
            .map(|f| f.path.clone())
            .chain(self.skipped.iter().cloned())
            .collect()
    }

    pub fn decode_failures(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| matches!(f.issue, FileIssue::Decode(_)))
            .count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalScannerConfig {
    /// `false` lista solo el primer nivel de la raíz.
    pub recursive: bool,
    pub follow_symlinks: bool,
    /// Ignora las carpetas `Backup/` que Live crea junto a cada set.
    pub skip_backups: bool,
    /// Sobrescribe el tamaño mínimo por defecto de cada extensión.
    pub min_file_size: Option<ByteSize>,
}

impl Default for LocalScannerConfig {
    fn default() -> Self {
        Self {
            recursive: false,
            follow_symlinks: true,
            skip_backups: true,
            min_file_size: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocalScanner {
    pub config: LocalScannerConfig,
    metadata: ProjectMetadata,
}

impl LocalScanner {
    pub fn new(config: LocalScannerConfig, metadata: ProjectMetadata) -> Self {
        Self { config, metadata }
    }

    /// Recorre `root`, decodifica cada `.als` y devuelve los registros candidatos.
    #[instrument(level = Level::INFO, skip(self), fields(root = %root.display()))]
    pub async fn scan(&self, root: &Path) -> Result<ScanReport, ScanError> {
        let root = open_root(root)?;

        let cfg = self.config.clone();
        let walk_root = root.clone();
        let Discovery {
            files,
            mut failures,
            skipped,
        } = tokio::task::spawn_blocking(move || discover(&walk_root, &cfg)).await?;

        info!(candidates = files.len(), "Recorrido completado, decodificando proyectos...");

        let (records, decode_failures) = self.metadata.process(files).await;
        failures.extend(decode_failures);

        Ok(ScanReport {
            root,
            records,
            failures,
            skipped,
        })
    }
}

/// Canonicaliza la raíz y comprueba que se puede listar.
pub fn open_root(root: &Path) -> Result<PathBuf, ScanError> {
    let unreadable = |source| ScanError::DirectoryUnreadable {
        path: root.to_path_buf(),
        source,
    };

    let canonical = dunce::canonicalize(root).map_err(unreadable)?;
    if !fs::metadata(&canonical).map_err(unreadable)?.is_dir() {
        return Err(ScanError::NotADirectory(canonical));
    }
    fs::read_dir(&canonical).map_err(unreadable)?;

    Ok(canonical)
}

/// Lo que encuentra [`discover`] antes de decodificar nada.
#[derive(Debug, Default)]
pub struct Discovery {
    pub files: Vec<ProjectFile>,
    pub failures: Vec<ScanFailure>,
    pub skipped: Vec<PathBuf>,
}

enum Candidate {
    File(ProjectFile),
    Skipped,
    Failed(FileIssue),
}

/// Recorrido síncrono de `root`. Los errores por entrada se acumulan.
///
/// Cada ruta es su propio candidato, aunque apunte al mismo inodo que otra
/// (hardlinks, enlaces simbólicos). Los bucles de enlaces los corta `walkdir`.
pub fn discover(root: &Path, cfg: &LocalScannerConfig) -> Discovery {
    let max_depth = if cfg.recursive { usize::MAX } else { 1 };
    let skip_backups = cfg.skip_backups;

    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(cfg.follow_symlinks)
        .into_iter()
        .filter_entry(move |de| !(skip_backups && is_backup_dir(de)));

    let mut found = Discovery::default();

    for next in walker {
        match next {
            Ok(de) => match should_process_file(cfg, &de) {
                Some(Candidate::File(file)) => found.files.push(file),
                Some(Candidate::Skipped) => found.skipped.push(de.path().to_path_buf()),
                Some(Candidate::Failed(issue)) => found.failures.push(ScanFailure {
                    path: de.path().to_path_buf(),
                    issue,
                }),
                None => {}
            },
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                warn!(path = %path.display(), error = %e, "walkdir error");
                found.failures.push(ScanFailure {
                    path,
                    issue: FileIssue::Walk(e.to_string()),
                });
            }
        }
    }

    found
}

fn is_backup_dir(de: &DirEntry) -> bool {
    de.depth() > 0 && de.file_type().is_dir() && de.file_name() == BACKUP_DIR
}

fn should_process_file(cfg: &LocalScannerConfig, de: &DirEntry) -> Option<Candidate> {
    if de.file_type().is_dir() {
        return None;
    }

    let path = de.path();
    let ext = path.extension().and_then(OsStr::to_str)?;
    let extension = SupportedExtension::from_str(ext).ok()?;

    if !cfg.follow_symlinks && de.path_is_symlink() {
        debug!(path = %path.display(), "Enlace simbólico sin seguir, se omite");
        return Some(Candidate::Skipped);
    }

    if path.to_str().is_none() {
        warn!(path = %path.display(), "Ruta no UTF-8, se omite");
        return Some(Candidate::Failed(FileIssue::NonUtf8Path));
    }

    let md = match fs::metadata(path) {
        Ok(md) => md,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "No se pudieron leer los atributos");
            return Some(Candidate::Failed(FileIssue::Unreadable(e.to_string())));
        }
    };

    if !md.is_file() {
        return None;
    }

    let min_size = cfg.min_file_size.unwrap_or(extension.config().min_file_size);
    if md.len() < min_size.as_u64() {
        debug!(path = %path.display(), size = md.len(), "Fichero demasiado pequeño, se omite");
        return Some(Candidate::Skipped);
    }

    Some(Candidate::File(ProjectFile {
        path: path.to_path_buf(),
        extension,
        size_bytes: md.len(),
        created_at: md.created().ok().map(DateTime::<Utc>::from),
        modified_at: md.modified().ok().map(DateTime::<Utc>::from),
    }))
}
