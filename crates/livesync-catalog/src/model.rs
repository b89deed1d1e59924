use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Una fila del catálogo: un fichero `.als`, identificado por su ruta absoluta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub path: PathBuf,
    pub name: String,

    // --- Derivados: se recalculan en cada escaneo ---
    pub size_bytes: u64,
    pub tempo_bpm: Option<f64>,
    pub live_version: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,

    // --- Anotaciones del usuario: el escaneo nunca las toca ---
    pub annotations: Annotations,
}

impl ProjectRecord {
    /// Registro vacío para `path`, con el nombre sacado del último componente.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        ProjectRecord {
            name: display_name(&path),
            path,
            size_bytes: 0,
            tempo_bpm: None,
            live_version: None,
            created_at: None,
            modified_at: None,
            annotations: Annotations::default(),
        }
    }

    /// Copia de `self` con los campos derivados de `scanned` y las anotaciones propias.
    pub fn refreshed_from(&self, scanned: &ProjectRecord) -> ProjectRecord {
        ProjectRecord {
            path: self.path.clone(),
            name: scanned.name.clone(),
            size_bytes: scanned.size_bytes,
            tempo_bpm: scanned.tempo_bpm,
            live_version: scanned.live_version.clone(),
            created_at: scanned.created_at,
            modified_at: scanned.modified_at,
            annotations: self.annotations.clone(),
        }
    }

    /// `true` si ningún campo derivado difiere entre ambos registros.
    pub fn same_derived(&self, other: &ProjectRecord) -> bool {
        self.name == other.name
            && self.size_bytes == other.size_bytes
            && self.tempo_bpm == other.tempo_bpm
            && self.live_version == other.live_version
            && self.created_at == other.created_at
            && self.modified_at == other.modified_at
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned()
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Annotations {
    pub genre: String,
    pub status: String,
    pub key: String,
    pub grade: String,
    pub release_date: Option<NaiveDate>,
}

impl Annotations {
    /// Aplica una edición. Un valor vacío (o solo espacios) limpia el campo.
    pub fn set(&mut self, field: AnnotationField, value: &str) -> Result<(), AnnotationError> {
        let value = value.trim();

        match field {
            AnnotationField::Genre => self.genre = value.to_owned(),
            AnnotationField::Status => self.status = value.to_owned(),
            AnnotationField::Key => self.key = value.to_owned(),
            AnnotationField::Grade => self.grade = value.to_owned(),
            AnnotationField::ReleaseDate if value.is_empty() => self.release_date = None,
            AnnotationField::ReleaseDate => {
                let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
                    .map_err(|_| AnnotationError::InvalidDate(value.to_owned()))?;
                self.release_date = Some(date);
            }
        }

        Ok(())
    }

    pub fn get(&self, field: AnnotationField) -> Option<String> {
        let text = match field {
            AnnotationField::Genre => &self.genre,
            AnnotationField::Status => &self.status,
            AnnotationField::Key => &self.key,
            AnnotationField::Grade => &self.grade,
            AnnotationField::ReleaseDate => {
                return self.release_date.map(|d| d.format("%Y-%m-%d").to_string());
            }
        };
        (!text.is_empty()).then(|| text.clone())
    }
}

/// Campos que el usuario puede editar desde la capa de presentación.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationField {
    Genre,
    Status,
    Key,
    Grade,
    ReleaseDate,
}

impl AnnotationField {
    pub const ALL: &'static [AnnotationField] = &[
        AnnotationField::Genre,
        AnnotationField::Status,
        AnnotationField::Key,
        AnnotationField::Grade,
        AnnotationField::ReleaseDate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnnotationField::Genre => "genre",
            AnnotationField::Status => "status",
            AnnotationField::Key => "key",
            AnnotationField::Grade => "grade",
            AnnotationField::ReleaseDate => "release_date",
        }
    }
}

impl FromStr for AnnotationField {
    type Err = AnnotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        AnnotationField::ALL
            .iter()
            .find(|f| f.as_str() == lower)
            .copied()
            .ok_or_else(|| AnnotationError::UnknownField(s.to_owned()))
    }
}

impl fmt::Display for AnnotationField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnnotationError {
    #[error("unknown annotation field: {0}")]
    UnknownField(String),

    #[error("invalid release date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),
}
