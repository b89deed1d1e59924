//! Decodificador de Ableton Live Sets (`.als`).
//!
//! Un `.als` es un documento XML envuelto en gzip. El decodificador quita la
//! envoltura, recorre el XML y extrae el tempo del set junto con la versión de
//! Live que lo escribió. No hace I/O: recibe los bytes ya leídos, así que se
//! puede llamar en paralelo para ficheros distintos sin estado compartido.

mod document;

use std::{borrow::Cow, io::Read};

use flate2::read::GzDecoder;
use thiserror::Error;

pub use document::TEMPO_PATHS;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const UTF8_BOM: [u8; 3] = [0xef, 0xbb, 0xbf];

/// Metadatos recuperados de un Live Set. Efímeros: el escáner los vuelca en
/// un [`ProjectRecord`](crate::model::ProjectRecord).
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMetadata {
    pub tempo_bpm: f64,
    /// Atributo `Creator` de la raíz, p. ej. `Ableton Live 11.3.4`.
    pub creator: Option<String>,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DecodeError {
    #[error("corrupt compression envelope: {0}")]
    CorruptCompression(String),

    #[error("malformed document: {0}")]
    MalformedDocument(String),

    #[error("field not found: {0}")]
    FieldNotFound(&'static str),

    #[error("invalid value for {field}: {value:?}")]
    InvalidValue { field: &'static str, value: String },
}

/// Decodifica los bytes crudos de un `.als`.
pub fn decode(bytes: &[u8]) -> Result<DecodedMetadata, DecodeError> {
    let xml = strip_envelope(bytes)?;
    document::extract(&xml)
}

/// Quita la envoltura gzip. Acepta también XML sin comprimir (sets guardados
/// a mano o por herramientas de terceros).
fn strip_envelope(bytes: &[u8]) -> Result<Cow<'_, [u8]>, DecodeError> {
    if bytes.starts_with(&GZIP_MAGIC) {
        let mut xml = Vec::new();
        GzDecoder::new(bytes)
            .read_to_end(&mut xml)
            .map_err(|e| DecodeError::CorruptCompression(e.to_string()))?;
        return Ok(Cow::Owned(xml));
    }

    let body = bytes.strip_prefix(&UTF8_BOM).unwrap_or(bytes);
    match body.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'<') => Ok(Cow::Borrowed(body)),
        Some(_) => Err(DecodeError::CorruptCompression(
            "unrecognized envelope, expected gzip".into(),
        )),
        None => Err(DecodeError::CorruptCompression("empty file".into())),
    }
}
