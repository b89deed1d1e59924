use bytesize::ByteSize;
use serde::{Deserialize, Serialize};

/// Restricciones por tipo de fichero
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtensionConfig {
    pub min_file_size: ByteSize,
}

impl ExtensionConfig {
    /// Sin mínimo: hasta un `.als` vacío se cataloga (sin tempo).
    pub const ALS: ExtensionConfig = ExtensionConfig {
        min_file_size: ByteSize::b(0),
    };
}

/// Extensiones soportadas
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SupportedExtension {
    /// Ableton Live Set
    Als,
}

impl SupportedExtension {
    pub const ALL: &'static [SupportedExtension] = &[SupportedExtension::Als];

    pub fn as_str(&self) -> &'static str {
        match self {
            SupportedExtension::Als => "als",
        }
    }

    pub fn config(&self) -> &'static ExtensionConfig {
        match self {
            SupportedExtension::Als => &ExtensionConfig::ALS,
        }
    }
}

impl std::str::FromStr for SupportedExtension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        SupportedExtension::ALL
            .iter()
            .find(|ext| ext.as_str() == lower)
            .cloned()
            .ok_or_else(|| format!("Extension not supported: {}", s))
    }
}

impl std::fmt::Display for SupportedExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
