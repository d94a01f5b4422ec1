//! Model artifacts on disk

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::InferenceError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Image,
    Tabular,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Image => "image",
            ModelKind::Tabular => "tabular",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Model metadata, fixed at load time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub name: String,
    pub kind: ModelKind,
    pub path: String,
    pub sha256: String,
    pub size_bytes: u64,
    pub loaded_at: DateTime<Utc>,
}

impl ModelMetadata {
    pub fn from_bytes(kind: ModelKind, path: &str, bytes: &[u8]) -> Self {
        let name = Path::new(path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(path)
            .to_string();

        Self {
            name,
            kind,
            path: path.to_string(),
            sha256: sha256_hex(bytes),
            size_bytes: bytes.len() as u64,
            loaded_at: Utc::now(),
        }
    }
}

/// Artifact bytes plus the metadata derived from them
pub struct Artifact {
    pub bytes: Vec<u8>,
    pub metadata: ModelMetadata,
}

/// Read a model artifact and checksum it
pub fn read_artifact(path: &Path, kind: ModelKind) -> Result<Artifact, InferenceError> {
    if !path.exists() {
        return Err(InferenceError::ArtifactNotFound(path.display().to_string()));
    }

    let bytes = std::fs::read(path)?;
    let metadata = ModelMetadata::from_bytes(kind, &path.display().to_string(), &bytes);

    tracing::info!(
        kind = %kind,
        path = %metadata.path,
        sha256 = %metadata.sha256,
        size_bytes = metadata.size_bytes,
        "Read model artifact"
    );

    Ok(Artifact { bytes, metadata })
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
