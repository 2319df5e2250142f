//! Generic model artifacts
//!
//! Serialization of trained models to an opaque same-ecosystem binary file:
//! magic bytes, a format version, descriptive metadata, the bincode-encoded
//! model payload, and an integrity checksum. An artifact written by this
//! crate is only guaranteed readable by a compatible version of this crate;
//! cross-version compatibility is out of scope. For a cross-ecosystem
//! representation see the [`graph`](crate::graph) module.

use crate::error::{ModelPortError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Descriptive metadata stored alongside the model payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model name
    pub name: String,
    /// Producing crate version
    pub version: String,
    /// Model type tag (e.g. "tabular_classifier")
    pub model_type: String,
    /// Feature names, in schema order
    pub feature_names: Vec<String>,
    /// Target name
    pub target_name: String,
    /// Hyperparameters used at fit time
    pub hyperparameters: HashMap<String, String>,
    /// Rows actually fitted on (after drops/deduplication)
    pub n_training_rows: Option<usize>,
}

impl Default for ModelMetadata {
    fn default() -> Self {
        Self {
            name: "model".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            model_type: "unknown".to_string(),
            feature_names: Vec::new(),
            target_name: "target".to_string(),
            hyperparameters: HashMap::new(),
            n_training_rows: None,
        }
    }
}

impl ModelMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_model_type(mut self, model_type: impl Into<String>) -> Self {
        self.model_type = model_type.into();
        self
    }

    pub fn with_features(mut self, features: Vec<String>) -> Self {
        self.feature_names = features;
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_name = target.into();
        self
    }

    pub fn with_training_rows(mut self, n: usize) -> Self {
        self.n_training_rows = Some(n);
        self
    }

    pub fn add_hyperparameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.hyperparameters.insert(key.into(), value.into());
        self
    }

    /// Human-readable JSON rendering, for logs and inspection.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// On-disk artifact envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedArtifact {
    /// Magic bytes for format detection
    pub magic: [u8; 4],
    /// Format version
    pub format_version: u32,
    /// Model metadata
    pub metadata: ModelMetadata,
    /// bincode-encoded model payload
    pub payload: Vec<u8>,
    /// FNV-1a checksum of the payload
    pub checksum: u64,
}

impl SerializedArtifact {
    const MAGIC: [u8; 4] = *b"MPRT";
    const VERSION: u32 = 1;

    pub fn new(metadata: ModelMetadata, payload: Vec<u8>) -> Self {
        let checksum = Self::compute_checksum(&payload);
        Self {
            magic: Self::MAGIC,
            format_version: Self::VERSION,
            metadata,
            payload,
            checksum,
        }
    }

    fn compute_checksum(data: &[u8]) -> u64 {
        const FNV_OFFSET: u64 = 14695981039346656037;
        const FNV_PRIME: u64 = 1099511628211;

        let mut hash = FNV_OFFSET;
        for byte in data {
            hash ^= *byte as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        hash
    }

    pub fn verify_checksum(&self) -> bool {
        Self::compute_checksum(&self.payload) == self.checksum
    }

    fn validate(&self) -> Result<()> {
        if self.magic != Self::MAGIC {
            return Err(ModelPortError::Serialization(
                "not a model artifact (bad magic bytes)".to_string(),
            ));
        }
        if self.format_version > Self::VERSION {
            return Err(ModelPortError::Serialization(format!(
                "artifact format version {} is newer than supported version {}",
                self.format_version,
                Self::VERSION
            )));
        }
        if !self.verify_checksum() {
            return Err(ModelPortError::Serialization(
                "checksum verification failed, file may be corrupted".to_string(),
            ));
        }
        Ok(())
    }
}

/// Serialize a model and write it as an artifact file.
///
/// The file handle is scoped to this call: the buffered writer is flushed
/// and dropped before returning.
pub fn save_model<M: Serialize>(
    model: &M,
    path: impl AsRef<Path>,
    metadata: ModelMetadata,
) -> Result<()> {
    let payload = bincode::serialize(model)
        .map_err(|e| ModelPortError::Serialization(format!("failed to serialize model: {e}")))?;
    let artifact = SerializedArtifact::new(metadata, payload);

    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    bincode::serialize_into(&mut writer, &artifact)
        .map_err(|e| ModelPortError::Serialization(format!("failed to write artifact: {e}")))?;
    writer.flush()?;

    info!(path = %path.as_ref().display(), "Saved model artifact");
    Ok(())
}

/// Read an artifact file and reconstruct the model it holds.
pub fn load_model<M: for<'de> Deserialize<'de>>(
    path: impl AsRef<Path>,
) -> Result<(M, ModelMetadata)> {
    let file = File::open(path.as_ref())?;
    let reader = BufReader::new(file);

    let artifact: SerializedArtifact = bincode::deserialize_from(reader)
        .map_err(|e| ModelPortError::Serialization(format!("failed to read artifact: {e}")))?;
    artifact.validate()?;

    let model: M = bincode::deserialize(&artifact.payload)
        .map_err(|e| ModelPortError::Serialization(format!("failed to decode model: {e}")))?;

    info!(
        path = %path.as_ref().display(),
        model_type = %artifact.metadata.model_type,
        "Loaded model artifact"
    );
    Ok((model, artifact.metadata))
}
