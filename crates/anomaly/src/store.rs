use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::baseline::Baseline;
use crate::types::FEATURE_DIM;

#[derive(Debug)]
pub enum BaselineStoreError {
    Io(std::io::Error),
    Serialize(String),
    Deserialize(String),
}

impl fmt::Display for BaselineStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io error: {}", err),
            Self::Serialize(msg) => write!(f, "serialize error: {}", msg),
            Self::Deserialize(msg) => write!(f, "deserialize error: {}", msg),
        }
    }
}

impl std::error::Error for BaselineStoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for BaselineStoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

pub type BaselineStoreResult<T> = std::result::Result<T, BaselineStoreError>;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreContents {
    baselines: HashMap<String, Baseline>,
}

/// Baselines for every observed binary identity (executable sha256),
/// read-heavy from scoring workers with occasional post-sample writes.
/// Persisted with bincode at the configured path.
#[derive(Debug)]
pub struct BaselineStore {
    contents: RwLock<StoreContents>,
    path: PathBuf,
}

impl BaselineStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            contents: RwLock::new(StoreContents::default()),
            path: path.into(),
        }
    }

    pub fn load_or_new(path: impl Into<PathBuf>) -> BaselineStoreResult<Self> {
        let path = path.into();
        if path.exists() {
            return Self::load(path);
        }
        Ok(Self::new(path))
    }

    pub fn load(path: impl Into<PathBuf>) -> BaselineStoreResult<Self> {
        let path = path.into();
        let bytes = std::fs::read(&path)?;
        let contents: StoreContents = bincode::deserialize(&bytes)
            .map_err(|err| BaselineStoreError::Deserialize(err.to_string()))?;
        Ok(Self {
            contents: RwLock::new(contents),
            path,
        })
    }

    pub fn save(&self) -> BaselineStoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let contents = self.contents.read().unwrap_or_else(|e| e.into_inner());
        let bytes = bincode::serialize(&*contents)
            .map_err(|err| BaselineStoreError::Serialize(err.to_string()))?;
        std::fs::write(&self.path, bytes)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of a binary's baseline for scoring. Cloning keeps the read
    /// lock hold time to microseconds; the matrices are small.
    pub fn get(&self, identity: &str) -> Option<Baseline> {
        let contents = self.contents.read().unwrap_or_else(|e| e.into_inner());
        contents.baselines.get(identity).cloned()
    }

    /// Fold a scored sample into the binary's baseline after scoring.
    pub fn update(&self, identity: &str, features: &[f64], event_kind_index: usize) {
        let mut contents = self.contents.write().unwrap_or_else(|e| e.into_inner());
        let baseline = contents
            .baselines
            .entry(identity.to_string())
            .or_insert_with(|| Baseline::new(FEATURE_DIM));
        if baseline.dims() == features.len() {
            baseline.update(features, event_kind_index);
        }
    }

    pub fn len(&self) -> usize {
        self.contents
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .baselines
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
