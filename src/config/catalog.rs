//! Flow catalog location configuration

use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::error::ValidationError;

/// Flow catalog configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    /// Directory holding the catalog documents (flows, apis, rulesets, prompts, scripts)
    #[serde(default = "default_dir")]
    pub dir: PathBuf,
}

impl CatalogConfig {
    /// Path to the catalog directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Validate catalog configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.dir.is_dir() {
            return Err(ValidationError::CatalogDirMissing(
                self.dir.display().to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self { dir: default_dir() }
    }
}

fn default_dir() -> PathBuf {
    PathBuf::from("catalog")
}
