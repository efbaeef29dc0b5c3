//! Many independent registrations from one manifest, run in parallel.
//!
//! ```toml
//! [[pair]]
//! name = "subject-01"
//! moving = "rolled/01.png"
//! fixed = "plain/01.png"
//! points = [10, 10, 20, 20, 110, 10, 20, 120]
//! ```
//!
//! Relative image paths resolve against the manifest's directory.

use crate::config::Config;
use crate::error::{RegistrationError, Result};
use crate::raster::RasterOps;
use crate::registration::{RegistrationInput, Registrator};
use crate::report::{self, OutputOptions};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchPair {
    pub name: String,
    pub moving: PathBuf,
    pub fixed: PathBuf,
    pub points: Vec<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchManifest {
    #[serde(default, rename = "pair")]
    pub pairs: Vec<BatchPair>,
}

impl BatchManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| RegistrationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut manifest: Self = toml::from_str(&content).map_err(|e| {
            RegistrationError::input(format!("invalid manifest {}: {e}", path.display()))
        })?;
        if let Some(base) = path.parent() {
            manifest.resolve_relative_to(base);
        }
        Ok(manifest)
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        for pair in &mut self.pairs {
            for image in [&mut pair.moving, &mut pair.fixed] {
                if image.is_relative() {
                    *image = base.join(&*image);
                }
            }
        }
    }
}

/// Result of one manifest entry
#[derive(Debug)]
pub struct BatchOutcome {
    pub name: String,
    pub result: Result<Vec<PathBuf>>,
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Register every pair on the rayon pool, writing each pair's outputs to
/// `output_dir/<name>`. A failing pair does not stop the others.
pub fn run_batch(
    manifest: &BatchManifest,
    output_dir: &Path,
    config: &Config,
    options: OutputOptions,
    raster: Arc<dyn RasterOps>,
) -> Vec<BatchOutcome> {
    let outcomes: Vec<BatchOutcome> = manifest
        .pairs
        .par_iter()
        .map(|pair| {
            crate::logging::new_correlation_id();
            let result = register_pair(pair, output_dir, config, options, Arc::clone(&raster));
            if let Err(ref e) = result {
                warn!(pair = %pair.name, error = %e, "Skipping pair");
            }
            crate::logging::clear_correlation_id();
            BatchOutcome {
                name: pair.name.clone(),
                result,
            }
        })
        .collect();

    let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
    info!(
        total = outcomes.len(),
        succeeded,
        failed = outcomes.len() - succeeded,
        "Batch finished"
    );
    outcomes
}

fn register_pair(
    pair: &BatchPair,
    output_dir: &Path,
    config: &Config,
    options: OutputOptions,
    raster: Arc<dyn RasterOps>,
) -> Result<Vec<PathBuf>> {
    let input = RegistrationInput::from_paths(&pair.moving, &pair.fixed, &pair.points)?;
    let mut registrator = Registrator::new(input, config).with_raster(raster);
    registrator.perform_registration()?;
    report::write_outputs(&registrator, &output_dir.join(&pair.name), options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_manifest_resolves_relative_paths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("batch.toml");
        std::fs::write(
            &path,
            "[[pair]]\nname = \"a\"\nmoving = \"m.png\"\nfixed = \"/abs/f.png\"\npoints = [1, 2, 3, 4, 5, 6, 7, 8]\n",
        )
        .unwrap();

        let manifest = BatchManifest::load(&path).unwrap();
        assert_eq!(manifest.pairs.len(), 1);
        assert_eq!(manifest.pairs[0].moving, dir.path().join("m.png"));
        assert_eq!(manifest.pairs[0].fixed, PathBuf::from("/abs/f.png"));
    }

    #[test]
    fn test_malformed_manifest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("batch.toml");
        std::fs::write(&path, "[[pair]]\nname = 3\n").unwrap();
        assert!(matches!(
            BatchManifest::load(&path).unwrap_err(),
            RegistrationError::InputValidation(_)
        ));
    }
}
