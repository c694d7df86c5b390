//! Required-input checks run before a build starts

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// A base directory plus the file names a stage cannot run without
#[derive(Debug, Clone)]
pub struct IoConfig {
    pub base_path: PathBuf,
    pub required_input_files: Vec<PathBuf>,
}

impl IoConfig {
    pub fn new<P: AsRef<Path>>(base_path: P, required_input_files: &[&str]) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            required_input_files: required_input_files.iter().map(PathBuf::from).collect(),
        }
    }

    pub fn path_of(&self, file_name: &str) -> PathBuf {
        self.base_path.join(file_name)
    }

    /// Returns every required file that is missing or not a regular file.
    pub fn missing_files(&self) -> Vec<PathBuf> {
        self.required_input_files
            .iter()
            .map(|name| self.base_path.join(name))
            .filter(|path| {
                let ok = path.is_file();
                if !ok {
                    tracing::warn!(path = %path.display(), "Missing/Broken File");
                }
                !ok
            })
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        let missing = self.missing_files();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingFiles(missing))
        }
    }
}
