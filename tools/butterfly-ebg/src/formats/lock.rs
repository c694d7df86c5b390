///! ebg.lock.json - digests and counts of one factory run

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use crate::ebg::TurnStats;

pub const LOCK_FILE: &str = "ebg.lock.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub sha256: String,
    pub records: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EbgLockFile {
    /// SHA-256 of the network snapshot the graph was built from
    pub input_sha256: String,
    pub files: BTreeMap<String, FileEntry>,
    pub number_of_segments: u32,
    pub number_of_duplicates: u32,
    pub number_of_nodes: u64,
    pub number_of_edges: u64,
    pub stats: TurnStats,
    pub build_time_ms: u64,
    pub created_at_utc: String,
}

impl EbgLockFile {
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        serde_json::from_reader(file).with_context(|| format!("parsing {}", path.display()))
    }

    /// Recomputes every file digest under `outdir` and compares it with the
    /// recorded one.
    pub fn verify_digests<P: AsRef<Path>>(&self, outdir: P) -> Result<()> {
        for (name, entry) in &self.files {
            let actual = compute_file_sha256(outdir.as_ref().join(name))?;
            anyhow::ensure!(
                actual == entry.sha256,
                "SHA-256 mismatch for {}: expected {}, found {}",
                name,
                entry.sha256,
                actual
            );
        }
        Ok(())
    }
}

/// Compute SHA-256 of a file as lowercase hex
pub fn compute_file_sha256<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_roundtrip_and_digest_check() -> Result<()> {
        let dir = TempDir::new()?;
        std::fs::write(dir.path().join("ebg.edges"), b"edges")?;

        let mut files = BTreeMap::new();
        files.insert(
            "ebg.edges".to_string(),
            FileEntry {
                sha256: compute_file_sha256(dir.path().join("ebg.edges"))?,
                records: 0,
            },
        );
        let lock = EbgLockFile {
            input_sha256: String::new(),
            files,
            number_of_segments: 4,
            number_of_duplicates: 1,
            number_of_nodes: 5,
            number_of_edges: 0,
            stats: TurnStats::default(),
            build_time_ms: 3,
            created_at_utc: chrono::Utc::now().to_rfc3339(),
        };
        lock.write(dir.path().join(LOCK_FILE))?;

        let loaded = EbgLockFile::read(dir.path().join(LOCK_FILE))?;
        assert_eq!(loaded.number_of_nodes, 5);
        assert_eq!(loaded.files, lock.files);
        loaded.verify_digests(dir.path())?;

        std::fs::write(dir.path().join("ebg.edges"), b"tampered")?;
        assert!(loaded.verify_digests(dir.path()).is_err());
        Ok(())
    }

    #[test]
    fn test_known_digest() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("empty");
        std::fs::write(&path, b"")?;
        assert_eq!(
            compute_file_sha256(&path)?,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        Ok(())
    }
}
