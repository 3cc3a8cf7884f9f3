//! Write-to-temp-then-rename.
//!
//! Every file the cache exposes is created next to its final path under a
//! temporary name and renamed into place once fully written. Readers and
//! concurrent processes never observe a half-written file.

use crate::GraphError;
use crate::transport::DownloadSink;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A file that becomes visible at `target` only on [`AtomicFile::commit`].
///
/// Dropping it without committing deletes the temporary file.
#[derive(Debug)]
pub struct AtomicFile {
    temp: NamedTempFile,
    target: PathBuf,
}

impl AtomicFile {
    /// Create a temporary file in the directory of `target`.
    pub fn create(target: impl Into<PathBuf>) -> Result<Self, GraphError> {
        let target = target.into();
        let dir = target.parent().unwrap_or_else(|| Path::new("."));
        let temp = NamedTempFile::new_in(dir).map_err(|e| GraphError::storage(dir, &e))?;
        Ok(Self { temp, target })
    }

    /// Final path of the file.
    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Flush, sync and rename into place.
    pub fn commit(mut self) -> Result<(), GraphError> {
        self.temp
            .flush()
            .map_err(|e| GraphError::storage(&self.target, &e))?;
        self.temp
            .as_file()
            .sync_all()
            .map_err(|e| GraphError::storage(&self.target, &e))?;
        let target = self.target;
        self.temp
            .persist(&target)
            .map_err(|e| GraphError::storage(&target, &e.error))?;
        Ok(())
    }
}

impl Write for AtomicFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.temp.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.temp.flush()
    }
}

impl DownloadSink for AtomicFile {
    fn target(&self) -> &Path {
        &self.target
    }
}

/// Atomically replace `target` with `bytes`.
pub fn write_atomic(target: &Path, bytes: &[u8]) -> Result<(), GraphError> {
    let mut file = AtomicFile::create(target)?;
    file.write_all(bytes)
        .map_err(|e| GraphError::storage(target, &e))?;
    file.commit()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncommitted_file_is_invisible() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("edges.tsv.gz");
        {
            let mut file = AtomicFile::create(&target).expect("create");
            file.write_all(b"partial").expect("write");
        }
        assert!(!target.exists());
        assert_eq!(std::fs::read_dir(dir.path()).expect("read_dir").count(), 0);
    }

    #[test]
    fn commit_replaces_existing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("marker");
        std::fs::write(&target, b"old").expect("seed");

        write_atomic(&target, b"new").expect("write");
        assert_eq!(std::fs::read(&target).expect("read"), b"new");
    }

    #[test]
    fn missing_directory_is_a_storage_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("absent").join("file");
        assert!(matches!(
            AtomicFile::create(&target),
            Err(GraphError::Storage { .. })
        ));
    }
}
