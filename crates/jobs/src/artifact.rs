//! Durable storage of report artifacts.

use std::fs;
use std::io;
use std::path::PathBuf;

use buildvault_core::BuildId;

pub const REPORT_PREFIX: &str = "build-report";
pub const REPORT_EXTENSION: &str = "txt";

/// Destination of rendered reports.
///
/// The path of a build's report depends only on the build id, so re-running
/// a job overwrites the previous artifact.
pub trait ArtifactStore: Send + Sync {
    fn path_for(&self, build_id: BuildId) -> PathBuf;

    /// Write `contents` for `build_id`; returns the artifact path.
    fn write(&self, build_id: BuildId, contents: &str) -> io::Result<PathBuf>;
}

/// Writes `<dir>/build-report-<id>.txt`, creating `dir` on demand.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    dir: PathBuf,
}

impl FsArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ArtifactStore for FsArtifactStore {
    fn path_for(&self, build_id: BuildId) -> PathBuf {
        self.dir
            .join(format!("{}-{}.{}", REPORT_PREFIX, build_id, REPORT_EXTENSION))
    }

    fn write(&self, build_id: BuildId, contents: &str) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(build_id);
        fs::write(&path, contents)?;
        Ok(path)
    }
}
