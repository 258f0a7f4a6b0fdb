//! Storage layout configuration

use std::path::PathBuf;

use crate::errors::OrchestratorError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// Default locations derived from one base directory
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for all storage
    pub base_dir: PathBuf,
}

impl StorageLayout {
    /// Create a new storage layout
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Get the settings file path
    pub fn settings_file(&self) -> File {
        File::new(self.base_dir.join("settings.json"))
    }

    /// Job template directory
    pub fn jobs_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("jobs"))
    }

    /// Record store snapshot
    pub fn state_file(&self) -> File {
        File::new(self.base_dir.join("state").join("records.json"))
    }

    /// Get the logs directory
    pub fn logs_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("logs"))
    }

    /// Setup the storage layout (create directories)
    pub async fn setup(&self) -> Result<(), OrchestratorError> {
        self.jobs_dir().create().await?;
        self.logs_dir().create().await?;
        Dir::new(self.base_dir.join("state")).create().await?;
        Ok(())
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        #[cfg(target_os = "linux")]
        let base_dir = PathBuf::from("/var/lib/svcorch");

        #[cfg(not(target_os = "linux"))]
        let base_dir = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".svcorch");

        Self::new(base_dir)
    }
}
