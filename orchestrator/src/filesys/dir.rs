//! Directory of job files

use std::path::{Component, Path, PathBuf};

use tokio::fs;

use crate::errors::OrchestratorError;
use crate::filesys::file::File;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dir {
    path: PathBuf,
}

impl Dir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Create the directory and its parents
    pub async fn create(&self) -> Result<(), OrchestratorError> {
        fs::create_dir_all(&self.path).await?;
        Ok(())
    }

    /// File directly inside this directory
    ///
    /// `None` unless `name` is a single plain path component, so a name can
    /// never reach outside the directory.
    pub fn entry(&self, name: &str) -> Option<File> {
        let mut components = Path::new(name).components();
        let plain = matches!(components.next(), Some(Component::Normal(_)))
            && components.next().is_none()
            && !name.contains(['/', '\\']);
        plain.then(|| File::new(self.path.join(name)))
    }

    /// Regular files whose extension is one of `extensions`, sorted by name
    pub async fn files_with_extension(
        &self,
        extensions: &[&str],
    ) -> Result<Vec<File>, OrchestratorError> {
        let mut files = Vec::new();
        let mut entries = fs::read_dir(&self.path).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let matches = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| extensions.contains(&ext));
            if matches && entry.file_type().await?.is_file() {
                files.push(path);
            }
        }

        files.sort();
        Ok(files.into_iter().map(File::new).collect())
    }
}
