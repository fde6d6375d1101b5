use std::io;
use std::path::{Component, Path, PathBuf};

use chrono::{NaiveDate, Utc};
use tokio::fs;
use uuid::Uuid;

/// Local directory store. Paths handed out and accepted are relative to `root`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `<YYYY-MM-DD>/project_<id>` for today's date.
    pub fn project_dir(project_id: Uuid) -> String {
        Self::project_dir_on(Utc::now().date_naive(), project_id)
    }

    pub fn project_dir_on(date: NaiveDate, project_id: Uuid) -> String {
        format!("{}/project_{}", date.format("%Y-%m-%d"), project_id)
    }

    /// Joins a stored relative path onto the root. Anything that would climb out of
    /// the root is rejected.
    pub fn resolve(&self, relative: &str) -> io::Result<PathBuf> {
        let rel = Path::new(relative);
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if relative.is_empty() || escapes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("refusing path outside the store: {relative}"),
            ));
        }
        Ok(self.root.join(rel))
    }

    /// Writes `bytes` as `<dir>/<name>` and returns the relative path.
    pub async fn write(&self, dir: &str, name: &str, bytes: &[u8]) -> io::Result<String> {
        let relative = format!("{dir}/{name}");
        let path = self.resolve(&relative)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, bytes).await?;
        Ok(relative)
    }

    pub async fn read(&self, relative: &str) -> io::Result<Vec<u8>> {
        fs::read(self.resolve(relative)?).await
    }

    pub async fn open(&self, relative: &str) -> io::Result<fs::File> {
        fs::File::open(self.resolve(relative)?).await
    }

    pub async fn exists(&self, relative: &str) -> bool {
        match self.resolve(relative) {
            Ok(path) => fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Removes a stored file. A file that is already gone counts as removed.
    pub async fn remove(&self, relative: &str) -> io::Result<()> {
        match fs::remove_file(self.resolve(relative)?).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}
