use std::{
    io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use thiserror::Error;
use tokio::{fs, sync::RwLock};

use crate::models::reminder::Reminder;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

/// Whole-collection persistence. There is no incremental log: every save
/// replaces the previous snapshot.
#[async_trait]
pub trait SnapshotStorage: Send + Sync {
    /// Never fails. A missing or unreadable snapshot yields an empty collection.
    async fn load(&self) -> Vec<Reminder>;
    async fn save(&self, reminders: &[Reminder]) -> Result<(), SnapshotError>;
}

pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut file_name = self.path.file_name().unwrap_or_default().to_os_string();
        file_name.push(".tmp");
        self.path.with_file_name(file_name)
    }
}

#[async_trait]
impl SnapshotStorage for JsonFileStorage {
    async fn load(&self) -> Vec<Reminder> {
        let content = match fs::read(&self.path).await {
            Ok(content) => content,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                log::info!(
                    "No reminder snapshot found, starting empty. [path = {}]",
                    self.path.display()
                );
                return Vec::new();
            }
            Err(error) => {
                log::warn!(
                    "Could not read reminder snapshot, starting empty. [path = {}, error = {}]",
                    self.path.display(),
                    error
                );
                return Vec::new();
            }
        };

        match serde_json::from_slice::<Vec<Reminder>>(&content) {
            Ok(reminders) => {
                log::info!(
                    "Loaded {} reminders. [path = {}]",
                    reminders.len(),
                    self.path.display()
                );
                reminders
            }
            Err(error) => {
                log::warn!(
                    "Reminder snapshot is corrupt, starting empty. [path = {}, error = {}]",
                    self.path.display(),
                    error
                );
                Vec::new()
            }
        }
    }

    async fn save(&self, reminders: &[Reminder]) -> Result<(), SnapshotError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(reminders)?;
        let temp_path = self.temp_path();
        fs::write(&temp_path, json).await?;
        fs::rename(&temp_path, &self.path).await?;

        log::debug!(
            "Saved {} reminders. [path = {}]",
            reminders.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemorySnapshotStorage {
    snapshot: RwLock<Vec<Reminder>>,
}

impl InMemorySnapshotStorage {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_reminders(reminders: Vec<Reminder>) -> Self {
        Self {
            snapshot: RwLock::new(reminders),
        }
    }

    pub async fn snapshot(&self) -> Vec<Reminder> {
        self.snapshot.read().await.clone()
    }
}

#[async_trait]
impl SnapshotStorage for InMemorySnapshotStorage {
    async fn load(&self) -> Vec<Reminder> {
        self.snapshot().await
    }

    async fn save(&self, reminders: &[Reminder]) -> Result<(), SnapshotError> {
        *self.snapshot.write().await = reminders.to_vec();
        Ok(())
    }
}
