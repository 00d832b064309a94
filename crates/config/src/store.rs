//! Persistence of the configuration document.

use std::{path::PathBuf, sync::Mutex};

use {
    anyhow::{Context, Result},
    async_trait::async_trait,
    tokio::fs,
    tracing::debug,
};

use crate::{
    loader::{parse_config, serialize_config},
    schema::SyncConfig,
};

/// Persistence backend for the configuration document.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Load the document; a missing document yields the defaults.
    async fn load(&self) -> Result<SyncConfig>;
    async fn save(&self, config: &SyncConfig) -> Result<()>;
}

/// File-backed store; the format follows the file extension.
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the first existing standard location, or the default TOML path.
    pub fn discover() -> Self {
        Self::new(crate::loader::find_or_default_config_path())
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn load(&self) -> Result<SyncConfig> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            debug!(path = %self.path.display(), "no config file, using defaults");
            return Ok(SyncConfig::default());
        }
        let raw = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        parse_config(&raw, &self.path)
    }

    /// Atomic write: serialize to a temp file, then rename over the target.
    async fn save(&self, config: &SyncConfig) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }
        let raw = serialize_config(config, &self.path)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, raw).await?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        debug!(path = %self.path.display(), "saved config");
        Ok(())
    }
}

/// In-memory store. No persistence; counts saves so callers can assert on them.
#[derive(Default)]
pub struct MemoryConfigStore {
    config: Mutex<SyncConfig>,
    saves: Mutex<usize>,
}

impl MemoryConfigStore {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config: Mutex::new(config),
            saves: Mutex::new(0),
        }
    }

    pub fn snapshot(&self) -> SyncConfig {
        self.config
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn load(&self) -> Result<SyncConfig> {
        Ok(self.snapshot())
    }

    async fn save(&self, config: &SyncConfig) -> Result<()> {
        *self.config.lock().unwrap_or_else(|e| e.into_inner()) = config.clone();
        *self.saves.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }
}
