//! Progress persistence seam
//!
//! The engine never owns progress. A [`ProgressStore`] hands a consistent
//! [`UserProgress`] snapshot to a resolution pass and takes the updated record
//! back afterwards.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;

use crate::progress::UserProgress;

#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// `None` when the user has no saved progress yet.
    async fn load(&self, user_id: &str) -> Result<Option<UserProgress>>;

    async fn save(&self, user_id: &str, progress: &UserProgress) -> Result<()>;
}

// ── MemoryProgressStore ──

/// In-memory store for tests and single-process use.
pub struct MemoryProgressStore {
    inner: RwLock<HashMap<String, UserProgress>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryProgressStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn load(&self, user_id: &str) -> Result<Option<UserProgress>> {
        let store = self.inner.read().map_err(|e| anyhow!("Lock: {}", e))?;
        Ok(store.get(user_id).cloned())
    }

    async fn save(&self, user_id: &str, progress: &UserProgress) -> Result<()> {
        let mut store = self.inner.write().map_err(|e| anyhow!("Lock: {}", e))?;
        store.insert(user_id.to_string(), progress.clone());
        Ok(())
    }
}

// ── FileProgressStore ──

/// One `<user_id>.json` file per user under a directory.
#[derive(Debug, Clone)]
pub struct FileProgressStore {
    dir: PathBuf,
}

impl FileProgressStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, user_id: &str) -> Result<PathBuf> {
        let valid = !user_id.is_empty()
            && user_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            bail!("invalid user id '{}': use letters, digits, '-' or '_'", user_id);
        }
        Ok(self.dir.join(format!("{}.json", user_id)))
    }
}

#[async_trait]
impl ProgressStore for FileProgressStore {
    async fn load(&self, user_id: &str) -> Result<Option<UserProgress>> {
        let path = self.path_for(user_id)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", path.display()));
            }
        };
        let progress = serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(Some(progress))
    }

    async fn save(&self, user_id: &str, progress: &UserProgress) -> Result<()> {
        let path = self.path_for(user_id)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating {}", self.dir.display()))?;

        let json = serde_json::to_vec_pretty(progress)?;
        // Write a sibling, then rename over the target.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
                tracing::warn!(path = %tmp.display(), error = %cleanup, "stale temp file left behind");
            }
            return Err(e).with_context(|| format!("replacing {}", path.display()));
        }
        tracing::debug!(user = user_id, path = %path.display(), "progress saved");
        Ok(())
    }
}
