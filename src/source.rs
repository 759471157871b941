use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;

/// Something the user selected for a batch run. Only its size matters.
#[async_trait]
pub trait ItemSource: Send + Sync {
    fn describe(&self) -> String;
    async fn count(&self) -> Result<usize>;
}

/// A pre-counted selection.
#[derive(Debug, Clone, Copy)]
pub struct FixedCount(pub usize);

#[async_trait]
impl ItemSource for FixedCount {
    fn describe(&self) -> String {
        format!("{} items", self.0)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.0)
    }
}

/// A directory upload: every regular file below `root` counts as one
/// record, matching a recursive folder picker.
#[derive(Debug, Clone)]
pub struct FolderSource {
    root: PathBuf,
}

impl FolderSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ItemSource for FolderSource {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    async fn count(&self) -> Result<usize> {
        let mut pending = vec![self.root.clone()];
        let mut files = 0usize;
        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .with_context(|| format!("reading {}", dir.display()))?;
            while let Some(entry) = entries.next_entry().await? {
                let kind = entry.file_type().await?;
                if kind.is_dir() {
                    pending.push(entry.path());
                } else if kind.is_file() {
                    files += 1;
                }
            }
        }
        Ok(files)
    }
}
