use std::path::PathBuf;

use anyhow::{Context, Result};
use bytes::Bytes;
use tokio::sync::OnceCell;
use tracing::info;

/// Lazily loaded, process-wide copy of the resume template container.
///
/// The template never changes at runtime, so the first successful load is kept
/// for the life of the process and handed out to every job. Concurrent first
/// calls are serialised by the cell; a failed load leaves it empty so the next
/// job retries.
pub struct TemplateCache {
    path: PathBuf,
    bytes: OnceCell<Bytes>,
}

impl TemplateCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            bytes: OnceCell::new(),
        }
    }

    #[cfg(test)]
    pub fn preloaded(bytes: Bytes) -> Self {
        Self {
            path: PathBuf::new(),
            bytes: OnceCell::new_with(Some(bytes)),
        }
    }

    pub async fn get(&self) -> Result<Bytes> {
        let bytes = self
            .bytes
            .get_or_try_init(|| async {
                let data = tokio::fs::read(&self.path).await.with_context(|| {
                    format!("Failed to read resume template {}", self.path.display())
                })?;
                info!(
                    "Loaded resume template {} ({} bytes)",
                    self.path.display(),
                    data.len()
                );
                Ok::<_, anyhow::Error>(Bytes::from(data))
            })
            .await?;
        Ok(bytes.clone())
    }
}
