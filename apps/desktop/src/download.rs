//! Download sink that writes processed images into a directory.

use std::{path::PathBuf, sync::Mutex};

use anyhow::{anyhow, Context, Result};
use client_core::{DownloadSink, RetrievalRequest, VisionClient};
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub struct FileDownloadSink {
    client: VisionClient,
    out_dir: PathBuf,
    pending: Mutex<Vec<JoinHandle<Result<PathBuf>>>>,
}

impl FileDownloadSink {
    pub fn new(client: VisionClient, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            out_dir: out_dir.into(),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Waits for every transfer started so far and returns the written paths.
    pub async fn finish(&self) -> Result<Vec<PathBuf>> {
        let handles = {
            let mut pending = self
                .pending
                .lock()
                .map_err(|_| anyhow!("download queue lock poisoned"))?;
            std::mem::take(&mut *pending)
        };
        let mut saved = Vec::with_capacity(handles.len());
        for handle in handles {
            saved.push(handle.await.context("download task aborted")??);
        }
        Ok(saved)
    }
}

impl DownloadSink for FileDownloadSink {
    fn initiate(&self, request: RetrievalRequest) {
        let client = self.client.clone();
        let path = self.out_dir.join(&request.suggested_name);
        let task = tokio::spawn(async move {
            let bytes = client
                .fetch(&request.url)
                .await
                .with_context(|| format!("failed to download {}", request.url))?;
            tokio::fs::write(&path, &bytes)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), len = bytes.len(), "saved processed image");
            Ok(path)
        });
        match self.pending.lock() {
            Ok(mut pending) => pending.push(task),
            Err(_) => warn!("download queue lock poisoned; transfer runs unobserved"),
        }
    }
}
