//! Resumable HTTP transfer for a single URL
//!
//! One [`Fetcher::fetch`] call performs one attempt for one URL: it computes
//! the resume offset from storage, issues a ranged request when part of the
//! file is already on disk, streams the body to the partial file without
//! buffering it in memory, and promotes the file to the completed directory
//! once the expected byte count is present.
//!
//! A fetch is race-free against concurrent fetches for *different* URLs (each
//! writes to its own path); the batch runner never schedules two fetches for
//! the same URL within a run.

use crate::config::DownloadConfig;
use crate::error::{Error, Result};
use crate::storage::Storage;
use futures::StreamExt;
use reqwest::header::RANGE;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Performs resumable HTTP transfers against shared storage
///
/// Holds one `reqwest::Client`, shared by every concurrent fetch within a
/// batch run for connection pooling.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    storage: Arc<Storage>,
    read_timeout: Duration,
}

impl Fetcher {
    /// Create a fetcher with a fresh HTTP client
    pub fn new(config: &DownloadConfig, storage: Arc<Storage>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.read_timeout)
            .build()?;

        Ok(Self {
            client,
            storage,
            read_timeout: config.read_timeout,
        })
    }

    /// Download one URL, resuming from any partial file on disk
    ///
    /// Idempotent for already-completed URLs: if the completed file exists no
    /// network request is made. Succeeds once the completed file holds the
    /// full expected byte count; a body that ends short of `content-length`
    /// fails with [`Error::Incomplete`].
    ///
    /// Every network wait is bounded by the configured read timeout: the
    /// response-header await and each body read fail with
    /// [`Error::ReadTimeout`] when no data arrives in time.
    pub async fn fetch(&self, url: &str) -> Result<()> {
        let file_name = Storage::file_name(url);

        if self.storage.is_completed(url).await {
            tracing::debug!(file = %file_name, "File already downloaded");
            return Ok(());
        }

        let resume_offset = self.storage.partial_size(url).await;

        let mut request = self.client.get(url);
        if resume_offset > 0 {
            request = request.header(RANGE, format!("bytes={resume_offset}-"));
            tracing::info!(
                file = %file_name,
                offset = resume_offset,
                "Resuming download"
            );
        }

        // The header await is a suspension point like any body read: a server
        // that accepts the connection but never answers must not hold the
        // attempt (and its concurrency permit) forever
        let response = tokio::time::timeout(self.read_timeout, request.send())
            .await
            .map_err(|_| Error::ReadTimeout {
                url: url.to_string(),
            })??;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status,
            });
        }

        // A 206 means the server honored the range and content-length covers
        // only the remaining bytes. On any other success status the server is
        // sending the whole resource and the partial file must start over.
        let resumed = resume_offset > 0 && status == StatusCode::PARTIAL_CONTENT;
        let content_length = response.content_length().unwrap_or(0);
        let total_size = if resumed {
            resume_offset + content_length
        } else {
            content_length
        };

        // Crash recovery: the previous run wrote the full file but died
        // before promoting it. A resumed 206 without content-length makes the
        // total equal the offset, so the partial is taken as already complete.
        if resumed && resume_offset >= total_size && total_size != 0 {
            tracing::info!(file = %file_name, "File already complete, moving");
            return self.storage.promote(url).await;
        }

        let partial_path = self.storage.partial_path(url);
        let mut file = if resumed {
            tokio::fs::OpenOptions::new()
                .append(true)
                .create(true)
                .open(&partial_path)
                .await?
        } else {
            tokio::fs::File::create(&partial_path).await?
        };

        tracing::info!(file = %file_name, total_bytes = total_size, "Starting download");

        let mut stream = response.bytes_stream();
        loop {
            let next = tokio::time::timeout(self.read_timeout, stream.next())
                .await
                .map_err(|_| Error::ReadTimeout {
                    url: url.to_string(),
                })?;
            match next {
                Some(chunk) => file.write_all(&chunk?).await?,
                None => break,
            }
        }
        file.flush().await?;
        drop(file);

        let written = self.storage.partial_size(url).await;
        if total_size != 0 && written < total_size {
            // The server closed the stream early without a transport error.
            // Raising here keeps the task state machine honest: a short file
            // must surface as a failed attempt, not a silent warning.
            return Err(Error::Incomplete {
                url: url.to_string(),
                expected: total_size,
                received: written,
            });
        }

        self.storage.promote(url).await
    }
}
