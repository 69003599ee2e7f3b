//! Two-step cursor pagination against the CleverTap export API.
//!
//! ```text
//!   initiate ──► cursor
//!                  │
//!                  ▼
//!   ┌──────► poll(cursor) ── fail/code 2 ──► sleep, same cursor (≤ max_retries)
//!   │              │
//!   │           success
//!   │              │
//!   │      emit page records
//!   │              │
//!   └─ next cursor ┴─ no cursor ──► done
//! ```
//!
//! One reader serves both resources; the [`Resource`] descriptor supplies the
//! path, the initiation payload and the per-record transform.

use crate::api::{BodyStatus, ExportApi};
use crate::config::{RetryPolicy, SessionConfig, SyncWindow};
use crate::error::{Result, SyncError};
use crate::resources::Resource;
use crate::types::Record;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::{debug, info};


/// Characters of a cursor shown in logs.
const CURSOR_LOG_PREFIX: usize = 50;

/// An accepted poll response.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub records: Vec<Record>,
    /// `None` ends the export.
    pub next_cursor: Option<String>,
}

/// Pagination engine for one resource.
#[derive(Clone)]
pub struct ExportReader {
    api: Arc<dyn ExportApi>,
    resource: Arc<dyn Resource>,
    window: SyncWindow,
    retry: RetryPolicy,
    batch_size: Option<u32>,
}

impl ExportReader {
    pub fn new(
        api: Arc<dyn ExportApi>,
        resource: Arc<dyn Resource>,
        session: &SessionConfig,
    ) -> Self {
        Self {
            api,
            resource,
            window: session.window.clone(),
            retry: session.retry,
            batch_size: session.batch_size,
        }
    }

    pub fn resource(&self) -> &Arc<dyn Resource> {
        &self.resource
    }

    /// Start an export job and return its first cursor.
    ///
    /// Called once per read. Transport failures here are not retried.
    pub async fn initiate(&self) -> Result<String> {
        let payload = self.resource.initiation_payload(&self.window)?;

        info!(
            stream = self.resource.name(),
            from = self.window.start_date,
            to = self.window.end_date,
            "Fetching initial cursor from CleverTap API"
        );
        let response = self
            .api
            .initiate_export(self.resource.path(), &payload, self.batch_size)
            .await?;

        if response.classify() != BodyStatus::Success {
            return Err(SyncError::RemoteApi {
                body: response.into_body(),
            });
        }

        let cursor = match response.cursor() {
            Some(cursor) => cursor.to_string(),
            None => {
                return Err(SyncError::Protocol(format!(
                    "no cursor returned from API: {}",
                    response.body()
                )))
            }
        };

        info!(
            stream = self.resource.name(),
            cursor = cursor_prefix(&cursor),
            "Obtained initial cursor"
        );
        Ok(cursor)
    }

    /// Poll `cursor` until the export answers with a page.
    ///
    /// A "still processing" answer (`status: fail`, `code: 2`) is retried
    /// with the same cursor after a fixed delay, up to `max_retries` attempts
    /// in total. Any other failure ends the read.
    pub async fn fetch_page(&self, cursor: &str) -> Result<Page> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let response = self.api.poll_export(self.resource.path(), cursor).await?;

            match response.classify() {
                BodyStatus::Success => {
                    return Ok(Page {
                        records: response.records()?,
                        next_cursor: response.next_cursor().map(str::to_string),
                    });
                }
                BodyStatus::Processing if attempt < self.retry.max_retries => {
                    info!(
                        stream = self.resource.name(),
                        attempt,
                        max_retries = self.retry.max_retries,
                        delay_secs = self.retry.retry_delay.as_secs_f64(),
                        "Request still in progress, waiting before retry"
                    );
                    tokio::time::sleep(self.retry.retry_delay).await;
                }
                BodyStatus::Processing => {
                    return Err(SyncError::RetryExhausted {
                        attempts: attempt,
                        body: response.into_body(),
                    });
                }
                BodyStatus::Failed => {
                    return Err(SyncError::RemoteApi {
                        body: response.into_body(),
                    });
                }
            }
        }
    }

    /// Lazily read every record of a fresh export job.
    ///
    /// Nothing is requested until the stream is first polled. Each call
    /// starts a new export, so a read can be restarted by calling this again.
    /// The stream ends after the first error.
    pub fn read(&self) -> BoxStream<'static, Result<Record>> {
        let start = ReadState {
            phase: Phase::Uninitialized,
            pages: 0,
            total_records: 0,
        };

        stream::try_unfold((self.clone(), start), |(reader, state)| async move {
            let next = reader.step(state).await?;
            Ok::<_, SyncError>(next.map(|(records, state)| (records, (reader, state))))
        })
        .map_ok(|records| stream::iter(records.into_iter().map(Ok::<Record, SyncError>)))
        .try_flatten()
        .boxed()
    }

    /// Read the whole export into memory.
    pub async fn read_all(&self) -> Result<Vec<Record>> {
        self.read().try_collect().await
    }

    /// Advance the state machine by one page.
    async fn step(&self, mut state: ReadState) -> Result<Option<(Vec<Record>, ReadState)>> {
        let cursor = match state.phase {
            Phase::Done => return Ok(None),
            Phase::Uninitialized => self.initiate().await?,
            Phase::Polling(cursor) => cursor,
        };

        state.pages += 1;
        debug!(
            stream = self.resource.name(),
            page = state.pages,
            cursor = cursor_prefix(&cursor),
            "Fetching page"
        );
        let page = self.fetch_page(&cursor).await?;

        state.total_records += page.records.len() as u64;
        info!(
            stream = self.resource.name(),
            page = state.pages,
            records = page.records.len(),
            "Received page"
        );

        state.phase = match page.next_cursor {
            Some(next) => Phase::Polling(next),
            None => {
                info!(
                    stream = self.resource.name(),
                    pages = state.pages,
                    total_records = state.total_records,
                    "No more pages"
                );
                if state.total_records == 0 {
                    info!(
                        stream = self.resource.name(),
                        "No records found for the given criteria"
                    );
                }
                Phase::Done
            }
        };

        let records = page
            .records
            .into_iter()
            .map(|record| self.resource.transform(record))
            .collect();
        Ok(Some((records, state)))
    }
}

#[derive(Debug)]
struct ReadState {
    phase: Phase,
    pages: u32,
    total_records: u64,
}

#[derive(Debug)]
enum Phase {
    Uninitialized,
    Polling(String),
    Done,
}

fn cursor_prefix(cursor: &str) -> &str {
    match cursor.char_indices().nth(CURSOR_LOG_PREFIX) {
        Some((idx, _)) => &cursor[..idx],
        None => cursor,
    }
}
