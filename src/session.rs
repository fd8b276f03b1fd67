// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Tracks the state of one resumable upload session.

use crate::model::ObjectChecksums;
use crate::transport::{ChunkTransport, UploadStatus};
use crate::{Result, UploadError};

/// Tracks the server-acknowledged offset for one resumable upload.
///
/// The session is the single source of truth for "how much of this upload
/// does the service believe it has". All communication with the
/// [ChunkTransport] goes through it, and every response updates (or is
/// checked against) [next_expected_byte][UploadSession::next_expected_byte].
///
/// The session performs no retries. A transport error leaves the tracked
/// state unchanged; the caller decides whether to retry the chunk, call
/// [reset][UploadSession::reset] to re-synchronize first, or abandon the
/// upload.
///
/// Sessions are not thread-safe: use one session per upload, from one task.
/// To resume an upload after a process restart, persist the session id and
/// reconstruct the session with [resume][UploadSession::resume].
#[derive(Debug)]
pub struct UploadSession<T> {
    transport: T,
    session_id: String,
    next_expected_byte: u64,
    done: bool,
    last_status: Option<Result<UploadStatus>>,
}

impl<T> UploadSession<T>
where
    T: ChunkTransport,
{
    /// Creates a session for a freshly started upload.
    pub fn new<S: Into<String>>(transport: T, session_id: S) -> Self {
        Self {
            transport,
            session_id: session_id.into(),
            next_expected_byte: 0,
            done: false,
            last_status: None,
        }
    }

    /// Reconstructs a session from externally persisted state.
    ///
    /// `next_expected_byte` is treated as a lower bound on the persisted
    /// size; callers typically follow with [reset][UploadSession::reset] to
    /// discover the current status.
    pub fn resume<S: Into<String>>(transport: T, session_id: S, next_expected_byte: u64) -> Self {
        Self {
            next_expected_byte,
            ..Self::new(transport, session_id)
        }
    }

    /// The opaque identifier for this upload session.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The lower bound of bytes not yet acknowledged by the service.
    pub fn next_expected_byte(&self) -> u64 {
        self.next_expected_byte
    }

    /// True once the service confirmed the object is finalized.
    pub fn done(&self) -> bool {
        self.done
    }

    /// The outcome of the most recent operation, if any.
    pub fn last_status(&self) -> Option<&Result<UploadStatus>> {
        self.last_status.as_ref()
    }

    /// Uploads a non-terminal chunk at the current offset.
    ///
    /// The total size of `buffers` must be a multiple of the upload quantum;
    /// the write buffer enforces this. Empty buffers are sent as a probe so
    /// the service can report (or confirm) its committed state.
    pub async fn upload_chunk(&mut self, buffers: Vec<bytes::Bytes>) -> Result<UploadStatus> {
        self.check_open()?;
        let offset = self.next_expected_byte;
        let sent = self::total_size(&buffers);
        let result = self
            .transport
            .upload_chunk(&self.session_id, offset, buffers)
            .await;
        self.record(offset, Some(offset + sent), result)
    }

    /// Uploads the terminal chunk, declaring the total upload size.
    pub async fn upload_final_chunk(
        &mut self,
        buffers: Vec<bytes::Bytes>,
        upload_size: u64,
        checksums: Option<ObjectChecksums>,
    ) -> Result<UploadStatus> {
        self.check_open()?;
        let offset = self.next_expected_byte;
        let sent = self::total_size(&buffers);
        let result = self
            .transport
            .upload_final_chunk(&self.session_id, offset, buffers, upload_size, checksums)
            .await;
        self.record(offset, Some(offset + sent), result)
    }

    /// Queries the service for the current upload status without sending
    /// data.
    ///
    /// Used to recover the persisted size after an ambiguous failure, where
    /// the chunk upload failed but the bytes may have been partially
    /// received.
    pub async fn reset(&mut self) -> Result<UploadStatus> {
        self.check_open()?;
        tracing::debug!(
            session_id = %self.session_id,
            next_expected_byte = self.next_expected_byte,
            "querying resumable upload status"
        );
        let result = self.transport.query_status(&self.session_id).await;
        // A status query has no upper bound: the service may report bytes
        // persisted by requests whose responses were lost.
        self.record(self.next_expected_byte, None, result)
    }

    fn check_open(&self) -> Result<()> {
        if let Some(Err(e)) = &self.last_status {
            if e.is_aborted() {
                return Err(e.clone());
            }
        }
        if self.done {
            return Err(UploadError::AlreadyFinalized);
        }
        Ok(())
    }

    // `sent_end` is the end of the chunk just sent; status queries pass
    // `None` as they place no upper bound on the persisted size.
    fn record(
        &mut self,
        offset: u64,
        sent_end: Option<u64>,
        result: Result<UploadStatus>,
    ) -> Result<UploadStatus> {
        let checked = match result {
            Err(e) => Err(e),
            Ok(UploadStatus::InProgress(Some(c))) if c < offset => {
                Err(UploadError::UnexpectedRewind {
                    offset,
                    persisted: c,
                })
            }
            Ok(UploadStatus::InProgress(Some(c))) if sent_end.is_some_and(|end| c > end) => {
                Err(UploadError::TooMuchProgress {
                    sent: sent_end.unwrap_or(c),
                    persisted: c,
                })
            }
            Ok(UploadStatus::Finalized(None)) => Err(UploadError::MissingObjectMetadata),
            Ok(status) => Ok(status),
        };
        match checked {
            Err(e) => {
                if e.is_aborted() {
                    tracing::debug!(
                        session_id = %self.session_id,
                        error = %e,
                        "resumable upload session aborted"
                    );
                }
                self.last_status = Some(Err(e.clone()));
                Err(e)
            }
            Ok(status) => {
                match &status {
                    UploadStatus::InProgress(Some(c)) => self.next_expected_byte = *c,
                    UploadStatus::InProgress(None) => {}
                    UploadStatus::Finalized(_) => {
                        self.done = true;
                        if let Some(end) = sent_end {
                            self.next_expected_byte = std::cmp::max(self.next_expected_byte, end);
                        }
                    }
                }
                self.last_status = Some(Ok(status.clone()));
                Ok(status)
            }
        }
    }
}

fn total_size(buffers: &[bytes::Bytes]) -> u64 {
    buffers.iter().fold(0_u64, |s, b| s + b.len() as u64)
}
