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

//! A write-oriented buffer over an upload session.

use crate::checksum::{self, Checksum};
use crate::model::{Object, ObjectChecksums};
use crate::session::UploadSession;
use crate::transport::{ChunkTransport, UploadStatus};
use crate::{RESUMABLE_UPLOAD_QUANTUM, Result, UploadError};
use std::collections::VecDeque;

/// Options for a [BufferedUpload].
#[derive(Clone, Debug)]
pub struct UploadOptions {
    buffer_size: usize,
    known_size: Option<u64>,
    checksum: Checksum,
    checksums: ObjectChecksums,
}

impl UploadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flush threshold and the maximum chunk size.
    ///
    /// The value is rounded up to the next multiple of the upload quantum,
    /// with a minimum of one quantum. Zero requests the smallest buffer, so
    /// every write that accumulates a full quantum uploads it immediately.
    pub fn set_buffer_size<V: Into<usize>>(mut self, v: V) -> Self {
        self.buffer_size = v.into();
        self
    }

    /// Declares the total size of the upload in advance.
    ///
    /// When set, the write that completes the declared size uploads the
    /// trailing bytes as the final chunk, without waiting for
    /// [close][BufferedUpload::close].
    pub fn set_known_size<V: Into<u64>>(mut self, v: V) -> Self {
        self.known_size = Some(v.into());
        self
    }

    /// Sets the checksum engine applied to the written data.
    ///
    /// The default engine computes CRC32C. Use [Checksum::null] to disable
    /// checksum computation.
    pub fn set_checksum<V: Into<Checksum>>(mut self, v: V) -> Self {
        self.checksum = v.into();
        self
    }

    /// Provides precomputed checksums for the full object.
    ///
    /// Known values take precedence over computed ones when both are
    /// available for the same algorithm.
    pub fn set_checksums<V: Into<ObjectChecksums>>(mut self, v: V) -> Self {
        self.checksums = v.into();
        self
    }
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            buffer_size: 0,
            known_size: None,
            checksum: Checksum::crc32c(),
            checksums: ObjectChecksums::new(),
        }
    }
}

#[derive(Debug)]
enum UploadState {
    Open,
    Finalized(Box<Object>),
    Aborted(UploadError),
}

/// Buffers application writes and uploads them as aligned chunks.
///
/// The resumable upload protocol requires every chunk except the last to be
/// a multiple of 256 KiB. This type accepts writes of any size, accumulates
/// them without copying, and uploads whole quantums once enough data is
/// buffered. [close][BufferedUpload::close] uploads the sub-quantum tail and
/// finalizes the object.
///
/// ```no_run
/// # use google_cloud_storage_upload::{buffered::*, session::UploadSession, transport::ChunkTransport};
/// # async fn sample<T: ChunkTransport>(session: UploadSession<T>) -> anyhow::Result<()> {
/// let mut upload = BufferedUpload::new(session, UploadOptions::new());
/// upload.write(bytes::Bytes::from_static(b"hello world")).await?;
/// let object = upload.close().await?;
/// println!("created {} in {}", object.name, object.bucket);
/// # Ok(()) }
/// ```
pub struct BufferedUpload<T> {
    session: UploadSession<T>,
    /// The data accepted from the application but not yet persisted.
    buffer: VecDeque<bytes::Bytes>,
    buffer_size: u64,
    /// The flush threshold and maximum chunk size, a multiple of the upload
    /// quantum.
    target_size: u64,
    known_size: Option<u64>,
    checksum: Checksum,
    known_checksums: ObjectChecksums,
    /// The total bytes accepted via `write`.
    written: u64,
    state: UploadState,
}

struct Summary<'a>(&'a VecDeque<bytes::Bytes>);
impl std::fmt::Debug for Summary<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Summary")
            .field("len", &self.0.len())
            .field(
                "total_size",
                &self.0.iter().fold(0_usize, |s, b| s + b.len()),
            )
            .finish()
    }
}

// The buffer can be large and hard to grok, print a summary instead.
impl<T: std::fmt::Debug> std::fmt::Debug for BufferedUpload<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferedUpload")
            .field("session", &self.session)
            .field("buffer", &Summary(&self.buffer))
            .field("buffer_size", &self.buffer_size)
            .field("target_size", &self.target_size)
            .field("known_size", &self.known_size)
            .field("written", &self.written)
            .field("state", &self.state)
            .finish()
    }
}

impl<T> BufferedUpload<T>
where
    T: ChunkTransport,
{
    pub fn new(session: UploadSession<T>, options: UploadOptions) -> Self {
        // Every chunk except the last must be a multiple of the upload
        // quantum.
        let target_size = options
            .buffer_size
            .div_ceil(RESUMABLE_UPLOAD_QUANTUM)
            .max(1) as u64
            * RESUMABLE_UPLOAD_QUANTUM as u64;
        Self {
            session,
            buffer: VecDeque::new(),
            buffer_size: 0,
            target_size,
            known_size: options.known_size,
            checksum: options.checksum,
            known_checksums: options.checksums,
            written: 0,
            state: UploadState::Open,
        }
    }

    /// The session driven by this buffer.
    pub fn session(&self) -> &UploadSession<T> {
        &self.session
    }

    /// The number of bytes accepted but not yet persisted by the service.
    pub fn buffered_bytes(&self) -> u64 {
        self.buffer_size
    }

    /// Appends `data` to the upload.
    ///
    /// The data is buffered without copying. If the buffer reaches the
    /// configured size, all whole quantums are uploaded before returning.
    /// Always accepts the full span: the returned length equals
    /// `data.len()`.
    pub async fn write(&mut self, data: bytes::Bytes) -> Result<usize> {
        self.check_open()?;
        let len = data.len();
        if len != 0 {
            self.checksum.update(&data);
            self.written += len as u64;
            self.buffer_size += len as u64;
            self.buffer.push_back(data);
        }
        if self.buffer_size >= self.target_size || self.completes_known_size() {
            self.drain().await?;
        }
        Ok(len)
    }

    /// Uploads all whole quantums in the buffer, even below the flush
    /// threshold.
    ///
    /// A sub-quantum remainder stays buffered until more data arrives or the
    /// upload is closed. Returns the number of bytes handed to the
    /// transport.
    pub async fn flush(&mut self) -> Result<u64> {
        self.check_open()?;
        self.drain().await
    }

    /// Uploads any remaining bytes as the final chunk and finalizes the
    /// object.
    ///
    /// Idempotent: closing an already finalized upload returns the created
    /// object without calling the transport.
    pub async fn close(&mut self) -> Result<Object> {
        match &self.state {
            UploadState::Aborted(e) => Err(e.clone()),
            UploadState::Finalized(object) => Ok(object.as_ref().clone()),
            UploadState::Open => self.finalize_upload().await,
        }
    }

    fn check_open(&self) -> Result<()> {
        match &self.state {
            UploadState::Open => Ok(()),
            UploadState::Finalized(_) => Err(UploadError::AlreadyFinalized),
            UploadState::Aborted(e) => Err(e.clone()),
        }
    }

    fn completes_known_size(&self) -> bool {
        self.known_size
            .is_some_and(|k| self.session.next_expected_byte() + self.buffer_size == k)
    }

    /// Uploads buffered quantums until the buffer holds less than one
    /// quantum, the service stops making progress, or the known size
    /// finalizes the upload.
    async fn drain(&mut self) -> Result<u64> {
        let mut handed = 0_u64;
        loop {
            if self.completes_known_size() && self.buffer_size <= self.target_size {
                let n = self.buffer_size;
                self.finalize_upload().await?;
                return Ok(handed + n);
            }
            let quantum = RESUMABLE_UPLOAD_QUANTUM as u64;
            let len = std::cmp::min(self.buffer_size / quantum * quantum, self.target_size);
            if len == 0 {
                return Ok(handed);
            }
            let offset = self.session.next_expected_byte();
            let chunk = self.chunk_view(len);
            let result = self.session.upload_chunk(chunk).await;
            let result = self.synchronize(result).await;
            handed += len;
            match result {
                Err(e) => return Err(self.abort_on_fatal(e)),
                Ok(UploadStatus::InProgress(Some(c))) if c > offset + len => {
                    let err = UploadError::TooMuchProgress {
                        sent: offset + len,
                        persisted: c,
                    };
                    return Err(self.abort_on_fatal(err));
                }
                Ok(UploadStatus::InProgress(Some(c))) => {
                    self.discard_persisted(c - offset);
                    if c == offset {
                        // No progress on this chunk. Not an error, the
                        // caller may flush again.
                        return Ok(handed);
                    }
                }
                Ok(UploadStatus::InProgress(None)) => return Ok(handed),
                Ok(UploadStatus::Finalized(object)) => {
                    // A lost finalization response recovered by the status
                    // query. The session rejects a finalized status without
                    // object metadata, so one is always present here.
                    self.buffer.clear();
                    self.buffer_size = 0;
                    self.state = UploadState::Finalized(object.unwrap_or_default());
                    return Ok(handed);
                }
            }
        }
    }

    async fn finalize_upload(&mut self) -> Result<Object> {
        let upload_size = self
            .known_size
            .unwrap_or(self.session.next_expected_byte() + self.buffer_size);
        let checksums = self.final_checksums();
        loop {
            let offset = self.session.next_expected_byte();
            let chunk = self.chunk_view(self.buffer_size);
            let result = self
                .session
                .upload_final_chunk(chunk, upload_size, checksums.clone())
                .await;
            let result = self.synchronize(result).await;
            match result {
                Err(e) => return Err(self.abort_on_fatal(e)),
                Ok(UploadStatus::Finalized(object)) => {
                    // The session rejects a finalized status without object
                    // metadata, so one is always present here.
                    let object = object.unwrap_or_default();
                    if let Some(want) = &checksums {
                        checksum::validate(want, &object.checksums)
                            .map_err(|e| self.abort_on_fatal(e))?;
                    }
                    self.buffer.clear();
                    self.buffer_size = 0;
                    self.state = UploadState::Finalized(object.clone());
                    return Ok(*object);
                }
                Ok(UploadStatus::InProgress(Some(c))) if c > offset + self.buffer_size => {
                    let err = UploadError::TooMuchProgress {
                        sent: offset + self.buffer_size,
                        persisted: c,
                    };
                    return Err(self.abort_on_fatal(err));
                }
                Ok(UploadStatus::InProgress(Some(c))) if c == offset => {
                    return Err(UploadError::NotFinalized { offset });
                }
                Ok(UploadStatus::InProgress(Some(c))) => self.discard_persisted(c - offset),
                Ok(UploadStatus::InProgress(None)) => {
                    return Err(UploadError::NotFinalized { offset });
                }
            }
        }
    }

    /// Follows up a missing committed size with a single status query.
    async fn synchronize(&mut self, result: Result<UploadStatus>) -> Result<UploadStatus> {
        match result {
            Ok(UploadStatus::InProgress(None)) => {
                tracing::debug!(
                    session_id = self.session.session_id(),
                    "committed state not reported, querying upload status"
                );
                self.session.reset().await
            }
            r => r,
        }
    }

    fn abort_on_fatal(&mut self, err: UploadError) -> UploadError {
        if err.is_aborted() || matches!(err, UploadError::ChecksumMismatch { .. }) {
            tracing::debug!(
                session_id = self.session.session_id(),
                error = %err,
                "buffered upload aborted"
            );
            self.state = UploadState::Aborted(err.clone());
        }
        err
    }

    /// A cheap view over the first `max` buffered bytes.
    ///
    /// The buffer is left untouched; accepted bytes are removed by
    /// [discard_persisted][Self::discard_persisted] once the service reports
    /// its committed size.
    fn chunk_view(&self, max: u64) -> Vec<bytes::Bytes> {
        let mut chunk = Vec::new();
        let mut size = 0_u64;
        for b in self.buffer.iter() {
            if size == max {
                break;
            }
            let take = std::cmp::min(b.len() as u64, max - size);
            chunk.push(b.slice(0..take as usize));
            size += take;
        }
        chunk
    }

    /// Drops the first `skip` buffered bytes, splitting the span containing
    /// the boundary.
    fn discard_persisted(&mut self, mut skip: u64) {
        while skip > 0 {
            let Some(mut b) = self.buffer.pop_front() else {
                break;
            };
            let n = b.len() as u64;
            if n <= skip {
                skip -= n;
                self.buffer_size -= n;
            } else {
                let suffix = b.split_off(skip as usize);
                self.buffer_size -= skip;
                self.buffer.push_front(suffix);
                skip = 0;
            }
        }
    }

    fn final_checksums(&self) -> Option<ObjectChecksums> {
        let merged = checksum::merge(self.known_checksums.clone(), self.checksum.finalize());
        if merged.crc32c.is_none() && merged.md5_hash.is_empty() {
            return None;
        }
        Some(merged)
    }
}
