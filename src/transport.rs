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

//! The abstract chunk transport used by upload sessions.

use crate::Result;
use crate::model::{Object, ObjectChecksums};

/// The outcome of a chunk upload or status query.
#[derive(Clone, Debug, PartialEq)]
pub enum UploadStatus {
    /// The upload is still in progress.
    ///
    /// The value is the number of bytes the service reports as durably
    /// persisted. `None` means the service did not report committed state;
    /// the caller must re-synchronize via a status query before sending more
    /// data.
    InProgress(Option<u64>),

    /// The upload finalized and the object was created.
    ///
    /// A well-behaved transport always includes the object metadata. The
    /// session surfaces a missing value as
    /// [MissingObjectMetadata][crate::UploadError::MissingObjectMetadata].
    Finalized(Option<Box<Object>>),
}

impl UploadStatus {
    /// The committed size reported with this status, if any.
    pub fn committed_size(&self) -> Option<u64> {
        match self {
            Self::InProgress(size) => *size,
            Self::Finalized(_) => None,
        }
    }
}

/// Uploads chunks on behalf of an [UploadSession][crate::session::UploadSession].
///
/// Implementations perform the actual I/O: a JSON or gRPC client for the
/// service, or a test double. Each call blocks (asynchronously) until the
/// round-trip completes; timeouts, deadlines and retries are the
/// implementation's concern, not the session's.
///
/// The byte buffers passed to `upload_chunk` and `upload_final_chunk` are
/// shared slices ([bytes::Bytes]); implementations may clone them cheaply but
/// must not assume they are contiguous.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ChunkTransport: Send + Sync {
    /// Uploads a non-terminal chunk starting at `offset`.
    ///
    /// The total size of `buffers` is always a multiple of the upload
    /// quantum. An empty chunk is a valid probe: the service responds with
    /// the current upload status.
    async fn upload_chunk(
        &self,
        session_id: &str,
        offset: u64,
        buffers: Vec<bytes::Bytes>,
    ) -> Result<UploadStatus>;

    /// Uploads the terminal chunk, declaring the total upload size.
    ///
    /// `buffers` may be empty (the upload size landed exactly on a quantum
    /// boundary) and its total size need not be a multiple of the quantum.
    /// `checksums` carries the full-object hashes, if the application
    /// computed or supplied any.
    async fn upload_final_chunk(
        &self,
        session_id: &str,
        offset: u64,
        buffers: Vec<bytes::Bytes>,
        upload_size: u64,
        checksums: Option<ObjectChecksums>,
    ) -> Result<UploadStatus>;

    /// Queries the current status of the upload without sending data.
    async fn query_status(&self, session_id: &str) -> Result<UploadStatus>;
}
