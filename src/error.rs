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

//! Error types for resumable uploads.
//!
//! Callers should use [UploadError::is_transient] and
//! [UploadError::is_aborted] to decide whether an operation is worth
//! retrying. Transient errors leave the session usable; aborted errors are
//! sticky and the upload must be restarted from scratch.

use crate::model::ObjectChecksums;
use std::sync::Arc;

type TransportSource = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// The errors produced by resumable upload sessions and buffers.
///
/// The type is `Clone` so a terminal failure can be cached and returned from
/// every subsequent operation on the same session.
#[derive(Clone, Debug, thiserror::Error)]
#[non_exhaustive]
pub enum UploadError {
    /// The transport failed to complete the request.
    ///
    /// # Troubleshoot
    ///
    /// These errors are transient: the session state is unchanged and the
    /// caller may retry the same chunk, typically after calling
    /// [reset][crate::session::UploadSession::reset] to discover how many
    /// bytes the service received before the failure.
    #[error("transport failure in resumable upload: {0}")]
    Transport(#[source] TransportSource),

    /// The service has "uncommitted" previously persisted bytes.
    ///
    /// # Troubleshoot
    ///
    /// In the resumable upload protocol the service reports how many bytes
    /// are persisted. This error indicates that the service previously
    /// reported more bytes as persisted than in the latest report. This could
    /// indicate a corrupted message, or a bug in the service or the client.
    /// The session cannot be recovered; restart the upload.
    #[error(
        "the service previously persisted {offset} bytes, but now reports only {persisted} as persisted"
    )]
    UnexpectedRewind { offset: u64, persisted: u64 },

    /// The service reports more bytes persisted than sent.
    ///
    /// # Troubleshoot
    ///
    /// Most likely this indicates that two concurrent uploads are using the
    /// same session. Review your application design to avoid concurrent
    /// uploads. The session cannot be recovered; restart the upload.
    #[error("the service reports {persisted} bytes as persisted, but we only sent {sent} bytes")]
    TooMuchProgress { sent: u64, persisted: u64 },

    /// The service finalized the upload without returning object metadata.
    ///
    /// # Troubleshoot
    ///
    /// A finalized upload must include the metadata of the created object.
    /// Querying the session status again may recover the metadata.
    #[error("the service reported the upload as finalized but returned no object metadata")]
    MissingObjectMetadata,

    /// The service received the final chunk but did not finalize the upload.
    #[error("the service did not finalize the upload after the final chunk at offset {offset}")]
    NotFinalized { offset: u64 },

    /// The upload already completed; no further writes are accepted.
    #[error("the upload is already finalized")]
    AlreadyFinalized,

    /// The checksums reported by the service do not match the expected
    /// values.
    ///
    /// # Troubleshoot
    ///
    /// If you provided known values for these checksums verify those values
    /// are correct. Otherwise this is probably a data corruption problem, in
    /// the client, the network, or the service. If possible, resend the data
    /// from a different machine.
    #[error(
        "the object checksums reported by the service do not match the expected values: got {got:?}, want {want:?}"
    )]
    ChecksumMismatch {
        got: Box<ObjectChecksums>,
        want: Box<ObjectChecksums>,
    },
}

impl UploadError {
    /// Wraps a transport-level failure.
    pub fn transport<T>(source: T) -> Self
    where
        T: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        Self::Transport(Arc::from(source.into()))
    }

    /// Returns true if retrying the failed operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns true if the session is corrupted and the upload must be
    /// restarted from scratch.
    pub fn is_aborted(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedRewind { .. } | Self::TooMuchProgress { .. }
        )
    }
}
