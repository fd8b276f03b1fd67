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

//! Google Cloud Client Libraries for Rust - Resumable Upload Core
//!
//! This crate implements the session tracking and chunked buffering required
//! by resumable uploads. A resumable upload sends an object as a sequence of
//! chunks; the service reports how many bytes it has durably persisted after
//! each chunk, and uploads can continue from that point after an
//! interruption.
//!
//! The crate contains two components:
//!
//! * [UploadSession][session::UploadSession] tracks the server-acknowledged
//!   offset for one upload and mediates all calls to an abstract
//!   [ChunkTransport][transport::ChunkTransport].
//! * [BufferedUpload][buffered::BufferedUpload] accumulates application
//!   writes, aligns them to the upload quantum, and reconciles the persisted
//!   offset reported by the service against the data actually sent.
//!
//! The transport itself (HTTP, gRPC, or a test double) is a collaborator
//! injected by the application. This crate performs no retries: transient
//! errors are surfaced to the caller, which may retry the same operation or
//! re-synchronize with [UploadSession::reset][session::UploadSession::reset].
//!
//! # Example
//! ```no_run
//! # use google_cloud_storage_upload::{buffered::BufferedUpload, buffered::UploadOptions};
//! # use google_cloud_storage_upload::session::UploadSession;
//! # use google_cloud_storage_upload::transport::ChunkTransport;
//! # async fn sample<T: ChunkTransport>(transport: T) -> google_cloud_storage_upload::Result<()> {
//! let session = UploadSession::new(transport, "upload-session-url");
//! let mut upload = BufferedUpload::new(session, UploadOptions::new());
//! upload.write(bytes::Bytes::from_static(b"hello world")).await?;
//! let object = upload.close().await?;
//! println!("created {}", object.name);
//! # Ok(()) }
//! ```

pub mod buffered;
pub mod checksum;
pub mod error;
pub mod model;
pub mod session;
pub mod transport;

pub use error::UploadError;

/// The result type used by this crate.
pub type Result<T> = std::result::Result<T, UploadError>;

/// Resumable upload chunks (except for the last chunk) *must* be sized to a
/// multiple of 256 KiB.
pub const RESUMABLE_UPLOAD_QUANTUM: usize = 256 * 1024;
