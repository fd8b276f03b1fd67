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

//! Checksums for uploaded data.
//!
//! Checksum computation is optional: the application picks the digests when
//! opening a buffered upload, and the resulting
//! [ObjectChecksums][crate::model::ObjectChecksums] travel with the final
//! chunk so the service can verify the object.

use crate::model::ObjectChecksums;
use crate::{Result, UploadError};

/// Accumulates digests over the bytes written to an upload.
///
/// The data must be fed in order, exactly once. The buffered writer
/// guarantees this by updating the engine when it accepts data from the
/// application, before any chunk is sent or resent.
#[derive(Clone, Default)]
pub struct Checksum {
    crc32c: Option<u32>,
    md5: Option<md5::Context>,
}

impl Checksum {
    /// Computes only CRC32C, the cheapest integrity check the service
    /// accepts.
    pub fn crc32c() -> Self {
        Self {
            crc32c: Some(0),
            md5: None,
        }
    }

    /// Computes only the MD5 hash.
    pub fn md5() -> Self {
        Self {
            crc32c: None,
            md5: Some(md5::Context::new()),
        }
    }

    /// Computes both CRC32C and MD5.
    pub fn full() -> Self {
        Self {
            crc32c: Some(0),
            md5: Some(md5::Context::new()),
        }
    }

    /// Computes nothing.
    pub fn null() -> Self {
        Self::default()
    }

    /// Feeds the next span of written data to the enabled digests.
    pub fn update(&mut self, data: &[u8]) {
        if let Some(state) = self.crc32c.as_mut() {
            *state = crc32c::crc32c_append(*state, data);
        }
        if let Some(context) = self.md5.as_mut() {
            context.consume(data);
        }
    }

    /// The digests over all data fed so far.
    pub fn finalize(&self) -> ObjectChecksums {
        let mut checksums = ObjectChecksums::new();
        if let Some(state) = self.crc32c {
            checksums = checksums.set_crc32c(state);
        }
        if let Some(context) = &self.md5 {
            let digest = context.clone().finalize();
            checksums = checksums.set_md5_hash(bytes::Bytes::copy_from_slice(&digest.0));
        }
        checksums
    }
}

// md5::Context has no Debug; report which digests are enabled instead.
impl std::fmt::Debug for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checksum")
            .field("crc32c", &self.crc32c)
            .field("md5", &self.md5.as_ref().map(|_| "<enabled>"))
            .finish()
    }
}

/// Combines application-provided checksums with computed ones.
///
/// Provided values win: an application that already knows the object's
/// CRC32C or MD5 sends those, even when the engine computed a digest too.
pub fn merge(provided: ObjectChecksums, computed: ObjectChecksums) -> ObjectChecksums {
    let md5_hash = if provided.md5_hash.is_empty() {
        computed.md5_hash
    } else {
        provided.md5_hash
    };
    let merged = ObjectChecksums::new().set_md5_hash(md5_hash);
    match provided.crc32c.or(computed.crc32c) {
        Some(v) => merged.set_crc32c(v),
        None => merged,
    }
}

/// Compares the checksums reported by the service against the expected
/// values.
///
/// A digest participates in the comparison only when both sides carry it.
/// The service omits MD5 hashes for some objects (composed objects in
/// particular) and the application may have computed neither digest;
/// absence is not a mismatch.
pub fn validate(want: &ObjectChecksums, got: &Option<ObjectChecksums>) -> Result<()> {
    let Some(got) = got else {
        return Ok(());
    };
    let crc32c_matches = match (want.crc32c, got.crc32c) {
        (Some(w), Some(g)) => w == g,
        _ => true,
    };
    let md5_matches =
        want.md5_hash.is_empty() || got.md5_hash.is_empty() || want.md5_hash == got.md5_hash;
    if crc32c_matches && md5_matches {
        return Ok(());
    }
    Err(UploadError::ChecksumMismatch {
        got: Box::new(got.clone()),
        want: Box::new(want.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const QUOTE: &[u8] = b"how vexingly quick daft zebras jump";

    fn checks(crc32c: Option<u32>, md5: &'static [u8]) -> ObjectChecksums {
        let checksums = ObjectChecksums::new().set_md5_hash(bytes::Bytes::from_static(md5));
        match crc32c {
            Some(v) => checksums.set_crc32c(v),
            None => checksums,
        }
    }

    fn md5_digest(data: &[u8]) -> bytes::Bytes {
        bytes::Bytes::copy_from_slice(&md5::compute(data).0)
    }

    #[test]
    fn null_engine_produces_nothing() {
        let mut engine = Checksum::null();
        engine.update(QUOTE);
        assert_eq!(engine.finalize(), ObjectChecksums::new());
    }

    #[test]
    fn crc32c_over_split_writes() {
        let mut engine = Checksum::crc32c();
        for part in QUOTE.chunks(7) {
            engine.update(part);
        }
        let want = crc32c::crc32c(QUOTE);
        assert_eq!(engine.finalize(), ObjectChecksums::new().set_crc32c(want));
    }

    #[test]
    fn md5_over_split_writes() {
        let mut engine = Checksum::md5();
        for part in QUOTE.chunks(5) {
            engine.update(part);
        }
        assert_eq!(
            engine.finalize(),
            ObjectChecksums::new().set_md5_hash(md5_digest(QUOTE))
        );
    }

    #[test]
    fn full_engine_computes_both() {
        let mut engine = Checksum::full();
        engine.update(QUOTE);
        let got = engine.finalize();
        assert_eq!(got.crc32c, Some(crc32c::crc32c(QUOTE)));
        assert_eq!(got.md5_hash, md5_digest(QUOTE));
    }

    #[test]
    fn engine_without_input() {
        assert_eq!(
            Checksum::crc32c().finalize(),
            ObjectChecksums::new().set_crc32c(0_u32)
        );
        assert_eq!(
            Checksum::md5().finalize(),
            ObjectChecksums::new().set_md5_hash(md5_digest(b""))
        );
    }

    #[test]
    fn merge_prefers_provided_values() {
        let merged = merge(checks(Some(1), b"abc"), checks(Some(2), b"cde"));
        assert_eq!(merged, checks(Some(1), b"abc"));
    }

    #[test]
    fn merge_fills_missing_values() {
        let merged = merge(checks(Some(1), b""), checks(Some(2), b"cde"));
        assert_eq!(merged, checks(Some(1), b"cde"));
        let merged = merge(checks(None, b"abc"), checks(Some(2), b"cde"));
        assert_eq!(merged, checks(Some(2), b"abc"));
        let merged = merge(checks(None, b""), checks(None, b""));
        assert_eq!(merged, ObjectChecksums::new());
    }

    #[test_case(checks(Some(1), b"abc"), Some(checks(Some(1), b"abc")); "all match")]
    #[test_case(checks(Some(1), b"abc"), Some(checks(None, b"abc")); "service omits crc32c")]
    #[test_case(checks(Some(1), b"abc"), Some(checks(Some(1), b"")); "service omits md5")]
    #[test_case(checks(None, b""), Some(checks(Some(2), b"cde")); "nothing expected")]
    #[test_case(checks(Some(1), b"abc"), None; "nothing reported")]
    fn validate_accepts(want: ObjectChecksums, got: Option<ObjectChecksums>) {
        let result = validate(&want, &got);
        assert!(result.is_ok(), "{result:?}");
    }

    #[test_case(checks(Some(1), b""), checks(Some(2), b""); "wrong crc32c")]
    #[test_case(checks(None, b"abc"), checks(None, b"cde"); "wrong md5")]
    #[test_case(checks(Some(1), b"abc"), checks(Some(2), b"cde"); "both wrong")]
    #[test_case(checks(Some(1), b"abc"), checks(Some(1), b"cde"); "md5 wrong, crc32c right")]
    fn validate_rejects(want: ObjectChecksums, reported: ObjectChecksums) {
        let err = validate(&want, &Some(reported.clone()))
            .expect_err("the checksums should not match");
        assert!(
            matches!(
                &err,
                UploadError::ChecksumMismatch { got, want: w }
                    if got.as_ref() == &reported && w.as_ref() == &want
            ),
            "{err:?}"
        );
    }

    #[test]
    fn debug_hides_md5_state() {
        let fmt = format!("{:?}", Checksum::full());
        assert!(fmt.contains("crc32c"), "{fmt}");
        assert!(fmt.contains("<enabled>"), "{fmt}");
    }
}
