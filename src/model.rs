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

//! Value types exchanged with the chunk transport.

/// The metadata of a finalized object.
///
/// The upload core treats this type as opaque: it is produced by the
/// transport when an upload finalizes and returned to the application
/// unchanged, except for checksum validation.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct Object {
    /// The name of the object.
    pub name: String,

    /// The name of the bucket containing the object.
    pub bucket: String,

    /// The content generation of the object.
    pub generation: i64,

    /// The size of the finalized object, in bytes.
    pub size: u64,

    /// The checksums reported by the service, if any.
    pub checksums: Option<ObjectChecksums>,
}

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value of [name][Object::name].
    pub fn set_name<V: Into<String>>(mut self, v: V) -> Self {
        self.name = v.into();
        self
    }

    /// Sets the value of [bucket][Object::bucket].
    pub fn set_bucket<V: Into<String>>(mut self, v: V) -> Self {
        self.bucket = v.into();
        self
    }

    /// Sets the value of [generation][Object::generation].
    pub fn set_generation<V: Into<i64>>(mut self, v: V) -> Self {
        self.generation = v.into();
        self
    }

    /// Sets the value of [size][Object::size].
    pub fn set_size<V: Into<u64>>(mut self, v: V) -> Self {
        self.size = v.into();
        self
    }

    /// Sets the value of [checksums][Object::checksums].
    pub fn set_checksums<V: Into<ObjectChecksums>>(mut self, v: V) -> Self {
        self.checksums = Some(v.into());
        self
    }
}

/// Message used for storing full (not subrange) object checksums.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct ObjectChecksums {
    /// CRC32C digest of the object data, if computed or known.
    pub crc32c: Option<u32>,

    /// MD5 hash of the object data. Empty if not computed or not known.
    pub md5_hash: bytes::Bytes,
}

impl ObjectChecksums {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value of [crc32c][ObjectChecksums::crc32c].
    pub fn set_crc32c<V: Into<u32>>(mut self, v: V) -> Self {
        self.crc32c = Some(v.into());
        self
    }

    /// Sets the value of [md5_hash][ObjectChecksums::md5_hash].
    pub fn set_md5_hash<V: Into<bytes::Bytes>>(mut self, v: V) -> Self {
        self.md5_hash = v.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_builder() {
        let object = Object::new()
            .set_name("test-object")
            .set_bucket("projects/_/buckets/test-bucket")
            .set_generation(1234_i64)
            .set_size(2048_u64)
            .set_checksums(ObjectChecksums::new().set_crc32c(0x01020304_u32));
        assert_eq!(object.name, "test-object");
        assert_eq!(object.bucket, "projects/_/buckets/test-bucket");
        assert_eq!(object.generation, 1234);
        assert_eq!(object.size, 2048);
        assert_eq!(
            object.checksums.and_then(|c| c.crc32c),
            Some(0x01020304_u32)
        );
    }

    #[test]
    fn checksums_builder() {
        let checksums = ObjectChecksums::new()
            .set_crc32c(7_u32)
            .set_md5_hash(bytes::Bytes::from_static(b"0123456789abcdef"));
        assert_eq!(checksums.crc32c, Some(7));
        assert_eq!(
            checksums.md5_hash,
            bytes::Bytes::from_static(b"0123456789abcdef")
        );
    }
}
