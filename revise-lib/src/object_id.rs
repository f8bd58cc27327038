// Copyright 2020-2024 The Jujutsu Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Content-hash object identifiers, shared across the four object kinds.

use std::fmt;
use std::fmt::Debug;

use crate::hex_util;

/// Common behavior of the four id newtypes below.
pub trait ObjectId {
    fn object_type(&self) -> &'static str;
    fn as_bytes(&self) -> &[u8];
    fn hex(&self) -> String;
}

/// Defines a new struct wrapping a content hash, with `Debug`/`Display`/
/// `ObjectId` impls derived from its bytes. Each variant corresponds to one
/// of the four VCS object kinds.
macro_rules! id_type {
    ($(#[$attr:meta])* $vis:vis $name:ident, $kind:literal) => {
        $(#[$attr])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        $vis struct $name(Vec<u8>);

        impl $name {
            pub fn new(bytes: Vec<u8>) -> Self {
                Self(bytes)
            }

            pub fn from_bytes(bytes: &[u8]) -> Self {
                Self(bytes.to_vec())
            }

            pub fn try_from_hex(hex: impl AsRef<[u8]>) -> Option<Self> {
                hex_util::decode_hex(hex).map(Self)
            }
        }

        impl crate::object_id::ObjectId for $name {
            fn object_type(&self) -> &'static str {
                $kind
            }

            fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            fn hex(&self) -> String {
                hex_util::encode_hex(&self.0)
            }
        }

        impl Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.hex()).finish()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(&self.hex())
            }
        }
    };
}

id_type!(
    /// Identifies a commit object.
    pub CommitId, "commit"
);
id_type!(
    /// Identifies a tree object.
    pub TreeId, "tree"
);
id_type!(
    /// Identifies a blob object.
    pub BlobId, "blob"
);
id_type!(
    /// Identifies a tag object.
    pub TagId, "tag"
);

/// A generic object id, used where the kind is determined at parse time
/// rather than by the type system (e.g. a tree entry's child, which can be a
/// tree or a blob depending on the entry's mode).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Oid(Vec<u8>);

impl Oid {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn hex(&self) -> String {
        hex_util::encode_hex(&self.0)
    }
}

impl Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Oid").field(&self.hex()).finish()
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.hex())
    }
}

impl From<CommitId> for Oid {
    fn from(id: CommitId) -> Self {
        Self(id.0)
    }
}

impl From<TreeId> for Oid {
    fn from(id: TreeId) -> Self {
        Self(id.0)
    }
}

impl From<BlobId> for Oid {
    fn from(id: BlobId) -> Self {
        Self(id.0)
    }
}

/// An abbreviated object identifier: a hex prefix with possibly-odd length.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HexPrefix {
    // For odd-length prefixes, the lower 4 bits of the last byte are
    // zero-filled (e.g. the prefix "abc" is stored in two bytes as "abc0").
    min_prefix_bytes: Vec<u8>,
    has_odd_byte: bool,
}

impl HexPrefix {
    pub fn try_from_hex(prefix: impl AsRef<[u8]>) -> Option<Self> {
        let (min_prefix_bytes, has_odd_byte) = hex_util::decode_hex_prefix(prefix.as_ref())?;
        Some(Self {
            min_prefix_bytes,
            has_odd_byte,
        })
    }

    pub fn hex(&self) -> String {
        let mut hex_string = hex_util::encode_hex(&self.min_prefix_bytes);
        if self.has_odd_byte {
            hex_string.pop().unwrap();
        }
        hex_string
    }

    pub fn min_prefix_bytes(&self) -> &[u8] {
        &self.min_prefix_bytes
    }

    /// Returns the bytes representation if this prefix is actually a full id
    /// (even number of hex digits).
    pub fn as_full_bytes(&self) -> Option<&[u8]> {
        (!self.has_odd_byte).then_some(&self.min_prefix_bytes)
    }

    fn split_odd_byte(&self) -> (Option<u8>, &[u8]) {
        if self.has_odd_byte {
            let (&odd, prefix) = self.min_prefix_bytes.split_last().unwrap();
            (Some(odd), prefix)
        } else {
            (None, &self.min_prefix_bytes)
        }
    }

    pub fn matches(&self, id_bytes: &[u8]) -> bool {
        let (maybe_odd, prefix) = self.split_odd_byte();
        if id_bytes.starts_with(prefix) {
            if let Some(odd) = maybe_odd {
                matches!(id_bytes.get(prefix.len()), Some(v) if v & 0xf0 == odd)
            } else {
                true
            }
        } else {
            false
        }
    }
}

/// The result of resolving a prefix against the object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefixResolution<T> {
    NoMatch,
    SingleMatch(T),
    AmbiguousMatch,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_hex() {
        let id = CommitId::from_bytes(b"\xde\xad\xbe\xef");
        assert_eq!(format!("{id}"), "deadbeef");
    }

    #[test]
    fn hex_prefix_matches() {
        let id = CommitId::from_bytes(b"\x12\x34");
        assert!(HexPrefix::try_from_hex("").unwrap().matches(id.as_bytes()));
        assert!(HexPrefix::try_from_hex("12").unwrap().matches(id.as_bytes()));
        assert!(HexPrefix::try_from_hex("123").unwrap().matches(id.as_bytes()));
        assert!(!HexPrefix::try_from_hex("124").unwrap().matches(id.as_bytes()));
        assert!(!HexPrefix::try_from_hex("12345").unwrap().matches(id.as_bytes()));
    }

    #[test]
    fn hex_prefix_odd_length() {
        let prefix = HexPrefix::try_from_hex("123").unwrap();
        assert_eq!(prefix.min_prefix_bytes(), b"\x12\x30");
        assert_eq!(prefix.hex(), "123");
        assert_eq!(prefix.as_full_bytes(), None);
    }
}
