// Copyright 2021 The Jujutsu Authors
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

//! C8: "reuse recorded resolution" — memoizes hand-resolved blob conflicts
//! keyed by a normalized fingerprint of the three conflicting hunks, so a
//! conflict seen and resolved once doesn't need the editor again.

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use sha1::Digest as _;

use crate::error::RiseError;

/// A store rooted at `<git-dir>/rr-cache`, one subdirectory per fingerprint
/// holding the recorded resolution bytes (`postimage`). This mirrors the
/// VCS's own `rr-cache` layout closely enough that an external `git rerere
/// gc` would still find and expire our entries.
pub struct RerereStore {
    root: PathBuf,
}

impl RerereStore {
    pub fn new(git_dir: &Path) -> Self {
        Self {
            root: git_dir.join("rr-cache"),
        }
    }

    pub fn lookup(&self, fingerprint: &str) -> Option<Vec<u8>> {
        fs::read(self.entry_path(fingerprint)).ok()
    }

    pub fn record(&self, fingerprint: &str, resolution: &[u8]) -> Result<(), RiseError> {
        let path = self.entry_path(fingerprint);
        let dir = path.parent().unwrap();
        crate::file_util::create_or_reuse_dir(dir).map_err(|source| RiseError::Io {
            path: dir.to_owned(),
            source,
        })?;
        fs::write(&path, resolution).map_err(|source| RiseError::Io { path, source })
    }

    fn entry_path(&self, fingerprint: &str) -> PathBuf {
        self.root.join(fingerprint).join("postimage")
    }
}

/// Computes a normalized-conflict fingerprint from the three sides of a blob
/// merge: whitespace is collapsed (so re-indented-but-otherwise-identical
/// conflicts still match) and the result is hashed. This is a
/// straightforward analogue of the VCS's own rerere preimage hash; it does
/// not attempt the VCS's further step of canonicalizing variable identifiers,
/// since that requires a language-aware tokenizer the core has no use for
/// outside this single feature.
pub fn fingerprint(base: &[u8], ours: &[u8], theirs: &[u8]) -> String {
    let mut hasher = sha1::Sha1::new();
    for side in [base, ours, theirs] {
        hasher.update(normalize_whitespace(side));
        hasher.update(b"\0");
    }
    hex_digest(&hasher.finalize())
}

fn normalize_whitespace(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut last_was_space = false;
    for &b in bytes {
        if b == b' ' || b == b'\t' {
            if !last_was_space {
                out.push(b' ');
            }
            last_was_space = true;
        } else {
            out.push(b);
            last_was_space = false;
        }
    }
    out
}

fn hex_digest(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_ignores_whitespace_width() {
        let a = fingerprint(b"base", b"  ours", b"theirs");
        let b = fingerprint(b"base", b" ours", b"theirs");
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_distinguishes_content() {
        let a = fingerprint(b"base", b"ours", b"theirs");
        let b = fingerprint(b"base", b"ours2", b"theirs");
        assert_ne!(a, b);
    }

    #[test]
    fn records_and_looks_up_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let store = RerereStore::new(dir.path());
        let fp = fingerprint(b"base", b"ours", b"theirs");
        assert!(store.lookup(&fp).is_none());
        store.record(&fp, b"resolved content").unwrap();
        assert_eq!(store.lookup(&fp).unwrap(), b"resolved content");
    }
}
