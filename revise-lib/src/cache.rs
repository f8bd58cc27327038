// Copyright 2020 The Jujutsu Authors
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

//! C3: the typed, deduplicating object cache that sits in front of the ODB.
//!
//! Every read in the engine goes through here, and every object the rewrite
//! engine constructs is held here — unpersisted — until [`ObjectCache::flush`]
//! writes it out as a single atomic batch just before the ref update.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::RiseError;
use crate::object::HashAlgorithm;
use crate::object::Object;
use crate::object::ObjectKind;
use crate::object::hash_object;
use crate::object::serialize_body;
use crate::object_id::HexPrefix;
use crate::object_id::Oid;
use crate::object_id::PrefixResolution;
use crate::odb::Odb;

struct Entry {
    object: Object,
    persisted: bool,
}

/// Typed, deduplicating cache mapping object id to hydrated object. New,
/// not-yet-persisted objects live in the same map as objects read from disk;
/// the `persisted` flag on each entry is all that distinguishes them.
pub struct ObjectCache {
    odb: Odb,
    algo: HashAlgorithm,
    entries: RefCell<HashMap<Oid, Entry>>,
}

impl ObjectCache {
    pub fn new(odb: Odb, algo: HashAlgorithm) -> Self {
        Self {
            odb,
            algo,
            entries: RefCell::new(HashMap::new()),
        }
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.algo
    }

    /// Returns a hydrated object for `id`, reading through to the ODB on a
    /// cache miss. Lookups are idempotent: once a miss has been hydrated,
    /// every later lookup for the same id returns the identical logical
    /// object without touching disk again.
    pub fn get(&self, id: &Oid) -> Result<Object, RiseError> {
        if let Some(entry) = self.entries.borrow().get(id) {
            return Ok(entry.object.clone());
        }
        let object = self.odb.read(id)?.ok_or_else(|| RiseError::missing(id))?;
        self.entries.borrow_mut().insert(
            id.clone(),
            Entry {
                object: object.clone(),
                persisted: true,
            },
        );
        Ok(object)
    }

    /// Resolves an abbreviated hex prefix to a full object id, requiring a
    /// unique match across the cache (including unpersisted objects), loose
    /// storage, and all open packs.
    pub fn get_abbrev(&self, prefix: &HexPrefix) -> Result<Oid, RiseError> {
        if let Some(full) = prefix.as_full_bytes() {
            let id = Oid::new(full.to_vec());
            if self.entries.borrow().contains_key(&id) || self.odb.exists(&id) {
                return Ok(id);
            }
            return Err(RiseError::MissingObject(prefix.hex()));
        }
        let mut candidates: Vec<Oid> = self
            .entries
            .borrow()
            .keys()
            .filter(|id| prefix.matches(id.as_bytes()))
            .cloned()
            .collect();
        for id in self.odb.all_ids()? {
            if prefix.matches(id.as_bytes()) && !candidates.contains(&id) {
                candidates.push(id);
            }
        }
        match candidates.len() {
            0 => Err(RiseError::MissingObject(prefix.hex())),
            1 => Ok(candidates.pop().unwrap()),
            count => Err(RiseError::AmbiguousOid {
                prefix: prefix.hex(),
                count,
            }),
        }
    }

    /// Attempts to resolve a prefix without erroring on ambiguity, for
    /// callers (like the revision parser) that want to report their own
    /// context around the failure.
    pub fn resolve_prefix(&self, prefix: &HexPrefix) -> Result<PrefixResolution<Oid>, RiseError> {
        match self.get_abbrev(prefix) {
            Ok(id) => Ok(PrefixResolution::SingleMatch(id)),
            Err(RiseError::MissingObject(_)) => Ok(PrefixResolution::NoMatch),
            Err(RiseError::AmbiguousOid { .. }) => Ok(PrefixResolution::AmbiguousMatch),
            Err(other) => Err(other),
        }
    }

    /// Hashes, inserts (marked unpersisted), and returns the id of a newly
    /// constructed object. Deduplicates against anything already cached.
    pub fn new_object(&self, object: Object) -> Oid {
        let body = serialize_body(&object);
        let id = hash_object(self.algo, object.kind(), &body);
        let mut entries = self.entries.borrow_mut();
        entries.entry(id.clone()).or_insert_with(|| Entry {
            object,
            persisted: false,
        });
        id
    }

    pub fn kind_of(&self, id: &Oid) -> Result<ObjectKind, RiseError> {
        Ok(self.get(id)?.kind())
    }

    /// Performs a post-order traversal from `root` and persists every
    /// unpersisted object reached: any object reachable from a persisted
    /// object must itself be persisted first (§3's invariant), so children
    /// are written before their referrer. Idempotent — re-flushing the same
    /// root after a successful flush writes nothing.
    pub fn flush(&self, root: &Oid) -> Result<(), RiseError> {
        let mut visited = std::collections::HashSet::new();
        self.flush_recursive(root, &mut visited)
    }

    fn flush_recursive(
        &self,
        id: &Oid,
        visited: &mut std::collections::HashSet<Oid>,
    ) -> Result<(), RiseError> {
        if !visited.insert(id.clone()) {
            return Ok(());
        }
        let already_persisted = self
            .entries
            .borrow()
            .get(id)
            .map(|e| e.persisted)
            .unwrap_or(true); // not in cache at all => it came from disk already
        if already_persisted {
            return Ok(());
        }
        let object = self.entries.borrow().get(id).unwrap().object.clone();
        for child in children_of(&object) {
            self.flush_recursive(&child, visited)?;
        }
        let body = serialize_body(&object);
        self.odb.write_loose(object.kind(), id, &body)?;
        if let Some(entry) = self.entries.borrow_mut().get_mut(id) {
            entry.persisted = true;
        }
        Ok(())
    }
}

fn children_of(object: &Object) -> Vec<Oid> {
    match object {
        Object::Blob(_) => vec![],
        Object::Tree(tree) => tree.entries().iter().map(|e| e.oid.clone()).collect(),
        Object::Commit(commit) => {
            let mut ids = vec![Oid::from(commit.tree.clone())];
            ids.extend(commit.parents.iter().cloned().map(Oid::from));
            ids
        }
        Object::Tag(tag) => vec![tag.object.clone()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::FileMode;
    use crate::object::Tree;
    use crate::object::TreeEntry;

    fn empty_cache() -> ObjectCache {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("objects/pack")).unwrap();
        let odb = Odb::open(dir.path()).unwrap();
        // Leak the tempdir for the duration of the test process; fine for a
        // short-lived unit test.
        std::mem::forget(dir);
        ObjectCache::new(odb, HashAlgorithm::Sha1)
    }

    #[test]
    fn new_object_is_idempotent_lookup() {
        let cache = empty_cache();
        let id = cache.new_object(Object::Blob(b"hi".to_vec()));
        let first = cache.get(&id).unwrap();
        let second = cache.get(&id).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn new_object_deduplicates_identical_content() {
        let cache = empty_cache();
        let a = cache.new_object(Object::Blob(b"same".to_vec()));
        let b = cache.new_object(Object::Blob(b"same".to_vec()));
        assert_eq!(a, b);
    }

    #[test]
    fn flush_persists_children_before_parent() {
        let cache = empty_cache();
        let blob_id = cache.new_object(Object::Blob(b"contents".to_vec()));
        let tree = Tree::from_entries(vec![TreeEntry {
            name: b"file.txt"[..].into(),
            mode: FileMode::Regular,
            oid: blob_id,
        }])
        .unwrap();
        let tree_id = cache.new_object(Object::Tree(tree));
        cache.flush(&tree_id).unwrap();
        assert!(cache.odb.exists(&tree_id));
        // Flushing again must not error (idempotent).
        cache.flush(&tree_id).unwrap();
    }
}
