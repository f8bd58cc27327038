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

//! On-disk object database access: loose files plus read-only packs. This is
//! the bottom half of C3 — [`crate::cache::ObjectCache`] is the typed,
//! deduplicating layer built on top.

pub mod loose;
pub mod pack;

use std::path::Path;
use std::path::PathBuf;

use crate::error::CorruptObjectError;
use crate::error::RiseError;
use crate::object::Object;
use crate::object::ObjectKind;
use crate::object_id::Oid;

pub struct Odb {
    objects_dir: PathBuf,
    packs: Vec<pack::Pack>,
}

impl Odb {
    pub fn open(git_dir: &Path) -> Result<Self, RiseError> {
        let objects_dir = git_dir.join("objects");
        let packs = pack::open_all(&objects_dir).map_err(|err| RiseError::Io {
            path: objects_dir.clone(),
            source: std::io::Error::other(err),
        })?;
        Ok(Self { objects_dir, packs })
    }

    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }

    /// Reads and parses an object, checking loose storage before packs (new
    /// objects the engine itself just wrote are always loose and most
    /// likely to be re-read soon).
    pub fn read(&self, id: &Oid) -> Result<Option<Object>, RiseError> {
        if let Some(compressed) = loose::read(&self.objects_dir, id).map_err(|source| {
            RiseError::Io {
                path: loose::object_path(&self.objects_dir, id),
                source,
            }
        })? {
            let (_, object) = crate::object::parse_loose_object(&compressed)
                .map_err(|err| annotate(err, id))?;
            return Ok(Some(object));
        }
        for pack in &self.packs {
            let found = pack
                .read_object(id, &|base_id| self.read_raw_for_delta_base(base_id))
                .map_err(|err| RiseError::Io {
                    path: pack.name().to_owned(),
                    source: std::io::Error::other(err),
                })?;
            if let Some((kind, body)) = found {
                let object = crate::object::parse_body(kind, &id.hex(), &body)
                    .map_err(|err| annotate(err, id))?;
                return Ok(Some(object));
            }
        }
        Ok(None)
    }

    fn read_raw_for_delta_base(&self, id: &Oid) -> Option<Vec<u8>> {
        let compressed = loose::read(&self.objects_dir, id).ok().flatten()?;
        let mut decoder = flate2::read::ZlibDecoder::new(compressed.as_slice());
        let mut raw = Vec::new();
        std::io::Read::read_to_end(&mut decoder, &mut raw).ok()?;
        let nul = raw.iter().position(|&b| b == 0)?;
        Some(raw[nul + 1..].to_vec())
    }

    pub fn exists(&self, id: &Oid) -> bool {
        loose::exists(&self.objects_dir, id) || self.packs.iter().any(|p| p.contains(id))
    }

    pub fn write_loose(&self, kind: ObjectKind, id: &Oid, body: &[u8]) -> Result<(), RiseError> {
        let compressed = crate::object::serialize_loose_object(kind, body);
        loose::write(&self.objects_dir, id, &compressed).map_err(|err| RiseError::Io {
            path: err.path,
            source: err.source,
        })
    }

    /// All ids known to loose storage or any pack, for abbreviation scans.
    pub fn all_ids(&self) -> Result<Vec<Oid>, RiseError> {
        let mut ids = loose::all_ids(&self.objects_dir).map_err(|source| RiseError::Io {
            path: self.objects_dir.clone(),
            source,
        })?;
        for pack in &self.packs {
            ids.extend(pack.ids().iter().cloned());
        }
        Ok(ids)
    }
}

fn annotate(err: CorruptObjectError, id: &Oid) -> RiseError {
    let hex = id.hex();
    let err = match err {
        CorruptObjectError::BadHeader { message, .. } => CorruptObjectError::BadHeader {
            id: hex,
            message,
        },
        CorruptObjectError::Truncated { .. } => CorruptObjectError::Truncated { id: hex },
        CorruptObjectError::TreeOutOfOrder { name, .. } => {
            CorruptObjectError::TreeOutOfOrder { id: hex, name }
        }
        CorruptObjectError::Inflate { source, .. } => CorruptObjectError::Inflate {
            id: hex,
            source,
        },
    };
    RiseError::CorruptObject(err)
}
