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

//! Loose objects under `objects/<2-hex>/<rest-hex>`.

use std::fs;
use std::io;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;

use crate::file_util;
use crate::object_id::Oid;

pub fn object_path(objects_dir: &Path, id: &Oid) -> PathBuf {
    let hex = id.hex();
    objects_dir.join(&hex[..2]).join(&hex[2..])
}

/// Reads the raw (still zlib-compressed) bytes of a loose object, if present.
pub fn read(objects_dir: &Path, id: &Oid) -> io::Result<Option<Vec<u8>>> {
    match fs::read(object_path(objects_dir, id)) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

pub fn exists(objects_dir: &Path, id: &Oid) -> bool {
    object_path(objects_dir, id).exists()
}

/// Writes a loose object atomically: write to a temp file in the shard
/// directory, then rename into place. A pre-existing file with the same name
/// already has the right bytes (objects are content-addressed), so this is
/// idempotent.
pub fn write(objects_dir: &Path, id: &Oid, compressed: &[u8]) -> Result<(), file_util::PathError> {
    use file_util::IoResultExt as _;
    let path = object_path(objects_dir, id);
    let dir = path.parent().unwrap();
    file_util::create_or_reuse_dir(dir).context(dir)?;
    if path.exists() {
        return Ok(());
    }
    let mut temp = tempfile::Builder::new()
        .prefix("tmp_obj_")
        .tempfile_in(dir)
        .context(dir)?;
    temp.write_all(compressed).context(dir)?;
    file_util::persist_content_addressed_temp_file(temp, &path).context(&path)?;
    Ok(())
}

/// Walks `objects/<2-hex>/*` shard directories, yielding `(id, full-hex)` for
/// abbreviation lookup. Cheap enough for the rare ambiguous-prefix case; the
/// common case is resolved via the fan-out table in pack indices.
pub fn all_ids(objects_dir: &Path) -> io::Result<Vec<Oid>> {
    let mut ids = Vec::new();
    let Ok(shards) = fs::read_dir(objects_dir) else {
        return Ok(ids);
    };
    for shard in shards {
        let shard = shard?;
        let name = shard.file_name();
        let Some(prefix) = name.to_str().filter(|s| s.len() == 2) else {
            continue;
        };
        if prefix == "pack" || prefix == "info" {
            continue;
        }
        for entry in fs::read_dir(shard.path())? {
            let entry = entry?;
            if let Some(rest) = entry.file_name().to_str() {
                if let Some(bytes) = crate::hex_util::decode_hex(format!("{prefix}{rest}")) {
                    ids.push(Oid::new(bytes));
                }
            }
        }
    }
    Ok(ids)
}
