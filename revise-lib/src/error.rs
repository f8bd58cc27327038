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

//! The error taxonomy shared by every core component (§7 of the design).

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::object_id::Oid;

/// Errors produced while parsing or serializing an on-disk object (C1).
#[derive(Debug, Error)]
pub enum CorruptObjectError {
    #[error("object {id} has corrupt header: {message}")]
    BadHeader { id: String, message: String },
    #[error("object {id} is truncated")]
    Truncated { id: String },
    #[error("tree {id} has out-of-order or duplicate entry {name:?}")]
    TreeOutOfOrder { id: String, name: Vec<u8> },
    #[error("failed to inflate object {id}")]
    Inflate {
        id: String,
        #[source]
        source: io::Error,
    },
}

/// The error taxonomy exposed to callers of the core (§7). Every fatal branch
/// the rewrite engine can take surfaces as one of these variants.
#[derive(Debug, Error)]
pub enum RiseError {
    #[error(transparent)]
    CorruptObject(#[from] CorruptObjectError),

    #[error("object not found: {0}")]
    MissingObject(String),

    #[error("ambiguous abbreviation {prefix:?} matches {count} objects")]
    AmbiguousOid { prefix: String, count: usize },

    #[error("bad revision {0:?}")]
    BadRevision(String),

    #[error("commit {0} has more than one parent; revise does not rewrite merges")]
    MergeInRange(String),

    #[error("conflict in {path:?} was not resolved before the editor exited")]
    UnresolvedConflict { path: Vec<u8> },

    #[error("aborted")]
    UserAbort,

    #[error("`{cmd}` failed: {stderr}")]
    VcsFailed { cmd: String, stderr: String },

    #[error("ref {name} update failed: expected {expected}, found {actual}")]
    RefUpdateFailed {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("invalid todo list: {0}")]
    TodoInvalid(String),

    #[error("cannot access {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl RiseError {
    pub fn missing(id: &Oid) -> Self {
        Self::MissingObject(id.hex())
    }

    /// The process exit code this error should map to (§6).
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::UserAbort => 1,
            Self::VcsFailed { .. } => 128,
            Self::BadRevision(_) => 2,
            _ => 1,
        }
    }
}

pub type RiseResult<T> = Result<T, RiseError>;
