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

//! The core engine behind `revise`: a history-rewriting tool over a
//! content-addressed source-control repository. This crate implements the
//! object codec, the object cache, the revision parser, the purely
//! functional three-way tree merge, the interactive todo program, the
//! rewrite (replay) engine, and an optional rerere-style conflict memoizer.
//! It never touches the user's working tree or staging area; the CLI crate
//! (`revise`) is the only thing that talks to the terminal.

pub mod cache;
pub mod config;
pub mod editor;
pub mod error;
pub mod file_util;
pub mod hex_util;
pub mod merge;
pub mod object;
pub mod object_id;
pub mod odb;
pub mod repo;
pub mod rerere;
pub mod revision;
pub mod rewrite;
pub mod todo;

pub use error::RiseError;
pub use error::RiseResult;
