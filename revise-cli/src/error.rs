// Copyright 2024 The Jujutsu Authors
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

//! Argument-level misuse that never reaches `revise_lib` — clap catches most
//! of it, but a few conditions only make sense once a repository is open.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] revise_lib::RiseError),

    #[error("HEAD is detached; pass --ref to name the ref revise should update")]
    DetachedHead,

    #[error("-m/--message is not supported with -i/--interactive")]
    MessageWithInteractive,

    #[error("{0}")]
    Usage(String),
}

impl CliError {
    /// §6's exit code table: core errors already know their own code, CLI
    /// misuse is always 2.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Core(err) => err.exit_code(),
            Self::DetachedHead | Self::MessageWithInteractive | Self::Usage(_) => 2,
        }
    }
}
