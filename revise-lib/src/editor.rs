// Copyright 2022 The Jujutsu Authors
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

//! Scoped, temp-file-backed editor round trips: used for the interactive
//! todo list, commit message rewording, and the conflict-marker fallback in
//! the merge engine.

use std::fs;
use std::io;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;

use crate::config::CommandNameAndArgs;
use crate::file_util::IoResultExt as _;
use crate::file_util::PathError;

#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error("failed to run editor '{name}'")]
    FailedToRun {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("editor '{command}' exited with {status}")]
    ExitStatus {
        command: String,
        status: std::process::ExitStatus,
    },
    #[error(transparent)]
    Path(#[from] PathError),
}

/// A configured editor bound to a scratch directory. Every temp file it
/// creates is cleaned up after a successful round trip; a failed round trip
/// leaves the file behind so its path can be reported to the user.
pub struct Editor {
    command: CommandNameAndArgs,
    scratch_dir: PathBuf,
}

impl Editor {
    pub fn new(command: CommandNameAndArgs, scratch_dir: PathBuf) -> Self {
        Self {
            command,
            scratch_dir,
        }
    }

    pub fn edit_file(&self, path: &Path) -> Result<(), EditError> {
        let mut cmd = self.command.to_command();
        cmd.arg(path);
        tracing::debug!(?cmd, "running editor");
        let status = cmd
            .status()
            .map_err(|source| EditError::FailedToRun {
                name: self.command.split_name().into_owned(),
                source,
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(EditError::ExitStatus {
                command: self.command.to_string(),
                status,
            })
        }
    }

    /// Writes `content` to a fresh temp file named with `suffix` (e.g.
    /// `"-todo"`, `"-COMMIT_EDITMSG"`), opens it in the editor, and returns
    /// the edited content. The temp file is removed on success only, so a
    /// failed edit (editor crash, non-zero exit) leaves evidence behind.
    pub fn edit_text(&self, content: &[u8], suffix: &str) -> Result<Vec<u8>, EditError> {
        let path = self.write_scratch_file(content, suffix)?;
        self.edit_file(&path)?;
        let edited = fs::read(&path).context(&path)?;
        fs::remove_file(&path).ok();
        Ok(edited)
    }

    fn write_scratch_file(&self, content: &[u8], suffix: &str) -> Result<PathBuf, PathError> {
        crate::file_util::create_or_reuse_dir(&self.scratch_dir).context(&self.scratch_dir)?;
        let mut file = tempfile::Builder::new()
            .prefix("revise-")
            .suffix(suffix)
            .tempfile_in(&self.scratch_dir)
            .context(&self.scratch_dir)?;
        file.write_all(content).context(file.path())?;
        let (_, path) = file
            .keep()
            .map_err(|err| PathError {
                path: self.scratch_dir.clone(),
                source: err.error,
            })?;
        Ok(path)
    }
}
