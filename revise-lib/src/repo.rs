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

//! C2: the repository handle. Locates the on-disk repository, owns the
//! object cache, resolves and atomically updates refs with a reflog entry,
//! and shells out to the VCS binary for the handful of things the core
//! doesn't implement itself (three-way blob merges, the user's editor).

use std::fs;
use std::io;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;
use std::process::Stdio;

use crate::cache::ObjectCache;
use crate::config::GitConfig;
use crate::config::resolve_editor;
use crate::config::resolve_vcs_binary;
use crate::editor::Editor;
use crate::error::RiseError;
use crate::object::HashAlgorithm;
use crate::object_id::CommitId;
use crate::object_id::ObjectId as _;
use crate::odb::Odb;

/// Where `HEAD` currently points.
pub enum HeadTarget {
    /// `ref: refs/heads/<name>`.
    Symbolic(String),
    /// A detached commit id.
    Detached(CommitId),
}

pub struct Repository {
    git_dir: PathBuf,
    config: GitConfig,
    cache: ObjectCache,
}

impl Repository {
    /// Walks up from `start_dir` looking for a `.git` directory (or a bare
    /// repository root, i.e. a directory that is itself a git dir), the same
    /// discovery algorithm `git rev-parse --git-dir` uses.
    pub fn discover(start_dir: &Path) -> Result<Self, RiseError> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(".git");
            if candidate.is_dir() {
                return Self::open(&candidate);
            }
            if is_git_dir(&dir) {
                return Self::open(&dir);
            }
            if !dir.pop() {
                return Err(RiseError::VcsFailed {
                    cmd: "git rev-parse --git-dir".to_owned(),
                    stderr: format!("not a git repository (or any parent up to {start_dir:?})"),
                });
            }
        }
    }

    pub fn open(git_dir: &Path) -> Result<Self, RiseError> {
        let git_dir = git_dir.to_path_buf();
        let config = GitConfig::load(&git_dir);
        let algo = if config.get_str("extensions.objectformat") == Some("sha256") {
            HashAlgorithm::Sha256
        } else {
            HashAlgorithm::Sha1
        };
        let odb = Odb::open(&git_dir)?;
        let cache = ObjectCache::new(odb, algo);
        Ok(Self {
            git_dir,
            config,
            cache,
        })
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    pub fn config(&self) -> &GitConfig {
        &self.config
    }

    pub fn cache(&self) -> &ObjectCache {
        &self.cache
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.git_dir.join("revise")
    }

    pub fn editor(&self) -> Editor {
        Editor::new(resolve_editor(&self.config), self.scratch_dir())
    }

    /// The editor used for the interactive todo list, distinct from the
    /// commit-message editor per `GIT_SEQUENCE_EDITOR`/`sequence.editor`
    /// (§6).
    pub fn sequence_editor(&self) -> Editor {
        Editor::new(
            crate::config::resolve_sequence_editor(&self.config),
            self.scratch_dir(),
        )
    }

    fn vcs_binary(&self) -> String {
        resolve_vcs_binary(&self.config)
    }

    // --- ref resolution -----------------------------------------------

    /// Reads `HEAD`, following exactly one level of symbolic indirection (git
    /// never chains `HEAD` through more than one `ref:` line).
    pub fn read_head(&self) -> Result<HeadTarget, RiseError> {
        let contents = self.read_ref_file("HEAD")?.ok_or_else(|| RiseError::Io {
            path: self.git_dir.join("HEAD"),
            source: io::Error::new(io::ErrorKind::NotFound, "HEAD is missing"),
        })?;
        if let Some(name) = contents.strip_prefix("ref: ") {
            Ok(HeadTarget::Symbolic(name.trim().to_owned()))
        } else {
            let id = CommitId::try_from_hex(contents.trim())
                .ok_or_else(|| RiseError::BadRevision("HEAD".to_owned()))?;
            Ok(HeadTarget::Detached(id))
        }
    }

    /// Resolves `HEAD` all the way down to a commit id.
    pub fn head_commit(&self) -> Result<CommitId, RiseError> {
        match self.read_head()? {
            HeadTarget::Detached(id) => Ok(id),
            HeadTarget::Symbolic(name) => self
                .resolve_ref(&name)?
                .ok_or_else(|| RiseError::BadRevision(name)),
        }
    }

    /// Resolves a fully qualified ref name (e.g. `refs/heads/main`) to a
    /// commit id, checking loose ref files first and falling back to
    /// `packed-refs`.
    pub fn resolve_ref(&self, name: &str) -> Result<Option<CommitId>, RiseError> {
        if let Some(contents) = self.read_ref_file(name)? {
            let hex = contents.trim();
            return Ok(Some(CommitId::try_from_hex(hex).ok_or_else(|| {
                RiseError::BadRevision(format!("{name}: {hex}"))
            })?));
        }
        self.read_packed_ref(name)
    }

    fn read_ref_file(&self, name: &str) -> Result<Option<String>, RiseError> {
        match fs::read_to_string(self.git_dir.join(name)) {
            Ok(s) => Ok(Some(s)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(RiseError::Io {
                path: self.git_dir.join(name),
                source,
            }),
        }
    }

    fn read_packed_ref(&self, name: &str) -> Result<Option<CommitId>, RiseError> {
        let path = self.git_dir.join("packed-refs");
        let text = match fs::read_to_string(&path) {
            Ok(s) => s,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(RiseError::Io { path, source }),
        };
        for line in text.lines() {
            if line.starts_with('#') || line.starts_with('^') {
                continue;
            }
            if let Some((hex, ref_name)) = line.split_once(' ') {
                if ref_name == name {
                    return Ok(CommitId::try_from_hex(hex));
                }
            }
        }
        Ok(None)
    }

    /// Atomically updates `name` from `expected_old` to `new`, refusing the
    /// update if the ref moved since the caller last read it, then appends a
    /// single reflog line. This is the only mutation the engine ever makes to
    /// a ref: the whole rewrite lands as one compare-and-swap (§4.7).
    pub fn update_ref(
        &self,
        name: &str,
        expected_old: Option<&CommitId>,
        new: &CommitId,
        reflog_message: &str,
    ) -> Result<(), RiseError> {
        let current = self.resolve_ref(name)?;
        if current.as_ref() != expected_old {
            return Err(RiseError::RefUpdateFailed {
                name: name.to_owned(),
                expected: expected_old.map_or_else(|| "<unborn>".to_owned(), |id| id.hex()),
                actual: current.map_or_else(|| "<unborn>".to_owned(), |id| id.hex()),
            });
        }
        let path = self.git_dir.join(name);
        let dir = path.parent().unwrap();
        crate::file_util::create_or_reuse_dir(dir).map_err(|source| RiseError::Io {
            path: dir.to_owned(),
            source,
        })?;
        let mut temp = tempfile::Builder::new()
            .prefix("revise-ref-")
            .tempfile_in(dir)
            .map_err(|source| RiseError::Io {
                path: dir.to_owned(),
                source,
            })?;
        writeln!(temp, "{}", new.hex()).map_err(|source| RiseError::Io {
            path: path.clone(),
            source,
        })?;
        crate::file_util::persist_temp_file(temp, &path).map_err(|source| RiseError::Io {
            path: path.clone(),
            source,
        })?;
        self.append_reflog(name, expected_old, new, reflog_message)?;
        Ok(())
    }

    fn append_reflog(
        &self,
        name: &str,
        old: Option<&CommitId>,
        new: &CommitId,
        message: &str,
    ) -> Result<(), RiseError> {
        let log_path = self.git_dir.join("logs").join(name);
        let dir = log_path.parent().unwrap();
        crate::file_util::create_or_reuse_dir(dir).map_err(|source| RiseError::Io {
            path: dir.to_owned(),
            source,
        })?;
        let old_hex = old.map_or_else(|| "0".repeat(40), |id| id.hex());
        let (name_part, email_part) = reflog_identity(&self.config);
        let timestamp = unix_timestamp_now();
        let line = format!(
            "{old_hex} {new_hex} {name_part} <{email_part}> {timestamp} +0000\t{message}\n",
            new_hex = new.hex(),
        );
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(|source| RiseError::Io {
                path: log_path.clone(),
                source,
            })?;
        file.write_all(line.as_bytes())
            .map_err(|source| RiseError::Io {
                path: log_path,
                source,
            })
    }

    // --- VCS subprocess delegation --------------------------------------

    /// Invokes the VCS binary's three-way blob merge driver
    /// (`merge-file -p --diff3`) over three scratch files, returning the
    /// merged (possibly conflict-marked) bytes and whether it was clean.
    pub fn merge_file(
        &self,
        ours: &[u8],
        base: &[u8],
        theirs: &[u8],
        labels: (&str, &str, &str),
    ) -> Result<(Vec<u8>, bool), RiseError> {
        let dir = self.scratch_dir();
        crate::file_util::create_or_reuse_dir(&dir).map_err(|source| RiseError::Io {
            path: dir.clone(),
            source,
        })?;
        let ours_path = write_scratch(&dir, "ours", ours)?;
        let base_path = write_scratch(&dir, "base", base)?;
        let theirs_path = write_scratch(&dir, "theirs", theirs)?;

        let mut cmd = std::process::Command::new(self.vcs_binary());
        cmd.arg("merge-file")
            .arg("-p")
            .arg("--diff3")
            .arg("-L")
            .arg(labels.0)
            .arg("-L")
            .arg(labels.1)
            .arg("-L")
            .arg(labels.2)
            .arg(&ours_path)
            .arg(&base_path)
            .arg(&theirs_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = cmd.output().map_err(|source| RiseError::VcsFailed {
            cmd: "merge-file".to_owned(),
            stderr: source.to_string(),
        })?;
        for path in [&ours_path, &base_path, &theirs_path] {
            let _ = fs::remove_file(path);
        }
        match output.status.code() {
            Some(0) => Ok((output.stdout, true)),
            Some(code) if code > 0 => Ok((output.stdout, false)),
            _ => Err(RiseError::VcsFailed {
                cmd: "merge-file".to_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }),
        }
    }

    /// Produces a unified patch between two trees via `diff-tree -p`, used
    /// by the `cut` todo action to let the user split a commit's changes
    /// (§4.7). Never touches the real working tree or index.
    pub fn diff_tree(&self, from: &crate::object_id::TreeId, to: &crate::object_id::TreeId) -> Result<Vec<u8>, RiseError> {
        use crate::object_id::ObjectId as _;
        let output = std::process::Command::new(self.vcs_binary())
            .arg("diff-tree")
            .arg("-p")
            .arg(from.hex())
            .arg(to.hex())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| RiseError::VcsFailed {
                cmd: "diff-tree".to_owned(),
                stderr: source.to_string(),
            })?;
        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(RiseError::VcsFailed {
                cmd: "diff-tree".to_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }

    /// Writes the current staging area out as a tree via `write-tree`,
    /// honoring `GIT_INDEX_FILE` when set. This is the `S` of §4.7's inputs
    /// for a plain `revise <target>` invocation: the core never reads the
    /// index format itself, it only ever asks the VCS binary for the tree
    /// that results from it.
    pub fn write_tree(&self) -> Result<crate::object_id::TreeId, RiseError> {
        let mut cmd = std::process::Command::new(self.vcs_binary());
        cmd.env("GIT_DIR", &self.git_dir);
        if let Some(index_file) = std::env::var_os("GIT_INDEX_FILE") {
            cmd.env("GIT_INDEX_FILE", index_file);
        }
        let output = cmd
            .arg("write-tree")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| RiseError::VcsFailed {
                cmd: "write-tree".to_owned(),
                stderr: source.to_string(),
            })?;
        if !output.status.success() {
            return Err(RiseError::VcsFailed {
                cmd: "write-tree".to_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        let hex = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        crate::object_id::TreeId::try_from_hex(&hex).ok_or_else(|| RiseError::VcsFailed {
            cmd: "write-tree".to_owned(),
            stderr: format!("unexpected output {hex:?}"),
        })
    }

    /// Applies `patch` onto `base` using a throwaway index file (never the
    /// repository's real `$GIT_INDEX_FILE`), returning the resulting tree.
    /// This is how `cut` turns the user's edited, split-down patch back into
    /// a tree without ever touching the working copy or staging area.
    pub fn apply_patch(
        &self,
        base: &crate::object_id::TreeId,
        patch: &[u8],
    ) -> Result<crate::object_id::TreeId, RiseError> {
        use crate::object_id::ObjectId as _;
        let dir = self.scratch_dir();
        crate::file_util::create_or_reuse_dir(&dir).map_err(|source| RiseError::Io {
            path: dir.clone(),
            source,
        })?;
        let index_path = dir.join(format!("index-{}", std::process::id()));
        let vcs = self.vcs_binary();

        let read_tree = std::process::Command::new(&vcs)
            .env("GIT_INDEX_FILE", &index_path)
            .env("GIT_DIR", &self.git_dir)
            .arg("read-tree")
            .arg(base.hex())
            .output()
            .map_err(|source| RiseError::VcsFailed {
                cmd: "read-tree".to_owned(),
                stderr: source.to_string(),
            })?;
        if !read_tree.status.success() {
            return Err(RiseError::VcsFailed {
                cmd: "read-tree".to_owned(),
                stderr: String::from_utf8_lossy(&read_tree.stderr).into_owned(),
            });
        }

        let patch_path = write_scratch(&dir, "cut", patch)?;
        let apply = std::process::Command::new(&vcs)
            .env("GIT_INDEX_FILE", &index_path)
            .env("GIT_DIR", &self.git_dir)
            .arg("apply")
            .arg("--cached")
            .arg(&patch_path)
            .output()
            .map_err(|source| RiseError::VcsFailed {
                cmd: "apply".to_owned(),
                stderr: source.to_string(),
            })?;
        let _ = fs::remove_file(&patch_path);
        if !apply.status.success() {
            let _ = fs::remove_file(&index_path);
            return Err(RiseError::VcsFailed {
                cmd: "apply".to_owned(),
                stderr: String::from_utf8_lossy(&apply.stderr).into_owned(),
            });
        }

        let write_tree = std::process::Command::new(&vcs)
            .env("GIT_INDEX_FILE", &index_path)
            .env("GIT_DIR", &self.git_dir)
            .arg("write-tree")
            .output()
            .map_err(|source| RiseError::VcsFailed {
                cmd: "write-tree".to_owned(),
                stderr: source.to_string(),
            })?;
        let _ = fs::remove_file(&index_path);
        if !write_tree.status.success() {
            return Err(RiseError::VcsFailed {
                cmd: "write-tree".to_owned(),
                stderr: String::from_utf8_lossy(&write_tree.stderr).into_owned(),
            });
        }
        let hex = String::from_utf8_lossy(&write_tree.stdout).trim().to_owned();
        crate::object_id::TreeId::try_from_hex(&hex)
            .ok_or_else(|| RiseError::VcsFailed {
                cmd: "write-tree".to_owned(),
                stderr: format!("unexpected output {hex:?}"),
            })
    }

    /// Produces a detached, ASCII-armored signature over `payload` (a
    /// commit's canonical bytes with no `gpgsig` header yet) via `gpg.program`
    /// (default `gpg`), the way `commit.gpgSign` signing works: the signature
    /// is computed over the pre-image and only then embedded, so the
    /// signature covers exactly what ends up hashed (§4.7 "Signing").
    pub fn sign_commit_payload(&self, payload: &[u8]) -> Result<Vec<u8>, RiseError> {
        let program = crate::config::gpg_program(&self.config);
        let mut cmd = std::process::Command::new(&program);
        cmd.arg("--status-fd=2").arg("-bsau");
        if let Some(key) = crate::config::signing_key(&self.config) {
            cmd.arg(key);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = cmd.spawn().map_err(|source| RiseError::VcsFailed {
            cmd: program.clone(),
            stderr: source.to_string(),
        })?;
        child
            .stdin
            .take()
            .expect("stdin was piped")
            .write_all(payload)
            .map_err(|source| RiseError::VcsFailed {
                cmd: program.clone(),
                stderr: source.to_string(),
            })?;
        let output = child.wait_with_output().map_err(|source| RiseError::VcsFailed {
            cmd: program.clone(),
            stderr: source.to_string(),
        })?;
        if !output.status.success() {
            return Err(RiseError::VcsFailed {
                cmd: program,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(output.stdout)
    }

    /// Runs the repository's `commit-msg` hook (if present and executable)
    /// against `message`, returning the hook's (possibly rewritten) output.
    /// A non-zero exit aborts the action with `UserAbort`, matching the
    /// VCS's own hook contract (§4.7 — `revise.run-hooks.commit-msg`).
    pub fn run_commit_msg_hook(&self, message: &[u8]) -> Result<Vec<u8>, RiseError> {
        let hook_path = self.git_dir.join("hooks").join("commit-msg");
        if !is_executable(&hook_path) {
            return Ok(message.to_vec());
        }
        let dir = self.scratch_dir();
        crate::file_util::create_or_reuse_dir(&dir).map_err(|source| RiseError::Io {
            path: dir.clone(),
            source,
        })?;
        let msg_path = write_scratch(&dir, "COMMIT_EDITMSG", message)?;
        let status = std::process::Command::new(&hook_path)
            .arg(&msg_path)
            .status()
            .map_err(|source| RiseError::VcsFailed {
                cmd: "commit-msg".to_owned(),
                stderr: source.to_string(),
            })?;
        if !status.success() {
            let _ = fs::remove_file(&msg_path);
            return Err(RiseError::UserAbort);
        }
        let result = fs::read(&msg_path).map_err(|source| RiseError::Io {
            path: msg_path.clone(),
            source,
        })?;
        let _ = fs::remove_file(&msg_path);
        Ok(result)
    }

    /// Writes `tree` into the VCS's real staging area via its own index
    /// lock, for the tail `index` todo step (§4.7, §5 — the only point at
    /// which the core is allowed to touch the index, and only through the
    /// VCS binary's own locking).
    pub fn write_tree_to_index(&self, tree: &crate::object_id::TreeId) -> Result<(), RiseError> {
        use crate::object_id::ObjectId as _;
        let index_file = std::env::var_os("GIT_INDEX_FILE");
        let mut cmd = std::process::Command::new(self.vcs_binary());
        cmd.env("GIT_DIR", &self.git_dir);
        if let Some(index_file) = &index_file {
            cmd.env("GIT_INDEX_FILE", index_file);
        }
        let output = cmd
            .arg("read-tree")
            .arg(tree.hex())
            .output()
            .map_err(|source| RiseError::VcsFailed {
                cmd: "read-tree".to_owned(),
                stderr: source.to_string(),
            })?;
        if output.status.success() {
            Ok(())
        } else {
            Err(RiseError::VcsFailed {
                cmd: "read-tree".to_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }
}

fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt as _;
        fs::metadata(path)
            .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        path.is_file()
    }
}

fn write_scratch(dir: &Path, suffix: &str, content: &[u8]) -> Result<PathBuf, RiseError> {
    let mut file = tempfile::Builder::new()
        .prefix("revise-merge-")
        .suffix(suffix)
        .tempfile_in(dir)
        .map_err(|source| RiseError::Io {
            path: dir.to_owned(),
            source,
        })?;
    file.write_all(content).map_err(|source| RiseError::Io {
        path: file.path().to_owned(),
        source,
    })?;
    let (_, path) = file.keep().map_err(|err| RiseError::Io {
        path: dir.to_owned(),
        source: err.error,
    })?;
    Ok(path)
}

fn reflog_identity(config: &GitConfig) -> (String, String) {
    let name = config
        .get_str("user.name")
        .unwrap_or("revise")
        .to_owned();
    let email = config
        .get_str("user.email")
        .unwrap_or("revise@localhost")
        .to_owned();
    (name, email)
}

fn unix_timestamp_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn is_git_dir(dir: &Path) -> bool {
    dir.join("HEAD").is_file() && dir.join("objects").is_dir() && dir.join("refs").is_dir()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let git_dir = dir.path().join(".git");
        fs::create_dir_all(git_dir.join("objects/pack")).unwrap();
        fs::create_dir_all(git_dir.join("refs/heads")).unwrap();
        fs::write(git_dir.join("HEAD"), "ref: refs/heads/main\n").unwrap();
        let repo = Repository::open(&git_dir).unwrap();
        (dir, repo)
    }

    #[test]
    fn head_is_symbolic_by_default() {
        let (_dir, repo) = init_repo();
        match repo.read_head().unwrap() {
            HeadTarget::Symbolic(name) => assert_eq!(name, "refs/heads/main"),
            HeadTarget::Detached(_) => panic!("expected symbolic HEAD"),
        }
    }

    #[test]
    fn update_ref_rejects_stale_expectation() {
        let (_dir, repo) = init_repo();
        let id = CommitId::from_bytes(&[0xab; 20]);
        let other = CommitId::from_bytes(&[0xcd; 20]);
        let err = repo
            .update_ref("refs/heads/main", Some(&other), &id, "rewrite")
            .unwrap_err();
        assert!(matches!(err, RiseError::RefUpdateFailed { .. }));
    }

    #[test]
    fn update_ref_writes_file_and_reflog() {
        let (_dir, repo) = init_repo();
        let id = CommitId::from_bytes(&[0xab; 20]);
        repo.update_ref("refs/heads/main", None, &id, "revise: rewrite")
            .unwrap();
        let resolved = repo.resolve_ref("refs/heads/main").unwrap().unwrap();
        assert_eq!(resolved, id);
        let log = fs::read_to_string(repo.git_dir().join("logs/refs/heads/main")).unwrap();
        assert!(log.contains("revise: rewrite"));
    }

    #[test]
    fn commit_msg_hook_is_skipped_when_absent() {
        let (_dir, repo) = init_repo();
        let result = repo.run_commit_msg_hook(b"subject\n").unwrap();
        assert_eq!(result, b"subject\n");
    }

    #[test]
    fn commit_msg_hook_runs_when_executable() {
        let (_dir, repo) = init_repo();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt as _;
            let hooks_dir = repo.git_dir().join("hooks");
            fs::create_dir_all(&hooks_dir).unwrap();
            let hook_path = hooks_dir.join("commit-msg");
            fs::write(&hook_path, "#!/bin/sh\necho 'hooked' >> \"$1\"\n").unwrap();
            let mut perms = fs::metadata(&hook_path).unwrap().permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&hook_path, perms).unwrap();
            let result = repo.run_commit_msg_hook(b"subject\n").unwrap();
            assert!(String::from_utf8_lossy(&result).contains("hooked"));
        }
    }
}
