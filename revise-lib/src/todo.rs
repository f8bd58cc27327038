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

//! C6: the interactive todo program — representation, text-format parsing
//! and serialization, semantic validation, and the autosquash rewrite.

use std::collections::HashMap;
use std::collections::HashSet;

use bstr::ByteSlice as _;

use crate::cache::ObjectCache;
use crate::error::RiseError;
use crate::object_id::CommitId;
use crate::object_id::ObjectId as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TodoCommand {
    Pick,
    Fixup,
    Squash,
    Reword,
    Cut,
    Index,
}

impl TodoCommand {
    fn as_str(self) -> &'static str {
        match self {
            Self::Pick => "pick",
            Self::Fixup => "fixup",
            Self::Squash => "squash",
            Self::Reword => "reword",
            Self::Cut => "cut",
            Self::Index => "index",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "pick" | "p" => Some(Self::Pick),
            "fixup" | "f" => Some(Self::Fixup),
            "squash" | "s" => Some(Self::Squash),
            "reword" | "r" => Some(Self::Reword),
            "cut" | "c" => Some(Self::Cut),
            "index" => Some(Self::Index),
            _ => None,
        }
    }
}

/// One line of the todo program: a command, the commit it applies to, and
/// (only meaningful once the `-e`/`--edit` multi-line form is in play) a
/// replacement message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoStep {
    pub command: TodoCommand,
    pub commit: CommitId,
    pub message_override: Option<Vec<u8>>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Todo {
    pub steps: Vec<TodoStep>,
}

impl Todo {
    pub fn new(steps: Vec<TodoStep>) -> Self {
        Self { steps }
    }

    /// Serializes to the line-oriented text format the user edits. With
    /// `edit_mode`, each step is preceded by a `++ <command> <oid>` line and
    /// followed by its (possibly multi-line) message body; otherwise each
    /// step is a single `<command> <oid> <summary>` comment-friendly line.
    pub fn render(&self, cache: &ObjectCache, comment_char: u8, edit_mode: bool) -> Vec<u8> {
        let mut out = Vec::new();
        for step in &self.steps {
            if edit_mode {
                out.extend_from_slice(
                    format!("++ {} {}\n", step.command.as_str(), step.commit.hex()).as_bytes(),
                );
                if let Some(message) = &step.message_override {
                    out.extend_from_slice(message);
                    if !message.ends_with(b"\n") {
                        out.push(b'\n');
                    }
                }
            } else {
                let summary = summary_for(cache, &step.commit);
                out.extend_from_slice(
                    format!(
                        "{} {} {}\n",
                        step.command.as_str(),
                        step.commit.hex(),
                        summary
                    )
                    .as_bytes(),
                );
            }
        }
        out.push(comment_char);
        out.extend_from_slice(b" Commands: pick, fixup, squash, reword, cut, index\n");
        out
    }

    /// Parses the (possibly user-edited) todo text, tolerating blank lines
    /// and comment lines, and resolving each referenced commit id against
    /// `cache`.
    pub fn parse(text: &[u8], cache: &ObjectCache, comment_char: u8) -> Result<Self, RiseError> {
        let mut steps = Vec::new();
        let mut pending_message: Option<(usize, Vec<u8>)> = None;
        for raw_line in text.lines() {
            if raw_line.is_empty() || raw_line[0] == comment_char {
                continue;
            }
            if let Some(rest) = raw_line.strip_prefix(b"++ ") {
                if let Some((idx, message)) = pending_message.take() {
                    if let Some(s) = steps.get_mut(idx) {
                        s.message_override = Some(trim_trailing_newline(message));
                    }
                }
                let mut parts = rest.splitn(2, |&b| b == b' ');
                let command_bytes = parts.next().unwrap_or(b"");
                let command_str = command_bytes
                    .to_str()
                    .map_err(|_| RiseError::TodoInvalid("non-UTF-8 command".to_owned()))?;
                let command = TodoCommand::parse(command_str)
                    .ok_or_else(|| RiseError::TodoInvalid(format!("unknown command {command_str:?}")))?;
                let oid_bytes = parts.next().unwrap_or(b"").trim();
                let oid_str = oid_bytes
                    .to_str()
                    .map_err(|_| RiseError::TodoInvalid("non-UTF-8 object id".to_owned()))?;
                let commit = CommitId::try_from_hex(oid_str)
                    .ok_or_else(|| RiseError::TodoInvalid(format!("bad object id {oid_str:?}")))?;
                cache
                    .get(&crate::object_id::Oid::from(commit.clone()))
                    .map_err(|_| RiseError::TodoInvalid(format!("unresolvable commit {oid_str}")))?;
                steps.push(TodoStep {
                    command,
                    commit,
                    message_override: None,
                });
                pending_message = Some((steps.len() - 1, Vec::new()));
                continue;
            }
            if let Some((_, message)) = pending_message.as_mut() {
                message.extend_from_slice(raw_line);
                message.push(b'\n');
                continue;
            }
            let mut parts = raw_line.splitn(3, |&b| b == b' ');
            let command_bytes = parts.next().unwrap_or(b"");
            let command_str = command_bytes
                .to_str()
                .map_err(|_| RiseError::TodoInvalid("non-UTF-8 command".to_owned()))?;
            let command = TodoCommand::parse(command_str)
                .ok_or_else(|| RiseError::TodoInvalid(format!("unknown command {command_str:?}")))?;
            let oid_str = parts
                .next()
                .and_then(|b| b.to_str().ok())
                .ok_or_else(|| RiseError::TodoInvalid("missing object id".to_owned()))?;
            let commit = CommitId::try_from_hex(oid_str)
                .ok_or_else(|| RiseError::TodoInvalid(format!("bad object id {oid_str:?}")))?;
            cache
                .get(&crate::object_id::Oid::from(commit.clone()))
                .map_err(|_| RiseError::TodoInvalid(format!("unresolvable commit {oid_str}")))?;
            steps.push(TodoStep {
                command,
                commit,
                message_override: None,
            });
        }
        if let Some((idx, message)) = pending_message {
            if let Some(step) = steps.get_mut(idx) {
                step.message_override = Some(trim_trailing_newline(message));
            }
        }
        if steps.is_empty() {
            return Err(RiseError::UserAbort);
        }
        let todo = Self { steps };
        todo.validate()?;
        Ok(todo)
    }

    /// Checks the structural rules §4.6 requires independent of autosquash:
    /// no duplicate commits, `index` only at the tail, and the first
    /// non-index step is never a `fixup`/`squash` (nothing to squash into).
    pub fn validate(&self) -> Result<(), RiseError> {
        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.commit.clone()) {
                return Err(RiseError::TodoInvalid(format!(
                    "duplicate commit {}",
                    step.commit.hex()
                )));
            }
        }
        let mut seen_index = false;
        for step in &self.steps {
            if step.command == TodoCommand::Index {
                seen_index = true;
            } else if seen_index {
                return Err(RiseError::TodoInvalid(
                    "index steps must be at the tail".to_owned(),
                ));
            }
        }
        if let Some(first) = self
            .steps
            .iter()
            .find(|s| s.command != TodoCommand::Index)
        {
            if matches!(first.command, TodoCommand::Fixup | TodoCommand::Squash) {
                return Err(RiseError::TodoInvalid(
                    "the first step cannot be fixup or squash".to_owned(),
                ));
            }
        }
        Ok(())
    }
}

fn trim_trailing_newline(mut message: Vec<u8>) -> Vec<u8> {
    if message.last() == Some(&b'\n') {
        message.pop();
    }
    message
}

fn summary_for(cache: &ObjectCache, id: &CommitId) -> String {
    cache
        .get(&crate::object_id::Oid::from(id.clone()))
        .ok()
        .and_then(|o| o.into_commit())
        .map(|c| c.summary().to_string())
        .unwrap_or_default()
}

/// Moves commits whose subject begins with `fixup! `/`squash! ` to
/// immediately follow the commit their subject names, resolving transitively
/// (a fixup of a fixup follows its ultimate target) and preserving relative
/// order among fixups that share a target — and rewrites each moved step's
/// command from `pick` to `fixup`/`squash` to match the prefix it matched, so
/// the replay actually folds it into its target instead of picking it as a
/// standalone commit (§4.6, §8 scenario 3). A fixup whose target is outside
/// `range` (and thus not present in `steps`) is an error (§4.6).
pub fn autosquash(cache: &ObjectCache, steps: Vec<TodoStep>) -> Result<Vec<TodoStep>, RiseError> {
    let commits: Vec<CommitId> = steps.iter().map(|s| s.commit.clone()).collect();
    let summaries: HashMap<&CommitId, String> = commits
        .iter()
        .map(|id| (id, summary_for(cache, id)))
        .collect();

    // Map each commit to its immediate fixup target and the command its
    // subject prefix implies, if any.
    let mut target_of: HashMap<CommitId, CommitId> = HashMap::new();
    let mut command_of: HashMap<CommitId, TodoCommand> = HashMap::new();
    for id in &commits {
        let summary = &summaries[id];
        let prefix = strip_squash_prefix(summary);
        if let Some((subject, command)) = prefix {
            let target = commits
                .iter()
                .find(|candidate| *candidate != id && summaries[*candidate] == subject)
                .or_else(|| {
                    commits.iter().find(|candidate| {
                        *candidate != id && summaries[*candidate].starts_with(&subject)
                    })
                })
                .cloned();
            match target {
                Some(target) => {
                    target_of.insert(id.clone(), target);
                    command_of.insert(id.clone(), command);
                }
                None => {
                    return Err(RiseError::TodoInvalid(format!(
                        "fixup target for {} not found in rewrite range",
                        id.hex()
                    )));
                }
            }
        }
    }

    let mut by_commit: HashMap<CommitId, TodoStep> =
        steps.into_iter().map(|s| (s.commit.clone(), s)).collect();

    let mut ordered = Vec::with_capacity(commits.len());
    for id in &commits {
        if target_of.contains_key(id) {
            continue; // placed as a child when its root is emitted
        }
        ordered.push(by_commit.remove(id).expect("commit present in by_commit"));
        // Preserve original relative order among siblings targeting the same
        // root, and recursively place fixups-of-fixups immediately after the
        // fixup they target.
        append_children_in_order(id, &commits, &target_of, &command_of, &mut by_commit, &mut ordered);
    }

    Ok(ordered)
}

fn append_children_in_order(
    root: &CommitId,
    commits: &[CommitId],
    target_of: &HashMap<CommitId, CommitId>,
    command_of: &HashMap<CommitId, TodoCommand>,
    by_commit: &mut HashMap<CommitId, TodoStep>,
    ordered: &mut Vec<TodoStep>,
) {
    for id in commits {
        if target_of.get(id) == Some(root) {
            let mut step = by_commit.remove(id).expect("commit present in by_commit");
            if let Some(command) = command_of.get(id) {
                step.command = *command;
            }
            ordered.push(step);
            append_children_in_order(id, commits, target_of, command_of, by_commit, ordered);
        }
    }
}

fn strip_squash_prefix(summary: &str) -> Option<(String, TodoCommand)> {
    if let Some(rest) = summary.strip_prefix("fixup! ") {
        Some((rest.to_owned(), TodoCommand::Fixup))
    } else if let Some(rest) = summary.strip_prefix("squash! ") {
        Some((rest.to_owned(), TodoCommand::Squash))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Commit;
    use crate::object::HashAlgorithm;
    use crate::object::Object;
    use crate::odb::Odb;

    fn empty_cache() -> ObjectCache {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("objects/pack")).unwrap();
        let odb = Odb::open(dir.path()).unwrap();
        std::mem::forget(dir);
        ObjectCache::new(odb, HashAlgorithm::Sha1)
    }

    fn commit_with_message(cache: &ObjectCache, message: &str) -> CommitId {
        let commit = Commit {
            tree: crate::object_id::TreeId::new(Vec::new()),
            parents: Vec::new(),
            author: bstr::BString::from(b"Jane <jane@x.com> 1000 +0000".to_vec()),
            committer: bstr::BString::from(b"Jane <jane@x.com> 1000 +0000".to_vec()),
            gpgsig: None,
            extra_headers: Vec::new(),
            message: bstr::BString::from(message.as_bytes().to_vec()),
        };
        let id = cache.new_object(Object::Commit(commit));
        CommitId::from_bytes(id.as_bytes())
    }

    #[test]
    fn autosquash_folds_fixup_of_fixup_and_rewrites_command() {
        let cache = empty_cache();
        let b = commit_with_message(&cache, "B");
        let c = commit_with_message(&cache, "C");
        let f1 = commit_with_message(&cache, "fixup! B");
        let f2 = commit_with_message(&cache, "fixup! fixup! B");
        let steps = vec![
            TodoStep { command: TodoCommand::Pick, commit: b.clone(), message_override: None },
            TodoStep { command: TodoCommand::Pick, commit: c.clone(), message_override: None },
            TodoStep { command: TodoCommand::Pick, commit: f1.clone(), message_override: None },
            TodoStep { command: TodoCommand::Pick, commit: f2.clone(), message_override: None },
        ];
        let reordered = autosquash(&cache, steps).unwrap();
        assert_eq!(
            reordered.iter().map(|s| s.commit.clone()).collect::<Vec<_>>(),
            vec![b, f1, f2, c]
        );
        assert_eq!(reordered[0].command, TodoCommand::Pick);
        assert_eq!(reordered[1].command, TodoCommand::Fixup);
        assert_eq!(reordered[2].command, TodoCommand::Fixup);
        assert_eq!(reordered[3].command, TodoCommand::Pick);
    }

    #[test]
    fn strips_fixup_and_squash_prefixes() {
        assert_eq!(
            strip_squash_prefix("fixup! add foo"),
            Some(("add foo".to_owned(), TodoCommand::Fixup))
        );
        assert_eq!(
            strip_squash_prefix("squash! add foo"),
            Some(("add foo".to_owned(), TodoCommand::Squash))
        );
        assert_eq!(strip_squash_prefix("add foo"), None);
    }

    #[test]
    fn validate_rejects_duplicate_commits() {
        let id = CommitId::from_bytes(&[1; 20]);
        let todo = Todo::new(vec![
            TodoStep {
                command: TodoCommand::Pick,
                commit: id.clone(),
                message_override: None,
            },
            TodoStep {
                command: TodoCommand::Pick,
                commit: id,
                message_override: None,
            },
        ]);
        assert!(todo.validate().is_err());
    }

    #[test]
    fn validate_rejects_leading_fixup() {
        let id = CommitId::from_bytes(&[1; 20]);
        let todo = Todo::new(vec![TodoStep {
            command: TodoCommand::Fixup,
            commit: id,
            message_override: None,
        }]);
        assert!(todo.validate().is_err());
    }

    #[test]
    fn validate_rejects_index_before_tail() {
        let a = CommitId::from_bytes(&[1; 20]);
        let b = CommitId::from_bytes(&[2; 20]);
        let todo = Todo::new(vec![
            TodoStep {
                command: TodoCommand::Index,
                commit: a,
                message_override: None,
            },
            TodoStep {
                command: TodoCommand::Pick,
                commit: b,
                message_override: None,
            },
        ]);
        assert!(todo.validate().is_err());
    }
}
