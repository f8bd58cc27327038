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

//! C7: the rewrite engine. Walks the first-parent chain from the current
//! head back to the rewrite anchor, runs the todo program against it, and
//! lands the result with a single compare-and-swap ref update.

use bstr::BString;
use chrono::Local;

use crate::error::RiseError;
use crate::merge::MergeLabels;
use crate::merge::merge_trees;
use crate::object::Commit;
use crate::object::Object;
use crate::object_id::CommitId;
use crate::object_id::ObjectId as _;
use crate::object_id::Oid;
use crate::repo::Repository;
use crate::rerere::RerereStore;
use crate::todo::Todo;
use crate::todo::TodoCommand;

/// Flags controlling one invocation of the engine, corresponding 1:1 to the
/// CLI surface (§6).
#[derive(Debug, Clone, Default)]
pub struct RewriteOptions {
    pub reauthor: bool,
    pub interactive: bool,
    pub autosquash: bool,
    pub message_override: Option<String>,
    pub ref_name: Option<String>,
    /// Sign every rewritten commit (`commit.gpgSign`, §4.7 "Signing").
    pub sign: bool,
    /// Run the `commit-msg` hook on every message that came out of an editor
    /// (`revise.run-hooks.commit-msg`, §4.7 "Hooks").
    pub run_commit_msg_hook: bool,
}

pub struct RewriteOutcome {
    pub old_head: CommitId,
    pub new_head: CommitId,
    pub ref_name: String,
}

/// What running a todo program produced: the new tip, plus the tree of a
/// trailing `index` step if one was present (§4.7, §5 — `index` emits no
/// commit, only a tree the caller writes back via
/// [`crate::repo::Repository::write_tree_to_index`] once the ref update
/// lands).
pub struct RunOutcome {
    pub head: CommitId,
    pub pending_index: Option<crate::object_id::TreeId>,
}

/// Walks `H`'s first-parent chain back to (but not including) `target`,
/// returning commits oldest-first (`C1..Cn`, `Cn == H`). A multi-parent
/// commit anywhere in that range is fatal (§4.7 step 1).
pub fn rewrite_range(
    repo: &Repository,
    target: &CommitId,
    head: &CommitId,
) -> Result<Vec<CommitId>, RiseError> {
    let mut chain = Vec::new();
    let mut current = head.clone();
    loop {
        if current == *target {
            break;
        }
        let object = repo.cache().get(&Oid::from(current.clone()))?;
        let commit = object
            .as_commit()
            .ok_or_else(|| RiseError::BadRevision(format!("{current} is not a commit")))?;
        if commit.parents.len() > 1 {
            return Err(RiseError::MergeInRange(current.hex()));
        }
        chain.push(current.clone());
        match commit.parents.first() {
            Some(parent) => current = parent.clone(),
            None => {
                return Err(RiseError::BadRevision(format!(
                    "{target} is not an ancestor of {head}"
                )));
            }
        }
    }
    chain.reverse();
    Ok(chain)
}

/// Runs `todo` starting from anchor commit `target`, producing the new head.
/// `target` should already reflect any staged changes the caller wants
/// folded in — see [`splice`] — since the todo itself only ever names
/// commits from the rewrite range, never the anchor.
pub fn run(
    repo: &Repository,
    rerere: Option<&RerereStore>,
    target: &CommitId,
    mut todo: Todo,
    options: &RewriteOptions,
) -> Result<RunOutcome, RiseError> {
    if options.autosquash {
        todo = Todo::new(crate::todo::autosquash(repo.cache(), todo.steps)?);
    }
    todo.validate()?;

    let mut tip = target.clone();
    let mut pending_index = None;
    for step in &todo.steps {
        let (new_tip, index_tree) = apply_step(repo, rerere, &tip, step, options)?;
        tip = new_tip;
        pending_index = index_tree;
    }
    Ok(RunOutcome {
        head: tip,
        pending_index,
    })
}

/// Splices the staged tree `staged` into `target` (§4.7's implicit first
/// step for a non-interactive `revise <target>` invocation, absent from the
/// todo itself since the anchor is never one of its own steps): a
/// `fixup`-shaped merge of `base = tree(parent(target))`, `ours =
/// tree(target)`, `theirs = staged`, replacing `target` in place so the
/// rest of the chain can be picked on top of the result (scenario 1, §8).
/// `message_override` supports `-m`/`-e`, which edit the anchor's message
/// without going through a todo `reword` step.
pub fn splice(
    repo: &Repository,
    rerere: Option<&RerereStore>,
    target: &CommitId,
    staged: crate::object_id::TreeId,
    reauthor: bool,
    message_override: Option<Vec<u8>>,
) -> Result<CommitId, RiseError> {
    let target_commit = commit_of(repo, target)?;
    let base_id = target_commit
        .parents
        .first()
        .cloned()
        .ok_or_else(|| RiseError::BadRevision(format!("{target} has no parent to diff against")))?;
    let base_commit = commit_of(repo, &base_id)?;

    let labels = MergeLabels {
        base: &base_commit.summary().to_string(),
        ours: &target_commit.summary().to_string(),
        theirs: "staged changes",
    };
    let merged_tree = merge_trees(repo, rerere, &base_commit.tree, &target_commit.tree, &staged, &labels)?;
    let sign = crate::config::gpg_sign_enabled(repo.config());
    let message = match message_override {
        Some(msg) if crate::config::run_commit_msg_hook(repo.config()) => repo.run_commit_msg_hook(&msg)?,
        Some(msg) => msg,
        None => target_commit.message.to_vec(),
    };

    build_commit(
        repo,
        merged_tree,
        target_commit.parents.clone(),
        target_commit.author.clone(),
        message,
        reauthor,
        sign,
        &target_commit,
    )
}

fn apply_step(
    repo: &Repository,
    rerere: Option<&RerereStore>,
    parent_tip: &CommitId,
    step: &crate::todo::TodoStep,
    options: &RewriteOptions,
) -> Result<(CommitId, Option<crate::object_id::TreeId>), RiseError> {
    let source = commit_of(repo, &step.commit)?;
    match step.command {
        TodoCommand::Pick => {
            pick_or_fixup(repo, rerere, parent_tip, &step.commit, &source, false, None, options).map(|id| (id, None))
        }
        TodoCommand::Fixup => {
            pick_or_fixup(repo, rerere, parent_tip, &step.commit, &source, true, None, options).map(|id| (id, None))
        }
        TodoCommand::Squash => {
            let tip_commit = commit_of(repo, parent_tip)?;
            let mut sample = tip_commit.message.to_vec();
            sample.extend_from_slice(&source.message);
            let comment_char = crate::config::comment_char(repo.config(), &sample);
            let combined = concatenate_messages(&tip_commit.message, &source.message, comment_char);
            let edited = repo
                .editor()
                .edit_text(&combined, "-SQUASH_MSG")
                .map_err(|_| RiseError::UserAbort)?;
            let edited = maybe_run_commit_msg_hook(repo, options, edited)?;
            pick_or_fixup(repo, rerere, parent_tip, &step.commit, &source, true, Some(edited), options)
                .map(|id| (id, None))
        }
        TodoCommand::Reword => reword(
            repo,
            parent_tip,
            &step.commit,
            &source,
            step.message_override.as_deref(),
            options,
        )
        .map(|id| (id, None)),
        TodoCommand::Cut => cut(repo, parent_tip, &step.commit, &source, options).map(|id| (id, None)),
        TodoCommand::Index => {
            // No commit is produced; `validate` guarantees this is the last
            // step, so the merged tree is handed back to the caller to write
            // into the real index once the ref update lands (§5).
            let tree = merge_onto_tip(repo, rerere, parent_tip, &step.commit, &source)?;
            Ok((parent_tip.clone(), Some(tree)))
        }
    }
}

/// The merge half of `pick`/`fixup` without the commit-construction half —
/// shared by `pick_or_fixup` and the `index` step, which needs the resulting
/// tree but never creates a commit for it.
fn merge_onto_tip(
    repo: &Repository,
    rerere: Option<&RerereStore>,
    parent_tip: &CommitId,
    source_id: &CommitId,
    source: &Commit,
) -> Result<crate::object_id::TreeId, RiseError> {
    let base_id = source
        .parents
        .first()
        .cloned()
        .ok_or_else(|| RiseError::BadRevision(format!("{source_id} has no parent to diff against")))?;
    let base_commit = commit_of(repo, &base_id)?;
    let tip_commit = commit_of(repo, parent_tip)?;
    let labels = MergeLabels {
        base: &base_commit.summary().to_string(),
        ours: &tip_commit.summary().to_string(),
        theirs: &source.summary().to_string(),
    };
    merge_trees(repo, rerere, &base_commit.tree, &tip_commit.tree, &source.tree, &labels)
}

fn commit_of(repo: &Repository, id: &CommitId) -> Result<Commit, RiseError> {
    repo.cache()
        .get(&Oid::from(id.clone()))?
        .into_commit()
        .ok_or_else(|| RiseError::BadRevision(format!("{id} is not a commit")))
}

/// Implements both `pick` (append a new commit onto `parent_tip`) and
/// `fixup`/`squash` (replace `parent_tip` in place, reusing its message and
/// author unless `message_override` is given) — the two share everything but
/// parent linkage and message/author selection (§4.7).
fn pick_or_fixup(
    repo: &Repository,
    rerere: Option<&RerereStore>,
    parent_tip: &CommitId,
    source_id: &CommitId,
    source: &Commit,
    replace: bool,
    message_override: Option<Vec<u8>>,
    options: &RewriteOptions,
) -> Result<CommitId, RiseError> {
    let merged_tree = merge_onto_tip(repo, rerere, parent_tip, source_id, source)?;
    let tip_commit = commit_of(repo, parent_tip)?;

    let (message, author) = if replace {
        match message_override {
            Some(msg) => (msg, tip_commit.author.clone()),
            None => (tip_commit.message.to_vec(), tip_commit.author.clone()),
        }
    } else {
        (source.message.to_vec(), source.author.clone())
    };

    let parents = if replace {
        tip_commit.parents.clone()
    } else {
        vec![parent_tip.clone()]
    };

    build_commit(repo, merged_tree, parents, author, message, options.reauthor, options.sign, source)
}

fn reword(
    repo: &Repository,
    parent_tip: &CommitId,
    source_id: &CommitId,
    source: &Commit,
    message_override: Option<&[u8]>,
    options: &RewriteOptions,
) -> Result<CommitId, RiseError> {
    let _ = source_id;
    let message = match message_override {
        Some(msg) => msg.to_vec(),
        None => {
            let edited = repo
                .editor()
                .edit_text(&source.message, "-COMMIT_EDITMSG")
                .map_err(|_| RiseError::UserAbort)?;
            if edited.iter().all(|b| b.is_ascii_whitespace()) {
                return Err(RiseError::UserAbort);
            }
            maybe_run_commit_msg_hook(repo, options, edited)?
        }
    };
    build_commit(
        repo,
        source.tree.clone(),
        vec![parent_tip.clone()],
        source.author.clone(),
        message,
        options.reauthor,
        options.sign,
        source,
    )
}

/// Runs the `commit-msg` hook over an editor-derived message when
/// `revise.run-hooks.commit-msg` is enabled (§4.7 "Hooks"); messages that
/// came from `-m`/a todo `message_override` never go through the hook, only
/// ones a human actually typed into an editor.
fn maybe_run_commit_msg_hook(
    repo: &Repository,
    options: &RewriteOptions,
    message: Vec<u8>,
) -> Result<Vec<u8>, RiseError> {
    if options.run_commit_msg_hook {
        repo.run_commit_msg_hook(&message)
    } else {
        Ok(message)
    }
}

/// Splits `source`'s change into two commits at a user-chosen patch
/// boundary: the user edits the unified diff between `source`'s parent and
/// `source`, deleting the hunks that belong in the second commit. The first
/// commit's tree comes from applying the edited patch; the second commit's
/// tree is always `source`'s own tree, so the final state is correct
/// regardless of exactly where the user drew the line.
fn cut(
    repo: &Repository,
    parent_tip: &CommitId,
    source_id: &CommitId,
    source: &Commit,
    options: &RewriteOptions,
) -> Result<CommitId, RiseError> {
    let base_id = source
        .parents
        .first()
        .cloned()
        .ok_or_else(|| RiseError::BadRevision(format!("{source_id} has no parent to diff against")))?;
    let base_commit = commit_of(repo, &base_id)?;
    let tip_commit = commit_of(repo, parent_tip)?;

    let full_patch = repo.diff_tree(&base_commit.tree, &source.tree)?;
    let edited_patch = repo
        .editor()
        .edit_text(&full_patch, "-CUT_PATCH")
        .map_err(|_| RiseError::UserAbort)?;
    if edited_patch.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(RiseError::UserAbort);
    }

    let first_tree = repo.apply_patch(&tip_commit.tree, &edited_patch)?;
    let first_message = repo
        .editor()
        .edit_text(&source.message, "-CUT_FIRST_MSG")
        .map_err(|_| RiseError::UserAbort)?;
    let first_message = maybe_run_commit_msg_hook(repo, options, first_message)?;
    let first_id = build_commit(
        repo,
        first_tree,
        vec![parent_tip.clone()],
        source.author.clone(),
        first_message,
        options.reauthor,
        options.sign,
        source,
    )?;

    let second_message = repo
        .editor()
        .edit_text(&source.message, "-CUT_SECOND_MSG")
        .map_err(|_| RiseError::UserAbort)?;
    let second_message = maybe_run_commit_msg_hook(repo, options, second_message)?;
    build_commit(
        repo,
        source.tree.clone(),
        vec![first_id],
        source.author.clone(),
        second_message,
        options.reauthor,
        options.sign,
        source,
    )
}

/// Concatenates the tip's message and the commit being squashed in, separated
/// by a `# ---`-style marker using whatever comment char the repo is
/// configured for (§4.7 "squash" — "separated by `# ---` markers and the
/// config-driven comment char").
fn concatenate_messages(tip_message: &[u8], source_message: &[u8], comment_char: u8) -> Vec<u8> {
    let mut out = tip_message.to_vec();
    if !out.ends_with(b"\n") {
        out.push(b'\n');
    }
    out.push(comment_char);
    out.extend_from_slice(b" --- squash ---\n");
    out.extend_from_slice(source_message);
    out
}

/// Hashes and inserts a new commit object. `author` is reused verbatim
/// unless `--reauthor` was requested; the committer is always the current
/// user and time. Unknown headers from `template` are preserved verbatim,
/// but `template`'s own `gpgsig` is never carried forward — tree and/or
/// parents have changed, so any prior signature no longer covers the
/// content and would just be stale bytes. When `sign` is set, a fresh
/// signature is computed over the pre-image (the commit with no `gpgsig`
/// header at all) and only then embedded, so the final OID hashes the form
/// the signature actually covers (§4.7 "Signing").
fn build_commit(
    repo: &Repository,
    tree: crate::object_id::TreeId,
    parents: Vec<CommitId>,
    author: bstr::BString,
    message: Vec<u8>,
    reauthor: bool,
    sign: bool,
    template: &Commit,
) -> Result<CommitId, RiseError> {
    let author = if reauthor {
        current_signature(repo)
    } else {
        author
    };
    let committer = current_signature(repo);
    let mut commit = Commit {
        tree,
        parents,
        author,
        committer,
        gpgsig: None,
        extra_headers: template.extra_headers.clone(),
        message: BString::from(message),
    };
    if sign {
        let payload = crate::object::serialize_body(&Object::Commit(commit.clone()));
        let mut signature = repo.sign_commit_payload(&payload)?;
        while signature.last() == Some(&b'\n') {
            signature.pop();
        }
        commit.gpgsig = Some(BString::from(signature));
    }
    let id = repo.cache().new_object(Object::Commit(commit));
    Ok(CommitId::from_bytes(id.as_bytes()))
}

fn current_signature(repo: &Repository) -> bstr::BString {
    let name = repo.config().get_str("user.name").unwrap_or("unknown");
    let email = repo.config().get_str("user.email").unwrap_or("unknown@localhost");
    let now = Local::now();
    let timestamp = now.timestamp();
    let offset_minutes = now.offset().local_minus_utc() / 60;
    let sign = if offset_minutes < 0 { '-' } else { '+' };
    let abs = offset_minutes.unsigned_abs();
    BString::from(format!(
        "{name} <{email}> {timestamp} {sign}{:02}{:02}",
        abs / 60,
        abs % 60
    ))
}

/// Performs the final compare-and-swap ref update with a single reflog
/// entry summarizing the rewrite (§6 — `revise (<short-old>): <summary>`).
pub fn finish(
    repo: &Repository,
    ref_name: &str,
    old_head: &CommitId,
    new_head: &CommitId,
) -> Result<RewriteOutcome, RiseError> {
    repo.cache().flush(&Oid::from(new_head.clone()))?;
    let new_commit = commit_of(repo, new_head)?;
    let short_old = &old_head.hex()[..old_head.hex().len().min(7)];
    let message = format!("revise ({short_old}): {}", new_commit.summary());
    repo.update_ref(ref_name, Some(old_head), new_head, &message)?;
    Ok(RewriteOutcome {
        old_head: old_head.clone(),
        new_head: new_head.clone(),
        ref_name: ref_name.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::FileMode;
    use crate::object::Tree;
    use crate::object::TreeEntry;
    use crate::object_id::TreeId;

    fn test_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let git_dir = dir.path().join(".git");
        std::fs::create_dir_all(git_dir.join("objects/pack")).unwrap();
        std::fs::create_dir_all(git_dir.join("refs/heads")).unwrap();
        std::fs::write(git_dir.join("HEAD"), "ref: refs/heads/main\n").unwrap();
        let repo = Repository::open(&git_dir).unwrap();
        (dir, repo)
    }

    fn make_commit(repo: &Repository, parents: Vec<CommitId>, file_content: &[u8], message: &str) -> CommitId {
        let blob_id = repo.cache().new_object(Object::Blob(file_content.to_vec()));
        let tree = Tree::from_entries(vec![TreeEntry {
            name: BString::from(b"f".to_vec()),
            mode: FileMode::Regular,
            oid: blob_id,
        }])
        .unwrap();
        let tree_id = repo.cache().new_object(Object::Tree(tree));
        let commit = Commit {
            tree: TreeId::from_bytes(tree_id.as_bytes()),
            parents,
            author: BString::from(b"Jane <jane@x.com> 1000 +0000".to_vec()),
            committer: BString::from(b"Jane <jane@x.com> 1000 +0000".to_vec()),
            gpgsig: None,
            extra_headers: Vec::new(),
            message: BString::from(message.as_bytes().to_vec()),
        };
        let id = repo.cache().new_object(Object::Commit(commit));
        CommitId::from_bytes(id.as_bytes())
    }

    #[test]
    fn rewrite_range_collects_first_parent_chain() {
        let (_dir, repo) = test_repo();
        let a = make_commit(&repo, vec![], b"a", "A");
        let b = make_commit(&repo, vec![a.clone()], b"b", "B");
        let c = make_commit(&repo, vec![b.clone()], b"c", "C");
        let range = rewrite_range(&repo, &a, &c).unwrap();
        assert_eq!(range, vec![b, c]);
    }

    #[test]
    fn rewrite_range_rejects_merge_commits() {
        let (_dir, repo) = test_repo();
        let a = make_commit(&repo, vec![], b"a", "A");
        let b = make_commit(&repo, vec![a.clone()], b"b", "B");
        let other = make_commit(&repo, vec![], b"x", "X");
        let merge = make_commit(&repo, vec![b.clone(), other], b"m", "M");
        let err = rewrite_range(&repo, &a, &merge).unwrap_err();
        assert!(matches!(err, RiseError::MergeInRange(_)));
    }
}
