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

//! The orchestration glue between parsed [`Args`] and `revise_lib`'s public
//! API — the "external collaborator" layer §1 carves out of the core:
//! staging, editor round-trips for the todo list, and the final summary
//! line.

use std::path::Path;
use std::process::Command;
use std::process::Stdio;

use bstr::ByteSlice as _;
use revise_lib::RiseError;
use revise_lib::config;
use revise_lib::object_id::CommitId;
use revise_lib::object_id::ObjectId as _;
use revise_lib::object_id::Oid;
use revise_lib::object_id::TreeId;
use revise_lib::repo::HeadTarget;
use revise_lib::repo::Repository;
use revise_lib::rerere::RerereStore;
use revise_lib::revision;
use revise_lib::rewrite;
use revise_lib::rewrite::RewriteOptions;
use revise_lib::rewrite::RewriteOutcome;
use revise_lib::todo::Todo;
use revise_lib::todo::TodoCommand;
use revise_lib::todo::TodoStep;

use crate::cli::Args;
use crate::error::CliError;

/// Runs one `revise` invocation to completion, returning the summary line
/// printed on success.
pub fn run(args: &Args, cwd: &Path) -> Result<String, CliError> {
    if args.message.is_some() && args.interactive {
        return Err(CliError::MessageWithInteractive);
    }

    let repo = Repository::discover(cwd)?;
    let ref_name = resolve_ref_name(&repo, args)?;
    let head = repo.head_commit()?;

    let rerere_store =
        config::rerere_enabled(repo.config()).then(|| RerereStore::new(repo.git_dir()));
    let rerere = rerere_store.as_ref();

    let autosquash = args.autosquash_requested(config::autosquash_enabled(repo.config()));

    let outcome = if args.cut {
        run_cut(&repo, rerere, args, &head, &ref_name, autosquash)?
    } else {
        run_splice(&repo, rerere, args, &head, &ref_name, autosquash)?
    };

    Ok(summary_line(&repo, &outcome))
}

fn resolve_ref_name(repo: &Repository, args: &Args) -> Result<String, CliError> {
    if let Some(name) = &args.ref_name {
        return Ok(name.clone());
    }
    match repo.read_head()? {
        HeadTarget::Symbolic(name) => Ok(name),
        HeadTarget::Detached(_) => Err(CliError::DetachedHead),
    }
}

fn anchor_message_override(repo: &Repository, args: &Args, current: &[u8]) -> Result<Option<Vec<u8>>, CliError> {
    if let Some(msg) = &args.message {
        return Ok(Some(msg.clone().into_bytes()));
    }
    if args.edit {
        let edited = repo
            .editor()
            .edit_text(current, "-REVISE_EDITMSG")
            .map_err(|_| CliError::Core(RiseError::UserAbort))?;
        return Ok(Some(edited));
    }
    Ok(None)
}

/// The default flow (§4.7 scenario 1): fold the staged tree into `target`,
/// then replay every commit between `target` and `head` on top of the
/// result.
fn run_splice(
    repo: &Repository,
    rerere: Option<&RerereStore>,
    args: &Args,
    head: &CommitId,
    ref_name: &str,
    autosquash: bool,
) -> Result<RewriteOutcome, CliError> {
    let target_expr = args.target.as_deref().unwrap_or("HEAD^");
    let target = resolve_commit(repo, target_expr)?;

    let target_commit = repo
        .cache()
        .get(&Oid::from(target.clone()))?
        .into_commit()
        .ok_or_else(|| CliError::Core(RiseError::BadRevision(format!("{target} is not a commit"))))?;

    let message_override = anchor_message_override(repo, args, &target_commit.message)?;
    let staged = staged_tree(repo, args, &target_commit.tree)?;
    let anchor = rewrite::splice(repo, rerere, &target, staged, args.reauthor, message_override)?;

    let range = rewrite::rewrite_range(repo, &target, head)?;
    let todo = Todo::new(
        range
            .into_iter()
            .map(|commit| TodoStep {
                command: TodoCommand::Pick,
                commit,
                message_override: None,
            })
            .collect(),
    );

    let todo = if args.interactive {
        run_editor_round_trip(repo, todo, autosquash, args.edit)?
    } else {
        todo
    };

    let options = RewriteOptions {
        reauthor: args.reauthor,
        interactive: args.interactive,
        // Autosquash was already applied to the todo that went through the
        // editor (or never needed to be, for the non-interactive case where
        // `run` still applies it below), so ask `run` to apply it itself
        // only when we didn't already.
        autosquash: autosquash && !args.interactive,
        message_override: None,
        ref_name: Some(ref_name.to_owned()),
        sign: config::gpg_sign_enabled(repo.config()),
        run_commit_msg_hook: config::run_commit_msg_hook(repo.config()),
    };

    let outcome = rewrite::run(repo, rerere, &anchor, todo, &options)?;
    land(repo, ref_name, head, outcome)
}

/// The `-c`/`--cut` shorthand (§C.4): a one-step todo splitting `target`
/// itself, with the remaining range picked on top. No staged-tree splice
/// happens here — `cut` only ever operates on an existing commit's own
/// change.
fn run_cut(
    repo: &Repository,
    rerere: Option<&RerereStore>,
    args: &Args,
    head: &CommitId,
    ref_name: &str,
    autosquash: bool,
) -> Result<RewriteOutcome, CliError> {
    let target_expr = args.target.as_deref().unwrap_or("HEAD");
    let to_cut = resolve_commit(repo, target_expr)?;
    let cut_commit = repo
        .cache()
        .get(&Oid::from(to_cut.clone()))?
        .into_commit()
        .ok_or_else(|| CliError::Core(RiseError::BadRevision(format!("{to_cut} is not a commit"))))?;
    let parent = cut_commit
        .parents
        .first()
        .cloned()
        .ok_or_else(|| CliError::Core(RiseError::BadRevision(format!("{to_cut} has no parent to cut against"))))?;

    let mut steps = vec![TodoStep {
        command: TodoCommand::Cut,
        commit: to_cut.clone(),
        message_override: None,
    }];
    steps.extend(rewrite::rewrite_range(repo, &to_cut, head)?.into_iter().map(|commit| TodoStep {
        command: TodoCommand::Pick,
        commit,
        message_override: None,
    }));

    let options = RewriteOptions {
        reauthor: args.reauthor,
        interactive: false,
        autosquash,
        message_override: None,
        ref_name: Some(ref_name.to_owned()),
        sign: config::gpg_sign_enabled(repo.config()),
        run_commit_msg_hook: config::run_commit_msg_hook(repo.config()),
    };
    let outcome = rewrite::run(repo, rerere, &parent, Todo::new(steps), &options)?;
    land(repo, ref_name, head, outcome)
}

fn land(
    repo: &Repository,
    ref_name: &str,
    old_head: &CommitId,
    outcome: rewrite::RunOutcome,
) -> Result<RewriteOutcome, CliError> {
    let finished = rewrite::finish(repo, ref_name, old_head, &outcome.head)?;
    if let Some(tree) = outcome.pending_index {
        repo.write_tree_to_index(&tree)?;
    }
    Ok(finished)
}

fn run_editor_round_trip(repo: &Repository, todo: Todo, autosquash: bool, edit_mode: bool) -> Result<Todo, CliError> {
    let todo = if autosquash {
        Todo::new(revise_lib::todo::autosquash(repo.cache(), todo.steps)?)
    } else {
        todo
    };

    let sample = todo_subjects_sample(repo, &todo);
    let comment_char = config::comment_char(repo.config(), &sample);
    let rendered = todo.render(repo.cache(), comment_char, edit_mode);
    let edited = repo
        .sequence_editor()
        .edit_text(&rendered, "-revise-todo")
        .map_err(|_| CliError::Core(RiseError::UserAbort))?;
    let parsed = Todo::parse(&edited, repo.cache(), comment_char)?;
    if parsed.steps.is_empty() {
        return Err(CliError::Core(RiseError::UserAbort));
    }
    parsed.validate()?;
    Ok(parsed)
}

/// Concatenates each step's commit subject, for `core.commentChar = auto` to
/// scan when picking a comment character the todo text won't collide with.
fn todo_subjects_sample(repo: &Repository, todo: &Todo) -> Vec<u8> {
    let mut sample = Vec::new();
    for step in &todo.steps {
        if let Ok(commit) = repo.cache().get(&Oid::from(step.commit.clone())).and_then(|obj| {
            obj.into_commit()
                .ok_or_else(|| RiseError::BadRevision(step.commit.to_string()))
        }) {
            sample.extend_from_slice(commit.summary().as_bytes());
            sample.push(b'\n');
        }
    }
    sample
}

fn resolve_commit(repo: &Repository, expr: &str) -> Result<CommitId, CliError> {
    let oid = revision::resolve(repo, expr)?;
    Ok(CommitId::from_bytes(oid.as_bytes()))
}

/// Determines the tree of staged changes to fold into the anchor commit,
/// per `-a`/`-p`/`--no-index` (§6). `-a`/`-p` are external-collaborator
/// operations: they shell out to the VCS binary's own `add` porcelain
/// before asking it for the resulting tree, never touching the index
/// format themselves.
fn staged_tree(repo: &Repository, args: &Args, target_tree: &TreeId) -> Result<TreeId, CliError> {
    if args.no_index {
        return Ok(target_tree.clone());
    }
    let vcs = config::resolve_vcs_binary(repo.config());
    if args.all {
        run_vcs(&vcs, repo, &["add", "--all"], Stdio::null())?;
    } else if args.patch {
        // `add --patch` is interactive, so stdio is inherited rather than
        // captured.
        run_vcs(&vcs, repo, &["add", "--patch"], Stdio::inherit())?;
    }
    Ok(repo.write_tree()?)
}

fn run_vcs(vcs: &str, repo: &Repository, argv: &[&str], stdout: Stdio) -> Result<(), CliError> {
    let status = Command::new(vcs)
        .env("GIT_DIR", repo.git_dir())
        .args(argv)
        .stdout(stdout)
        .status()
        .map_err(|source| RiseError::VcsFailed {
            cmd: argv.join(" "),
            stderr: source.to_string(),
        })?;
    if status.success() {
        Ok(())
    } else {
        Err(CliError::Core(RiseError::VcsFailed {
            cmd: argv.join(" "),
            stderr: format!("exit status {status}"),
        }))
    }
}

/// The one-line porcelain summary (§C.5), matching the reflog message
/// `finish` already wrote.
fn summary_line(repo: &Repository, outcome: &RewriteOutcome) -> String {
    let short_old = &outcome.old_head.hex()[..outcome.old_head.hex().len().min(7)];
    let summary = repo
        .cache()
        .get(&Oid::from(outcome.new_head.clone()))
        .ok()
        .and_then(|obj| obj.into_commit())
        .map(|c| c.summary().to_string())
        .unwrap_or_default();
    format!("revise ({short_old}): {summary}")
}
