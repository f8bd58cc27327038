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

//! End-to-end tests driving `revise_cli::app::run` against a hand-built,
//! loose-object-only repository on disk — no shelling out to `git` for
//! fixture setup, matching the library's own test philosophy (only the
//! `-a`/`-p`/`cut` code paths shell out, and none of those are exercised
//! here).

use bstr::BString;
use revise_cli::app;
use revise_cli::cli::Args;
use revise_cli::error::CliError;
use revise_lib::object::FileMode;
use revise_lib::object::Object;
use revise_lib::object::Tree;
use revise_lib::object::TreeEntry;
use revise_lib::object_id::CommitId;
use revise_lib::object_id::ObjectId as _;
use revise_lib::object_id::Oid;
use revise_lib::object_id::TreeId;
use revise_lib::repo::Repository;

struct Fixture {
    _dir: tempfile::TempDir,
    repo_root: std::path::PathBuf,
}

fn blank_args() -> Args {
    Args {
        target: None,
        all: false,
        patch: false,
        no_index: false,
        reauthor: false,
        ref_name: None,
        interactive: false,
        autosquash: false,
        no_autosquash: false,
        cut: false,
        edit: false,
        message: None,
        verbose: 0,
        quiet: false,
    }
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
    let commit = Object::Commit(revise_lib::object::Commit {
        tree: TreeId::from_bytes(tree_id.as_bytes()),
        parents,
        author: BString::from(b"Jane <jane@x.com> 1000 +0000".to_vec()),
        committer: BString::from(b"Jane <jane@x.com> 1000 +0000".to_vec()),
        gpgsig: None,
        extra_headers: Vec::new(),
        message: BString::from(message.as_bytes().to_vec()),
    });
    let id = repo.cache().new_object(commit);
    CommitId::from_bytes(id.as_bytes())
}

/// Builds `A -- B -- C` on `refs/heads/main`, persists every object to loose
/// storage, and points `HEAD` at the branch.
fn linear_history_fixture() -> (Fixture, CommitId, CommitId, CommitId) {
    let dir = tempfile::tempdir().unwrap();
    let git_dir = dir.path().join(".git");
    std::fs::create_dir_all(git_dir.join("objects/pack")).unwrap();
    std::fs::create_dir_all(git_dir.join("refs/heads")).unwrap();
    std::fs::write(git_dir.join("HEAD"), "ref: refs/heads/main\n").unwrap();
    let repo = Repository::open(&git_dir).unwrap();

    let a = make_commit(&repo, vec![], b"a", "A");
    let b = make_commit(&repo, vec![a.clone()], b"b", "B");
    let c = make_commit(&repo, vec![b.clone()], b"c", "C");
    repo.cache().flush(&Oid::from(c.clone())).unwrap();
    std::fs::write(git_dir.join("refs/heads/main"), format!("{c}\n")).unwrap();

    (
        Fixture {
            _dir: dir,
            repo_root: git_dir.parent().unwrap().to_path_buf(),
        },
        a,
        b,
        c,
    )
}

#[test]
fn message_with_interactive_is_rejected_before_touching_a_repository() {
    let mut args = blank_args();
    args.message = Some("msg".to_owned());
    args.interactive = true;
    // Run from a directory that definitely isn't a repository: the misuse
    // check must fire before `Repository::discover` ever runs.
    let cwd = std::env::temp_dir();
    let err = app::run(&args, &cwd).unwrap_err();
    assert!(matches!(err, CliError::MessageWithInteractive));
}

#[test]
fn no_index_fixup_replays_the_range_unchanged() {
    let (fixture, _a, b, c) = linear_history_fixture();
    let mut args = blank_args();
    args.target = Some(b.hex());
    args.no_index = true;

    let summary = app::run(&args, &fixture.repo_root).unwrap();
    assert!(summary.starts_with("revise ("));
    assert!(summary.contains(": C"));

    let repo = Repository::open(&fixture.repo_root.join(".git")).unwrap();
    let new_head = repo.resolve_ref("refs/heads/main").unwrap().unwrap();
    assert_ne!(new_head, c, "rewriting always mints new commit objects");

    let head_commit = repo
        .cache()
        .get(&Oid::from(new_head.clone()))
        .unwrap()
        .into_commit()
        .unwrap();
    assert_eq!(head_commit.message, BString::from(b"C".to_vec()));

    let parent_commit = repo
        .cache()
        .get(&Oid::from(head_commit.parents[0].clone()))
        .unwrap()
        .into_commit()
        .unwrap();
    assert_eq!(parent_commit.message, BString::from(b"B".to_vec()));
    assert_eq!(parent_commit.parents.len(), 1);
}

#[test]
fn detached_head_without_ref_flag_is_misuse() {
    let (fixture, _a, b, c) = linear_history_fixture();
    let git_dir = fixture.repo_root.join(".git");
    std::fs::remove_file(git_dir.join("HEAD")).unwrap();
    std::fs::write(git_dir.join("HEAD"), format!("{c}\n")).unwrap();

    let mut args = blank_args();
    args.target = Some(b.hex());
    args.no_index = true;
    let err = app::run(&args, &fixture.repo_root).unwrap_err();
    assert!(matches!(err, CliError::DetachedHead));
}

#[test]
fn reauthor_replaces_author_on_every_rewritten_commit() {
    let (fixture, _a, b, _c) = linear_history_fixture();
    let mut args = blank_args();
    args.target = Some(b.hex());
    args.no_index = true;
    args.reauthor = true;

    app::run(&args, &fixture.repo_root).unwrap();

    let repo = Repository::open(&fixture.repo_root.join(".git")).unwrap();
    let new_head = repo.resolve_ref("refs/heads/main").unwrap().unwrap();
    let head_commit = repo
        .cache()
        .get(&Oid::from(new_head))
        .unwrap()
        .into_commit()
        .unwrap();
    assert_ne!(head_commit.author, BString::from(b"Jane <jane@x.com> 1000 +0000".to_vec()));
}
