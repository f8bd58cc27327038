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

//! C5: the purely functional three-way tree merge. No disk index is ever
//! consulted — everything is driven from the three trees' object graphs,
//! with blob-level conflicts delegated to the VCS's `merge-file` driver and,
//! failing that, to the user's editor.

use bstr::BString;
use bstr::ByteSlice as _;

use crate::cache::ObjectCache;
use crate::error::RiseError;
use crate::object::FileMode;
use crate::object::Object;
use crate::object::Tree;
use crate::object::TreeEntry;
use crate::object_id::Oid;
use crate::object_id::TreeId;
use crate::repo::Repository;
use crate::rerere::RerereStore;

/// Labels identifying the three sides of a merge, surfaced in conflict
/// markers so the user sees which commit's change failed rather than a bare
/// filename (§4.5 — the VCS's `merge-file -L` labels).
pub struct MergeLabels<'a> {
    pub base: &'a str,
    pub ours: &'a str,
    pub theirs: &'a str,
}

/// Three-way merges `ours` and `theirs` against `base`, recursing into
/// subtrees and delegating blob conflicts to `repo`. Path conflicts (a
/// directory vs a file, or an unreconcilable mode change) are synthesized as
/// `<name>~ours`/`<name>~theirs` sibling entries and then resolved against
/// the user's editor in a single top-level pass once the whole tree has been
/// built (§4.5). Returns the id of the merged (and fully resolved) tree.
pub fn merge_trees(
    repo: &Repository,
    rerere: Option<&RerereStore>,
    base: &TreeId,
    ours: &TreeId,
    theirs: &TreeId,
    labels: &MergeLabels<'_>,
) -> Result<TreeId, RiseError> {
    let merged = merge_trees_recursive(repo, rerere, base, ours, theirs, labels)?;
    resolve_path_conflicts(repo, &merged, labels)
}

fn merge_trees_recursive(
    repo: &Repository,
    rerere: Option<&RerereStore>,
    base: &TreeId,
    ours: &TreeId,
    theirs: &TreeId,
    labels: &MergeLabels<'_>,
) -> Result<TreeId, RiseError> {
    let base_tree = get_tree(repo.cache(), &Oid::from(base.clone()))?;
    let ours_tree = get_tree(repo.cache(), &Oid::from(ours.clone()))?;
    let theirs_tree = get_tree(repo.cache(), &Oid::from(theirs.clone()))?;

    let mut names: Vec<&[u8]> = Vec::new();
    for tree in [&base_tree, &ours_tree, &theirs_tree] {
        for entry in tree.entries() {
            if !names.contains(&entry.name.as_slice()) {
                names.push(entry.name.as_slice());
            }
        }
    }

    let mut merged_entries = Vec::new();
    for name in names {
        let base_entry = base_tree.get(name);
        let ours_entry = ours_tree.get(name);
        let theirs_entry = theirs_tree.get(name);
        merged_entries.extend(merge_entry(
            repo,
            rerere,
            name,
            base_entry,
            ours_entry,
            theirs_entry,
            labels,
        )?);
    }

    let tree = Tree::from_entries(merged_entries).map_err(RiseError::CorruptObject)?;
    let id = repo.cache().new_object(Object::Tree(tree));
    Ok(TreeId::from_bytes(id.as_bytes()))
}

fn merge_entry(
    repo: &Repository,
    rerere: Option<&RerereStore>,
    name: &[u8],
    base: Option<&TreeEntry>,
    ours: Option<&TreeEntry>,
    theirs: Option<&TreeEntry>,
    labels: &MergeLabels<'_>,
) -> Result<Vec<TreeEntry>, RiseError> {
    // Rule 1: both sides agree (including both absent).
    if entries_equal(ours, theirs) {
        return Ok(ours.cloned().into_iter().collect());
    }
    // Rule 2: one side is unchanged from base, take the other.
    if entries_equal(base, ours) {
        return Ok(theirs.cloned().into_iter().collect());
    }
    if entries_equal(base, theirs) {
        return Ok(ours.cloned().into_iter().collect());
    }

    // Rule 3: a true three-way change.
    match (ours, theirs) {
        (Some(o), Some(t)) if o.mode.is_tree() && t.mode.is_tree() => {
            let base_tree_id = base
                .filter(|b| b.mode.is_tree())
                .map(|b| TreeId::from_bytes(b.oid.as_bytes()))
                .unwrap_or_else(empty_tree_id);
            let ours_tree_id = TreeId::from_bytes(o.oid.as_bytes());
            let theirs_tree_id = TreeId::from_bytes(t.oid.as_bytes());
            let merged = merge_trees_recursive(
                repo,
                rerere,
                &base_tree_id,
                &ours_tree_id,
                &theirs_tree_id,
                labels,
            )?;
            Ok(vec![TreeEntry {
                name: BString::from(name.to_vec()),
                mode: FileMode::Tree,
                oid: Oid::from(merged),
            }])
        }
        (Some(o), Some(t)) if o.mode.is_blob_like() && t.mode.is_blob_like() && o.mode == t.mode => {
            Ok(merge_blob(repo, rerere, name, base, o, t, labels)?
                .into_iter()
                .collect())
        }
        (None, None) => Ok(Vec::new()),
        _ => Ok(path_conflict_entries(name, ours, theirs)),
    }
}

fn merge_blob(
    repo: &Repository,
    rerere: Option<&RerereStore>,
    name: &[u8],
    base: Option<&TreeEntry>,
    ours: &TreeEntry,
    theirs: &TreeEntry,
    labels: &MergeLabels<'_>,
) -> Result<Option<TreeEntry>, RiseError> {
    let base_bytes = match base {
        Some(entry) if entry.mode.is_blob_like() => get_blob(repo.cache(), &entry.oid)?,
        _ => Vec::new(),
    };
    let ours_bytes = get_blob(repo.cache(), &ours.oid)?;
    let theirs_bytes = get_blob(repo.cache(), &theirs.oid)?;

    let fingerprint = crate::rerere::fingerprint(&base_bytes, &ours_bytes, &theirs_bytes);
    if let Some(store) = rerere {
        if let Some(resolution) = store.lookup(&fingerprint) {
            let id = repo.cache().new_object(Object::Blob(resolution));
            return Ok(Some(TreeEntry {
                name: BString::from(name.to_vec()),
                mode: ours.mode,
                oid: id,
            }));
        }
    }

    let (merged, clean) = repo.merge_file(
        &ours_bytes,
        &base_bytes,
        &theirs_bytes,
        (labels.ours, labels.base, labels.theirs),
    )?;

    let resolved = if clean {
        merged
    } else {
        let edited = repo.editor().edit_text(&merged, "-conflict").map_err(|_| {
            RiseError::UnresolvedConflict {
                path: name.to_vec(),
            }
        })?;
        if contains_conflict_markers(&edited) {
            return Err(RiseError::UnresolvedConflict {
                path: name.to_vec(),
            });
        }
        // `rerere.autoUpdate` gates whether a freshly hand-resolved conflict
        // is memoized automatically; with it unset, the resolution only
        // benefits this invocation and is not written to the store for
        // future replay (§6 — `rerere.autoUpdate`).
        if let Some(store) = rerere {
            if crate::config::rerere_autoupdate(repo.config()) {
                store.record(&fingerprint, &edited)?;
            }
        }
        edited
    };

    let id = repo.cache().new_object(Object::Blob(resolved));
    Ok(Some(TreeEntry {
        name: BString::from(name.to_vec()),
        mode: ours.mode,
        oid: id,
    }))
}

fn contains_conflict_markers(bytes: &[u8]) -> bool {
    bytes.lines().any(|line| {
        line.starts_with(b"<<<<<<<") || line.starts_with(b"=======") || line.starts_with(b">>>>>>>")
    })
}

/// Mixed kinds (blob vs tree) or an unreconcilable mode change: synthesize a
/// conflicted entry per present side rather than guessing (§4.5 — "no
/// implicit flattening"). [`resolve_path_conflicts`] collapses these back
/// down to a single entry once the whole tree has been built.
fn path_conflict_entries(
    name: &[u8],
    ours: Option<&TreeEntry>,
    theirs: Option<&TreeEntry>,
) -> Vec<TreeEntry> {
    let mut entries = Vec::new();
    if let Some(o) = ours {
        entries.push(TreeEntry {
            name: conflict_name(name, "ours"),
            mode: o.mode,
            oid: o.oid.clone(),
        });
    }
    if let Some(t) = theirs {
        entries.push(TreeEntry {
            name: conflict_name(name, "theirs"),
            mode: t.mode,
            oid: t.oid.clone(),
        });
    }
    entries
}

fn conflict_name(name: &[u8], side: &str) -> BString {
    let mut bytes = name.to_vec();
    bytes.push(b'~');
    bytes.extend_from_slice(side.as_bytes());
    BString::from(bytes)
}

#[derive(Clone, Copy)]
enum ConflictSide {
    Ours,
    Theirs,
}

fn split_conflict_suffix(name: &[u8]) -> Option<(&[u8], ConflictSide)> {
    if let Some(base) = name.strip_suffix(b"~ours") {
        Some((base, ConflictSide::Ours))
    } else if let Some(base) = name.strip_suffix(b"~theirs") {
        Some((base, ConflictSide::Theirs))
    } else {
        None
    }
}

/// Walks a merged tree bottom-up, collapsing every `<name>~ours`/
/// `<name>~theirs` sibling pair produced by [`path_conflict_entries`] back
/// into a single `<name>` entry by prompting the user for which side to
/// keep (§4.5). Recurses into ordinary subtrees first so a path conflict
/// nested several directories deep is resolved, and its new tree oid
/// threaded upward, before this level's own tree is rebuilt.
fn resolve_path_conflicts(
    repo: &Repository,
    tree_id: &TreeId,
    labels: &MergeLabels<'_>,
) -> Result<TreeId, RiseError> {
    let tree = get_tree(repo.cache(), &Oid::from(tree_id.clone()))?;

    let mut conflicts: Vec<(BString, Option<TreeEntry>, Option<TreeEntry>)> = Vec::new();
    let mut plain: Vec<TreeEntry> = Vec::new();

    for entry in tree.entries() {
        if let Some((base_name, side)) = split_conflict_suffix(&entry.name) {
            let slot = match conflicts.iter().position(|(n, ..)| n.as_slice() == base_name) {
                Some(i) => &mut conflicts[i],
                None => {
                    conflicts.push((BString::from(base_name.to_vec()), None, None));
                    conflicts.last_mut().unwrap()
                }
            };
            match side {
                ConflictSide::Ours => slot.1 = Some(entry.clone()),
                ConflictSide::Theirs => slot.2 = Some(entry.clone()),
            }
        } else if entry.mode.is_tree() {
            let sub_id = TreeId::from_bytes(entry.oid.as_bytes());
            let resolved = resolve_path_conflicts(repo, &sub_id, labels)?;
            plain.push(TreeEntry {
                name: entry.name.clone(),
                mode: entry.mode,
                oid: Oid::from(resolved),
            });
        } else {
            plain.push(entry.clone());
        }
    }

    if conflicts.is_empty() {
        let t = Tree::from_entries(plain).map_err(RiseError::CorruptObject)?;
        let id = repo.cache().new_object(Object::Tree(t));
        return Ok(TreeId::from_bytes(id.as_bytes()));
    }

    for (base_name, ours, theirs) in conflicts {
        plain.push(resolve_one_path_conflict(repo, base_name, ours, theirs, labels)?);
    }

    let t = Tree::from_entries(plain).map_err(RiseError::CorruptObject)?;
    let id = repo.cache().new_object(Object::Tree(t));
    Ok(TreeId::from_bytes(id.as_bytes()))
}

fn resolve_one_path_conflict(
    repo: &Repository,
    base_name: BString,
    ours: Option<TreeEntry>,
    theirs: Option<TreeEntry>,
    labels: &MergeLabels<'_>,
) -> Result<TreeEntry, RiseError> {
    let describe = |entry: &Option<TreeEntry>, label: &str| match entry {
        Some(e) if e.mode.is_tree() => format!("{label}: directory ({})\n", e.oid.hex()),
        Some(e) => format!(
            "{label}: file, mode {:o} ({})\n",
            e.mode.as_octal(),
            e.oid.hex()
        ),
        None => format!("{label}: (absent)\n"),
    };
    let prompt = format!(
        "Path conflict at `{}`:\n\n{}{}\n\
         Uncomment exactly one line below to choose which side to keep:\n\n\
         #keep ours\n#keep theirs\n",
        String::from_utf8_lossy(&base_name),
        describe(&ours, labels.ours),
        describe(&theirs, labels.theirs),
    );
    let edited = repo
        .editor()
        .edit_text(prompt.as_bytes(), "-path-conflict")
        .map_err(|_| RiseError::UnresolvedConflict {
            path: base_name.to_vec(),
        })?;
    let chosen = parse_keep_directive(&edited);
    match chosen {
        Some(ConflictSide::Ours) if ours.is_some() => Ok(TreeEntry {
            name: base_name,
            ..ours.unwrap()
        }),
        Some(ConflictSide::Theirs) if theirs.is_some() => Ok(TreeEntry {
            name: base_name,
            ..theirs.unwrap()
        }),
        _ => Err(RiseError::UnresolvedConflict {
            path: base_name.to_vec(),
        }),
    }
}

fn parse_keep_directive(bytes: &[u8]) -> Option<ConflictSide> {
    bytes.lines().map(|line| line.trim()).find_map(|line| {
        if line.eq_ignore_ascii_case(b"keep ours") {
            Some(ConflictSide::Ours)
        } else if line.eq_ignore_ascii_case(b"keep theirs") {
            Some(ConflictSide::Theirs)
        } else {
            None
        }
    })
}

fn entries_equal(a: Option<&TreeEntry>, b: Option<&TreeEntry>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.mode == b.mode && a.oid == b.oid,
        _ => false,
    }
}

fn get_tree(cache: &ObjectCache, id: &Oid) -> Result<Tree, RiseError> {
    if id.as_bytes().is_empty() {
        return Ok(Tree::default());
    }
    match cache.get(id)? {
        Object::Tree(tree) => Ok(tree),
        _ => Err(RiseError::CorruptObject(
            crate::error::CorruptObjectError::BadHeader {
                id: id.hex(),
                message: "expected a tree".to_owned(),
            },
        )),
    }
}

fn get_blob(cache: &ObjectCache, id: &Oid) -> Result<Vec<u8>, RiseError> {
    match cache.get(id)? {
        Object::Blob(bytes) => Ok(bytes),
        _ => Err(RiseError::CorruptObject(
            crate::error::CorruptObjectError::BadHeader {
                id: id.hex(),
                message: "expected a blob".to_owned(),
            },
        )),
    }
}

/// The id of the canonical empty tree, used as a synthetic base when a side
/// doesn't have a subtree at this path at all.
fn empty_tree_id() -> TreeId {
    TreeId::new(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::HashAlgorithm;
    use crate::odb::Odb;

    fn test_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let git_dir = dir.path().join(".git");
        std::fs::create_dir_all(git_dir.join("objects/pack")).unwrap();
        std::fs::create_dir_all(git_dir.join("refs/heads")).unwrap();
        std::fs::write(git_dir.join("HEAD"), "ref: refs/heads/main\n").unwrap();
        let repo = Repository::open(&git_dir).unwrap();
        (dir, repo)
    }

    fn blob(repo: &Repository, content: &[u8]) -> Oid {
        repo.cache().new_object(Object::Blob(content.to_vec()))
    }

    fn tree_with(repo: &Repository, entries: Vec<(&str, Oid)>) -> TreeId {
        let entries = entries
            .into_iter()
            .map(|(name, oid)| TreeEntry {
                name: BString::from(name.as_bytes().to_vec()),
                mode: FileMode::Regular,
                oid,
            })
            .collect();
        let tree = Tree::from_entries(entries).unwrap();
        let id = repo.cache().new_object(Object::Tree(tree));
        TreeId::from_bytes(id.as_bytes())
    }

    #[test]
    fn unchanged_path_keeps_ours_value() {
        let (_dir, repo) = test_repo();
        let a = blob(&repo, b"same");
        let base = tree_with(&repo, vec![("f", a.clone())]);
        let ours = tree_with(&repo, vec![("f", a.clone())]);
        let theirs = tree_with(&repo, vec![("f", a)]);
        let labels = MergeLabels {
            base: "base",
            ours: "ours",
            theirs: "theirs",
        };
        let merged = merge_trees(&repo, None, &base, &ours, &theirs, &labels).unwrap();
        assert_eq!(merged, ours);
    }

    #[test]
    fn side_that_changed_from_base_wins() {
        let (_dir, repo) = test_repo();
        let original = blob(&repo, b"original");
        let changed = blob(&repo, b"changed");
        let base = tree_with(&repo, vec![("f", original.clone())]);
        let ours = tree_with(&repo, vec![("f", original)]);
        let theirs = tree_with(&repo, vec![("f", changed)]);
        let labels = MergeLabels {
            base: "base",
            ours: "ours",
            theirs: "theirs",
        };
        let merged = merge_trees(&repo, None, &base, &ours, &theirs, &labels).unwrap();
        assert_eq!(merged, theirs);
    }
}
