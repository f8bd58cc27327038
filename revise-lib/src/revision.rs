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

//! C4: resolves the small slice of the VCS's revision grammar the rewrite
//! engine needs — bare ids, ref names, peel suffixes, and parent/ancestor
//! steps — against the object cache.

use crate::error::RiseError;
use crate::object::Object;
use crate::object::ObjectKind;
use crate::object_id::HexPrefix;
use crate::object_id::Oid;
use crate::repo::Repository;

/// One parsed step of a revision expression, applied left to right after the
/// base is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    /// `^{commit}` / `^{tree}` / `^{}` — peel to the named kind (`^{}` peels
    /// tags all the way down to a non-tag object).
    Peel(Option<ObjectKind>),
    /// `^` or `^N` — Nth first parent (`^` alone means `^1`).
    Parent(u32),
    /// `~N` — Nth generation first-parent ancestor (`~0` is a no-op).
    Ancestor(u32),
}

/// Resolves `expr` against `repo`, defaulting to `HEAD` when `expr` is empty.
pub fn resolve(repo: &Repository, expr: &str) -> Result<Oid, RiseError> {
    let expr = if expr.is_empty() { "HEAD" } else { expr };
    let (base, steps) = split_steps(expr)?;
    let mut oid = resolve_base(repo, base)?;
    for step in steps {
        oid = apply_step(repo, &oid, &step)?;
    }
    Ok(oid)
}

fn resolve_base(repo: &Repository, base: &str) -> Result<Oid, RiseError> {
    if base == "HEAD" {
        return Ok(Oid::from(repo.head_commit()?));
    }
    if looks_like_hex(base) {
        if let Some(prefix) = HexPrefix::try_from_hex(base) {
            if let Ok(id) = repo.cache().get_abbrev(&prefix) {
                return Ok(id);
            }
        }
    }
    for candidate in ref_candidates(base) {
        if let Some(id) = repo.resolve_ref(&candidate)? {
            return Ok(Oid::from(id));
        }
    }
    Err(RiseError::BadRevision(base.to_owned()))
}

fn ref_candidates(name: &str) -> Vec<String> {
    if name.starts_with("refs/") {
        vec![name.to_owned()]
    } else {
        vec![
            format!("refs/heads/{name}"),
            format!("refs/tags/{name}"),
            format!("refs/remotes/{name}"),
            name.to_owned(),
        ]
    }
}

fn looks_like_hex(s: &str) -> bool {
    !s.is_empty() && s.len() <= 64 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Splits a revision expression into its base and the sequence of `^`/`~`
/// steps applied to it, e.g. `main~2^{tree}` -> (`main`, [Ancestor(2),
/// Peel(Tree)]).
fn split_steps(expr: &str) -> Result<(&str, Vec<Step>), RiseError> {
    let mut steps = Vec::new();
    let mut rest = expr;
    loop {
        if let Some(inner) = rest.strip_suffix("^{}") {
            steps.push(Step::Peel(None));
            rest = inner;
            continue;
        }
        if let Some(inner) = rest.strip_suffix("^{commit}") {
            steps.push(Step::Peel(Some(ObjectKind::Commit)));
            rest = inner;
            continue;
        }
        if let Some(inner) = rest.strip_suffix("^{tree}") {
            steps.push(Step::Peel(Some(ObjectKind::Tree)));
            rest = inner;
            continue;
        }
        if let Some(inner) = rest.strip_suffix('^') {
            steps.push(Step::Parent(1));
            rest = inner;
            continue;
        }
        if let Some((inner, n)) = split_trailing_number(rest, '^') {
            steps.push(Step::Parent(n));
            rest = inner;
            continue;
        }
        if let Some((inner, n)) = split_trailing_number(rest, '~') {
            steps.push(Step::Ancestor(n));
            rest = inner;
            continue;
        }
        break;
    }
    if rest.is_empty() {
        return Err(RiseError::BadRevision(expr.to_owned()));
    }
    steps.reverse();
    Ok((rest, steps))
}

fn split_trailing_number(s: &str, marker: char) -> Option<(&str, u32)> {
    let marker_pos = s.rfind(marker)?;
    let digits = &s[marker_pos + marker.len_utf8()..];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n: u32 = digits.parse().ok()?;
    Some((&s[..marker_pos], n))
}

fn apply_step(repo: &Repository, oid: &Oid, step: &Step) -> Result<Oid, RiseError> {
    match step {
        Step::Peel(kind) => peel(repo, oid, *kind),
        Step::Parent(n) => nth_parent(repo, oid, *n),
        Step::Ancestor(n) => {
            let mut current = oid.clone();
            for _ in 0..*n {
                current = nth_parent(repo, &current, 1)?;
            }
            Ok(current)
        }
    }
}

fn peel(repo: &Repository, oid: &Oid, kind: Option<ObjectKind>) -> Result<Oid, RiseError> {
    let mut current = oid.clone();
    loop {
        let object = repo.cache().get(&current)?;
        match (&object, kind) {
            (Object::Tag(tag), _) => {
                current = tag.object.clone();
                continue;
            }
            (Object::Commit(_), Some(ObjectKind::Commit) | None) => return Ok(current),
            (Object::Commit(commit), Some(ObjectKind::Tree)) => {
                return Ok(Oid::from(commit.tree.clone()));
            }
            (_, None) => return Ok(current),
            (other, Some(wanted)) if other.kind() == wanted => return Ok(current),
            _ => {
                return Err(RiseError::BadRevision(format!(
                    "cannot peel {current} to {kind:?}"
                )));
            }
        }
    }
}

fn nth_parent(repo: &Repository, oid: &Oid, n: u32) -> Result<Oid, RiseError> {
    if n == 0 {
        return Ok(oid.clone());
    }
    let object = repo.cache().get(oid)?;
    let commit = object
        .as_commit()
        .ok_or_else(|| RiseError::BadRevision(format!("{oid} is not a commit")))?;
    let parent = commit
        .parents
        .get((n - 1) as usize)
        .ok_or_else(|| RiseError::BadRevision(format!("{oid} has no parent number {n}")))?;
    Ok(Oid::from(parent.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_compound_suffix() {
        let (base, steps) = split_steps("main~2^{tree}").unwrap();
        assert_eq!(base, "main");
        assert_eq!(steps, vec![Step::Ancestor(2), Step::Peel(Some(ObjectKind::Tree))]);
    }

    #[test]
    fn bare_caret_is_first_parent() {
        let (base, steps) = split_steps("HEAD^").unwrap();
        assert_eq!(base, "HEAD");
        assert_eq!(steps, vec![Step::Parent(1)]);
    }

    #[test]
    fn numbered_caret_selects_parent_index() {
        let (base, steps) = split_steps("HEAD^2").unwrap();
        assert_eq!(base, "HEAD");
        assert_eq!(steps, vec![Step::Parent(2)]);
    }

    #[test]
    fn rejects_empty_base() {
        assert!(split_steps("^").is_err());
    }
}
