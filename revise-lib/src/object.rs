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

//! C1: the object codec.
//!
//! Parses and serializes the four VCS object kinds from/to the bytes the
//! store keeps on disk (after zlib inflation). The codec never touches the
//! filesystem itself; see [`crate::odb`] for that.

use std::fmt;
use std::io::Read as _;
use std::io::Write as _;

use bstr::BString;
use bstr::ByteSlice as _;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use crate::error::CorruptObjectError;
use crate::object_id::CommitId;
use crate::object_id::Oid;
use crate::object_id::TreeId;

/// Hash algorithm used to compute object identifiers. Git repositories default
/// to `Sha1`; `extensions.objectFormat = sha256` repositories use `Sha256`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    pub fn id_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
        }
    }

    fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha1 => {
                use sha1::Digest as _;
                sha1::Sha1::digest(data).to_vec()
            }
            Self::Sha256 => {
                use sha2::Digest as _;
                sha2::Sha256::digest(data).to_vec()
            }
        }
    }
}

/// The four object kinds the VCS knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
    Tag,
}

impl ObjectKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Tree => "tree",
            Self::Commit => "commit",
            Self::Tag => "tag",
        }
    }

    fn parse(s: &[u8]) -> Option<Self> {
        match s {
            b"blob" => Some(Self::Blob),
            b"tree" => Some(Self::Tree),
            b"commit" => Some(Self::Commit),
            b"tag" => Some(Self::Tag),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tree entry's file mode. Mirrors the fixed set the VCS recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    Regular,
    Executable,
    Symlink,
    Gitlink,
    Tree,
}

impl FileMode {
    pub fn as_octal(self) -> u32 {
        match self {
            Self::Regular => 0o100644,
            Self::Executable => 0o100755,
            Self::Symlink => 0o120000,
            Self::Gitlink => 0o160000,
            Self::Tree => 0o040000,
        }
    }

    pub fn from_octal(mode: u32) -> Option<Self> {
        match mode {
            0o100644 => Some(Self::Regular),
            0o100755 => Some(Self::Executable),
            0o120000 => Some(Self::Symlink),
            0o160000 => Some(Self::Gitlink),
            0o040000 => Some(Self::Tree),
            _ => None,
        }
    }

    pub fn is_tree(self) -> bool {
        matches!(self, Self::Tree)
    }

    pub fn is_blob_like(self) -> bool {
        matches!(self, Self::Regular | Self::Executable | Self::Symlink)
    }
}

/// One entry of a [`Tree`]: a name, its mode, and the child object it points
/// at (a [`Tree`] for `FileMode::Tree`, a blob for anything else).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub name: BString,
    pub mode: FileMode,
    pub oid: Oid,
}

/// Canonical tree-entry ordering: compare names byte-wise, but treat a
/// directory's name as if it had a trailing `/` so e.g. `foo` sorts after
/// `foo-bar` but before `foo/anything`.
fn order_key(name: &[u8], mode: FileMode) -> Vec<u8> {
    let mut key = name.to_vec();
    if mode.is_tree() {
        key.push(b'/');
    }
    key
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

impl Tree {
    /// Builds a tree from entries in any order, re-sorting into canonical
    /// order and rejecting duplicate names.
    pub fn from_entries(mut entries: Vec<TreeEntry>) -> Result<Self, CorruptObjectError> {
        entries.sort_by(|a, b| order_key(&a.name, a.mode).cmp(&order_key(&b.name, b.mode)));
        for pair in entries.windows(2) {
            if pair[0].name == pair[1].name {
                return Err(CorruptObjectError::TreeOutOfOrder {
                    id: String::new(),
                    name: pair[0].name.to_vec(),
                });
            }
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    pub fn get(&self, name: &[u8]) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `<name> <email> <unix-ts> <tz-offset>`, e.g. `Jane Doe <jane@x.com> 123 -0700`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: BString,
    pub email: BString,
    pub timestamp: i64,
    pub tz_offset_minutes: i32,
}

impl Signature {
    /// Parses a raw `author`/`committer` header value. The spec requires
    /// that a malformed signature not prevent loading the enclosing commit,
    /// so this returns `None` on any parse failure rather than an error;
    /// callers fall back to the raw bytes.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        let raw = raw.trim_end();
        let email_start = raw.iter().position(|&b| b == b'<')?;
        let email_end = raw[email_start..].iter().position(|&b| b == b'>')? + email_start;
        let name = raw[..email_start].trim_end().to_vec();
        let email = raw[email_start + 1..email_end].to_vec();
        let rest = raw[email_end + 1..].trim_start();
        let mut parts = rest.split(|&b| b == b' ').filter(|p| !p.is_empty());
        let timestamp: i64 = std::str::from_utf8(parts.next()?).ok()?.parse().ok()?;
        let tz_raw = std::str::from_utf8(parts.next()?).ok()?;
        let tz_offset_minutes = parse_tz_offset(tz_raw)?;
        Some(Self {
            name: name.into(),
            email: email.into(),
            timestamp,
            tz_offset_minutes,
        })
    }

    pub fn format(&self) -> BString {
        let sign = if self.tz_offset_minutes < 0 { '-' } else { '+' };
        let abs = self.tz_offset_minutes.unsigned_abs();
        let mut out = Vec::new();
        out.extend_from_slice(&self.name);
        out.extend_from_slice(b" <");
        out.extend_from_slice(&self.email);
        out.extend_from_slice(b"> ");
        out.extend_from_slice(self.timestamp.to_string().as_bytes());
        out.push(b' ');
        out.push(sign as u8);
        out.extend_from_slice(format!("{:02}{:02}", abs / 60, abs % 60).as_bytes());
        out.into()
    }
}

fn parse_tz_offset(raw: &str) -> Option<i32> {
    let (sign, digits) = match raw.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, raw.strip_prefix('+').unwrap_or(raw)),
    };
    if digits.len() != 4 {
        return None;
    }
    let hours: i32 = digits[0..2].parse().ok()?;
    let minutes: i32 = digits[2..4].parse().ok()?;
    Some(sign * (hours * 60 + minutes))
}

/// A commit object. Unknown headers (anything besides `tree`/`parent`/
/// `author`/`committer`/`gpgsig`) are preserved verbatim so untouched commits
/// round-trip byte for byte, including any signature they carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub tree: TreeId,
    pub parents: Vec<CommitId>,
    pub author: BString,
    pub committer: BString,
    pub gpgsig: Option<BString>,
    pub extra_headers: Vec<(BString, BString)>,
    pub message: BString,
}

impl Commit {
    pub fn author_signature(&self) -> Option<Signature> {
        Signature::parse(&self.author)
    }

    pub fn committer_signature(&self) -> Option<Signature> {
        Signature::parse(&self.committer)
    }

    /// The first line of the message, used for autosquash `fixup!`/`squash!`
    /// matching and for rerere labels.
    pub fn summary(&self) -> &bstr::BStr {
        self.message
            .lines()
            .next()
            .map_or_else(|| b""[..].into(), bstr::ByteSlice::as_bstr)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub object: Oid,
    pub target_kind: ObjectKind,
    pub tag: BString,
    pub tagger: Option<BString>,
    pub message: BString,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    Blob(Vec<u8>),
    Tree(Tree),
    Commit(Commit),
    Tag(Tag),
}

impl Object {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Blob(_) => ObjectKind::Blob,
            Self::Tree(_) => ObjectKind::Tree,
            Self::Commit(_) => ObjectKind::Commit,
            Self::Tag(_) => ObjectKind::Tag,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Self::Blob(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_tree(&self) -> Option<&Tree> {
        match self {
            Self::Tree(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_commit(&self) -> Option<&Commit> {
        match self {
            Self::Commit(c) => Some(c),
            _ => None,
        }
    }

    pub fn into_commit(self) -> Option<Commit> {
        match self {
            Self::Commit(c) => Some(c),
            _ => None,
        }
    }
}

/// Serializes `object` into the body that gets hashed and zlib-deflated onto
/// disk (without the `"<kind> <len>\0"` header).
pub fn serialize_body(object: &Object) -> Vec<u8> {
    match object {
        Object::Blob(data) => data.clone(),
        Object::Tree(tree) => serialize_tree(tree),
        Object::Commit(commit) => serialize_commit(commit),
        Object::Tag(tag) => serialize_tag(tag),
    }
}

fn serialize_tree(tree: &Tree) -> Vec<u8> {
    let mut out = Vec::new();
    for entry in tree.entries() {
        out.extend_from_slice(format!("{:o} ", entry.mode.as_octal()).as_bytes());
        out.extend_from_slice(&entry.name);
        out.push(0);
        out.extend_from_slice(entry.oid.as_bytes());
    }
    out
}

fn serialize_commit(commit: &Commit) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"tree ");
    out.extend_from_slice(commit.tree.hex().as_bytes());
    out.push(b'\n');
    for parent in &commit.parents {
        out.extend_from_slice(b"parent ");
        out.extend_from_slice(parent.hex().as_bytes());
        out.push(b'\n');
    }
    write_header(&mut out, b"author", &commit.author);
    write_header(&mut out, b"committer", &commit.committer);
    for (key, value) in &commit.extra_headers {
        write_header(&mut out, key, value);
    }
    if let Some(gpgsig) = &commit.gpgsig {
        write_header(&mut out, b"gpgsig", gpgsig);
    }
    out.push(b'\n');
    out.extend_from_slice(&commit.message);
    out
}

/// Writes a header, continuation-encoding embedded newlines the way the
/// format requires (a line starting with a single space continues the
/// previous header's value) so multi-line values like `gpgsig` round-trip.
fn write_header(out: &mut Vec<u8>, key: &[u8], value: &[u8]) {
    out.extend_from_slice(key);
    out.push(b' ');
    let mut lines = value.split(|&b| b == b'\n');
    if let Some(first) = lines.next() {
        out.extend_from_slice(first);
    }
    for line in lines {
        out.push(b'\n');
        out.push(b' ');
        out.extend_from_slice(line);
    }
    out.push(b'\n');
}

fn serialize_tag(tag: &Tag) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"object ");
    out.extend_from_slice(tag.object.hex().as_bytes());
    out.push(b'\n');
    out.extend_from_slice(b"type ");
    out.extend_from_slice(tag.target_kind.to_string().as_bytes());
    out.push(b'\n');
    out.extend_from_slice(b"tag ");
    out.extend_from_slice(&tag.tag);
    out.push(b'\n');
    if let Some(tagger) = &tag.tagger {
        write_header(&mut out, b"tagger", tagger);
    }
    out.push(b'\n');
    out.extend_from_slice(&tag.message);
    out
}

/// Parses a decompressed object body of the given kind. The id is only used
/// to annotate errors (and is unknown to the self-describing tree/commit/tag
/// formats anyway).
pub fn parse_body(kind: ObjectKind, id_for_errors: &str, body: &[u8]) -> Result<Object, CorruptObjectError> {
    match kind {
        ObjectKind::Blob => Ok(Object::Blob(body.to_vec())),
        ObjectKind::Tree => parse_tree(id_for_errors, body).map(Object::Tree),
        ObjectKind::Commit => parse_commit(id_for_errors, body).map(Object::Commit),
        ObjectKind::Tag => parse_tag(id_for_errors, body).map(Object::Tag),
    }
}

/// Tree entries are `<octal-mode> <name>\0<oid-bytes>` concatenated. The VCS
/// allows historical trees to violate sort order on disk (§4.1), so parsing
/// accepts whatever order the bytes have; only re-serialization re-sorts.
fn parse_tree(id: &str, body: &[u8]) -> Result<Tree, CorruptObjectError> {
    let id_len = oid_len_hint(body);
    let mut entries = Vec::new();
    let mut rest = body;
    while !rest.is_empty() {
        let space = rest.iter().position(|&b| b == b' ').ok_or_else(|| {
            CorruptObjectError::BadHeader {
                id: id.to_owned(),
                message: "missing space after mode".to_owned(),
            }
        })?;
        let mode_str =
            std::str::from_utf8(&rest[..space]).map_err(|_| CorruptObjectError::BadHeader {
                id: id.to_owned(),
                message: "non-utf8 mode".to_owned(),
            })?;
        let mode_raw = u32::from_str_radix(mode_str, 8).map_err(|_| CorruptObjectError::BadHeader {
            id: id.to_owned(),
            message: format!("invalid octal mode {mode_str:?}"),
        })?;
        let mode = FileMode::from_octal(mode_raw).ok_or_else(|| CorruptObjectError::BadHeader {
            id: id.to_owned(),
            message: format!("unsupported mode {mode_raw:o}"),
        })?;
        let nul = rest[space + 1..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| CorruptObjectError::Truncated { id: id.to_owned() })?
            + space
            + 1;
        let name = rest[space + 1..nul].to_vec();
        let oid_start = nul + 1;
        let oid_end = oid_start + id_len;
        if rest.len() < oid_end {
            return Err(CorruptObjectError::Truncated { id: id.to_owned() });
        }
        entries.push(TreeEntry {
            name: name.into(),
            mode,
            oid: Oid::new(rest[oid_start..oid_end].to_vec()),
        });
        rest = &rest[oid_end..];
    }
    Ok(Tree { entries })
}

/// Tree-entry child ids are fixed-width but the width isn't self-describing
/// in the tree body; sha1 (20 bytes) is assumed here. A `sha256`-format
/// repository (`extensions.objectFormat`) is out of scope for this codec —
/// see `DESIGN.md`.
fn oid_len_hint(_body: &[u8]) -> usize {
    20
}

fn parse_commit(id: &str, body: &[u8]) -> Result<Commit, CorruptObjectError> {
    let (headers, message) = split_headers_and_message(id, body)?;
    let mut tree = None;
    let mut parents = Vec::new();
    let mut author = BString::default();
    let mut committer = BString::default();
    let mut gpgsig = None;
    let mut extra_headers = Vec::new();
    for (key, value) in headers {
        match key.as_slice() {
            b"tree" => {
                tree = Some(TreeId::try_from_hex(&value).ok_or_else(|| {
                    CorruptObjectError::BadHeader {
                        id: id.to_owned(),
                        message: "invalid tree id".to_owned(),
                    }
                })?);
            }
            b"parent" => {
                parents.push(CommitId::try_from_hex(&value).ok_or_else(|| {
                    CorruptObjectError::BadHeader {
                        id: id.to_owned(),
                        message: "invalid parent id".to_owned(),
                    }
                })?);
            }
            b"author" => author = value.into(),
            b"committer" => committer = value.into(),
            b"gpgsig" => gpgsig = Some(value.into()),
            _ => extra_headers.push((key.into(), value.into())),
        }
    }
    let tree = tree.ok_or_else(|| CorruptObjectError::BadHeader {
        id: id.to_owned(),
        message: "missing tree header".to_owned(),
    })?;
    Ok(Commit {
        tree,
        parents,
        author,
        committer,
        gpgsig,
        extra_headers,
        message: message.into(),
    })
}

fn parse_tag(id: &str, body: &[u8]) -> Result<Tag, CorruptObjectError> {
    let (headers, message) = split_headers_and_message(id, body)?;
    let mut object = None;
    let mut target_kind = None;
    let mut tag = BString::default();
    let mut tagger = None;
    for (key, value) in headers {
        match key.as_slice() {
            b"object" => {
                object = Some(Oid::new(crate::hex_util::decode_hex(&value).ok_or_else(
                    || CorruptObjectError::BadHeader {
                        id: id.to_owned(),
                        message: "invalid object id".to_owned(),
                    },
                )?));
            }
            b"type" => {
                target_kind =
                    Some(ObjectKind::parse(&value).ok_or_else(|| CorruptObjectError::BadHeader {
                        id: id.to_owned(),
                        message: "invalid type header".to_owned(),
                    })?);
            }
            b"tag" => tag = value.into(),
            b"tagger" => tagger = Some(value.into()),
            _ => {}
        }
    }
    Ok(Tag {
        object: object.ok_or_else(|| CorruptObjectError::BadHeader {
            id: id.to_owned(),
            message: "missing object header".to_owned(),
        })?,
        target_kind: target_kind.unwrap_or(ObjectKind::Commit),
        tag,
        tagger,
        message: message.into(),
    })
}

/// Splits headers (continuation-aware: a line starting with a single space
/// continues the previous header's value) from the blank-line-terminated
/// message body.
fn split_headers_and_message(
    id: &str,
    body: &[u8],
) -> Result<(Vec<(Vec<u8>, Vec<u8>)>, Vec<u8>), CorruptObjectError> {
    let mut headers: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
    let mut pos = 0;
    loop {
        if body.get(pos) == Some(&b'\n') {
            pos += 1;
            break;
        }
        if pos >= body.len() {
            return Err(CorruptObjectError::Truncated { id: id.to_owned() });
        }
        let line_end = body[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| CorruptObjectError::Truncated { id: id.to_owned() })?
            + pos;
        let line = &body[pos..line_end];
        let space = line.iter().position(|&b| b == b' ').ok_or_else(|| {
            CorruptObjectError::BadHeader {
                id: id.to_owned(),
                message: "header line missing space".to_owned(),
            }
        })?;
        let key = line[..space].to_vec();
        let mut value = line[space + 1..].to_vec();
        pos = line_end + 1;
        // Continuation lines start with a single space.
        while body.get(pos) == Some(&b' ') {
            let cont_end = body[pos..]
                .iter()
                .position(|&b| b == b'\n')
                .ok_or_else(|| CorruptObjectError::Truncated { id: id.to_owned() })?
                + pos;
            value.push(b'\n');
            value.extend_from_slice(&body[pos + 1..cont_end]);
            pos = cont_end + 1;
        }
        headers.push((key, value));
    }
    Ok((headers, body[pos..].to_vec()))
}

/// Computes the object id the way the VCS does: `hash(kind_header ||
/// serialized_body)` where `kind_header = "<kind> <len>\0"`.
pub fn hash_object(algo: HashAlgorithm, kind: ObjectKind, body: &[u8]) -> Oid {
    let header = format!("{kind} {}\0", body.len());
    let mut buf = Vec::with_capacity(header.len() + body.len());
    buf.extend_from_slice(header.as_bytes());
    buf.extend_from_slice(body);
    Oid::new(algo.digest(&buf))
}

/// Zlib-inflates a loose object's on-disk bytes into `"<kind> <len>\0<body>"`,
/// then splits and parses it. This is the full C1 contract: decompress, parse.
pub fn parse_loose_object(compressed: &[u8]) -> Result<(ObjectKind, Object), CorruptObjectError> {
    let mut decoder = ZlibDecoder::new(compressed);
    let mut raw = Vec::new();
    decoder
        .read_to_end(&mut raw)
        .map_err(|source| CorruptObjectError::Inflate {
            id: String::new(),
            source,
        })?;
    let nul = raw
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| CorruptObjectError::Truncated {
            id: String::new(),
        })?;
    let header = &raw[..nul];
    let mut parts = header.splitn(2, |&b| b == b' ');
    let kind = ObjectKind::parse(parts.next().unwrap_or(b""))
        .ok_or_else(|| CorruptObjectError::BadHeader {
            id: String::new(),
            message: "unknown object kind".to_owned(),
        })?;
    let body = &raw[nul + 1..];
    let object = parse_body(kind, "", body)?;
    Ok((kind, object))
}

/// Deflates `"<kind> <len>\0<body>"` for loose storage.
pub fn serialize_loose_object(kind: ObjectKind, body: &[u8]) -> Vec<u8> {
    let header = format!("{kind} {}\0", body.len());
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(header.as_bytes()).expect("writing to Vec cannot fail");
    encoder.write_all(body).expect("writing to Vec cannot fail");
    encoder.finish().expect("writing to Vec cannot fail")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_commit() -> Commit {
        Commit {
            tree: TreeId::from_bytes(&[0xab; 20]),
            parents: vec![CommitId::from_bytes(&[0xcd; 20])],
            author: b"A U Thor <author@example.com> 1234567890 -0700"[..].into(),
            committer: b"A U Thor <author@example.com> 1234567890 -0700"[..].into(),
            gpgsig: None,
            extra_headers: vec![],
            message: b"Subject\n\nBody text.\n"[..].into(),
        }
    }

    #[test]
    fn commit_round_trips() {
        let commit = sample_commit();
        let body = serialize_commit(&commit);
        let parsed = parse_commit("test", &body).unwrap();
        assert_eq!(parsed, commit);
    }

    #[test]
    fn gpgsig_round_trips_multiline() {
        let mut commit = sample_commit();
        commit.gpgsig = Some(b"-----BEGIN PGP SIGNATURE-----\n\nline one\nline two\n-----END PGP SIGNATURE-----"[..].into());
        let body = serialize_commit(&commit);
        let parsed = parse_commit("test", &body).unwrap();
        assert_eq!(parsed.gpgsig, commit.gpgsig);
    }

    #[test]
    fn unknown_headers_preserved_verbatim() {
        let mut commit = sample_commit();
        commit
            .extra_headers
            .push((b"mergetag"[..].into(), b"object deadbeef\ntype commit"[..].into()));
        let body = serialize_commit(&commit);
        let parsed = parse_commit("test", &body).unwrap();
        assert_eq!(parsed.extra_headers, commit.extra_headers);
    }

    #[test]
    fn tree_round_trips_and_sorts() {
        let entries = vec![
            TreeEntry {
                name: b"zeta.txt"[..].into(),
                mode: FileMode::Regular,
                oid: Oid::new(vec![1; 20]),
            },
            TreeEntry {
                name: b"alpha"[..].into(),
                mode: FileMode::Tree,
                oid: Oid::new(vec![2; 20]),
            },
            TreeEntry {
                name: b"alpha.txt"[..].into(),
                mode: FileMode::Regular,
                oid: Oid::new(vec![3; 20]),
            },
        ];
        let tree = Tree::from_entries(entries).unwrap();
        // "alpha.txt" sorts before "alpha/" because '.' < '/'.
        let names: Vec<_> = tree.entries().iter().map(|e| e.name.to_vec()).collect();
        assert_eq!(names, vec![b"alpha.txt".to_vec(), b"alpha".to_vec(), b"zeta.txt".to_vec()]);

        let body = serialize_tree(&tree);
        let parsed = parse_tree("test", &body).unwrap();
        assert_eq!(parsed, tree);
    }

    #[test]
    fn tree_rejects_duplicate_names() {
        let entries = vec![
            TreeEntry {
                name: b"a"[..].into(),
                mode: FileMode::Regular,
                oid: Oid::new(vec![1; 20]),
            },
            TreeEntry {
                name: b"a"[..].into(),
                mode: FileMode::Regular,
                oid: Oid::new(vec![2; 20]),
            },
        ];
        assert!(Tree::from_entries(entries).is_err());
    }

    #[test]
    fn loose_object_round_trips() {
        let commit = sample_commit();
        let body = serialize_commit(&commit);
        let compressed = serialize_loose_object(ObjectKind::Commit, &body);
        let (kind, object) = parse_loose_object(&compressed).unwrap();
        assert_eq!(kind, ObjectKind::Commit);
        assert_eq!(object.into_commit().unwrap(), commit);
    }

    #[test]
    fn hash_object_is_stable() {
        let body = b"hello\n".to_vec();
        let id = hash_object(HashAlgorithm::Sha1, ObjectKind::Blob, &body);
        // `git hash-object` for a file containing "hello\n".
        assert_eq!(id.hex(), "ce013625030ba8dba906f756967f9e9ca394464a");
    }
}
