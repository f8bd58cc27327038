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

//! Reads the handful of VCS config keys the engine cares about (§6), and
//! represents command-like config values (`core.editor`, the conflict-merge
//! driver) the way the CLI layer represents them.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;

/// A command name plus arguments, as read from a config value or environment
/// variable. Mirrors the shapes a `core.editor`-style setting can take:
/// a single shell-like string (split on spaces, no escaping) or an explicit
/// argv vector.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CommandNameAndArgs {
    String(String),
    Vec(Vec<String>),
}

impl CommandNameAndArgs {
    pub fn split_name(&self) -> Cow<'_, str> {
        self.split_name_and_args().0
    }

    /// Splits a `core.editor`-style string the way a POSIX shell would, so a
    /// quoted executable path (`"C:/Program Files/editor" --wait`, `'my editor'
    /// -w`) parses as one argument rather than splitting on every space (§9
    /// — "the editor is invoked through a POSIX-like shell").
    pub fn split_name_and_args(&self) -> (Cow<'_, str>, Cow<'_, [String]>) {
        match self {
            Self::String(s) => {
                let mut args = shell_words::split(s)
                    .unwrap_or_else(|_| s.split(' ').filter(|s| !s.is_empty()).map(str::to_owned).collect())
                    .into_iter();
                let name = args.next().unwrap_or_default();
                (Cow::Owned(name), Cow::Owned(args.collect()))
            }
            Self::Vec(args) => (
                Cow::Borrowed(args.first().map_or("", String::as_str)),
                Cow::Borrowed(&args[1.min(args.len())..]),
            ),
        }
    }

    pub fn to_command(&self) -> Command {
        let (name, args) = self.split_name_and_args();
        let mut cmd = Command::new(name.as_ref());
        cmd.args(args.iter());
        cmd
    }
}

impl<T: AsRef<str> + ?Sized> From<&T> for CommandNameAndArgs {
    fn from(s: &T) -> Self {
        Self::String(s.as_ref().to_owned())
    }
}

impl std::fmt::Display for CommandNameAndArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Vec(a) => write!(f, "{}", a.join(" ")),
        }
    }
}

/// A flattened view of a git-style INI config file: `section.key` (and
/// `section.subsection.key`) mapped to the last value assigned, matching
/// git's own "last write wins" semantics for repeated keys.
#[derive(Debug, Default, Clone)]
pub struct GitConfig {
    values: HashMap<String, String>,
}

impl GitConfig {
    /// Loads and merges, in precedence order (later overrides earlier):
    /// the repository's `.git/config`, then `$XDG_CONFIG_HOME/git/config` or
    /// `~/.gitconfig`, matching the override order git itself uses for
    /// local-over-global (we don't read system config; revise never needs
    /// machine-wide settings).
    pub fn load(git_dir: &Path) -> Self {
        let mut config = Self::default();
        if let Some(home) = std::env::var_os("HOME") {
            config.merge_file(&PathBuf::from(home).join(".gitconfig"));
        }
        config.merge_file(&git_dir.join("config"));
        config
    }

    fn merge_file(&mut self, path: &Path) {
        let Ok(text) = fs::read_to_string(path) else {
            return;
        };
        let mut section = String::new();
        for raw_line in text.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            if line.starts_with('[') {
                section = parse_section_header(line);
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let full_key = format!("{section}.{}", key.trim());
                self.values.insert(full_key, strip_quotes(value.trim()));
            } else {
                // Boolean-flag form, e.g. a bare `bare` line means `bare = true`.
                let full_key = format!("{section}.{line}");
                self.values.insert(full_key, "true".to_owned());
            }
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get_str(key)? {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }

    pub fn get_command(&self, key: &str) -> Option<CommandNameAndArgs> {
        self.get_str(key).map(CommandNameAndArgs::from)
    }
}

fn parse_section_header(line: &str) -> String {
    // `[section "subsection"]` -> `section.subsection`; `[section]` -> `section`.
    let inner = line.trim_start_matches('[').trim_end_matches(']');
    if let Some((name, rest)) = inner.split_once(' ') {
        let sub = rest.trim().trim_matches('"');
        format!("{}.{sub}", name.to_lowercase())
    } else {
        inner.to_lowercase()
    }
}

fn strip_quotes(value: &str) -> String {
    let trimmed = value.trim_end_matches(|c: char| c.is_whitespace());
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// Resolves the editor command per git's own precedence: `$VISUAL`, then
/// `$EDITOR`, then `core.editor`, then `vi`.
pub fn resolve_editor(config: &GitConfig) -> CommandNameAndArgs {
    if let Ok(visual) = std::env::var("GIT_EDITOR") {
        if !visual.is_empty() {
            return CommandNameAndArgs::from(&visual);
        }
    }
    if let Ok(visual) = std::env::var("VISUAL") {
        if !visual.is_empty() {
            return CommandNameAndArgs::from(&visual);
        }
    }
    if let Ok(editor) = std::env::var("EDITOR") {
        if !editor.is_empty() {
            return CommandNameAndArgs::from(&editor);
        }
    }
    if let Some(cmd) = config.get_command("core.editor") {
        return cmd;
    }
    CommandNameAndArgs::from("vi")
}

/// Resolves the editor used for the interactive todo list: `GIT_SEQUENCE_EDITOR`,
/// then `sequence.editor`, then falls back to the commit-message editor
/// (§6 — the VCS treats the sequence editor as a specialization, not a
/// wholly separate setting).
pub fn resolve_sequence_editor(config: &GitConfig) -> CommandNameAndArgs {
    if let Ok(seq) = std::env::var("GIT_SEQUENCE_EDITOR") {
        if !seq.is_empty() {
            return CommandNameAndArgs::from(&seq);
        }
    }
    if let Some(cmd) = config.get_command("sequence.editor") {
        return cmd;
    }
    resolve_editor(config)
}

/// Resolves the vcs binary invoked for `diff-tree`/`hash-object`/`merge-file`
/// (§6's `revise.vcs` / `GIT` env var).
pub fn resolve_vcs_binary(config: &GitConfig) -> String {
    if let Ok(path) = std::env::var("GIT") {
        if !path.is_empty() {
            return path;
        }
    }
    config
        .get_str("revise.vcs")
        .map(str::to_owned)
        .unwrap_or_else(|| "git".to_owned())
}

/// `revise.autoSquash`, falling back to `rebase.autoSquash` (§6) so a repo
/// that has already opted into autosquashing for `rebase -i` gets the same
/// default here without a second config line.
pub fn autosquash_enabled(config: &GitConfig) -> bool {
    config
        .get_bool("revise.autosquash")
        .or_else(|| config.get_bool("rebase.autosquash"))
        .unwrap_or(false)
}

pub fn gpg_sign_enabled(config: &GitConfig) -> bool {
    config.get_bool("commit.gpgsign").unwrap_or(false)
}

/// The program that produces a detached signature over a commit's canonical
/// bytes (`gpg.program`, default `gpg`).
pub fn gpg_program(config: &GitConfig) -> String {
    config.get_str("gpg.program").unwrap_or("gpg").to_owned()
}

/// The signing identity passed to `gpg.program` (`user.signingkey`), if the
/// user configured one; otherwise the program's default secret key is used.
pub fn signing_key(config: &GitConfig) -> Option<&str> {
    config.get_str("user.signingkey")
}

pub fn run_commit_msg_hook(config: &GitConfig) -> bool {
    config.get_bool("revise.run-hooks.commit-msg").unwrap_or(false)
}

pub fn rerere_enabled(config: &GitConfig) -> bool {
    config.get_bool("rerere.enabled").unwrap_or(false)
}

pub fn rerere_autoupdate(config: &GitConfig) -> bool {
    config.get_bool("rerere.autoupdate").unwrap_or(false)
}

/// Resolves `core.commentChar`: a literal single byte by default (`#`), or
/// with `core.commentChar = auto`, the first candidate in `#;@!$%^&|:` that
/// does not appear at the start of any line in `sample` (§6).
pub fn comment_char(config: &GitConfig, sample: &[u8]) -> u8 {
    match config.get_str("core.commentchar") {
        Some("auto") => pick_auto_comment_char(sample),
        Some(s) => s.as_bytes().first().copied().unwrap_or(b'#'),
        None => b'#',
    }
}

fn pick_auto_comment_char(sample: &[u8]) -> u8 {
    const CANDIDATES: &[u8] = b"#;@!$%^&|:";
    let used_at_line_start: std::collections::HashSet<u8> = sample
        .split(|&b| b == b'\n')
        .filter_map(|line| line.first().copied())
        .collect();
    CANDIDATES
        .iter()
        .copied()
        .find(|c| !used_at_line_start.contains(c))
        .unwrap_or(b'#')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_string_command() {
        let cmd = CommandNameAndArgs::from("emacs -nw");
        let (name, args) = cmd.split_name_and_args();
        assert_eq!(name.as_ref(), "emacs");
        assert_eq!(args.as_ref(), ["-nw"]);
    }

    #[test]
    fn splits_quoted_command_like_a_shell() {
        let cmd = CommandNameAndArgs::from(r#"'/opt/my editor/bin/edit' --wait"#);
        let (name, args) = cmd.split_name_and_args();
        assert_eq!(name.as_ref(), "/opt/my editor/bin/edit");
        assert_eq!(args.as_ref(), ["--wait"]);
    }

    #[test]
    fn parses_sections_and_subsections() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config"),
            "[core]\n\teditor = nano\n[branch \"main\"]\n\tremote = origin\n",
        )
        .unwrap();
        let mut config = GitConfig::default();
        config.merge_file(&dir.path().join("config"));
        assert_eq!(config.get_str("core.editor"), Some("nano"));
        assert_eq!(config.get_str("branch.main.remote"), Some("origin"));
    }

    #[test]
    fn bool_values_are_normalized() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config"), "[revise]\n\tautosquash = true\n").unwrap();
        let mut config = GitConfig::default();
        config.merge_file(&dir.path().join("config"));
        assert!(autosquash_enabled(&config));
    }

    #[test]
    fn autosquash_falls_back_to_rebase_setting() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config"), "[rebase]\n\tautosquash = true\n").unwrap();
        let mut config = GitConfig::default();
        config.merge_file(&dir.path().join("config"));
        assert!(autosquash_enabled(&config));
    }

    #[test]
    fn comment_char_defaults_to_hash() {
        let config = GitConfig::default();
        assert_eq!(comment_char(&config, b"hello\n"), b'#');
    }

    #[test]
    fn comment_char_auto_avoids_collision() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config"), "[core]\n\tcommentchar = auto\n").unwrap();
        let mut config = GitConfig::default();
        config.merge_file(&dir.path().join("config"));
        let sample = b"# this message already uses hash\nbody\n";
        assert_eq!(comment_char(&config, sample), b';');
    }
}
