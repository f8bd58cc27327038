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

//! Argument surface (§6). One flat flag set — there is no subcommand
//! registry, since the core only ever does one thing: splice staged changes
//! into history.

use clap::Parser;

/// Splice staged changes into an earlier commit, reorder history, split
/// commits, and reword messages — without touching the working tree or
/// staging area on disk.
///
/// With no flags, `<target>` (default: the parent of `HEAD`) receives the
/// currently staged changes folded into it, and every commit between
/// `<target>` and `HEAD` is replayed on top of the result.
#[derive(Parser, Debug, Clone)]
#[command(name = "revise", version, about, long_about = None)]
pub struct Args {
    /// Commit to splice the staged changes into (default: HEAD^)
    pub target: Option<String>,

    /// Stage all tracked changes first, as `git commit -a` would
    #[arg(short = 'a', long = "all")]
    pub all: bool,

    /// Interactively select hunks to splice in, like `git add --patch`
    #[arg(short = 'p', long = "patch")]
    pub patch: bool,

    /// Skip the staging area entirely; only replay the rewrite range
    #[arg(long = "no-index", conflicts_with_all = ["all", "patch"])]
    pub no_index: bool,

    /// Re-author every rewritten commit as the current user
    #[arg(long = "reauthor")]
    pub reauthor: bool,

    /// Ref to update instead of the branch HEAD currently points to
    #[arg(long = "ref", value_name = "REF")]
    pub ref_name: Option<String>,

    /// Open an editable todo list covering the whole rewrite range
    #[arg(short = 'i', long = "interactive")]
    pub interactive: bool,

    /// Reorder `fixup!`/`squash!` commits next to their targets
    #[arg(long = "autosquash", overrides_with = "no_autosquash")]
    pub autosquash: bool,

    /// Disable autosquash even if `revise.autoSquash`/`rebase.autoSquash` is set
    #[arg(long = "no-autosquash", overrides_with = "autosquash")]
    pub no_autosquash: bool,

    /// Split `<target>` into two commits at a chosen patch boundary
    #[arg(short = 'c', long = "cut", conflicts_with = "interactive")]
    pub cut: bool,

    /// Edit `<target>`'s message instead of reusing it unchanged
    #[arg(short = 'e', long = "edit", conflicts_with = "message")]
    pub edit: bool,

    /// Use the given message instead of opening an editor
    #[arg(short = 'm', long = "message", value_name = "MSG", conflicts_with = "interactive")]
    pub message: Option<String>,

    /// Increase log verbosity (repeatable); overridden by RUST_LOG if set
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Suppress all but error-level logging
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

impl Args {
    /// Resolves the three-way `--autosquash`/`--no-autosquash`/config state
    /// into a single decision, clap's `overrides_with` having already
    /// resolved the flag-vs-flag conflict to "last one wins".
    pub fn autosquash_requested(&self, config_default: bool) -> bool {
        if self.no_autosquash {
            false
        } else if self.autosquash {
            true
        } else {
            config_default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory as _;

    #[test]
    fn args_satisfy_clap_invariants() {
        Args::command().debug_assert();
    }

    #[test]
    fn no_autosquash_overrides_autosquash() {
        let args = Args::parse_from(["revise", "--autosquash", "--no-autosquash"]);
        assert!(!args.autosquash_requested(true));
    }
}
