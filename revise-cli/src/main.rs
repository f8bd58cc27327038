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

use clap::Parser as _;
use revise_cli::app;
use revise_cli::cli;

/// `RUST_LOG` wins outright when set; otherwise `-v`/`-q` pick a default
/// level (§B.1).
fn init_tracing(args: &cli::Args) {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::fmt;

    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn main() {
    let args = cli::Args::parse();
    init_tracing(&args);
    let cwd = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(err) => {
            eprintln!("revise: cannot determine current directory: {err}");
            std::process::exit(1);
        }
    };

    match app::run(&args, &cwd) {
        Ok(summary) => {
            println!("{summary}");
        }
        Err(err) => {
            eprintln!("revise: {err}");
            std::process::exit(err.exit_code());
        }
    }
}
