//! memos server
//!
//! # Architecture Overview
//!
//! ```text
//!   config.<ext> ─┐
//!   MEMOS_* env ──┼─▶ Loader ─▶ Profile ─▶ validate
//!   CLI flags ────┘                           │
//!                                             ▼
//!              ┌─────────────────────── Lifecycle ───────────────────────┐
//!              │                                                          │
//!              │  DbDriver ─▶ Store.migrate ─▶ Server ─▶ start (task)     │
//!              │                                          ▲               │
//!              │  SIGINT/SIGTERM ─▶ watcher ─▶ shutdown ──┘               │
//!              │                        │                                 │
//!              │                        └─▶ cancel root scope ─▶ exit     │
//!              └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Exit status: 0 after an orderly stop, 1 when the configuration cannot be
//! read, 2 when startup or the server fails.

use std::process::ExitCode;

use clap::Parser;

use memos::config::{DataDirCheck, Loader, Overrides};
use memos::lifecycle::{Lifecycle, Services, ShutdownSignal};
use memos::observability::logging;

#[derive(Debug, Parser)]
#[command(name = "memos", version)]
#[command(
    about = "An open source, lightweight note-taking service. Easily capture and share your great thoughts."
)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let dir = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("Error reading config file: {e}");
            return ExitCode::from(1);
        }
    };
    let loaded = match Loader::new(dir).load(&cli.overrides) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error reading config file: {e}");
            return ExitCode::from(1);
        }
    };
    println!("Using config file: {}", loaded.path.display());

    let mut profile = loaded.profile;
    if let Err(e) = profile.validate(DataDirCheck::Verify) {
        panic!("invalid server profile: {e}");
    }

    logging::init(profile.mode);
    tracing::info!(
        mode = %profile.mode,
        driver = %profile.driver,
        version = %profile.version,
        "memos starting"
    );

    let signal = match ShutdownSignal::install() {
        Ok(signal) => signal,
        Err(e) => {
            tracing::error!(error = %e, "failed to install signal handlers");
            return ExitCode::from(2);
        }
    };

    let outcome = Lifecycle::new(profile, Services)
        .run(async move {
            signal.recv().await;
        })
        .await;

    ExitCode::from(outcome.exit_status())
}
