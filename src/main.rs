// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! toolstream - inspect and replay tool-call streams
//!
//! Entry point for the toolstream CLI application.

use std::io;

use clap::Parser;

use toolstream::cli::{Cli, Commands};
use toolstream::commands;
use toolstream::config::Settings;
use toolstream::error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());

    // `-v` turns on protocol diagnostics without knowing target names;
    // `-vv` adds per-chunk and per-job detail. `RUST_LOG` still applies.
    if cli.verbose > 0 {
        let level = if cli.verbose > 1 { "trace" } else { "debug" };
        for target in [
            "toolstream.stream.demux",
            "toolstream.chat.engine",
            "toolstream.chat.lane",
            "toolstream.telemetry",
            "toolstream.tools",
            "toolstream.agents",
        ] {
            if let Ok(parsed) = format!("{}={}", target, level).parse() {
                env_filter = env_filter.add_directive(parsed);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .init();

    // Load settings
    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };

    let mut stdout = io::stdout().lock();
    match &cli.command {
        Commands::Scan(args) => {
            commands::scan::execute(args, &settings, cli.format, &mut stdout).await?;
        }
        Commands::Replay(args) => {
            commands::replay::execute(args, &settings, cli.format, &mut stdout).await?;
        }
    }

    Ok(())
}
