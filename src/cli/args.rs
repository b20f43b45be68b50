// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// toolstream - inspect and replay tool-call streams
#[derive(Parser, Debug)]
#[command(name = "toolstream")]
#[command(version, about = "Inspect and replay streamed model output with embedded tool calls")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract tool calls from a transcript without executing them
    Scan(ScanArgs),

    /// Run a transcript as a full turn with the built-in tools
    Replay(ReplayArgs),
}

/// Arguments for the scan subcommand
#[derive(clap::Args, Debug)]
pub struct ScanArgs {
    /// Transcript file (raw model output)
    pub file: PathBuf,

    /// Characters per simulated stream chunk
    #[arg(long, default_value_t = 16)]
    pub chunk_size: usize,
}

/// Arguments for the replay subcommand
#[derive(clap::Args, Debug)]
pub struct ReplayArgs {
    /// Transcript file (raw model output)
    pub file: PathBuf,

    /// Characters per simulated stream chunk
    #[arg(long, default_value_t = 16)]
    pub chunk_size: usize,

    /// Answer unknown tools by echoing their input instead of failing
    #[arg(long)]
    pub echo_unknown: bool,
}

/// Output format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Text,

    /// One JSON object per line
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scan() {
        let cli = Cli::try_parse_from(["toolstream", "scan", "out.txt", "--chunk-size", "4"])
            .unwrap();
        match cli.command {
            Commands::Scan(args) => {
                assert_eq!(args.file, PathBuf::from("out.txt"));
                assert_eq!(args.chunk_size, 4);
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(cli.format, OutputFormat::Text);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_parse_replay_with_globals() {
        let cli = Cli::try_parse_from([
            "toolstream",
            "-vv",
            "replay",
            "out.txt",
            "--echo-unknown",
            "--format",
            "json",
            "--config",
            "cfg.json",
        ])
        .unwrap();
        match cli.command {
            Commands::Replay(args) => {
                assert!(args.echo_unknown);
                assert_eq!(args.chunk_size, 16);
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("cfg.json")));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["toolstream"]).is_err());
    }
}
