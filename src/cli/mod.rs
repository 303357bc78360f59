//! CLI Module
//!
//! Command-line interface over the editing engine: inspect and process WAV
//! files, render and describe saved projects.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Cadenza - multi-track audio editing engine
#[derive(Parser, Debug)]
#[command(name = "cadenza")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Editor configuration file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print duration, layout and levels of a WAV file
    #[command(name = "inspect")]
    Inspect {
        /// WAV file to inspect
        path: PathBuf,
    },

    /// Apply one effect to a WAV file
    #[command(name = "process")]
    Process {
        /// Input WAV file
        input: PathBuf,

        /// Output WAV file
        output: PathBuf,

        /// Effect as JSON, e.g. '{"type": "amplify", "gain": 0.5}'
        #[arg(short, long)]
        effect: String,

        /// Selection start in seconds
        #[arg(long)]
        start: Option<f64>,

        /// Selection end in seconds
        #[arg(long)]
        end: Option<f64>,
    },

    /// Render a saved project to a stereo WAV file
    #[command(name = "mixdown")]
    Mixdown {
        /// Project directory
        project: PathBuf,

        /// Output WAV file
        output: PathBuf,

        /// Output sample rate (defaults to the configured rate)
        #[arg(long)]
        sample_rate: Option<u32>,
    },

    /// Print the tracks of a saved project
    #[command(name = "project-info")]
    ProjectInfo {
        /// Project directory
        project: PathBuf,
    },
}
