//! CLI argument definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "parascope",
    version,
    about = "Host for malaria detection workers and lab records"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Emit machine-readable JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage the background daemon
    Daemon {
        #[command(subcommand)]
        action: DaemonCommand,
    },

    /// Control streaming detection
    Detect {
        #[command(subcommand)]
        action: DetectCommand,
    },

    /// Analyze a single image file
    Frame {
        /// Path to the image to analyze
        file: PathBuf,
    },

    /// Manage lab test records
    Test {
        #[command(subcommand)]
        action: TestCommand,
    },

    /// Manage captured images
    Image {
        #[command(subcommand)]
        action: ImageCommand,
    },

    /// Probe the detection service health endpoint
    Health,
}

#[derive(Subcommand)]
pub enum DaemonCommand {
    /// Show daemon status
    Status,
    /// Start the daemon
    Start,
    /// Stop the daemon
    Stop,
}

#[derive(Subcommand)]
pub enum DetectCommand {
    /// Start (or restart) the streaming detection worker
    Start,
    /// Stop the streaming detection worker
    Stop,
    /// Show whether a worker is running
    Status,
    /// Stream detection events to the terminal until interrupted
    Watch,
}

#[derive(Subcommand)]
pub enum TestCommand {
    /// Record a completed test
    Add {
        /// Patient identifier
        #[arg(long)]
        patient: String,
        /// Test name
        #[arg(long)]
        name: String,
        /// Test kind: blood, stool, or both
        #[arg(long = "type", default_value = "blood")]
        kind: String,
        /// Smear preparation, e.g. thin or thick
        #[arg(long, default_value = "thin")]
        smear: String,
        /// Result summary
        #[arg(long)]
        result: String,
        /// Technician who took the test
        #[arg(long)]
        taken_by: Option<String>,
    },
    /// List recorded tests
    List {
        /// Only tests for this patient
        #[arg(long)]
        patient: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ImageCommand {
    /// Save a captured image against a test
    Save {
        /// Test the capture belongs to
        #[arg(long)]
        test: String,
        /// Sample kind: blood or stool
        #[arg(long = "type", default_value = "blood")]
        kind: String,
        /// Path to the image file
        file: PathBuf,
    },
    /// List image records
    List {
        /// Only images for this test
        #[arg(long)]
        test: Option<String>,
    },
}
