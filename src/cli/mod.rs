// src/cli/mod.rs
//! CLI definitions for Transmute
//!
//! This module contains the command-line interface definitions using clap.
//! The command implementations are in the `commands` module.
//!
//! - `init` - Create the database
//! - `load` / `args` - Inspect how input and options will be handled
//! - `convert` / `reconvert` - Run the external converter
//! - `list`, `show`, `delete`, `rename`, `toggle-public`, `share-key` - Artifacts
//! - `history` - Review re-conversion results

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod history;

pub use history::HistoryCommands;

#[derive(Parser)]
#[command(name = "transmute")]
#[command(author = "Transmute Contributors")]
#[command(version)]
#[command(about = "Threat-intelligence format conversion with reviewable history", long_about = None)]
pub struct Cli {
    /// Configuration file (default: $TRANSMUTE_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the database file (overrides the configuration)
    #[arg(short, long, global = true)]
    pub db_path: Option<PathBuf>,

    /// Act as this user id
    #[arg(short, long, global = true)]
    pub user: Option<i64>,

    /// Act with administrator rights (requires --user)
    #[arg(long, global = true, requires = "user")]
    pub admin: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the Transmute database
    Init,

    /// Load a STIX document and report how it was read
    Load {
        /// STIX JSON file (`-` for stdin)
        file: String,

        /// Print the normalized bundle
        #[arg(long)]
        json: bool,
    },

    /// Show the converter arguments produced by a set of options
    Args {
        /// Conversion kind (misp-to-stix or stix-to-misp)
        kind: String,

        /// STIX input used to detect the source origin (stix-to-misp only)
        #[arg(long)]
        input: Option<String>,

        /// Conversion option as key=value (repeatable)
        #[arg(short = 'o', long = "option", value_name = "KEY=VALUE")]
        options: Vec<String>,
    },

    /// Convert a document and store the result as an artifact
    Convert {
        /// Conversion kind (misp-to-stix or stix-to-misp)
        kind: String,

        /// Input JSON file (`-` for stdin)
        file: String,

        /// Artifact name (default: taken from the content, then a timestamp)
        #[arg(long)]
        name: Option<String>,

        /// Artifact description
        #[arg(long)]
        description: Option<String>,

        /// Make the artifact visible to everyone
        #[arg(long)]
        public: bool,

        /// Conversion option as key=value (repeatable)
        #[arg(short = 'o', long = "option", value_name = "KEY=VALUE")]
        options: Vec<String>,
    },

    /// List artifacts visible to the current user
    List {
        /// Only this conversion kind
        #[arg(long)]
        kind: Option<String>,

        /// Case-insensitive search in name and description
        #[arg(short, long)]
        search: Option<String>,

        /// Sort by creation time (asc or desc)
        #[arg(long, default_value = "desc")]
        sort: String,

        /// Only artifacts owned by the current user
        #[arg(long)]
        mine: bool,

        /// Page number
        #[arg(long, default_value = "1")]
        page: u32,

        /// Artifacts per page
        #[arg(long, default_value = "10")]
        per_page: u32,
    },

    /// Show an artifact
    Show {
        /// Artifact id or UUID
        artifact: String,

        /// Share key, to view a private artifact shared with you
        #[arg(long)]
        share_key: Option<String>,

        /// Print the converted output
        #[arg(long)]
        output: bool,

        /// Print the original input
        #[arg(long)]
        input: bool,

        /// Print the artifact as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete an artifact and its history
    Delete {
        /// Artifact id or UUID
        artifact: String,
    },

    /// Rename or re-describe an artifact
    Rename {
        /// Artifact id or UUID
        artifact: String,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// New description
        #[arg(long)]
        description: Option<String>,
    },

    /// Flip an artifact between public and private
    TogglePublic {
        /// Artifact id or UUID
        artifact: String,
    },

    /// Show or regenerate an artifact's share key
    ShareKey {
        /// Artifact id or UUID
        artifact: String,

        /// Replace the key, invalidating the old one
        #[arg(long)]
        regenerate: bool,
    },

    /// Re-run the conversion of an artifact and record the result for review
    Reconvert {
        /// Artifact id or UUID
        artifact: String,

        /// Conversion option as key=value (repeatable)
        #[arg(short = 'o', long = "option", value_name = "KEY=VALUE")]
        options: Vec<String>,
    },

    /// Review re-conversion history
    #[command(subcommand)]
    History(HistoryCommands),

    /// List the available converters
    Converters,
}
