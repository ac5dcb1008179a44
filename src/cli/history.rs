// src/cli/history.rs
//! Re-conversion history commands

use clap::Subcommand;

#[derive(Subcommand)]
pub enum HistoryCommands {
    /// List the history of an artifact
    List {
        /// Artifact id or UUID
        artifact: String,

        /// Include pending and rejected entries
        #[arg(short, long)]
        all: bool,

        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },

    /// List entries waiting for review
    Pending {
        /// Artifact id or UUID
        artifact: String,
    },

    /// Show one history entry
    Show {
        /// Entry id or UUID
        entry: String,

        /// Print the proposed output
        #[arg(long)]
        output: bool,

        /// Print the entry as JSON
        #[arg(long)]
        json: bool,
    },

    /// Accept an entry, making its output the artifact's output
    Accept {
        /// Entry id or UUID
        entry: String,
    },

    /// Reject an entry
    Reject {
        /// Entry id or UUID
        entry: String,
    },
}
