// src/commands/mod.rs
//! Command handlers for the Transmute CLI

mod artifact;
mod convert;
mod history;
mod system;

pub use artifact::{
    cmd_delete, cmd_list, cmd_rename, cmd_share_key, cmd_show, cmd_toggle_public,
};
pub use convert::{cmd_args, cmd_convert, cmd_load, cmd_reconvert};
pub use history::{
    cmd_history_accept, cmd_history_list, cmd_history_pending, cmd_history_reject,
    cmd_history_show,
};
pub use system::{cmd_converters, cmd_init};

use anyhow::{Context as _, Result, anyhow, bail};
use rusqlite::Connection;
use std::io::Read;
use std::path::Path;
use transmute::config::TransmuteConfig;
use transmute::conversion::{ConversionKind, ConvertOptions};
use transmute::db::models::{Artifact, HistoryEntry, Viewer};

/// Settings shared by every command
pub struct Context {
    pub config: TransmuteConfig,
    pub viewer: Viewer,
}

impl Context {
    pub fn new(config: TransmuteConfig, user: Option<i64>, admin: bool) -> Self {
        let viewer = match (user, admin) {
            (Some(id), true) => Viewer::Admin(id),
            (Some(id), false) => Viewer::User(id),
            (None, _) => Viewer::Anonymous,
        };
        Self { config, viewer }
    }

    pub fn db_path(&self) -> &Path {
        &self.config.database.path
    }

    /// Open the configured database
    pub fn open_db(&self) -> Result<Connection> {
        transmute::db::open(self.db_path()).with_context(|| {
            format!(
                "Failed to open database {} (run 'transmute init' first)",
                self.db_path().display()
            )
        })
    }
}

/// Read a file, or stdin for `-`
pub(crate) fn read_input(file: &str) -> Result<String> {
    if file == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read stdin")?;
        return Ok(buffer);
    }
    std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file))
}

pub(crate) fn parse_kind(kind: &str) -> Result<ConversionKind> {
    kind.parse::<ConversionKind>().map_err(|e| anyhow!(e))
}

/// Parse repeated `key=value` arguments into conversion options
pub(crate) fn parse_options(pairs: &[String]) -> Result<ConvertOptions> {
    let mut parsed = Vec::with_capacity(pairs.len());
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid option '{}': expected key=value", pair))?;
        parsed.push((key.trim(), value.trim()));
    }
    Ok(ConvertOptions::from_pairs(parsed)?)
}

fn find_artifact(conn: &Connection, reference: &str) -> Result<Option<Artifact>> {
    let found = match reference.parse::<i64>() {
        Ok(id) => Artifact::find_by_id(conn, id)?,
        Err(_) => Artifact::find_by_uuid(conn, reference)?,
    };
    Ok(found)
}

/// Look up an artifact by id or UUID that the viewer may see
pub(crate) fn visible_artifact(ctx: &Context, conn: &Connection, reference: &str) -> Result<Artifact> {
    match find_artifact(conn, reference)? {
        Some(artifact) if artifact.visible_to(ctx.viewer) => Ok(artifact),
        _ => bail!("Artifact '{}' not found", reference),
    }
}

/// Look up an artifact by id or UUID that the viewer may change
pub(crate) fn editable_artifact(ctx: &Context, conn: &Connection, reference: &str) -> Result<Artifact> {
    let artifact = visible_artifact(ctx, conn, reference)?;
    if !artifact.editable_by(ctx.viewer) {
        bail!("Not allowed to modify artifact '{}'", artifact.name);
    }
    Ok(artifact)
}

/// Look up a history entry by id or UUID, with its artifact
pub(crate) fn find_entry(
    ctx: &Context,
    conn: &Connection,
    reference: &str,
) -> Result<(HistoryEntry, Artifact)> {
    let entry = match reference.parse::<i64>() {
        Ok(id) => HistoryEntry::find_by_id(conn, id)?,
        Err(_) => HistoryEntry::find_by_uuid(conn, reference)?,
    }
    .ok_or_else(|| anyhow!("History entry '{}' not found", reference))?;

    let artifact = visible_artifact(ctx, conn, &entry.artifact_id.to_string())
        .with_context(|| format!("History entry '{}' not found", reference))?;
    Ok((entry, artifact))
}
