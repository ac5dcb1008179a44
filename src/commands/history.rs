// src/commands/history.rs

//! History review commands

use super::{Context, editable_artifact, find_entry, visible_artifact};
use anyhow::{Result, bail};
use transmute::db::models::HistoryEntry;
use transmute::ledger::HistoryLedger;

fn print_entry_line(entry: &HistoryEntry) {
    print!(
        "  v{} [{}] {} ({})",
        entry.version,
        entry.id.unwrap_or(0),
        entry.status.as_str(),
        entry.created_at
    );
    if let Some(comment) = &entry.comment {
        print!(" - {}", comment);
    }
    println!();
}

/// Accepted history, or every entry with `--all`
pub fn cmd_history_list(ctx: &Context, reference: &str, all: bool, json: bool) -> Result<()> {
    let mut conn = ctx.open_db()?;
    let artifact = visible_artifact(ctx, &conn, reference)?;
    let artifact_id = artifact.id.unwrap_or(0);

    let ledger = HistoryLedger::new(&mut conn);
    let entries = if all {
        ledger.all_entries(artifact_id)?
    } else {
        ledger.accepted_history(artifact_id)?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        println!("No history for {}.", artifact.name);
        return Ok(());
    }

    println!("History of {} ({} entries):", artifact.name, entries.len());
    println!("  v1 original conversion ({})", artifact.created_at);
    for entry in &entries {
        print_entry_line(entry);
    }
    Ok(())
}

/// Entries waiting for a decision
pub fn cmd_history_pending(ctx: &Context, reference: &str) -> Result<()> {
    let mut conn = ctx.open_db()?;
    let artifact = visible_artifact(ctx, &conn, reference)?;
    let entries = HistoryLedger::new(&mut conn).pending(artifact.id.unwrap_or(0))?;

    if entries.is_empty() {
        println!("No pending entries for {}.", artifact.name);
        return Ok(());
    }
    println!("Pending entries for {} ({}):", artifact.name, entries.len());
    for entry in &entries {
        print_entry_line(entry);
    }
    Ok(())
}

/// Show one entry
pub fn cmd_history_show(ctx: &Context, reference: &str, output: bool, json: bool) -> Result<()> {
    let conn = ctx.open_db()?;
    let (entry, artifact) = find_entry(ctx, &conn, reference)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
        return Ok(());
    }
    if output {
        println!("{}", entry.new_output_text);
        return Ok(());
    }

    println!("History entry {} of {}", entry.version, artifact.name);
    println!("  ID: {}", entry.id.unwrap_or(0));
    println!("  UUID: {}", entry.uuid);
    println!("  Status: {}", entry.status.as_str());
    if let Some(user) = entry.user_id {
        println!("  Requested by: {}", user);
    }
    if let Some(comment) = &entry.comment {
        println!("  Comment: {}", comment);
    }
    println!("  Created: {}", entry.created_at);
    if let Some(decided) = &entry.decided_at {
        println!("  Decided: {}", decided);
    }
    let changed = entry.old_output_text.trim() != entry.new_output_text.trim();
    println!(
        "  Output: {} bytes -> {} bytes{}",
        entry.old_output_text.len(),
        entry.new_output_text.len(),
        if changed { "" } else { " (unchanged)" }
    );
    Ok(())
}

/// Accept an entry
pub fn cmd_history_accept(ctx: &Context, reference: &str) -> Result<()> {
    decide(ctx, reference, true)
}

/// Reject an entry
pub fn cmd_history_reject(ctx: &Context, reference: &str) -> Result<()> {
    decide(ctx, reference, false)
}

fn decide(ctx: &Context, reference: &str, accept: bool) -> Result<()> {
    let mut conn = ctx.open_db()?;
    let (entry, artifact) = find_entry(ctx, &conn, reference)?;
    editable_artifact(ctx, &conn, &entry.artifact_id.to_string())?;
    let entry_id = entry.id.unwrap_or(0);

    let mut ledger = HistoryLedger::new(&mut conn);
    let found = if accept {
        ledger.accept(entry_id)?
    } else {
        ledger.reject(entry_id)?
    };
    if !found {
        bail!("History entry '{}' not found", reference);
    }

    let decided = ledger.get(entry_id)?.unwrap_or(entry);
    if accept {
        println!(
            "Accepted version {} of {}; it is now the current output.",
            decided.version, artifact.name
        );
    } else {
        println!("Rejected version {} of {}.", decided.version, artifact.name);
    }
    Ok(())
}
