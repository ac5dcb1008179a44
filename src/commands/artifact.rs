// src/commands/artifact.rs

//! Artifact management commands

use super::{Context, editable_artifact, parse_kind, visible_artifact};
use anyhow::{Result, anyhow, bail};
use transmute::db::models::{Artifact, ArtifactQuery, HistoryEntry, SortOrder};

/// List artifacts visible to the viewer
#[allow(clippy::too_many_arguments)]
pub fn cmd_list(
    ctx: &Context,
    kind: Option<&str>,
    search: Option<String>,
    sort: &str,
    mine: bool,
    page: u32,
    per_page: u32,
) -> Result<()> {
    let conn = ctx.open_db()?;
    let query = ArtifactQuery {
        viewer: ctx.viewer,
        kind: kind.map(parse_kind).transpose()?,
        search,
        sort: sort.parse::<SortOrder>().map_err(|e| anyhow!(e))?,
        only_mine: mine,
        page: page.max(1),
        per_page: per_page.max(1),
    };

    let listing = Artifact::list(&conn, &query)?;
    if listing.items.is_empty() {
        println!("No artifacts found.");
        if listing.total == 0 {
            println!("\nUse 'transmute convert <kind> <file>' to create one.");
        }
        return Ok(());
    }

    println!(
        "Artifacts (page {} of {}, {} total):",
        listing.page,
        listing.pages(),
        listing.total
    );
    for artifact in &listing.items {
        let visibility = if artifact.public { "public" } else { "private" };
        println!(
            "  [{}] {} ({}, {}, {})",
            artifact.id.unwrap_or(0),
            artifact.name,
            artifact.kind,
            visibility,
            artifact.created_at
        );
    }
    if listing.has_next() {
        println!("\nMore results: --page {}", listing.page + 1);
    }
    Ok(())
}

/// Show an artifact, optionally through a share key
pub fn cmd_show(
    ctx: &Context,
    reference: &str,
    share_key: Option<&str>,
    output: bool,
    input: bool,
    json: bool,
) -> Result<()> {
    let conn = ctx.open_db()?;
    let artifact = match share_key {
        Some(key) => Artifact::find_shared(&conn, reference, key)?
            .ok_or_else(|| anyhow!("Artifact '{}' not found", reference))?,
        None => visible_artifact(ctx, &conn, reference)?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&artifact)?);
        return Ok(());
    }
    if output {
        println!("{}", artifact.output_text);
        return Ok(());
    }
    if input {
        println!("{}", artifact.input_text);
        return Ok(());
    }

    let artifact_id = artifact.id.unwrap_or(0);
    println!("Artifact: {}", artifact.name);
    println!("  ID: {}", artifact_id);
    println!("  UUID: {}", artifact.uuid);
    println!("  Kind: {}", artifact.kind);
    if let Some(description) = &artifact.description {
        println!("  Description: {}", description);
    }
    if let Some(owner) = artifact.user_id {
        println!("  Owner: {}", owner);
    }
    println!("  Public: {}", if artifact.public { "yes" } else { "no" });
    println!("  Created: {}", artifact.created_at);
    println!("  Updated: {}", artifact.updated_at);

    let entries = HistoryEntry::count_for(&conn, artifact_id)?;
    if let Some(frontier) = HistoryEntry::frontier(&conn, artifact_id)? {
        println!("  Version: {} ({} history entries)", frontier.version, entries);
    } else {
        println!("  Version: 1 ({} history entries)", entries);
    }
    Ok(())
}

/// Delete an artifact
pub fn cmd_delete(ctx: &Context, reference: &str) -> Result<()> {
    let conn = ctx.open_db()?;
    let artifact = editable_artifact(ctx, &conn, reference)?;
    if !Artifact::delete(&conn, artifact.id.unwrap_or(0))? {
        bail!("Artifact '{}' not found", reference);
    }
    println!("Deleted artifact {}", artifact.name);
    Ok(())
}

/// Rename and/or re-describe an artifact
pub fn cmd_rename(
    ctx: &Context,
    reference: &str,
    name: Option<&str>,
    description: Option<&str>,
) -> Result<()> {
    if name.is_none() && description.is_none() {
        bail!("Nothing to change: pass --name and/or --description");
    }
    let conn = ctx.open_db()?;
    let artifact = editable_artifact(ctx, &conn, reference)?;
    let updated = Artifact::update_details(
        &conn,
        artifact.id.unwrap_or(0),
        name,
        description,
        &ctx.config.naming,
    )?;
    println!("Updated artifact {}", updated.name);
    Ok(())
}

/// Flip the public flag
pub fn cmd_toggle_public(ctx: &Context, reference: &str) -> Result<()> {
    let conn = ctx.open_db()?;
    let artifact = editable_artifact(ctx, &conn, reference)?;
    let public = Artifact::toggle_public(&conn, artifact.id.unwrap_or(0))?;
    println!(
        "Artifact {} is now {}",
        artifact.name,
        if public { "public" } else { "private" }
    );
    Ok(())
}

/// Print or regenerate the share key
pub fn cmd_share_key(ctx: &Context, reference: &str, regenerate: bool) -> Result<()> {
    let conn = ctx.open_db()?;
    let artifact = editable_artifact(ctx, &conn, reference)?;
    let key = if regenerate {
        let key = Artifact::regenerate_share_key(
            &conn,
            artifact.id.unwrap_or(0),
            &ctx.config.naming,
        )?;
        println!("New share key for {} (the old key no longer works):", artifact.name);
        key
    } else {
        artifact.share_key.clone()
    };
    println!("{}", key);
    println!(
        "View with: transmute show {} --share-key {}",
        artifact.uuid, key
    );
    Ok(())
}
