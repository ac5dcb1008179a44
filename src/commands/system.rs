// src/commands/system.rs
//! Database setup and converter listing

use super::Context;
use anyhow::{Context as _, Result};
use tracing::info;
use transmute::conversion::{AVAILABLE_CONVERTERS, ConversionKind, HttpConverter};

/// Initialize the database
pub fn cmd_init(ctx: &Context) -> Result<()> {
    let db_path = ctx.db_path();
    info!("Initializing Transmute database at: {}", db_path.display());
    transmute::db::init(db_path)
        .with_context(|| format!("Failed to initialize database at {}", db_path.display()))?;
    println!("Database initialized successfully at: {}", db_path.display());
    Ok(())
}

/// Print the available converters and where they are reached
pub fn cmd_converters(ctx: &Context) -> Result<()> {
    let converter = HttpConverter::new(&ctx.config.converter)?;
    println!("Available converters:");
    for name in AVAILABLE_CONVERTERS {
        println!("  {}", name);
    }
    println!();
    println!("Endpoint: {}", ctx.config.converter.endpoint);
    for kind in [ConversionKind::MispToStix, ConversionKind::StixToMisp] {
        println!("  {} -> {}", kind, converter.url_for(kind));
    }
    Ok(())
}
