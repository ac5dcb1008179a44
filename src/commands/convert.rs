// src/commands/convert.rs

//! Conversion commands
//!
//! `load` and `args` are dry runs: they show what the loader and the
//! dispatcher make of some input without calling the converter.

use super::{Context, editable_artifact, parse_kind, parse_options, read_input};
use anyhow::{Context as _, Result};
use tracing::info;
use transmute::conversion::{
    ConversionDispatcher, ConversionKind, HttpConverter, NewConversion, Reconverter,
};
use transmute::ledger::CreateOutcome;
use transmute::stix::{ContentLoader, LoadPath};

/// Load a STIX document and report the path taken and the quarantine
pub fn cmd_load(ctx: &Context, file: &str, json: bool) -> Result<()> {
    let input = read_input(file)?;
    let loader = ContentLoader::new(&ctx.config.loader);
    let outcome = loader
        .load(input.as_str())
        .with_context(|| format!("Failed to load {}", file))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.bundle.to_value())?);
        return Ok(());
    }

    println!("Bundle: {}", outcome.bundle.id);
    println!("STIX version: {}", outcome.bundle.spec_version.as_str());
    match outcome.path {
        LoadPath::Strict => println!("Loaded as declared"),
        LoadPath::Reinterpreted { from, to } => {
            println!("Reinterpreted: declared {}, read as {}", from.as_str(), to.as_str())
        }
        LoadPath::Reconstructed => println!("Reconstructed from the objects that validated"),
    }
    println!("Objects: {}", outcome.bundle.len());
    println!("Digest: {}", outcome.bundle.digest().to_prefixed_string());

    if !outcome.quarantine.is_empty() {
        println!("Quarantined ({}):", outcome.quarantine.len());
        for (id, object) in outcome.quarantine.iter() {
            println!("  {} [#{}]: {}", id, object.index, object.reason);
        }
    }
    Ok(())
}

/// Print the converter arguments a set of options produces
pub fn cmd_args(ctx: &Context, kind: &str, input: Option<&str>, options: &[String]) -> Result<()> {
    let kind = parse_kind(kind)?;
    let options = parse_options(options)?;
    let dispatcher = ConversionDispatcher::new();

    let call = match (kind, input) {
        (ConversionKind::StixToMisp, Some(file)) => {
            let loader = ContentLoader::new(&ctx.config.loader);
            let outcome = loader.load(read_input(file)?.as_str())?;
            dispatcher.stix_to_misp(&outcome.bundle, &options)?
        }
        (ConversionKind::StixToMisp, None) => {
            // Without content there is no origin to narrow for
            let arguments = dispatcher.build_arguments(&options)?;
            println!("Converter: {}", kind.route());
            print_arguments(arguments.iter());
            return Ok(());
        }
        (ConversionKind::MispToStix, _) => dispatcher.misp_to_stix(&options),
    };

    println!("Converter: {}", call.kind.route());
    if let Some(origin) = call.origin {
        println!("Source origin: {}", origin.as_str());
    }
    print_arguments(call.arguments.iter());
    Ok(())
}

fn print_arguments<'a>(arguments: impl Iterator<Item = (&'a str, &'a str)>) {
    let mut any = false;
    for (key, value) in arguments {
        any = true;
        if value.is_empty() {
            println!("  {}", key);
        } else {
            println!("  {}={}", key, value);
        }
    }
    if !any {
        println!("  (no arguments)");
    }
}

/// Convert a file and store the artifact
#[allow(clippy::too_many_arguments)]
pub fn cmd_convert(
    ctx: &Context,
    kind: &str,
    file: &str,
    name: Option<String>,
    description: Option<String>,
    public: bool,
    options: &[String],
) -> Result<()> {
    let request = NewConversion {
        kind: parse_kind(kind)?,
        input: read_input(file)?,
        user_id: ctx.viewer.user_id(),
        name,
        description,
        public,
        options: parse_options(options)?,
    };

    let mut conn = ctx.open_db()?;
    let converter = HttpConverter::new(&ctx.config.converter)?;
    let reconverter = Reconverter::new(converter, &ctx.config);

    info!("Converting {} ({})", file, request.kind);
    let artifact = reconverter
        .convert_new(&mut conn, request)
        .with_context(|| format!("Failed to convert {}", file))?;

    println!("Created artifact {} (id={})", artifact.name, artifact.id.unwrap_or(0));
    println!("  UUID: {}", artifact.uuid);
    println!("  Kind: {}", artifact.kind);
    println!("  Public: {}", if artifact.public { "yes" } else { "no" });
    Ok(())
}

/// Re-run an artifact's conversion
pub fn cmd_reconvert(ctx: &Context, reference: &str, options: &[String]) -> Result<()> {
    let options = parse_options(options)?;
    let mut conn = ctx.open_db()?;
    let artifact = editable_artifact(ctx, &conn, reference)?;
    let artifact_id = artifact.id.unwrap_or(0);

    let converter = HttpConverter::new(&ctx.config.converter)?;
    let reconverter = Reconverter::new(converter, &ctx.config);
    let outcome = reconverter
        .reconvert(&mut conn, artifact_id, ctx.viewer.user_id(), &options)
        .with_context(|| format!("Failed to re-convert {}", artifact.name))?;

    match outcome.history {
        None => println!("Output of {} is unchanged; nothing recorded.", artifact.name),
        Some(CreateOutcome::Duplicate(entry)) => println!(
            "Output matches accepted version {} of {}; nothing recorded.",
            entry.version, artifact.name
        ),
        Some(CreateOutcome::Created(entry)) => {
            println!(
                "Recorded version {} of {} for review (entry id={})",
                entry.version,
                artifact.name,
                entry.id.unwrap_or(0)
            );
            println!("Use 'transmute history accept {}' to apply it.", entry.uuid);
        }
    }
    Ok(())
}
