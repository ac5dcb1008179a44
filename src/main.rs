// src/main.rs

use anyhow::{Context as _, Result};
use clap::Parser;
use transmute::config::TransmuteConfig;

mod cli;
mod commands;

use cli::{Cli, Commands, HistoryCommands};
use commands::Context;

fn load_config(cli: &Cli) -> Result<TransmuteConfig> {
    let mut config =
        TransmuteConfig::discover(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(db_path) = &cli.db_path {
        config.database.path = db_path.clone();
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let ctx = Context::new(config, cli.user, cli.admin);

    match cli.command {
        Some(Commands::Init) => commands::cmd_init(&ctx),
        Some(Commands::Load { file, json }) => commands::cmd_load(&ctx, &file, json),
        Some(Commands::Args {
            kind,
            input,
            options,
        }) => commands::cmd_args(&ctx, &kind, input.as_deref(), &options),
        Some(Commands::Convert {
            kind,
            file,
            name,
            description,
            public,
            options,
        }) => commands::cmd_convert(&ctx, &kind, &file, name, description, public, &options),
        Some(Commands::List {
            kind,
            search,
            sort,
            mine,
            page,
            per_page,
        }) => commands::cmd_list(&ctx, kind.as_deref(), search, &sort, mine, page, per_page),
        Some(Commands::Show {
            artifact,
            share_key,
            output,
            input,
            json,
        }) => commands::cmd_show(&ctx, &artifact, share_key.as_deref(), output, input, json),
        Some(Commands::Delete { artifact }) => commands::cmd_delete(&ctx, &artifact),
        Some(Commands::Rename {
            artifact,
            name,
            description,
        }) => commands::cmd_rename(&ctx, &artifact, name.as_deref(), description.as_deref()),
        Some(Commands::TogglePublic { artifact }) => commands::cmd_toggle_public(&ctx, &artifact),
        Some(Commands::ShareKey {
            artifact,
            regenerate,
        }) => commands::cmd_share_key(&ctx, &artifact, regenerate),
        Some(Commands::Reconvert { artifact, options }) => {
            commands::cmd_reconvert(&ctx, &artifact, &options)
        }
        Some(Commands::History(history_cmd)) => match history_cmd {
            HistoryCommands::List {
                artifact,
                all,
                json,
            } => commands::cmd_history_list(&ctx, &artifact, all, json),
            HistoryCommands::Pending { artifact } => {
                commands::cmd_history_pending(&ctx, &artifact)
            }
            HistoryCommands::Show {
                entry,
                output,
                json,
            } => commands::cmd_history_show(&ctx, &entry, output, json),
            HistoryCommands::Accept { entry } => commands::cmd_history_accept(&ctx, &entry),
            HistoryCommands::Reject { entry } => commands::cmd_history_reject(&ctx, &entry),
        },
        Some(Commands::Converters) => commands::cmd_converters(&ctx),
        None => {
            println!("Transmute v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'transmute --help' for usage information");
            Ok(())
        }
    }
}
