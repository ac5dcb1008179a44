// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: artifact id or UUID
fn artifact_arg() -> Arg {
    Arg::new("artifact").required(true).help("Artifact id or UUID")
}

/// Common argument: history entry id or UUID
fn entry_arg() -> Arg {
    Arg::new("entry").required(true).help("Entry id or UUID")
}

/// Common argument: repeatable conversion option
fn option_arg() -> Arg {
    Arg::new("option")
        .short('o')
        .long("option")
        .value_name("KEY=VALUE")
        .action(ArgAction::Append)
        .help("Conversion option as key=value (repeatable)")
}

fn kind_arg() -> Arg {
    Arg::new("kind")
        .required(true)
        .value_parser(["misp-to-stix", "stix-to-misp"])
        .help("Conversion kind")
}

fn flag(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).action(ArgAction::SetTrue).help(help)
}

fn build_cli() -> Command {
    Command::new("transmute")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Transmute Contributors")
        .about("Threat-intelligence format conversion with reviewable history")
        .subcommand_required(false)
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .global(true)
                .help("Configuration file (default: $TRANSMUTE_CONFIG)"),
        )
        .arg(
            Arg::new("db_path")
                .short('d')
                .long("db-path")
                .value_name("PATH")
                .global(true)
                .help("Database path (overrides the configuration)"),
        )
        .arg(
            Arg::new("user")
                .short('u')
                .long("user")
                .value_name("ID")
                .global(true)
                .help("Act as this user id"),
        )
        .arg(flag("admin", "Act with administrator rights (requires --user)").global(true))
        .subcommand(Command::new("init").about("Initialize the Transmute database"))
        .subcommand(
            Command::new("load")
                .about("Load a STIX document and report how it was read")
                .arg(Arg::new("file").required(true).help("STIX JSON file (- for stdin)"))
                .arg(flag("json", "Print the normalized bundle")),
        )
        .subcommand(
            Command::new("args")
                .about("Show the converter arguments produced by a set of options")
                .arg(kind_arg())
                .arg(
                    Arg::new("input")
                        .long("input")
                        .help("STIX input used to detect the source origin"),
                )
                .arg(option_arg()),
        )
        .subcommand(
            Command::new("convert")
                .about("Convert a document and store the result as an artifact")
                .arg(kind_arg())
                .arg(Arg::new("file").required(true).help("Input JSON file (- for stdin)"))
                .arg(Arg::new("name").long("name").help("Artifact name"))
                .arg(Arg::new("description").long("description").help("Artifact description"))
                .arg(flag("public", "Make the artifact visible to everyone"))
                .arg(option_arg()),
        )
        .subcommand(
            Command::new("list")
                .about("List artifacts visible to the current user")
                .arg(Arg::new("kind").long("kind").help("Only this conversion kind"))
                .arg(
                    Arg::new("search")
                        .short('s')
                        .long("search")
                        .help("Case-insensitive search in name and description"),
                )
                .arg(
                    Arg::new("sort")
                        .long("sort")
                        .default_value("desc")
                        .value_parser(["asc", "desc"])
                        .help("Sort by creation time"),
                )
                .arg(flag("mine", "Only artifacts owned by the current user"))
                .arg(Arg::new("page").long("page").default_value("1").help("Page number"))
                .arg(
                    Arg::new("per_page")
                        .long("per-page")
                        .default_value("10")
                        .help("Artifacts per page"),
                ),
        )
        .subcommand(
            Command::new("show")
                .about("Show an artifact")
                .arg(artifact_arg())
                .arg(
                    Arg::new("share_key")
                        .long("share-key")
                        .help("Share key, to view a private artifact shared with you"),
                )
                .arg(flag("output", "Print the converted output"))
                .arg(flag("input", "Print the original input"))
                .arg(flag("json", "Print the artifact as JSON")),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete an artifact and its history")
                .arg(artifact_arg()),
        )
        .subcommand(
            Command::new("rename")
                .about("Rename or re-describe an artifact")
                .arg(artifact_arg())
                .arg(Arg::new("name").long("name").help("New name"))
                .arg(Arg::new("description").long("description").help("New description")),
        )
        .subcommand(
            Command::new("toggle-public")
                .about("Flip an artifact between public and private")
                .arg(artifact_arg()),
        )
        .subcommand(
            Command::new("share-key")
                .about("Show or regenerate an artifact's share key")
                .arg(artifact_arg())
                .arg(flag("regenerate", "Replace the key, invalidating the old one")),
        )
        .subcommand(
            Command::new("reconvert")
                .about("Re-run the conversion of an artifact and record the result for review")
                .arg(artifact_arg())
                .arg(option_arg()),
        )
        .subcommand(
            Command::new("history")
                .about("Review re-conversion history")
                .subcommand(
                    Command::new("list")
                        .about("List the history of an artifact")
                        .arg(artifact_arg())
                        .arg(flag("all", "Include pending and rejected entries"))
                        .arg(flag("json", "Print entries as JSON")),
                )
                .subcommand(
                    Command::new("pending")
                        .about("List entries waiting for review")
                        .arg(artifact_arg()),
                )
                .subcommand(
                    Command::new("show")
                        .about("Show one history entry")
                        .arg(entry_arg())
                        .arg(flag("output", "Print the proposed output"))
                        .arg(flag("json", "Print the entry as JSON")),
                )
                .subcommand(
                    Command::new("accept")
                        .about("Accept an entry, making its output the artifact's output")
                        .arg(entry_arg()),
                )
                .subcommand(Command::new("reject").about("Reject an entry").arg(entry_arg())),
        )
        .subcommand(Command::new("converters").about("List the available converters"))
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // CARGO_MANIFEST_DIR is always set by cargo
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("transmute.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
