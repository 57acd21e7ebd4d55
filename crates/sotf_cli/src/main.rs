use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde_json::Value as JsonValue;
use sotf_core::core_api::{Engine, ImportOptions, Session};
use sotf_core::grouping::DEFAULT_GROUP_THRESHOLD;
use sotf_render::{
    JsonStyle, TextRenderOptions, render_delete_report_json, render_delete_report_text,
    render_import_plan_json, render_import_plan_text, render_import_report_json,
    render_import_report_text, render_session_json, render_session_text_with_options,
    render_structures_json, render_structures_text,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// Log debug detail to stderr (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the entries and game stats of a save
    Info {
        #[arg(value_name = "SAVE.zip")]
        save: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Write one entry as indented, fully decoded JSON
    Export {
        #[arg(value_name = "SAVE.zip")]
        save: PathBuf,
        entry: String,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Re-encode an edited entry and write a new save
    Apply {
        #[arg(value_name = "SAVE.zip")]
        save: PathBuf,
        entry: String,
        #[arg(value_name = "EDITED.json")]
        edited: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// List the save's structures by spatial group
    Structures {
        #[arg(value_name = "SAVE.zip")]
        save: PathBuf,
        #[arg(long, default_value_t = DEFAULT_GROUP_THRESHOLD)]
        threshold: f64,
        #[arg(long)]
        json: bool,
    },
    /// Plan or perform an import of structures from a base file
    Import {
        #[arg(value_name = "SAVE.zip")]
        save: PathBuf,
        #[arg(value_name = "BASE.json")]
        base: PathBuf,
        #[arg(long, default_value_t = DEFAULT_GROUP_THRESHOLD)]
        threshold: f64,
        #[arg(long, value_name = "LIST", value_parser = parse_index_list, conflicts_with_all = ["group", "all"])]
        select: Option<IndexList>,
        #[arg(long, value_name = "LIST", value_parser = parse_group_list, conflicts_with = "all")]
        group: Option<IndexList>,
        #[arg(long)]
        all: bool,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Delete structures and write a new save
    Delete {
        #[arg(value_name = "SAVE.zip")]
        save: PathBuf,
        #[arg(long, value_name = "LIST", value_parser = parse_index_list, conflicts_with = "group")]
        select: Option<IndexList>,
        #[arg(long, value_name = "LIST", value_parser = parse_group_list)]
        group: Option<IndexList>,
        #[arg(long, default_value_t = DEFAULT_GROUP_THRESHOLD)]
        threshold: f64,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct IndexList(Vec<usize>);

#[derive(Debug, Clone)]
enum Selection {
    Indices(Vec<usize>),
    Groups(Vec<usize>),
    All,
}

impl Selection {
    fn from_flags(select: Option<IndexList>, group: Option<IndexList>, all: bool) -> Option<Self> {
        match (select, group, all) {
            (Some(IndexList(indices)), _, _) => Some(Self::Indices(indices)),
            (None, Some(IndexList(groups)), _) => Some(Self::Groups(groups)),
            (None, None, true) => Some(Self::All),
            (None, None, false) => None,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let engine = Engine::new();

    match cli.command {
        Command::Info { save, json } => {
            let session = open_session(&engine, &save);
            if json {
                print_json(&render_session_json(&session, JsonStyle::CanonicalV1));
            } else {
                print!(
                    "{}",
                    render_session_text_with_options(
                        &session,
                        TextRenderOptions {
                            verbose: cli.verbose
                        }
                    )
                );
            }
        }
        Command::Export {
            save,
            entry,
            output,
        } => {
            let session = open_session(&engine, &save);
            let entry = resolve_entry(&session, &entry);
            let text = session.export_entry(&entry).unwrap_or_else(|e| {
                eprintln!("Error exporting {entry}: {e}");
                process::exit(1);
            });
            match output {
                Some(path) => write_output(&path, text.as_bytes()),
                None => println!("{text}"),
            }
        }
        Command::Apply {
            save,
            entry,
            edited,
            output,
        } => {
            let session = open_session(&engine, &save);
            let entry = resolve_entry(&session, &entry);
            let edited_text = read_text(&edited);
            let bytes = session
                .apply_entry_edit(&entry, &edited_text)
                .unwrap_or_else(|e| {
                    eprintln!("Error applying {}: {e}", edited.display());
                    process::exit(1);
                });
            write_output(&output, &bytes);
            eprintln!("Wrote {}", output.display());
        }
        Command::Structures {
            save,
            threshold,
            json,
        } => {
            let session = open_session(&engine, &save);
            let listing = session
                .structure_listing(&import_options(threshold))
                .unwrap_or_else(|e| {
                    eprintln!("Error listing structures: {e}");
                    process::exit(1);
                });
            if json {
                print_json(&render_structures_json(
                    &listing.summaries(),
                    listing.grouping(),
                    JsonStyle::CanonicalV1,
                ));
            } else {
                print!(
                    "{}",
                    render_structures_text(&listing.summaries(), listing.grouping())
                );
            }
        }
        Command::Import {
            save,
            base,
            threshold,
            select,
            group,
            all,
            output,
            json,
        } => {
            let selection = Selection::from_flags(select, group, all);
            if selection.is_some() && output.is_none() {
                eprintln!("--select, --group and --all require --output <PATH>");
                process::exit(2);
            }

            let session = open_session(&engine, &save);
            let base_text = read_text(&base);
            let plan = session
                .plan_import(&base_text, &import_options(threshold))
                .unwrap_or_else(|e| {
                    eprintln!("Error reading base file {}: {e}", base.display());
                    process::exit(1);
                });

            let Some(output) = output else {
                if json {
                    print_json(&render_import_plan_json(&plan, JsonStyle::CanonicalV1));
                } else {
                    print!("{}", render_import_plan_text(&plan));
                }
                return;
            };
            let Some(selection) = selection else {
                eprintln!("--output requires one of --select, --group or --all");
                process::exit(2);
            };

            let indices = match selection {
                Selection::Indices(indices) => Ok(indices.into_iter().collect()),
                Selection::Groups(groups) => plan.selection_for_groups(&groups),
                Selection::All => Ok(plan.all_indices()),
            };
            let result = indices.and_then(|indices: BTreeSet<usize>| {
                session.import_structures(&plan, &indices)
            });
            let (bytes, report) = result.unwrap_or_else(|e| {
                eprintln!("Error importing structures: {e}");
                process::exit(1);
            });
            write_output(&output, &bytes);
            if json {
                print_json(&render_import_report_json(&report, JsonStyle::CanonicalV1));
            } else {
                print!("{}", render_import_report_text(&report));
            }
        }
        Command::Delete {
            save,
            select,
            group,
            threshold,
            output,
            json,
        } => {
            let Some(selection) = Selection::from_flags(select, group, false) else {
                eprintln!("delete requires --select or --group");
                process::exit(2);
            };

            let session = open_session(&engine, &save);
            let indices = match selection {
                Selection::Groups(groups) => session
                    .structure_listing(&import_options(threshold))
                    .and_then(|listing| listing.selection_for_groups(&groups)),
                Selection::Indices(indices) => Ok(indices.into_iter().collect()),
                Selection::All => Ok(BTreeSet::new()),
            };
            let result = indices.and_then(|indices| session.delete_structures(&indices));
            let (bytes, report) = result.unwrap_or_else(|e| {
                eprintln!("Error deleting structures: {e}");
                process::exit(1);
            });
            write_output(&output, &bytes);
            if json {
                print_json(&render_delete_report_json(&report, JsonStyle::CanonicalV1));
            } else {
                print!("{}", render_delete_report_text(&report));
            }
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn import_options(threshold: f64) -> ImportOptions {
    ImportOptions {
        group_threshold: threshold,
    }
}

fn open_session(engine: &Engine, path: &Path) -> Session {
    let bytes = fs::read(path).unwrap_or_else(|e| {
        eprintln!("Error reading {}: {e}", path.display());
        process::exit(1);
    });
    let upload_name = path.file_name().and_then(|name| name.to_str());
    engine
        .open_archive_named(bytes, upload_name)
        .unwrap_or_else(|e| {
            eprintln!("Error opening save archive: {}", path.display());
            eprintln!("  {e}");
            process::exit(1);
        })
}

// Accepts the full entry name or a file name unique among the JSON entries.
fn resolve_entry(session: &Session, requested: &str) -> String {
    if session.entries().iter().any(|entry| entry == requested) {
        return requested.to_string();
    }
    let suffix = format!("/{requested}");
    let matches: Vec<&str> = session
        .json_entries()
        .into_iter()
        .filter(|entry| entry.ends_with(&suffix))
        .collect();
    match matches.as_slice() {
        [entry] => entry.to_string(),
        [] => {
            eprintln!("Error: no entry named {requested}");
            process::exit(1);
        }
        _ => {
            eprintln!("Error: {requested} matches several entries:");
            for entry in matches.iter() {
                eprintln!("  {entry}");
            }
            process::exit(1);
        }
    }
}

fn read_text(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading {}: {e}", path.display());
        process::exit(1);
    })
}

fn write_output(path: &Path, bytes: &[u8]) {
    fs::write(path, bytes).unwrap_or_else(|e| {
        eprintln!("Error writing {}: {e}", path.display());
        process::exit(1);
    });
}

fn print_json(value: &JsonValue) {
    let rendered = serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        eprintln!("Error rendering JSON output: {e}");
        process::exit(1);
    });
    println!("{rendered}");
}

fn parse_index_list(raw: &str) -> Result<IndexList, String> {
    parse_indices(raw).map(IndexList)
}

// Group numbers are shown 1-based; the core addresses them from 0.
fn parse_group_list(raw: &str) -> Result<IndexList, String> {
    parse_indices(raw)?
        .into_iter()
        .map(|group| {
            group
                .checked_sub(1)
                .ok_or_else(|| "group numbers start at 1".to_string())
        })
        .collect::<Result<Vec<_>, _>>()
        .map(IndexList)
}

fn parse_indices(raw: &str) -> Result<Vec<usize>, String> {
    let mut indices = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        match part.split_once('-') {
            Some((start, end)) => {
                let start = parse_index(start)?;
                let end = parse_index(end)?;
                if start > end {
                    return Err(format!("range {part} runs backwards"));
                }
                indices.extend(start..=end);
            }
            None => indices.push(parse_index(part)?),
        }
    }
    if indices.is_empty() {
        return Err("expected at least one index".to_string());
    }
    Ok(indices)
}

fn parse_index(raw: &str) -> Result<usize, String> {
    raw.trim()
        .parse::<usize>()
        .map_err(|e| format!("invalid index {raw:?}: {e}"))
}
