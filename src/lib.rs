pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod io_utils;
pub mod loader;
pub mod mapping;
pub mod merge;
pub mod pipeline;
pub mod plan;
pub mod render;
pub mod review;
pub mod similarity;
pub mod table;
pub mod writer;

use std::{
    env,
    io,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};
use serde::Serialize;

use crate::{
    cli::{Cli, Commands},
    config::MergeConfig,
    error::AppendError,
    loader::LoadOptions,
    mapping::MappingEdit,
    merge::MergeStatistics,
    pipeline::{AppendOutcome, AppendRequest},
    plan::MappingPlan,
    review::{MappingReviewer, PromptReviewer, ScriptedReviewer},
    writer::WriteOptions,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sheet_append", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Propose(args) => handle_propose(&args),
        Commands::Append(args) => handle_append(&args),
    }
}

/// `Kind: message` for failures raised by the append engine, the full
/// context chain otherwise.
pub fn describe_error(err: &anyhow::Error) -> String {
    match err
        .chain()
        .find_map(|cause| cause.downcast_ref::<AppendError>())
    {
        Some(append_err) => format!("{}: {err:#}", append_err.kind()),
        None => format!("{err:#}"),
    }
}

fn merge_config(pair: &cli::PairArgs, allow_many_to_one: bool) -> Result<MergeConfig> {
    let base = match &pair.config {
        Some(path) => MergeConfig::load(path)
            .with_context(|| format!("Loading merge config from {path:?}"))?,
        None => MergeConfig::default(),
    };
    let config = base.with_overrides(pair.threshold, pair.top_k, allow_many_to_one)?;
    debug!("Merge config: {:?}", config);
    Ok(config)
}

fn load_options(pair: &cli::PairArgs) -> Result<LoadOptions> {
    Ok(LoadOptions {
        delimiter: pair.delimiter,
        encoding: io_utils::resolve_encoding(pair.input_encoding.as_deref())?,
    })
}

fn handle_propose(args: &cli::ProposeArgs) -> Result<()> {
    let pair = &args.pair;
    info!(
        "Proposing mapping from '{}' onto '{}'",
        pair.source.display(),
        pair.target.display()
    );
    let config = merge_config(pair, false)?;
    let (_, _, proposal) = pipeline::propose_for_files(
        &pair.source,
        &pair.target,
        &config,
        &load_options(pair)?,
    )?;
    let plan = MappingPlan::from_proposal(
        &proposal,
        Some(pair.source.as_path()),
        Some(pair.target.as_path()),
    );

    if args.json {
        let json = serde_json::to_string_pretty(&plan).context("Serializing proposal to JSON")?;
        println!("{json}");
    } else {
        print!("{}", render::render_proposal(&proposal));
    }
    if let Some(output) = &args.output {
        plan.save(output)
            .with_context(|| format!("Writing mapping plan to {output:?}"))?;
        info!("Mapping plan written to {:?}", output);
    }
    Ok(())
}

fn handle_append(args: &cli::AppendArgs) -> Result<()> {
    let pair = &args.pair;
    let config = merge_config(pair, args.allow_many_to_one)?;
    let load = load_options(pair)?;
    let write = WriteOptions {
        delimiter: args.output_delimiter.or(pair.delimiter),
        encoding: io_utils::resolve_encoding(args.output_encoding.as_deref())?,
        backup: args.backup,
    };
    info!(
        "Appending '{}' onto '{}' (output delimiter '{}')",
        pair.source.display(),
        pair.target.display(),
        printable_delimiter(io_utils::resolve_delimiter(&pair.target, write.delimiter))
    );

    let mut reviewer: Box<dyn MappingReviewer> = if args.interactive {
        Box::new(PromptReviewer::new(io::stdin().lock(), io::stderr()))
    } else {
        Box::new(scripted_reviewer(args, config.allow_many_to_one_mapping)?)
    };
    let request = AppendRequest {
        source: pair.source.clone(),
        target: pair.target.clone(),
        config,
        load,
        write,
        dry_run: args.dry_run,
    };

    match pipeline::run_append(&request, reviewer.as_mut())? {
        AppendOutcome::Cancelled => {
            println!("Append cancelled; {:?} was not changed.", request.target);
        }
        AppendOutcome::Completed {
            stats,
            mapping,
            backup,
            written,
        } => {
            if args.json {
                let summary = AppendSummary {
                    target: &request.target,
                    written,
                    backup,
                    statistics: &stats,
                };
                let json = serde_json::to_string_pretty(&summary)
                    .context("Serializing merge statistics to JSON")?;
                println!("{json}");
            } else {
                print!("{}", render::render_mapping(&mapping));
                println!();
                print!("{}", render::render_statistics(&stats));
                if written {
                    println!(
                        "\nWrote {} row(s) to {:?}.",
                        stats.target_rows + stats.rows_appended,
                        request.target
                    );
                } else {
                    println!("\nDry run; {:?} was not changed.", request.target);
                }
                if let Some(path) = backup {
                    println!("Backup saved to {path:?}.");
                }
            }
        }
    }
    Ok(())
}

fn scripted_reviewer(args: &cli::AppendArgs, allow_many_to_one: bool) -> Result<ScriptedReviewer> {
    let plan = match &args.mapping {
        Some(path) => Some(
            MappingPlan::load(path)?
                .to_mapping()
                .with_context(|| format!("Reading mapping plan {path:?}"))?,
        ),
        None => None,
    };
    let mut edits = args
        .maps
        .iter()
        .map(|spec| MappingEdit::parse(spec))
        .collect::<Result<Vec<_>>>()?;
    edits.extend(args.unmaps.iter().map(|source| MappingEdit::unmap(source.trim())));
    debug!("Scripted edits: {:?}", edits);
    Ok(ScriptedReviewer {
        plan,
        accept_suggestions: args.accept_suggestions,
        allow_many_to_one,
        edits,
        cancel: false,
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AppendSummary<'a> {
    target: &'a Path,
    written: bool,
    backup: Option<PathBuf>,
    statistics: &'a MergeStatistics,
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
