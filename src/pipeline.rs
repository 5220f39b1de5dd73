//! End-to-end append: load both files, propose a mapping, wait for the
//! reviewer, merge, then replace the target file.
//!
//! Nothing touches the target file before the reviewer accepts and the
//! merge succeeds, so a cancel or any error leaves it as it was.

use std::path::{Path, PathBuf};

use anyhow::Result;
use log::info;

use crate::{
    config::MergeConfig,
    loader::{self, LoadOptions},
    mapping::{ColumnMapping, MappingProposal, propose_mapping},
    merge::{MergeOptions, MergeStatistics, merge},
    review::{MappingReviewer, ReviewDecision},
    table::Table,
    writer::{self, WriteOptions},
};

#[derive(Debug, Clone)]
pub struct AppendRequest {
    pub source: PathBuf,
    pub target: PathBuf,
    pub config: MergeConfig,
    pub load: LoadOptions,
    pub write: WriteOptions,
    /// Merge and report without writing the target.
    pub dry_run: bool,
}

impl AppendRequest {
    pub fn new(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            config: MergeConfig::default(),
            load: LoadOptions::default(),
            write: WriteOptions::default(),
            dry_run: false,
        }
    }
}

#[derive(Debug)]
pub enum AppendOutcome {
    Completed {
        stats: MergeStatistics,
        mapping: ColumnMapping,
        /// Where the previous target was copied, when a backup was requested.
        backup: Option<PathBuf>,
        written: bool,
    },
    Cancelled,
}

/// Loads both files and proposes a mapping between their headers.
pub fn propose_for_files(
    source: &Path,
    target: &Path,
    config: &MergeConfig,
    load: &LoadOptions,
) -> Result<(Table, Table, MappingProposal)> {
    let source_table = loader::load(source, load)?;
    let target_table = loader::load(target, load)?;
    let proposal = propose_mapping(source_table.columns(), target_table.columns(), config)?;
    let suggested = proposal
        .suggestions
        .iter()
        .filter(|suggestion| !suggestion.candidates.is_empty())
        .count();
    info!(
        "Proposed {} exact match(es); {} column(s) with suggestions, {} without",
        proposal.mapping.mapped().count(),
        suggested,
        proposal.suggestions.len() - suggested
    );
    Ok((source_table, target_table, proposal))
}

pub fn run_append(
    request: &AppendRequest,
    reviewer: &mut dyn MappingReviewer,
) -> Result<AppendOutcome> {
    request.config.validate()?;
    let (source, target, proposal) =
        propose_for_files(&request.source, &request.target, &request.config, &request.load)?;

    let mapping = match reviewer.review(&proposal)? {
        ReviewDecision::Accept(mapping) => mapping,
        ReviewDecision::Cancel => {
            info!("Review cancelled; {:?} left unchanged", request.target);
            return Ok(AppendOutcome::Cancelled);
        }
    };

    let options = MergeOptions {
        allow_many_to_one: request.config.allow_many_to_one_mapping,
    };
    let (merged, stats) = merge(&source, &target, &mapping, options)?;

    if request.dry_run {
        info!("Dry run; {:?} not written", request.target);
        return Ok(AppendOutcome::Completed {
            stats,
            mapping,
            backup: None,
            written: false,
        });
    }
    let backup = writer::write(&merged, &request.target, &request.write)?;
    Ok(AppendOutcome::Completed {
        stats,
        mapping,
        backup,
        written: true,
    })
}
