//! Schema-reconciling append.
//!
//! [`merge`] checks the mapping against both tables, projects each source
//! row onto the target's columns, normalizes empty-equivalent cells to null
//! and appends the result after the target's own rows. The target's column
//! list and rows come through untouched.

use log::{debug, info};
use serde::Serialize;

use crate::{
    data::{Cell, normalize_cell},
    error::{AppendError, Result},
    mapping::{ColumnMapping, Provenance},
    table::Table,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOptions {
    pub allow_many_to_one: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeStatistics {
    pub source_columns: usize,
    pub target_columns: usize,
    pub target_rows: usize,
    pub rows_appended: usize,
    pub columns_matched_exact: usize,
    pub columns_matched_fuzzy: usize,
    pub columns_matched_manual: usize,
    /// Source columns dropped because nothing maps them.
    pub columns_unmapped: usize,
    /// Target columns that no source column feeds.
    pub target_columns_filled: usize,
    /// Mapped source cells that were missing or empty-equivalent.
    pub nulls_normalized: usize,
    /// Cells of uncovered target columns in appended rows.
    pub nulls_filled: usize,
    pub nulls_introduced: usize,
}

impl MergeStatistics {
    pub fn columns_mapped(&self) -> usize {
        self.columns_matched_exact + self.columns_matched_fuzzy + self.columns_matched_manual
    }
}

/// Where each target column of an appended row takes its value from.
struct Projection {
    /// Per target column, the source column indices feeding it, in source order.
    sources: Vec<Vec<usize>>,
}

pub fn merge(
    source: &Table,
    target: &Table,
    mapping: &ColumnMapping,
    options: MergeOptions,
) -> Result<(Table, MergeStatistics)> {
    validate_mapping(source, target, mapping)?;
    if !options.allow_many_to_one
        && let Some((column, sources)) = mapping.conflicts().into_iter().next()
    {
        return Err(AppendError::MappingConflict {
            target: column,
            sources,
        });
    }

    let projection = build_projection(source, target, mapping);
    let mut stats = MergeStatistics {
        source_columns: source.columns().len(),
        target_columns: target.columns().len(),
        target_rows: target.row_count(),
        rows_appended: source.row_count(),
        columns_matched_exact: mapping.count_with(Provenance::Exact),
        columns_matched_fuzzy: mapping.count_with(Provenance::Fuzzy),
        columns_matched_manual: mapping.count_with(Provenance::Manual),
        ..MergeStatistics::default()
    };
    stats.columns_unmapped = stats.source_columns - stats.columns_mapped();
    stats.target_columns_filled = projection
        .sources
        .iter()
        .filter(|feeds| feeds.is_empty())
        .count();

    let mut rows = Vec::with_capacity(target.row_count() + source.row_count());
    rows.extend(target.rows().iter().cloned());
    for source_row in source.rows() {
        let mut row = Vec::with_capacity(projection.sources.len());
        for feeds in &projection.sources {
            if feeds.is_empty() {
                stats.nulls_filled += 1;
                row.push(None);
                continue;
            }
            let mut cell = first_present(source_row, feeds);
            if normalize_cell(&mut cell) {
                stats.nulls_normalized += 1;
            }
            row.push(cell);
        }
        rows.push(row);
    }
    stats.nulls_introduced = stats.nulls_normalized + stats.nulls_filled;

    let merged = Table::new(target.columns().to_vec(), rows)?;
    info!(
        "Merged {} source row(s) onto {} target row(s); {} null(s) introduced",
        stats.rows_appended, stats.target_rows, stats.nulls_introduced
    );
    Ok((merged, stats))
}

/// Every mapping key must name a source column and every mapped value a
/// target column.
pub fn validate_mapping(source: &Table, target: &Table, mapping: &ColumnMapping) -> Result<()> {
    let unknown_sources = mapping
        .entries()
        .iter()
        .map(|entry| entry.source.as_str())
        .filter(|name| !source.has_column(name))
        .collect::<Vec<_>>();
    if !unknown_sources.is_empty() {
        return Err(AppendError::mapping_validation(format!(
            "Mapping references source column(s) not present in the source table: {}",
            unknown_sources.join(", ")
        )));
    }
    let unknown_targets = mapping
        .mapped()
        .map(|(_, column, _)| column)
        .filter(|name| !target.has_column(name))
        .collect::<Vec<_>>();
    if !unknown_targets.is_empty() {
        return Err(AppendError::mapping_validation(format!(
            "Mapping references target column(s) not present in the target table: {}",
            unknown_targets.join(", ")
        )));
    }
    Ok(())
}

fn build_projection(source: &Table, target: &Table, mapping: &ColumnMapping) -> Projection {
    let mut sources = vec![Vec::new(); target.columns().len()];
    for (idx, column) in source.columns().iter().enumerate() {
        let Some(mapped) = mapping.target_of(column) else {
            debug!("Dropping unmapped source column '{column}'");
            continue;
        };
        if let Some(target_idx) = target.column_index(mapped) {
            sources[target_idx].push(idx);
        }
    }
    Projection { sources }
}

/// First non-null-equivalent cell among `feeds`; with a single feed this is
/// simply that cell.
fn first_present(row: &[Cell], feeds: &[usize]) -> Cell {
    feeds
        .iter()
        .filter_map(|idx| row.get(*idx))
        .find(|cell| cell.as_ref().is_some_and(|value| !value.is_null_equivalent()))
        .or_else(|| feeds.first().and_then(|idx| row.get(*idx)))
        .cloned()
        .flatten()
}
