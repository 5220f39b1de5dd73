//! Plain-text tables for proposals, mappings and merge statistics.

use std::borrow::Cow;
use std::fmt::Write as _;

use itertools::Itertools;

use crate::{
    mapping::{ColumnMapping, MappingProposal, MappingTarget},
    merge::MergeStatistics,
};

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }

    for width in &mut widths {
        *width = (*width).max(1);
    }

    let mut output = String::new();

    // Header
    let header_line = format_row(headers, &widths);
    let _ = writeln!(output, "{header_line}");

    // Separator
    let separator_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<usize>>();
    let separator_cells = separator_widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>();
    let separator_line = format_row(&separator_cells, &separator_widths);
    let _ = writeln!(output, "{separator_line}");

    // Rows
    for row in rows {
        let row_line = format_row(row, &widths);
        let _ = writeln!(output, "{row_line}");
    }

    output
}

/// One line per source column with its proposed target and suggestions.
pub fn render_proposal(proposal: &MappingProposal) -> String {
    let headers = headers(&["source", "target", "match", "suggestions"]);
    let rows = proposal
        .mapping
        .entries()
        .iter()
        .map(|entry| {
            let (target, provenance) = target_cells(&entry.target);
            let suggestions = proposal
                .suggestions_for(&entry.source)
                .iter()
                .map(|candidate| format!("{} ({:.2})", candidate.target, candidate.score))
                .join(", ");
            vec![entry.source.clone(), target, provenance, suggestions]
        })
        .collect::<Vec<_>>();
    let mut output = render_table(&headers, &rows);
    let uncovered = proposal.uncovered_targets(&proposal.mapping);
    if !uncovered.is_empty() {
        let _ = writeln!(
            output,
            "\nTarget column(s) without a source: {}",
            uncovered.join(", ")
        );
    }
    output
}

pub fn render_mapping(mapping: &ColumnMapping) -> String {
    let headers = headers(&["source", "target", "match"]);
    let rows = mapping
        .entries()
        .iter()
        .map(|entry| {
            let (target, provenance) = target_cells(&entry.target);
            vec![entry.source.clone(), target, provenance]
        })
        .collect::<Vec<_>>();
    render_table(&headers, &rows)
}

pub fn render_statistics(stats: &MergeStatistics) -> String {
    let headers = headers(&["statistic", "value"]);
    let rows = [
        ("source columns", stats.source_columns),
        ("target columns", stats.target_columns),
        ("target rows", stats.target_rows),
        ("rows appended", stats.rows_appended),
        ("columns matched (exact)", stats.columns_matched_exact),
        ("columns matched (fuzzy)", stats.columns_matched_fuzzy),
        ("columns matched (manual)", stats.columns_matched_manual),
        ("source columns dropped", stats.columns_unmapped),
        ("target columns filled with null", stats.target_columns_filled),
        ("nulls from cleaning", stats.nulls_normalized),
        ("nulls from reconciliation", stats.nulls_filled),
        ("nulls introduced", stats.nulls_introduced),
    ]
    .into_iter()
    .map(|(label, value)| vec![label.to_string(), value.to_string()])
    .collect::<Vec<_>>();
    render_table(&headers, &rows)
}

fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

fn target_cells(target: &MappingTarget) -> (String, String) {
    match target {
        MappingTarget::Mapped { column, provenance } => {
            (column.clone(), provenance.to_string())
        }
        MappingTarget::Unmapped => ("(unmapped)".to_string(), String::new()),
    }
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let mut cells = Vec::with_capacity(values.len());
    for (idx, value) in values.iter().enumerate() {
        if idx >= widths.len() {
            break;
        }
        let sanitized = sanitize_cell(value);
        let display = display_width(sanitized.as_ref());
        let mut cell = sanitized.into_owned();
        let padding = widths
            .get(idx)
            .copied()
            .unwrap_or_default()
            .saturating_sub(display);
        if padding > 0 {
            cell.push_str(&" ".repeat(padding));
        }
        cells.push(cell);
    }
    let mut line = cells.join("  ");
    while line.ends_with(' ') {
        line.pop();
    }
    line
}

fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            // Skip ANSI escape sequence (e.g. \x1b[31m)
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        let mut sanitized = String::with_capacity(value.len());
        for ch in value.chars() {
            match ch {
                '\n' | '\r' | '\t' => sanitized.push(' '),
                other => sanitized.push(other),
            }
        }
        Cow::Owned(sanitized)
    } else {
        Cow::Borrowed(value)
    }
}
