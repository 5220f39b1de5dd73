//! Column mapping proposals and human overrides.
//!
//! [`propose_mapping`] pairs source columns with target columns in two
//! passes. Names that are equal ignoring case map straight away with
//! [`Provenance::Exact`]; each target column takes at most one exact match
//! and the first source column (in source order) wins it. Every other source
//! column is scored against the target columns the exact pass left free and
//! receives a ranked [`MatchSuggestion`]. Suggestions are never applied by
//! the engine itself: the entry stays unmapped until a reviewer accepts one
//! ([`ColumnMapping::accept_suggestion`]) or names a column by hand
//! ([`apply_override`]).

use std::{cmp::Ordering, collections::HashSet, fmt};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    config::MergeConfig,
    error::{AppendError, Result},
    similarity,
    table::validate_column_names,
};

/// How a mapping entry was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Exact,
    Fuzzy,
    Manual,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Exact => "exact",
            Provenance::Fuzzy => "fuzzy",
            Provenance::Manual => "manual",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingTarget {
    Mapped {
        column: String,
        provenance: Provenance,
    },
    Unmapped,
}

impl MappingTarget {
    pub fn mapped(column: impl Into<String>, provenance: Provenance) -> Self {
        MappingTarget::Mapped {
            column: column.into(),
            provenance,
        }
    }

    pub fn column(&self) -> Option<&str> {
        match self {
            MappingTarget::Mapped { column, .. } => Some(column),
            MappingTarget::Unmapped => None,
        }
    }

    pub fn provenance(&self) -> Option<Provenance> {
        match self {
            MappingTarget::Mapped { provenance, .. } => Some(*provenance),
            MappingTarget::Unmapped => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    pub source: String,
    pub target: MappingTarget,
}

/// Source column -> target column (or unmapped), one entry per source
/// column, kept in the order entries were first added.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnMapping {
    entries: Vec<MappingEntry>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, source: &str) -> Option<&MappingTarget> {
        self.entries
            .iter()
            .find(|entry| entry.source == source)
            .map(|entry| &entry.target)
    }

    pub fn target_of(&self, source: &str) -> Option<&str> {
        self.get(source).and_then(MappingTarget::column)
    }

    /// Inserts or replaces the entry for `source`. A replaced entry keeps its
    /// position so rendering order stays stable across edits.
    pub fn set(&mut self, source: impl Into<String>, target: MappingTarget) {
        let source = source.into();
        match self.entries.iter_mut().find(|entry| entry.source == source) {
            Some(entry) => entry.target = target,
            None => self.entries.push(MappingEntry { source, target }),
        }
    }

    pub fn map(
        &mut self,
        source: impl Into<String>,
        target: impl Into<String>,
        provenance: Provenance,
    ) {
        self.set(source, MappingTarget::mapped(target, provenance));
    }

    pub fn unmap(&mut self, source: impl Into<String>) {
        self.set(source, MappingTarget::Unmapped);
    }

    /// Records that the reviewer accepted a fuzzy suggestion.
    pub fn accept_suggestion(&mut self, source: &str, target: &str) {
        self.map(source, target, Provenance::Fuzzy);
    }

    /// `(source, target, provenance)` for every mapped entry.
    pub fn mapped(&self) -> impl Iterator<Item = (&str, &str, Provenance)> {
        self.entries.iter().filter_map(|entry| match &entry.target {
            MappingTarget::Mapped { column, provenance } => {
                Some((entry.source.as_str(), column.as_str(), *provenance))
            }
            MappingTarget::Unmapped => None,
        })
    }

    pub fn count_with(&self, provenance: Provenance) -> usize {
        self.mapped().filter(|(_, _, p)| *p == provenance).count()
    }

    pub fn is_target_claimed(&self, target: &str) -> bool {
        self.mapped().any(|(_, column, _)| column == target)
    }

    /// Target columns fed by more than one source column, in the order the
    /// target first appears, each with its sources in mapping order.
    pub fn conflicts(&self) -> Vec<(String, Vec<String>)> {
        let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
        for (source, target, _) in self.mapped() {
            match grouped.iter_mut().find(|(column, _)| column == target) {
                Some((_, sources)) => sources.push(source.to_string()),
                None => grouped.push((target.to_string(), vec![source.to_string()])),
            }
        }
        grouped.retain(|(_, sources)| sources.len() > 1);
        grouped
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub target: String,
    pub score: f64,
}

/// Ranked target candidates for one source column left unmapped by the
/// exact pass, best first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSuggestion {
    pub source: String,
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MappingProposal {
    pub mapping: ColumnMapping,
    pub suggestions: Vec<MatchSuggestion>,
    pub target_columns: Vec<String>,
}

impl MappingProposal {
    pub fn suggestions_for(&self, source: &str) -> &[Candidate] {
        self.suggestions
            .iter()
            .find(|suggestion| suggestion.source == source)
            .map(|suggestion| suggestion.candidates.as_slice())
            .unwrap_or_default()
    }

    /// Target columns that no entry of `mapping` feeds.
    pub fn uncovered_targets<'a>(&'a self, mapping: &ColumnMapping) -> Vec<&'a str> {
        self.target_columns
            .iter()
            .map(String::as_str)
            .filter(|target| !mapping.is_target_claimed(target))
            .collect()
    }
}

pub fn propose_mapping(
    source_columns: &[String],
    target_columns: &[String],
    config: &MergeConfig,
) -> Result<MappingProposal> {
    validate_column_names(source_columns)
        .map_err(|err| AppendError::schema(format!("Source columns: {err}")))?;
    validate_column_names(target_columns)
        .map_err(|err| AppendError::schema(format!("Target columns: {err}")))?;

    let mut mapping = ColumnMapping::new();
    let mut claimed: HashSet<usize> = HashSet::new();
    let mut pending = Vec::new();

    for source in source_columns {
        let key = exact_key(source);
        let hit = target_columns
            .iter()
            .enumerate()
            .find(|(idx, target)| !claimed.contains(idx) && exact_key(target) == key);
        match hit {
            Some((idx, target)) => {
                debug!("'{source}' -> '{target}' (exact)");
                claimed.insert(idx);
                mapping.map(source.as_str(), target.as_str(), Provenance::Exact);
            }
            None => {
                mapping.unmap(source.as_str());
                pending.push(source);
            }
        }
    }

    let remaining = target_columns
        .iter()
        .enumerate()
        .filter(|(idx, _)| !claimed.contains(idx))
        .map(|(_, target)| target)
        .collect::<Vec<_>>();

    let mut suggestions = Vec::with_capacity(pending.len());
    for source in pending {
        let candidates = rank_candidates(source, &remaining, config);
        debug!(
            "'{source}' unmapped with {} suggestion(s)",
            candidates.len()
        );
        suggestions.push(MatchSuggestion {
            source: source.clone(),
            candidates,
        });
    }

    Ok(MappingProposal {
        mapping,
        suggestions,
        target_columns: target_columns.to_vec(),
    })
}

fn exact_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Candidates at or above the threshold, best first; equal scores keep
/// target-column order because the sort is stable.
fn rank_candidates(source: &str, targets: &[&String], config: &MergeConfig) -> Vec<Candidate> {
    let mut candidates = targets
        .iter()
        .map(|target| Candidate {
            target: (*target).clone(),
            score: similarity::score(source, target),
        })
        .filter(|candidate| candidate.score >= config.similarity_threshold)
        .collect::<Vec<_>>();
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    candidates.truncate(config.top_k_suggestions);
    candidates
}

/// One reviewer decision: map `source` to `target`, or unmap it when
/// `target` is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEdit {
    pub source: String,
    pub target: Option<String>,
}

impl MappingEdit {
    pub fn map(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: Some(target.into()),
        }
    }

    pub fn unmap(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: None,
        }
    }

    /// Parses `SOURCE=TARGET`; an empty `TARGET` unmaps the source column.
    pub fn parse(spec: &str) -> anyhow::Result<Self> {
        let (source, target) = spec
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("Mapping '{spec}' must look like SOURCE=TARGET"))?;
        let source = source.trim();
        if source.is_empty() {
            anyhow::bail!("Mapping '{spec}' is missing the source column");
        }
        let target = target.trim();
        Ok(if target.is_empty() {
            Self::unmap(source)
        } else {
            Self::map(source, target)
        })
    }
}

/// Applies reviewer edits in order; later edits for the same source win.
///
/// Mapped edits are tagged [`Provenance::Manual`]. Nothing here checks that
/// a target column is used once; the merge reports such conflicts.
pub fn apply_override(mapping: &ColumnMapping, edits: &[MappingEdit]) -> ColumnMapping {
    let mut updated = mapping.clone();
    for edit in edits {
        match &edit.target {
            Some(target) => updated.map(edit.source.as_str(), target.as_str(), Provenance::Manual),
            None => updated.unmap(edit.source.as_str()),
        }
    }
    updated
}

/// Accepts, for each unmapped source column in order, its best suggestion
/// whose target is still free. With `allow_many_to_one` a target already in
/// use may be taken again.
pub fn accept_top_suggestions(
    proposal: &MappingProposal,
    allow_many_to_one: bool,
) -> ColumnMapping {
    let mut mapping = proposal.mapping.clone();
    for suggestion in &proposal.suggestions {
        if mapping.target_of(&suggestion.source).is_some() {
            continue;
        }
        let choice = suggestion
            .candidates
            .iter()
            .find(|candidate| allow_many_to_one || !mapping.is_target_claimed(&candidate.target));
        if let Some(candidate) = choice {
            debug!(
                "Accepting '{}' -> '{}' ({:.2})",
                suggestion.source, candidate.target, candidate.score
            );
            mapping.accept_suggestion(&suggestion.source, &candidate.target);
        }
    }
    mapping
}
