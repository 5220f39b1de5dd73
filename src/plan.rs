//! YAML mapping plans.
//!
//! A plan is a proposal written out for a person to edit: one entry per
//! source column with its target (or none), how that target was chosen and
//! the ranked suggestions. Loading a plan back yields a [`ColumnMapping`].

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, ensure};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::mapping::{Candidate, ColumnMapping, MappingProposal, MappingTarget, Provenance};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingPlan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_file: Option<PathBuf>,
    pub columns: Vec<PlanEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub source: String,
    /// `null` (or absent) drops the column.
    #[serde(default)]
    pub target: Option<String>,
    /// Omitted for hand-written entries, which load as manual.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<Candidate>,
}

impl MappingPlan {
    pub fn from_proposal(
        proposal: &MappingProposal,
        source_file: Option<&Path>,
        target_file: Option<&Path>,
    ) -> Self {
        let columns = proposal
            .mapping
            .entries()
            .iter()
            .map(|entry| PlanEntry {
                source: entry.source.clone(),
                target: entry.target.column().map(str::to_string),
                provenance: entry.target.provenance(),
                suggestions: proposal.suggestions_for(&entry.source).to_vec(),
            })
            .collect();
        Self {
            source_file: source_file.map(Path::to_path_buf),
            target_file: target_file.map(Path::to_path_buf),
            columns,
        }
    }

    pub fn to_mapping(&self) -> Result<ColumnMapping> {
        let duplicates = self
            .columns
            .iter()
            .map(|entry| entry.source.as_str())
            .duplicates()
            .collect::<Vec<_>>();
        ensure!(
            duplicates.is_empty(),
            "Mapping plan lists source column(s) more than once: {}",
            duplicates.join(", ")
        );

        let mut mapping = ColumnMapping::new();
        for entry in &self.columns {
            let target = match entry.target.as_deref().map(str::trim) {
                Some(column) if !column.is_empty() => MappingTarget::mapped(
                    column,
                    entry.provenance.unwrap_or(Provenance::Manual),
                ),
                _ => MappingTarget::Unmapped,
            };
            mapping.set(entry.source.as_str(), target);
        }
        Ok(mapping)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Serializing mapping plan to YAML")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("Creating mapping plan {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing mapping plan YAML")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening mapping plan {path:?}"))?;
        let plan = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing mapping plan {path:?}"))?;
        Ok(plan)
    }
}
