//! Human review of a mapping proposal.
//!
//! The pipeline blocks on a [`MappingReviewer`] between proposing and
//! merging. A reviewer either returns the mapping to merge with or cancels,
//! in which case nothing is merged or written.

use std::io::{BufRead, Write};

use anyhow::Result;
use log::debug;

use crate::mapping::{
    ColumnMapping, MappingEdit, MappingProposal, MappingTarget, Provenance,
    accept_top_suggestions, apply_override,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewDecision {
    Accept(ColumnMapping),
    Cancel,
}

pub trait MappingReviewer {
    fn review(&mut self, proposal: &MappingProposal) -> Result<ReviewDecision>;
}

/// Applies decisions fixed up front: a saved plan or the proposal itself,
/// optionally the best suggestions, then explicit edits in order.
#[derive(Debug, Clone, Default)]
pub struct ScriptedReviewer {
    pub plan: Option<ColumnMapping>,
    pub accept_suggestions: bool,
    pub allow_many_to_one: bool,
    pub edits: Vec<MappingEdit>,
    pub cancel: bool,
}

impl ScriptedReviewer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancelling() -> Self {
        Self {
            cancel: true,
            ..Self::default()
        }
    }

    pub fn with_edits(mut self, edits: Vec<MappingEdit>) -> Self {
        self.edits = edits;
        self
    }

    pub fn accepting_suggestions(mut self, allow_many_to_one: bool) -> Self {
        self.accept_suggestions = true;
        self.allow_many_to_one = allow_many_to_one;
        self
    }
}

impl MappingReviewer for ScriptedReviewer {
    fn review(&mut self, proposal: &MappingProposal) -> Result<ReviewDecision> {
        if self.cancel {
            return Ok(ReviewDecision::Cancel);
        }
        let base = match &self.plan {
            Some(plan) => plan.clone(),
            None if self.accept_suggestions => {
                accept_top_suggestions(proposal, self.allow_many_to_one)
            }
            None => proposal.mapping.clone(),
        };
        Ok(ReviewDecision::Accept(apply_override(&base, &self.edits)))
    }
}

/// Walks through every source column on a terminal.
///
/// For each column the current decision and numbered suggestions are shown.
/// Enter keeps the decision, a number accepts that suggestion, a target
/// column name maps by hand, `-` drops the column and `q` cancels. End of
/// input also cancels.
pub struct PromptReviewer<R, W> {
    input: R,
    output: W,
}

enum Answer {
    Keep,
    Set(MappingTarget),
    Cancel,
}

impl<R: BufRead, W: Write> PromptReviewer<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn ask(&mut self, proposal: &MappingProposal, source: &str) -> Result<Answer> {
        let candidates = proposal.suggestions_for(source);
        loop {
            if candidates.is_empty() {
                write!(self.output, "  [Enter] keep, column name, '-' drop, 'q' cancel: ")?;
            } else {
                write!(
                    self.output,
                    "  [Enter] keep, 1-{} suggestion, column name, '-' drop, 'q' cancel: ",
                    candidates.len()
                )?;
            }
            self.output.flush()?;
            let Some(answer) = self.read_line()? else {
                return Ok(Answer::Cancel);
            };
            match answer.as_str() {
                "" => return Ok(Answer::Keep),
                "q" | "Q" => return Ok(Answer::Cancel),
                "-" => return Ok(Answer::Set(MappingTarget::Unmapped)),
                _ => {}
            }
            // A target literally named like a number wins over the suggestion index.
            if proposal.target_columns.iter().any(|column| *column == answer) {
                return Ok(Answer::Set(MappingTarget::mapped(
                    answer,
                    Provenance::Manual,
                )));
            }
            if let Ok(choice) = answer.parse::<usize>() {
                match choice.checked_sub(1).and_then(|idx| candidates.get(idx)) {
                    Some(candidate) => {
                        return Ok(Answer::Set(MappingTarget::mapped(
                            candidate.target.clone(),
                            Provenance::Fuzzy,
                        )));
                    }
                    None => {
                        writeln!(self.output, "  No suggestion numbered {choice}.")?;
                        continue;
                    }
                }
            }
            writeln!(self.output, "  Unknown target column '{answer}'.")?;
        }
    }
}

impl<R: BufRead, W: Write> MappingReviewer for PromptReviewer<R, W> {
    fn review(&mut self, proposal: &MappingProposal) -> Result<ReviewDecision> {
        let mut mapping = proposal.mapping.clone();
        let total = mapping.len();
        let sources = mapping
            .entries()
            .iter()
            .map(|entry| entry.source.clone())
            .collect::<Vec<_>>();

        for (idx, source) in sources.iter().enumerate() {
            let current = match mapping.get(source) {
                Some(MappingTarget::Mapped { column, provenance }) => {
                    format!("{column} ({provenance})")
                }
                _ => "(unmapped)".to_string(),
            };
            writeln!(self.output, "[{}/{}] {source} -> {current}", idx + 1, total)?;
            for (rank, candidate) in proposal.suggestions_for(source).iter().enumerate() {
                writeln!(
                    self.output,
                    "  {}) {} ({:.2})",
                    rank + 1,
                    candidate.target,
                    candidate.score
                )?;
            }
            match self.ask(proposal, source)? {
                Answer::Keep => {}
                Answer::Set(target) => {
                    debug!("Reviewer set '{source}' -> {:?}", target.column());
                    mapping.set(source.as_str(), target);
                }
                Answer::Cancel => return Ok(ReviewDecision::Cancel),
            }
        }

        let mapped = mapping.mapped().count();
        write!(
            self.output,
            "{mapped} column(s) mapped, {} dropped. Proceed? [Y/n] ",
            total - mapped
        )?;
        self.output.flush()?;
        match self.read_line()?.as_deref() {
            Some("" | "y" | "Y" | "yes") => Ok(ReviewDecision::Accept(mapping)),
            _ => Ok(ReviewDecision::Cancel),
        }
    }
}
