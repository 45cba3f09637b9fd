//! Stage summaries returned by every pipeline run.

use serde::Serialize;
use std::fmt;

use crate::data::DecodeReport;
use crate::engine::pipeline::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Ran,
    /// Outputs already existed and force was not set.
    Skipped,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageStatus::Ran => write!(f, "ran"),
            StageStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// What one stage did for one cycle day.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageSummary {
    pub day: String,
    pub stage: Stage,
    pub status: StageStatus,
    pub records_in: usize,
    pub records_out: usize,
    pub malformed_skipped: usize,
    pub defaulted_values: usize,
    pub outputs: Vec<String>,
    pub notes: Vec<String>,
}

impl StageSummary {
    pub fn new(day: &str, stage: Stage, status: StageStatus) -> Self {
        Self {
            day: day.to_string(),
            stage,
            status,
            records_in: 0,
            records_out: 0,
            malformed_skipped: 0,
            defaulted_values: 0,
            outputs: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// Fold a decoding pass into the input counters.
    pub fn absorb(&mut self, report: &DecodeReport) {
        self.records_in += report.total;
        self.malformed_skipped += report.skipped;
        self.defaulted_values += report.defaulted;
    }

    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }
}

impl fmt::Display for StageSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}] in={} out={} skipped={} defaulted={}",
            self.day,
            self.stage,
            self.status,
            self.records_in,
            self.records_out,
            self.malformed_skipped,
            self.defaulted_values,
        )
    }
}
