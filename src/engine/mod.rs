//! Core engine: named stages over a cycle day.

pub mod cycle_day;
pub mod pipeline;
pub mod report;

pub use pipeline::{Pipeline, Stage};
pub use report::{StageStatus, StageSummary};
