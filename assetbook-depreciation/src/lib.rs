//! Assetbook Depreciation
//!
//! Straight-line depreciation over an asset register snapshot:
//! - schedule: start/end month, monthly quota, month-by-month projection
//! - selector: which assets a reference month touches, as a reviewable preview
//! - applier: commits a preview through a `PersistenceSink` as one batch
//! - reports: yearly realized/planned summary and per-class positions
//!
//! Everything except [`apply_run`] is a pure function of its inputs.

mod error;
mod helpers;
mod schedule;
mod selector;
mod applier;
mod reports;

pub use error::RunError;
pub use helpers::{exceeds_epsilon, write_epsilon};
pub use schedule::{
    asset_schedule, derive_schedule, schedule_for, AssetSchedule, Schedule, SchedulePhase,
    ScheduleRow, StartRule, MAX_USEFUL_LIFE_MONTHS,
};
pub use selector::{select_for_run, Outcome, PreviewEntry, PreviewSummary, RunPolicy, RunPreview};
pub use applier::{apply_run, plan_run, RunReport, SkippedAsset};
pub use reports::{
    asset_position, asset_positions, asset_year, class_positions, yearly_summary, AssetYear, ClassPosition,
    ClassPositions, ClassYear, MonthFigures, SummaryView, YearlySummary, CONSTRUCTION_IN_PROGRESS,
    UNCLASSIFIED,
};
