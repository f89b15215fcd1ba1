//! Run selection: which in-service assets a reference month touches, and how

use crate::applier::project_accumulated;
use crate::helpers::exceeds_epsilon;
use crate::schedule::{derive_schedule, Schedule, StartRule};
use crate::RunError;
use assetbook_core::{Decimal, YearMonth};
use assetbook_register::{Asset, Snapshot, ValuationBasis};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Operator-controlled run options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunPolicy {
    /// Start depreciating in the in-service month rather than the month after.
    /// Only moves this run's eligibility window; stored schedules keep the
    /// month-after rule.
    #[serde(default)]
    pub use_acquisition_month: bool,
}

impl RunPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_acquisition_month(mut self, enabled: bool) -> Self {
        self.use_acquisition_month = enabled;
        self
    }

    pub fn start_rule(&self) -> StartRule {
        if self.use_acquisition_month {
            StartRule::SameMonth
        } else {
            StartRule::MonthAfter
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Ready,
    /// The target month was already run; recompute from first principles
    Recalculation,
    Error(RunError),
}

impl Outcome {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn error(&self) -> Option<&RunError> {
        match self {
            Self::Error(e) => Some(e),
            _ => None,
        }
    }
}

/// One line of the preview shown to the operator before commit
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewEntry {
    pub asset_id: String,
    pub asset_name: String,
    /// Asset version the figures were computed from
    pub expected_version: u64,
    pub outcome: Outcome,
    pub depreciable_base: Decimal,
    pub useful_life_months: i64,
    pub start_month: Option<YearMonth>,
    pub end_month: Option<YearMonth>,
    pub monthly_amount: Decimal,
    pub total_months_elapsed: i64,
    pub last_run_month: Option<YearMonth>,
    pub current_accumulated: Decimal,
    pub projected_accumulated: Decimal,
    pub delta: Decimal,
    pub will_write: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewSummary {
    pub listed: usize,
    pub ready: usize,
    pub recalculations: usize,
    pub errors: usize,
    pub writes: usize,
    pub total_delta: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunPreview {
    pub target_month: YearMonth,
    pub policy: RunPolicy,
    pub entries: Vec<PreviewEntry>,
    pub summary: PreviewSummary,
}

impl RunPreview {
    pub fn entry(&self, asset_id: &str) -> Option<&PreviewEntry> {
        self.entries.iter().find(|e| e.asset_id == asset_id)
    }

    pub fn errors(&self) -> impl Iterator<Item = &PreviewEntry> {
        self.entries.iter().filter(|e| e.outcome.is_error())
    }

    /// Entries that will change stored state on commit
    pub fn writes(&self) -> impl Iterator<Item = &PreviewEntry> {
        self.entries.iter().filter(|e| e.will_write)
    }
}

/// Classify every in-service asset for `target_month`
///
/// Pure: reads the snapshot and nothing else. Assets that are not in
/// service are not listed; every listed asset carries an outcome.
pub fn select_for_run(snapshot: &Snapshot, target_month: YearMonth, policy: RunPolicy) -> RunPreview {
    let entries: Vec<PreviewEntry> = snapshot
        .assets()
        .iter()
        .filter(|asset| asset.is_in_service())
        .map(|asset| classify(snapshot, asset, target_month, policy))
        .collect();

    let summary = summarize(&entries);
    debug!(
        month = %target_month,
        listed = summary.listed,
        errors = summary.errors,
        writes = summary.writes,
        "Run preview built"
    );

    RunPreview { target_month, policy, entries, summary }
}

fn classify(snapshot: &Snapshot, asset: &Asset, target: YearMonth, policy: RunPolicy) -> PreviewEntry {
    // Fiscal life only; the corporate track is never written back
    let valuation = snapshot.valuation(asset, ValuationBasis::Fiscal);
    let derived = derive_schedule(&valuation, policy.start_rule());
    let last_run = asset.last_run_month();
    let current = asset.accumulated_depreciation.clone();

    let outcome = match outcome_for(asset, &derived, last_run, target) {
        Ok(outcome) => outcome,
        Err(err) => Outcome::Error(err),
    };

    let schedule = derived.as_ref().ok();
    let mut entry = PreviewEntry {
        asset_id: asset.id.clone(),
        asset_name: asset.name.clone(),
        expected_version: asset.version,
        outcome,
        depreciable_base: valuation.depreciable_base.clone(),
        useful_life_months: valuation.useful_life_months,
        start_month: schedule.map(|s| s.start_month),
        end_month: schedule.map(|s| s.end_month),
        monthly_amount: schedule.map(|s| s.monthly_quota.clone()).unwrap_or_default(),
        total_months_elapsed: 0,
        last_run_month: last_run,
        current_accumulated: current.clone(),
        projected_accumulated: current.clone(),
        delta: Decimal::zero(),
        will_write: false,
    };

    if let (Some(schedule), false) = (schedule, entry.outcome.is_error()) {
        let elapsed = schedule.months_elapsed(target);
        let recalculation = entry.outcome == Outcome::Recalculation;
        let projected = project_accumulated(schedule, &current, target, recalculation);
        entry.total_months_elapsed = elapsed;
        entry.delta = projected.sub(&current);
        entry.will_write = exceeds_epsilon(&projected, &current);
        entry.projected_accumulated = projected;
    }

    debug!(
        asset_id = %entry.asset_id,
        outcome = ?entry.outcome,
        will_write = entry.will_write,
        "Classified asset"
    );
    entry
}

fn outcome_for(
    asset: &Asset,
    derived: &Result<Schedule, RunError>,
    last_run: Option<YearMonth>,
    target: YearMonth,
) -> Result<Outcome, RunError> {
    if asset.is_paused() {
        return Err(RunError::Paused);
    }
    let schedule = derived.as_ref().map_err(|e| e.clone())?;

    if let Some(last_run) = last_run.filter(|last| *last > target) {
        return Err(RunError::FuturePeriodAlreadyProcessed { last_run });
    }
    if target < schedule.start_month {
        return Err(RunError::NotYetStarted { start: schedule.start_month });
    }
    if target >= schedule.end_month {
        return Err(RunError::AlreadyFinished { last: schedule.last_month() });
    }

    if last_run == Some(target) {
        Ok(Outcome::Recalculation)
    } else {
        Ok(Outcome::Ready)
    }
}

fn summarize(entries: &[PreviewEntry]) -> PreviewSummary {
    let mut summary = PreviewSummary { listed: entries.len(), ..PreviewSummary::default() };
    for entry in entries {
        match entry.outcome {
            Outcome::Ready => summary.ready += 1,
            Outcome::Recalculation => summary.recalculations += 1,
            Outcome::Error(_) => summary.errors += 1,
        }
        if entry.will_write {
            summary.writes += 1;
            summary.total_delta = summary.total_delta.add(&entry.delta);
        }
    }
    summary
}
