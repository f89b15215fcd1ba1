//! Straight-line schedule derivation

use crate::RunError;
use assetbook_core::{CalendarDate, Decimal, YearMonth};
use assetbook_register::{Asset, Snapshot, ValuationBasis, Valuation};
use serde::{Deserialize, Serialize};

/// Longest useful life a schedule accepts (100 years)
pub const MAX_USEFUL_LIFE_MONTHS: i64 = 1200;

/// Which month depreciation starts in, relative to the in-service date
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartRule {
    /// First day of the month after the asset enters service
    #[default]
    MonthAfter,
    /// The in-service month itself
    SameMonth,
}

impl StartRule {
    pub fn start_month(&self, in_service: CalendarDate) -> YearMonth {
        let month = YearMonth::of(in_service);
        match self {
            Self::MonthAfter => month.add_months(1),
            Self::SameMonth => month,
        }
    }
}

/// Where a month falls relative to `[start_month, end_month)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulePhase {
    NotStarted,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub asset_value: Decimal,
    pub depreciable_base: Decimal,
    pub useful_life_months: i64,
    /// Unrounded `depreciable_base / useful_life_months`
    pub monthly_quota: Decimal,
    pub start_month: YearMonth,
    /// Exclusive: the first month that no longer depreciates
    pub end_month: YearMonth,
}

/// One month of a projection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRow {
    pub month: YearMonth,
    pub depreciation: Decimal,
    pub accumulated: Decimal,
    pub book_value: Decimal,
    /// Covered by a committed run
    pub realized: bool,
}

/// Derive the schedule for resolved cost figures
pub fn derive_schedule(valuation: &Valuation, rule: StartRule) -> Result<Schedule, RunError> {
    let months = valuation.useful_life_months;
    if months <= 0 {
        return Err(RunError::UndefinedUsefulLife);
    }
    if months > MAX_USEFUL_LIFE_MONTHS {
        return Err(RunError::UsefulLifeOutOfRange { months, max: MAX_USEFUL_LIFE_MONTHS });
    }
    if !valuation.depreciable_base.is_positive() {
        return Err(RunError::ZeroDepreciableBase);
    }
    let in_service = valuation.in_service_date.ok_or(RunError::MissingInServiceDate)?;

    let monthly_quota = valuation
        .depreciable_base
        .checked_div(&Decimal::from_i64(months))
        .map_err(|_| RunError::UndefinedUsefulLife)?;
    let start_month = rule.start_month(in_service);
    let end_month = start_month
        .checked_add_months(months)
        .ok_or(RunError::UsefulLifeOutOfRange { months, max: MAX_USEFUL_LIFE_MONTHS })?;

    Ok(Schedule {
        asset_value: valuation.asset_value.clone(),
        depreciable_base: valuation.depreciable_base.clone(),
        useful_life_months: months,
        monthly_quota,
        start_month,
        end_month,
    })
}

/// Resolve an asset against a snapshot and derive its schedule
pub fn schedule_for(
    snapshot: &Snapshot,
    asset: &Asset,
    basis: ValuationBasis,
    rule: StartRule,
) -> Result<Schedule, RunError> {
    derive_schedule(&snapshot.valuation(asset, basis), rule)
}

impl Schedule {
    /// Last month that still depreciates
    pub fn last_month(&self) -> YearMonth {
        self.end_month.add_months(-1)
    }

    pub fn is_active(&self, month: YearMonth) -> bool {
        self.start_month <= month && month < self.end_month
    }

    pub fn phase(&self, month: YearMonth) -> SchedulePhase {
        if month < self.start_month {
            SchedulePhase::NotStarted
        } else if month < self.end_month {
            SchedulePhase::InProgress
        } else {
            SchedulePhase::Completed
        }
    }

    /// Periods that should have elapsed by `month`, counting `month` itself
    pub fn months_elapsed(&self, month: YearMonth) -> i64 {
        self.start_month.months_until(&month) + 1
    }

    /// Straight-line total after every month up to and including `month`
    ///
    /// Reaches `depreciable_base` exactly on the last month.
    pub fn accumulated_through(&self, month: YearMonth) -> Decimal {
        let periods = self.months_elapsed(month).clamp(0, self.useful_life_months);
        if periods >= self.useful_life_months {
            self.depreciable_base.clone()
        } else {
            self.monthly_quota.mul_int(periods)
        }
    }

    /// Month-by-month projection over the whole useful life
    pub fn projection(&self) -> Vec<ScheduleRow> {
        (0..self.useful_life_months)
            .map(|i| {
                let month = self.start_month.add_months(i);
                let accumulated = self.accumulated_through(month);
                ScheduleRow {
                    month,
                    depreciation: self.monthly_quota.clone(),
                    book_value: self.asset_value.sub(&accumulated),
                    accumulated,
                    realized: false,
                }
            })
            .collect()
    }
}

/// Schedule of one asset with the months already covered by runs marked
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetSchedule {
    pub asset_id: String,
    pub asset_name: String,
    pub basis: ValuationBasis,
    pub schedule: Schedule,
    pub last_run_month: Option<YearMonth>,
    pub accumulated_depreciation: Decimal,
    pub rows: Vec<ScheduleRow>,
}

/// Default-rule schedule of one asset, realized rows marked
pub fn asset_schedule(
    snapshot: &Snapshot,
    asset: &Asset,
    basis: ValuationBasis,
) -> Result<AssetSchedule, RunError> {
    let schedule = schedule_for(snapshot, asset, basis, StartRule::MonthAfter)?;
    let last_run_month = asset.last_run_month();
    let rows = schedule
        .projection()
        .into_iter()
        .map(|mut row| {
            row.realized = last_run_month.is_some_and(|last| row.month <= last);
            row
        })
        .collect();

    Ok(AssetSchedule {
        asset_id: asset.id.clone(),
        asset_name: asset.name.clone(),
        basis,
        schedule,
        last_run_month,
        accumulated_depreciation: asset.accumulated_depreciation.clone(),
        rows,
    })
}
