//! Realized vs planned reporting
//!
//! Both reports read schedules through [`schedule_for`] with the month-after
//! rule, the same math the runs use.

use crate::schedule::{schedule_for, StartRule};
use assetbook_core::{AssetbookError, CalendarDate, Decimal, YearMonth};
use assetbook_register::{Asset, Snapshot, ValuationBasis};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const UNCLASSIFIED: &str = "Unclassified";
pub const CONSTRUCTION_IN_PROGRESS: &str = "Construction in progress";

/// Whether yearly figures show only what runs realized or the full plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryView {
    #[default]
    Realized,
    Projected,
}

impl SummaryView {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "realized" => Some(Self::Realized),
            "projected" => Some(Self::Projected),
            _ => None,
        }
    }
}

/// Group label: the declared class name when the asset's class resolves
fn class_label(snapshot: &Snapshot, asset: &Asset) -> String {
    if let Some(class) = snapshot.class_of(asset) {
        return class.name.clone();
    }
    match asset.asset_class.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => UNCLASSIFIED.to_string(),
    }
}

// ============================================================================
// Yearly summary
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthFigures {
    /// Quota when the month is inside the schedule
    pub planned: Decimal,
    /// Planned and covered by a committed run
    pub realized: Decimal,
    /// What the selected view displays
    pub shown: Decimal,
}

impl MonthFigures {
    fn accumulate(&mut self, other: &MonthFigures) {
        self.planned = self.planned.add(&other.planned);
        self.realized = self.realized.add(&other.realized);
        self.shown = self.shown.add(&other.shown);
    }
}

fn empty_year() -> Vec<MonthFigures> {
    vec![MonthFigures::default(); 12]
}

fn year_total(months: &[MonthFigures]) -> MonthFigures {
    let mut total = MonthFigures::default();
    for month in months {
        total.accumulate(month);
    }
    total
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetYear {
    pub asset_id: String,
    pub asset_name: String,
    pub months: Vec<MonthFigures>,
    pub total: MonthFigures,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassYear {
    pub class_name: String,
    pub assets: Vec<AssetYear>,
    pub months: Vec<MonthFigures>,
    pub total: MonthFigures,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlySummary {
    pub year: i32,
    pub basis: ValuationBasis,
    pub view: SummaryView,
    pub classes: Vec<ClassYear>,
    pub months: Vec<MonthFigures>,
    pub total: MonthFigures,
}

/// Twelve months of one asset
///
/// Paused assets and assets without a derivable schedule are all zeros.
pub fn asset_year(
    snapshot: &Snapshot,
    asset: &Asset,
    january: YearMonth,
    basis: ValuationBasis,
    view: SummaryView,
) -> AssetYear {
    let mut months = empty_year();
    let schedule = if asset.is_paused() {
        None
    } else {
        schedule_for(snapshot, asset, basis, StartRule::MonthAfter).ok()
    };

    if let Some(schedule) = schedule {
        let last_run = asset.last_run_month();
        for (i, figures) in months.iter_mut().enumerate() {
            let month = january.add_months(i as i64);
            if !schedule.is_active(month) {
                continue;
            }
            let realized = last_run.is_some_and(|last| month <= last);
            figures.planned = schedule.monthly_quota.clone();
            if realized {
                figures.realized = schedule.monthly_quota.clone();
            }
            if realized || view == SummaryView::Projected {
                figures.shown = schedule.monthly_quota.clone();
            }
        }
    }

    let total = year_total(&months);
    AssetYear { asset_id: asset.id.clone(), asset_name: asset.name.clone(), months, total }
}

/// Month-by-month depreciation for a calendar year, grouped by class
///
/// Every declared class is listed, in declaration order, even when empty.
/// Classes only referenced by assets follow in first-seen order.
pub fn yearly_summary(
    snapshot: &Snapshot,
    year: i32,
    basis: ValuationBasis,
    view: SummaryView,
) -> Result<YearlySummary, AssetbookError> {
    let january = YearMonth::new(year, 1)?;

    let mut classes: Vec<ClassYear> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut group = |name: String, classes: &mut Vec<ClassYear>| -> usize {
        *index.entry(name.clone()).or_insert_with(|| {
            classes.push(ClassYear {
                class_name: name,
                assets: Vec::new(),
                months: empty_year(),
                total: MonthFigures::default(),
            });
            classes.len() - 1
        })
    };

    for class in snapshot.classes() {
        if !class.name.trim().is_empty() {
            group(class.name.clone(), &mut classes);
        }
    }

    for asset in snapshot.assets() {
        let row = asset_year(snapshot, asset, january, basis, view);
        let slot = group(class_label(snapshot, asset), &mut classes);
        let class = &mut classes[slot];
        for (sum, month) in class.months.iter_mut().zip(&row.months) {
            sum.accumulate(month);
        }
        class.total.accumulate(&row.total);
        class.assets.push(row);
    }

    let mut months = empty_year();
    for class in &classes {
        for (sum, month) in months.iter_mut().zip(&class.months) {
            sum.accumulate(month);
        }
    }
    let total = year_total(&months);

    Ok(YearlySummary { year, basis, view, classes, months, total })
}

// ============================================================================
// Class positions
// ============================================================================

/// Balance of one class (or the grand total) as of a reference month
///
/// Cost moves over the reference year as
/// `cost = opening_cost + additions + transfers - write_offs`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassPosition {
    pub class_name: String,
    /// Assets still held
    pub asset_count: usize,
    /// Cost of assets acquired before the reference year
    pub opening_cost: Decimal,
    /// Cost of assets acquired within the reference year
    pub additions: Decimal,
    /// Out of construction in progress (negative) and into the class (positive)
    pub transfers: Decimal,
    /// Cost of assets written off within the reference year
    pub write_offs: Decimal,
    /// Closing cost: asset values including linked expenses
    pub cost: Decimal,
    pub accumulated: Decimal,
    /// Accumulated before the period month
    pub opening: Decimal,
    /// Depreciation of the period month itself
    pub period: Decimal,
    pub net_value: Decimal,
}

impl ClassPosition {
    fn empty(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            asset_count: 0,
            opening_cost: Decimal::zero(),
            additions: Decimal::zero(),
            transfers: Decimal::zero(),
            write_offs: Decimal::zero(),
            cost: Decimal::zero(),
            accumulated: Decimal::zero(),
            opening: Decimal::zero(),
            period: Decimal::zero(),
            net_value: Decimal::zero(),
        }
    }

    fn absorb(&mut self, other: &ClassPosition) {
        self.asset_count += other.asset_count;
        self.opening_cost = self.opening_cost.add(&other.opening_cost);
        self.additions = self.additions.add(&other.additions);
        self.transfers = self.transfers.add(&other.transfers);
        self.write_offs = self.write_offs.add(&other.write_offs);
        self.cost = self.cost.add(&other.cost);
        self.accumulated = self.accumulated.add(&other.accumulated);
        self.opening = self.opening.add(&other.opening);
        self.period = self.period.add(&other.period);
        self.net_value = self.net_value.add(&other.net_value);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassPositions {
    pub basis: ValuationBasis,
    pub reference_month: YearMonth,
    /// Largest cost first
    pub classes: Vec<ClassPosition>,
    pub total: ClassPosition,
}

/// Accumulated depreciation of one asset split into opening and period
///
/// With a committed run, the total is recomputed from the schedule through
/// the last run month (capped at the schedule's last month). The period is
/// the single quota of the reference month, or of the last run month when
/// runs have not reached the reference month yet. Without a usable schedule
/// or run, the stored value is kept and lands in the period only when the
/// asset started depreciating within the reference year.
pub fn asset_position(
    snapshot: &Snapshot,
    asset: &Asset,
    basis: ValuationBasis,
    reference_month: YearMonth,
) -> ClassPosition {
    let cost = snapshot.asset_value(asset);
    let stored = asset.accumulated_depreciation.clone();
    let schedule = if asset.is_paused() {
        None
    } else {
        schedule_for(snapshot, asset, basis, StartRule::MonthAfter).ok()
    };

    let recomputed = match (&schedule, asset.last_run_month()) {
        (Some(schedule), Some(last_run)) => {
            let effective_end = last_run.min(schedule.last_month());
            (effective_end >= schedule.start_month).then(|| {
                let accumulated = schedule.accumulated_through(effective_end);
                let period_month = last_run.min(reference_month);
                let period = if schedule.start_month <= period_month && period_month <= effective_end {
                    schedule.monthly_quota.min_of(&accumulated)
                } else {
                    Decimal::zero()
                };
                (accumulated.sub(&period), period, accumulated)
            })
        }
        _ => None,
    };

    let (opening, period, accumulated) = recomputed.unwrap_or_else(|| {
        let start_of_year = YearMonth::new(reference_month.year(), 1).unwrap_or(reference_month);
        let started_this_year = asset
            .in_service_date()
            .map(|date| StartRule::MonthAfter.start_month(date) >= start_of_year)
            .unwrap_or(false);
        if started_this_year && asset.last_depreciation_date.is_none() {
            (Decimal::zero(), stored.clone(), stored.clone())
        } else {
            (stored.clone(), Decimal::zero(), stored.clone())
        }
    });

    let group = if asset.status.is_under_construction() {
        CONSTRUCTION_IN_PROGRESS.to_string()
    } else {
        class_label(snapshot, asset)
    };

    ClassPosition {
        class_name: group,
        asset_count: 1,
        opening_cost: Decimal::zero(),
        additions: Decimal::zero(),
        transfers: Decimal::zero(),
        write_offs: Decimal::zero(),
        net_value: cost.sub(&accumulated),
        cost,
        accumulated,
        opening,
        period,
    }
}

/// Every row one asset contributes to the class report
///
/// Usually one row for the asset's group. An asset that entered service
/// within the reference year also leaves a construction-in-progress row
/// whose cost is transferred out. An asset written off before the year is
/// not held and contributes nothing; one written off within the year shows
/// only its cost movement.
pub fn asset_positions(
    snapshot: &Snapshot,
    asset: &Asset,
    basis: ValuationBasis,
    reference_month: YearMonth,
) -> Vec<ClassPosition> {
    let year_start = YearMonth::new(reference_month.year(), 1).unwrap_or(reference_month);
    let within_year = |date: Option<CalendarDate>| {
        date.map(YearMonth::of).is_some_and(|m| year_start <= m && m <= reference_month)
    };

    let written_off = asset.is_written_off()
        && asset.write_off_date.map_or(true, |date| YearMonth::of(date) <= reference_month);
    if written_off && !within_year(asset.write_off_date) {
        return Vec::new();
    }

    let mut home = asset_position(snapshot, asset, basis, reference_month);
    let cost = home.cost.clone();
    let acquired_earlier = asset
        .acquisition_date()
        .is_some_and(|date| YearMonth::of(date) < year_start);
    let (opening_cost, additions) = if acquired_earlier {
        (cost.clone(), Decimal::zero())
    } else {
        (Decimal::zero(), cost.clone())
    };

    let mut rows = Vec::with_capacity(2);
    if asset.is_in_service() && within_year(asset.availability_date) {
        let mut construction = ClassPosition::empty(CONSTRUCTION_IN_PROGRESS);
        construction.opening_cost = opening_cost;
        construction.additions = additions;
        construction.transfers = cost.neg();
        home.transfers = cost;
        rows.push(construction);
    } else {
        home.opening_cost = opening_cost;
        home.additions = additions;
    }

    if written_off {
        home.write_offs = home.opening_cost.add(&home.additions);
        home.asset_count = 0;
        home.cost = Decimal::zero();
        home.accumulated = Decimal::zero();
        home.opening = Decimal::zero();
        home.period = Decimal::zero();
        home.net_value = Decimal::zero();
    }

    rows.push(home);
    rows
}

/// Cost movement, accumulated depreciation and net value per class
pub fn class_positions(
    snapshot: &Snapshot,
    basis: ValuationBasis,
    reference_month: YearMonth,
) -> ClassPositions {
    let mut classes: Vec<ClassPosition> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for asset in snapshot.assets() {
        for position in asset_positions(snapshot, asset, basis, reference_month) {
            let slot = *index.entry(position.class_name.clone()).or_insert_with(|| {
                classes.push(ClassPosition::empty(position.class_name.clone()));
                classes.len() - 1
            });
            classes[slot].absorb(&position);
        }
    }

    classes.sort_by(|a, b| b.cost.cmp(&a.cost).then_with(|| a.class_name.cmp(&b.class_name)));

    let mut total = ClassPosition::empty("Total");
    for class in &classes {
        total.absorb(class);
    }

    ClassPositions { basis, reference_month, classes, total }
}
