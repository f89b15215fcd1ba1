//! Batch application of a confirmed preview

use crate::helpers::{clamp_to_base, exceeds_epsilon};
use crate::schedule::Schedule;
use crate::selector::{Outcome, RunPreview};
use assetbook_core::{AssetbookError, Decimal, YearMonth};
use assetbook_register::{AssetWrite, PersistenceSink, WriteBatch};
use serde::Serialize;
use tracing::{info, warn};

/// A run advances each asset by exactly one month
const PERIODS_PER_RUN: i64 = 1;

/// Accumulated depreciation an asset should hold after running `target`
///
/// A rerun of the same month recomputes the straight-line total from the
/// start month instead of adding, so repeating a run never double counts.
pub(crate) fn project_accumulated(
    schedule: &Schedule,
    current: &Decimal,
    target: YearMonth,
    recalculation: bool,
) -> Decimal {
    let next = if recalculation && schedule.months_elapsed(target) > 0 {
        schedule.accumulated_through(target)
    } else {
        current.add(&schedule.monthly_quota.mul_int(PERIODS_PER_RUN))
    };
    let next = clamp_to_base(next, &schedule.depreciable_base);
    // The final scheduled month absorbs any division residue
    if target >= schedule.last_month() && !exceeds_epsilon(&next, &schedule.depreciable_base) {
        schedule.depreciable_base.clone()
    } else {
        next
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedAsset {
    pub asset_id: String,
    pub code: String,
    pub reason: String,
}

/// What a committed run did
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub target_month: YearMonth,
    pub updated: Vec<String>,
    /// Eligible, but the change was within epsilon
    pub unchanged: Vec<String>,
    pub skipped: Vec<SkippedAsset>,
}

/// Split a preview into the write batch and the report for everything else
pub fn plan_run(preview: &RunPreview) -> (WriteBatch, RunReport) {
    let mut batch = WriteBatch::new();
    let mut report = RunReport {
        target_month: preview.target_month,
        updated: Vec::new(),
        unchanged: Vec::new(),
        skipped: Vec::new(),
    };
    let stamp = preview.target_month.last_day();

    for entry in &preview.entries {
        match &entry.outcome {
            Outcome::Error(err) => report.skipped.push(SkippedAsset {
                asset_id: entry.asset_id.clone(),
                code: err.code().to_string(),
                reason: err.to_string(),
            }),
            Outcome::Ready | Outcome::Recalculation if entry.will_write => batch.push(AssetWrite {
                asset_id: entry.asset_id.clone(),
                expected_version: entry.expected_version,
                accumulated_depreciation: entry.projected_accumulated.clone(),
                last_depreciation_date: stamp,
            }),
            Outcome::Ready | Outcome::Recalculation => report.unchanged.push(entry.asset_id.clone()),
        }
    }

    (batch, report)
}

/// Commit a preview through the sink as one atomic batch
///
/// Nothing is sent when no entry needs a write. A sink failure fails the
/// whole run and nothing is reported as updated.
pub async fn apply_run<S>(sink: &S, preview: &RunPreview) -> Result<RunReport, AssetbookError>
where
    S: PersistenceSink + ?Sized,
{
    let (batch, mut report) = plan_run(preview);

    if batch.is_empty() {
        info!(
            month = %preview.target_month,
            unchanged = report.unchanged.len(),
            skipped = report.skipped.len(),
            "No asset needed an update"
        );
        return Ok(report);
    }

    let size = batch.len();
    match sink.commit(batch).await {
        Ok(updated) => {
            report.updated = updated;
            info!(
                month = %preview.target_month,
                updated = report.updated.len(),
                unchanged = report.unchanged.len(),
                skipped = report.skipped.len(),
                "Depreciation run committed"
            );
            Ok(report)
        }
        Err(err) => {
            warn!(month = %preview.target_month, assets = size, code = %err.code, "Depreciation run failed");
            Err(err.with_note(format!("run for {} wrote nothing", preview.target_month)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::{select_for_run, RunPolicy};
    use assetbook_core::{codes, CalendarDate};
    use assetbook_register::{
        Asset, AssetId, AssetRegister, AssetSource, DepreciationStatus, Snapshot,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ym(s: &str) -> YearMonth {
        YearMonth::parse(s).unwrap()
    }

    fn forklift(id: &str) -> Asset {
        let mut asset = Asset::new(id, Decimal::from_i64(24000));
        asset.useful_life = Some(Decimal::from_i64(2));
        asset.availability_date = CalendarDate::parse("2024-01-15").ok();
        asset
    }

    /// Sink that counts calls and always fails
    #[derive(Default)]
    struct FailingSink {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PersistenceSink for FailingSink {
        async fn commit(&self, _batch: WriteBatch) -> Result<Vec<AssetId>, AssetbookError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AssetbookError::persistence("disk full"))
        }

        async fn reset(&self, asset_id: &str) -> Result<Asset, AssetbookError> {
            Err(AssetbookError::not_found("Asset", asset_id))
        }

        async fn set_depreciation_status(
            &self,
            asset_id: &str,
            _status: DepreciationStatus,
        ) -> Result<Asset, AssetbookError> {
            Err(AssetbookError::not_found("Asset", asset_id))
        }
    }

    #[test]
    fn test_plan_splits_entries() {
        let mut paused = forklift("P");
        paused.depreciation_status = DepreciationStatus::Paused;
        let mut done = forklift("D");
        done.accumulated_depreciation = Decimal::from_i64(1000);
        done.last_depreciation_date = CalendarDate::parse("2024-02-29").ok();
        let snapshot = Snapshot::default()
            .with_asset(forklift("A"))
            .with_asset(paused)
            .with_asset(done);

        let preview = select_for_run(&snapshot, ym("2024-02"), RunPolicy::default());
        let (batch, report) = plan_run(&preview);

        assert_eq!(batch.asset_ids(), vec!["A".to_string()]);
        let write = batch.iter().next().unwrap();
        assert_eq!(write.last_depreciation_date.to_iso_string(), "2024-02-29");
        assert_eq!(write.accumulated_depreciation, Decimal::from_i64(1000));
        assert_eq!(report.unchanged, vec!["D".to_string()]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].code, "Paused");
    }

    #[test]
    fn test_increment_is_clamped_to_base() {
        let asset = forklift("A");
        let schedule = crate::schedule::schedule_for(
            &Snapshot::default(),
            &asset,
            assetbook_register::ValuationBasis::Fiscal,
            crate::StartRule::MonthAfter,
        )
        .unwrap();
        let nearly_done = Decimal::from_i64(23500);
        let next = project_accumulated(&schedule, &nearly_done, ym("2026-01"), false);
        assert_eq!(next, Decimal::from_i64(24000));
    }

    #[test]
    fn test_final_increment_settles_on_base() {
        let mut asset = forklift("A");
        asset.value = Decimal::from_i64(1000);
        let schedule = crate::schedule::schedule_for(
            &Snapshot::default(),
            &asset,
            assetbook_register::ValuationBasis::Fiscal,
            crate::StartRule::MonthAfter,
        )
        .unwrap();
        // 24 increments of 1000/24 fall short of 1000 by a rounding residue
        let mut current = Decimal::zero();
        let mut month = schedule.start_month;
        for _ in 0..24 {
            current = project_accumulated(&schedule, &current, month, false);
            month = month.add_months(1);
        }
        assert_eq!(current, Decimal::from_i64(1000));
    }

    #[test]
    fn test_tiny_quota_settles_only_in_final_month() {
        let mut asset = forklift("A");
        asset.value = Decimal::from_str("0.12").unwrap();
        let schedule = crate::schedule::schedule_for(
            &Snapshot::default(),
            &asset,
            assetbook_register::ValuationBasis::Fiscal,
            crate::StartRule::MonthAfter,
        )
        .unwrap();
        let quota = schedule.monthly_quota.clone();

        // Within a cent of the base two months early, but not yet due
        let month_22 = schedule.start_month.add_months(21);
        let next = project_accumulated(&schedule, &quota.mul_int(21), month_22, false);
        assert_eq!(next, quota.mul_int(22));
        assert!(next < schedule.depreciable_base);

        let next = project_accumulated(&schedule, &quota.mul_int(23), schedule.last_month(), false);
        assert_eq!(next, schedule.depreciable_base);
    }

    #[tokio::test]
    async fn test_empty_write_set_skips_sink() {
        let mut paused = forklift("P");
        paused.depreciation_status = DepreciationStatus::Paused;
        let snapshot = Snapshot::default().with_asset(paused);
        let preview = select_for_run(&snapshot, ym("2024-02"), RunPolicy::default());

        let sink = FailingSink::default();
        let report = apply_run(&sink, &preview).await.unwrap();
        assert_eq!(sink.calls.load(Ordering::SeqCst), 0);
        assert!(report.updated.is_empty());
        assert_eq!(report.skipped.len(), 1);
    }

    #[tokio::test]
    async fn test_sink_failure_fails_whole_run() {
        let snapshot = Snapshot::default().with_asset(forklift("A")).with_asset(forklift("B"));
        let preview = select_for_run(&snapshot, ym("2024-02"), RunPolicy::default());

        let sink = FailingSink::default();
        let err = apply_run(&sink, &preview).await.unwrap_err();
        assert_eq!(err.code, codes::PERSISTENCE);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_apply_against_register() {
        let register = AssetRegister::new();
        register.upsert_asset(forklift("A")).unwrap();

        let preview = select_for_run(&register.snapshot(), ym("2024-02"), RunPolicy::default());
        let report = apply_run(&register, &preview).await.unwrap();
        assert_eq!(report.updated, vec!["A".to_string()]);

        let stored = register.get("A").unwrap();
        assert_eq!(stored.accumulated_depreciation, Decimal::from_i64(1000));
        assert_eq!(stored.last_run_month(), Some(ym("2024-02")));

        // Committing the same preview again trips the version check
        let err = apply_run(&register, &preview).await.unwrap_err();
        assert_eq!(err.code, codes::CONFLICT);
    }
}
