//! Assetbook - monthly depreciation runs over a fixed-asset register
//!
//! [`Assetbook`] ties an [`AssetSource`] and a [`PersistenceSink`] to the
//! depreciation engine. A run is always two steps: [`Assetbook::preview`]
//! classifies every in-service asset without touching anything, and
//! [`Assetbook::commit`] writes the previewed figures as one batch.

mod settings;

pub use settings::{Settings, CONFIG_ENV, DATA_PATH_ENV, USE_ACQUISITION_MONTH_ENV};

pub use assetbook_core::{codes, AssetbookError, CalendarDate, Decimal, Severity, YearMonth};
pub use assetbook_depreciation::{
    AssetSchedule, ClassPosition, ClassPositions, MonthFigures, Outcome, PreviewEntry, RunError,
    RunPolicy, RunPreview, RunReport, Schedule, ScheduleRow, SkippedAsset, SummaryView,
    YearlySummary,
};
pub use assetbook_register::{
    Asset, AssetClass, AssetRegister, AssetSource, DepreciationStatus, Expense, PersistenceSink,
    RegisterData, Snapshot, ValuationBasis,
};

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Depreciation engine bound to one register
pub struct Assetbook {
    source: Arc<dyn AssetSource>,
    sink: Arc<dyn PersistenceSink>,
    policy: RunPolicy,
    /// Held while a batch is being committed
    run_gate: Mutex<()>,
}

impl Assetbook {
    pub fn new(
        source: Arc<dyn AssetSource>,
        sink: Arc<dyn PersistenceSink>,
        policy: RunPolicy,
    ) -> Self {
        Self { source, sink, policy, run_gate: Mutex::new(()) }
    }

    /// Use one register as both source and sink
    pub fn with_register(register: Arc<AssetRegister>, policy: RunPolicy) -> Self {
        Self::new(register.clone(), register, policy)
    }

    /// Open the register file named by the settings
    pub fn open(settings: &Settings) -> Result<Self, AssetbookError> {
        let register = AssetRegister::open(&settings.data_path)?;
        info!(
            path = %settings.data_path.display(),
            assets = register.len(),
            use_acquisition_month = settings.use_acquisition_month,
            "Register opened"
        );
        Ok(Self::with_register(Arc::new(register), settings.policy()))
    }

    pub fn policy(&self) -> RunPolicy {
        self.policy
    }

    pub fn snapshot(&self) -> Snapshot {
        self.source.snapshot()
    }

    // ========== Runs ==========

    /// Classify every in-service asset for `target_month` with the default policy
    pub fn preview(&self, target_month: YearMonth) -> RunPreview {
        self.preview_with(target_month, self.policy)
    }

    pub fn preview_with(&self, target_month: YearMonth, policy: RunPolicy) -> RunPreview {
        assetbook_depreciation::select_for_run(&self.source.snapshot(), target_month, policy)
    }

    /// Write a confirmed preview
    ///
    /// Nothing is re-read: each write carries the asset version the preview
    /// saw, so an asset edited in between (including its class or linked
    /// expenses) fails the whole batch with `CONFLICT`. A second concurrent
    /// commit waits for the first.
    pub async fn commit(&self, preview: &RunPreview) -> Result<RunReport, AssetbookError> {
        let _gate = self.run_gate.lock().await;
        assetbook_depreciation::apply_run(self.sink.as_ref(), preview).await
    }

    /// Like [`Assetbook::commit`], but fails with `RUN_IN_PROGRESS` instead of waiting
    pub async fn try_commit(&self, preview: &RunPreview) -> Result<RunReport, AssetbookError> {
        let _gate = self.run_gate.try_lock().map_err(|_| AssetbookError::run_in_progress())?;
        assetbook_depreciation::apply_run(self.sink.as_ref(), preview).await
    }

    /// Preview and commit in one step
    pub async fn run(&self, target_month: YearMonth) -> Result<RunReport, AssetbookError> {
        let _gate = self.run_gate.lock().await;
        let preview = self.preview(target_month);
        assetbook_depreciation::apply_run(self.sink.as_ref(), &preview).await
    }

    // ========== Single-asset commands ==========

    /// Clear accumulated depreciation and the last run date
    pub async fn reset(&self, asset_id: &str) -> Result<Asset, AssetbookError> {
        self.sink.reset(asset_id).await
    }

    pub async fn pause(&self, asset_id: &str) -> Result<Asset, AssetbookError> {
        self.sink.set_depreciation_status(asset_id, DepreciationStatus::Paused).await
    }

    pub async fn resume(&self, asset_id: &str) -> Result<Asset, AssetbookError> {
        self.sink.set_depreciation_status(asset_id, DepreciationStatus::Active).await
    }

    // ========== Reports ==========

    pub fn schedule(&self, asset_id: &str, basis: ValuationBasis) -> Result<AssetSchedule, AssetbookError> {
        let snapshot = self.source.snapshot();
        let asset = snapshot
            .asset(asset_id)
            .ok_or_else(|| AssetbookError::not_found("Asset", asset_id))?;
        assetbook_depreciation::asset_schedule(&snapshot, asset, basis)
            .map_err(|err| run_error(asset_id, &err))
    }

    pub fn yearly_summary(
        &self,
        year: i32,
        basis: ValuationBasis,
        view: SummaryView,
    ) -> Result<YearlySummary, AssetbookError> {
        assetbook_depreciation::yearly_summary(&self.source.snapshot(), year, basis, view)
    }

    pub fn class_positions(&self, basis: ValuationBasis, reference_month: YearMonth) -> ClassPositions {
        assetbook_depreciation::class_positions(&self.source.snapshot(), basis, reference_month)
    }
}

fn run_error(asset_id: &str, err: &RunError) -> AssetbookError {
    let suggestion = match err {
        RunError::UndefinedUsefulLife => "Set a useful life on the asset or its class",
        RunError::UsefulLifeOutOfRange { .. } => "Useful life is entered in years; check the value",
        RunError::ZeroDepreciableBase => "Check the asset value and residual value",
        RunError::MissingInServiceDate => "Set an availability or start date",
        _ => "Check the asset record",
    };
    AssetbookError::domain_error(err.to_string())
        .for_asset(asset_id)
        .with_note(err.code())
        .with_suggestion(suggestion)
}
