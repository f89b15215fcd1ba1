//! Repository seams between the depreciation engine and the register

use crate::model::{Asset, AssetId, DepreciationStatus};
use crate::snapshot::Snapshot;
use assetbook_core::{AssetbookError, CalendarDate, Decimal};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Handle returned by [`AssetSource::subscribe`]
pub type SubscriptionId = u64;

/// Change-notification callback
pub type Subscriber = Arc<dyn Fn(&RegisterEvent) + Send + Sync>;

/// Something changed in the register
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RegisterEvent {
    #[serde(rename_all = "camelCase")]
    AssetsUpdated { asset_ids: Vec<AssetId> },
    #[serde(rename_all = "camelCase")]
    AssetReset { asset_id: AssetId },
    #[serde(rename_all = "camelCase")]
    StatusChanged { asset_id: AssetId, status: DepreciationStatus },
}

/// Read side: consistent snapshots plus change notifications
pub trait AssetSource: Send + Sync {
    /// Assets, classes and expense totals as of one instant
    fn snapshot(&self) -> Snapshot;

    fn subscribe(&self, subscriber: Subscriber) -> SubscriptionId;

    /// Returns false when the id was unknown
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

/// One asset's new depreciation state, guarded by the version it was computed from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetWrite {
    pub asset_id: AssetId,
    pub expected_version: u64,
    pub accumulated_depreciation: Decimal,
    pub last_depreciation_date: CalendarDate,
}

/// All writes of one run. Committed entirely or not at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    writes: Vec<AssetWrite>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, write: AssetWrite) {
        self.writes.push(write);
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetWrite> {
        self.writes.iter()
    }

    pub fn asset_ids(&self) -> Vec<AssetId> {
        self.writes.iter().map(|w| w.asset_id.clone()).collect()
    }
}

impl FromIterator<AssetWrite> for WriteBatch {
    fn from_iter<I: IntoIterator<Item = AssetWrite>>(iter: I) -> Self {
        Self { writes: iter.into_iter().collect() }
    }
}

impl IntoIterator for WriteBatch {
    type Item = AssetWrite;
    type IntoIter = std::vec::IntoIter<AssetWrite>;

    fn into_iter(self) -> Self::IntoIter {
        self.writes.into_iter()
    }
}

/// Write side of the register
///
/// Every method either applies its whole change or returns an error with
/// nothing changed.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// Apply a batch atomically
    ///
    /// Fails with `CONFLICT` when any target asset moved past its expected
    /// version, was removed, or was paused after the batch was computed.
    async fn commit(&self, batch: WriteBatch) -> Result<Vec<AssetId>, AssetbookError>;

    /// Zero the accumulated depreciation and clear the last run date
    async fn reset(&self, asset_id: &str) -> Result<Asset, AssetbookError>;

    async fn set_depreciation_status(
        &self,
        asset_id: &str,
        status: DepreciationStatus,
    ) -> Result<Asset, AssetbookError>;
}
