//! In-memory asset register, optionally backed by a JSON file

use crate::model::{Asset, AssetClass, AssetId, DepreciationStatus, Expense, RegisterData};
use crate::snapshot::Snapshot;
use crate::traits::{AssetSource, PersistenceSink, RegisterEvent, Subscriber, SubscriptionId, WriteBatch};
use assetbook_core::AssetbookError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock, RwLockWriteGuard};
use tracing::{debug, info, warn};

fn class_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Register state: assets in insertion order plus an id index
#[derive(Debug, Default)]
struct State {
    assets: Vec<Asset>,
    index: HashMap<AssetId, usize>,
    classes: Vec<AssetClass>,
    expenses: Vec<Expense>,
}

impl State {
    fn from_data(data: RegisterData) -> Self {
        let mut state = Self {
            classes: data.asset_classes,
            expenses: data.expenses,
            ..Self::default()
        };
        for asset in data.assets {
            state.upsert(asset);
        }
        state
    }

    fn to_data(&self) -> RegisterData {
        RegisterData {
            assets: self.assets.clone(),
            asset_classes: self.classes.clone(),
            expenses: self.expenses.clone(),
        }
    }

    fn get(&self, id: &str) -> Option<&Asset> {
        self.index.get(id).map(|&i| &self.assets[i])
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Asset> {
        match self.index.get(id) {
            Some(&i) => self.assets.get_mut(i),
            None => None,
        }
    }

    fn upsert(&mut self, asset: Asset) {
        match self.index.get(&asset.id) {
            Some(&i) => self.assets[i] = asset,
            None => {
                self.index.insert(asset.id.clone(), self.assets.len());
                self.assets.push(asset);
            }
        }
    }

    /// Bump the version of every listed asset that exists
    fn touch(&mut self, ids: &[AssetId]) {
        for id in ids {
            if let Some(asset) = self.get_mut(id) {
                asset.version += 1;
            }
        }
    }

    /// Assets whose class name matches `name`, trimmed and case-insensitive
    fn members_of(&self, name: &str) -> Vec<AssetId> {
        let key = class_key(name);
        self.assets
            .iter()
            .filter(|a| a.asset_class.as_deref().map(class_key).as_deref() == Some(key.as_str()))
            .map(|a| a.id.clone())
            .collect()
    }

    fn remove(&mut self, id: &str) -> Option<Asset> {
        let pos = self.index.remove(id)?;
        let removed = self.assets.remove(pos);
        for (i, asset) in self.assets.iter().enumerate().skip(pos) {
            self.index.insert(asset.id.clone(), i);
        }
        Some(removed)
    }
}

/// Asset register implementing both repository seams
///
/// Mutations go through a single write lock. When a backing file is set,
/// each mutation is persisted before the lock is released and rolled back
/// in memory if persisting fails.
///
/// Every edit that can change an asset's computed figures bumps that
/// asset's version, so a preview computed before the edit fails to commit.
///
/// File writes are synchronous, including the one inside the async
/// [`PersistenceSink::commit`]: the register file is one small JSON
/// document. Stores with slow writes need their own sink.
pub struct AssetRegister {
    state: RwLock<State>,
    path: Option<PathBuf>,
    subscribers: Mutex<Vec<(SubscriptionId, Subscriber)>>,
    next_subscription: AtomicU64,
}

impl Default for AssetRegister {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetRegister {
    /// Empty register, memory only
    pub fn new() -> Self {
        Self::from_data(RegisterData::default())
    }

    pub fn from_data(data: RegisterData) -> Self {
        Self {
            state: RwLock::new(State::from_data(data)),
            path: None,
            subscribers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
        }
    }

    /// Load a register file; a missing file gives an empty register
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AssetbookError> {
        let path = path.as_ref().to_path_buf();
        let data = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| AssetbookError::io(format!("{}: {}", path.display(), e)))?;
            serde_json::from_str::<RegisterData>(&raw).map_err(|e| {
                AssetbookError::parse_error(format!("{}: {}", path.display(), e))
                    .with_suggestion("The register file must hold {\"assets\", \"assetClasses\", \"expenses\"}")
            })?
        } else {
            info!(path = %path.display(), "Register file not found, starting empty");
            RegisterData::default()
        };

        info!(
            path = %path.display(),
            assets = data.assets.len(),
            classes = data.asset_classes.len(),
            "Loaded asset register"
        );

        let mut register = Self::from_data(data);
        register.path = Some(path);
        Ok(register)
    }

    pub fn get(&self, id: &str) -> Option<Asset> {
        self.read_state().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read_state().assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert an asset record as-is, or replace one and bump its version
    pub fn upsert_asset(&self, mut asset: Asset) -> Result<(), AssetbookError> {
        let id = asset.id.clone();
        self.mutate(|state| {
            if let Some(existing) = state.get(&asset.id) {
                asset.version = existing.version + 1;
            }
            state.upsert(asset);
            Ok(())
        })?;
        self.notify(&RegisterEvent::AssetsUpdated { asset_ids: vec![id] });
        Ok(())
    }

    pub fn remove_asset(&self, id: &str) -> Result<Asset, AssetbookError> {
        let removed = self.mutate(|state| {
            state.remove(id).ok_or_else(|| AssetbookError::not_found("Asset", id))
        })?;
        self.notify(&RegisterEvent::AssetsUpdated { asset_ids: vec![id.to_string()] });
        Ok(removed)
    }

    /// Insert or replace a class; every asset in it gets a new version
    pub fn upsert_class(&self, class: AssetClass) -> Result<(), AssetbookError> {
        let members = self.mutate(|state| {
            let key = class_key(&class.name);
            let members = state.members_of(&class.name);
            match state.classes.iter_mut().find(|c| class_key(&c.name) == key) {
                Some(existing) => *existing = class,
                None => state.classes.push(class),
            }
            state.touch(&members);
            Ok(members)
        })?;
        if !members.is_empty() {
            self.notify(&RegisterEvent::AssetsUpdated { asset_ids: members });
        }
        Ok(())
    }

    /// Link an expense; the asset's value changes, so its version moves
    pub fn add_expense(&self, expense: Expense) -> Result<(), AssetbookError> {
        let asset_ids = vec![expense.asset_id.clone()];
        self.mutate(|state| {
            state.expenses.push(expense);
            state.touch(&asset_ids);
            Ok(())
        })?;
        self.notify(&RegisterEvent::AssetsUpdated { asset_ids });
        Ok(())
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `change` under the write lock and persist; on failure the
    /// previous state is put back
    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut State) -> Result<T, AssetbookError>,
    ) -> Result<T, AssetbookError> {
        let mut state = self.write_state();
        let before = match self.path {
            Some(_) => Some(state.to_data()),
            None => None,
        };
        let out = change(&mut state)?;
        if let Err(err) = self.persist(&state) {
            if let Some(before) = before {
                *state = State::from_data(before);
            }
            return Err(err);
        }
        Ok(out)
    }

    /// Write the register file via a sibling temp file and rename
    fn persist(&self, state: &State) -> Result<(), AssetbookError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };

        let json = serde_json::to_string_pretty(&state.to_data())
            .map_err(|e| AssetbookError::persistence(e.to_string()))?;

        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let result = std::fs::write(&tmp, json).and_then(|_| std::fs::rename(&tmp, path));
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "Failed to persist register");
            let _ = std::fs::remove_file(&tmp);
            return Err(AssetbookError::persistence(format!("{}: {}", path.display(), e)));
        }
        debug!(path = %path.display(), "Register persisted");
        Ok(())
    }

    fn notify(&self, event: &RegisterEvent) {
        let subscribers: Vec<Subscriber> = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(_, s)| s.clone())
            .collect();
        for subscriber in subscribers {
            subscriber(event);
        }
    }

    /// Apply one asset-level change under the lock, bumping its version
    fn update_asset(
        &self,
        asset_id: &str,
        change: impl FnOnce(&mut Asset),
    ) -> Result<Asset, AssetbookError> {
        self.mutate(|state| {
            let asset = state
                .get_mut(asset_id)
                .ok_or_else(|| AssetbookError::not_found("Asset", asset_id))?;
            change(asset);
            asset.version += 1;
            Ok(asset.clone())
        })
    }
}

impl AssetSource for AssetRegister {
    fn snapshot(&self) -> Snapshot {
        let state = self.read_state();
        Snapshot::new(state.assets.clone(), state.classes.clone(), &state.expenses)
    }

    fn subscribe(&self, subscriber: Subscriber) -> SubscriptionId {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((id, subscriber));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }
}

#[async_trait]
impl PersistenceSink for AssetRegister {
    async fn commit(&self, batch: WriteBatch) -> Result<Vec<AssetId>, AssetbookError> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let ids = self.mutate(|state| {
            // Validate everything before touching anything
            let mut seen = HashSet::new();
            for write in batch.iter() {
                if !seen.insert(write.asset_id.as_str()) {
                    return Err(AssetbookError::internal(format!(
                        "asset {} appears twice in one batch",
                        write.asset_id
                    )));
                }
                let current = state
                    .get(&write.asset_id)
                    .ok_or_else(|| AssetbookError::conflict(&write.asset_id, "asset no longer exists"))?;
                if current.version != write.expected_version {
                    return Err(AssetbookError::conflict(
                        &write.asset_id,
                        format!("version {} expected, found {}", write.expected_version, current.version),
                    ));
                }
                if current.is_paused() {
                    return Err(AssetbookError::conflict(&write.asset_id, "asset was paused"));
                }
            }

            for write in batch.iter() {
                if let Some(asset) = state.get_mut(&write.asset_id) {
                    asset.accumulated_depreciation = write.accumulated_depreciation.clone();
                    asset.last_depreciation_date = Some(write.last_depreciation_date);
                    asset.version += 1;
                }
            }
            Ok(batch.asset_ids())
        });

        match ids {
            Ok(ids) => {
                info!(assets = ids.len(), "Committed depreciation batch");
                self.notify(&RegisterEvent::AssetsUpdated { asset_ids: ids.clone() });
                Ok(ids)
            }
            Err(err) => {
                warn!(code = %err.code, error = %err.message, "Depreciation batch rejected");
                Err(err)
            }
        }
    }

    async fn reset(&self, asset_id: &str) -> Result<Asset, AssetbookError> {
        let asset = self.update_asset(asset_id, |asset| {
            asset.accumulated_depreciation = assetbook_core::Decimal::zero();
            asset.last_depreciation_date = None;
        })?;
        info!(asset_id, "Depreciation reset");
        self.notify(&RegisterEvent::AssetReset { asset_id: asset_id.to_string() });
        Ok(asset)
    }

    async fn set_depreciation_status(
        &self,
        asset_id: &str,
        status: DepreciationStatus,
    ) -> Result<Asset, AssetbookError> {
        let asset = self.update_asset(asset_id, |asset| {
            asset.depreciation_status = status;
        })?;
        info!(asset_id, ?status, "Depreciation status changed");
        self.notify(&RegisterEvent::StatusChanged { asset_id: asset_id.to_string(), status });
        Ok(asset)
    }
}
