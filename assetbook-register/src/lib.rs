//! Assetbook Register
//!
//! The asset register as the depreciation engine sees it:
//! - `model`: asset, class and expense records
//! - `Snapshot`: consistent view plus the value/useful-life resolution rules
//! - `AssetSource` / `PersistenceSink`: the seams the engine reads and writes through
//! - `AssetRegister`: in-memory implementation, optionally persisted to a JSON file

mod model;
mod snapshot;
mod traits;
mod register;

pub use model::{
    Asset, AssetClass, AssetId, DepreciationStatus, Expense, LifecycleStatus, RegisterData,
    ValuationBasis,
};
pub use snapshot::{Snapshot, Valuation};
pub use traits::{
    AssetSource, AssetWrite, PersistenceSink, RegisterEvent, Subscriber, SubscriptionId, WriteBatch,
};
pub use register::AssetRegister;
