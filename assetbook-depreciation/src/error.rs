//! Per-asset classification errors
//!
//! These never abort a run. They keep one asset out of the write set and
//! are shown to the operator in the preview.

use assetbook_core::YearMonth;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    #[error("Depreciation is paused for this asset")]
    Paused,

    #[error("No useful life is set on the asset or its class")]
    UndefinedUsefulLife,

    #[error("Useful life of {months} months exceeds the {max}-month limit")]
    UsefulLifeOutOfRange { months: i64, max: i64 },

    #[error("Cost minus residual value leaves nothing to depreciate")]
    ZeroDepreciableBase,

    #[error("Asset is in service but has neither an availability nor a start date")]
    MissingInServiceDate,

    #[error("A later month ({last_run}) was already processed")]
    FuturePeriodAlreadyProcessed { last_run: YearMonth },

    #[error("Depreciation starts in {start}")]
    NotYetStarted { start: YearMonth },

    #[error("Depreciation ended; its last month was {last}")]
    AlreadyFinished { last: YearMonth },
}

impl RunError {
    /// Stable machine-readable name
    pub fn code(&self) -> &'static str {
        match self {
            Self::Paused => "Paused",
            Self::UndefinedUsefulLife => "UndefinedUsefulLife",
            Self::UsefulLifeOutOfRange { .. } => "UsefulLifeOutOfRange",
            Self::ZeroDepreciableBase => "ZeroDepreciableBase",
            Self::MissingInServiceDate => "MissingInServiceDate",
            Self::FuturePeriodAlreadyProcessed { .. } => "FuturePeriodAlreadyProcessed",
            Self::NotYetStarted { .. } => "NotYetStarted",
            Self::AlreadyFinished { .. } => "AlreadyFinished",
        }
    }
}

impl Serialize for RunError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("RunError", 2)?;
        s.serialize_field("code", self.code())?;
        s.serialize_field("reason", &self.to_string())?;
        s.end()
    }
}
