//! Register records as they are stored in the document store

use assetbook_core::{CalendarDate, Decimal, YearMonth};
use serde::{Deserialize, Deserializer, Serialize};

/// Opaque asset identifier
pub type AssetId = String;

/// Where an asset is in its life, from the register's point of view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    Planning,
    InDevelopment,
    InService,
    WrittenOff,
    #[default]
    Unknown,
}

impl LifecycleStatus {
    /// Case-insensitive; accepts the English names and the legacy
    /// register values (`planejamento`, `em_desenvolvimento`, `concluido`,
    /// `baixado`). Anything else is `Unknown`.
    pub fn parse(s: &str) -> Self {
        let key = s.trim().to_lowercase().replace([' ', '-'], "_");
        match key.as_str() {
            "planning" | "planejamento" => Self::Planning,
            "in_development" | "em_desenvolvimento" => Self::InDevelopment,
            "in_service" | "completed" | "active" | "concluido" | "concluído" => Self::InService,
            "written_off" | "baixado" => Self::WrittenOff,
            _ => Self::Unknown,
        }
    }

    /// Still being built: reported as construction in progress
    pub fn is_under_construction(&self) -> bool {
        matches!(self, Self::Planning | Self::InDevelopment)
    }
}

impl<'de> Deserialize<'de> for LifecycleStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(raw.as_deref().map(Self::parse).unwrap_or_default())
    }
}

/// Manual switch that suspends depreciation runs for an asset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepreciationStatus {
    #[default]
    Active,
    Paused,
}

impl DepreciationStatus {
    pub fn toggled(&self) -> Self {
        match self {
            Self::Active => Self::Paused,
            Self::Paused => Self::Active,
        }
    }
}

/// Which useful-life pair a computation reads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValuationBasis {
    /// Tax track (`usefulLife`)
    #[default]
    Fiscal,
    /// Statutory track (`corporateUsefulLife`), reporting only
    Corporate,
}

impl ValuationBasis {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "fiscal" => Some(Self::Fiscal),
            "corporate" => Some(Self::Corporate),
            _ => None,
        }
    }
}

/// A fixed asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: AssetId,

    #[serde(default)]
    pub name: String,

    /// Acquisition cost, before linked expenses
    #[serde(default)]
    pub value: Decimal,

    #[serde(default)]
    pub residual_value: Decimal,

    /// Fiscal useful life in years
    #[serde(default, deserialize_with = "optional_decimal", skip_serializing_if = "Option::is_none")]
    pub useful_life: Option<Decimal>,

    /// Statutory useful life in years
    #[serde(default, deserialize_with = "optional_decimal", skip_serializing_if = "Option::is_none")]
    pub corporate_useful_life: Option<Decimal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_class: Option<String>,

    #[serde(default, deserialize_with = "optional_date", skip_serializing_if = "Option::is_none")]
    pub availability_date: Option<CalendarDate>,

    #[serde(default, deserialize_with = "optional_date", skip_serializing_if = "Option::is_none")]
    pub start_date: Option<CalendarDate>,

    #[serde(default)]
    pub status: LifecycleStatus,

    #[serde(default)]
    pub depreciation_status: DepreciationStatus,

    #[serde(default)]
    pub accumulated_depreciation: Decimal,

    #[serde(default, deserialize_with = "optional_date")]
    pub last_depreciation_date: Option<CalendarDate>,

    /// Set when the asset is written off
    #[serde(default, deserialize_with = "optional_date", skip_serializing_if = "Option::is_none")]
    pub write_off_date: Option<CalendarDate>,

    /// Bumped on every write; used for compare-and-swap commits
    #[serde(default)]
    pub version: u64,
}

impl Asset {
    /// New in-service asset with the given cost and nothing else set
    pub fn new(id: impl Into<AssetId>, value: Decimal) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            value,
            residual_value: Decimal::zero(),
            useful_life: None,
            corporate_useful_life: None,
            asset_class: None,
            availability_date: None,
            start_date: None,
            status: LifecycleStatus::InService,
            depreciation_status: DepreciationStatus::Active,
            accumulated_depreciation: Decimal::zero(),
            last_depreciation_date: None,
            write_off_date: None,
            version: 0,
        }
    }

    /// The later-known in-service date: availability preferred over start
    pub fn in_service_date(&self) -> Option<CalendarDate> {
        self.availability_date.or(self.start_date)
    }

    pub fn is_in_service(&self) -> bool {
        self.status == LifecycleStatus::InService
    }

    pub fn is_written_off(&self) -> bool {
        self.status == LifecycleStatus::WrittenOff
    }

    /// Acquisition date: start date, else the in-service date
    pub fn acquisition_date(&self) -> Option<CalendarDate> {
        self.start_date.or(self.availability_date)
    }

    pub fn is_paused(&self) -> bool {
        self.depreciation_status == DepreciationStatus::Paused
    }

    /// Per-asset useful-life override for a basis, if set
    pub fn useful_life_for(&self, basis: ValuationBasis) -> Option<&Decimal> {
        match basis {
            ValuationBasis::Fiscal => self.useful_life.as_ref(),
            ValuationBasis::Corporate => self.corporate_useful_life.as_ref(),
        }
    }

    /// Month of the most recent successful run
    pub fn last_run_month(&self) -> Option<YearMonth> {
        self.last_depreciation_date.map(YearMonth::of)
    }
}

/// Category supplying default useful lives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetClass {
    pub name: String,

    #[serde(default, deserialize_with = "optional_decimal", skip_serializing_if = "Option::is_none")]
    pub useful_life: Option<Decimal>,

    #[serde(default, deserialize_with = "optional_decimal", skip_serializing_if = "Option::is_none")]
    pub corporate_useful_life: Option<Decimal>,
}

impl AssetClass {
    pub fn useful_life_for(&self, basis: ValuationBasis) -> Option<&Decimal> {
        match basis {
            ValuationBasis::Fiscal => self.useful_life.as_ref(),
            ValuationBasis::Corporate => self.corporate_useful_life.as_ref(),
        }
    }
}

/// Capitalized expense linked to an asset; only its amount matters here
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    #[serde(default)]
    pub id: String,
    pub asset_id: AssetId,
    #[serde(default)]
    pub amount: Decimal,
}

/// On-disk layout of a register file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterData {
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub asset_classes: Vec<AssetClass>,
    #[serde(default)]
    pub expenses: Vec<Expense>,
}

/// Empty strings and nulls both mean "not set"
fn optional_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<CalendarDate>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => CalendarDate::parse(s).map(Some).map_err(serde::de::Error::custom),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDecimal {
    Text(String),
    Value(Decimal),
}

fn optional_decimal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Decimal>, D::Error> {
    let raw: Option<RawDecimal> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(RawDecimal::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(RawDecimal::Text(s)) => Decimal::from_str(&s).map(Some).map_err(serde::de::Error::custom),
        Some(RawDecimal::Value(d)) => Ok(Some(d)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_from_document_json() {
        let json = r#"{
            "id": "A-1",
            "name": "Forklift",
            "value": 24000,
            "residualValue": "0",
            "usefulLife": 2,
            "assetClass": "Machinery",
            "availabilityDate": "2024-01-15",
            "startDate": "",
            "status": "completed",
            "accumulatedDepreciation": 0,
            "lastDepreciationDate": "2024-03-31T03:00:00.000Z"
        }"#;
        let asset: Asset = serde_json::from_str(json).unwrap();
        assert_eq!(asset.value.to_i64(), Some(24000));
        assert_eq!(asset.useful_life, Some(Decimal::from_i64(2)));
        assert!(asset.start_date.is_none());
        assert!(asset.is_in_service());
        assert_eq!(asset.depreciation_status, DepreciationStatus::Active);
        assert_eq!(asset.last_run_month().unwrap().to_string(), "2024-03");
        assert_eq!(asset.version, 0);
    }

    #[test]
    fn test_unknown_lifecycle_status_is_not_in_service() {
        let asset: Asset = serde_json::from_str(r#"{"id": "A-2", "status": "archived"}"#).unwrap();
        assert_eq!(asset.status, LifecycleStatus::Unknown);
        assert!(!asset.is_in_service());
    }

    #[test]
    fn test_legacy_status_values_are_recognized() {
        let status = |raw: &str| -> LifecycleStatus {
            serde_json::from_str::<Asset>(&format!(r#"{{"id": "A", "status": {}}}"#, raw))
                .unwrap()
                .status
        };
        assert_eq!(status(r#""concluido""#), LifecycleStatus::InService);
        assert_eq!(status(r#""Completed""#), LifecycleStatus::InService);
        assert_eq!(status(r#""CONCLUIDO""#), LifecycleStatus::InService);
        assert_eq!(status(r#""planejamento""#), LifecycleStatus::Planning);
        assert_eq!(status(r#""em_desenvolvimento""#), LifecycleStatus::InDevelopment);
        assert_eq!(status(r#""Baixado""#), LifecycleStatus::WrittenOff);
        assert_eq!(status(r#""in_service""#), LifecycleStatus::InService);
        assert_eq!(status("null"), LifecycleStatus::Unknown);
        assert!(status(r#""em_desenvolvimento""#).is_under_construction());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(serde_json::to_value(LifecycleStatus::InService).unwrap(), "in_service");
        assert_eq!(serde_json::to_value(LifecycleStatus::WrittenOff).unwrap(), "written_off");
    }

    #[test]
    fn test_write_off_date_and_acquisition_date() {
        let json = r#"{
            "id": "A-6",
            "status": "baixado",
            "startDate": "2022-03-10",
            "availabilityDate": "2022-05-01",
            "writeOffDate": "2024-06-15T12:00:00.000Z"
        }"#;
        let asset: Asset = serde_json::from_str(json).unwrap();
        assert!(asset.is_written_off());
        assert_eq!(asset.write_off_date.unwrap().to_iso_string(), "2024-06-15");
        assert_eq!(asset.acquisition_date().unwrap().to_iso_string(), "2022-03-10");
    }

    #[test]
    fn test_empty_useful_life_is_unset() {
        let asset: Asset = serde_json::from_str(r#"{"id": "A-3", "usefulLife": ""}"#).unwrap();
        assert!(asset.useful_life.is_none());
    }

    #[test]
    fn test_in_service_date_prefers_availability() {
        let mut asset = Asset::new("A-4", Decimal::from_i64(100));
        asset.start_date = CalendarDate::parse("2023-05-10").ok();
        assert_eq!(asset.in_service_date().unwrap().to_iso_string(), "2023-05-10");
        asset.availability_date = CalendarDate::parse("2023-07-01").ok();
        assert_eq!(asset.in_service_date().unwrap().to_iso_string(), "2023-07-01");
    }

    #[test]
    fn test_basis_selects_useful_life_field() {
        let mut asset = Asset::new("A-5", Decimal::from_i64(100));
        asset.useful_life = Some(Decimal::from_i64(5));
        asset.corporate_useful_life = Some(Decimal::from_i64(10));
        assert_eq!(asset.useful_life_for(ValuationBasis::Fiscal), Some(&Decimal::from_i64(5)));
        assert_eq!(asset.useful_life_for(ValuationBasis::Corporate), Some(&Decimal::from_i64(10)));
    }

    #[test]
    fn test_register_data_defaults() {
        let data: RegisterData = serde_json::from_str("{}").unwrap();
        assert!(data.assets.is_empty());
        assert!(data.asset_classes.is_empty());
    }
}
