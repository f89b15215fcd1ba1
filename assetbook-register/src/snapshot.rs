//! Point-in-time view of the register and the resolution rules over it

use crate::model::{Asset, AssetClass, Expense, RegisterData, ValuationBasis};
use assetbook_core::{CalendarDate, Decimal};
use serde::Serialize;
use std::collections::HashMap;

/// Class names compare trimmed and case-insensitive
fn class_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Saturates for lives too long to count in months
fn whole_months(years: &Decimal) -> i64 {
    let months = years.mul_int(12).floor();
    match months.to_i64() {
        Some(n) => n,
        None if months.is_positive() => i64::MAX,
        None => 0,
    }
}

/// Assets, classes and expense totals captured together
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    assets: Vec<Asset>,
    classes: Vec<AssetClass>,
    class_index: HashMap<String, usize>,
    expense_totals: HashMap<String, Decimal>,
}

/// Cost figures for one asset under one valuation basis
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Valuation {
    /// Base value plus linked expenses
    pub asset_value: Decimal,
    pub residual_value: Decimal,
    /// `max(asset_value - residual_value, 0)`
    pub depreciable_base: Decimal,
    /// Resolved useful life; `None` when neither override nor class default is usable
    pub useful_life_years: Option<Decimal>,
    /// `floor(years * 12)`, zero when the life is undefined
    pub useful_life_months: i64,
    pub in_service_date: Option<CalendarDate>,
}

impl Snapshot {
    pub fn new(assets: Vec<Asset>, classes: Vec<AssetClass>, expenses: &[Expense]) -> Self {
        let mut class_index = HashMap::new();
        for (i, class) in classes.iter().enumerate() {
            // First declaration wins on duplicate names
            class_index.entry(class_key(&class.name)).or_insert(i);
        }

        let mut expense_totals: HashMap<String, Decimal> = HashMap::new();
        for expense in expenses {
            let total = expense_totals.entry(expense.asset_id.clone()).or_default();
            *total = total.add(&expense.amount);
        }

        Self { assets, classes, class_index, expense_totals }
    }

    pub fn from_data(data: RegisterData) -> Self {
        Self::new(data.assets, data.asset_classes, &data.expenses)
    }

    pub fn with_asset(mut self, asset: Asset) -> Self {
        self.assets.push(asset);
        self
    }

    pub fn with_class(mut self, class: AssetClass) -> Self {
        self.class_index.entry(class_key(&class.name)).or_insert(self.classes.len());
        self.classes.push(class);
        self
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn asset(&self, id: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.id == id)
    }

    /// Declared classes, in declaration order
    pub fn classes(&self) -> &[AssetClass] {
        &self.classes
    }

    pub fn class_named(&self, name: &str) -> Option<&AssetClass> {
        self.class_index.get(&class_key(name)).map(|&i| &self.classes[i])
    }

    pub fn class_of(&self, asset: &Asset) -> Option<&AssetClass> {
        asset.asset_class.as_deref().and_then(|name| self.class_named(name))
    }

    pub fn expense_total(&self, asset_id: &str) -> Decimal {
        self.expense_totals.get(asset_id).cloned().unwrap_or_default()
    }

    /// Base value plus every expense linked to the asset
    pub fn asset_value(&self, asset: &Asset) -> Decimal {
        asset.value.add(&self.expense_total(&asset.id))
    }

    /// Per-asset override when positive, else class default when positive
    pub fn useful_life_years(&self, asset: &Asset, basis: ValuationBasis) -> Option<Decimal> {
        if let Some(years) = asset.useful_life_for(basis).filter(|y| y.is_positive()) {
            return Some(years.clone());
        }
        self.class_of(asset)
            .and_then(|class| class.useful_life_for(basis))
            .filter(|y| y.is_positive())
            .cloned()
    }

    pub fn useful_life_months(&self, asset: &Asset, basis: ValuationBasis) -> i64 {
        self.useful_life_years(asset, basis)
            .map(|years| whole_months(&years))
            .unwrap_or(0)
    }

    pub fn valuation(&self, asset: &Asset, basis: ValuationBasis) -> Valuation {
        let asset_value = self.asset_value(asset);
        let residual_value = asset.residual_value.clone();
        let depreciable_base = asset_value.sub(&residual_value).max_of(&Decimal::zero());
        let useful_life_years = self.useful_life_years(asset, basis);
        let useful_life_months = useful_life_years.as_ref().map(whole_months).unwrap_or(0);

        Valuation {
            asset_value,
            residual_value,
            depreciable_base,
            useful_life_years,
            useful_life_months,
            in_service_date: asset.in_service_date(),
        }
    }
}
