//! Assetbook Core - Fundamental types
//!
//! This crate provides the core types used throughout Assetbook:
//! - `Decimal`: Arbitrary precision currency amounts
//! - `CalendarDate` / `YearMonth`: Date-only and month-granularity values
//! - `AssetbookError`: Structured errors with stable codes

mod decimal;
mod calendar;
mod error;

pub use decimal::{Decimal, DecimalError};
pub use calendar::{CalendarDate, CalendarError, YearMonth, days_in_month, is_leap_year, months_between};
pub use error::{AssetbookError, ErrorContext, Severity, codes};
