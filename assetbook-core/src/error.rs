//! Structured errors
//!
//! Errors crossing a crate boundary are values with a stable code, a
//! human-readable message and optional context naming the asset involved.

use crate::{CalendarError, DecimalError};
use serde::{Deserialize, Serialize};

/// Standard error codes (machine-readable)
pub mod codes {
    pub const PARSE_ERROR: &str = "PARSE_ERROR";
    pub const DIV_ZERO: &str = "DIV_ZERO";
    pub const DOMAIN_ERROR: &str = "DOMAIN_ERROR";
    pub const INVALID_DATE: &str = "INVALID_DATE";
    pub const INVALID_MONTH: &str = "INVALID_MONTH";
    pub const DATE_PARSE_ERROR: &str = "DATE_PARSE_ERROR";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const CONFLICT: &str = "CONFLICT";
    pub const RUN_IN_PROGRESS: &str = "RUN_IN_PROGRESS";
    pub const PERSISTENCE: &str = "PERSISTENCE";
    pub const CONFIG: &str = "CONFIG";
    pub const IO: &str = "IO";
    pub const INTERNAL: &str = "INTERNAL";
}

/// Severity level of an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Operation failed for this asset or request
    Error,
    /// The whole batch or process cannot continue
    Fatal,
}

/// Context about where an error occurred
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub notes: Vec<String>,
}

/// Structured error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetbookError {
    /// Machine-readable error code
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Suggestion for fixing the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ErrorContext>,

    pub severity: Severity,
}

impl AssetbookError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            suggestion: None,
            context: None,
            severity: Severity::Error,
        }
    }

    /// Builder: add suggestion
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Builder: set the asset the error is about
    pub fn for_asset(mut self, asset_id: impl Into<String>) -> Self {
        let ctx = self.context.get_or_insert_with(ErrorContext::default);
        ctx.asset_id = Some(asset_id.into());
        self
    }

    /// Builder: set the offending field
    pub fn in_field(mut self, field: impl Into<String>) -> Self {
        let ctx = self.context.get_or_insert_with(ErrorContext::default);
        ctx.field = Some(field.into());
        self
    }

    /// Builder: add a note
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        let ctx = self.context.get_or_insert_with(ErrorContext::default);
        ctx.notes.push(note.into());
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }

    // ========== Common Error Constructors ==========

    pub fn parse_error(details: impl Into<String>) -> Self {
        Self::new(codes::PARSE_ERROR, format!("Parse error: {}", details.into()))
            .with_suggestion("Check the value format")
    }

    pub fn div_zero() -> Self {
        Self::new(codes::DIV_ZERO, "Division by zero")
    }

    pub fn domain_error(details: impl Into<String>) -> Self {
        Self::new(codes::DOMAIN_ERROR, format!("Domain error: {}", details.into()))
    }

    pub fn not_found(what: &str, id: &str) -> Self {
        Self::new(codes::NOT_FOUND, format!("{} not found: {}", what, id))
            .for_asset(id)
    }

    pub fn conflict(asset_id: &str, details: impl Into<String>) -> Self {
        Self::new(codes::CONFLICT, format!("Asset {} changed since preview: {}", asset_id, details.into()))
            .with_suggestion("Preview the run again and confirm the new preview")
            .for_asset(asset_id)
    }

    pub fn run_in_progress() -> Self {
        Self::new(codes::RUN_IN_PROGRESS, "Another depreciation run is being committed")
            .with_suggestion("Wait for the current run to finish")
    }

    pub fn persistence(details: impl Into<String>) -> Self {
        Self::new(codes::PERSISTENCE, format!("Persistence failed: {}", details.into()))
            .with_suggestion("Nothing was written; retry the whole run")
            .with_severity(Severity::Fatal)
    }

    pub fn config(details: impl Into<String>) -> Self {
        Self::new(codes::CONFIG, format!("Configuration error: {}", details.into()))
            .with_severity(Severity::Fatal)
    }

    pub fn io(details: impl Into<String>) -> Self {
        Self::new(codes::IO, format!("I/O error: {}", details.into()))
    }

    pub fn internal(details: impl Into<String>) -> Self {
        Self::new(codes::INTERNAL, format!("Internal error: {}", details.into()))
            .with_suggestion("This is a bug, please report it")
            .with_severity(Severity::Fatal)
    }

    // ========== Calendar Error Constructors ==========

    pub fn invalid_date(details: impl Into<String>) -> Self {
        Self::new(codes::INVALID_DATE, format!("Invalid date: {}", details.into()))
            .with_suggestion("Check date components (year, month 1-12, day within month)")
    }

    pub fn invalid_month(details: impl Into<String>) -> Self {
        Self::new(codes::INVALID_MONTH, format!("Invalid month: {}", details.into()))
            .with_suggestion("Use YYYY-MM")
    }

    pub fn date_parse_error(details: impl Into<String>) -> Self {
        Self::new(codes::DATE_PARSE_ERROR, format!("Date parse error: {}", details.into()))
            .with_suggestion("Use ISO 8601 format (YYYY-MM-DD, YYYY-MM or YYYY-MM-DDTHH:MM:SS)")
    }
}

impl std::fmt::Display for AssetbookError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " (suggestion: {})", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for AssetbookError {}

impl From<DecimalError> for AssetbookError {
    fn from(err: DecimalError) -> Self {
        match err {
            DecimalError::ParseError(s) => Self::parse_error(s),
            DecimalError::DivisionByZero => Self::div_zero(),
        }
    }
}

impl From<CalendarError> for AssetbookError {
    fn from(err: CalendarError) -> Self {
        match err {
            CalendarError::InvalidMonth(m) => Self::invalid_month(format!("month {} out of range 1-12", m)),
            CalendarError::InvalidDay(d, m, y) => Self::invalid_date(format!("day {} invalid for {}/{}", d, m, y)),
            CalendarError::InvalidYear(y) => Self::invalid_date(format!("year {} out of range", y)),
            CalendarError::ParseError(s) => Self::date_parse_error(s),
        }
    }
}

impl From<std::io::Error> for AssetbookError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}
