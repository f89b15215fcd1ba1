//! Tool implementations and their plain-text renderings

use crate::protocol::{McpError, Server, INTERNAL_ERROR};
use assetbook::{
    codes, AssetSchedule, AssetbookError, ClassPositions, Decimal, DepreciationStatus, MonthFigures,
    Outcome, RunPreview, RunReport, SummaryView, ValuationBasis, YearMonth, YearlySummary,
};
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use std::fmt::Write as _;
use tracing::info;

const MONTH_NAMES: [&str; 12] =
    ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"];

impl Server {
    pub(crate) async fn call_tool(&mut self, name: &str, args: &JsonValue) -> Result<JsonValue, McpError> {
        match name {
            "preview_run" => self.tool_preview_run(args),
            "apply_run" => self.tool_apply_run(args).await,
            "asset_schedule" => self.tool_asset_schedule(args),
            "reset_asset" => self.tool_reset_asset(args).await,
            "set_depreciation_status" => self.tool_set_depreciation_status(args).await,
            "yearly_summary" => self.tool_yearly_summary(args),
            "class_positions" => self.tool_class_positions(args),
            _ => Err(McpError::invalid_params(format!("Unknown tool: {}", name))),
        }
    }

    fn tool_preview_run(&mut self, args: &JsonValue) -> Result<JsonValue, McpError> {
        let month = month_arg(args, "month")?;
        let policy = match optional_bool(args, "useAcquisitionMonth")? {
            Some(flag) => self.book.policy().with_acquisition_month(flag),
            None => self.book.policy(),
        };

        let preview = self.book.preview_with(month, policy);
        let body = render_preview(&preview);
        let encoded = encode(&preview)?;
        let preview_id = self.store_preview(preview);

        tool_result(
            format!("{}\npreviewId: {}", body, preview_id),
            &json!({ "previewId": preview_id, "preview": encoded }),
        )
    }

    async fn tool_apply_run(&mut self, args: &JsonValue) -> Result<JsonValue, McpError> {
        let preview_id = required_str(args, "previewId")?;
        let Some(preview) = self.take_preview(preview_id) else {
            let err = AssetbookError::new(codes::NOT_FOUND, format!("Preview not found: {}", preview_id))
                .with_suggestion("Call preview_run again; a preview can be applied once");
            return Ok(tool_error(&err));
        };

        info!(preview_id, month = %preview.target_month, "Applying preview");
        match self.book.commit(&preview).await {
            Ok(report) => tool_result(render_report(&report), &report),
            Err(err) => Ok(tool_error(&err)),
        }
    }

    fn tool_asset_schedule(&mut self, args: &JsonValue) -> Result<JsonValue, McpError> {
        let asset_id = required_str(args, "assetId")?;
        let basis = basis_arg(args)?;
        match self.book.schedule(asset_id, basis) {
            Ok(schedule) => tool_result(render_schedule(&schedule), &schedule),
            Err(err) => Ok(tool_error(&err)),
        }
    }

    async fn tool_reset_asset(&mut self, args: &JsonValue) -> Result<JsonValue, McpError> {
        let asset_id = required_str(args, "assetId")?;
        match self.book.reset(asset_id).await {
            Ok(asset) => tool_result(
                format!("Asset {} reset: accumulated depreciation 0.00, no month run yet", asset.id),
                &asset,
            ),
            Err(err) => Ok(tool_error(&err)),
        }
    }

    async fn tool_set_depreciation_status(&mut self, args: &JsonValue) -> Result<JsonValue, McpError> {
        let asset_id = required_str(args, "assetId")?;
        let requested = required_str(args, "status")?.trim().to_lowercase();

        let pause = match requested.as_str() {
            "paused" | "pause" => true,
            "active" | "resume" => false,
            "toggle" => match self.book.snapshot().asset(asset_id) {
                Some(asset) => asset.depreciation_status.toggled() == DepreciationStatus::Paused,
                None => return Ok(tool_error(&AssetbookError::not_found("Asset", asset_id))),
            },
            other => {
                return Err(McpError::invalid_params(format!(
                    "status must be active, paused or toggle, got '{}'",
                    other
                )))
            }
        };

        let result = if pause { self.book.pause(asset_id).await } else { self.book.resume(asset_id).await };
        match result {
            Ok(asset) => {
                let state = if asset.is_paused() { "paused" } else { "active" };
                tool_result(format!("Depreciation for asset {} is now {}", asset.id, state), &asset)
            }
            Err(err) => Ok(tool_error(&err)),
        }
    }

    fn tool_yearly_summary(&mut self, args: &JsonValue) -> Result<JsonValue, McpError> {
        let year = year_arg(args)?;
        let basis = basis_arg(args)?;
        let view = match optional_str(args, "view")? {
            None => SummaryView::default(),
            Some(s) => SummaryView::parse(s).ok_or_else(|| {
                McpError::invalid_params(format!("view must be realized or projected, got '{}'", s))
            })?,
        };

        match self.book.yearly_summary(year, basis, view) {
            Ok(summary) => tool_result(render_yearly(&summary), &summary),
            Err(err) => Ok(tool_error(&err)),
        }
    }

    fn tool_class_positions(&mut self, args: &JsonValue) -> Result<JsonValue, McpError> {
        let basis = basis_arg(args)?;
        let month = month_arg(args, "month")?;
        let positions = self.book.class_positions(basis, month);
        tool_result(render_positions(&positions), &positions)
    }
}

// ========== Arguments ==========

fn optional_str<'a>(args: &'a JsonValue, key: &str) -> Result<Option<&'a str>, McpError> {
    match args.get(key) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(McpError::invalid_params(format!("{} must be a string", key))),
    }
}

fn required_str<'a>(args: &'a JsonValue, key: &str) -> Result<&'a str, McpError> {
    optional_str(args, key)?
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| McpError::invalid_params(format!("Missing {} argument", key)))
}

fn optional_bool(args: &JsonValue, key: &str) -> Result<Option<bool>, McpError> {
    match args.get(key) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(McpError::invalid_params(format!("{} must be a boolean", key))),
    }
}

/// `YYYY-MM`, defaulting to the current month
fn month_arg(args: &JsonValue, key: &str) -> Result<YearMonth, McpError> {
    match optional_str(args, key)? {
        None => Ok(YearMonth::current()),
        Some(s) => YearMonth::parse(s).map_err(|e| bad_value(key, &AssetbookError::from(e))),
    }
}

fn basis_arg(args: &JsonValue) -> Result<ValuationBasis, McpError> {
    match optional_str(args, "basis")? {
        None => Ok(ValuationBasis::default()),
        Some(s) => ValuationBasis::parse(s).ok_or_else(|| {
            McpError::invalid_params(format!("basis must be fiscal or corporate, got '{}'", s))
        }),
    }
}

fn year_arg(args: &JsonValue) -> Result<i32, McpError> {
    let year = match args.get("year") {
        Some(JsonValue::Number(n)) => n.as_i64(),
        Some(JsonValue::String(s)) => s.trim().parse::<i64>().ok(),
        None | Some(JsonValue::Null) => return Err(McpError::invalid_params("Missing year argument")),
        Some(_) => None,
    };
    year.and_then(|y| i32::try_from(y).ok())
        .ok_or_else(|| McpError::invalid_params("year must be an integer"))
}

fn bad_value(key: &str, err: &AssetbookError) -> McpError {
    McpError::invalid_params(format!("Invalid {}: {}", key, err.message))
        .with_data(serde_json::to_value(err).unwrap_or(JsonValue::Null))
}

// ========== Results ==========

fn encode<T: Serialize>(data: &T) -> Result<JsonValue, McpError> {
    serde_json::to_value(data)
        .map_err(|e| McpError::new(INTERNAL_ERROR, format!("Cannot encode result: {}", e)))
}

fn tool_result<T: Serialize>(text: String, data: &T) -> Result<JsonValue, McpError> {
    Ok(json!({
        "content": [{ "type": "text", "text": text }],
        "data": encode(data)?,
        "isError": false
    }))
}

/// Engine failures are tool results, not protocol errors
fn tool_error(err: &AssetbookError) -> JsonValue {
    json!({
        "content": [{ "type": "text", "text": err.to_string() }],
        "data": { "error": serde_json::to_value(err).unwrap_or(JsonValue::Null) },
        "isError": true
    })
}

// ========== Rendering ==========

fn money(value: &Decimal) -> String {
    value.as_decimal(2)
}

fn month_opt(month: Option<YearMonth>) -> String {
    month.map(|m| m.to_string()).unwrap_or_else(|| "-".to_string())
}

fn outcome_label(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Ready => "ready".to_string(),
        Outcome::Recalculation => "recalculation".to_string(),
        Outcome::Error(err) => format!("{}: {}", err.code(), err),
    }
}

fn render_preview(preview: &RunPreview) -> String {
    let rule = if preview.policy.use_acquisition_month {
        "from the in-service month"
    } else {
        "from the month after in service"
    };
    let s = &preview.summary;
    let mut out = format!("# Depreciation preview {} ({})\n\n", preview.target_month, rule);
    let _ = writeln!(
        out,
        "{} assets: {} ready, {} recalculations, {} errors. {} writes, total change {}\n",
        s.listed,
        s.ready,
        s.recalculations,
        s.errors,
        s.writes,
        money(&s.total_delta)
    );
    out.push_str("| Asset | Outcome | Window | Last run | Current | Projected | Change | Write |\n");
    out.push_str("|---|---|---|---|---|---|---|---|\n");
    for e in &preview.entries {
        let label = if e.asset_name.is_empty() {
            e.asset_id.clone()
        } else {
            format!("{} ({})", e.asset_id, e.asset_name)
        };
        let window = match (e.start_month, e.end_month) {
            (Some(start), Some(end)) => format!("{} to {}", start, end.add_months(-1)),
            _ => "-".to_string(),
        };
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} | {} | {} |",
            label,
            outcome_label(&e.outcome),
            window,
            month_opt(e.last_run_month),
            money(&e.current_accumulated),
            money(&e.projected_accumulated),
            money(&e.delta),
            if e.will_write { "yes" } else { "no" }
        );
    }
    out
}

fn render_report(report: &RunReport) -> String {
    let mut out = format!(
        "Run {} committed: {} updated, {} unchanged, {} skipped",
        report.target_month,
        report.updated.len(),
        report.unchanged.len(),
        report.skipped.len()
    );
    for skipped in &report.skipped {
        let _ = write!(out, "\n- {}: {} ({})", skipped.asset_id, skipped.reason, skipped.code);
    }
    out
}

fn render_schedule(schedule: &AssetSchedule) -> String {
    let plan = &schedule.schedule;
    let mut out = format!("# Schedule of {} {}\n\n", schedule.asset_id, schedule.asset_name);
    let _ = writeln!(
        out,
        "Base {} over {} months from {}: {} per month. Accumulated {}, last run {}\n",
        money(&plan.depreciable_base),
        plan.useful_life_months,
        plan.start_month,
        money(&plan.monthly_quota),
        money(&schedule.accumulated_depreciation),
        month_opt(schedule.last_run_month)
    );
    out.push_str("| Month | Depreciation | Accumulated | Book value | Run |\n");
    out.push_str("|---|---|---|---|---|\n");
    for row in &schedule.rows {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} |",
            row.month,
            money(&row.depreciation),
            money(&row.accumulated),
            money(&row.book_value),
            if row.realized { "yes" } else { "" }
        );
    }
    out
}

fn render_yearly(summary: &YearlySummary) -> String {
    let view = match summary.view {
        SummaryView::Realized => "realized",
        SummaryView::Projected => "projected",
    };
    let mut out = format!("# Depreciation {} ({})\n\n", summary.year, view);
    out.push_str("| Class |");
    for name in MONTH_NAMES {
        let _ = write!(out, " {} |", name);
    }
    out.push_str(" Total |\n|---|");
    out.push_str(&"---|".repeat(13));
    out.push('\n');

    for class in &summary.classes {
        write_year_row(&mut out, &class.class_name, &class.months, &class.total);
    }
    write_year_row(&mut out, "Total", &summary.months, &summary.total);
    out
}

fn write_year_row(out: &mut String, label: &str, months: &[MonthFigures], total: &MonthFigures) {
    let _ = write!(out, "| {} |", label);
    for figures in months {
        let _ = write!(out, " {} |", money(&figures.shown));
    }
    let _ = writeln!(out, " {} |", money(&total.shown));
}

fn render_positions(positions: &ClassPositions) -> String {
    let mut out = format!("# Class positions {}\n\n", positions.reference_month);
    out.push_str(
        "| Class | Assets | Opening cost | Additions | Transfers | Write-offs | Cost | Opening | Period | Accumulated | Net value |\n",
    );
    out.push_str("|---|---|---|---|---|---|---|---|---|---|---|\n");
    for p in positions.classes.iter().chain(std::iter::once(&positions.total)) {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} | {} | {} | {} | {} | {} |",
            p.class_name,
            p.asset_count,
            money(&p.opening_cost),
            money(&p.additions),
            money(&p.transfers),
            money(&p.write_offs),
            money(&p.cost),
            money(&p.opening),
            money(&p.period),
            money(&p.accumulated),
            money(&p.net_value)
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::INVALID_PARAMS;
    use assetbook::{Asset, AssetRegister, Assetbook, CalendarDate, RunPolicy};
    use std::sync::Arc;

    fn server() -> (Arc<AssetRegister>, Server) {
        let register = Arc::new(AssetRegister::new());
        let mut asset = Asset::new("A", Decimal::from_i64(24000));
        asset.name = "Forklift".to_string();
        asset.useful_life = Some(Decimal::from_i64(2));
        asset.availability_date = CalendarDate::parse("2024-01-15").ok();
        register.upsert_asset(asset).unwrap();
        let book = Assetbook::with_register(register.clone(), RunPolicy::default());
        (register, Server::new(book))
    }

    #[tokio::test]
    async fn test_preview_then_apply_once() {
        let (register, mut server) = server();

        let preview = server.call_tool("preview_run", &json!({ "month": "2024-02" })).await.unwrap();
        assert_eq!(preview["isError"], json!(false));
        let preview_id = preview["data"]["previewId"].as_str().unwrap().to_string();
        assert_eq!(preview["data"]["preview"]["summary"]["writes"], json!(1));
        assert!(preview["content"][0]["text"].as_str().unwrap().contains("A (Forklift)"));
        assert!(register.get("A").unwrap().accumulated_depreciation.is_zero());

        let applied = server.call_tool("apply_run", &json!({ "previewId": preview_id })).await.unwrap();
        assert_eq!(applied["isError"], json!(false));
        assert_eq!(applied["data"]["updated"], json!(["A"]));
        assert_eq!(register.get("A").unwrap().accumulated_depreciation, Decimal::from_i64(1000));

        let again = server.call_tool("apply_run", &json!({ "previewId": preview_id })).await.unwrap();
        assert_eq!(again["isError"], json!(true));
        assert_eq!(again["data"]["error"]["code"], json!(codes::NOT_FOUND));
    }

    #[tokio::test]
    async fn test_stale_preview_reports_conflict() {
        let (_, mut server) = server();
        let first = server.call_tool("preview_run", &json!({ "month": "2024-02" })).await.unwrap();
        let second = server.call_tool("preview_run", &json!({ "month": "2024-02" })).await.unwrap();

        let id = first["data"]["previewId"].as_str().unwrap().to_string();
        server.call_tool("apply_run", &json!({ "previewId": id })).await.unwrap();

        let id = second["data"]["previewId"].as_str().unwrap().to_string();
        let result = server.call_tool("apply_run", &json!({ "previewId": id })).await.unwrap();
        assert_eq!(result["isError"], json!(true));
        assert_eq!(result["data"]["error"]["code"], json!(codes::CONFLICT));
    }

    #[tokio::test]
    async fn test_acquisition_month_flag() {
        let (_, mut server) = server();
        let default = server.call_tool("preview_run", &json!({ "month": "2024-01" })).await.unwrap();
        assert_eq!(default["data"]["preview"]["summary"]["errors"], json!(1));

        let early = server
            .call_tool("preview_run", &json!({ "month": "2024-01", "useAcquisitionMonth": true }))
            .await
            .unwrap();
        assert_eq!(early["data"]["preview"]["summary"]["ready"], json!(1));
    }

    #[tokio::test]
    async fn test_bad_arguments_are_protocol_errors() {
        let (_, mut server) = server();
        let err = server.call_tool("preview_run", &json!({ "month": "2024-13" })).await.unwrap_err();
        assert_eq!(err.code, INVALID_PARAMS);
        assert!(err.data.is_some());

        let err = server.call_tool("preview_run", &json!({ "useAcquisitionMonth": "yes" })).await.unwrap_err();
        assert_eq!(err.code, INVALID_PARAMS);

        let err = server.call_tool("asset_schedule", &json!({})).await.unwrap_err();
        assert_eq!(err.code, INVALID_PARAMS);

        let err = server
            .call_tool("yearly_summary", &json!({ "year": 2024, "view": "sideways" }))
            .await
            .unwrap_err();
        assert_eq!(err.code, INVALID_PARAMS);

        let err = server
            .call_tool("set_depreciation_status", &json!({ "assetId": "A", "status": "frozen" }))
            .await
            .unwrap_err();
        assert_eq!(err.code, INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_schedule_tool() {
        let (_, mut server) = server();
        let result = server
            .call_tool("asset_schedule", &json!({ "assetId": "A", "basis": "fiscal" }))
            .await
            .unwrap();
        assert_eq!(result["data"]["rows"].as_array().unwrap().len(), 24);
        assert_eq!(result["data"]["schedule"]["startMonth"], json!("2024-02"));

        let missing = server.call_tool("asset_schedule", &json!({ "assetId": "Z" })).await.unwrap();
        assert_eq!(missing["isError"], json!(true));
        assert_eq!(missing["data"]["error"]["code"], json!(codes::NOT_FOUND));
    }

    #[tokio::test]
    async fn test_status_and_reset_tools() {
        let (register, mut server) = server();
        let toggled = server
            .call_tool("set_depreciation_status", &json!({ "assetId": "A", "status": "toggle" }))
            .await
            .unwrap();
        assert_eq!(toggled["data"]["depreciationStatus"], json!("paused"));
        assert!(register.get("A").unwrap().is_paused());

        let resumed = server
            .call_tool("set_depreciation_status", &json!({ "assetId": "A", "status": "active" }))
            .await
            .unwrap();
        assert_eq!(resumed["data"]["depreciationStatus"], json!("active"));

        server.book.run(YearMonth::parse("2024-02").unwrap()).await.unwrap();
        let reset = server.call_tool("reset_asset", &json!({ "assetId": "A" })).await.unwrap();
        assert_eq!(reset["isError"], json!(false));
        assert!(register.get("A").unwrap().accumulated_depreciation.is_zero());

        let missing = server.call_tool("reset_asset", &json!({ "assetId": "Z" })).await.unwrap();
        assert_eq!(missing["isError"], json!(true));
    }

    #[tokio::test]
    async fn test_report_tools() {
        let (_, mut server) = server();
        let summary = server
            .call_tool("yearly_summary", &json!({ "year": "2024", "view": "projected" }))
            .await
            .unwrap();
        assert_eq!(summary["isError"], json!(false));
        assert!(summary["content"][0]["text"].as_str().unwrap().contains("| Total |"));

        let err = server.call_tool("yearly_summary", &json!({})).await.unwrap_err();
        assert_eq!(err.code, INVALID_PARAMS);

        let positions = server
            .call_tool("class_positions", &json!({ "month": "2024-06", "basis": "corporate" }))
            .await
            .unwrap();
        assert_eq!(positions["data"]["referenceMonth"], json!("2024-06"));
        assert_eq!(positions["data"]["total"]["assetCount"], json!(1));
        assert!(positions["content"][0]["text"].as_str().unwrap().contains("| Write-offs |"));
    }
}
