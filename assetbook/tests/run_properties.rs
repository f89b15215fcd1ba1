//! End-to-end run behavior against an in-memory and a file-backed register

use assetbook::{
    codes, Asset, AssetClass, AssetRegister, Assetbook, CalendarDate, Decimal, Expense, Outcome,
    RunError, RunPolicy, ValuationBasis, YearMonth,
};
use std::sync::Arc;

fn ym(s: &str) -> YearMonth {
    YearMonth::parse(s).unwrap()
}

fn amount(n: i64) -> Decimal {
    Decimal::from_i64(n)
}

/// 24000 over two years, in service mid January 2024: Feb 2024 to Jan 2026
fn forklift(id: &str) -> Asset {
    let mut asset = Asset::new(id, amount(24000));
    asset.name = format!("Forklift {}", id);
    asset.useful_life = Some(amount(2));
    asset.availability_date = CalendarDate::parse("2024-01-15").ok();
    asset
}

fn book_with(assets: Vec<Asset>) -> (Arc<AssetRegister>, Assetbook) {
    let register = Arc::new(AssetRegister::new());
    for asset in assets {
        register.upsert_asset(asset).unwrap();
    }
    let book = Assetbook::with_register(register.clone(), RunPolicy::default());
    (register, book)
}

fn accumulated(register: &AssetRegister, id: &str) -> Decimal {
    register.get(id).unwrap().accumulated_depreciation
}

async fn run_months(book: &Assetbook, from: &str, to: &str) {
    let (from, to) = (ym(from), ym(to));
    let mut month = from;
    while month <= to {
        book.run(month).await.unwrap();
        month = month.add_months(1);
    }
}

#[tokio::test]
async fn rerunning_a_month_changes_nothing() {
    let (register, book) = book_with(vec![forklift("A")]);

    let first = book.run(ym("2024-02")).await.unwrap();
    assert_eq!(first.updated, vec!["A".to_string()]);
    assert_eq!(accumulated(&register, "A"), amount(1000));

    let preview = book.preview(ym("2024-02"));
    let entry = preview.entry("A").unwrap();
    assert_eq!(entry.outcome, Outcome::Recalculation);
    assert!(!entry.will_write);

    let second = book.commit(&preview).await.unwrap();
    assert!(second.updated.is_empty());
    assert_eq!(second.unchanged, vec!["A".to_string()]);
    assert_eq!(accumulated(&register, "A"), amount(1000));
}

#[tokio::test]
async fn twenty_four_runs_depreciate_fully() {
    let (register, book) = book_with(vec![forklift("A")]);
    let entry = book.preview(ym("2024-02")).entry("A").cloned().unwrap();
    assert_eq!(entry.start_month, Some(ym("2024-02")));
    assert_eq!(entry.monthly_amount, amount(1000));

    run_months(&book, "2024-02", "2026-01").await;

    let asset = register.get("A").unwrap();
    assert_eq!(asset.accumulated_depreciation, amount(24000));
    assert_eq!(asset.last_depreciation_date.map(|d| d.to_iso_string()), Some("2026-01-31".to_string()));

    let schedule = book.schedule("A", ValuationBasis::Fiscal).unwrap();
    let last = schedule.rows.last().unwrap();
    assert!(last.book_value.is_zero());
    assert!(schedule.rows.iter().all(|row| row.realized));
}

#[tokio::test]
async fn accumulated_stays_within_base() {
    let mut with_residual = forklift("R");
    with_residual.residual_value = amount(4000);
    let (register, book) = book_with(vec![forklift("A"), with_residual]);

    let mut month = ym("2024-01");
    while month <= ym("2026-06") {
        book.run(month).await.unwrap();
        for (id, base) in [("A", 24000), ("R", 20000)] {
            let value = accumulated(&register, id);
            assert!(!value.is_negative());
            assert!(value <= amount(base), "{} over base in {}", id, month);
        }
        month = month.add_months(1);
    }

    assert_eq!(accumulated(&register, "A"), amount(24000));
    assert_eq!(accumulated(&register, "R"), amount(20000));
}

#[tokio::test]
async fn earlier_month_after_later_one_is_refused() {
    let (register, book) = book_with(vec![forklift("A")]);
    run_months(&book, "2024-02", "2024-03").await;
    assert_eq!(accumulated(&register, "A"), amount(2000));

    let preview = book.preview(ym("2024-02"));
    assert_eq!(
        preview.entry("A").unwrap().outcome,
        Outcome::Error(RunError::FuturePeriodAlreadyProcessed { last_run: ym("2024-03") })
    );

    let report = book.commit(&preview).await.unwrap();
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].code, "FuturePeriodAlreadyProcessed");
    assert_eq!(accumulated(&register, "A"), amount(2000));
}

#[tokio::test]
async fn reset_then_replay_reproduces_total() {
    let (register, book) = book_with(vec![forklift("A")]);
    run_months(&book, "2024-02", "2024-12").await;
    let before = accumulated(&register, "A");
    assert_eq!(before, amount(11000));

    let reset = book.reset("A").await.unwrap();
    assert!(reset.accumulated_depreciation.is_zero());
    assert!(reset.last_depreciation_date.is_none());

    run_months(&book, "2024-02", "2024-12").await;
    assert_eq!(accumulated(&register, "A"), before);
}

#[test]
fn eligibility_window_edges() {
    let (_, book) = book_with(vec![forklift("A")]);
    let outcome = |month: &str| book.preview(ym(month)).entry("A").unwrap().outcome.clone();

    assert_eq!(outcome("2024-01"), Outcome::Error(RunError::NotYetStarted { start: ym("2024-02") }));
    assert_eq!(outcome("2024-02"), Outcome::Ready);
    assert_eq!(outcome("2026-01"), Outcome::Ready);
    assert_eq!(outcome("2026-02"), Outcome::Error(RunError::AlreadyFinished { last: ym("2026-01") }));
}

#[test]
fn missing_useful_life_is_always_an_error() {
    let mut asset = forklift("A");
    asset.useful_life = None;
    asset.asset_class = Some("Tooling".to_string());
    let (_, book) = book_with(vec![asset]);

    for month in ["2020-01", "2024-02", "2030-12"] {
        assert_eq!(
            book.preview(ym(month)).entry("A").unwrap().outcome,
            Outcome::Error(RunError::UndefinedUsefulLife),
            "month {}",
            month
        );
    }
}

#[tokio::test]
async fn paused_asset_is_never_ready() {
    let (register, book) = book_with(vec![forklift("A")]);
    book.pause("A").await.unwrap();

    for month in ["2024-01", "2024-06", "2027-01"] {
        assert_eq!(book.preview(ym(month)).entry("A").unwrap().outcome, Outcome::Error(RunError::Paused));
    }
    let report = book.run(ym("2024-06")).await.unwrap();
    assert!(report.updated.is_empty());
    assert!(accumulated(&register, "A").is_zero());
}

#[tokio::test]
async fn edit_between_preview_and_commit_fails_whole_batch() {
    let (register, book) = book_with(vec![forklift("A"), forklift("B")]);
    let preview = book.preview(ym("2024-02"));
    assert_eq!(preview.summary.writes, 2);

    book.reset("B").await.unwrap();

    let err = book.commit(&preview).await.unwrap_err();
    assert_eq!(err.code, codes::CONFLICT);
    assert!(accumulated(&register, "A").is_zero());
    assert!(accumulated(&register, "B").is_zero());

    let fresh = book.preview(ym("2024-02"));
    let report = book.commit(&fresh).await.unwrap();
    assert_eq!(report.updated.len(), 2);
}

#[tokio::test]
async fn expense_added_after_preview_fails_commit() {
    let (register, book) = book_with(vec![forklift("A")]);
    let preview = book.preview(ym("2024-02"));
    assert_eq!(preview.entry("A").unwrap().projected_accumulated, amount(1000));

    register
        .add_expense(Expense { id: "E1".to_string(), asset_id: "A".to_string(), amount: amount(24000) })
        .unwrap();

    let err = book.commit(&preview).await.unwrap_err();
    assert_eq!(err.code, codes::CONFLICT);
    assert!(accumulated(&register, "A").is_zero());

    let fresh = book.preview(ym("2024-02"));
    assert_eq!(fresh.entry("A").unwrap().monthly_amount, amount(2000));
    book.commit(&fresh).await.unwrap();
    assert_eq!(accumulated(&register, "A"), amount(2000));
}

#[tokio::test]
async fn class_life_removed_after_preview_fails_commit() {
    let register = Arc::new(AssetRegister::new());
    let vehicles = |life: Option<i64>| AssetClass {
        name: "Vehicles".to_string(),
        useful_life: life.map(amount),
        corporate_useful_life: None,
    };
    register.upsert_class(vehicles(Some(2))).unwrap();
    let mut van = forklift("V");
    van.useful_life = None;
    van.asset_class = Some("Vehicles".to_string());
    register.upsert_asset(van).unwrap();

    let book = Assetbook::with_register(register.clone(), RunPolicy::default());
    let preview = book.preview(ym("2024-02"));
    assert_eq!(preview.entry("V").unwrap().outcome, Outcome::Ready);

    register.upsert_class(vehicles(None)).unwrap();

    let err = book.commit(&preview).await.unwrap_err();
    assert_eq!(err.code, codes::CONFLICT);
    assert!(accumulated(&register, "V").is_zero());
    assert_eq!(
        book.preview(ym("2024-02")).entry("V").unwrap().outcome,
        Outcome::Error(RunError::UndefinedUsefulLife)
    );
}

#[tokio::test]
async fn register_with_legacy_status_values_runs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("register.json");
    let legacy = r#"{
        "assets": [
            {"id": "A", "value": 24000, "usefulLife": 2, "availabilityDate": "2024-01-15", "status": "concluido"},
            {"id": "B", "value": 24000, "usefulLife": "2", "availabilityDate": "2024-01-15", "status": "Completed"},
            {"id": "C", "value": 9000, "usefulLife": 2, "status": "em_desenvolvimento"},
            {"id": "D", "value": 5000, "usefulLife": 2, "startDate": "2020-01-01", "status": "baixado",
             "writeOffDate": "2023-06-30"}
        ],
        "assetClasses": [],
        "expenses": []
    }"#;
    std::fs::write(&path, legacy).unwrap();

    let register = Arc::new(AssetRegister::open(&path).unwrap());
    let book = Assetbook::with_register(register.clone(), RunPolicy::default());

    let preview = book.preview(ym("2024-02"));
    assert_eq!(preview.summary.listed, 2);
    assert_eq!(preview.summary.writes, 2);

    let report = book.commit(&preview).await.unwrap();
    assert_eq!(report.updated, vec!["A".to_string(), "B".to_string()]);

    let positions = book.class_positions(ValuationBasis::Fiscal, ym("2024-02"));
    let construction = positions
        .classes
        .iter()
        .find(|c| c.class_name == "Construction in progress")
        .unwrap();
    assert_eq!(construction.cost, amount(9000));
    // Written off before the year: not held
    assert_eq!(positions.total.cost, amount(57000));
}

#[test]
fn absurd_useful_life_is_reported_not_fatal() {
    let mut asset = forklift("A");
    asset.useful_life = Decimal::from_str("768614336404564650").ok();
    let (_, book) = book_with(vec![asset, forklift("B")]);

    let preview = book.preview(ym("2024-02"));
    assert_eq!(
        preview.entry("A").unwrap().outcome.error().map(|e| e.code()),
        Some("UsefulLifeOutOfRange")
    );
    assert_eq!(preview.entry("B").unwrap().outcome, Outcome::Ready);

    let err = book.schedule("A", ValuationBasis::Fiscal).unwrap_err();
    assert_eq!(err.code, codes::DOMAIN_ERROR);
}

#[tokio::test]
async fn class_default_life_and_expenses() {
    let register = Arc::new(AssetRegister::new());
    register
        .upsert_class(AssetClass {
            name: "Vehicles".to_string(),
            useful_life: Some(amount(4)),
            corporate_useful_life: Some(amount(5)),
        })
        .unwrap();
    let mut van = Asset::new("V", amount(40000));
    van.asset_class = Some(" vehicles ".to_string());
    van.residual_value = amount(2000);
    van.start_date = CalendarDate::parse("2024-03-01").ok();
    register.upsert_asset(van).unwrap();
    register
        .add_expense(Expense { id: "E1".to_string(), asset_id: "V".to_string(), amount: amount(10000) })
        .unwrap();

    let book = Assetbook::with_register(register.clone(), RunPolicy::default());
    let entry = book.preview(ym("2024-04")).entry("V").cloned().unwrap();
    assert_eq!(entry.depreciable_base, amount(48000));
    assert_eq!(entry.useful_life_months, 48);
    assert_eq!(entry.monthly_amount, amount(1000));

    book.run(ym("2024-04")).await.unwrap();
    assert_eq!(accumulated(&register, "V"), amount(1000));

    let corporate = book.schedule("V", ValuationBasis::Corporate).unwrap();
    assert_eq!(corporate.schedule.useful_life_months, 60);
    assert_eq!(corporate.schedule.monthly_quota, amount(800));
}

#[tokio::test]
async fn runs_survive_reopening_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("register.json");
    {
        let register = Arc::new(AssetRegister::open(&path).unwrap());
        register.upsert_asset(forklift("A")).unwrap();
        let book = Assetbook::with_register(register, RunPolicy::default());
        run_months(&book, "2024-02", "2024-04").await;
    }

    let reopened = AssetRegister::open(&path).unwrap();
    let asset = reopened.get("A").unwrap();
    assert_eq!(asset.accumulated_depreciation, amount(3000));
    assert_eq!(asset.last_run_month(), Some(ym("2024-04")));
}
