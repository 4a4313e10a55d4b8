use std::path::Path;

use coin_sheet::error::CycleError;
use coin_sheet::scheduler::{CycleOutcome, Poller};
use coin_sheet::storage_utils::{ApiConfig, AppConfig, WorkbookConfig};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer, workbook: &Path) -> AppConfig {
    AppConfig {
        api: ApiConfig {
            url: format!("{}/api/v3/coins/markets", server.uri()),
            ..ApiConfig::default()
        },
        workbook: WorkbookConfig {
            path: workbook.to_path_buf(),
            sheet_name: "Crypto Data".to_string(),
        },
        ..AppConfig::default()
    }
}

fn markets() -> Value {
    json!([
        {
            "id": "bitcoin", "name": "Bitcoin", "symbol": "btc",
            "current_price": 10, "market_cap": 300, "total_volume": 50,
            "price_change_percentage_24h": 5.0
        },
        {
            "id": "ethereum", "name": "Ethereum", "symbol": "eth",
            "current_price": 20, "market_cap": 200, "total_volume": 40,
            "price_change_percentage_24h": -3.0
        },
        {
            "id": "solana", "name": "Solana", "symbol": "sol",
            "current_price": 30, "market_cap": 100, "total_volume": 30,
            "price_change_percentage_24h": null
        }
    ])
}

async fn serve(server: &MockServer, response: ResponseTemplate, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/api/v3/coins/markets"))
        .respond_with(response)
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn sheet_rows(path: &Path) -> Vec<Vec<String>> {
    let book = umya_spreadsheet::reader::xlsx::read(path).unwrap();
    let sheet = book.get_sheet_by_name("Crypto Data").unwrap();
    (1..=sheet.get_highest_row())
        .map(|row| (1..=6u32).map(|col| sheet.get_value((col, row))).collect())
        .collect()
}

#[tokio::test]
async fn full_cycle_persists_table_in_source_order() {
    let server = MockServer::start().await;
    serve(&server, ResponseTemplate::new(200).set_body_json(markets()), 1).await;
    let dir = tempfile::tempdir().unwrap();
    let workbook = dir.path().join("Live_Crypto_Data.xlsx");

    let poller = Poller::new(config(&server, &workbook)).unwrap();
    let report = match poller.run_cycle().await {
        CycleOutcome::Completed {
            rows: 3,
            persisted: true,
            report,
        } => report,
        other => panic!("expected a completed cycle, got {:?}", other),
    };

    assert!(report.contains("Top 3 Cryptocurrencies by Market Cap"));
    assert!(report.contains("Average price: 20.00 USD"));
    assert!(report.contains("Highest 24h Change: Bitcoin with 5.00%"));
    assert!(report.contains("Lowest 24h Change: Ethereum with -3.00%"));
    let rows = sheet_rows(&workbook);
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0][0], "Name");
    assert_eq!(rows[0][3], "Market Cap (USD)");
    let names: Vec<_> = rows[1..].iter().map(|r| r[0].as_str()).collect();
    assert_eq!(names, ["Bitcoin", "Ethereum", "Solana"]);
    assert_eq!(rows[3][5], "");
}

#[tokio::test]
async fn failed_fetch_skips_everything_downstream() {
    let server = MockServer::start().await;
    serve(&server, ResponseTemplate::new(503), 1).await;
    let dir = tempfile::tempdir().unwrap();
    let workbook = dir.path().join("Live_Crypto_Data.xlsx");

    let poller = Poller::new(config(&server, &workbook)).unwrap();

    assert!(matches!(poller.run_cycle().await, CycleOutcome::NoData));
    assert!(!workbook.exists());
}

#[tokio::test]
async fn empty_array_is_no_data() {
    let server = MockServer::start().await;
    serve(&server, ResponseTemplate::new(200).set_body_json(json!([])), 1).await;
    let dir = tempfile::tempdir().unwrap();
    let workbook = dir.path().join("Live_Crypto_Data.xlsx");

    let poller = Poller::new(config(&server, &workbook)).unwrap();

    assert!(matches!(poller.run_cycle().await, CycleOutcome::NoData));
    assert!(!workbook.exists());
}

#[tokio::test]
async fn malformed_record_aborts_without_touching_workbook() {
    let server = MockServer::start().await;
    let mut body = markets();
    body[1].as_object_mut().unwrap().remove("total_volume");
    serve(&server, ResponseTemplate::new(200).set_body_json(body), 1).await;
    let dir = tempfile::tempdir().unwrap();
    let workbook = dir.path().join("Live_Crypto_Data.xlsx");

    let poller = Poller::new(config(&server, &workbook)).unwrap();

    match poller.run_cycle().await {
        CycleOutcome::Aborted(CycleError::MissingField { index, field }) => {
            assert_eq!(index, 1);
            assert_eq!(field, "total_volume");
        }
        other => panic!("expected aborted cycle, got {:?}", other),
    }
    assert!(!workbook.exists());
}

#[tokio::test]
async fn non_finite_price_aborts_before_analysis() {
    let server = MockServer::start().await;
    let mut body = markets();
    body[0]["current_price"] = json!("NaN");
    body[0]["price_change_percentage_24h"] = json!("NaN");
    serve(&server, ResponseTemplate::new(200).set_body_json(body), 1).await;
    let dir = tempfile::tempdir().unwrap();
    let workbook = dir.path().join("Live_Crypto_Data.xlsx");

    let poller = Poller::new(config(&server, &workbook)).unwrap();

    match poller.run_cycle().await {
        CycleOutcome::Aborted(CycleError::InvalidField { index, field, .. }) => {
            assert_eq!(index, 0);
            assert_eq!(field, "current_price");
        }
        other => panic!("expected aborted cycle, got {:?}", other),
    }
    assert!(!workbook.exists());
}

#[tokio::test]
async fn persistence_failure_still_completes_the_cycle() {
    let server = MockServer::start().await;
    serve(&server, ResponseTemplate::new(200).set_body_json(markets()), 1).await;
    let dir = tempfile::tempdir().unwrap();
    let workbook = dir.path().join("Live_Crypto_Data.xlsx");
    std::fs::write(&workbook, b"not a workbook").unwrap();

    let poller = Poller::new(config(&server, &workbook)).unwrap();

    assert!(matches!(
        poller.run_cycle().await,
        CycleOutcome::Completed {
            rows: 3,
            persisted: false,
            ..
        }
    ));
    assert_eq!(std::fs::read(&workbook).unwrap(), b"not a workbook");
}

#[tokio::test]
async fn cancelled_token_runs_exactly_one_cycle() {
    let server = MockServer::start().await;
    serve(&server, ResponseTemplate::new(200).set_body_json(markets()), 1).await;
    let dir = tempfile::tempdir().unwrap();
    let workbook = dir.path().join("Live_Crypto_Data.xlsx");

    let poller = Poller::new(config(&server, &workbook)).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    tokio::time::timeout(std::time::Duration::from_secs(30), poller.run(cancel))
        .await
        .expect("run should return once cancelled");

    assert_eq!(sheet_rows(&workbook).len(), 4);
    server.verify().await;
}

#[tokio::test]
async fn cancelling_during_sleep_stops_the_loop() {
    let server = MockServer::start().await;
    serve(&server, ResponseTemplate::new(200).set_body_json(json!([])), 1).await;
    let dir = tempfile::tempdir().unwrap();
    let workbook = dir.path().join("Live_Crypto_Data.xlsx");

    let poller = Poller::new(config(&server, &workbook)).unwrap();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        trigger.cancel();
    });

    tokio::time::timeout(std::time::Duration::from_secs(30), poller.run(cancel))
        .await
        .expect("run should return once cancelled");
    server.verify().await;
}
