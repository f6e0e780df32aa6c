mod common;

use chrono::NaiveDate;
use findb::finance::{normalize_column_name, PRICE_CURRENT_TABLE, PRICE_HISTORY_TABLE};
use findb::{Error, FinanceDatabase, RowBatch, SchemaOutcome, StoreConfig, Value};

use common::{create_temp_db_file, price_rows, sorted_rows};

fn open() -> (tempfile::TempDir, FinanceDatabase) {
    let (dir, path) = create_temp_db_file("finance-database.db");
    let db = FinanceDatabase::open(StoreConfig::new(&path).create_if_missing(true))
        .expect("open finance database");
    (dir, db)
}

fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[test]
fn open_is_idempotent() {
    let (dir, path) = create_temp_db_file("finance-database.db");
    let config = StoreConfig::new(&path).create_if_missing(true);

    let first = FinanceDatabase::open(config.clone()).unwrap();
    first
        .save_price_history(&price_rows(&[("VGS.AX", "2024-01-02", 101.5)]))
        .unwrap();
    drop(first);

    let second = FinanceDatabase::open(config).unwrap();
    assert_eq!(second.store().row_count(PRICE_HISTORY_TABLE).unwrap(), 1);
    assert_eq!(
        second.store().get_all_table_names().unwrap(),
        [PRICE_CURRENT_TABLE, PRICE_HISTORY_TABLE]
    );
    drop(dir);
}

#[test]
fn history_upsert_overwrites_same_day() {
    let (_dir, db) = open();

    db.save_price_history(&price_rows(&[
        ("VGS.AX", "2024-01-02", 101.5),
        ("VGS.AX", "2024-01-03", 102.0),
    ]))
    .unwrap();
    let outcome = db
        .save_price_history(&price_rows(&[
            ("VGS.AX", "2024-01-03", 103.0),
            ("VAS.AX", "2024-01-03", 92.0),
        ]))
        .unwrap();

    assert_eq!(outcome.schema, SchemaOutcome::Preserved);

    let rows = db
        .store()
        .get_query(
            "SELECT ticker_code, date, close FROM price_history",
            &[],
        )
        .unwrap();
    assert_eq!(
        sorted_rows(&rows),
        vec![
            vec!["VAS.AX", "2024-01-03", "92"],
            vec!["VGS.AX", "2024-01-02", "101.5"],
            vec!["VGS.AX", "2024-01-03", "103"],
        ]
    );

    let ids = db
        .store()
        .get_query("SELECT COUNT(DISTINCT id) FROM price_history WHERE id IS NOT NULL", &[])
        .unwrap();
    assert_eq!(ids.rows()[0][0], Value::Integer(3));
}

#[test]
fn current_replace_keeps_schema() {
    let (_dir, db) = open();
    let ddl = db.store().get_table_ddl(PRICE_CURRENT_TABLE).unwrap();

    db.save_price_current(&price_rows(&[("VGS.AX", "2024-01-02", 101.5)]))
        .unwrap();
    let outcome = db
        .save_price_current(&price_rows(&[
            ("VGS.AX", "2024-01-03", 102.0),
            ("VAS.AX", "2024-01-03", 92.0),
        ]))
        .unwrap();

    assert_eq!(outcome.schema, SchemaOutcome::Preserved);
    assert_eq!(db.store().row_count(PRICE_CURRENT_TABLE).unwrap(), 2);
    assert_eq!(db.store().get_table_ddl(PRICE_CURRENT_TABLE).unwrap(), ddl);
}

#[test]
fn current_replace_with_duplicate_ticker_is_rejected() {
    let (_dir, db) = open();
    db.save_price_current(&price_rows(&[("VGS.AX", "2024-01-02", 101.5)]))
        .unwrap();

    let err = db
        .save_price_current(&price_rows(&[
            ("VAS.AX", "2024-01-03", 92.0),
            ("VAS.AX", "2024-01-04", 93.0),
        ]))
        .unwrap_err();

    assert!(matches!(err, Error::Backend { .. }));
    let current = db.store().get_table(PRICE_CURRENT_TABLE).unwrap();
    assert_eq!(current.len(), 1);
    assert_eq!(current.get(0, "ticker_code"), Some(&Value::from("VGS.AX")));
}

#[test]
fn last_recorded_date() {
    let (_dir, db) = open();
    assert_eq!(db.last_recorded_date("VGS.AX").unwrap(), None);

    db.save_price_history(&price_rows(&[
        ("VGS.AX", "2024-01-02", 101.5),
        ("VGS.AX", "2024-01-05 00:00:00", 102.0),
        ("VAS.AX", "2024-02-01", 92.0),
    ]))
    .unwrap();

    assert_eq!(db.last_recorded_date("VGS.AX").unwrap(), Some(day("2024-01-05")));
    assert_eq!(db.last_recorded_date("VAS.AX").unwrap(), Some(day("2024-02-01")));
    assert_eq!(db.last_recorded_date("'; DROP TABLE price_history; --").unwrap(), None);
}

#[test]
fn last_recorded_date_rejects_garbage() {
    let (_dir, db) = open();
    db.save_price_history(&price_rows(&[("VGS.AX", "yesterday", 1.0)]))
        .unwrap();

    assert!(matches!(
        db.last_recorded_date("VGS.AX"),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn delete_last_n_days_removes_recent_history() {
    let (_dir, db) = open();
    db.save_price_history(&price_rows(&[
        ("VGS.AX", "2024-01-01", 1.0),
        ("VGS.AX", "2024-01-08", 2.0),
        ("VGS.AX", "2024-01-09", 3.0),
        ("VGS.AX", "2024-01-10", 4.0),
    ]))
    .unwrap();

    let deleted = db.delete_last_n_days(2, day("2024-01-10")).unwrap();

    // On or after 2024-01-08.
    assert_eq!(deleted, 3);
    assert_eq!(db.last_recorded_date("VGS.AX").unwrap(), Some(day("2024-01-01")));
}

#[test]
fn download_columns_normalize_onto_table() {
    let (_dir, db) = open();
    let headers = ["Ticker Code", "Date", "Open", "Close", "Stock Splits"];
    let columns: Vec<String> = headers.iter().map(|h| normalize_column_name(h)).collect();

    let batch = RowBatch::from_rows(
        columns,
        vec![vec![
            Value::from("VGS.AX"),
            Value::from(day("2024-01-02")),
            Value::from(100.0),
            Value::from(101.5),
            Value::from(0),
        ]],
    )
    .unwrap();

    let outcome = db.save_price_history(&batch).unwrap();
    assert_eq!(outcome.schema, SchemaOutcome::Preserved);
    assert_eq!(db.last_recorded_date("VGS.AX").unwrap(), Some(day("2024-01-02")));
}
