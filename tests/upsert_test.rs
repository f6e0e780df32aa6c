mod common;

use findb::{Error, SaveOptions, SchemaOutcome, Value, WritePolicy};

use common::{batch, create_temp_store, price_rows, sorted_rows};

fn upsert() -> SaveOptions {
    SaveOptions::new(WritePolicy::Upsert).unique_key(["ticker_code", "date"])
}

#[test]
fn upsert_inserts_new_and_updates_existing() {
    let (_dir, store) = create_temp_store();
    store
        .save_data(
            &price_rows(&[("A", "2024-01-01", 1.0), ("B", "2024-01-01", 2.0)]),
            "prices",
            &upsert().auto_create(true),
        )
        .unwrap();

    let outcome = store
        .save_data(
            &price_rows(&[("A", "2024-01-01", 10.0), ("C", "2024-01-01", 3.0)]),
            "prices",
            &upsert(),
        )
        .unwrap();

    assert_eq!(outcome.schema, SchemaOutcome::Preserved);
    assert_eq!(outcome.rows_written, 2);
    assert_eq!(store.row_count("prices").unwrap(), 3);
    assert_eq!(
        sorted_rows(&store.get_table("prices").unwrap()),
        vec![
            vec!["A", "2024-01-01", "10"],
            vec!["B", "2024-01-01", "2"],
            vec!["C", "2024-01-01", "3"],
        ]
    );
}

#[test]
fn auto_created_upsert_table_has_unique_index() {
    let (_dir, store) = create_temp_store();
    let outcome = store
        .save_data(
            &price_rows(&[("A", "2024-01-01", 1.0), ("A", "2024-01-01", 1.5)]),
            "prices",
            &upsert().auto_create(true),
        )
        .unwrap();

    assert_eq!(outcome.schema, SchemaOutcome::Created);
    assert_eq!(store.row_count("prices").unwrap(), 1);

    let index = store
        .get_query(
            "SELECT sql FROM sqlite_master WHERE type = 'index' AND tbl_name = ?1",
            &[Value::from("prices")],
        )
        .unwrap();
    assert_eq!(
        index.rows()[0][0],
        Value::from("CREATE UNIQUE INDEX [ux_prices_ticker_code_date] ON [prices] ([ticker_code], [date])")
    );
}

#[test]
fn upsert_with_only_key_columns_skips_duplicates() {
    let (_dir, store) = create_temp_store();
    let options = SaveOptions::new(WritePolicy::Upsert)
        .unique_key(["ticker_code"])
        .auto_create(true);
    let tickers = |names: &[&str]| {
        batch(
            &["ticker_code"],
            names.iter().map(|n| vec![Value::from(*n)]).collect(),
        )
    };

    store.save_data(&tickers(&["A", "B"]), "tickers", &options).unwrap();
    let outcome = store
        .save_data(&tickers(&["B", "C"]), "tickers", &options)
        .unwrap();

    assert_eq!(outcome.rows_written, 1);
    assert_eq!(store.row_count("tickers").unwrap(), 3);
}

#[test]
fn upsert_without_matching_constraint_fails_and_writes_nothing() {
    let (_dir, store) = create_temp_store();
    store
        .execute_batch("CREATE TABLE prices (ticker_code TEXT, date TEXT, close REAL)")
        .unwrap();

    let err = store
        .save_data(&price_rows(&[("A", "2024-01-01", 1.0)]), "prices", &upsert())
        .unwrap_err();

    assert!(matches!(err, Error::Backend { .. }));
    assert_eq!(store.row_count("prices").unwrap(), 0);
}

#[test]
fn upsert_failure_mid_batch_rolls_back() {
    let (_dir, store) = create_temp_store();
    store
        .execute_batch(
            "CREATE TABLE prices (ticker_code TEXT, date TEXT, close REAL NOT NULL);
             CREATE UNIQUE INDEX ux ON prices (ticker_code, date);",
        )
        .unwrap();

    let rows = batch(
        &["ticker_code", "date", "close"],
        vec![
            vec![Value::from("A"), Value::from("2024-01-01"), Value::from(1.0)],
            vec![Value::from("B"), Value::from("2024-01-01"), Value::Null],
        ],
    );
    assert!(store.save_data(&rows, "prices", &upsert()).is_err());
    assert_eq!(store.row_count("prices").unwrap(), 0);
}

#[test]
fn upsert_key_names_are_sanitized() {
    let (_dir, store) = create_temp_store();
    let rows = batch(
        &["ticker code", "close"],
        vec![vec![Value::from("A"), Value::from(1.0)]],
    );
    let options = SaveOptions::new(WritePolicy::Upsert)
        .unique_key(["ticker code"])
        .auto_create(true);

    store.save_data(&rows, "t", &options).unwrap();
    store.save_data(&rows, "t", &options).unwrap();
    assert_eq!(store.row_count("t").unwrap(), 1);
}
