mod common;

use findb::{StoreConfig, TabularStore};

use common::{create_temp_db_file, create_temp_store, open_read_write};

const TRADES_DDL: &str = "CREATE TABLE trades (\n    id TEXT PRIMARY KEY,\n    qty BIGINT NOT NULL,\n    price FLOAT CHECK (price > 0)\n)";

#[test]
fn ddl_round_trips_through_drop_and_recreate() {
    let (_dir, store) = create_temp_store();
    store.execute_batch(TRADES_DDL).unwrap();
    let columns = store.table_columns("trades").unwrap();

    let captured = store.get_table_ddl("trades").unwrap();
    store.drop_table("trades").unwrap();
    assert!(!store.table_exists("trades"));

    store.execute_batch(&captured).unwrap();
    let recreated = store.get_table_ddl("trades").unwrap();

    assert_eq!(recreated, captured);
    assert_eq!(recreated, TRADES_DDL);
    assert_eq!(store.table_columns("trades").unwrap(), columns);
}

#[test]
fn ddl_round_trips_into_another_database() {
    let (_dir, store) = create_temp_store();
    let ddl = TRADES_DDL;
    store.execute_batch(ddl).unwrap();

    let captured = store.get_table_ddl("trades").unwrap();
    assert_eq!(captured, ddl);

    let (_other_dir, other) = create_temp_store();
    other.execute_batch(&captured).unwrap();
    assert_eq!(other.get_table_ddl("trades").unwrap(), ddl);
    assert_eq!(other.table_columns("trades").unwrap(), store.table_columns("trades").unwrap());
}

#[test]
fn ddl_lookup_is_parameterized_and_case_insensitive() {
    let (_dir, store) = create_temp_store();
    store.execute_batch("CREATE TABLE Prices (a)").unwrap();

    assert_eq!(store.get_table_ddl("prices").unwrap(), "CREATE TABLE Prices (a)");
    assert!(store.get_table_ddl("sqlite_master").unwrap_err().is_not_found());
}

#[test]
fn table_names_exclude_internal_tables() {
    let (_dir, store) = create_temp_store();
    store
        .execute_batch(
            "CREATE TABLE b (id INTEGER PRIMARY KEY AUTOINCREMENT);
             CREATE TABLE a (x);",
        )
        .unwrap();

    // AUTOINCREMENT creates sqlite_sequence.
    assert_eq!(store.get_all_table_names().unwrap(), ["a", "b"]);
}

#[test]
fn store_sees_tables_created_outside_it() {
    let (_dir, path) = create_temp_db_file("shared.db");
    let store = TabularStore::open(StoreConfig::new(&path).create_if_missing(true)).unwrap();

    let conn = open_read_write(&path);
    conn.execute_batch("CREATE TABLE external (v TEXT); INSERT INTO external VALUES ('hi');")
        .unwrap();
    drop(conn);

    assert!(store.table_exists("external"));
    assert_eq!(store.get_table("external").unwrap().len(), 1);

    store.drop_table("external").unwrap();
    assert!(!store.table_exists("external"));
}
