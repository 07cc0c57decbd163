/// Integration tests for the PostgreSQL snapshot store
///
/// These tests verify:
/// 1. Schema creation is idempotent
/// 2. A batch is written atomically and readable per partition
/// 3. Latest lookup honours recency ordering and tie-breaks
/// 4. Attributes survive the jsonb round trip
///
/// Prerequisites:
/// - PostgreSQL reachable at DATABASE_URL (set in .env or the environment)
///
/// Run with: cargo test --test postgres_store -- --ignored --test-threads=1
///
/// All rows written here use partition keys starting with `TEST` and are
/// deleted before and after each test.

use chrono::{FixedOffset, TimeZone, Utc};
use serde_json::json;

use covid_alert_service::model::{CanonicalRecord, Partition, RawRecord, Table};
use covid_alert_service::normalize::Normalizer;
use covid_alert_service::store::{PostgresStore, SnapshotStore};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const TEST_PREFIX: &str = "TEST";

fn get_test_store() -> PostgresStore {
    dotenv::dotenv().ok();
    let url = std::env::var("DATABASE_URL").unwrap_or_else(|_| {
        eprintln!("\nDATABASE_URL must be set to run the postgres store tests.\n");
        panic!("DATABASE_URL not set");
    });

    let mut store = PostgresStore::connect(&url).expect("failed to connect to test database");
    store.ensure_schema().expect("failed to create snapshot tables");
    cleanup_test_data(&mut store);
    store
}

fn cleanup_test_data(store: &mut PostgresStore) {
    store
        .delete_partitions_with_prefix(Table::StatesCurrent, TEST_PREFIX)
        .expect("failed to clean up test rows");
}

fn region_record(code: &str, positive: i64, epoch: i64, check_epoch: Option<i64>) -> CanonicalRecord {
    CanonicalRecord {
        partition: Partition::Region(code.to_string()),
        positive,
        negative: 10,
        pending: 0,
        death: 1,
        total: positive + 10,
        last_update_label: "3/15 13:00".to_string(),
        last_update_epoch: epoch,
        check_time_label: check_epoch.map(|_| "3/15 16:30".to_string()),
        check_time_epoch: check_epoch,
        attributes: RawRecord::new(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
#[ignore] // requires a database
fn test_ensure_schema_is_idempotent() {
    let mut store = get_test_store();
    store.ensure_schema().expect("second schema creation should be a no-op");
    store.ensure_schema().expect("third schema creation should be a no-op");
}

#[test]
#[ignore] // requires a database
fn test_batch_is_readable_per_partition() {
    let mut store = get_test_store();
    let batch = vec![
        region_record("TESTWA", 904, 1_000, None),
        region_record("TESTCA", 426, 1_000, None),
    ];

    let written = store
        .append_batch(Table::StatesCurrent, &batch)
        .expect("batch should be written");
    assert_eq!(written, 2);

    let wa = store
        .get_latest(&Partition::Region("TESTWA".to_string()))
        .unwrap()
        .expect("TESTWA should have history");
    assert_eq!(wa.positive, 904);
    assert_eq!(
        store.get_latest(&Partition::Region("TESTOR".to_string())).unwrap(),
        None
    );

    cleanup_test_data(&mut store);
}

#[test]
#[ignore] // requires a database
fn test_latest_follows_epoch_then_check_time_then_insertion() {
    let mut store = get_test_store();
    let partition = Partition::Region("TESTNY".to_string());

    store
        .append_batch(Table::StatesCurrent, &[region_record("TESTNY", 100, 2_000, Some(5))])
        .unwrap();
    store
        .append_batch(Table::StatesCurrent, &[region_record("TESTNY", 50, 1_000, Some(9))])
        .unwrap();
    let latest = store.get_latest(&partition).unwrap().unwrap();
    assert_eq!(latest.positive, 100, "older epoch must not win by insertion order");

    store
        .append_batch(Table::StatesCurrent, &[region_record("TESTNY", 120, 2_000, Some(7))])
        .unwrap();
    let latest = store.get_latest(&partition).unwrap().unwrap();
    assert_eq!(latest.positive, 120, "later check time breaks the tie");

    store
        .append_batch(Table::StatesCurrent, &[region_record("TESTNY", 130, 2_000, Some(7))])
        .unwrap();
    let latest = store.get_latest(&partition).unwrap().unwrap();
    assert_eq!(latest.positive, 130, "most recent insert breaks a full tie");
    assert_eq!(store.history_len(&partition).unwrap(), 4);

    cleanup_test_data(&mut store);
}

#[test]
#[ignore] // requires a database
fn test_normalized_row_round_trips_with_attributes() {
    let mut store = get_test_store();
    let normalizer = Normalizer::new(2020, FixedOffset::west_opt(4 * 3600).unwrap());
    let now = Utc.with_ymd_and_hms(2020, 3, 16, 12, 0, 0).unwrap();

    let raw = json!({
        "state": "TESTMA",
        "positive": "164",
        "negative": 353,
        "grade": "A",
        "lastUpdateEt": "3/15 13:00",
        "checkTimeEt": "3/15 16:30"
    });
    let record = normalizer.normalize(raw.as_object().unwrap(), now);

    store
        .append_batch(Table::StatesCurrent, std::slice::from_ref(&record))
        .unwrap();
    let stored = store.get_latest(&record.partition).unwrap().unwrap();

    assert_eq!(stored.positive, 164);
    assert_eq!(stored.last_update_epoch, 1_584_291_600);
    assert_eq!(stored.check_time_label.as_deref(), Some("3/15 16:30"));
    assert_eq!(stored.attributes.get("grade"), Some(&json!("A")));

    cleanup_test_data(&mut store);
}
