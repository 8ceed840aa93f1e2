//! Integration tests for the data-access facade.
//!
//! Statements run against a scripted executor, so each test asserts the
//! generated SQL and parameters plus the facade-side behavior: identity
//! write-back, refresh, batch sizing, and rehydration.

#![allow(missing_docs)]

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{
    City, FakeExecutor, Locale, LogLine, PurchaseOrder, assert_sql_contains, dal, date,
    edit_stamp, order_row,
};
use strata::batch::utc_now_for_column;
use strata::{
    BatchOptions, Dal, DalConfig, Error, MySqlDialect, OracleDialect, Row, SqlServerDialect,
    SqlValue,
};

fn orders(count: i32) -> Vec<PurchaseOrder> {
    (1..=count)
        .map(|index| PurchaseOrder {
            id: index,
            supplier_id: 2,
            order_date: date(2024, 1, 1),
            last_edited_when: edit_stamp(),
            ..PurchaseOrder::default()
        })
        .collect()
}

fn cities(count: i64) -> Vec<City> {
    (1..=count)
        .map(|index| City {
            id: index,
            name: format!("city-{index}"),
            population: Some(index * 1000),
        })
        .collect()
}

// Reads

#[test]
fn get_builds_key_lookup_with_aliased_selections() {
    let dal = dal::<PurchaseOrder>(Arc::new(SqlServerDialect));
    dal.executor().queue_rows(vec![order_row(5, 2, date(2024, 1, 1))]);

    let order = dal.get(5).unwrap().unwrap();
    assert_eq!(order.id, 5);
    assert_eq!(order.supplier_id, 2);

    let statement = dal.executor().last_statement();
    assert_sql_contains(
        &statement.sql,
        &[
            "SELECT Purchasing.PurchaseOrders.PurchaseOrderId AS id",
            "Purchasing.PurchaseOrders.supplier_id AS supplier_id",
            "FROM Purchasing.PurchaseOrders",
            "WHERE (Purchasing.PurchaseOrders.PurchaseOrderId) = (@p1)",
            "LIMIT @p2",
        ],
    );
    assert_eq!(statement.params[0], ("p1".to_string(), SqlValue::Int32(5)));
    assert_eq!(statement.params[1], ("p2".to_string(), SqlValue::UInt64(1)));
}

#[test]
fn get_without_match_returns_none() {
    let dal = dal::<PurchaseOrder>(Arc::new(SqlServerDialect));
    assert!(dal.get(404).unwrap().is_none());
}

#[test]
fn get_on_keyless_entity_is_a_configuration_error() {
    let dal = dal::<LogLine>(Arc::new(SqlServerDialect));
    assert!(matches!(dal.get(1), Err(Error::Configuration(_))));
}

#[test]
fn get_all_honors_limit_semantics() {
    let dal = dal::<PurchaseOrder>(Arc::new(SqlServerDialect));
    dal.executor().queue_rows(vec![]);
    dal.get_all(0).unwrap();
    assert!(!dal.executor().last_statement().sql.contains("LIMIT"));

    dal.executor().queue_rows(vec![]);
    dal.get_all(10).unwrap();
    assert!(dal.executor().last_statement().sql.contains("LIMIT"));
}

#[test]
fn query_by_column_and_in_clause() {
    let dal = dal::<PurchaseOrder>(Arc::new(SqlServerDialect));
    dal.executor().queue_rows(vec![]);
    dal.query_by_column("supplier_id", 5).unwrap();
    assert_sql_contains(
        &dal.executor().last_statement().sql,
        &["WHERE (Purchasing.PurchaseOrders.supplier_id) = (@p1)"],
    );

    dal.executor().queue_rows(vec![]);
    dal.query_by_in_clause("supplier_id", [1, 2, 3]).unwrap();
    let statement = dal.executor().last_statement();
    assert_sql_contains(&statement.sql, &["IN (@p1, @p2, @p3)"]);
    assert_eq!(statement.params.len(), 3);
}

#[test]
fn query_by_entity_keys_uses_only_non_null_explicit_keys() {
    let dal = dal::<Locale>(Arc::new(SqlServerDialect));
    dal.executor().queue_rows(vec![]);

    let key_entity = Locale {
        code: Some("en".to_string()),
        region: None,
        display_name: None,
    };
    dal.query_by_entity_keys(&key_entity).unwrap();

    let statement = dal.executor().last_statement();
    assert_eq!(statement.params.len(), 1);
    assert_eq!(
        statement.params[0],
        ("p1".to_string(), SqlValue::Text("en".to_string()))
    );
    assert_sql_contains(&statement.sql, &["WHERE (locales.code) = (@p1)"]);
}

#[test]
fn scalar_reads() {
    let dal = dal::<PurchaseOrder>(Arc::new(SqlServerDialect));

    dal.executor().queue_scalar(Some(SqlValue::Int32(99)));
    assert_eq!(dal.max_of_column::<i32>("supplier_id").unwrap(), Some(99));
    assert_sql_contains(&dal.executor().last_statement().sql, &["MAX("]);

    dal.executor().queue_scalar(None);
    assert_eq!(dal.min_of_column::<i32>("supplier_id").unwrap(), None);

    dal.executor().queue_scalar(Some(SqlValue::Int64(3)));
    assert_eq!(dal.count().unwrap(), 3);
    assert_sql_contains(&dal.executor().last_statement().sql, &["COUNT(*)"]);
}

#[test]
fn records_with_max_value_uses_a_sub_select() {
    let dal = dal::<PurchaseOrder>(Arc::new(SqlServerDialect));
    dal.executor().queue_rows(vec![]);
    dal.records_with_max_value_of_column("supplier_id").unwrap();
    assert_sql_contains(
        &dal.executor().last_statement().sql,
        &["WHERE", "supplier_id = (SELECT MAX"],
    );
}

// Inserts

#[test]
fn insert_writes_identity_back_and_refreshes() {
    let dal = dal::<PurchaseOrder>(Arc::new(SqlServerDialect));
    dal.executor().queue_identity(42);

    let server_stamp = "2024-06-01T12:00:00Z".parse().unwrap();
    dal.executor().queue_rows(vec![Row::from_pairs([
        ("PurchaseOrderId", SqlValue::Int32(42)),
        ("supplier_id", SqlValue::Int32(2)),
        ("last_edited_when", SqlValue::DateTimeUtc(server_stamp)),
    ])]);

    let mut order = PurchaseOrder {
        supplier_id: 2,
        order_date: date(2024, 1, 1),
        last_edited_when: edit_stamp(),
        ..PurchaseOrder::default()
    };
    let identity = dal.insert(&mut order, None).unwrap();

    assert_eq!(identity, 42);
    assert!(order.id > 0, "auto-increment field must be populated");
    assert_eq!(order.id, 42);
    // Server-computed column refreshed from the re-read row.
    assert_eq!(order.last_edited_when, server_stamp);

    let statements = dal.executor().statements();
    assert_eq!(statements.len(), 2);
    assert_sql_contains(
        &statements[0].sql,
        &[
            "INSERT INTO Purchasing.PurchaseOrders",
            "(supplier_id,order_date,expected_delivery_date,supplier_reference,is_order_finalized,last_edited_when)",
            "VALUES (@supplier_id,@order_date,@expected_delivery_date,@supplier_reference,@is_order_finalized,@last_edited_when)",
        ],
    );
    assert_sql_contains(
        &statements[1].sql,
        &[
            "SELECT * FROM Purchasing.PurchaseOrders",
            "WHERE PurchaseOrderId = @PurchaseOrderId",
        ],
    );
    assert_eq!(
        statements[1].params[0],
        ("PurchaseOrderId".to_string(), SqlValue::Int32(42))
    );
}

#[test]
fn insert_value_override_splices_database_side_expression() {
    let dal = dal::<PurchaseOrder>(Arc::new(SqlServerDialect));
    dal.executor().queue_identity(1);

    let touch = utc_now_for_column(dal.dialect(), "last_edited_when");
    let mut order = orders(1).remove(0);
    dal.insert(&mut order, Some(&touch)).unwrap();

    let statement = dal.executor().statements().remove(0);
    assert_sql_contains(&statement.sql, &["SYSUTCDATETIME())"]);
    assert!(
        statement.params.iter().all(|(name, _)| name != "last_edited_when"),
        "overridden column must not be bound"
    );
    assert_eq!(statement.params.len(), 5);
}

#[test]
fn insert_then_delete_then_get_returns_none() {
    let dal = dal::<PurchaseOrder>(Arc::new(SqlServerDialect));
    dal.executor().queue_identity(11);

    let mut order = orders(1).remove(0);
    dal.insert(&mut order, None).unwrap();
    assert_eq!(order.id, 11);

    dal.delete(&order, None).unwrap();
    assert_sql_contains(
        &dal.executor().last_statement().sql,
        &["DELETE FROM Purchasing.PurchaseOrders WHERE PurchaseOrderId = @PurchaseOrderId"],
    );

    assert!(dal.get(11).unwrap().is_none());
}

#[test]
fn end_to_end_insert_then_get_round_trip() {
    let dal = dal::<PurchaseOrder>(Arc::new(SqlServerDialect));
    dal.executor().queue_identity(7);
    dal.executor().queue_rows(vec![order_row(7, 2, date(2024, 1, 1))]);

    let mut order = PurchaseOrder {
        supplier_id: 2,
        order_date: date(2024, 1, 1),
        last_edited_when: edit_stamp(),
        ..PurchaseOrder::default()
    };
    dal.insert(&mut order, None).unwrap();

    dal.executor().queue_rows(vec![order_row(7, 2, date(2024, 1, 1))]);
    let fetched = dal.get(7).unwrap().unwrap();
    assert_eq!(fetched.supplier_id, 2);
    assert_eq!(fetched.order_date, date(2024, 1, 1));
}

// Batch operations

#[test]
fn insert_all_partitions_into_requested_batches() {
    let dal = dal::<City>(Arc::new(MySqlDialect));
    let entities = cities(7);

    let batch_size = dal
        .insert_all(
            &entities,
            BatchOptions { batch_size: Some(3), ..BatchOptions::default() },
        )
        .unwrap();

    assert_eq!(batch_size, 3);
    let statements = dal.executor().statements();
    assert_eq!(statements.len(), 3);
    assert_sql_contains(
        &statements[0].sql,
        &["INSERT INTO cities (name,population) VALUES (@p0,@p1),(@p2,@p3),(@p4,@p5)"],
    );
    // Last chunk carries the single remaining row.
    assert_eq!(statements[2].params.len(), 2);
}

#[test]
fn insert_all_clamps_batch_size_to_parameter_ceiling() {
    let dal = dal::<PurchaseOrder>(Arc::new(SqlServerDialect));
    let entities = orders(10);

    // Six persisted non-auto columns against a 2100-parameter ceiling.
    let batch_size = dal
        .insert_all(
            &entities,
            BatchOptions { batch_size: Some(100_000), ..BatchOptions::default() },
        )
        .unwrap();

    assert_eq!(batch_size, 2100 / 6);
    assert_eq!(dal.executor().statements().len(), 1);
}

#[test]
fn insert_all_parameter_names_are_unique_within_a_statement() {
    let dal = dal::<City>(Arc::new(MySqlDialect));
    dal.insert_all(&cities(5), BatchOptions::default()).unwrap();

    let statement = dal.executor().last_statement();
    let mut names: Vec<&str> = statement.params.iter().map(|(name, _)| name.as_str()).collect();
    let total = names.len();
    names.sort_unstable();
    names.dedup();
    assert_eq!(names.len(), total);
    assert_eq!(total, 10);
}

#[test]
fn insert_all_parallel_inserts_every_row_exactly_once() {
    let sequential = dal::<City>(Arc::new(MySqlDialect));
    let parallel = dal::<City>(Arc::new(MySqlDialect));
    let entities = cities(7);
    let options = BatchOptions { batch_size: Some(2), ..BatchOptions::default() };

    sequential.insert_all(&entities, options).unwrap();
    parallel
        .insert_all(&entities, BatchOptions { parallel: true, ..options })
        .unwrap();

    let count_rows = |executor: &FakeExecutor| -> usize {
        executor
            .statements()
            .iter()
            .map(|statement| statement.sql.matches('(').count() - 1)
            .sum()
    };
    assert_eq!(count_rows(sequential.executor()), 7);
    assert_eq!(count_rows(parallel.executor()), 7);
}

#[test]
fn insert_all_on_oracle_emits_insert_all_form() {
    let dal = dal::<City>(Arc::new(OracleDialect));
    dal.insert_all(&cities(2), BatchOptions::default()).unwrap();

    assert_sql_contains(
        &dal.executor().last_statement().sql,
        &[
            "INSERT ALL",
            "INTO cities (name,population) VALUES (:p0,:p1)",
            "INTO cities (name,population) VALUES (:p2,:p3)",
            "SELECT 1 FROM DUAL",
        ],
    );
}

#[test]
fn parallel_failure_runs_all_chunks_and_surfaces_the_error() {
    let dal = dal::<City>(Arc::new(MySqlDialect));
    dal.executor().fail_executes("connection reset");

    let result = dal.insert_all(
        &cities(7),
        BatchOptions { batch_size: Some(3), parallel: true, ..BatchOptions::default() },
    );

    assert!(matches!(result, Err(Error::Execution(_))));
    // No chunk is cancelled; every statement was attempted.
    assert_eq!(dal.executor().statements().len(), 3);
}

#[test]
fn update_all_uses_the_values_join_pattern() {
    let dal = dal::<PurchaseOrder>(Arc::new(SqlServerDialect));
    let mut entities = orders(3);
    for order in &mut entities {
        order.supplier_id = 5;
    }

    // One key plus six update columns per row against 2100 leaves the
    // requested default of 100 untouched.
    let batch_size = dal.update_all(&entities, BatchOptions::default()).unwrap();
    assert_eq!(batch_size, 100);

    let statement = dal.executor().last_statement();
    assert_sql_contains(
        &statement.sql,
        &[
            "UPDATE Purchasing.PurchaseOrders SET",
            "supplier_id = Purchasing_PurchaseOrders_Values.supplier_id",
            "FROM Purchasing.PurchaseOrders INNER JOIN (VALUES",
            "AS Purchasing_PurchaseOrders_Values (PurchaseOrderId,supplier_id",
            "ON Purchasing.PurchaseOrders.PurchaseOrderId = Purchasing_PurchaseOrders_Values.PurchaseOrderId",
        ],
    );
    // Three rows of key + six update columns.
    assert_eq!(statement.params.len(), 21);
}

#[test]
fn update_all_then_query_by_column_finds_the_updated_rows() {
    let dal = dal::<PurchaseOrder>(Arc::new(SqlServerDialect));
    let mut entities = orders(3);
    for order in &mut entities {
        order.supplier_id = 5;
    }
    dal.update_all(&entities, BatchOptions::default()).unwrap();

    dal.executor().queue_rows(vec![
        order_row(1, 5, date(2024, 1, 1)),
        order_row(2, 5, date(2024, 1, 1)),
        order_row(3, 5, date(2024, 1, 1)),
    ]);
    let updated = dal.query_by_column("supplier_id", 5).unwrap();
    assert_eq!(updated.len(), 3);
    assert!(updated.iter().all(|order| order.supplier_id == 5));
}

#[test]
fn update_all_is_rejected_off_sql_server() {
    let dal = dal::<PurchaseOrder>(Arc::new(MySqlDialect));
    let result = dal.update_all(&orders(2), BatchOptions::default());
    assert!(matches!(result, Err(Error::Unsupported(_))));
}

#[test]
fn update_all_without_keys_is_a_configuration_error() {
    let dal = dal::<LogLine>(Arc::new(SqlServerDialect));
    let lines = vec![LogLine { message: "a".to_string() }];
    assert!(matches!(
        dal.update_all(&lines, BatchOptions::default()),
        Err(Error::Configuration(_))
    ));
}

#[test]
fn delete_all_uses_the_values_join_pattern_on_key_columns() {
    let dal = dal::<PurchaseOrder>(Arc::new(SqlServerDialect));
    dal.delete_all(&orders(2), BatchOptions::default()).unwrap();

    let statement = dal.executor().last_statement();
    assert_sql_contains(
        &statement.sql,
        &[
            "DELETE Purchasing.PurchaseOrders FROM Purchasing.PurchaseOrders INNER JOIN (VALUES",
            "AS Purchasing_PurchaseOrders_Values (PurchaseOrderId)",
            "ON Purchasing.PurchaseOrders.PurchaseOrderId = Purchasing_PurchaseOrders_Values.PurchaseOrderId",
        ],
    );
    assert_eq!(statement.params.len(), 2);
}

#[test]
fn delete_all_is_rejected_off_sql_server() {
    let dal = dal::<PurchaseOrder>(Arc::new(OracleDialect));
    assert!(matches!(
        dal.delete_all(&orders(1), BatchOptions::default()),
        Err(Error::Unsupported(_))
    ));
}

// Single-row update and targeted deletes

#[test]
fn update_sets_non_key_columns_and_filters_by_key() {
    let dal = dal::<PurchaseOrder>(Arc::new(SqlServerDialect));
    let mut order = orders(1).remove(0);
    order.id = 9;

    dal.update(&mut order, None).unwrap();

    let statements = dal.executor().statements();
    assert_sql_contains(
        &statements[0].sql,
        &[
            "UPDATE Purchasing.PurchaseOrders SET supplier_id = @supplier_id",
            "WHERE PurchaseOrderId = @PurchaseOrderId",
        ],
    );
    assert!(!statements[0].sql.contains("SET PurchaseOrderId"));
    // Refresh re-read follows the update.
    assert_sql_contains(&statements[1].sql, &["SELECT * FROM Purchasing.PurchaseOrders"]);
}

#[test]
fn delete_by_id_and_in_clause() {
    let dal = dal::<PurchaseOrder>(Arc::new(SqlServerDialect));

    dal.delete_by_id(5).unwrap();
    assert_sql_contains(
        &dal.executor().last_statement().sql,
        &["DELETE FROM Purchasing.PurchaseOrders", "WHERE", "= (@p1)"],
    );

    dal.delete_by_in_clause("supplier_id", [1, 2]).unwrap();
    assert_sql_contains(&dal.executor().last_statement().sql, &["IN (@p1, @p2)"]);
}

#[test]
fn delete_by_key_column_deduplicates_key_values() {
    let dal = dal::<PurchaseOrder>(Arc::new(SqlServerDialect));
    let mut entities = orders(3);
    entities[1].id = entities[0].id;
    entities[2].id = 6;

    dal.delete_by_key_column(&entities).unwrap();
    let statement = dal.executor().last_statement();
    assert_eq!(statement.params.len(), 2);
}

#[test]
fn delete_all_rows_and_truncate() {
    let dal = dal::<PurchaseOrder>(Arc::new(SqlServerDialect));

    dal.delete_all_rows().unwrap();
    assert_eq!(
        dal.executor().last_statement().sql,
        "DELETE FROM Purchasing.PurchaseOrders"
    );

    dal.truncate().unwrap();
    assert_eq!(
        dal.executor().last_statement().sql,
        "TRUNCATE TABLE Purchasing.PurchaseOrders"
    );
}

#[test]
fn update_where_builds_a_dictionary_update() {
    let dal = dal::<PurchaseOrder>(Arc::new(SqlServerDialect));
    dal.update_where(
        [("supplier_id".to_string(), 2.into())],
        [("is_order_finalized".to_string(), true.into())],
    )
    .unwrap();

    let statement = dal.executor().last_statement();
    assert_sql_contains(
        &statement.sql,
        &["UPDATE Purchasing.PurchaseOrders SET is_order_finalized = @p1", "WHERE"],
    );
    assert_eq!(statement.params.len(), 2);
}

// Configuration plumbing

#[test]
fn logger_hook_sees_every_statement_before_execution() {
    let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let config = DalConfig::new(Arc::new(SqlServerDialect))
        .with_logger(Arc::new(move |info| sink.lock().unwrap().push(info.sql.clone())));
    let dal: Dal<PurchaseOrder, _> = Dal::new(FakeExecutor::new(), config);

    dal.executor().queue_identity(1);
    let mut order = orders(1).remove(0);
    dal.insert(&mut order, None).unwrap();
    dal.executor().queue_rows(vec![]);
    dal.get_all(0).unwrap();

    let logged = log.lock().unwrap();
    assert_eq!(logged.len(), dal.executor().statements().len());
    assert!(logged[0].starts_with("INSERT INTO"));
}

#[test]
fn command_timeout_reaches_the_executor() {
    let config = DalConfig::new(Arc::new(SqlServerDialect))
        .with_timeout(Duration::from_secs(9));
    let dal: Dal<PurchaseOrder, _> = Dal::new(FakeExecutor::new(), config);

    dal.executor().queue_scalar(Some(SqlValue::Int64(0)));
    dal.count().unwrap();
    assert_eq!(dal.executor().timeouts(), vec![Some(Duration::from_secs(9))]);
}

#[test]
fn with_table_overrides_the_target_table() {
    let dal = dal::<PurchaseOrder>(Arc::new(SqlServerDialect)).with_table("Archive.PurchaseOrders");
    dal.delete_all_rows().unwrap();
    assert_eq!(
        dal.executor().last_statement().sql,
        "DELETE FROM Archive.PurchaseOrders"
    );
}

// Async surface

#[tokio::test]
async fn async_get_matches_sync_shape() {
    let dal = dal::<PurchaseOrder>(Arc::new(SqlServerDialect));
    dal.executor().queue_rows(vec![order_row(5, 2, date(2024, 1, 1))]);

    let order = dal.get_async(5).await.unwrap().unwrap();
    assert_eq!(order.id, 5);
    assert_sql_contains(
        &dal.executor().last_statement().sql,
        &["WHERE (Purchasing.PurchaseOrders.PurchaseOrderId) = (@p1)", "LIMIT @p2"],
    );
}

#[tokio::test]
async fn async_insert_writes_identity_back() {
    let dal = dal::<PurchaseOrder>(Arc::new(SqlServerDialect));
    dal.executor().queue_identity(21);

    let mut order = orders(1).remove(0);
    let identity = dal.insert_async(&mut order, None).await.unwrap();
    assert_eq!(identity, 21);
    assert_eq!(order.id, 21);
}

#[tokio::test]
async fn async_parallel_insert_all_inserts_every_row() {
    let dal = dal::<City>(Arc::new(MySqlDialect));
    let batch_size = dal
        .insert_all_async(
            &cities(7),
            BatchOptions { batch_size: Some(3), parallel: true, ..BatchOptions::default() },
        )
        .await
        .unwrap();

    assert_eq!(batch_size, 3);
    assert_eq!(dal.executor().statements().len(), 3);
}

#[tokio::test]
async fn async_update_all_is_rejected_off_sql_server() {
    let dal = dal::<PurchaseOrder>(Arc::new(MySqlDialect));
    let result = dal.update_all_async(&orders(2), BatchOptions::default()).await;
    assert!(matches!(result, Err(Error::Unsupported(_))));
}
