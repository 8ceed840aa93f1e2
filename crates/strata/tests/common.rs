//! Common test helpers shared across integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use strata::{
    AsyncExecutor, BoxError, Dal, DalConfig, Dialect, Entity, Executor, Row, SqlInfo, SqlValue,
    entity,
};

/// A facade over a fresh scripted executor.
pub fn dal<M: Entity>(dialect: Arc<dyn Dialect>) -> Dal<M, FakeExecutor> {
    Dal::new(FakeExecutor::new(), DalConfig::new(dialect))
}

// Test entities modeled on a purchasing schema with schema-qualified
// tables, column overrides, and navigation fields.

entity! {
    table = "Purchasing.PurchaseOrders",
    keys = [id],
    auto = [id => "PurchaseOrderId"],
    columns = [(id, "PurchaseOrderId")],
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct PurchaseOrder {
        pub id: i32,
        pub supplier_id: i32,
        pub order_date: NaiveDate,
        pub expected_delivery_date: Option<NaiveDate>,
        pub supplier_reference: Option<String>,
        pub is_order_finalized: bool,
        pub last_edited_when: DateTime<Utc>,
        nav purchase_order_lines: Vec<PurchaseOrderLine>,
    }
}

entity! {
    table = "Purchasing.PurchaseOrderLines",
    keys = [id],
    auto = [id => "PurchaseOrderLineId"],
    columns = [(id, "PurchaseOrderLineId")],
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct PurchaseOrderLine {
        pub id: i32,
        pub purchase_order_id: i32,
        pub package_type_id: i32,
        pub description: Option<String>,
        nav package: Option<PackageType>,
    }
}

entity! {
    table = "Warehouse.PackageTypes",
    keys = [id],
    columns = [(id, "PackageTypeId")],
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct PackageType {
        pub id: i32,
        pub package_type_name: String,
    }
}

entity! {
    table = "cities",
    keys = [id],
    auto = [id],
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct City {
        pub id: i64,
        pub name: String,
        pub population: Option<i64>,
    }
}

entity! {
    table = "locales",
    explicit = [code, region],
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Locale {
        pub code: Option<String>,
        pub region: Option<String>,
        pub display_name: Option<String>,
    }
}

entity! {
    table = "logs",
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct LogLine {
        pub message: String,
    }
}

/// A full flat row for one purchase order, aliased by field name the way
/// the selection builder projects it.
pub fn order_row(id: i32, supplier_id: i32, order_date: NaiveDate) -> Row {
    Row::from_pairs([
        ("id", SqlValue::Int32(id)),
        ("supplier_id", SqlValue::Int32(supplier_id)),
        ("order_date", SqlValue::Date(order_date)),
        ("expected_delivery_date", SqlValue::Null),
        ("supplier_reference", SqlValue::Null),
        ("is_order_finalized", SqlValue::Bool(false)),
        ("last_edited_when", SqlValue::DateTimeUtc(edit_stamp())),
    ])
}

/// Extends an order row with one line's prefixed columns.
pub fn with_line(row: &Row, line_id: i32, order_id: i32, package_type_id: i32) -> Row {
    let mut row = row.clone();
    row.fields.extend(
        Row::from_pairs([
            ("purchase_order_lines_id", SqlValue::Int32(line_id)),
            ("purchase_order_lines_purchase_order_id", SqlValue::Int32(order_id)),
            ("purchase_order_lines_package_type_id", SqlValue::Int32(package_type_id)),
            ("purchase_order_lines_description", SqlValue::Null),
        ])
        .fields,
    );
    row
}

/// Extends a line-bearing row with the line's package type columns.
pub fn with_package_type(row: &Row, package_type_id: i32, name: &str) -> Row {
    let mut row = row.clone();
    row.fields.extend(
        Row::from_pairs([
            ("purchase_order_lines_package_id", SqlValue::Int32(package_type_id)),
            (
                "purchase_order_lines_package_package_type_name",
                SqlValue::Text(name.to_string()),
            ),
        ])
        .fields,
    );
    row
}

pub fn edit_stamp() -> DateTime<Utc> {
    "2024-03-01T08:00:00Z".parse().expect("valid timestamp")
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

/// Scripted executor: records every statement and timeout it receives and
/// answers from queued responses.
#[derive(Default)]
pub struct FakeExecutor {
    statements: Mutex<Vec<SqlInfo>>,
    timeouts: Mutex<Vec<Option<Duration>>>,
    rows: Mutex<VecDeque<Vec<Row>>>,
    scalars: Mutex<VecDeque<Option<SqlValue>>>,
    identities: Mutex<VecDeque<i64>>,
    execute_failure: Mutex<Option<String>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_rows(&self, rows: Vec<Row>) {
        self.rows.lock().unwrap().push_back(rows);
    }

    pub fn queue_scalar(&self, value: Option<SqlValue>) {
        self.scalars.lock().unwrap().push_back(value);
    }

    pub fn queue_identity(&self, identity: i64) {
        self.identities.lock().unwrap().push_back(identity);
    }

    /// Makes every subsequent `execute` call fail with the given message.
    pub fn fail_executes(&self, message: &str) {
        *self.execute_failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn statements(&self) -> Vec<SqlInfo> {
        self.statements.lock().unwrap().clone()
    }

    pub fn timeouts(&self) -> Vec<Option<Duration>> {
        self.timeouts.lock().unwrap().clone()
    }

    pub fn last_statement(&self) -> SqlInfo {
        self.statements
            .lock()
            .unwrap()
            .last()
            .expect("no statement recorded")
            .clone()
    }

    fn record(&self, statement: &SqlInfo, timeout: Option<Duration>) {
        self.statements.lock().unwrap().push(statement.clone());
        self.timeouts.lock().unwrap().push(timeout);
    }
}

impl Executor for FakeExecutor {
    fn query(&self, statement: &SqlInfo, timeout: Option<Duration>) -> Result<Vec<Row>, BoxError> {
        self.record(statement, timeout);
        Ok(self.rows.lock().unwrap().pop_front().unwrap_or_default())
    }

    fn query_scalar(
        &self, statement: &SqlInfo, timeout: Option<Duration>,
    ) -> Result<Option<SqlValue>, BoxError> {
        self.record(statement, timeout);
        Ok(self.scalars.lock().unwrap().pop_front().unwrap_or(None))
    }

    fn execute(&self, statement: &SqlInfo, timeout: Option<Duration>) -> Result<u64, BoxError> {
        self.record(statement, timeout);
        if let Some(message) = self.execute_failure.lock().unwrap().clone() {
            return Err(message.into());
        }
        Ok(1)
    }

    fn insert(
        &self, statement: &SqlInfo, _sequence: Option<&str>, timeout: Option<Duration>,
    ) -> Result<i64, BoxError> {
        self.record(statement, timeout);
        Ok(self.identities.lock().unwrap().pop_front().unwrap_or(1))
    }
}

impl AsyncExecutor for FakeExecutor {
    async fn query(
        &self, statement: &SqlInfo, timeout: Option<Duration>,
    ) -> Result<Vec<Row>, BoxError> {
        <Self as Executor>::query(self, statement, timeout)
    }

    async fn query_scalar(
        &self, statement: &SqlInfo, timeout: Option<Duration>,
    ) -> Result<Option<SqlValue>, BoxError> {
        <Self as Executor>::query_scalar(self, statement, timeout)
    }

    async fn execute(
        &self, statement: &SqlInfo, timeout: Option<Duration>,
    ) -> Result<u64, BoxError> {
        <Self as Executor>::execute(self, statement, timeout)
    }

    async fn insert(
        &self, statement: &SqlInfo, sequence: Option<&str>, timeout: Option<Duration>,
    ) -> Result<i64, BoxError> {
        <Self as Executor>::insert(self, statement, sequence, timeout)
    }
}

/// Normalize SQL by collapsing whitespace.
fn normalize_sql(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonicalize SQL for comparison by removing identifier quotes and
/// normalizing whitespace. Preserves quotes inside string literals.
fn canonicalize_sql(sql: &str) -> String {
    let mut cleaned = String::with_capacity(sql.len());
    let mut in_single_quote = false;

    for ch in sql.chars() {
        match ch {
            '\'' => {
                in_single_quote = !in_single_quote;
                cleaned.push(ch);
            }
            '"' | '`' if !in_single_quote => {
                // Strip identifier quoting to avoid brittle comparisons.
            }
            _ => cleaned.push(ch),
        }
    }

    normalize_sql(&cleaned)
}

/// Assert that SQL contains all expected fragments in order.
///
/// Strips identifier quotes, normalizes whitespace, and checks that
/// fragments appear sequentially in the generated SQL.
pub fn assert_sql_contains(actual: &str, fragments: &[&str]) {
    let actual_canonical = canonicalize_sql(actual);
    let mut search_start = 0usize;

    for fragment in fragments {
        let fragment_canonical = canonicalize_sql(fragment);
        if fragment_canonical.is_empty() {
            continue;
        }

        if let Some(pos) = actual_canonical[search_start..].find(&fragment_canonical) {
            search_start += pos + fragment_canonical.len();
        } else {
            panic!(
                "expected SQL fragment `{fragment_canonical}` not found in `{actual_canonical}`"
            );
        }
    }
}
