//! The composable query object.
//!
//! A [`Query`] accumulates projections, joins, predicates, and ordering,
//! then delegates compilation to `sea-query` through the dialect-aware
//! backend. The compiled output is a [`SqlInfo`]: statement text with named
//! placeholders plus the ordered parameter list.

use sea_query::{Alias, ColumnRef, Expr, Func, Order, Value};

use crate::dialect::{Dialect, StatementCompiler};
use crate::error::Result;
use crate::executor::SqlInfo;
use crate::filter::Filter;
use crate::join::Join;
use crate::select::{Selection, column_expression, table_column, table_ref};
use crate::value::from_query_values;

/// How absent values behave in [`Query::and_where_opt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NullHandling {
    /// Omit the predicate entirely when the value is NULL or empty.
    #[default]
    SkipPredicate,
    /// Emit `column IS NULL` when the value is NULL or empty.
    MatchNull,
}

#[derive(Debug, Clone)]
enum QueryKind {
    Select,
    Count,
    Max(String),
    Min(String),
    Delete,
    Update(Vec<(String, Value)>),
}

/// A single-table query under composition, possibly joined to others.
#[derive(Debug, Clone)]
pub struct Query {
    table: String,
    kind: QueryKind,
    selections: Vec<Selection>,
    joins: Vec<Join>,
    filters: Vec<Filter>,
    order: Vec<(Option<String>, String, Order)>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl Query {
    /// Creates a query over `table`. With no further changes it selects
    /// every row.
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            kind: QueryKind::Select,
            selections: Vec::new(),
            joins: Vec::new(),
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// The base table.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Current projection list.
    #[must_use]
    pub fn selections(&self) -> &[Selection] {
        &self.selections
    }

    /// Whether a column expression is already projected, compared
    /// case-insensitively on the raw `table.column` form.
    #[must_use]
    pub fn has_column_expression(&self, expression: &str) -> bool {
        let normalized = column_expression(expression);
        self.selections.iter().any(|selection| {
            selection.expression().eq_ignore_ascii_case(normalized)
        })
    }

    /// Appends a projection.
    pub fn push_selection(&mut self, selection: Selection) {
        self.selections.push(selection);
    }

    /// Appends a join clause.
    pub fn push_join(&mut self, join: Join) {
        self.joins.push(join);
    }

    /// Appends a predicate.
    pub fn push_filter(&mut self, filter: Filter) {
        self.filters.push(filter);
    }

    /// Appends a projection, builder-style.
    #[must_use]
    pub fn select(mut self, selection: Selection) -> Self {
        self.push_selection(selection);
        self
    }

    /// Appends several projections, builder-style.
    #[must_use]
    pub fn select_all(mut self, selections: impl IntoIterator<Item = Selection>) -> Self {
        self.selections.extend(selections);
        self
    }

    /// Appends a join, builder-style.
    #[must_use]
    pub fn join(mut self, join: Join) -> Self {
        self.push_join(join);
        self
    }

    /// Appends a predicate, builder-style.
    #[must_use]
    pub fn and_where(mut self, filter: Filter) -> Self {
        self.push_filter(filter);
        self
    }

    /// Appends an equality predicate unless the value is absent.
    ///
    /// NULL values and empty strings count as absent; `null_handling` names
    /// what happens then, replacing the implicit "null disables the filter"
    /// convention with an explicit choice.
    #[must_use]
    pub fn and_where_opt(
        mut self,
        table: Option<&str>,
        column: impl Into<String>,
        value: impl Into<Value>,
        null_handling: NullHandling,
    ) -> Self {
        let column = column.into();
        let value = value.into();
        let absent = is_absent(&value);
        let table = table.map(ToString::to_string);
        if !absent {
            self.push_filter(Filter::Eq(table, column, value));
        } else if null_handling == NullHandling::MatchNull {
            self.push_filter(Filter::IsNull(table, column));
        }
        self
    }

    /// Adds an ascending ORDER BY on `[table.]column`.
    #[must_use]
    pub fn order_by(mut self, table: Option<&str>, column: impl Into<String>) -> Self {
        self.order.push((table.map(ToString::to_string), column.into(), Order::Asc));
        self
    }

    /// Adds a descending ORDER BY on `[table.]column`.
    #[must_use]
    pub fn order_by_desc(mut self, table: Option<&str>, column: impl Into<String>) -> Self {
        self.order.push((table.map(ToString::to_string), column.into(), Order::Desc));
        self
    }

    /// Caps the number of returned rows; `0` means no limit.
    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips the first `offset` rows.
    #[must_use]
    pub const fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Turns the query into `SELECT COUNT(*)`.
    #[must_use]
    pub fn as_count(mut self) -> Self {
        self.kind = QueryKind::Count;
        self
    }

    /// Turns the query into `SELECT MAX(column)`.
    #[must_use]
    pub fn as_max(mut self, column: impl Into<String>) -> Self {
        self.kind = QueryKind::Max(column.into());
        self
    }

    /// Turns the query into `SELECT MIN(column)`.
    #[must_use]
    pub fn as_min(mut self, column: impl Into<String>) -> Self {
        self.kind = QueryKind::Min(column.into());
        self
    }

    /// Turns the query into a DELETE of the matching rows.
    #[must_use]
    pub fn as_delete(mut self) -> Self {
        self.kind = QueryKind::Delete;
        self
    }

    /// Turns the query into an UPDATE setting the given column values on
    /// the matching rows.
    #[must_use]
    pub fn as_update(mut self, values: impl IntoIterator<Item = (String, Value)>) -> Self {
        self.kind = QueryKind::Update(values.into_iter().collect());
        self
    }

    /// Compiles to SQL text and named parameters for the given dialect.
    pub fn compile(self, dialect: &dyn Dialect) -> Result<SqlInfo> {
        let backend = StatementCompiler::for_dialect(dialect);
        let table = self.table;

        let (sql, values) = match self.kind {
            QueryKind::Delete => {
                let mut statement = sea_query::Query::delete();
                statement.from_table(table_ref(&table));
                for filter in self.filters {
                    statement.and_where(filter.into_expr(&table));
                }
                statement.build(backend)
            }
            QueryKind::Update(pairs) => {
                let mut statement = sea_query::Query::update();
                statement.table(table_ref(&table));
                for (column, value) in pairs {
                    statement.value(Alias::new(column), value);
                }
                for filter in self.filters {
                    statement.and_where(filter.into_expr(&table));
                }
                statement.build(backend)
            }
            kind => {
                let mut statement = sea_query::Query::select();
                match &kind {
                    QueryKind::Select => {
                        if self.selections.is_empty() {
                            statement.column(ColumnRef::Asterisk);
                        }
                        for selection in &self.selections {
                            statement.expr_as(
                                Expr::col(table_column(&selection.table, &selection.column)),
                                Alias::new(&selection.alias),
                            );
                        }
                    }
                    QueryKind::Count => {
                        statement.expr(Expr::cust("COUNT(*)"));
                    }
                    QueryKind::Max(column) => {
                        statement.expr(Func::max(Expr::col(table_column(&table, column))));
                    }
                    QueryKind::Min(column) => {
                        statement.expr(Func::min(Expr::col(table_column(&table, column))));
                    }
                    _ => unreachable!("delete and update are handled above"),
                }
                statement.from(table_ref(&table));

                for join in self.joins {
                    let spec = join.into_join_spec(&table);
                    statement.join(spec.kind, table_ref(&spec.table), spec.on);
                }
                for filter in self.filters {
                    statement.and_where(filter.into_expr(&table));
                }
                if let Some(limit) = self.limit
                    && limit > 0
                {
                    statement.limit(limit);
                }
                if let Some(offset) = self.offset {
                    statement.offset(offset);
                }
                for (order_table, column, order) in self.order {
                    let qualifier = order_table.as_deref().unwrap_or(&table);
                    statement.order_by(table_column(qualifier, &column), order);
                }
                statement.build(backend)
            }
        };

        let params = from_query_values(values)?
            .into_iter()
            .enumerate()
            .map(|(index, value)| (format!("p{}", index + 1), value))
            .collect();

        let info = SqlInfo::new(sql, params);
        tracing::debug!(
            table = %table,
            sql = %info.sql,
            param_count = info.params.len(),
            "compiled statement"
        );
        Ok(info)
    }
}

fn is_absent(value: &Value) -> bool {
    match value {
        Value::String(Some(text)) => text.is_empty(),
        other => matches!(
            other,
            Value::Bool(None)
                | Value::TinyInt(None)
                | Value::SmallInt(None)
                | Value::Int(None)
                | Value::BigInt(None)
                | Value::TinyUnsigned(None)
                | Value::SmallUnsigned(None)
                | Value::Unsigned(None)
                | Value::BigUnsigned(None)
                | Value::Float(None)
                | Value::Double(None)
                | Value::String(None)
                | Value::Char(None)
                | Value::Bytes(None)
                | Value::ChronoDate(None)
                | Value::ChronoTime(None)
                | Value::ChronoDateTime(None)
                | Value::ChronoDateTimeUtc(None)
        ),
    }
}
