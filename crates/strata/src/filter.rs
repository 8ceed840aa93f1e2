//! Query predicates, independent of the underlying query builder.
//!
//! A [`Filter`] stores column names and [`sea_query::Value`]s and converts
//! to a `sea-query` expression at compile time, so callers never import the
//! query-builder crate directly. An optional table qualifier targets joined
//! tables; `None` resolves to the query's base table.

use sea_query::{Expr, ExprTrait, SimpleExpr, Value};

use crate::select::table_column;

/// A predicate over one or more columns.
#[derive(Debug, Clone)]
pub enum Filter {
    /// `[table.]column = value`
    Eq(Option<String>, String, Value),
    /// `[table.]column != value`
    Ne(Option<String>, String, Value),
    /// `[table.]column > value`
    Gt(Option<String>, String, Value),
    /// `[table.]column >= value`
    Gte(Option<String>, String, Value),
    /// `[table.]column < value`
    Lt(Option<String>, String, Value),
    /// `[table.]column <= value`
    Lte(Option<String>, String, Value),
    /// `[table.]column IN (values)`
    In(Option<String>, String, Vec<Value>),
    /// `[table.]column NOT IN (values)`
    NotIn(Option<String>, String, Vec<Value>),
    /// `[table.]column IS NULL`
    IsNull(Option<String>, String),
    /// `[table.]column IS NOT NULL`
    IsNotNull(Option<String>, String),
    /// `[table.]column LIKE pattern`
    Like(Option<String>, String, String),
    /// `[table.]column BETWEEN low AND high`
    Between(Option<String>, String, Value, Value),
    /// `table1.col1 = table2.col2` (join conditions)
    ColEq(String, String, String, String),
    /// Raw SQL predicate, inserted verbatim.
    Raw(String),
    /// Conjunction.
    And(Vec<Self>),
    /// Disjunction.
    Or(Vec<Self>),
    /// Negation.
    Not(Box<Self>),
}

impl Filter {
    fn resolve(table: Option<&str>, column: &str, default_table: &str) -> SimpleExpr {
        Expr::col(table_column(table.unwrap_or(default_table), column)).into()
    }

    /// Converts the filter to a `sea-query` expression against
    /// `default_table`.
    #[must_use]
    pub fn into_expr(self, default_table: &str) -> SimpleExpr {
        match self {
            Self::Eq(tbl, col, val) => Self::resolve(tbl.as_deref(), &col, default_table).eq(val),
            Self::Ne(tbl, col, val) => Self::resolve(tbl.as_deref(), &col, default_table).ne(val),
            Self::Gt(tbl, col, val) => Self::resolve(tbl.as_deref(), &col, default_table).gt(val),
            Self::Gte(tbl, col, val) => Self::resolve(tbl.as_deref(), &col, default_table).gte(val),
            Self::Lt(tbl, col, val) => Self::resolve(tbl.as_deref(), &col, default_table).lt(val),
            Self::Lte(tbl, col, val) => Self::resolve(tbl.as_deref(), &col, default_table).lte(val),
            Self::In(tbl, col, vals) => {
                Self::resolve(tbl.as_deref(), &col, default_table).is_in(vals)
            }
            Self::NotIn(tbl, col, vals) => {
                Self::resolve(tbl.as_deref(), &col, default_table).is_not_in(vals)
            }
            Self::IsNull(tbl, col) => Self::resolve(tbl.as_deref(), &col, default_table).is_null(),
            Self::IsNotNull(tbl, col) => {
                Self::resolve(tbl.as_deref(), &col, default_table).is_not_null()
            }
            Self::Like(tbl, col, pattern) => {
                Self::resolve(tbl.as_deref(), &col, default_table).like(pattern)
            }
            Self::Between(tbl, col, low, high) => {
                Self::resolve(tbl.as_deref(), &col, default_table).between(low, high)
            }
            Self::ColEq(tbl1, col1, tbl2, col2) => Expr::col(table_column(&tbl1, &col1))
                .eq(Expr::col(table_column(&tbl2, &col2))),
            Self::Raw(sql) => Expr::cust(sql),
            Self::And(filters) => {
                let mut exprs = filters.into_iter().map(|f| f.into_expr(default_table));
                exprs.next().map_or_else(
                    || Expr::value(true),
                    |first| exprs.fold(first, SimpleExpr::and),
                )
            }
            Self::Or(filters) => {
                let mut exprs = filters.into_iter().map(|f| f.into_expr(default_table));
                exprs.next().map_or_else(
                    || Expr::value(false),
                    |first| exprs.fold(first, SimpleExpr::or),
                )
            }
            Self::Not(filter) => Expr::expr(filter.into_expr(default_table)).not(),
        }
    }

    // Convenience constructors for base-table predicates.

    /// `column = value`
    #[must_use]
    pub fn eq(col: impl Into<String>, val: impl Into<Value>) -> Self {
        Self::Eq(None, col.into(), val.into())
    }

    /// `column != value`
    #[must_use]
    pub fn ne(col: impl Into<String>, val: impl Into<Value>) -> Self {
        Self::Ne(None, col.into(), val.into())
    }

    /// `column > value`
    #[must_use]
    pub fn gt(col: impl Into<String>, val: impl Into<Value>) -> Self {
        Self::Gt(None, col.into(), val.into())
    }

    /// `column >= value`
    #[must_use]
    pub fn gte(col: impl Into<String>, val: impl Into<Value>) -> Self {
        Self::Gte(None, col.into(), val.into())
    }

    /// `column < value`
    #[must_use]
    pub fn lt(col: impl Into<String>, val: impl Into<Value>) -> Self {
        Self::Lt(None, col.into(), val.into())
    }

    /// `column <= value`
    #[must_use]
    pub fn lte(col: impl Into<String>, val: impl Into<Value>) -> Self {
        Self::Lte(None, col.into(), val.into())
    }

    /// `column IN (values)`
    #[must_use]
    pub fn is_in(
        col: impl Into<String>, vals: impl IntoIterator<Item = impl Into<Value>>,
    ) -> Self {
        Self::In(None, col.into(), vals.into_iter().map(Into::into).collect())
    }

    /// `column NOT IN (values)`
    #[must_use]
    pub fn not_in(
        col: impl Into<String>, vals: impl IntoIterator<Item = impl Into<Value>>,
    ) -> Self {
        Self::NotIn(None, col.into(), vals.into_iter().map(Into::into).collect())
    }

    /// `column IS NULL`
    #[must_use]
    pub fn is_null(col: impl Into<String>) -> Self {
        Self::IsNull(None, col.into())
    }

    /// `column IS NOT NULL`
    #[must_use]
    pub fn is_not_null(col: impl Into<String>) -> Self {
        Self::IsNotNull(None, col.into())
    }

    /// `column LIKE pattern`
    #[must_use]
    pub fn like(col: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::Like(None, col.into(), pattern.into())
    }

    /// `column BETWEEN low AND high`
    #[must_use]
    pub fn between(
        col: impl Into<String>, low: impl Into<Value>, high: impl Into<Value>,
    ) -> Self {
        Self::Between(None, col.into(), low.into(), high.into())
    }

    // Table-qualified variants for joined queries.

    /// `table.column = value`
    #[must_use]
    pub fn table_eq(
        table: impl Into<String>, col: impl Into<String>, val: impl Into<Value>,
    ) -> Self {
        Self::Eq(Some(table.into()), col.into(), val.into())
    }

    /// `table.column IN (values)`
    #[must_use]
    pub fn table_in(
        table: impl Into<String>,
        col: impl Into<String>,
        vals: impl IntoIterator<Item = impl Into<Value>>,
    ) -> Self {
        Self::In(Some(table.into()), col.into(), vals.into_iter().map(Into::into).collect())
    }

    /// `table.column IS NULL`
    #[must_use]
    pub fn table_is_null(table: impl Into<String>, col: impl Into<String>) -> Self {
        Self::IsNull(Some(table.into()), col.into())
    }

    /// Column-to-column equality, for join conditions.
    #[must_use]
    pub fn col_eq(
        table1: impl Into<String>,
        col1: impl Into<String>,
        table2: impl Into<String>,
        col2: impl Into<String>,
    ) -> Self {
        Self::ColEq(table1.into(), col1.into(), table2.into(), col2.into())
    }

    /// Raw SQL predicate.
    #[must_use]
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::Raw(sql.into())
    }
}

/// Wraps a value in `%` wildcards for LIKE patterns.
#[must_use]
pub fn likeable(value: impl std::fmt::Display) -> String {
    format!("%{value}%")
}

/// Appends a `%` wildcard for prefix LIKE patterns.
#[must_use]
pub fn end_likeable(value: impl std::fmt::Display) -> String {
    format!("{value}%")
}
