//! Join clauses, independent of the underlying query builder.

use sea_query::{JoinType, SimpleExpr};

use crate::filter::Filter;

/// A join against another table.
#[derive(Debug, Clone)]
pub struct Join {
    table: String,
    on: Filter,
    kind: JoinKind,
}

/// Join flavors supported by the access layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinKind {
    /// INNER JOIN.
    #[default]
    Inner,
    /// LEFT JOIN.
    Left,
}

impl Join {
    /// Creates an INNER JOIN.
    #[must_use]
    pub fn inner(table: impl Into<String>, on: Filter) -> Self {
        Self { table: table.into(), on, kind: JoinKind::Inner }
    }

    /// Creates a LEFT JOIN.
    #[must_use]
    pub fn left(table: impl Into<String>, on: Filter) -> Self {
        Self { table: table.into(), on, kind: JoinKind::Left }
    }

    /// Creates a join of the given kind.
    #[must_use]
    pub fn of_kind(kind: JoinKind, table: impl Into<String>, on: Filter) -> Self {
        Self { table: table.into(), on, kind }
    }

    /// The joined table.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Converts into the compiled representation, resolving unqualified
    /// condition columns against `default_table`.
    pub(crate) fn into_join_spec(self, default_table: &str) -> JoinSpec {
        JoinSpec {
            table: self.table,
            on: self.on.into_expr(default_table),
            kind: self.kind.into_join_type(),
        }
    }
}

impl JoinKind {
    pub(crate) const fn into_join_type(self) -> JoinType {
        match self {
            Self::Inner => JoinType::InnerJoin,
            Self::Left => JoinType::LeftJoin,
        }
    }
}

/// Compiled join representation handed to `sea-query`.
#[derive(Clone)]
pub(crate) struct JoinSpec {
    pub table: String,
    pub on: SimpleExpr,
    pub kind: JoinType,
}
