//! SQL dialect providers.
//!
//! A dialect supplies the engine-specific knobs the access layer needs:
//! the bind-parameter ceiling used for batch sizing, the database-side UTC
//! timestamp expression, identifier quoting, named-placeholder style, and
//! the statement used to read back a generated identity. Dialects are
//! injected explicitly into [`crate::Dal`] configuration; there is no
//! process-global provider state.

use sea_query::backend::{
    EscapeBuilder, OperLeftAssocDecider, PrecedenceDecider, QuotedBuilder, TableRefBuilder,
};
use sea_query::prepare::SqlWriter;
use sea_query::{BinOper, Oper, Quote, SimpleExpr, SubQueryStatement, Value};

/// The database engine a dialect targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbEngine {
    /// Microsoft SQL Server.
    SqlServer,
    /// MySQL / MariaDB.
    MySql,
    /// Oracle.
    Oracle,
}

/// Engine-specific behavior consumed by query compilation and batch
/// statement generation.
pub trait Dialect: Send + Sync {
    /// The engine this dialect targets.
    fn engine(&self) -> DbEngine;

    /// Hard ceiling on bind parameters per statement; batch sizes are
    /// clamped so one statement never exceeds it.
    fn max_parameter_count(&self) -> usize;

    /// SQL expression evaluating to the database-side current UTC time.
    fn utc_now_expression(&self) -> &'static str;

    /// Statement that reads the identity generated by the preceding insert.
    /// `sequence` names the backing sequence on sequence-based engines and
    /// is ignored elsewhere. Returns `None` when the engine cannot retrieve
    /// an identity without a sequence name.
    fn identity_fetch_sql(&self, sequence: Option<&str>) -> Option<String>;

    /// Prefix for named bind parameters in generated SQL.
    fn parameter_prefix(&self) -> &'static str {
        match self.engine() {
            DbEngine::Oracle => ":",
            _ => "@",
        }
    }

    /// Identifier quote character.
    fn quote_char(&self) -> u8 {
        match self.engine() {
            DbEngine::MySql => b'`',
            _ => b'"',
        }
    }

    /// Whether `INSERT INTO t VALUES (...), (...)` is accepted. Engines
    /// without it get the `INSERT ALL` form instead.
    fn supports_multi_row_insert(&self) -> bool {
        self.engine() != DbEngine::Oracle
    }

    /// Whether batch update/delete can join the target table against an
    /// inline VALUES row-set. SQL-Server-specific.
    fn supports_values_join(&self) -> bool {
        self.engine() == DbEngine::SqlServer
    }
}

/// SQL Server dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerDialect;

impl Dialect for SqlServerDialect {
    fn engine(&self) -> DbEngine {
        DbEngine::SqlServer
    }

    fn max_parameter_count(&self) -> usize {
        2100
    }

    fn utc_now_expression(&self) -> &'static str {
        "SYSUTCDATETIME()"
    }

    fn identity_fetch_sql(&self, _sequence: Option<&str>) -> Option<String> {
        Some("SELECT SCOPE_IDENTITY() AS id".to_string())
    }
}

/// MySQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn engine(&self) -> DbEngine {
        DbEngine::MySql
    }

    fn max_parameter_count(&self) -> usize {
        1000
    }

    fn utc_now_expression(&self) -> &'static str {
        "UTC_TIMESTAMP()"
    }

    fn identity_fetch_sql(&self, _sequence: Option<&str>) -> Option<String> {
        // Sequence names are ignored; MySQL has no sequences.
        Some("SELECT LAST_INSERT_ID() AS id".to_string())
    }
}

/// Oracle dialect. Multi-row inserts use the `INSERT ALL` form and identity
/// retrieval requires a named sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct OracleDialect;

impl Dialect for OracleDialect {
    fn engine(&self) -> DbEngine {
        DbEngine::Oracle
    }

    fn max_parameter_count(&self) -> usize {
        1000
    }

    fn utc_now_expression(&self) -> &'static str {
        "SYS_EXTRACT_UTC(SYSTIMESTAMP)"
    }

    fn identity_fetch_sql(&self, sequence: Option<&str>) -> Option<String> {
        sequence.map(|name| format!("SELECT {name}.CURRVAL FROM DUAL"))
    }
}

/// `sea-query` compiler backend parameterized by dialect: identifier quote
/// plus named, numbered placeholders (`@p1`, `:p1`, ...), so every compiled
/// statement carries the same named-parameter convention as the hand-built
/// batch statements.
pub(crate) struct StatementCompiler {
    quote: Quote,
    placeholder: &'static str,
    numbered: bool,
}

impl StatementCompiler {
    pub(crate) fn for_dialect(dialect: &dyn Dialect) -> Self {
        let placeholder = match dialect.parameter_prefix() {
            ":" => ":p",
            _ => "@p",
        };
        Self {
            quote: Quote::new(dialect.quote_char()),
            placeholder,
            numbered: true,
        }
    }
}

impl QuotedBuilder for StatementCompiler {
    fn quote(&self) -> Quote {
        self.quote
    }
}

impl EscapeBuilder for StatementCompiler {}

impl TableRefBuilder for StatementCompiler {}

impl OperLeftAssocDecider for StatementCompiler {
    fn well_known_left_associative(&self, op: &BinOper) -> bool {
        matches!(
            op,
            BinOper::And | BinOper::Or | BinOper::Add | BinOper::Sub | BinOper::Mul | BinOper::Mod
        )
    }
}

impl PrecedenceDecider for StatementCompiler {
    fn inner_expr_well_known_greater_precedence(
        &self, _inner: &SimpleExpr, _outer_oper: &Oper,
    ) -> bool {
        // Conservative: always parenthesize.
        false
    }
}

impl sea_query::backend::QueryBuilder for StatementCompiler {
    fn prepare_query_statement(&self, query: &SubQueryStatement, sql: &mut dyn SqlWriter) {
        match query {
            SubQueryStatement::SelectStatement(s) => self.prepare_select_statement(s, sql),
            SubQueryStatement::InsertStatement(s) => self.prepare_insert_statement(s, sql),
            SubQueryStatement::UpdateStatement(s) => self.prepare_update_statement(s, sql),
            SubQueryStatement::DeleteStatement(s) => self.prepare_delete_statement(s, sql),
            SubQueryStatement::WithStatement(s) => self.prepare_with_query(s, sql),
        }
    }

    fn prepare_value(&self, value: &Value, sql: &mut dyn SqlWriter) {
        sql.push_param(value.clone(), self);
    }

    fn placeholder(&self) -> (&str, bool) {
        (self.placeholder, self.numbered)
    }
}
