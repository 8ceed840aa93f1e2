//! Batch statement generation.
//!
//! Batch insert/update/delete statements are built as raw SQL with named
//! parameters (`p0`, `p1`, ...) unique within one statement, sized so the
//! statement never exceeds the dialect's bind-parameter ceiling. Update and
//! delete use the VALUES-derived temp-rowset join, which only SQL Server
//! accepts; other dialects reject the call instead of silently degrading to
//! per-row statements.

use crate::dialect::Dialect;
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::executor::SqlInfo;
use crate::value::{SqlValue, from_query_value};

/// Default requested batch size before parameter-ceiling clamping.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Per-column value override: returns a literal SQL fragment to splice in
/// place of a bind parameter, or `None` to bind the entity's field value.
pub type ValueOverride<'a> = &'a (dyn Fn(&str) -> Option<String> + Send + Sync);

/// Builds an override that substitutes the dialect's database-side UTC
/// timestamp expression for one column, matched case-insensitively.
pub fn utc_now_for_column(
    dialect: &dyn Dialect, column: &str,
) -> impl Fn(&str) -> Option<String> + Send + Sync + use<> {
    let column = column.to_string();
    let expression = dialect.utc_now_expression();
    move |candidate: &str| {
        candidate
            .eq_ignore_ascii_case(&column)
            .then(|| expression.to_string())
    }
}

/// The largest batch that keeps one statement under the parameter ceiling.
#[must_use]
pub fn max_batch_size(dialect: &dyn Dialect, parameters_per_row: usize) -> usize {
    if parameters_per_row == 0 {
        0
    } else {
        dialect.max_parameter_count() / parameters_per_row
    }
}

/// Clamps a requested batch size down to the ceiling-derived maximum;
/// requests are never clamped up.
pub fn clamp_batch_size(
    requested: usize, dialect: &dyn Dialect, parameters_per_row: usize,
) -> Result<usize> {
    let ceiling = max_batch_size(dialect, parameters_per_row);
    if ceiling == 0 {
        return Err(Error::Configuration(format!(
            "a single row binds {parameters_per_row} parameters, which exceeds the dialect ceiling of {}",
            dialect.max_parameter_count()
        )));
    }
    Ok(requested.max(1).min(ceiling))
}

/// Temp-rowset alias for the VALUES-join pattern: schema separators are
/// replaced so the alias is a valid unqualified identifier.
#[must_use]
pub fn temp_table_name(table: &str) -> String {
    format!("{table}_Values").replace('.', "_")
}

/// Builds one `(v, v, ...)` clause per entity over `columns`, binding
/// batch-unique named parameters unless the override supplies a fragment.
fn build_value_clauses<M: Entity>(
    entities: &[M],
    columns: &[&str],
    prefix: &str,
    value_override: Option<ValueOverride<'_>>,
) -> Result<(Vec<String>, Vec<(String, SqlValue)>)> {
    let mut params = Vec::new();
    let mut clauses = Vec::with_capacity(entities.len());
    let mut index = 0usize;

    for entity in entities {
        let mut clause = Vec::with_capacity(columns.len());
        for column in columns {
            let fragment = value_override.and_then(|f| f(column)).filter(|s| !s.is_empty());
            match fragment {
                Some(literal) => clause.push(literal),
                None => {
                    let name = format!("p{index}");
                    let value = from_query_value(entity.value_of_column(column)?)?;
                    clause.push(format!("{prefix}{name}"));
                    params.push((name, value));
                }
            }
            index += 1;
        }
        clauses.push(format!("({})", clause.join(",")));
    }

    Ok((clauses, params))
}

/// Appends `column = value` for one entity, binding a parameter named after
/// the column unless the override supplies a fragment. Shared by the
/// single-row statement builders.
fn process_column<M: Entity>(
    entity: &M,
    column: &str,
    prefix: &str,
    value_override: Option<ValueOverride<'_>>,
    params: &mut Vec<(String, SqlValue)>,
) -> Result<String> {
    let fragment = value_override.and_then(|f| f(column)).filter(|s| !s.is_empty());
    match fragment {
        Some(literal) => Ok(format!("{column} = {literal}")),
        None => {
            let value = from_query_value(entity.value_of_column(column)?)?;
            params.push((column.to_string(), value));
            Ok(format!("{column} = {prefix}{column}"))
        }
    }
}

/// Builds a multi-row INSERT for one batch. Dialects without multi-row
/// `VALUES` get the `INSERT ALL ... SELECT 1 FROM DUAL` form.
pub fn insert_batch_sql<M: Entity>(
    dialect: &dyn Dialect,
    table: &str,
    columns: &[&str],
    batch: &[M],
    value_override: Option<ValueOverride<'_>>,
) -> Result<SqlInfo> {
    let joined = columns.join(",");
    let prefix = dialect.parameter_prefix();
    let (clauses, params) = build_value_clauses(batch, columns, prefix, value_override)?;

    let sql = if dialect.supports_multi_row_insert() {
        format!("INSERT INTO {table} ({joined}) VALUES {}", clauses.join(","))
    } else {
        let intos: Vec<String> = clauses
            .iter()
            .map(|clause| format!("INTO {table} ({joined}) VALUES {clause}"))
            .collect();
        format!("INSERT ALL {} SELECT 1 FROM DUAL", intos.join(" "))
    };

    Ok(SqlInfo::new(sql, params))
}

/// Builds a single-row INSERT with column-named parameters.
pub fn insert_sql<M: Entity>(
    dialect: &dyn Dialect,
    table: &str,
    columns: &[&str],
    entity: &M,
    value_override: Option<ValueOverride<'_>>,
) -> Result<SqlInfo> {
    let prefix = dialect.parameter_prefix();
    let mut params = Vec::new();
    let mut clause = Vec::with_capacity(columns.len());
    for column in columns {
        let fragment = value_override.and_then(|f| f(column)).filter(|s| !s.is_empty());
        match fragment {
            Some(literal) => clause.push(literal),
            None => {
                let value = from_query_value(entity.value_of_column(column)?)?;
                params.push(((*column).to_string(), value));
                clause.push(format!("{prefix}{column}"));
            }
        }
    }
    let sql = format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        columns.join(","),
        clause.join(",")
    );
    Ok(SqlInfo::new(sql, params))
}

/// Builds the VALUES-join batch UPDATE for one batch.
pub fn update_batch_sql<M: Entity>(
    dialect: &dyn Dialect,
    table: &str,
    columns_to_update: &[&str],
    key_columns: &[&str],
    batch: &[M],
    value_override: Option<ValueOverride<'_>>,
) -> Result<SqlInfo> {
    if !dialect.supports_values_join() {
        return Err(Error::unsupported(
            "batch update via VALUES join is only available on SQL Server",
        ));
    }
    let temp = temp_table_name(table);
    let all_columns: Vec<&str> = key_columns.iter().chain(columns_to_update).copied().collect();
    let prefix = dialect.parameter_prefix();
    let (clauses, params) = build_value_clauses(batch, &all_columns, prefix, value_override)?;

    let set_clause: Vec<String> = columns_to_update
        .iter()
        .map(|column| format!("{column} = {temp}.{column}"))
        .collect();
    let on_clause: Vec<String> = key_columns
        .iter()
        .map(|column| format!("{table}.{column} = {temp}.{column}"))
        .collect();

    let sql = format!(
        "UPDATE {table} SET {} FROM {table} INNER JOIN (VALUES {}) AS {temp} ({}) ON {}",
        set_clause.join(","),
        clauses.join(","),
        all_columns.join(","),
        on_clause.join(" AND "),
    );
    Ok(SqlInfo::new(sql, params))
}

/// Builds the VALUES-join batch DELETE for one batch.
pub fn delete_batch_sql<M: Entity>(
    dialect: &dyn Dialect,
    table: &str,
    criteria_columns: &[&str],
    batch: &[M],
    value_override: Option<ValueOverride<'_>>,
) -> Result<SqlInfo> {
    if !dialect.supports_values_join() {
        return Err(Error::unsupported(
            "batch delete via VALUES join is only available on SQL Server",
        ));
    }
    let temp = temp_table_name(table);
    let prefix = dialect.parameter_prefix();
    let (clauses, params) = build_value_clauses(batch, criteria_columns, prefix, value_override)?;

    let on_clause: Vec<String> = criteria_columns
        .iter()
        .map(|column| format!("{table}.{column} = {temp}.{column}"))
        .collect();

    let sql = format!(
        "DELETE {table} FROM {table} INNER JOIN (VALUES {}) AS {temp} ({}) ON {}",
        clauses.join(","),
        criteria_columns.join(","),
        on_clause.join(" AND "),
    );
    Ok(SqlInfo::new(sql, params))
}

/// Builds a single-row UPDATE: SET over `columns_to_update`, WHERE over the
/// key columns.
pub fn update_sql<M: Entity>(
    dialect: &dyn Dialect,
    table: &str,
    columns_to_update: &[&str],
    key_columns: &[&str],
    entity: &M,
    value_override: Option<ValueOverride<'_>>,
) -> Result<SqlInfo> {
    let prefix = dialect.parameter_prefix();
    let mut params = Vec::new();
    let set_clause: Vec<String> = columns_to_update
        .iter()
        .map(|column| process_column(entity, column, prefix, value_override, &mut params))
        .collect::<Result<_>>()?;
    let where_clause: Vec<String> = key_columns
        .iter()
        .map(|column| process_column(entity, column, prefix, value_override, &mut params))
        .collect::<Result<_>>()?;

    let mut sql = format!("UPDATE {table} SET {}", set_clause.join(","));
    if !where_clause.is_empty() {
        sql.push_str(&format!(" WHERE {}", where_clause.join(" AND ")));
    }
    Ok(SqlInfo::new(sql, params))
}

/// Builds a single-row DELETE keyed on the key columns.
pub fn delete_sql<M: Entity>(
    dialect: &dyn Dialect,
    table: &str,
    key_columns: &[&str],
    entity: &M,
    value_override: Option<ValueOverride<'_>>,
) -> Result<SqlInfo> {
    let prefix = dialect.parameter_prefix();
    let mut params = Vec::new();
    let where_clause: Vec<String> = key_columns
        .iter()
        .map(|column| process_column(entity, column, prefix, value_override, &mut params))
        .collect::<Result<_>>()?;
    let sql = format!("DELETE FROM {table} WHERE {}", where_clause.join(" AND "));
    Ok(SqlInfo::new(sql, params))
}

/// Builds the key-filtered `SELECT *` used to refresh an entity after
/// insert or update.
pub fn refresh_sql<M: Entity>(
    dialect: &dyn Dialect, table: &str, key_columns: &[&str], entity: &M,
) -> Result<SqlInfo> {
    let prefix = dialect.parameter_prefix();
    let mut params = Vec::new();
    let where_clause: Vec<String> = key_columns
        .iter()
        .map(|column| process_column(entity, column, prefix, None, &mut params))
        .collect::<Result<_>>()?;
    let sql = format!("SELECT * FROM {table} WHERE {}", where_clause.join(" AND "));
    Ok(SqlInfo::new(sql, params))
}

/// Splits entities into batches of at most `batch_size`, preserving order.
pub(crate) fn partition<M>(entities: &[M], batch_size: usize) -> Vec<&[M]> {
    entities.chunks(batch_size.max(1)).collect()
}
