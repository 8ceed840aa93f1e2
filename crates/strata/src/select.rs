//! Projection building: qualified `table.column AS alias` selections with
//! optional prefixing for nested result shapes.

use sea_query::{Alias, ColumnRef, IntoIden, TableRef};

use crate::descriptor::EntityDescriptor;

/// One projection entry: a qualified column and its result alias.
///
/// The alias is the entity field name, optionally prefixed (`Lines_id`),
/// which is what rehydration keys on when reassembling nested graphs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Table qualifier, possibly schema-qualified.
    pub table: String,
    /// Database column name.
    pub column: String,
    /// Result alias.
    pub alias: String,
}

impl Selection {
    /// The raw column expression (`table.column`), used for duplicate
    /// detection across repeated include calls.
    #[must_use]
    pub fn expression(&self) -> String {
        format!("{}.{}", self.table, self.column)
    }

    /// Renders the full `table.column AS alias` fragment.
    #[must_use]
    pub fn fragment(&self) -> String {
        format!("{} AS {}", self.expression(), self.alias)
    }
}

/// Builds the projection list for an entity's persisted fields.
///
/// An empty `prefix` aliases each column with the bare field name; a
/// non-empty prefix is joined with `_` (`Lines` -> `Lines_id`). The output
/// is deterministic for identical inputs, which the include engine relies on
/// for "only add if not already present" de-duplication.
#[must_use]
pub fn column_selections(
    descriptor: &EntityDescriptor,
    prefix: &str,
    table: Option<&str>,
) -> Vec<Selection> {
    let table = table.unwrap_or_else(|| descriptor.table());
    descriptor
        .persisted_fields()
        .map(|field| Selection {
            table: table.to_string(),
            column: field.column.to_string(),
            alias: if prefix.is_empty() {
                field.name.to_string()
            } else {
                format!("{prefix}_{}", field.name)
            },
        })
        .collect()
}

/// Extracts the column expression from a `expr AS alias` fragment,
/// case-insensitively. Fragments without an alias are returned whole.
#[must_use]
pub fn column_expression(fragment: &str) -> &str {
    let upper = fragment.to_ascii_uppercase();
    upper
        .find(" AS ")
        .map_or(fragment, |index| &fragment[..index])
}

/// Splits a possibly schema-qualified table name into a `sea-query` table
/// reference, so each dotted part is quoted separately.
#[must_use]
pub fn table_ref(table: &str) -> TableRef {
    match table.split_once('.') {
        Some((schema, name)) => {
            TableRef::SchemaTable(Alias::new(schema).into_iden(), Alias::new(name).into_iden())
        }
        None => TableRef::Table(Alias::new(table).into_iden()),
    }
}

/// Builds a column reference qualified by a possibly schema-qualified table.
#[must_use]
pub fn table_column(table: &str, column: &str) -> ColumnRef {
    match table.split_once('.') {
        Some((schema, name)) => ColumnRef::SchemaTableColumn(
            Alias::new(schema).into_iden(),
            Alias::new(name).into_iden(),
            Alias::new(column).into_iden(),
        ),
        None => ColumnRef::TableColumn(
            Alias::new(table).into_iden(),
            Alias::new(column).into_iden(),
        ),
    }
}
