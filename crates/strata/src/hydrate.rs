//! Rehydration of flat, prefixed result rows into nested entity graphs.
//!
//! Include queries return one flat row per joined combination; this module
//! groups them by the root entity's key values and folds each row's
//! prefixed columns into the root's navigation fields, de-duplicating at
//! every level.

use crate::descriptor::EntityDescriptor;
use crate::entity::Entity;
use crate::error::Result;
use crate::value::{Row, SqlValue};

/// Whether every key column of `descriptor` is present and non-NULL in the
/// row under `prefix`. Entities without key fields are always considered
/// present.
#[must_use]
pub fn key_columns_present(descriptor: &EntityDescriptor, row: &Row, prefix: &str) -> bool {
    let mut keys = descriptor.key_fields().peekable();
    if keys.peek().is_none() {
        return true;
    }
    keys.all(|field| {
        row.field(&format!("{prefix}{}", field.name))
            .is_some_and(|value| !value.is_null())
    })
}

/// Maps flat rows onto root entities, in first-seen order.
///
/// Rows sharing a root key contribute their navigation rows to the one root
/// instance instead of producing duplicates. Rows whose root key columns
/// are NULL are skipped.
pub fn hydrate_rows<M: Entity>(rows: &[Row]) -> Result<Vec<M>> {
    let descriptor = M::descriptor();
    let mut roots: Vec<(Vec<SqlValue>, M)> = Vec::new();

    for row in rows {
        if !key_columns_present(descriptor, row, "") {
            continue;
        }
        let key: Vec<SqlValue> = descriptor
            .key_fields()
            .map(|field| row.field(field.name).cloned().unwrap_or(SqlValue::Null))
            .collect();

        if !key.is_empty()
            && let Some((_, existing)) = roots.iter_mut().find(|(existing_key, _)| *existing_key == key)
        {
            existing.absorb_navigations(row, "")?;
            continue;
        }

        if let Some(entity) = M::hydrate(row, "")? {
            roots.push((key, entity));
        }
    }

    Ok(roots.into_iter().map(|(_, entity)| entity).collect())
}
