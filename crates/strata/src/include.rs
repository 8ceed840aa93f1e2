//! Relationship includes: join a related entity into a query and merge its
//! projections so the flat result can be rehydrated into a nested graph.
//!
//! Join conditions are declared as [`JoinEdge`]s — explicit field-path
//! tokens resolved against both entities' descriptors — instead of parsed
//! expressions. Resolution failures are configuration errors, never silent
//! no-ops.

use crate::descriptor::EntityDescriptor;
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::filter::Filter;
use crate::join::{Join, JoinKind};
use crate::query::Query;
use crate::select::column_selections;

/// An equality join between a base entity and a related entity, expressed
/// through field names, with the navigation field that receives the related
/// rows.
#[derive(Debug, Clone)]
pub struct JoinEdge {
    base_field: &'static str,
    join_field: &'static str,
    navigation: Option<&'static str>,
}

impl JoinEdge {
    /// Declares `base.base_field = join.join_field`. The operands may be
    /// written in either order; resolution detects and swaps a reversed
    /// pair.
    #[must_use]
    pub const fn on(base_field: &'static str, join_field: &'static str) -> Self {
        Self { base_field, join_field, navigation: None }
    }

    /// Names the base entity's navigation field populated by this include.
    /// The field's name becomes the selection prefix.
    #[must_use]
    pub const fn via(mut self, navigation: &'static str) -> Self {
        self.navigation = Some(navigation);
        self
    }
}

/// Adds the join clause and merges projections for one include.
///
/// Join-side columns are selected under `select_prefix`; base-side columns
/// are added only when not already projected, so chaining several includes
/// off the same base never duplicates its columns.
pub fn include_descriptors(
    query: &mut Query,
    base: &EntityDescriptor,
    join: &EntityDescriptor,
    select_prefix: &str,
    join_column: &str,
    base_column: Option<&str>,
    kind: JoinKind,
) {
    let base_table = base.table();
    let join_table = join.table();
    let default_base_column = base_column.map_or_else(
        || format!("{}{join_column}", unqualified(join_table)),
        ToString::to_string,
    );

    query.push_join(Join::of_kind(
        kind,
        join_table,
        Filter::col_eq(base_table, default_base_column, join_table, join_column),
    ));

    for selection in column_selections(base, "", None) {
        if !query.has_column_expression(&selection.expression()) {
            query.push_selection(selection);
        }
    }
    for selection in column_selections(join, select_prefix, None) {
        query.push_selection(selection);
    }
}

/// Includes `J` into a query over `B` using an explicit selection prefix
/// and column names.
pub fn include_columns<B: Entity, J: Entity>(
    query: &mut Query,
    select_prefix: &str,
    join_column: &str,
    base_column: Option<&str>,
    kind: JoinKind,
) {
    include_descriptors(
        query,
        B::descriptor(),
        J::descriptor(),
        select_prefix,
        join_column,
        base_column,
        kind,
    );
}

/// Includes `J` into a query over `B` along a declarative [`JoinEdge`],
/// deriving the selection prefix from the navigation field. Returns the
/// prefix so multi-level includes can build on it.
pub fn include_edge<B: Entity, J: Entity>(
    query: &mut Query, edge: &JoinEdge, kind: JoinKind,
) -> Result<String> {
    include_edge_prefixed::<B, J>(query, edge, "", kind)
}

/// Like [`include_edge`], prepending an accumulated prefix from earlier
/// navigation hops.
pub fn include_edge_prefixed<B: Entity, J: Entity>(
    query: &mut Query, edge: &JoinEdge, prefix_base: &str, kind: JoinKind,
) -> Result<String> {
    let base = B::descriptor();
    let join = J::descriptor();

    // Field operands may arrive in either order; resolve against both
    // descriptors and swap when the straight reading does not fit.
    let (base_column, join_column) = match (
        base.column_of(edge.base_field),
        join.column_of(edge.join_field),
    ) {
        (Ok(base_column), Ok(join_column)) => (base_column, join_column),
        _ => {
            let base_column = base.column_of(edge.join_field)?;
            let join_column = join.column_of(edge.base_field)?;
            (base_column, join_column)
        }
    };

    let navigation = edge.navigation.ok_or_else(|| {
        Error::Configuration(format!(
            "include of table '{}' into '{}' names no navigation field; use JoinEdge::via",
            join.table(),
            base.table()
        ))
    })?;
    let navigation_field = base.field(navigation).ok_or_else(|| {
        Error::Configuration(format!(
            "entity for table '{}' has no navigation field '{navigation}'",
            base.table()
        ))
    })?;
    if !navigation_field.is_computed {
        return Err(Error::Configuration(format!(
            "field '{navigation}' of table '{}' is persisted; includes require a computed navigation field",
            base.table()
        )));
    }

    let prefix = if prefix_base.is_empty() {
        navigation.to_string()
    } else {
        format!("{prefix_base}_{navigation}")
    };

    include_descriptors(query, base, join, &prefix, join_column, Some(base_column), kind);
    Ok(prefix)
}

/// Two-level include: joins `Mid` into the base query, then `Leaf` into
/// `Mid`, accumulating the selection prefix across the two navigation hops
/// (`lines` then `lines_package_type`).
pub fn include_chain<B: Entity, Mid: Entity, Leaf: Entity>(
    query: &mut Query,
    first: &JoinEdge,
    second: &JoinEdge,
    kind: JoinKind,
) -> Result<()> {
    let first_prefix = include_edge::<B, Mid>(query, first, kind)?;
    include_edge_prefixed::<Mid, Leaf>(query, second, &first_prefix, kind)?;
    Ok(())
}

fn unqualified(table: &str) -> &str {
    table.rsplit('.').next().unwrap_or(table)
}
