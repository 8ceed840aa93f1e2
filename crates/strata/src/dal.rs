//! Generic data-access facade.
//!
//! [`Dal`] composes the metadata, query, batch, include, and rehydration
//! pieces around an injected executor. It offers a synchronous surface
//! (bounded on [`Executor`]) and an asynchronous one (bounded on
//! [`AsyncExecutor`], methods suffixed `_async`); both share the same
//! private statement builders, so the generated SQL is identical.
//!
//! Every statement is passed to the configured logger hook and a
//! `tracing::debug!` event immediately before execution.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use sea_query::Value;

use crate::batch::{
    self, DEFAULT_BATCH_SIZE, ValueOverride, clamp_batch_size, delete_batch_sql,
    insert_batch_sql, update_batch_sql,
};
use crate::dialect::Dialect;
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::executor::{AsyncExecutor, Executor, SqlInfo, SqlLogger};
use crate::filter::Filter;
use crate::hydrate::hydrate_rows;
use crate::include::{JoinEdge, include_chain, include_columns, include_edge};
use crate::join::JoinKind;
use crate::query::Query;
use crate::select::column_selections;
use crate::value::{FromSqlValue, Row, SqlValue};

/// Options controlling batch insert/update/delete execution.
#[derive(Clone, Copy, Default)]
pub struct BatchOptions<'a> {
    /// Requested batch size; clamped down to the parameter ceiling.
    pub batch_size: Option<usize>,
    /// Execute chunks concurrently instead of sequentially.
    pub parallel: bool,
    /// Per-column value override.
    pub value_override: Option<ValueOverride<'a>>,
    /// Explicit column list; `None` uses the operation's default columns.
    pub columns: Option<&'a [&'a str]>,
}

/// Facade configuration: the dialect, the optional statement logger, and
/// the optional per-call command timeout. All explicit — there is no
/// process-global provider.
#[derive(Clone)]
pub struct DalConfig {
    /// Active SQL dialect.
    pub dialect: Arc<dyn Dialect>,
    /// Observer for compiled statements.
    pub logger: Option<SqlLogger>,
    /// Command timeout threaded through to the executor.
    pub timeout: Option<Duration>,
}

impl DalConfig {
    /// Configuration with the given dialect, no logger, no timeout.
    #[must_use]
    pub fn new(dialect: Arc<dyn Dialect>) -> Self {
        Self { dialect, logger: None, timeout: None }
    }

    /// Installs a statement logger.
    #[must_use]
    pub fn with_logger(mut self, logger: SqlLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Sets the command timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Generic CRUD and query surface for one entity type.
pub struct Dal<M: Entity, E> {
    executor: E,
    config: DalConfig,
    table: String,
    _entity: PhantomData<fn() -> M>,
}

impl<M: Entity, E> Dal<M, E> {
    /// Creates a facade over the entity's mapped table.
    #[must_use]
    pub fn new(executor: E, config: DalConfig) -> Self {
        Self {
            executor,
            config,
            table: M::descriptor().table().to_string(),
            _entity: PhantomData,
        }
    }

    /// Overrides the target table name.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// The target table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The injected executor.
    #[must_use]
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// The active dialect.
    #[must_use]
    pub fn dialect(&self) -> &dyn Dialect {
        &*self.config.dialect
    }

    /// Creates an empty query over the target table. With no further
    /// changes it selects every row.
    #[must_use]
    pub fn new_query(&self) -> Query {
        Query::new(&self.table)
    }

    /// Includes `J` along a declarative join edge; the navigation field's
    /// name becomes the selection prefix. Returns the resolved prefix.
    pub fn include<J: Entity>(
        &self, query: &mut Query, edge: &JoinEdge, kind: JoinKind,
    ) -> Result<String> {
        include_edge::<M, J>(query, edge, kind)
    }

    /// Includes `J` with an explicit selection prefix and column names.
    pub fn include_as<J: Entity>(
        &self,
        query: &mut Query,
        select_prefix: &str,
        join_column: &str,
        base_column: Option<&str>,
        kind: JoinKind,
    ) {
        include_columns::<M, J>(query, select_prefix, join_column, base_column, kind);
    }

    /// Two-level include: `Mid` into the base entity, then `Leaf` into
    /// `Mid`, with accumulated prefixes.
    pub fn include_chain<Mid: Entity, Leaf: Entity>(
        &self,
        query: &mut Query,
        first: &JoinEdge,
        second: &JoinEdge,
        kind: JoinKind,
    ) -> Result<()> {
        include_chain::<M, Mid, Leaf>(query, first, second, kind)
    }

    fn log(&self, info: &SqlInfo) {
        tracing::debug!(
            table = %self.table,
            sql = %info.sql,
            param_count = info.params.len(),
            "executing statement"
        );
        if let Some(logger) = &self.config.logger {
            logger(info);
        }
    }

    fn compile(&self, query: Query) -> Result<SqlInfo> {
        query.compile(self.dialect())
    }

    /// Ensures typed reads project aliased columns so rows hydrate by
    /// field name even when column names are overridden.
    fn with_entity_selections(&self, query: Query) -> Query {
        if query.selections().is_empty() {
            query.select_all(column_selections(M::descriptor(), "", Some(&self.table)))
        } else {
            query
        }
    }

    fn by_id_query(&self, key: impl Into<Value>) -> Result<Query> {
        let key_column = M::descriptor().single_key()?.column;
        Ok(self.new_query().and_where(Filter::eq(key_column, key)))
    }

    /// Builds the composite explicit-key lookup: only non-null supplied key
    /// fields become predicates.
    fn entity_keys_query(&self, key_entity: &M) -> Result<Query> {
        let descriptor = M::descriptor();
        let values = key_entity.to_values();
        let mut query = self.new_query();
        for field in descriptor.explicit_key_fields() {
            if let Some((_, value)) = values.iter().find(|(name, _)| *name == field.name) {
                query = query.and_where_opt(
                    None,
                    field.column,
                    value.clone(),
                    crate::query::NullHandling::SkipPredicate,
                );
            }
        }
        Ok(query)
    }

    fn max_records_query(&self, column: &str) -> Result<Query> {
        let max_info = self.new_query().as_max(column).compile(self.dialect())?;
        Ok(self
            .new_query()
            .and_where(Filter::raw(format!("{column} = ({})", max_info.sql))))
    }

    fn insert_plan(&self, entity: &M, options: &BatchOptions<'_>) -> Result<SqlInfo> {
        let descriptor = M::descriptor();
        let default_columns;
        let columns: &[&str] = match options.columns {
            Some(columns) => columns,
            None => {
                default_columns = descriptor.table_columns(true, false);
                &default_columns
            }
        };
        batch::insert_sql(self.dialect(), &self.table, columns, entity, options.value_override)
    }

    fn update_plan(&self, entity: &M, value_override: Option<ValueOverride<'_>>) -> Result<SqlInfo> {
        let descriptor = M::descriptor();
        let columns = descriptor.table_columns(true, true);
        let keys = descriptor.key_columns();
        if keys.is_empty() {
            return Err(Error::Configuration(format!(
                "update of table '{}' requires at least one key field",
                self.table
            )));
        }
        batch::update_sql(self.dialect(), &self.table, &columns, &keys, entity, value_override)
    }

    fn delete_plan(&self, entity: &M, value_override: Option<ValueOverride<'_>>) -> Result<SqlInfo> {
        let keys = M::descriptor().key_columns();
        if keys.is_empty() {
            return Err(Error::Configuration(format!(
                "delete of table '{}' requires at least one key field",
                self.table
            )));
        }
        batch::delete_sql(self.dialect(), &self.table, &keys, entity, value_override)
    }

    fn refresh_plan(&self, entity: &M) -> Result<Option<SqlInfo>> {
        let keys = M::descriptor().key_columns();
        if keys.is_empty() {
            return Ok(None);
        }
        batch::refresh_sql(self.dialect(), &self.table, &keys, entity).map(Some)
    }

    /// Builds the per-chunk statements for a batch insert, returning the
    /// statements and the effective (clamped) batch size.
    fn insert_batches(
        &self, entities: &[M], options: &BatchOptions<'_>,
    ) -> Result<(Vec<SqlInfo>, usize)> {
        let descriptor = M::descriptor();
        let default_columns;
        let columns: &[&str] = match options.columns {
            Some(columns) => columns,
            None => {
                default_columns = descriptor.table_columns(true, false);
                &default_columns
            }
        };
        let requested = options.batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
        let batch_size = clamp_batch_size(requested, self.dialect(), columns.len())?;
        let infos = batch::partition(entities, batch_size)
            .into_iter()
            .map(|chunk| {
                insert_batch_sql(self.dialect(), &self.table, columns, chunk, options.value_override)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((infos, batch_size))
    }

    fn update_batches(
        &self, entities: &[M], options: &BatchOptions<'_>,
    ) -> Result<(Vec<SqlInfo>, usize)> {
        let descriptor = M::descriptor();
        let default_columns;
        let columns: &[&str] = match options.columns {
            Some(columns) => columns,
            None => {
                default_columns = descriptor.table_columns(false, true);
                &default_columns
            }
        };
        let keys = descriptor.key_columns();
        if keys.is_empty() {
            return Err(Error::Configuration(format!(
                "batch update of table '{}' requires at least one key field",
                self.table
            )));
        }
        let requested = options.batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
        let batch_size =
            clamp_batch_size(requested, self.dialect(), keys.len() + columns.len())?;
        let infos = batch::partition(entities, batch_size)
            .into_iter()
            .map(|chunk| {
                update_batch_sql(
                    self.dialect(),
                    &self.table,
                    columns,
                    &keys,
                    chunk,
                    options.value_override,
                )
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((infos, batch_size))
    }

    fn delete_batches(
        &self, entities: &[M], options: &BatchOptions<'_>,
    ) -> Result<(Vec<SqlInfo>, usize)> {
        let descriptor = M::descriptor();
        let default_columns;
        let columns: &[&str] = match options.columns {
            Some(columns) => columns,
            None => {
                default_columns = descriptor.key_columns();
                &default_columns
            }
        };
        if columns.is_empty() {
            return Err(Error::Configuration(format!(
                "batch delete of table '{}' has no criteria columns and no key fields",
                self.table
            )));
        }
        let requested = options.batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
        let batch_size = clamp_batch_size(requested, self.dialect(), columns.len())?;
        let infos = batch::partition(entities, batch_size)
            .into_iter()
            .map(|chunk| {
                delete_batch_sql(self.dialect(), &self.table, columns, chunk, options.value_override)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((infos, batch_size))
    }

    fn distinct_key_values(&self, entities: &[M]) -> Result<(&'static str, Vec<Value>)> {
        let key = M::descriptor().single_key()?;
        let mut values: Vec<Value> = Vec::new();
        for entity in entities {
            let value = entity.value_of_column(key.column)?;
            if !values.contains(&value) {
                values.push(value);
            }
        }
        Ok((key.column, values))
    }

    fn delete_all_rows_plan(&self) -> SqlInfo {
        SqlInfo::new(format!("DELETE FROM {}", self.table), Vec::new())
    }

    fn truncate_plan(&self) -> SqlInfo {
        SqlInfo::new(format!("TRUNCATE TABLE {}", self.table), Vec::new())
    }
}

// Synchronous surface.
impl<M: Entity, E: Executor> Dal<M, E> {
    fn run(&self, info: &SqlInfo) -> Result<u64> {
        self.log(info);
        self.executor
            .execute(info, self.config.timeout)
            .map_err(Error::Execution)
    }

    fn run_rows(&self, info: &SqlInfo) -> Result<Vec<Row>> {
        self.log(info);
        self.executor
            .query(info, self.config.timeout)
            .map_err(Error::Execution)
    }

    fn run_scalar(&self, info: &SqlInfo) -> Result<Option<SqlValue>> {
        self.log(info);
        self.executor
            .query_scalar(info, self.config.timeout)
            .map_err(Error::Execution)
    }

    fn run_insert(&self, info: &SqlInfo, sequence: Option<&str>) -> Result<i64> {
        self.log(info);
        self.executor
            .insert(info, sequence, self.config.timeout)
            .map_err(Error::Execution)
    }

    fn run_batches(&self, infos: &[SqlInfo], parallel: bool) -> Result<()>
    where
        E: Sync,
    {
        if parallel {
            let mut outcomes = Vec::with_capacity(infos.len());
            std::thread::scope(|scope| {
                let handles: Vec<_> = infos
                    .iter()
                    .map(|info| scope.spawn(move || self.run(info)))
                    .collect();
                for handle in handles {
                    outcomes.push(handle.join());
                }
            });
            for outcome in outcomes {
                match outcome {
                    Ok(Ok(_)) => {}
                    Ok(Err(err)) => return Err(err),
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            }
        } else {
            for info in infos {
                self.run(info)?;
            }
        }
        Ok(())
    }

    /// Fetches one entity by its single key value.
    pub fn get(&self, key: impl Into<Value>) -> Result<Option<M>> {
        let query = self.by_id_query(key)?;
        self.get_by_query(query)
    }

    /// Fetches the first entity matched by the query.
    pub fn get_by_query(&self, query: Query) -> Result<Option<M>> {
        Ok(self.query(query.limit(1))?.into_iter().next())
    }

    /// Fetches the first row of the table.
    pub fn get_first(&self) -> Result<Option<M>> {
        self.get_by_query(self.new_query())
    }

    /// Fetches up to `limit` entities; `0` means all.
    pub fn get_all(&self, limit: u64) -> Result<Vec<M>> {
        self.query(self.new_query().limit(limit))
    }

    /// Runs a query and rehydrates the flat rows into entities, grouping
    /// prefixed include columns into navigation fields.
    pub fn query(&self, query: Query) -> Result<Vec<M>> {
        let info = self.compile(self.with_entity_selections(query))?;
        let rows = self.run_rows(&info)?;
        hydrate_rows(&rows)
    }

    /// Fetches entities where `column = value`.
    pub fn query_by_column(&self, column: &str, value: impl Into<Value>) -> Result<Vec<M>> {
        self.query(self.new_query().and_where(Filter::eq(column, value)))
    }

    /// Fetches entities where `column IN (values)`.
    pub fn query_by_in_clause(
        &self, column: &str, values: impl IntoIterator<Item = impl Into<Value>>,
    ) -> Result<Vec<M>> {
        self.query(self.new_query().and_where(Filter::is_in(column, values)))
    }

    /// Fetches entities matching the non-null explicit-key fields of
    /// `key_entity`.
    pub fn query_by_entity_keys(&self, key_entity: &M) -> Result<Vec<M>> {
        let query = self.entity_keys_query(key_entity)?;
        self.query(query)
    }

    /// Fetches the first entity matching the non-null explicit-key fields.
    pub fn get_by_entity_keys(&self, key_entity: &M) -> Result<Option<M>> {
        let query = self.entity_keys_query(key_entity)?;
        self.get_by_query(query)
    }

    /// Maximum value of a column, `None` on an empty table.
    pub fn max_of_column<T: FromSqlValue>(&self, column: &str) -> Result<Option<T>> {
        let info = self.compile(self.new_query().as_max(column))?;
        self.run_scalar(&info)?
            .filter(|value| !value.is_null())
            .map(|value| T::from_sql(&value))
            .transpose()
    }

    /// Minimum value of a column, `None` on an empty table.
    pub fn min_of_column<T: FromSqlValue>(&self, column: &str) -> Result<Option<T>> {
        let info = self.compile(self.new_query().as_min(column))?;
        self.run_scalar(&info)?
            .filter(|value| !value.is_null())
            .map(|value| T::from_sql(&value))
            .transpose()
    }

    /// Entities holding the maximum value of a column.
    pub fn records_with_max_value_of_column(&self, column: &str) -> Result<Vec<M>> {
        let query = self.max_records_query(column)?;
        self.query(query)
    }

    /// Row count of the table.
    pub fn count(&self) -> Result<u64> {
        self.count_query(self.new_query())
    }

    /// Row count of an arbitrary query.
    pub fn count_query(&self, query: Query) -> Result<u64> {
        let info = self.compile(query.as_count())?;
        let value = self.run_scalar(&info)?.unwrap_or(SqlValue::Int64(0));
        u64::from_sql(&value)
    }

    /// Inserts one entity, writes the generated identity back onto its
    /// auto-increment field, and refreshes server-computed columns by
    /// re-reading the row.
    pub fn insert(
        &self, entity: &mut M, value_override: Option<ValueOverride<'_>>,
    ) -> Result<i64> {
        let options = BatchOptions { value_override, ..BatchOptions::default() };
        let info = self.insert_plan(entity, &options)?;
        let sequence = M::descriptor().auto_increment_field()?.and_then(|field| field.sequence);
        let identity = self.run_insert(&info, sequence)?;
        entity.set_identity(identity)?;
        self.refresh(entity)?;
        Ok(identity)
    }

    /// Updates one entity's non-key columns by its key columns, then
    /// refreshes server-computed columns.
    pub fn update(
        &self, entity: &mut M, value_override: Option<ValueOverride<'_>>,
    ) -> Result<()> {
        let info = self.update_plan(entity, value_override)?;
        self.run(&info)?;
        self.refresh(entity)
    }

    /// Deletes one entity by its key columns.
    pub fn delete(&self, entity: &M, value_override: Option<ValueOverride<'_>>) -> Result<()> {
        let info = self.delete_plan(entity, value_override)?;
        self.run(&info).map(|_| ())
    }

    fn refresh(&self, entity: &mut M) -> Result<()> {
        let Some(info) = self.refresh_plan(entity)? else {
            return Ok(());
        };
        let rows = self.run_rows(&info)?;
        if let Some(row) = rows.first() {
            entity.apply_row(row)?;
        }
        Ok(())
    }

    /// Inserts entities in parameter-ceiling-sized batches. Returns the
    /// effective batch size.
    pub fn insert_all(&self, entities: &[M], options: BatchOptions<'_>) -> Result<usize>
    where
        E: Sync,
    {
        let (infos, batch_size) = self.insert_batches(entities, &options)?;
        self.run_batches(&infos, options.parallel)?;
        Ok(batch_size)
    }

    /// Updates entities through the VALUES-join pattern in batches.
    /// Returns the effective batch size.
    pub fn update_all(&self, entities: &[M], options: BatchOptions<'_>) -> Result<usize>
    where
        E: Sync,
    {
        let (infos, batch_size) = self.update_batches(entities, &options)?;
        self.run_batches(&infos, options.parallel)?;
        Ok(batch_size)
    }

    /// Deletes entities through the VALUES-join pattern in batches.
    /// Returns the effective batch size.
    pub fn delete_all(&self, entities: &[M], options: BatchOptions<'_>) -> Result<usize>
    where
        E: Sync,
    {
        let (infos, batch_size) = self.delete_batches(entities, &options)?;
        self.run_batches(&infos, options.parallel)?;
        Ok(batch_size)
    }

    /// Deletes the row with the given key value.
    pub fn delete_by_id(&self, key: impl Into<Value>) -> Result<()> {
        let query = self.by_id_query(key)?.as_delete();
        let info = self.compile(query)?;
        self.run(&info).map(|_| ())
    }

    /// Deletes rows where `column IN (values)`.
    pub fn delete_by_in_clause(
        &self, column: &str, values: impl IntoIterator<Item = impl Into<Value>>,
    ) -> Result<()> {
        let query = self.new_query().and_where(Filter::is_in(column, values)).as_delete();
        let info = self.compile(query)?;
        self.run(&info).map(|_| ())
    }

    /// Deletes the given entities by their distinct key values through one
    /// IN-clause.
    pub fn delete_by_key_column(&self, entities: &[M]) -> Result<()> {
        let (column, values) = self.distinct_key_values(entities)?;
        self.delete_by_in_clause(column, values)
    }

    /// Deletes every row of the table.
    pub fn delete_all_rows(&self) -> Result<()> {
        self.run(&self.delete_all_rows_plan()).map(|_| ())
    }

    /// Truncates the table.
    pub fn truncate(&self) -> Result<()> {
        self.run(&self.truncate_plan()).map(|_| ())
    }

    /// Updates `set` column values on rows matching the `where_pairs`
    /// equality predicates.
    pub fn update_where(
        &self,
        where_pairs: impl IntoIterator<Item = (String, Value)>,
        set: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<u64> {
        let mut query = self.new_query();
        for (column, value) in where_pairs {
            query = query.and_where(Filter::Eq(None, column, value));
        }
        let info = self.compile(query.as_update(set))?;
        self.run(&info)
    }
}

// Asynchronous surface.
impl<M: Entity, E: AsyncExecutor> Dal<M, E> {
    async fn run_async(&self, info: &SqlInfo) -> Result<u64> {
        self.log(info);
        self.executor
            .execute(info, self.config.timeout)
            .await
            .map_err(Error::Execution)
    }

    async fn run_rows_async(&self, info: &SqlInfo) -> Result<Vec<Row>> {
        self.log(info);
        self.executor
            .query(info, self.config.timeout)
            .await
            .map_err(Error::Execution)
    }

    async fn run_scalar_async(&self, info: &SqlInfo) -> Result<Option<SqlValue>> {
        self.log(info);
        self.executor
            .query_scalar(info, self.config.timeout)
            .await
            .map_err(Error::Execution)
    }

    async fn run_insert_async(&self, info: &SqlInfo, sequence: Option<&str>) -> Result<i64> {
        self.log(info);
        self.executor
            .insert(info, sequence, self.config.timeout)
            .await
            .map_err(Error::Execution)
    }

    /// Runs batch statements, concurrently when requested. All chunks run
    /// to completion; the first error is surfaced after joining.
    async fn run_batches_async(&self, infos: &[SqlInfo], parallel: bool) -> Result<()> {
        if parallel {
            let outcomes =
                futures::future::join_all(infos.iter().map(|info| self.run_async(info))).await;
            for outcome in outcomes {
                outcome?;
            }
        } else {
            for info in infos {
                self.run_async(info).await?;
            }
        }
        Ok(())
    }

    /// Fetches one entity by its single key value.
    pub async fn get_async(&self, key: impl Into<Value>) -> Result<Option<M>> {
        let query = self.by_id_query(key)?;
        self.get_by_query_async(query).await
    }

    /// Fetches the first entity matched by the query.
    pub async fn get_by_query_async(&self, query: Query) -> Result<Option<M>> {
        Ok(self.query_async(query.limit(1)).await?.into_iter().next())
    }

    /// Fetches the first row of the table.
    pub async fn get_first_async(&self) -> Result<Option<M>> {
        self.get_by_query_async(self.new_query()).await
    }

    /// Fetches up to `limit` entities; `0` means all.
    pub async fn get_all_async(&self, limit: u64) -> Result<Vec<M>> {
        self.query_async(self.new_query().limit(limit)).await
    }

    /// Runs a query and rehydrates the flat rows into entities.
    pub async fn query_async(&self, query: Query) -> Result<Vec<M>> {
        let info = self.compile(self.with_entity_selections(query))?;
        let rows = self.run_rows_async(&info).await?;
        hydrate_rows(&rows)
    }

    /// Fetches entities where `column = value`.
    pub async fn query_by_column_async(
        &self, column: &str, value: impl Into<Value>,
    ) -> Result<Vec<M>> {
        self.query_async(self.new_query().and_where(Filter::eq(column, value))).await
    }

    /// Fetches entities where `column IN (values)`.
    pub async fn query_by_in_clause_async(
        &self, column: &str, values: impl IntoIterator<Item = impl Into<Value>>,
    ) -> Result<Vec<M>> {
        self.query_async(self.new_query().and_where(Filter::is_in(column, values))).await
    }

    /// Fetches entities matching the non-null explicit-key fields.
    pub async fn query_by_entity_keys_async(&self, key_entity: &M) -> Result<Vec<M>> {
        let query = self.entity_keys_query(key_entity)?;
        self.query_async(query).await
    }

    /// Fetches the first entity matching the non-null explicit-key fields.
    pub async fn get_by_entity_keys_async(&self, key_entity: &M) -> Result<Option<M>> {
        let query = self.entity_keys_query(key_entity)?;
        self.get_by_query_async(query).await
    }

    /// Maximum value of a column, `None` on an empty table.
    pub async fn max_of_column_async<T: FromSqlValue>(&self, column: &str) -> Result<Option<T>> {
        let info = self.compile(self.new_query().as_max(column))?;
        self.run_scalar_async(&info)
            .await?
            .filter(|value| !value.is_null())
            .map(|value| T::from_sql(&value))
            .transpose()
    }

    /// Minimum value of a column, `None` on an empty table.
    pub async fn min_of_column_async<T: FromSqlValue>(&self, column: &str) -> Result<Option<T>> {
        let info = self.compile(self.new_query().as_min(column))?;
        self.run_scalar_async(&info)
            .await?
            .filter(|value| !value.is_null())
            .map(|value| T::from_sql(&value))
            .transpose()
    }

    /// Entities holding the maximum value of a column.
    pub async fn records_with_max_value_of_column_async(&self, column: &str) -> Result<Vec<M>> {
        let query = self.max_records_query(column)?;
        self.query_async(query).await
    }

    /// Row count of the table.
    pub async fn count_async(&self) -> Result<u64> {
        self.count_query_async(self.new_query()).await
    }

    /// Row count of an arbitrary query.
    pub async fn count_query_async(&self, query: Query) -> Result<u64> {
        let info = self.compile(query.as_count())?;
        let value = self.run_scalar_async(&info).await?.unwrap_or(SqlValue::Int64(0));
        u64::from_sql(&value)
    }

    /// Inserts one entity, writes the generated identity back, and
    /// refreshes server-computed columns.
    pub async fn insert_async(
        &self, entity: &mut M, value_override: Option<ValueOverride<'_>>,
    ) -> Result<i64> {
        let options = BatchOptions { value_override, ..BatchOptions::default() };
        let info = self.insert_plan(entity, &options)?;
        let sequence = M::descriptor().auto_increment_field()?.and_then(|field| field.sequence);
        let identity = self.run_insert_async(&info, sequence).await?;
        entity.set_identity(identity)?;
        self.refresh_async(entity).await?;
        Ok(identity)
    }

    /// Updates one entity by its key columns, then refreshes
    /// server-computed columns.
    pub async fn update_async(
        &self, entity: &mut M, value_override: Option<ValueOverride<'_>>,
    ) -> Result<()> {
        let info = self.update_plan(entity, value_override)?;
        self.run_async(&info).await?;
        self.refresh_async(entity).await
    }

    /// Deletes one entity by its key columns.
    pub async fn delete_async(
        &self, entity: &M, value_override: Option<ValueOverride<'_>>,
    ) -> Result<()> {
        let info = self.delete_plan(entity, value_override)?;
        self.run_async(&info).await.map(|_| ())
    }

    async fn refresh_async(&self, entity: &mut M) -> Result<()> {
        let Some(info) = self.refresh_plan(entity)? else {
            return Ok(());
        };
        let rows = self.run_rows_async(&info).await?;
        if let Some(row) = rows.first() {
            entity.apply_row(row)?;
        }
        Ok(())
    }

    /// Inserts entities in batches. Returns the effective batch size.
    pub async fn insert_all_async(
        &self, entities: &[M], options: BatchOptions<'_>,
    ) -> Result<usize> {
        let (infos, batch_size) = self.insert_batches(entities, &options)?;
        self.run_batches_async(&infos, options.parallel).await?;
        Ok(batch_size)
    }

    /// Updates entities through the VALUES-join pattern in batches.
    pub async fn update_all_async(
        &self, entities: &[M], options: BatchOptions<'_>,
    ) -> Result<usize> {
        let (infos, batch_size) = self.update_batches(entities, &options)?;
        self.run_batches_async(&infos, options.parallel).await?;
        Ok(batch_size)
    }

    /// Deletes entities through the VALUES-join pattern in batches.
    pub async fn delete_all_async(
        &self, entities: &[M], options: BatchOptions<'_>,
    ) -> Result<usize> {
        let (infos, batch_size) = self.delete_batches(entities, &options)?;
        self.run_batches_async(&infos, options.parallel).await?;
        Ok(batch_size)
    }

    /// Deletes the row with the given key value.
    pub async fn delete_by_id_async(&self, key: impl Into<Value>) -> Result<()> {
        let query = self.by_id_query(key)?.as_delete();
        let info = self.compile(query)?;
        self.run_async(&info).await.map(|_| ())
    }

    /// Deletes rows where `column IN (values)`.
    pub async fn delete_by_in_clause_async(
        &self, column: &str, values: impl IntoIterator<Item = impl Into<Value>>,
    ) -> Result<()> {
        let query = self.new_query().and_where(Filter::is_in(column, values)).as_delete();
        let info = self.compile(query)?;
        self.run_async(&info).await.map(|_| ())
    }

    /// Deletes the given entities by their distinct key values.
    pub async fn delete_by_key_column_async(&self, entities: &[M]) -> Result<()> {
        let (column, values) = self.distinct_key_values(entities)?;
        self.delete_by_in_clause_async(column, values).await
    }

    /// Deletes every row of the table.
    pub async fn delete_all_rows_async(&self) -> Result<()> {
        self.run_async(&self.delete_all_rows_plan()).await.map(|_| ())
    }

    /// Truncates the table.
    pub async fn truncate_async(&self) -> Result<()> {
        self.run_async(&self.truncate_plan()).await.map(|_| ())
    }

    /// Updates `set` column values on rows matching the equality
    /// predicates.
    pub async fn update_where_async(
        &self,
        where_pairs: impl IntoIterator<Item = (String, Value)>,
        set: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<u64> {
        let mut query = self.new_query();
        for (column, value) in where_pairs {
            query = query.and_where(Filter::Eq(None, column, value));
        }
        let info = self.compile(query.as_update(set))?;
        self.run_async(&info).await
    }
}
