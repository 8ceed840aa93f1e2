//! Generic SQL data-access layer.
//!
//! Strata maps entity types onto tables through explicit per-type metadata,
//! generates parameter-ceiling-aware batch statements, composes
//! relationship includes that rehydrate flat rows into nested graphs, and
//! exposes a CRUD facade that delegates query compilation to `sea-query`
//! and execution to an injected [`Executor`] / [`AsyncExecutor`].
//!
//! # Quick Start
//!
//! ## Define entities
//!
//! ```ignore
//! use strata::entity;
//!
//! entity! {
//!     table = "Purchasing.PurchaseOrders",
//!     keys = [id],
//!     auto = [id => "PurchaseOrderId"],
//!     columns = [(id, "PurchaseOrderId")],
//!     #[derive(Debug, Clone, Default)]
//!     pub struct PurchaseOrder {
//!         pub id: i32,
//!         pub supplier_id: i32,
//!         pub order_date: chrono::NaiveDate,
//!         nav purchase_order_lines: Vec<PurchaseOrderLine>,
//!     }
//! }
//! ```
//!
//! ## CRUD
//!
//! ```ignore
//! use std::sync::Arc;
//! use strata::{BatchOptions, Dal, DalConfig, SqlServerDialect};
//!
//! let dal: Dal<PurchaseOrder, _> =
//!     Dal::new(executor, DalConfig::new(Arc::new(SqlServerDialect)));
//!
//! let mut order = PurchaseOrder { supplier_id: 2, ..Default::default() };
//! let id = dal.insert(&mut order, None)?;              // identity written back
//! let fetched = dal.get(id)?;
//! dal.insert_all(&orders, BatchOptions::default())?;   // ceiling-sized batches
//! ```
//!
//! ## Includes
//!
//! ```ignore
//! use strata::{JoinEdge, JoinKind};
//!
//! let mut query = dal.new_query();
//! dal.include_chain::<PurchaseOrderLine, PackageType>(
//!     &mut query,
//!     &JoinEdge::on("id", "purchase_order_id").via("purchase_order_lines"),
//!     &JoinEdge::on("package_type_id", "id").via("package_type"),
//!     JoinKind::Inner,
//! )?;
//! let orders = dal.query(query)?;  // nested graphs, de-duplicated by key
//! ```
//!
//! ## Database-side values
//!
//! ```ignore
//! use strata::batch::utc_now_for_column;
//!
//! let touch = utc_now_for_column(dal.dialect(), "last_edited_when");
//! dal.update(&mut order, Some(&touch))?;
//! ```

pub mod batch;
mod dal;
mod descriptor;
mod dialect;
mod entity;
mod error;
mod executor;
mod filter;
pub mod hydrate;
mod include;
mod join;
mod query;
pub mod select;
mod value;

pub use dal::{BatchOptions, Dal, DalConfig};
pub use descriptor::{EntityDescriptor, FieldDescriptor, MetaLists};
pub use dialect::{DbEngine, Dialect, MySqlDialect, OracleDialect, SqlServerDialect};
pub use entity::{Entity, Navigation};
pub use error::{BoxError, Error, Result};
pub use executor::{AsyncExecutor, Executor, SqlInfo, SqlLogger};
pub use filter::{Filter, end_likeable, likeable};
pub use include::JoinEdge;
pub use join::{Join, JoinKind};
pub use query::{NullHandling, Query};
pub use select::Selection;
pub use value::{FromSqlValue, Row, RowField, SqlValue};

// Re-exported for the `entity!` macro and for callers building bind values.
pub use sea_query;
