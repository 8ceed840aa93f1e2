//! Entity trait and the `entity!` declaration macro.
//!
//! The macro replaces attribute reflection with explicit per-type
//! registration: table name, key fields, auto-increment field (with an
//! optional sequence name), column-name overrides, and navigation fields
//! are declared in the header, and the generated [`Entity`] impl caches the
//! resulting [`EntityDescriptor`] in a `LazyLock` for the process lifetime.

use sea_query::Value;

use crate::descriptor::EntityDescriptor;
use crate::error::{Error, Result};
use crate::value::{Row, SqlValue, from_query_value};

/// A record type mapped to one database table.
///
/// Implemented by the [`entity!`](crate::entity) macro rather than by hand.
pub trait Entity: Sized {
    /// The mapped table name, possibly schema-qualified.
    const TABLE: &'static str;

    /// The cached metadata for this type.
    fn descriptor() -> &'static EntityDescriptor;

    /// Builds an instance from a flat row whose columns are aliased with
    /// `prefix` + field name. Returns `None` when the key columns under the
    /// prefix are absent or NULL, which is how a left join signals "no
    /// related row".
    fn hydrate(row: &Row, prefix: &str) -> Result<Option<Self>>;

    /// Folds one row's worth of navigation data into this instance.
    fn absorb_navigations(&mut self, row: &Row, prefix: &str) -> Result<()>;

    /// The persisted field values as query-builder bind values, in field
    /// declaration order.
    fn to_values(&self) -> Vec<(&'static str, Value)>;

    /// Assigns a database value onto the named field, skipping NULLs so
    /// in-memory values survive partial projections. Returns `false` when
    /// the field does not exist.
    fn apply_value(&mut self, field: &str, value: &SqlValue) -> Result<bool>;

    /// Builds an instance from an unprefixed row.
    fn from_row(row: &Row) -> Result<Self> {
        Self::hydrate(row, "")?.ok_or_else(|| {
            Error::Conversion(format!(
                "row has no key columns for entity of table '{}'",
                Self::TABLE
            ))
        })
    }

    /// The entity's key values in key-field order, used to de-duplicate
    /// rehydrated rows.
    fn key_values(&self) -> Result<Vec<SqlValue>> {
        let values = self.to_values();
        Self::descriptor()
            .key_fields()
            .map(|field| {
                values
                    .iter()
                    .find(|(name, _)| *name == field.name)
                    .map_or(Ok(SqlValue::Null), |(_, value)| {
                        from_query_value(value.clone())
                    })
            })
            .collect()
    }

    /// Writes a generated identity back onto the auto-increment field, if
    /// the entity declares one.
    fn set_identity(&mut self, identity: i64) -> Result<()> {
        if let Some(field) = Self::descriptor().auto_increment_field()? {
            self.apply_value(field.name, &SqlValue::Int64(identity))?;
        }
        Ok(())
    }

    /// Refreshes server-computed columns from a freshly re-read row.
    ///
    /// Columns are matched case-insensitively; key and auto-increment
    /// columns, unknown columns, and NULL values are skipped.
    fn apply_row(&mut self, row: &Row) -> Result<()> {
        let descriptor = Self::descriptor();
        for cell in &row.fields {
            let Some(field) = descriptor.field_by_column(&cell.name) else {
                continue;
            };
            if field.is_any_key() || field.is_auto_increment || cell.value.is_null() {
                continue;
            }
            self.apply_value(field.name, &cell.value)?;
        }
        Ok(())
    }

    /// The bind value of the field mapped to `column` (case-insensitive).
    fn value_of_column(&self, column: &str) -> Result<Value> {
        let descriptor = Self::descriptor();
        let field = descriptor.field_by_column(column).ok_or_else(|| {
            Error::Configuration(format!(
                "table '{}' has no mapped column '{column}'",
                Self::TABLE
            ))
        })?;
        self.to_values()
            .into_iter()
            .find(|(name, _)| *name == field.name)
            .map(|(_, value)| value)
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "field '{}' of table '{}' carries no value",
                    field.name,
                    Self::TABLE
                ))
            })
    }
}

/// A navigation slot on an entity: a collection or single related entity
/// assembled from prefixed row columns.
pub trait Navigation: Default {
    /// Folds one row into the slot. Rows whose prefixed key columns are
    /// NULL are ignored; collection slots de-duplicate by key and keep
    /// absorbing nested navigations into the existing element.
    fn absorb(&mut self, row: &Row, prefix: &str) -> Result<()>;
}

impl<T: Entity> Navigation for Vec<T> {
    fn absorb(&mut self, row: &Row, prefix: &str) -> Result<()> {
        let Some(candidate) = T::hydrate(row, prefix)? else {
            return Ok(());
        };
        let key = candidate.key_values()?;
        if !key.is_empty() {
            for existing in self.iter_mut() {
                if existing.key_values()? == key {
                    return existing.absorb_navigations(row, prefix);
                }
            }
        }
        self.push(candidate);
        Ok(())
    }
}

impl<T: Entity> Navigation for Option<T> {
    fn absorb(&mut self, row: &Row, prefix: &str) -> Result<()> {
        match self {
            Some(existing) => existing.absorb_navigations(row, prefix),
            None => {
                *self = T::hydrate(row, prefix)?;
                Ok(())
            }
        }
    }
}

/// Declares an entity struct and implements [`Entity`] for it.
///
/// Header sections, all optional except `table`, in this order:
/// `keys = [...]` (server-assigned identity fields), `explicit = [...]`
/// (caller-assigned key fields, composite allowed), `auto = [field]` or
/// `auto = [field => "SequenceName"]`, and `columns = [(field, "Column")]`
/// overrides. Navigation fields are declared with `nav` instead of `pub`
/// and are excluded from persistence.
///
/// # Examples
///
/// ```
/// use strata::entity;
///
/// entity! {
///     table = "Purchasing.PurchaseOrders",
///     keys = [id],
///     auto = [id => "PurchaseOrderId"],
///     columns = [(id, "PurchaseOrderId")],
///     #[derive(Debug, Clone, Default)]
///     pub struct PurchaseOrder {
///         pub id: i32,
///         pub supplier_id: i32,
///         nav lines: Vec<PurchaseOrderLine>,
///     }
/// }
///
/// entity! {
///     table = "Purchasing.PurchaseOrderLines",
///     keys = [id],
///     #[derive(Debug, Clone, Default)]
///     pub struct PurchaseOrderLine {
///         pub id: i32,
///         pub purchase_order_id: i32,
///     }
/// }
/// ```
#[macro_export]
macro_rules! entity {
    // Canonical, fully-specified form.
    (
        table = $table:literal,
        keys = [$($key:ident),* $(,)?],
        explicit = [$($ekey:ident),* $(,)?],
        auto = [$($auto:ident $(=> $seq:literal)?),* $(,)?],
        columns = [$(($cfield:ident, $cname:literal)),* $(,)?],
        $(#[$meta:meta])*
        pub struct $name:ident {
            $($fields:tt)*
        }
    ) => {
        $crate::entity!(@munch
            [$table, [$($key),*], [$($ekey),*], [$($auto $(=> $seq)?),*], [$(($cfield, $cname)),*], [$(#[$meta])*], $name]
            []
            []
            $($fields)*
        );
    };

    // Normalizing arms: fill in omitted header sections, in canonical order.
    (table = $table:literal, explicit = $($rest:tt)*) => {
        $crate::entity!(table = $table, keys = [], explicit = $($rest)*);
    };
    (table = $table:literal, auto = $($rest:tt)*) => {
        $crate::entity!(table = $table, keys = [], explicit = [], auto = $($rest)*);
    };
    (table = $table:literal, columns = $($rest:tt)*) => {
        $crate::entity!(table = $table, keys = [], explicit = [], auto = [], columns = $($rest)*);
    };
    (table = $table:literal, $(#[$meta:meta])* pub struct $($rest:tt)*) => {
        $crate::entity!(
            table = $table, keys = [], explicit = [], auto = [], columns = [],
            $(#[$meta])* pub struct $($rest)*
        );
    };
    (table = $table:literal, keys = $keys:tt, auto = $($rest:tt)*) => {
        $crate::entity!(table = $table, keys = $keys, explicit = [], auto = $($rest)*);
    };
    (table = $table:literal, keys = $keys:tt, columns = $($rest:tt)*) => {
        $crate::entity!(table = $table, keys = $keys, explicit = [], auto = [], columns = $($rest)*);
    };
    (table = $table:literal, keys = $keys:tt, $(#[$meta:meta])* pub struct $($rest:tt)*) => {
        $crate::entity!(
            table = $table, keys = $keys, explicit = [], auto = [], columns = [],
            $(#[$meta])* pub struct $($rest)*
        );
    };
    (table = $table:literal, keys = $keys:tt, explicit = $explicit:tt, columns = $($rest:tt)*) => {
        $crate::entity!(
            table = $table, keys = $keys, explicit = $explicit, auto = [], columns = $($rest)*
        );
    };
    (table = $table:literal, keys = $keys:tt, explicit = $explicit:tt, $(#[$meta:meta])* pub struct $($rest:tt)*) => {
        $crate::entity!(
            table = $table, keys = $keys, explicit = $explicit, auto = [], columns = [],
            $(#[$meta])* pub struct $($rest)*
        );
    };
    (table = $table:literal, keys = $keys:tt, explicit = $explicit:tt, auto = $auto:tt, $(#[$meta:meta])* pub struct $($rest:tt)*) => {
        $crate::entity!(
            table = $table, keys = $keys, explicit = $explicit, auto = $auto, columns = [],
            $(#[$meta])* pub struct $($rest)*
        );
    };

    // Field muncher: persisted field.
    (@munch $header:tt [$($persisted:tt)*] [$($navs:tt)*]
        $(#[$fmeta:meta])* pub $fname:ident : $fty:ty , $($rest:tt)*
    ) => {
        $crate::entity!(@munch $header
            [$($persisted)* { $(#[$fmeta])* $fname : $fty }]
            [$($navs)*]
            $($rest)*
        );
    };
    // Field muncher: navigation field.
    (@munch $header:tt [$($persisted:tt)*] [$($navs:tt)*]
        $(#[$fmeta:meta])* nav $fname:ident : $fty:ty , $($rest:tt)*
    ) => {
        $crate::entity!(@munch $header
            [$($persisted)*]
            [$($navs)* { $(#[$fmeta])* $fname : $fty }]
            $($rest)*
        );
    };

    // All fields consumed: emit the struct and the Entity impl.
    (@munch
        [$table:literal, [$($key:ident),*], [$($ekey:ident),*], [$($auto:ident $(=> $seq:literal)?),*], [$(($cfield:ident, $cname:literal)),*], [$(#[$meta:meta])*], $name:ident]
        [$({ $(#[$pmeta:meta])* $pfield:ident : $ptype:ty })*]
        [$({ $(#[$nmeta:meta])* $nfield:ident : $ntype:ty })*]
    ) => {
        $(#[$meta])*
        pub struct $name {
            $( $(#[$pmeta])* pub $pfield : $ptype, )*
            $( $(#[$nmeta])* pub $nfield : $ntype, )*
        }

        impl $crate::Entity for $name {
            const TABLE: &'static str = $table;

            fn descriptor() -> &'static $crate::EntityDescriptor {
                static DESCRIPTOR: ::std::sync::LazyLock<$crate::EntityDescriptor> =
                    ::std::sync::LazyLock::new(|| {
                        $crate::EntityDescriptor::new(
                            $table,
                            &[$(stringify!($pfield)),*],
                            &[$(stringify!($nfield)),*],
                            &$crate::MetaLists {
                                keys: ::std::vec![$(stringify!($key)),*],
                                explicit: ::std::vec![$(stringify!($ekey)),*],
                                auto: ::std::vec![
                                    $((stringify!($auto), $crate::entity!(@sequence $($seq)?))),*
                                ],
                                columns: ::std::vec![$((stringify!($cfield), $cname)),*],
                            },
                        )
                    });
                &DESCRIPTOR
            }

            fn hydrate(
                row: &$crate::Row, prefix: &str,
            ) -> $crate::Result<::std::option::Option<Self>> {
                if !$crate::hydrate::key_columns_present(Self::descriptor(), row, prefix) {
                    return ::std::result::Result::Ok(::std::option::Option::None);
                }
                let mut entity = Self {
                    $(
                        $pfield: row.decode::<$ptype>(
                            &::std::format!("{prefix}{}", stringify!($pfield)),
                        )?,
                    )*
                    $(
                        $nfield: <$ntype as ::std::default::Default>::default(),
                    )*
                };
                $crate::Entity::absorb_navigations(&mut entity, row, prefix)?;
                ::std::result::Result::Ok(::std::option::Option::Some(entity))
            }

            fn absorb_navigations(
                &mut self, row: &$crate::Row, prefix: &str,
            ) -> $crate::Result<()> {
                let _ = (row, prefix);
                $(
                    $crate::Navigation::absorb(
                        &mut self.$nfield,
                        row,
                        &::std::format!("{prefix}{}_", stringify!($nfield)),
                    )?;
                )*
                ::std::result::Result::Ok(())
            }

            fn to_values(
                &self,
            ) -> ::std::vec::Vec<(&'static str, $crate::sea_query::Value)> {
                ::std::vec![
                    $(
                        (
                            stringify!($pfield),
                            ::std::convert::Into::into(
                                ::std::clone::Clone::clone(&self.$pfield),
                            ),
                        ),
                    )*
                ]
            }

            fn apply_value(
                &mut self, field: &str, value: &$crate::SqlValue,
            ) -> $crate::Result<bool> {
                $(
                    if field == stringify!($pfield) {
                        if !value.is_null() {
                            self.$pfield =
                                <$ptype as $crate::FromSqlValue>::from_sql(value)?;
                        }
                        return ::std::result::Result::Ok(true);
                    }
                )*
                let _ = value;
                ::std::result::Result::Ok(false)
            }
        }
    };

    (@sequence) => { ::std::option::Option::None };
    (@sequence $seq:literal) => { ::std::option::Option::Some($seq) };
}
