//! Per-entity metadata: table name, field-to-column mapping, key and
//! auto-increment discovery.
//!
//! Descriptors are computed once per entity type (the `entity!` macro caches
//! them in a `LazyLock`) and are immutable afterwards, so lookups during
//! query building and rehydration are plain map access with no locking.

use crate::error::{Error, Result};

/// Metadata for one entity field.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// Rust field name; also the selection alias for unprefixed projections.
    pub name: &'static str,
    /// Database column name. Defaults to the field name unless overridden.
    pub column: &'static str,
    /// Server-assigned identity key.
    pub is_key: bool,
    /// Caller-assigned key; composite explicit keys are supported.
    pub is_explicit_key: bool,
    /// Populated by the database on insert.
    pub is_auto_increment: bool,
    /// Sequence backing the auto-increment column, for dialects that use
    /// sequences instead of an identity function.
    pub sequence: Option<&'static str>,
    /// Excluded from persistence; holds related-entity data from includes.
    pub is_computed: bool,
}

impl FieldDescriptor {
    /// Whether the field participates in key-based lookups.
    #[must_use]
    pub const fn is_any_key(&self) -> bool {
        self.is_key || self.is_explicit_key
    }
}

/// Key, auto-increment, and column-override declarations collected by the
/// `entity!` macro header sections.
#[derive(Debug, Default)]
pub struct MetaLists {
    /// Fields carrying a server-assigned identity.
    pub keys: Vec<&'static str>,
    /// Fields carrying a caller-assigned (possibly composite) key.
    pub explicit: Vec<&'static str>,
    /// Auto-increment fields with their optional sequence name.
    pub auto: Vec<(&'static str, Option<&'static str>)>,
    /// `(field, column)` overrides for fields whose column name differs.
    pub columns: Vec<(&'static str, &'static str)>,
}

/// Immutable metadata describing how an entity maps onto its table.
#[derive(Debug)]
pub struct EntityDescriptor {
    table: String,
    fields: Vec<FieldDescriptor>,
}

impl EntityDescriptor {
    /// Assembles a descriptor from the macro's field and metadata lists.
    ///
    /// Dialect escaping (backticks) is stripped from the table name so the
    /// stored name is always the plain, possibly schema-qualified form.
    #[must_use]
    pub fn new(
        table: &'static str,
        persisted: &[&'static str],
        navigations: &[&'static str],
        meta: &MetaLists,
    ) -> Self {
        let column_for = |name: &str| {
            meta.columns
                .iter()
                .find(|(field, _)| *field == name)
                .map(|(_, column)| *column)
        };
        let mut fields: Vec<FieldDescriptor> = persisted
            .iter()
            .map(|&name| {
                let auto = meta.auto.iter().find(|(field, _)| *field == name);
                FieldDescriptor {
                    name,
                    column: column_for(name).unwrap_or(name),
                    is_key: meta.keys.contains(&name),
                    is_explicit_key: meta.explicit.contains(&name),
                    is_auto_increment: auto.is_some(),
                    sequence: auto.and_then(|(_, sequence)| *sequence),
                    is_computed: false,
                }
            })
            .collect();
        fields.extend(navigations.iter().map(|&name| FieldDescriptor {
            name,
            column: name,
            is_key: false,
            is_explicit_key: false,
            is_auto_increment: false,
            sequence: None,
            is_computed: true,
        }));

        Self { table: table.replace('`', ""), fields }
    }

    /// The possibly schema-qualified table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// All fields in declaration order, persisted first.
    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Persisted (non-computed) fields in declaration order.
    pub fn persisted_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|field| !field.is_computed)
    }

    /// Navigation (computed) fields in declaration order.
    pub fn navigation_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|field| field.is_computed)
    }

    /// Key fields (server-assigned and explicit).
    pub fn key_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|field| field.is_any_key())
    }

    /// Explicit-key fields only.
    pub fn explicit_key_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|field| field.is_explicit_key)
    }

    /// Column names of the key fields.
    #[must_use]
    pub fn key_columns(&self) -> Vec<&'static str> {
        self.key_fields().map(|field| field.column).collect()
    }

    /// The single key field used by get/update/delete-by-id operations.
    ///
    /// Server-assigned keys take precedence over explicit keys, mirroring
    /// how a single auto-assigned identity is the common case.
    pub fn single_key(&self) -> Result<&FieldDescriptor> {
        let mut keys = self.fields.iter().filter(|field| field.is_key);
        if let Some(key) = keys.next() {
            if keys.next().is_some() {
                return Err(Error::configuration(format!(
                    "entity for table '{}' declares more than one key field",
                    self.table
                )));
            }
            return Ok(key);
        }

        let mut explicit = self.explicit_key_fields();
        match (explicit.next(), explicit.next()) {
            (Some(key), None) => Ok(key),
            (Some(_), Some(_)) => Err(Error::configuration(format!(
                "entity for table '{}' has a composite explicit key; single-key lookup is ambiguous",
                self.table
            ))),
            _ => Err(Error::configuration(format!(
                "entity for table '{}' has no key or explicit-key field",
                self.table
            ))),
        }
    }

    /// The auto-increment field, if any. At most one is allowed.
    pub fn auto_increment_field(&self) -> Result<Option<&FieldDescriptor>> {
        let mut autos = self.fields.iter().filter(|field| field.is_auto_increment);
        let first = autos.next();
        if autos.next().is_some() {
            return Err(Error::configuration(format!(
                "entity for table '{}' declares more than one auto-increment field",
                self.table
            )));
        }
        Ok(first)
    }

    /// Persisted column names, optionally excluding auto-increment and key
    /// columns. This is the default column list for insert (`ignore_auto`)
    /// and for update SET clauses (`ignore_keys`).
    #[must_use]
    pub fn table_columns(&self, ignore_auto_increment: bool, ignore_keys: bool) -> Vec<&'static str> {
        self.persisted_fields()
            .filter(|field| !(ignore_auto_increment && field.is_auto_increment))
            .filter(|field| !(ignore_keys && field.is_any_key()))
            .map(|field| field.column)
            .collect()
    }

    /// Resolves a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Resolves a field by its column name, case-insensitively. Used when
    /// mapping result-row columns back onto fields.
    #[must_use]
    pub fn field_by_column(&self, column: &str) -> Option<&FieldDescriptor> {
        self.fields
            .iter()
            .filter(|field| !field.is_computed)
            .find(|field| field.column.eq_ignore_ascii_case(column))
    }

    /// Resolves a persisted field's column name, erroring on unknown or
    /// computed fields. Computed fields have no column to address in SQL.
    pub fn column_of(&self, field_name: &str) -> Result<&'static str> {
        let field = self.field(field_name).ok_or_else(|| {
            Error::configuration(format!(
                "entity for table '{}' has no field named '{field_name}'",
                self.table
            ))
        })?;
        if field.is_computed {
            return Err(Error::configuration(format!(
                "field '{field_name}' of table '{}' is computed and has no column",
                self.table
            )));
        }
        Ok(field.column)
    }
}
