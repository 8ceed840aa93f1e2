//! Driver-boundary value and row types.
//!
//! Statements are compiled with `sea-query`; the resulting bind values are
//! converted to [`SqlValue`] before they cross the executor boundary, and
//! rows come back as [`Row`]s of named [`SqlValue`]s. Column lookups are
//! case-insensitive so that database column naming conventions never have to
//! match Rust field naming exactly.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sea_query::Value;

use crate::error::{Error, Result};

/// A database value as seen by the executor: either a bind parameter or a
/// cell of a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL.
    Null,
    /// Boolean.
    Bool(bool),
    /// 32-bit signed integer.
    Int32(i32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 32-bit unsigned integer.
    UInt32(u32),
    /// 64-bit unsigned integer.
    UInt64(u64),
    /// Single-precision float.
    Float(f32),
    /// Double-precision float.
    Double(f64),
    /// Character data.
    Text(String),
    /// Binary data.
    Bytes(Vec<u8>),
    /// Calendar date.
    Date(NaiveDate),
    /// Time of day.
    Time(NaiveTime),
    /// Date and time without offset.
    DateTime(NaiveDateTime),
    /// Date and time in UTC.
    DateTimeUtc(DateTime<Utc>),
}

impl SqlValue {
    /// Whether this value is SQL NULL.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// Converts a batch of `sea-query` bind values.
pub(crate) fn from_query_values(values: sea_query::Values) -> Result<Vec<SqlValue>> {
    values.into_iter().map(from_query_value).collect()
}

/// Converts one `sea-query` bind value to the executor representation.
pub(crate) fn from_query_value(value: Value) -> Result<SqlValue> {
    let converted = match value {
        Value::Bool(v) => v.map_or(SqlValue::Null, SqlValue::Bool),
        Value::TinyInt(v) => v.map_or(SqlValue::Null, |v| SqlValue::Int32(i32::from(v))),
        Value::SmallInt(v) => v.map_or(SqlValue::Null, |v| SqlValue::Int32(i32::from(v))),
        Value::Int(v) => v.map_or(SqlValue::Null, SqlValue::Int32),
        Value::BigInt(v) => v.map_or(SqlValue::Null, SqlValue::Int64),
        Value::TinyUnsigned(v) => v.map_or(SqlValue::Null, |v| SqlValue::UInt32(u32::from(v))),
        Value::SmallUnsigned(v) => v.map_or(SqlValue::Null, |v| SqlValue::UInt32(u32::from(v))),
        Value::Unsigned(v) => v.map_or(SqlValue::Null, SqlValue::UInt32),
        Value::BigUnsigned(v) => v.map_or(SqlValue::Null, SqlValue::UInt64),
        Value::Float(v) => v.map_or(SqlValue::Null, SqlValue::Float),
        Value::Double(v) => v.map_or(SqlValue::Null, SqlValue::Double),
        Value::String(v) => v.map_or(SqlValue::Null, |v| SqlValue::Text(*v)),
        Value::Char(v) => v.map_or(SqlValue::Null, |v| SqlValue::Text(v.to_string())),
        Value::Bytes(v) => v.map_or(SqlValue::Null, |v| SqlValue::Bytes(*v)),
        Value::ChronoDate(v) => v.map_or(SqlValue::Null, |v| SqlValue::Date(*v)),
        Value::ChronoTime(v) => v.map_or(SqlValue::Null, |v| SqlValue::Time(*v)),
        Value::ChronoDateTime(v) => v.map_or(SqlValue::Null, |v| SqlValue::DateTime(*v)),
        Value::ChronoDateTimeUtc(v) => v.map_or(SqlValue::Null, |v| SqlValue::DateTimeUtc(*v)),
        other => {
            return Err(Error::conversion(format!(
                "unsupported bind value requires explicit conversion: {other:?}"
            )));
        }
    };
    Ok(converted)
}

/// Conversion from a database value to a Rust type.
///
/// Integer conversions coerce across widths when the value fits, matching
/// how generated identities (always 64-bit at the wire) are written back
/// onto narrower entity fields.
pub trait FromSqlValue: Sized {
    /// Converts the value, failing on NULL or an incompatible type.
    fn from_sql(value: &SqlValue) -> Result<Self>;
}

impl FromSqlValue for bool {
    fn from_sql(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Bool(v) => Ok(*v),
            SqlValue::Int32(v) => Ok(*v != 0),
            SqlValue::Int64(v) => Ok(*v != 0),
            other => Err(mismatch("boolean", other)),
        }
    }
}

impl FromSqlValue for i32 {
    fn from_sql(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Int32(v) => Ok(*v),
            SqlValue::Int64(v) => Self::try_from(*v)
                .map_err(|_| Error::conversion(format!("{v} does not fit in i32"))),
            SqlValue::UInt32(v) => Self::try_from(*v)
                .map_err(|_| Error::conversion(format!("{v} does not fit in i32"))),
            other => Err(mismatch("int32", other)),
        }
    }
}

impl FromSqlValue for i64 {
    fn from_sql(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Int32(v) => Ok(Self::from(*v)),
            SqlValue::Int64(v) => Ok(*v),
            SqlValue::UInt32(v) => Ok(Self::from(*v)),
            SqlValue::UInt64(v) => Self::try_from(*v)
                .map_err(|_| Error::conversion(format!("{v} does not fit in i64"))),
            other => Err(mismatch("int64", other)),
        }
    }
}

impl FromSqlValue for u32 {
    fn from_sql(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::UInt32(v) => Ok(*v),
            SqlValue::Int32(v) => Self::try_from(*v)
                .map_err(|_| Error::conversion(format!("{v} does not fit in u32"))),
            SqlValue::Int64(v) => Self::try_from(*v)
                .map_err(|_| Error::conversion(format!("{v} does not fit in u32"))),
            other => Err(mismatch("uint32", other)),
        }
    }
}

impl FromSqlValue for u64 {
    fn from_sql(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::UInt32(v) => Ok(Self::from(*v)),
            SqlValue::UInt64(v) => Ok(*v),
            SqlValue::Int32(v) => Self::try_from(*v)
                .map_err(|_| Error::conversion(format!("{v} does not fit in u64"))),
            SqlValue::Int64(v) => Self::try_from(*v)
                .map_err(|_| Error::conversion(format!("{v} does not fit in u64"))),
            other => Err(mismatch("uint64", other)),
        }
    }
}

impl FromSqlValue for f32 {
    fn from_sql(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Float(v) => Ok(*v),
            other => Err(mismatch("float", other)),
        }
    }
}

impl FromSqlValue for f64 {
    fn from_sql(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Double(v) => Ok(*v),
            SqlValue::Float(v) => Ok(Self::from(*v)),
            other => Err(mismatch("double", other)),
        }
    }
}

impl FromSqlValue for String {
    fn from_sql(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Text(v) => Ok(v.clone()),
            other => Err(mismatch("string", other)),
        }
    }
}

impl FromSqlValue for Vec<u8> {
    fn from_sql(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Bytes(v) => Ok(v.clone()),
            other => Err(mismatch("binary", other)),
        }
    }
}

impl FromSqlValue for NaiveDate {
    fn from_sql(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Date(v) => Ok(*v),
            SqlValue::DateTime(v) => Ok(v.date()),
            SqlValue::Text(raw) => Self::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| Error::conversion(format!("unsupported date: {raw}"))),
            other => Err(mismatch("date", other)),
        }
    }
}

impl FromSqlValue for NaiveTime {
    fn from_sql(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Time(v) => Ok(*v),
            SqlValue::Text(raw) => Self::parse_from_str(raw, "%H:%M:%S%.f")
                .map_err(|_| Error::conversion(format!("unsupported time: {raw}"))),
            other => Err(mismatch("time", other)),
        }
    }
}

impl FromSqlValue for NaiveDateTime {
    fn from_sql(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::DateTime(v) => Ok(*v),
            SqlValue::DateTimeUtc(v) => Ok(v.naive_utc()),
            SqlValue::Text(raw) => parse_datetime_text(raw).map(|dt| dt.naive_utc()),
            other => Err(mismatch("timestamp", other)),
        }
    }
}

impl FromSqlValue for DateTime<Utc> {
    fn from_sql(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::DateTimeUtc(v) => Ok(*v),
            SqlValue::DateTime(v) => Ok(Self::from_naive_utc_and_offset(*v, Utc)),
            SqlValue::Text(raw) => parse_datetime_text(raw),
            other => Err(mismatch("timestamp", other)),
        }
    }
}

impl FromSqlValue for serde_json::Value {
    fn from_sql(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Text(raw) => serde_json::from_str(raw)
                .map_err(|err| Error::conversion(format!("invalid json: {err}"))),
            SqlValue::Bytes(raw) => serde_json::from_slice(raw)
                .map_err(|err| Error::conversion(format!("invalid json: {err}"))),
            other => Err(mismatch("json", other)),
        }
    }
}

impl<T: FromSqlValue> FromSqlValue for Option<T> {
    fn from_sql(value: &SqlValue) -> Result<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_sql(value).map(Some)
        }
    }
}

fn parse_datetime_text(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(parsed, Utc));
    }
    Err(Error::conversion(format!(
        "unsupported timestamp: {raw}; expected RFC3339 or \"%Y-%m-%d %H:%M:%S%.f\""
    )))
}

fn mismatch(expected: &str, got: &SqlValue) -> Error {
    Error::conversion(format!("expected {expected} value, got {got:?}"))
}

/// One named cell of a result row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowField {
    /// Column label as returned by the database.
    pub name: String,
    /// Cell value.
    pub value: SqlValue,
}

/// A flat result row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    /// Cells in selection order.
    pub fields: Vec<RowField>,
}

impl Row {
    /// Builds a row from `(column, value)` pairs. Mostly useful for tests
    /// and executor implementations.
    #[must_use]
    pub fn from_pairs<N: Into<String>>(pairs: impl IntoIterator<Item = (N, SqlValue)>) -> Self {
        Self {
            fields: pairs
                .into_iter()
                .map(|(name, value)| RowField { name: name.into(), value })
                .collect(),
        }
    }

    /// Looks up a cell by column label, case-insensitively.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&SqlValue> {
        self.fields
            .iter()
            .find(|field| field.name.eq_ignore_ascii_case(name))
            .map(|field| &field.value)
    }

    /// Converts the named cell to `T`, failing on missing column or type
    /// mismatch.
    pub fn get<T: FromSqlValue>(&self, name: &str) -> Result<T> {
        let value = self
            .field(name)
            .ok_or_else(|| Error::MissingColumn(name.to_string()))?;
        T::from_sql(value)
            .map_err(|err| Error::conversion(format!("column '{name}': {err}")))
    }

    /// Converts the named cell to `T`, treating a missing column as NULL.
    ///
    /// This is the tolerant lookup rehydration relies on: absent or NULL
    /// columns decode to `None` for optional fields instead of failing.
    pub fn decode<T: FromSqlValue>(&self, name: &str) -> Result<T> {
        let value = self.field(name).unwrap_or(&SqlValue::Null);
        T::from_sql(value)
            .map_err(|err| Error::conversion(format!("column '{name}': {err}")))
    }
}
