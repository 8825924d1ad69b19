use serde::Serialize;
use serde_json::Value as JsonValue;

/// A value that can be stored in the database.
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    /// NULL value
    Null,
    /// Boolean
    Bool(bool),
    /// Signed 32-bit integer
    Int32(i32),
    /// Unsigned 64-bit integer (stored as BIGINT; block timestamps in nanoseconds)
    Uint64(u64),
    /// Text (unlimited length)
    Text(String),
    /// Numeric string for u128 yocto amounts (stored as NUMERIC)
    Numeric(String),
    /// JSONB value
    JsonB(JsonValue),
}

impl DbValue {
    /// Create a JSONB value from any serializable type. Serialization of
    /// the store's plain data structs cannot fail; a failure degrades to
    /// NULL rather than aborting the batch.
    pub fn jsonb<T: Serialize>(value: T) -> Self {
        serde_json::to_value(value).map_or(DbValue::Null, DbValue::JsonB)
    }

    /// Text column from an optional string, NULL when absent.
    pub fn opt_text(value: Option<&str>) -> Self {
        value.map_or(DbValue::Null, |v| DbValue::Text(v.to_string()))
    }

    /// BIGINT column from an optional timestamp, NULL when absent.
    pub fn opt_uint64(value: Option<u64>) -> Self {
        value.map_or(DbValue::Null, DbValue::Uint64)
    }
}

/// How a column is merged when an upsert hits an existing row.
///
/// Encodes the materialized-store merge contract: create provenance is
/// written at most once, update provenance and current-state fields always
/// take the newest value, and member counts never decrease.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// `col = EXCLUDED.col`: always replaced with the incoming value.
    Replace,
    /// `col = COALESCE(t.col, EXCLUDED.col)`: written once, then frozen.
    SetOnce,
    /// `col = GREATEST(t.col, EXCLUDED.col)`: monotonically non-decreasing.
    Max,
}

/// A column participating in the `ON CONFLICT DO UPDATE` set list.
#[derive(Debug, Clone)]
pub struct MergeColumn {
    pub name: String,
    pub strategy: MergeStrategy,
}

impl MergeColumn {
    pub fn replace(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            strategy: MergeStrategy::Replace,
        }
    }

    pub fn set_once(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            strategy: MergeStrategy::SetOnce,
        }
    }

    pub fn max(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            strategy: MergeStrategy::Max,
        }
    }
}

/// Database operation executed by the sink.
#[derive(Debug, Clone)]
pub enum DbOperation {
    /// INSERT with ON CONFLICT DO UPDATE (idempotent upsert).
    ///
    /// With an empty `merge_columns` list this renders
    /// `ON CONFLICT DO NOTHING`, which is how raw ledger transactions are
    /// persisted.
    Upsert {
        table: String,
        columns: Vec<String>,
        values: Vec<DbValue>,
        /// Columns that form the unique constraint.
        conflict_columns: Vec<String>,
        /// Columns merged on conflict, each with its strategy.
        merge_columns: Vec<MergeColumn>,
    },
}
