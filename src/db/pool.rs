use bytes::BytesMut;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::types::ToSql;
use tokio_postgres::NoTls;

use super::error::DbError;
use super::types::{DbOperation, DbValue, MergeColumn, MergeStrategy};

pub struct DbPool {
    pool: Pool,
}

impl DbPool {
    pub async fn new(database_url: &str) -> Result<Self, DbError> {
        let config = database_url
            .parse::<tokio_postgres::Config>()
            .map_err(|e| DbError::InvalidConnectionString(e.to_string()))?;

        let manager_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let manager = Manager::from_config(config, NoTls, manager_config);

        let pool = Pool::builder(manager)
            .max_size(16)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(DbError::BuildError)?;

        let _conn = pool.get().await?;
        tracing::info!("Database connection pool created successfully");

        Ok(Self { pool })
    }

    pub fn inner(&self) -> &Pool {
        &self.pool
    }

    /// Execute a batch of operations in a single transaction.
    pub async fn execute_transaction(&self, operations: Vec<DbOperation>) -> Result<(), DbError> {
        if operations.is_empty() {
            return Ok(());
        }

        let mut client = self.pool.get().await?;
        let transaction = client.transaction().await?;

        for op in operations {
            let DbOperation::Upsert {
                table,
                columns,
                values,
                conflict_columns,
                merge_columns,
            } = op;
            let (sql, params) =
                build_upsert_sql(&table, &columns, &values, &conflict_columns, &merge_columns);

            let params_refs: Vec<&(dyn ToSql + Sync)> =
                params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

            if let Err(e) = transaction.execute(&sql, &params_refs[..]).await {
                let db_err: DbError = e.into();
                tracing::error!("SQL execution failed\n  SQL: {}\n  Error: {}", sql, db_err);
                return Err(db_err);
            }
        }

        transaction.commit().await?;
        Ok(())
    }

    pub async fn run_migrations(&self) -> Result<(), DbError> {
        super::migrations::run(&self.pool).await
    }

    pub async fn query(
        &self,
        query: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<tokio_postgres::Row>, DbError> {
        let client = self.pool.get().await?;
        let rows = client.query(query, params).await?;
        Ok(rows)
    }

    pub async fn query_opt(
        &self,
        query: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<tokio_postgres::Row>, DbError> {
        let client = self.pool.get().await?;
        let row = client.query_opt(query, params).await?;
        Ok(row)
    }
}

#[derive(Debug)]
enum SqlParam {
    Null,
    Bool(bool),
    Int64(i64),
    Int32(i32),
    Text(String),
    Json(serde_json::Value),
}

impl ToSql for SqlParam {
    fn to_sql(
        &self,
        ty: &tokio_postgres::types::Type,
        out: &mut BytesMut,
    ) -> Result<tokio_postgres::types::IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            SqlParam::Null => Ok(tokio_postgres::types::IsNull::Yes),
            SqlParam::Bool(v) => v.to_sql(ty, out),
            SqlParam::Int64(v) => v.to_sql(ty, out),
            SqlParam::Int32(v) => v.to_sql(ty, out),
            SqlParam::Text(v) => v.to_sql(ty, out),
            SqlParam::Json(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(ty: &tokio_postgres::types::Type) -> bool {
        <bool as ToSql>::accepts(ty)
            || <i64 as ToSql>::accepts(ty)
            || <i32 as ToSql>::accepts(ty)
            || <String as ToSql>::accepts(ty)
            || <serde_json::Value as ToSql>::accepts(ty)
    }

    tokio_postgres::types::to_sql_checked!();
}

fn convert_db_value(value: &DbValue) -> SqlParam {
    match value {
        DbValue::Null => SqlParam::Null,
        DbValue::Bool(v) => SqlParam::Bool(*v),
        DbValue::Int32(v) => SqlParam::Int32(*v),
        DbValue::Uint64(v) => SqlParam::Int64(*v as i64),
        DbValue::Text(v) => SqlParam::Text(v.clone()),
        DbValue::Numeric(v) => SqlParam::Text(v.clone()),
        DbValue::JsonB(v) => SqlParam::Json(v.clone()),
    }
}

fn convert_values_to_params(values: &[DbValue]) -> Vec<SqlParam> {
    values.iter().map(convert_db_value).collect()
}

/// Generate the SQL placeholder for a value at the given parameter index.
/// Numeric values are sent as text and cast by PostgreSQL.
fn placeholder_for(value: &DbValue, param_idx: usize) -> String {
    match value {
        DbValue::Numeric(_) => format!("${}::text::numeric", param_idx),
        _ => format!("${}", param_idx),
    }
}

/// Wrap a column name in double quotes to handle reserved keywords.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name)
}

fn quote_cols(columns: &[String]) -> String {
    columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ")
}

fn build_upsert_sql(
    table: &str,
    columns: &[String],
    values: &[DbValue],
    conflict_columns: &[String],
    merge_columns: &[MergeColumn],
) -> (String, Vec<SqlParam>) {
    let cols = quote_cols(columns);
    let placeholders: Vec<String> = values
        .iter()
        .enumerate()
        .map(|(i, v)| placeholder_for(v, i + 1))
        .collect();
    let placeholders_str = placeholders.join(", ");

    let conflict_cols = quote_cols(conflict_columns);
    let updates: Vec<String> = merge_columns
        .iter()
        .map(|mc| {
            let col = quote_ident(&mc.name);
            match mc.strategy {
                MergeStrategy::Replace => format!("{} = EXCLUDED.{}", col, col),
                MergeStrategy::SetOnce => {
                    format!("{} = COALESCE({}.{}, EXCLUDED.{})", col, table, col, col)
                }
                MergeStrategy::Max => {
                    format!("{} = GREATEST({}.{}, EXCLUDED.{})", col, table, col, col)
                }
            }
        })
        .collect();
    let updates_str = updates.join(", ");

    let sql = if merge_columns.is_empty() {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) DO NOTHING",
            table, cols, placeholders_str, conflict_cols
        )
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) DO UPDATE SET {}",
            table, cols, placeholders_str, conflict_cols, updates_str
        )
    };

    let params = convert_values_to_params(values);
    (sql, params)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn upsert_without_merge_columns_does_nothing_on_conflict() {
        let (sql, params) = build_upsert_sql(
            "transactions",
            &cols(&["hash", "block_timestamp"]),
            &[
                DbValue::Text("8Hhk...".to_string()),
                DbValue::Uint64(1_630_000_000_000_000_000),
            ],
            &cols(&["hash"]),
            &[],
        );

        assert_eq!(
            sql,
            "INSERT INTO transactions (\"hash\", \"block_timestamp\") VALUES ($1, $2) \
             ON CONFLICT (\"hash\") DO NOTHING"
        );
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn set_once_columns_coalesce_the_existing_value() {
        let (sql, _) = build_upsert_sql(
            "daos",
            &cols(&["id", "transaction_hash", "update_transaction_hash"]),
            &[
                DbValue::Text("alpha.factory.near".to_string()),
                DbValue::Text("tx1".to_string()),
                DbValue::Text("tx2".to_string()),
            ],
            &cols(&["id"]),
            &[
                MergeColumn::set_once("transaction_hash"),
                MergeColumn::replace("update_transaction_hash"),
            ],
        );

        assert!(sql.contains(
            "\"transaction_hash\" = COALESCE(daos.\"transaction_hash\", EXCLUDED.\"transaction_hash\")"
        ));
        assert!(sql
            .contains("\"update_transaction_hash\" = EXCLUDED.\"update_transaction_hash\""));
    }

    #[test]
    fn max_columns_use_greatest() {
        let (sql, _) = build_upsert_sql(
            "daos",
            &cols(&["id", "number_of_members"]),
            &[
                DbValue::Text("alpha.factory.near".to_string()),
                DbValue::Int32(4),
            ],
            &cols(&["id"]),
            &[MergeColumn::max("number_of_members")],
        );

        assert!(sql.contains(
            "\"number_of_members\" = GREATEST(daos.\"number_of_members\", EXCLUDED.\"number_of_members\")"
        ));
    }

    #[test]
    fn numeric_values_are_cast_from_text() {
        let (sql, _) = build_upsert_sql(
            "bounties",
            &cols(&["id", "amount"]),
            &[
                DbValue::Text("alpha.factory.near-0".to_string()),
                DbValue::Numeric("1000000000000000000000000".to_string()),
            ],
            &cols(&["id"]),
            &[MergeColumn::replace("amount")],
        );

        assert!(sql.contains("$2::text::numeric"));
    }
}
