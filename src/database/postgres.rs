//! Postgres binding for [`Database`] via sqlx.

use super::{CatalogColumn, Database, ResultRow};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value as JsonValue};
use sqlx::postgres::types::PgInterval;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow, Postgres};
use sqlx::{Column, Row, TypeInfo};
use uuid::Uuid;

/// Base-table columns of one schema, in declared order.
///
/// `information_schema` exposes domain types (`sql_identifier`,
/// `cardinal_number`); cast them so they decode as plain text/int.
const CATALOG_SQL: &str = r#"
    SELECT c.table_name::text       AS table_name,
           c.column_name::text      AS column_name,
           c.data_type::text        AS data_type,
           c.udt_name::text         AS udt_name,
           c.ordinal_position::int4 AS ordinal_position
    FROM information_schema.columns c
    JOIN information_schema.tables t
      ON t.table_schema = c.table_schema
     AND t.table_name = c.table_name
    WHERE c.table_schema = $1
      AND t.table_type = 'BASE TABLE'
    ORDER BY c.table_name, c.ordinal_position
"#;

/// Postgres-backed database handle.
///
/// A session owns exactly one connection; the pool is capped at one so
/// every statement runs on it, and each call checks the connection out
/// and back in regardless of outcome.
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    /// Connect to Postgres.
    ///
    /// # Errors
    ///
    /// Returns the driver error if the URL is invalid or the server is unreachable
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await?;
        tracing::info!("Connected to Postgres");
        Ok(Self { pool })
    }

    /// Wrap an existing pool (tests, embedding services).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Release the connection at session end.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn fetch_catalog(&self, schema: &str) -> Result<Vec<CatalogColumn>, sqlx::Error> {
        let rows = sqlx::query(CATALOG_SQL)
            .bind(schema)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(CatalogColumn {
                    table_name: row.try_get("table_name")?,
                    column_name: row.try_get("column_name")?,
                    data_type: row.try_get("data_type")?,
                    udt_name: row.try_get("udt_name")?,
                    ordinal_position: row.try_get("ordinal_position")?,
                })
            })
            .collect()
    }

    async fn execute(&self, sql: &str) -> Result<Vec<ResultRow>, sqlx::Error> {
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_result).collect()
    }
}

/// Convert a database row, keeping the driver's column order.
///
/// SQL NULL becomes `JsonValue::Null`. A column whose type has no decoder
/// fails the whole row instead of being reported as NULL.
fn row_to_result(row: &PgRow) -> Result<ResultRow, sqlx::Error> {
    let mut result = ResultRow::with_capacity(row.columns().len());

    for (idx, column) in row.columns().iter().enumerate() {
        let type_name = column.type_info().name();
        let value = match decode_column(row, idx, type_name)? {
            Some(value) => value.unwrap_or(JsonValue::Null),
            None => {
                return Err(sqlx::Error::Decode(
                    format!("unsupported column type {} in column \"{}\"", type_name, column.name())
                        .into(),
                ))
            }
        };
        result.insert(column.name(), value);
    }

    Ok(result)
}

fn get<'r, T>(row: &'r PgRow, idx: usize) -> Result<Option<T>, sqlx::Error>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get::<Option<T>, _>(idx)
}

/// Decode one column by its Postgres type name.
///
/// Outer `None`: no decoder for the type. Inner `None`: SQL NULL.
fn decode_column(
    row: &PgRow,
    idx: usize,
    type_name: &str,
) -> Result<Option<Option<JsonValue>>, sqlx::Error> {
    let value = match type_name {
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" | "CITEXT" => {
            get::<String>(row, idx)?.map(JsonValue::String)
        }
        "INT2" => get::<i16>(row, idx)?.map(|i| json!(i)),
        "INT4" => get::<i32>(row, idx)?.map(|i| json!(i)),
        "INT8" => get::<i64>(row, idx)?.map(|i| json!(i)),
        "FLOAT4" => get::<f32>(row, idx)?.map(float4_json),
        "FLOAT8" => get::<f64>(row, idx)?.map(|f| json!(f)),
        "NUMERIC" => get::<Decimal>(row, idx)?.map(|d| json!(d.to_string())),
        "BOOL" => get::<bool>(row, idx)?.map(JsonValue::Bool),
        "UUID" => get::<Uuid>(row, idx)?.map(|u| json!(u.to_string())),
        "DATE" => get::<NaiveDate>(row, idx)?.map(|d| json!(d.to_string())),
        "TIME" => get::<NaiveTime>(row, idx)?.map(|t| json!(t.to_string())),
        "TIMESTAMP" => get::<NaiveDateTime>(row, idx)?.map(|t| json!(t.to_string())),
        "TIMESTAMPTZ" => get::<DateTime<Utc>>(row, idx)?.map(|t| json!(t.to_rfc3339())),
        "INTERVAL" => get::<PgInterval>(row, idx)?.map(|i| json!(format_interval(&i))),
        "JSON" | "JSONB" => get::<JsonValue>(row, idx)?,
        "TEXT[]" | "VARCHAR[]" | "BPCHAR[]" | "NAME[]" => get::<Vec<String>>(row, idx)?.map(|v| json!(v)),
        "INT2[]" => get::<Vec<i16>>(row, idx)?.map(|v| json!(v)),
        "INT4[]" => get::<Vec<i32>>(row, idx)?.map(|v| json!(v)),
        "INT8[]" => get::<Vec<i64>>(row, idx)?.map(|v| json!(v)),
        "FLOAT4[]" => get::<Vec<f32>>(row, idx)?
            .map(|v| JsonValue::Array(v.into_iter().map(float4_json).collect())),
        "FLOAT8[]" => get::<Vec<f64>>(row, idx)?.map(|v| json!(v)),
        "NUMERIC[]" => get::<Vec<Decimal>>(row, idx)?
            .map(|v| json!(v.iter().map(Decimal::to_string).collect::<Vec<_>>())),
        "BOOL[]" => get::<Vec<bool>>(row, idx)?.map(|v| json!(v)),
        "DATE[]" => get::<Vec<NaiveDate>>(row, idx)?
            .map(|v| json!(v.iter().map(NaiveDate::to_string).collect::<Vec<_>>())),
        "TIMESTAMPTZ[]" => get::<Vec<DateTime<Utc>>>(row, idx)?
            .map(|v| json!(v.iter().map(|t| t.to_rfc3339()).collect::<Vec<_>>())),
        _ => return Ok(None),
    };
    Ok(Some(value))
}

/// `real` values keep their shortest decimal form (1.1, not 1.100000023841858).
fn float4_json(value: f32) -> JsonValue {
    value
        .to_string()
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(value.to_string()))
}

/// Render an interval the way psql does: `1 year 2 mons 3 days 04:05:06`.
fn format_interval(interval: &PgInterval) -> String {
    fn unit(n: i32, name: &str) -> String {
        format!("{} {}{}", n, name, if n.abs() == 1 { "" } else { "s" })
    }

    let mut parts = Vec::new();
    let (years, months) = (interval.months / 12, interval.months % 12);
    if years != 0 {
        parts.push(unit(years, "year"));
    }
    if months != 0 {
        parts.push(unit(months, "mon"));
    }
    if interval.days != 0 {
        parts.push(unit(interval.days, "day"));
    }

    if interval.microseconds != 0 || parts.is_empty() {
        let sign = if interval.microseconds < 0 { "-" } else { "" };
        let total = interval.microseconds.unsigned_abs();
        let (secs, micros) = (total / 1_000_000, total % 1_000_000);
        let mut time = format!("{}{:02}:{:02}:{:02}", sign, secs / 3600, secs / 60 % 60, secs % 60);
        if micros != 0 {
            let frac = format!("{:06}", micros);
            time.push('.');
            time.push_str(frac.trim_end_matches('0'));
        }
        parts.push(time);
    }

    parts.join(" ")
}
