//! Generic CRUD execution against PostgreSQL, driven by resource
//! descriptors. Rows come back as untyped JSON objects; column decoding
//! tries the common Postgres types in order.

use crate::error::AppError;
use crate::resource::{ResourceDescriptor, UsageBump};
use crate::sql::{delete, insert, select_by_key, select_list, update, PgBindValue, QueryBuf};
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::PgPool;

pub struct CrudService;

impl CrudService {
    /// List live rows, with descriptor default filters merged under the
    /// caller's query filters.
    pub async fn list(
        pool: &PgPool,
        desc: &ResourceDescriptor,
        filters: &[(String, Value)],
    ) -> Result<Vec<Value>, AppError> {
        let q = select_list(desc, filters);
        fetch_all(pool, &q)
            .await
            .map_err(|e| op_error(e, desc, Op::List))
    }

    /// Fetch one row by key, or None when no live row matches.
    pub async fn read(
        pool: &PgPool,
        desc: &ResourceDescriptor,
        key: &[Value],
    ) -> Result<Option<Value>, AppError> {
        let q = select_by_key(desc, key);
        fetch_optional(pool, &q)
            .await
            .map_err(|e| op_error(e, desc, Op::Read))
    }

    /// Insert one row and return it. Compound-key resources pass their key
    /// values from the path; single-key resources let the database assign.
    /// A descriptor with a create bump runs the insert and the counter
    /// increment in one transaction.
    pub async fn create(
        pool: &PgPool,
        desc: &ResourceDescriptor,
        key: Option<&[Value]>,
        body: &Map<String, Value>,
    ) -> Result<Value, AppError> {
        let q = insert(desc, key, body);
        let fail = |e| op_error(e, desc, Op::Create);
        let row = match &desc.create_bump {
            None => fetch_optional(pool, &q).await.map_err(fail)?,
            Some(bump) => {
                let mut tx = pool.begin().await.map_err(fail)?;
                let row = fetch_optional_tx(&mut tx, &q).await.map_err(fail)?;
                if let Some(target) = bump_target(body, bump) {
                    sqlx::query(&bump_sql(bump))
                        .bind(target)
                        .execute(&mut *tx)
                        .await
                        .map_err(fail)?;
                }
                tx.commit().await.map_err(fail)?;
                row
            }
        };
        row.ok_or_else(|| {
            tracing::error!(resource = desc.path_segment, "insert returned no row");
            AppError::Operation(format!("Failed to create {}.", noun(desc)))
        })
    }

    /// Update one row by key, returning the new row or None when no live
    /// row matches.
    pub async fn update(
        pool: &PgPool,
        desc: &ResourceDescriptor,
        key: &[Value],
        body: &Map<String, Value>,
    ) -> Result<Option<Value>, AppError> {
        let q = update(desc, key, body);
        fetch_optional(pool, &q)
            .await
            .map_err(|e| op_error(e, desc, Op::Update))
    }

    /// Delete one row by key (soft or hard per descriptor), returning the
    /// affected row or None when nothing matched.
    pub async fn delete(
        pool: &PgPool,
        desc: &ResourceDescriptor,
        key: &[Value],
    ) -> Result<Option<Value>, AppError> {
        let q = delete(desc, key);
        fetch_optional(pool, &q)
            .await
            .map_err(|e| op_error(e, desc, Op::Delete))
    }
}

enum Op {
    List,
    Read,
    Create,
    Update,
    Delete,
}

fn noun(desc: &ResourceDescriptor) -> String {
    desc.display_name.to_lowercase()
}

/// Log the real cause, surface a generic operation failure. "Not found"
/// is signalled by None from the fetch helpers, never through here.
fn op_error(e: sqlx::Error, desc: &ResourceDescriptor, op: Op) -> AppError {
    tracing::error!(error = %e, resource = desc.path_segment, "query failed");
    let message = match op {
        Op::List => format!("Failed to retrieve {} records.", noun(desc)),
        Op::Read => format!("Failed to retrieve the {}.", noun(desc)),
        Op::Create => format!("Failed to create {}.", noun(desc)),
        Op::Update => format!("Failed to update {}.", noun(desc)),
        Op::Delete => format!("Failed to delete {}.", noun(desc)),
    };
    AppError::Operation(message)
}

fn bump_sql(bump: &UsageBump) -> String {
    format!(
        "UPDATE \"{}\" SET \"{}\" = COALESCE(\"{}\", 0) + 1 WHERE \"id\" = $1",
        bump.table, bump.column, bump.column
    )
}

/// The row to bump, read from the create body. Absent or null means no bump;
/// string-encoded ids are accepted like everywhere else on the wire.
fn bump_target(body: &Map<String, Value>, bump: &UsageBump) -> Option<i64> {
    match body.get(bump.body_field)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

async fn fetch_optional_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    q: &QueryBuf,
) -> Result<Option<Value>, sqlx::Error> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query (tx)");
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(PgBindValue::from_json(p));
    }
    let row = query.fetch_optional(&mut **tx).await?;
    Ok(row.map(|r| row_to_json(&r)))
}

async fn fetch_optional(pool: &PgPool, q: &QueryBuf) -> Result<Option<Value>, sqlx::Error> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(PgBindValue::from_json(p));
    }
    let row = query.fetch_optional(pool).await?;
    Ok(row.map(|r| row_to_json(&r)))
}

async fn fetch_all(pool: &PgPool, q: &QueryBuf) -> Result<Vec<Value>, sqlx::Error> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(PgBindValue::from_json(p));
    }
    let rows = query.fetch_all(pool).await?;
    Ok(rows.iter().map(row_to_json).collect())
}

pub(crate) fn row_to_json(row: &PgRow) -> Value {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = Map::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    Value::Object(map)
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceRegistry;
    use serde_json::json;

    #[test]
    fn user_response_creates_bump_the_selected_option() {
        let registry = ResourceRegistry::standard();
        let bump = registry
            .get("user-responses")
            .unwrap()
            .create_bump
            .as_ref()
            .unwrap();
        assert_eq!(
            bump_sql(bump),
            "UPDATE \"question_options\" SET \"usage_count\" = \
             COALESCE(\"usage_count\", 0) + 1 WHERE \"id\" = $1"
        );

        let body = |v: Value| match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        };
        assert_eq!(
            bump_target(&body(json!({"selected_option_id": 9})), bump),
            Some(9)
        );
        assert_eq!(
            bump_target(&body(json!({"selected_option_id": "9"})), bump),
            Some(9)
        );
        assert_eq!(bump_target(&body(json!({"question_id": 3})), bump), None);
        assert_eq!(
            bump_target(&body(json!({"selected_option_id": null})), bump),
            None
        );
    }
}
