//! Composite questions store: questions nested under a topic, with
//! `question_images` and `question_options` child rows. Writes that touch
//! children run in a single transaction so a failed child insert rolls back
//! the whole request.

use crate::error::AppError;
use crate::service::crud::row_to_json;
use crate::sql::PgBindValue;
use serde_json::{Map, Value};
use sqlx::{PgPool, Row};

// Writable columns with their types; non-text binds are cast so NULL
// coerces server-side.
const QUESTION_FIELDS: &[(&str, &str)] = &[("question_text", "text"), ("explanation", "text")];
const IMAGE_FIELDS: &[(&str, &str)] = &[("image_url", "text"), ("caption", "text")];
const OPTION_FIELDS: &[(&str, &str)] = &[
    ("option_text", "text"),
    ("is_correct", "boolean"),
    ("usage_count", "bigint"),
];

fn placeholder(n: usize, pg_type: &str) -> String {
    if pg_type == "text" {
        format!("${}", n)
    } else {
        format!("${}::{}", n, pg_type)
    }
}

const SELECT_WITH_CHILDREN: &str = r#"SELECT t.*,
 (SELECT COALESCE(json_agg(row_to_json(sub)), '[]'::json)
    FROM (SELECT * FROM "question_images" WHERE "question_id" = t."id" ORDER BY "id") sub)
   AS "question_images",
 (SELECT COALESCE(json_agg(row_to_json(sub)), '[]'::json)
    FROM (SELECT * FROM "question_options" WHERE "question_id" = t."id" ORDER BY "id") sub)
   AS "question_options"
 FROM "questions" t"#;

pub struct QuestionStore;

impl QuestionStore {
    pub async fn list_for_topic(pool: &PgPool, topic_id: i64) -> Result<Vec<Value>, AppError> {
        let sql = format!(
            "{} WHERE t.\"topic_id\" = $1 ORDER BY t.\"id\"",
            SELECT_WITH_CHILDREN
        );
        let rows = sqlx::query(&sql)
            .bind(topic_id)
            .fetch_all(pool)
            .await
            .map_err(|e| op_error(e, "Failed to retrieve questions."))?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    pub async fn read(
        pool: &PgPool,
        topic_id: i64,
        question_id: i64,
    ) -> Result<Option<Value>, AppError> {
        let sql = format!(
            "{} WHERE t.\"id\" = $1 AND t.\"topic_id\" = $2",
            SELECT_WITH_CHILDREN
        );
        let row = sqlx::query(&sql)
            .bind(question_id)
            .bind(topic_id)
            .fetch_optional(pool)
            .await
            .map_err(|e| op_error(e, "Failed to retrieve the question."))?;
        Ok(row.map(|r| row_to_json(&r)))
    }

    /// Insert a question plus its `images` and `options` arrays in one
    /// transaction, then return it with children embedded.
    pub async fn create(pool: &PgPool, topic_id: i64, body: &Map<String, Value>) -> Result<Value, AppError> {
        let fail = |e| op_error(e, "Failed to create question.");
        let mut tx = pool.begin().await.map_err(fail)?;

        let mut cols = vec!["\"topic_id\"".to_string()];
        let mut exprs = vec!["$1".to_string()];
        let mut params = vec![Value::from(topic_id)];
        for (field, pg_type) in QUESTION_FIELDS {
            params.push(body.get(*field).cloned().unwrap_or(Value::Null));
            cols.push(format!("\"{}\"", field));
            exprs.push(placeholder(params.len(), pg_type));
        }
        cols.push("\"created_at\"".to_string());
        exprs.push("NOW()".to_string());
        let sql = format!(
            "INSERT INTO \"questions\" ({}) VALUES ({}) RETURNING \"id\"",
            cols.join(", "),
            exprs.join(", ")
        );
        let mut query = sqlx::query(&sql);
        for p in &params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let row = query.fetch_one(&mut *tx).await.map_err(fail)?;
        let question_id: i64 = row.try_get("id").map_err(fail)?;

        insert_children(
            &mut tx,
            question_id,
            "question_images",
            IMAGE_FIELDS,
            children(body, "images"),
        )
        .await
        .map_err(fail)?;
        insert_children(
            &mut tx,
            question_id,
            "question_options",
            OPTION_FIELDS,
            children(body, "options"),
        )
        .await
        .map_err(fail)?;

        tx.commit().await.map_err(fail)?;

        let created = Self::read(pool, topic_id, question_id).await?;
        created.ok_or_else(|| AppError::Operation("Failed to create question.".to_string()))
    }

    /// Update question columns and, when `images` or `options` is present in
    /// the body, replace that child set wholesale. Runs in one transaction;
    /// a missing question rolls everything back and returns None.
    pub async fn update(
        pool: &PgPool,
        topic_id: i64,
        question_id: i64,
        body: &Map<String, Value>,
    ) -> Result<Option<Value>, AppError> {
        let fail = |e| op_error(e, "Failed to update question.");
        let mut tx = pool.begin().await.map_err(fail)?;

        let mut sets = Vec::new();
        let mut params = Vec::new();
        for (field, pg_type) in QUESTION_FIELDS {
            if let Some(v) = body.get(*field) {
                params.push(v.clone());
                sets.push(format!("\"{}\" = {}", field, placeholder(params.len(), pg_type)));
            }
        }
        sets.push("\"updated_at\" = NOW()".to_string());
        params.push(Value::from(question_id));
        let id_n = params.len();
        params.push(Value::from(topic_id));
        let topic_n = params.len();
        let sql = format!(
            "UPDATE \"questions\" SET {} WHERE \"id\" = ${} AND \"topic_id\" = ${} RETURNING \"id\"",
            sets.join(", "),
            id_n,
            topic_n
        );
        let mut query = sqlx::query(&sql);
        for p in &params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let updated = query.fetch_optional(&mut *tx).await.map_err(fail)?;
        if updated.is_none() {
            // Dropping the transaction rolls back.
            return Ok(None);
        }

        if body.contains_key("images") {
            replace_children(
                &mut tx,
                question_id,
                "question_images",
                IMAGE_FIELDS,
                children(body, "images"),
            )
            .await
            .map_err(fail)?;
        }
        if body.contains_key("options") {
            replace_children(
                &mut tx,
                question_id,
                "question_options",
                OPTION_FIELDS,
                children(body, "options"),
            )
            .await
            .map_err(fail)?;
        }

        tx.commit().await.map_err(fail)?;
        Self::read(pool, topic_id, question_id).await
    }

    /// Hard delete scoped to the topic; returns false when nothing matched.
    pub async fn delete(pool: &PgPool, topic_id: i64, question_id: i64) -> Result<bool, AppError> {
        let deleted = sqlx::query(
            "DELETE FROM \"questions\" WHERE \"id\" = $1 AND \"topic_id\" = $2 RETURNING \"id\"",
        )
        .bind(question_id)
        .bind(topic_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| op_error(e, "Failed to delete question."))?;
        Ok(deleted.is_some())
    }
}

fn op_error(e: sqlx::Error, message: &str) -> AppError {
    tracing::error!(error = %e, "questions query failed");
    AppError::Operation(message.to_string())
}

/// Child arrays from the body; anything that is not an array reads as empty.
fn children<'a>(body: &'a Map<String, Value>, key: &str) -> &'a [Value] {
    body.get(key).and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[])
}

async fn insert_children(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    question_id: i64,
    table: &str,
    fields: &[(&str, &str)],
    items: &[Value],
) -> Result<(), sqlx::Error> {
    for item in items {
        let empty = Map::new();
        // Client-supplied ids on child rows are ignored.
        let obj = item.as_object().unwrap_or(&empty);
        let mut cols = vec!["\"question_id\"".to_string()];
        let mut exprs = vec!["$1".to_string()];
        let mut params = vec![Value::from(question_id)];
        for (field, pg_type) in fields {
            params.push(obj.get(*field).cloned().unwrap_or(Value::Null));
            cols.push(format!("\"{}\"", field));
            exprs.push(placeholder(params.len(), pg_type));
        }
        cols.push("\"created_at\"".to_string());
        exprs.push("NOW()".to_string());
        let sql = format!(
            "INSERT INTO \"{}\" ({}) VALUES ({})",
            table,
            cols.join(", "),
            exprs.join(", ")
        );
        let mut query = sqlx::query(&sql);
        for p in &params {
            query = query.bind(PgBindValue::from_json(p));
        }
        query.execute(&mut **tx).await?;
    }
    Ok(())
}

async fn replace_children(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    question_id: i64,
    table: &str,
    fields: &[(&str, &str)],
    items: &[Value],
) -> Result<(), sqlx::Error> {
    let sql = format!("DELETE FROM \"{}\" WHERE \"question_id\" = $1", table);
    sqlx::query(&sql).bind(question_id).execute(&mut **tx).await?;
    insert_children(tx, question_id, table, fields, items).await
}
