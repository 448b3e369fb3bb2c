//! Schema bootstrap: DDL generated from the resource catalog. Intended for
//! fresh databases and local development; every statement is
//! CREATE TABLE IF NOT EXISTS so reruns are harmless.

use crate::error::AppError;
use crate::resource::{KeyKind, KeySpec, ResourceDescriptor, ResourceRegistry};
use sqlx::PgPool;

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn table_ddl(desc: &ResourceDescriptor) -> String {
    let mut cols: Vec<String> = Vec::new();
    match &desc.key {
        KeySpec::Single { column, kind } => match kind {
            KeyKind::BigInt => cols.push(format!("{} BIGSERIAL PRIMARY KEY", quote(column))),
            KeyKind::Text => cols.push(format!("{} TEXT PRIMARY KEY", quote(column))),
        },
        KeySpec::Compound { first, second } => {
            cols.push(format!("{} BIGINT NOT NULL", quote(first.column)));
            cols.push(format!("{} BIGINT NOT NULL", quote(second.column)));
        }
    }
    let key_columns = desc.key.columns();
    for field in &desc.fields {
        if key_columns.contains(&field.name) {
            continue;
        }
        cols.push(format!("{} {}", quote(field.name), field.pg_type));
    }
    cols.push("\"created_at\" timestamptz".to_string());
    cols.push("\"updated_at\" timestamptz".to_string());
    cols.push("\"deleted_at\" timestamptz".to_string());
    if let KeySpec::Compound { first, second } = &desc.key {
        cols.push(format!(
            "PRIMARY KEY ({}, {})",
            quote(first.column),
            quote(second.column)
        ));
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote(desc.table),
        cols.join(", ")
    )
}

/// Tables behind the composite questions resource; these are not in the
/// generic catalog.
const QUESTION_TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS \"questions\" (\
     \"id\" BIGSERIAL PRIMARY KEY, \
     \"topic_id\" BIGINT NOT NULL, \
     \"question_text\" text, \
     \"explanation\" text, \
     \"created_at\" timestamptz, \
     \"updated_at\" timestamptz, \
     \"deleted_at\" timestamptz)",
    "CREATE TABLE IF NOT EXISTS \"question_images\" (\
     \"id\" BIGSERIAL PRIMARY KEY, \
     \"question_id\" BIGINT NOT NULL REFERENCES \"questions\" (\"id\") ON DELETE CASCADE, \
     \"image_url\" text, \
     \"caption\" text, \
     \"created_at\" timestamptz, \
     \"updated_at\" timestamptz)",
    "CREATE TABLE IF NOT EXISTS \"question_options\" (\
     \"id\" BIGSERIAL PRIMARY KEY, \
     \"question_id\" BIGINT NOT NULL REFERENCES \"questions\" (\"id\") ON DELETE CASCADE, \
     \"option_text\" text, \
     \"is_correct\" boolean, \
     \"usage_count\" bigint, \
     \"created_at\" timestamptz, \
     \"updated_at\" timestamptz)",
];

pub async fn bootstrap_schema(pool: &PgPool, registry: &ResourceRegistry) -> Result<(), AppError> {
    for desc in registry.all() {
        let sql = table_ddl(desc);
        tracing::debug!(table = desc.table, "bootstrap");
        sqlx::query(&sql).execute(pool).await?;
    }
    for sql in QUESTION_TABLES {
        sqlx::query(sql).execute(pool).await?;
    }
    tracing::info!("schema bootstrap complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_key_tables_get_a_bigserial_id() {
        let registry = ResourceRegistry::standard();
        let ddl = table_ddl(registry.get("cities").unwrap());
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS \"cities\""));
        assert!(ddl.contains("\"id\" BIGSERIAL PRIMARY KEY"));
        assert!(ddl.contains("\"deleted_at\" timestamptz"));
    }

    #[test]
    fn text_key_tables_get_a_text_primary_key() {
        let registry = ResourceRegistry::standard();
        let ddl = table_ddl(registry.get("password-reset-tokens").unwrap());
        assert!(ddl.contains("\"email\" TEXT PRIMARY KEY"));
    }

    #[test]
    fn join_tables_get_a_composite_primary_key() {
        let registry = ResourceRegistry::standard();
        let ddl = table_ddl(registry.get("address-user").unwrap());
        assert!(ddl.contains("\"user_id\" BIGINT NOT NULL"));
        assert!(ddl.contains("PRIMARY KEY (\"user_id\", \"address_id\")"));
    }
}
