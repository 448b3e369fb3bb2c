//! Builds parameterized INSERT, SELECT, UPDATE, DELETE from a resource
//! descriptor. Identifiers come only from descriptors, never from request
//! input; they are still quoted defensively.

use crate::resource::descriptor::{DeleteMode, IncludeDirection, ResourceDescriptor};
use serde_json::{Map, Value};

const ALIAS: &str = "t";

fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> usize {
        self.params.push(v);
        self.params.len()
    }
}

/// Main select list: the row itself plus one scalar subquery per include
/// (row_to_json for to-one, json_agg for to-many).
fn select_parts(desc: &ResourceDescriptor) -> String {
    let mut parts = vec![format!("{}.*", ALIAS)];
    for inc in &desc.includes {
        let related = quoted(inc.related_table);
        let sub_where = format!(
            "{} WHERE {} = {}.{}",
            related,
            quoted(inc.their_key),
            ALIAS,
            quoted(inc.our_key)
        );
        let subquery = match inc.direction {
            IncludeDirection::ToOne => format!(
                "(SELECT row_to_json(sub) FROM (SELECT * FROM {}) sub)",
                sub_where
            ),
            IncludeDirection::ToMany => format!(
                "(SELECT COALESCE(json_agg(row_to_json(sub)), '[]'::json) FROM (SELECT * FROM {}) sub)",
                sub_where
            ),
        };
        parts.push(format!("{} AS {}", subquery, quoted(inc.name)));
    }
    parts.join(", ")
}

fn key_predicate(desc: &ResourceDescriptor, q: &mut QueryBuf, key: &[Value]) -> String {
    desc.key
        .columns()
        .iter()
        .zip(key.iter())
        .map(|(col, val)| {
            let n = q.push_param(val.clone());
            format!("{}.{} = ${}", ALIAS, quoted(col), n)
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// SELECT one row by key; soft-deleted rows are invisible when the resource
/// filters reads.
pub fn select_by_key(desc: &ResourceDescriptor, key: &[Value]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut where_clause = key_predicate(desc, &mut q, key);
    if desc.has_soft_delete() && desc.filter_deleted_reads {
        where_clause.push_str(&format!(" AND {}.\"deleted_at\" IS NULL", ALIAS));
    }
    q.sql = format!(
        "SELECT {} FROM {} {} WHERE {}",
        select_parts(desc),
        quoted(desc.table),
        ALIAS,
        where_clause
    );
    q
}

/// SELECT all live rows: descriptor default filters first, overridden by
/// caller filters on the same column; ORDER BY the first key column.
pub fn select_list(desc: &ResourceDescriptor, filters: &[(String, Value)]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut effective: Vec<(String, Value)> = desc
        .list_default_filters
        .iter()
        .map(|(c, v)| (c.to_string(), v.clone()))
        .collect();
    for (col, val) in filters {
        if let Some(existing) = effective.iter_mut().find(|(c, _)| c == col) {
            existing.1 = val.clone();
        } else {
            effective.push((col.clone(), val.clone()));
        }
    }

    let mut where_parts = Vec::new();
    for (col, val) in &effective {
        let n = q.push_param(val.clone());
        where_parts.push(format!("{}.{} = ${}", ALIAS, quoted(col), n));
    }
    if desc.has_soft_delete() && desc.filter_deleted_reads {
        where_parts.push(format!("{}.\"deleted_at\" IS NULL", ALIAS));
    }
    let where_clause = if where_parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_parts.join(" AND "))
    };
    let order_col = desc.key.columns()[0];
    q.sql = format!(
        "SELECT {} FROM {} {}{} ORDER BY {}.{}",
        select_parts(desc),
        quoted(desc.table),
        ALIAS,
        where_clause,
        ALIAS,
        quoted(order_col)
    );
    q
}

/// INSERT one row. Every descriptor field is bound: the body value when
/// present, the descriptor default when not, NULL otherwise (unset optional
/// columns are set explicitly, never omitted). Compound-key resources take
/// their key values from the path. `created_at` is stamped server-side.
pub fn insert(
    desc: &ResourceDescriptor,
    key: Option<&[Value]>,
    body: &Map<String, Value>,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut exprs = Vec::new();

    if let Some(key_values) = key {
        for (col, val) in desc.key.columns().iter().zip(key_values.iter()) {
            let n = q.push_param(val.clone());
            cols.push(quoted(col));
            exprs.push(format!("${}", n));
        }
    }

    for field in &desc.fields {
        if key.is_some() && desc.key.columns().contains(&field.name) {
            continue;
        }
        let value = body
            .get(field.name)
            .cloned()
            .or_else(|| field.default.clone())
            .unwrap_or(Value::Null);
        let n = q.push_param(value);
        cols.push(quoted(field.name));
        exprs.push(if field.needs_cast() {
            format!("${}::{}", n, field.pg_type)
        } else {
            format!("${}", n)
        });
    }

    cols.push(quoted("created_at"));
    exprs.push("NOW()".to_string());

    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
        quoted(desc.table),
        cols.join(", "),
        exprs.join(", ")
    );
    q
}

/// UPDATE by key: SET only the body fields the descriptor knows, always
/// refreshing `updated_at`. Soft-deleted rows never match, so an update
/// against one reports not-found instead of resurrecting it.
pub fn update(desc: &ResourceDescriptor, key: &[Value], body: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let key_columns = desc.key.columns();
    let mut sets = Vec::new();
    for field in &desc.fields {
        if key_columns.contains(&field.name) {
            continue;
        }
        if let Some(value) = body.get(field.name) {
            let n = q.push_param(value.clone());
            let rhs = if field.needs_cast() {
                format!("${}::{}", n, field.pg_type)
            } else {
                format!("${}", n)
            };
            sets.push(format!("{} = {}", quoted(field.name), rhs));
        }
    }
    sets.push("\"updated_at\" = NOW()".to_string());

    let mut where_parts = Vec::new();
    for (col, val) in key_columns.iter().zip(key.iter()) {
        let n = q.push_param(val.clone());
        where_parts.push(format!("{} = ${}", quoted(col), n));
    }
    if desc.has_soft_delete() {
        where_parts.push("\"deleted_at\" IS NULL".to_string());
    }

    q.sql = format!(
        "UPDATE {} SET {} WHERE {} RETURNING *",
        quoted(desc.table),
        sets.join(", "),
        where_parts.join(" AND ")
    );
    q
}

/// DELETE by key. Soft mode stamps `deleted_at` (plus any per-resource extra
/// sets) and is guarded by `deleted_at IS NULL`, so deleting an already
/// deleted row matches nothing and reports not-found; hard mode removes the
/// row outright.
pub fn delete(desc: &ResourceDescriptor, key: &[Value]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut where_parts = Vec::new();
    for (col, val) in desc.key.columns().iter().zip(key.iter()) {
        let n = q.push_param(val.clone());
        where_parts.push(format!("{} = ${}", quoted(col), n));
    }

    match desc.delete {
        DeleteMode::Soft => {
            let mut sets = vec!["\"deleted_at\" = NOW()".to_string()];
            for (col, val) in &desc.delete_extra_sets {
                let n = q.push_param(val.clone());
                sets.push(format!("{} = ${}", quoted(col), n));
            }
            where_parts.push("\"deleted_at\" IS NULL".to_string());
            q.sql = format!(
                "UPDATE {} SET {} WHERE {} RETURNING *",
                quoted(desc.table),
                sets.join(", "),
                where_parts.join(" AND ")
            );
        }
        DeleteMode::Hard => {
            q.sql = format!(
                "DELETE FROM {} WHERE {} RETURNING *",
                quoted(desc.table),
                where_parts.join(" AND ")
            );
        }
    }
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceRegistry;
    use serde_json::json;

    fn body(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn insert_binds_every_field_with_defaults_and_nulls() {
        let registry = ResourceRegistry::standard();
        let users = registry.get("users").unwrap();
        let q = insert(
            users,
            None,
            &body(json!({"name": "Ana", "role": "admin", "email": "a@x.com", "password": "pw"})),
        );
        assert!(q.sql.starts_with("INSERT INTO \"users\""));
        assert!(q.sql.contains("\"created_at\""));
        assert!(q.sql.ends_with("RETURNING *"));
        // One param per descriptor field: provided, defaulted, or NULL.
        assert_eq!(q.params.len(), users.fields.len());
        let is_active_pos = users
            .fields
            .iter()
            .position(|f| f.name == "is_active")
            .unwrap();
        assert_eq!(q.params[is_active_pos], json!(true));
        let max_tokens_pos = users
            .fields
            .iter()
            .position(|f| f.name == "max_tokens")
            .unwrap();
        assert_eq!(q.params[max_tokens_pos], json!(20));
        // Optional field with no default and no body value binds NULL.
        let avatar_pos = users.fields.iter().position(|f| f.name == "avatar").unwrap();
        assert_eq!(q.params[avatar_pos], Value::Null);
    }

    #[test]
    fn compound_insert_takes_key_from_path() {
        let registry = ResourceRegistry::standard();
        let au = registry.get("address-user").unwrap();
        let q = insert(au, Some(&[json!(7), json!(12)]), &Map::new());
        assert!(q.sql.contains("\"user_id\""));
        assert!(q.sql.contains("\"address_id\""));
        assert_eq!(q.params[0], json!(7));
        assert_eq!(q.params[1], json!(12));
    }

    #[test]
    fn reads_exclude_soft_deleted_rows() {
        let registry = ResourceRegistry::standard();
        let cities = registry.get("cities").unwrap();
        let q = select_by_key(cities, &[json!(5)]);
        assert!(q.sql.contains("\"deleted_at\" IS NULL"));
        let q = select_list(cities, &[]);
        assert!(q.sql.contains("\"deleted_at\" IS NULL"));
        assert!(q.sql.contains("ORDER BY t.\"id\""));
    }

    #[test]
    fn unfiltered_resources_read_deleted_rows() {
        let registry = ResourceRegistry::standard();
        let au = registry.get("address-user").unwrap();
        let q = select_list(au, &[]);
        assert!(!q.sql.contains("deleted_at"));
    }

    #[test]
    fn cities_embed_their_province() {
        let registry = ResourceRegistry::standard();
        let cities = registry.get("cities").unwrap();
        let q = select_list(cities, &[]);
        assert!(q.sql.contains("row_to_json"));
        assert!(q.sql.contains("\"provinces\""));
    }

    #[test]
    fn topics_embed_their_questions_as_arrays() {
        let registry = ResourceRegistry::standard();
        let topics = registry.get("topics").unwrap();
        let q = select_by_key(topics, &[json!(3)]);
        assert!(q.sql.contains("json_agg"));
        assert!(q.sql.contains("\"topic_id\""));
    }

    #[test]
    fn update_sets_only_provided_fields_and_refreshes_updated_at() {
        let registry = ResourceRegistry::standard();
        let specialties = registry.get("specialties").unwrap();
        let q = update(specialties, &[json!(3)], &body(json!({"name": "Cardiology"})));
        assert!(q.sql.contains("\"name\" = $1"));
        assert!(!q.sql.contains("\"profession_id\" ="));
        assert!(q.sql.contains("\"updated_at\" = NOW()"));
        assert_eq!(q.params, vec![json!("Cardiology"), json!(3)]);
    }

    #[test]
    fn update_on_soft_resources_skips_deleted_rows() {
        let registry = ResourceRegistry::standard();
        let users = registry.get("users").unwrap();
        let q = update(users, &[json!(1)], &body(json!({"name": "Bo"})));
        assert!(q.sql.contains("\"deleted_at\" IS NULL"));
    }

    #[test]
    fn soft_delete_stamps_and_guards() {
        let registry = ResourceRegistry::standard();
        let users = registry.get("users").unwrap();
        let q = delete(users, &[json!(1)]);
        assert!(q.sql.starts_with("UPDATE \"users\""));
        assert!(q.sql.contains("\"deleted_at\" = NOW()"));
        assert!(q.sql.contains("\"is_active\" = $2"));
        assert!(q.sql.contains("\"deleted_at\" IS NULL"));
        assert_eq!(q.params[1], json!(false));
    }

    #[test]
    fn hard_delete_removes_the_row() {
        let registry = ResourceRegistry::standard();
        let professionals = registry.get("professionals").unwrap();
        let q = delete(professionals, &[json!(9)]);
        assert!(q.sql.starts_with("DELETE FROM \"professionals\""));
        assert!(q.sql.ends_with("RETURNING *"));
    }

    #[test]
    fn list_query_filters_override_defaults() {
        let registry = ResourceRegistry::standard();
        let users = registry.get("users").unwrap();
        let q = select_list(users, &[("is_active".to_string(), json!(false))]);
        assert_eq!(q.params, vec![json!(false)]);
        let q = select_list(users, &[]);
        assert_eq!(q.params, vec![json!(true)]);
    }

    #[test]
    fn list_supports_foreign_key_filters() {
        let registry = ResourceRegistry::standard();
        let specialties = registry.get("specialties").unwrap();
        let q = select_list(specialties, &[("profession_id".to_string(), json!(7))]);
        assert!(q.sql.contains("\"profession_id\" = $1"));
        assert_eq!(q.params, vec![json!(7)]);
    }
}
