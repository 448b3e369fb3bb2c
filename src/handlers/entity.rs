//! Generic resource handlers. Every simple and join resource is served by
//! these few functions; the descriptor resolved from the first path segment
//! carries all per-resource behavior.

use crate::error::AppError;
use crate::resource::{FieldSpec, KeyKind, KeySpec, ResourceDescriptor};
use crate::response;
use crate::service::CrudService;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// An absent or empty body reads as `{}`; anything else must parse as a
/// JSON object.
pub(crate) fn parse_body(raw: &str) -> Result<Map<String, Value>, AppError> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AppError::Validation(
            "Request body must be a JSON object".to_string(),
        )),
        Err(_) => Err(AppError::Validation(
            "Request body is not valid JSON".to_string(),
        )),
    }
}

fn parse_single_key(desc: &ResourceDescriptor, raw: &str) -> Result<Value, AppError> {
    match &desc.key {
        KeySpec::Single { kind, .. } => match kind {
            KeyKind::BigInt => raw
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| desc.invalid_id_error(&format!("{} ID", desc.display_name))),
            KeyKind::Text => Ok(Value::String(raw.to_string())),
        },
        KeySpec::Compound { .. } => Err(desc.id_required_error()),
    }
}

fn parse_compound_key(
    desc: &ResourceDescriptor,
    raw_a: &str,
    raw_b: &str,
) -> Result<Vec<Value>, AppError> {
    match &desc.key {
        KeySpec::Compound { first, second } => {
            let a = raw_a
                .parse::<i64>()
                .map_err(|_| desc.invalid_id_error(first.display))?;
            let b = raw_b
                .parse::<i64>()
                .map_err(|_| desc.invalid_id_error(second.display))?;
            Ok(vec![Value::from(a), Value::from(b)])
        }
        KeySpec::Single { .. } => Err(AppError::RouteNotFound),
    }
}

fn check_required(desc: &ResourceDescriptor, body: &Map<String, Value>) -> Result<(), AppError> {
    for field in desc.fields.iter().filter(|f| f.required) {
        let present = body.get(field.name).map(|v| !v.is_null()).unwrap_or(false);
        if !present {
            return Err(AppError::Validation(format!("{} is required", field.name)));
        }
    }
    Ok(())
}

/// Query-string values arrive as text; coerce by the column's declared type
/// so `?is_active=false` and `?profession_id=7` bind correctly.
fn coerce_query_value(field: &FieldSpec, raw: &str) -> Value {
    match field.pg_type {
        "bigint" | "integer" => raw
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        "double precision" => raw
            .parse::<f64>()
            .ok()
            .and_then(|n| serde_json::Number::from_f64(n).map(Value::Number))
            .unwrap_or_else(|| Value::String(raw.to_string())),
        "boolean" => match raw {
            _ if raw.eq_ignore_ascii_case("true") => Value::Bool(true),
            _ if raw.eq_ignore_ascii_case("false") => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        },
        _ => Value::String(raw.to_string()),
    }
}

fn resolve<'a>(state: &'a AppState, segment: &str) -> Result<&'a ResourceDescriptor, AppError> {
    state.registry.get(segment).ok_or(AppError::RouteNotFound)
}

pub async fn list(
    State(state): State<AppState>,
    Path(segment): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let desc = resolve(&state, &segment)?;
    let mut filters = Vec::new();
    for (k, v) in &params {
        if let Some(field) = desc.field(k) {
            filters.push((k.clone(), coerce_query_value(field, v)));
        }
    }
    let rows = CrudService::list(&state.pool, desc, &filters).await?;
    Ok(response::success(
        axum::http::StatusCode::OK,
        Value::Array(rows),
        state.id_encoding,
    ))
}

/// `GET /specialties/profession/{professionId}`: the specialty list
/// filtered to one profession, a declared path alongside the query filter.
pub async fn specialties_by_profession(
    State(state): State<AppState>,
    Path(profession_id): Path<String>,
) -> Result<Response, AppError> {
    let desc = resolve(&state, "specialties")?;
    let profession_id = profession_id
        .parse::<i64>()
        .map_err(|_| desc.invalid_id_error("Profession ID"))?;
    let filters = [("profession_id".to_string(), Value::from(profession_id))];
    let rows = CrudService::list(&state.pool, desc, &filters).await?;
    Ok(response::success(
        axum::http::StatusCode::OK,
        Value::Array(rows),
        state.id_encoding,
    ))
}

pub async fn create(
    State(state): State<AppState>,
    Path(segment): Path<String>,
    raw_body: String,
) -> Result<Response, AppError> {
    let desc = resolve(&state, &segment)?;
    if desc.key.is_compound() {
        return Err(desc.id_required_error());
    }
    let body = parse_body(&raw_body)?;
    check_required(desc, &body)?;
    let row = CrudService::create(&state.pool, desc, None, &body).await?;
    Ok(response::success(desc.created_status, row, state.id_encoding))
}

pub async fn read(
    State(state): State<AppState>,
    Path((segment, id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let desc = resolve(&state, &segment)?;
    // A lone id on a join resource reads as the unfiltered list, matching
    // the deployed behavior.
    if desc.key.is_compound() {
        let rows = CrudService::list(&state.pool, desc, &[]).await?;
        return Ok(response::success(
            axum::http::StatusCode::OK,
            Value::Array(rows),
            state.id_encoding,
        ));
    }
    let key = parse_single_key(desc, &id)?;
    let row = CrudService::read(&state.pool, desc, &[key])
        .await?
        .ok_or_else(|| desc.not_found_error())?;
    Ok(response::success(
        axum::http::StatusCode::OK,
        row,
        state.id_encoding,
    ))
}

pub async fn update(
    State(state): State<AppState>,
    Path((segment, id)): Path<(String, String)>,
    raw_body: String,
) -> Result<Response, AppError> {
    let desc = resolve(&state, &segment)?;
    if desc.key.is_compound() {
        return Err(desc.id_required_error());
    }
    let key = parse_single_key(desc, &id)?;
    let body = parse_body(&raw_body)?;
    let row = CrudService::update(&state.pool, desc, &[key], &body)
        .await?
        .ok_or_else(|| desc.not_found_error())?;
    Ok(response::success(
        axum::http::StatusCode::OK,
        row,
        state.id_encoding,
    ))
}

pub async fn remove(
    State(state): State<AppState>,
    Path((segment, id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let desc = resolve(&state, &segment)?;
    if desc.key.is_compound() {
        return Err(desc.id_required_error());
    }
    let key = parse_single_key(desc, &id)?;
    CrudService::delete(&state.pool, desc, &[key])
        .await?
        .ok_or_else(|| desc.not_found_error())?;
    Ok(response::deleted(None))
}

pub async fn compound_read(
    State(state): State<AppState>,
    Path((segment, id_a, id_b)): Path<(String, String, String)>,
) -> Result<Response, AppError> {
    let desc = resolve(&state, &segment)?;
    let key = parse_compound_key(desc, &id_a, &id_b)?;
    let row = CrudService::read(&state.pool, desc, &key)
        .await?
        .ok_or_else(|| desc.not_found_error())?;
    Ok(response::success(
        axum::http::StatusCode::OK,
        row,
        state.id_encoding,
    ))
}

pub async fn compound_create(
    State(state): State<AppState>,
    Path((segment, id_a, id_b)): Path<(String, String, String)>,
    raw_body: String,
) -> Result<Response, AppError> {
    let desc = resolve(&state, &segment)?;
    let key = parse_compound_key(desc, &id_a, &id_b)?;
    let body = parse_body(&raw_body)?;
    check_required(desc, &body)?;
    let row = CrudService::create(&state.pool, desc, Some(&key), &body).await?;
    Ok(response::success(desc.created_status, row, state.id_encoding))
}

pub async fn compound_update(
    State(state): State<AppState>,
    Path((segment, id_a, id_b)): Path<(String, String, String)>,
    raw_body: String,
) -> Result<Response, AppError> {
    let desc = resolve(&state, &segment)?;
    let key = parse_compound_key(desc, &id_a, &id_b)?;
    let body = parse_body(&raw_body)?;
    let row = CrudService::update(&state.pool, desc, &key, &body)
        .await?
        .ok_or_else(|| desc.not_found_error())?;
    Ok(response::success(
        axum::http::StatusCode::OK,
        row,
        state.id_encoding,
    ))
}

pub async fn compound_remove(
    State(state): State<AppState>,
    Path((segment, id_a, id_b)): Path<(String, String, String)>,
) -> Result<Response, AppError> {
    let desc = resolve(&state, &segment)?;
    let key = parse_compound_key(desc, &id_a, &id_b)?;
    CrudService::delete(&state.pool, desc, &key)
        .await?
        .ok_or_else(|| desc.not_found_error())?;
    Ok(response::deleted(None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceRegistry;
    use serde_json::json;

    #[test]
    fn empty_body_reads_as_empty_object() {
        assert!(parse_body("").unwrap().is_empty());
        assert!(parse_body("   ").unwrap().is_empty());
    }

    #[test]
    fn non_object_bodies_are_rejected() {
        assert!(parse_body("[1, 2]").is_err());
        assert!(parse_body("not json").is_err());
    }

    #[test]
    fn numeric_ids_must_parse() {
        let registry = ResourceRegistry::standard();
        let users = registry.get("users").unwrap();
        assert_eq!(parse_single_key(users, "42").unwrap(), json!(42));
        let err = parse_single_key(users, "abc").unwrap_err();
        assert_eq!(err.message(), "Invalid User ID");
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn text_keys_pass_through() {
        let registry = ResourceRegistry::standard();
        let tokens = registry.get("password-reset-tokens").unwrap();
        assert_eq!(
            parse_single_key(tokens, "a@b.com").unwrap(),
            json!("a@b.com")
        );
    }

    #[test]
    fn compound_key_parse_names_the_failing_part() {
        let registry = ResourceRegistry::standard();
        let au = registry.get("address-user").unwrap();
        assert_eq!(
            parse_compound_key(au, "1", "2").unwrap(),
            vec![json!(1), json!(2)]
        );
        let err = parse_compound_key(au, "1", "x").unwrap_err();
        assert_eq!(err.message(), "Invalid Address ID");
    }

    #[test]
    fn missing_required_fields_fail_validation() {
        let registry = ResourceRegistry::standard();
        let users = registry.get("users").unwrap();
        let body = match json!({"name": "Ana"}) {
            Value::Object(m) => m,
            _ => unreachable!(),
        };
        let err = check_required(users, &body).unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
        assert!(err.message().ends_with("is required"));
    }

    #[test]
    fn query_values_coerce_by_column_type() {
        let registry = ResourceRegistry::standard();
        let users = registry.get("users").unwrap();
        let is_active = users.field("is_active").unwrap();
        assert_eq!(coerce_query_value(is_active, "false"), json!(false));
        let max_tokens = users.field("max_tokens").unwrap();
        assert_eq!(coerce_query_value(max_tokens, "50"), json!(50));
        let name = users.field("name").unwrap();
        assert_eq!(coerce_query_value(name, "Ana"), json!("Ana"));
    }
}
