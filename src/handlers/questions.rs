//! Handlers for the composite questions resource nested under topics.

use crate::error::AppError;
use crate::handlers::entity::parse_body;
use crate::response;
use crate::service::QuestionStore;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use serde_json::Value;

fn parse_id(raw: &str, display: &str) -> Result<i64, AppError> {
    raw.parse::<i64>()
        .map_err(|_| AppError::Validation(format!("Invalid {}", display)))
}

fn question_not_found() -> AppError {
    AppError::NotFound("Question not found".to_string())
}

pub async fn list(
    State(state): State<AppState>,
    Path(topic_id): Path<String>,
) -> Result<Response, AppError> {
    let topic_id = parse_id(&topic_id, "Topic ID")?;
    let rows = QuestionStore::list_for_topic(&state.pool, topic_id).await?;
    Ok(response::success(
        StatusCode::OK,
        Value::Array(rows),
        state.id_encoding,
    ))
}

pub async fn create(
    State(state): State<AppState>,
    Path(topic_id): Path<String>,
    raw_body: String,
) -> Result<Response, AppError> {
    let topic_id = parse_id(&topic_id, "Topic ID")?;
    let body = parse_body(&raw_body)?;
    let row = QuestionStore::create(&state.pool, topic_id, &body).await?;
    Ok(response::success(StatusCode::CREATED, row, state.id_encoding))
}

pub async fn read(
    State(state): State<AppState>,
    Path((topic_id, question_id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let topic_id = parse_id(&topic_id, "Topic ID")?;
    let question_id = parse_id(&question_id, "Question ID")?;
    let row = QuestionStore::read(&state.pool, topic_id, question_id)
        .await?
        .ok_or_else(question_not_found)?;
    Ok(response::success(StatusCode::OK, row, state.id_encoding))
}

pub async fn update(
    State(state): State<AppState>,
    Path((topic_id, question_id)): Path<(String, String)>,
    raw_body: String,
) -> Result<Response, AppError> {
    let topic_id = parse_id(&topic_id, "Topic ID")?;
    let question_id = parse_id(&question_id, "Question ID")?;
    let body = parse_body(&raw_body)?;
    let row = QuestionStore::update(&state.pool, topic_id, question_id, &body)
        .await?
        .ok_or_else(question_not_found)?;
    Ok(response::success(StatusCode::OK, row, state.id_encoding))
}

pub async fn remove(
    State(state): State<AppState>,
    Path((topic_id, question_id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let topic_id = parse_id(&topic_id, "Topic ID")?;
    let question_id = parse_id(&question_id, "Question ID")?;
    if !QuestionStore::delete(&state.pool, topic_id, question_id).await? {
        return Err(question_not_found());
    }
    Ok(response::deleted(None))
}

/// PUT or DELETE on the collection path carries no question id.
pub async fn id_required() -> AppError {
    AppError::Validation("Question ID is required".to_string())
}
