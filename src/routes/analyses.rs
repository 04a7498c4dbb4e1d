use axum::{
    Json,
    extract::{Path, State},
};
use uuid::Uuid;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{PropertyInput, PropertyRecord};
use crate::pipeline::AnalysisOutcome;

pub async fn create_analysis(
    State(state): State<AppState>,
    Json(input): Json<PropertyInput>,
) -> AppResult<Json<AnalysisOutcome>> {
    if !(input.price.is_finite() && input.price > 0.0) {
        return Err(AppError::Validation("price must be a positive number".into()));
    }
    if input.location.trim().is_empty() {
        return Err(AppError::Validation("location must not be empty".into()));
    }
    if input.user_info.email.trim().is_empty() {
        return Err(AppError::Validation("email must not be empty".into()));
    }

    let outcome = state.orchestrator.run(&input).await?;

    Ok(Json(outcome))
}

pub async fn list_analyses(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<PropertyRecord>>> {
    let records = state.store.list().await?;
    Ok(Json(records))
}

pub async fn get_analysis(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PropertyRecord>> {
    let record = state
        .store
        .list()
        .await?
        .into_iter()
        .find(|record| record.id == id)
        .ok_or_else(|| AppError::NotFound(format!("Record {id} not found")))?;

    Ok(Json(record))
}
