use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;

use crate::AppState;
use crate::services::geocode::{self, LocationSuggestion};

#[derive(Debug, Deserialize)]
pub struct LocationQuery {
    pub q: Option<String>,
}

pub async fn suggest_locations(
    State(state): State<AppState>,
    Query(params): Query<LocationQuery>,
) -> Json<Vec<LocationSuggestion>> {
    let query = params.q.unwrap_or_default();
    Json(geocode::suggest(&state.http, &query).await)
}
