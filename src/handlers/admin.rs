use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::Booking;
use crate::state::AppState;

fn require_token(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let provided = headers
        .get("x-admin-token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if provided != state.config.admin_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Booking>>, AppError> {
    require_token(&state, &headers)?;

    let db = state.db.lock().unwrap();
    let bookings = queries::upcoming_bookings(&db, Utc::now().date_naive())?;
    Ok(Json(bookings))
}

pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_token(&state, &headers)?;

    let cancelled = {
        let db = state.db.lock().unwrap();
        queries::cancel_booking(&db, &id)?
    };
    if !cancelled {
        return Err(AppError::NotFound(format!("booking {id}")));
    }

    tracing::info!(booking = %id, "booking cancelled by operator");
    Ok(Json(serde_json::json!({ "cancelled": id })))
}
