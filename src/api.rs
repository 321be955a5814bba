//! HTTP routes.

use crate::engine::BatchEngine;
use crate::error::ApiError;
use crate::marketplace::{Marketplace, Resource};
use crate::models::{BatchVerification, ForumPost, ProductListing, SealedMetadata, User};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<BatchEngine>,
    pub market: Marketplace,
}

impl AppState {
    pub fn new(engine: BatchEngine) -> Self {
        let market = Marketplace::new(Arc::clone(engine.store()));
        Self {
            engine: Arc::new(engine),
            market,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/batches", get(missing_batch_id))
        .route("/batches/", get(missing_batch_id))
        .route("/batches/:batch_id", get(get_batch))
        .route(
            "/batches/:batch_id/metadata",
            axum::routing::post(register_metadata),
        )
        .merge(crud_routes::<User>("/users"))
        .merge(crud_routes::<ForumPost>("/posts"))
        .merge(crud_routes::<ProductListing>("/products"))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn crud_routes<R: Resource>(base: &str) -> Router<AppState> {
    Router::new()
        .route(base, get(list_records::<R>).post(create_record::<R>))
        .route(
            &format!("{}/:id", base),
            get(get_record::<R>)
                .put(update_record::<R>)
                .delete(delete_record::<R>),
        )
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "store": state.engine.store().backend_name(),
    }))
}

async fn missing_batch_id() -> ApiError {
    ApiError::BadRequest("Missing batchId".to_string())
}

async fn get_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
) -> Result<Json<BatchVerification>, ApiError> {
    Ok(Json(state.engine.lookup(&batch_id).await?))
}

async fn register_metadata(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<SealedMetadata>), ApiError> {
    let Json(metadata) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let sealed = state.engine.register_metadata(&batch_id, metadata).await?;
    Ok((StatusCode::CREATED, Json(sealed)))
}

async fn list_records<R: Resource>(
    State(state): State<AppState>,
    Query(filters): Query<HashMap<String, String>>,
) -> Result<Json<Vec<R>>, ApiError> {
    Ok(Json(state.market.list::<R>(&filters).await?))
}

async fn get_record<R: Resource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<R>, ApiError> {
    Ok(Json(state.market.get::<R>(&id).await?))
}

async fn create_record<R: Resource>(
    State(state): State<AppState>,
    body: Result<Json<R>, JsonRejection>,
) -> Result<(StatusCode, Json<R>), ApiError> {
    let Json(record) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    Ok((StatusCode::CREATED, Json(state.market.create(record).await?)))
}

async fn update_record<R: Resource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<R>, JsonRejection>,
) -> Result<Json<R>, ApiError> {
    let Json(record) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    Ok(Json(state.market.update(&id, record).await?))
}

async fn delete_record<R: Resource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.market.delete::<R>(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
