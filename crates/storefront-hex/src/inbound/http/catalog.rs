use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use storefront_types::domain::catalog::{
    Category, Lookup, LookupKind, NewCategory, NewLookup, NewSize, Size,
};
use storefront_types::ports::Store;

use super::server::{json_body, path_param, AppState};
use crate::errors::AppError;

fn lookup_kind(kind: Result<Path<String>, PathRejection>) -> Result<LookupKind, AppError> {
    path_param(kind)?
        .parse()
        .map_err(|e: storefront_types::domain::ValidationError| AppError::NotFound(e.to_string()))
}

pub(super) async fn list_categories<R: Store>(
    State(state): State<AppState<R>>,
) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(state.catalog.list_categories().await?))
}

pub(super) async fn create_category<R: Store>(
    State(state): State<AppState<R>>,
    payload: Result<Json<NewCategory>, JsonRejection>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    let created = state.catalog.create_category(json_body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub(super) async fn list_sizes<R: Store>(
    State(state): State<AppState<R>>,
) -> Result<Json<Vec<Size>>, AppError> {
    Ok(Json(state.catalog.list_sizes().await?))
}

pub(super) async fn create_size<R: Store>(
    State(state): State<AppState<R>>,
    payload: Result<Json<NewSize>, JsonRejection>,
) -> Result<(StatusCode, Json<Size>), AppError> {
    let created = state.catalog.create_size(json_body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub(super) async fn list_lookups<R: Store>(
    State(state): State<AppState<R>>,
    kind: Result<Path<String>, PathRejection>,
) -> Result<Json<Vec<Lookup>>, AppError> {
    let kind = lookup_kind(kind)?;
    Ok(Json(state.catalog.list_lookups(kind).await?))
}

pub(super) async fn create_lookup<R: Store>(
    State(state): State<AppState<R>>,
    kind: Result<Path<String>, PathRejection>,
    payload: Result<Json<NewLookup>, JsonRejection>,
) -> Result<(StatusCode, Json<Lookup>), AppError> {
    let kind = lookup_kind(kind)?;
    let created = state.catalog.create_lookup(kind, json_body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(created)))
}
