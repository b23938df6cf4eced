use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use storefront_types::domain::catalog::{NewProduct, ProductDetail, ProductPatch};
use storefront_types::ports::Store;

use super::server::{json_body, path_param, query_params, AppState};
use crate::errors::AppError;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub sort_id: Option<i32>,
    pub page_index: Option<i64>,
    pub page_size: Option<i64>,
}

pub(super) async fn get_product<R: Store>(
    State(state): State<AppState<R>>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<ProductDetail>, AppError> {
    let id = path_param(id)?;
    Ok(Json(state.catalog.get_product(id).await?))
}

pub(super) async fn list_products<R: Store>(
    State(state): State<AppState<R>>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<ProductDetail>>, AppError> {
    let params = query_params(params)?;
    let products = state
        .catalog
        .list_products(None, params.sort_id, params.page_index, params.page_size)
        .await?;
    Ok(Json(products))
}

pub(super) async fn list_filtered_products<R: Store>(
    State(state): State<AppState<R>>,
    filter: Result<Path<String>, PathRejection>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<ProductDetail>>, AppError> {
    let filter = path_param(filter)?;
    let params = query_params(params)?;
    let products = state
        .catalog
        .list_products(
            Some(&filter),
            params.sort_id,
            params.page_index,
            params.page_size,
        )
        .await?;
    Ok(Json(products))
}

pub(super) async fn featured_products<R: Store>(
    State(state): State<AppState<R>>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<ProductDetail>>, AppError> {
    let params = query_params(params)?;
    let products = state
        .catalog
        .featured_products(params.page_index, params.page_size)
        .await?;
    Ok(Json(products))
}

pub(super) async fn create_product<R: Store>(
    State(state): State<AppState<R>>,
    payload: Result<Json<NewProduct>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let created = state.catalog.create_product(json_body(payload)?).await?;
    let location = format!("/api/product/{}", created.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(created),
    ))
}

pub(super) async fn update_product<R: Store>(
    State(state): State<AppState<R>>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<ProductPatch>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let id = path_param(id)?;
    state.catalog.update_product(id, json_body(payload)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn delete_product<R: Store>(
    State(state): State<AppState<R>>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, AppError> {
    state.catalog.delete_product(path_param(id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}
