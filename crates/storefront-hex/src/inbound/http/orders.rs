use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use storefront_types::domain::order::{AddToCart, OrderConfirmation, OrderView};
use storefront_types::ports::Store;

use super::auth::AnonymousUser;
use super::server::{json_body, path_param, AppState};
use crate::errors::AppError;

pub(super) async fn active_order<R: Store>(
    State(state): State<AppState<R>>,
    AnonymousUser(identity): AnonymousUser,
) -> Result<Json<OrderView>, AppError> {
    Ok(Json(state.orders.active_order(&identity).await?))
}

pub(super) async fn add_to_cart<R: Store>(
    State(state): State<AppState<R>>,
    AnonymousUser(identity): AnonymousUser,
    payload: Result<Json<AddToCart>, JsonRejection>,
) -> Result<Json<OrderConfirmation>, AppError> {
    let request = json_body(payload)?;
    Ok(Json(state.orders.add_to_cart(&identity, request).await?))
}

pub(super) async fn remove_item<R: Store>(
    State(state): State<AppState<R>>,
    AnonymousUser(identity): AnonymousUser,
    item_id: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let item_id = path_param(item_id)?;
    state.orders.remove_item(&identity, item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn checkout<R: Store>(
    State(state): State<AppState<R>>,
    AnonymousUser(identity): AnonymousUser,
) -> Result<Json<OrderConfirmation>, AppError> {
    Ok(Json(state.orders.checkout(&identity).await?))
}

pub(super) async fn get_order<R: Store>(
    State(state): State<AppState<R>>,
    order_id: Result<Path<i64>, PathRejection>,
) -> Result<Json<OrderView>, AppError> {
    let order_id = path_param(order_id)?;
    Ok(Json(state.orders.get_order(order_id).await?))
}
