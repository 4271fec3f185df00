//! Customer cart routes
//!
//! The cart session is an opaque key supplied by the client in the
//! `X-Session-Key` header; the table's QR code payload generates one
//! per seating.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use shared::error::OrderError;
use shared::order::OrderView;

use crate::cart::{CartView, CheckoutInput};
use crate::error::{ServiceError, ServiceResult};
use crate::state::AppState;

const SESSION_HEADER: &str = "x-session-key";

fn session_key(headers: &HeaderMap) -> Result<String, ServiceError> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| OrderError::validation("missing X-Session-Key header").into())
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub menu_item_id: i64,
    pub quantity: i64,
    #[serde(default)]
    pub special_instructions: String,
    pub table_number: Option<i64>,
}

pub async fn add_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AddItemRequest>,
) -> ServiceResult<Json<CartView>> {
    let session = session_key(&headers)?;
    let cart = state
        .cart_service()
        .add_item(
            &session,
            req.table_number,
            req.menu_item_id,
            req.quantity,
            &req.special_instructions,
        )
        .await?;
    Ok(Json(cart))
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    /// New quantity, at least 1; removal has its own route
    pub quantity: i64,
}

pub async fn update_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(item_id): Path<i64>,
    Json(req): Json<UpdateItemRequest>,
) -> ServiceResult<Json<CartView>> {
    let session = session_key(&headers)?;
    let cart = state
        .cart_service()
        .update_item(&session, item_id, req.quantity)
        .await?;
    Ok(Json(cart))
}

pub async fn remove_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(item_id): Path<i64>,
) -> ServiceResult<Json<CartView>> {
    let session = session_key(&headers)?;
    let cart = state.cart_service().remove_item(&session, item_id).await?;
    Ok(Json(cart))
}

pub async fn get_cart(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ServiceResult<Json<CartView>> {
    let session = session_key(&headers)?;
    let cart = state.cart_service().view(&session).await?;
    Ok(Json(cart))
}

#[derive(Debug, Deserialize, Default)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub customer_phone: String,
    #[serde(default)]
    pub notes: String,
    pub table_number: Option<i64>,
}

pub async fn checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CheckoutRequest>,
) -> ServiceResult<Json<OrderView>> {
    let session = session_key(&headers)?;
    let order = state
        .cart_service()
        .checkout(
            &session,
            CheckoutInput {
                customer_name: req.customer_name,
                customer_phone: req.customer_phone,
                notes: req.notes,
                table_number: req.table_number,
            },
        )
        .await?;
    Ok(Json(order))
}
