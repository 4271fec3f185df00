//! HTTP and WebSocket routes

pub mod cart;
pub mod cashier;
pub mod health;
pub mod ws;

use axum::routing::{get, patch, post};
use axum::{middleware, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::staff_auth_middleware;
use crate::state::AppState;

/// Create the combined router
pub fn router(state: AppState) -> Router {
    // Customer cart (session key header, no auth)
    let cart = Router::new()
        .route("/api/cart", get(cart::get_cart))
        .route("/api/cart/items", post(cart::add_item))
        .route(
            "/api/cart/items/{item_id}",
            patch(cart::update_item).delete(cart::remove_item),
        )
        .route("/api/cart/checkout", post(cart::checkout));

    // Cashier console (staff JWT)
    let cashier = Router::new()
        .route("/api/cashier/orders/{order_id}", get(cashier::get_order))
        .route("/api/cashier/orders/{order_id}/paid", post(cashier::mark_paid))
        .route("/api/cashier/tables", get(cashier::table_overview))
        .route(
            "/api/cashier/tables/{table_number}/reset",
            post(cashier::reset_table),
        )
        .route("/api/cashier/reports/daily", get(cashier::daily_report))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            staff_auth_middleware,
        ));

    // Realtime gateway
    let gateway = Router::new()
        .route("/ws/table/{table_number}", get(ws::table_ws))
        .route("/ws/vendor/{vendor_id}", get(ws::vendor_ws))
        .route("/ws/cashier", get(ws::cashier_ws))
        .route("/ws/kitchen", get(ws::kitchen_ws));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(cart)
        .merge(cashier)
        .merge(gateway)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
