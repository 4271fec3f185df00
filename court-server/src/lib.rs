//! court-server — Food-court ordering service
//!
//! Single long-running process that owns:
//!
//! - **Order lifecycle** (`orders`): status machine, payment settlement,
//!   append-only status history
//! - **Cart** (`cart`): per-session carts and atomic checkout
//! - **Notification fabric** (`live`): in-process topic pub/sub fanning
//!   order events out to table, vendor, cashier and kitchen subscribers
//! - **Realtime gateway + HTTP API** (`api`): WebSocket endpoints per
//!   audience, cart and cashier REST routes
//! - **Auth** (`auth`): JWT for vendor/cashier staff

pub mod api;
pub mod auth;
pub mod cart;
pub mod config;
pub mod db;
pub mod error;
pub mod live;
pub mod orders;
pub mod state;

pub use config::Config;
pub use error::{ServiceError, ServiceResult};
pub use state::AppState;
