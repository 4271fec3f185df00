//! Shared types for the food-court ordering platform
//!
//! Everything that crosses a process or crate boundary lives here:
//! - [`error`] — unified error codes and the [`error::OrderError`] type
//! - [`order`] — order status machine and full order snapshots
//! - [`message`] — client WebSocket protocol and bus event types
//! - [`models`] — read-only collaborator records (tables, vendors, menu)

pub mod error;
pub mod message;
pub mod models;
pub mod order;
pub mod util;

pub use error::{ErrorCode, OrderError};
pub use order::{OrderItemView, OrderStatus, OrderView};
