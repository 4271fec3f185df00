//! Unified error codes and error type for the ordering core
//!
//! Error codes are u16 values organized by category:
//! - 0xxx: general
//! - 1xxx: authentication
//! - 2xxx: permission
//! - 4xxx: order lifecycle
//! - 5xxx: payment
//! - 6xxx: catalog
//! - 7xxx: table
//! - 9xxx: system

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error code enum
///
/// Represented as a bare u16 on the wire for cross-language clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Validation failed
    ValidationFailed = 2,
    /// Invalid request
    InvalidRequest = 5,

    // ==================== 1xxx: Auth ====================
    /// Caller is not authenticated
    NotAuthenticated = 1001,
    /// Token is invalid or expired
    TokenInvalid = 1004,

    // ==================== 2xxx: Permission ====================
    /// Actor lacks the capability for the requested action
    PermissionDenied = 2001,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Illegal status edge (or lost concurrent-update race)
    InvalidTransition = 4002,
    /// Cart has no items at checkout
    EmptyCart = 4101,
    /// Cart item quantity below 1
    InvalidQuantity = 4102,
    /// Cart item not found
    CartItemNotFound = 4103,

    // ==================== 5xxx: Payment ====================
    /// Tendered amount below order total
    InsufficientPayment = 5001,

    // ==================== 6xxx: Catalog ====================
    /// Menu item unknown or not available
    ItemUnavailable = 6001,

    // ==================== 7xxx: Table ====================
    /// Table unknown or inactive
    TableUnavailable = 7001,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
}

impl ErrorCode {
    /// Default human-readable message for this code
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::NotAuthenticated => "Authentication required",
            ErrorCode::TokenInvalid => "Invalid or expired token",
            ErrorCode::PermissionDenied => "Permission denied",
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::InvalidTransition => "Invalid status transition",
            ErrorCode::EmptyCart => "Cart is empty",
            ErrorCode::InvalidQuantity => "Quantity must be at least 1",
            ErrorCode::CartItemNotFound => "Cart item not found",
            ErrorCode::InsufficientPayment => "Payment amount below order total",
            ErrorCode::ItemUnavailable => "Menu item not available",
            ErrorCode::TableUnavailable => "Table not available",
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
        }
    }

    /// HTTP status this code maps to at the API boundary
    pub fn http_status(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationFailed | ErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
            ErrorCode::NotAuthenticated | ErrorCode::TokenInvalid => StatusCode::UNAUTHORIZED,
            ErrorCode::PermissionDenied => StatusCode::FORBIDDEN,
            ErrorCode::OrderNotFound | ErrorCode::CartItemNotFound => StatusCode::NOT_FOUND,
            ErrorCode::InvalidTransition => StatusCode::CONFLICT,
            ErrorCode::EmptyCart
            | ErrorCode::InvalidQuantity
            | ErrorCode::InsufficientPayment
            | ErrorCode::ItemUnavailable
            | ErrorCode::TableUnavailable => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::InternalError | ErrorCode::DatabaseError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> u16 {
        code as u16
    }
}

impl TryFrom<u16> for ErrorCode {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(ErrorCode::ValidationFailed),
            5 => Ok(ErrorCode::InvalidRequest),
            1001 => Ok(ErrorCode::NotAuthenticated),
            1004 => Ok(ErrorCode::TokenInvalid),
            2001 => Ok(ErrorCode::PermissionDenied),
            4001 => Ok(ErrorCode::OrderNotFound),
            4002 => Ok(ErrorCode::InvalidTransition),
            4101 => Ok(ErrorCode::EmptyCart),
            4102 => Ok(ErrorCode::InvalidQuantity),
            4103 => Ok(ErrorCode::CartItemNotFound),
            5001 => Ok(ErrorCode::InsufficientPayment),
            6001 => Ok(ErrorCode::ItemUnavailable),
            7001 => Ok(ErrorCode::TableUnavailable),
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            other => Err(format!("unknown error code: {other}")),
        }
    }
}

/// Application error with a structured code and human-readable message
///
/// All recoverable conditions in the order core surface as this type;
/// callers see `{code, message}`, never a stack trace.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct OrderError {
    /// The error code identifying the type of error
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
}

impl OrderError {
    /// Create an error with the default message for the code
    pub fn new(code: ErrorCode) -> Self {
        Self {
            message: code.message().to_string(),
            code,
        }
    }

    /// Create an error with a custom message
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    // ==================== Convenience constructors ====================

    pub fn order_not_found(order_id: &str) -> Self {
        Self::with_message(ErrorCode::OrderNotFound, format!("Order {order_id} not found"))
    }

    pub fn invalid_transition(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        Self::with_message(
            ErrorCode::InvalidTransition,
            format!("Cannot transition order from {from} to {to}"),
        )
    }

    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::PermissionDenied, msg)
    }

    pub fn insufficient_payment(tendered: f64, total: f64) -> Self {
        Self::with_message(
            ErrorCode::InsufficientPayment,
            format!("Payment amount ({tendered:.2}) is less than order total ({total:.2})"),
        )
    }

    pub fn table_unavailable(table_number: i64) -> Self {
        Self::with_message(
            ErrorCode::TableUnavailable,
            format!("Table {table_number} is not available"),
        )
    }

    pub fn item_unavailable(menu_item_id: i64) -> Self {
        Self::with_message(
            ErrorCode::ItemUnavailable,
            format!("Menu item {menu_item_id} is not available"),
        )
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::ValidationFailed, msg)
    }

    pub fn not_authenticated() -> Self {
        Self::new(ErrorCode::NotAuthenticated)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::InternalError, msg)
    }

    /// Get the HTTP status code for this error
    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }
}

/// Wire shape of an error response: `{"code": 4002, "message": "..."}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

impl From<&OrderError> for ErrorBody {
    fn from(err: &OrderError) -> Self {
        Self {
            code: err.code,
            message: err.message.clone(),
        }
    }
}
