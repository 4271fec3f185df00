//! Error plumbing between the database layer and the HTTP surface
//!
//! Everything below the API handlers returns [`ServiceResult`]. Domain
//! failures travel as [`OrderError`] with their code intact; sqlx
//! failures are logged at the boundary and collapse to an opaque
//! `InternalError` so the wire never leaks storage details.

use axum::response::IntoResponse;
use shared::error::{ErrorBody, ErrorCode, OrderError};

#[derive(Debug)]
pub enum ServiceError {
    /// Storage failure; the client only ever sees `InternalError`
    Db(sqlx::Error),
    /// Business-rule failure, passed through to the client unchanged
    App(OrderError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<sqlx::Error> for ServiceError {
    fn from(e: sqlx::Error) -> Self {
        ServiceError::Db(e)
    }
}

impl From<OrderError> for ServiceError {
    fn from(e: OrderError) -> Self {
        ServiceError::App(e)
    }
}

impl From<ServiceError> for OrderError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::App(err) => err,
            ServiceError::Db(err) => {
                tracing::error!(error = %err, "database error in order service");
                OrderError::new(ErrorCode::InternalError)
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        let err: OrderError = self.into();
        let status = err.http_status();
        (status, axum::Json(ErrorBody::from(&err))).into_response()
    }
}
