//! Staff JWT authentication (vendor / cashier / manager)
//!
//! REST routes take the token in the Authorization header; WebSocket
//! routes take it as a `?token=` query parameter since browsers cannot
//! set custom headers on the WS handshake.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::error::{ErrorBody, ErrorCode, OrderError};

use crate::state::AppState;

/// JWT claims for staff authentication
#[derive(Debug, Serialize, Deserialize)]
pub struct StaffClaims {
    /// Staff login / display name
    pub sub: String,
    /// vendor | cashier | manager
    pub role: String,
    /// Vendor stall this login is bound to (vendor role only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<i64>,
    /// Expiration (Unix timestamp seconds)
    pub exp: usize,
    /// Issued at (Unix timestamp seconds)
    pub iat: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Vendor,
    Cashier,
    /// Floor manager; superset of both staff roles
    Manager,
}

impl Role {
    fn parse(s: &str) -> Option<Role> {
        match s {
            "vendor" => Some(Role::Vendor),
            "cashier" => Some(Role::Cashier),
            "manager" => Some(Role::Manager),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Vendor => "vendor",
            Role::Cashier => "cashier",
            Role::Manager => "manager",
        }
    }
}

/// Authenticated staff identity extracted from a verified JWT
#[derive(Debug, Clone)]
pub struct StaffIdentity {
    pub subject: String,
    pub role: Role,
    pub vendor_id: Option<i64>,
}

impl StaffIdentity {
    /// Settle payments, reset tables, read reports
    pub fn can_operate_cashier(&self) -> bool {
        matches!(self.role, Role::Cashier | Role::Manager)
    }

    /// Drive order status for a given vendor's items
    pub fn can_act_for_vendor(&self, vendor_id: i64) -> bool {
        match self.role {
            Role::Manager => true,
            Role::Vendor => self.vendor_id == Some(vendor_id),
            Role::Cashier => false,
        }
    }

    /// Audit tag recorded in the status history
    pub fn audit_tag(&self) -> String {
        format!("{}:{}", self.role.as_str(), self.subject)
    }
}

const JWT_EXPIRY_HOURS: i64 = 12;

/// Create a staff JWT
pub fn create_token(
    subject: &str,
    role: Role,
    vendor_id: Option<i64>,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now();
    let claims = StaffClaims {
        sub: subject.to_string(),
        role: role.as_str().to_string(),
        vendor_id,
        exp: (now + chrono::Duration::hours(JWT_EXPIRY_HOURS)).timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Verify a staff JWT and map its claims to an identity
pub fn verify_token(token: &str, secret: &str) -> Result<StaffIdentity, OrderError> {
    let token_data = jsonwebtoken::decode::<StaffClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::debug!("JWT validation failed: {e}");
        OrderError::new(ErrorCode::TokenInvalid)
    })?;

    let claims = token_data.claims;
    let role = Role::parse(&claims.role)
        .ok_or_else(|| OrderError::with_message(ErrorCode::TokenInvalid, "unknown role"))?;

    Ok(StaffIdentity {
        subject: claims.sub,
        role,
        vendor_id: claims.vendor_id,
    })
}

/// Middleware that extracts and verifies the staff JWT from the
/// Authorization header
pub async fn staff_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| error_response(OrderError::not_authenticated()))?;

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        error_response(OrderError::with_message(
            ErrorCode::NotAuthenticated,
            "Invalid Authorization format",
        ))
    })?;

    let identity =
        verify_token(token, &state.jwt_secret).map_err(error_response)?;

    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

fn error_response(err: OrderError) -> Response {
    let status = err.http_status();
    (status, axum::Json(ErrorBody::from(&err))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip() {
        let token = create_token("alice", Role::Vendor, Some(7), "secret").unwrap();
        let identity = verify_token(&token, "secret").unwrap();
        assert_eq!(identity.subject, "alice");
        assert_eq!(identity.role, Role::Vendor);
        assert_eq!(identity.vendor_id, Some(7));
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = create_token("alice", Role::Cashier, None, "secret").unwrap();
        let err = verify_token(&token, "other").unwrap_err();
        assert_eq!(err.code, ErrorCode::TokenInvalid);
    }

    #[test]
    fn role_capabilities() {
        let cashier = StaffIdentity {
            subject: "bob".into(),
            role: Role::Cashier,
            vendor_id: None,
        };
        assert!(cashier.can_operate_cashier());
        assert!(!cashier.can_act_for_vendor(1));

        let vendor = StaffIdentity {
            subject: "thai".into(),
            role: Role::Vendor,
            vendor_id: Some(1),
        };
        assert!(!vendor.can_operate_cashier());
        assert!(vendor.can_act_for_vendor(1));
        assert!(!vendor.can_act_for_vendor(2));

        let manager = StaffIdentity {
            subject: "mgr".into(),
            role: Role::Manager,
            vendor_id: None,
        };
        assert!(manager.can_operate_cashier());
        assert!(manager.can_act_for_vendor(2));
    }
}
