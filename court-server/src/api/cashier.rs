//! Cashier console routes (staff JWT required)

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shared::error::OrderError;
use shared::order::OrderView;

use crate::auth::StaffIdentity;
use crate::error::{ServiceError, ServiceResult};
use crate::orders::{DailyReport, PaymentReceipt, StatusChange, TableOverview};
use crate::state::AppState;

fn require_cashier(identity: &StaffIdentity) -> Result<(), ServiceError> {
    if identity.can_operate_cashier() {
        Ok(())
    } else {
        Err(OrderError::permission_denied("cashier role required").into())
    }
}

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    pub order: OrderView,
    pub history: Vec<StatusChange>,
}

pub async fn get_order(
    State(state): State<AppState>,
    Extension(identity): Extension<StaffIdentity>,
    Path(order_id): Path<String>,
) -> ServiceResult<Json<OrderDetail>> {
    require_cashier(&identity)?;
    let orders = state.order_service();
    let order = orders.get(&order_id).await?;
    let history = orders.history(&order_id).await?;
    Ok(Json(OrderDetail { order, history }))
}

#[derive(Debug, Deserialize)]
pub struct MarkPaidRequest {
    #[serde(default = "default_payment_method")]
    pub payment_method: String,
    pub payment_amount: Option<f64>,
}

fn default_payment_method() -> String {
    "cash".to_string()
}

pub async fn mark_paid(
    State(state): State<AppState>,
    Extension(identity): Extension<StaffIdentity>,
    Path(order_id): Path<String>,
    Json(req): Json<MarkPaidRequest>,
) -> ServiceResult<Json<PaymentReceipt>> {
    require_cashier(&identity)?;
    let receipt = state
        .order_service()
        .mark_paid(
            &order_id,
            &req.payment_method,
            req.payment_amount,
            &identity.audit_tag(),
        )
        .await?;
    Ok(Json(receipt))
}

pub async fn table_overview(
    State(state): State<AppState>,
    Extension(identity): Extension<StaffIdentity>,
) -> ServiceResult<Json<Vec<TableOverview>>> {
    require_cashier(&identity)?;
    let overview = state.order_service().table_overview().await?;
    Ok(Json(overview))
}

#[derive(Debug, Serialize)]
pub struct ResetTableResponse {
    pub table_number: i64,
    pub cancelled_orders: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResetTableRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn reset_table(
    State(state): State<AppState>,
    Extension(identity): Extension<StaffIdentity>,
    Path(table_number): Path<i64>,
    Json(req): Json<ResetTableRequest>,
) -> ServiceResult<Json<ResetTableResponse>> {
    require_cashier(&identity)?;
    let reason = req.reason.as_deref().unwrap_or("table_reset");
    let cancelled_orders = state
        .order_service()
        .reset_table(table_number, &identity.audit_tag(), reason)
        .await?;
    Ok(Json(ResetTableResponse {
        table_number,
        cancelled_orders,
    }))
}

#[derive(Debug, Deserialize)]
pub struct DailyReportQuery {
    /// YYYY-MM-DD; defaults to today (UTC)
    pub date: Option<String>,
}

pub async fn daily_report(
    State(state): State<AppState>,
    Extension(identity): Extension<StaffIdentity>,
    Query(query): Query<DailyReportQuery>,
) -> ServiceResult<Json<DailyReport>> {
    require_cashier(&identity)?;
    let date = match query.date {
        Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .map_err(|_| OrderError::validation(format!("invalid date: {raw}")))?,
        None => Utc::now().date_naive(),
    };
    let report = state.order_service().daily_report(date).await?;
    Ok(Json(report))
}
