use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use common_http_errors::{ApiError, ApiResult};
use common_orders::OrderStatus;
use common_security::{ensure_owner_or_admin, SecurityCtxExtractor};

use crate::init::{InitPaymentRequest, InitPaymentResponse};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct PaymentStatusResponse {
    pub order_id: i64,
    pub status: OrderStatus,
    pub payment_id: Option<String>,
    pub is_paid: bool,
}

pub async fn init_payment(
    State(state): State<AppState>,
    SecurityCtxExtractor(ctx): SecurityCtxExtractor,
    payload: Result<Json<InitPaymentRequest>, JsonRejection>,
) -> ApiResult<Json<InitPaymentResponse>> {
    let Json(req) = payload.map_err(|e| ApiError::from(e).with_trace_id(Some(ctx.trace_id)))?;
    let resp = state.init.initiate(&ctx, &req).await.map_err(|e| e.into_api(ctx.trace_id))?;
    Ok(Json(resp))
}

pub async fn payment_status(
    State(state): State<AppState>,
    SecurityCtxExtractor(ctx): SecurityCtxExtractor,
    Path(order_id): Path<i64>,
) -> ApiResult<Json<PaymentStatusResponse>> {
    let trace_id = Some(ctx.trace_id);
    let order = state
        .store
        .get_order(order_id)
        .await
        .map_err(|e| ApiError::from(e).with_trace_id(trace_id))?
        .ok_or(ApiError::NotFound { code: "order_not_found", trace_id, message: Some("Order not found".into()) })?;
    ensure_owner_or_admin(&ctx, order.user_id).map_err(|e| ApiError::from(e).with_trace_id(trace_id))?;
    Ok(Json(PaymentStatusResponse {
        order_id: order.id,
        status: order.status,
        payment_id: order.payment_id,
        is_paid: order.status != OrderStatus::NotPaid,
    }))
}
