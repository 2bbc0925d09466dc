use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::{http::StatusCode, Json};
use serde::Deserialize;

use common_http_errors::{ApiError, ApiResult};
use common_orders::{BuyerProfile, Order, OrderDetail, OrderItemRequest};
use common_security::{ensure_admin, ensure_owner_or_admin, SecurityCtxExtractor};

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub order: BuyerProfile,
    pub products: Vec<OrderItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersParams {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 { 100 }

pub const MAX_LIST_LIMIT: i64 = 1000;

pub async fn create_order(
    State(state): State<AppState>,
    SecurityCtxExtractor(ctx): SecurityCtxExtractor,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<OrderDetail>)> {
    let Json(req) = payload.map_err(|e| ApiError::from(e).with_trace_id(Some(ctx.trace_id)))?;
    let detail = state
        .creation
        .create(&req.order, &req.products, ctx.user_id)
        .await
        .map_err(|e| ApiError::from(e).with_trace_id(Some(ctx.trace_id)))?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn get_order(
    State(state): State<AppState>,
    SecurityCtxExtractor(ctx): SecurityCtxExtractor,
    Path(order_id): Path<i64>,
) -> ApiResult<Json<OrderDetail>> {
    let trace_id = Some(ctx.trace_id);
    let detail = state
        .store
        .order_detail(order_id)
        .await
        .map_err(|e| ApiError::from(e).with_trace_id(trace_id))?
        .ok_or(ApiError::NotFound { code: "order_not_found", trace_id, message: None })?;
    ensure_owner_or_admin(&ctx, detail.order.user_id).map_err(|e| ApiError::from(e).with_trace_id(trace_id))?;
    Ok(Json(detail))
}

pub async fn list_orders(
    State(state): State<AppState>,
    SecurityCtxExtractor(ctx): SecurityCtxExtractor,
    Query(params): Query<ListOrdersParams>,
) -> ApiResult<Json<Vec<Order>>> {
    let trace_id = Some(ctx.trace_id);
    ensure_admin(&ctx).map_err(|e| ApiError::from(e).with_trace_id(trace_id))?;
    if params.skip < 0 || !(1..=MAX_LIST_LIMIT).contains(&params.limit) {
        return Err(ApiError::BadRequest {
            code: "invalid_request",
            trace_id,
            message: Some(format!("skip must be >= 0 and limit within 1..={MAX_LIST_LIMIT}")),
        });
    }
    let orders = state
        .store
        .list_orders(params.skip, params.limit)
        .await
        .map_err(|e| ApiError::from(e).with_trace_id(trace_id))?;
    Ok(Json(orders))
}
