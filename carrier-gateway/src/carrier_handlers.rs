use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use common_http_errors::{ApiError, ApiResult};
use common_security::{ensure_admin, SecurityCtxExtractor};

use crate::model::{
    City, DeliveryPoint, DocumentKind, DocumentStatus, PrintJob, RegisteredShipment, ShipmentPatch, ShipmentSummary,
    Tariff, TariffRequest,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterShipmentRequest {
    #[serde(default)]
    pub shipment_point: Option<String>,
    pub delivery_point: String,
}

#[derive(Debug, Deserialize)]
pub struct CityQuery {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct DeliveryPointQuery {
    pub city_code: i64,
    #[serde(default, rename = "type")]
    pub point_type: Option<String>,
}

pub async fn register_shipment(
    State(state): State<AppState>,
    SecurityCtxExtractor(ctx): SecurityCtxExtractor,
    Path(order_id): Path<i64>,
    payload: Result<Json<RegisterShipmentRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<RegisteredShipment>)> {
    ensure_admin(&ctx).map_err(|e| ApiError::from(e).with_trace_id(Some(ctx.trace_id)))?;
    let Json(req) = payload.map_err(|e| ApiError::from(e).with_trace_id(Some(ctx.trace_id)))?;
    let registered = state
        .shipments
        .register(order_id, req.shipment_point.as_deref(), &req.delivery_point)
        .await
        .map_err(|e| e.into_api(ctx.trace_id))?;
    Ok((StatusCode::CREATED, Json(registered)))
}

pub async fn update_shipment(
    State(state): State<AppState>,
    SecurityCtxExtractor(ctx): SecurityCtxExtractor,
    Path(order_id): Path<i64>,
    payload: Result<Json<ShipmentPatch>, JsonRejection>,
) -> ApiResult<Json<ShipmentSummary>> {
    ensure_admin(&ctx).map_err(|e| ApiError::from(e).with_trace_id(Some(ctx.trace_id)))?;
    let Json(patch) = payload.map_err(|e| ApiError::from(e).with_trace_id(Some(ctx.trace_id)))?;
    let summary = state.shipments.update(order_id, patch).await.map_err(|e| e.into_api(ctx.trace_id))?;
    Ok(Json(summary))
}

pub async fn shipment_info(
    State(state): State<AppState>,
    SecurityCtxExtractor(ctx): SecurityCtxExtractor,
    Path(order_id): Path<i64>,
) -> ApiResult<Json<ShipmentSummary>> {
    ensure_admin(&ctx).map_err(|e| ApiError::from(e).with_trace_id(Some(ctx.trace_id)))?;
    let summary = state.shipments.info(order_id).await.map_err(|e| e.into_api(ctx.trace_id))?;
    Ok(Json(summary))
}

pub async fn request_document(
    State(state): State<AppState>,
    SecurityCtxExtractor(ctx): SecurityCtxExtractor,
    Path((order_id, kind)): Path<(i64, DocumentKind)>,
) -> ApiResult<(StatusCode, Json<PrintJob>)> {
    ensure_admin(&ctx).map_err(|e| ApiError::from(e).with_trace_id(Some(ctx.trace_id)))?;
    let job = state.shipments.request_document(order_id, kind).await.map_err(|e| e.into_api(ctx.trace_id))?;
    Ok((StatusCode::ACCEPTED, Json(job)))
}

pub async fn document_status(
    State(state): State<AppState>,
    SecurityCtxExtractor(ctx): SecurityCtxExtractor,
    Path((kind, print_id)): Path<(DocumentKind, String)>,
) -> ApiResult<Json<DocumentStatus>> {
    ensure_admin(&ctx).map_err(|e| ApiError::from(e).with_trace_id(Some(ctx.trace_id)))?;
    let status = state.client.document_status(kind, &print_id).await.map_err(|e| e.into_api(ctx.trace_id))?;
    Ok(Json(status))
}

pub async fn download_document(
    State(state): State<AppState>,
    SecurityCtxExtractor(ctx): SecurityCtxExtractor,
    Path((kind, print_id)): Path<(DocumentKind, String)>,
) -> ApiResult<Response> {
    ensure_admin(&ctx).map_err(|e| ApiError::from(e).with_trace_id(Some(ctx.trace_id)))?;
    let pdf = state.client.download_document(kind, &print_id).await.map_err(|e| e.into_api(ctx.trace_id))?;
    let disposition = format!("inline; filename=\"{}-{}.pdf\"", kind.as_str(), print_id.trim());
    let mut resp = (StatusCode::OK, pdf).into_response();
    resp.headers_mut().insert(header::CONTENT_TYPE, HeaderValue::from_static("application/pdf"));
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        resp.headers_mut().insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(resp)
}

pub async fn suggest_cities(
    State(state): State<AppState>,
    SecurityCtxExtractor(ctx): SecurityCtxExtractor,
    query: Result<Query<CityQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<City>>> {
    let Query(q) = query.map_err(|e| ApiError::from(e).with_trace_id(Some(ctx.trace_id)))?;
    let cities = state.client.suggest_cities(&q.name).await.map_err(|e| e.into_api(ctx.trace_id))?;
    Ok(Json(cities))
}

pub async fn delivery_points(
    State(state): State<AppState>,
    SecurityCtxExtractor(ctx): SecurityCtxExtractor,
    query: Result<Query<DeliveryPointQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<DeliveryPoint>>> {
    let Query(q) = query.map_err(|e| ApiError::from(e).with_trace_id(Some(ctx.trace_id)))?;
    let points = state
        .client
        .delivery_points(q.city_code, q.point_type.as_deref())
        .await
        .map_err(|e| e.into_api(ctx.trace_id))?;
    Ok(Json(points))
}

pub async fn calculate_tariffs(
    State(state): State<AppState>,
    SecurityCtxExtractor(ctx): SecurityCtxExtractor,
    payload: Result<Json<TariffRequest>, JsonRejection>,
) -> ApiResult<Json<Vec<Tariff>>> {
    let Json(req) = payload.map_err(|e| ApiError::from(e).with_trace_id(Some(ctx.trace_id)))?;
    let tariffs = state.client.calculate_tariffs(&req).await.map_err(|e| e.into_api(ctx.trace_id))?;
    Ok(Json(tariffs))
}
