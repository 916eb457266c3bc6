// src/handlers/reports.rs

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::{i18n::Locale, license::LicensedTenant},
    models::report::{MovementFilter, MovementSummary, StockPositionEntry, StockPositionQuery},
};

// GET /api/reports/summary
#[utoipa::path(
    get,
    path = "/api/reports/summary",
    tag = "Reports",
    params(MovementFilter),
    responses(
        (status = 200, description = "Entradas, saídas e ajustes no período", body = MovementSummary)
    ),
    security(("license_key" = [], "cnpj" = []))
)]
pub async fn get_summary(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: LicensedTenant,
    Query(filter): Query<MovementFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = app_state
        .report_service
        .summary(&tenant.tenant_id, &filter)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(summary)))
}

// GET /api/reports/stock
#[utoipa::path(
    get,
    path = "/api/reports/stock",
    tag = "Reports",
    params(StockPositionQuery),
    responses(
        (status = 200, description = "Posição de estoque (ok, low, empty)", body = Vec<StockPositionEntry>)
    ),
    security(("license_key" = [], "cnpj" = []))
)]
pub async fn get_stock_position(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: LicensedTenant,
    Query(query): Query<StockPositionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let entries = app_state
        .report_service
        .stock(&tenant.tenant_id, query.status)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(entries)))
}
