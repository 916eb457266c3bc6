// src/handlers/movements.rs

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{i18n::Locale, license::LicensedTenant},
    models::{
        movement::{Movement, MovementReceipt, MovementRequest},
        report::MovementFilter,
    },
};

// ---
// Payload: RegisterMovement
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MovementPayload {
    pub product_id: Uuid,

    /// sale, loss, other-outflow, purchase, return ou adjustment.
    #[validate(length(min = 1, message = "O tipo de movimentação é obrigatório."))]
    pub movement_type: String,

    /// Positiva; no ajuste, o delta com sinal.
    pub quantity: i64,

    pub customer_id: Option<Uuid>,

    #[validate(length(max = 500, message = "A observação pode ter no máximo 500 caracteres."))]
    pub note: Option<String>,

    pub actor: Option<String>,
}

impl From<MovementPayload> for MovementRequest {
    fn from(payload: MovementPayload) -> Self {
        MovementRequest {
            product_id: payload.product_id,
            movement_type: payload.movement_type,
            quantity: payload.quantity,
            customer_id: payload.customer_id,
            note: payload.note,
            actor: payload.actor,
        }
    }
}

// POST /api/movements
#[utoipa::path(
    post,
    path = "/api/movements",
    tag = "Movements",
    request_body = MovementPayload,
    responses(
        (status = 201, description = "Movimentação registrada", body = MovementReceipt),
        (status = 400, description = "Tipo ou quantidade inválidos"),
        (status = 404, description = "Produto ou cliente não encontrado"),
        (status = 409, description = "Conflito de escrita persistente"),
        (status = 422, description = "Estoque insuficiente")
    ),
    security(("license_key" = [], "cnpj" = []))
)]
pub async fn create_movement(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: LicensedTenant,
    Json(payload): Json<MovementPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale))?;

    let receipt = app_state
        .ledger
        .apply_movement(&tenant.tenant_id, payload.into())
        .await
        .map_err(|app_err| app_err.to_api_error(&locale))?;

    Ok((StatusCode::CREATED, Json(receipt)))
}

// GET /api/movements
#[utoipa::path(
    get,
    path = "/api/movements",
    tag = "Movements",
    params(MovementFilter),
    responses(
        (status = 200, description = "Histórico filtrado, mais recentes primeiro", body = Vec<Movement>)
    ),
    security(("license_key" = [], "cnpj" = []))
)]
pub async fn list_movements(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: LicensedTenant,
    Query(filter): Query<MovementFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let movements = app_state
        .report_service
        .movements(&tenant.tenant_id, &filter)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(movements)))
}
