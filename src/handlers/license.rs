// src/handlers/license.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{i18n::Locale, license::LicenseCredentials},
    models::tenancy::{LicenseStatus, SessionInfo},
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivateLicensePayload {
    #[validate(length(min = 1, message = "O CNPJ é obrigatório."))]
    pub cnpj: String,
    #[validate(length(min = 1, message = "A chave de licença é obrigatória."))]
    pub key: String,
}

// POST /api/license/activate
#[utoipa::path(
    post,
    path = "/api/license/activate",
    tag = "License",
    request_body = ActivateLicensePayload,
    responses(
        (status = 200, description = "Situação da licença (valid=false traz o motivo)", body = LicenseStatus),
        (status = 400, description = "CNPJ ou chave em branco")
    )
)]
pub async fn activate(
    State(app_state): State<AppState>,
    locale: Locale,
    Json(payload): Json<ActivateLicensePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale))?;

    let status = app_state
        .license_service
        .verify(&payload.cnpj, &payload.key)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(status)))
}

// GET /api/session
#[utoipa::path(
    get,
    path = "/api/session",
    tag = "License",
    responses(
        (status = 200, description = "Tenant ativo e se a sessão está autorizada", body = SessionInfo)
    )
)]
pub async fn get_session(
    State(app_state): State<AppState>,
    locale: Locale,
    credentials: LicenseCredentials,
) -> Result<impl IntoResponse, ApiError> {
    let session = app_state
        .license_service
        .session(credentials.cnpj.as_deref(), credentials.key.as_deref())
        .await
        .map_err(|app_err| app_err.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(session)))
}
