// src/handlers/products.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::{i18n::Locale, license::LicensedTenant},
    models::inventory::{NewProduct, Product, ProductPatch},
};

// POST /api/products
#[utoipa::path(
    post,
    path = "/api/products",
    tag = "Products",
    request_body = NewProduct,
    responses(
        (status = 201, description = "Produto cadastrado", body = Product),
        (status = 400, description = "Dados inválidos")
    ),
    security(("license_key" = [], "cnpj" = []))
)]
pub async fn create_product(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: LicensedTenant,
    Json(payload): Json<NewProduct>,
) -> Result<impl IntoResponse, ApiError> {
    // A validação do payload acontece no serviço
    let product = app_state
        .catalog_service
        .register_product(&tenant.tenant_id, payload)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale))?;

    Ok((StatusCode::CREATED, Json(product)))
}

// GET /api/products
#[utoipa::path(
    get,
    path = "/api/products",
    tag = "Products",
    responses(
        (status = 200, description = "Produtos da loja, por nome", body = Vec<Product>)
    ),
    security(("license_key" = [], "cnpj" = []))
)]
pub async fn list_products(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: LicensedTenant,
) -> Result<impl IntoResponse, ApiError> {
    let products = app_state
        .catalog_service
        .list_products(&tenant.tenant_id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(products)))
}

// PATCH /api/products/{id}
#[utoipa::path(
    patch,
    path = "/api/products/{id}",
    tag = "Products",
    request_body = ProductPatch,
    params(("id" = Uuid, Path, description = "ID do produto")),
    responses(
        (status = 200, description = "Produto atualizado (o saldo não muda por aqui)", body = Product),
        (status = 404, description = "Produto não encontrado")
    ),
    security(("license_key" = [], "cnpj" = []))
)]
pub async fn update_product(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: LicensedTenant,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<ProductPatch>,
) -> Result<impl IntoResponse, ApiError> {
    let product = app_state
        .catalog_service
        .update_product(&tenant.tenant_id, product_id, payload)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(product)))
}
