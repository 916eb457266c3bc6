// src/docs.rs

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::OpenApi;

use crate::handlers;
use crate::middleware::license::{CNPJ_HEADER, LICENSE_KEY_HEADER};
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- License ---
        handlers::license::activate,
        handlers::license::get_session,

        // --- Products ---
        handlers::products::create_product,
        handlers::products::list_products,
        handlers::products::update_product,

        // --- Customers ---
        handlers::customers::create_customer,
        handlers::customers::list_customers,
        handlers::customers::update_customer,

        // --- Movements ---
        handlers::movements::create_movement,
        handlers::movements::list_movements,

        // --- Reports ---
        handlers::reports::get_summary,
        handlers::reports::get_stock_position,
    ),
    components(
        schemas(
            // --- Inventory ---
            models::inventory::Product,
            models::inventory::NewProduct,
            models::inventory::ProductPatch,

            // --- Movements ---
            models::movement::MovementType,
            models::movement::Direction,
            models::movement::Movement,
            models::movement::MovementReceipt,
            handlers::movements::MovementPayload,

            // --- CRM ---
            models::crm::Customer,
            models::crm::NewCustomer,
            models::crm::CustomerPatch,

            // --- Reports ---
            models::report::MovementSummary,
            models::report::DirectionTotals,
            models::report::TypeCount,
            models::report::StockStatus,
            models::report::StockPositionEntry,

            // --- License ---
            models::tenancy::LicenseRejection,
            models::tenancy::LicenseStatus,
            models::tenancy::SessionInfo,
            handlers::license::ActivateLicensePayload,
        )
    ),
    tags(
        (name = "License", description = "Ativação de licença e sessão"),
        (name = "Products", description = "Cadastro de produtos"),
        (name = "Customers", description = "Cadastro de clientes"),
        (name = "Movements", description = "Livro-razão de movimentações de estoque"),
        (name = "Reports", description = "Relatórios de movimentação e posição de estoque")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "license_key",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(LICENSE_KEY_HEADER))),
        );
        components.add_security_scheme(
            "cnpj",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(CNPJ_HEADER))),
        );
    }
}
