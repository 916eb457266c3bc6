// src/routes.rs

use axum::{
    routing::{get, patch, post},
    Router,
};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{config::AppState, docs::ApiDoc, handlers};

pub fn build_router(app_state: AppState) -> Router {
    // Rotas públicas: sem licença
    let license_routes = Router::new()
        .route("/license/activate", post(handlers::license::activate))
        .route("/session", get(handlers::license::get_session));

    // O extrator LicensedTenant protege cada handler destas rotas
    let catalog_routes = Router::new()
        .route("/products"
               ,post(handlers::products::create_product)
               .get(handlers::products::list_products)
        )
        .route("/products/{id}", patch(handlers::products::update_product))
        .route("/customers"
               ,post(handlers::customers::create_customer)
               .get(handlers::customers::list_customers)
        )
        .route("/customers/{id}", patch(handlers::customers::update_customer));

    let ledger_routes = Router::new()
        .route("/movements"
               ,post(handlers::movements::create_movement)
               .get(handlers::movements::list_movements)
        )
        .route("/reports/summary", get(handlers::reports::get_summary))
        .route("/reports/stock", get(handlers::reports::get_stock_position));

    let api = Router::new()
        .route("/health", get(|| async { "OK" }))
        .merge(license_routes)
        .merge(catalog_routes)
        .merge(ledger_routes);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
