// src/middleware/license.rs

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};

use crate::{common::error::ApiError, config::AppState, middleware::i18n::Locale};

// Cabeçalhos da sessão licenciada
pub const LICENSE_KEY_HEADER: &str = "x-license-key";
pub const CNPJ_HEADER: &str = "x-cnpj";

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Credenciais como vieram na requisição, sem verificação.
#[derive(Debug, Clone, Default)]
pub struct LicenseCredentials {
    pub cnpj: Option<String>,
    pub key: Option<String>,
}

impl<S> FromRequestParts<S> for LicenseCredentials
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(LicenseCredentials {
            cnpj: header_value(parts, CNPJ_HEADER),
            key: header_value(parts, LICENSE_KEY_HEADER),
        })
    }
}

/// O guardião das rotas de negócio: só passa com licença válida.
/// `tenant_id` é o CNPJ normalizado da licença.
#[derive(Debug, Clone)]
pub struct LicensedTenant {
    pub tenant_id: String,
    pub company_name: String,
}

impl<S> FromRequestParts<S> for LicensedTenant
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let locale = Locale::from_headers(&parts.headers);

        let cnpj = header_value(parts, CNPJ_HEADER).unwrap_or_default();
        let key = header_value(parts, LICENSE_KEY_HEADER).unwrap_or_default();

        // 401 sem credenciais, 403 com licença recusada
        let license = app_state
            .license_service
            .authorize(&cnpj, &key)
            .await
            .map_err(|e| e.to_api_error(&locale))?;

        Ok(LicensedTenant {
            tenant_id: license.tenant_id,
            company_name: license.company_name,
        })
    }
}
