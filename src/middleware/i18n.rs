// src/middleware/i18n.rs

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap};

// Idiomas suportados nas mensagens de erro.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    Pt,
    #[default]
    En,
}

impl Locale {
    /// "pt-BR,pt;q=0.9,en;q=0.8" -> Pt. Idiomas desconhecidos caem no padrão.
    pub fn from_accept_language(header_str: &str) -> Self {
        accept_language::parse(header_str)
            .iter()
            .find_map(|tag| match tag.split('-').next().unwrap_or(tag.as_str()) {
                "pt" => Some(Locale::Pt),
                "en" => Some(Locale::En),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|header_value| header_value.to_str().ok())
            .map(Locale::from_accept_language)
            .unwrap_or_default()
    }
}

impl<S> FromRequestParts<S> for Locale
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        Ok(Locale::from_headers(&parts.headers))
    }
}
