// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::middleware::i18n::Locale;
use crate::models::tenancy::LicenseRejection;

// Erros de domínio e de infraestrutura. A camada HTTP converte para `ApiError`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Produto não encontrado")]
    ProductNotFound,

    #[error("Cliente não encontrado")]
    CustomerNotFound,

    #[error("Tipo de movimentação inválido: '{0}'")]
    InvalidMovementType(String),

    #[error("Quantidade inválida: {0}")]
    InvalidQuantity(String),

    #[error("Estoque insuficiente (disponível: {available}, solicitado: {requested})")]
    InsufficientStock { available: i64, requested: i64 },

    #[error("Conflito de escrita concorrente no produto")]
    Conflict,

    #[error("Registro pertence a outra licença")]
    TenantMismatch,

    #[error("Licença não informada")]
    LicenseRequired,

    #[error("Licença rejeitada: {0}")]
    LicenseRejected(LicenseRejection),

    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    // `anyhow::Error` carrega o contexto de qualquer falha inesperada.
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),
}

impl AppError {
    /// Só conflitos de escrita são repetidos pelo motor do livro-razão.
    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::Conflict)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidMovementType(_) | AppError::InvalidQuantity(_) => StatusCode::BAD_REQUEST,
            // Não revelamos a existência de registros de outra licença.
            AppError::ProductNotFound | AppError::CustomerNotFound | AppError::TenantMismatch => {
                StatusCode::NOT_FOUND
            }
            AppError::InsufficientStock { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Conflict => StatusCode::CONFLICT,
            AppError::LicenseRequired => StatusCode::UNAUTHORIZED,
            AppError::LicenseRejected(_) => StatusCode::FORBIDDEN,
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn localized_message(&self, locale: Locale) -> String {
        match (self, locale) {
            (AppError::ValidationError(_), Locale::Pt) => "Um ou mais campos são inválidos.".into(),
            (AppError::ValidationError(_), Locale::En) => "One or more fields are invalid.".into(),
            (AppError::ProductNotFound | AppError::TenantMismatch, Locale::Pt) => "Produto não encontrado.".into(),
            (AppError::ProductNotFound | AppError::TenantMismatch, Locale::En) => "Product not found.".into(),
            (AppError::CustomerNotFound, Locale::Pt) => "Cliente não encontrado.".into(),
            (AppError::CustomerNotFound, Locale::En) => "Customer not found.".into(),
            (AppError::InvalidMovementType(kind), Locale::Pt) => {
                format!("Tipo de movimentação inválido: '{}'.", kind)
            }
            (AppError::InvalidMovementType(kind), Locale::En) => format!("Invalid movement type: '{}'.", kind),
            (AppError::InvalidQuantity(reason), Locale::Pt) => format!("Quantidade inválida: {}.", reason),
            (AppError::InvalidQuantity(reason), Locale::En) => format!("Invalid quantity: {}.", reason),
            (AppError::InsufficientStock { available, requested }, Locale::Pt) => format!(
                "Estoque insuficiente para realizar esta operação (disponível: {}, solicitado: {}).",
                available, requested
            ),
            (AppError::InsufficientStock { available, requested }, Locale::En) => format!(
                "Insufficient stock for this operation (available: {}, requested: {}).",
                available, requested
            ),
            (AppError::Conflict, Locale::Pt) => {
                "O produto foi alterado por outra operação. Tente novamente.".into()
            }
            (AppError::Conflict, Locale::En) => "The product was changed by another operation. Please retry.".into(),
            (AppError::LicenseRequired, Locale::Pt) => "Ative a sua licença para acessar o sistema.".into(),
            (AppError::LicenseRequired, Locale::En) => "Activate your license to access the system.".into(),
            (AppError::LicenseRejected(reason), Locale::Pt) => format!("Licença inválida: {}.", reason.as_str()),
            (AppError::LicenseRejected(reason), Locale::En) => format!("Invalid license: {}.", reason.as_str()),
            (AppError::DatabaseError(_) | AppError::InternalServerError(_), Locale::Pt) => {
                "Ocorreu um erro inesperado.".into()
            }
            (AppError::DatabaseError(_) | AppError::InternalServerError(_), Locale::En) => {
                "An unexpected error occurred.".into()
            }
        }
    }

    /// Converte para a resposta HTTP no idioma do cliente.
    pub fn to_api_error(&self, locale: &Locale) -> ApiError {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Erro Interno do Servidor: {:?}", self);
        }

        let details = match self {
            AppError::ValidationError(errors) => {
                let mut details = serde_json::Map::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<Value> = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string())
                                .into()
                        })
                        .collect();
                    details.insert(field.to_string(), Value::Array(messages));
                }
                Some(Value::Object(details))
            }
            AppError::InsufficientStock { available, requested } => {
                Some(json!({ "available": available, "requested": requested }))
            }
            _ => None,
        };

        ApiError {
            status,
            error: self.localized_message(*locale),
            details,
        }
    }
}

// O erro que de fato vai para o cliente.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.details {
            Some(details) => json!({ "error": self.error, "details": details }),
            None => json!({ "error": self.error }),
        };
        (self.status, Json(body)).into_response()
    }
}

// Usado por extratores que não conhecem o idioma da requisição.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.to_api_error(&Locale::default()).into_response()
    }
}
