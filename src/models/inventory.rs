// src/models/inventory.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Alerta padrão de estoque mínimo quando o cadastro não informa.
pub const DEFAULT_MIN_STOCK: i64 = 5;

// --- Produtos ---
// `current_stock` só muda pelo livro-razão (StockLedger::apply_movement).
// `version` é incrementado a cada gravação de saldo (concorrência otimista).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub tenant_id: String,
    pub code: String,
    pub name: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub barcode: Option<String>,
    pub description: Option<String>,
    pub current_stock: i64,
    pub min_stock: i64,
    pub cost_price: Decimal,
    pub sale_price: Decimal,
    #[serde(skip_serializing)]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---
// Validação Customizada
// ---
pub fn validate_not_negative(val: &Decimal) -> Result<(), ValidationError> {
    if val.is_sign_negative() {
        let mut err = ValidationError::new("range");
        err.add_param("min".into(), &0.0);
        err.message = Some("O valor não pode ser negativo.".into());
        return Err(err);
    }
    Ok(())
}

pub fn validate_not_blank(val: &str) -> Result<(), ValidationError> {
    if val.trim().is_empty() {
        let mut err = ValidationError::new("length");
        err.message = Some("O nome é obrigatório.".into());
        return Err(err);
    }
    Ok(())
}

// Cadastro de produto. O estoque inicial vira um ajuste no livro-razão.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    #[validate(custom(function = "validate_not_blank"))]
    pub name: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub barcode: Option<String>,
    pub description: Option<String>,

    #[validate(range(min = 0, message = "O estoque inicial não pode ser negativo."))]
    #[serde(default)]
    pub initial_stock: i64,

    #[validate(range(min = 0, message = "O estoque mínimo não pode ser negativo."))]
    pub min_stock: Option<i64>,

    #[validate(custom(function = "validate_not_negative"))]
    #[serde(default)]
    pub cost_price: Decimal,

    #[validate(custom(function = "validate_not_negative"))]
    #[serde(default)]
    pub sale_price: Decimal,
}

// Dados para inserir um produto novo (o código já vem alocado).
#[derive(Debug, Clone)]
pub struct NewProductRecord {
    pub tenant_id: String,
    pub code: String,
    pub name: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub barcode: Option<String>,
    pub description: Option<String>,
    pub current_stock: i64,
    pub min_stock: i64,
    pub cost_price: Decimal,
    pub sale_price: Decimal,
}

// Edição administrativa: só campos descritivos e preços. Saldo não entra aqui.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    #[validate(custom(function = "validate_not_blank"))]
    pub name: Option<String>,
    pub size: Option<String>,
    pub color: Option<String>,
    pub barcode: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0, message = "O estoque mínimo não pode ser negativo."))]
    pub min_stock: Option<i64>,
    #[validate(custom(function = "validate_not_negative"))]
    pub cost_price: Option<Decimal>,
    #[validate(custom(function = "validate_not_negative"))]
    pub sale_price: Option<Decimal>,
}

impl ProductPatch {
    pub fn apply_to(&self, product: &mut Product) {
        if let Some(name) = &self.name {
            product.name = name.clone();
        }
        if let Some(size) = &self.size {
            product.size = Some(size.clone());
        }
        if let Some(color) = &self.color {
            product.color = Some(color.clone());
        }
        if let Some(barcode) = &self.barcode {
            product.barcode = Some(barcode.clone());
        }
        if let Some(description) = &self.description {
            product.description = Some(description.clone());
        }
        if let Some(min_stock) = self.min_stock {
            product.min_stock = min_stock;
        }
        if let Some(cost_price) = self.cost_price {
            product.cost_price = cost_price;
        }
        if let Some(sale_price) = self.sale_price {
            product.sale_price = sale_price;
        }
    }
}

/// Sequências por licença (códigos "000001", "000002", ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeKind {
    Product,
    Customer,
}

impl CodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CodeKind::Product => "product",
            CodeKind::Customer => "customer",
        }
    }
}

pub fn format_code(value: i64) -> String {
    format!("{:06}", value)
}
