// src/models/movement.rs

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::error::AppError;

/// Quem registrou a movimentação quando o chamador não informa.
pub const SYSTEM_ACTOR: &str = "system";

// --- Tipos de Movimentação ---
// Conjunto fechado. Os aliases em português aceitam os nomes usados pelas
// telas antigas ("venda", "compra", ...).
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, PartialOrd, Ord, ToSchema,
)]
#[sqlx(type_name = "movement_type", rename_all = "snake_case")] // Banco
#[serde(rename_all = "kebab-case")] // JSON
pub enum MovementType {
    #[serde(alias = "venda")]
    Sale,
    #[serde(alias = "extravio")]
    Loss,
    #[serde(alias = "outros", alias = "other_outflow")]
    OtherOutflow,
    #[serde(alias = "compra")]
    Purchase,
    #[serde(alias = "devolucao")]
    Return,
    #[serde(alias = "ajuste")]
    Adjustment,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inflow,
    Outflow,
    Adjustment,
}

/// Linha da tabela de classificação.
/// `sign == None` significa que o sinal vem da própria quantidade (ajuste).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub direction: Direction,
    pub sign: Option<i64>,
}

impl MovementType {
    pub const fn classify(self) -> Classification {
        match self {
            MovementType::Sale | MovementType::Loss | MovementType::OtherOutflow => Classification {
                direction: Direction::Outflow,
                sign: Some(-1),
            },
            MovementType::Purchase | MovementType::Return => Classification {
                direction: Direction::Inflow,
                sign: Some(1),
            },
            MovementType::Adjustment => Classification {
                direction: Direction::Adjustment,
                sign: None,
            },
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            MovementType::Sale => "sale",
            MovementType::Loss => "loss",
            MovementType::OtherOutflow => "other-outflow",
            MovementType::Purchase => "purchase",
            MovementType::Return => "return",
            MovementType::Adjustment => "adjustment",
        }
    }

    /// Valida a quantidade informada e devolve o delta com sinal.
    pub fn delta_for(self, quantity: i64) -> Result<i64, AppError> {
        match self.classify().sign {
            Some(sign) => {
                if quantity <= 0 {
                    return Err(AppError::InvalidQuantity(format!(
                        "'{}' exige quantidade maior que zero, recebido {}",
                        self, quantity
                    )));
                }
                Ok(sign * quantity)
            }
            None => {
                if quantity == 0 {
                    return Err(AppError::InvalidQuantity("ajuste com quantidade zero".into()));
                }
                Ok(quantity)
            }
        }
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementType {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let kind = match raw.trim().to_lowercase().as_str() {
            "sale" | "venda" => MovementType::Sale,
            "loss" | "extravio" => MovementType::Loss,
            "other-outflow" | "other_outflow" | "outros" => MovementType::OtherOutflow,
            "purchase" | "compra" => MovementType::Purchase,
            "return" | "devolucao" => MovementType::Return,
            "adjustment" | "ajuste" => MovementType::Adjustment,
            _ => return Err(AppError::InvalidMovementType(raw.to_string())),
        };
        Ok(kind)
    }
}

// --- MOVIMENTAÇÃO (Livro-razão) ---
// Imutável depois de gravada. Nome do produto e do cliente são cópias do
// momento da movimentação, para o histórico sobreviver a edições.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Movement {
    pub id: Uuid,
    pub tenant_id: String,
    pub product_id: Uuid,
    pub product_name: String,
    pub movement_type: MovementType,
    /// Sempre positiva, exceto no ajuste (delta com sinal).
    pub quantity: i64,
    pub customer_id: Option<Uuid>,
    pub customer_name: Option<String>,
    pub note: Option<String>,
    pub actor: String,
    /// Saldo do produto logo após esta movimentação.
    pub resulting_stock: i64,
    pub created_at: DateTime<Utc>,
}

impl Movement {
    pub fn signed_delta(&self) -> i64 {
        match self.movement_type.classify().sign {
            Some(sign) => sign * self.quantity,
            None => self.quantity,
        }
    }

    pub fn direction(&self) -> Direction {
        self.movement_type.classify().direction
    }

    /// Entrada ou saída pelo efeito real no saldo: ajuste positivo conta como entrada.
    pub fn flow(&self) -> Direction {
        if self.signed_delta() >= 0 {
            Direction::Inflow
        } else {
            Direction::Outflow
        }
    }
}

// O que o motor entrega para a porta de persistência gravar.
// `id` e `created_at` são atribuídos pelo armazenamento.
#[derive(Debug, Clone)]
pub struct NewMovement {
    pub tenant_id: String,
    pub product_id: Uuid,
    pub product_name: String,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub customer_id: Option<Uuid>,
    pub customer_name: Option<String>,
    pub note: Option<String>,
    pub actor: String,
    pub resulting_stock: i64,
}

/// Entrada do `apply_movement`. O tipo chega cru e é validado pelo motor.
#[derive(Debug, Clone)]
pub struct MovementRequest {
    pub product_id: Uuid,
    pub movement_type: String,
    pub quantity: i64,
    pub customer_id: Option<Uuid>,
    pub note: Option<String>,
    pub actor: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MovementReceipt {
    pub movement_id: Uuid,
    pub new_stock: i64,
    pub movement: Movement,
}
