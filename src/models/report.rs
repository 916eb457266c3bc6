// src/models/report.rs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::models::movement::{Direction, MovementType};

// Filtros do relatório de movimentações. Todos opcionais.
// Datas são dias inteiros e inclusivos (UTC).
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct MovementFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub product_id: Option<Uuid>,
    /// Trecho do nome do produto (sem diferenciar maiúsculas).
    pub product_name: Option<String>,
    pub customer_id: Option<Uuid>,
    pub direction: Option<Direction>,
    pub movement_type: Option<MovementType>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DirectionTotals {
    pub count: u64,
    /// Soma das quantidades. No ajuste é a soma dos deltas (com sinal).
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TypeCount {
    pub movement_type: MovementType,
    pub count: u64,
}

// Resumo de entradas e saídas (o antigo gráfico de movimentações).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MovementSummary {
    pub total_movements: u64,
    pub inflow: DirectionTotals,
    pub outflow: DirectionTotals,
    pub adjustment: DirectionTotals,
    /// Unidades que entraram, contando ajustes positivos.
    pub units_in: i64,
    /// Unidades que saíram, contando ajustes negativos.
    pub units_out: i64,
    pub net_delta: i64,
    pub by_type: Vec<TypeCount>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StockStatus {
    Ok,
    Low,
    Empty,
}

// Posição de estoque
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockPositionEntry {
    pub product_id: Uuid,
    pub name: String,
    /// Código de barras quando existir, senão o código interno.
    pub code: String,
    pub current_stock: i64,
    pub min_stock: i64,
    pub status: StockStatus,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct StockPositionQuery {
    pub status: Option<StockStatus>,
}
