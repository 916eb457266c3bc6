// src/services/report_service.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc};

use crate::{
    common::error::AppError,
    db::store::LedgerStore,
    models::{
        inventory::Product,
        movement::{Direction, Movement, MovementType},
        report::{
            DirectionTotals, MovementFilter, MovementSummary, StockPositionEntry, StockStatus,
            TypeCount,
        },
    },
};

impl MovementFilter {
    /// Limites de data convertidos para instantes UTC (dias inteiros, inclusivos).
    pub fn time_bounds(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        let from = self.from.map(|day| day.and_time(NaiveTime::MIN).and_utc());
        let to = self
            .to
            .and_then(|day| day.and_hms_nano_opt(23, 59, 59, 999_999_999))
            .map(|end| end.and_utc());
        (from, to)
    }

    pub fn matches(&self, movement: &Movement) -> bool {
        let (from, to) = self.time_bounds();

        if from.is_some_and(|from| movement.created_at < from) {
            return false;
        }
        if to.is_some_and(|to| movement.created_at > to) {
            return false;
        }
        if self.product_id.is_some_and(|id| movement.product_id != id) {
            return false;
        }
        if self.customer_id.is_some_and(|id| movement.customer_id != Some(id)) {
            return false;
        }
        if self.direction.is_some_and(|d| movement.direction() != d) {
            return false;
        }
        if self.movement_type.is_some_and(|t| movement.movement_type != t) {
            return false;
        }
        if let Some(needle) = self.product_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            if !movement
                .product_name
                .to_lowercase()
                .contains(&needle.to_lowercase())
            {
                return false;
            }
        }
        true
    }
}

/// Fotografia do histórico de um tenant, mais recentes primeiro.
#[derive(Debug, Clone, Default)]
pub struct MovementHistory {
    movements: Vec<Movement>,
}

impl MovementHistory {
    pub fn new(movements: Vec<Movement>) -> Self {
        Self { movements }
    }

    /// Iterador preguiçoso sobre as movimentações que passam no filtro.
    /// Chamar de novo recomeça a varredura do início.
    pub fn matching<'a>(&'a self, filter: &'a MovementFilter) -> impl Iterator<Item = &'a Movement> + 'a {
        self.movements.iter().filter(move |m| filter.matches(m))
    }
}

// Somas em i128: cada saldo cabe em i64, mas a soma do histórico pode não caber.
#[derive(Default)]
struct WideTotals {
    count: u64,
    quantity: i128,
}

fn narrow(total: i128) -> Result<i64, AppError> {
    i64::try_from(total).map_err(|_| {
        AppError::InvalidQuantity("total do resumo fora do limite; restrinja o período do filtro".into())
    })
}

impl WideTotals {
    fn narrow(self) -> Result<DirectionTotals, AppError> {
        Ok(DirectionTotals {
            count: self.count,
            quantity: narrow(self.quantity)?,
        })
    }
}

pub fn summarize<'a>(movements: impl IntoIterator<Item = &'a Movement>) -> Result<MovementSummary, AppError> {
    let mut total_movements = 0u64;
    let mut by_type: BTreeMap<MovementType, u64> = BTreeMap::new();
    let (mut inflow, mut outflow, mut adjustment) =
        (WideTotals::default(), WideTotals::default(), WideTotals::default());
    let (mut units_in, mut units_out, mut net_delta) = (0i128, 0i128, 0i128);

    for movement in movements {
        total_movements += 1;
        *by_type.entry(movement.movement_type).or_default() += 1;

        let totals = match movement.direction() {
            Direction::Inflow => &mut inflow,
            Direction::Outflow => &mut outflow,
            Direction::Adjustment => &mut adjustment,
        };
        totals.count += 1;
        totals.quantity += i128::from(movement.quantity);

        let delta = i128::from(movement.signed_delta());
        match movement.flow() {
            Direction::Outflow => units_out -= delta,
            _ => units_in += delta,
        }
        net_delta += delta;
    }

    Ok(MovementSummary {
        total_movements,
        inflow: inflow.narrow()?,
        outflow: outflow.narrow()?,
        adjustment: adjustment.narrow()?,
        units_in: narrow(units_in)?,
        units_out: narrow(units_out)?,
        net_delta: narrow(net_delta)?,
        by_type: by_type
            .into_iter()
            .map(|(movement_type, count)| TypeCount { movement_type, count })
            .collect(),
    })
}

pub fn stock_status(product: &Product) -> StockStatus {
    if product.current_stock == 0 {
        StockStatus::Empty
    } else if product.current_stock <= product.min_stock {
        StockStatus::Low
    } else {
        StockStatus::Ok
    }
}

pub fn stock_position(products: &[Product], status: Option<StockStatus>) -> Vec<StockPositionEntry> {
    products
        .iter()
        .map(|p| StockPositionEntry {
            product_id: p.id,
            name: p.name.clone(),
            code: p
                .barcode
                .clone()
                .filter(|b| !b.trim().is_empty())
                .unwrap_or_else(|| p.code.clone()),
            current_stock: p.current_stock,
            min_stock: p.min_stock,
            status: stock_status(p),
        })
        .filter(|entry| status.is_none_or(|s| entry.status == s))
        .collect()
}

// Relatórios só leem. Nada aqui abre transação.
#[derive(Clone)]
pub struct ReportService {
    store: Arc<dyn LedgerStore>,
}

impl ReportService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Carrega o histórico já recortado pelas datas do filtro.
    pub async fn history(&self, tenant_id: &str, filter: &MovementFilter) -> Result<MovementHistory, AppError> {
        let (from, to) = filter.time_bounds();
        let movements = self.store.list_movements(tenant_id, from, to).await?;
        Ok(MovementHistory::new(movements))
    }

    pub async fn movements(&self, tenant_id: &str, filter: &MovementFilter) -> Result<Vec<Movement>, AppError> {
        let history = self.history(tenant_id, filter).await?;
        Ok(history.matching(filter).cloned().collect())
    }

    pub async fn summary(&self, tenant_id: &str, filter: &MovementFilter) -> Result<MovementSummary, AppError> {
        let history = self.history(tenant_id, filter).await?;
        summarize(history.matching(filter))
    }

    pub async fn stock(
        &self,
        tenant_id: &str,
        status: Option<StockStatus>,
    ) -> Result<Vec<StockPositionEntry>, AppError> {
        let products = self.store.list_products(tenant_id).await?;
        Ok(stock_position(&products, status))
    }
}
