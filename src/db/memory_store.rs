// src/db/memory_store.rs

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::{LedgerStore, LedgerTx},
    models::{
        crm::{Customer, CustomerPatch, NewCustomerRecord},
        inventory::{CodeKind, NewProductRecord, Product, ProductPatch},
        movement::{Movement, NewMovement},
        tenancy::License,
    },
};

#[derive(Debug, Default)]
struct MemoryState {
    products: HashMap<Uuid, Product>,
    customers: HashMap<Uuid, Customer>,
    // Ordem de commit. O mais recente fica no fim.
    movements: Vec<Movement>,
    counters: HashMap<(String, CodeKind), i64>,
    licenses: HashMap<String, License>,
}

fn lock(state: &Mutex<MemoryState>) -> Result<MutexGuard<'_, MemoryState>, AppError> {
    state
        .lock()
        .map_err(|_| AppError::InternalServerError(anyhow::anyhow!("estado em memória envenenado")))
}

/// Armazenamento em processo com concorrência otimista.
///
/// As transações não seguram trava nenhuma: leem uma versão do produto,
/// acumulam as gravações e, no `commit`, conferem se a versão ainda é a
/// mesma. Se não for, o commit inteiro falha com `Conflict`.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_license(&self, license: License) -> Result<(), AppError> {
        lock(&self.state)?.licenses.insert(license.key.clone(), license);
        Ok(())
    }

    /// Lê um produto fora de transação, sem filtro de tenant.
    #[cfg(test)]
    pub fn product(&self, product_id: Uuid) -> Result<Option<Product>, AppError> {
        Ok(lock(&self.state)?.products.get(&product_id).cloned())
    }

    #[cfg(test)]
    pub fn movement_count(&self) -> Result<usize, AppError> {
        Ok(lock(&self.state)?.movements.len())
    }
}

struct StockWrite {
    expected_version: i64,
    new_stock: i64,
}

struct MemoryLedgerTx {
    state: Arc<Mutex<MemoryState>>,
    stock_writes: HashMap<Uuid, StockWrite>,
    inserted_products: Vec<Product>,
    movements: Vec<Movement>,
    finished: bool,
}

#[async_trait]
impl LedgerTx for MemoryLedgerTx {
    async fn read_product(&mut self, tenant_id: &str, product_id: Uuid) -> Result<Option<Product>, AppError> {
        let state = lock(&self.state)?;
        Ok(state
            .products
            .get(&product_id)
            .filter(|p| p.tenant_id == tenant_id)
            .cloned())
    }

    async fn write_product_stock(&mut self, product: &Product, new_stock: i64) -> Result<(), AppError> {
        self.stock_writes.insert(
            product.id,
            StockWrite {
                expected_version: product.version,
                new_stock,
            },
        );
        Ok(())
    }

    async fn append_movement(&mut self, movement: NewMovement) -> Result<Movement, AppError> {
        let movement = Movement {
            id: Uuid::new_v4(),
            tenant_id: movement.tenant_id,
            product_id: movement.product_id,
            product_name: movement.product_name,
            movement_type: movement.movement_type,
            quantity: movement.quantity,
            customer_id: movement.customer_id,
            customer_name: movement.customer_name,
            note: movement.note,
            actor: movement.actor,
            resulting_stock: movement.resulting_stock,
            created_at: Utc::now(),
        };
        self.movements.push(movement.clone());
        Ok(movement)
    }

    async fn insert_product(&mut self, product: NewProductRecord) -> Result<Product, AppError> {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            tenant_id: product.tenant_id,
            code: product.code,
            name: product.name,
            size: product.size,
            color: product.color,
            barcode: product.barcode,
            description: product.description,
            current_stock: product.current_stock,
            min_stock: product.min_stock,
            cost_price: product.cost_price,
            sale_price: product.sale_price,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        self.inserted_products.push(product.clone());
        Ok(product)
    }

    async fn commit(&mut self) -> Result<(), AppError> {
        if self.finished {
            return Err(AppError::InternalServerError(anyhow::anyhow!("transação já encerrada")));
        }
        self.finished = true;

        let mut state = lock(&self.state)?;

        // 1. Valida todas as versões antes de aplicar qualquer coisa
        for (product_id, write) in &self.stock_writes {
            let current = state.products.get(product_id).map(|p| p.version);
            if current != Some(write.expected_version) {
                return Err(AppError::Conflict);
            }
        }

        // 2. Aplica
        let now = Utc::now();
        for (product_id, write) in self.stock_writes.drain() {
            if let Some(product) = state.products.get_mut(&product_id) {
                product.current_stock = write.new_stock;
                product.version += 1;
                product.updated_at = now;
            }
        }
        for product in self.inserted_products.drain(..) {
            state.products.insert(product.id, product);
        }
        state.movements.append(&mut self.movements);

        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, AppError> {
        Ok(Box::new(MemoryLedgerTx {
            state: Arc::clone(&self.state),
            stock_writes: HashMap::new(),
            inserted_products: Vec::new(),
            movements: Vec::new(),
            finished: false,
        }))
    }

    async fn read_customer(&self, tenant_id: &str, customer_id: Uuid) -> Result<Option<Customer>, AppError> {
        let state = lock(&self.state)?;
        Ok(state
            .customers
            .get(&customer_id)
            .filter(|c| c.tenant_id == tenant_id)
            .cloned())
    }

    async fn next_code(&self, tenant_id: &str, kind: CodeKind) -> Result<i64, AppError> {
        let mut state = lock(&self.state)?;
        let counter = state.counters.entry((tenant_id.to_string(), kind)).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn update_product(
        &self,
        tenant_id: &str,
        product_id: Uuid,
        patch: &ProductPatch,
    ) -> Result<Option<Product>, AppError> {
        let mut state = lock(&self.state)?;
        let Some(product) = state
            .products
            .get_mut(&product_id)
            .filter(|p| p.tenant_id == tenant_id)
        else {
            return Ok(None);
        };

        patch.apply_to(product);
        product.updated_at = Utc::now();
        Ok(Some(product.clone()))
    }

    async fn insert_customer(&self, customer: NewCustomerRecord) -> Result<Customer, AppError> {
        let now = Utc::now();
        let customer = Customer {
            id: Uuid::new_v4(),
            tenant_id: customer.tenant_id,
            code: customer.code,
            name: customer.name,
            document: customer.document,
            email: customer.email,
            phone: customer.phone,
            notes: customer.notes,
            postal_code: customer.postal_code,
            street: customer.street,
            district: customer.district,
            city: customer.city,
            state: customer.state,
            created_at: now,
            updated_at: now,
        };
        lock(&self.state)?.customers.insert(customer.id, customer.clone());
        Ok(customer)
    }

    async fn update_customer(
        &self,
        tenant_id: &str,
        customer_id: Uuid,
        patch: &CustomerPatch,
    ) -> Result<Option<Customer>, AppError> {
        let mut state = lock(&self.state)?;
        let Some(customer) = state
            .customers
            .get_mut(&customer_id)
            .filter(|c| c.tenant_id == tenant_id)
        else {
            return Ok(None);
        };

        patch.apply_to(customer);
        customer.updated_at = Utc::now();
        Ok(Some(customer.clone()))
    }

    async fn list_products(&self, tenant_id: &str) -> Result<Vec<Product>, AppError> {
        let state = lock(&self.state)?;
        let mut products: Vec<Product> = state
            .products
            .values()
            .filter(|p| p.tenant_id == tenant_id)
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn list_customers(&self, tenant_id: &str) -> Result<Vec<Customer>, AppError> {
        let state = lock(&self.state)?;
        let mut customers: Vec<Customer> = state
            .customers
            .values()
            .filter(|c| c.tenant_id == tenant_id)
            .cloned()
            .collect();
        customers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(customers)
    }

    async fn list_movements(
        &self,
        tenant_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Movement>, AppError> {
        let state = lock(&self.state)?;
        Ok(state
            .movements
            .iter()
            .rev()
            .filter(|m| m.tenant_id == tenant_id)
            .filter(|m| from.is_none_or(|from| m.created_at >= from))
            .filter(|m| to.is_none_or(|to| m.created_at <= to))
            .cloned()
            .collect())
    }

    async fn find_license(&self, key: &str) -> Result<Option<License>, AppError> {
        Ok(lock(&self.state)?.licenses.get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::movement::MovementType;
    use rust_decimal::Decimal;

    fn record(tenant: &str, name: &str, stock: i64) -> NewProductRecord {
        NewProductRecord {
            tenant_id: tenant.to_string(),
            code: "000001".into(),
            name: name.into(),
            size: None,
            color: None,
            barcode: None,
            description: None,
            current_stock: stock,
            min_stock: 5,
            cost_price: Decimal::ZERO,
            sale_price: Decimal::ONE,
        }
    }

    async fn seed(store: &MemoryLedgerStore, tenant: &str, stock: i64) -> Product {
        let mut tx = store.begin().await.unwrap();
        let product = tx.insert_product(record(tenant, "Camiseta", stock)).await.unwrap();
        tx.commit().await.unwrap();
        product
    }

    #[tokio::test]
    async fn uncommitted_writes_are_discarded() {
        let store = MemoryLedgerStore::new();
        let product = seed(&store, "t1", 10).await;

        {
            let mut tx = store.begin().await.unwrap();
            let p = tx.read_product("t1", product.id).await.unwrap().unwrap();
            tx.write_product_stock(&p, 3).await.unwrap();
        }

        assert_eq!(store.product(product.id).unwrap().unwrap().current_stock, 10);
    }

    #[tokio::test]
    async fn stale_version_conflicts_on_commit() {
        let store = MemoryLedgerStore::new();
        let product = seed(&store, "t1", 10).await;

        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        let p1 = first.read_product("t1", product.id).await.unwrap().unwrap();
        let p2 = second.read_product("t1", product.id).await.unwrap().unwrap();

        first.write_product_stock(&p1, 7).await.unwrap();
        first.commit().await.unwrap();

        second.write_product_stock(&p2, 6).await.unwrap();
        assert!(matches!(second.commit().await, Err(AppError::Conflict)));

        let stored = store.product(product.id).unwrap().unwrap();
        assert_eq!(stored.current_stock, 7);
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn reads_are_tenant_scoped() {
        let store = MemoryLedgerStore::new();
        let product = seed(&store, "t1", 1).await;

        let mut tx = store.begin().await.unwrap();
        assert!(tx.read_product("t2", product.id).await.unwrap().is_none());
        assert!(store.list_products("t2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn movements_list_newest_first() {
        let store = MemoryLedgerStore::new();
        let product = seed(&store, "t1", 0).await;

        for quantity in [1, 2, 3] {
            let mut tx = store.begin().await.unwrap();
            tx.append_movement(NewMovement {
                tenant_id: "t1".into(),
                product_id: product.id,
                product_name: product.name.clone(),
                movement_type: MovementType::Purchase,
                quantity,
                customer_id: None,
                customer_name: None,
                note: None,
                actor: "test".into(),
                resulting_stock: quantity,
            })
            .await
            .unwrap();
            tx.commit().await.unwrap();
        }

        let quantities: Vec<i64> = store
            .list_movements("t1", None, None)
            .await
            .unwrap()
            .iter()
            .map(|m| m.quantity)
            .collect();
        assert_eq!(quantities, vec![3, 2, 1]);
        assert!(store.list_movements("t2", None, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn codes_are_sequential_per_tenant() {
        let store = MemoryLedgerStore::new();
        assert_eq!(store.next_code("t1", CodeKind::Product).await.unwrap(), 1);
        assert_eq!(store.next_code("t1", CodeKind::Product).await.unwrap(), 2);
        assert_eq!(store.next_code("t1", CodeKind::Customer).await.unwrap(), 1);
        assert_eq!(store.next_code("t2", CodeKind::Product).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn customer_updates_are_tenant_scoped() {
        let store = MemoryLedgerStore::new();
        let customer = store
            .insert_customer(NewCustomerRecord {
                tenant_id: "t1".into(),
                code: "000001".into(),
                name: "Maria".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let patch = CustomerPatch { city: Some("Campinas".into()), ..Default::default() };

        assert!(store.update_customer("t2", customer.id, &patch).await.unwrap().is_none());

        let updated = store.update_customer("t1", customer.id, &patch).await.unwrap().unwrap();
        assert_eq!(updated.city.as_deref(), Some("Campinas"));
        assert_eq!(updated.code, "000001");
        assert!(updated.updated_at >= customer.updated_at);
    }
}
