// src/services/stock_ledger.rs

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        retry::{with_conditional_retry, RetryConfig},
    },
    db::store::LedgerStore,
    models::movement::{MovementReceipt, MovementRequest, MovementType, NewMovement, SYSTEM_ACTOR},
};

/// Único caminho que altera o saldo de um produto.
///
/// Cada chamada lê o produto, calcula o novo saldo, recusa saldo negativo e
/// grava saldo + movimentação na mesma transação. Conflitos de escrita
/// concorrente repetem a sequência inteira, até `RetryConfig::max_attempts`.
#[derive(Clone)]
pub struct StockLedger {
    store: Arc<dyn LedgerStore>,
    retry: RetryConfig,
}

// A movimentação já validada, pronta para cada tentativa da transação.
struct PlannedMovement<'a> {
    tenant_id: &'a str,
    product_id: Uuid,
    movement_type: MovementType,
    quantity: i64,
    delta: i64,
    customer_id: Option<Uuid>,
    customer_name: Option<String>,
    note: Option<String>,
    actor: String,
}

/// Um registro devolvido pela porta tem que ser do tenant de quem pediu.
pub(crate) fn ensure_tenant(record_tenant: &str, caller_tenant: &str) -> Result<(), AppError> {
    if record_tenant != caller_tenant {
        return Err(AppError::TenantMismatch);
    }
    Ok(())
}

impl StockLedger {
    pub fn new(store: Arc<dyn LedgerStore>, retry: RetryConfig) -> Self {
        Self { store, retry }
    }

    pub async fn apply_movement(
        &self,
        tenant_id: &str,
        request: MovementRequest,
    ) -> Result<MovementReceipt, AppError> {
        // 1. Tipo e quantidade: falham antes de abrir qualquer transação
        let movement_type: MovementType = request.movement_type.parse()?;
        let delta = movement_type.delta_for(request.quantity)?;

        // 2. Cliente (opcional): o nome é copiado para a movimentação
        let customer_name = match request.customer_id {
            Some(customer_id) => {
                let customer = self
                    .store
                    .read_customer(tenant_id, customer_id)
                    .await?
                    .ok_or(AppError::CustomerNotFound)?;
                // Cliente de outra licença é tratado como inexistente
                ensure_tenant(&customer.tenant_id, tenant_id).map_err(|_| AppError::CustomerNotFound)?;
                Some(customer.name)
            }
            None => None,
        };

        let plan = PlannedMovement {
            tenant_id,
            product_id: request.product_id,
            movement_type,
            quantity: request.quantity,
            delta,
            customer_id: request.customer_id,
            customer_name,
            note: request.note.filter(|n| !n.trim().is_empty()),
            actor: request
                .actor
                .filter(|a| !a.trim().is_empty())
                .unwrap_or_else(|| SYSTEM_ACTOR.to_string()),
        };

        // 3. Transação, repetida só em caso de conflito
        let receipt = with_conditional_retry(
            &self.retry,
            "apply_movement",
            || self.try_apply(&plan),
            AppError::is_conflict,
        )
        .await?;

        debug!(
            tenant = tenant_id,
            product = %plan.product_id,
            movement_type = %plan.movement_type,
            delta = plan.delta,
            new_stock = receipt.new_stock,
            "Movimentação registrada"
        );

        Ok(receipt)
    }

    async fn try_apply(&self, plan: &PlannedMovement<'_>) -> Result<MovementReceipt, AppError> {
        let mut tx = self.store.begin().await?;

        let product = tx
            .read_product(plan.tenant_id, plan.product_id)
            .await?
            .ok_or(AppError::ProductNotFound)?;
        ensure_tenant(&product.tenant_id, plan.tenant_id)?;

        let new_stock = product
            .current_stock
            .checked_add(plan.delta)
            .ok_or_else(|| AppError::InvalidQuantity("saldo resultante fora do limite".into()))?;

        // Sem commit: a transação é descartada ao sair daqui
        if new_stock < 0 {
            return Err(AppError::InsufficientStock {
                available: product.current_stock,
                requested: plan.delta.saturating_neg(),
            });
        }

        tx.write_product_stock(&product, new_stock).await?;

        let movement = tx
            .append_movement(NewMovement {
                tenant_id: plan.tenant_id.to_string(),
                product_id: product.id,
                product_name: product.name.clone(),
                movement_type: plan.movement_type,
                quantity: plan.quantity,
                customer_id: plan.customer_id,
                customer_name: plan.customer_name.clone(),
                note: plan.note.clone(),
                actor: plan.actor.clone(),
                resulting_stock: new_stock,
            })
            .await?;

        tx.commit().await?;

        Ok(MovementReceipt {
            movement_id: movement.id,
            new_stock,
            movement,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use rust_decimal::Decimal;

    use crate::{
        db::{
            memory_store::MemoryLedgerStore,
            store::LedgerTx,
        },
        models::{
            crm::{Customer, CustomerPatch, NewCustomerRecord},
            inventory::{CodeKind, NewProductRecord, Product, ProductPatch},
            movement::{Movement, NewMovement},
            tenancy::License,
        },
    };

    const TENANT: &str = "12345678000190";
    const OTHER_TENANT: &str = "98765432000110";

    fn ledger(store: Arc<dyn LedgerStore>) -> StockLedger {
        StockLedger::new(store, RetryConfig::new(5, Duration::from_millis(1), Duration::from_millis(5)))
    }

    async fn seed_product(store: &MemoryLedgerStore, tenant: &str, stock: i64) -> Product {
        let mut tx = store.begin().await.unwrap();
        let product = tx
            .insert_product(NewProductRecord {
                tenant_id: tenant.to_string(),
                code: "000001".into(),
                name: "Camiseta Azul M".into(),
                size: Some("M".into()),
                color: Some("Azul".into()),
                barcode: None,
                description: None,
                current_stock: stock,
                min_stock: 5,
                cost_price: Decimal::new(2500, 2),
                sale_price: Decimal::new(4990, 2),
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();
        product
    }

    fn request(product_id: Uuid, movement_type: &str, quantity: i64) -> MovementRequest {
        MovementRequest {
            product_id,
            movement_type: movement_type.to_string(),
            quantity,
            customer_id: None,
            note: None,
            actor: None,
        }
    }

    fn stock_of(store: &MemoryLedgerStore, product: &Product) -> i64 {
        store.product(product.id).unwrap().unwrap().current_stock
    }

    #[tokio::test]
    async fn sale_decrements_stock_and_records_movement() {
        let store = MemoryLedgerStore::new();
        let product = seed_product(&store, TENANT, 10).await;

        let receipt = ledger(Arc::new(store.clone()))
            .apply_movement(TENANT, request(product.id, "sale", 3))
            .await
            .unwrap();

        assert_eq!(receipt.new_stock, 7);
        assert_eq!(stock_of(&store, &product), 7);
        assert_eq!(receipt.movement.movement_type, MovementType::Sale);
        assert_eq!(receipt.movement.quantity, 3);
        assert_eq!(receipt.movement.resulting_stock, 7);
        assert_eq!(receipt.movement.product_name, "Camiseta Azul M");
        assert_eq!(receipt.movement.actor, SYSTEM_ACTOR);
        assert_eq!(store.movement_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn insufficient_stock_changes_nothing() {
        let store = MemoryLedgerStore::new();
        let product = seed_product(&store, TENANT, 2).await;

        let err = ledger(Arc::new(store.clone()))
            .apply_movement(TENANT, request(product.id, "sale", 5))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InsufficientStock { available: 2, requested: 5 }));
        assert_eq!(stock_of(&store, &product), 2);
        assert_eq!(store.movement_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn purchase_from_zero() {
        let store = MemoryLedgerStore::new();
        let product = seed_product(&store, TENANT, 0).await;

        let receipt = ledger(Arc::new(store.clone()))
            .apply_movement(TENANT, request(product.id, "purchase", 20))
            .await
            .unwrap();

        assert_eq!(receipt.new_stock, 20);
    }

    #[tokio::test]
    async fn adjustment_applies_signed_delta() {
        let store = MemoryLedgerStore::new();
        let product = seed_product(&store, TENANT, 15).await;
        let ledger = ledger(Arc::new(store.clone()));

        let receipt = ledger
            .apply_movement(TENANT, request(product.id, "adjustment", -4))
            .await
            .unwrap();
        assert_eq!(receipt.new_stock, 11);
        assert_eq!(receipt.movement.quantity, -4);
        assert_eq!(receipt.movement.signed_delta(), -4);

        let receipt = ledger
            .apply_movement(TENANT, request(product.id, "ajuste", 9))
            .await
            .unwrap();
        assert_eq!(receipt.new_stock, 20);

        let err = ledger
            .apply_movement(TENANT, request(product.id, "adjustment", -21))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InsufficientStock { available: 20, requested: 21 }));
    }

    #[tokio::test]
    async fn unknown_type_fails_before_any_transaction() {
        let store = CountingStore::new(MemoryLedgerStore::new(), false);
        let counting = Arc::new(store);

        // O produto nem existe: se a transação fosse aberta, o erro seria ProductNotFound.
        let err = ledger(counting.clone())
            .apply_movement(TENANT, request(Uuid::new_v4(), "foo", 1))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidMovementType(ref t) if t == "foo"));
        assert_eq!(counting.begins.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_quantities_are_rejected_up_front() {
        let store = MemoryLedgerStore::new();
        let product = seed_product(&store, TENANT, 10).await;
        let ledger = ledger(Arc::new(store.clone()));

        for (kind, quantity) in [("sale", 0), ("purchase", -3), ("loss", -1), ("adjustment", 0)] {
            let err = ledger
                .apply_movement(TENANT, request(product.id, kind, quantity))
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::InvalidQuantity(_)), "{} {}", kind, quantity);
        }
        assert_eq!(stock_of(&store, &product), 10);
        assert_eq!(store.movement_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn stock_follows_the_sum_of_deltas() {
        let store = MemoryLedgerStore::new();
        let product = seed_product(&store, TENANT, 0).await;
        let ledger = ledger(Arc::new(store.clone()));

        let steps = [
            ("purchase", 10, 10),
            ("sale", 4, 6),
            ("return", 1, 7),
            ("loss", 2, 5),
            ("other-outflow", 5, 0),
            ("adjustment", 3, 3),
        ];

        for (kind, quantity, expected) in steps {
            let receipt = ledger
                .apply_movement(TENANT, request(product.id, kind, quantity))
                .await
                .unwrap();
            assert_eq!(receipt.new_stock, expected, "{}", kind);
            assert!(receipt.new_stock >= 0);
        }

        let history = store.list_movements(TENANT, None, None).await.unwrap();
        let total: i64 = history.iter().map(|m| m.signed_delta()).sum();
        assert_eq!(total, 3);
        assert_eq!(history.len(), steps.len());
    }

    #[tokio::test]
    async fn same_request_twice_makes_two_movements() {
        let store = MemoryLedgerStore::new();
        let product = seed_product(&store, TENANT, 10).await;
        let ledger = ledger(Arc::new(store.clone()));

        let first = ledger.apply_movement(TENANT, request(product.id, "sale", 1)).await.unwrap();
        let second = ledger.apply_movement(TENANT, request(product.id, "sale", 1)).await.unwrap();

        assert_ne!(first.movement_id, second.movement_id);
        assert_eq!(stock_of(&store, &product), 8);
        assert_eq!(store.movement_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn other_tenant_product_is_not_found() {
        let store = MemoryLedgerStore::new();
        let product = seed_product(&store, TENANT, 10).await;

        let err = ledger(Arc::new(store.clone()))
            .apply_movement(OTHER_TENANT, request(product.id, "sale", 1))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ProductNotFound));
        assert_eq!(stock_of(&store, &product), 10);
        assert_eq!(store.movement_count().unwrap(), 0);
    }

    #[test]
    fn records_from_another_tenant_are_refused() {
        assert!(ensure_tenant(TENANT, TENANT).is_ok());
        assert!(matches!(ensure_tenant(OTHER_TENANT, TENANT), Err(AppError::TenantMismatch)));
    }

    #[tokio::test]
    async fn customer_name_is_snapshotted() {
        let store = MemoryLedgerStore::new();
        let product = seed_product(&store, TENANT, 10).await;
        let customer = store
            .insert_customer(NewCustomerRecord {
                tenant_id: TENANT.into(),
                code: "000001".into(),
                name: "Maria Souza".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let mut req = request(product.id, "venda", 2);
        req.customer_id = Some(customer.id);
        req.note = Some("balcão".into());
        req.actor = Some("manual".into());

        let receipt = ledger(Arc::new(store.clone())).apply_movement(TENANT, req).await.unwrap();

        // Renomear o produto depois não altera o histórico
        store
            .update_product(
                TENANT,
                product.id,
                &ProductPatch { name: Some("Camiseta Azul (M)".into()), ..Default::default() },
            )
            .await
            .unwrap();

        let history = store.list_movements(TENANT, None, None).await.unwrap();
        assert_eq!(history[0].id, receipt.movement_id);
        assert_eq!(history[0].customer_name.as_deref(), Some("Maria Souza"));
        assert_eq!(history[0].product_name, "Camiseta Azul M");
        assert_eq!(history[0].note.as_deref(), Some("balcão"));
        assert_eq!(history[0].actor, "manual");
    }

    #[tokio::test]
    async fn customer_from_other_tenant_is_not_found() {
        let store = MemoryLedgerStore::new();
        let product = seed_product(&store, TENANT, 10).await;
        let foreign = store
            .insert_customer(NewCustomerRecord {
                tenant_id: OTHER_TENANT.into(),
                code: "000001".into(),
                name: "João".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let mut req = request(product.id, "sale", 1);
        req.customer_id = Some(foreign.id);

        let err = ledger(Arc::new(store.clone())).apply_movement(TENANT, req).await.unwrap_err();
        assert!(matches!(err, AppError::CustomerNotFound));
        assert_eq!(stock_of(&store, &product), 10);
    }

    #[tokio::test]
    async fn unscoped_customer_read_still_reports_customer_not_found() {
        let memory = MemoryLedgerStore::new();
        let product = seed_product(&memory, TENANT, 10).await;
        let foreign = memory
            .insert_customer(NewCustomerRecord {
                tenant_id: OTHER_TENANT.into(),
                code: "000001".into(),
                name: "João".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        // Adaptador que esquece o filtro de tenant na leitura do cliente
        let mut leaky = CountingStore::new(memory.clone(), false);
        leaky.unscoped_customer = Some(foreign.clone());

        let mut req = request(product.id, "sale", 1);
        req.customer_id = Some(foreign.id);

        let err = ledger(Arc::new(leaky)).apply_movement(TENANT, req).await.unwrap_err();
        assert!(matches!(err, AppError::CustomerNotFound));
        assert_eq!(stock_of(&memory, &product), 10);
        assert_eq!(memory.movement_count().unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn competing_sales_never_go_negative() {
        let store = MemoryLedgerStore::new();
        let product = seed_product(&store, TENANT, 5).await;
        let product_id = product.id;
        let ledger = ledger(Arc::new(store.clone()));

        let a = tokio::spawn({
            let ledger = ledger.clone();
            async move { ledger.apply_movement(TENANT, request(product_id, "sale", 3)).await }
        });
        let b = tokio::spawn({
            let ledger = ledger.clone();
            async move { ledger.apply_movement(TENANT, request(product_id, "sale", 4)).await }
        });

        let results = [a.await.unwrap(), b.await.unwrap()];
        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        let insufficient = results
            .iter()
            .filter(|r| matches!(r, Err(AppError::InsufficientStock { .. })))
            .count();

        assert_eq!(succeeded, 1);
        assert_eq!(insufficient, 1);
        let final_stock = stock_of(&store, &product);
        assert!(final_stock == 2 || final_stock == 1, "stock {}", final_stock);
        assert_eq!(store.movement_count().unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_movements_converge() {
        let store = MemoryLedgerStore::new();
        let product = seed_product(&store, TENANT, 100).await;
        let product_id = product.id;
        // Muitas tentativas: aqui queremos provar a convergência, não o limite.
        let ledger = StockLedger::new(
            Arc::new(store.clone()),
            RetryConfig::new(200, Duration::from_millis(1), Duration::from_millis(3)),
        );

        let deltas: Vec<(&str, i64)> = (0..40)
            .map(|i| if i % 2 == 0 { ("purchase", 3) } else { ("sale", 2) })
            .collect();
        let expected: i64 = 100 + deltas.iter().map(|(k, q)| if *k == "sale" { -q } else { *q }).sum::<i64>();

        let handles: Vec<_> = deltas
            .into_iter()
            .map(|(kind, quantity)| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.apply_movement(TENANT, request(product_id, kind, quantity)).await })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(stock_of(&store, &product), expected);
        assert_eq!(store.movement_count().unwrap(), 40);
    }

    #[tokio::test]
    async fn conflict_surfaces_after_bounded_retries() {
        let memory = MemoryLedgerStore::new();
        let product = seed_product(&memory, TENANT, 10).await;
        let contended = Arc::new(CountingStore::new(memory.clone(), true));

        let err = ledger(contended.clone())
            .apply_movement(TENANT, request(product.id, "sale", 1))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict));
        assert_eq!(contended.begins.load(Ordering::SeqCst), 5);
        assert_eq!(stock_of(&memory, &product), 10);
        assert_eq!(memory.movement_count().unwrap(), 0);
    }

    // Conta as transações abertas e, se pedido, faz todo commit perder a corrida.
    // Com `unscoped_customer`, devolve esse cliente sem olhar o tenant.
    struct CountingStore {
        inner: MemoryLedgerStore,
        begins: AtomicU32,
        always_conflict: bool,
        unscoped_customer: Option<Customer>,
    }

    impl CountingStore {
        fn new(inner: MemoryLedgerStore, always_conflict: bool) -> Self {
            Self { inner, begins: AtomicU32::new(0), always_conflict, unscoped_customer: None }
        }
    }

    struct ConflictingTx(Box<dyn LedgerTx>);

    #[async_trait]
    impl LedgerTx for ConflictingTx {
        async fn read_product(&mut self, tenant_id: &str, product_id: Uuid) -> Result<Option<Product>, AppError> {
            self.0.read_product(tenant_id, product_id).await
        }
        async fn write_product_stock(&mut self, product: &Product, new_stock: i64) -> Result<(), AppError> {
            self.0.write_product_stock(product, new_stock).await
        }
        async fn append_movement(&mut self, movement: NewMovement) -> Result<Movement, AppError> {
            self.0.append_movement(movement).await
        }
        async fn insert_product(&mut self, product: NewProductRecord) -> Result<Product, AppError> {
            self.0.insert_product(product).await
        }
        async fn commit(&mut self) -> Result<(), AppError> {
            Err(AppError::Conflict)
        }
    }

    #[async_trait]
    impl LedgerStore for CountingStore {
        async fn begin(&self) -> Result<Box<dyn LedgerTx>, AppError> {
            self.begins.fetch_add(1, Ordering::SeqCst);
            let tx = self.inner.begin().await?;
            if self.always_conflict {
                Ok(Box::new(ConflictingTx(tx)))
            } else {
                Ok(tx)
            }
        }
        async fn read_customer(&self, tenant_id: &str, customer_id: Uuid) -> Result<Option<Customer>, AppError> {
            if let Some(customer) = self.unscoped_customer.as_ref().filter(|c| c.id == customer_id) {
                return Ok(Some(customer.clone()));
            }
            self.inner.read_customer(tenant_id, customer_id).await
        }
        async fn next_code(&self, tenant_id: &str, kind: CodeKind) -> Result<i64, AppError> {
            self.inner.next_code(tenant_id, kind).await
        }
        async fn update_product(
            &self,
            tenant_id: &str,
            product_id: Uuid,
            patch: &ProductPatch,
        ) -> Result<Option<Product>, AppError> {
            self.inner.update_product(tenant_id, product_id, patch).await
        }
        async fn insert_customer(&self, customer: NewCustomerRecord) -> Result<Customer, AppError> {
            self.inner.insert_customer(customer).await
        }
        async fn update_customer(
            &self,
            tenant_id: &str,
            customer_id: Uuid,
            patch: &CustomerPatch,
        ) -> Result<Option<Customer>, AppError> {
            self.inner.update_customer(tenant_id, customer_id, patch).await
        }
        async fn list_products(&self, tenant_id: &str) -> Result<Vec<Product>, AppError> {
            self.inner.list_products(tenant_id).await
        }
        async fn list_customers(&self, tenant_id: &str) -> Result<Vec<Customer>, AppError> {
            self.inner.list_customers(tenant_id).await
        }
        async fn list_movements(
            &self,
            tenant_id: &str,
            from: Option<DateTime<Utc>>,
            to: Option<DateTime<Utc>>,
        ) -> Result<Vec<Movement>, AppError> {
            self.inner.list_movements(tenant_id, from, to).await
        }
        async fn find_license(&self, key: &str) -> Result<Option<License>, AppError> {
            self.inner.find_license(key).await
        }
    }
}
