// src/db/pg_store.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
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

// SQLSTATE de falha de serialização e de deadlock: o motor repete a operação.
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

fn map_db_err(e: sqlx::Error) -> AppError {
    if let Some(db_err) = e.as_database_error() {
        if matches!(db_err.code().as_deref(), Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED)) {
            return AppError::Conflict;
        }
    }
    AppError::DatabaseError(e)
}

#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub struct PgLedgerTx {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgLedgerTx {
    fn conn(&mut self) -> Result<&mut Transaction<'static, Postgres>, AppError> {
        self.tx
            .as_mut()
            .ok_or_else(|| AppError::InternalServerError(anyhow::anyhow!("transação já encerrada")))
    }
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn read_product(&mut self, tenant_id: &str, product_id: Uuid) -> Result<Option<Product>, AppError> {
        let tx = self.conn()?;
        // FOR UPDATE: a segunda transação no mesmo produto espera a primeira
        // terminar e então lê o saldo já atualizado.
        sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE tenant_id = $1 AND id = $2 FOR UPDATE",
        )
        .bind(tenant_id)
        .bind(product_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_db_err)
    }

    async fn write_product_stock(&mut self, product: &Product, new_stock: i64) -> Result<(), AppError> {
        let tx = self.conn()?;
        let result = sqlx::query(
            r#"
            UPDATE products
            SET current_stock = $1, version = version + 1, updated_at = now()
            WHERE id = $2 AND tenant_id = $3 AND version = $4
            "#,
        )
        .bind(new_stock)
        .bind(product.id)
        .bind(&product.tenant_id)
        .bind(product.version)
        .execute(&mut **tx)
        .await
        .map_err(map_db_err)?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict);
        }
        Ok(())
    }

    async fn append_movement(&mut self, movement: NewMovement) -> Result<Movement, AppError> {
        let tx = self.conn()?;
        sqlx::query_as::<_, Movement>(
            r#"
            INSERT INTO movements (
                id, tenant_id, product_id, product_name, movement_type, quantity,
                customer_id, customer_name, note, actor, resulting_stock
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&movement.tenant_id)
        .bind(movement.product_id)
        .bind(&movement.product_name)
        .bind(movement.movement_type)
        .bind(movement.quantity)
        .bind(movement.customer_id)
        .bind(&movement.customer_name)
        .bind(&movement.note)
        .bind(&movement.actor)
        .bind(movement.resulting_stock)
        .fetch_one(&mut **tx)
        .await
        .map_err(map_db_err)
    }

    async fn insert_product(&mut self, product: NewProductRecord) -> Result<Product, AppError> {
        let tx = self.conn()?;
        sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (
                id, tenant_id, code, name, size, color, barcode, description,
                current_stock, min_stock, cost_price, sale_price
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&product.tenant_id)
        .bind(&product.code)
        .bind(&product.name)
        .bind(&product.size)
        .bind(&product.color)
        .bind(&product.barcode)
        .bind(&product.description)
        .bind(product.current_stock)
        .bind(product.min_stock)
        .bind(product.cost_price)
        .bind(product.sale_price)
        .fetch_one(&mut **tx)
        .await
        .map_err(map_db_err)
    }

    async fn commit(&mut self) -> Result<(), AppError> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| AppError::InternalServerError(anyhow::anyhow!("transação já encerrada")))?;
        tx.commit().await.map_err(map_db_err)
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, AppError> {
        let tx = self.pool.begin().await.map_err(map_db_err)?;
        Ok(Box::new(PgLedgerTx { tx: Some(tx) }))
    }

    async fn read_customer(&self, tenant_id: &str, customer_id: Uuid) -> Result<Option<Customer>, AppError> {
        sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(customer_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)
    }

    async fn next_code(&self, tenant_id: &str, kind: CodeKind) -> Result<i64, AppError> {
        // "UPSERT" atômico: devolve o valor reservado e deixa o próximo gravado.
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO tenant_counters (tenant_id, kind, next_value)
            VALUES ($1, $2, 2)
            ON CONFLICT (tenant_id, kind)
            DO UPDATE SET next_value = tenant_counters.next_value + 1
            RETURNING next_value - 1
            "#,
        )
        .bind(tenant_id)
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn update_product(
        &self,
        tenant_id: &str,
        product_id: Uuid,
        patch: &ProductPatch,
    ) -> Result<Option<Product>, AppError> {
        // COALESCE mantém o valor atual quando o campo não veio no patch.
        sqlx::query_as::<_, Product>(
            r#"
            UPDATE products SET
                name = COALESCE($3, name),
                size = COALESCE($4, size),
                color = COALESCE($5, color),
                barcode = COALESCE($6, barcode),
                description = COALESCE($7, description),
                min_stock = COALESCE($8, min_stock),
                cost_price = COALESCE($9, cost_price),
                sale_price = COALESCE($10, sale_price),
                updated_at = now()
            WHERE tenant_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(product_id)
        .bind(&patch.name)
        .bind(&patch.size)
        .bind(&patch.color)
        .bind(&patch.barcode)
        .bind(&patch.description)
        .bind(patch.min_stock)
        .bind(patch.cost_price)
        .bind(patch.sale_price)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn insert_customer(&self, customer: NewCustomerRecord) -> Result<Customer, AppError> {
        sqlx::query_as::<_, Customer>(
            r#"
            INSERT INTO customers (
                id, tenant_id, code, name, document, email, phone, notes,
                postal_code, street, district, city, state
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&customer.tenant_id)
        .bind(&customer.code)
        .bind(&customer.name)
        .bind(&customer.document)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&customer.notes)
        .bind(&customer.postal_code)
        .bind(&customer.street)
        .bind(&customer.district)
        .bind(&customer.city)
        .bind(&customer.state)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn update_customer(
        &self,
        tenant_id: &str,
        customer_id: Uuid,
        patch: &CustomerPatch,
    ) -> Result<Option<Customer>, AppError> {
        sqlx::query_as::<_, Customer>(
            r#"
            UPDATE customers SET
                name = COALESCE($3, name),
                document = COALESCE($4, document),
                email = COALESCE($5, email),
                phone = COALESCE($6, phone),
                notes = COALESCE($7, notes),
                postal_code = COALESCE($8, postal_code),
                street = COALESCE($9, street),
                district = COALESCE($10, district),
                city = COALESCE($11, city),
                state = COALESCE($12, state),
                updated_at = now()
            WHERE tenant_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(customer_id)
        .bind(&patch.name)
        .bind(&patch.document)
        .bind(&patch.email)
        .bind(&patch.phone)
        .bind(&patch.notes)
        .bind(&patch.postal_code)
        .bind(&patch.street)
        .bind(&patch.district)
        .bind(&patch.city)
        .bind(&patch.state)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn list_products(&self, tenant_id: &str) -> Result<Vec<Product>, AppError> {
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE tenant_id = $1 ORDER BY name ASC")
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_err)
    }

    async fn list_customers(&self, tenant_id: &str) -> Result<Vec<Customer>, AppError> {
        sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE tenant_id = $1 ORDER BY name ASC")
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_err)
    }

    async fn list_movements(
        &self,
        tenant_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Movement>, AppError> {
        sqlx::query_as::<_, Movement>(
            r#"
            SELECT * FROM movements
            WHERE tenant_id = $1
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at <= $3)
            ORDER BY created_at DESC, id
            "#,
        )
        .bind(tenant_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn find_license(&self, key: &str) -> Result<Option<License>, AppError> {
        sqlx::query_as::<_, License>("SELECT * FROM licenses WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)
    }
}
