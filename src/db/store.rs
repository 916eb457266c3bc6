// src/db/store.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        crm::{Customer, CustomerPatch, NewCustomerRecord},
        inventory::{CodeKind, NewProductRecord, Product, ProductPatch},
        movement::{Movement, NewMovement},
        tenancy::License,
    },
};

/// Transação aberta na porta de persistência.
///
/// Tudo que for gravado aqui só fica visível depois de `commit`. Soltar a
/// transação sem `commit` descarta as gravações (rollback).
#[async_trait]
pub trait LedgerTx: Send {
    /// Lê o produto para atualização. Produtos de outro tenant não aparecem.
    async fn read_product(&mut self, tenant_id: &str, product_id: Uuid) -> Result<Option<Product>, AppError>;

    /// Grava o novo saldo condicionado à `version` lida em `product`.
    /// Se outra transação mudou o produto, falha com `AppError::Conflict`
    /// (aqui ou no `commit`, conforme o adaptador).
    async fn write_product_stock(&mut self, product: &Product, new_stock: i64) -> Result<(), AppError>;

    async fn append_movement(&mut self, movement: NewMovement) -> Result<Movement, AppError>;

    async fn insert_product(&mut self, product: NewProductRecord) -> Result<Product, AppError>;

    async fn commit(&mut self) -> Result<(), AppError>;
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, AppError>;

    async fn read_customer(&self, tenant_id: &str, customer_id: Uuid) -> Result<Option<Customer>, AppError>;

    /// Próximo valor da sequência do tenant (começa em 1). Lacunas são aceitas.
    async fn next_code(&self, tenant_id: &str, kind: CodeKind) -> Result<i64, AppError>;

    /// Edição descritiva. Não toca em `current_stock` nem em `version`.
    async fn update_product(
        &self,
        tenant_id: &str,
        product_id: Uuid,
        patch: &ProductPatch,
    ) -> Result<Option<Product>, AppError>;

    async fn insert_customer(&self, customer: NewCustomerRecord) -> Result<Customer, AppError>;

    /// Edição do cadastro. Cliente de outro tenant devolve `None`.
    async fn update_customer(
        &self,
        tenant_id: &str,
        customer_id: Uuid,
        patch: &CustomerPatch,
    ) -> Result<Option<Customer>, AppError>;

    async fn list_products(&self, tenant_id: &str) -> Result<Vec<Product>, AppError>;

    async fn list_customers(&self, tenant_id: &str) -> Result<Vec<Customer>, AppError>;

    /// Histórico do tenant, mais recentes primeiro, opcionalmente limitado por data.
    async fn list_movements(
        &self,
        tenant_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Movement>, AppError>;

    async fn find_license(&self, key: &str) -> Result<Option<License>, AppError>;
}
