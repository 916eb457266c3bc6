// src/services/catalog_service.rs

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    db::store::LedgerStore,
    models::{
        crm::{Customer, CustomerPatch, NewCustomer, NewCustomerRecord},
        inventory::{format_code, CodeKind, NewProduct, NewProductRecord, Product, ProductPatch, DEFAULT_MIN_STOCK},
        movement::{MovementType, NewMovement, SYSTEM_ACTOR},
    },
};

/// Nota gravada no ajuste que registra o estoque de abertura.
pub const INITIAL_STOCK_NOTE: &str = "initial stock";

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn LedgerStore>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    // --- CREATE PRODUCT ---
    pub async fn register_product(&self, tenant_id: &str, input: NewProduct) -> Result<Product, AppError> {
        input.validate()?;

        // Lacunas na sequência (cadastro desfeito) são aceitas
        let code = format_code(self.store.next_code(tenant_id, CodeKind::Product).await?);

        let mut tx = self.store.begin().await?;

        let product = tx
            .insert_product(NewProductRecord {
                tenant_id: tenant_id.to_string(),
                code,
                name: input.name.trim().to_string(),
                size: trimmed(input.size),
                color: trimmed(input.color),
                barcode: trimmed(input.barcode),
                description: trimmed(input.description),
                current_stock: input.initial_stock,
                min_stock: input.min_stock.unwrap_or(DEFAULT_MIN_STOCK),
                cost_price: input.cost_price,
                sale_price: input.sale_price,
            })
            .await?;

        // O saldo de abertura também passa pelo livro-razão
        if input.initial_stock > 0 {
            tx.append_movement(NewMovement {
                tenant_id: tenant_id.to_string(),
                product_id: product.id,
                product_name: product.name.clone(),
                movement_type: MovementType::Adjustment,
                quantity: input.initial_stock,
                customer_id: None,
                customer_name: None,
                note: Some(INITIAL_STOCK_NOTE.to_string()),
                actor: SYSTEM_ACTOR.to_string(),
                resulting_stock: input.initial_stock,
            })
            .await?;
        }

        tx.commit().await?;

        info!(tenant = tenant_id, code = %product.code, "Produto cadastrado");
        Ok(product)
    }

    pub async fn update_product(
        &self,
        tenant_id: &str,
        product_id: Uuid,
        patch: ProductPatch,
    ) -> Result<Product, AppError> {
        patch.validate()?;

        let patch = ProductPatch {
            name: patch.name.map(|n| n.trim().to_string()),
            size: trimmed(patch.size),
            color: trimmed(patch.color),
            barcode: trimmed(patch.barcode),
            description: trimmed(patch.description),
            ..patch
        };

        self.store
            .update_product(tenant_id, product_id, &patch)
            .await?
            .ok_or(AppError::ProductNotFound)
    }

    pub async fn list_products(&self, tenant_id: &str) -> Result<Vec<Product>, AppError> {
        self.store.list_products(tenant_id).await
    }

    // --- CUSTOMERS ---
    pub async fn register_customer(&self, tenant_id: &str, input: NewCustomer) -> Result<Customer, AppError> {
        input.validate()?;

        let code = format_code(self.store.next_code(tenant_id, CodeKind::Customer).await?);

        self.store
            .insert_customer(NewCustomerRecord {
                tenant_id: tenant_id.to_string(),
                code,
                name: input.name.trim().to_string(),
                document: trimmed(input.document),
                email: trimmed(input.email),
                phone: trimmed(input.phone),
                notes: trimmed(input.notes),
                postal_code: trimmed(input.postal_code),
                street: trimmed(input.street),
                district: trimmed(input.district),
                city: trimmed(input.city),
                state: trimmed(input.state).map(|uf| uf.to_uppercase()),
            })
            .await
    }

    pub async fn update_customer(
        &self,
        tenant_id: &str,
        customer_id: Uuid,
        patch: CustomerPatch,
    ) -> Result<Customer, AppError> {
        patch.validate()?;

        let patch = CustomerPatch {
            name: patch.name.map(|n| n.trim().to_string()),
            document: trimmed(patch.document),
            email: trimmed(patch.email),
            phone: trimmed(patch.phone),
            notes: trimmed(patch.notes),
            postal_code: trimmed(patch.postal_code),
            street: trimmed(patch.street),
            district: trimmed(patch.district),
            city: trimmed(patch.city),
            state: trimmed(patch.state).map(|uf| uf.to_uppercase()),
        };

        let customer = self
            .store
            .update_customer(tenant_id, customer_id, &patch)
            .await?
            .ok_or(AppError::CustomerNotFound)?;

        info!(tenant = tenant_id, code = %customer.code, "Cliente atualizado");
        Ok(customer)
    }

    /// Clientes por nome. `search` filtra por trecho do nome, do código ou do CPF/CNPJ.
    pub async fn list_customers(&self, tenant_id: &str, search: Option<&str>) -> Result<Vec<Customer>, AppError> {
        let customers = self.store.list_customers(tenant_id).await?;
        Ok(match search {
            Some(term) => customers.into_iter().filter(|c| c.matches_search(term)).collect(),
            None => customers,
        })
    }
}
