// src/models/crm.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::inventory::validate_not_blank;

// --- CLIENTE ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Uuid,
    pub tenant_id: String,
    pub code: String,
    pub name: String,
    pub document: Option<String>, // CPF ou CNPJ
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    // Endereço
    pub postal_code: Option<String>, // CEP
    pub street: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>, // UF
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// Busca da lista de clientes: trecho do nome, do código ou do CPF/CNPJ.
    /// No documento também vale só os dígitos ("123.456" acha "12345678900").
    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        if self.name.to_lowercase().contains(&term) || self.code.to_lowercase().contains(&term) {
            return true;
        }

        let Some(document) = self.document.as_deref() else {
            return false;
        };
        if document.to_lowercase().contains(&term) {
            return true;
        }

        let digits: String = term.chars().filter(char::is_ascii_digit).collect();
        !digits.is_empty()
            && document
                .chars()
                .filter(char::is_ascii_digit)
                .collect::<String>()
                .contains(&digits)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewCustomerRecord {
    pub tenant_id: String,
    pub code: String,
    pub name: String,
    pub document: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub postal_code: Option<String>,
    pub street: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

// Cadastro de cliente. O código é alocado pelo catálogo.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomer {
    #[validate(custom(function = "validate_not_blank"))]
    pub name: String,
    pub document: Option<String>,
    #[validate(email(message = "E-mail inválido."))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub postal_code: Option<String>,
    pub street: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    #[validate(length(max = 2, message = "Use a sigla do estado (UF)."))]
    pub state: Option<String>,
}

// Edição do cadastro. Campo ausente mantém o valor atual; o código não muda.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomerPatch {
    #[validate(custom(function = "validate_not_blank"))]
    pub name: Option<String>,
    pub document: Option<String>,
    #[validate(email(message = "E-mail inválido."))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub postal_code: Option<String>,
    pub street: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    #[validate(length(max = 2, message = "Use a sigla do estado (UF)."))]
    pub state: Option<String>,
}

impl CustomerPatch {
    pub fn apply_to(&self, customer: &mut Customer) {
        if let Some(name) = &self.name {
            customer.name = name.clone();
        }
        let optional_fields = [
            (&self.document, &mut customer.document),
            (&self.email, &mut customer.email),
            (&self.phone, &mut customer.phone),
            (&self.notes, &mut customer.notes),
            (&self.postal_code, &mut customer.postal_code),
            (&self.street, &mut customer.street),
            (&self.district, &mut customer.district),
            (&self.city, &mut customer.city),
            (&self.state, &mut customer.state),
        ];
        for (patched, current) in optional_fields {
            if let Some(value) = patched {
                *current = Some(value.clone());
            }
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct CustomerQuery {
    /// Trecho do nome, do código ou do CPF/CNPJ.
    pub q: Option<String>,
}
