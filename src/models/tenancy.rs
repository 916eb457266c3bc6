// src/models/tenancy.rs

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

// Uma licença ativa define o tenant (o CNPJ da empresa).
// A emissão das chaves acontece fora deste serviço.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct License {
    pub key: String,
    pub tenant_id: String,
    pub company_name: String,
    pub active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LicenseRejection {
    NotFound,
    CnpjMismatch,
    Inactive,
    Expired,
}

impl LicenseRejection {
    pub fn as_str(self) -> &'static str {
        match self {
            LicenseRejection::NotFound => "not_found",
            LicenseRejection::CnpjMismatch => "cnpj_mismatch",
            LicenseRejection::Inactive => "inactive",
            LicenseRejection::Expired => "expired",
        }
    }
}

impl fmt::Display for LicenseRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Resposta da ativação.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LicenseStatus {
    pub valid: bool,
    pub reason: Option<LicenseRejection>,
    pub tenant_id: Option<String>,
    pub company_name: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

// O que a sessão expõe: qual tenant está ativo e se está autorizado.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub tenant_id: Option<String>,
    pub authorized: bool,
    pub company_name: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// "12.345.678/0001-90" -> "12345678000190"
pub fn normalize_cnpj(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}
