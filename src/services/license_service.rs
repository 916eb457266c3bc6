// src/services/license_service.rs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::{
    common::error::AppError,
    db::store::LedgerStore,
    models::tenancy::{normalize_cnpj, License, LicenseRejection, LicenseStatus, SessionInfo},
};

/// Regra de aceitação de uma licença, sem acesso a banco. Devolve a própria licença quando aceita.
pub fn check_license<'a>(
    license: Option<&'a License>,
    cnpj: &str,
    now: DateTime<Utc>,
) -> Result<&'a License, LicenseRejection> {
    let license = license.ok_or(LicenseRejection::NotFound)?;

    if normalize_cnpj(&license.tenant_id) != normalize_cnpj(cnpj) {
        return Err(LicenseRejection::CnpjMismatch);
    }
    if !license.active {
        return Err(LicenseRejection::Inactive);
    }
    if license.expires_at.is_some_and(|expires_at| expires_at <= now) {
        return Err(LicenseRejection::Expired);
    }
    Ok(license)
}

#[derive(Clone)]
pub struct LicenseService {
    store: Arc<dyn LedgerStore>,
}

impl LicenseService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Confere o par CNPJ + chave e devolve a situação (válida ou o motivo da recusa).
    pub async fn verify(&self, cnpj: &str, key: &str) -> Result<LicenseStatus, AppError> {
        let license = self.store.find_license(key.trim()).await?;

        let status = match check_license(license.as_ref(), cnpj, Utc::now()) {
            Ok(license) => LicenseStatus {
                valid: true,
                reason: None,
                tenant_id: Some(normalize_cnpj(&license.tenant_id)),
                company_name: Some(license.company_name.clone()),
                expires_at: license.expires_at,
            },
            Err(reason) => {
                warn!(reason = %reason, "Licença recusada");
                LicenseStatus {
                    valid: false,
                    reason: Some(reason),
                    tenant_id: None,
                    company_name: None,
                    expires_at: None,
                }
            }
        };

        Ok(status)
    }

    /// Usado a cada requisição protegida: devolve a licença ou o erro HTTP certo.
    pub async fn authorize(&self, cnpj: &str, key: &str) -> Result<License, AppError> {
        if cnpj.trim().is_empty() || key.trim().is_empty() {
            return Err(AppError::LicenseRequired);
        }

        let license = self.store.find_license(key.trim()).await?;
        let license = check_license(license.as_ref(), cnpj, Utc::now()).map_err(AppError::LicenseRejected)?;

        Ok(License {
            tenant_id: normalize_cnpj(&license.tenant_id),
            ..license.clone()
        })
    }

    /// Sessão sem credencial ou com credencial recusada não é erro: só não está autorizada.
    pub async fn session(&self, cnpj: Option<&str>, key: Option<&str>) -> Result<SessionInfo, AppError> {
        let unauthorized = SessionInfo {
            tenant_id: None,
            authorized: false,
            company_name: None,
            expires_at: None,
        };

        let (Some(cnpj), Some(key)) = (cnpj, key) else {
            return Ok(unauthorized);
        };

        match self.authorize(cnpj, key).await {
            Ok(license) => Ok(SessionInfo {
                tenant_id: Some(license.tenant_id),
                authorized: true,
                company_name: Some(license.company_name),
                expires_at: license.expires_at,
            }),
            Err(AppError::LicenseRequired | AppError::LicenseRejected(_)) => Ok(unauthorized),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::db::memory_store::MemoryLedgerStore;

    fn license(key: &str, cnpj: &str, active: bool, expires_at: Option<DateTime<Utc>>) -> License {
        License {
            key: key.into(),
            tenant_id: cnpj.into(),
            company_name: "Loja da Neta".into(),
            active,
            expires_at,
            created_at: Utc::now(),
        }
    }

    fn service() -> LicenseService {
        let store = MemoryLedgerStore::new();
        store.insert_license(license("KEY-OK", "12345678000190", true, None)).unwrap();
        store
            .insert_license(license("KEY-OFF", "12345678000190", false, None))
            .unwrap();
        store
            .insert_license(license(
                "KEY-OLD",
                "12345678000190",
                true,
                Some(Utc::now() - Duration::days(1)),
            ))
            .unwrap();
        LicenseService::new(Arc::new(store))
    }

    #[test]
    fn rejection_reasons() {
        let now = Utc::now();
        let ok = license("K", "12345678000190", true, Some(now + Duration::days(30)));

        let reason = |license: Option<&License>, cnpj: &str| check_license(license, cnpj, now).err();

        let accepted = check_license(Some(&ok), "12.345.678/0001-90", now).unwrap();
        assert_eq!(accepted.key, "K");
        assert_eq!(reason(None, "12345678000190"), Some(LicenseRejection::NotFound));
        assert_eq!(reason(Some(&ok), "98765432000110"), Some(LicenseRejection::CnpjMismatch));

        let inactive = license("K", "12345678000190", false, None);
        assert_eq!(reason(Some(&inactive), "12345678000190"), Some(LicenseRejection::Inactive));

        let expired = license("K", "12345678000190", true, Some(now - Duration::seconds(1)));
        assert_eq!(reason(Some(&expired), "12345678000190"), Some(LicenseRejection::Expired));
    }

    #[tokio::test]
    async fn verify_reports_status() {
        let service = service();

        let valid = service.verify("12.345.678/0001-90", "KEY-OK").await.unwrap();
        assert!(valid.valid);
        assert_eq!(valid.tenant_id.as_deref(), Some("12345678000190"));
        assert_eq!(valid.company_name.as_deref(), Some("Loja da Neta"));

        let missing = service.verify("12345678000190", "NOPE").await.unwrap();
        assert!(!missing.valid);
        assert_eq!(missing.reason, Some(LicenseRejection::NotFound));

        let expired = service.verify("12345678000190", "KEY-OLD").await.unwrap();
        assert_eq!(expired.reason, Some(LicenseRejection::Expired));
    }

    #[tokio::test]
    async fn authorize_maps_to_errors() {
        let service = service();

        assert_eq!(service.authorize("12345678000190", "KEY-OK").await.unwrap().tenant_id, "12345678000190");
        assert!(matches!(
            service.authorize("12345678000190", "NOPE").await,
            Err(AppError::LicenseRejected(LicenseRejection::NotFound))
        ));
        assert!(matches!(service.authorize("", "KEY-OK").await, Err(AppError::LicenseRequired)));
        assert!(matches!(
            service.authorize("12345678000190", "KEY-OFF").await,
            Err(AppError::LicenseRejected(LicenseRejection::Inactive))
        ));
    }

    #[tokio::test]
    async fn session_is_unauthorized_without_valid_license() {
        let service = service();

        let anonymous = service.session(None, None).await.unwrap();
        assert!(!anonymous.authorized);
        assert!(anonymous.tenant_id.is_none());

        let rejected = service.session(Some("98765432000110"), Some("KEY-OK")).await.unwrap();
        assert!(!rejected.authorized);

        let active = service.session(Some("12345678000190"), Some("KEY-OK")).await.unwrap();
        assert!(active.authorized);
        assert_eq!(active.tenant_id.as_deref(), Some("12345678000190"));
    }
}
