// src/config.rs

use std::{env, str::FromStr, sync::Arc, time::Duration};

use anyhow::{anyhow, Context};
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;

use crate::{
    common::retry::RetryConfig,
    db::{memory_store::MemoryLedgerStore, pg_store::PgLedgerStore, store::LedgerStore},
    models::tenancy::{normalize_cnpj, License},
    services::{
        catalog_service::CatalogService, license_service::LicenseService, report_service::ReportService,
        stock_ledger::StockLedger,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "postgres" | "pg" => Ok(StoreBackend::Postgres),
            "memory" | "mem" => Ok(StoreBackend::Memory),
            other => Err(anyhow!("STORE_BACKEND desconhecido: '{}'", other)),
        }
    }
}

// Licença de demonstração criada no backend em memória.
#[derive(Debug, Clone)]
pub struct SeedLicense {
    pub key: String,
    pub cnpj: String,
    pub company_name: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub retry: RetryConfig,
    pub seed_license: Option<SeedLicense>,
}

fn parse_or<T: FromStr>(value: Option<String>, name: &str, default: T) -> anyhow::Result<T> {
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow!("{} inválido: '{}'", name, raw)),
        None => Ok(default),
    }
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let store_backend = parse_or(get("STORE_BACKEND"), "STORE_BACKEND", StoreBackend::Postgres)?;
        let database_url = get("DATABASE_URL");

        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(anyhow!("DATABASE_URL deve ser definida"));
        }

        let retry = RetryConfig::new(
            parse_or(get("LEDGER_MAX_ATTEMPTS"), "LEDGER_MAX_ATTEMPTS", 5)?,
            Duration::from_millis(parse_or(get("LEDGER_RETRY_BASE_MS"), "LEDGER_RETRY_BASE_MS", 10)?),
            Duration::from_millis(parse_or(get("LEDGER_RETRY_MAX_MS"), "LEDGER_RETRY_MAX_MS", 200)?),
        );

        let seed_license = match (get("SEED_LICENSE_KEY"), get("SEED_LICENSE_CNPJ")) {
            (Some(key), Some(cnpj)) => Some(SeedLicense {
                key,
                cnpj,
                company_name: get("SEED_LICENSE_COMPANY").unwrap_or_else(|| "Loja Demonstração".to_string()),
            }),
            _ => None,
        };

        Ok(Self {
            store_backend,
            database_url,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            db_max_connections: parse_or(get("DB_MAX_CONNECTIONS"), "DB_MAX_CONNECTIONS", 5)?,
            retry,
            seed_license,
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub ledger: StockLedger,
    pub catalog_service: CatalogService,
    pub report_service: ReportService,
    pub license_service: LicenseService,
}

impl AppState {
    pub async fn new(settings: &Settings) -> anyhow::Result<Self> {
        let store: Arc<dyn LedgerStore> = match settings.store_backend {
            StoreBackend::Postgres => {
                let database_url = settings
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL deve ser definida")?;

                let db_pool = PgPoolOptions::new()
                    .max_connections(settings.db_max_connections)
                    .acquire_timeout(Duration::from_secs(3))
                    .connect(database_url)
                    .await
                    .context("Falha ao conectar ao banco de dados")?;

                tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

                sqlx::migrate!()
                    .run(&db_pool)
                    .await
                    .context("Falha ao rodar as migrações do banco de dados")?;

                tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

                Arc::new(PgLedgerStore::new(db_pool))
            }
            StoreBackend::Memory => {
                let store = MemoryLedgerStore::new();
                if let Some(seed) = &settings.seed_license {
                    store.insert_license(License {
                        key: seed.key.clone(),
                        tenant_id: normalize_cnpj(&seed.cnpj),
                        company_name: seed.company_name.clone(),
                        active: true,
                        expires_at: None,
                        created_at: Utc::now(),
                    })?;
                    tracing::info!("Licença de demonstração registrada para {}", seed.company_name);
                }
                tracing::warn!("⚠️ Backend em memória: os dados somem quando o processo termina.");
                Arc::new(store)
            }
        };

        Ok(Self::with_store(store, settings.retry.clone()))
    }

    // --- Monta o gráfico de dependências ---
    pub fn with_store(store: Arc<dyn LedgerStore>, retry: RetryConfig) -> Self {
        Self {
            ledger: StockLedger::new(store.clone(), retry),
            catalog_service: CatalogService::new(store.clone()),
            report_service: ReportService::new(store.clone()),
            license_service: LicenseService::new(store),
        }
    }
}
