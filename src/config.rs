// src/config.rs

use anyhow::{anyhow, Context};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use std::{env, str::FromStr, sync::Arc, time::Duration};

use crate::{
    common::i18n::I18nStore,
    db::{InMemoryInventoryRepository, InventoryStore, PgInventoryRepository},
    services::{
        alert_service::AlertService,
        auth::AuthService,
        inventory_service::{InventoryService, StockPolicy},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(anyhow!("unknown storage backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub storage: StorageBackend,
    pub policy: StockPolicy,
    pub sweep_interval: Duration,
}

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{} has an invalid value '{}': {}", key, raw, e)),
        Err(_) => Ok(default),
    }
}

impl Settings {
    /// Reads the process environment, after loading `.env` if there is one.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let storage: StorageBackend = env_or("STORAGE", StorageBackend::Postgres)?;
        let database_url = env::var("DATABASE_URL").ok();
        if storage == StorageBackend::Postgres && database_url.is_none() {
            return Err(anyhow!("DATABASE_URL must be set when STORAGE=postgres"));
        }

        Ok(Self {
            database_url,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:3000".to_string())?,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 5)?,
            storage,
            policy: StockPolicy {
                approval_threshold: env_or("APPROVAL_THRESHOLD", Decimal::from(100))?,
                default_reservation_minutes: env_or("DEFAULT_RESERVATION_MINUTES", 30)?,
            },
            sweep_interval: Duration::from_secs(env_or("RESERVATION_SWEEP_INTERVAL_SECS", 60)?),
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub auth_service: AuthService,
    pub inventory_service: InventoryService,
    pub alert_service: AlertService,
    pub i18n_store: Arc<I18nStore>,
}

impl AppState {
    /// Wires the services on top of an already built store.
    pub fn with_store(settings: &Settings, store: Arc<dyn InventoryStore>) -> anyhow::Result<Self> {
        let i18n_store = Arc::new(I18nStore::load()?);
        let auth_service = AuthService::new(settings.jwt_secret.clone());
        let inventory_service = InventoryService::new(store.clone(), settings.policy.clone());
        let alert_service = AlertService::new(store);

        Ok(Self {
            auth_service,
            inventory_service,
            alert_service,
            i18n_store,
        })
    }

    /// Builds the configured store; for Postgres this connects and runs migrations.
    pub async fn connect(settings: Settings) -> anyhow::Result<Self> {
        let store: Arc<dyn InventoryStore> = match settings.storage {
            StorageBackend::Memory => {
                tracing::warn!("⚠️ Using in-memory storage, data is lost on restart");
                Arc::new(InMemoryInventoryRepository::new())
            }
            StorageBackend::Postgres => {
                let database_url = settings
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL must be set when STORAGE=postgres")?;

                let db_pool = PgPoolOptions::new()
                    .max_connections(settings.db_max_connections)
                    .acquire_timeout(Duration::from_secs(3))
                    .connect(database_url)
                    .await
                    .context("failed to connect to the database")?;
                tracing::info!("✅ Database connection established");

                sqlx::migrate!()
                    .run(&db_pool)
                    .await
                    .context("failed to run database migrations")?;
                tracing::info!("✅ Database migrations applied");

                Arc::new(PgInventoryRepository::new(db_pool))
            }
        };

        Self::with_store(&settings, store)
    }
}
