// src/config.rs

use std::{str::FromStr, sync::Arc, time::Duration};

use axum::extract::FromRef;
use rust_decimal::Decimal;
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;

use crate::{
    db::PgStore,
    middleware::auth::SharedAuthenticator,
    models::catalog::validate_percentage,
    services::{
        notification::{LogNotifier, SharedNotifier},
        CatalogService, InvoiceService, JwtAuthenticator, PricingEngine, ServiceRecordService,
        UserService,
    },
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} deve ser definida")]
    Missing(&'static str),

    #[error("valor inválido para {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
    pub default_tax_percentage: Decimal,
    pub token_ttl: chrono::Duration,
    pub bind_address: String,
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

impl Config {
    /// Lê a configuração de qualquer fonte chave → valor (env, mapa de teste).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET")?;

        let db_max_connections: u32 = parse_or(&lookup, "DB_MAX_CONNECTIONS", 5)?;
        let acquire_secs: u64 = parse_or(&lookup, "DB_ACQUIRE_TIMEOUT_SECS", 3)?;
        let token_ttl_hours: i64 = parse_or(&lookup, "TOKEN_TTL_HOURS", 168)?;
        let default_tax_percentage: Decimal =
            parse_or(&lookup, "DEFAULT_TAX_PERCENTAGE", Decimal::TEN)?;
        let bind_address = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());

        if validate_percentage(&default_tax_percentage).is_err() {
            return Err(ConfigError::Invalid {
                key: "DEFAULT_TAX_PERCENTAGE",
                value: default_tax_percentage.to_string(),
                reason: "must be between 0 and 100 with at most 4 decimals".into(),
            });
        }
        if token_ttl_hours <= 0 {
            return Err(ConfigError::Invalid {
                key: "TOKEN_TTL_HOURS",
                value: token_ttl_hours.to_string(),
                reason: "must be positive".into(),
            });
        }

        Ok(Self {
            database_url,
            jwt_secret,
            db_max_connections,
            db_acquire_timeout: Duration::from_secs(acquire_secs),
            default_tax_percentage,
            token_ttl: chrono::Duration::hours(token_ttl_hours),
            bind_address,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub authenticator: SharedAuthenticator,
    pub catalog_service: CatalogService<PgStore>,
    pub invoice_service: InvoiceService<PgStore>,
    pub service_record_service: ServiceRecordService<PgStore>,
    pub user_service: UserService<PgStore>,
}

impl AppState {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let db_pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(config.db_acquire_timeout)
            .connect(&config.database_url)
            .await?;
        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        sqlx::migrate!().run(&db_pool).await?;
        tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

        // --- Monta o gráfico de dependências ---
        let store = PgStore::new(db_pool.clone());
        let notifier: SharedNotifier = Arc::new(LogNotifier);
        let pricing = PricingEngine::new(config.default_tax_percentage);
        let authenticator: SharedAuthenticator =
            Arc::new(JwtAuthenticator::new(config.jwt_secret.clone(), config.token_ttl));

        Ok(Self {
            catalog_service: CatalogService::new(store.clone()),
            invoice_service: InvoiceService::new(store.clone(), pricing, notifier.clone()),
            service_record_service: ServiceRecordService::new(store.clone()),
            user_service: UserService::new(store, notifier),
            authenticator,
            db_pool,
        })
    }
}

impl FromRef<AppState> for SharedAuthenticator {
    fn from_ref(state: &AppState) -> Self {
        state.authenticator.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_required_keys_are_set() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/pos"),
            ("JWT_SECRET", "segredo"),
        ]))
        .unwrap();

        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.db_acquire_timeout, Duration::from_secs(3));
        assert_eq!(config.default_tax_percentage, Decimal::TEN);
        assert_eq!(config.token_ttl, chrono::Duration::hours(168));
        assert_eq!(config.bind_address, "0.0.0.0:3000");
    }

    #[test]
    fn missing_and_invalid_keys_are_reported() {
        assert_eq!(
            Config::from_lookup(lookup(&[("JWT_SECRET", "x")])).unwrap_err(),
            ConfigError::Missing("DATABASE_URL")
        );

        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/pos"),
            ("JWT_SECRET", "x"),
            ("DEFAULT_TAX_PERCENTAGE", "150"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "DEFAULT_TAX_PERCENTAGE", .. }));

        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/pos"),
            ("JWT_SECRET", "x"),
            ("DEFAULT_TAX_PERCENTAGE", "12.34567"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "DEFAULT_TAX_PERCENTAGE", .. }));

        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/pos"),
            ("JWT_SECRET", "x"),
            ("DB_MAX_CONNECTIONS", "muitas"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "DB_MAX_CONNECTIONS", .. }));
    }
}
