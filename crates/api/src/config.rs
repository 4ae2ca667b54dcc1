//! Process configuration read from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use comptoir_entitlements::PlanCatalog;
use comptoir_infra::EngineConfig;

pub const BIND_ADDR_VAR: &str = "COMPTOIR_BIND_ADDR";
pub const JWT_SECRET_VAR: &str = "JWT_SECRET";
pub const TAX_RATE_VAR: &str = "COMPTOIR_TAX_RATE_BPS";
pub const PLAN_CATALOG_VAR: &str = "COMPTOIR_PLAN_CATALOG";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}: {message}")]
    Invalid { var: &'static str, message: String },

    #[error("cannot read plan catalog {path}: {source}")]
    PlanCatalogIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid plan catalog {path}: {source}")]
    PlanCatalogJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub engine: EngineConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`AppConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = lookup(BIND_ADDR_VAR)
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .map_err(|e| ConfigError::Invalid {
                var: BIND_ADDR_VAR,
                message: format!("{e}"),
            })?;

        let jwt_secret = match lookup(JWT_SECRET_VAR) {
            Some(secret) if !secret.is_empty() => secret,
            _ => {
                tracing::warn!("{JWT_SECRET_VAR} not set; using insecure dev default");
                DEV_JWT_SECRET.to_string()
            }
        };

        let mut engine = EngineConfig::default();
        if let Some(raw) = lookup(TAX_RATE_VAR) {
            engine.tax_rate_bps = raw.trim().parse().map_err(|e| ConfigError::Invalid {
                var: TAX_RATE_VAR,
                message: format!("'{raw}': {e}"),
            })?;
        }
        if let Some(path) = lookup(PLAN_CATALOG_VAR) {
            engine.plan_catalog = load_plan_catalog(PathBuf::from(path))?;
        }

        Ok(Self {
            bind_addr,
            jwt_secret,
            engine,
        })
    }
}

fn load_plan_catalog(path: PathBuf) -> Result<PlanCatalog, ConfigError> {
    let json = std::fs::read_to_string(&path).map_err(|source| ConfigError::PlanCatalogIo {
        path: path.clone(),
        source,
    })?;
    PlanCatalog::from_json(&json).map_err(|source| ConfigError::PlanCatalogJson { path, source })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(cfg.jwt_secret, DEV_JWT_SECRET);
        assert_eq!(cfg.engine.tax_rate_bps, 1_800);
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = config(&[
            (BIND_ADDR_VAR, "127.0.0.1:9000"),
            (JWT_SECRET_VAR, "s3cret"),
            (TAX_RATE_VAR, "2000"),
        ])
        .unwrap();
        assert_eq!(cfg.bind_addr.port(), 9000);
        assert_eq!(cfg.jwt_secret, "s3cret");
        assert_eq!(cfg.engine.tax_rate_bps, 2_000);
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = config(&[(TAX_RATE_VAR, "eighteen")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: TAX_RATE_VAR, .. }));

        let err = config(&[(PLAN_CATALOG_VAR, "/nonexistent/plans.json")]).unwrap_err();
        assert!(matches!(err, ConfigError::PlanCatalogIo { .. }));
    }
}
