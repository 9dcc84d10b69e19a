use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::errors::{PredictorError, PredictorResult};

pub const DEFAULT_CONFIG_FILE: &str = "carprice.toml";
pub const ENV_PREFIX: &str = "CARPRICE_";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub artifact_dir: PathBuf,
    pub allowed_origins: Vec<String>,
    pub log_level: String,
    /// Year the legacy `age` feature is measured from.
    pub reference_year: i32,
    #[serde(default)]
    pub extra_aliases: BTreeMap<String, Vec<String>>,
}

fn default_origins() -> Vec<String> {
    [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:8080",
        "http://localhost:8081",
        "http://127.0.0.1:8081",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ]
    .iter()
    .map(|o| o.to_string())
    .collect()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            host: "0.0.0.0".to_string(),
            port: 8002,
            artifact_dir: PathBuf::from("models"),
            allowed_origins: default_origins(),
            log_level: "info".to_string(),
            reference_year: 2024,
            extra_aliases: BTreeMap::new(),
        }
    }
}

impl ServiceConfig {
    pub fn validate(&self) -> PredictorResult<()> {
        if self.host.trim().is_empty() {
            return Err(PredictorError::config("host cannot be empty"));
        }
        if self.port == 0 {
            return Err(PredictorError::config("port must be non-zero"));
        }
        if self.artifact_dir.as_os_str().is_empty() {
            return Err(PredictorError::config("artifact_dir cannot be empty"));
        }
        if !(1900..=2100).contains(&self.reference_year) {
            return Err(PredictorError::config(format!(
                "reference_year {} is out of range",
                self.reference_year
            )));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Defaults, then the TOML file, then `CARPRICE_*` environment variables.
pub fn figment(path: Option<&Path>) -> Figment {
    let file = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    Figment::from(Serialized::defaults(ServiceConfig::default()))
        .merge(Toml::file(file))
        .merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]))
}

pub fn load_config(path: Option<&Path>) -> PredictorResult<ServiceConfig> {
    let config: ServiceConfig = figment(path).extract()?;
    config.validate()?;
    Ok(config)
}
