//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which hosted chat-completions endpoint the tutor talks to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelGateway {
    /// api.openai.com or any OpenAI-compatible base URL, bearer-key auth.
    OpenAi {
        api_key: String,
        api_base: Option<String>,
        model: String,
    },
    /// An Azure OpenAI resource; the deployment doubles as the model name.
    Azure {
        endpoint: String,
        api_key: String,
        deployment: String,
        api_version: String,
    },
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub db_max_connections: u32,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    pub openai_api_base: Option<String>,
    pub tutor_model: String,
    pub azure_openai_endpoint: Option<String>,
    pub azure_openai_api_key: Option<String>,
    pub azure_openai_deployment: Option<String>,
    pub azure_openai_api_version: String,
    pub seed_learning_goals: bool,
    pub cors_allowed_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Load Server and Database Settings ---
        let bind_address_str =
            lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:8000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = lookup("DATABASE_URL")
            .unwrap_or_else(|| "sqlite://AdaptiveLearning.db?mode=rwc".to_string());

        let db_max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(raw) => raw.parse::<u32>().ok().filter(|n| *n > 0).ok_or_else(|| {
                ConfigError::InvalidValue(
                    "DB_MAX_CONNECTIONS".to_string(),
                    format!("'{}' is not a positive integer", raw),
                )
            })?,
            None => 5,
        };

        let log_level_str = lookup("LOG_LEVEL").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "LOG_LEVEL".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Model Gateway Settings ---
        let openai_api_key = lookup("OPENAI_API_KEY").filter(|k| !k.is_empty());
        let openai_api_base = lookup("OPENAI_API_BASE").filter(|b| !b.is_empty());
        let tutor_model = lookup("TUTOR_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string());

        let azure_openai_endpoint = lookup("AZURE_OPENAI_ENDPOINT").filter(|v| !v.is_empty());
        let azure_openai_api_key = lookup("AZURE_OPENAI_API_KEY").filter(|v| !v.is_empty());
        let azure_openai_deployment = lookup("AZURE_OPENAI_MODEL_NAME").filter(|v| !v.is_empty());
        let azure_openai_api_version = lookup("AZURE_OPENAI_API_VERSION")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "2024-02-01".to_string());

        let seed_learning_goals = match lookup("SEED_LEARNING_GOALS") {
            Some(raw) => parse_bool("SEED_LEARNING_GOALS", &raw)?,
            None => true,
        };

        let cors_allowed_origin = lookup("CORS_ALLOWED_ORIGIN")
            .unwrap_or_else(|| "http://localhost:3000".to_string());

        Ok(Self {
            bind_address,
            database_url,
            db_max_connections,
            log_level,
            openai_api_key,
            openai_api_base,
            tutor_model,
            azure_openai_endpoint,
            azure_openai_api_key,
            azure_openai_deployment,
            azure_openai_api_version,
            seed_learning_goals,
            cors_allowed_origin,
        })
    }

    /// Picks the model gateway. An Azure endpoint wins; otherwise the plain
    /// OpenAI key is required.
    pub fn model_gateway(&self) -> Result<ModelGateway, ConfigError> {
        if let Some(endpoint) = &self.azure_openai_endpoint {
            return Ok(ModelGateway::Azure {
                endpoint: endpoint.clone(),
                api_key: required(&self.azure_openai_api_key, "AZURE_OPENAI_API_KEY")?,
                deployment: required(&self.azure_openai_deployment, "AZURE_OPENAI_MODEL_NAME")?,
                api_version: self.azure_openai_api_version.clone(),
            });
        }

        Ok(ModelGateway::OpenAi {
            api_key: required(&self.openai_api_key, "OPENAI_API_KEY")?,
            api_base: self.openai_api_base.clone(),
            model: self.tutor_model.clone(),
        })
    }
}

fn required(value: &Option<String>, key: &str) -> Result<String, ConfigError> {
    value
        .clone()
        .ok_or_else(|| ConfigError::MissingVar(key.to_string()))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue(
            key.to_string(),
            format!("'{}' is not a boolean", raw),
        )),
    }
}
