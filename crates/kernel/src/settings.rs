use std::path::PathBuf;

use anyhow::{anyhow, Context};
use serde::Deserialize;

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "BOOKSHELF_ENV";
const CONFIG_DIR_ENV: &str = "BOOKSHELF_CONFIG_DIR";
const ENV_PREFIX: &str = "BOOKSHELF";
/// Conventional variable carrying the Airtable access token.
pub const TOKEN_ENV: &str = "AIRTABLE_TOKEN";

/// Deployment environment the application is running in.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub airtable: AirtableSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, environment overlay,
    /// and `BOOKSHELF__SECTION__KEY` variables.
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_dir = match std::env::var(CONFIG_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => std::env::current_dir()
                .context("unable to resolve current directory")?
                .join("config"),
        };

        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", environment));

        let cfg = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        settings.environment = parse_environment(&environment)?;

        if settings.airtable.token.is_none() {
            settings.airtable.token = std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty());
        }

        Ok(settings)
    }
}

fn parse_environment(value: &str) -> anyhow::Result<Environment> {
    match value {
        "local" => Ok(Environment::Local),
        "staging" => Ok(Environment::Staging),
        "production" => Ok(Environment::Production),
        other => Err(anyhow!(
            "unsupported environment '{}'; expected local/staging/production",
            other
        )),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
    #[serde(default = "ServerSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ServerSettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8080
    }

    fn default_request_timeout_ms() -> u64 {
        15000
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            request_timeout_ms: Self::default_request_timeout_ms(),
        }
    }
}

/// Location of the book review table and the credential used to reach it.
#[derive(Clone, Deserialize)]
pub struct AirtableSettings {
    #[serde(default = "AirtableSettings::default_api_url")]
    pub api_url: String,
    #[serde(default = "AirtableSettings::default_base_id")]
    pub base_id: String,
    #[serde(default = "AirtableSettings::default_table_id")]
    pub table_id: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "AirtableSettings::default_timeout_ms")]
    pub timeout_ms: u64,
}

impl AirtableSettings {
    fn default_api_url() -> String {
        "https://api.airtable.com/v0".to_string()
    }

    fn default_base_id() -> String {
        "appi1uzlLKn1TEKSw".to_string()
    }

    fn default_table_id() -> String {
        "tblvMMAVHo901m2Ra".to_string()
    }

    fn default_timeout_ms() -> u64 {
        10000
    }

    /// The access token, or an error naming where it should come from.
    pub fn require_token(&self) -> anyhow::Result<&str> {
        self.token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "missing Airtable access token; set {} or {}__AIRTABLE__TOKEN",
                    TOKEN_ENV,
                    ENV_PREFIX
                )
            })
    }
}

impl Default for AirtableSettings {
    fn default() -> Self {
        Self {
            api_url: Self::default_api_url(),
            base_id: Self::default_base_id(),
            table_id: Self::default_table_id(),
            token: None,
            timeout_ms: Self::default_timeout_ms(),
        }
    }
}

// Hand-written so the token never lands in logs.
impl std::fmt::Debug for AirtableSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AirtableSettings")
            .field("api_url", &self.api_url)
            .field("base_id", &self.base_id)
            .field("table_id", &self.table_id)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    /// Default `tracing` filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "TelemetrySettings::default_filter")]
    pub filter: String,
}

impl TelemetrySettings {
    fn default_filter() -> String {
        "info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            filter: Self::default_filter(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}
