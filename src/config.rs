//! Configuration file handling.
//!
//! This module handles loading `.feedlens.toml`, merging it with CLI
//! arguments and checking that the service can start.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::analysis::{AnalysisSettings, PromptSource};
use crate::llm::{OpenAiConfig, RetryPolicy};
use crate::models::ReportLanguage;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".feedlens.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Feedback store settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Model service settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Analysis pipeline settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

/// Feedback store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Directory holding `<name>.sqlite3`, or `:memory:`. Required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Database name.
    #[serde(default = "default_database_name")]
    pub name: String,

    /// Collection holding feedback records.
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            name: default_database_name(),
            collection: default_collection(),
        }
    }
}

fn default_database_name() -> String {
    "feedbacks".to_string()
}

fn default_collection() -> String {
    "customer_feedback".to_string()
}

/// Model service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// API key. Prefer `OPENAI_API_KEY` over writing it here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model name.
    #[serde(default = "default_model")]
    pub name: String,

    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Maximum tokens in the reply.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Retries for transient failures.
    #[serde(default)]
    pub retries: u32,

    /// Ask for a JSON object reply (`response_format`).
    #[serde(default = "default_true")]
    pub json_mode: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            name: default_model(),
            base_url: default_base_url(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_timeout(),
            retries: 0,
            json_mode: true,
        }
    }
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_timeout() -> u64 {
    120
}

fn default_true() -> bool {
    true
}

/// Analysis pipeline settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// `aggregated` (per-team statistics) or `raw` (every record).
    #[serde(default)]
    pub prompt_source: PromptSource,

    /// `arabic` or `english`.
    #[serde(default)]
    pub language: ReportLanguage,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only values given on the command line or through the environment
    /// override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref host) = args.host {
            self.server.host = host.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }

        if let Some(ref url) = args.database_url {
            self.database.url = Some(url.clone());
        }
        if let Some(ref name) = args.database_name {
            self.database.name = name.clone();
        }
        if let Some(ref collection) = args.collection {
            self.database.collection = collection.clone();
        }

        if let Some(ref key) = args.api_key {
            self.model.api_key = Some(key.clone());
        }
        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref base) = args.api_base {
            self.model.base_url = base.clone();
        }
        if let Some(max_tokens) = args.max_tokens {
            self.model.max_tokens = max_tokens;
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }
        if let Some(retries) = args.retries {
            self.model.retries = retries;
        }
        if args.no_json_mode {
            self.model.json_mode = false;
        }

        if let Some(source) = args.prompt_source {
            self.analysis.prompt_source = source;
        }
        if let Some(language) = args.language {
            self.analysis.language = language;
        }
    }

    /// Check everything the service needs before it binds a port.
    pub fn validate(&self) -> Result<()> {
        match self.database.url.as_deref() {
            Some(url) if !url.trim().is_empty() => {}
            _ => bail!("Database URL is required (set DATABASE_URL or --database-url)"),
        }

        match self.model.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => {}
            _ => bail!("Model API key is required (set OPENAI_API_KEY or --api-key)"),
        }

        if self.model.max_tokens == 0 {
            bail!("model.max_tokens must be at least 1");
        }
        if self.model.timeout_seconds == 0 {
            bail!("model.timeout_seconds must be at least 1");
        }

        Ok(())
    }

    /// `host:port` to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Client settings for the model service.
    pub fn openai_config(&self) -> OpenAiConfig {
        OpenAiConfig {
            api_key: self.model.api_key.clone().unwrap_or_default(),
            model: self.model.name.clone(),
            base_url: self.model.base_url.clone(),
            timeout_seconds: self.model.timeout_seconds,
            json_mode: self.model.json_mode,
            retry: RetryPolicy::with_retries(self.model.retries),
        }
    }

    /// Pipeline settings for the analysis service.
    pub fn analysis_settings(&self) -> AnalysisSettings {
        AnalysisSettings {
            source: self.analysis.prompt_source,
            language: self.analysis.language,
            max_tokens: self.model.max_tokens,
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Args;
    use clap::Parser;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.database.url = Some("./data".to_string());
        config.model.api_key = Some("sk-test".to_string());
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.bind_address(), "0.0.0.0:8000");
        assert_eq!(config.database.name, "feedbacks");
        assert_eq!(config.database.collection, "customer_feedback");
        assert_eq!(config.model.name, "gpt-3.5-turbo");
        assert_eq!(config.model.max_tokens, 1000);
        assert_eq!(config.model.timeout_seconds, 120);
        assert_eq!(config.model.retries, 0);
        assert!(config.model.json_mode);
        assert_eq!(config.analysis.prompt_source, PromptSource::Aggregated);
        assert_eq!(config.analysis.language, ReportLanguage::Arabic);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[server]
port = 9000

[database]
url = "/var/lib/feedlens"
collection = "install_feedback"

[model]
name = "gpt-4o-mini"
retries = 2
json_mode = false

[analysis]
prompt_source = "raw"
language = "english"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.database.url.as_deref(), Some("/var/lib/feedlens"));
        assert_eq!(config.database.name, "feedbacks");
        assert_eq!(config.database.collection, "install_feedback");
        assert_eq!(config.model.name, "gpt-4o-mini");
        assert_eq!(config.model.retries, 2);
        assert!(!config.model.json_mode);
        assert_eq!(config.analysis.prompt_source, PromptSource::Raw);
        assert_eq!(config.analysis.language, ReportLanguage::English);
    }

    #[test]
    fn test_merge_only_overrides_given_values() {
        let mut config: Config = toml::from_str(
            r#"
[model]
name = "from-file"
max_tokens = 500
"#,
        )
        .unwrap();
        let args = Args::try_parse_from([
            "feedlens",
            "--max-tokens",
            "1500",
            "--port",
            "8080",
            "--no-json-mode",
        ])
        .unwrap();

        config.merge_with_args(&args);

        assert_eq!(config.model.max_tokens, 1500);
        assert_eq!(config.server.port, 8080);
        assert!(!config.model.json_mode);
        if args.model.is_none() {
            assert_eq!(config.model.name, "from-file");
        }
    }

    #[test]
    fn test_validate_requires_database_url_and_api_key() {
        assert!(valid_config().validate().is_ok());

        let mut config = valid_config();
        config.database.url = None;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("DATABASE_URL"));

        let mut config = valid_config();
        config.model.api_key = Some("  ".to_string());
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("OPENAI_API_KEY"));

        let mut config = valid_config();
        config.model.max_tokens = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_derived_settings() {
        let mut config = valid_config();
        config.model.retries = 3;
        config.model.max_tokens = 700;

        let openai = config.openai_config();
        assert_eq!(openai.api_key, "sk-test");
        assert_eq!(openai.retry.max_retries, 3);
        assert!(openai.json_mode);

        let settings = config.analysis_settings();
        assert_eq!(settings.max_tokens, 700);
        assert_eq!(settings.source, PromptSource::Aggregated);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[server]"));
        assert!(toml_str.contains("[database]"));
        assert!(toml_str.contains("[model]"));
        assert!(toml_str.contains("[analysis]"));
        assert!(!toml_str.contains("api_key"));

        let reparsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.model.name, "gpt-3.5-turbo");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "[server]\nhost = \"127.0.0.1\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");

        std::fs::write(&path, "[server\n").unwrap();
        assert!(Config::load(&path).is_err());
    }
}
