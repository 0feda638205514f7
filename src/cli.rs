//! Command-line interface argument parsing.
//!
//! Every setting can also come from the environment (a `.env` file is loaded
//! before parsing) or from `.feedlens.toml`. Flags and environment win over
//! the config file, which wins over built-in defaults.

use crate::analysis::PromptSource;
use crate::models::ReportLanguage;
use clap::Parser;
use std::path::PathBuf;

/// FeedLens - customer feedback service with AI team analysis
///
/// Stores post-installation feedback for field teams and asks a hosted
/// language model for a ranked performance report.
///
/// Examples:
///   feedlens --database-url ./data --api-key sk-...
///   feedlens --port 9000 --language english --prompt-source raw
///   feedlens --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Address to bind the HTTP server to
    #[arg(long, value_name = "ADDR", env = "FEEDLENS_HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "FEEDLENS_PORT")]
    pub port: Option<u16>,

    /// Directory holding the database files, or ":memory:"
    #[arg(long, value_name = "URL", env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Database name (file name inside the database directory)
    #[arg(long, value_name = "NAME", env = "DATABASE_NAME")]
    pub database_name: Option<String>,

    /// Collection holding feedback records
    #[arg(long, value_name = "NAME", env = "COLLECTION_NAME")]
    pub collection: Option<String>,

    /// API key for the model service
    #[arg(long, value_name = "KEY", env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model used for analysis
    #[arg(short, long, env = "OPENAI_MODEL")]
    pub model: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, value_name = "URL", env = "OPENAI_BASE_URL")]
    pub api_base: Option<String>,

    /// Maximum tokens in the model reply
    #[arg(long, value_name = "COUNT", env = "MAX_TOKENS")]
    pub max_tokens: Option<u32>,

    /// Model request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Retries for transient model failures (timeouts, 429, 5xx)
    #[arg(long, value_name = "COUNT")]
    pub retries: Option<u32>,

    /// Data sent to the model: raw records or per-team aggregates
    #[arg(long, value_name = "SOURCE")]
    pub prompt_source: Option<PromptSource>,

    /// Language of the report narrative
    #[arg(long, value_name = "LANG")]
    pub language: Option<ReportLanguage>,

    /// Do not request a JSON object reply from the model
    ///
    /// Some OpenAI-compatible servers reject `response_format`.
    #[arg(long)]
    pub no_json_mode: bool,

    /// Path to configuration file
    ///
    /// If not specified, looks for .feedlens.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .feedlens.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref base) = self.api_base {
            if !base.starts_with("http://") && !base.starts_with("https://") {
                return Err("API base URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.max_tokens == Some(0) {
            return Err("Max tokens must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
