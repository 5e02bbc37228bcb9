use clap::Parser;
use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub connection_string: String,
    pub pool_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    pub connection_string: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub backend: String, // "remote" or "ollama"
    pub model: String,
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PromptConfig {
    /// Instruction template override. When unset the built-in template in
    /// `llm::prompt` is used.
    pub instructions: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub history: HistoryConfig,
    pub web: WebConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        // Every key carries a coded default so the service starts without a file
        let mut config_builder = Config::builder()
            .set_default("database.connection_string", "data.db")?
            .set_default("database.pool_size", 5)?
            .set_default("history.connection_string", "query_history.db")?
            .set_default("web.host", "127.0.0.1")?
            .set_default("web.port", 8000)?
            .set_default(
                "web.cors_origins",
                vec!["http://localhost:3000", "http://localhost:3001"],
            )?
            .set_default("llm.backend", "remote")?
            .set_default("llm.model", "gpt-4")?
            .set_default("llm.timeout_secs", 60)?;

        // Add configuration from file if specified
        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            // Check for config in default locations
            let default_locations = vec![
                "config.toml",
                "config/config.toml",
                "/etc/nl-sql/config.toml",
            ];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        // Build the config
        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        // Override with command line args if provided
        if let Some(host) = &args.host {
            config.web.host = host.clone();
        }
        if let Some(port) = args.port {
            config.web.port = port;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_stand_alone() {
        let args = CliArgs {
            config: None,
            host: None,
            port: None,
        };
        let config = AppConfig::new(&args).expect("defaults should deserialize");
        assert_eq!(config.web.port, 8000);
        assert_eq!(config.database.pool_size, 5);
        assert_eq!(config.llm.backend, "remote");
        assert_eq!(config.llm.timeout_secs, 60);
        assert!(config.prompt.instructions.is_none());
        assert_eq!(config.web.cors_origins.len(), 2);
    }

    #[test]
    fn cli_overrides_win() {
        let args = CliArgs {
            config: None,
            host: Some("0.0.0.0".to_string()),
            port: Some(9100),
        };
        let config = AppConfig::new(&args).unwrap();
        assert_eq!(config.web.host, "0.0.0.0");
        assert_eq!(config.web.port, 9100);
    }
}
