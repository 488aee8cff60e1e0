use anyhow::{Context, Result};
use clap::ArgMatches;
use config::{Config as ConfigBuilder, Environment, File, FileFormat, Map};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Complete configuration that merges CLI args, env vars, the config file and
/// defaults
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PressConfig {
    /// Site configuration (from press-core)
    #[serde(flatten)]
    pub site: press_core::Config,
    /// Development server settings
    #[serde(default)]
    pub serve: ServeConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Host for dev server
    pub host: String,
    /// Port for dev server
    pub port: u16,
    /// Open browser automatically
    pub open: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            open: false,
        }
    }
}

impl PressConfig {
    /// Load configuration with cascading precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Environment variables (PRESS_*)
    /// 3. Configuration file
    /// 4. Defaults (lowest priority)
    pub fn load(args: &ArgMatches) -> Result<Self> {
        Self::load_with_env(args, None)
    }

    /// Like [`PressConfig::load`], reading variables from `env` instead of
    /// the process environment when given.
    pub fn load_with_env(args: &ArgMatches, env: Option<Map<String, String>>) -> Result<Self> {
        let config_file = args
            .try_get_one::<String>("config")
            .unwrap_or(None)
            .map(String::as_str)
            .unwrap_or(DEFAULT_CONFIG_FILE);

        let mut builder = ConfigBuilder::builder();

        // 1. Start with defaults
        builder = builder.add_source(ConfigBuilder::try_from(&Self::default())?);

        // 2. Add configuration file if it exists
        if Path::new(config_file).exists() {
            builder = builder.add_source(File::new(config_file, FileFormat::Toml));
        } else if args.value_source("config") == Some(clap::parser::ValueSource::CommandLine) {
            anyhow::bail!("config file {} does not exist", config_file);
        } else {
            log::warn!(target: "press", "No {} found, using defaults", config_file);
        }

        // 3. Add environment variables with PRESS_ prefix
        builder = builder.add_source(
            Environment::with_prefix("PRESS")
                .prefix_separator("_")
                .separator("__") // Use double underscore for nested keys
                .try_parsing(true)
                .source(env),
        );

        // 4. Override with CLI arguments (highest priority)
        if let Some(output) = args.try_get_one::<String>("output").unwrap_or(None) {
            builder = builder.set_override("directories.output", output.as_str())?;
        }
        if let Some(host) = args.try_get_one::<String>("host").unwrap_or(None) {
            builder = builder.set_override("serve.host", host.as_str())?;
        }
        if let Some(port) = args.try_get_one::<u16>("port").unwrap_or(None) {
            builder = builder.set_override("serve.port", i64::from(*port))?;
        }
        if args.try_get_one::<bool>("open").unwrap_or(None) == Some(&true) {
            builder = builder.set_override("serve.open", true)?;
        }

        let mut config: PressConfig = builder
            .build()?
            .try_deserialize()
            .with_context(|| format!("could not read {}", config_file))?;
        config.site = config.site.validate().context("invalid configuration")?;

        Ok(config)
    }
}
