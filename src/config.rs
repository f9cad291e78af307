use std::collections::HashMap;

use config::{Config as ConfigLib, ConfigError, Environment as EnvSource, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub relay: RelayConfig,
    pub environment: Environment,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Delay between the transport starting to listen and the reader
    /// monitor being attached, so a restarted agent gives clients time to
    /// reconnect and set a query before the first card is read.
    pub startup_delay_ms: u64,
    /// Exit the process on a failed card read and let the supervisor
    /// restart it instead of retrying in-process.
    pub exit_on_read_error: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_sources(None)
    }

    pub fn load_with_sources(
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = ConfigLib::builder()
            .set_default("server.host", "localhost")?
            .set_default("server.port", 3000)?
            .set_default("relay.startup_delay_ms", 1500)?
            .set_default("relay.exit_on_read_error", false)?
            .set_default("environment", "development")?
            .add_source(File::with_name("config/settings").required(false));

        // If env_vars is provided, we use it instead of system environment
        // This is to avoid systems variables pollution across tests
        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            // Should be in the format APP_SERVER__HOST or APP_RELAY__STARTUP_DELAY_MS
            builder = builder.add_source(
                EnvSource::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );
            // Shorthand used by process supervisors, takes precedence
            if let Ok(port) = std::env::var("SMC_AGENT_PORT") {
                builder = builder.set_override("server.port", port)?;
            }
        }

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::load().expect("Failed to load config");

        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.relay.startup_delay_ms, 1500);
        assert!(!config.relay.exit_on_read_error);
        assert_eq!(config.environment, Environment::Development);
    }

    #[test]
    fn test_env_config() {
        let mut env_vars = HashMap::new();
        env_vars.insert("server.host".to_string(), "0.0.0.0".to_string());
        env_vars.insert("server.port".to_string(), "8080".to_string());
        env_vars.insert("environment".to_string(), "production".to_string());
        env_vars.insert("relay.exit_on_read_error".to_string(), "true".to_string());

        let config = Config::load_with_sources(Some(env_vars)).expect("Failed to load config");

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert!(config.environment.is_production());
        assert!(config.relay.exit_on_read_error);
    }

    #[test]
    fn test_partial_env_override() {
        let mut env_vars = HashMap::new();
        // We just override the host
        env_vars.insert("server.host".to_string(), "192.168.1.1".to_string());

        let config = Config::load_with_sources(Some(env_vars)).expect("Failed to load config");

        assert_eq!(config.server.host, "192.168.1.1");
        // The other values should use default
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.environment, Environment::Development);
    }
}
