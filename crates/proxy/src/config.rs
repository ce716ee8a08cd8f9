// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Server configuration module
//!
//! Settings are layered: built-in defaults, `config.json`,
//! `config.{environment}.json`, then `SERVER_*` environment variables. The
//! engine settings live under the `balancer` key and nested environment keys
//! use a double underscore, e.g. `SERVER_BALANCER__MAX_RETRIES=5`. `PORT`
//! overrides the listening port.

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::Path,
    time::Duration,
};

use anyhow::{Result, anyhow, ensure};
use balancer::BalancerConfig;
use config::{Config, ConfigError, Environment as ConfigEnv, File};
use serde::{Deserialize, Deserializer, Serialize, de};
use utoipa::ToSchema;

use crate::error::{ServerError, ServerResult};

/// Port used when neither the configuration nor `PORT` sets one
pub const DEFAULT_PORT: u16 = 3001;

/// Largest accepted request body
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

/// A validated server port that ensures the value is appropriate for the environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServerPort {
    port: u16,
    environment: Environment,
}

impl ServerPort {
    /// Create a new `ServerPort`, ensuring it's valid for the given environment
    ///
    /// # Errors
    ///
    /// Returns an error if the port is 0 in non-testing environments
    pub fn new(port: u16, environment: Environment) -> Result<Self> {
        if port == 0 && environment != Environment::Testing {
            return Err(anyhow!("port cannot be 0 in non-testing environments"));
        }
        Ok(Self { port, environment })
    }

    /// Default listening port
    pub const fn default_development() -> Self {
        Self {
            port: DEFAULT_PORT,
            environment: Environment::Development,
        }
    }

    /// Let the OS pick a port
    pub const fn testing() -> Self {
        Self {
            port: 0,
            environment: Environment::Testing,
        }
    }

    /// Get the port value
    pub fn value(&self) -> u16 {
        self.port
    }
}

impl<'de> Deserialize<'de> for ServerPort {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let port = u16::deserialize(deserializer)?;
        // re-validated in `load_from` once the environment is known
        Ok(Self {
            port,
            environment: Environment::Development,
        })
    }
}

/// Deadline for a whole inbound request, retries and backoff included
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeoutSeconds(Duration);

impl TimeoutSeconds {
    /// Create a new `TimeoutSeconds`, ensuring the value is within valid bounds
    ///
    /// # Errors
    ///
    /// Returns an error if timeout is 0 or greater than 300 seconds
    pub fn new(seconds: u64) -> Result<Self> {
        ensure!(seconds != 0, "timeout must be greater than 0");
        ensure!(seconds <= 300, "timeout cannot exceed 300");
        Ok(Self(Duration::from_secs(seconds)))
    }

    /// Default deadline, long enough for three upstream timeouts plus backoff
    pub const fn default_value() -> Self {
        Self(Duration::from_secs(120))
    }

    /// Short deadline for tests
    pub const fn testing() -> Self {
        Self(Duration::from_secs(10))
    }

    /// Get the timeout value
    pub fn value(&self) -> Duration {
        self.0
    }
}

impl<'de> Deserialize<'de> for TimeoutSeconds {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let seconds = u64::deserialize(deserializer)?;
        Self::new(seconds).map_err(|e| de::Error::custom(e.to_string()))
    }
}

impl Default for TimeoutSeconds {
    fn default() -> Self {
        Self::default_value()
    }
}

/// Environment types for configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Production environment
    Production,
    /// Development environment
    Development,
    /// Testing environment
    Testing,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address
    pub host: IpAddr,
    /// Server port (validated for environment compatibility)
    pub port: ServerPort,
    /// Request timeout in seconds (validated range: 1-300)
    pub timeout_seconds: TimeoutSeconds,
    /// Largest accepted request body in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
    /// Environment type
    pub environment: Environment,
    /// Provider pool and engine tuning
    #[serde(default)]
    pub balancer: BalancerConfig,
}

fn default_body_limit() -> usize {
    DEFAULT_BODY_LIMIT_BYTES
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: ServerPort::default_development(),
            timeout_seconds: TimeoutSeconds::default(),
            body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
            environment: Environment::Development,
            balancer: BalancerConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create configuration from environment variables and optional configuration files
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Config` if configuration is invalid or cannot be loaded.
    pub fn from_env() -> ServerResult<Self> {
        Self::load().map_err(|e| ServerError::Config {
            message: format!("failed to load configuration: {e}"),
        })
    }

    /// Load configuration from the working directory and process environment
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("ENVIRONMENT").ok();
        let port = match std::env::var("PORT") {
            Ok(raw) => Some(raw.parse::<u16>().map_err(|e| {
                ConfigError::Message(format!("invalid PORT '{raw}': {e}"))
            })?),
            Err(_) => None,
        };
        Self::load_from(Path::new("."), environment.as_deref(), port)
    }

    /// Load configuration with files resolved against `dir`
    ///
    /// Configuration is loaded in the following order (later sources override earlier ones):
    /// 1. Default values
    /// 2. `config.json`
    /// 3. `config.{environment}.json`
    /// 4. Environment variables with `SERVER_` prefix
    /// 5. `port`, when given
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded, fails to
    /// deserialize, or describes an unusable provider pool.
    pub fn load_from(
        dir: &Path,
        environment: Option<&str>,
        port: Option<u16>,
    ) -> Result<Self, ConfigError> {
        let env_name = environment.unwrap_or("development").to_lowercase();

        let mut builder = Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", i64::from(DEFAULT_PORT))?
            .set_default("timeout_seconds", 120)?
            .set_default("environment", "development")?
            .add_source(File::from(dir.join("config.json")).required(false))
            .add_source(File::from(dir.join(format!("config.{env_name}.json"))).required(false))
            .add_source(
                ConfigEnv::with_prefix("SERVER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        if environment.is_some() {
            builder = builder.set_override("environment", env_name)?;
        }
        if let Some(port) = port {
            builder = builder.set_override("port", i64::from(port))?;
        }

        let mut server_config: Self = builder.build()?.try_deserialize()?;

        server_config.port = ServerPort::new(server_config.port.value(), server_config.environment)
            .map_err(|e| ConfigError::Message(format!("invalid port configuration: {e}")))?;

        if server_config.body_limit_bytes == 0 {
            return Err(ConfigError::Message(
                "body_limit_bytes must be greater than zero".to_string(),
            ));
        }

        server_config
            .balancer
            .validate()
            .map_err(|e| ConfigError::Message(format!("invalid balancer configuration: {e}")))?;

        Ok(server_config)
    }

    /// Configuration for tests: loopback, OS-assigned port, the given pool
    pub fn for_testing(balancer: BalancerConfig) -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: ServerPort::testing(),
            timeout_seconds: TimeoutSeconds::testing(),
            body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
            environment: Environment::Testing,
            balancer,
        }
    }

    /// Get socket address for binding
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port.value())
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Production => write!(f, "production"),
            Environment::Development => write!(f, "development"),
            Environment::Testing => write!(f, "testing"),
        }
    }
}
