use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Includes settings for the HTTP server, the broker and logging.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
    pub logging: LoggingSettings,
}

/// Configuration settings for the server.
///
/// Defines the bind address and the CORS headers sent on every response.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origin: String,
    pub cors_max_age_secs: u64,
}

/// Configuration settings for the broker and its streaming sessions.
#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSettings {
    /// Pending messages a subscriber may hold before new ones are dropped.
    pub mailbox_capacity: usize,
    /// How long a stream may stay open without a live message.
    pub max_connection_secs: u64,
    /// How often an open stream checks its idle timeout.
    pub tick_interval_ms: u64,
}

impl BrokerSettings {
    pub fn max_connection_duration(&self) -> Duration {
        Duration::from_secs(self.max_connection_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub cors_allowed_origin: Option<String>,
    pub cors_max_age_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub mailbox_capacity: Option<usize>,
    pub max_connection_secs: Option<u64>,
    pub tick_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

/// Provides default values for `Settings`.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
                cors_allowed_origin: "*".to_string(),
                cors_max_age_secs: 300,
            },
            broker: BrokerSettings {
                mailbox_capacity: 100,
                max_connection_secs: 30,
                tick_interval_ms: 1000,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl PartialSettings {
    /// Fill every missing value from `default`.
    pub fn merge(self, default: Settings) -> Settings {
        let server = self.server;
        let broker = self.broker;
        let logging = self.logging;

        Settings {
            server: ServerSettings {
                host: server
                    .as_ref()
                    .and_then(|s| s.host.clone())
                    .unwrap_or(default.server.host),
                port: server
                    .as_ref()
                    .and_then(|s| s.port)
                    .unwrap_or(default.server.port),
                cors_allowed_origin: server
                    .as_ref()
                    .and_then(|s| s.cors_allowed_origin.clone())
                    .unwrap_or(default.server.cors_allowed_origin),
                cors_max_age_secs: server
                    .as_ref()
                    .and_then(|s| s.cors_max_age_secs)
                    .unwrap_or(default.server.cors_max_age_secs),
            },
            broker: BrokerSettings {
                mailbox_capacity: broker
                    .as_ref()
                    .and_then(|b| b.mailbox_capacity)
                    .unwrap_or(default.broker.mailbox_capacity),
                max_connection_secs: broker
                    .as_ref()
                    .and_then(|b| b.max_connection_secs)
                    .unwrap_or(default.broker.max_connection_secs),
                tick_interval_ms: broker
                    .as_ref()
                    .and_then(|b| b.tick_interval_ms)
                    .unwrap_or(default.broker.tick_interval_ms),
            },
            logging: LoggingSettings {
                level: logging
                    .and_then(|l| l.level)
                    .unwrap_or(default.logging.level),
            },
        }
    }
}
