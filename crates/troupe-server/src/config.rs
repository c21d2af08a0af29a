//! Server configuration.

use serde::{Deserialize, Serialize};
use troupe_settings::{ScriptSettings, TroupeSettings};

/// Configuration for the HTTP bridge.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (`0` for auto-assign).
    pub port: u16,
    /// Seconds to wait for a background run to finish on shutdown.
    pub shutdown_timeout_secs: u64,
    /// Round defaults and limits for `start-conversation`.
    pub script: ScriptSettings,
}

impl ServerConfig {
    /// Take the bind address and round limits from loaded settings.
    pub fn from_settings(settings: &TroupeSettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            script: settings.script.clone(),
            ..Self::default()
        }
    }

    /// `host:port` string suitable for `TcpListener::bind`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Rounds to run for a request, defaulted and clamped.
    pub fn rounds_for(&self, requested: Option<u32>) -> u32 {
        self.script.clamp_rounds(requested)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            shutdown_timeout_secs: 10,
            script: ScriptSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binds_loopback_auto_port() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind_addr(), "127.0.0.1:0");
    }

    #[test]
    fn from_settings_copies_bind_address() {
        let mut settings = TroupeSettings::default();
        settings.server.host = "0.0.0.0".into();
        settings.server.port = 9100;
        let cfg = ServerConfig::from_settings(&settings);
        assert_eq!(cfg.bind_addr(), "0.0.0.0:9100");
        assert_eq!(cfg.shutdown_timeout_secs, 10);
    }

    #[test]
    fn rounds_are_clamped() {
        let mut cfg = ServerConfig::default();
        cfg.script.default_rounds = 3;
        cfg.script.max_rounds = 8;
        assert_eq!(cfg.rounds_for(None), 3);
        assert_eq!(cfg.rounds_for(Some(6)), 6);
        assert_eq!(cfg.rounds_for(Some(80)), 8);
    }
}
