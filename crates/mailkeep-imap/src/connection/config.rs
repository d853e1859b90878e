//! Where and how to connect.

use std::time::Duration;

/// Transport security.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Security {
    /// Plain TCP on 143. For local test servers only.
    None,
    /// TLS from the first byte, on 993. Gmail accepts nothing else.
    #[default]
    Implicit,
}

impl Security {
    /// The well-known port for this mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        if matches!(self, Self::None) { 143 } else { 993 }
    }
}

/// Server endpoint and timeouts.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Host name, also used for certificate verification.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Transport security.
    pub security: Security,
    /// Limit on TCP connect plus TLS handshake.
    pub connect_timeout: Duration,
    /// Limit on a single socket read or write that moves no data.
    pub io_timeout: Duration,
}

impl Config {
    /// Gmail's IMAP endpoint.
    pub const GMAIL_HOST: &'static str = "imap.gmail.com";

    /// Implicit TLS to `host` on 993 with default timeouts.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self::builder(host).build()
    }

    /// Starts a builder for `host`.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder {
            host: host.into(),
            port: None,
            security: Security::default(),
            connect_timeout: Duration::from_secs(30),
            io_timeout: Duration::from_secs(60),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::GMAIL_HOST)
    }
}

/// Builder for [`Config`]. The port follows the security mode unless set.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl ConfigBuilder {
    /// Overrides the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the transport security.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, limit: Duration) -> Self {
        self.connect_timeout = limit;
        self
    }

    /// Sets the per-command timeout.
    #[must_use]
    pub const fn io_timeout(mut self, limit: Duration) -> Self {
        self.io_timeout = limit;
        self
    }

    /// Finishes the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        Config {
            port: self.port.unwrap_or(self.security.default_port()),
            host: self.host,
            security: self.security,
            connect_timeout: self.connect_timeout,
            io_timeout: self.io_timeout,
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_default_targets_gmail() {
        let config = Config::default();
        assert_eq!(
            (config.host.as_str(), config.port, config.security),
            ("imap.gmail.com", 993, Security::Implicit)
        );
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.io_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_port_follows_security() {
        let config = Config::builder("localhost")
            .security(Security::None)
            .io_timeout(Duration::from_secs(5))
            .build();
        assert_eq!(config.port, 143);
        assert_eq!(config.io_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_explicit_port_wins() {
        let config = Config::builder("localhost")
            .port(1143)
            .security(Security::None)
            .build();
        assert_eq!(config.port, 1143);
    }
}
