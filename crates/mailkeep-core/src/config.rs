//! Account and operation configuration.

use std::fmt;
use std::time::Duration;

use chrono::NaiveDate;
use mailkeep_imap::{Config, SearchCriteria};
use mailkeep_mime::date::search_date;
use serde::{Deserialize, Serialize};

/// Reconnection policy for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Reconnect attempts before giving up.
    pub max_attempts: u32,
    /// Delay before the first retry; doubled after each failed attempt.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(20),
        }
    }
}

impl RetryPolicy {
    /// Returns the delay after the given failed attempt (1-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Everything needed to reach one account.
#[derive(Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Login name, usually the full address.
    pub username: String,
    /// Password or app password. Never serialized.
    #[serde(skip_serializing, default)]
    pub password: String,
    /// Server connection settings.
    pub server: Config,
    /// Folder-name profile key; detected from the folder list when unset.
    pub profile: Option<String>,
    /// Reconnection policy.
    pub retry: RetryPolicy,
    /// How often a failing label is re-selected before it is skipped.
    pub label_retries: u32,
}

impl fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("server", &self.server)
            .field("profile", &self.profile)
            .field("retry", &self.retry)
            .field("label_retries", &self.label_retries)
            .finish()
    }
}

impl AccountConfig {
    /// Creates a Gmail account configuration with default settings.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        AccountConfigBuilder::new(username, password).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> AccountConfigBuilder {
        AccountConfigBuilder::new(username, password)
    }
}

/// Builder for [`AccountConfig`].
#[derive(Debug, Clone)]
pub struct AccountConfigBuilder {
    config: AccountConfig,
}

impl AccountConfigBuilder {
    /// Starts from Gmail defaults.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            config: AccountConfig {
                username: username.into(),
                password: password.into(),
                server: Config::default(),
                profile: None,
                retry: RetryPolicy::default(),
                label_retries: 5,
            },
        }
    }

    /// Sets the server connection settings.
    #[must_use]
    pub fn server(mut self, server: Config) -> Self {
        self.config.server = server;
        self
    }

    /// Fixes the folder-name profile instead of detecting it.
    #[must_use]
    pub fn profile(mut self, key: impl Into<String>) -> Self {
        self.config.profile = Some(key.into());
        self
    }

    /// Sets the reconnection policy.
    #[must_use]
    pub const fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    /// Sets the per-label retry count.
    #[must_use]
    pub const fn label_retries(mut self, retries: u32) -> Self {
        self.config.label_retries = retries;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> AccountConfig {
        self.config
    }
}

/// Optional sent-date bounds: `since` inclusive, `before` exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchWindow {
    /// Earliest date to include.
    pub since: Option<NaiveDate>,
    /// First date to exclude.
    pub before: Option<NaiveDate>,
}

impl SearchWindow {
    /// A window with no bounds.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            since: None,
            before: None,
        }
    }

    /// Replaces the lower bound.
    #[must_use]
    pub const fn with_since(mut self, since: NaiveDate) -> Self {
        self.since = Some(since);
        self
    }

    /// Replaces the upper bound.
    #[must_use]
    pub const fn with_before(mut self, before: NaiveDate) -> Self {
        self.before = Some(before);
        self
    }

    /// Builds the SEARCH criteria for this window.
    #[must_use]
    pub fn criteria(&self) -> SearchCriteria {
        let mut terms = Vec::new();
        if let Some(since) = self.since {
            terms.push(SearchCriteria::Since(search_date(since)));
        }
        if let Some(before) = self.before {
            terms.push(SearchCriteria::Before(search_date(before)));
        }
        match terms.len() {
            0 => SearchCriteria::All,
            1 => terms.remove(0),
            _ => SearchCriteria::And(terms),
        }
    }
}

/// Options for a backup run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupOptions {
    /// Which messages to back up.
    pub window: SearchWindow,
    /// Start from the stored watermark, replacing `window.since`.
    pub incremental: bool,
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

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_retry_delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(1), Duration::from_secs(20));
        assert_eq!(policy.delay(2), Duration::from_secs(40));
        assert_eq!(policy.delay(5), Duration::from_secs(320));
        assert!(policy.delay(200) >= policy.delay(5));
    }

    #[test]
    fn test_account_defaults() {
        let account = AccountConfig::new("me@gmail.com", "pw");
        assert_eq!(account.server.host, "imap.gmail.com");
        assert_eq!(account.server.port, 993);
        assert_eq!(account.retry.max_attempts, 5);
        assert_eq!(account.label_retries, 5);
        assert!(account.profile.is_none());
    }

    #[test]
    fn test_builder() {
        let account = AccountConfig::builder("me@gmail.com", "pw")
            .profile("cs")
            .label_retries(1)
            .retry(RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(10),
            })
            .server(Config::builder("localhost").port(1143).build())
            .build();
        assert_eq!(account.profile.as_deref(), Some("cs"));
        assert_eq!(account.label_retries, 1);
        assert_eq!(account.retry.max_attempts, 2);
        assert_eq!(account.server.port, 1143);
    }

    #[test]
    fn test_password_redacted() {
        let account = AccountConfig::new("me@gmail.com", "hunter2");
        assert!(!format!("{account:?}").contains("hunter2"));

        let json = serde_json::to_string(&account).unwrap();
        assert!(!json.contains("hunter2"));
        let back: AccountConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.username, "me@gmail.com");
        assert!(back.password.is_empty());
    }

    #[test]
    fn test_window_criteria() {
        assert_eq!(SearchWindow::all().criteria(), SearchCriteria::All);
        assert_eq!(
            SearchWindow::all().with_since(date(2020, 5, 1)).criteria(),
            SearchCriteria::Since("01-May-2020".into())
        );
        assert_eq!(
            SearchWindow::all()
                .with_since(date(2020, 1, 1))
                .with_before(date(2020, 2, 3))
                .criteria(),
            SearchCriteria::And(vec![
                SearchCriteria::Since("01-Jan-2020".into()),
                SearchCriteria::Before("03-Feb-2020".into()),
            ])
        );
    }
}
