//! Editor session configuration.
//!
//! # Responsibility
//! - Hold tunables for debounced persistence and teardown behavior.
//! - Read optional overrides from the process environment.
//!
//! # Invariants
//! - `save_quiet_period_ms` is within `1..=MAX_QUIET_PERIOD_MS`.
//! - `max_save_retries` is at most `MAX_SAVE_RETRIES`.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Default quiet period before a debounced save fires.
pub const DEFAULT_QUIET_PERIOD_MS: u64 = 1_000;
/// Default base delay for retry backoff.
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;

const MAX_QUIET_PERIOD_MS: u64 = 60_000;
const MAX_SAVE_RETRIES: u32 = 8;

pub const ENV_SAVE_QUIET_MS: &str = "PAGEKIT_SAVE_QUIET_MS";
pub const ENV_SAVE_RETRIES: &str = "PAGEKIT_SAVE_RETRIES";
pub const ENV_TEARDOWN: &str = "PAGEKIT_TEARDOWN";

/// What happens to a pending debounced save when a page is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TeardownPolicy {
    /// Save immediately before closing.
    #[default]
    Flush,
    /// Drop the pending save; edits inside the quiet window are lost.
    Discard,
}

impl TeardownPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flush => "flush",
            Self::Discard => "discard",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "flush" => Some(Self::Flush),
            "discard" => Some(Self::Discard),
            _ => None,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    QuietPeriodOutOfRange(u64),
    TooManyRetries(u32),
    InvalidValue { key: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QuietPeriodOutOfRange(value) => write!(
                f,
                "save quiet period must be within 1..={MAX_QUIET_PERIOD_MS} ms, got {value}"
            ),
            Self::TooManyRetries(value) => write!(
                f,
                "save retries must be at most {MAX_SAVE_RETRIES}, got {value}"
            ),
            Self::InvalidValue { key, value } => write!(f, "invalid value `{value}` for {key}"),
        }
    }
}

impl Error for ConfigError {}

/// Tunables for one editor session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditorConfig {
    /// Quiet period after the last mutation before saving.
    pub save_quiet_period_ms: u64,
    /// Extra attempts after a failed save. `0` surfaces the first failure.
    pub max_save_retries: u32,
    /// Backoff base; attempt `n` waits `base * 2^(n-1)`.
    pub retry_base_delay_ms: u64,
    pub teardown_policy: TeardownPolicy,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            save_quiet_period_ms: DEFAULT_QUIET_PERIOD_MS,
            max_save_retries: 0,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            teardown_policy: TeardownPolicy::Flush,
        }
    }
}

impl EditorConfig {
    pub fn with_quiet_period_ms(mut self, value: u64) -> Result<Self, ConfigError> {
        if value == 0 || value > MAX_QUIET_PERIOD_MS {
            return Err(ConfigError::QuietPeriodOutOfRange(value));
        }
        self.save_quiet_period_ms = value;
        Ok(self)
    }

    pub fn with_retries(mut self, retries: u32, base_delay_ms: u64) -> Result<Self, ConfigError> {
        if retries > MAX_SAVE_RETRIES {
            return Err(ConfigError::TooManyRetries(retries));
        }
        self.max_save_retries = retries;
        self.retry_base_delay_ms = base_delay_ms.max(1);
        Ok(self)
    }

    pub fn with_teardown_policy(mut self, policy: TeardownPolicy) -> Self {
        self.teardown_policy = policy;
        self
    }

    /// Defaults overridden by `PAGEKIT_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by values from `lookup`. Blank values are ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &'static str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };
        let mut config = Self::default();

        if let Some(raw) = read(ENV_SAVE_QUIET_MS) {
            let value = raw.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                key: ENV_SAVE_QUIET_MS,
                value: raw.clone(),
            })?;
            config = config.with_quiet_period_ms(value)?;
        }
        if let Some(raw) = read(ENV_SAVE_RETRIES) {
            let value = raw.parse::<u32>().map_err(|_| ConfigError::InvalidValue {
                key: ENV_SAVE_RETRIES,
                value: raw.clone(),
            })?;
            config = config.with_retries(value, config.retry_base_delay_ms)?;
        }
        if let Some(raw) = read(ENV_TEARDOWN) {
            let policy = TeardownPolicy::parse(raw.as_str()).ok_or(ConfigError::InvalidValue {
                key: ENV_TEARDOWN,
                value: raw.clone(),
            })?;
            config = config.with_teardown_policy(policy);
        }
        Ok(config)
    }
}
