use std::num::NonZeroU32;
use std::time::Duration;

use serde_derive::{Deserialize, Serialize};
use thiserror::Error;

use crate::ip::{AddressFormat, Resolver, DEFAULT_ECHO_HOST};
use crate::services::*;
use crate::transport::{PollConfig, RetryPolicy};
use crate::util::parse_number_into_optional_nonzero;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to parse the configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{0} must be greater than zero")]
    InvalidDuration(&'static str),

    #[cfg(feature = "regex")]
    #[error("unable to parse the regex: {0}")]
    InvalidRegex(#[from] regex::Error),

    #[cfg(not(feature = "regex"))]
    #[error("address format \"regex\" needs the `regex` feature")]
    RegexUnsupported,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct General {
    /// Seconds between update cycles. Zero runs a single cycle and exits.
    #[serde(default, deserialize_with = "parse_number_into_optional_nonzero")]
    pub update_rate: Option<NonZeroU32>,

    /// Consecutive failed cycles after which failures are reported as errors.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: NonZeroU32,

    #[serde(default = "default_log_level")]
    pub log_level: Box<str>,
}

impl Default for General {
    fn default() -> Self {
        Self {
            update_rate: None,
            failure_threshold: default_failure_threshold(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FormatConfig {
    #[default]
    LastLine,
    Body,
    Regex,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct ResolverConfig {
    pub host: Box<str>,
    pub port: u16,
    pub format: FormatConfig,
    pub regex: Box<str>,
    pub attempts: NonZeroU32,
    pub retry_delay_ms: u64,
    pub poll_interval_ms: u64,
    pub timeout_ms: u64,
    pub connect_timeout_ms: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        let poll = PollConfig::default();

        Self {
            host: DEFAULT_ECHO_HOST.into(),
            port: 80,
            format: FormatConfig::default(),
            regex: "(.*)".into(),
            attempts: retry.attempts,
            retry_delay_ms: retry.delay.as_millis() as u64,
            poll_interval_ms: poll.interval.as_millis() as u64,
            timeout_ms: poll.timeout.as_millis() as u64,
            connect_timeout_ms: 5000,
        }
    }
}

impl ResolverConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.attempts,
            delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(self.poll_interval_ms),
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn address_format(&self) -> Result<AddressFormat, ConfigError> {
        match self.format {
            FormatConfig::LastLine => Ok(AddressFormat::LastLine),
            FormatConfig::Body => Ok(AddressFormat::Body),

            #[cfg(feature = "regex")]
            FormatConfig::Regex => Ok(AddressFormat::Regex(regex::Regex::new(&self.regex)?)),

            #[cfg(not(feature = "regex"))]
            FormatConfig::Regex => Err(ConfigError::RegexUnsupported),
        }
    }

    pub fn to_resolver(&self) -> Result<Resolver, ConfigError> {
        Ok(Resolver::new(self.host.clone())
            .with_port(self.port)
            .with_format(self.address_format()?)
            .with_retry(self.retry_policy())
            .with_poll(self.poll_config()))
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "service")]
#[serde(rename_all = "kebab-case")]
pub enum DdnsConfigService {
    Namecheap(namecheap::Config),
    Duckdns(duckdns::Config),
}

impl DdnsConfigService {
    pub fn into_boxed(self) -> Box<dyn DdnsService> {
        match self {
            DdnsConfigService::Namecheap(nc) => Box::new(namecheap::Service::from(nc)),

            DdnsConfigService::Duckdns(dk) => Box::new(duckdns::Service::from(dk)),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub general: General,

    #[serde(default)]
    pub resolver: ResolverConfig,

    pub ddns: DdnsConfigService,
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config = toml::from_str::<Config>(text)?;

        // A zero timeout would fail every exchange before it starts.
        if config.resolver.timeout_ms == 0 {
            return Err(ConfigError::InvalidDuration("resolver.timeout_ms"));
        }
        if config.resolver.connect_timeout_ms == 0 {
            return Err(ConfigError::InvalidDuration("resolver.connect_timeout_ms"));
        }

        // Surface a bad address format at load time rather than on first use.
        config.resolver.address_format()?;

        Ok(config)
    }
}

fn default_failure_threshold() -> NonZeroU32 {
    NonZeroU32::new(3).unwrap_or(NonZeroU32::MIN)
}

fn default_log_level() -> Box<str> {
    "info".into()
}
