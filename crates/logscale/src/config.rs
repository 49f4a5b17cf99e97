// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

use crate::error::ConfigError;
use crate::forwarder::RejectionPolicy;
use crate::ingest::{endpoint_path, IngestTarget};

const DEFAULT_SOURCE: &str = "my-cloudtrail-stream";
const DEFAULT_SOURCETYPE: &str = "cloudtrail";
const DEFAULT_ENDPOINT: &str = "hec";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_OBJECT_STORE_URL: &str = "https://s3.amazonaws.com";

/// Process configuration, read once at startup and passed down explicitly.
#[derive(Debug, Clone)]
pub struct Config {
    pub target: IngestTarget,
    /// HEC `source`; should uniquely identify the CloudTrail stream.
    pub source: String,
    /// HEC `sourcetype`; names the LogScale parser applied on ingest.
    pub sourcetype: String,
    /// Logical ingest endpoint name.
    pub endpoint: String,
    pub extra_fields: BTreeMap<String, String>,
    pub rejection_policy: RejectionPolicy,
    pub timeout: Duration,
    /// Replaces `https://{host}` for ingest requests. Mostly used by integration tests.
    pub url_override: Option<String>,
    pub https_proxy: Option<String>,
    pub object_store_url: String,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        let target = IngestTarget::new(
            required_var("HOST")?,
            required_var("REPOSITORY")?,
            required_var("TOKEN")?,
        );

        let timeout_secs = match optional_var("LOGSCALE_TIMEOUT_SECS") {
            Some(val) => val.parse::<u64>().map_err(|e| ConfigError::InvalidVar {
                name: "LOGSCALE_TIMEOUT_SECS",
                message: e.to_string(),
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let rejection_policy = match optional_var("LOGSCALE_FAIL_ON_REJECT") {
            Some(val) if val.eq_ignore_ascii_case("true") => RejectionPolicy::Fail,
            Some(val) if val.eq_ignore_ascii_case("false") => RejectionPolicy::Warn,
            Some(val) => {
                return Err(ConfigError::InvalidVar {
                    name: "LOGSCALE_FAIL_ON_REJECT",
                    message: format!("expected 'true' or 'false', got '{val}'"),
                })
            }
            None => RejectionPolicy::default(),
        };

        let config = Config {
            target,
            source: optional_var("LOGSCALE_SOURCE").unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            sourcetype: optional_var("LOGSCALE_SOURCETYPE")
                .unwrap_or_else(|| DEFAULT_SOURCETYPE.to_string()),
            endpoint: optional_var("LOGSCALE_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            extra_fields: optional_var("LOGSCALE_EXTRA_FIELDS")
                .map(|val| parse_fields(&val))
                .unwrap_or_default(),
            rejection_policy,
            timeout: Duration::from_secs(timeout_secs),
            url_override: optional_var("LOGSCALE_URL"),
            https_proxy: optional_var("HTTPS_PROXY"),
            object_store_url: optional_var("OBJECT_STORE_URL")
                .unwrap_or_else(|| DEFAULT_OBJECT_STORE_URL.to_string()),
            log_level: optional_var("LOG_LEVEL")
                .map(|val| val.to_lowercase())
                .unwrap_or_else(|| "info".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if endpoint_path(&self.endpoint).is_none() {
            return Err(ConfigError::InvalidVar {
                name: "LOGSCALE_ENDPOINT",
                message: format!("unknown ingest endpoint '{}'", self.endpoint),
            });
        }

        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidVar {
                name: "LOGSCALE_TIMEOUT_SECS",
                message: "must be greater than 0".to_string(),
            });
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(ConfigError::InvalidVar {
                name: "LOG_LEVEL",
                message: format!(
                    "'{}' is not one of trace, debug, info, warn, error, off",
                    self.log_level
                ),
            });
        }

        Ok(())
    }
}

/// Parses `key:value` pairs separated by commas or whitespace.
///
/// Pairs without exactly one `:` are ignored.
#[must_use]
pub fn parse_fields(env_fields: &str) -> BTreeMap<String, String> {
    env_fields
        .replace(',', " ")
        .split_whitespace()
        .filter_map(|kv| {
            let parts = kv.split(':').collect::<Vec<&str>>();
            match parts.as_slice() {
                [key, value] if !key.is_empty() => Some((key.to_string(), value.to_string())),
                _ => None,
            }
        })
        .collect()
}

fn required_var(name: &'static str) -> Result<String, ConfigError> {
    optional_var(name).ok_or(ConfigError::MissingVar(name))
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}
