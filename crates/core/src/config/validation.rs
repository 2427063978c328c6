//! Checks run on [`AppConfig`] once all layers are merged.

use std::ops::RangeInclusive;

use crate::config::AppConfig;
use thiserror::Error;

/// Accepted request timeout, in milliseconds.
pub const TIMEOUT_MS_RANGE: RangeInclusive<u64> = 100..=300_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration value for {field}: {reason}")]
    Invalid { field: String, reason: String },

    #[error("configuration value {field} is not set ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Reject settings the pipeline cannot run with.
    ///
    /// Source URLs must be absolute http(s), the cache must hold at least one
    /// entry, `timeout_ms` must fall in [`TIMEOUT_MS_RANGE`] and the user
    /// agent must be non-blank. A datasets TTL longer than the boundaries TTL
    /// is allowed but logged.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("cases_url", &self.cases_url),
            ("postcodes_url", &self.postcodes_url),
            ("lga_geojson_url", &self.lga_geojson_url),
        ] {
            check_source_url(field, value)?;
        }

        if self.cache_max_entries == 0 {
            return Err(invalid("cache_max_entries", "the cache must hold at least one entry"));
        }

        if !TIMEOUT_MS_RANGE.contains(&self.timeout_ms) {
            return Err(invalid(
                "timeout_ms",
                format!(
                    "{} is outside {}..={}",
                    self.timeout_ms,
                    TIMEOUT_MS_RANGE.start(),
                    TIMEOUT_MS_RANGE.end()
                ),
            ));
        }

        if self.user_agent.trim().is_empty() {
            return Err(invalid("user_agent", "must not be blank"));
        }

        if self.datasets_ttl_secs > self.boundaries_ttl_secs {
            tracing::warn!(
                datasets_ttl_secs = self.datasets_ttl_secs,
                boundaries_ttl_secs = self.boundaries_ttl_secs,
                "case datasets outlive LGA boundaries in the cache"
            );
        }

        Ok(())
    }

    /// The tile provider token, for front ends that need one.
    pub fn require_map_access_token(&self) -> Result<&str, ConfigError> {
        self.map_access_token.as_deref().filter(|t| !t.is_empty()).ok_or_else(|| ConfigError::Missing {
            field: "map_access_token".into(),
            hint: "set COVIDMAP_MAP_ACCESS_TOKEN".into(),
        })
    }
}

fn check_source_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(value).map_err(|e| invalid(field, e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(invalid(field, format!("{scheme}:// sources are not fetched"))),
    }
}
