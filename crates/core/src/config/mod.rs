//! Settings for the covidmap pipeline: data sources, cache, HTTP.
//!
//! Every field has a default, so an empty environment yields a working
//! configuration pointed at the public NSW and data.gov.au endpoints.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// NSW case notifications by date and postcode.
pub const DEFAULT_CASES_URL: &str =
    "https://data.nsw.gov.au/data/datastore/dump/21304414-1ff1-4243-a5d2-f52778048b29?bom=True";

/// National postcode reference dataset.
pub const DEFAULT_POSTCODES_URL: &str =
    "https://raw.githubusercontent.com/matthewproctor/australianpostcodes/master/australian_postcodes.csv";

/// NSW local government area boundaries (WFS GeoJSON export).
pub const DEFAULT_LGA_GEOJSON_URL: &str = "https://data.gov.au/geoserver/nsw-local-government-areas/wfs?request=GetFeature&typeName=ckan_f6a00643_1842_48cd_9c2f_df23a3a1dc1e&outputFormat=json";

/// Which cleaning rule is applied to the case dataset.
///
/// Only one rule runs per pipeline. `Locality` is the current behaviour;
/// `PostcodeCoercion` is the older rule, kept selectable for sources whose
/// postcode column arrives as floats with gaps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseCleaning {
    #[default]
    Locality,
    PostcodeCoercion,
}

/// Pipeline configuration. See [`AppConfig::load`] for where values come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Case notification CSV endpoint.
    ///
    /// Set via COVIDMAP_CASES_URL environment variable.
    #[serde(default = "default_cases_url")]
    pub cases_url: String,

    /// Postcode reference CSV endpoint.
    ///
    /// Set via COVIDMAP_POSTCODES_URL environment variable.
    #[serde(default = "default_postcodes_url")]
    pub postcodes_url: String,

    /// LGA boundary GeoJSON endpoint.
    ///
    /// Set via COVIDMAP_LGA_GEOJSON_URL environment variable.
    #[serde(default = "default_lga_geojson_url")]
    pub lga_geojson_url: String,

    /// Where the downloaded boundary file is kept.
    ///
    /// Set via COVIDMAP_LGA_GEOJSON_PATH environment variable.
    #[serde(default = "default_lga_geojson_path")]
    pub lga_geojson_path: PathBuf,

    /// Path to SQLite cache database.
    ///
    /// Set via COVIDMAP_CACHE_DB_PATH environment variable.
    #[serde(default = "default_cache_db_path")]
    pub cache_db_path: PathBuf,

    /// Upper bound on memoized entries before LRU eviction.
    ///
    /// Set via COVIDMAP_CACHE_MAX_ENTRIES environment variable.
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,

    /// Lifetime of the case/postcode dataset pair in seconds.
    ///
    /// Set via COVIDMAP_DATASETS_TTL_SECS environment variable.
    #[serde(default = "default_datasets_ttl_secs")]
    pub datasets_ttl_secs: u64,

    /// Lifetime of the boundary feature list in seconds.
    ///
    /// Set via COVIDMAP_BOUNDARIES_TTL_SECS environment variable.
    #[serde(default = "default_boundaries_ttl_secs")]
    pub boundaries_ttl_secs: u64,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via COVIDMAP_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via COVIDMAP_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Access token handed to the map tile provider.
    ///
    /// Set via COVIDMAP_MAP_ACCESS_TOKEN environment variable.
    #[serde(default)]
    pub map_access_token: Option<String>,

    /// Case dataset cleaning rule.
    ///
    /// Set via COVIDMAP_CASE_CLEANING environment variable.
    #[serde(default)]
    pub case_cleaning: CaseCleaning,
}

fn default_cases_url() -> String {
    DEFAULT_CASES_URL.into()
}

fn default_postcodes_url() -> String {
    DEFAULT_POSTCODES_URL.into()
}

fn default_lga_geojson_url() -> String {
    DEFAULT_LGA_GEOJSON_URL.into()
}

fn default_lga_geojson_path() -> PathBuf {
    PathBuf::from("data/nsw-lga.geojson")
}

fn default_cache_db_path() -> PathBuf {
    PathBuf::from("cache-directory/covidmap-cache.sqlite")
}

fn default_cache_max_entries() -> usize {
    10
}

fn default_datasets_ttl_secs() -> u64 {
    360
}

fn default_boundaries_ttl_secs() -> u64 {
    3600
}

fn default_user_agent() -> String {
    "covidmap/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cases_url: default_cases_url(),
            postcodes_url: default_postcodes_url(),
            lga_geojson_url: default_lga_geojson_url(),
            lga_geojson_path: default_lga_geojson_path(),
            cache_db_path: default_cache_db_path(),
            cache_max_entries: default_cache_max_entries(),
            datasets_ttl_secs: default_datasets_ttl_secs(),
            boundaries_ttl_secs: default_boundaries_ttl_secs(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            map_access_token: None,
            case_cleaning: CaseCleaning::default(),
        }
    }
}

impl AppConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn datasets_ttl(&self) -> Duration {
        Duration::from_secs(self.datasets_ttl_secs)
    }

    pub fn boundaries_ttl(&self) -> Duration {
        Duration::from_secs(self.boundaries_ttl_secs)
    }

    /// Merge defaults, the TOML file named by `COVIDMAP_CONFIG_FILE` and
    /// `COVIDMAP_*` variables (later wins), then [`validate`](Self::validate).
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("COVIDMAP_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("COVIDMAP_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.cases_url, DEFAULT_CASES_URL);
        assert_eq!(config.lga_geojson_path, PathBuf::from("data/nsw-lga.geojson"));
        assert_eq!(config.cache_max_entries, 10);
        assert_eq!(config.datasets_ttl_secs, 360);
        assert_eq!(config.boundaries_ttl_secs, 3600);
        assert_eq!(config.case_cleaning, CaseCleaning::Locality);
        assert!(config.map_access_token.is_none());
    }

    #[test]
    fn test_durations() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
        assert_eq!(config.datasets_ttl(), Duration::from_secs(360));
        assert_eq!(config.boundaries_ttl(), Duration::from_secs(3600));
    }

    #[test]
    fn test_load_env_overrides() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("COVIDMAP_DATASETS_TTL_SECS", "60");
            jail.set_env("COVIDMAP_CASE_CLEANING", "postcode_coercion");
            jail.set_env("COVIDMAP_MAP_ACCESS_TOKEN", "pk.test");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.datasets_ttl_secs, 60);
            assert_eq!(config.case_cleaning, CaseCleaning::PostcodeCoercion);
            assert_eq!(config.map_access_token.as_deref(), Some("pk.test"));
            Ok(())
        });
    }

    #[test]
    fn test_load_toml_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("covidmap.toml", "cache_max_entries = 25\nlga_geojson_path = \"/tmp/lga.geojson\"")?;
            jail.set_env("COVIDMAP_CONFIG_FILE", "covidmap.toml");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.cache_max_entries, 25);
            assert_eq!(config.lga_geojson_path, PathBuf::from("/tmp/lga.geojson"));
            Ok(())
        });
    }
}
