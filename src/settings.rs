//! Engine configuration.
//!
//! Settings are layered with the `config` crate: built-in defaults, then an optional TOML file,
//! then environment variables such as `COPERNICUS_MAX_RETRIES=5` or
//! `COPERNICUS_QUERY__COLLECTION=s2` (`__` separates nested keys).

use std::time::Duration;

use chrono::NaiveDate;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::enrich::DEFAULT_DOWNLOAD_URL_TEMPLATE;
use crate::error::{QueryError, Result};
use crate::executor::PAGE_SIZE;
use crate::geometry::{EQUAL_AREA_EPSG, MAX_DECIMALS};
use crate::timestamp::TimeInput;

pub const DEFAULT_CATALOG_URL: &str = "https://catalogue.dataspace.copernicus.eu/odata/v1/Products";
const ENV_PREFIX: &str = "COPERNICUS";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub catalog_url: String,
    /// `{id}` is replaced by the product id.
    pub download_url_template: String,
    /// Run a count check after each filter change.
    pub interactive: bool,
    /// Interactive checks start once this many filters are active.
    pub interactive_min_filters: usize,
    pub max_retries: u32,
    pub request_timeout_secs: u64,
    pub retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
    pub decimals: u32,
    pub page_size: usize,
    pub area_epsg: u16,
    pub query: Option<QueryProfile>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            download_url_template: DEFAULT_DOWNLOAD_URL_TEMPLATE.to_string(),
            interactive: false,
            interactive_min_filters: 3,
            max_retries: 3,
            request_timeout_secs: 60,
            retry_delay_ms: 5000,
            max_retry_delay_ms: 60_000,
            decimals: 6,
            page_size: PAGE_SIZE,
            area_epsg: EQUAL_AREA_EPSG,
            query: None,
        }
    }
}

impl EngineSettings {
    /// Defaults, overlaid by `path` when given, overlaid by the environment.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(true));
        }
        let config = builder.add_source(environment()).build()?;
        Self::finish(config)
    }

    /// Parses TOML text without consulting the environment.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        Self::finish(config)
    }

    fn finish(config: Config) -> Result<Self> {
        let settings: EngineSettings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=PAGE_SIZE).contains(&self.page_size) {
            return Err(QueryError::Config(format!(
                "page_size must lie within 1..={PAGE_SIZE}, got {}",
                self.page_size
            )));
        }
        if self.decimals > MAX_DECIMALS {
            return Err(QueryError::Config(format!(
                "decimals must not exceed {MAX_DECIMALS}, got {}",
                self.decimals
            )));
        }
        if !self.download_url_template.contains("{id}") {
            return Err(QueryError::Config("download_url_template must contain '{id}'".to_string()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

// ------------- Query profile -------------

/// A query described in the configuration file, run by the binary.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct QueryProfile {
    pub collection: Option<String>,
    pub product_type: Option<String>,
    /// WGS84 WKT.
    pub aoi: Option<String>,
    pub publication_date: Option<(String, String)>,
    pub sensing_start_date: Option<(String, String)>,
    pub sensing_end_date: Option<(String, String)>,
    pub cloud_cover_min: Option<f64>,
    pub cloud_cover_max: Option<f64>,
    pub attributes: Vec<AttributeProfile>,
    /// Exact product names. Cannot be combined with filters.
    pub product_names: Vec<String>,
    pub skip: usize,
    pub n_entries: Option<usize>,
    pub orderby: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AttributeProfile {
    pub name: String,
    pub operator: String,
    pub value: String,
    #[serde(rename = "type")]
    pub attribute_type: String,
}

/// Profile dates may be plain days (`2023-07-05`) or full catalogue timestamps.
pub fn profile_time(text: &str) -> TimeInput {
    match NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d") {
        Ok(day) => TimeInput::from(day),
        Err(_) => TimeInput::from(text),
    }
}
