//! Immutable run configuration
//!
//! A [`Config`] is assembled once per pipeline run with [`ConfigBuilder`] and
//! then only read. Stages check the fields they depend on with the
//! `require_*` accessors, which raise [`EtlError::MissingConfig`].

use crate::error::EtlError;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use eyre::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Timestamp format used for `min_date`
pub const MIN_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

const DEFAULT_LOOKBACK_DAYS: u32 = 5;
const DEFAULT_MIN_DATE: &str = "2023-01-01T00:00:00Z";

/// Where the pipeline process is running
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Location {
    #[default]
    Local,
    Cloud,
    Other(String),
}

impl Location {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "" | "local" => Self::Local,
            "cloud" => Self::Cloud,
            _ => Self::Other(s.trim().to_string()),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Cloud => write!(f, "cloud"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

/// Run parameters shared read-only by every stage
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    update_mode: bool,
    table_name: String,
    dataset_name: String,
    lookback_days: u32,
    min_date: DateTime<Utc>,
    environment: Option<String>,
    location: Location,
    extras: BTreeMap<String, Value>,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn update_mode(&self) -> bool {
        self.update_mode
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn dataset_name(&self) -> &str {
        &self.dataset_name
    }

    pub fn lookback_days(&self) -> u32 {
        self.lookback_days
    }

    /// Earliest record timestamp extractors should fetch
    pub fn min_date(&self) -> DateTime<Utc> {
        self.min_date
    }

    /// `min_date` formatted for query strings
    pub fn min_date_string(&self) -> String {
        self.min_date.format(MIN_DATE_FORMAT).to_string()
    }

    pub fn environment(&self) -> Option<&str> {
        self.environment.as_deref()
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Caller-defined field, if set
    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extras.get(key)
    }

    pub fn extras(&self) -> &BTreeMap<String, Value> {
        &self.extras
    }

    /// Caller-defined field that must be present
    pub fn require_extra(&self, key: &str) -> Result<&Value, EtlError> {
        self.extra(key).ok_or_else(|| EtlError::MissingConfig {
            field: key.to_string(),
        })
    }

    /// Caller-defined field that must be a string
    pub fn require_str(&self, key: &str) -> Result<&str, EtlError> {
        self.require_extra(key)?
            .as_str()
            .ok_or_else(|| EtlError::InvalidConfig {
                field: key.to_string(),
                reason: "expected a string".to_string(),
            })
    }

    pub fn require_table_name(&self) -> Result<&str, EtlError> {
        non_empty("table_name", &self.table_name)
    }

    pub fn require_dataset_name(&self) -> Result<&str, EtlError> {
        non_empty("dataset_name", &self.dataset_name)
    }
}

fn non_empty<'a>(field: &str, value: &'a str) -> Result<&'a str, EtlError> {
    if value.is_empty() {
        Err(EtlError::MissingConfig {
            field: field.to_string(),
        })
    } else {
        Ok(value)
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "update_mode: {}", self.update_mode)?;
        writeln!(f, "table_name: {}", self.table_name)?;
        writeln!(f, "dataset_name: {}", self.dataset_name)?;
        writeln!(f, "lookback_days: {}", self.lookback_days)?;
        writeln!(f, "min_date: {}", self.min_date_string())?;
        if let Some(env) = &self.environment {
            writeln!(f, "environment: {env}")?;
        }
        writeln!(f, "location: {}", self.location)?;
        for (key, value) in &self.extras {
            writeln!(f, "{key}: {value}")?;
        }
        Ok(())
    }
}

/// Builder for [`Config`]
///
/// # Example
/// ```
/// use etlkit::Config;
///
/// let config = Config::builder()
///     .table_name("opportunity_history")
///     .dataset_name("prod_published")
///     .extra("owner", "sales-ops")
///     .build()
///     .unwrap();
///
/// assert_eq!(config.table_name(), "opportunity_history");
/// assert_eq!(config.require_str("owner").unwrap(), "sales-ops");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    update_mode: bool,
    table_name: Option<String>,
    dataset_name: Option<String>,
    lookback_days: Option<u32>,
    min_date: Option<String>,
    environment: Option<String>,
    location: Location,
    extras: BTreeMap<String, Value>,
}

/// On-disk form of a [`ConfigBuilder`]
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    update_mode: bool,
    table_name: Option<String>,
    dataset_name: Option<String>,
    lookback_days: Option<u32>,
    min_date: Option<String>,
    environment: Option<String>,
    location: Option<String>,
    #[serde(flatten)]
    extras: BTreeMap<String, Value>,
}

impl ConfigBuilder {
    /// Start from the `ENVIRONMENT` and `LOCATION` process variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Start from `ENVIRONMENT` and `LOCATION` as returned by `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut builder = Self::default();
        builder.environment = lookup("ENVIRONMENT").filter(|s| !s.is_empty());
        if let Some(location) = lookup("LOCATION") {
            builder.location = Location::parse(&location);
        }
        builder
    }

    /// Load settings from a YAML file
    ///
    /// Keys other than the known fields become extras.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::default().merge_yaml_file(path)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let file: ConfigFile = serde_yaml::from_str(content)?;
        Ok(Self::default().merge_file(file))
    }

    /// Overlay the settings of a YAML file onto this builder
    pub fn merge_yaml_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let file: ConfigFile = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(self.merge_file(file))
    }

    fn merge_file(mut self, file: ConfigFile) -> Self {
        self.update_mode |= file.update_mode;
        self.table_name = file.table_name.or(self.table_name);
        self.dataset_name = file.dataset_name.or(self.dataset_name);
        self.lookback_days = file.lookback_days.or(self.lookback_days);
        self.min_date = file.min_date.or(self.min_date);
        self.environment = file.environment.or(self.environment);
        if let Some(location) = file.location {
            self.location = Location::parse(&location);
        }
        self.extras.extend(file.extras);
        self
    }

    pub fn update_mode(mut self, update_mode: bool) -> Self {
        self.update_mode = update_mode;
        self
    }

    pub fn table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = Some(name.into());
        self
    }

    pub fn dataset_name(mut self, name: impl Into<String>) -> Self {
        self.dataset_name = Some(name.into());
        self
    }

    pub fn lookback_days(mut self, days: u32) -> Self {
        self.lookback_days = Some(days);
        self
    }

    /// Earliest timestamp when not in update mode, as `%Y-%m-%dT%H:%M:%SZ`
    pub fn min_date(mut self, min_date: impl Into<String>) -> Self {
        self.min_date = Some(min_date.into());
        self
    }

    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    /// Finalize the configuration
    ///
    /// Running in the cloud always enables update mode. In update mode the
    /// minimum date becomes `lookback_days` before now.
    ///
    /// # Errors
    /// Returns [`EtlError::InvalidConfig`] if `min_date` cannot be parsed
    pub fn build(self) -> Result<Config, EtlError> {
        self.build_at(Utc::now())
    }

    /// [`build`](Self::build) with an explicit clock
    pub fn build_at(self, now: DateTime<Utc>) -> Result<Config, EtlError> {
        let lookback_days = self.lookback_days.unwrap_or(DEFAULT_LOOKBACK_DAYS);

        let mut update_mode = self.update_mode;
        if self.location == Location::Cloud && !update_mode {
            log::info!("Running in the cloud, enabling update mode");
            update_mode = true;
        }

        let min_date = if update_mode {
            let min_date = now - Duration::days(i64::from(lookback_days));
            log::info!(
                "Running in update mode, min_date set to {}",
                min_date.format(MIN_DATE_FORMAT)
            );
            min_date
        } else {
            let raw = self.min_date.as_deref().unwrap_or(DEFAULT_MIN_DATE);
            NaiveDateTime::parse_from_str(raw, MIN_DATE_FORMAT)
                .map(|naive| naive.and_utc())
                .map_err(|e| EtlError::InvalidConfig {
                    field: "min_date".to_string(),
                    reason: format!("'{raw}' does not match {MIN_DATE_FORMAT}: {e}"),
                })?
        };

        let dataset_name = self.dataset_name.unwrap_or_else(|| match &self.environment {
            Some(env) => format!("{env}_published"),
            None => String::new(),
        });

        Ok(Config {
            update_mode,
            table_name: self.table_name.unwrap_or_default(),
            dataset_name,
            lookback_days,
            min_date,
            environment: self.environment,
            location: self.location,
            extras: self.extras,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = Config::builder().build_at(noon()).unwrap();
        assert!(!config.update_mode());
        assert_eq!(config.table_name(), "");
        assert_eq!(config.dataset_name(), "");
        assert_eq!(config.lookback_days(), 5);
        assert_eq!(config.min_date_string(), "2023-01-01T00:00:00Z");
        assert_eq!(config.location(), &Location::Local);
    }

    #[test]
    fn test_dataset_name_derives_from_environment() {
        let config = Config::builder()
            .environment("prod")
            .build_at(noon())
            .unwrap();
        assert_eq!(config.dataset_name(), "prod_published");

        let config = Config::builder()
            .environment("prod")
            .dataset_name("scratch")
            .build_at(noon())
            .unwrap();
        assert_eq!(config.dataset_name(), "scratch");
    }

    #[test]
    fn test_update_mode_moves_min_date() {
        let config = Config::builder()
            .update_mode(true)
            .lookback_days(3)
            .build_at(noon())
            .unwrap();
        assert_eq!(config.min_date_string(), "2024-03-07T12:00:00Z");
    }

    #[test]
    fn test_cloud_forces_update_mode() {
        let config = Config::builder()
            .location(Location::Cloud)
            .build_at(noon())
            .unwrap();
        assert!(config.update_mode());
        assert_eq!(config.min_date_string(), "2024-03-05T12:00:00Z");
    }

    #[test]
    fn test_invalid_min_date() {
        let err = Config::builder()
            .min_date("last tuesday")
            .build_at(noon())
            .unwrap_err();
        assert_eq!(err.subject(), Some("min_date"));
    }

    #[test]
    fn test_require_accessors() {
        let config = Config::builder()
            .extra("owner", "ops")
            .extra("limit", 10)
            .build_at(noon())
            .unwrap();

        assert!(matches!(
            config.require_table_name(),
            Err(EtlError::MissingConfig { ref field }) if field == "table_name"
        ));
        assert_eq!(config.require_str("owner").unwrap(), "ops");
        assert_eq!(config.require_extra("limit").unwrap(), &json!(10));
        assert!(matches!(
            config.require_str("limit"),
            Err(EtlError::InvalidConfig { .. })
        ));
        assert!(matches!(
            config.require_str("missing"),
            Err(EtlError::MissingConfig { .. })
        ));
    }

    #[test]
    fn test_from_lookup() {
        let builder = ConfigBuilder::from_lookup(|key| match key {
            "ENVIRONMENT" => Some("dev".to_string()),
            "LOCATION" => Some("Cloud".to_string()),
            _ => None,
        });
        let config = builder.build_at(noon()).unwrap();
        assert_eq!(config.environment(), Some("dev"));
        assert_eq!(config.dataset_name(), "dev_published");
        assert!(config.update_mode());
    }

    #[test]
    fn test_from_yaml_str() {
        let yaml = r#"
table_name: field_history
dataset_name: analytics
lookback_days: 2
min_date: "2022-06-01T00:00:00Z"
owner: sales-ops
"#;
        let config = ConfigBuilder::from_yaml_str(yaml)
            .unwrap()
            .build_at(noon())
            .unwrap();

        assert_eq!(config.table_name(), "field_history");
        assert_eq!(config.dataset_name(), "analytics");
        assert_eq!(config.lookback_days(), 2);
        assert_eq!(config.min_date_string(), "2022-06-01T00:00:00Z");
        assert_eq!(config.require_str("owner").unwrap(), "sales-ops");
    }

    #[test]
    fn test_from_yaml_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("etl.yml");
        std::fs::write(&path, "table_name: accounts\nupdate_mode: true\nowner: ops\n").unwrap();

        let config = ConfigBuilder::from_yaml_file(&path)
            .unwrap()
            .build_at(noon())
            .unwrap();

        assert_eq!(config.table_name(), "accounts");
        assert!(config.update_mode());
        assert_eq!(config.require_str("owner").unwrap(), "ops");
    }

    #[test]
    fn test_from_yaml_file_errors_name_the_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("missing.yml");
        let err = ConfigBuilder::from_yaml_file(&missing).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("Failed to read config file: {}", missing.display())
        );

        let broken = dir.path().join("broken.yml");
        std::fs::write(&broken, "table_name: [unclosed\n").unwrap();
        let err = ConfigBuilder::from_yaml_file(&broken).unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse config file"));
    }

    #[test]
    fn test_display_lists_fields() {
        let config = Config::builder()
            .table_name("t")
            .extra("owner", "ops")
            .build_at(noon())
            .unwrap();
        let text = config.to_string();
        assert!(text.contains("table_name: t\n"));
        assert!(text.contains("owner: \"ops\"\n"));
    }
}
