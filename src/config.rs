//! Engine configuration.
//!
//! ```toml
//! pipeline_dir = "/usr/local/datakit/pipeline"
//! pattern_files = ["patterns/nginx"]
//! geo_table = "geo.csv"
//! timezone = "Asia/Shanghai"
//!
//! [soft_error_log]
//! burst = 10
//! every = 100
//! ```
//!
//! Every field is optional. Relative paths in a file loaded with
//! [`EngineConfig::load`] are resolved against the file's directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid timezone `{0}`, expected \"local\", \"UTC\", an IANA name like \"Asia/Shanghai\" or an offset like \"+08:00\"")]
    Timezone(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory `Pipeline::from_file` resolves script names against
    pub pipeline_dir: PathBuf,

    /// Extra grok pattern files loaded into the engine-wide layer
    pub pattern_files: Vec<PathBuf>,

    /// CIDR table used by `geoip`
    pub geo_table: Option<PathBuf>,

    /// Zone for naive timestamps and `datetime` output
    pub timezone: String,

    pub soft_error_log: SoftErrorLogConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pipeline_dir: PathBuf::from("pipeline"),
            pattern_files: Vec::new(),
            geo_table: None,
            timezone: "local".to_string(),
            soft_error_log: SoftErrorLogConfig::default(),
        }
    }
}

/// Sampling of soft-failure warnings: the first `burst` failures of each
/// kind are logged, then one in every `every`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoftErrorLogConfig {
    pub burst: u64,
    pub every: u64,
}

impl Default for SoftErrorLogConfig {
    fn default() -> Self {
        Self { burst: 10, every: 100 }
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(text)?;
        config.zone()?;
        Ok(config)
    }

    /// Load a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::from_toml_str(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_relative(base);
        }
        Ok(config)
    }

    fn resolve_relative(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.pipeline_dir);
        self.pattern_files.iter_mut().for_each(resolve);
        if let Some(geo) = self.geo_table.as_mut() {
            resolve(geo);
        }
    }

    /// The configured time zone.
    pub fn zone(&self) -> Result<Zone, ConfigError> {
        Zone::parse(&self.timezone)
    }
}

/// Time zone used to interpret naive timestamps and to render dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Zone {
    #[default]
    Local,
    Fixed(FixedOffset),
    /// IANA zone such as `Asia/Shanghai`; offsets follow its DST rules
    Named(Tz),
}

impl Zone {
    pub fn parse(s: &str) -> Result<Zone, ConfigError> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("local") || trimmed.is_empty() {
            return Ok(Zone::Local);
        }
        if trimmed.eq_ignore_ascii_case("utc") || trimmed == "Z" {
            return Ok(Zone::Fixed(Utc.fix()));
        }

        let invalid = || ConfigError::Timezone(s.to_string());
        let (sign, rest) = match trimmed.as_bytes().first() {
            Some(b'+') => (1, &trimmed[1..]),
            Some(b'-') => (-1, &trimmed[1..]),
            _ => return trimmed.parse::<Tz>().map(Zone::Named).map_err(|_| invalid()),
        };
        let (hours, minutes) = match rest.split_once(':') {
            Some((h, m)) => (h, m),
            None if rest.len() == 4 => rest.split_at(2),
            None => (rest, "0"),
        };
        let hours: i32 = hours.parse().map_err(|_| invalid())?;
        let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
        if hours > 23 || minutes > 59 {
            return Err(invalid());
        }

        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .map(Zone::Fixed)
            .ok_or_else(invalid)
    }

    /// Interpret a wall-clock time in this zone. Ambiguous local times take
    /// the earlier instant; nonexistent ones yield `None`.
    pub fn from_naive(&self, naive: &NaiveDateTime) -> Option<DateTime<FixedOffset>> {
        match self {
            Zone::Local => Local
                .from_local_datetime(naive)
                .earliest()
                .map(|dt| dt.fixed_offset()),
            Zone::Fixed(offset) => offset.from_local_datetime(naive).single(),
            Zone::Named(tz) => tz
                .from_local_datetime(naive)
                .earliest()
                .map(|dt| dt.fixed_offset()),
        }
    }

    /// Express a UTC instant in this zone.
    pub fn at(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        match self {
            Zone::Local => instant.with_timezone(&Local).fixed_offset(),
            Zone::Fixed(offset) => instant.with_timezone(offset),
            Zone::Named(tz) => instant.with_timezone(tz).fixed_offset(),
        }
    }
}
