//! Runtime settings read from environment variables.
//!
//! Only `LEDGER_PATH` is required. Everything else has a default, and a
//! present but malformed value is an error rather than a silent fallback.

use crate::datasource::DEFAULT_EXCLUDED_NAMES;
use crate::engine::{HoldingPolicy, ReportingWindow, DEFAULT_LONG_TERM_THRESHOLD_DAYS};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub ledger_path: PathBuf,
    pub database_path: String,
    pub symbol_lookup_url: String,
    pub metadata_mode: MetadataMode,
    pub lookup_delay_ms: u64,
    pub report_dir: PathBuf,
    pub reporting_window: ReportingWindow,
    pub long_term_threshold_days: i64,
    pub excluded_instruments: Vec<String>,
    pub matching_mode: MatchingMode,
    /// JSON file of metadata that replaces cached entries in reports.
    pub instrument_overrides_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataMode {
    /// Look up uncached instruments before reporting.
    Online,
    CacheOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchingMode {
    Sequential,
    Parallel,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let ledger_path = env_map
            .get("LEDGER_PATH")
            .map(PathBuf::from)
            .ok_or_else(|| ConfigError::MissingEnv("LEDGER_PATH".to_string()))?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .unwrap_or_else(|| "instruments.db".to_string());

        let symbol_lookup_url = env_map
            .get("SYMBOL_LOOKUP_URL")
            .cloned()
            .unwrap_or_else(|| "https://www.moneycontrol.com".to_string());

        let metadata_mode = match env_map
            .get("METADATA_MODE")
            .map(|s| s.as_str())
            .unwrap_or("online")
        {
            "online" => MetadataMode::Online,
            "cache_only" => MetadataMode::CacheOnly,
            other => {
                return Err(ConfigError::InvalidValue(
                    "METADATA_MODE".to_string(),
                    format!("must be online or cache_only, got {}", other),
                ))
            }
        };

        let lookup_delay_ms = env_map
            .get("LOOKUP_DELAY_MS")
            .map(|s| s.as_str())
            .unwrap_or("5000")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "LOOKUP_DELAY_MS".to_string(),
                    "must be a valid u64".to_string(),
                )
            })?;

        let report_dir = env_map
            .get("REPORT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("reports"));

        let reporting_window = parse_reporting_window_from_map(&env_map)?;

        let long_term_threshold_days = match env_map.get("LONG_TERM_THRESHOLD_DAYS") {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|days| *days >= 0)
                .ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "LONG_TERM_THRESHOLD_DAYS".to_string(),
                        "must be a non-negative number of days".to_string(),
                    )
                })?,
            None => DEFAULT_LONG_TERM_THRESHOLD_DAYS,
        };

        let excluded_instruments = match env_map.get("EXCLUDED_INSTRUMENTS") {
            Some(list) => list
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => DEFAULT_EXCLUDED_NAMES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        };

        let matching_mode = match env_map
            .get("MATCHING_MODE")
            .map(|s| s.as_str())
            .unwrap_or("sequential")
        {
            "sequential" => MatchingMode::Sequential,
            "parallel" => MatchingMode::Parallel,
            other => {
                return Err(ConfigError::InvalidValue(
                    "MATCHING_MODE".to_string(),
                    format!("must be sequential or parallel, got {}", other),
                ))
            }
        };

        let instrument_overrides_path = env_map
            .get("INSTRUMENT_OVERRIDES")
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        Ok(Config {
            ledger_path,
            database_path,
            symbol_lookup_url,
            metadata_mode,
            lookup_delay_ms,
            report_dir,
            reporting_window,
            long_term_threshold_days,
            excluded_instruments,
            matching_mode,
            instrument_overrides_path,
        })
    }

    pub fn holding_policy(&self) -> HoldingPolicy {
        HoldingPolicy::new(self.long_term_threshold_days)
    }

    pub fn lookup_delay(&self) -> Duration {
        Duration::from_millis(self.lookup_delay_ms)
    }
}

/// `REPORT_FROM`/`REPORT_TO` win over `FINANCIAL_YEAR`; neither means unbounded.
fn parse_reporting_window_from_map(
    env_map: &HashMap<String, String>,
) -> Result<ReportingWindow, ConfigError> {
    let from = parse_date_var(env_map, "REPORT_FROM")?;
    let to = parse_date_var(env_map, "REPORT_TO")?;

    if from.is_some() || to.is_some() {
        return ReportingWindow::new(from, to).map_err(|e| {
            ConfigError::InvalidValue("REPORT_FROM".to_string(), e.to_string())
        });
    }

    match env_map.get("FINANCIAL_YEAR") {
        Some(year) => {
            let year = year.trim().parse::<i32>().map_err(|_| {
                ConfigError::InvalidValue(
                    "FINANCIAL_YEAR".to_string(),
                    "must be a starting year such as 2024".to_string(),
                )
            })?;
            ReportingWindow::financial_year(year).map_err(|e| {
                ConfigError::InvalidValue("FINANCIAL_YEAR".to_string(), e.to_string())
            })
        }
        None => Ok(ReportingWindow::unbounded()),
    }
}

fn parse_date_var(
    env_map: &HashMap<String, String>,
    key: &str,
) -> Result<Option<NaiveDate>, ConfigError> {
    env_map
        .get(key)
        .map(|raw| {
            NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
                ConfigError::InvalidValue(key.to_string(), "must be a YYYY-MM-DD date".to_string())
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("LEDGER_PATH".to_string(), "/tmp/statement.json".to_string());
        map
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.ledger_path, PathBuf::from("/tmp/statement.json"));
        assert_eq!(config.database_path, "instruments.db");
        assert_eq!(config.symbol_lookup_url, "https://www.moneycontrol.com");
        assert_eq!(config.metadata_mode, MetadataMode::Online);
        assert_eq!(config.lookup_delay(), Duration::from_millis(5000));
        assert_eq!(config.report_dir, PathBuf::from("reports"));
        assert!(config.reporting_window.is_unbounded());
        assert_eq!(config.long_term_threshold_days, 365);
        assert_eq!(config.excluded_instruments.len(), DEFAULT_EXCLUDED_NAMES.len());
        assert_eq!(config.matching_mode, MatchingMode::Sequential);
        assert_eq!(config.instrument_overrides_path, None);
    }

    #[test]
    fn test_missing_ledger_path() {
        let result = Config::from_env_map(HashMap::new());
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "LEDGER_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_invalid_metadata_mode() {
        let mut env_map = setup_required_env();
        env_map.insert("METADATA_MODE".to_string(), "offline".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "METADATA_MODE"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_matching_mode() {
        let mut env_map = setup_required_env();
        env_map.insert("MATCHING_MODE".to_string(), "lifo".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "MATCHING_MODE"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_threshold() {
        for bad in ["abc", "-1"] {
            let mut env_map = setup_required_env();
            env_map.insert("LONG_TERM_THRESHOLD_DAYS".to_string(), bad.to_string());
            match Config::from_env_map(env_map) {
                Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "LONG_TERM_THRESHOLD_DAYS"),
                _ => panic!("Expected InvalidValue error for {}", bad),
            }
        }
    }

    #[test]
    fn test_custom_threshold_and_modes() {
        let mut env_map = setup_required_env();
        env_map.insert("LONG_TERM_THRESHOLD_DAYS".to_string(), "730".to_string());
        env_map.insert("METADATA_MODE".to_string(), "cache_only".to_string());
        env_map.insert("MATCHING_MODE".to_string(), "parallel".to_string());
        env_map.insert("LOOKUP_DELAY_MS".to_string(), "0".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.holding_policy(), HoldingPolicy::new(730));
        assert_eq!(config.metadata_mode, MetadataMode::CacheOnly);
        assert_eq!(config.matching_mode, MatchingMode::Parallel);
        assert_eq!(config.lookup_delay(), Duration::ZERO);
    }

    #[test]
    fn test_financial_year_window() {
        let mut env_map = setup_required_env();
        env_map.insert("FINANCIAL_YEAR".to_string(), "2024".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.reporting_window.start(), Some(date(2024, 4, 1)));
        assert_eq!(config.reporting_window.end(), Some(date(2025, 3, 31)));
    }

    #[test]
    fn test_explicit_bounds_override_financial_year() {
        let mut env_map = setup_required_env();
        env_map.insert("FINANCIAL_YEAR".to_string(), "2024".to_string());
        env_map.insert("REPORT_FROM".to_string(), "2023-01-01".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.reporting_window.start(), Some(date(2023, 1, 1)));
        assert_eq!(config.reporting_window.end(), None);
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let mut env_map = setup_required_env();
        env_map.insert("REPORT_FROM".to_string(), "2024-05-01".to_string());
        env_map.insert("REPORT_TO".to_string(), "2024-04-01".to_string());
        assert!(matches!(
            Config::from_env_map(env_map),
            Err(ConfigError::InvalidValue(_, _))
        ));

        let mut env_map = setup_required_env();
        env_map.insert("REPORT_TO".to_string(), "01/04/2024".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "REPORT_TO"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_excluded_instruments_list() {
        let mut env_map = setup_required_env();
        env_map.insert(
            "EXCLUDED_INSTRUMENTS".to_string(),
            "STT, GOLD ,,".to_string(),
        );
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.excluded_instruments, vec!["STT", "GOLD"]);
    }

    #[test]
    fn test_instrument_overrides_path() {
        let mut env_map = setup_required_env();
        env_map.insert(
            "INSTRUMENT_OVERRIDES".to_string(),
            "/etc/lotledger/overrides.json".to_string(),
        );
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(
            config.instrument_overrides_path,
            Some(PathBuf::from("/etc/lotledger/overrides.json"))
        );

        let mut blank = setup_required_env();
        blank.insert("INSTRUMENT_OVERRIDES".to_string(), "  ".to_string());
        let config = Config::from_env_map(blank).unwrap();
        assert_eq!(config.instrument_overrides_path, None);
    }
}
