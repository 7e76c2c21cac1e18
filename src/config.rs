use chrono::NaiveDate;

use crate::error::{AppError, Result};

/// Number of most recent filings inspected when deciding which metrics a company reports.
/// Older filings cannot introduce a tag that has not been seen recently.
pub const RECENT_FILINGS_WINDOW: usize = 4;

/// Stock ids at or above this are rejected by the fundamentals/prices endpoints.
pub const MAX_STOCK_ID: i64 = 6000;

/// Upper bound on rows returned by the insider aggregate query.
pub const INSIDER_QUERY_LIMIT: i64 = 100;

/// Key of the home-page digest bucket in the insider cache.
pub const ALL_SECTORS: &str = "All";

pub const SEARCH_MAX_RESULTS: usize = 10;
pub const SEARCH_MAX_QUERY_LEN: usize = 25;

/// Scale adjustments with magnitude below this are left unreconciled.
pub const SCALE_RECONCILE_FLOOR: f64 = 0.01;

/// Quarters per trailing-twelve-month window.
pub const TTM_WINDOW: usize = 4;

/// Recent-filer listings only show companies with quarterly data starting before this.
pub const RECENT_FILERS_DATA_START_BEFORE: i64 = 202100;
pub const RECENT_FILERS_LIMIT: i64 = 20;

/// The home page "largest companies" column lists ids below this.
pub const HOME_PAGE_LARGEST_MAX_ID: i64 = 23;

pub const DEFAULT_PRICE_HISTORY_START: &str = "2010-01-01";

/// How a null quarterly value participates in the trailing-twelve-month running sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TtmNullPolicy {
    /// Null counts as zero both when it enters and when it leaves the window.
    #[default]
    Lenient,
    /// Any null inside the window yields a null TTM point.
    Strict,
}

impl std::str::FromStr for TtmNullPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(TtmNullPolicy::Lenient),
            "strict" => Ok(TtmNullPolicy::Strict),
            other => Err(AppError::Config(format!(
                "TTM_NULL_POLICY must be 'lenient' or 'strict', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Seconds before the insider cache is rebuilt (INSIDER_CACHE_TTL_SECS)
    pub insider_cache_ttl_secs: u64,
    /// Trailing window for insider purchases in days (INSIDER_WINDOW_DAYS)
    pub insider_window_days: i64,
    /// Companies below this market cap never reach the home-page bucket (MIN_MARKET_CAP_HOME_PAGE)
    pub min_market_cap_home_page: f64,
    /// Size cap of the home-page bucket, keeps column heights similar (MAX_HOME_PAGE_INSIDERS)
    pub max_home_page_insiders: usize,
    /// Earliest price served; avoids comparing against the 2009 low (PRICE_HISTORY_START)
    pub price_history_start: NaiveDate,
    pub ttm_null_policy: TtmNullPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let price_history_start = std::env::var("PRICE_HISTORY_START")
            .unwrap_or_else(|_| DEFAULT_PRICE_HISTORY_START.to_string());
        let price_history_start = NaiveDate::parse_from_str(&price_history_start, "%Y-%m-%d")
            .map_err(|_| {
                AppError::Config("PRICE_HISTORY_START must be a YYYY-MM-DD date".to_string())
            })?;

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "filings.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            insider_cache_ttl_secs: std::env::var("INSIDER_CACHE_TTL_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse::<u64>()
                .unwrap_or(3600),
            insider_window_days: std::env::var("INSIDER_WINDOW_DAYS")
                .unwrap_or_else(|_| "30".to_string())
                .parse::<i64>()
                .unwrap_or(30),
            min_market_cap_home_page: std::env::var("MIN_MARKET_CAP_HOME_PAGE")
                .unwrap_or_else(|_| "10000000000".to_string())
                .parse::<f64>()
                .unwrap_or(10_000_000_000.0),
            max_home_page_insiders: std::env::var("MAX_HOME_PAGE_INSIDERS")
                .unwrap_or_else(|_| "14".to_string())
                .parse::<usize>()
                .unwrap_or(14),
            price_history_start,
            ttm_null_policy: std::env::var("TTM_NULL_POLICY")
                .unwrap_or_else(|_| "lenient".to_string())
                .parse()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttm_policy_parses_case_insensitively() {
        assert_eq!("Strict".parse::<TtmNullPolicy>().unwrap(), TtmNullPolicy::Strict);
        assert_eq!(" lenient ".parse::<TtmNullPolicy>().unwrap(), TtmNullPolicy::Lenient);
        assert!("poison".parse::<TtmNullPolicy>().is_err());
    }
}
