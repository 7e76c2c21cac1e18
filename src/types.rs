use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Filings
// ---------------------------------------------------------------------------

/// One company's fundamentals for one fiscal quarter.
///
/// `values` holds every tag the data layer returned for the quarter. A tag mapped to
/// `None` was structurally present but valueless; a tag missing from the map was not
/// reported (or could not be parsed) at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilingMetricRow {
    /// Period end as YYYYMM, e.g. 202003.
    pub period_end_year_month: i32,
    /// "Q1".."Q4" or "FY".
    pub fiscal_period_focus: String,
    pub filing_id: i64,
    pub filing_uri: String,
    #[serde(default)]
    pub values: IndexMap<String, Option<f64>>,
}

impl FilingMetricRow {
    /// Reported value for `tag`. Null and non-finite values count as not reported.
    pub fn value(&self, tag: &str) -> Option<f64> {
        self.values.get(tag).copied().flatten().filter(|v| v.is_finite())
    }

    pub fn has_value(&self, tag: &str) -> bool {
        self.value(tag).is_some()
    }
}

// ---------------------------------------------------------------------------
// Series points
// ---------------------------------------------------------------------------

/// A daily closing price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub x: NaiveDate,
    pub price: f64,
}

/// A fundamental metric value placed on the calendar.
/// `y = None` marks a quarter that exists but carries no value for the metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub x: NaiveDate,
    pub y: Option<f64>,
    pub fiscal_period_focus: String,
    pub source_filing_uri: String,
    pub source_filing_id: i64,
}

/// Anything with a date that can be bisected.
pub trait Dated {
    fn date(&self) -> NaiveDate;
}

impl Dated for PricePoint {
    fn date(&self) -> NaiveDate {
        self.x
    }
}

impl Dated for TimeSeriesPoint {
    fn date(&self) -> NaiveDate {
        self.x
    }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricCategory {
    IncomeStatement,
    CashFlow,
    BalanceSheet,
}

impl std::fmt::Display for MetricCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MetricCategory::IncomeStatement => "Income Statement",
            MetricCategory::CashFlow => "Cash Flow",
            MetricCategory::BalanceSheet => "Balance Sheet",
        };
        write!(f, "{s}")
    }
}

/// A surviving tag after reconciliation, in catalog order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciledMetric {
    pub tag: String,
    pub label: String,
    pub category: MetricCategory,
}

// ---------------------------------------------------------------------------
// Insider buying
// ---------------------------------------------------------------------------

/// Open-market insider purchases for one company over the trailing window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsiderAggregate {
    pub stock_id: i64,
    pub ticker: String,
    pub uri: String,
    pub name: String,
    pub sector: String,
    pub market_cap: f64,
    pub insider_count: i64,
    pub total_shares_bought: f64,
    pub total_buying: f64,
    /// Distinct insider relationships, sorted and comma separated.
    pub titles: String,
}

// ---------------------------------------------------------------------------
// Companies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: i64,
    pub ticker: String,
    pub uri: String,
    pub name: String,
    pub short_name: String,
    pub sector: String,
    pub market_cap: Option<f64>,
    /// YYYYMM of the first quarter with fundamentals.
    pub quarterly_data_start: i32,
}

impl Company {
    pub fn data_start_year(&self) -> i32 {
        self.quarterly_data_start / 100
    }
}

/// The ten top-level sectors, in display order.
pub const SECTORS: &[&str] = &[
    "Communication",
    "Consumer Discretionary",
    "Consumer Staples",
    "Energy",
    "Financials",
    "Health Care",
    "Industrials",
    "Materials",
    "Real Estate",
    "Technology",
];
