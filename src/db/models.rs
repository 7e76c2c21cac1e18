//! Database row types matching the schema in migrations/0001_init.sql.
//! Used by sqlx for typed queries.
use chrono::NaiveDate;
use serde::Serialize;

use crate::types::{Company, InsiderAggregate, PricePoint};

#[derive(Debug, sqlx::FromRow)]
pub struct CompanyRow {
    pub id: i64,
    pub ticker: String,
    pub uri: String,
    pub name: String,
    pub short_name: String,
    pub sector: String,
    pub market_cap: Option<f64>,
    pub quarterly_data_start: i64,
}

impl From<CompanyRow> for Company {
    fn from(row: CompanyRow) -> Self {
        Company {
            id: row.id,
            ticker: row.ticker,
            uri: row.uri,
            name: row.name,
            short_name: row.short_name,
            sector: row.sector,
            market_cap: row.market_cap,
            quarterly_data_start: i32::try_from(row.quarterly_data_start).unwrap_or_default(),
        }
    }
}

/// Directory seed: every visible company.
#[derive(Debug, sqlx::FromRow)]
pub struct DirectoryRow {
    pub id: i64,
    pub ticker: String,
    pub uri: String,
    pub short_name: String,
}

#[derive(Debug, sqlx::FromRow)]
pub struct PriceRow {
    pub date: NaiveDate,
    pub adj_close: f64,
}

impl From<PriceRow> for PricePoint {
    fn from(row: PriceRow) -> Self {
        PricePoint { x: row.date, price: row.adj_close }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct InsiderAggregateRow {
    pub stock_id: i64,
    pub ticker: String,
    pub uri: String,
    pub name: String,
    pub sector: String,
    pub market_cap: f64,
    pub insider_count: i64,
    pub total_shares_bought: f64,
    pub total_buying: f64,
    /// GROUP_CONCAT output, unordered.
    pub titles: String,
}

impl From<InsiderAggregateRow> for InsiderAggregate {
    fn from(row: InsiderAggregateRow) -> Self {
        InsiderAggregate {
            stock_id: row.stock_id,
            ticker: row.ticker,
            uri: row.uri,
            name: row.name,
            sector: row.sector,
            market_cap: row.market_cap,
            insider_count: row.insider_count,
            total_shares_bought: row.total_shares_bought,
            total_buying: row.total_buying,
            titles: normalize_titles(&row.titles),
        }
    }
}

/// `"Director,CEO,Director"` -> `"CEO, Director"`
pub fn normalize_titles(raw: &str) -> String {
    let mut titles: Vec<&str> = raw.split(',').map(str::trim).filter(|t| !t.is_empty()).collect();
    titles.sort_unstable();
    titles.dedup();
    titles.join(", ")
}

/// Companies listed on sector and home pages.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct ListedCompanyRow {
    pub stock_id: i64,
    pub uri: String,
    pub name: String,
    pub ticker: String,
    pub latest_filing_date: Option<String>,
    pub market_cap: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct InvestorLinkRow {
    pub short_name: String,
    pub managers: Option<String>,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct OwnerRow {
    pub id: i64,
    pub cik: i64,
    pub name: String,
    pub short_name: String,
    pub form13f_file_number: Option<String>,
    pub uri: String,
    pub managers: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct OwnerFilingRow {
    pub id: i64,
    /// First ten characters of the stored period end, YYYY-MM-DD.
    pub period_end_date: String,
    pub period_end_year_month: i64,
    pub filing_date: String,
    pub filing_type: String,
    pub other_included_managers_json: Option<String>,
    pub url: String,
}

/// One holding of a 13F filing. Values are in thousands of dollars, principal
/// amounts in dollars.
#[derive(Debug, Clone, PartialEq, Default, sqlx::FromRow)]
pub struct HoldingRow {
    pub filing_id: i64,
    pub name_of_issuer: Option<String>,
    pub title_of_class: Option<String>,
    pub issuer_cik: Option<i64>,
    pub cusip: String,
    pub value_sum: f64,
    pub value_diff: f64,
    pub shares_sum: f64,
    pub shares_diff: f64,
    pub principal_sum: f64,
    pub principal_diff: f64,
    pub change_in_value: f64,
    /// Percent change in the position versus the previous quarter.
    pub change_in_ownership: f64,
    pub put_or_call: String,
    pub investment_discretion: String,
    pub other_managers: String,
    pub ticker: Option<String>,
    pub uri: Option<String>,
}
