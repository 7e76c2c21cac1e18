use async_trait::async_trait;
use chrono::NaiveDate;
use indexmap::IndexMap;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::{debug, info};

use super::models::{
    CompanyRow, DirectoryRow, HoldingRow, InsiderAggregateRow, InvestorLinkRow, ListedCompanyRow,
    OwnerFilingRow, OwnerRow, PriceRow,
};
use crate::cache::{InsiderQuery, InsiderSource};
use crate::catalog::CATALOG;
use crate::config::{HOME_PAGE_LARGEST_MAX_ID, RECENT_FILERS_DATA_START_BEFORE, RECENT_FILERS_LIMIT};
use crate::error::Result;
use crate::state::CompanyDirectory;
use crate::types::{Company, FilingMetricRow, InsiderAggregate, PricePoint};

const RECENT_FILINGS_SQL: &str = r#"
    SELECT FDC.*, F.fiscal_period_focus, F.url AS filing_uri
    FROM filing_data_combined FDC
    JOIN filing F ON F.id = FDC.filing_id AND F.period_end_year_month = FDC.period_end_year_month
    WHERE FDC.stock_id = ? AND F.skip = 0 AND F.use_amended_filing_id = 0
    ORDER BY FDC.period_end_year_month DESC
"#;

const INSIDER_AGGREGATES_SQL: &str = r#"
    SELECT S.id AS stock_id, S.ticker, S.uri, S.short_name AS name, S.sector,
           IFNULL(S.market_cap, 0.0) AS market_cap,
           COUNT(F.insider_cik) AS insider_count,
           IFNULL(SUM(F.net_change_shares_direct), 0.0) AS total_shares_bought,
           IFNULL(SUM(F.net_change_value_direct), 0.0) AS total_buying,
           IFNULL(GROUP_CONCAT(DISTINCT F.insider_relationship), '') AS titles
    FROM insider_filing F
    JOIN stock S ON S.cik = F.cik
    JOIN insider I ON I.cik = F.insider_cik
    WHERE F.open_market_purchase = 1
      AND F.net_change_shares_direct > 0
      AND S.hide = 0
      AND F.filing_date > ?
    GROUP BY S.id, S.short_name, S.sector, S.market_cap, S.ticker, S.uri
    ORDER BY total_buying DESC
    LIMIT ?
"#;

const HOLDINGS_INSIGHT_SQL: &str = r#"
    SELECT OFE.filing_id, C.name_of_issuer, C.title_of_class, C.issuer_cik, OFE.cusip,
           OFE.value_sum, OFE.value_diff, OFE.shares_sum, OFE.shares_diff,
           OFE.principal_sum, OFE.principal_diff, OFE.change_in_value, OFE.change_in_ownership,
           OFE.put_or_call,
           IFNULL(OFE.investment_discretion, '') AS investment_discretion,
           IFNULL(OFE.other_managers, '') AS other_managers,
           S.ticker, S.uri
    FROM owner_filing_insight OFE
    LEFT JOIN cusip_info C ON OFE.cusip = C.cusip
    LEFT JOIN stock S ON C.issuer_cik > 0 AND C.issuer_cik = S.cik AND S.hide = 0
    WHERE OFE.filing_id = ?
    ORDER BY OFE.value_sum DESC, OFE.value_diff ASC, C.name_of_issuer ASC
"#;

// Raw entries summed per CUSIP when no diffed insight exists yet.
const HOLDINGS_AGGREGATE_SQL: &str = r#"
    SELECT OFE.filing_id, C.name_of_issuer, C.title_of_class, C.issuer_cik, OFE.cusip,
           IFNULL(SUM(OFE.value), 0.0) AS value_sum,
           0.0 AS value_diff,
           IFNULL(SUM(OFE.shares), 0.0) AS shares_sum,
           0.0 AS shares_diff,
           IFNULL(SUM(OFE.principal), 0.0) AS principal_sum,
           IFNULL(SUM(OFE.principal), 0.0) AS principal_diff,
           0.0 AS change_in_value,
           0.0 AS change_in_ownership,
           OFE.put_or_call,
           IFNULL(GROUP_CONCAT(DISTINCT OFE.investment_discretion), '') AS investment_discretion,
           IFNULL(GROUP_CONCAT(DISTINCT OFE.other_manager), '') AS other_managers,
           S.ticker, S.uri
    FROM owner_filing_entry OFE
    LEFT JOIN cusip_info C ON OFE.cusip = C.cusip
    LEFT JOIN stock S ON C.issuer_cik > 0 AND C.issuer_cik = S.cik AND S.hide = 0
    WHERE OFE.filing_id = ?
    GROUP BY OFE.filing_id, OFE.cusip, OFE.put_or_call, S.uri, S.ticker
    ORDER BY C.name_of_issuer ASC
"#;

const LISTED_COLUMNS: &str =
    "id AS stock_id, uri, name, ticker, latest_filing_date, market_cap";

/// Read-only access to the filings database.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Quarterly fundamentals, most recent period first. A metric column that is
    /// missing from the schema, or holds something that is not a number, is left out
    /// of the row rather than reported as null.
    pub async fn fetch_recent_filings(&self, stock_id: i64) -> Result<Vec<FilingMetricRow>> {
        let rows = sqlx::query(RECENT_FILINGS_SQL)
            .bind(stock_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(filing_row).collect()
    }

    /// Adjusted closes on or after `since`, oldest first.
    pub async fn fetch_price_history(&self, stock_id: i64, since: NaiveDate) -> Result<Vec<PricePoint>> {
        let rows = sqlx::query_as::<_, PriceRow>(
            "SELECT date, adj_close FROM price_history WHERE stock_id = ? AND date >= ? ORDER BY date ASC",
        )
        .bind(stock_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(PricePoint::from).collect())
    }

    pub async fn company_by_uri(&self, uri: &str) -> Result<Option<Company>> {
        let row = sqlx::query_as::<_, CompanyRow>(
            r#"
            SELECT id, ticker, uri, name, short_name, sector, market_cap, quarterly_data_start
            FROM stock WHERE uri = ? AND hide = 0
            "#,
        )
        .bind(uri)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Company::from))
    }

    /// Fills the directory with every visible company. Returns the number loaded.
    pub async fn load_directory(&self, directory: &CompanyDirectory) -> Result<usize> {
        let rows = sqlx::query_as::<_, DirectoryRow>(
            "SELECT id, ticker, uri, short_name FROM stock WHERE hide = 0",
        )
        .fetch_all(&self.pool)
        .await?;
        for row in &rows {
            directory.add_company(row.id, &row.ticker, &row.uri, &row.short_name);
        }
        info!("Loaded {} companies into directory", rows.len());
        Ok(rows.len())
    }

    /// Companies that filed most recently, in one sector or (for `None`) among
    /// dividend payers.
    pub async fn recent_filers(&self, sector: Option<&str>) -> Result<Vec<ListedCompanyRow>> {
        let filter = if sector.is_some() { "sector = ?" } else { "dividend_annual > 0" };
        let sql = format!(
            r#"
            SELECT stock_id, uri, name, ticker, latest_filing_date, market_cap FROM (
                SELECT {LISTED_COLUMNS} FROM stock
                WHERE hide = 0 AND {filter} AND quarterly_data_start < ?
                ORDER BY latest_filing_date DESC LIMIT ?
            )
            ORDER BY latest_filing_date DESC, market_cap DESC
            "#
        );
        let mut query = sqlx::query_as::<_, ListedCompanyRow>(&sql);
        if let Some(sector) = sector {
            query = query.bind(sector);
        }
        let rows = query
            .bind(RECENT_FILERS_DATA_START_BEFORE)
            .bind(RECENT_FILERS_LIMIT)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Largest companies by market cap, in one sector or (for `None`) the home-page set.
    pub async fn largest(&self, sector: Option<&str>) -> Result<Vec<ListedCompanyRow>> {
        let filter = if sector.is_some() { "sector = ?" } else { "id < ?" };
        let sql = format!(
            "SELECT {LISTED_COLUMNS} FROM stock WHERE hide = 0 AND {filter} ORDER BY market_cap DESC"
        );
        let query = sqlx::query_as::<_, ListedCompanyRow>(&sql);
        let query = match sector {
            Some(sector) => query.bind(sector),
            None => query.bind(HOME_PAGE_LARGEST_MAX_ID),
        };
        Ok(query.fetch_all(&self.pool).await?)
    }

    pub async fn investor_links(&self) -> Result<Vec<InvestorLinkRow>> {
        let rows = sqlx::query_as::<_, InvestorLinkRow>(
            "SELECT short_name, managers, uri FROM owner WHERE priority = 0 ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Case-insensitive lookup; ambiguous URIs resolve to nothing.
    pub async fn owner_by_uri(&self, uri: &str) -> Result<Option<OwnerRow>> {
        let mut rows = sqlx::query_as::<_, OwnerRow>(
            r#"
            SELECT id, cik, name, short_name, form13f_file_number, uri, managers
            FROM owner WHERE LOWER(uri) = LOWER(?) AND priority = 0
            "#,
        )
        .bind(uri)
        .fetch_all(&self.pool)
        .await?;
        if rows.len() != 1 {
            debug!(uri, matches = rows.len(), "Owner URI did not resolve to exactly one owner");
            return Ok(None);
        }
        Ok(rows.pop())
    }

    pub async fn latest_13f_filing(&self, cik: i64) -> Result<Option<OwnerFilingRow>> {
        let row = sqlx::query_as::<_, OwnerFilingRow>(
            r#"
            SELECT id,
                   substr(period_end_date, 1, 10) AS period_end_date,
                   period_end_year_month,
                   substr(filing_date, 1, 10) AS filing_date,
                   filing_type,
                   other_included_managers_json,
                   url
            FROM owner_filing
            WHERE cik = ? AND imported_holdings > 0 AND filing_type LIKE '13F%'
            ORDER BY period_end_date DESC
            LIMIT 1
            "#,
        )
        .bind(cik)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Diffed holdings for a filing, falling back to raw entries summed per CUSIP.
    pub async fn holdings_for_filing(&self, filing_id: i64) -> Result<Vec<HoldingRow>> {
        let rows = sqlx::query_as::<_, HoldingRow>(HOLDINGS_INSIGHT_SQL)
            .bind(filing_id)
            .fetch_all(&self.pool)
            .await?;
        if !rows.is_empty() {
            return Ok(rows);
        }

        debug!(filing_id, "No holdings insight, aggregating raw entries");
        let rows = sqlx::query_as::<_, HoldingRow>(HOLDINGS_AGGREGATE_SQL)
            .bind(filing_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

fn filing_row(row: &SqliteRow) -> Result<FilingMetricRow> {
    let period: i64 = row.try_get("period_end_year_month")?;
    let mut values = IndexMap::new();
    for def in CATALOG {
        match row.try_get::<Option<f64>, _>(def.tag) {
            Ok(value) => {
                values.insert(def.tag.to_string(), value);
            }
            Err(sqlx::Error::ColumnNotFound(_)) => {}
            Err(e) => debug!(tag = def.tag, "Skipping unreadable metric: {e}"),
        }
    }

    Ok(FilingMetricRow {
        period_end_year_month: i32::try_from(period).unwrap_or_default(),
        fiscal_period_focus: row.try_get("fiscal_period_focus")?,
        filing_id: row.try_get("filing_id")?,
        filing_uri: row.try_get("filing_uri")?,
        values,
    })
}

#[async_trait]
impl InsiderSource for SqliteRepository {
    async fn fetch_insider_aggregates(&self, query: InsiderQuery) -> Result<Vec<InsiderAggregate>> {
        let rows = sqlx::query_as::<_, InsiderAggregateRow>(INSIDER_AGGREGATES_SQL)
            .bind(query.since)
            .bind(query.limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(InsiderAggregate::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn repo() -> SqliteRepository {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();

        sqlx::raw_sql(
            r#"
            INSERT INTO stock (id, cik, ticker, uri, name, short_name, sector, market_cap,
                               quarterly_data_start, latest_filing_date, dividend_annual, hide)
            VALUES (1, 320193, 'AAPL', 'AAPL-Apple', 'Apple Inc.', 'Apple', 'Technology', 3.0e12, 200903, '2024-05-01', 0.96, 0),
                   (2, 789019, 'MSFT', 'MSFT-Microsoft', 'Microsoft Corp', 'Microsoft', 'Technology', 3.1e12, 200903, '2024-04-25', 3.0, 0),
                   (3, 111111, 'HIDE', 'HIDE-Hidden', 'Hidden Co', 'Hidden', 'Technology', 1.0e9, 200903, '2024-05-02', 0, 1),
                   (4, 222222, 'XOM', 'XOM-Exxon', 'Exxon Mobil', 'Exxon', 'Energy', 4.0e11, 200903, '2024-05-03', 3.8, 0)
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();

        SqliteRepository::new(pool)
    }

    #[tokio::test]
    async fn recent_filings_are_newest_first_with_nulls_kept() {
        let repo = repo().await;
        sqlx::raw_sql(
            r#"
            INSERT INTO filing (id, stock_id, period_end_year_month, fiscal_period_focus, url, skip, use_amended_filing_id)
            VALUES (10, 1, 202312, 'Q1', '/Archives/10', 0, 0),
                   (11, 1, 202403, 'Q2', '/Archives/11', 0, 0),
                   (12, 1, 202406, 'Q3', '/Archives/12', 1, 0);
            INSERT INTO filing_data_combined (stock_id, filing_id, period_end_year_month, SalesRevenueNet, NetIncomeLoss)
            VALUES (1, 10, 202312, 119.5e9, 33.9e9),
                   (1, 11, 202403, 90.7e9, NULL),
                   (1, 12, 202406, 85.7e9, 21.4e9);
            "#,
        )
        .execute(repo.pool())
        .await
        .unwrap();

        let rows = repo.fetch_recent_filings(1).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].period_end_year_month, 202403);
        assert_eq!(rows[0].fiscal_period_focus, "Q2");
        assert_eq!(rows[0].filing_uri, "/Archives/11");
        assert!(rows[0].values.contains_key("NetIncomeLoss"));
        assert_eq!(rows[0].value("NetIncomeLoss"), None);
        assert_eq!(rows[1].value("SalesRevenueNet"), Some(119.5e9));
        assert_eq!(rows[1].values.len(), CATALOG.len());
    }

    #[tokio::test]
    async fn price_history_is_ascending_from_start() {
        let repo = repo().await;
        sqlx::raw_sql(
            r#"
            INSERT INTO price_history (stock_id, date, adj_close)
            VALUES (1, '2009-12-31', 7.5), (1, '2010-01-05', 7.6), (1, '2010-01-04', 7.4), (2, '2010-01-04', 30.0)
            "#,
        )
        .execute(repo.pool())
        .await
        .unwrap();

        let since = NaiveDate::from_ymd_opt(2010, 1, 1).unwrap();
        let prices = repo.fetch_price_history(1, since).await.unwrap();
        let dates: Vec<String> = prices.iter().map(|p| p.x.to_string()).collect();
        assert_eq!(dates, vec!["2010-01-04", "2010-01-05"]);
        assert_eq!(prices[0].price, 7.4);
    }

    #[tokio::test]
    async fn insider_aggregates_group_purchases_per_company() {
        let repo = repo().await;
        sqlx::raw_sql(
            r#"
            INSERT INTO insider (cik, name) VALUES (1, 'Tim'), (2, 'Jeff'), (3, 'Sam');
            INSERT INTO insider_filing (cik, insider_cik, filing_date, open_market_purchase,
                                        net_change_shares_direct, net_change_value_direct, insider_relationship)
            VALUES (320193, 1, '2024-05-10', 1, 1000, 180000, 'Director'),
                   (320193, 2, '2024-05-11', 1, 500, 90000, 'CEO'),
                   (320193, 3, '2024-05-12', 1, 10, 1800, 'Director'),
                   (320193, 1, '2024-05-12', 0, 10, 1800, 'Director'),
                   (789019, 2, '2024-05-12', 1, 2000, 800000, 'CFO'),
                   (789019, 2, '2024-01-01', 1, 2000, 800000, 'CFO'),
                   (111111, 2, '2024-05-12', 1, 2000, 900000, 'CFO');
            "#,
        )
        .execute(repo.pool())
        .await
        .unwrap();

        let since = NaiveDate::from_ymd_opt(2024, 4, 20).unwrap();
        let rows = repo
            .fetch_insider_aggregates(InsiderQuery { since, limit: 100 })
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].ticker, "MSFT");
        assert_eq!(rows[0].total_buying, 800000.0);
        assert_eq!(rows[1].ticker, "AAPL");
        assert_eq!(rows[1].insider_count, 3);
        assert_eq!(rows[1].total_shares_bought, 1510.0);
        assert_eq!(rows[1].titles, "CEO, Director");
        assert_eq!(rows[1].name, "Apple");
    }

    #[tokio::test]
    async fn directory_loads_visible_companies() {
        let repo = repo().await;
        let directory = CompanyDirectory::new();
        assert_eq!(repo.load_directory(&directory).await.unwrap(), 3);
        assert!(directory.contains("AAPL"));
        assert!(!directory.contains("HIDE"));

        let company = repo.company_by_uri("AAPL-Apple").await.unwrap().unwrap();
        assert_eq!(company.data_start_year(), 2009);
        assert!(repo.company_by_uri("HIDE-Hidden").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn listings_filter_by_sector() {
        let repo = repo().await;
        let tech = repo.recent_filers(Some("Technology")).await.unwrap();
        let tickers: Vec<&str> = tech.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["AAPL", "MSFT"]);

        let home = repo.recent_filers(None).await.unwrap();
        assert_eq!(home.first().map(|r| r.ticker.as_str()), Some("XOM"));

        let largest = repo.largest(Some("Technology")).await.unwrap();
        assert_eq!(largest[0].ticker, "MSFT");
        assert_eq!(repo.largest(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn owner_holdings_fall_back_to_raw_entries() {
        let repo = repo().await;
        sqlx::raw_sql(
            r#"
            INSERT INTO owner (id, cik, name, short_name, form13f_file_number, uri, managers, priority)
            VALUES (1, 1067983, 'Berkshire Hathaway Inc', 'Berkshire', '028-04545', 'Berkshire-Hathaway', 'Warren Buffett', 0);
            INSERT INTO owner_filing (id, cik, period_end_date, period_end_year_month, filing_date, filing_type, url, imported_holdings)
            VALUES (50, 1067983, '2023-12-31 00:00:00', 202312, '2024-02-14 00:00:00', '13F-HR', '/Archives/50', 1),
                   (51, 1067983, '2024-03-31 00:00:00', 202403, '2024-05-15 00:00:00', '13F-HR', '/Archives/51', 1),
                   (52, 1067983, '2024-06-30 00:00:00', 202406, '2024-08-14 00:00:00', '13F-HR', '/Archives/52', 0);
            INSERT INTO cusip_info (cusip, name_of_issuer, title_of_class, issuer_cik)
            VALUES ('037833100', 'APPLE INC', 'COM', 320193), ('999999999', 'PRIVATE CO', 'COM', 0);
            INSERT INTO owner_filing_entry (filing_id, cusip, value, shares, principal, put_or_call, investment_discretion, other_manager)
            VALUES (51, '037833100', 100, 1000, 0, '', 'DFND', '4'),
                   (51, '037833100', 50, 500, 0, '', 'DFND', '8'),
                   (51, '999999999', 5, 10, 0, '', 'SOLE', NULL);
            INSERT INTO owner_filing_insight (filing_id, cusip, value_sum, value_diff, shares_sum, shares_diff, change_in_ownership, put_or_call)
            VALUES (50, '037833100', 140, 10, 1500, 100, 7.1, '');
            "#,
        )
        .execute(repo.pool())
        .await
        .unwrap();

        let owner = repo.owner_by_uri("berkshire-hathaway").await.unwrap().unwrap();
        assert_eq!(owner.short_name, "Berkshire");
        let filing = repo.latest_13f_filing(owner.cik).await.unwrap().unwrap();
        assert_eq!(filing.id, 51);
        assert_eq!(filing.period_end_date, "2024-03-31");
        assert_eq!(filing.filing_date, "2024-05-15");

        let raw = repo.holdings_for_filing(51).await.unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0].name_of_issuer.as_deref(), Some("APPLE INC"));
        assert_eq!(raw[0].value_sum, 150.0);
        assert_eq!(raw[0].shares_sum, 1500.0);
        assert_eq!(raw[0].ticker.as_deref(), Some("AAPL"));
        assert_eq!(raw[1].ticker, None);

        let insight = repo.holdings_for_filing(50).await.unwrap();
        assert_eq!(insight.len(), 1);
        assert_eq!(insight[0].shares_diff, 100.0);
        assert_eq!(insight[0].uri.as_deref(), Some("AAPL-Apple"));

        assert!(repo.owner_by_uri("nobody").await.unwrap().is_none());
    }
}
