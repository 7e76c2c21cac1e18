//! Presentation of an institutional owner's 13F holdings.

use serde::Serialize;

use crate::chart::format::{format_whole_currency, format_whole_number};
use crate::db::models::HoldingRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentKind {
    Shares,
    Bonds,
    PutOptions,
    CallOptions,
}

impl InstrumentKind {
    /// Suffix shown after the issuer name.
    pub fn suffix(self) -> &'static str {
        match self {
            InstrumentKind::Shares => "",
            InstrumentKind::Bonds => "Bonds",
            InstrumentKind::PutOptions => "Put options",
            InstrumentKind::CallOptions => "Call options",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
    Flat,
}

impl Trend {
    fn of(change: f64) -> Self {
        if change < 0.0 {
            Trend::Down
        } else {
            Trend::Up
        }
    }
}

/// One display row of the holdings table. Empty strings are blank cells.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoldingView {
    pub issuer: String,
    pub ticker: Option<String>,
    /// Company page, only when the issuer is a listed company we track.
    pub uri: Option<String>,
    pub instrument: InstrumentKind,
    pub shares: String,
    pub shares_change: String,
    pub percent_change: String,
    pub value: String,
    pub value_change: String,
    pub trend: Trend,
}

fn is_bond(row: &HoldingRow) -> bool {
    row.principal_sum > 0.0 || row.principal_diff != 0.0
}

fn instrument(row: &HoldingRow) -> InstrumentKind {
    if is_bond(row) {
        InstrumentKind::Bonds
    } else if row.put_or_call.contains('P') {
        InstrumentKind::PutOptions
    } else if row.put_or_call.contains('C') {
        InstrumentKind::CallOptions
    } else {
        InstrumentKind::Shares
    }
}

/// Rounds half up, so -2.5% shows as -2%.
fn percent(change: f64) -> String {
    format!("{}%", (change + 0.5).floor())
}

pub fn holding_view(row: &HoldingRow) -> HoldingView {
    let mut view = HoldingView {
        issuer: row.name_of_issuer.clone().unwrap_or_else(|| row.cusip.clone()),
        ticker: row.ticker.clone(),
        uri: row.uri.clone().filter(|_| row.issuer_cik.unwrap_or(0) > 0),
        instrument: instrument(row),
        shares: String::new(),
        shares_change: String::new(),
        percent_change: String::new(),
        value: String::new(),
        value_change: String::new(),
        trend: Trend::Flat,
    };

    if is_bond(row) {
        view.value = format_whole_currency(row.principal_sum);
        if row.principal_diff != 0.0 {
            view.value_change = format_whole_currency(row.principal_diff);
            view.percent_change = percent(row.change_in_ownership);
            view.trend = Trend::of(row.principal_diff);
        }
        return view;
    }

    view.value = format_whole_currency(row.value_sum * 1000.0);
    view.shares = format!("{} sh", format_whole_number(row.shares_sum));

    if row.value_diff != 0.0 {
        view.value_change = format_whole_currency(row.value_diff * 1000.0);
        view.percent_change = percent(row.change_in_ownership);
        view.trend = Trend::of(row.value_diff);
    }

    // Share movement wins over value movement for the colour.
    if row.shares_diff != 0.0 {
        view.shares_change = format!("{} sh", format_whole_number(row.shares_diff));
        view.percent_change = if row.shares_diff == row.shares_sum {
            "NEW".to_string()
        } else {
            percent(row.change_in_ownership)
        };
        view.trend = Trend::of(row.shares_diff);
    }

    view
}

pub fn holding_views(rows: &[HoldingRow]) -> Vec<HoldingView> {
    rows.iter().map(holding_view).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stock(value_sum: f64, value_diff: f64, shares_sum: f64, shares_diff: f64, pct: f64) -> HoldingRow {
        HoldingRow {
            filing_id: 1,
            name_of_issuer: Some("APPLE INC".to_string()),
            issuer_cik: Some(320193),
            cusip: "037833100".to_string(),
            value_sum,
            value_diff,
            shares_sum,
            shares_diff,
            change_in_ownership: pct,
            ticker: Some("AAPL".to_string()),
            uri: Some("AAPL-Apple".to_string()),
            ..HoldingRow::default()
        }
    }

    #[test]
    fn new_position_is_flagged() {
        let v = holding_view(&stock(1_500.0, 1_500.0, 10_000.0, 10_000.0, 100.0));
        assert_eq!(v.instrument, InstrumentKind::Shares);
        assert_eq!(v.shares, "10,000 sh");
        assert_eq!(v.shares_change, "10,000 sh");
        assert_eq!(v.percent_change, "NEW");
        assert_eq!(v.value, "$1,500,000");
        assert_eq!(v.value_change, "$1,500,000");
        assert_eq!(v.trend, Trend::Up);
        assert_eq!(v.uri.as_deref(), Some("AAPL-Apple"));
    }

    #[test]
    fn reduced_position_trends_down() {
        let v = holding_view(&stock(900.0, -100.0, 9_000.0, -1_000.0, -10.4));
        assert_eq!(v.shares_change, "-1,000 sh");
        assert_eq!(v.percent_change, "-10%");
        assert_eq!(v.value_change, "-$100,000");
        assert_eq!(v.trend, Trend::Down);
    }

    #[test]
    fn share_change_overrides_value_trend() {
        let v = holding_view(&stock(1_100.0, 100.0, 9_000.0, -500.0, -5.3));
        assert_eq!(v.trend, Trend::Down);
        assert_eq!(v.percent_change, "-5%");
    }

    #[test]
    fn unchanged_position_has_blank_change_cells() {
        let v = holding_view(&stock(1_000.0, 0.0, 10_000.0, 0.0, 0.0));
        assert!(v.shares_change.is_empty());
        assert!(v.value_change.is_empty());
        assert!(v.percent_change.is_empty());
        assert_eq!(v.trend, Trend::Flat);
    }

    #[test]
    fn bonds_report_principal() {
        let row = HoldingRow {
            name_of_issuer: Some("TESLA INC".to_string()),
            cusip: "88160RAG6".to_string(),
            principal_sum: 2_000_000.0,
            principal_diff: -500_000.0,
            change_in_ownership: -20.0,
            shares_sum: 7.0,
            ..HoldingRow::default()
        };
        let v = holding_view(&row);
        assert_eq!(v.instrument, InstrumentKind::Bonds);
        assert_eq!(v.value, "$2,000,000");
        assert_eq!(v.value_change, "-$500,000");
        assert_eq!(v.percent_change, "-20%");
        assert!(v.shares.is_empty());
        assert_eq!(v.trend, Trend::Down);
    }

    #[test]
    fn options_and_unlinked_issuers() {
        let mut put = stock(10.0, 0.0, 100.0, 0.0, 0.0);
        put.put_or_call = "Put".to_string();
        put.issuer_cik = Some(0);
        let v = holding_view(&put);
        assert_eq!(v.instrument, InstrumentKind::PutOptions);
        assert_eq!(v.uri, None);

        let mut call = stock(10.0, 0.0, 100.0, 0.0, 0.0);
        call.put_or_call = "Call".to_string();
        assert_eq!(holding_view(&call).instrument, InstrumentKind::CallOptions);
    }

    #[test]
    fn percent_rounds_half_up() {
        assert_eq!(percent(2.5), "3%");
        assert_eq!(percent(-2.5), "-2%");
        assert_eq!(percent(-0.2), "0%");
    }
}
