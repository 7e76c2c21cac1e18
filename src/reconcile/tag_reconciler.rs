use std::collections::HashSet;

use tracing::debug;

use crate::catalog::metric_catalog::{
    COMMON_SHARES_OUTSTANDING, EPS_BASIC, EPS_DILUTED, WEIGHTED_SHARES_BASIC, WEIGHTED_SHARES_DILUTED,
};
use crate::catalog::CATALOG;
use crate::config::RECENT_FILINGS_WINDOW;
use crate::types::{FilingMetricRow, ReconciledMetric};

/// Selects the catalog metrics a company actually reports.
///
/// `filings` must be sorted by period descending. Only the most recent
/// [`RECENT_FILINGS_WINDOW`] rows decide presence, so a tag the company stopped
/// reporting does not flicker back in from old history.
///
/// Exclusions, applied in order:
/// 1. basic + diluted weighted share counts: keep basic, drop diluted and the
///    common-shares-outstanding tag as well;
/// 2. otherwise basic weighted shares + common shares outstanding: drop the latter;
/// 3. basic + diluted EPS: drop diluted.
pub fn reconcile(filings: &[FilingMetricRow]) -> Vec<ReconciledMetric> {
    let mut found: HashSet<&'static str> = HashSet::new();

    for row in filings.iter().take(RECENT_FILINGS_WINDOW) {
        for metric in CATALOG {
            if row.has_value(metric.tag) {
                found.insert(metric.tag);
            }
        }
    }

    if found.contains(WEIGHTED_SHARES_DILUTED) && found.contains(WEIGHTED_SHARES_BASIC) {
        found.remove(WEIGHTED_SHARES_DILUTED);
        found.remove(COMMON_SHARES_OUTSTANDING);
    } else if found.contains(WEIGHTED_SHARES_BASIC) && found.contains(COMMON_SHARES_OUTSTANDING) {
        found.remove(COMMON_SHARES_OUTSTANDING);
    }

    if found.contains(EPS_BASIC) && found.contains(EPS_DILUTED) {
        found.remove(EPS_DILUTED);
    }

    let reconciled: Vec<ReconciledMetric> = CATALOG
        .iter()
        .filter(|m| found.contains(m.tag))
        .map(|m| ReconciledMetric {
            tag: m.tag.to_string(),
            label: m.label.to_string(),
            category: m.category,
        })
        .collect();

    debug!(
        inspected = filings.len().min(RECENT_FILINGS_WINDOW),
        metrics = reconciled.len(),
        "reconciled filing tags"
    );
    reconciled
}

/// Restricts each row's values to the reconciled tags, in reconciled order.
/// Tags the row lacks are filled with null so every quarter has the same shape.
pub fn project_rows(filings: &[FilingMetricRow], metrics: &[ReconciledMetric]) -> Vec<FilingMetricRow> {
    filings
        .iter()
        .map(|row| FilingMetricRow {
            period_end_year_month: row.period_end_year_month,
            fiscal_period_focus: row.fiscal_period_focus.clone(),
            filing_id: row.filing_id,
            filing_uri: row.filing_uri.clone(),
            values: metrics
                .iter()
                .map(|m| (m.tag.clone(), row.value(&m.tag)))
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MetricCategory;

    fn filing(pym: i32, tags: &[(&str, Option<f64>)]) -> FilingMetricRow {
        FilingMetricRow {
            period_end_year_month: pym,
            fiscal_period_focus: "Q1".to_string(),
            filing_id: pym as i64,
            filing_uri: format!("/Archives/{pym}"),
            values: tags.iter().map(|(t, v)| (t.to_string(), *v)).collect(),
        }
    }

    fn tags(set: &[ReconciledMetric]) -> Vec<&str> {
        set.iter().map(|m| m.tag.as_str()).collect()
    }

    #[test]
    fn empty_input_yields_empty_set() {
        assert!(reconcile(&[]).is_empty());
    }

    #[test]
    fn basic_and_diluted_shares_keep_only_basic() {
        let filings = vec![
            filing(202306, &[(WEIGHTED_SHARES_BASIC, Some(100.0)), (WEIGHTED_SHARES_DILUTED, Some(104.0))]),
            filing(202303, &[(COMMON_SHARES_OUTSTANDING, Some(99.0))]),
        ];
        let reconciled = reconcile(&filings);
        assert_eq!(tags(&reconciled), vec![WEIGHTED_SHARES_BASIC]);
    }

    #[test]
    fn basic_shares_drop_common_shares_without_diluted() {
        let filings = vec![filing(
            202306,
            &[(WEIGHTED_SHARES_BASIC, Some(100.0)), (COMMON_SHARES_OUTSTANDING, Some(99.0))],
        )];
        assert_eq!(tags(&reconcile(&filings)), vec![WEIGHTED_SHARES_BASIC]);
    }

    #[test]
    fn diluted_and_common_shares_both_survive_without_basic() {
        let filings = vec![filing(
            202306,
            &[(WEIGHTED_SHARES_DILUTED, Some(104.0)), (COMMON_SHARES_OUTSTANDING, Some(99.0))],
        )];
        assert_eq!(
            tags(&reconcile(&filings)),
            vec![WEIGHTED_SHARES_DILUTED, COMMON_SHARES_OUTSTANDING]
        );
    }

    #[test]
    fn diluted_eps_dropped_when_basic_present() {
        let filings = vec![
            filing(202306, &[(EPS_DILUTED, Some(1.1))]),
            filing(202303, &[(EPS_BASIC, Some(1.2))]),
        ];
        assert_eq!(tags(&reconcile(&filings)), vec![EPS_BASIC]);
    }

    #[test]
    fn only_four_most_recent_filings_decide_presence() {
        let filings = vec![
            filing(202312, &[("Assets", Some(1.0))]),
            filing(202309, &[("Assets", Some(1.0))]),
            filing(202306, &[("Assets", Some(1.0))]),
            filing(202303, &[("Assets", Some(1.0))]),
            filing(202212, &[("InventoryNet", Some(3.0))]),
        ];
        assert_eq!(tags(&reconcile(&filings)), vec!["Assets"]);
    }

    #[test]
    fn null_values_do_not_mark_presence() {
        let filings = vec![filing(202306, &[("Assets", None), ("Liabilities", Some(2.0))])];
        assert_eq!(tags(&reconcile(&filings)), vec!["Liabilities"]);
    }

    #[test]
    fn nan_values_do_not_mark_presence() {
        let filings = vec![
            filing(202306, &[(EPS_BASIC, Some(f64::NAN)), (EPS_DILUTED, Some(1.5))]),
            filing(202303, &[(EPS_BASIC, Some(f64::NAN)), (EPS_DILUTED, Some(1.4))]),
        ];
        assert_eq!(tags(&reconcile(&filings)), vec![EPS_DILUTED]);
    }

    #[test]
    fn output_follows_catalog_category_order() {
        let filings = vec![filing(
            202306,
            &[
                ("Assets", Some(1.0)),
                ("NetCashProvidedByUsedInOperatingActivities", Some(2.0)),
                ("SalesRevenueNet", Some(3.0)),
            ],
        )];
        let out = reconcile(&filings);
        let categories: Vec<MetricCategory> = out.iter().map(|m| m.category).collect();
        assert_eq!(
            categories,
            vec![MetricCategory::IncomeStatement, MetricCategory::CashFlow, MetricCategory::BalanceSheet]
        );
        assert_eq!(out[0].label, "Revenue, Net");
    }

    #[test]
    fn projection_fills_missing_tags_with_null() {
        let filings = vec![
            filing(202306, &[("Assets", Some(1.0)), ("GrossProfit", Some(9.0))]),
            filing(202303, &[("GrossProfit", Some(8.0))]),
        ];
        let metrics = reconcile(&filings);
        let rows = project_rows(&filings, &metrics);
        assert_eq!(rows[1].values.get("Assets"), Some(&None));
        assert_eq!(rows[1].value("GrossProfit"), Some(8.0));
        assert_eq!(rows[0].values.keys().collect::<Vec<_>>(), vec!["GrossProfit", "Assets"]);
    }
}
