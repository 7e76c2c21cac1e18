use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::types::{FilingMetricRow, TimeSeriesPoint};

/// Last calendar day of the YYYYMM period.
///
/// February always ends on the 28th; leap years are deliberately not special-cased.
pub fn date_from_year_month(year_month: i32) -> Option<NaiveDate> {
    let year = year_month / 100;
    let month = (year_month % 100) as u32;
    let last_day = match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => 28,
        _ => return None,
    };
    NaiveDate::from_ymd_opt(year, month, last_day)
}

/// Converts period-keyed filing rows into an ascending series for one tag.
///
/// Rows that never reported `tag`, or whose value is not a finite number, are
/// dropped. Rows that carry the tag with a null value stay in the series with
/// `y = None` so index positions (used by the TTM lookback) are preserved.
pub fn to_series(rows: &[FilingMetricRow], tag: &str) -> Vec<TimeSeriesPoint> {
    let mut points: Vec<TimeSeriesPoint> = Vec::with_capacity(rows.len());

    for row in rows {
        let y = match row.values.get(tag) {
            None => continue,
            Some(None) => None,
            Some(Some(v)) if v.is_finite() => Some(*v),
            Some(Some(v)) => {
                debug!(tag, filing_id = row.filing_id, value = %v, "dropping unparseable metric value");
                continue;
            }
        };

        let Some(x) = date_from_year_month(row.period_end_year_month) else {
            warn!(
                filing_id = row.filing_id,
                period = row.period_end_year_month,
                "filing has an invalid period end"
            );
            continue;
        };

        points.push(TimeSeriesPoint {
            x,
            y,
            fiscal_period_focus: row.fiscal_period_focus.clone(),
            source_filing_uri: row.filing_uri.clone(),
            source_filing_id: row.filing_id,
        });
    }

    // Input normally arrives newest first; a stable sort also handles shuffled rows.
    points.sort_by_key(|p| p.x);
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pym: i32, value: Option<Option<f64>>) -> FilingMetricRow {
        let mut values = indexmap::IndexMap::new();
        if let Some(v) = value {
            values.insert("NetIncomeLoss".to_string(), v);
        }
        FilingMetricRow {
            period_end_year_month: pym,
            fiscal_period_focus: "Q2".to_string(),
            filing_id: pym as i64,
            filing_uri: format!("/Archives/{pym}"),
            values,
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn period_maps_to_month_end() {
        assert_eq!(date_from_year_month(202003), Some(ymd(2020, 3, 31)));
        assert_eq!(date_from_year_month(202302), Some(ymd(2023, 2, 28)));
        assert_eq!(date_from_year_month(202306), Some(ymd(2023, 6, 30)));
        assert_eq!(date_from_year_month(202313), None);
    }

    #[test]
    fn february_of_leap_year_still_ends_on_28th() {
        assert_eq!(date_from_year_month(202402), Some(ymd(2024, 2, 28)));
    }

    #[test]
    fn descending_input_is_reversed() {
        let rows = vec![row(202312, Some(Some(3.0))), row(202309, Some(Some(2.0))), row(202306, Some(Some(1.0)))];
        let ys: Vec<Option<f64>> = to_series(&rows, "NetIncomeLoss").iter().map(|p| p.y).collect();
        assert_eq!(ys, vec![Some(1.0), Some(2.0), Some(3.0)]);
    }

    #[test]
    fn shuffled_input_is_sorted() {
        let rows = vec![
            row(202309, Some(Some(2.0))),
            row(202103, Some(Some(0.5))),
            row(202312, Some(Some(3.0))),
            row(202206, Some(Some(1.0))),
        ];
        let series = to_series(&rows, "NetIncomeLoss");
        assert!(series.windows(2).all(|w| w[0].x <= w[1].x));
        assert_eq!(series.len(), 4);
    }

    #[test]
    fn null_is_kept_but_missing_and_nan_are_dropped() {
        let rows = vec![
            row(202312, Some(None)),
            row(202309, None),
            row(202306, Some(Some(f64::NAN))),
            row(202303, Some(Some(4.0))),
        ];
        let series = to_series(&rows, "NetIncomeLoss");
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].y, Some(4.0));
        assert_eq!(series[1].y, None);
        assert_eq!(series[1].source_filing_uri, "/Archives/202312");
    }
}
