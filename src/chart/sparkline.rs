//! Small per-metric line charts for the statement tabs.
//!
//! Unlike the comparison chart, sparklines draw a null quarter on the zero line rather
//! than leaving a gap, and their scales are not rounded.

use serde::Serialize;

use super::engine::{ChartLayout, Margin, Path, SEC_BASE_URL};
use super::format::{format_date, format_metric_value};
use super::lookup::{at_or_before, strictly_before};
use super::scale::{ScaleKind, TimeScale, ValueScale};
use crate::catalog::metric_catalog::{in_category, NET_INCOME};
use crate::series::to_series;
use crate::types::{FilingMetricRow, MetricCategory, TimeSeriesPoint};

pub fn sparkline_layout() -> ChartLayout {
    ChartLayout::with_margin(280.0, 80.0, Margin { top: 20.0, right: 30.0, bottom: 10.0, left: 10.0 })
}

/// Focus ring position and value text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SparkFocus {
    pub index: usize,
    pub x: f64,
    pub y: f64,
    pub value_text: String,
    pub filing_link: String,
    /// Long date under the sparkline; hidden until the pointer moves.
    pub date_label: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Sparkline {
    tag: String,
    title: String,
    layout: ChartLayout,
    x: TimeScale,
    y: ValueScale,
    points: Vec<TimeSeriesPoint>,
    path: Path,
}

impl Sparkline {
    /// `None` when the metric has no non-null value at all; such sparklines stay hidden.
    pub fn build(rows: &[FilingMetricRow], tag: &str, title: &str) -> Option<Self> {
        let points = to_series(rows, tag);
        let (lo, hi) = points.iter().filter_map(|p| p.y).fold(None, |acc: Option<(f64, f64)>, v| {
            Some(acc.map_or((v, v), |(lo, hi)| (lo.min(v), hi.max(v))))
        })?;

        let layout = sparkline_layout();
        let (first, last) = (points.first()?.x, points.last()?.x);
        let x = TimeScale::new(first, last, layout.plot_width());
        let y = ValueScale::exact(ScaleKind::Linear, (lo, hi), (layout.plot_height(), 0.0));
        let path = points.iter().map(|p| (x.map(p.x), y.map(p.y.unwrap_or(0.0)))).collect();

        Some(Self {
            tag: tag.to_string(),
            title: title.to_string(),
            layout,
            x,
            y,
            points,
            path,
        })
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn points(&self) -> &[TimeSeriesPoint] {
        &self.points
    }

    fn focus_at(&self, index: usize, show_date: bool) -> Option<SparkFocus> {
        let point = self.points.get(index)?;
        let value = point.y?;
        Some(SparkFocus {
            index,
            x: self.x.map(point.x),
            y: self.y.map(value),
            value_text: format_metric_value(&self.tag, value),
            filing_link: format!("{SEC_BASE_URL}{}", point.source_filing_uri),
            date_label: show_date.then(|| format_date(point.x)),
        })
    }

    /// Focus on the most recent quarter that has a value.
    pub fn initial_focus(&self) -> Option<SparkFocus> {
        let index = self.points.iter().rposition(|p| p.y.is_some())?;
        self.focus_at(index, false)
    }

    fn date_at(&self, pointer_x: f64) -> chrono::NaiveDate {
        let px = (pointer_x - self.layout.margin.left).clamp(0.0, self.layout.plot_width());
        self.x.invert(px)
    }

    /// Null quarters are skipped: the focus stays where it was and only the date hides.
    pub fn pointer_move(&self, pointer_x: f64, current: &SparkFocus) -> SparkFocus {
        let date = self.date_at(pointer_x);
        strictly_before(&self.points, date)
            .and_then(|i| self.focus_at(i, true))
            .unwrap_or_else(|| SparkFocus { date_label: None, ..current.clone() })
    }

    /// The date label is dropped only when the pointer left over the last quarter.
    pub fn pointer_leave(&self, pointer_x: f64, current: &SparkFocus) -> SparkFocus {
        let date = self.date_at(pointer_x);
        match at_or_before(&self.points, date) {
            Some(i) if i + 1 == self.points.len() => SparkFocus { date_label: None, ..current.clone() },
            _ => current.clone(),
        }
    }
}

/// Sparklines for one statement tab in catalog order. The cash-flow tab repeats net
/// income first.
pub fn category_panel(category: MetricCategory, rows: &[FilingMetricRow]) -> Vec<Sparkline> {
    let mut panel = Vec::new();
    if category == MetricCategory::CashFlow {
        panel.extend(Sparkline::build(rows, NET_INCOME, "Net Income"));
    }
    panel.extend(in_category(category).filter_map(|def| Sparkline::build(rows, def.tag, def.label)));
    panel
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn rows(tag: &str, values: &[(i32, Option<f64>)]) -> Vec<FilingMetricRow> {
        values
            .iter()
            .map(|(pym, v)| {
                let mut values = IndexMap::new();
                values.insert(tag.to_string(), *v);
                FilingMetricRow {
                    period_end_year_month: *pym,
                    fiscal_period_focus: "Q1".to_string(),
                    filing_id: i64::from(*pym),
                    filing_uri: format!("/Archives/{pym}"),
                    values,
                }
            })
            .collect()
    }

    #[test]
    fn all_null_metric_stays_hidden() {
        let r = rows("NetIncomeLoss", &[(202003, None), (202006, None)]);
        assert!(Sparkline::build(&r, "NetIncomeLoss", "Net Income").is_none());
        assert!(Sparkline::build(&r, "Assets", "Assets").is_none());
    }

    #[test]
    fn null_is_drawn_on_zero_line() {
        let r = rows("NetIncomeLoss", &[(202003, Some(2.0)), (202006, None), (202009, Some(4.0))]);
        let s = Sparkline::build(&r, "NetIncomeLoss", "Net Income").unwrap();
        assert_eq!(s.path().len(), 3);
        assert_eq!(s.path()[1].1, s.y.map(0.0));
        assert_eq!(s.path()[2].1, 0.0);
    }

    #[test]
    fn initial_focus_is_last_non_null_without_date() {
        let r = rows("NetIncomeLoss", &[(202003, Some(2.0)), (202006, Some(3.0)), (202009, None)]);
        let s = Sparkline::build(&r, "NetIncomeLoss", "Net Income").unwrap();
        let focus = s.initial_focus().unwrap();
        assert_eq!(focus.index, 1);
        assert_eq!(focus.value_text, "$3.00");
        assert!(focus.date_label.is_none());
    }

    #[test]
    fn hovering_a_null_keeps_focus_and_hides_date() {
        let r = rows(
            "NetIncomeLoss",
            &[(202003, Some(2.0e9)), (202006, None), (202009, Some(4.0e9)), (202012, Some(5.0e9))],
        );
        let s = Sparkline::build(&r, "NetIncomeLoss", "Net Income").unwrap();
        let start = s.initial_focus().unwrap();
        let left = s.layout.margin.left;

        // Just past Sep 30 resolves (strictly before) to the Sep 30 quarter.
        let past_q3 = s.x.map(chrono::NaiveDate::from_ymd_opt(2020, 10, 15).unwrap()) + left;
        let focus = s.pointer_move(past_q3, &start);
        assert_eq!(focus.index, 2);
        assert_eq!(focus.value_text, "$4.00B");
        assert_eq!(focus.date_label.as_deref(), Some("Sep 30, 2020"));

        // Mid-August resolves to the null June quarter.
        let null_q = s.x.map(chrono::NaiveDate::from_ymd_opt(2020, 8, 15).unwrap()) + left;
        let held = s.pointer_move(null_q, &focus);
        assert_eq!(held.index, 2);
        assert!(held.date_label.is_none());
    }

    #[test]
    fn leaving_over_last_point_hides_date() {
        let r = rows("NetIncomeLoss", &[(202003, Some(2.0)), (202006, Some(3.0)), (202009, Some(4.0))]);
        let s = Sparkline::build(&r, "NetIncomeLoss", "Net Income").unwrap();
        let right_edge = s.layout.width;
        let hovered = s.pointer_move(right_edge, &s.initial_focus().unwrap());
        assert!(hovered.date_label.is_some());
        assert!(s.pointer_leave(right_edge, &hovered).date_label.is_none());

        let left_edge = s.layout.margin.left;
        let early = s.pointer_move(left_edge, &hovered);
        assert!(s.pointer_leave(left_edge, &early).date_label.is_some());
    }

    #[test]
    fn cash_flow_panel_starts_with_net_income() {
        let mut r = rows("NetIncomeLoss", &[(202003, Some(2.0)), (202006, Some(3.0))]);
        for row in &mut r {
            row.values.insert("NetCashProvidedByUsedInOperatingActivities".to_string(), Some(1.0));
        }
        let panel = category_panel(MetricCategory::CashFlow, &r);
        let titles: Vec<&str> = panel.iter().map(|s| s.title()).collect();
        assert_eq!(titles, vec!["Net Income", "Net Cash from Operations"]);
    }
}
