use serde::Serialize;

/// Metric compared against price when a company page first opens.
pub const DEFAULT_COMPARISON_METRIC: &str = "CIRevenuePerShare";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ComparisonMetric {
    pub tag: &'static str,
    /// Selector label.
    pub label: &'static str,
    /// Right-axis caption.
    pub axis_label: &'static str,
}

pub const COMPARISON_METRICS: &[ComparisonMetric] = &[
    ComparisonMetric {
        tag: "CIRevenuePerShare",
        label: "Revenue",
        axis_label: "Q Revenue Per Share",
    },
    ComparisonMetric {
        tag: "EarningsPerShareBasic",
        label: "Earnings",
        axis_label: "Q Earnings Per Share",
    },
    ComparisonMetric {
        tag: "CINetCashFromOpsPerShare",
        label: "Cash From Ops",
        axis_label: "Q Cash From Ops Per Share",
    },
];

pub fn comparison_metric(tag: &str) -> Option<&'static ComparisonMetric> {
    COMPARISON_METRICS.iter().find(|m| m.tag == tag)
}

/// The metric after `tag` in selector order, wrapping around.
pub fn next_comparison_metric(tag: &str) -> &'static ComparisonMetric {
    let pos = COMPARISON_METRICS.iter().position(|m| m.tag == tag);
    let next = pos.map_or(0, |i| (i + 1) % COMPARISON_METRICS.len());
    &COMPARISON_METRICS[next]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearOption {
    pub year: i32,
    /// Years back from now, e.g. `"5 Y"`.
    pub label: String,
}

/// Start-year choices from the first year with data up to (not including) the current
/// year. A company with less than a year of history still gets a single `"1 Y"` option.
pub fn year_options(data_start_year: i32, current_year: i32) -> Vec<YearOption> {
    let mut options: Vec<YearOption> = (data_start_year..current_year)
        .map(|year| YearOption {
            year,
            label: format!("{} Y", current_year - year),
        })
        .collect();

    if options.is_empty() {
        options.push(YearOption {
            year: data_start_year.max(current_year),
            label: "1 Y".to_string(),
        });
    }
    options
}
