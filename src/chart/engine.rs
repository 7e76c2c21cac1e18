//! Dual-axis comparison chart: daily closing price on the left axis against one
//! quarterly fundamental on the right, with a TTM overlay and pointer lookup.
//!
//! The engine produces plain geometry (`ChartScene`) and hover state; drawing is left
//! to whichever frontend holds the chart.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::format::{format_metric_value, format_short_date};
use super::lookup::at_or_before;
use super::scale::{reconcile_domains, ReconciledDomains, ScaleAdjustment, ScaleKind, TimeScale, ValueScale};
use super::selectors::{comparison_metric, DEFAULT_COMPARISON_METRIC};
use super::ttm::trailing_twelve_months;
use crate::config::TtmNullPolicy;
use crate::series::to_series;
use crate::types::{FilingMetricRow, PricePoint, TimeSeriesPoint};

pub const SEC_BASE_URL: &str = "https://www.sec.gov";

const VALUE_TICKS: usize = 5;

// ---------------------------------------------------------------------------
// View state and layout
// ---------------------------------------------------------------------------

/// User-selectable chart options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartViewState {
    pub comparison_metric: String,
    pub start_year: i32,
    pub log_scale: bool,
}

impl ChartViewState {
    pub fn for_company(data_start_year: i32) -> Self {
        Self {
            comparison_metric: DEFAULT_COMPARISON_METRIC.to_string(),
            start_year: data_start_year,
            log_scale: false,
        }
    }

    /// Switching company discards every selection made for the previous one.
    pub fn reset_for_company(&mut self, data_start_year: i32) {
        *self = Self::for_company(data_start_year);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Margin {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChartLayout {
    /// Container width including margins.
    pub width: f64,
    /// Container height including margins.
    pub height: f64,
    pub margin: Margin,
}

impl ChartLayout {
    pub const DEFAULT_HEIGHT: f64 = 250.0;

    pub fn new(width: f64) -> Self {
        Self {
            width,
            height: Self::DEFAULT_HEIGHT,
            margin: Margin { top: 10.0, right: 49.0, bottom: 20.0, left: 39.0 },
        }
    }

    pub fn with_margin(width: f64, height: f64, margin: Margin) -> Self {
        Self { width, height, margin }
    }

    pub fn plot_width(&self) -> f64 {
        (self.width - self.margin.left - self.margin.right).max(1.0)
    }

    pub fn plot_height(&self) -> f64 {
        (self.height - self.margin.top - self.margin.bottom).max(1.0)
    }
}

// ---------------------------------------------------------------------------
// Scene
// ---------------------------------------------------------------------------

/// Polyline in plot coordinates (origin top-left of the plot area).
pub type Path = Vec<(f64, f64)>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tick {
    pub position: f64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Axis {
    pub label: Option<String>,
    pub ticks: Vec<Tick>,
}

/// Ticker box pinned to the left axis at the last close.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceMarker {
    pub y: f64,
    pub label: String,
}

/// Right-axis value box for one metric point, with a link to its source filing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricCallout {
    pub x: f64,
    pub y: f64,
    pub value_text: String,
    pub fiscal_period_focus: String,
    pub filing_link: String,
}

impl MetricCallout {
    /// `Q3: $1.23`
    pub fn caption(&self) -> String {
        format!("{}: {}", self.fiscal_period_focus, self.value_text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartScene {
    pub x_axis: Axis,
    pub left_axis: Axis,
    /// Absent until fundamentals have loaded.
    pub right_axis: Option<Axis>,
    pub price_path: Path,
    /// One polyline per run of non-null quarters.
    pub metric_paths: Vec<Path>,
    pub ttm_paths: Vec<Path>,
    pub last_price: Option<PriceMarker>,
    pub latest_metric: Option<MetricCallout>,
    /// Whether the log/linear toggle should be offered at all.
    pub log_toggle_available: bool,
    pub scale_kind: ScaleKind,
    pub adjustment: ScaleAdjustment,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceFocus {
    pub x: f64,
    pub y: f64,
    /// `$123 Mar 1`, shown under the time axis.
    pub label: String,
    pub point: PricePoint,
}

/// Transient pointer overlay. Everything but the metric callout is hidden when the
/// pointer leaves the chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoverState {
    pub cursor_x: Option<f64>,
    pub price: Option<PriceFocus>,
    pub metric: Option<MetricCallout>,
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

pub struct ChartInput<'a> {
    pub ticker: &'a str,
    /// `None` while price history is still being fetched.
    pub prices: Option<&'a [PricePoint]>,
    /// `None` while fundamentals are still being fetched; the price line renders alone.
    pub fundamentals: Option<&'a [FilingMetricRow]>,
}

#[derive(Debug)]
pub enum ChartOutcome {
    Loading,
    /// Price history exists but has no trades inside the selected range.
    NoPriceData,
    Ready(Box<Chart>),
}

#[derive(Debug, Clone)]
pub struct Chart {
    layout: ChartLayout,
    metric_tag: String,
    x: TimeScale,
    y_left: ValueScale,
    y_right: ValueScale,
    prices: Vec<PricePoint>,
    metric: Vec<TimeSeriesPoint>,
    ttm: Vec<TimeSeriesPoint>,
    domains: ReconciledDomains,
    scene: ChartScene,
}

/// Builds the chart for the current view.
///
/// `view.log_scale` is switched off in place when either domain reaches zero or below.
pub fn build_chart(
    input: ChartInput<'_>,
    view: &mut ChartViewState,
    layout: ChartLayout,
    ttm_policy: TtmNullPolicy,
) -> ChartOutcome {
    let Some(all_prices) = input.prices else {
        return ChartOutcome::Loading;
    };

    let prices: Vec<PricePoint> = all_prices
        .iter()
        .filter(|p| p.x.year() >= view.start_year)
        .copied()
        .collect();
    let (Some(first), Some(last)) = (prices.first(), prices.last()) else {
        return ChartOutcome::NoPriceData;
    };
    let (first, last) = (*first, *last);

    let x = TimeScale::new(first.x, last.x, layout.plot_width());
    let left = extent(prices.iter().map(|p| p.price)).unwrap_or((0.0, 1.0));

    let full_metric = input
        .fundamentals
        .map(|rows| to_series(rows, &view.comparison_metric))
        .unwrap_or_default();
    // Right extent covers the whole history so the axis does not jump with the year filter.
    let right = extent(full_metric.iter().filter_map(|p| p.y)).unwrap_or(left);
    let metric: Vec<TimeSeriesPoint> = full_metric
        .into_iter()
        .filter(|p| p.x.year() >= first.x.year())
        .collect();

    let domains = reconcile_domains(left, right);
    if view.log_scale && !domains.log_allowed {
        debug!(metric = %view.comparison_metric, "log scale unavailable, reverting to linear");
        view.log_scale = false;
    }
    let kind = if view.log_scale { ScaleKind::Log2 } else { ScaleKind::Linear };

    let plot_height = layout.plot_height();
    let y_left = ValueScale::new(kind, domains.left, (plot_height, 0.0));
    let y_right = ValueScale::new(kind, domains.right, (plot_height, 0.0));

    let ttm = trailing_twelve_months(&metric, ttm_policy);

    let x_axis = Axis {
        label: None,
        ticks: x
            .year_ticks()
            .into_iter()
            .map(|d| Tick { position: x.map(d), label: d.format("'%y").to_string() })
            .collect(),
    };
    let left_axis = Axis {
        label: None,
        ticks: y_left
            .ticks(VALUE_TICKS)
            .into_iter()
            .map(|t| Tick { position: y_left.map(t), label: format!("{t:.0}") })
            .collect(),
    };
    let right_axis = input.fundamentals.map(|_| Axis {
        label: comparison_metric(&view.comparison_metric).map(|m| m.axis_label.to_string()),
        ticks: y_right
            .ticks(VALUE_TICKS)
            .into_iter()
            .map(|t| Tick { position: y_right.map(t), label: axis_number(t) })
            .collect(),
    });

    let price_path = prices.iter().map(|p| (x.map(p.x), y_left.map(p.price))).collect();
    let metric_paths = segments(&metric, &x, &y_right);
    let ttm_paths = segments(&ttm, &x, &y_right);

    let last_price = (last.price > 0.0).then(|| PriceMarker {
        y: y_left.map(last.price),
        label: input.ticker.to_string(),
    });

    let mut chart = Chart {
        layout,
        metric_tag: view.comparison_metric.clone(),
        x,
        y_left,
        y_right,
        prices,
        metric,
        ttm,
        domains,
        scene: ChartScene {
            x_axis,
            left_axis,
            right_axis,
            price_path,
            metric_paths,
            ttm_paths,
            last_price,
            latest_metric: None,
            log_toggle_available: domains.log_allowed,
            scale_kind: kind,
            adjustment: domains.adjustment,
        },
    };
    chart.scene.latest_metric = chart.latest_callout();

    ChartOutcome::Ready(Box::new(chart))
}

fn extent<I: IntoIterator<Item = f64>>(values: I) -> Option<(f64, f64)> {
    values.into_iter().fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// Splits a series into drawable runs, leaving gaps at null points.
fn segments(points: &[TimeSeriesPoint], x: &TimeScale, y: &ValueScale) -> Vec<Path> {
    let mut out = Vec::new();
    let mut current: Path = Vec::new();
    for p in points {
        match p.y {
            Some(v) => current.push((x.map(p.x), y.map(v))),
            None if !current.is_empty() => out.push(std::mem::take(&mut current)),
            None => {}
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn axis_number(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{v:.0}")
    } else {
        let s = format!("{v:.2}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

// ---------------------------------------------------------------------------
// Interaction
// ---------------------------------------------------------------------------

impl Chart {
    pub fn scene(&self) -> &ChartScene {
        &self.scene
    }

    pub fn layout(&self) -> ChartLayout {
        self.layout
    }

    pub fn metric_tag(&self) -> &str {
        &self.metric_tag
    }

    pub fn prices(&self) -> &[PricePoint] {
        &self.prices
    }

    /// Metric points inside the displayed range.
    pub fn metric(&self) -> &[TimeSeriesPoint] {
        &self.metric
    }

    pub fn ttm(&self) -> &[TimeSeriesPoint] {
        &self.ttm
    }

    pub fn domains(&self) -> &ReconciledDomains {
        &self.domains
    }

    pub fn time_scale(&self) -> &TimeScale {
        &self.x
    }

    pub fn price_scale(&self) -> &ValueScale {
        &self.y_left
    }

    pub fn metric_scale(&self) -> &ValueScale {
        &self.y_right
    }

    fn callout(&self, point: &TimeSeriesPoint) -> Option<MetricCallout> {
        let value = point.y?;
        Some(MetricCallout {
            x: self.x.map(point.x),
            y: self.y_right.map(value),
            value_text: format_metric_value(&self.metric_tag, value),
            fiscal_period_focus: point.fiscal_period_focus.clone(),
            filing_link: format!("{SEC_BASE_URL}{}", point.source_filing_uri),
        })
    }

    /// Callout for the most recent quarter that has a value.
    pub fn latest_callout(&self) -> Option<MetricCallout> {
        self.metric.iter().rev().find(|p| p.y.is_some()).and_then(|p| self.callout(p))
    }

    /// Date under a pointer given in container coordinates.
    pub fn date_at(&self, pointer_x: f64) -> NaiveDate {
        let px = (pointer_x - self.layout.margin.left).clamp(0.0, self.layout.plot_width());
        self.x.invert(px)
    }

    /// Moves the focus to the price and metric points at or before the pointer's date.
    /// Two binary searches; nothing is rescanned.
    ///
    /// A null quarter under the pointer keeps `previous` on the right axis, or the
    /// latest callout when there is none.
    pub fn pointer_move(&self, pointer_x: f64, previous: Option<&MetricCallout>) -> HoverState {
        let date = self.date_at(pointer_x);

        let price = at_or_before(&self.prices, date).map(|i| {
            let point = self.prices[i];
            PriceFocus {
                x: self.x.map(point.x),
                y: self.y_left.map(point.price),
                label: format!("${} {}", point.price.round(), format_short_date(point.x)),
                point,
            }
        });

        let metric = at_or_before(&self.metric, date)
            .and_then(|i| self.callout(&self.metric[i]))
            .or_else(|| previous.cloned())
            .or_else(|| self.latest_callout());

        HoverState {
            cursor_x: price.as_ref().map(|p| p.x),
            price,
            metric,
        }
    }

    /// Hides the cursor and date label and puts the callout back on the latest quarter.
    pub fn pointer_leave(&self) -> HoverState {
        HoverState {
            cursor_x: None,
            price: None,
            metric: self.latest_callout(),
        }
    }
}
