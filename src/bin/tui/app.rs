use chrono::Datelike;
use filing_charts::chart::scale::ScaleAdjustment;
use filing_charts::chart::selectors::{comparison_metric, next_comparison_metric, year_options};
use filing_charts::chart::{build_chart, Chart, ChartInput, ChartLayout, ChartOutcome, ChartViewState, HoverState};
use filing_charts::config::TtmNullPolicy;
use filing_charts::types::{Company, FilingMetricRow, PricePoint, ReconciledMetric};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// API response types (mirror routes.rs shapes)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ResolveResponse {
    pub company: Option<Company>,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
pub struct FundamentalsResponse {
    pub metrics: Vec<ReconciledMetric>,
    /// Extra per-quarter fields (`missing`, `incomplete`) are ignored.
    pub quarters: Vec<FilingMetricRow>,
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Connected,
    Error(String),
    Connecting,
}

/// Pointer steps per plot width for the arrow keys.
const CURSOR_STEPS: f64 = 120.0;

pub struct AppState {
    pub status: ConnectionStatus,
    pub base_url: String,
    pub uri: String,
    pub company: Option<Company>,
    pub prices: Option<Vec<PricePoint>>,
    pub fundamentals: Option<Vec<FilingMetricRow>>,
    pub view: ChartViewState,
    pub layout: ChartLayout,
    pub chart: Option<Chart>,
    pub no_price_data: bool,
    pub hover: Option<HoverState>,
    /// Pointer position in container coordinates; `None` when the pointer is off the chart.
    pub pointer_x: Option<f64>,
    pub ttm_policy: TtmNullPolicy,
    pub current_year: i32,
}

impl AppState {
    pub fn new(base_url: String, uri: String, ttm_policy: TtmNullPolicy) -> Self {
        let current_year = chrono::Utc::now().year();
        Self {
            status: ConnectionStatus::Connecting,
            base_url,
            uri,
            company: None,
            prices: None,
            fundamentals: None,
            view: ChartViewState::for_company(current_year),
            layout: ChartLayout::new(800.0),
            chart: None,
            no_price_data: false,
            hover: None,
            pointer_x: None,
            ttm_policy,
            current_year,
        }
    }

    /// Resolve the URI, then fetch prices and fundamentals and build the chart.
    pub async fn load(&mut self, client: &reqwest::Client) {
        self.status = ConnectionStatus::Connecting;
        match self.fetch_all(client).await {
            Ok(()) => self.status = ConnectionStatus::Connected,
            Err(e) => self.status = ConnectionStatus::Error(e),
        }
    }

    async fn fetch_all(&mut self, client: &reqwest::Client) -> Result<(), String> {
        let url = format!("{}/api/resolve/{}", self.base_url, self.uri);
        let resolved: ResolveResponse = get_json(client, &url).await?;
        let company = resolved
            .company
            .ok_or_else(|| format!("{} is not a company page", self.uri))?;

        self.set_company(company.clone());
        self.rebuild();

        let url = format!("{}/api/prices/{}", self.base_url, company.id);
        self.prices = Some(get_json(client, &url).await?);
        self.rebuild();

        let url = format!("{}/api/fundamentals/{}", self.base_url, company.id);
        let fundamentals: FundamentalsResponse = get_json(client, &url).await?;
        self.fundamentals = Some(fundamentals.quarters);
        self.rebuild();
        Ok(())
    }

    pub fn set_company(&mut self, company: Company) {
        self.view.reset_for_company(company.data_start_year());
        self.company = Some(company);
        self.prices = None;
        self.fundamentals = None;
        self.pointer_x = None;
    }

    /// Rebuilds the chart from whatever data has arrived so far.
    pub fn rebuild(&mut self) {
        let ticker = self.company.as_ref().map(|c| c.ticker.as_str()).unwrap_or_default();
        let input = ChartInput {
            ticker,
            prices: self.prices.as_deref(),
            fundamentals: self.fundamentals.as_deref(),
        };

        self.no_price_data = false;
        self.chart = match build_chart(input, &mut self.view, self.layout, self.ttm_policy) {
            ChartOutcome::Ready(chart) => Some(*chart),
            ChartOutcome::NoPriceData => {
                self.no_price_data = true;
                None
            }
            ChartOutcome::Loading => None,
        };

        self.hover = self.chart.as_ref().map(|chart| match self.pointer_x {
            Some(x) => chart.pointer_move(x, None),
            None => chart.pointer_leave(),
        });
    }

    fn plot_bounds(&self) -> (f64, f64) {
        let left = self.layout.margin.left;
        (left, left + self.layout.plot_width())
    }

    /// Arrow keys move a virtual pointer; the first press enters at the right edge.
    pub fn move_pointer(&mut self, steps: f64) {
        let (lo, hi) = self.plot_bounds();
        let step = self.layout.plot_width() / CURSOR_STEPS;
        let x = self.pointer_x.map_or(hi, |x| (x + steps * step).clamp(lo, hi));
        self.pointer_x = Some(x);
        let previous = self.hover.as_ref().and_then(|h| h.metric.as_ref());
        let hover = self.chart.as_ref().map(|c| c.pointer_move(x, previous));
        self.hover = hover;
    }

    pub fn leave_pointer(&mut self) {
        self.pointer_x = None;
        self.hover = self.chart.as_ref().map(Chart::pointer_leave);
    }

    pub fn cycle_metric(&mut self) {
        self.view.comparison_metric = next_comparison_metric(&self.view.comparison_metric).tag.to_string();
        self.rebuild();
    }

    /// Steps to the next start-year option, wrapping back to the earliest.
    pub fn cycle_start_year(&mut self) {
        let Some(company) = &self.company else {
            return;
        };
        let options = year_options(company.data_start_year(), self.current_year);
        let pos = options.iter().position(|o| o.year == self.view.start_year);
        let next = pos.map_or(0, |i| (i + 1) % options.len());
        if let Some(option) = options.get(next) {
            self.view.start_year = option.year;
        }
        self.rebuild();
    }

    pub fn toggle_log(&mut self) {
        let available = self.chart.as_ref().is_some_and(|c| c.scene().log_toggle_available);
        if available {
            self.view.log_scale = !self.view.log_scale;
            self.rebuild();
        }
    }

    pub fn metric_label(&self) -> &'static str {
        comparison_metric(&self.view.comparison_metric).map_or("", |m| m.label)
    }

    pub fn start_year_label(&self) -> String {
        let back = self.current_year - self.view.start_year;
        format!("{} Y", back.max(1))
    }
}

async fn get_json<T: serde::de::DeserializeOwned>(client: &reqwest::Client, url: &str) -> Result<T, String> {
    let resp = client.get(url).send().await.map_err(|e| e.to_string())?;
    if !resp.status().is_success() {
        return Err(format!("{} returned {}", url, resp.status()));
    }
    resp.json::<T>().await.map_err(|e| e.to_string())
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

pub fn format_adjustment(adjustment: ScaleAdjustment) -> String {
    match adjustment {
        ScaleAdjustment::ClampedToZero => "metric axis from 0".to_string(),
        ScaleAdjustment::WidenedLeft(f) => format!("price axis ÷{f:.2}"),
        ScaleAdjustment::ScaledRight(f) => format!("metric axis ×{f:.2}"),
        ScaleAdjustment::Independent(_) => "independent axes".to_string(),
    }
}

/// Truncate a string to at most `max` chars, appending "…" if truncated.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let t: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{t}…")
    }
}
