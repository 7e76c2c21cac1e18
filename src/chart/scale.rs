//! Value and time scales for the comparison chart, plus the reconciliation of the
//! price axis against the metric axis.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::warn;

use crate::config::SCALE_RECONCILE_FLOOR;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleKind {
    Linear,
    /// Base-2 logarithmic. Only valid for strictly positive domains.
    Log2,
}

// ---------------------------------------------------------------------------
// Value scale
// ---------------------------------------------------------------------------

/// Maps values onto a pixel range. [`ValueScale::new`] "nices" the domain so the ends
/// land on round tick values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueScale {
    kind: ScaleKind,
    domain: (f64, f64),
    range: (f64, f64),
}

impl ValueScale {
    /// Builds a scale, repairing degenerate domains instead of dividing by zero:
    /// non-finite bounds fall back to `[0, 1]`, an empty span is widened by one unit
    /// on each side (or halved/doubled in log mode). A log scale over a
    /// non-positive domain degrades to linear.
    pub fn new(kind: ScaleKind, domain: (f64, f64), range: (f64, f64)) -> Self {
        Self::build(kind, domain, range, true)
    }

    /// Same repairs as [`ValueScale::new`] but the domain is used as given.
    pub fn exact(kind: ScaleKind, domain: (f64, f64), range: (f64, f64)) -> Self {
        Self::build(kind, domain, range, false)
    }

    fn build(kind: ScaleKind, domain: (f64, f64), range: (f64, f64), nice: bool) -> Self {
        let (mut lo, mut hi) = domain;
        if !lo.is_finite() || !hi.is_finite() {
            lo = 0.0;
            hi = 1.0;
        }
        if lo > hi {
            std::mem::swap(&mut lo, &mut hi);
        }

        let kind = if kind == ScaleKind::Log2 && lo <= 0.0 {
            ScaleKind::Linear
        } else {
            kind
        };

        let domain = match kind {
            ScaleKind::Linear => {
                if hi - lo == 0.0 {
                    lo -= 1.0;
                    hi += 1.0;
                }
                if nice {
                    nice_linear(lo, hi, 10)
                } else {
                    (lo, hi)
                }
            }
            ScaleKind::Log2 => {
                if hi == lo {
                    lo /= 2.0;
                    hi *= 2.0;
                }
                if nice {
                    (lo.log2().floor().exp2(), hi.log2().ceil().exp2())
                } else {
                    (lo, hi)
                }
            }
        };

        Self { kind, domain, range }
    }

    pub fn kind(&self) -> ScaleKind {
        self.kind
    }

    pub fn domain(&self) -> (f64, f64) {
        self.domain
    }

    fn normalize(&self, value: f64) -> f64 {
        let (d0, d1) = self.domain;
        match self.kind {
            ScaleKind::Linear => (value - d0) / (d1 - d0),
            ScaleKind::Log2 => {
                if value <= 0.0 {
                    return 0.0;
                }
                (value.log2() - d0.log2()) / (d1.log2() - d0.log2())
            }
        }
    }

    pub fn map(&self, value: f64) -> f64 {
        let (r0, r1) = self.range;
        r0 + self.normalize(value) * (r1 - r0)
    }

    /// Roughly `count` round values inside the domain.
    pub fn ticks(&self, count: usize) -> Vec<f64> {
        let (d0, d1) = self.domain;
        match self.kind {
            ScaleKind::Linear => {
                let step = tick_increment(d0, d1, count.max(1) as f64);
                let first = (d0 / step).ceil() as i64;
                let last = (d1 / step).floor() as i64;
                (first..=last).map(|i| i as f64 * step).collect()
            }
            ScaleKind::Log2 => {
                let first = d0.log2().ceil() as i32;
                let last = d1.log2().floor() as i32;
                let span = (last - first + 1).max(1) as usize;
                let stride = span.div_ceil(count.max(1) * 2).max(1);
                (first..=last).step_by(stride).map(|e| f64::from(e).exp2()).collect()
            }
        }
    }
}

/// Power-of-ten step of 1, 2 or 5 that splits the span into about `count` pieces.
fn tick_increment(start: f64, stop: f64, count: f64) -> f64 {
    let raw = (stop - start) / count;
    if raw <= 0.0 || !raw.is_finite() {
        return 1.0;
    }
    let power = raw.log10().floor();
    let magnitude = 10f64.powf(power);
    let error = raw / magnitude;
    let factor = if error >= 50f64.sqrt() {
        10.0
    } else if error >= 10f64.sqrt() {
        5.0
    } else if error >= 2f64.sqrt() {
        2.0
    } else {
        1.0
    };
    factor * magnitude
}

fn nice_linear(mut lo: f64, mut hi: f64, count: usize) -> (f64, f64) {
    let mut previous = f64::NAN;
    for _ in 0..10 {
        let step = tick_increment(lo, hi, count as f64);
        if step == previous {
            break;
        }
        lo = (lo / step).floor() * step;
        hi = (hi / step).ceil() * step;
        previous = step;
    }
    (lo, hi)
}

// ---------------------------------------------------------------------------
// Time scale
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeScale {
    start: NaiveDate,
    end: NaiveDate,
    width: f64,
}

impl TimeScale {
    pub fn new(start: NaiveDate, end: NaiveDate, width: f64) -> Self {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        Self { start, end, width }
    }

    fn span_days(&self) -> f64 {
        // A single-day domain still needs a non-zero span.
        ((self.end - self.start).num_days() as f64).max(1.0)
    }

    pub fn domain(&self) -> (NaiveDate, NaiveDate) {
        (self.start, self.end)
    }

    pub fn map(&self, date: NaiveDate) -> f64 {
        (date - self.start).num_days() as f64 / self.span_days() * self.width
    }

    /// Pixel offset back to a calendar date (fractional days truncated toward the start).
    pub fn invert(&self, px: f64) -> NaiveDate {
        // Nudge before flooring so a pixel produced by `map` lands back on its own day.
        let days = (px / self.width.max(f64::EPSILON) * self.span_days() + 1e-6).floor();
        let days = if days.is_finite() { days as i64 } else { 0 };
        self.start + chrono::Duration::days(days)
    }

    /// January 1st of every year inside the domain.
    pub fn year_ticks(&self) -> Vec<NaiveDate> {
        ((self.start.year() + 1)..=self.end.year())
            .filter_map(|y| NaiveDate::from_ymd_opt(y, 1, 1))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Axis reconciliation
// ---------------------------------------------------------------------------

/// What reconciliation did to the two domains.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "factor", rename_all = "snake_case")]
pub enum ScaleAdjustment {
    /// Metric has zero or negative values; right axis pinned at 0 and log disabled.
    ClampedToZero,
    /// Metric axis has more dynamic range; price axis max was divided by the factor.
    WidenedLeft(f64),
    /// Ratio too extreme (or undefined) to reconcile; each series fills the chart.
    Independent(f64),
    /// Metric axis max was multiplied by the factor.
    ScaledRight(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconciledDomains {
    pub left: (f64, f64),
    pub right: (f64, f64),
    /// False when either domain reaches zero or below.
    pub log_allowed: bool,
    pub adjustment: ScaleAdjustment,
}

/// Stretches one axis so price and metric show comparable relative movement.
pub fn reconcile_domains(left: (f64, f64), right: (f64, f64)) -> ReconciledDomains {
    let (left_min, mut left_max) = left;
    let (mut right_min, mut right_max) = right;

    let adjustment = if right_min <= 0.0 {
        right_min = 0.0;
        ScaleAdjustment::ClampedToZero
    } else {
        let left_ratio = left_max / left_min;
        let right_ratio = right_max / right_min;
        let factor = left_ratio / right_ratio;

        if !factor.is_finite() {
            warn!(factor, "scale adjustment undefined, allowing each series to fill chart");
            ScaleAdjustment::Independent(factor)
        } else if factor < 1.0 && factor > SCALE_RECONCILE_FLOOR {
            left_max /= factor;
            ScaleAdjustment::WidenedLeft(factor)
        } else if factor.abs() < SCALE_RECONCILE_FLOOR {
            warn!(factor, "scale adjustment too close to zero, allowing each series to fill chart");
            ScaleAdjustment::Independent(factor)
        } else {
            right_max *= factor;
            ScaleAdjustment::ScaledRight(factor)
        }
    };

    ReconciledDomains {
        left: (left_min, left_max),
        right: (right_min, right_max),
        log_allowed: left_min > 0.0 && right_min > 0.0,
        adjustment,
    }
}
