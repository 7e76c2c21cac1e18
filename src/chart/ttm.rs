use crate::config::{TtmNullPolicy, TTM_WINDOW};
use crate::types::TimeSeriesPoint;

/// Trailing-twelve-month average of a quarterly series.
///
/// Point `i` (for `i >= 4`) averages quarters `i-3..=i` and takes its date and filing
/// from quarter `i`. The output therefore has `len - 4` points; a series of four
/// quarters or fewer yields nothing.
pub fn trailing_twelve_months(series: &[TimeSeriesPoint], policy: TtmNullPolicy) -> Vec<TimeSeriesPoint> {
    if series.len() <= TTM_WINDOW {
        return Vec::new();
    }

    let window = TTM_WINDOW as f64;
    let mut out = Vec::with_capacity(series.len() - TTM_WINDOW);
    let mut sum = 0.0;
    let mut nulls_in_window = 0usize;

    for (i, point) in series.iter().enumerate() {
        sum += point.y.unwrap_or(0.0);
        if point.y.is_none() {
            nulls_in_window += 1;
        }

        if i < TTM_WINDOW {
            continue;
        }

        let leaving = &series[i - TTM_WINDOW];
        sum -= leaving.y.unwrap_or(0.0);
        if leaving.y.is_none() {
            nulls_in_window -= 1;
        }

        let y = match policy {
            TtmNullPolicy::Lenient => Some(sum / window),
            TtmNullPolicy::Strict if nulls_in_window > 0 => None,
            TtmNullPolicy::Strict => Some(sum / window),
        };

        out.push(TimeSeriesPoint { y, ..point.clone() });
    }

    out
}
