use chrono::NaiveDate;

use crate::types::Dated;

/// Index of the last point dated at or before `date`.
///
/// A date before the first point resolves to index 0. `None` only for an empty slice.
pub fn at_or_before<T: Dated>(points: &[T], date: NaiveDate) -> Option<usize> {
    if points.is_empty() {
        return None;
    }
    Some(points.partition_point(|p| p.date() <= date).saturating_sub(1))
}

/// Index of the last point dated strictly before `date`, clamped to 0.
///
/// Sparklines use this variant so hovering exactly on a point's date still shows the
/// previous one until the pointer moves past it.
pub fn strictly_before<T: Dated>(points: &[T], date: NaiveDate) -> Option<usize> {
    if points.is_empty() {
        return None;
    }
    Some(points.partition_point(|p| p.date() < date).saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PricePoint;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn prices() -> Vec<PricePoint> {
        vec![
            PricePoint { x: ymd(2020, 1, 1), price: 10.0 },
            PricePoint { x: ymd(2020, 4, 1), price: 12.0 },
            PricePoint { x: ymd(2020, 7, 1), price: 11.0 },
        ]
    }

    #[test]
    fn resolves_to_nearest_earlier_point() {
        assert_eq!(at_or_before(&prices(), ymd(2020, 3, 1)), Some(0));
        assert_eq!(at_or_before(&prices(), ymd(2020, 5, 15)), Some(1));
    }

    #[test]
    fn exact_date_resolves_to_that_point() {
        assert_eq!(at_or_before(&prices(), ymd(2020, 4, 1)), Some(1));
        assert_eq!(strictly_before(&prices(), ymd(2020, 4, 1)), Some(0));
    }

    #[test]
    fn out_of_range_dates_clamp() {
        assert_eq!(at_or_before(&prices(), ymd(2019, 1, 1)), Some(0));
        assert_eq!(at_or_before(&prices(), ymd(2030, 1, 1)), Some(2));
        assert_eq!(strictly_before(&prices(), ymd(2019, 1, 1)), Some(0));
    }

    #[test]
    fn empty_series_has_no_index() {
        let empty: Vec<PricePoint> = Vec::new();
        assert_eq!(at_or_before(&empty, ymd(2020, 1, 1)), None);
    }
}
