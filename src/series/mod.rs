pub mod normalizer;

pub use normalizer::{date_from_year_month, to_series};
