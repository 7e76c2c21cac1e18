pub mod metric_catalog;

pub use metric_catalog::{lookup, missing_required, MetricDefinition, CATALOG};
