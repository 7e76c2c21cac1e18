pub mod engine;
pub mod format;
pub mod lookup;
pub mod scale;
pub mod selectors;
pub mod sparkline;
pub mod ttm;

pub use engine::{build_chart, Chart, ChartInput, ChartLayout, ChartOutcome, ChartViewState, HoverState};
pub use sparkline::{category_panel, Sparkline};
pub use ttm::trailing_twelve_months;
