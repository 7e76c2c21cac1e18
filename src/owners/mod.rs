pub mod holdings;

pub use holdings::{holding_views, HoldingView, InstrumentKind, Trend};
