pub mod tag_reconciler;

pub use tag_reconciler::{project_rows, reconcile};
