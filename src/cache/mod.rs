pub mod clock;
pub mod insider_cache;

pub use clock::{Clock, ManualClock, SystemClock};
pub use insider_cache::{InsiderBuyingCache, InsiderCacheSettings, InsiderQuery, InsiderSource};
