pub mod chart;
pub mod entry;
pub mod manager;

pub use chart::{derive_chart_series, ChartPoint, CHART_DAYS};
pub use entry::{age_display, CacheEntry, EntryState, ResourceKey};
pub use manager::{CacheManager, CACHE_TTL_SECS};
