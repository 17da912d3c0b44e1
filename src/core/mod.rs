//! Core engine modules - carousel playback, image cache, events, workers
//!
//! These modules form the carousel engine, independent of any UI toolkit.

pub mod autoscroll;
pub mod carousel;
pub mod event_bus;
pub mod events;
pub mod fetch;
pub mod image_cache;
pub mod image_slot;
pub mod workers;

// Re-exports for convenience
pub use autoscroll::AutoscrollTimer;
pub use carousel::{Carousel, NavigationError, PlaybackState, PlaybackTiming, SettleKind};
pub use event_bus::EventBus;
pub use fetch::{FileFetcher, HttpFetcher, RoutingFetcher};
pub use image_cache::{CacheLimits, CacheStats, ImageCache, RequestHandle, Resolution};
pub use image_slot::{ImageSlot, SlotStatus};
pub use workers::{InlineExecutor, Workers};
