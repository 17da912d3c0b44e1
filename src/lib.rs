//! bannerloop - looping banner carousel engine and bounded image cache
//!
//! Re-exports all modules for use by the binary target.

// Core engine (carousel, cache, events, workers)
pub mod core;

// App modules
pub mod cli;
pub mod config;
pub mod entities;
pub mod paths;
pub mod runner;
pub mod surface;

// Re-export commonly used types from core
pub use crate::core::carousel::{Carousel, NavigationError, PlaybackTiming, SettleKind};
pub use crate::core::event_bus::{downcast_event, BoxedEvent, EventBus, EventEmitter};
pub use crate::core::image_cache::{CacheLimits, ImageCache};

// Re-export entities
pub use entities::{Catalog, DecodedImage, Feed, Item, PageSurface};
