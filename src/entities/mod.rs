//! Entities module - data types and the seams hosts plug into
//!
//! - `catalog`: feed, tags, items and the per-session catalog
//! - `image`: decoded images and fetch errors
//! - `traits`: page surface, fetcher and executor interfaces

pub mod catalog;
pub mod image;
pub mod traits;

pub use catalog::{Catalog, Feed, FeedError, Item, Tag};
pub use image::{DecodedImage, FetchError};
pub use traits::{CancelToken, FetchExecutor, ImageFetcher, PageSurface};
