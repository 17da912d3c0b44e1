//! Abstract traits for dependency inversion.
//!
//! The engine and the cache only see these seams; hosts plug in the real page
//! surface, transport and thread pool. Implementations used by the demo host
//! live in `core/` and `runner`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::catalog::Item;
use super::image::{DecodedImage, FetchError};

/// Paged scroll surface driven by the carousel engine.
///
/// Contract: an animated move is followed by exactly one settle event from the
/// surface once motion stops. A non-animated move settles instantly and emits
/// no event.
pub trait PageSurface {
    /// Move to physical page `index` of the extended sequence.
    fn set_physical_page(&mut self, index: usize, animated: bool);

    /// Update the page indicator with the current logical page.
    fn report_page(&mut self, logical_index: usize);

    /// Materialize one page per entry of the extended sequence.
    ///
    /// An empty slice means the carousel region is empty (zero indicator pages).
    fn rebuild_pages(&mut self, pages: &[Item]);
}

/// Advisory cancellation flag shared between the cache and a running fetch.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Transport capability supplied per resolve call.
///
/// Runs off the owning loop (on a `FetchExecutor`). Long fetches should poll
/// `cancel` and bail out early; the cache discards late results regardless.
pub trait ImageFetcher: Send + Sync + 'static {
    fn fetch(&self, key: &str, cancel: &CancelToken) -> Result<DecodedImage, FetchError>;
}

impl<F> ImageFetcher for F
where
    F: Fn(&str, &CancelToken) -> Result<DecodedImage, FetchError> + Send + Sync + 'static,
{
    fn fetch(&self, key: &str, cancel: &CancelToken) -> Result<DecodedImage, FetchError> {
        self(key, cancel)
    }
}

/// Abstract worker pool interface.
///
/// Allows the cache to schedule fetches without knowing the concrete pool.
pub trait FetchExecutor: Send + Sync {
    /// Run `job` somewhere off the owning loop.
    fn execute(&self, job: Box<dyn FnOnce() + Send + 'static>);
}

/// Blanket impl: Arc<T> implements traits if T does
impl<T: FetchExecutor + ?Sized> FetchExecutor for Arc<T> {
    fn execute(&self, job: Box<dyn FnOnce() + Send + 'static>) {
        (**self).execute(job)
    }
}
