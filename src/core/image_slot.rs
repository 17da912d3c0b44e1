//! Per-page image requester.
//!
//! A slot shows one image at a time. It remembers which key it currently wants
//! and a generation counter; a completion is applied only if both still match,
//! so a slow fetch for a key the slot has moved away from can never overwrite
//! the newer image.

use std::sync::{Arc, Mutex};

use log::{debug, trace};

use crate::core::image_cache::{ImageCache, RequestHandle, Resolution};
use crate::entities::{DecodedImage, ImageFetcher};

/// What a slot currently displays
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SlotStatus {
    /// Nothing requested (placeholder)
    #[default]
    Empty,
    /// Fetch pending (placeholder + spinner)
    Loading,
    Loaded(DecodedImage),
    /// Fetch failed (placeholder + error label)
    Failed(String),
}

#[derive(Debug, Default)]
struct SlotState {
    wanted: Option<String>,
    generation: u64,
    status: SlotStatus,
    pending: Option<RequestHandle>,
}

/// Image requester bound to one carousel page
#[derive(Debug, Clone, Default)]
pub struct ImageSlot {
    state: Arc<Mutex<SlotState>>,
}

impl ImageSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start showing `key`, abandoning whatever the slot wanted before.
    pub fn load(&self, cache: &mut ImageCache, key: &str, fetcher: Arc<dyn ImageFetcher>) {
        let generation = {
            let mut s = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(prev) = s.pending.take() {
                cache.cancel(&prev);
            }
            s.generation += 1;
            s.wanted = Some(key.to_string());
            s.status = SlotStatus::Loading;
            s.generation
        };

        let state = Arc::clone(&self.state);
        let wanted = key.to_string();
        let resolution = cache.resolve(key, fetcher, move |result| {
            let mut s = state.lock().unwrap_or_else(|e| e.into_inner());
            if s.generation != generation || s.wanted.as_deref() != Some(wanted.as_str()) {
                debug!("Slot ignored stale result for {}", wanted);
                return;
            }
            s.pending = None;
            s.status = match result {
                Ok(image) => SlotStatus::Loaded(image),
                Err(e) => SlotStatus::Failed(e.to_string()),
            };
        });

        let mut s = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match resolution {
            Resolution::Ready(image) => {
                trace!("Slot filled from cache: {}", key);
                s.status = SlotStatus::Loaded(image);
            }
            Resolution::Pending(handle) => s.pending = Some(handle),
        }
    }

    /// Drop the current request and show the placeholder.
    pub fn clear(&self, cache: &mut ImageCache) {
        let mut s = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(prev) = s.pending.take() {
            cache.cancel(&prev);
        }
        s.generation += 1;
        s.wanted = None;
        s.status = SlotStatus::Empty;
    }

    pub fn status(&self) -> SlotStatus {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).status.clone()
    }

    pub fn wanted(&self) -> Option<String> {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).wanted.clone()
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.status(), SlotStatus::Loading)
    }
}
