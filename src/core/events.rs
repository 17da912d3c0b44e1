//! Host events delivered to the carousel loop.

use crate::core::carousel::SettleKind;

// === Surface ===

/// Surface motion stopped on a physical page.
#[derive(Clone, Debug)]
pub struct SettledEvent {
    pub physical: usize,
    pub kind: SettleKind,
}

#[derive(Clone, Debug)]
pub struct DragStartEvent;

/// Live scroll offset, in pages.
#[derive(Clone, Debug)]
pub struct ScrollPositionEvent(pub f64);

// === Navigation ===

/// Indicator tap or other explicit jump.
#[derive(Clone, Debug)]
pub struct ScrollToPageEvent {
    pub index: usize,
    pub animated: bool,
}

#[derive(Clone, Debug)]
pub struct ScrollNextEvent;

#[derive(Clone, Debug)]
pub struct ScrollPreviousEvent;

// === Lifecycle ===

#[derive(Clone, Debug)]
pub struct BecameVisibleEvent;

#[derive(Clone, Debug)]
pub struct BecameHiddenEvent;

/// OS memory pressure; drops every cached image.
#[derive(Clone, Debug)]
pub struct MemoryWarningEvent;

/// Re-select the catalog from the feed (optionally for another tag).
#[derive(Clone, Debug)]
pub struct ReloadEvent(pub Option<String>);
