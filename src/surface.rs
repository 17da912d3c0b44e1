//! Headless page surface for the demo host and integration tests.
//!
//! Models a horizontally paged scroll view in page units. Animated moves and
//! user drags glide over `animation` and then settle; every step of motion
//! emits a `ScrollPositionEvent`, and the end of motion a `SettledEvent`,
//! through the host event bus. Non-animated moves jump and emit nothing.

use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::core::carousel::SettleKind;
use crate::core::event_bus::EventEmitter;
use crate::core::events::{DragStartEvent, ScrollPositionEvent, SettledEvent};
use crate::entities::{Item, PageSurface};

#[derive(Debug, Clone, Copy)]
struct Motion {
    from: f64,
    to: usize,
    start: Instant,
    end: Instant,
    kind: SettleKind,
}

#[derive(Debug)]
pub struct SimulatedSurface {
    emitter: EventEmitter,
    animation: Duration,
    clock: Instant,
    /// Current position in pages
    offset: f64,
    pages: Vec<String>,
    indicator: Option<usize>,
    indicator_history: Vec<usize>,
    motion: Option<Motion>,
}

impl SimulatedSurface {
    pub fn new(emitter: EventEmitter, animation: Duration, now: Instant) -> Self {
        Self {
            emitter,
            animation,
            clock: now,
            offset: 0.0,
            pages: Vec::new(),
            indicator: None,
            indicator_history: Vec::new(),
            motion: None,
        }
    }

    /// Time used to schedule motion started by the next commands.
    pub fn set_clock(&mut self, now: Instant) {
        self.clock = now;
    }

    /// User grabs the surface and flings it to physical page `page`.
    ///
    /// Interrupts any animation in flight; that animation never settles.
    pub fn drag_to(&mut self, page: usize) {
        if self.pages.is_empty() {
            return;
        }
        let page = page.min(self.pages.len() - 1);
        debug!("Drag {:.2} -> {}", self.offset, page);
        self.emitter.emit(DragStartEvent);
        self.start_motion(page, SettleKind::Decelerated);
    }

    fn start_motion(&mut self, to: usize, kind: SettleKind) {
        self.motion = Some(Motion {
            from: self.offset,
            to,
            start: self.clock,
            end: self.clock + self.animation,
            kind,
        });
    }

    /// Advance motion to `now`, emitting position and settle events.
    pub fn advance(&mut self, now: Instant) {
        self.clock = now;
        let Some(m) = self.motion else {
            return;
        };

        if now >= m.end {
            self.motion = None;
            self.offset = m.to as f64;
            self.emitter.emit(ScrollPositionEvent(self.offset));
            trace!("Surface settled on {} ({:?})", m.to, m.kind);
            self.emitter.emit(SettledEvent {
                physical: m.to,
                kind: m.kind,
            });
            return;
        }

        let total = (m.end - m.start).as_secs_f64();
        let t = if total > 0.0 {
            (now - m.start).as_secs_f64() / total
        } else {
            1.0
        };
        self.offset = m.from + (m.to as f64 - m.from) * t;
        self.emitter.emit(ScrollPositionEvent(self.offset));
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Physical page nearest to the current offset
    pub fn current_page(&self) -> usize {
        self.offset.round().max(0.0) as usize
    }

    pub fn is_moving(&self) -> bool {
        self.motion.is_some()
    }

    pub fn page_titles(&self) -> &[String] {
        &self.pages
    }

    pub fn indicator(&self) -> Option<usize> {
        self.indicator
    }

    /// Every value the indicator has shown, oldest first
    pub fn indicator_history(&self) -> &[usize] {
        &self.indicator_history
    }
}

impl PageSurface for SimulatedSurface {
    fn set_physical_page(&mut self, index: usize, animated: bool) {
        if animated {
            self.start_motion(index, SettleKind::AnimationEnded);
        } else {
            self.motion = None;
            self.offset = index as f64;
        }
    }

    fn report_page(&mut self, logical_index: usize) {
        self.indicator = Some(logical_index);
        self.indicator_history.push(logical_index);
    }

    fn rebuild_pages(&mut self, pages: &[Item]) {
        self.pages = pages.iter().map(|item| item.title.clone()).collect();
        self.motion = None;
        self.offset = 0.0;
        self.indicator = None;
    }
}
