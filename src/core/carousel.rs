//! Carousel playback engine - infinite looping over a finite paged surface.
//!
//! **Why**: a paged scroll surface has two hard ends. To make it look endless
//! the engine presents an extended sequence with a phantom copy of the last
//! item before the first page and of the first item after the last page.
//! Whenever motion settles on a phantom, the engine teleports (no animation)
//! to the real page showing identical content.
//!
//! # Index model
//!
//! - logical index `l` in `0..N`: the page the outside world sees
//! - physical index `p` in `0..N+2`: the page of the extended sequence
//! - `l = p - 1` for `1 <= p <= N`; `p = 0` mirrors `N-1`, `p = N+1` mirrors `0`
//!
//! Catalogs with fewer than two items are shown as-is: no phantoms, no looping
//! and no autoscroll.
//!
//! # Event flow
//!
//! The engine is driven from a single owning loop:
//! - `tick(now)` advances the autoscroll timer
//! - surface events (`on_settled`, `on_drag_start`, `on_scroll_position_changed`)
//! - lifecycle (`on_became_visible`, `on_became_hidden`)
//!
//! It answers through the injected `PageSurface`.

use std::time::{Duration, Instant};

use log::{debug, info, trace, warn};

use crate::core::autoscroll::AutoscrollTimer;
use crate::entities::{Catalog, Item, PageSurface};

/// Timing knobs of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackTiming {
    /// Period of automatic advancement
    pub autoscroll_interval: Duration,
    /// Delay before re-arming after a transition settles
    pub settle_delay: Duration,
    /// Delay before re-arming after becoming visible
    pub resume_grace: Duration,
}

impl Default for PlaybackTiming {
    fn default() -> Self {
        Self {
            autoscroll_interval: Duration::from_secs(5),
            settle_delay: Duration::from_millis(500),
            resume_grace: Duration::from_millis(100),
        }
    }
}

/// Why the surface stopped moving
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleKind {
    /// User-driven motion decelerated to a stop
    Decelerated,
    /// A programmatic animated move finished
    AnimationEnded,
}

/// Snapshot of the engine's mutable state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackState {
    pub logical_index: usize,
    pub is_user_driving: bool,
    pub is_programmatic_transition: bool,
    pub timer_armed: bool,
}

/// Rejected navigation requests. State is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationError {
    CatalogEmpty,
    OutOfRange { index: usize, len: usize },
}

impl std::fmt::Display for NavigationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NavigationError::CatalogEmpty => write!(f, "Catalog is empty"),
            NavigationError::OutOfRange { index, len } => {
                write!(f, "Page {} out of range (catalog has {} items)", index, len)
            }
        }
    }
}

impl std::error::Error for NavigationError {}

/// Looping carousel state machine (owns the surface it drives)
#[derive(Debug)]
pub struct Carousel<S: PageSurface> {
    surface: S,
    catalog: Catalog,
    extended: Vec<Item>,
    logical_index: usize,
    /// Page the surface was last told to show or last settled on
    physical_index: usize,
    /// Last value sent to the indicator
    reported: Option<usize>,
    is_user_driving: bool,
    is_programmatic: bool,
    visible: bool,
    timer: AutoscrollTimer,
    timing: PlaybackTiming,
}

impl<S: PageSurface> Carousel<S> {
    /// Create an inert engine (empty catalog) driving `surface`.
    pub fn new(surface: S, timing: PlaybackTiming) -> Self {
        Self {
            surface,
            catalog: Catalog::empty(),
            extended: Vec::new(),
            logical_index: 0,
            physical_index: 0,
            reported: None,
            is_user_driving: false,
            is_programmatic: false,
            visible: true,
            timer: AutoscrollTimer::new(timing.autoscroll_interval),
            timing,
        }
    }

    // === Session ===

    /// Replace the catalog and rebuild everything from scratch.
    ///
    /// Any armed timer or in-flight transition of the previous session is
    /// dropped. An empty catalog leaves the engine inert.
    pub fn load(&mut self, catalog: Catalog, now: Instant) {
        self.timer.disarm();
        self.extended = catalog.extended();
        self.catalog = catalog;
        self.logical_index = 0;
        self.physical_index = 0;
        self.reported = None;
        self.is_user_driving = false;
        self.is_programmatic = false;

        self.surface.rebuild_pages(&self.extended);

        let n = self.catalog.len();
        if n == 0 {
            info!("Carousel loaded empty catalog (inert)");
            return;
        }

        self.physical_index = if n > 1 { 1 } else { 0 };
        self.surface.set_physical_page(self.physical_index, false);
        self.report(0);
        info!("Carousel loaded {} items ({} pages)", n, self.extended.len());

        self.start_autoscroll(now);
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn extended(&self) -> &[Item] {
        &self.extended
    }

    fn len(&self) -> usize {
        self.catalog.len()
    }

    fn loops(&self) -> bool {
        self.len() > 1
    }

    // === Autoscroll ===

    /// Arm the autoscroll timer now (restarting its period).
    ///
    /// No-op for catalogs that don't loop or while hidden.
    pub fn start_autoscroll(&mut self, now: Instant) {
        self.timer.disarm();
        if !self.loops() || !self.visible {
            return;
        }
        self.timer.arm(now);
        debug!("Autoscroll armed ({:?})", self.timing.autoscroll_interval);
    }

    /// Arm after the settle delay, so the timer doesn't fight the user.
    pub fn restart_autoscroll(&mut self, now: Instant) {
        self.timer.disarm();
        if !self.loops() || !self.visible {
            return;
        }
        self.timer.arm_after(now, self.timing.settle_delay);
    }

    /// Explicit stop. Idempotent.
    pub fn stop_autoscroll(&mut self) {
        self.timer.disarm();
    }

    /// Timer armed or waiting to arm
    pub fn is_autoscrolling(&self) -> bool {
        self.timer.is_scheduled()
    }

    /// Drive the timer. Returns true if the carousel started advancing.
    pub fn tick(&mut self, now: Instant) -> bool {
        if !self.timer.tick(now) {
            return false;
        }
        self.advance()
    }

    /// One autoscroll step: animate to the next physical page.
    fn advance(&mut self) -> bool {
        if !self.loops() {
            return false;
        }
        if self.is_programmatic || self.is_user_driving {
            trace!("Autoscroll fire skipped: surface busy");
            return false;
        }
        let target = self.physical_index + 1;
        if target >= self.extended.len() {
            warn!("Autoscroll from unreconciled page {}, skipped", self.physical_index);
            return false;
        }

        self.is_programmatic = true;
        self.physical_index = target;
        trace!("Autoscroll -> physical {}", target);
        self.surface.set_physical_page(target, true);
        true
    }

    // === Navigation ===

    /// Jump to logical page `index`.
    ///
    /// The indicator is updated immediately. A non-animated jump re-arms the
    /// timer right away; an animated one waits for its settle event.
    pub fn scroll_to_page(&mut self, index: usize, animated: bool, now: Instant) -> Result<(), NavigationError> {
        let n = self.len();
        if n == 0 {
            debug!("scroll_to_page({}) ignored: catalog empty", index);
            return Err(NavigationError::CatalogEmpty);
        }
        if index >= n {
            warn!("scroll_to_page({}) ignored: only {} items", index, n);
            return Err(NavigationError::OutOfRange { index, len: n });
        }

        self.timer.disarm();
        self.is_programmatic = true;

        let target = if self.loops() { index + 1 } else { index };
        self.physical_index = target;
        self.surface.set_physical_page(target, animated);

        self.logical_index = index;
        self.report(index);

        if !animated {
            self.is_programmatic = false;
            self.restart_autoscroll(now);
        }
        Ok(())
    }

    /// Animate one page forward, wrapping through the trailing phantom.
    pub fn scroll_to_next(&mut self, now: Instant) -> Result<(), NavigationError> {
        self.step(1, now)
    }

    /// Animate one page back, wrapping through the leading phantom.
    pub fn scroll_to_previous(&mut self, now: Instant) -> Result<(), NavigationError> {
        self.step(-1, now)
    }

    fn step(&mut self, delta: isize, now: Instant) -> Result<(), NavigationError> {
        let n = self.len();
        if n == 0 {
            return Err(NavigationError::CatalogEmpty);
        }
        if !self.loops() {
            return self.scroll_to_page(0, false, now);
        }

        self.timer.disarm();
        self.is_programmatic = true;

        // Steps stack on the optimistic index. Phantoms only for a wrap off
        // the settled edge page.
        let logical = (self.logical_index as isize + delta).rem_euclid(n as isize) as usize;
        let target = match (delta > 0, logical) {
            (true, 0) if self.physical_index == n => n + 1,
            (false, l) if l == n - 1 && self.physical_index == 1 => 0,
            _ => logical + 1,
        };
        trace!("Step {:+} -> logical {} (physical {})", delta, logical, target);
        self.physical_index = target;
        self.surface.set_physical_page(target, true);

        self.logical_index = logical;
        self.report(logical);
        Ok(())
    }

    // === Surface events ===

    /// Motion stopped on physical page `physical`.
    ///
    /// An `AnimationEnded` with no programmatic transition in flight belongs to
    /// a move the user interrupted and is ignored.
    pub fn on_settled(&mut self, physical: usize, kind: SettleKind, now: Instant) {
        if self.catalog.is_empty() {
            return;
        }
        if kind == SettleKind::AnimationEnded && !self.is_programmatic {
            trace!("Ignoring animation end at {}: no transition in flight", physical);
            return;
        }

        self.is_programmatic = false;
        self.is_user_driving = false;

        if physical >= self.extended.len() {
            warn!("Settled on page {} outside {} pages, keeping page {}", physical, self.extended.len(), self.logical_index);
        } else {
            self.reconcile(physical);
            self.report(self.logical_index);
        }

        self.restart_autoscroll(now);
    }

    /// Map a settled physical page back to a logical one, teleporting off phantoms.
    fn reconcile(&mut self, physical: usize) {
        let n = self.len();
        if !self.loops() {
            self.physical_index = physical;
            self.logical_index = physical.min(n - 1);
            return;
        }

        if physical == 0 {
            self.teleport(n);
            self.logical_index = n - 1;
        } else if physical == n + 1 {
            self.teleport(1);
            self.logical_index = 0;
        } else {
            self.physical_index = physical;
            self.logical_index = physical - 1;
        }
        debug!("Reconciled physical {} -> logical {}", physical, self.logical_index);
    }

    fn teleport(&mut self, physical: usize) {
        trace!("Teleport {} -> {}", self.physical_index, physical);
        self.physical_index = physical;
        self.surface.set_physical_page(physical, false);
    }

    /// The user started dragging. Always wins over the engine's own motion.
    pub fn on_drag_start(&mut self) {
        self.timer.disarm();
        if self.catalog.is_empty() {
            return;
        }
        if self.is_programmatic {
            debug!("Drag interrupted programmatic transition");
        }
        self.is_user_driving = true;
        self.is_programmatic = false;
    }

    /// Live offset (in pages) while moving; only feeds the indicator.
    pub fn on_scroll_position_changed(&mut self, offset: f64) {
        if self.is_programmatic || !self.loops() || !offset.is_finite() {
            return;
        }
        let page = offset.round();
        if page < 1.0 || page > self.len() as f64 {
            return;
        }
        self.report(page as usize - 1);
    }

    // === Lifecycle ===

    pub fn on_became_visible(&mut self, now: Instant) {
        self.visible = true;
        if !self.loops() {
            return;
        }
        info!("Carousel visible, autoscroll resumes in {:?}", self.timing.resume_grace);
        self.timer.arm_after(now, self.timing.resume_grace);
    }

    pub fn on_became_hidden(&mut self) {
        self.visible = false;
        self.timer.disarm();
        info!("Carousel hidden, autoscroll paused");
    }

    // === Accessors ===

    fn report(&mut self, logical: usize) {
        if self.reported == Some(logical) {
            return;
        }
        self.reported = Some(logical);
        self.surface.report_page(logical);
    }

    /// Current logical page, `None` while inert
    pub fn logical_index(&self) -> Option<usize> {
        (!self.catalog.is_empty()).then_some(self.logical_index)
    }

    pub fn physical_index(&self) -> usize {
        self.physical_index
    }

    pub fn current_item(&self) -> Option<&Item> {
        self.catalog.get(self.logical_index)
    }

    pub fn state(&self) -> PlaybackState {
        PlaybackState {
            logical_index: self.logical_index,
            is_user_driving: self.is_user_driving,
            is_programmatic_transition: self.is_programmatic,
            timer_armed: self.timer.is_scheduled(),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn timing(&self) -> PlaybackTiming {
        self.timing
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Move(usize, bool),
        Report(usize),
        Rebuild(Vec<String>),
    }

    #[derive(Debug, Default)]
    struct Recorder {
        calls: Vec<Call>,
    }

    impl Recorder {
        fn take(&mut self) -> Vec<Call> {
            std::mem::take(&mut self.calls)
        }
    }

    impl PageSurface for Recorder {
        fn set_physical_page(&mut self, index: usize, animated: bool) {
            self.calls.push(Call::Move(index, animated));
        }
        fn report_page(&mut self, logical_index: usize) {
            self.calls.push(Call::Report(logical_index));
        }
        fn rebuild_pages(&mut self, pages: &[Item]) {
            self.calls.push(Call::Rebuild(pages.iter().map(|i| i.title.clone()).collect()));
        }
    }

    const SEC: Duration = Duration::from_secs(1);

    fn catalog(names: &[&str]) -> Catalog {
        names
            .iter()
            .map(|n| Item::new("t", *n, "", format!("https://x/{}.png", n)))
            .collect()
    }

    fn engine(names: &[&str], t0: Instant) -> Carousel<Recorder> {
        let mut c = Carousel::new(Recorder::default(), PlaybackTiming::default());
        c.load(catalog(names), t0);
        c.surface_mut().take();
        c
    }

    #[test]
    fn test_load_presents_first_real_page() {
        let t0 = Instant::now();
        let mut c = Carousel::new(Recorder::default(), PlaybackTiming::default());
        c.load(catalog(&["A", "B", "C"]), t0);

        let titles = ["C", "A", "B", "C", "A"].iter().map(|s| s.to_string()).collect();
        assert_eq!(
            c.surface_mut().take(),
            vec![Call::Rebuild(titles), Call::Move(1, false), Call::Report(0)]
        );
        assert_eq!(c.logical_index(), Some(0));
        assert_eq!(c.physical_index(), 1);
        assert!(c.state().timer_armed);
    }

    #[test]
    fn test_autoscroll_advances_and_reconciles() {
        let t0 = Instant::now();
        let mut c = engine(&["A", "B", "C"], t0);

        assert!(!c.tick(t0 + 4 * SEC));
        assert!(c.tick(t0 + 5 * SEC));
        assert_eq!(c.surface_mut().take(), vec![Call::Move(2, true)]);
        assert!(c.state().is_programmatic_transition);

        c.on_settled(2, SettleKind::AnimationEnded, t0 + 5 * SEC);
        assert_eq!(c.logical_index(), Some(1));
        assert_eq!(c.current_item().map(|i| i.title.as_str()), Some("B"));
        assert_eq!(c.surface_mut().take(), vec![Call::Report(1)]);
        assert!(!c.state().is_programmatic_transition);
        assert!(c.is_autoscrolling());
    }

    #[test]
    fn test_autoscroll_wraps_through_trailing_phantom() {
        let t0 = Instant::now();
        let mut c = engine(&["A", "B", "C"], t0);
        c.scroll_to_page(2, false, t0).unwrap();
        c.surface_mut().take();

        // Settle delay 0.5s, then a full interval
        let fire = t0 + Duration::from_millis(5500);
        c.tick(t0 + SEC);
        assert!(c.tick(fire));
        assert_eq!(c.surface_mut().take(), vec![Call::Move(4, true)]);

        c.on_settled(4, SettleKind::AnimationEnded, fire);
        assert_eq!(c.surface_mut().take(), vec![Call::Move(1, false), Call::Report(0)]);
        assert_eq!(c.logical_index(), Some(0));
        assert_eq!(c.physical_index(), 1);
    }

    #[test]
    fn test_drag_onto_leading_phantom_teleports_to_last() {
        let t0 = Instant::now();
        let mut c = engine(&["A", "B", "C"], t0);

        c.on_drag_start();
        assert!(!c.is_autoscrolling());
        assert!(c.state().is_user_driving);

        c.on_settled(0, SettleKind::Decelerated, t0 + SEC);
        assert_eq!(c.surface_mut().take(), vec![Call::Move(3, false), Call::Report(2)]);
        assert_eq!(c.logical_index(), Some(2));
        assert_eq!(c.physical_index(), 3);
        assert!(!c.state().is_user_driving);
        assert!(c.is_autoscrolling());
    }

    #[test]
    fn test_settle_on_phantoms_for_various_sizes() {
        let t0 = Instant::now();
        for n in 2..8 {
            let names: Vec<String> = (0..n).map(|i| format!("i{}", i)).collect();
            let refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
            let mut c = engine(&refs, t0);

            c.on_settled(0, SettleKind::Decelerated, t0);
            assert_eq!((c.logical_index(), c.physical_index()), (Some(n - 1), n));

            c.on_settled(n + 1, SettleKind::Decelerated, t0);
            assert_eq!((c.logical_index(), c.physical_index()), (Some(0), 1));
        }
    }

    #[test]
    fn test_teleport_target_matches_phantom_content() {
        let t0 = Instant::now();
        let c = engine(&["A", "B", "C", "D"], t0);
        let ext = c.extended();
        assert_eq!(ext[0], ext[4]);
        assert_eq!(ext[5], ext[1]);
    }

    #[test]
    fn test_scroll_to_page_any_direction() {
        let t0 = Instant::now();
        let mut c = engine(&["A", "B", "C", "D"], t0);

        for &target in &[3usize, 0, 2, 1, 3] {
            c.scroll_to_page(target, true, t0).unwrap();
            assert_eq!(c.logical_index(), Some(target));
            assert!(c.state().is_programmatic_transition);
            assert!(!c.is_autoscrolling());

            c.on_settled(target + 1, SettleKind::AnimationEnded, t0);
            assert_eq!(c.logical_index(), Some(target));
            assert!(!c.state().is_programmatic_transition);
            assert!(c.is_autoscrolling());
        }
    }

    #[test]
    fn test_scroll_to_page_reports_optimistically() {
        let t0 = Instant::now();
        let mut c = engine(&["A", "B", "C"], t0);
        c.scroll_to_page(2, true, t0).unwrap();
        assert_eq!(c.surface_mut().take(), vec![Call::Move(3, true), Call::Report(2)]);

        // Settle on the same page doesn't report twice
        c.on_settled(3, SettleKind::AnimationEnded, t0);
        assert!(c.surface_mut().take().is_empty());
    }

    #[test]
    fn test_non_animated_jump_rearms_immediately() {
        let t0 = Instant::now();
        let mut c = engine(&["A", "B", "C"], t0);

        c.scroll_to_page(1, false, t0).unwrap();
        assert_eq!(c.surface_mut().take(), vec![Call::Move(2, false), Call::Report(1)]);
        assert!(!c.state().is_programmatic_transition);
        assert!(c.is_autoscrolling());
    }

    #[test]
    fn test_invalid_navigation_keeps_state() {
        let t0 = Instant::now();
        let mut c = engine(&["A", "B", "C"], t0);
        let before = c.state();

        assert_eq!(
            c.scroll_to_page(3, true, t0),
            Err(NavigationError::OutOfRange { index: 3, len: 3 })
        );
        assert_eq!(c.state(), before);
        assert!(c.surface_mut().take().is_empty());
    }

    #[test]
    fn test_empty_catalog_is_inert() {
        let t0 = Instant::now();
        let mut c = Carousel::new(Recorder::default(), PlaybackTiming::default());
        c.load(Catalog::empty(), t0);
        assert_eq!(c.surface_mut().take(), vec![Call::Rebuild(vec![])]);

        assert_eq!(c.scroll_to_page(0, true, t0), Err(NavigationError::CatalogEmpty));
        assert_eq!(c.scroll_to_next(t0), Err(NavigationError::CatalogEmpty));
        c.on_drag_start();
        c.on_settled(0, SettleKind::Decelerated, t0);
        c.on_scroll_position_changed(1.0);
        c.on_became_visible(t0);
        assert!(!c.tick(t0 + 60 * SEC));

        assert_eq!(c.logical_index(), None);
        assert!(!c.is_autoscrolling());
        assert!(c.surface_mut().take().is_empty());
    }

    #[test]
    fn test_single_item_never_autoscrolls() {
        let t0 = Instant::now();
        let mut c = Carousel::new(Recorder::default(), PlaybackTiming::default());
        c.load(catalog(&["A"]), t0);
        assert_eq!(
            c.surface_mut().take(),
            vec![Call::Rebuild(vec!["A".into()]), Call::Move(0, false), Call::Report(0)]
        );
        assert!(!c.is_autoscrolling());

        c.start_autoscroll(t0);
        c.on_became_visible(t0);
        c.scroll_to_page(0, false, t0).unwrap();
        c.scroll_to_next(t0).unwrap();
        assert!(!c.is_autoscrolling());
        assert!(!c.tick(t0 + 60 * SEC));
        assert_eq!(c.logical_index(), Some(0));
        assert_eq!(c.physical_index(), 0);
    }

    #[test]
    fn test_drag_preempts_programmatic_transition() {
        let t0 = Instant::now();
        let mut c = engine(&["A", "B", "C"], t0);
        assert!(c.tick(t0 + 5 * SEC));
        c.surface_mut().take();

        c.on_drag_start();
        assert!(!c.state().is_programmatic_transition);
        assert!(!c.is_autoscrolling());

        // The interrupted animation's end is not a settle for the engine
        c.on_settled(2, SettleKind::AnimationEnded, t0 + 5 * SEC);
        assert!(c.surface_mut().take().is_empty());
        assert!(c.state().is_user_driving);

        c.on_settled(1, SettleKind::Decelerated, t0 + 6 * SEC);
        assert_eq!(c.logical_index(), Some(0));
        assert!(c.is_autoscrolling());
    }

    #[test]
    fn test_scroll_feedback_filtered_while_programmatic() {
        let t0 = Instant::now();
        let mut c = engine(&["A", "B", "C"], t0);
        c.scroll_to_page(2, true, t0).unwrap();
        c.surface_mut().take();

        c.on_scroll_position_changed(2.4);
        c.on_scroll_position_changed(2.6);
        assert!(c.surface_mut().take().is_empty());

        c.on_settled(3, SettleKind::AnimationEnded, t0);
        c.on_drag_start();
        c.on_scroll_position_changed(2.6);
        c.on_scroll_position_changed(2.4);
        c.on_scroll_position_changed(2.3);
        // Phantom pages and garbage never reach the indicator
        c.on_scroll_position_changed(0.2);
        c.on_scroll_position_changed(4.0);
        c.on_scroll_position_changed(f64::NAN);
        assert_eq!(c.surface_mut().take(), vec![Call::Report(1)]);
        // Indicator feedback doesn't move the authoritative index
        assert_eq!(c.logical_index(), Some(2));
    }

    #[test]
    fn test_hidden_and_visible() {
        let t0 = Instant::now();
        let mut c = engine(&["A", "B"], t0);

        c.on_became_hidden();
        assert!(!c.is_autoscrolling());
        assert!(!c.tick(t0 + 60 * SEC));

        let back = t0 + 60 * SEC;
        c.on_became_visible(back);
        assert!(c.is_autoscrolling());
        assert!(!c.tick(back + 5 * SEC));
        assert!(c.tick(back + Duration::from_millis(5100)));
    }

    #[test]
    fn test_load_while_hidden_waits_for_visible() {
        let t0 = Instant::now();
        let mut c = Carousel::new(Recorder::default(), PlaybackTiming::default());
        c.on_became_hidden();
        c.load(catalog(&["A", "B"]), t0);
        assert!(!c.is_autoscrolling());

        c.on_became_visible(t0);
        assert!(c.is_autoscrolling());
    }

    #[test]
    fn test_reload_mid_transition_resets() {
        let t0 = Instant::now();
        let mut c = engine(&["A", "B", "C"], t0);
        c.scroll_to_page(2, true, t0).unwrap();
        c.on_drag_start();

        c.load(catalog(&["X", "Y"]), t0 + SEC);
        let state = c.state();
        assert_eq!(state.logical_index, 0);
        assert!(!state.is_programmatic_transition);
        assert!(!state.is_user_driving);
        assert!(state.timer_armed);
        assert_eq!(c.extended().len(), 4);
        assert_eq!(c.physical_index(), 1);

        // Leftover animation end from the old session is ignored
        c.surface_mut().take();
        c.on_settled(3, SettleKind::AnimationEnded, t0 + SEC);
        assert!(c.surface_mut().take().is_empty());
    }

    #[test]
    fn test_reload_empty_stops_timer() {
        let t0 = Instant::now();
        let mut c = engine(&["A", "B", "C"], t0);
        c.load(Catalog::empty(), t0);
        assert!(!c.is_autoscrolling());
        assert_eq!(c.logical_index(), None);
        assert!(c.extended().is_empty());
    }

    #[test]
    fn test_next_and_previous_wrap() {
        let t0 = Instant::now();
        let mut c = engine(&["A", "B", "C"], t0);

        c.scroll_to_previous(t0).unwrap();
        assert_eq!(c.surface_mut().take(), vec![Call::Move(0, true), Call::Report(2)]);
        c.on_settled(0, SettleKind::AnimationEnded, t0);
        assert_eq!(c.surface_mut().take(), vec![Call::Move(3, false)]);
        assert_eq!(c.logical_index(), Some(2));

        c.scroll_to_next(t0).unwrap();
        assert_eq!(c.surface_mut().take(), vec![Call::Move(4, true), Call::Report(0)]);
        c.on_settled(4, SettleKind::AnimationEnded, t0);
        assert_eq!(c.logical_index(), Some(0));
        assert_eq!(c.physical_index(), 1);
    }

    #[test]
    fn test_repeated_next_before_settle() {
        let t0 = Instant::now();
        let mut c = engine(&["A", "B", "C"], t0);
        c.scroll_to_page(2, false, t0).unwrap();
        c.surface_mut().take();

        c.scroll_to_next(t0).unwrap();
        c.scroll_to_next(t0).unwrap();
        assert_eq!(
            c.surface_mut().take(),
            vec![Call::Move(4, true), Call::Report(0), Call::Move(2, true), Call::Report(1)]
        );
        assert_eq!(c.physical_index(), 2);

        c.on_settled(2, SettleKind::AnimationEnded, t0);
        assert_eq!(c.logical_index(), Some(1));
        assert!(c.surface_mut().take().is_empty());
    }

    #[test]
    fn test_repeated_previous_before_settle() {
        let t0 = Instant::now();
        let mut c = engine(&["A", "B", "C", "D"], t0);

        c.scroll_to_previous(t0).unwrap();
        c.scroll_to_previous(t0).unwrap();
        c.scroll_to_previous(t0).unwrap();
        assert_eq!(
            c.surface_mut().take(),
            vec![
                Call::Move(0, true),
                Call::Report(3),
                Call::Move(3, true),
                Call::Report(2),
                Call::Move(2, true),
                Call::Report(1),
            ]
        );

        c.on_settled(2, SettleKind::AnimationEnded, t0);
        assert_eq!(c.logical_index(), Some(1));
        assert_eq!(c.physical_index(), 2);
    }

    #[test]
    fn test_steps_cancel_out_before_settle() {
        let t0 = Instant::now();
        let mut c = engine(&["A", "B", "C"], t0);

        c.scroll_to_next(t0).unwrap();
        c.scroll_to_previous(t0).unwrap();
        assert_eq!(c.physical_index(), 1);
        c.on_settled(1, SettleKind::AnimationEnded, t0);
        assert_eq!(c.logical_index(), Some(0));
        assert_eq!(c.surface().calls.last(), Some(&Call::Report(0)));
    }

    #[test]
    fn test_settle_while_hidden_does_not_rearm() {
        let t0 = Instant::now();
        let mut c = engine(&["A", "B", "C"], t0);
        assert!(c.tick(t0 + 5 * SEC));
        c.surface_mut().take();

        c.on_became_hidden();
        c.on_settled(2, SettleKind::AnimationEnded, t0 + 5 * SEC);
        assert_eq!(c.logical_index(), Some(1));
        assert_eq!(c.surface_mut().take(), vec![Call::Report(1)]);
        assert!(!c.state().is_programmatic_transition);
        assert!(!c.is_autoscrolling());
        assert!(!c.tick(t0 + 60 * SEC));

        let back = t0 + 60 * SEC;
        c.on_became_visible(back);
        assert!(c.is_autoscrolling());
        assert!(c.tick(back + Duration::from_millis(5100)));
        assert_eq!(c.surface_mut().take(), vec![Call::Move(3, true)]);
    }

    #[test]
    fn test_tick_skipped_while_transition_in_flight() {
        let t0 = Instant::now();
        let mut c = engine(&["A", "B", "C"], t0);
        c.scroll_to_page(1, true, t0).unwrap();
        // Explicit restart while the jump is still animating
        c.start_autoscroll(t0);
        assert!(!c.tick(t0 + 5 * SEC));
        assert_eq!(c.physical_index(), 2);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let t0 = Instant::now();
        let mut c = engine(&["A", "B"], t0);
        c.stop_autoscroll();
        c.stop_autoscroll();
        assert!(!c.is_autoscrolling());
        c.start_autoscroll(t0);
        assert!(c.is_autoscrolling());
    }

    #[test]
    fn test_out_of_range_settle_keeps_page() {
        let t0 = Instant::now();
        let mut c = engine(&["A", "B"], t0);
        c.scroll_to_page(1, true, t0).unwrap();
        c.on_settled(99, SettleKind::AnimationEnded, t0);
        assert_eq!(c.logical_index(), Some(1));
        assert!(!c.state().is_programmatic_transition);
        assert!(c.is_autoscrolling());
    }
}
