//! Host loop - owns the engine, the image cache and the event queue.
//!
//! Everything that mutates engine or cache state happens in `Host::step`:
//! surface motion is advanced, queued host events are applied in order, the
//! autoscroll timer is ticked, finished fetches are pumped, and the image slots
//! around the visible page are (re)bound.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{debug, info, trace, warn};

use crate::cli::Args;
use crate::config::{Settings, SETTINGS_FILE};
use crate::core::carousel::Carousel;
use crate::core::event_bus::{downcast_event, BoxedEvent, EventBus, EventEmitter};
use crate::core::events::*;
use crate::core::fetch::{FileFetcher, HttpFetcher, RoutingFetcher};
use crate::core::image_cache::{CacheStats, ImageCache};
use crate::core::image_slot::{ImageSlot, SlotStatus};
use crate::core::workers::Workers;
use crate::entities::{Feed, FetchExecutor, ImageFetcher};
use crate::paths::{self, PathConfig};
use crate::surface::SimulatedSurface;

/// Simulation step of the demo loop
const FRAME: Duration = Duration::from_millis(50);

/// Real time allowed for outstanding fetches after the simulation ends
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

pub struct Host {
    carousel: Carousel<SimulatedSurface>,
    cache: ImageCache,
    fetcher: Arc<dyn ImageFetcher>,
    bus: EventBus,
    feed: Feed,
    tag: Option<String>,
    /// One slot per physical page of the extended sequence
    slots: Vec<ImageSlot>,
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("tag", &self.tag)
            .field("pages", &self.slots.len())
            .field("cache", &self.cache)
            .finish()
    }
}

impl Host {
    /// Build the host and load the catalog for `tag` at `now`.
    pub fn new(
        settings: &Settings,
        feed: Feed,
        tag: Option<String>,
        executor: Arc<dyn FetchExecutor>,
        fetcher: Arc<dyn ImageFetcher>,
        now: Instant,
    ) -> Self {
        let bus = EventBus::new();
        bus.subscribe::<MemoryWarningEvent, _>(|_| warn!("Memory warning received"));
        // Losing either would leave the engine stuck mid-transition
        bus.retain_on_overflow::<SettledEvent>();
        bus.retain_on_overflow::<DragStartEvent>();

        let surface = SimulatedSurface::new(bus.emitter(), settings.carousel.animation(), now);
        let mut host = Self {
            carousel: Carousel::new(surface, settings.carousel.timing()),
            cache: ImageCache::new(settings.cache, executor),
            fetcher,
            bus,
            feed,
            tag,
            slots: Vec::new(),
        };
        host.reload(now);
        host
    }

    /// Handle for producers outside the loop (lifecycle, OS signals).
    pub fn emitter(&self) -> EventEmitter {
        self.bus.emitter()
    }

    /// Re-select the catalog for the current tag and restart the session.
    fn reload(&mut self, now: Instant) {
        for slot in &self.slots {
            slot.clear(&mut self.cache);
        }
        let catalog = self.feed.select(self.tag.as_deref());
        info!(
            "Loading tag {} ({} items)",
            self.tag.as_deref().unwrap_or("<default>"),
            catalog.len()
        );
        self.carousel.surface_mut().set_clock(now);
        self.carousel.load(catalog, now);
        self.slots = (0..self.carousel.extended().len()).map(|_| ImageSlot::new()).collect();
        self.bind_visible_slots();
    }

    /// Run one iteration of the loop at time `now`.
    pub fn step(&mut self, now: Instant) {
        let surface = self.carousel.surface_mut();
        surface.set_clock(now);
        surface.advance(now);

        for event in self.bus.poll() {
            self.dispatch(&event, now);
        }

        if self.carousel.tick(now) {
            trace!("Autoscroll advanced at {:?}", now);
        }

        self.pump();
        self.bind_visible_slots();
    }

    /// Apply finished fetches to the cache and slots.
    pub fn pump(&mut self) -> usize {
        self.cache.pump()
    }

    fn dispatch(&mut self, event: &BoxedEvent, now: Instant) {
        if let Some(e) = downcast_event::<SettledEvent>(event) {
            self.carousel.on_settled(e.physical, e.kind, now);
        } else if let Some(ScrollPositionEvent(offset)) = downcast_event::<ScrollPositionEvent>(event) {
            self.carousel.on_scroll_position_changed(*offset);
        } else if downcast_event::<DragStartEvent>(event).is_some() {
            self.carousel.on_drag_start();
        } else if let Some(e) = downcast_event::<ScrollToPageEvent>(event) {
            // Rejections are already logged by the engine
            let _ = self.carousel.scroll_to_page(e.index, e.animated, now);
        } else if downcast_event::<ScrollNextEvent>(event).is_some() {
            let _ = self.carousel.scroll_to_next(now);
        } else if downcast_event::<ScrollPreviousEvent>(event).is_some() {
            let _ = self.carousel.scroll_to_previous(now);
        } else if downcast_event::<BecameVisibleEvent>(event).is_some() {
            self.carousel.on_became_visible(now);
        } else if downcast_event::<BecameHiddenEvent>(event).is_some() {
            self.carousel.on_became_hidden();
        } else if downcast_event::<MemoryWarningEvent>(event).is_some() {
            let dropped = self.cache.len();
            self.cache.clear_all();
            info!("Dropped {} cached images on memory warning", dropped);
        } else if let Some(ReloadEvent(tag)) = downcast_event::<ReloadEvent>(event) {
            if tag.is_some() {
                self.tag = tag.clone();
            }
            self.reload(now);
        } else {
            debug!("Unhandled host event: {}", (**event).type_name());
        }
    }

    /// Make sure the visible page and its neighbours request their images.
    fn bind_visible_slots(&mut self) {
        let extended = self.carousel.extended();
        if extended.is_empty() {
            return;
        }
        let page = self.carousel.surface().current_page().min(extended.len() - 1);
        let first = page.saturating_sub(1);
        let last = (page + 1).min(extended.len() - 1);

        for physical in first..=last {
            let Some(key) = extended[physical].cache_key() else {
                continue;
            };
            let slot = &self.slots[physical];
            if slot.wanted().as_deref() == Some(key.as_str()) {
                continue;
            }
            slot.load(&mut self.cache, &key, Arc::clone(&self.fetcher));
        }
    }

    pub fn carousel(&self) -> &Carousel<SimulatedSurface> {
        &self.carousel
    }

    pub fn surface_mut(&mut self) -> &mut SimulatedSurface {
        self.carousel.surface_mut()
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    pub fn slot(&self, physical: usize) -> Option<&ImageSlot> {
        self.slots.get(physical)
    }

    /// Pump until no fetch is outstanding or `timeout` (real time) elapses.
    pub fn drain(&mut self, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        while self.cache.in_flight_count() > 0 && Instant::now() < deadline {
            self.pump();
            std::thread::sleep(Duration::from_millis(5));
        }
        self.pump();
    }

    pub fn report(&self) -> RunReport {
        let mut loaded = 0;
        let mut failed = 0;
        for slot in &self.slots {
            match slot.status() {
                SlotStatus::Loaded(_) => loaded += 1,
                SlotStatus::Failed(_) => failed += 1,
                SlotStatus::Empty | SlotStatus::Loading => {}
            }
        }
        RunReport {
            indicator_history: self.carousel.surface().indicator_history().to_vec(),
            final_page: self.carousel.logical_index(),
            slots_loaded: loaded,
            slots_failed: failed,
            cached: self.cache.len(),
            cache_stats: self.cache.stats(),
        }
    }
}

/// Summary printed at the end of a demo run
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub indicator_history: Vec<usize>,
    pub final_page: Option<usize>,
    pub slots_loaded: usize,
    pub slots_failed: usize,
    pub cached: usize,
    pub cache_stats: CacheStats,
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Pages shown:   {:?}", self.indicator_history)?;
        match self.final_page {
            Some(page) => writeln!(f, "Final page:    {}", page)?,
            None => writeln!(f, "Final page:    - (empty catalog)")?,
        }
        writeln!(f, "Image slots:   {} loaded, {} failed", self.slots_loaded, self.slots_failed)?;
        write!(
            f,
            "Cache:         {} entries, {} hits / {} misses ({:.0}% hit rate), {} evictions",
            self.cached,
            self.cache_stats.hits,
            self.cache_stats.misses,
            self.cache_stats.hit_rate() * 100.0,
            self.cache_stats.evictions
        )
    }
}

/// Run the headless carousel demo with given arguments.
///
/// `path_config` is resolved (and its directories created) by the caller.
pub fn run_app(args: Args, path_config: &PathConfig) -> Result<()> {
    let settings_path = paths::config_file(SETTINGS_FILE, path_config);
    info!("Config path: {}", settings_path.display());
    let mut settings = Settings::load_or_default(&settings_path)?;
    if let Some(workers) = args.workers {
        settings.workers = workers;
    }

    let feed = Feed::load(&args.feed).with_context(|| format!("Failed to load feed: {}", args.feed.display()))?;
    info!("Feed '{}': {} tags, {} items", feed.head_title, feed.tags.len(), feed.items.len());

    let root = args.feed.parent().unwrap_or(Path::new(".")).to_path_buf();
    let http = HttpFetcher::new().context("Failed to set up image downloads")?;
    let fetcher: Arc<dyn ImageFetcher> = Arc::new(RoutingFetcher::new(http, FileFetcher::with_root(root)));
    let workers: Arc<dyn FetchExecutor> = Arc::new(Workers::new(settings.worker_threads()));

    let start = Instant::now();
    let mut host = Host::new(&settings, feed, args.tag.clone(), workers, fetcher, start);
    let emitter = host.emitter();

    let mut drags = args.drag_script().into_iter().peekable();
    let mut memory_warning = args.memory_warning;
    let steps = (args.seconds.max(0.0) / FRAME.as_secs_f64()).round() as u32;

    for step in 0..=steps {
        let elapsed = FRAME * step;
        let secs = elapsed.as_secs_f64();

        while let Some(&(at, page)) = drags.peek() {
            if at > secs {
                break;
            }
            host.surface_mut().drag_to(page);
            drags.next();
        }
        if memory_warning.is_some_and(|at| at <= secs) {
            emitter.emit(MemoryWarningEvent);
            memory_warning = None;
        }

        host.step(start + elapsed);
    }

    host.drain(DRAIN_TIMEOUT);
    println!("{}", host.report());
    Ok(())
}
