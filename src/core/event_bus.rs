//! Host event bus - how surface, lifecycle and OS signals reach the engine.
//!
//! Architecture:
//! - Producers (the page surface, visibility changes, memory pressure) hold an
//!   `EventEmitter` and may live on any thread
//! - `emit()` runs observer callbacks immediately and queues the event
//! - The owning loop drains the queue with `poll()` and applies each event to
//!   the engine and cache, so all state mutation stays on that one loop
//!
//! Observers are for side concerns (logging, counters); they must not try to
//! mutate the engine.
//!
//! The queue is bounded. On overflow the oldest half is evicted, except for
//! event types registered with `retain_on_overflow`, which are never dropped.

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use log::{error, warn};

/// Maximum events in queue before oldest are evicted
const MAX_QUEUE_SIZE: usize = 1000;

/// Marker trait for events. Events must be Send + Sync + 'static.
pub trait Event: Any + Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;
    fn type_name(&self) -> &'static str;
}

impl<T: Any + Send + Sync + 'static> Event for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

type Callback = Arc<dyn Fn(&dyn Any) + Send + Sync>;

/// Boxed event for queue storage
pub type BoxedEvent = Box<dyn Event>;

/// State shared between the bus and its emitters
#[derive(Default)]
struct Shared {
    observers: RwLock<HashMap<TypeId, Vec<Callback>>>,
    /// Event types that survive queue overflow
    retained: RwLock<HashSet<TypeId>>,
    queue: Mutex<Vec<BoxedEvent>>,
}

impl Shared {
    fn push(&self, event: BoxedEvent) {
        let type_id = (*event).as_any().type_id();
        if let Some(cbs) = self.observers.read().unwrap_or_else(|e| e.into_inner()).get(&type_id) {
            for cb in cbs {
                cb((*event).as_any());
            }
        }

        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        if queue.len() >= MAX_QUEUE_SIZE {
            self.evict(&mut queue);
        }
        queue.push(event);
    }

    /// Drop the oldest half of the queue, skipping retained event types.
    fn evict(&self, queue: &mut Vec<BoxedEvent>) {
        let retained = self.retained.read().unwrap_or_else(|e| e.into_inner());
        let evict_count = queue.len() / 2;
        let mut evicted = 0;
        queue.retain(|event| {
            if evicted == evict_count || retained.contains(&(**event).as_any().type_id()) {
                return true;
            }
            evicted += 1;
            false
        });

        if evicted == 0 {
            error!("Host event queue holds {} events that can't be dropped, consumer is stalled", queue.len());
        } else {
            warn!("Host event queue full, evicted oldest {} of {} events", evicted, queue.len() + evicted);
        }
    }
}

/// Event queue owned by the host loop.
#[derive(Clone, Default)]
pub struct EventBus {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").field("queue_len", &self.queue_len()).finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe events of type E as they are emitted.
    ///
    /// ```ignore
    /// bus.subscribe::<MemoryWarningEvent, _>(|_| warn!("memory pressure"));
    /// ```
    pub fn subscribe<E, F>(&self, callback: F)
    where
        E: Event,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let wrapped: Callback = Arc::new(move |any: &dyn Any| {
            if let Some(event) = any.downcast_ref::<E>() {
                callback(event);
            }
        });
        self.shared
            .observers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(TypeId::of::<E>())
            .or_default()
            .push(wrapped);
    }

    /// Never evict events of type E when the queue overflows.
    pub fn retain_on_overflow<E: Event>(&self) {
        self.shared
            .retained
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(TypeId::of::<E>());
    }

    pub fn emit<E: Event>(&self, event: E) {
        self.shared.push(Box::new(event));
    }

    /// Drain queued events in emission order.
    ///
    /// ```ignore
    /// for event in bus.poll() {
    ///     if let Some(e) = downcast_event::<SettledEvent>(&event) { ... }
    /// }
    /// ```
    pub fn poll(&self) -> Vec<BoxedEvent> {
        std::mem::take(&mut *self.shared.queue.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Handle for producers on other threads.
    pub fn emitter(&self) -> EventEmitter {
        EventEmitter {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn queue_len(&self) -> usize {
        self.shared.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Cloneable producer handle.
#[derive(Clone)]
pub struct EventEmitter {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("queue_len", &self.shared.queue.lock().map(|q| q.len()).unwrap_or(0))
            .finish()
    }
}

impl EventEmitter {
    pub fn emit<E: Event>(&self, event: E) {
        self.shared.push(Box::new(event));
    }
}

/// Downcast a queued event to its concrete type.
///
/// Derefs to `dyn Event` first; calling `as_any()` on the box itself would hit
/// the blanket impl for `Box<dyn Event>` and never match.
#[inline]
pub fn downcast_event<E: Event>(event: &BoxedEvent) -> Option<&E> {
    (**event).as_any().downcast_ref::<E>()
}
