// src/events/bus.rs

//! In-process publish/subscribe keyed by event name.
//!
//! Publishing is synchronous: every listener registered for the event's name
//! at the moment `publish` is called runs, in registration order, before
//! `publish` returns. Listeners are snapshotted first, so listeners added or
//! removed by a callback only affect later publishes. Callbacks run outside
//! the registry lock and may publish or (un)subscribe themselves.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tracing::trace;

use super::{DispatcherEvent, Event};

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

type Callback = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Default)]
struct BusInner {
    next_id: u64,
    listeners: HashMap<String, Vec<(ListenerId, Callback)>>,
}

impl BusInner {
    fn allocate(&mut self) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        id
    }

    fn push(&mut self, name: &str, id: ListenerId, callback: Callback) {
        self.listeners
            .entry(name.to_string())
            .or_default()
            .push((id, callback));
    }

    fn remove(&mut self, name: &str, id: ListenerId) {
        if let Some(list) = self.listeners.get_mut(name) {
            list.retain(|(lid, _)| *lid != id);
            if list.is_empty() {
                self.listeners.remove(name);
            }
        }
    }
}

fn lock(inner: &Mutex<BusInner>) -> MutexGuard<'_, BusInner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Cloneable handle to a shared listener registry.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = lock(&self.inner);
        let counts: HashMap<&str, usize> = inner
            .listeners
            .iter()
            .map(|(name, list)| (name.as_str(), list.len()))
            .collect();
        f.debug_struct("EventBus").field("listeners", &counts).finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, name: impl AsRef<str>, callback: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let mut inner = lock(&self.inner);
        let id = inner.allocate();
        inner.push(name.as_ref(), id, Arc::new(callback));
        id
    }

    /// Subscribe a callback that fires for the first event matching `filter`
    /// and then removes itself.
    pub fn subscribe_once<P, F>(&self, name: impl AsRef<str>, filter: P, callback: F) -> ListenerId
    where
        P: Fn(&Event) -> bool + Send + Sync + 'static,
        F: FnOnce(&Event) + Send + 'static,
    {
        let name = name.as_ref().to_string();
        let weak: Weak<Mutex<BusInner>> = Arc::downgrade(&self.inner);
        let slot = Mutex::new(Some(callback));

        let mut inner = lock(&self.inner);
        let id = inner.allocate();
        let own_name = name.clone();
        let wrapper = move |event: &Event| {
            if !filter(event) {
                return;
            }
            let taken = slot
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .take();
            let Some(callback) = taken else {
                return;
            };
            if let Some(inner) = weak.upgrade() {
                lock(&inner).remove(&own_name, id);
            }
            callback(event);
        };
        inner.push(&name, id, Arc::new(wrapper));
        id
    }

    /// Remove one listener, or every listener of `name` when `id` is `None`.
    pub fn unsubscribe(&self, name: impl AsRef<str>, id: Option<ListenerId>) {
        let mut inner = lock(&self.inner);
        match id {
            Some(id) => inner.remove(name.as_ref(), id),
            None => {
                inner.listeners.remove(name.as_ref());
            }
        }
    }

    pub fn publish(&self, event: &Event) {
        let snapshot: Vec<Callback> = {
            let inner = lock(&self.inner);
            match inner.listeners.get(event.name()) {
                Some(list) => list.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
                None => Vec::new(),
            }
        };

        trace!(
            event = %event.name(),
            chain = %event.id(),
            listeners = snapshot.len(),
            "publishing event"
        );

        for callback in snapshot {
            callback(event);
        }
    }

    pub fn has_subscribers(&self, name: impl AsRef<str>) -> bool {
        lock(&self.inner)
            .listeners
            .get(name.as_ref())
            .is_some_and(|list| !list.is_empty())
    }

    /// Wait for the next event called `name` belonging to chain `id`.
    ///
    /// The listener is registered immediately, so events published after
    /// this call returns are never missed even if the waiter is polled later.
    pub fn wait_for(&self, name: impl AsRef<str>, id: impl Into<String>) -> EventWaiter {
        let (tx, rx) = oneshot::channel();
        let id = id.into();
        let name = name.as_ref().to_string();
        let listener = self.subscribe_once(
            &name,
            move |event| event.id() == id,
            move |event| {
                let _ = tx.send(event.clone());
            },
        );
        EventWaiter {
            bus: self.clone(),
            name,
            listener,
            rx,
        }
    }

    /// Shorthand for waiting on `taskChainFinished` for chain `id`.
    pub fn wait_for_chain(&self, id: impl Into<String>) -> EventWaiter {
        self.wait_for(DispatcherEvent::TaskChainFinished.as_str(), id)
    }
}

/// Future resolving to the first matching event.
///
/// Resolves to `None` if the bus drops the listener without firing it
/// (e.g. an `unsubscribe(name, None)` sweep). Dropping the waiter removes
/// its listener.
#[derive(Debug)]
pub struct EventWaiter {
    bus: EventBus,
    name: String,
    listener: ListenerId,
    rx: oneshot::Receiver<Event>,
}

impl Future for EventWaiter {
    type Output = Option<Event>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|res| res.ok())
    }
}

impl Drop for EventWaiter {
    fn drop(&mut self) {
        self.bus.unsubscribe(&self.name, Some(self.listener));
    }
}
