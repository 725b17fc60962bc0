use crate::realtime::envelope::Inbound;
use anyhow::Result;
use dashmap::DashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

/// Receiver of decoded inbound frames.
///
/// Invoked on the connection task; implementations must not block.
pub trait Listener: Send + Sync {
    fn on_message(&self, inbound: &Inbound) -> Result<()>;
}

impl<F> Listener for F
where
    F: Fn(&Inbound) -> Result<()> + Send + Sync,
{
    fn on_message(&self, inbound: &Inbound) -> Result<()> {
        self(inbound)
    }
}

/// Identifier handed out on registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Outcome of fanning one frame out to the registered listeners
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

struct Registration {
    id: SubscriberId,
    listener: Arc<dyn Listener>,
}

/// Set of listeners keyed by the identity of their `Arc` allocation.
///
/// Registering the same `Arc` twice is a no-op.
pub struct ListenerRegistry {
    listeners: DashMap<usize, Registration>,
    next_id: AtomicU64,
}

fn identity(listener: &Arc<dyn Listener>) -> usize {
    Arc::as_ptr(listener) as *const () as usize
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            listeners: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a listener. Returns the existing id if already registered.
    pub fn add(&self, listener: Arc<dyn Listener>) -> SubscriberId {
        let entry = self
            .listeners
            .entry(identity(&listener))
            .or_insert_with(|| Registration {
                id: SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed)),
                listener,
            });
        let id = entry.id;
        drop(entry);

        debug!(subscriber = %id, total = self.listeners.len(), "Listener registered");
        id
    }

    /// Deregister a listener. Unknown listeners are ignored.
    pub fn remove(&self, listener: &Arc<dyn Listener>) -> bool {
        let removed = self.listeners.remove(&identity(listener));
        if let Some((_, registration)) = &removed {
            debug!(subscriber = %registration.id, "Listener removed");
        }
        removed.is_some()
    }

    pub fn remove_by_id(&self, id: SubscriberId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|_, registration| registration.id != id);
        self.listeners.len() < before
    }

    pub fn contains(&self, listener: &Arc<dyn Listener>) -> bool {
        self.listeners.contains_key(&identity(listener))
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Deliver `inbound` to every listener registered right now, once each.
    ///
    /// A listener that fails or panics is logged; the others still run.
    pub fn dispatch(&self, inbound: &Inbound) -> DeliveryReport {
        // Snapshot so listeners may (de)register from inside a callback
        let snapshot: Vec<(SubscriberId, Arc<dyn Listener>)> = self
            .listeners
            .iter()
            .map(|entry| (entry.id, Arc::clone(&entry.listener)))
            .collect();

        let mut report = DeliveryReport::default();
        for (id, listener) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener.on_message(inbound))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    error!(subscriber = %id, error = %e, "Listener failed");
                    report.failed += 1;
                }
                Err(panic) => {
                    error!(
                        subscriber = %id,
                        panic = %panic_message(&panic),
                        "Listener panicked"
                    );
                    report.failed += 1;
                }
            }
        }
        report
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic>".to_string()
    }
}
