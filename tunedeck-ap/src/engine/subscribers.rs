//! Observer registries with per-callback fault isolation
//!
//! Delivery iterates a snapshot taken outside the lock, so a callback may
//! subscribe or unsubscribe while being notified. A panicking callback is
//! caught and logged; the remaining callbacks still run, in registration order.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, Weak};
use tracing::warn;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Entries<T: ?Sized> {
    next_id: u64,
    list: Vec<(u64, Callback<T>)>,
}

/// Ordered set of callbacks receiving `&T`
pub struct SubscriberSet<T: ?Sized> {
    name: &'static str,
    entries: Arc<Mutex<Entries<T>>>,
}

impl<T: ?Sized + 'static> SubscriberSet<T> {
    /// `name` identifies the set in fault logs
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Arc::new(Mutex::new(Entries {
                next_id: 0,
                list: Vec::new(),
            })),
        }
    }

    /// Register a callback; it stays registered until unsubscribed or cleared
    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        self.insert(Arc::new(callback))
    }

    /// Register a callback and deliver `initial` to it alone
    pub fn subscribe_with(
        &self,
        callback: impl Fn(&T) + Send + Sync + 'static,
        initial: &T,
    ) -> Subscription {
        let callback: Callback<T> = Arc::new(callback);
        let subscription = self.insert(Arc::clone(&callback));
        deliver(self.name, &*callback, initial);
        subscription
    }

    fn insert(&self, callback: Callback<T>) -> Subscription {
        let id = match self.entries.lock() {
            Ok(mut entries) => {
                let id = entries.next_id;
                entries.next_id += 1;
                entries.list.push((id, callback));
                id
            }
            Err(_) => return Subscription::inert(),
        };

        let weak: Weak<Mutex<Entries<T>>> = Arc::downgrade(&self.entries);
        Subscription::new(move || {
            if let Some(entries) = weak.upgrade() {
                if let Ok(mut entries) = entries.lock() {
                    entries.list.retain(|(entry_id, _)| *entry_id != id);
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.list.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.list.clear();
        }
    }

    /// Deliver `value` to every callback; returns how many completed normally
    pub fn notify(&self, value: &T) -> usize {
        let snapshot: Vec<Callback<T>> = match self.entries.lock() {
            Ok(entries) => entries.list.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
            Err(_) => return 0,
        };

        let mut delivered = 0;
        for callback in &snapshot {
            if deliver(self.name, &**callback, value) {
                delivered += 1;
            }
        }
        delivered
    }
}

/// Invoke one callback, containing a panic
fn deliver<T: ?Sized>(name: &str, callback: &(dyn Fn(&T) + Send + Sync), value: &T) -> bool {
    match catch_unwind(AssertUnwindSafe(|| callback(value))) {
        Ok(()) => true,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!("{} subscriber panicked: {}", name, message);
            false
        }
    }
}

/// Handle returned by `subscribe`; call [`Subscription::unsubscribe`] to stop
/// receiving. Dropping the handle keeps the callback registered.
#[must_use = "dropping a Subscription keeps the callback registered forever"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub(crate) fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Subscription that does nothing (e.g. registered on a disposed engine)
    pub(crate) fn inert() -> Self {
        Self { cancel: None }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
