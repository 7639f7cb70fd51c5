use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Slots<T> {
    next_id: u64,
    listeners: Vec<(u64, Listener<T>)>,
}

/// Ordered set of listeners for one kind of broker output.
///
/// Dispatch works on a snapshot taken under the lock and calls listeners
/// after releasing it, so a listener may subscribe or dispose while being
/// called. Listeners subscribed during a dispatch see the next item first.
pub struct ListenerRegistry<T> {
    slots: Arc<Mutex<Slots<T>>>,
}

impl<T> Clone for ListenerRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
        }
    }
}

impl<T> Default for ListenerRegistry<T> {
    fn default() -> Self {
        Self {
            slots: Arc::new(Mutex::new(Slots {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }
}

fn lock<T>(slots: &Mutex<Slots<T>>) -> MutexGuard<'_, Slots<T>> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: 'static> ListenerRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener after all existing ones
    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let id = {
            let mut slots = lock(&self.slots);
            let id = slots.next_id;
            slots.next_id += 1;
            slots.listeners.push((id, Arc::new(listener)));
            id
        };

        let registry: Weak<Mutex<Slots<T>>> = Arc::downgrade(&self.slots);
        Subscription::new(move || {
            if let Some(slots) = registry.upgrade() {
                lock(&slots).listeners.retain(|(slot_id, _)| *slot_id != id);
            }
        })
    }

    /// Call every listener with `item` in subscription order
    pub fn emit(&self, item: &T) {
        let snapshot: Vec<Listener<T>> = lock(&self.slots)
            .listeners
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in snapshot {
            listener(item);
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.slots).listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle that removes a listener again.
///
/// Dropping the handle disposes it; call [`Subscription::detach`] to keep the
/// listener for the lifetime of the registry.
#[must_use = "dropping a Subscription removes its listener"]
pub struct Subscription {
    disposer: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(disposer: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            disposer: Some(Box::new(disposer)),
        }
    }

    /// Remove the listener now
    pub fn dispose(mut self) {
        if let Some(disposer) = self.disposer.take() {
            disposer();
        }
    }

    /// Keep the listener registered and drop the handle
    pub fn detach(mut self) {
        self.disposer = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(disposer) = self.disposer.take() {
            disposer();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.disposer.is_some())
            .finish()
    }
}
