//! Observer registry with generation-tagged slots.

use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::RwLock;
use std::sync::Arc;

use super::types::{EventReceiver, SubscriptionId};

/// Callback observer.
pub type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

enum Observer<E> {
    Callback(Callback<E>),
    Channel(Sender<E>),
}

impl<E> Clone for Observer<E> {
    fn clone(&self) -> Self {
        match self {
            Observer::Callback(f) => Observer::Callback(Arc::clone(f)),
            Observer::Channel(tx) => Observer::Channel(tx.clone()),
        }
    }
}

struct Slot<E> {
    generation: u32,
    observer: Option<Observer<E>>,
}

struct Slots<E> {
    slots: Vec<Slot<E>>,
    free: Vec<u32>,
    live: usize,
}

/// Registry of event observers.
///
/// `notify` delivers to a copy of the observer list taken under the lock,
/// so callbacks may subscribe or unsubscribe (themselves included) while
/// an event is being delivered.
pub struct ObserverRegistry<E> {
    inner: RwLock<Slots<E>>,
}

impl<E: Clone + Send + 'static> ObserverRegistry<E> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Slots {
                slots: Vec::new(),
                free: Vec::new(),
                live: 0,
            }),
        }
    }

    /// Register a callback observer.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.insert(Observer::Callback(Arc::new(callback)))
    }

    /// Register a bounded channel observer.
    ///
    /// A receiver that falls `buffer_size` events behind, or is dropped,
    /// is unsubscribed on the next delivery.
    pub fn subscribe_channel(&self, buffer_size: usize) -> EventReceiver<E> {
        let (sender, receiver) = bounded(buffer_size.max(1));
        let id = self.insert(Observer::Channel(sender));
        EventReceiver { id, receiver }
    }

    /// Remove an observer. Returns false for unknown or stale ids.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.write();
        let Some(slot) = inner.slots.get_mut(id.slot as usize) else {
            return false;
        };
        if slot.generation != id.generation || slot.observer.is_none() {
            return false;
        }
        slot.observer = None;
        slot.generation = slot.generation.wrapping_add(1);
        inner.free.push(id.slot);
        inner.live -= 1;
        true
    }

    /// Number of live observers.
    pub fn len(&self) -> usize {
        self.inner.read().live
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every observer.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        let Slots { slots, free, live } = &mut *inner;
        for (index, slot) in slots.iter_mut().enumerate() {
            if slot.observer.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                free.push(index as u32);
            }
        }
        *live = 0;
    }

    /// Deliver an event to every observer registered at call time.
    pub fn notify(&self, event: &E) {
        let observers: Vec<(SubscriptionId, Observer<E>)> = {
            let inner = self.inner.read();
            inner
                .slots
                .iter()
                .enumerate()
                .filter_map(|(index, slot)| {
                    slot.observer.as_ref().map(|observer| {
                        (
                            SubscriptionId {
                                slot: index as u32,
                                generation: slot.generation,
                            },
                            observer.clone(),
                        )
                    })
                })
                .collect()
        };

        let mut dropped = Vec::new();
        for (id, observer) in observers {
            match observer {
                Observer::Callback(callback) => (*callback)(event),
                Observer::Channel(sender) => match sender.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                        dropped.push(id)
                    }
                },
            }
        }

        for id in dropped {
            if self.unsubscribe(id) {
                tracing::warn!(?id, "dropping slow or disconnected event receiver");
            }
        }
    }

    fn insert(&self, observer: Observer<E>) -> SubscriptionId {
        let mut inner = self.inner.write();
        inner.live += 1;
        if let Some(index) = inner.free.pop() {
            let slot = &mut inner.slots[index as usize];
            slot.observer = Some(observer);
            SubscriptionId {
                slot: index,
                generation: slot.generation,
            }
        } else {
            let index = inner.slots.len() as u32;
            inner.slots.push(Slot {
                generation: 0,
                observer: Some(observer),
            });
            SubscriptionId {
                slot: index,
                generation: 0,
            }
        }
    }
}

impl<E: Clone + Send + 'static> Default for ObserverRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}
