//! Change observers
//!
//! Observers are stored in a slot map and addressed by [`ObserverId`], so
//! removal never depends on closure identity. Subscribing returns a
//! [`Subscription`] token that removes exactly the observer it was issued for.
//!
//! Notification is synchronous and re-entrant: no borrow of the registry is
//! held while an observer runs, so an observer may subscribe, unsubscribe or
//! trigger further notifications. An observer that re-enters itself is
//! skipped for the nested notification.

use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

new_key_type! {
    /// Stable handle to a registered observer
    pub struct ObserverId;
}

type Callback<T> = Rc<RefCell<dyn FnMut(&T)>>;
type Slots<T> = RefCell<SlotMap<ObserverId, Callback<T>>>;

/// Registry of change callbacks for values of type `T`
pub struct Observers<T> {
    slots: Rc<Slots<T>>,
}

impl<T: 'static> Observers<T> {
    pub fn new() -> Self {
        Self {
            slots: Rc::new(RefCell::new(SlotMap::with_key())),
        }
    }

    /// Register an observer
    ///
    /// The observer stays registered until [`Subscription::unsubscribe`] is
    /// called or the registry is dropped. Dropping the token alone does not
    /// remove it.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: FnMut(&T) + 'static,
    {
        let callback: Callback<T> = Rc::new(RefCell::new(observer));
        let id = self.slots.borrow_mut().insert(callback);
        let slots = Rc::downgrade(&self.slots);

        Subscription {
            id,
            remove: Some(Box::new(move || remove_slot(&slots, id))),
        }
    }

    /// Call every registered observer with `value`
    ///
    /// Observers added during the call are not called; observers removed
    /// during the call are skipped if they have not run yet.
    pub fn notify(&self, value: &T) {
        let callbacks: SmallVec<[(ObserverId, Callback<T>); 4]> = self
            .slots
            .borrow()
            .iter()
            .map(|(id, callback)| (id, callback.clone()))
            .collect();

        for (id, callback) in callbacks {
            if !self.slots.borrow().contains_key(id) {
                continue;
            }
            match callback.try_borrow_mut() {
                Ok(mut observer) => observer(value),
                Err(_) => tracing::trace!("skipping re-entrant observer"),
            }
        }
    }

    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.slots.borrow_mut().clear();
    }
}

impl<T: 'static> Default for Observers<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn remove_slot<T>(slots: &Weak<Slots<T>>, id: ObserverId) {
    if let Some(slots) = slots.upgrade() {
        slots.borrow_mut().remove(id);
    }
}

/// Token returned by [`Observers::subscribe`]
pub struct Subscription {
    id: ObserverId,
    remove: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Remove the observer this token was issued for
    ///
    /// Safe to call after the registry itself has been dropped.
    pub fn unsubscribe(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
