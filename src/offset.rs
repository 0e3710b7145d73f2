//! Deferred byte-offset cells.
//!
//! Byte offsets are unknown until a file has been rendered once to
//! measure positions. Every token that carries an offset holds a shared
//! `OffsetCell`; the first render pass measures and patches the cells,
//! the second pass emits final bytes. No seekable output is required.
//!
//! A cell either holds a concrete value or forwards to another cell.
//! Forwarding is how post-parse repair aliases a cross-reference
//! entry's offset onto the offset of the parsed object it describes:
//! after aliasing, updates through either handle stay consistent.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

type Subscriber = Box<dyn FnMut(u64)>;

struct Inner {
    value: u64,
    forward: Option<OffsetCell>,
    subscribers: Vec<Subscriber>,
}

/// A shared, mutable holder for a single byte offset.
///
/// Clones are cheap and observe the same value. Equality compares
/// resolved values, following forwarding chains on both sides.
#[derive(Clone)]
pub struct OffsetCell {
    inner: Rc<RefCell<Inner>>,
}

impl OffsetCell {
    /// Create a cell holding `value`.
    pub fn new(value: u64) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                value,
                forward: None,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Resolve the current value, following forwarding links.
    pub fn get(&self) -> u64 {
        let inner = self.inner.borrow();
        match &inner.forward {
            Some(target) => target.get(),
            None => inner.value,
        }
    }

    /// Store a new value and notify subscribers.
    ///
    /// If this cell forwards to another, the value is written through
    /// to the forwarding target.
    pub fn set(&self, value: u64) {
        let target = self.inner.borrow().forward.clone();
        if let Some(target) = target {
            target.set(value);
            return;
        }
        // Subscribers run outside the borrow so a callback may read the
        // cell again without panicking.
        self.inner.borrow_mut().value = value;
        let mut subscribers = std::mem::take(&mut self.inner.borrow_mut().subscribers);
        for callback in subscribers.iter_mut() {
            callback(value);
        }
        self.inner.borrow_mut().subscribers.extend(subscribers);
    }

    /// Alias this cell onto `target`: reads and writes go through to
    /// the target from now on. Subscribers of this cell are notified of
    /// the target's current value.
    pub fn forward_to(&self, target: &OffsetCell) {
        if Rc::ptr_eq(&self.inner, &target.inner) {
            return;
        }
        let value = target.get();
        self.inner.borrow_mut().forward = Some(target.clone());
        let mut subscribers = std::mem::take(&mut self.inner.borrow_mut().subscribers);
        for callback in subscribers.iter_mut() {
            callback(value);
        }
        self.inner.borrow_mut().subscribers.extend(subscribers);
    }

    /// Register a callback fired on every subsequent `set`.
    pub fn subscribe(&self, callback: impl FnMut(u64) + 'static) {
        self.inner.borrow_mut().subscribers.push(Box::new(callback));
    }

    /// Whether two handles share the same backing cell (directly, not
    /// through forwarding).
    pub fn same_cell(&self, other: &OffsetCell) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for OffsetCell {
    fn default() -> Self {
        Self::new(0)
    }
}

impl PartialEq for OffsetCell {
    fn eq(&self, other: &Self) -> bool {
        self.get() == other.get()
    }
}

impl Eq for OffsetCell {}

impl PartialEq<u64> for OffsetCell {
    fn eq(&self, other: &u64) -> bool {
        self.get() == *other
    }
}

impl fmt::Debug for OffsetCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OffsetCell").field(&self.get()).finish()
    }
}
