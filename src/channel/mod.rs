//! Update channel - pushing widget values back to the host.
//!
//! Each mounted widget instance gets one [`UpdateChannel`]. Pushing a value
//! either notifies the host synchronously (immediate) or parks the value
//! until the next scheduling tick (deferred). Deferred pushes coalesce per
//! instance, last value wins; the host's own coalescing does the rest.
//!
//! Everything is single-threaded, matching the cooperative model of the
//! host platform: [`flush_deferred`] is the one explicit tick.

use std::cell::RefCell;
use std::rc::Rc;

// =============================================================================
// Priority
// =============================================================================

/// When pushed values reach the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdatePriority {
    /// Notify synchronously, before `push` returns.
    #[default]
    Immediate,
    /// Park until the next scheduling tick, coalescing last-value-wins.
    Deferred,
}

impl UpdatePriority {
    /// The deferred flag as passed to [`UpdateChannel::push`].
    pub fn is_deferred(self) -> bool {
        self == UpdatePriority::Deferred
    }
}

// =============================================================================
// Deferred Scheduler
// =============================================================================

thread_local! {
    /// Pending deferred notifications, at most one per channel instance.
    static PENDING: RefCell<Vec<(usize, Box<dyn FnOnce()>)>> = RefCell::new(Vec::new());

    /// Channel instance counter, used only as the coalescing key.
    static NEXT_INSTANCE: RefCell<usize> = const { RefCell::new(0) };
}

fn next_instance() -> usize {
    NEXT_INSTANCE.with(|next| {
        let mut next = next.borrow_mut();
        let instance = *next;
        *next += 1;
        instance
    })
}

fn schedule(instance: usize, notify: Box<dyn FnOnce()>) {
    PENDING.with(|pending| {
        let mut pending = pending.borrow_mut();
        // Coalesce: a newer value replaces the parked one for this instance
        pending.retain(|(parked, _)| *parked != instance);
        pending.push((instance, notify));
    });
}

/// Deliver all parked deferred notifications.
///
/// Notifications scheduled while flushing run on the next flush, not this
/// one, so a notify callback that defers again cannot spin the tick.
pub fn flush_deferred() {
    let parked = PENDING.with(|pending| pending.borrow_mut().split_off(0));
    for (_, notify) in parked {
        notify();
    }
}

/// Number of parked deferred notifications (for testing and host loops).
pub fn pending_deferred() -> usize {
    PENDING.with(|pending| pending.borrow().len())
}

/// Drop all parked notifications without delivering them (for testing).
pub fn reset_channel_state() {
    PENDING.with(|pending| pending.borrow_mut().clear());
}

// =============================================================================
// Update Channel
// =============================================================================

/// Value-push handle bound to one widget instance.
pub struct UpdateChannel<T: 'static> {
    instance: usize,
    notify: Rc<dyn Fn(T)>,
}

impl<T: 'static> Clone for UpdateChannel<T> {
    fn clone(&self) -> Self {
        Self {
            instance: self.instance,
            notify: self.notify.clone(),
        }
    }
}

impl<T: Clone + 'static> UpdateChannel<T> {
    /// Create a channel delivering into `notify`.
    pub fn new(notify: Rc<dyn Fn(T)>) -> Self {
        Self {
            instance: next_instance(),
            notify,
        }
    }

    /// Push a new widget value to the host.
    ///
    /// Immediate pushes deliver before this call returns. Deferred pushes
    /// park until [`flush_deferred`]; only the last deferred value per
    /// channel is delivered.
    pub fn push(&self, value: T, deferred: bool) {
        if deferred {
            let notify = self.notify.clone();
            schedule(self.instance, Box::new(move || notify(value)));
        } else {
            (self.notify)(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recording_channel<T: Clone + 'static>() -> (UpdateChannel<T>, Rc<RefCell<Vec<T>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let channel = UpdateChannel::new(Rc::new(move |v| sink.borrow_mut().push(v)));
        (channel, seen)
    }

    #[test]
    fn test_immediate_push_is_synchronous() {
        reset_channel_state();
        let (channel, seen) = recording_channel();

        channel.push(5, false);
        assert_eq!(*seen.borrow(), vec![5]);
        assert_eq!(pending_deferred(), 0);
    }

    #[test]
    fn test_deferred_push_waits_for_tick() {
        reset_channel_state();
        let (channel, seen) = recording_channel();

        channel.push(5, true);
        assert!(seen.borrow().is_empty());
        assert_eq!(pending_deferred(), 1);

        flush_deferred();
        assert_eq!(*seen.borrow(), vec![5]);
        assert_eq!(pending_deferred(), 0);
    }

    #[test]
    fn test_deferred_pushes_coalesce_last_wins() {
        reset_channel_state();
        let (channel, seen) = recording_channel();

        channel.push(1, true);
        channel.push(2, true);
        channel.push(3, true);
        assert_eq!(pending_deferred(), 1);

        flush_deferred();
        assert_eq!(*seen.borrow(), vec![3]);
    }

    #[test]
    fn test_channels_do_not_coalesce_across_instances() {
        reset_channel_state();
        let (first, seen_first) = recording_channel();
        let (second, seen_second) = recording_channel();

        first.push("a", true);
        second.push("b", true);
        assert_eq!(pending_deferred(), 2);

        flush_deferred();
        assert_eq!(*seen_first.borrow(), vec!["a"]);
        assert_eq!(*seen_second.borrow(), vec!["b"]);
    }

    #[test]
    fn test_deferring_inside_flush_parks_for_next_tick() {
        reset_channel_state();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = seen.clone();
        let inner: Rc<RefCell<Option<UpdateChannel<i32>>>> = Rc::new(RefCell::new(None));
        let inner_ref = inner.clone();
        let channel = UpdateChannel::new(Rc::new(move |v: i32| {
            sink.borrow_mut().push(v);
            if v == 1 {
                if let Some(chained) = inner_ref.borrow().as_ref() {
                    chained.push(2, true);
                }
            }
        }));
        *inner.borrow_mut() = Some(channel.clone());

        channel.push(1, true);
        flush_deferred();
        assert_eq!(*seen.borrow(), vec![1]);
        assert_eq!(pending_deferred(), 1);

        flush_deferred();
        assert_eq!(*seen.borrow(), vec![1, 2]);
    }
}
