//! Channel listeners and the slots that hold them.
//!
//! Every endpoint owns one [`ListenerSlot`] per event kind. A slot holds at
//! most one listener and is swapped atomically, so replacing a listener
//! never races with a dispatch that already took its snapshot.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::error::{Error, ErrorKind, Result};
use crate::io::CloseableChannel;

/// A callback invoked with the channel that raised the event.
pub struct ChannelListener<C> {
    handler: Box<dyn Fn(&C) + Send + Sync>,
}

impl<C> ChannelListener<C> {
    /// Wraps `handler` into a shareable listener.
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&C) + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
        })
    }

    /// Runs the listener on the calling thread.
    pub fn handle_event(&self, channel: &C) {
        (self.handler)(channel)
    }
}

pub(crate) struct ListenerSlot<C> {
    current: ArcSwapOption<ChannelListener<C>>,
}

impl<C> ListenerSlot<C> {
    pub(crate) fn new() -> Self {
        Self {
            current: ArcSwapOption::empty(),
        }
    }

    /// Snapshot of the listener for one dispatch.
    pub(crate) fn load(&self) -> Option<Arc<ChannelListener<C>>> {
        self.current.load_full()
    }

    pub(crate) fn store(&self, listener: Option<Arc<ChannelListener<C>>>) {
        self.current.store(listener);
    }

    pub(crate) fn take(&self) -> Option<Arc<ChannelListener<C>>> {
        self.current.swap(None)
    }
}

/// The read, write and close slots of one endpoint.
pub(crate) struct Listeners<C> {
    pub(crate) read: ListenerSlot<C>,
    pub(crate) write: ListenerSlot<C>,
    pub(crate) close: ListenerSlot<C>,
}

impl<C> Listeners<C> {
    pub(crate) fn new() -> Self {
        Self {
            read: ListenerSlot::new(),
            write: ListenerSlot::new(),
            close: ListenerSlot::new(),
        }
    }
}

/// Write access to one listener slot.
///
/// Setting a listener only replaces it. Nothing is invoked and interest
/// is left untouched; the new listener is seen by the next dispatch.
pub struct Setter<'a, C> {
    slot: &'a ListenerSlot<C>,
}

impl<'a, C> Setter<'a, C> {
    pub(crate) fn new(slot: &'a ListenerSlot<C>) -> Self {
        Self { slot }
    }

    /// Installs `handler`, replacing the current listener.
    pub fn set<F>(&self, handler: F)
    where
        F: Fn(&C) + Send + Sync + 'static,
    {
        self.slot.store(Some(ChannelListener::new(handler)));
    }

    /// Installs an existing listener, or clears the slot with `None`.
    pub fn set_listener(&self, listener: Option<Arc<ChannelListener<C>>>) {
        self.slot.store(listener);
    }

    /// Removes the current listener.
    pub fn clear(&self) {
        self.slot.store(None);
    }

    /// Returns the current listener.
    pub fn get(&self) -> Option<Arc<ChannelListener<C>>> {
        self.slot.load()
    }
}

/// Runs `f`, turning a panic into a [`ErrorKind::ListenerPanic`] error.
pub(crate) fn guarded<F: FnOnce()>(f: F) -> Result<()> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .map_err(|payload| Error::with_context(ErrorKind::ListenerPanic, panic_message(&*payload)))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Invokes `listener` on the calling thread, logging instead of unwinding.
///
/// Returns `false` if the listener panicked. A missing listener counts as
/// a successful invocation.
pub fn invoke_channel_listener<C>(channel: &C, listener: Option<&Arc<ChannelListener<C>>>) -> bool {
    let Some(listener) = listener else {
        return true;
    };
    match guarded(|| listener.handle_event(channel)) {
        Ok(()) => true,
        Err(err) => {
            log::error!("Listener invocation failed: {}", err);
            false
        }
    }
}

/// Closes `channel`, logging instead of returning any failure.
pub fn safe_close<C: CloseableChannel>(channel: &C) {
    if let Err(err) = channel.close() {
        log::trace!("Closing channel {} failed: {}", channel.id(), err);
    }
}

/// A listener that safely closes whatever channel it is invoked with.
pub fn closing_channel_listener<C: CloseableChannel>() -> Arc<ChannelListener<C>> {
    ChannelListener::new(|channel: &C| safe_close(channel))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_setter_replaces_previous_listener() {
        let slot: ListenerSlot<u32> = ListenerSlot::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let setter = Setter::new(&slot);
        setter.set(|_: &u32| panic!("replaced listener must not run"));
        let counter = hits.clone();
        setter.set(move |value: &u32| {
            counter.fetch_add(*value as usize, Ordering::SeqCst);
        });

        let listener = slot.load().unwrap();
        listener.handle_event(&3);
        assert_eq!(hits.load(Ordering::SeqCst), 3);

        setter.clear();
        assert!(setter.get().is_none());
    }

    #[test]
    fn test_snapshot_survives_replacement() {
        let slot: ListenerSlot<u32> = ListenerSlot::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        Setter::new(&slot).set(move |_: &u32| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let snapshot = slot.load().unwrap();
        Setter::new(&slot).clear();
        snapshot.handle_event(&0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(slot.take().is_none());
    }

    #[test]
    fn test_invoke_catches_panics() {
        let listener = ChannelListener::new(|_: &u32| panic!("listener fault"));
        assert!(!invoke_channel_listener(&1, Some(&listener)));
        assert!(invoke_channel_listener::<u32>(&1, None));
    }

    #[test]
    fn test_guarded_reports_message() {
        let err = guarded(|| panic!("fault {}", 7)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ListenerPanic);
        assert_eq!(err.context(), Some("fault 7"));
    }
}
