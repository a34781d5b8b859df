//! Status waits: race one native event against a deadline.

use std::sync::{Arc, Weak};

use bridge_traits::BridgeError;
use core_async::sync::oneshot;
use core_async::time::{self, Duration};
use parking_lot::Mutex;
use tracing::debug;

use crate::context::BridgeContext;
use crate::handle::Handle;
use crate::listeners::{Listener, ListenerEvent};

/// Waits for the first `event_type` event on `handle` accepted by
/// `predicate`.
///
/// A temporary listener is registered through the context and removed when
/// the wait ends, whether by event, timeout, destruction of the handle or
/// the future being dropped.
///
/// # Errors
///
/// - `Timeout` when `deadline` passes first
/// - `Destroyed` when the handle is destroyed before or during the wait
pub async fn wait_for_event<P>(
    ctx: &BridgeContext,
    handle: &Arc<Handle>,
    event_type: &str,
    deadline: Duration,
    predicate: P,
) -> Result<ListenerEvent, BridgeError>
where
    P: Fn(&ListenerEvent) -> bool + Send + Sync + 'static,
{
    let (sender, receiver) = oneshot::channel();
    let slot = Mutex::new(Some(sender));
    let temporary: Listener = Arc::new(move |event: ListenerEvent| {
        if !predicate(&event) {
            return;
        }
        let sender = slot.lock().take();
        if let Some(sender) = sender {
            let _ = sender.send(event);
        }
    });

    ctx.add_listener(handle, event_type, &temporary)?;

    // Only the bindings keep the listener alive from here on, so releasing
    // them on destroy drops the sender and wakes the receiver.
    let _guard = TemporaryListener {
        ctx,
        handle,
        event_type,
        listener: Arc::downgrade(&temporary),
    };
    drop(temporary);

    match time::timeout(deadline, receiver).await {
        Ok(Ok(event)) => Ok(event),
        Ok(Err(_)) => Err(BridgeError::destroyed(format!(
            "{} {} while waiting for '{event_type}'",
            handle.kind(),
            handle.id()
        ))),
        Err(_) => Err(BridgeError::Timeout(format!(
            "'{event_type}' was not received from {} within {}ms",
            handle.id(),
            deadline.as_millis()
        ))),
    }
}

struct TemporaryListener<'a> {
    ctx: &'a BridgeContext,
    handle: &'a Arc<Handle>,
    event_type: &'a str,
    listener: Weak<dyn Fn(ListenerEvent) + Send + Sync>,
}

impl Drop for TemporaryListener<'_> {
    fn drop(&mut self) {
        let Some(listener) = self.listener.upgrade() else {
            return;
        };
        if let Err(error) = self.ctx.remove_listener(self.handle, self.event_type, &listener) {
            debug!(
                handle_id = %self.handle.id(),
                event_type = self.event_type,
                error = %error,
                "Temporary listener already gone"
            );
        }
    }
}
