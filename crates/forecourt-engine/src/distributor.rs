//! # Event Distributor
//!
//! Fans out every model mutation as a typed event to zero or more
//! subscribers.
//!
//! ## Delivery Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Event Distributor Contract                           │
//! │                                                                         │
//! │  Engine ──publish──► broadcast channel ──┬──► subscriber A             │
//! │                                          ├──► subscriber B             │
//! │                                          └──► (zero subscribers OK)    │
//! │                                                                         │
//! │  • Best-effort, at-most-once, NO replay                                │
//! │  • Ordered per source (events for the same pump arrive in the          │
//! │    order they were produced)                                           │
//! │  • A disconnected or lagging subscriber misses events and must         │
//! │    catch up from the next snapshot pull                                │
//! │  • A slow subscriber never blocks the engine or other subscribers      │
//! │  • The distributor NEVER mutates the model                             │
//! │                                                                         │
//! │  The synchronous snapshot read lives on EngineHandle::snapshot();      │
//! │  the distributor only carries the push edge.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tokio::sync::broadcast;
use tracing::trace;

use forecourt_core::ForecourtEvent;

/// Best-effort fan-out of forecourt events.
///
/// Cheap to clone; all clones publish into the same channel.
#[derive(Debug, Clone)]
pub struct EventDistributor {
    tx: broadcast::Sender<ForecourtEvent>,
}

impl EventDistributor {
    /// Creates a distributor whose per-subscriber buffer holds `capacity`
    /// events. A subscriber that falls more than `capacity` events behind
    /// starts losing the oldest ones (and relies on the next pull).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        EventDistributor { tx }
    }

    /// Publishes an event to all current subscribers.
    ///
    /// Publishing with zero subscribers is not an error; the event is
    /// simply dropped, per the no-replay contract.
    pub fn publish(&self, event: ForecourtEvent) {
        trace!(event = event.type_name(), "Publishing forecourt event");
        let _ = self.tx.send(event);
    }

    /// Registers a new subscriber. Only events published after this call
    /// are delivered.
    pub fn subscribe(&self) -> broadcast::Receiver<ForecourtEvent> {
        self.tx.subscribe()
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventDistributor {
    fn default() -> Self {
        EventDistributor::new(256)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
