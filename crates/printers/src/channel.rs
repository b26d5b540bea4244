//! Async channel bridge between the facade and the printer worker thread.

use crate::error::PrintError;
use crate::status::{SharedStatus, StatusSink};
use crate::supported::PeripheralClass;
use tracing::debug;

/// Commands from the async facade to the printer worker thread.
#[derive(Debug)]
pub enum StationCommand {
    /// Run one print job against a peripheral class.
    Print {
        class: PeripheralClass,
        payload: Vec<u8>,
        /// Channel to send the job outcome back
        response: tokio::sync::oneshot::Sender<Result<(), PrintError>>,
    },

    /// Stop the worker thread gracefully.
    Shutdown,
}

/// Updates pushed to whoever binds the status display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StationEvent {
    /// A peripheral class's status text changed.
    Status {
        class: PeripheralClass,
        text: String,
    },
}

/// Status sink that keeps the last string readable and forwards every write
/// to the event stream.
pub struct EventStatusSink {
    class: PeripheralClass,
    cell: SharedStatus,
    events: async_channel::Sender<StationEvent>,
}

impl EventStatusSink {
    pub fn new(
        class: PeripheralClass,
        cell: SharedStatus,
        events: async_channel::Sender<StationEvent>,
    ) -> Self {
        Self {
            class,
            cell,
            events,
        }
    }
}

impl StatusSink for EventStatusSink {
    fn set_status(&self, text: &str) {
        self.cell.set_status(text);

        // A full or closed event stream must not stall the driver; the
        // readable cell still holds the latest text.
        if self
            .events
            .try_send(StationEvent::Status {
                class: self.class,
                text: text.to_string(),
            })
            .is_err()
        {
            debug!("{}: status event dropped (no listener)", self.class);
        }
    }
}
