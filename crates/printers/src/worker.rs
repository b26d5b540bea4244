//! Printer worker thread.
//!
//! All USB work for both peripheral classes runs on this one thread: it
//! pumps the host event loop (hot-plug notifications only fire from there)
//! and executes print commands arriving over the channel bridge. Running
//! every job on the same thread also serializes device access, so two jobs
//! can never race for the same printer's claim.

use crate::channel::StationCommand;
use crate::driver::PrinterDriver;
use crate::supported::PeripheralClass;
use hostusb::HostBus;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How long one pump of the host event loop may block.
const EVENT_TIMEOUT: Duration = Duration::from_millis(100);

pub struct StationWorker<B: HostBus> {
    bus: B,
    label: PrinterDriver<B::Device>,
    receipt: PrinterDriver<B::Device>,
    commands: async_channel::Receiver<StationCommand>,
}

impl<B: HostBus> StationWorker<B> {
    pub fn new(
        bus: B,
        label: PrinterDriver<B::Device>,
        receipt: PrinterDriver<B::Device>,
        commands: async_channel::Receiver<StationCommand>,
    ) -> Self {
        Self {
            bus,
            label,
            receipt,
            commands,
        }
    }

    /// Wire hot-plug notifications into both registries and run the one-time
    /// enumeration pass.
    fn initialize(&mut self) {
        let label_registry = self.label.registry();
        let receipt_registry = self.receipt.registry();

        let subscribed = self.bus.subscribe_hotplug(Box::new(move |event| {
            label_registry.handle_event(&event);
            receipt_registry.handle_event(&event);
        }));
        if let Err(e) = subscribed {
            warn!("Hot-plug subscription failed: {}", e);
        }

        if let Err(e) = self.label.initialize(&mut self.bus) {
            warn!("Label printer enumeration failed: {}", e);
        }
        if let Err(e) = self.receipt.initialize(&mut self.bus) {
            warn!("Receipt printer enumeration failed: {}", e);
        }
    }

    /// Run the worker loop until shutdown.
    ///
    /// Each iteration drains one pending command, then pumps the host event
    /// loop so hot-plug notifications keep flowing between jobs.
    pub fn run(mut self) {
        info!("Printer worker started");
        self.initialize();

        loop {
            match self.commands.try_recv() {
                Ok(StationCommand::Shutdown) => {
                    info!("Printer worker shutting down");
                    break;
                }
                Ok(cmd) => self.handle_command(cmd),
                Err(async_channel::TryRecvError::Empty) => {}
                Err(async_channel::TryRecvError::Closed) => {
                    debug!("Command channel closed, printer worker exiting");
                    break;
                }
            }

            if let Err(e) = self.bus.pump_events(EVENT_TIMEOUT) {
                warn!("Error pumping host events: {}", e);
                // Transient event-loop errors should not kill the worker.
                std::thread::sleep(EVENT_TIMEOUT);
            }
        }

        info!("Printer worker stopped");
    }

    fn handle_command(&mut self, cmd: StationCommand) {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.handle_command_inner(cmd)
        }));

        if let Err(e) = result {
            error!("Panic in printer command handler: {:?}", e);
        }
    }

    fn handle_command_inner(&mut self, cmd: StationCommand) {
        match cmd {
            StationCommand::Print {
                class,
                payload,
                response,
            } => {
                debug!("Print job for {} ({} bytes)", class, payload.len());

                let result = match class {
                    PeripheralClass::LabelPrinter => self.label.print(&mut self.bus, &payload),
                    PeripheralClass::ReceiptPrinter => self.receipt.print(&mut self.bus, &payload),
                };

                // The caller may have given up waiting; that is not an error.
                let _ = response.send(result);
            }

            StationCommand::Shutdown => {
                // Handled in the main loop
                unreachable!()
            }
        }
    }
}
