//! Public async facade over the printer worker.
//!
//! Spawning the station is the setup step: it builds one driver per
//! peripheral class, starts the worker thread, and hands back the station
//! handle plus the status event stream. Each print call sends one job to
//! the worker and resolves once that job completed or failed.

use crate::channel::{EventStatusSink, StationCommand, StationEvent};
use crate::config::DriverConfig;
use crate::driver::PrinterDriver;
use crate::error::PrintError;
use crate::status::SharedStatus;
use crate::supported::PeripheralClass;
use crate::worker::StationWorker;
use hostusb::{HostBus, UsbError};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::warn;

/// Handle to a running printer station.
pub struct PrinterStation {
    commands: async_channel::Sender<StationCommand>,
    label_status: SharedStatus,
    receipt_status: SharedStatus,
    worker: Option<JoinHandle<()>>,
}

impl PrinterStation {
    /// Start the station and return the handle plus the status event stream.
    ///
    /// `make_bus` runs on the worker thread, so the bus lives its whole life
    /// there; passing `NativeBus::new` is the production form, and a closure
    /// moving a prepared `MockBus` in is the test form. A bus construction
    /// failure is reported here, before the station is handed out.
    pub fn spawn<B, F>(
        make_bus: F,
        config: &DriverConfig,
    ) -> Result<(Self, async_channel::Receiver<StationEvent>), UsbError>
    where
        B: HostBus,
        F: FnOnce() -> Result<B, UsbError> + Send + 'static,
    {
        let (command_tx, command_rx) = async_channel::bounded(16);
        let (event_tx, event_rx) = async_channel::bounded(64);

        let label_status = SharedStatus::new();
        let receipt_status = SharedStatus::new();

        let label = PrinterDriver::new(
            PeripheralClass::LabelPrinter,
            config.label_allow_list(),
            config.policy,
            Arc::new(EventStatusSink::new(
                PeripheralClass::LabelPrinter,
                label_status.clone(),
                event_tx.clone(),
            )),
        );

        let receipt = PrinterDriver::new(
            PeripheralClass::ReceiptPrinter,
            config.receipt_allow_list(),
            config.policy,
            Arc::new(EventStatusSink::new(
                PeripheralClass::ReceiptPrinter,
                receipt_status.clone(),
                event_tx,
            )),
        );

        let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel::<Result<(), UsbError>>(1);
        let handle = std::thread::Builder::new()
            .name("printer-worker".to_string())
            .spawn(move || {
                let bus = match make_bus() {
                    Ok(bus) => {
                        let _ = ready_tx.send(Ok(()));
                        bus
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                StationWorker::new(bus, label, receipt, command_rx).run()
            })
            .map_err(|e| UsbError::Other(format!("failed to spawn printer worker: {}", e)))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                return Err(UsbError::Other(
                    "printer worker died during startup".to_string(),
                ));
            }
        }

        Ok((
            Self {
                commands: command_tx,
                label_status,
                receipt_status,
                worker: Some(handle),
            },
            event_rx,
        ))
    }

    /// Print one label job. Resolves once the job completed or failed.
    pub async fn print_labels(&self, payload: impl Into<Vec<u8>>) -> Result<(), PrintError> {
        self.print(PeripheralClass::LabelPrinter, payload.into())
            .await
    }

    /// Print one receipt job. Resolves once the job completed or failed.
    pub async fn print_receipt(&self, payload: impl Into<Vec<u8>>) -> Result<(), PrintError> {
        self.print(PeripheralClass::ReceiptPrinter, payload.into())
            .await
    }

    async fn print(&self, class: PeripheralClass, payload: Vec<u8>) -> Result<(), PrintError> {
        let (response, result) = tokio::sync::oneshot::channel();

        self.commands
            .send(StationCommand::Print {
                class,
                payload,
                response,
            })
            .await
            .map_err(|_| worker_stopped())?;

        result.await.map_err(|_| worker_stopped())?
    }

    /// Latest label printer status text; empty before the first update.
    pub fn label_status(&self) -> String {
        self.label_status.get()
    }

    /// Latest receipt printer status text; empty before the first update.
    pub fn receipt_status(&self) -> String {
        self.receipt_status.get()
    }

    /// Stop the worker and wait for it to exit.
    pub async fn shutdown(mut self) {
        let _ = self.commands.send(StationCommand::Shutdown).await;
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("Printer worker panicked during shutdown");
            }
        }
    }
}

impl Drop for PrinterStation {
    fn drop(&mut self) {
        // Closing the command channel lets the worker exit on its own; a
        // station dropped without shutdown() must not leave it running.
        self.commands.close();
    }
}

fn worker_stopped() -> PrintError {
    PrintError::DeviceUnavailable(UsbError::Other("printer worker stopped".to_string()))
}
