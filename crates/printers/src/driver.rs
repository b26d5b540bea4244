//! One peripheral class's driver: selection brokering plus print jobs.

use crate::config::DriverPolicy;
use crate::error::PrintError;
use crate::registry::Registry;
use crate::session::TransferSession;
use crate::status::{self, StatusSink};
use crate::supported::{EndpointResolution, PeripheralClass, SupportedDevice};
use hostusb::{DeviceInfo, HostBus, HostDevice, UsbError};
use std::sync::Arc;
use tracing::{debug, warn};

/// Driver for one peripheral class.
///
/// Owns the class registry and policy. The bus is passed into each call
/// rather than owned, since both class drivers share the one host bus held
/// by the worker.
pub struct PrinterDriver<D: HostDevice> {
    registry: Registry<D>,
    policy: DriverPolicy,
    status: Arc<dyn StatusSink>,
}

impl<D: HostDevice> PrinterDriver<D> {
    pub fn new(
        class: PeripheralClass,
        allow_list: Vec<SupportedDevice>,
        policy: DriverPolicy,
        status: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            registry: Registry::new(class, allow_list, Arc::clone(&status)),
            policy,
            status,
        }
    }

    pub fn class(&self) -> PeripheralClass {
        self.registry.class()
    }

    /// A registry handle for wiring into the bus hot-plug subscription.
    pub fn registry(&self) -> Registry<D> {
        self.registry.clone()
    }

    /// Identity of the current selection, if any.
    pub fn selected_info(&self) -> Option<DeviceInfo> {
        self.registry.selected_info()
    }

    /// Restore a previously usable device from the host's authorized list.
    /// Runs once at startup.
    pub fn initialize<B: HostBus<Device = D>>(&self, bus: &mut B) -> Result<(), UsbError> {
        let devices = bus.authorized_devices()?;
        self.registry.seed_from_enumeration(&devices);
        Ok(())
    }

    /// Make sure a device is selected, invoking the host selection flow if
    /// needed.
    ///
    /// Idempotent while a selection exists: no prompt is shown. A declined
    /// or empty selection fails with [`PrintError::NoDeviceChosen`] and is
    /// never retried here.
    pub fn ensure_selected<B: HostBus<Device = D>>(&self, bus: &mut B) -> Result<D, PrintError> {
        if let Some(device) = self.registry.selected() {
            return Ok(device);
        }

        match bus.request_device(&self.registry.filters()) {
            Ok(Some(device)) => {
                self.registry.select_granted(device.clone());
                Ok(device)
            }
            Ok(None) => {
                self.status.set_status(status::NO_PRINTER_SELECTED);
                Err(PrintError::NoDeviceChosen)
            }
            Err(e) => {
                warn!("{}: device selection failed: {}", self.class(), e);
                Err(PrintError::DeviceUnavailable(e))
            }
        }
    }

    /// Run one print job: ensure a selection, open the device, and push the
    /// payload through a [`TransferSession`].
    ///
    /// Every failure is also written to the status sink; the device opened
    /// for the job is closed before this returns, on success and on every
    /// failure path.
    pub fn print<B: HostBus<Device = D>>(
        &self,
        bus: &mut B,
        payload: &[u8],
    ) -> Result<(), PrintError> {
        let result = self.print_job(bus, payload);

        if let Err(err) = &result {
            self.status
                .set_status(&status::error_text(self.class(), err));
        }

        result
    }

    fn print_job<B: HostBus<Device = D>>(
        &self,
        bus: &mut B,
        payload: &[u8],
    ) -> Result<(), PrintError> {
        let device = self.ensure_selected(bus)?;

        let resolution = self
            .registry
            .endpoint_policy(device.info().ids)
            .unwrap_or_else(|| {
                // A selected device always came through the allow-list, but
                // a configured entry may have been removed since.
                debug!(
                    "{}: no allow-list entry for selected {}, falling back to discovery",
                    self.class(),
                    device.info().ids
                );
                EndpointResolution::Discover
            });

        let opened = match device.open() {
            Ok(opened) => opened,
            Err(e) => {
                if self.policy.clear_selection_on_open_failure {
                    debug!(
                        "{}: open failed ({}), dropping the selection",
                        self.class(),
                        e
                    );
                    self.registry.clear_silently();
                }
                return Err(PrintError::DeviceUnavailable(e));
            }
        };

        match TransferSession::new(opened).send(resolution, payload) {
            Ok(()) => {
                debug!("{}: job of {} bytes complete", self.class(), payload.len());
                Ok(())
            }
            Err(err) => {
                if matches!(err, PrintError::TransferFailed(_))
                    && self.policy.clear_selection_on_transfer_failure
                {
                    debug!("{}: transfer failed, dropping the selection", self.class());
                    self.registry.clear_silently();
                }
                Err(err)
            }
        }
    }
}
