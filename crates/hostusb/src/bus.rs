//! Traits over the host's USB stack.
//!
//! The driver layer is generic over these traits. [`crate::native::NativeBus`]
//! implements them with rusb for real hardware; [`crate::mock::MockBus`]
//! implements them in memory for deterministic tests.

use crate::error::UsbError;
use crate::types::{DeviceIds, DeviceInfo, EndpointInfo};
use std::time::Duration;

/// Hot-plug notification delivered to a subscribed handler.
///
/// Attach carries the device itself so the subscriber can hold on to it;
/// detach only carries the identity snapshot, since the hardware is already
/// gone by the time the notification fires.
pub enum HotplugEvent<D> {
    Attached(D),
    Detached(DeviceInfo),
}

/// The host's bus-level surface: enumeration, device selection, and
/// attach/detach notifications.
///
/// Notifications are delivered from [`HostBus::pump_events`], which the owner
/// is expected to call in a loop on a dedicated thread. Handlers therefore run
/// on that thread, never concurrently with each other. A bus is constructed
/// on the thread that will pump it and never leaves it; only devices cross
/// threads.
pub trait HostBus: 'static {
    type Device: HostDevice;

    /// Devices the host already grants this process access to.
    ///
    /// Called once at driver initialization to restore a previously usable
    /// device without any selection flow.
    fn authorized_devices(&mut self) -> Result<Vec<Self::Device>, UsbError>;

    /// Ask the host to select a device matching one of `filters`.
    ///
    /// Returns `Ok(None)` when no device was chosen, either because nothing
    /// matching is present or because the selection flow was declined. This
    /// is the one call that may block on user interaction and it must not be
    /// retried automatically by callers.
    fn request_device(&mut self, filters: &[DeviceIds]) -> Result<Option<Self::Device>, UsbError>;

    /// Subscribe to attach/detach notifications for the life of the bus.
    ///
    /// Only one handler is supported; a second subscription replaces the
    /// first.
    fn subscribe_hotplug(
        &mut self,
        handler: Box<dyn FnMut(HotplugEvent<Self::Device>) + Send>,
    ) -> Result<(), UsbError>;

    /// Drive the host event loop, delivering pending hot-plug notifications
    /// to the subscribed handler. Blocks for at most `timeout`.
    fn pump_events(&mut self, timeout: Duration) -> Result<(), UsbError>;
}

/// One device present on the bus, not yet opened.
///
/// Cloning is cheap and does not touch the hardware; clones refer to the same
/// physical device.
pub trait HostDevice: Clone + Send + 'static {
    type Open: OpenDevice;

    /// Identity and descriptor snapshot taken at discovery time.
    fn info(&self) -> &DeviceInfo;

    /// Open the device, acquiring the host's exclusive claim on it.
    fn open(&self) -> Result<Self::Open, UsbError>;
}

/// An opened device. Dropping the value closes the device; this is the only
/// way to close it, so a device opened once is closed exactly once.
pub trait OpenDevice: Send {
    /// Select a configuration by its configuration value.
    fn select_configuration(&mut self, configuration: u8) -> Result<(), UsbError>;

    /// Claim an interface for exclusive use.
    fn claim_interface(&mut self, interface: u8) -> Result<(), UsbError>;

    /// Endpoints of the claimed interface's active alternate setting.
    fn endpoints(&self, interface: u8) -> Result<Vec<EndpointInfo>, UsbError>;

    /// Perform one blocking output transfer to an OUT endpoint.
    ///
    /// `endpoint` is the endpoint number without the direction bit.
    fn transfer_out(
        &mut self,
        endpoint: u8,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, UsbError>;
}
