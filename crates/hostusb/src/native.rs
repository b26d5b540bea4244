//! rusb-backed implementation of the host bus traits.
//!
//! Runs against real hardware through libusb. Hot-plug notifications are
//! registered with the libusb context and delivered while
//! [`NativeBus::pump_events`] runs, so the bus owner must keep pumping from
//! its worker thread.

use crate::bus::{HostBus, HostDevice, HotplugEvent, OpenDevice};
use crate::error::UsbError;
use crate::types::{DeviceIds, DeviceInfo, DeviceKey, Direction, EndpointInfo};
use rusb::{Context, Device, DeviceHandle, Hotplug, HotplugBuilder, Registration, UsbContext};
use std::time::Duration;
use tracing::{debug, warn};

/// The host USB bus, backed by a libusb context.
pub struct NativeBus {
    context: Context,
    _hotplug_registration: Option<Registration<Context>>,
}

impl NativeBus {
    /// Create a bus over a fresh libusb context.
    pub fn new() -> Result<Self, UsbError> {
        let context = Context::new()?;
        Ok(Self {
            context,
            _hotplug_registration: None,
        })
    }

    fn devices(&self) -> Result<Vec<NativeDevice>, UsbError> {
        let list = self.context.devices()?;
        let mut devices = Vec::new();

        for device in list.iter() {
            match NativeDevice::new(device, true) {
                Ok(dev) => devices.push(dev),
                Err(e) => {
                    // Devices we cannot even read a descriptor from are not
                    // usable printers; skip them.
                    debug!("Skipping unreadable device during enumeration: {}", e);
                }
            }
        }

        Ok(devices)
    }
}

impl HostBus for NativeBus {
    type Device = NativeDevice;

    /// On a native host there is no per-device grant step: every device the
    /// OS lets us see counts as authorized. The driver layer applies its
    /// allow-list on top.
    fn authorized_devices(&mut self) -> Result<Vec<NativeDevice>, UsbError> {
        self.devices()
    }

    /// Native analogue of a device chooser: the first device on the bus
    /// matching one of the filters is selected. No device matching means no
    /// device was chosen.
    fn request_device(&mut self, filters: &[DeviceIds]) -> Result<Option<NativeDevice>, UsbError> {
        let device = self
            .devices()?
            .into_iter()
            .find(|dev| filters.contains(&dev.info().ids));

        match &device {
            Some(dev) => debug!("Device request matched {}", dev.info().ids),
            None => debug!("Device request matched nothing on the bus"),
        }

        Ok(device)
    }

    fn subscribe_hotplug(
        &mut self,
        handler: Box<dyn FnMut(HotplugEvent<NativeDevice>) + Send>,
    ) -> Result<(), UsbError> {
        if !rusb::has_hotplug() {
            // Without hot-plug support the drivers still work through
            // enumeration and explicit selection.
            warn!("libusb reports no hot-plug support on this platform");
            return Ok(());
        }

        let registration = HotplugBuilder::new()
            .enumerate(false)
            .register(&self.context, Box::new(HotplugAdapter { handler }))?;

        self._hotplug_registration = Some(registration);
        debug!("Hot-plug callbacks registered");
        Ok(())
    }

    fn pump_events(&mut self, timeout: Duration) -> Result<(), UsbError> {
        match self.context.handle_events(Some(timeout)) {
            Ok(()) => Ok(()),
            Err(rusb::Error::Interrupted) => {
                debug!("USB event handling interrupted");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Adapts the libusb hot-plug callback to the [`HotplugEvent`] handler.
///
/// libusb invokes these from within `handle_events`, so no blocking work may
/// happen here: attach builds the device from cached descriptors only, and
/// string descriptors are left unread.
struct HotplugAdapter {
    handler: Box<dyn FnMut(HotplugEvent<NativeDevice>) + Send>,
}

impl Hotplug<Context> for HotplugAdapter {
    fn device_arrived(&mut self, device: Device<Context>) {
        match NativeDevice::new(device, false) {
            Ok(dev) => {
                debug!("Hot-plug: device arrived ({})", dev.info().ids);
                (self.handler)(HotplugEvent::Attached(dev));
            }
            Err(e) => warn!("Ignoring arrived device with unreadable descriptor: {}", e),
        }
    }

    fn device_left(&mut self, device: Device<Context>) {
        match NativeDevice::new(device, false) {
            Ok(dev) => {
                debug!("Hot-plug: device left ({})", dev.info().ids);
                (self.handler)(HotplugEvent::Detached(dev.info().clone()));
            }
            Err(e) => warn!("Ignoring left device with unreadable descriptor: {}", e),
        }
    }
}

/// A device on the bus with its descriptor snapshot.
#[derive(Clone)]
pub struct NativeDevice {
    device: Device<Context>,
    info: DeviceInfo,
}

impl NativeDevice {
    /// Wrap a rusb device, caching its descriptor data.
    ///
    /// `read_strings` controls whether the device is opened briefly to read
    /// product/serial strings; that is fine during enumeration but not from a
    /// hot-plug callback.
    fn new(device: Device<Context>, read_strings: bool) -> Result<Self, UsbError> {
        let descriptor = device.device_descriptor()?;

        let (product, serial_number) = if read_strings {
            match device.open() {
                Ok(handle) => {
                    let product = descriptor
                        .product_string_index()
                        .and_then(|idx| handle.read_string_descriptor_ascii(idx).ok());
                    let serial = descriptor
                        .serial_number_string_index()
                        .and_then(|idx| handle.read_string_descriptor_ascii(idx).ok());
                    (product, serial)
                }
                Err(_) => (None, None),
            }
        } else {
            (None, None)
        };

        let info = DeviceInfo {
            key: DeviceKey {
                bus_number: device.bus_number(),
                device_address: device.address(),
            },
            ids: DeviceIds::new(descriptor.vendor_id(), descriptor.product_id()),
            product,
            serial_number,
        };

        Ok(Self { device, info })
    }
}

impl HostDevice for NativeDevice {
    type Open = NativeOpen;

    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn open(&self) -> Result<NativeOpen, UsbError> {
        let mut handle = self.device.open()?;

        // Have libusb detach a bound kernel driver on claim and restore it on
        // release. Not every platform supports this.
        match handle.set_auto_detach_kernel_driver(true) {
            Ok(()) | Err(rusb::Error::NotSupported) => {}
            Err(e) => return Err(e.into()),
        }

        debug!("Opened device {}", self.info.ids);

        Ok(NativeOpen {
            device: self.device.clone(),
            ids: self.info.ids,
            handle,
            claimed_interfaces: Vec::new(),
        })
    }
}

/// An opened device holding the libusb handle. Dropping releases the claimed
/// interfaces and closes the handle.
pub struct NativeOpen {
    device: Device<Context>,
    ids: DeviceIds,
    handle: DeviceHandle<Context>,
    claimed_interfaces: Vec<u8>,
}

impl OpenDevice for NativeOpen {
    fn select_configuration(&mut self, configuration: u8) -> Result<(), UsbError> {
        self.handle.set_active_configuration(configuration)?;
        debug!(
            "Selected configuration {} on device {}",
            configuration, self.ids
        );
        Ok(())
    }

    fn claim_interface(&mut self, interface: u8) -> Result<(), UsbError> {
        self.handle.claim_interface(interface)?;
        self.claimed_interfaces.push(interface);
        debug!("Claimed interface {} on device {}", interface, self.ids);
        Ok(())
    }

    fn endpoints(&self, interface: u8) -> Result<Vec<EndpointInfo>, UsbError> {
        let config = self.device.active_config_descriptor()?;

        let iface = config
            .interfaces()
            .find(|i| i.number() == interface)
            .ok_or(UsbError::NotFound)?;

        // The first descriptor is the active alternate setting; the printers
        // in scope never switch alternates.
        let iface_desc = iface.descriptors().next().ok_or(UsbError::NotFound)?;

        Ok(iface_desc
            .endpoint_descriptors()
            .map(|ep| EndpointInfo {
                number: ep.number(),
                direction: match ep.direction() {
                    rusb::Direction::In => Direction::In,
                    rusb::Direction::Out => Direction::Out,
                },
            })
            .collect())
    }

    fn transfer_out(
        &mut self,
        endpoint: u8,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, UsbError> {
        let written = self.handle.write_bulk(endpoint, data, timeout)?;

        if written != data.len() {
            warn!(
                "Short bulk write on endpoint {}: expected {}, wrote {}",
                endpoint,
                data.len(),
                written
            );
        }

        Ok(written)
    }
}

impl Drop for NativeOpen {
    fn drop(&mut self) {
        for interface in &self.claimed_interfaces {
            if let Err(e) = self.handle.release_interface(*interface) {
                warn!("Failed to release interface {}: {}", interface, e);
            }
        }
        debug!("Closed device {}", self.ids);
    }
}
