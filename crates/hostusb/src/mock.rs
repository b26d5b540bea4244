//! Scriptable in-memory implementation of the host bus traits.
//!
//! Used by driver tests to run the full selection and transfer lifecycle
//! without hardware: devices are added to the bus up front or hot-plugged
//! mid-test, the selection prompt can be scripted to grant or deny, and every
//! device records its open/close/transfer history for assertions.

use crate::bus::{HostBus, HostDevice, HotplugEvent, OpenDevice};
use crate::error::UsbError;
use crate::types::{DeviceIds, DeviceInfo, DeviceKey, Direction, EndpointInfo};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Per-device failure script and descriptor layout.
#[derive(Debug, Clone)]
pub struct MockBehavior {
    /// Fail `open` with an access error
    pub fail_open: bool,
    /// Fail `select_configuration` with an I/O error
    pub fail_configure: bool,
    /// Fail `claim_interface` with a busy error
    pub fail_claim: bool,
    /// Fail `transfer_out` with an I/O error
    pub fail_transfer: bool,
    /// Endpoints reported for the claimed interface
    pub endpoints: Vec<EndpointInfo>,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            fail_open: false,
            fail_configure: false,
            fail_claim: false,
            fail_transfer: false,
            endpoints: vec![
                EndpointInfo::new(2, Direction::In),
                EndpointInfo::new(1, Direction::Out),
            ],
        }
    }
}

impl MockBehavior {
    pub fn fail_open() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    pub fn fail_configure() -> Self {
        Self {
            fail_configure: true,
            ..Self::default()
        }
    }

    pub fn fail_claim() -> Self {
        Self {
            fail_claim: true,
            ..Self::default()
        }
    }

    pub fn fail_transfer() -> Self {
        Self {
            fail_transfer: true,
            ..Self::default()
        }
    }

    pub fn with_endpoints(endpoints: Vec<EndpointInfo>) -> Self {
        Self {
            endpoints,
            ..Self::default()
        }
    }
}

#[derive(Default)]
struct DeviceStats {
    opens: usize,
    closes: usize,
    configurations: Vec<u8>,
    claims: Vec<u8>,
    writes: Vec<(u8, Vec<u8>)>,
}

struct DeviceState {
    info: DeviceInfo,
    behavior: MockBehavior,
    authorized: AtomicBool,
    present: AtomicBool,
    stats: Mutex<DeviceStats>,
}

/// A device on the mock bus. Clones share state; tests keep a clone around
/// to assert on the recorded history after the bus has been handed to a
/// driver.
#[derive(Clone)]
pub struct MockDevice {
    state: Arc<DeviceState>,
}

impl MockDevice {
    fn new(address: u8, ids: DeviceIds, authorized: bool, behavior: MockBehavior) -> Self {
        Self {
            state: Arc::new(DeviceState {
                info: DeviceInfo {
                    key: DeviceKey {
                        bus_number: 0,
                        device_address: address,
                    },
                    ids,
                    product: Some(format!("Mock device {}", address)),
                    serial_number: Some(format!("MOCK{:04}", address)),
                },
                behavior,
                authorized: AtomicBool::new(authorized),
                present: AtomicBool::new(true),
                stats: Mutex::new(DeviceStats::default()),
            }),
        }
    }

    /// Number of times the device has been opened.
    pub fn opens(&self) -> usize {
        self.state.stats.lock().unwrap().opens
    }

    /// Number of times the device has been closed.
    pub fn closes(&self) -> usize {
        self.state.stats.lock().unwrap().closes
    }

    /// Configuration values selected, in order.
    pub fn configurations(&self) -> Vec<u8> {
        self.state.stats.lock().unwrap().configurations.clone()
    }

    /// Interfaces claimed, in order.
    pub fn claims(&self) -> Vec<u8> {
        self.state.stats.lock().unwrap().claims.clone()
    }

    /// Output transfers performed, as (endpoint, payload) pairs.
    pub fn writes(&self) -> Vec<(u8, Vec<u8>)> {
        self.state.stats.lock().unwrap().writes.clone()
    }
}

impl HostDevice for MockDevice {
    type Open = MockOpen;

    fn info(&self) -> &DeviceInfo {
        &self.state.info
    }

    fn open(&self) -> Result<MockOpen, UsbError> {
        if !self.state.present.load(Ordering::SeqCst) {
            return Err(UsbError::NoDevice);
        }
        if self.state.behavior.fail_open {
            return Err(UsbError::Access);
        }

        self.state.stats.lock().unwrap().opens += 1;
        Ok(MockOpen {
            state: Arc::clone(&self.state),
        })
    }
}

/// An opened mock device. Dropping it records the close.
pub struct MockOpen {
    state: Arc<DeviceState>,
}

impl std::fmt::Debug for MockOpen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockOpen").finish_non_exhaustive()
    }
}

impl OpenDevice for MockOpen {
    fn select_configuration(&mut self, configuration: u8) -> Result<(), UsbError> {
        if self.state.behavior.fail_configure {
            return Err(UsbError::Io);
        }
        self.state
            .stats
            .lock()
            .unwrap()
            .configurations
            .push(configuration);
        Ok(())
    }

    fn claim_interface(&mut self, interface: u8) -> Result<(), UsbError> {
        if self.state.behavior.fail_claim {
            return Err(UsbError::Busy);
        }
        self.state.stats.lock().unwrap().claims.push(interface);
        Ok(())
    }

    fn endpoints(&self, _interface: u8) -> Result<Vec<EndpointInfo>, UsbError> {
        Ok(self.state.behavior.endpoints.clone())
    }

    fn transfer_out(
        &mut self,
        endpoint: u8,
        data: &[u8],
        _timeout: Duration,
    ) -> Result<usize, UsbError> {
        if self.state.behavior.fail_transfer {
            return Err(UsbError::Io);
        }
        self.state
            .stats
            .lock()
            .unwrap()
            .writes
            .push((endpoint, data.to_vec()));
        Ok(data.len())
    }
}

impl Drop for MockOpen {
    fn drop(&mut self) {
        self.state.stats.lock().unwrap().closes += 1;
    }
}

enum PendingEvent {
    Attached(MockDevice),
    Detached(DeviceInfo),
}

struct BusState {
    devices: Vec<MockDevice>,
    pending: VecDeque<PendingEvent>,
    deny_requests: bool,
    prompt_count: usize,
    next_address: u8,
}

/// The mock bus. Owns the device list and the scripted selection prompt.
///
/// [`MockBus::controller`] hands out a handle that keeps working after the
/// bus itself has been moved into a driver or worker thread.
pub struct MockBus {
    state: Arc<Mutex<BusState>>,
    handler: Option<Box<dyn FnMut(HotplugEvent<MockDevice>) + Send>>,
}

impl MockBus {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState {
                devices: Vec::new(),
                pending: VecDeque::new(),
                deny_requests: false,
                prompt_count: 0,
                next_address: 1,
            })),
            handler: None,
        }
    }

    /// Handle for scripting the bus after it has been moved away.
    pub fn controller(&self) -> MockBusController {
        MockBusController {
            state: Arc::clone(&self.state),
        }
    }

    /// Add a device the host already grants access to.
    pub fn add_authorized_device(&mut self, vendor_id: u16, product_id: u16) -> MockDevice {
        self.controller()
            .add_device(vendor_id, product_id, true, MockBehavior::default())
    }

    /// Add a device the host already grants access to, with a scripted
    /// behavior.
    pub fn add_authorized_device_with(
        &mut self,
        vendor_id: u16,
        product_id: u16,
        behavior: MockBehavior,
    ) -> MockDevice {
        self.controller()
            .add_device(vendor_id, product_id, true, behavior)
    }

    /// Add a device that is present on the bus but not yet granted; only the
    /// selection prompt can surface it.
    pub fn add_ungranted_device(&mut self, vendor_id: u16, product_id: u16) -> MockDevice {
        self.controller()
            .add_device(vendor_id, product_id, false, MockBehavior::default())
    }

    /// Script the selection prompt to always be declined.
    pub fn deny_requests(&mut self) {
        self.state.lock().unwrap().deny_requests = true;
    }

    /// Number of times the selection prompt has been invoked.
    pub fn prompt_count(&self) -> usize {
        self.state.lock().unwrap().prompt_count
    }
}

impl Default for MockBus {
    fn default() -> Self {
        Self::new()
    }
}

impl HostBus for MockBus {
    type Device = MockDevice;

    fn authorized_devices(&mut self) -> Result<Vec<MockDevice>, UsbError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .devices
            .iter()
            .filter(|d| d.state.authorized.load(Ordering::SeqCst))
            .cloned()
            .collect())
    }

    fn request_device(&mut self, filters: &[DeviceIds]) -> Result<Option<MockDevice>, UsbError> {
        let mut state = self.state.lock().unwrap();
        state.prompt_count += 1;

        if state.deny_requests {
            return Ok(None);
        }

        let device = state
            .devices
            .iter()
            .find(|d| filters.contains(&d.state.info.ids))
            .cloned();

        // A grant authorizes the device for later enumeration, as the real
        // permission flow does.
        if let Some(dev) = &device {
            dev.state.authorized.store(true, Ordering::SeqCst);
        }

        Ok(device)
    }

    fn subscribe_hotplug(
        &mut self,
        handler: Box<dyn FnMut(HotplugEvent<MockDevice>) + Send>,
    ) -> Result<(), UsbError> {
        self.handler = Some(handler);
        Ok(())
    }

    fn pump_events(&mut self, timeout: Duration) -> Result<(), UsbError> {
        let events: Vec<PendingEvent> = {
            let mut state = self.state.lock().unwrap();
            state.pending.drain(..).collect()
        };

        if events.is_empty() {
            // Behave like the native event loop: block briefly when idle.
            std::thread::sleep(timeout.min(Duration::from_millis(1)));
            return Ok(());
        }

        if let Some(handler) = self.handler.as_mut() {
            for event in events {
                match event {
                    PendingEvent::Attached(dev) => handler(HotplugEvent::Attached(dev)),
                    PendingEvent::Detached(info) => handler(HotplugEvent::Detached(info)),
                }
            }
        }

        Ok(())
    }
}

/// Scripting handle to a [`MockBus`] that may live on another thread.
#[derive(Clone)]
pub struct MockBusController {
    state: Arc<Mutex<BusState>>,
}

impl MockBusController {
    fn add_device(
        &self,
        vendor_id: u16,
        product_id: u16,
        authorized: bool,
        behavior: MockBehavior,
    ) -> MockDevice {
        let mut state = self.state.lock().unwrap();
        let address = state.next_address;
        state.next_address += 1;

        let device = MockDevice::new(
            address,
            DeviceIds::new(vendor_id, product_id),
            authorized,
            behavior,
        );
        state.devices.push(device.clone());
        device
    }

    /// Plug in a new device and queue its attach notification.
    pub fn attach(&self, vendor_id: u16, product_id: u16) -> MockDevice {
        self.attach_with(vendor_id, product_id, MockBehavior::default())
    }

    /// Plug in a new device with a scripted behavior and queue its attach
    /// notification.
    pub fn attach_with(
        &self,
        vendor_id: u16,
        product_id: u16,
        behavior: MockBehavior,
    ) -> MockDevice {
        let device = self.add_device(vendor_id, product_id, true, behavior);
        let mut state = self.state.lock().unwrap();
        state.pending.push_back(PendingEvent::Attached(device.clone()));
        device
    }

    /// Unplug a device and queue its detach notification.
    pub fn detach(&self, device: &MockDevice) {
        device.state.present.store(false, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        state
            .devices
            .retain(|d| d.state.info.key != device.state.info.key);
        state
            .pending
            .push_back(PendingEvent::Detached(device.state.info.clone()));
    }

    /// Script the selection prompt to always be declined.
    pub fn deny_requests(&self) {
        self.state.lock().unwrap().deny_requests = true;
    }

    /// Number of times the selection prompt has been invoked.
    pub fn prompt_count(&self) -> usize {
        self.state.lock().unwrap().prompt_count
    }
}
