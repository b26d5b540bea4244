//! Host USB access layer for pos-usb
//!
//! This crate abstracts the platform's USB stack behind a small set of traits
//! so that the printer drivers can be exercised against real hardware (the
//! rusb-backed [`NativeBus`]) or against a scriptable in-memory bus
//! ([`mock::MockBus`]) in tests.
//!
//! The surface mirrors what the drivers actually need: enumerate devices the
//! host already grants access to, ask the host to pick a device matching a
//! filter list, subscribe to attach/detach notifications, and run the
//! open/configure/claim/transfer lifecycle on a single device.

pub mod bus;
pub mod error;
pub mod mock;
pub mod native;
pub mod types;

pub use bus::{HostBus, HostDevice, HotplugEvent, OpenDevice};
pub use error::UsbError;
pub use native::NativeBus;
pub use types::{DeviceIds, DeviceInfo, DeviceKey, Direction, EndpointInfo};
