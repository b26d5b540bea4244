//! USB type definitions shared between the backends and the driver layer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A (vendor id, product id) pair.
///
/// This is the identity hardware is matched on: allow-list entries carry one,
/// and every enumerated or hot-plugged device reports one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIds {
    /// USB Vendor ID
    pub vendor_id: u16,
    /// USB Product ID
    pub product_id: u16,
}

impl DeviceIds {
    pub const fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }
}

impl fmt::Display for DeviceIds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.product_id)
    }
}

/// Identity of one physical device connection.
///
/// Stable for as long as the device stays plugged in; a re-plug produces a
/// new key. Used to decide whether a detach notification refers to the
/// currently selected device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceKey {
    /// Bus number on the host
    pub bus_number: u8,
    /// Device address on the bus
    pub device_address: u8,
}

/// Snapshot of an enumerated device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Physical connection identity
    pub key: DeviceKey,
    /// Vendor/product pair
    pub ids: DeviceIds,
    /// Product string (if the device exposes one and reading it succeeded)
    pub product: Option<String>,
    /// Serial number string (if available)
    pub serial_number: Option<String>,
}

/// Transfer direction of an endpoint, seen from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Device to host
    In,
    /// Host to device
    Out,
}

/// One endpoint of a claimed interface's active alternate setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointInfo {
    /// Endpoint number (1..=15, without the direction bit)
    pub number: u8,
    /// Transfer direction
    pub direction: Direction,
}

impl EndpointInfo {
    pub const fn new(number: u8, direction: Direction) -> Self {
        Self { number, direction }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_ids_display() {
        let ids = DeviceIds::new(0x0A5F, 0x0015);
        assert_eq!(format!("{}", ids), "0a5f:0015");
    }

    #[test]
    fn test_device_ids_equality() {
        assert_eq!(DeviceIds::new(0x04B8, 0x0202), DeviceIds::new(0x04B8, 0x0202));
        assert_ne!(DeviceIds::new(0x04B8, 0x0202), DeviceIds::new(0x04B8, 0x0203));
    }

    #[test]
    fn test_device_key_identity() {
        let a = DeviceKey {
            bus_number: 1,
            device_address: 4,
        };
        let b = DeviceKey {
            bus_number: 1,
            device_address: 5,
        };
        assert_ne!(a, b);
        assert_eq!(a, a);
    }

    #[test]
    fn test_endpoint_direction() {
        let ep = EndpointInfo::new(3, Direction::Out);
        assert_eq!(ep.number, 3);
        assert_eq!(ep.direction, Direction::Out);
        assert_ne!(Direction::In, Direction::Out);
    }
}
