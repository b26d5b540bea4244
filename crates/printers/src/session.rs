//! One print job against one opened device.
//!
//! The session owns the open device for the duration of a job: configure,
//! claim, resolve the output endpoint, transfer, and close. Ownership is the
//! close guarantee: the open handle lives inside the session and is dropped
//! (closed) on every exit path, so one open is matched by exactly one close
//! no matter which step fails.

use crate::error::PrintError;
use crate::supported::EndpointResolution;
use hostusb::{Direction, OpenDevice};
use std::time::Duration;
use tracing::debug;

/// Configuration value selected on every printer in scope. A protocol
/// convention for this hardware class, not negotiated.
pub const CONFIGURATION: u8 = 1;

/// Interface claimed on every printer in scope.
pub const INTERFACE: u8 = 0;

/// Upper bound on one output transfer.
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TransferSession<O: OpenDevice> {
    device: O,
}

impl<O: OpenDevice> TransferSession<O> {
    pub fn new(device: O) -> Self {
        Self { device }
    }

    /// Run the job: configure, claim, resolve the endpoint, send the payload.
    ///
    /// Consumes the session; the device is closed when this returns,
    /// successfully or not.
    pub fn send(mut self, resolution: EndpointResolution, payload: &[u8]) -> Result<(), PrintError> {
        self.device
            .select_configuration(CONFIGURATION)
            .map_err(PrintError::DeviceUnavailable)?;

        self.device
            .claim_interface(INTERFACE)
            .map_err(PrintError::DeviceUnavailable)?;

        let endpoint = self.resolve_endpoint(resolution)?;

        let written = self
            .device
            .transfer_out(endpoint, payload, TRANSFER_TIMEOUT)
            .map_err(PrintError::TransferFailed)?;

        debug!("Wrote {} bytes to endpoint {}", written, endpoint);
        Ok(())
    }

    fn resolve_endpoint(&self, resolution: EndpointResolution) -> Result<u8, PrintError> {
        match resolution {
            EndpointResolution::Fixed(number) => Ok(number),
            EndpointResolution::Discover => {
                let endpoints = self
                    .device
                    .endpoints(INTERFACE)
                    .map_err(PrintError::DeviceUnavailable)?;

                endpoints
                    .iter()
                    .find(|ep| ep.direction == Direction::Out)
                    .map(|ep| ep.number)
                    .ok_or(PrintError::EndpointNotFound)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostusb::mock::{MockBehavior, MockBus};
    use hostusb::{EndpointInfo, HostDevice};

    #[test]
    fn test_send_configures_claims_and_writes() {
        let mut bus = MockBus::new();
        let device = bus.add_authorized_device(0x04B8, 0x0202);

        let session = TransferSession::new(device.open().unwrap());
        session
            .send(EndpointResolution::Fixed(1), b"receipt bytes")
            .unwrap();

        assert_eq!(device.configurations(), [CONFIGURATION]);
        assert_eq!(device.claims(), [INTERFACE]);
        assert_eq!(device.writes(), [(1, b"receipt bytes".to_vec())]);
        assert_eq!(device.opens(), 1);
        assert_eq!(device.closes(), 1);
    }

    #[test]
    fn test_discovery_picks_first_out_endpoint() {
        let mut bus = MockBus::new();
        let device = bus.add_authorized_device_with(
            0x0A5F,
            0x0015,
            MockBehavior::with_endpoints(vec![
                EndpointInfo::new(2, Direction::In),
                EndpointInfo::new(3, Direction::Out),
            ]),
        );

        let session = TransferSession::new(device.open().unwrap());
        session
            .send(EndpointResolution::Discover, b"^XA^XZ")
            .unwrap();

        assert_eq!(device.writes(), [(3, b"^XA^XZ".to_vec())]);
    }

    #[test]
    fn test_discovery_without_out_endpoint_fails_cleanly() {
        let mut bus = MockBus::new();
        let device = bus.add_authorized_device_with(
            0x0A5F,
            0x0015,
            MockBehavior::with_endpoints(vec![EndpointInfo::new(2, Direction::In)]),
        );

        let session = TransferSession::new(device.open().unwrap());
        let err = session
            .send(EndpointResolution::Discover, b"^XA^XZ")
            .unwrap_err();

        assert_eq!(err, PrintError::EndpointNotFound);
        assert!(device.writes().is_empty());
        assert_eq!(device.closes(), 1);
    }

    #[test]
    fn test_configure_failure_still_closes() {
        let mut bus = MockBus::new();
        let device =
            bus.add_authorized_device_with(0x04B8, 0x0202, MockBehavior::fail_configure());

        let session = TransferSession::new(device.open().unwrap());
        let err = session
            .send(EndpointResolution::Fixed(1), b"data")
            .unwrap_err();

        assert!(matches!(err, PrintError::DeviceUnavailable(_)));
        assert_eq!(device.opens(), 1);
        assert_eq!(device.closes(), 1);
    }
}
