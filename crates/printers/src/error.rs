//! Driver-level error taxonomy.

use hostusb::UsbError;
use thiserror::Error;

/// Failure of one print job.
///
/// All variants are recovered at the `print` boundary: they become a status
/// string for the operator and an `Err` for the caller, never a panic. No
/// variant is retried automatically; the next job re-evaluates device
/// selection from scratch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrintError {
    /// The selection prompt was declined or no matching device was chosen.
    #[error("no printer selected")]
    NoDeviceChosen,

    /// Opening, configuring, or claiming the device failed; the hardware is
    /// gone or held by someone else.
    #[error("printer unavailable: {0}")]
    DeviceUnavailable(#[source] UsbError),

    /// The claimed interface exposes no OUT endpoint; the device is not the
    /// hardware the allow-list promised.
    #[error("printer interface has no output endpoint")]
    EndpointNotFound,

    /// The output transfer itself failed.
    #[error("output transfer failed: {0}")]
    TransferFailed(#[source] UsbError),
}
