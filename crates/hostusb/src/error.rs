//! Host USB error type and the mapping from rusb.

use thiserror::Error;

/// Errors surfaced by the host USB stack.
///
/// The variants mirror the libusb error space so that driver-level errors can
/// carry a precise cause without leaking the backend type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsbError {
    #[error("operation timed out")]
    Timeout,

    #[error("endpoint halted (pipe error)")]
    Pipe,

    #[error("device has been disconnected")]
    NoDevice,

    #[error("entity not found")]
    NotFound,

    #[error("resource busy")]
    Busy,

    #[error("buffer overflow")]
    Overflow,

    #[error("input/output error")]
    Io,

    #[error("invalid parameter")]
    InvalidParam,

    #[error("access denied (insufficient permissions)")]
    Access,

    #[error("{0}")]
    Other(String),
}

impl From<rusb::Error> for UsbError {
    fn from(err: rusb::Error) -> Self {
        match err {
            rusb::Error::Timeout => UsbError::Timeout,
            rusb::Error::Pipe => UsbError::Pipe,
            rusb::Error::NoDevice => UsbError::NoDevice,
            rusb::Error::NotFound => UsbError::NotFound,
            rusb::Error::Busy => UsbError::Busy,
            rusb::Error::Overflow => UsbError::Overflow,
            rusb::Error::Io => UsbError::Io,
            rusb::Error::InvalidParam => UsbError::InvalidParam,
            rusb::Error::Access => UsbError::Access,
            _ => UsbError::Other(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_rusb_error() {
        assert_eq!(UsbError::from(rusb::Error::Timeout), UsbError::Timeout);
        assert_eq!(UsbError::from(rusb::Error::Pipe), UsbError::Pipe);
        assert_eq!(UsbError::from(rusb::Error::NoDevice), UsbError::NoDevice);
        assert_eq!(UsbError::from(rusb::Error::NotFound), UsbError::NotFound);
        assert_eq!(UsbError::from(rusb::Error::Busy), UsbError::Busy);
        assert_eq!(UsbError::from(rusb::Error::Access), UsbError::Access);
    }

    #[test]
    fn test_map_unlisted_rusb_error_to_other() {
        match UsbError::from(rusb::Error::NotSupported) {
            UsbError::Other(msg) => assert!(!msg.is_empty()),
            other => panic!("expected Other, got {:?}", other),
        }
    }

    #[test]
    fn test_error_display() {
        let msg = format!("{}", UsbError::NoDevice);
        assert!(msg.contains("disconnected"));
    }
}
