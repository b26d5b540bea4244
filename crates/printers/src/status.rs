//! Operator-facing status reporting.
//!
//! The UI collaborator binds a text element to each peripheral class; the
//! driver layer only ever pushes strings into it. [`StatusSink`] is that
//! write-only surface, and [`SharedStatus`] is the shipped implementation: a
//! cell holding the last written string, readable by whoever owns the other
//! end.

use crate::error::PrintError;
use crate::supported::PeripheralClass;
use std::sync::{Arc, Mutex};

/// Write-only sink for status text. Pushed to, never polled.
pub trait StatusSink: Send + Sync {
    fn set_status(&self, text: &str);
}

/// Status text for a class that is selected and usable.
pub fn ready_text(class: PeripheralClass) -> String {
    format!("{} ready.", class.display_name())
}

/// Status text for a class whose selected device was unplugged.
pub fn disconnected_text(class: PeripheralClass) -> String {
    format!("{} disconnected.", class.display_name())
}

/// Status text for a declined or empty selection prompt.
pub const NO_PRINTER_SELECTED: &str = "No printer selected.";

/// Status text for a failed print job.
pub fn error_text(class: PeripheralClass, err: &PrintError) -> String {
    match err {
        PrintError::NoDeviceChosen => NO_PRINTER_SELECTED.to_string(),
        other => format!("{} error: {}.", class.display_name(), other),
    }
}

/// Last-written status string, shared between the driver and its reader.
#[derive(Clone, Default)]
pub struct SharedStatus {
    text: Arc<Mutex<String>>,
}

impl SharedStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent status text; empty until the first write.
    pub fn get(&self) -> String {
        self.text.lock().unwrap().clone()
    }
}

impl StatusSink for SharedStatus {
    fn set_status(&self, text: &str) {
        *self.text.lock().unwrap() = text.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostusb::UsbError;

    #[test]
    fn test_status_texts() {
        assert_eq!(
            ready_text(PeripheralClass::LabelPrinter),
            "Label printer ready."
        );
        assert_eq!(
            disconnected_text(PeripheralClass::ReceiptPrinter),
            "Receipt printer disconnected."
        );
    }

    #[test]
    fn test_error_text_for_declined_prompt() {
        assert_eq!(
            error_text(PeripheralClass::LabelPrinter, &PrintError::NoDeviceChosen),
            "No printer selected."
        );
    }

    #[test]
    fn test_error_text_carries_cause() {
        let text = error_text(
            PeripheralClass::ReceiptPrinter,
            &PrintError::TransferFailed(UsbError::Timeout),
        );
        assert!(text.starts_with("Receipt printer error:"));
        assert!(text.contains("timed out"));
    }

    #[test]
    fn test_shared_status_holds_last_write() {
        let status = SharedStatus::new();
        assert_eq!(status.get(), "");

        status.set_status("Label printer ready.");
        status.set_status("Label printer disconnected.");
        assert_eq!(status.get(), "Label printer disconnected.");
    }
}
