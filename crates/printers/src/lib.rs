//! USB point-of-sale printer drivers.
//!
//! This crate discovers, selects, and drives the label and receipt printers
//! attached to a point-of-sale station. Each peripheral class has an
//! allow-list of supported hardware, a single-slot selection that survives
//! hot-plug events, and a print path that opens the device, resolves its
//! output endpoint, pushes the payload through one bulk transfer, and closes
//! the device again. Outcomes surface as operator-readable status strings.
//!
//! The usual entry point is [`PrinterStation::spawn`]:
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use hostusb::NativeBus;
//! use printers::{DriverConfig, PrinterStation};
//!
//! let config = DriverConfig::load_or_default();
//! let (station, _events) = PrinterStation::spawn(NativeBus::new, &config)?;
//!
//! station.print_labels("^XA^FDArtist 42^FS^XZ").await?;
//! println!("{}", station.label_status());
//! # Ok(())
//! # }
//! ```
//!
//! The drivers are generic over [`hostusb::HostBus`], so everything above
//! the USB stack can also run against `hostusb::mock::MockBus` in tests.

pub mod channel;
pub mod config;
pub mod driver;
pub mod error;
pub mod logging;
pub mod registry;
pub mod session;
pub mod status;
pub mod supported;
pub mod worker;

mod station;

pub use channel::{StationCommand, StationEvent};
pub use config::{ConfigError, DriverConfig, DriverPolicy};
pub use driver::PrinterDriver;
pub use error::PrintError;
pub use logging::setup_logging;
pub use station::PrinterStation;
pub use status::{SharedStatus, StatusSink};
pub use supported::{
    EndpointResolution, PeripheralClass, SupportedDevice, is_supported, label_printers,
    receipt_printers, supported_entry,
};
