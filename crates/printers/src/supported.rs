//! Supported hardware tables and the allow-list matcher.
//!
//! Each peripheral class carries its own allow-list of (vendor id, product
//! id) pairs. Matching is exact equality against every entry; there is no
//! wildcard or range form. The same check runs at enumeration time and when
//! an attach notification arrives.

use hostusb::DeviceIds;
use std::fmt;

/// A category of point-of-sale hardware with its own allow-list and
/// selection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeripheralClass {
    LabelPrinter,
    ReceiptPrinter,
}

impl PeripheralClass {
    /// Human-readable name used to build status strings.
    pub fn display_name(&self) -> &'static str {
        match self {
            PeripheralClass::LabelPrinter => "Label printer",
            PeripheralClass::ReceiptPrinter => "Receipt printer",
        }
    }
}

impl fmt::Display for PeripheralClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// How the output endpoint is found on a given printer model.
///
/// Some models have a stable, documented endpoint number; others vary
/// between hardware revisions and must be discovered from the claimed
/// interface's descriptors. The choice is made per allow-list entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointResolution {
    /// Trust a known endpoint number without inspecting descriptors.
    Fixed(u8),
    /// Scan the active alternate setting for the first OUT endpoint.
    Discover,
}

/// One allow-list entry: a supported hardware model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedDevice {
    pub ids: DeviceIds,
    pub model: String,
    pub endpoint: EndpointResolution,
}

impl SupportedDevice {
    pub fn new(
        vendor_id: u16,
        product_id: u16,
        model: impl Into<String>,
        endpoint: EndpointResolution,
    ) -> Self {
        Self {
            ids: DeviceIds::new(vendor_id, product_id),
            model: model.into(),
            endpoint,
        }
    }
}

/// Label printer models recognized out of the box.
///
/// Zebra descriptor layouts differ between hardware revisions, so the output
/// endpoint is discovered per device.
pub fn label_printers() -> Vec<SupportedDevice> {
    vec![
        SupportedDevice::new(0x0A5F, 0x0015, "Zebra LP-2824", EndpointResolution::Discover),
        SupportedDevice::new(
            0x0A5F,
            0x00A3,
            "Zebra LP-2824 Plus",
            EndpointResolution::Discover,
        ),
    ]
}

/// Receipt printer models recognized out of the box.
///
/// The TM-T88V exposes its bulk OUT pipe on endpoint 1 across revisions.
pub fn receipt_printers() -> Vec<SupportedDevice> {
    vec![SupportedDevice::new(
        0x04B8,
        0x0202,
        "Epson TM-T88V",
        EndpointResolution::Fixed(1),
    )]
}

/// Exact-match allow-list check.
pub fn is_supported(ids: DeviceIds, allow_list: &[SupportedDevice]) -> bool {
    allow_list.iter().any(|entry| entry.ids == ids)
}

/// The allow-list entry matching `ids`, if any.
pub fn supported_entry(ids: DeviceIds, allow_list: &[SupportedDevice]) -> Option<&SupportedDevice> {
    allow_list.iter().find(|entry| entry.ids == ids)
}
