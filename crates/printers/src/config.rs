//! Driver configuration.
//!
//! A small TOML file covers what deployments actually vary: logging, the
//! selection policy knobs, and extra allow-list entries for hardware that is
//! compatible with a stock model but reports different ids.

use crate::supported::{self, EndpointResolution, SupportedDevice};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("could not serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("configuration error: {0}")]
    Invalid(String),
}

/// Selection-invalidation policy.
///
/// The two flags decide when a failed job also drops the current device
/// selection, forcing the next job back through the selection flow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DriverPolicy {
    /// Drop the selection when opening the selected device fails. The
    /// hardware was most likely unplugged without a detach notification
    /// reaching us; keeping the handle would fail every subsequent job.
    #[serde(default = "DriverPolicy::default_clear_on_open_failure")]
    pub clear_selection_on_open_failure: bool,

    /// Drop the selection when the output transfer fails. Off by default:
    /// transient I/O errors recover on the next job without forcing a
    /// reselection.
    #[serde(default)]
    pub clear_selection_on_transfer_failure: bool,
}

impl Default for DriverPolicy {
    fn default() -> Self {
        Self {
            clear_selection_on_open_failure: Self::default_clear_on_open_failure(),
            clear_selection_on_transfer_failure: false,
        }
    }
}

impl DriverPolicy {
    fn default_clear_on_open_failure() -> bool {
        true
    }
}

/// Extra allow-list entry supplied by configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfiguredDevice {
    pub vendor_id: u16,
    pub product_id: u16,
    /// Display name; the id pair is used when absent.
    #[serde(default)]
    pub model: Option<String>,
    /// Known OUT endpoint number; endpoint discovery is used when absent.
    #[serde(default)]
    pub fixed_endpoint: Option<u8>,
}

impl ConfiguredDevice {
    fn to_supported(&self) -> SupportedDevice {
        let model = self
            .model
            .clone()
            .unwrap_or_else(|| format!("{:04x}:{:04x}", self.vendor_id, self.product_id));

        let endpoint = match self.fixed_endpoint {
            Some(number) => EndpointResolution::Fixed(number),
            None => EndpointResolution::Discover,
        };

        SupportedDevice::new(self.vendor_id, self.product_id, model, endpoint)
    }
}

/// Per-class configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassConfig {
    /// Entries appended to the built-in allow-list for this class.
    #[serde(default)]
    pub extra_devices: Vec<ConfiguredDevice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    #[serde(default = "DriverConfig::default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub policy: DriverPolicy,

    #[serde(default)]
    pub label: ClassConfig,

    #[serde(default)]
    pub receipt: ClassConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
            policy: DriverPolicy::default(),
            label: ClassConfig::default(),
            receipt: ClassConfig::default(),
        }
    }
}

impl DriverConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }

    /// Default configuration path: `<config dir>/pos-usb/config.toml`.
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("pos-usb").join("config.toml")
        } else {
            PathBuf::from("/etc/pos-usb/config.toml")
        }
    }

    /// Load from `path`, or from the default path when `None`.
    pub fn load(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.unwrap_or_else(Self::default_path);
        let contents = fs::read_to_string(&path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Load from the default path, falling back to defaults when the file
    /// does not exist.
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!("Using default configuration ({})", e);
                Self::default()
            }
        }
    }

    /// Write the configuration to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Built-in label printer allow-list plus configured extras.
    pub fn label_allow_list(&self) -> Vec<SupportedDevice> {
        let mut list = supported::label_printers();
        list.extend(self.label.extra_devices.iter().map(|d| d.to_supported()));
        list
    }

    /// Built-in receipt printer allow-list plus configured extras.
    pub fn receipt_allow_list(&self) -> Vec<SupportedDevice> {
        let mut list = supported::receipt_printers();
        list.extend(self.receipt.extra_devices.iter().map(|d| d.to_supported()));
        list
    }
}
