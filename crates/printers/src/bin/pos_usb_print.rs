//! pos-usb print tool
//!
//! Lists the printers the station recognizes and sends raw print jobs to the
//! label or receipt printer. The payload is whatever the upstream tooling
//! produced (ZPL for labels, ESC/POS for receipts); this tool does not
//! render anything itself.

use anyhow::{Context, Result};
use clap::Parser;
use hostusb::{HostBus, HostDevice, NativeBus};
use printers::{DriverConfig, PrinterStation, is_supported, setup_logging};
use std::io::Read;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "pos-usb-print")]
#[command(
    author,
    version,
    about = "Drive the point-of-sale USB label and receipt printers"
)]
#[command(long_about = "
Send raw print jobs to the station's USB printers.

EXAMPLES:
    # Show every USB device and whether it is a supported printer
    pos-usb-print --list-devices

    # Send a ZPL file to the label printer
    pos-usb-print --label bid-sheet.zpl

    # Send an ESC/POS job from stdin to the receipt printer
    receipt-render | pos-usb-print --receipt -

CONFIGURATION:
    The tool reads the driver configuration from --config, falling back to
    the per-user default path and then to built-in defaults.
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Save default configuration to the default location and exit
    #[arg(long)]
    save_config: bool,

    /// List USB devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Send this file to the label printer ("-" reads stdin)
    #[arg(long, value_name = "FILE")]
    label: Option<PathBuf>,

    /// Send this file to the receipt printer ("-" reads stdin)
    #[arg(long, value_name = "FILE")]
    receipt: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let config = DriverConfig::default();
        let path = DriverConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let config = if let Some(path) = args.config.clone() {
        DriverConfig::load(Some(path)).context("Failed to load configuration")?
    } else {
        DriverConfig::load_or_default()
    };

    let log_level = args.log_level.as_deref().unwrap_or(&config.log_level);
    setup_logging(log_level).context("Failed to setup logging")?;

    if args.list_devices {
        return list_devices_mode(&config);
    }

    let (station, events) = PrinterStation::spawn(NativeBus::new, &config)
        .context("Failed to start the printer station")?;

    // Mirror every status change to the terminal, the way the admin UI
    // mirrors it into its status element.
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            let printers::StationEvent::Status { class, text } = event;
            info!("{}: {}", class, text);
        }
    });

    if let Some(path) = &args.label {
        let payload = read_payload(path).context("Failed to read label payload")?;
        station
            .print_labels(payload)
            .await
            .context("Label job failed")?;
        println!("{}", station.label_status());
    }

    if let Some(path) = &args.receipt {
        let payload = read_payload(path).context("Failed to read receipt payload")?;
        station
            .print_receipt(payload)
            .await
            .context("Receipt job failed")?;
        println!("{}", station.receipt_status());
    }

    if args.label.is_none() && args.receipt.is_none() {
        println!("Nothing to do; try --list-devices, --label or --receipt.");
    }

    station.shutdown().await;
    Ok(())
}

fn read_payload(path: &PathBuf) -> Result<Vec<u8>> {
    if path.as_os_str() == "-" {
        let mut payload = Vec::new();
        std::io::stdin().read_to_end(&mut payload)?;
        Ok(payload)
    } else {
        Ok(std::fs::read(path)?)
    }
}

fn list_devices_mode(config: &DriverConfig) -> Result<()> {
    let mut bus = NativeBus::new().context("Failed to open the USB stack")?;
    let devices = bus
        .authorized_devices()
        .context("Failed to enumerate USB devices")?;

    let labels = config.label_allow_list();
    let receipts = config.receipt_allow_list();

    println!("{} device(s) on the bus:", devices.len());
    for device in devices {
        let info = device.info();
        let kind = if is_supported(info.ids, &labels) {
            " [label printer]"
        } else if is_supported(info.ids, &receipts) {
            " [receipt printer]"
        } else {
            ""
        };

        println!(
            "  {}  {}{}",
            info.ids,
            info.product.as_deref().unwrap_or("(unnamed device)"),
            kind
        );
    }

    Ok(())
}
