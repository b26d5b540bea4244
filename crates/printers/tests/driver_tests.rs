//! Driver-level tests against the mock host bus.
//!
//! Covers selection state across enumeration and hot-plug, the selection
//! prompt, the open/close pairing under fault injection at every job step,
//! and the selection-invalidation policy knobs.

use hostusb::mock::{MockBehavior, MockBus};
use hostusb::{Direction, EndpointInfo, HostDevice, HotplugEvent};
use printers::status::StatusSink;
use printers::{
    DriverPolicy, EndpointResolution, PeripheralClass, PrintError, PrinterDriver, SupportedDevice,
    label_printers, receipt_printers,
};
use std::sync::{Arc, Mutex};

/// Records every status write for assertions.
#[derive(Default)]
struct RecordingSink {
    writes: Mutex<Vec<String>>,
}

impl RecordingSink {
    fn all(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    fn last(&self) -> Option<String> {
        self.writes.lock().unwrap().last().cloned()
    }
}

impl StatusSink for RecordingSink {
    fn set_status(&self, text: &str) {
        self.writes.lock().unwrap().push(text.to_string());
    }
}

fn label_driver(
    sink: Arc<RecordingSink>,
    policy: DriverPolicy,
) -> PrinterDriver<hostusb::mock::MockDevice> {
    PrinterDriver::new(
        PeripheralClass::LabelPrinter,
        label_printers(),
        policy,
        sink,
    )
}

fn receipt_driver(sink: Arc<RecordingSink>) -> PrinterDriver<hostusb::mock::MockDevice> {
    PrinterDriver::new(
        PeripheralClass::ReceiptPrinter,
        receipt_printers(),
        DriverPolicy::default(),
        sink,
    )
}

#[test]
fn enumeration_with_no_match_stays_unselected_and_silent() {
    let mut bus = MockBus::new();
    bus.add_authorized_device(0xAAAA, 0x0001);

    let sink = Arc::new(RecordingSink::default());
    let driver = label_driver(Arc::clone(&sink), DriverPolicy::default());
    driver.initialize(&mut bus).unwrap();

    assert!(driver.selected_info().is_none());
    assert!(sink.all().is_empty());
}

#[test]
fn enumeration_restores_authorized_label_printer() {
    let mut bus = MockBus::new();
    let zebra = bus.add_authorized_device(0x0A5F, 0x0015);

    let sink = Arc::new(RecordingSink::default());
    let driver = label_driver(Arc::clone(&sink), DriverPolicy::default());
    driver.initialize(&mut bus).unwrap();

    let selected = driver.selected_info().expect("printer should be selected");
    assert_eq!(selected.ids, zebra.info().ids);
    assert_eq!(sink.last().as_deref(), Some("Label printer ready."));
}

#[test]
fn enumeration_first_match_wins() {
    let mut bus = MockBus::new();
    let first = bus.add_authorized_device(0x0A5F, 0x0015);
    let second = bus.add_authorized_device(0x0A5F, 0x00A3);

    let driver = label_driver(Arc::new(RecordingSink::default()), DriverPolicy::default());
    driver.initialize(&mut bus).unwrap();

    let selected = driver.selected_info().unwrap();
    assert_eq!(selected.key, first.info().key);
    assert_ne!(selected.key, second.info().key);
}

#[test]
fn attach_event_selects_supported_device() {
    let mut bus = MockBus::new();
    let sink = Arc::new(RecordingSink::default());
    let driver = label_driver(Arc::clone(&sink), DriverPolicy::default());
    driver.initialize(&mut bus).unwrap();
    assert!(driver.selected_info().is_none());

    let zebra = bus.controller().attach(0x0A5F, 0x00A3);
    driver
        .registry()
        .handle_event(&HotplugEvent::Attached(zebra.clone()));

    assert_eq!(driver.selected_info().unwrap().ids, zebra.info().ids);
    assert_eq!(sink.last().as_deref(), Some("Label printer ready."));
}

#[test]
fn attach_event_ignores_unsupported_device() {
    let mut bus = MockBus::new();
    let sink = Arc::new(RecordingSink::default());
    let driver = label_driver(Arc::clone(&sink), DriverPolicy::default());

    let other = bus.controller().attach(0x1234, 0x5678);
    driver.registry().handle_event(&HotplugEvent::Attached(other));

    assert!(driver.selected_info().is_none());
    assert!(sink.all().is_empty());
}

#[test]
fn attach_event_does_not_displace_existing_selection() {
    let mut bus = MockBus::new();
    let first = bus.add_authorized_device(0x0A5F, 0x0015);

    let driver = label_driver(Arc::new(RecordingSink::default()), DriverPolicy::default());
    driver.initialize(&mut bus).unwrap();

    let second = bus.controller().attach(0x0A5F, 0x00A3);
    driver.registry().handle_event(&HotplugEvent::Attached(second));

    assert_eq!(driver.selected_info().unwrap().key, first.info().key);
}

#[test]
fn detach_of_other_device_changes_nothing() {
    let mut bus = MockBus::new();
    bus.add_authorized_device(0x0A5F, 0x0015);
    let other = bus.add_authorized_device(0x1234, 0x5678);

    let sink = Arc::new(RecordingSink::default());
    let driver = label_driver(Arc::clone(&sink), DriverPolicy::default());
    driver.initialize(&mut bus).unwrap();
    let writes_before = sink.all().len();

    driver
        .registry()
        .handle_event(&HotplugEvent::Detached(other.info().clone()));

    assert!(driver.selected_info().is_some());
    assert_eq!(sink.all().len(), writes_before);
}

#[test]
fn detach_of_selected_device_clears_and_reports() {
    let mut bus = MockBus::new();
    let zebra = bus.add_authorized_device(0x0A5F, 0x0015);

    let sink = Arc::new(RecordingSink::default());
    let driver = label_driver(Arc::clone(&sink), DriverPolicy::default());
    driver.initialize(&mut bus).unwrap();

    driver
        .registry()
        .handle_event(&HotplugEvent::Detached(zebra.info().clone()));

    assert!(driver.selected_info().is_none());
    assert_eq!(sink.last().as_deref(), Some("Label printer disconnected."));
}

#[test]
fn ensure_selected_prompts_at_most_once() {
    let mut bus = MockBus::new();
    bus.add_ungranted_device(0x0A5F, 0x0015);

    let driver = label_driver(Arc::new(RecordingSink::default()), DriverPolicy::default());

    driver.ensure_selected(&mut bus).unwrap();
    driver.ensure_selected(&mut bus).unwrap();

    assert_eq!(bus.prompt_count(), 1);
}

#[test]
fn denied_prompt_fails_without_opening_anything() {
    let mut bus = MockBus::new();
    let zebra = bus.add_ungranted_device(0x0A5F, 0x0015);
    bus.deny_requests();

    let sink = Arc::new(RecordingSink::default());
    let driver = label_driver(Arc::clone(&sink), DriverPolicy::default());

    let err = driver.print(&mut bus, b"^XA^XZ").unwrap_err();

    assert_eq!(err, PrintError::NoDeviceChosen);
    assert_eq!(sink.last().as_deref(), Some("No printer selected."));
    assert_eq!(zebra.opens(), 0);
}

#[test]
fn print_to_fixed_endpoint_transfers_and_closes() {
    let mut bus = MockBus::new();
    let zebra = bus.add_authorized_device(0x0A5F, 0x0015);

    // A model whose output endpoint number is known up front.
    let allow_list = vec![SupportedDevice::new(
        0x0A5F,
        0x0015,
        "Zebra LP-2824",
        EndpointResolution::Fixed(6),
    )];
    let driver = PrinterDriver::new(
        PeripheralClass::LabelPrinter,
        allow_list,
        DriverPolicy::default(),
        Arc::new(RecordingSink::default()),
    );
    driver.initialize(&mut bus).unwrap();

    let payload = b"^XA^FDLot 17^FS^XZ";
    driver.print(&mut bus, payload).unwrap();

    assert_eq!(zebra.writes(), [(6, payload.to_vec())]);
    assert_eq!(zebra.opens(), 1);
    assert_eq!(zebra.closes(), 1);
}

#[test]
fn print_discovers_out_endpoint() {
    let mut bus = MockBus::new();
    let zebra = bus.add_authorized_device_with(
        0x0A5F,
        0x0015,
        MockBehavior::with_endpoints(vec![
            EndpointInfo::new(2, Direction::In),
            EndpointInfo::new(3, Direction::Out),
        ]),
    );

    let driver = label_driver(Arc::new(RecordingSink::default()), DriverPolicy::default());
    driver.initialize(&mut bus).unwrap();
    driver.print(&mut bus, b"^XA^XZ").unwrap();

    assert_eq!(zebra.writes(), [(3, b"^XA^XZ".to_vec())]);
    assert_eq!(zebra.configurations(), [1]);
    assert_eq!(zebra.claims(), [0]);
}

#[test]
fn print_without_out_endpoint_fails_with_endpoint_not_found() {
    let mut bus = MockBus::new();
    let zebra = bus.add_authorized_device_with(
        0x0A5F,
        0x0015,
        MockBehavior::with_endpoints(vec![EndpointInfo::new(2, Direction::In)]),
    );

    let sink = Arc::new(RecordingSink::default());
    let driver = label_driver(Arc::clone(&sink), DriverPolicy::default());
    driver.initialize(&mut bus).unwrap();

    let err = driver.print(&mut bus, b"^XA^XZ").unwrap_err();

    assert_eq!(err, PrintError::EndpointNotFound);
    assert_eq!(zebra.opens(), 1);
    assert_eq!(zebra.closes(), 1);
    assert!(sink.last().unwrap().starts_with("Label printer error:"));
}

#[test]
fn every_failing_step_still_balances_open_and_close() {
    let behaviors = [
        MockBehavior::fail_configure(),
        MockBehavior::fail_claim(),
        MockBehavior::fail_transfer(),
    ];

    for behavior in behaviors {
        let mut bus = MockBus::new();
        let zebra = bus.add_authorized_device_with(0x0A5F, 0x0015, behavior);

        let driver = label_driver(Arc::new(RecordingSink::default()), DriverPolicy::default());
        driver.initialize(&mut bus).unwrap();

        assert!(driver.print(&mut bus, b"^XA^XZ").is_err());
        assert_eq!(zebra.opens(), 1, "device must be opened once");
        assert_eq!(zebra.closes(), 1, "device must be closed exactly once");
    }
}

#[test]
fn open_failure_never_opens_so_never_closes() {
    let mut bus = MockBus::new();
    let zebra = bus.add_authorized_device_with(0x0A5F, 0x0015, MockBehavior::fail_open());

    let driver = label_driver(Arc::new(RecordingSink::default()), DriverPolicy::default());
    driver.initialize(&mut bus).unwrap();

    let err = driver.print(&mut bus, b"^XA^XZ").unwrap_err();

    assert!(matches!(err, PrintError::DeviceUnavailable(_)));
    assert_eq!(zebra.opens(), 0);
    assert_eq!(zebra.closes(), 0);
}

#[test]
fn open_failure_clears_selection_by_default() {
    let mut bus = MockBus::new();
    bus.add_authorized_device_with(0x0A5F, 0x0015, MockBehavior::fail_open());

    let driver = label_driver(Arc::new(RecordingSink::default()), DriverPolicy::default());
    driver.initialize(&mut bus).unwrap();
    assert!(driver.selected_info().is_some());

    let _ = driver.print(&mut bus, b"^XA^XZ");
    assert!(driver.selected_info().is_none());
}

#[test]
fn open_failure_keeps_selection_when_policy_disabled() {
    let mut bus = MockBus::new();
    bus.add_authorized_device_with(0x0A5F, 0x0015, MockBehavior::fail_open());

    let policy = DriverPolicy {
        clear_selection_on_open_failure: false,
        clear_selection_on_transfer_failure: false,
    };
    let driver = label_driver(Arc::new(RecordingSink::default()), policy);
    driver.initialize(&mut bus).unwrap();

    let _ = driver.print(&mut bus, b"^XA^XZ");
    assert!(driver.selected_info().is_some());
}

#[test]
fn transfer_failure_keeps_selection_by_default() {
    let mut bus = MockBus::new();
    bus.add_authorized_device_with(0x0A5F, 0x0015, MockBehavior::fail_transfer());

    let driver = label_driver(Arc::new(RecordingSink::default()), DriverPolicy::default());
    driver.initialize(&mut bus).unwrap();

    let err = driver.print(&mut bus, b"^XA^XZ").unwrap_err();
    assert!(matches!(err, PrintError::TransferFailed(_)));
    assert!(driver.selected_info().is_some());
}

#[test]
fn transfer_failure_clears_selection_when_policy_enabled() {
    let mut bus = MockBus::new();
    bus.add_authorized_device_with(0x0A5F, 0x0015, MockBehavior::fail_transfer());

    let policy = DriverPolicy {
        clear_selection_on_open_failure: true,
        clear_selection_on_transfer_failure: true,
    };
    let driver = label_driver(Arc::new(RecordingSink::default()), policy);
    driver.initialize(&mut bus).unwrap();

    let _ = driver.print(&mut bus, b"^XA^XZ");
    assert!(driver.selected_info().is_none());
}

#[test]
fn receipt_printer_writes_to_its_fixed_endpoint() {
    let mut bus = MockBus::new();
    let epson = bus.add_authorized_device(0x04B8, 0x0202);

    let sink = Arc::new(RecordingSink::default());
    let driver = receipt_driver(Arc::clone(&sink));
    driver.initialize(&mut bus).unwrap();
    assert_eq!(sink.last().as_deref(), Some("Receipt printer ready."));

    let payload = b"\x1b@Sold: Lot 17\n\x1dV\x00";
    driver.print(&mut bus, payload).unwrap();

    assert_eq!(epson.writes(), [(1, payload.to_vec())]);
    assert_eq!(epson.opens(), 1);
    assert_eq!(epson.closes(), 1);
}

#[test]
fn granted_selection_is_usable_for_the_job() {
    let mut bus = MockBus::new();
    let epson = bus.add_ungranted_device(0x04B8, 0x0202);

    let sink = Arc::new(RecordingSink::default());
    let driver = receipt_driver(Arc::clone(&sink));
    driver.initialize(&mut bus).unwrap();
    assert!(driver.selected_info().is_none());

    driver.print(&mut bus, b"receipt").unwrap();

    assert_eq!(bus.prompt_count(), 1);
    assert_eq!(epson.writes().len(), 1);
    assert_eq!(sink.all()[0], "Receipt printer ready.");
}
