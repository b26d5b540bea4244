//! Per-class device selection state.
//!
//! The registry is the single slot holding "the printer we currently believe
//! usable" for one peripheral class. It is seeded once from enumeration,
//! kept in sync by hot-plug notifications, and overwritten by an explicit
//! grant from the selection flow. Handlers may fire from the bus event
//! thread while a job runs elsewhere, so the slot sits behind a mutex.

use crate::status::{self, StatusSink};
use crate::supported::{EndpointResolution, PeripheralClass, SupportedDevice};
use hostusb::{DeviceIds, DeviceInfo, HostDevice, HotplugEvent};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

pub struct Registry<D: HostDevice> {
    class: PeripheralClass,
    allow_list: Arc<Vec<SupportedDevice>>,
    status: Arc<dyn StatusSink>,
    slot: Arc<Mutex<Option<D>>>,
}

impl<D: HostDevice> Clone for Registry<D> {
    fn clone(&self) -> Self {
        Self {
            class: self.class,
            allow_list: Arc::clone(&self.allow_list),
            status: Arc::clone(&self.status),
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<D: HostDevice> Registry<D> {
    pub fn new(
        class: PeripheralClass,
        allow_list: Vec<SupportedDevice>,
        status: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            class,
            allow_list: Arc::new(allow_list),
            status,
            slot: Arc::new(Mutex::new(None)),
        }
    }

    pub fn class(&self) -> PeripheralClass {
        self.class
    }

    /// The (vendor, product) pairs of the allow-list, in table order. Used
    /// as the filter set for the selection flow.
    pub fn filters(&self) -> Vec<DeviceIds> {
        self.allow_list.iter().map(|entry| entry.ids).collect()
    }

    /// Endpoint policy of the allow-list entry matching `ids`.
    pub fn endpoint_policy(&self, ids: DeviceIds) -> Option<EndpointResolution> {
        crate::supported::supported_entry(ids, &self.allow_list).map(|entry| entry.endpoint)
    }

    fn is_supported(&self, ids: DeviceIds) -> bool {
        crate::supported::is_supported(ids, &self.allow_list)
    }

    /// The currently selected device, if any.
    pub fn selected(&self) -> Option<D> {
        self.slot.lock().unwrap().clone()
    }

    /// Identity snapshot of the current selection, if any.
    pub fn selected_info(&self) -> Option<DeviceInfo> {
        self.slot.lock().unwrap().as_ref().map(|d| d.info().clone())
    }

    /// Seed the selection from the host's already-authorized device list.
    ///
    /// The first supported device in enumeration order wins; later matches
    /// are deliberately ignored. Zero matches leave the slot empty and write
    /// no status.
    pub fn seed_from_enumeration(&self, devices: &[D]) {
        let mut selected = None;

        for device in devices {
            if !self.is_supported(device.info().ids) {
                continue;
            }
            if selected.is_none() {
                selected = Some(device.clone());
            } else {
                debug!(
                    "{}: ignoring additional authorized match {} (first match wins)",
                    self.class,
                    device.info().ids
                );
            }
        }

        if let Some(device) = selected {
            info!("{}: restored {} from enumeration", self.class, device.info().ids);
            *self.slot.lock().unwrap() = Some(device);
            self.status.set_status(&status::ready_text(self.class));
        }
    }

    /// React to a hot-plug notification.
    ///
    /// An attach fills an empty slot when the hardware is on the allow-list;
    /// it never displaces an existing selection. A detach clears the slot
    /// only when the identities match.
    pub fn handle_event(&self, event: &HotplugEvent<D>) {
        match event {
            HotplugEvent::Attached(device) => self.on_attached(device),
            HotplugEvent::Detached(info) => self.on_detached(info),
        }
    }

    fn on_attached(&self, device: &D) {
        if !self.is_supported(device.info().ids) {
            return;
        }

        {
            let mut slot = self.slot.lock().unwrap();
            if slot.is_some() {
                debug!(
                    "{}: attach of {} ignored, a device is already selected",
                    self.class,
                    device.info().ids
                );
                return;
            }
            *slot = Some(device.clone());
        }

        info!("{}: selected attached device {}", self.class, device.info().ids);
        self.status.set_status(&status::ready_text(self.class));
    }

    fn on_detached(&self, info: &DeviceInfo) {
        {
            let mut slot = self.slot.lock().unwrap();
            match slot.as_ref() {
                Some(current) if current.info().key == info.key => *slot = None,
                _ => return,
            }
        }

        info!("{}: selected device {} detached", self.class, info.ids);
        self.status.set_status(&status::disconnected_text(self.class));
    }

    /// Install a device granted by the selection flow, displacing any prior
    /// selection.
    pub fn select_granted(&self, device: D) {
        info!("{}: selected granted device {}", self.class, device.info().ids);
        *self.slot.lock().unwrap() = Some(device);
        self.status.set_status(&status::ready_text(self.class));
    }

    /// Drop the selection without a status update.
    ///
    /// Used when a job decides the handle is dead (policy-driven); the job's
    /// own failure status is what the operator sees.
    pub fn clear_silently(&self) {
        *self.slot.lock().unwrap() = None;
    }
}
