//! Inter-task communication channels
//!
//! The controller task owns all device state. Everything else talks to it
//! through the queues and flags below.

use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use heapless::Vec;
use opendeck_core::{Diagnostics, HostReport};
use portable_atomic::AtomicBool;

use crate::config::{
    FEATURE_REPORT_QUEUE, HID_REPORT_SIZE_FEATURE, HID_REPORT_SIZE_OUTPUT, HOST_REPORT_QUEUE, INPUT_REPORT_QUEUE, KEY_COUNT,
};

/// A host report copied out of the USB stack, report ID byte first.
pub enum HostMessage {
    Feature {
        report_id: u8,
        data: Vec<u8, HID_REPORT_SIZE_FEATURE>,
    },
    Output(Vec<u8, HID_REPORT_SIZE_OUTPUT>),
}

impl HostMessage {
    /// Copy a SET_FEATURE payload, truncated to the feature report size.
    pub fn feature(report_id: u8, data: &[u8]) -> Self {
        let len = data.len().min(HID_REPORT_SIZE_FEATURE);
        let mut copy = Vec::new();
        // Cannot fail, `len` fits the capacity
        let _ = copy.extend_from_slice(&data[..len]);
        Self::Feature { report_id, data: copy }
    }

    pub fn output(data: &[u8]) -> Self {
        let len = data.len().min(HID_REPORT_SIZE_OUTPUT);
        let mut copy = Vec::new();
        let _ = copy.extend_from_slice(&data[..len]);
        Self::Output(copy)
    }

    pub fn as_report(&self) -> HostReport<'_> {
        match self {
            Self::Feature { report_id, data } => HostReport::Feature {
                report_id: *report_id,
                data,
            },
            Self::Output(data) => HostReport::Output(data),
        }
    }
}

pub type InputReport = Vec<u8, KEY_COUNT>;

/// USB stack -> controller, output reports
pub static HOST_REPORTS: Channel<ThreadModeRawMutex, HostMessage, HOST_REPORT_QUEUE> = Channel::new();

/// USB control pipe -> controller, drained before [`HOST_REPORTS`]
pub static FEATURE_REPORTS: Channel<ThreadModeRawMutex, HostMessage, FEATURE_REPORT_QUEUE> = Channel::new();

/// Controller -> HID writer
pub static INPUT_REPORTS: Channel<ThreadModeRawMutex, InputReport, INPUT_REPORT_QUEUE> = Channel::new();

/// Controller -> supervisor, latest snapshot wins
pub static DIAGNOSTICS: Signal<ThreadModeRawMutex, Diagnostics> = Signal::new();

/// Set while the host has the device configured.
pub static USB_CONFIGURED: AtomicBool = AtomicBool::new(false);

/// Set while the controller sits in the faulted state.
pub static DECK_FAULTED: AtomicBool = AtomicBool::new(false);
