//! Seam between the device logic and the USB HID stack.

use crate::error::TransportError;

/// A report received from the host. Buffers start with the report ID byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HostReport<'a> {
    Feature { report_id: u8, data: &'a [u8] },
    Output(&'a [u8]),
}

pub trait HidTransport {
    /// Host has configured the device and reads input reports.
    fn is_connected(&self) -> bool;

    /// Next pending host report, if any. Never blocks.
    fn poll_report(&mut self) -> Option<HostReport<'_>>;

    /// Queue one input report. Never blocks; a full queue is `Busy`.
    fn send_input_report(&mut self, report: &[u8]) -> Result<(), TransportError>;
}
