//! USB HID device presenting as a Stream Deck Mini
//!
//! The device declares a single HID interface without report IDs:
//!
//! - input: one byte per key, 0 or 1
//! - output: 1024 byte image blocks on the interrupt OUT endpoint
//! - feature: 32 byte command/query blocks on the control pipe
//!
//! Nothing here decodes the protocol. Output reports are copied into
//! [`HOST_REPORTS`] and feature reports into [`FEATURE_REPORTS`]; the
//! controller task decides what they mean.

use defmt::*;
use embassy_rp::peripherals;
use embassy_rp::usb::Driver;
use embassy_usb::class::hid::{
    Config as HidConfig, HidBootProtocol, HidReader, HidReaderWriter, HidSubclass, HidWriter, ReportId,
    RequestHandler, State,
};
use embassy_usb::control::OutResponse;
use embassy_usb::{Builder, Config, Handler};
use opendeck_core::CommandDispatcher;
use portable_atomic::Ordering;

use crate::channels::{HostMessage, FEATURE_REPORTS, HOST_REPORTS, INPUT_REPORTS, USB_CONFIGURED};
use crate::config::*;

type UsbDriver = Driver<'static, peripherals::USB>;

// ===================================================================
// USB HID Report Descriptor
// ===================================================================

const HID_REPORT_DESCRIPTOR: &[u8] = &[
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x00, // Usage (Undefined)
    0xa1, 0x01, // Collection (Application)
    // Input: key states
    0x09, 0x00, // Usage (Undefined)
    0x15, 0x00, // Logical Minimum (0)
    0x25, 0x01, // Logical Maximum (1)
    0x75, 0x08, // Report Size (8)
    0x95, HID_REPORT_SIZE_INPUT as u8, // Report Count
    0x81, 0x02, // Input (Data, Var, Abs)
    // Output: image data
    0x09, 0x00, // Usage (Undefined)
    0x15, 0x00, // Logical Minimum (0)
    0x26, 0xff, 0x00, // Logical Maximum (255)
    0x75, 0x08, // Report Size (8)
    0x96, HID_REPORT_SIZE_OUTPUT as u8, (HID_REPORT_SIZE_OUTPUT >> 8) as u8, // Report Count (16 bit)
    0x91, 0x02, // Output (Data, Var, Abs)
    // Feature: commands and queries
    0x09, 0x00, // Usage (Undefined)
    0x15, 0x00, // Logical Minimum (0)
    0x26, 0xff, 0x00, // Logical Maximum (255)
    0x75, 0x08, // Report Size (8)
    0x95, HID_REPORT_SIZE_FEATURE as u8, // Report Count
    0xb1, 0x02, // Feature (Data, Var, Abs)
    0xc0, // End Collection
];

// ===================================================================
// USB Configuration
// ===================================================================

fn create_usb_config() -> Config<'static> {
    let mut config = Config::new(USB_VID, USB_PID);
    config.manufacturer = Some(USB_MANUFACTURER);
    config.product = Some(USB_PRODUCT);
    config.serial_number = Some(USB_SERIAL);
    config.device_release = USB_BCD_DEVICE;
    config.max_power = 100;
    config.max_packet_size_0 = 64;
    // Interface-defined class
    config.device_class = 0x00;
    config.device_sub_class = 0x00;
    config.device_protocol = 0x00;
    config.composite_with_iads = false;
    config
}

// ===================================================================
// Device state handler
// ===================================================================

/// Mirrors the USB configuration state into [`USB_CONFIGURED`].
struct ConnectionHandler;

impl Handler for ConnectionHandler {
    fn enabled(&mut self, enabled: bool) {
        if !enabled {
            USB_CONFIGURED.store(false, Ordering::Relaxed);
        }
    }

    fn reset(&mut self) {
        USB_CONFIGURED.store(false, Ordering::Relaxed);
    }

    fn configured(&mut self, configured: bool) {
        USB_CONFIGURED.store(configured, Ordering::Relaxed);
        if configured {
            info!("USB configured by host");
        } else {
            info!("USB no longer configured");
        }
    }
}

// ===================================================================
// HID Request Handler
// ===================================================================

/// Serves GET_FEATURE from the dispatcher and forwards SET_FEATURE to the
/// controller.
struct FeatureHandler {
    dispatcher: CommandDispatcher,
}

impl FeatureHandler {
    /// Without report IDs in the descriptor the host may send ID 0, the
    /// real ID is then the first data byte.
    fn resolve_id(id: u8, data: &[u8]) -> u8 {
        match (id, data.first()) {
            (0, Some(&first)) => first,
            _ => id,
        }
    }
}

impl RequestHandler for FeatureHandler {
    fn get_report(&mut self, id: ReportId, buf: &mut [u8]) -> Option<usize> {
        match id {
            ReportId::Feature(report_id) => {
                let len = self.dispatcher.build_feature_report(report_id, buf);
                if len.is_none() {
                    warn!("GET_FEATURE for unknown report 0x{:02X}", report_id);
                }
                len
            }
            _ => None,
        }
    }

    fn set_report(&mut self, id: ReportId, data: &[u8]) -> OutResponse {
        match id {
            ReportId::Feature(report_id) => {
                let report_id = Self::resolve_id(report_id, data);
                debug!("SET_FEATURE 0x{:02X}, {} bytes", report_id, data.len());
                match FEATURE_REPORTS.try_send(HostMessage::feature(report_id, data)) {
                    Ok(()) => OutResponse::Accepted,
                    Err(_) => {
                        // Stall so the host knows to retry
                        warn!("Feature queue full, rejecting 0x{:02X}", report_id);
                        OutResponse::Rejected
                    }
                }
            }
            ReportId::Out(_) => {
                // Output reports arrive on the interrupt endpoint
                match HOST_REPORTS.try_send(HostMessage::output(data)) {
                    Ok(()) => OutResponse::Accepted,
                    Err(_) => {
                        warn!("Host report queue full, control output report rejected");
                        OutResponse::Rejected
                    }
                }
            }
            ReportId::In(_) => OutResponse::Rejected,
        }
    }
}

// ===================================================================
// USB Task Implementation
// ===================================================================

#[embassy_executor::task]
pub async fn usb_task(driver: UsbDriver) {
    info!("USB task started");

    let config = create_usb_config();

    // The task future is 'static, so locals outlive the device
    let mut config_descriptor = [0u8; 256];
    let mut bos_descriptor = [0u8; 256];
    let mut control_buf = [0u8; 64];
    let mut connection = ConnectionHandler;
    let mut features = FeatureHandler {
        dispatcher: CommandDispatcher::default(),
    };
    let mut state = State::new();

    let mut builder = Builder::new(
        driver,
        config,
        &mut config_descriptor,
        &mut bos_descriptor,
        &mut [],
        &mut control_buf,
    );
    builder.handler(&mut connection);

    let hid_config = HidConfig {
        report_descriptor: HID_REPORT_DESCRIPTOR,
        request_handler: Some(&mut features),
        poll_ms: USB_POLL_RATE_MS,
        max_packet_size: 64,
        hid_subclass: HidSubclass::No,
        hid_boot_protocol: HidBootProtocol::None,
    };
    info!("HID report descriptor: {} bytes", HID_REPORT_DESCRIPTOR.len());

    let hid = HidReaderWriter::<_, HID_REPORT_SIZE_OUTPUT, 64>::new(&mut builder, &mut state, hid_config);
    let mut usb = builder.build();
    let (reader, writer) = hid.split();

    embassy_futures::join::join3(usb.run(), output_reports(reader), input_reports(writer)).await;
}

/// Copy interrupt OUT reports into the host queue, waiting for room so image
/// data is never dropped.
async fn output_reports<'d>(mut reader: HidReader<'d, Driver<'d, peripherals::USB>, HID_REPORT_SIZE_OUTPUT>) {
    let mut buf = [0u8; HID_REPORT_SIZE_OUTPUT];
    loop {
        reader.ready().await;
        match reader.read(&mut buf).await {
            Ok(len) => {
                trace!("Output report: {} bytes", len);
                HOST_REPORTS.send(HostMessage::output(&buf[..len])).await;
            }
            Err(e) => {
                warn!("Output report read failed: {:?}", e);
            }
        }
    }
}

/// Forward controller input reports to the host.
async fn input_reports<'d>(mut writer: HidWriter<'d, Driver<'d, peripherals::USB>, 64>) {
    let receiver = INPUT_REPORTS.receiver();
    loop {
        let report = receiver.receive().await;
        match writer.write(&report).await {
            Ok(()) => debug!("Input report sent: {:?}", report.as_slice()),
            Err(e) => warn!("Failed to send input report: {:?}", e),
        }
    }
}
