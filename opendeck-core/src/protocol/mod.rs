//! StreamDeck protocol layer
//!
//! Decodes host feature and output reports into [`Command`]s and builds the
//! feature reports the host reads back. V1 and V2 hosts use different report
//! IDs for the same operations; the ID is matched first, then the byte
//! pattern settles which dialect sent it.
//!
//! All report buffers handed in here start with the report ID byte.

mod v1;
mod v2;

use crate::buttons::ButtonState;
use crate::config::{
    FEATURE_REPORT_BRIGHTNESS_V1, FEATURE_REPORT_RESET_V1, FEATURE_REPORT_SERIAL_NUMBER,
    FEATURE_REPORT_V2_COMMANDS, FEATURE_REPORT_VERSION_V1, FEATURE_REPORT_VERSION_V2,
    FIRMWARE_VERSION, HID_REPORT_SIZE_FEATURE, IMAGE_COMMAND_V2, OUTPUT_HEADER_LEN,
    OUTPUT_REPORT_IMAGE, USB_SERIAL,
};
use crate::error::ProtocolError;
use crate::types::{Brightness, ProtocolVersion};

/// One fragment of a key image, borrowed from the output report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ImageChunk<'a> {
    pub key: u8,
    pub sequence: u16,
    pub is_last: bool,
    pub payload: &'a [u8],
}

/// Decoded host command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command<'a> {
    Reset {
        version: ProtocolVersion,
    },
    SetBrightness {
        level: Brightness,
        version: ProtocolVersion,
    },
    ImageChunk(ImageChunk<'a>),
    /// Unrecognised ID or sub-command. Ignored, not an error to the host.
    Unknown {
        report_id: u8,
    },
}

/// Stateless report decoder plus the identity strings served to GET requests.
#[derive(Debug, Clone, Copy)]
pub struct CommandDispatcher {
    firmware_version: &'static str,
    serial: &'static str,
}

impl CommandDispatcher {
    pub const fn new(firmware_version: &'static str, serial: &'static str) -> Self {
        Self {
            firmware_version,
            serial,
        }
    }

    /// Decode a SET_FEATURE request.
    pub fn handle_feature_report<'a>(
        &self,
        report_id: u8,
        bytes: &'a [u8],
    ) -> Result<Command<'a>, ProtocolError> {
        let decoded = match report_id {
            FEATURE_REPORT_RESET_V1 => v1::parse_reset(bytes)?,
            FEATURE_REPORT_BRIGHTNESS_V1 => v1::parse_brightness(bytes)?,
            FEATURE_REPORT_V2_COMMANDS => v2::parse_command(bytes)?,
            _ => None,
        };

        Ok(decoded.unwrap_or_else(|| {
            debug!("Unhandled feature report 0x{:02X} ({} bytes)", report_id, bytes.len());
            Command::Unknown { report_id }
        }))
    }

    /// Decode an output report.
    ///
    /// Layout: `[0x02, 0x07, key, is_last, len_lo, len_hi, seq_lo, seq_hi, payload...]`.
    /// `payload_len` larger than what actually arrived is truncated to the
    /// bytes present.
    pub fn handle_output_report<'a>(&self, bytes: &'a [u8]) -> Result<Command<'a>, ProtocolError> {
        if bytes.len() < OUTPUT_HEADER_LEN {
            return Err(ProtocolError::TooShort {
                len: bytes.len(),
                needed: OUTPUT_HEADER_LEN,
            });
        }

        if bytes[0] != OUTPUT_REPORT_IMAGE || bytes[1] != IMAGE_COMMAND_V2 {
            debug!("Unknown output report format: [0x{:02X}, 0x{:02X}]", bytes[0], bytes[1]);
            return Ok(Command::Unknown {
                report_id: bytes[0],
            });
        }

        let payload_len = usize::from(u16::from_le_bytes([bytes[4], bytes[5]]));
        let body = &bytes[OUTPUT_HEADER_LEN..];
        let payload = &body[..payload_len.min(body.len())];

        Ok(Command::ImageChunk(ImageChunk {
            key: bytes[2],
            sequence: u16::from_le_bytes([bytes[6], bytes[7]]),
            is_last: bytes[3] != 0,
            payload,
        }))
    }

    /// Answer a GET_FEATURE request. Returns the report length, or `None`
    /// for IDs this device does not serve.
    pub fn build_feature_report(&self, report_id: u8, buf: &mut [u8]) -> Option<usize> {
        match report_id {
            FEATURE_REPORT_VERSION_V1 => Some(v1::version_report(report_id, self.firmware_version, buf)),
            FEATURE_REPORT_VERSION_V2 => Some(v2::version_report(report_id, self.firmware_version, buf)),
            FEATURE_REPORT_SERIAL_NUMBER => Some(v2::serial_report(report_id, self.serial, buf)),
            _ => None,
        }
    }
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self::new(FIRMWARE_VERSION, USB_SERIAL)
    }
}

/// Zero-filled feature report with `text` at `offset`, truncated to fit.
fn write_string_report(report_id: u8, offset: usize, text: &str, buf: &mut [u8]) -> usize {
    let len = buf.len().min(HID_REPORT_SIZE_FEATURE);
    let report = &mut buf[..len];
    report.fill(0);

    if let Some(first) = report.first_mut() {
        *first = report_id;
    }
    if let Some(dest) = report.get_mut(offset..) {
        let n = dest.len().min(text.len());
        dest[..n].copy_from_slice(&text.as_bytes()[..n]);
    }
    len
}

/// Input report: one byte per key, 1 = pressed, no report ID.
pub fn format_input_report(states: &[ButtonState], out: &mut [u8]) -> usize {
    let len = states.len().min(out.len());
    for (byte, state) in out.iter_mut().zip(states.iter()) {
        *byte = u8::from(state.current);
    }
    len
}
