//! StreamDeck V1 feature commands
//!
//! V1 hosts (Original, Mini) use dedicated report IDs per command and a
//! magic prefix on brightness writes.

use crate::config::{STREAMDECK_BRIGHTNESS_MAGIC, STREAMDECK_RESET_MAGIC, VERSION_OFFSET_V1};
use crate::error::ProtocolError;
use crate::types::{Brightness, ProtocolVersion};

use super::{write_string_report, Command};

/// Reset: `[0x0B, 0x63, ...]`
pub(super) fn parse_reset(bytes: &[u8]) -> Result<Option<Command<'static>>, ProtocolError> {
    match bytes.get(1) {
        None => Err(ProtocolError::TooShort {
            len: bytes.len(),
            needed: 2,
        }),
        Some(&STREAMDECK_RESET_MAGIC) => Ok(Some(Command::Reset {
            version: ProtocolVersion::V1,
        })),
        Some(_) => Ok(None),
    }
}

/// Brightness: `[0x05, 0x55, 0xAA, 0xD1, 0x01, percent, ...]`
pub(super) fn parse_brightness(bytes: &[u8]) -> Result<Option<Command<'static>>, ProtocolError> {
    let magic_end = 1 + STREAMDECK_BRIGHTNESS_MAGIC.len();
    match bytes.get(1..magic_end) {
        Some(magic) if magic == STREAMDECK_BRIGHTNESS_MAGIC => {
            let percent = *bytes.get(magic_end).ok_or(ProtocolError::TooShort {
                len: bytes.len(),
                needed: magic_end + 1,
            })?;
            Ok(Some(Command::SetBrightness {
                level: Brightness::new(percent),
                version: ProtocolVersion::V1,
            }))
        }
        _ => Ok(None),
    }
}

/// GET 0x04: firmware version at the V1 offset.
pub(super) fn version_report(report_id: u8, version: &str, buf: &mut [u8]) -> usize {
    write_string_report(report_id, VERSION_OFFSET_V1, version, buf)
}
