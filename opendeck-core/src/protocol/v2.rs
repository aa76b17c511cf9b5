//! StreamDeck V2 feature commands
//!
//! V2 hosts multiplex reset and brightness through one container report
//! (`0x03`) and pick the command with byte 1.

use crate::config::{SERIAL_OFFSET, V2_COMMAND_BRIGHTNESS, V2_COMMAND_RESET, VERSION_OFFSET_V2};
use crate::error::ProtocolError;
use crate::types::{Brightness, ProtocolVersion};

use super::{write_string_report, Command};

/// Container: `[0x03, sub_command, args...]`
pub(super) fn parse_command(bytes: &[u8]) -> Result<Option<Command<'static>>, ProtocolError> {
    let too_short = |needed| ProtocolError::TooShort {
        len: bytes.len(),
        needed,
    };

    match bytes.get(1).copied() {
        None => Err(too_short(2)),
        Some(V2_COMMAND_RESET) => Ok(Some(Command::Reset {
            version: ProtocolVersion::V2,
        })),
        Some(V2_COMMAND_BRIGHTNESS) => {
            let percent = *bytes.get(2).ok_or(too_short(3))?;
            Ok(Some(Command::SetBrightness {
                level: Brightness::new(percent),
                version: ProtocolVersion::V2,
            }))
        }
        Some(sub) => {
            debug!("Unknown V2 command: 0x{:02X}", sub);
            Ok(None)
        }
    }
}

/// GET 0x05: firmware version, one byte further in than V1.
pub(super) fn version_report(report_id: u8, version: &str, buf: &mut [u8]) -> usize {
    write_string_report(report_id, VERSION_OFFSET_V2, version, buf)
}

/// GET 0x03: serial number.
pub(super) fn serial_report(report_id: u8, serial: &str, buf: &mut [u8]) -> usize {
    write_string_report(report_id, SERIAL_OFFSET, serial, buf)
}
