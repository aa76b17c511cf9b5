//! Configuration for the emulated Stream Deck Mini
//!
//! Wire-level constants must match the real device byte for byte, otherwise
//! the host software refuses to talk to us. Behavioural knobs that do not
//! affect the wire format are grouped in [`DeckConfig`].

// ===================================================================
// USB Identity - CRITICAL: Must match StreamDeck Mini
// ===================================================================

pub const USB_VID: u16 = 0x0fd9; // Elgato Systems VID
pub const USB_PID: u16 = 0x0063; // StreamDeck Mini PID
pub const USB_MANUFACTURER: &str = "Elgato Systems";
pub const USB_PRODUCT: &str = "Stream Deck Mini";
// Real devices report a 12 character uppercase alphanumeric serial
pub const USB_SERIAL: &str = "OD2401000001";
pub const USB_BCD_DEVICE: u16 = 0x0100;

/// Version string reported through the version feature reports.
pub const FIRMWARE_VERSION: &str = "1.0.0";

// ===================================================================
// Device Specifications (StreamDeck Mini)
// ===================================================================

pub const KEY_COUNT: usize = 6; // Number of keys (3x2 layout)
pub const KEY_COLS: usize = 3; // Keys per row
pub const KEY_ROWS: usize = 2; // Number of rows
pub const KEY_IMAGE_SIZE: usize = 80; // 80x80 pixels per key
pub const KEY_IMAGE_BYTES: usize = KEY_IMAGE_SIZE * KEY_IMAGE_SIZE * 3; // RGB888

/// Per-key reassembly capacity: one full RGB image plus room for a BMP header.
pub const IMAGE_BUFFER_SIZE: usize = KEY_IMAGE_BYTES + 100;

// ===================================================================
// USB HID Reports
// ===================================================================

pub const HID_REPORT_SIZE_INPUT: usize = KEY_COUNT; // One byte per key, no report ID
pub const HID_REPORT_SIZE_OUTPUT: usize = 1024;
pub const HID_REPORT_SIZE_FEATURE: usize = 32;

// Output reports
pub const OUTPUT_REPORT_IMAGE: u8 = 0x02;
pub const IMAGE_COMMAND_V2: u8 = 0x07;
pub const OUTPUT_HEADER_LEN: usize = 8;

// Feature report IDs
pub const FEATURE_REPORT_SERIAL_NUMBER: u8 = 0x03;
pub const FEATURE_REPORT_VERSION_V1: u8 = 0x04;
pub const FEATURE_REPORT_VERSION_V2: u8 = 0x05;
pub const FEATURE_REPORT_RESET_V1: u8 = 0x0B;
pub const FEATURE_REPORT_BRIGHTNESS_V1: u8 = 0x05;
pub const FEATURE_REPORT_V2_COMMANDS: u8 = 0x03; // V2 command container

// V2 sub-commands (byte 1 of FEATURE_REPORT_V2_COMMANDS)
pub const V2_COMMAND_RESET: u8 = 0x02;
pub const V2_COMMAND_BRIGHTNESS: u8 = 0x08;

// StreamDeck protocol magic bytes
pub const STREAMDECK_BRIGHTNESS_MAGIC: [u8; 4] = [0x55, 0xAA, 0xD1, 0x01];
pub const STREAMDECK_RESET_MAGIC: u8 = 0x63;

// Where the version / serial string starts inside a GET feature report
pub const VERSION_OFFSET_V1: usize = 5;
pub const VERSION_OFFSET_V2: usize = 6;
pub const SERIAL_OFFSET: usize = 5;

// Hosts may send a complete BMP file instead of a bare pixel buffer
pub const BMP_MAGIC: [u8; 2] = *b"BM";
pub const BMP_HEADER_LEN: usize = 54;

// ===================================================================
// Timing and Behaviour Defaults
// ===================================================================

pub const BUTTON_DEBOUNCE_MS: u64 = 20; // Button debounce time
pub const BUTTON_SCAN_RATE_HZ: u64 = 100; // Button scan frequency
pub const DEFAULT_BRIGHTNESS: u8 = 100; // Percent
pub const IMAGE_TRANSFER_TIMEOUT_MS: u64 = 2_000;
pub const MAX_REPORTS_PER_STEP: usize = 4;

/// Runtime behaviour of a [`crate::DeckController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeckConfig {
    /// A raw button reading must hold this long before it is accepted.
    pub debounce_ms: u64,
    /// Minimum time between two scan passes.
    pub scan_interval_ms: u64,
    /// Key image geometry handed to the display sink.
    pub key_width: u16,
    pub key_height: u16,
    /// Brightness applied at init and after a device reset (percent).
    pub default_brightness: u8,
    /// Receiving transfers idle for this long are reclaimed. `None` keeps
    /// them until the host restarts or resets.
    pub transfer_timeout_ms: Option<u64>,
    /// Upper bound on host reports drained per step, keeps one step bounded.
    pub max_reports_per_step: usize,
}

impl DeckConfig {
    /// Reference configuration: Stream Deck Mini, 100 Hz scan, 20 ms debounce.
    pub const fn mini() -> Self {
        Self {
            debounce_ms: BUTTON_DEBOUNCE_MS,
            scan_interval_ms: 1000 / BUTTON_SCAN_RATE_HZ,
            key_width: KEY_IMAGE_SIZE as u16,
            key_height: KEY_IMAGE_SIZE as u16,
            default_brightness: DEFAULT_BRIGHTNESS,
            transfer_timeout_ms: Some(IMAGE_TRANSFER_TIMEOUT_MS),
            max_reports_per_step: MAX_REPORTS_PER_STEP,
        }
    }
}

impl Default for DeckConfig {
    fn default() -> Self {
        Self::mini()
    }
}
