//! Board configuration for OpenDeck on a Raspberry Pi Pico
//!
//! Protocol and identity constants live in [`opendeck_core::config`]; this
//! module holds what depends on the board: pins, clocks, task timing and the
//! watchdog policy.

pub use opendeck_core::config::*;

// ===================================================================
// GPIO Pin Assignments - Raspberry Pi Pico
// ===================================================================
//
// Embassy hands pins out as typed peripherals, so the numbers below are the
// wiring reference used by the startup banner. Keep them in sync with the
// binaries.

// Button matrix (3x2), rows driven low one at a time
pub const BTN_ROW_PINS: [u8; KEY_ROWS] = [2, 3];
pub const BTN_COL_PINS: [u8; KEY_COLS] = [4, 5, 6];

// Direct buttons for the single-panel board, one per key
pub const BTN_DIRECT_PINS: [u8; KEY_COUNT] = [2, 3, 4, 5, 6, 7];

// SPI display bus
pub const SPI_SCK_PIN: u8 = 18;
pub const SPI_MOSI_PIN: u8 = 19;
pub const SPI_FREQUENCY_HZ: u32 = 10_000_000;

// One chip-select per key panel; the shared-panel board only uses the first
pub const DISPLAY_CS_PINS: [u8; KEY_COUNT] = [8, 9, 10, 11, 12, 13];
pub const DISPLAY_DC_PIN: u8 = 14;
pub const DISPLAY_RST_PIN: u8 = 15;
pub const DISPLAY_BL_PIN: u8 = 17;

// Status LEDs
pub const LED_STATUS_PIN: u8 = 25; // Built-in LED on Pico
pub const LED_USB_PIN: u8 = 20;
pub const LED_ERROR_PIN: u8 = 21;

// ===================================================================
// Backlight PWM
// ===================================================================

/// 125 MHz / 16 / 1000 gives a flicker-free ~7.8 kHz.
pub const BACKLIGHT_PWM_DIVIDER: u8 = 16;
pub const BACKLIGHT_PWM_TOP: u16 = 999;

// ===================================================================
// Task timing
// ===================================================================

/// Controller tick. Host reports are drained and buttons scanned from here.
pub const DECK_TICK_MS: u64 = 1;
pub const USB_POLL_RATE_MS: u8 = 1;
pub const STATUS_HEARTBEAT_ON_MS: u64 = 100;
pub const STATUS_HEARTBEAT_OFF_MS: u64 = 900;
pub const DIAGNOSTICS_PERIOD_MS: u64 = 10_000;
pub const SUPERVISOR_PERIOD_S: u64 = 10;
pub const SUPERVISOR_STATUS_S: u32 = 60;

// ===================================================================
// Queues
// ===================================================================

/// Raw host reports waiting for the controller. Each slot holds a full
/// output report.
pub const HOST_REPORT_QUEUE: usize = 4;
/// SET_FEATURE commands, kept apart so image traffic cannot crowd them out.
pub const FEATURE_REPORT_QUEUE: usize = 4;
pub const INPUT_REPORT_QUEUE: usize = 2;

// ===================================================================
// Watchdog and fault recovery
// ===================================================================

pub const WATCHDOG_ENABLED: bool = true;
/// Must cover a full display re-init (~1.8 s for six panels).
pub const WATCHDOG_TIMEOUT_MS: u64 = 5_000;
pub const RECOVERY_ATTEMPTS: u8 = 3;
pub const RECOVERY_BACKOFF_MS: u64 = 500;
