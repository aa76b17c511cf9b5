//! Application supervisor and monitoring
//!
//! Prints the startup banner and periodically logs uptime together with the
//! controller's latest diagnostics snapshot.

use defmt::*;
use embassy_time::{Duration, Timer};
use opendeck_core::Diagnostics;

use crate::channels::DIAGNOSTICS;
use crate::config::*;

/// Which board the firmware was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum BoardVariant {
    /// 3x2 button matrix, one panel per key
    Mini,
    /// Direct buttons, one panel split into key regions
    MiniShared,
}

impl BoardVariant {
    pub fn name(self) -> &'static str {
        match self {
            Self::Mini => "mini",
            Self::MiniShared => "mini-shared",
        }
    }
}

pub struct AppSupervisor {
    variant: BoardVariant,
    uptime_seconds: u32,
    last_status: u32,
    diagnostics: Diagnostics,
}

impl AppSupervisor {
    pub fn new(variant: BoardVariant) -> Self {
        Self {
            variant,
            uptime_seconds: 0,
            last_status: 0,
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn print_startup_banner(&self) {
        info!("========================================");
        info!("OpenDeck v{}", FIRMWARE_VERSION);
        info!("========================================");
        info!("Hardware: RP2040 (Raspberry Pi Pico), board {}", self.variant.name());
        info!("Target: {} compatible", USB_PRODUCT);
        info!("USB: VID=0x{:04X} PID=0x{:04X} serial {}", USB_VID, USB_PID, USB_SERIAL);
        info!("Keys: {} ({}x{} layout), {}x{} px", KEY_COUNT, KEY_COLS, KEY_ROWS, KEY_IMAGE_SIZE, KEY_IMAGE_SIZE);
        match self.variant {
            BoardVariant::Mini => {
                info!("Buttons: rows {} cols {}", BTN_ROW_PINS, BTN_COL_PINS);
                info!("Displays: CS {} DC {} RST {}", DISPLAY_CS_PINS, DISPLAY_DC_PIN, DISPLAY_RST_PIN);
            }
            BoardVariant::MiniShared => {
                info!("Buttons: direct {}", BTN_DIRECT_PINS);
                info!("Display: CS {} DC {} RST {}", DISPLAY_CS_PINS[0], DISPLAY_DC_PIN, DISPLAY_RST_PIN);
            }
        }
        info!("SPI: SCK {} MOSI {} @ {} Hz, backlight GPIO {}", SPI_SCK_PIN, SPI_MOSI_PIN, SPI_FREQUENCY_HZ, DISPLAY_BL_PIN);
        info!("LEDs: status {} usb {} error {}", LED_STATUS_PIN, LED_USB_PIN, LED_ERROR_PIN);
        info!("========================================");
    }

    pub async fn run(&mut self) -> ! {
        info!("Application supervisor started");

        loop {
            Timer::after(Duration::from_secs(SUPERVISOR_PERIOD_S)).await;
            self.uptime_seconds += SUPERVISOR_PERIOD_S as u32;

            if let Some(snapshot) = DIAGNOSTICS.try_take() {
                self.diagnostics = snapshot;
            }

            if self.uptime_seconds - self.last_status >= SUPERVISOR_STATUS_S {
                self.print_status();
                self.last_status = self.uptime_seconds;
            }
        }
    }

    fn print_status(&self) {
        let minutes = self.uptime_seconds / 60;
        let hours = minutes / 60;

        if hours > 0 {
            info!("Status: Uptime {}h{}m", hours, minutes % 60);
        } else {
            info!("Status: Uptime {}m", minutes);
        }

        let d = &self.diagnostics;
        info!(
            "Host: {} reports, {} malformed, {} unknown; images: {} shown, {} stale",
            d.host_reports, d.protocol_errors, d.unknown_commands, d.frames_displayed, d.stale_transfers
        );
        info!(
            "Rejected chunks: {} bad key, {} out of sequence, {} overflow",
            d.invalid_keys, d.sequence_errors, d.overflows
        );
        if d.display_errors > 0 || d.scan_errors > 0 || d.input_reports_dropped > 0 {
            warn!(
                "Faults: {} display, {} scan, {} input reports dropped",
                d.display_errors, d.scan_errors, d.input_reports_dropped
            );
        }
        debug!("Input reports sent: {}, resets: {}", d.input_reports_sent, d.resets);
    }
}
