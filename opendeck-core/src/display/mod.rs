//! Key displays
//!
//! Two wirings are supported behind [`DisplaySink`]:
//!
//! - [`DisplayMultiplexer`]: one ST7735 per key, all on one SPI bus, picked
//!   by a dedicated chip-select line each
//! - [`SharedPanel`]: one larger ST7735 carved into per-key regions
//!
//! Both share the DC/RST lines, the panel framing in [`panel`] and the PWM
//! backlight.

pub mod multiplexer;
pub mod panel;
pub mod shared;

use embedded_hal::pwm::SetDutyCycle;

pub use multiplexer::DisplayMultiplexer;
pub use shared::SharedPanel;

use crate::error::DisplayError;
use crate::types::Brightness;

/// Something that can show one image per key.
pub trait DisplaySink {
    fn key_count(&self) -> usize;

    /// Bring up the panels. Leaves every key black with nothing selected.
    fn init(&mut self) -> Result<(), DisplayError>;

    /// Render `width * height` RGB888 pixels on `key`. Short buffers are
    /// padded with black.
    fn show(&mut self, key: usize, rgb888: &[u8], width: u16, height: u16) -> Result<(), DisplayError>;

    fn clear(&mut self, key: usize) -> Result<(), DisplayError>;

    fn set_brightness(&mut self, level: Brightness) -> Result<(), DisplayError>;

    fn clear_all(&mut self) -> Result<(), DisplayError> {
        for key in 0..self.key_count() {
            self.clear(key)?;
        }
        Ok(())
    }
}

/// Convert RGB888 to RGB565: top 5 bits red, top 6 green, top 5 blue.
#[inline]
pub const fn rgb888_to_rgb565(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 & 0xF8) << 8) | ((g as u16 & 0xFC) << 3) | (b as u16 >> 3)
}

/// PWM-driven backlight shared by all keys.
pub struct Backlight<P> {
    pwm: P,
    level: Brightness,
}

impl<P: SetDutyCycle> Backlight<P> {
    /// Starts dark until the first `set`.
    pub fn new(pwm: P) -> Self {
        Self {
            pwm,
            level: Brightness::OFF,
        }
    }

    pub fn set(&mut self, level: Brightness) -> Result<(), DisplayError> {
        let duty = level.duty(self.pwm.max_duty_cycle());
        self.pwm.set_duty_cycle(duty).map_err(|_| DisplayError::Backlight)?;
        self.level = level;
        debug!("Backlight {}% (duty {})", level.percent(), duty);
        Ok(())
    }

    pub fn level(&self) -> Brightness {
        self.level
    }
}
