//! One display per key on a shared SPI bus
//!
//! Exactly one chip-select may be active at a time. Every operation goes
//! through [`DisplayMultiplexer::transaction`], which deselects all panels,
//! selects the target, and deselects again afterwards even if the transfer
//! failed.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::pwm::SetDutyCycle;
use embedded_hal::spi::SpiBus;

use super::panel::PanelBus;
use super::{Backlight, DisplaySink};
use crate::config::KEY_IMAGE_SIZE;
use crate::error::DisplayError;
use crate::types::Brightness;

pub struct DisplayMultiplexer<SPI, CS, DC, RST, BL, D, const N: usize> {
    bus: PanelBus<SPI, DC>,
    cs: [CS; N],
    rst: RST,
    backlight: Backlight<BL>,
    delay: D,
    width: u16,
    height: u16,
}

impl<SPI, CS, DC, RST, BL, D, const N: usize> DisplayMultiplexer<SPI, CS, DC, RST, BL, D, N>
where
    SPI: SpiBus,
    CS: OutputPin,
    DC: OutputPin,
    RST: OutputPin,
    BL: SetDutyCycle,
    D: DelayNs,
{
    /// `cs[i]` selects the panel behind key `i`. Panels are 80x80.
    pub fn new(spi: SPI, cs: [CS; N], dc: DC, rst: RST, backlight: BL, delay: D) -> Self {
        Self {
            bus: PanelBus::new(spi, dc),
            cs,
            rst,
            backlight: Backlight::new(backlight),
            delay,
            width: KEY_IMAGE_SIZE as u16,
            height: KEY_IMAGE_SIZE as u16,
        }
    }

    pub fn with_panel_size(mut self, width: u16, height: u16) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    fn deselect_all(&mut self) -> Result<(), DisplayError> {
        for cs in self.cs.iter_mut() {
            cs.set_high().map_err(|_| DisplayError::Pin)?;
        }
        Ok(())
    }

    fn select(&mut self, key: usize) -> Result<(), DisplayError> {
        self.deselect_all()?;
        self.cs[key].set_low().map_err(|_| DisplayError::Pin)
    }

    /// Run `f` with only `key`'s panel selected.
    fn transaction<T, F>(&mut self, key: usize, f: F) -> Result<T, DisplayError>
    where
        F: FnOnce(&mut PanelBus<SPI, DC>, &mut D) -> Result<T, DisplayError>,
    {
        if key >= N {
            return Err(DisplayError::InvalidKey(key));
        }

        let result = match self.select(key) {
            Ok(()) => f(&mut self.bus, &mut self.delay),
            Err(e) => Err(e),
        };

        // Last bytes must leave the bus before CS goes high
        let flushed = self.bus.flush();
        let released = self.deselect_all();

        let value = result?;
        flushed?;
        released?;
        Ok(value)
    }

    fn hardware_reset(&mut self) -> Result<(), DisplayError> {
        self.rst.set_low().map_err(|_| DisplayError::Pin)?;
        self.delay.delay_ms(10);
        self.rst.set_high().map_err(|_| DisplayError::Pin)?;
        // Wait for display to boot
        self.delay.delay_ms(120);
        Ok(())
    }

    pub fn brightness(&self) -> Brightness {
        self.backlight.level()
    }
}

impl<SPI, CS, DC, RST, BL, D, const N: usize> DisplaySink for DisplayMultiplexer<SPI, CS, DC, RST, BL, D, N>
where
    SPI: SpiBus,
    CS: OutputPin,
    DC: OutputPin,
    RST: OutputPin,
    BL: SetDutyCycle,
    D: DelayNs,
{
    fn key_count(&self) -> usize {
        N
    }

    fn init(&mut self) -> Result<(), DisplayError> {
        info!("Initializing {} displays ({}x{})", N, self.width, self.height);
        self.deselect_all()?;

        // RST is shared, one pulse resets every panel
        self.hardware_reset()?;

        let (width, height) = (self.width, self.height);
        for key in 0..N {
            self.transaction(key, |bus, delay| bus.init_sequence(delay, width, height))?;
            debug!("Display {} initialized", key);
        }

        self.clear_all()
    }

    fn show(&mut self, key: usize, rgb888: &[u8], width: u16, height: u16) -> Result<(), DisplayError> {
        let width = width.min(self.width);
        let height = height.min(self.height);
        let pixels = usize::from(width) * usize::from(height);

        let written = self.transaction(key, |bus, _| {
            bus.set_window(0, 0, width.saturating_sub(1), height.saturating_sub(1))?;
            bus.write_rgb888(rgb888, pixels)
        })?;

        if written < pixels {
            warn!("Key {}: image short by {} pixels, padded black", key, pixels - written);
        }
        Ok(())
    }

    fn clear(&mut self, key: usize) -> Result<(), DisplayError> {
        let (width, height) = (self.width, self.height);
        self.transaction(key, |bus, _| {
            bus.set_window(0, 0, width.saturating_sub(1), height.saturating_sub(1))?;
            bus.fill(0x0000, usize::from(width) * usize::from(height))
        })
    }

    fn set_brightness(&mut self, level: Brightness) -> Result<(), DisplayError> {
        self.backlight.set(level)
    }
}
