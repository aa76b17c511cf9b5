//! One panel split into a grid of key regions

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::pwm::SetDutyCycle;
use embedded_hal::spi::SpiBus;

use super::panel::PanelBus;
use super::{Backlight, DisplaySink};
use crate::config::KEY_IMAGE_SIZE;
use crate::error::DisplayError;
use crate::types::Brightness;

/// `COLS` x `ROWS` key regions of `key_size` pixels on a single panel, keys
/// numbered row-major from the top left.
pub struct SharedPanel<SPI, CS, DC, RST, BL, D, const COLS: usize, const ROWS: usize> {
    bus: PanelBus<SPI, DC>,
    cs: CS,
    rst: RST,
    backlight: Backlight<BL>,
    delay: D,
    key_size: u16,
}

impl<SPI, CS, DC, RST, BL, D, const COLS: usize, const ROWS: usize>
    SharedPanel<SPI, CS, DC, RST, BL, D, COLS, ROWS>
where
    SPI: SpiBus,
    CS: OutputPin,
    DC: OutputPin,
    RST: OutputPin,
    BL: SetDutyCycle,
    D: DelayNs,
{
    pub fn new(spi: SPI, cs: CS, dc: DC, rst: RST, backlight: BL, delay: D) -> Self {
        Self {
            bus: PanelBus::new(spi, dc),
            cs,
            rst,
            backlight: Backlight::new(backlight),
            delay,
            key_size: KEY_IMAGE_SIZE as u16,
        }
    }

    /// Clamped so every region stays inside 16-bit panel coordinates.
    pub fn with_key_size(mut self, key_size: u16) -> Self {
        let span = u16::try_from(COLS.max(ROWS).max(1)).unwrap_or(u16::MAX);
        self.key_size = key_size.min(u16::MAX / span);
        self
    }

    pub fn panel_size(&self) -> (u16, u16) {
        let span = |n: usize| u16::try_from(n).unwrap_or(u16::MAX);
        (
            self.key_size.saturating_mul(span(COLS)),
            self.key_size.saturating_mul(span(ROWS)),
        )
    }

    /// Top-left corner of `key`'s region.
    pub fn region_origin(&self, key: usize) -> Option<(u16, u16)> {
        if key >= COLS * ROWS {
            return None;
        }
        let col = (key % COLS) as u16;
        let row = (key / COLS) as u16;
        Some((col * self.key_size, row * self.key_size))
    }

    fn transaction<T, F>(&mut self, f: F) -> Result<T, DisplayError>
    where
        F: FnOnce(&mut PanelBus<SPI, DC>, &mut D) -> Result<T, DisplayError>,
    {
        let result = match self.cs.set_low() {
            Ok(()) => f(&mut self.bus, &mut self.delay),
            Err(_) => Err(DisplayError::Pin),
        };

        let flushed = self.bus.flush();
        let released = self.cs.set_high().map_err(|_| DisplayError::Pin);

        let value = result?;
        flushed?;
        released?;
        Ok(value)
    }
}

impl<SPI, CS, DC, RST, BL, D, const COLS: usize, const ROWS: usize> DisplaySink
    for SharedPanel<SPI, CS, DC, RST, BL, D, COLS, ROWS>
where
    SPI: SpiBus,
    CS: OutputPin,
    DC: OutputPin,
    RST: OutputPin,
    BL: SetDutyCycle,
    D: DelayNs,
{
    fn key_count(&self) -> usize {
        COLS * ROWS
    }

    fn init(&mut self) -> Result<(), DisplayError> {
        let (width, height) = self.panel_size();
        info!("Initializing shared display ({}x{})", width, height);

        self.cs.set_high().map_err(|_| DisplayError::Pin)?;
        self.rst.set_low().map_err(|_| DisplayError::Pin)?;
        self.delay.delay_ms(10);
        self.rst.set_high().map_err(|_| DisplayError::Pin)?;
        self.delay.delay_ms(120);

        self.transaction(|bus, delay| bus.init_sequence(delay, width, height))?;
        self.clear_all()
    }

    fn show(&mut self, key: usize, rgb888: &[u8], width: u16, height: u16) -> Result<(), DisplayError> {
        let (x, y) = self.region_origin(key).ok_or(DisplayError::InvalidKey(key))?;
        let width = width.min(self.key_size);
        let height = height.min(self.key_size);
        let pixels = usize::from(width) * usize::from(height);

        debug!("Key {} maps to region: ({},{}) {}x{}", key, x, y, width, height);

        let written = self.transaction(|bus, _| {
            bus.set_window(x, y, x + width.saturating_sub(1), y + height.saturating_sub(1))?;
            bus.write_rgb888(rgb888, pixels)
        })?;

        if written < pixels {
            warn!("Key {}: image short by {} pixels, padded black", key, pixels - written);
        }
        Ok(())
    }

    fn clear(&mut self, key: usize) -> Result<(), DisplayError> {
        let (x, y) = self.region_origin(key).ok_or(DisplayError::InvalidKey(key))?;
        let size = self.key_size;
        self.transaction(|bus, _| {
            bus.set_window(x, y, x + size.saturating_sub(1), y + size.saturating_sub(1))?;
            bus.fill(0x0000, usize::from(size) * usize::from(size))
        })
    }

    /// One window over the whole panel instead of one per key.
    fn clear_all(&mut self) -> Result<(), DisplayError> {
        let (width, height) = self.panel_size();
        self.transaction(|bus, _| {
            bus.set_window(0, 0, width.saturating_sub(1), height.saturating_sub(1))?;
            bus.fill(0x0000, usize::from(width) * usize::from(height))
        })
    }

    fn set_brightness(&mut self, level: Brightness) -> Result<(), DisplayError> {
        self.backlight.set(level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::panel::cmd;
    use crate::mock::{DisplayBus, MockPin, MockPwm, MockSpi, NoopDelay};

    fn panel() -> (SharedPanel<MockSpi, MockPin, MockPin, MockPin, MockPwm, NoopDelay, 3, 2>, DisplayBus) {
        let bus = DisplayBus::new(1);
        let [cs] = bus.cs_pins::<1>();
        let panel = SharedPanel::new(bus.spi(), cs, bus.dc_pin(), bus.rst_pin(), MockPwm::new(1000), NoopDelay);
        (panel, bus)
    }

    #[test]
    fn regions_are_row_major() {
        let (panel, _) = panel();
        assert_eq!(panel.panel_size(), (240, 160));
        assert_eq!(panel.region_origin(0), Some((0, 0)));
        assert_eq!(panel.region_origin(2), Some((160, 0)));
        assert_eq!(panel.region_origin(4), Some((80, 80)));
        assert_eq!(panel.region_origin(6), None);
    }

    #[test]
    fn oversized_key_size_is_clamped() {
        let (panel, _) = panel();
        let panel = panel.with_key_size(40_000);

        let (width, height) = panel.panel_size();
        assert_eq!(width, 65_535);
        assert_eq!(height, 43_690);
        assert_eq!(panel.region_origin(5), Some((43_690, 21_845)));
    }

    #[test]
    fn show_targets_key_window() {
        let (mut panel, bus) = panel();
        panel.show(4, &[0u8; 80 * 80 * 3], 80, 80).unwrap();

        // x 80..=159, y 80..=159
        assert_eq!(bus.data_after(0, cmd::CASET), [0x00, 0x50, 0x00, 0x9F]);
        assert_eq!(bus.data_after(0, cmd::RASET), [0x00, 0x50, 0x00, 0x9F]);
        assert_eq!(bus.ram_writes(0)[0].len(), 80 * 80 * 2);
        assert!(bus.idle());
    }

    #[test]
    fn init_clears_whole_panel_once() {
        let (mut panel, bus) = panel();
        panel.init().unwrap();

        let frames = bus.ram_writes(0);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 240 * 160 * 2);
        assert_eq!(bus.reset_pulses(), 1);
        assert!(bus.idle());
    }
}
