//! ST7735 command/data framing
//!
//! The DC line tells the panel whether the bytes on the bus are a command or
//! parameters. The bus is flushed before DC moves so no byte is clocked out
//! under the wrong DC level.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;

use super::rgb888_to_rgb565;
use crate::error::DisplayError;

/// Panel command set
pub mod cmd {
    pub const SWRESET: u8 = 0x01;
    pub const SLPOUT: u8 = 0x11;
    pub const DISPON: u8 = 0x29;
    pub const CASET: u8 = 0x2A;
    pub const RASET: u8 = 0x2B;
    pub const RAMWR: u8 = 0x2C;
    pub const MADCTL: u8 = 0x36;
    pub const COLMOD: u8 = 0x3A;
    pub const FRMCTR1: u8 = 0xB1;
    pub const FRMCTR2: u8 = 0xB2;
    pub const FRMCTR3: u8 = 0xB3;
    pub const INVCTR: u8 = 0xB4;
    pub const PWCTR1: u8 = 0xC0;
    pub const PWCTR2: u8 = 0xC1;
    pub const PWCTR3: u8 = 0xC2;
    pub const PWCTR4: u8 = 0xC3;
    pub const PWCTR5: u8 = 0xC4;
    pub const VMCTR1: u8 = 0xC5;
    pub const GMCTRP1: u8 = 0xE0;
    pub const GMCTRN1: u8 = 0xE1;
}

/// (command, parameters, delay after in ms). Window and display-on are sent
/// separately because they depend on the panel geometry.
const INIT_SEQUENCE: &[(u8, &[u8], u32)] = &[
    (cmd::SWRESET, &[], 150),
    (cmd::SLPOUT, &[], 120),
    // Frame rate control
    (cmd::FRMCTR1, &[0x01, 0x2C, 0x2D], 0),
    (cmd::FRMCTR2, &[0x01, 0x2C, 0x2D], 0),
    (cmd::FRMCTR3, &[0x01, 0x2C, 0x2D, 0x01, 0x2C, 0x2D], 0),
    // Column inversion
    (cmd::INVCTR, &[0x07], 0),
    // Power control
    (cmd::PWCTR1, &[0xA2, 0x02, 0x84], 0),
    (cmd::PWCTR2, &[0xC5], 0),
    (cmd::PWCTR3, &[0x0A, 0x00], 0),
    (cmd::PWCTR4, &[0x8A, 0x2A], 0),
    (cmd::PWCTR5, &[0x8A, 0xEE], 0),
    (cmd::VMCTR1, &[0x0E], 0),
    // Row/column order for the key mounting orientation
    (cmd::MADCTL, &[0xC8], 0),
    // 16 bit RGB565
    (cmd::COLMOD, &[0x05], 0),
    (
        cmd::GMCTRP1,
        &[0x02, 0x1C, 0x07, 0x12, 0x37, 0x32, 0x29, 0x2D, 0x29, 0x25, 0x2B, 0x39, 0x00, 0x01, 0x03, 0x10],
        0,
    ),
    (
        cmd::GMCTRN1,
        &[0x03, 0x1D, 0x07, 0x06, 0x2E, 0x2C, 0x29, 0x2D, 0x2E, 0x2E, 0x37, 0x3F, 0x00, 0x00, 0x02, 0x10],
        0,
    ),
];

/// Pixels converted per SPI write.
const STREAM_CHUNK_PIXELS: usize = 64;

/// SPI bus plus the shared DC line.
pub struct PanelBus<SPI, DC> {
    spi: SPI,
    dc: DC,
}

impl<SPI, DC> PanelBus<SPI, DC>
where
    SPI: SpiBus,
    DC: OutputPin,
{
    pub fn new(spi: SPI, dc: DC) -> Self {
        Self { spi, dc }
    }

    pub fn flush(&mut self) -> Result<(), DisplayError> {
        self.spi.flush().map_err(|_| DisplayError::Bus)
    }

    fn write_command(&mut self, command: u8) -> Result<(), DisplayError> {
        self.flush()?;
        // Set DC pin low for command mode
        self.dc.set_low().map_err(|_| DisplayError::Pin)?;
        self.spi.write(&[command]).map_err(|_| DisplayError::Bus)
    }

    fn write_data(&mut self, data: &[u8]) -> Result<(), DisplayError> {
        self.flush()?;
        // Set DC pin high for data mode
        self.dc.set_high().map_err(|_| DisplayError::Pin)?;
        self.spi.write(data).map_err(|_| DisplayError::Bus)
    }

    pub fn command(&mut self, command: u8, params: &[u8]) -> Result<(), DisplayError> {
        self.write_command(command)?;
        if !params.is_empty() {
            self.write_data(params)?;
        }
        Ok(())
    }

    /// Full ST7735 bring-up for a panel of `width` x `height`. The panel
    /// must already be selected.
    pub fn init_sequence<D: DelayNs>(
        &mut self,
        delay: &mut D,
        width: u16,
        height: u16,
    ) -> Result<(), DisplayError> {
        for &(command, params, wait_ms) in INIT_SEQUENCE {
            self.command(command, params)?;
            if wait_ms > 0 {
                self.flush()?;
                delay.delay_ms(wait_ms);
            }
        }
        self.address_window(0, 0, width.saturating_sub(1), height.saturating_sub(1))?;
        self.command(cmd::DISPON, &[])?;
        self.flush()?;
        delay.delay_ms(10);
        Ok(())
    }

    fn address_window(&mut self, x0: u16, y0: u16, x1: u16, y1: u16) -> Result<(), DisplayError> {
        let [x0h, x0l] = x0.to_be_bytes();
        let [x1h, x1l] = x1.to_be_bytes();
        self.command(cmd::CASET, &[x0h, x0l, x1h, x1l])?;

        let [y0h, y0l] = y0.to_be_bytes();
        let [y1h, y1l] = y1.to_be_bytes();
        self.command(cmd::RASET, &[y0h, y0l, y1h, y1l])
    }

    /// Address a window (inclusive corners) and open a memory write.
    pub fn set_window(&mut self, x0: u16, y0: u16, x1: u16, y1: u16) -> Result<(), DisplayError> {
        self.address_window(x0, y0, x1, y1)?;
        self.write_command(cmd::RAMWR)
    }

    /// Stream `pixels` RGB565 pixels converted from `rgb888`. Missing source
    /// pixels are sent as black. Returns how many came from the source.
    pub fn write_rgb888(&mut self, rgb888: &[u8], pixels: usize) -> Result<usize, DisplayError> {
        self.flush()?;
        self.dc.set_high().map_err(|_| DisplayError::Pin)?;

        let mut out = [0u8; STREAM_CHUNK_PIXELS * 2];
        let mut source = rgb888.chunks_exact(3);
        let mut from_source = 0;
        let mut remaining = pixels;

        while remaining > 0 {
            let batch = remaining.min(STREAM_CHUNK_PIXELS);
            for px in out[..batch * 2].chunks_exact_mut(2) {
                let rgb565 = match source.next() {
                    Some(rgb) => {
                        from_source += 1;
                        rgb888_to_rgb565(rgb[0], rgb[1], rgb[2])
                    }
                    None => 0x0000,
                };
                px.copy_from_slice(&rgb565.to_be_bytes());
            }
            self.spi.write(&out[..batch * 2]).map_err(|_| DisplayError::Bus)?;
            remaining -= batch;
        }
        Ok(from_source)
    }

    /// Stream `pixels` copies of one RGB565 colour.
    pub fn fill(&mut self, rgb565: u16, pixels: usize) -> Result<(), DisplayError> {
        self.flush()?;
        self.dc.set_high().map_err(|_| DisplayError::Pin)?;

        let mut out = [0u8; STREAM_CHUNK_PIXELS * 2];
        for px in out.chunks_exact_mut(2) {
            px.copy_from_slice(&rgb565.to_be_bytes());
        }

        let mut remaining = pixels;
        while remaining > 0 {
            let batch = remaining.min(STREAM_CHUNK_PIXELS);
            self.spi.write(&out[..batch * 2]).map_err(|_| DisplayError::Bus)?;
            remaining -= batch;
        }
        Ok(())
    }
}
