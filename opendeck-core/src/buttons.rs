//! Button scanning and debouncing
//!
//! Raw key levels come from a [`ButtonSource`] (a row/column matrix or one pin
//! per key). [`ButtonScanner`] runs each raw reading through a per-key debounce
//! filter and flags when any stable state changed.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::error::ButtonError;

/// Row settle time before columns are sampled.
pub const MATRIX_SETTLE_US: u32 = 10;

/// Hardware that can sample the raw (undebounced) level of every key.
pub trait ButtonSource {
    fn key_count(&self) -> usize;

    /// Fill `raw[i]` with `true` for every key that currently reads pressed.
    /// Slots beyond `key_count()` are left untouched.
    fn read(&mut self, raw: &mut [bool]) -> Result<(), ButtonError>;
}

// ===================================================================
// Button Matrix Scanning
// ===================================================================

/// Row/column key matrix. Rows are driven low one at a time, columns have
/// pull-ups, so a pressed key pulls its column low while its row is active.
pub struct ButtonMatrix<R, C, D, const ROWS: usize, const COLS: usize> {
    rows: [R; ROWS],
    cols: [C; COLS],
    delay: D,
}

impl<R, C, D, const ROWS: usize, const COLS: usize> ButtonMatrix<R, C, D, ROWS, COLS>
where
    R: OutputPin,
    C: InputPin,
    D: DelayNs,
{
    /// Takes ownership of the pins and parks every row inactive (high).
    pub fn new(mut rows: [R; ROWS], cols: [C; COLS], delay: D) -> Result<Self, ButtonError> {
        for row in rows.iter_mut() {
            row.set_high().map_err(|_| ButtonError::Pin)?;
        }
        Ok(Self { rows, cols, delay })
    }
}

impl<R, C, D, const ROWS: usize, const COLS: usize> ButtonSource for ButtonMatrix<R, C, D, ROWS, COLS>
where
    R: OutputPin,
    C: InputPin,
    D: DelayNs,
{
    fn key_count(&self) -> usize {
        ROWS * COLS
    }

    fn read(&mut self, raw: &mut [bool]) -> Result<(), ButtonError> {
        for (row_idx, row) in self.rows.iter_mut().enumerate() {
            // Pull current row low
            row.set_low().map_err(|_| ButtonError::Pin)?;

            // Small settling time
            self.delay.delay_us(MATRIX_SETTLE_US);

            let mut sampled = Ok(());
            for (col_idx, col) in self.cols.iter_mut().enumerate() {
                match col.is_low() {
                    Ok(pressed) => {
                        if let Some(slot) = raw.get_mut(row_idx * COLS + col_idx) {
                            *slot = pressed;
                        }
                    }
                    Err(_) => {
                        sampled = Err(ButtonError::Pin);
                        break;
                    }
                }
            }

            // Return row to high before reporting anything, a stuck row
            // would ghost into every other row.
            row.set_high().map_err(|_| ButtonError::Pin)?;
            sampled?;
        }
        Ok(())
    }
}

// ===================================================================
// Direct Buttons
// ===================================================================

/// One input pin per key, active low with pull-ups.
pub struct DirectButtons<I, const N: usize> {
    pins: [I; N],
}

impl<I: InputPin, const N: usize> DirectButtons<I, N> {
    pub fn new(pins: [I; N]) -> Self {
        Self { pins }
    }
}

impl<I: InputPin, const N: usize> ButtonSource for DirectButtons<I, N> {
    fn key_count(&self) -> usize {
        N
    }

    fn read(&mut self, raw: &mut [bool]) -> Result<(), ButtonError> {
        for (slot, pin) in raw.iter_mut().zip(self.pins.iter_mut()) {
            *slot = pin.is_low().map_err(|_| ButtonError::Pin)?;
        }
        Ok(())
    }
}

// ===================================================================
// Button Debouncing State
// ===================================================================

/// Stable and raw history of one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonState {
    pub current: bool,
    pub previous: bool,
    pub last_change_ms: u64,
    raw: bool,
    raw_since_ms: u64,
}

impl ButtonState {
    pub const RELEASED: Self = Self {
        current: false,
        previous: false,
        last_change_ms: 0,
        raw: false,
        raw_since_ms: 0,
    };

    /// Feed one raw sample. Returns `true` when the stable state flipped.
    fn update(&mut self, raw: bool, now_ms: u64, debounce_ms: u64) -> bool {
        if raw != self.raw {
            self.raw = raw;
            self.raw_since_ms = now_ms;
        }

        if self.raw != self.current && now_ms.saturating_sub(self.raw_since_ms) >= debounce_ms {
            self.previous = self.current;
            self.current = self.raw;
            self.last_change_ms = now_ms;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScanResult {
    pub changed: bool,
}

/// Debounced state of `N` keys.
#[derive(Debug)]
pub struct ButtonScanner<const N: usize> {
    states: [ButtonState; N],
    debounce_ms: u64,
}

impl<const N: usize> ButtonScanner<N> {
    pub const fn new(debounce_ms: u64) -> Self {
        Self {
            states: [ButtonState::RELEASED; N],
            debounce_ms,
        }
    }

    /// Sample every key once and run it through the debounce filter. All
    /// reads complete before any state is updated.
    pub fn scan<S: ButtonSource + ?Sized>(
        &mut self,
        source: &mut S,
        now_ms: u64,
    ) -> Result<ScanResult, ButtonError> {
        let mut raw = [false; N];
        source.read(&mut raw)?;

        let mut changed = false;
        for (key, (state, &level)) in self.states.iter_mut().zip(raw.iter()).enumerate() {
            if state.update(level, now_ms, self.debounce_ms) {
                changed = true;
                debug!("Button {} {}", key, if state.current { "pressed" } else { "released" });
            }
        }

        Ok(ScanResult { changed })
    }

    pub fn states(&self) -> &[ButtonState; N] {
        &self.states
    }

    pub fn is_pressed(&self, key: usize) -> bool {
        self.states.get(key).is_some_and(|s| s.current)
    }

    /// Forget all history, every key back to released.
    pub fn reset(&mut self) {
        self.states = [ButtonState::RELEASED; N];
    }
}
