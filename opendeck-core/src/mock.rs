//! Hand-rolled `embedded-hal` doubles for host tests
//!
//! Pins and the SPI bus of one display wiring share a [`DisplayBus`] log so
//! tests can check which chip-selects were active when each byte went out.

use core::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, InputPin, OutputPin};
use embedded_hal::pwm::{self, SetDutyCycle};
use embedded_hal::spi::{self, SpiBus};

use crate::error::TransportError;
use crate::transport::{HidTransport, HostReport};

pub struct NoopDelay;

impl DelayNs for NoopDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

// ===================================================================
// Direct inputs
// ===================================================================

pub struct MockInput {
    low: Rc<Cell<bool>>,
}

impl MockInput {
    pub fn high() -> Self {
        Self {
            low: Rc::new(Cell::new(false)),
        }
    }

    pub fn low() -> Self {
        Self {
            low: Rc::new(Cell::new(true)),
        }
    }

    /// Shared level: `true` means the pin reads low (pressed).
    pub fn handle(&self) -> Rc<Cell<bool>> {
        self.low.clone()
    }
}

impl digital::ErrorType for MockInput {
    type Error = digital::ErrorKind;
}

impl InputPin for MockInput {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.low.get())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.low.get())
    }
}

// ===================================================================
// Key matrix
// ===================================================================

#[derive(Default)]
struct MatrixWiring {
    row_low: Vec<bool>,
    pressed: Vec<Vec<bool>>,
    max_active: usize,
    failing_col: Option<usize>,
}

/// Electrical model of a key matrix: a column reads low while any active
/// row has a pressed key on it.
#[derive(Clone, Default)]
pub struct MatrixBus(Rc<RefCell<MatrixWiring>>);

impl MatrixBus {
    pub fn press(&self, row: usize, col: usize) {
        self.0.borrow_mut().pressed[row][col] = true;
    }

    pub fn fail_column(&self, col: usize) {
        self.0.borrow_mut().failing_col = Some(col);
    }

    pub fn max_rows_active(&self) -> usize {
        self.0.borrow().max_active
    }

    pub fn all_rows_idle(&self) -> bool {
        self.0.borrow().row_low.iter().all(|low| !low)
    }
}

pub struct MatrixRow {
    idx: usize,
    bus: MatrixBus,
}

impl digital::ErrorType for MatrixRow {
    type Error = digital::ErrorKind;
}

impl OutputPin for MatrixRow {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        let mut w = self.bus.0.borrow_mut();
        w.row_low[self.idx] = true;
        let active = w.row_low.iter().filter(|low| **low).count();
        w.max_active = w.max_active.max(active);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.bus.0.borrow_mut().row_low[self.idx] = false;
        Ok(())
    }
}

pub struct MatrixCol {
    idx: usize,
    bus: MatrixBus,
}

impl digital::ErrorType for MatrixCol {
    type Error = digital::ErrorKind;
}

impl InputPin for MatrixCol {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.is_low().map(|low| !low)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        let w = self.bus.0.borrow();
        if w.failing_col == Some(self.idx) {
            return Err(digital::ErrorKind::Other);
        }
        Ok(w
            .row_low
            .iter()
            .zip(w.pressed.iter())
            .any(|(&low, row)| low && row[self.idx]))
    }
}

pub fn matrix_pins<const ROWS: usize, const COLS: usize>() -> ([MatrixRow; ROWS], [MatrixCol; COLS], MatrixBus) {
    let bus = MatrixBus::default();
    {
        let mut w = bus.0.borrow_mut();
        w.row_low = std::vec![false; ROWS];
        w.pressed = std::vec![std::vec![false; COLS]; ROWS];
    }
    let rows = core::array::from_fn(|idx| MatrixRow { idx, bus: bus.clone() });
    let cols = core::array::from_fn(|idx| MatrixCol { idx, bus: bus.clone() });
    (rows, cols, bus)
}

// ===================================================================
// Display bus
// ===================================================================

/// One SPI write as seen on the wire.
#[derive(Debug, Clone)]
pub struct SpiWrite {
    /// Selected chip-select, `None` if zero or several were active.
    pub target: Option<usize>,
    pub command: bool,
    pub bytes: Vec<u8>,
}

#[derive(Default)]
struct DisplayWiring {
    selected: Vec<bool>,
    dc_data: bool,
    max_selected: usize,
    reset_pulses: usize,
    spi_fails: bool,
    writes: Vec<SpiWrite>,
}

#[derive(Clone, Default)]
pub struct DisplayBus(Rc<RefCell<DisplayWiring>>);

#[derive(Clone, Copy)]
enum PinRole {
    Cs(usize),
    Dc,
    Rst,
}

pub struct MockPin {
    role: PinRole,
    bus: DisplayBus,
}

pub struct MockSpi {
    bus: DisplayBus,
}

impl DisplayBus {
    pub fn new(cs_lines: usize) -> Self {
        let bus = Self::default();
        bus.0.borrow_mut().selected = std::vec![false; cs_lines];
        bus
    }

    pub fn spi(&self) -> MockSpi {
        MockSpi { bus: self.clone() }
    }

    pub fn cs_pins<const N: usize>(&self) -> [MockPin; N] {
        core::array::from_fn(|i| MockPin {
            role: PinRole::Cs(i),
            bus: self.clone(),
        })
    }

    pub fn dc_pin(&self) -> MockPin {
        MockPin {
            role: PinRole::Dc,
            bus: self.clone(),
        }
    }

    pub fn rst_pin(&self) -> MockPin {
        MockPin {
            role: PinRole::Rst,
            bus: self.clone(),
        }
    }

    pub fn fail_spi(&self, fail: bool) {
        self.0.borrow_mut().spi_fails = fail;
    }

    pub fn clear_log(&self) {
        self.0.borrow_mut().writes.clear();
    }

    pub fn write_count(&self) -> usize {
        self.0.borrow().writes.len()
    }

    pub fn max_selected(&self) -> usize {
        self.0.borrow().max_selected
    }

    /// Writes clocked out with no (or more than one) panel selected.
    pub fn unaddressed_writes(&self) -> usize {
        self.0.borrow().writes.iter().filter(|w| w.target.is_none()).count()
    }

    pub fn idle(&self) -> bool {
        self.0.borrow().selected.iter().all(|s| !s)
    }

    pub fn reset_pulses(&self) -> usize {
        self.0.borrow().reset_pulses
    }

    pub fn commands_for(&self, target: usize) -> Vec<u8> {
        self.0
            .borrow()
            .writes
            .iter()
            .filter(|w| w.command && w.target == Some(target))
            .flat_map(|w| w.bytes.iter().copied())
            .collect()
    }

    /// Data bytes following the last `command` sent to `target`.
    pub fn data_after(&self, target: usize, command: u8) -> Vec<u8> {
        self.segments(target, command).pop().unwrap_or_default()
    }

    /// Pixel data of every memory write to `target`, in order.
    pub fn ram_writes(&self, target: usize) -> Vec<Vec<u8>> {
        self.segments(target, crate::display::panel::cmd::RAMWR)
    }

    fn segments(&self, target: usize, command: u8) -> Vec<Vec<u8>> {
        let w = self.0.borrow();
        let mut out: Vec<Vec<u8>> = Vec::new();
        let mut open = false;
        for write in w.writes.iter().filter(|w| w.target == Some(target)) {
            if write.command {
                open = write.bytes == [command];
                if open {
                    out.push(Vec::new());
                }
            } else if open {
                if let Some(last) = out.last_mut() {
                    last.extend_from_slice(&write.bytes);
                }
            }
        }
        out
    }
}

impl digital::ErrorType for MockPin {
    type Error = digital::ErrorKind;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        let mut w = self.bus.0.borrow_mut();
        match self.role {
            PinRole::Cs(i) => {
                w.selected[i] = true;
                let active = w.selected.iter().filter(|s| **s).count();
                w.max_selected = w.max_selected.max(active);
            }
            PinRole::Dc => w.dc_data = false,
            PinRole::Rst => w.reset_pulses += 1,
        }
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        let mut w = self.bus.0.borrow_mut();
        match self.role {
            PinRole::Cs(i) => w.selected[i] = false,
            PinRole::Dc => w.dc_data = true,
            PinRole::Rst => {}
        }
        Ok(())
    }
}

impl spi::ErrorType for MockSpi {
    type Error = spi::ErrorKind;
}

impl SpiBus for MockSpi {
    fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        words.fill(0);
        Ok(())
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        let mut w = self.bus.0.borrow_mut();
        if w.spi_fails {
            return Err(spi::ErrorKind::Other);
        }
        let mut active = w.selected.iter().enumerate().filter(|(_, s)| **s);
        let target = match (active.next(), active.next()) {
            (Some((i, _)), None) => Some(i),
            _ => None,
        };
        let command = !w.dc_data;
        w.writes.push(SpiWrite {
            target,
            command,
            bytes: words.to_vec(),
        });
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        self.write(write)?;
        read.fill(0);
        Ok(())
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        self.write(&words.to_vec())?;
        words.fill(0);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

// ===================================================================
// PWM
// ===================================================================

#[derive(Clone)]
pub struct MockPwm {
    max: u16,
    duty: Rc<Cell<u16>>,
}

impl MockPwm {
    pub fn new(max: u16) -> Self {
        Self {
            max,
            duty: Rc::new(Cell::new(0)),
        }
    }

    pub fn handle(&self) -> Rc<Cell<u16>> {
        self.duty.clone()
    }
}

impl pwm::ErrorType for MockPwm {
    type Error = pwm::ErrorKind;
}

impl SetDutyCycle for MockPwm {
    fn max_duty_cycle(&self) -> u16 {
        self.max
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        self.duty.set(duty);
        Ok(())
    }
}

// ===================================================================
// Transport
// ===================================================================

enum Inbound {
    Feature(Vec<u8>),
    Output(Vec<u8>),
}

/// Scripted host: queued reports are handed out in order, input reports
/// are recorded.
#[derive(Default)]
pub struct MockTransport {
    pub connected: bool,
    pub busy: bool,
    pub sent: Vec<Vec<u8>>,
    inbound: VecDeque<Inbound>,
    current: Vec<u8>,
}

impl MockTransport {
    pub fn connected() -> Self {
        Self {
            connected: true,
            ..Self::default()
        }
    }

    /// Report ID is taken from the first byte.
    pub fn push_feature(&mut self, bytes: &[u8]) {
        self.inbound.push_back(Inbound::Feature(bytes.to_vec()));
    }

    pub fn push_output(&mut self, bytes: &[u8]) {
        self.inbound.push_back(Inbound::Output(bytes.to_vec()));
    }

    pub fn pending(&self) -> usize {
        self.inbound.len()
    }
}

impl HidTransport for MockTransport {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn poll_report(&mut self) -> Option<HostReport<'_>> {
        match self.inbound.pop_front()? {
            Inbound::Feature(bytes) => {
                self.current = bytes;
                Some(HostReport::Feature {
                    report_id: self.current.first().copied().unwrap_or_default(),
                    data: &self.current,
                })
            }
            Inbound::Output(bytes) => {
                self.current = bytes;
                Some(HostReport::Output(&self.current))
            }
        }
    }

    fn send_input_report(&mut self, report: &[u8]) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        if self.busy {
            return Err(TransportError::Busy);
        }
        self.sent.push(report.to_vec());
        Ok(())
    }
}
