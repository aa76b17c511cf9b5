//! Device controller
//!
//! [`DeckController`] is the single owner of all mutable device state: the
//! debounced buttons, the image reassembly slots, the brightness and the
//! displays. The firmware calls [`DeckController::step`] on a fixed tick and
//! hands in the USB transport by reference; nothing else touches this state.
//!
//! ```text
//! Uninitialized -> Initializing -> Ready <-> Resetting
//!                       |            |
//!                       v            v
//!                    Faulted    ShuttingDown -> Stopped
//! ```

use crate::buttons::{ButtonScanner, ButtonSource, ButtonState};
use crate::config::DeckConfig;
use crate::display::DisplaySink;
use crate::error::{ChunkError, DeckError, TransportError};
use crate::image::ReassemblyEngine;
use crate::protocol::{format_input_report, Command, CommandDispatcher, ImageChunk};
use crate::transport::{HidTransport, HostReport};
use crate::types::{Brightness, DeviceState};

/// Running counters, never reset except by power cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Diagnostics {
    pub host_reports: u32,
    pub protocol_errors: u32,
    pub unknown_commands: u32,
    pub invalid_keys: u32,
    pub sequence_errors: u32,
    pub overflows: u32,
    pub frames_displayed: u32,
    pub display_errors: u32,
    pub stale_transfers: u32,
    pub scan_errors: u32,
    pub input_reports_sent: u32,
    pub input_reports_dropped: u32,
    pub resets: u32,
}

/// Counters wrap instead of overflowing on long uptimes.
fn bump(counter: &mut u32) {
    *counter = counter.wrapping_add(1);
}

/// What one call to [`DeckController::step`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StepReport {
    pub host_reports: usize,
    pub scanned: bool,
    pub changed: bool,
    pub input_report_sent: bool,
}

pub struct DeckController<'a, B, D, const N: usize, const C: usize> {
    config: DeckConfig,
    state: DeviceState,
    buttons: B,
    scanner: ButtonScanner<N>,
    display: D,
    images: &'a mut ReassemblyEngine<N, C>,
    dispatcher: CommandDispatcher,
    brightness: Brightness,
    last_scan_ms: Option<u64>,
    report_pending: bool,
    diagnostics: Diagnostics,
}

impl<'a, B, D, const N: usize, const C: usize> DeckController<'a, B, D, N, C>
where
    B: ButtonSource,
    D: DisplaySink,
{
    /// `images` is borrowed so the firmware can keep the large reassembly
    /// buffers in a static.
    pub fn new(config: DeckConfig, buttons: B, display: D, images: &'a mut ReassemblyEngine<N, C>) -> Self {
        Self {
            config,
            state: DeviceState::Uninitialized,
            buttons,
            scanner: ButtonScanner::new(config.debounce_ms),
            display,
            images,
            dispatcher: CommandDispatcher::default(),
            brightness: Brightness::new(config.default_brightness),
            last_scan_ms: None,
            report_pending: false,
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: CommandDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    // ===================================================================
    // Lifecycle
    // ===================================================================

    /// Bring up the displays and enter `Ready`. On failure the controller is
    /// left `Faulted` and the error is returned to the caller.
    pub fn init(&mut self) -> Result<(), DeckError> {
        match self.state {
            DeviceState::Uninitialized | DeviceState::Stopped => self.bring_up(),
            other => Err(DeckError::InvalidState(other)),
        }
    }

    /// Retry bring-up after a fault.
    pub fn recover(&mut self) -> Result<(), DeckError> {
        match self.state {
            DeviceState::Faulted => {
                info!("Attempting recovery");
                self.bring_up()
            }
            other => Err(DeckError::InvalidState(other)),
        }
    }

    fn bring_up(&mut self) -> Result<(), DeckError> {
        self.state = DeviceState::Initializing;

        let result = self.check_key_counts().and_then(|()| self.start_hardware());

        match result {
            Ok(()) => {
                self.state = DeviceState::Ready;
                info!("Device ready: {} keys", N);
                Ok(())
            }
            Err(e) => {
                self.state = DeviceState::Faulted;
                error!("Initialization failed: {}", e);
                Err(e)
            }
        }
    }

    fn check_key_counts(&self) -> Result<(), DeckError> {
        for actual in [self.buttons.key_count(), self.display.key_count()] {
            if actual != N {
                return Err(DeckError::KeyCount { expected: N, actual });
            }
        }
        Ok(())
    }

    fn start_hardware(&mut self) -> Result<(), DeckError> {
        self.display.init()?;
        self.restore_defaults()
    }

    fn restore_defaults(&mut self) -> Result<(), DeckError> {
        self.scanner.reset();
        self.images.reset_all();
        self.report_pending = false;
        self.last_scan_ms = None;
        self.apply_brightness(Brightness::new(self.config.default_brightness))
    }

    /// Device reset as requested by the host: all key state and images are
    /// dropped and brightness returns to default. Bus and USB stay up.
    pub fn reset(&mut self) -> Result<(), DeckError> {
        if self.state != DeviceState::Ready {
            return Err(DeckError::InvalidState(self.state));
        }

        self.state = DeviceState::Resetting;
        info!("Device reset");

        let cleared = self.display.clear_all();
        let restored = self.restore_defaults();
        bump(&mut self.diagnostics.resets);
        self.state = DeviceState::Ready;

        cleared?;
        restored
    }

    /// Blank every key and switch the backlight off. Ends in `Stopped` even
    /// if the hardware did not cooperate.
    pub fn shutdown(&mut self) -> Result<(), DeckError> {
        if matches!(self.state, DeviceState::Stopped | DeviceState::ShuttingDown) {
            return Ok(());
        }

        self.state = DeviceState::ShuttingDown;
        info!("Shutting down");

        self.scanner.reset();
        self.images.reset_all();
        self.report_pending = false;

        let cleared = self.display.clear_all();
        let dimmed = self.apply_brightness(Brightness::OFF);
        self.state = DeviceState::Stopped;

        cleared?;
        dimmed
    }

    // ===================================================================
    // Periodic step
    // ===================================================================

    /// One tick: drain up to `max_reports_per_step` host reports, reclaim
    /// stalled transfers, scan if due and send an input report when keys
    /// changed while the host is connected.
    ///
    /// Malformed reports and runtime hardware hiccups are counted in
    /// [`Diagnostics`], they never fail the step.
    pub fn step<T: HidTransport + ?Sized>(&mut self, now_ms: u64, transport: &mut T) -> Result<StepReport, DeckError> {
        if self.state != DeviceState::Ready {
            return Err(DeckError::InvalidState(self.state));
        }

        let mut report = StepReport::default();

        while report.host_reports < self.config.max_reports_per_step {
            let Some(host) = transport.poll_report() else {
                break;
            };
            report.host_reports += 1;
            self.handle_host_report(host, now_ms);
        }

        if let Some(timeout) = self.config.transfer_timeout_ms {
            let reclaimed = self.images.reclaim_stale(now_ms, timeout);
            self.diagnostics.stale_transfers = self.diagnostics.stale_transfers.wrapping_add(reclaimed as u32);
        }

        let scan_due = self
            .last_scan_ms
            .map_or(true, |last| now_ms.saturating_sub(last) >= self.config.scan_interval_ms);
        if scan_due {
            self.last_scan_ms = Some(now_ms);
            report.scanned = true;
            match self.scanner.scan(&mut self.buttons, now_ms) {
                Ok(scan) if scan.changed => {
                    report.changed = true;
                    self.report_pending = true;
                }
                Ok(_) => {}
                Err(e) => {
                    bump(&mut self.diagnostics.scan_errors);
                    warn!("Button scan failed: {}", e);
                }
            }
        }

        if self.report_pending {
            report.input_report_sent = self.send_input_report(transport);
        }

        Ok(report)
    }

    fn send_input_report<T: HidTransport + ?Sized>(&mut self, transport: &mut T) -> bool {
        if !transport.is_connected() {
            // Host is not listening, it reads the full state on next change
            self.report_pending = false;
            bump(&mut self.diagnostics.input_reports_dropped);
            return false;
        }

        let mut buf = [0u8; N];
        let len = format_input_report(self.scanner.states(), &mut buf);

        match transport.send_input_report(&buf[..len]) {
            Ok(()) => {
                self.report_pending = false;
                bump(&mut self.diagnostics.input_reports_sent);
                trace!("Input report sent: {}", &buf[..len]);
                true
            }
            Err(TransportError::Busy) => false,
            Err(TransportError::NotConnected) => {
                self.report_pending = false;
                bump(&mut self.diagnostics.input_reports_dropped);
                false
            }
        }
    }

    fn handle_host_report(&mut self, report: HostReport<'_>, now_ms: u64) {
        bump(&mut self.diagnostics.host_reports);

        let decoded = match report {
            HostReport::Feature { report_id, data } => self.dispatcher.handle_feature_report(report_id, data),
            HostReport::Output(data) => self.dispatcher.handle_output_report(data),
        };

        match decoded {
            Ok(command) => self.execute(command, now_ms),
            Err(e) => {
                bump(&mut self.diagnostics.protocol_errors);
                warn!("Dropped host report: {}", e);
            }
        }
    }

    fn execute(&mut self, command: Command<'_>, now_ms: u64) {
        match command {
            Command::Reset { version } => {
                info!("Reset command ({})", version);
                if let Err(e) = self.reset() {
                    bump(&mut self.diagnostics.display_errors);
                    warn!("Reset incomplete: {}", e);
                }
            }
            Command::SetBrightness { level, version } => {
                info!("Set brightness {}% ({})", level.percent(), version);
                if self.apply_brightness(level).is_err() {
                    bump(&mut self.diagnostics.display_errors);
                }
            }
            Command::ImageChunk(chunk) => self.handle_chunk(chunk, now_ms),
            Command::Unknown { report_id } => {
                bump(&mut self.diagnostics.unknown_commands);
                trace!("Ignoring report 0x{:02X}", report_id);
            }
        }
    }

    fn handle_chunk(&mut self, chunk: ImageChunk<'_>, now_ms: u64) {
        let accepted = self
            .images
            .accept_chunk(chunk.key, chunk.sequence, chunk.is_last, chunk.payload, now_ms);

        match accepted {
            Ok(Some(frame)) => {
                let key = usize::from(frame.key());
                match self
                    .display
                    .show(key, frame.pixels(), self.config.key_width, self.config.key_height)
                {
                    Ok(()) => bump(&mut self.diagnostics.frames_displayed),
                    Err(e) => {
                        bump(&mut self.diagnostics.display_errors);
                        warn!("Key {}: display failed: {}", key, e);
                    }
                }
                // Dropping the frame returns the slot to idle
            }
            Ok(None) => {}
            Err(e) => {
                match e {
                    ChunkError::InvalidKey { .. } => bump(&mut self.diagnostics.invalid_keys),
                    ChunkError::SequenceMismatch { .. } => bump(&mut self.diagnostics.sequence_errors),
                    ChunkError::Overflow { .. } => bump(&mut self.diagnostics.overflows),
                }
                warn!("Key {}: chunk rejected: {}", chunk.key, e);
            }
        }
    }

    // ===================================================================
    // Brightness
    // ===================================================================

    /// Values above 100 are clamped.
    pub fn set_brightness(&mut self, percent: u8) -> Result<(), DeckError> {
        self.apply_brightness(Brightness::new(percent))
    }

    fn apply_brightness(&mut self, level: Brightness) -> Result<(), DeckError> {
        self.display.set_brightness(level)?;
        self.brightness = level;
        Ok(())
    }

    // ===================================================================
    // Accessors
    // ===================================================================

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn brightness(&self) -> Brightness {
        self.brightness
    }

    pub fn button_states(&self) -> &[ButtonState; N] {
        self.scanner.states()
    }

    pub fn images(&self) -> &ReassemblyEngine<N, C> {
        self.images
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.diagnostics
    }

    pub fn config(&self) -> &DeckConfig {
        &self.config
    }

    pub fn display(&self) -> &D {
        &self.display
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buttons::DirectButtons;
    use crate::display::DisplayMultiplexer;
    use crate::image::TransferPhase;
    use crate::mock::{DisplayBus, MockInput, MockPin, MockPwm, MockSpi, MockTransport, NoopDelay};
    use core::cell::Cell;
    use std::rc::Rc;
    use std::vec::Vec;

    const CAP: usize = 2048;

    type Display = DisplayMultiplexer<MockSpi, MockPin, MockPin, MockPin, MockPwm, NoopDelay, 6>;
    type Buttons = DirectButtons<MockInput, 6>;
    type Images = ReassemblyEngine<6, CAP>;
    type Deck<'a> = DeckController<'a, Buttons, Display, 6, CAP>;

    struct Hw {
        bus: DisplayBus,
        duty: Rc<Cell<u16>>,
        keys: [Rc<Cell<bool>>; 6],
    }

    impl Hw {
        fn press(&self, key: usize) {
            self.keys[key].set(true);
        }

        fn release(&self, key: usize) {
            self.keys[key].set(false);
        }
    }

    fn deck(images: &mut Images) -> (Deck<'_>, Hw) {
        let bus = DisplayBus::new(6);
        let pwm = MockPwm::new(255);
        let duty = pwm.handle();

        let pins: [MockInput; 6] = core::array::from_fn(|_| MockInput::high());
        let keys = core::array::from_fn(|i| pins[i].handle());

        let display = DisplayMultiplexer::new(bus.spi(), bus.cs_pins::<6>(), bus.dc_pin(), bus.rst_pin(), pwm, NoopDelay);
        let deck = DeckController::new(DeckConfig::mini(), DirectButtons::new(pins), display, images);
        (deck, Hw { bus, duty, keys })
    }

    fn ready(images: &mut Images) -> (Deck<'_>, Hw) {
        let (mut deck, hw) = deck(images);
        deck.init().unwrap();
        hw.bus.clear_log();
        (deck, hw)
    }

    /// Step every 10 ms over `[from, to)`.
    fn run(deck: &mut Deck<'_>, transport: &mut MockTransport, from: u64, to: u64) {
        for t in (from..to).step_by(10) {
            deck.step(t, transport).unwrap();
        }
    }

    fn output_report(key: u8, sequence: u16, is_last: bool, payload: &[u8]) -> Vec<u8> {
        let len = payload.len() as u16;
        let mut report = std::vec![0x02, 0x07, key, is_last as u8];
        report.extend_from_slice(&len.to_le_bytes());
        report.extend_from_slice(&sequence.to_le_bytes());
        report.extend_from_slice(payload);
        report
    }

    #[test]
    fn init_enters_ready_with_default_brightness() {
        let mut images = Images::new();
        let (mut deck, hw) = deck(&mut images);
        assert_eq!(deck.state(), DeviceState::Uninitialized);

        deck.init().unwrap();
        assert_eq!(deck.state(), DeviceState::Ready);
        assert_eq!(deck.brightness(), Brightness::FULL);
        assert_eq!(hw.duty.get(), 255);
        // Every panel was blanked
        for key in 0..6 {
            assert_eq!(hw.bus.ram_writes(key).len(), 1);
        }
        assert!(hw.bus.idle());
    }

    #[test]
    fn failed_init_faults_then_recovers() {
        let mut images = Images::new();
        let (mut deck, hw) = deck(&mut images);
        hw.bus.fail_spi(true);

        assert!(matches!(deck.init(), Err(DeckError::Display(_))));
        assert_eq!(deck.state(), DeviceState::Faulted);
        assert!(matches!(
            deck.step(0, &mut MockTransport::connected()),
            Err(DeckError::InvalidState(DeviceState::Faulted))
        ));
        assert!(matches!(deck.init(), Err(DeckError::InvalidState(_))));

        hw.bus.fail_spi(false);
        deck.recover().unwrap();
        assert_eq!(deck.state(), DeviceState::Ready);
    }

    #[test]
    fn step_requires_ready() {
        let mut images = Images::new();
        let (mut deck, _) = deck(&mut images);
        assert_eq!(
            deck.step(0, &mut MockTransport::connected()),
            Err(DeckError::InvalidState(DeviceState::Uninitialized))
        );
    }

    #[test]
    fn key_press_sends_one_input_report() {
        let mut images = Images::new();
        let (mut deck, hw) = ready(&mut images);
        let mut host = MockTransport::connected();

        hw.press(3);
        run(&mut deck, &mut host, 0, 100);
        assert_eq!(host.sent, [std::vec![0u8, 0, 0, 1, 0, 0]]);

        hw.release(3);
        run(&mut deck, &mut host, 100, 200);
        assert_eq!(host.sent.len(), 2);
        assert_eq!(host.sent[1], [0u8; 6]);
        assert_eq!(deck.diagnostics().input_reports_sent, 2);
    }

    #[test]
    fn scan_runs_on_interval_only() {
        let mut images = Images::new();
        let (mut deck, _) = ready(&mut images);
        let mut host = MockTransport::connected();

        assert!(deck.step(0, &mut host).unwrap().scanned);
        assert!(!deck.step(5, &mut host).unwrap().scanned);
        assert!(deck.step(10, &mut host).unwrap().scanned);
    }

    #[test]
    fn changes_while_disconnected_are_not_queued() {
        let mut images = Images::new();
        let (mut deck, hw) = ready(&mut images);
        let mut host = MockTransport::default();

        hw.press(0);
        run(&mut deck, &mut host, 0, 100);
        assert!(host.sent.is_empty());
        assert!(deck.button_states()[0].current);

        host.connected = true;
        run(&mut deck, &mut host, 100, 200);
        assert!(host.sent.is_empty());
        assert_eq!(deck.diagnostics().input_reports_dropped, 1);
        assert_eq!(deck.diagnostics().input_reports_sent, 0);
    }

    #[test]
    fn counters_wrap_on_overflow() {
        let mut images = Images::new();
        let (mut deck, _) = ready(&mut images);
        let mut host = MockTransport::connected();
        deck.diagnostics.host_reports = u32::MAX;
        deck.diagnostics.unknown_commands = u32::MAX;

        host.push_feature(&[0xA0, 1, 2]);
        deck.step(0, &mut host).unwrap();

        assert_eq!(deck.diagnostics().host_reports, 0);
        assert_eq!(deck.diagnostics().unknown_commands, 0);
        assert_eq!(deck.state(), DeviceState::Ready);
    }

    #[test]
    fn busy_endpoint_retries_next_step() {
        let mut images = Images::new();
        let (mut deck, hw) = ready(&mut images);
        let mut host = MockTransport::connected();
        host.busy = true;

        hw.press(5);
        run(&mut deck, &mut host, 0, 30);
        assert!(host.sent.is_empty());

        host.busy = false;
        let step = deck.step(35, &mut host).unwrap();
        assert!(step.input_report_sent);
        assert_eq!(host.sent, [std::vec![0u8, 0, 0, 0, 0, 1]]);
    }

    #[test]
    fn v2_reset_clears_state() {
        let mut images = Images::new();
        let (mut deck, hw) = ready(&mut images);
        let mut host = MockTransport::connected();

        hw.press(1);
        run(&mut deck, &mut host, 0, 30);
        assert!(deck.button_states()[1].current);

        deck.set_brightness(20).unwrap();
        host.push_output(&output_report(4, 0, false, &[0xAB; 100]));
        deck.step(30, &mut host).unwrap();
        assert_eq!(deck.images().phase(4), Some(TransferPhase::Receiving));

        host.push_feature(&[0x03, 0x02]);
        deck.step(40, &mut host).unwrap();

        assert_eq!(deck.state(), DeviceState::Ready);
        assert!(deck.button_states().iter().all(|s| !s.current && !s.previous));
        assert!((0..6).all(|k| deck.images().phase(k) == Some(TransferPhase::Idle)));
        assert_eq!(deck.brightness(), Brightness::FULL);
        assert_eq!(deck.diagnostics().resets, 1);
    }

    #[test]
    fn v1_reset_aborts_transfer() {
        let mut images = Images::new();
        let (mut deck, hw) = ready(&mut images);
        let mut host = MockTransport::connected();

        host.push_output(&output_report(2, 0, false, &[0x11; 64]));
        host.push_feature(&[0x0B, 0x63]);
        deck.step(0, &mut host).unwrap();

        assert_eq!(deck.images().phase(2), Some(TransferPhase::Idle));
        assert_eq!(deck.diagnostics().resets, 1);
        assert_eq!(hw.bus.max_selected(), 1);

        // The old transfer cannot be continued
        host.push_output(&output_report(2, 1, true, &[0x22; 64]));
        deck.step(10, &mut host).unwrap();
        assert_eq!(deck.diagnostics().sequence_errors, 1);
        assert_eq!(deck.diagnostics().frames_displayed, 0);
    }

    #[test]
    fn v1_brightness_command() {
        let mut images = Images::new();
        let (mut deck, hw) = ready(&mut images);
        let mut host = MockTransport::connected();

        host.push_feature(&[0x05, 0x55, 0xAA, 0xD1, 0x01, 75]);
        deck.step(0, &mut host).unwrap();

        assert_eq!(deck.brightness(), Brightness::new(75));
        assert_eq!(hw.duty.get(), 191);
    }

    #[test]
    fn brightness_clamps() {
        let mut images = Images::new();
        let (mut deck, hw) = ready(&mut images);

        deck.set_brightness(150).unwrap();
        assert_eq!(deck.brightness().percent(), 100);
        assert_eq!(hw.duty.get(), 255);

        deck.set_brightness(0).unwrap();
        assert_eq!(hw.duty.get(), 0);

        deck.set_brightness(50).unwrap();
        assert_eq!(hw.duty.get(), 127);
    }

    #[test]
    fn two_chunk_image_reaches_display() {
        let mut images = Images::new();
        let (mut deck, hw) = ready(&mut images);
        let mut host = MockTransport::connected();

        let first: Vec<u8> = (0..512).map(|i| i as u8).collect();
        let second: Vec<u8> = (0..512).map(|i| (i as u8).wrapping_add(128)).collect();
        host.push_output(&output_report(2, 0, false, &first));
        host.push_output(&output_report(2, 1, true, &second));
        deck.step(0, &mut host).unwrap();

        let frames = hw.bus.ram_writes(2);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 80 * 80 * 2);

        let expected = crate::display::rgb888_to_rgb565(first[0], first[1], first[2]);
        assert_eq!(&frames[0][..2], &expected.to_be_bytes());

        assert_eq!(deck.images().phase(2), Some(TransferPhase::Idle));
        assert_eq!(deck.diagnostics().frames_displayed, 1);
        assert_eq!(hw.bus.max_selected(), 1);
        assert_eq!(hw.bus.unaddressed_writes(), 0);
        assert!(hw.bus.idle());
    }

    #[test]
    fn display_failure_still_frees_slot() {
        let mut images = Images::new();
        let (mut deck, hw) = ready(&mut images);
        let mut host = MockTransport::connected();

        hw.bus.fail_spi(true);
        host.push_output(&output_report(0, 0, true, &[1; 30]));
        deck.step(0, &mut host).unwrap();

        assert_eq!(deck.diagnostics().display_errors, 1);
        assert_eq!(deck.images().phase(0), Some(TransferPhase::Idle));
        assert!(hw.bus.idle());
    }

    #[test]
    fn bad_reports_are_counted_not_fatal() {
        let mut images = Images::new();
        let (mut deck, _) = ready(&mut images);
        let mut host = MockTransport::connected();

        host.push_output(&[0x02, 0x07, 0]);
        host.push_output(&output_report(9, 0, true, &[0; 4]));
        host.push_output(&output_report(1, 3, false, &[0; 4]));
        host.push_feature(&[0xA0, 0x00]);
        deck.step(0, &mut host).unwrap();

        let diag = deck.diagnostics();
        assert_eq!(diag.host_reports, 4);
        assert_eq!(diag.protocol_errors, 1);
        assert_eq!(diag.invalid_keys, 1);
        assert_eq!(diag.sequence_errors, 1);
        assert_eq!(diag.unknown_commands, 1);
        assert_eq!(deck.state(), DeviceState::Ready);
    }

    #[test]
    fn oversized_image_is_dropped() {
        let mut images = Images::new();
        let (mut deck, hw) = ready(&mut images);
        let mut host = MockTransport::connected();

        for seq in 0..3 {
            host.push_output(&output_report(2, seq, seq == 2, &[0x11; 1000]));
        }
        deck.step(0, &mut host).unwrap();

        assert_eq!(deck.diagnostics().overflows, 1);
        assert_eq!(deck.diagnostics().frames_displayed, 0);
        assert_eq!(deck.images().phase(2), Some(TransferPhase::Idle));
        assert!(hw.bus.ram_writes(2).is_empty());
    }

    #[test]
    fn host_reports_are_bounded_per_step() {
        let mut images = Images::new();
        let (mut deck, _) = ready(&mut images);
        let mut host = MockTransport::connected();

        for _ in 0..6 {
            host.push_feature(&[0xA1]);
        }
        assert_eq!(deck.step(0, &mut host).unwrap().host_reports, 4);
        assert_eq!(host.pending(), 2);
        assert_eq!(deck.step(1, &mut host).unwrap().host_reports, 2);
    }

    #[test]
    fn stalled_transfer_is_reclaimed() {
        let mut images = Images::new();
        let (mut deck, _) = ready(&mut images);
        let mut host = MockTransport::connected();

        host.push_output(&output_report(3, 0, false, &[0; 16]));
        deck.step(0, &mut host).unwrap();
        deck.step(1_990, &mut host).unwrap();
        assert_eq!(deck.images().phase(3), Some(TransferPhase::Receiving));

        deck.step(2_000, &mut host).unwrap();
        assert_eq!(deck.images().phase(3), Some(TransferPhase::Idle));
        assert_eq!(deck.diagnostics().stale_transfers, 1);
    }

    #[test]
    fn shutdown_blanks_and_stops() {
        let mut images = Images::new();
        let (mut deck, hw) = ready(&mut images);

        deck.shutdown().unwrap();
        assert_eq!(deck.state(), DeviceState::Stopped);
        assert_eq!(hw.duty.get(), 0);
        assert_eq!(hw.bus.ram_writes(0).len(), 1);
        assert!(deck.step(0, &mut MockTransport::connected()).is_err());

        // A stopped device can be brought up again
        deck.init().unwrap();
        assert_eq!(deck.state(), DeviceState::Ready);
    }
}
