//! Controller task
//!
//! Owns the [`DeckController`] and drives it from a fixed-rate ticker. Host
//! reports reach it through [`ChannelTransport`]; it never touches the USB
//! stack directly. The watchdog is fed once per healthy tick. A faulted
//! controller is re-initialised a few times with a backoff, after which the
//! watchdog (or a system reset) restarts the chip.

use defmt::*;
use embassy_rp::watchdog::Watchdog;
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::{Receiver, Sender};
use embassy_time::{Duration, Instant, Ticker, Timer};
use heapless::Vec;
use opendeck_core::{ButtonSource, DeckController, DeviceState, DisplaySink, HidTransport, HostReport, TransportError};
use portable_atomic::Ordering;

use crate::channels::{
    HostMessage, InputReport, DECK_FAULTED, DIAGNOSTICS, FEATURE_REPORTS, HOST_REPORTS, INPUT_REPORTS, USB_CONFIGURED,
};
use crate::config::*;

/// [`HidTransport`] over the inter-task channels. Queued feature commands
/// are handed out ahead of output reports.
pub struct ChannelTransport {
    features: Receiver<'static, ThreadModeRawMutex, HostMessage, FEATURE_REPORT_QUEUE>,
    host: Receiver<'static, ThreadModeRawMutex, HostMessage, HOST_REPORT_QUEUE>,
    input: Sender<'static, ThreadModeRawMutex, InputReport, INPUT_REPORT_QUEUE>,
    // Keeps the last polled report alive while the controller borrows it
    current: Option<HostMessage>,
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self {
            features: FEATURE_REPORTS.receiver(),
            host: HOST_REPORTS.receiver(),
            input: INPUT_REPORTS.sender(),
            current: None,
        }
    }
}

impl Default for ChannelTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HidTransport for ChannelTransport {
    fn is_connected(&self) -> bool {
        USB_CONFIGURED.load(Ordering::Relaxed)
    }

    fn poll_report(&mut self) -> Option<HostReport<'_>> {
        let message = match self.features.try_receive() {
            Ok(feature) => feature,
            Err(_) => self.host.try_receive().ok()?,
        };
        self.current = Some(message);
        self.current.as_ref().map(HostMessage::as_report)
    }

    fn send_input_report(&mut self, report: &[u8]) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let report: InputReport = Vec::from_slice(report).map_err(|_| TransportError::Busy)?;
        self.input.try_send(report).map_err(|_| TransportError::Busy)
    }
}

/// Bring the controller up and run it forever.
pub async fn run<B, D, const C: usize>(
    mut deck: DeckController<'_, B, D, KEY_COUNT, C>,
    mut watchdog: Watchdog,
) -> !
where
    B: ButtonSource,
    D: DisplaySink,
{
    let mut transport = ChannelTransport::new();

    // Before the watchdog starts, display init alone takes most of its period
    match deck.init() {
        Ok(()) => info!("Deck ready"),
        Err(e) => error!("Deck init failed: {}", e),
    }

    if WATCHDOG_ENABLED {
        watchdog.pause_on_debug(true);
        watchdog.start(Duration::from_millis(WATCHDOG_TIMEOUT_MS));
        info!("Watchdog armed ({} ms)", WATCHDOG_TIMEOUT_MS);
    }

    let mut ticker = Ticker::every(Duration::from_millis(DECK_TICK_MS));
    let mut recovery_attempts: u8 = 0;
    let mut last_published = Instant::now();

    loop {
        ticker.next().await;

        match deck.state() {
            DeviceState::Ready => {
                DECK_FAULTED.store(false, Ordering::Relaxed);
                recovery_attempts = 0;

                let now_ms = Instant::now().as_millis();
                match deck.step(now_ms, &mut transport) {
                    Ok(report) => {
                        if report.changed {
                            debug!("Keys changed: {:?}", report);
                        }
                    }
                    Err(e) => warn!("Step rejected: {}", e),
                }
                if WATCHDOG_ENABLED {
                    watchdog.feed();
                }
            }
            DeviceState::Faulted => {
                DECK_FAULTED.store(true, Ordering::Relaxed);
                if recovery_attempts >= RECOVERY_ATTEMPTS {
                    give_up(&mut watchdog);
                    continue;
                }

                recovery_attempts += 1;
                warn!("Deck faulted, recovery attempt {}/{}", recovery_attempts, RECOVERY_ATTEMPTS);
                Timer::after(Duration::from_millis(RECOVERY_BACKOFF_MS)).await;
                if WATCHDOG_ENABLED {
                    watchdog.feed();
                }

                match deck.recover() {
                    Ok(()) => info!("Deck recovered"),
                    Err(e) => error!("Recovery failed: {}", e),
                }
                if WATCHDOG_ENABLED {
                    watchdog.feed();
                }
            }
            other => {
                // Only reachable if something shut the deck down
                warn!("Deck idle in state {:?}", other);
                Timer::after(Duration::from_millis(RECOVERY_BACKOFF_MS)).await;
            }
        }

        if last_published.elapsed() >= Duration::from_millis(DIAGNOSTICS_PERIOD_MS) {
            DIAGNOSTICS.signal(deck.diagnostics());
            last_published = Instant::now();
        }
    }
}

/// Reset the chip through the watchdog, or the core when it is disabled.
fn give_up(watchdog: &mut Watchdog) {
    if WATCHDOG_ENABLED {
        error!("Recovery exhausted, triggering watchdog reset");
        watchdog.trigger_reset();
    } else {
        error!("Recovery exhausted, resetting");
        cortex_m::peripheral::SCB::sys_reset();
    }
}
