//! OpenDeck - Stream Deck Mini board
//!
//! - 6 keys read from a 3x2 button matrix
//! - one 80x80 ST7735 per key, each on its own chip-select
//! - USB VID:PID 0x0fd9:0x0063

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Executor;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::usb::Driver;
use embassy_rp::watchdog::Watchdog;
use embassy_time::Delay;
use opendeck::config::*;
use opendeck::hardware::{self, DisplayPeripherals};
use opendeck::supervisor::{AppSupervisor, BoardVariant};
use opendeck::{deck, usb, Irqs};
use opendeck_core::{ButtonMatrix, DeckConfig, DeckController, DisplayMultiplexer, ReassemblyEngine};
use static_cell::{ConstStaticCell, StaticCell};
use {defmt_rtt as _, panic_halt as _};

static EXECUTOR: StaticCell<Executor> = StaticCell::new();

// One full frame per key, far too large for a task stack
static IMAGES: ConstStaticCell<ReassemblyEngine<KEY_COUNT, IMAGE_BUFFER_SIZE>> =
    ConstStaticCell::new(ReassemblyEngine::new());

/// Everything the controller task needs, handed over once at startup.
struct Board {
    rows: [Output<'static>; KEY_ROWS],
    cols: [Input<'static>; KEY_COLS],
    cs: [Output<'static>; KEY_COUNT],
    dc: Output<'static>,
    rst: Output<'static>,
    display: DisplayPeripherals,
    watchdog: Watchdog,
}

#[cortex_m_rt::entry]
fn main() -> ! {
    let p = embassy_rp::init(Default::default());

    let supervisor = AppSupervisor::new(BoardVariant::Mini);
    supervisor.print_startup_banner();

    let board = Board {
        rows: [Output::new(p.PIN_2, Level::High), Output::new(p.PIN_3, Level::High)],
        cols: [
            Input::new(p.PIN_4, Pull::Up),
            Input::new(p.PIN_5, Pull::Up),
            Input::new(p.PIN_6, Pull::Up),
        ],
        cs: [
            Output::new(p.PIN_8, Level::High),
            Output::new(p.PIN_9, Level::High),
            Output::new(p.PIN_10, Level::High),
            Output::new(p.PIN_11, Level::High),
            Output::new(p.PIN_12, Level::High),
            Output::new(p.PIN_13, Level::High),
        ],
        dc: Output::new(p.PIN_14, Level::Low),
        rst: Output::new(p.PIN_15, Level::High),
        display: DisplayPeripherals {
            spi: p.SPI0,
            sck: p.PIN_18,
            mosi: p.PIN_19,
            backlight_slice: p.PWM_SLICE0,
            backlight: p.PIN_17,
        },
        watchdog: Watchdog::new(p.WATCHDOG),
    };

    let driver = Driver::new(p.USB, Irqs);
    let status_led = Output::new(p.PIN_25, Level::Low);
    let usb_led = Output::new(p.PIN_20, Level::Low);
    let error_led = Output::new(p.PIN_21, Level::Low);

    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| {
        // Panel bring-up blocks the executor, finish it before USB enumerates
        unwrap!(spawner.spawn(deck_task(board)));
        unwrap!(spawner.spawn(usb::usb_task(driver)));
        unwrap!(spawner.spawn(hardware::status_task(status_led, usb_led, error_led)));
        unwrap!(spawner.spawn(supervisor_task(supervisor)));
    })
}

#[embassy_executor::task]
async fn deck_task(board: Board) {
    let (spi, backlight) = board.display.into_parts();
    let display = DisplayMultiplexer::new(spi, board.cs, board.dc, board.rst, backlight, Delay);
    let buttons = unwrap!(ButtonMatrix::new(board.rows, board.cols, Delay));

    let deck = DeckController::new(DeckConfig::mini(), buttons, display, IMAGES.take());
    deck::run(deck, board.watchdog).await
}

#[embassy_executor::task]
async fn supervisor_task(mut supervisor: AppSupervisor) {
    supervisor.run().await
}
