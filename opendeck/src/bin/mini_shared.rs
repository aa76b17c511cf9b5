//! OpenDeck - single-panel Stream Deck Mini board
//!
//! - 6 keys on dedicated GPIOs
//! - one 240x160 ST7735 split into six 80x80 key regions
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
use opendeck_core::{DeckConfig, DeckController, DirectButtons, ReassemblyEngine, SharedPanel};
use static_cell::{ConstStaticCell, StaticCell};
use {defmt_rtt as _, panic_halt as _};

static EXECUTOR: StaticCell<Executor> = StaticCell::new();

static IMAGES: ConstStaticCell<ReassemblyEngine<KEY_COUNT, IMAGE_BUFFER_SIZE>> =
    ConstStaticCell::new(ReassemblyEngine::new());

struct Board {
    keys: [Input<'static>; KEY_COUNT],
    cs: Output<'static>,
    dc: Output<'static>,
    rst: Output<'static>,
    display: DisplayPeripherals,
    watchdog: Watchdog,
}

#[cortex_m_rt::entry]
fn main() -> ! {
    let p = embassy_rp::init(Default::default());

    let supervisor = AppSupervisor::new(BoardVariant::MiniShared);
    supervisor.print_startup_banner();

    let board = Board {
        keys: [
            Input::new(p.PIN_2, Pull::Up),
            Input::new(p.PIN_3, Pull::Up),
            Input::new(p.PIN_4, Pull::Up),
            Input::new(p.PIN_5, Pull::Up),
            Input::new(p.PIN_6, Pull::Up),
            Input::new(p.PIN_7, Pull::Up),
        ],
        cs: Output::new(p.PIN_8, Level::High),
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
        unwrap!(spawner.spawn(deck_task(board)));
        unwrap!(spawner.spawn(usb::usb_task(driver)));
        unwrap!(spawner.spawn(hardware::status_task(status_led, usb_led, error_led)));
        unwrap!(spawner.spawn(supervisor_task(supervisor)));
    })
}

#[embassy_executor::task]
async fn deck_task(board: Board) {
    let (spi, backlight) = board.display.into_parts();
    let display = SharedPanel::<_, _, _, _, _, _, KEY_COLS, KEY_ROWS>::new(
        spi,
        board.cs,
        board.dc,
        board.rst,
        backlight,
        Delay,
    );
    let buttons = DirectButtons::new(board.keys);

    let deck = DeckController::new(DeckConfig::mini(), buttons, display, IMAGES.take());
    deck::run(deck, board.watchdog).await
}

#[embassy_executor::task]
async fn supervisor_task(mut supervisor: AppSupervisor) {
    supervisor.run().await
}
