//! Peripheral bring-up shared by the board binaries
//!
//! Builds the display bus and backlight from typed Embassy peripherals and
//! runs the status LEDs. Button pins are plain `Input`/`Output`s and are
//! created directly by each binary.

use core::convert::Infallible;

use defmt::*;
use embassy_rp::gpio::Output;
use embassy_rp::peripherals::{PIN_17, PIN_18, PIN_19, PWM_SLICE0, SPI0};
use embassy_rp::pwm::{self, Pwm};
use embassy_rp::spi::{self, Spi};
use embassy_rp::Peri;
use embassy_time::{Duration, Timer};
use embedded_hal::pwm::{ErrorType, SetDutyCycle};
use embedded_hal::spi::SpiBus;
use fixed::traits::ToFixed;
use portable_atomic::Ordering;

use crate::channels::{DECK_FAULTED, USB_CONFIGURED};
use crate::config::*;

/// Peripherals the display stack is built from inside the controller task.
pub struct DisplayPeripherals {
    pub spi: Peri<'static, SPI0>,
    pub sck: Peri<'static, PIN_18>,
    pub mosi: Peri<'static, PIN_19>,
    pub backlight_slice: Peri<'static, PWM_SLICE0>,
    pub backlight: Peri<'static, PIN_17>,
}

impl DisplayPeripherals {
    /// Blocking, transmit-only SPI for the ST7735 panels plus the backlight.
    pub fn into_parts(self) -> (impl SpiBus, BacklightPwm) {
        let mut config = spi::Config::default();
        config.frequency = SPI_FREQUENCY_HZ;
        let spi = Spi::new_blocking_txonly(self.spi, self.sck, self.mosi, config);
        let backlight = BacklightPwm::new(self.backlight_slice, self.backlight);
        (spi, backlight)
    }
}

/// Backlight on PWM slice 0, channel B, starting dark.
pub struct BacklightPwm {
    pwm: Pwm<'static>,
    config: pwm::Config,
}

impl BacklightPwm {
    pub fn new(slice: Peri<'static, PWM_SLICE0>, pin: Peri<'static, PIN_17>) -> Self {
        let mut config = pwm::Config::default();
        config.divider = BACKLIGHT_PWM_DIVIDER.to_fixed();
        config.top = BACKLIGHT_PWM_TOP;
        config.compare_b = 0;
        let pwm = Pwm::new_output_b(slice, pin, config.clone());
        Self { pwm, config }
    }
}

impl ErrorType for BacklightPwm {
    type Error = Infallible;
}

impl SetDutyCycle for BacklightPwm {
    fn max_duty_cycle(&self) -> u16 {
        self.config.top
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        self.config.compare_b = duty.min(self.config.top);
        self.pwm.set_config(&self.config);
        Ok(())
    }
}

/// Status LEDs: heartbeat, USB configured, controller faulted.
#[embassy_executor::task]
pub async fn status_task(mut status_led: Output<'static>, mut usb_led: Output<'static>, mut error_led: Output<'static>) {
    info!("Status LED task started");

    loop {
        usb_led.set_level(USB_CONFIGURED.load(Ordering::Relaxed).into());
        error_led.set_level(DECK_FAULTED.load(Ordering::Relaxed).into());

        status_led.set_high();
        Timer::after(Duration::from_millis(STATUS_HEARTBEAT_ON_MS)).await;
        status_led.set_low();
        Timer::after(Duration::from_millis(STATUS_HEARTBEAT_OFF_MS)).await;
    }
}
