//! OpenDeck - Stream Deck Mini compatible firmware for RP2040
//!
//! The protocol, image reassembly, button scanning and display logic live
//! in `opendeck-core`. This crate wires them to the RP2040 with Embassy:
//!
//! - **USB**: HID device with the Stream Deck Mini identity ([`usb`])
//! - **Controller**: one task owning all device state ([`deck`])
//! - **Channels**: host reports in, input reports out ([`channels`])
//! - **Supervision**: status LEDs, watchdog, periodic status log

#![no_std]

use embassy_rp::usb::InterruptHandler;
use embassy_rp::{bind_interrupts, peripherals};

pub mod channels;
pub mod config;
pub mod deck;
pub mod hardware;
pub mod supervisor;
pub mod usb;

// USB interrupt binding - shared by all binaries
bind_interrupts!(pub struct Irqs {
    USBCTRL_IRQ => InterruptHandler<peripherals::USB>;
});
