//! OpenDeck core - Stream Deck Mini protocol emulation
//!
//! This library holds everything that makes an RP2040 board look like a
//! Stream Deck Mini to unmodified host software, independent of the
//! concrete microcontroller:
//!
//! - **Buttons**: matrix or direct-pin scanning with per-key debouncing
//! - **Images**: per-key reassembly of chunked output reports
//! - **Protocol**: V1/V2 feature report dispatch and output report decoding
//! - **Display**: six ST7735 panels multiplexed on one SPI bus, or one
//!   shared panel split into key regions
//! - **Controller**: the device lifecycle and the periodic scan/report step
//!
//! All hardware access goes through `embedded-hal` 1.0 traits, so the crate
//! builds on the host and the firmware plugs in `embassy-rp` peripherals.

#![no_std]

#[cfg(test)]
extern crate std;

// Must come first so the logging macros are visible to every module.
mod fmt;

pub mod buttons;
pub mod config;
pub mod controller;
pub mod display;
pub mod error;
pub mod image;
pub mod protocol;
pub mod transport;
pub mod types;

#[cfg(test)]
mod mock;

pub use buttons::{ButtonMatrix, ButtonScanner, ButtonSource, ButtonState, DirectButtons, ScanResult};
pub use config::DeckConfig;
pub use controller::{DeckController, Diagnostics, StepReport};
pub use display::{DisplayMultiplexer, DisplaySink, SharedPanel};
pub use error::{ButtonError, ChunkError, DeckError, DisplayError, ProtocolError, TransportError};
pub use image::{CompletedFrame, ReassemblyEngine, TransferPhase};
pub use protocol::{Command, CommandDispatcher, ImageChunk};
pub use transport::{HidTransport, HostReport};
pub use types::{Brightness, DeviceState, ProtocolVersion};
