//! Error types
//!
//! Each layer has its own small error enum. The controller folds the
//! hardware-facing ones into [`DeckError`]; protocol and chunk errors never
//! escape a step, they are logged and counted instead.

use thiserror::Error;

use crate::types::DeviceState;

/// A host report was too short for the command it announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolError {
    #[error("report too short: {len} bytes, need {needed}")]
    TooShort { len: usize, needed: usize },
}

/// Rejected image chunk. The affected key's transfer is back to idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChunkError {
    #[error("key {key} out of range (device has {keys} keys)")]
    InvalidKey { key: u8, keys: usize },
    #[error("sequence mismatch: expected {expected}, got {got}")]
    SequenceMismatch { expected: u16, got: u16 },
    #[error("image buffer overflow: {needed} bytes, capacity {capacity}")]
    Overflow { needed: usize, capacity: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisplayError {
    #[error("SPI bus error")]
    Bus,
    #[error("display control pin error")]
    Pin,
    #[error("backlight PWM error")]
    Backlight,
    #[error("key {0} has no display")]
    InvalidKey(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonError {
    #[error("button pin error")]
    Pin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    #[error("host not connected")]
    NotConnected,
    #[error("input endpoint busy")]
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeckError {
    #[error("operation not allowed in state {0:?}")]
    InvalidState(DeviceState),
    #[error("display: {0}")]
    Display(#[from] DisplayError),
    #[error("buttons: {0}")]
    Buttons(#[from] ButtonError),
    #[error("key count mismatch: expected {expected}, got {actual}")]
    KeyCount { expected: usize, actual: usize },
}
