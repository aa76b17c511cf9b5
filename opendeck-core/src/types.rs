//! Small shared value types

/// Backlight level in percent, always within 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Brightness(u8);

impl Brightness {
    pub const OFF: Self = Self(0);
    pub const FULL: Self = Self(100);

    /// Values above 100 are clamped to 100.
    pub const fn new(percent: u8) -> Self {
        if percent > 100 {
            Self(100)
        } else {
            Self(percent)
        }
    }

    pub const fn percent(self) -> u8 {
        self.0
    }

    /// Scale to a PWM compare value for a counter whose full duty is `max`.
    pub fn duty(self, max: u16) -> u16 {
        (u32::from(self.0) * u32::from(max) / 100) as u16
    }
}

impl From<u8> for Brightness {
    fn from(percent: u8) -> Self {
        Self::new(percent)
    }
}

/// Protocol dialect a command arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolVersion {
    V1,
    V2,
}

/// Device lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceState {
    Uninitialized,
    Initializing,
    Ready,
    Resetting,
    ShuttingDown,
    Stopped,
    /// Init or a recovery attempt failed; only `recover` leaves this state.
    Faulted,
}
