//! Per-key image reassembly
//!
//! The host splits each key image into numbered chunks. Every key owns one
//! [`ImageTransfer`] slot; chunks must arrive strictly in order starting at
//! sequence 0, and the last one hands out a [`CompletedFrame`] that returns
//! the slot to idle when dropped.

use heapless::Vec;

use crate::config::{BMP_HEADER_LEN, BMP_MAGIC};
use crate::error::ChunkError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferPhase {
    Idle,
    Receiving,
    Complete,
}

/// Reassembly state of one key.
#[derive(Debug)]
pub struct ImageTransfer<const C: usize> {
    buffer: Vec<u8, C>,
    expected_sequence: u16,
    phase: TransferPhase,
    last_packet_ms: u64,
}

impl<const C: usize> ImageTransfer<C> {
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            expected_sequence: 0,
            phase: TransferPhase::Idle,
            last_packet_ms: 0,
        }
    }

    fn start(&mut self, now_ms: u64) {
        self.buffer.clear();
        self.expected_sequence = 0;
        self.phase = TransferPhase::Receiving;
        self.last_packet_ms = now_ms;
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.expected_sequence = 0;
        self.phase = TransferPhase::Idle;
    }

    pub fn phase(&self) -> TransferPhase {
        self.phase
    }

    pub fn bytes_received(&self) -> usize {
        self.buffer.len()
    }

    pub fn expected_sequence(&self) -> u16 {
        self.expected_sequence
    }
}

impl<const C: usize> Default for ImageTransfer<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// A fully received image, borrowed straight out of its slot.
///
/// Dropping the frame resets the slot to idle, whether or not the caller
/// managed to display it.
#[derive(Debug)]
pub struct CompletedFrame<'a, const C: usize> {
    key: u8,
    transfer: &'a mut ImageTransfer<C>,
}

impl<const C: usize> CompletedFrame<'_, C> {
    pub fn key(&self) -> u8 {
        self.key
    }

    /// Everything the host sent, headers included.
    pub fn data(&self) -> &[u8] {
        &self.transfer.buffer
    }

    /// Raw pixel bytes: a leading BMP file header is skipped.
    pub fn pixels(&self) -> &[u8] {
        let data = self.data();
        if data.len() > BMP_HEADER_LEN && data.starts_with(&BMP_MAGIC) {
            &data[BMP_HEADER_LEN..]
        } else {
            data
        }
    }
}

impl<const C: usize> Drop for CompletedFrame<'_, C> {
    fn drop(&mut self) {
        self.transfer.reset();
    }
}

/// Reassembly slots for `N` keys with `C` bytes each.
pub struct ReassemblyEngine<const N: usize, const C: usize> {
    slots: [ImageTransfer<C>; N],
}

impl<const N: usize, const C: usize> ReassemblyEngine<N, C> {
    /// `const` so the firmware can place the slots in a static.
    pub const fn new() -> Self {
        Self {
            slots: [const { ImageTransfer::new() }; N],
        }
    }

    pub const fn capacity(&self) -> usize {
        C
    }

    /// Feed one chunk into `key`'s slot.
    ///
    /// A chunk with sequence 0 always starts over. Anything out of order or
    /// too large drops the slot back to idle and reports why.
    pub fn accept_chunk(
        &mut self,
        key: u8,
        sequence: u16,
        is_last: bool,
        payload: &[u8],
        now_ms: u64,
    ) -> Result<Option<CompletedFrame<'_, C>>, ChunkError> {
        let transfer = self
            .slots
            .get_mut(usize::from(key))
            .ok_or(ChunkError::InvalidKey { key, keys: N })?;

        if sequence == 0 {
            if transfer.phase == TransferPhase::Receiving {
                debug!("Key {}: restarting transfer after {} bytes", key, transfer.buffer.len());
            }
            transfer.start(now_ms);
        }

        if transfer.phase != TransferPhase::Receiving || sequence != transfer.expected_sequence {
            let expected = transfer.expected_sequence;
            transfer.reset();
            return Err(ChunkError::SequenceMismatch {
                expected,
                got: sequence,
            });
        }

        let needed = transfer.buffer.len() + payload.len();
        if needed > C {
            transfer.reset();
            return Err(ChunkError::Overflow { needed, capacity: C });
        }
        if transfer.buffer.extend_from_slice(payload).is_err() {
            transfer.reset();
            return Err(ChunkError::Overflow { needed, capacity: C });
        }

        transfer.expected_sequence = transfer.expected_sequence.wrapping_add(1);
        transfer.last_packet_ms = now_ms;

        if is_last {
            transfer.phase = TransferPhase::Complete;
            trace!("Key {}: image complete, {} bytes", key, transfer.buffer.len());
            Ok(Some(CompletedFrame { key, transfer }))
        } else {
            Ok(None)
        }
    }

    /// Drop transfers that have been receiving without progress for at least
    /// `timeout_ms`. Returns how many slots were reclaimed.
    pub fn reclaim_stale(&mut self, now_ms: u64, timeout_ms: u64) -> usize {
        let mut reclaimed = 0;
        for (key, slot) in self.slots.iter_mut().enumerate() {
            if slot.phase == TransferPhase::Receiving
                && now_ms.saturating_sub(slot.last_packet_ms) >= timeout_ms
            {
                warn!("Key {}: stalled transfer reclaimed at {} bytes", key, slot.buffer.len());
                slot.reset();
                reclaimed += 1;
            }
        }
        reclaimed
    }

    pub fn reset_all(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.reset();
        }
    }

    pub fn slot(&self, key: usize) -> Option<&ImageTransfer<C>> {
        self.slots.get(key)
    }

    pub fn phase(&self, key: usize) -> Option<TransferPhase> {
        self.slot(key).map(ImageTransfer::phase)
    }

    pub fn bytes_received(&self, key: usize) -> Option<usize> {
        self.slot(key).map(ImageTransfer::bytes_received)
    }
}

impl<const N: usize, const C: usize> Default for ReassemblyEngine<N, C> {
    fn default() -> Self {
        Self::new()
    }
}
