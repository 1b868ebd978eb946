// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Hardware voice (channel) management.
//!
//! Each channel owns a fixed slice of wave memory split into two halves. The
//! chip loops over both halves; whichever half it is not reading is the back
//! half and is safe to write.

use std::fmt;

use tracing::debug;

use crate::pcm::{PcmChip, VoiceRegion, VoiceRegisters};

/// Pan code that routes a voice fully to the left output.
pub const PAN_HARD_LEFT: u8 = 0x0F;

/// Pan code that routes a voice fully to the right output.
pub const PAN_HARD_RIGHT: u8 = 0xF0;

/// Identifies a channel. Ids are 1-based so that 0 can mean "no channel" on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(u8);

impl ChannelId {
    /// Returns the 1-based id.
    pub fn get(self) -> u8 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize - 1
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A hardware voice slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Channel {
    /// Target frequency. Zero means the channel is free.
    pub freq: u16,
    pub envelope: u8,
    pub pan: u8,
    /// Fixed wave memory offset of the channel's first half.
    pub base: u16,
}

impl Channel {
    pub fn is_free(&self) -> bool {
        self.freq == 0
    }
}

/// The fixed set of hardware voices available to sources.
pub struct ChannelPool {
    channels: Vec<Channel>,
    half_size: u16,
}

impl ChannelPool {
    /// Creates a pool of `count` channels, each owning two halves of `half_size` bytes.
    pub fn new(count: usize, half_size: u16) -> ChannelPool {
        let channels = (0..count)
            .map(|i| Channel {
                base: (i * 2 * half_size as usize) as u16,
                ..Channel::default()
            })
            .collect();

        ChannelPool {
            channels,
            half_size,
        }
    }

    /// Assigns every channel its wave memory region on the chip and silences it.
    pub fn attach(&mut self, chip: &mut dyn PcmChip) {
        for (voice, channel) in self.channels.iter_mut().enumerate() {
            *channel = Channel {
                base: channel.base,
                ..Channel::default()
            };
            chip.configure_voice(
                voice,
                VoiceRegion {
                    start: channel.base,
                    len: 2 * self.half_size as u32,
                },
            );
            chip.stop_voice(voice);
            chip.load_silence(channel.base, 2 * self.half_size as usize);
        }
    }

    /// Returns every channel to the free state. Equivalent to attaching again.
    pub fn reset(&mut self, chip: &mut dyn PcmChip) {
        self.attach(chip);
    }

    /// Claims the first free channel by setting its target frequency.
    pub fn allocate(&mut self, freq: u16) -> Option<ChannelId> {
        if freq == 0 {
            return None;
        }

        let (index, channel) = self
            .channels
            .iter_mut()
            .enumerate()
            .find(|(_, channel)| channel.is_free())?;
        channel.freq = freq;

        let id = ChannelId(index as u8 + 1);
        debug!(channel = id.get(), freq, "Allocated channel");
        Some(id)
    }

    /// Frees the channel, keys off its voice and silences both halves.
    pub fn release(&mut self, id: ChannelId, chip: &mut dyn PcmChip) {
        let Some(channel) = self.channels.get_mut(id.index()) else {
            return;
        };
        *channel = Channel {
            base: channel.base,
            ..Channel::default()
        };
        chip.stop_voice(id.index());
        chip.load_silence(channel.base, 2 * self.half_size as usize);
        debug!(channel = id.get(), "Released channel");
    }

    /// Frees a channel that was claimed but never committed to the chip.
    pub fn unclaim(&mut self, id: ChannelId) {
        if let Some(channel) = self.channels.get_mut(id.index()) {
            channel.freq = 0;
        }
    }

    /// Returns the channel state, if the id is valid.
    pub fn get(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.get(id.index())
    }

    /// Returns the half (0 or 1) the chip is currently reading.
    pub fn current_half(&self, id: ChannelId, chip: &dyn PcmChip) -> u8 {
        let base = self.channels[id.index()].base;
        let offset = chip.read_address(id.index()).wrapping_sub(base);
        if offset >= self.half_size {
            1
        } else {
            0
        }
    }

    /// Returns the half (0 or 1) that is safe to write.
    pub fn back_half(&self, id: ChannelId, chip: &dyn PcmChip) -> u8 {
        1 - self.current_half(id, chip)
    }

    /// Returns the fixed wave memory offset of the channel.
    pub fn base_block_offset(&self, id: ChannelId) -> u16 {
        self.channels[id.index()].base
    }

    /// Returns the wave memory address of one of the channel's halves.
    pub fn half_offset(&self, id: ChannelId, half: u8) -> u16 {
        self.base_block_offset(id) + half as u16 * self.half_size
    }

    /// Stores the parameters and pushes them to the voice registers.
    pub fn commit(&mut self, id: ChannelId, chip: &mut dyn PcmChip, freq: u16, envelope: u8, pan: u8) {
        let channel = &mut self.channels[id.index()];
        channel.freq = freq;
        channel.envelope = envelope;
        channel.pan = pan;
        chip.write_voice(
            id.index(),
            VoiceRegisters {
                freq,
                envelope,
                pan,
            },
        );
    }

    /// Returns the raw read address of the channel's voice.
    pub fn position(&self, id: ChannelId, chip: &dyn PcmChip) -> u16 {
        chip.read_address(id.index())
    }

    /// Returns the number of free channels.
    pub fn free_count(&self) -> usize {
        self.channels.iter().filter(|c| c.is_free()).count()
    }

    pub fn half_size(&self) -> u16 {
        self.half_size
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// Maps an 8-bit linear pan (0 full right, 128 center, 255 full left) to a chip
/// pan code (low nibble left level, high nibble right level).
pub fn map_linear_pan(pan: u8) -> u8 {
    let left = pan >> 4;
    let right = (255 - pan) >> 4;
    (right << 4) | left
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcm::SimulatedChip;

    fn attached_pool(count: usize, half: u16) -> (ChannelPool, SimulatedChip) {
        let mut chip = SimulatedChip::new(8000);
        let mut pool = ChannelPool::new(count, half);
        pool.attach(&mut chip);
        (pool, chip)
    }

    #[test]
    fn test_linear_pan_mapping() {
        assert_eq!(map_linear_pan(0), PAN_HARD_RIGHT);
        assert_eq!(map_linear_pan(255), PAN_HARD_LEFT);
        assert_eq!(map_linear_pan(128), 0x78);
    }

    #[test]
    fn test_allocate_until_exhausted() {
        let (mut pool, _chip) = attached_pool(2, 256);

        let first = pool.allocate(8000).expect("first channel");
        let second = pool.allocate(8000).expect("second channel");
        assert_eq!(first.get(), 1);
        assert_eq!(second.get(), 2);
        assert!(pool.allocate(8000).is_none());
        assert_eq!(pool.free_count(), 0);

        pool.unclaim(first);
        assert_eq!(pool.allocate(11025), Some(first));
    }

    #[test]
    fn test_zero_frequency_cannot_claim() {
        let (mut pool, _chip) = attached_pool(2, 256);
        assert!(pool.allocate(0).is_none());
        assert_eq!(pool.free_count(), 2);
    }

    #[test]
    fn test_halves_and_offsets() {
        let (mut pool, mut chip) = attached_pool(2, 256);
        let _ = pool.allocate(8000);
        let second = pool.allocate(8000).expect("second channel");

        assert_eq!(pool.base_block_offset(second), 512);
        assert_eq!(pool.half_offset(second, 0), 512);
        assert_eq!(pool.half_offset(second, 1), 768);

        assert_eq!(pool.current_half(second, &chip), 0);
        assert_eq!(pool.back_half(second, &chip), 1);

        chip.seek_voice(1, 300);
        assert_eq!(pool.current_half(second, &chip), 1);
        assert_eq!(pool.back_half(second, &chip), 0);
        assert_eq!(pool.position(second, &chip), 812);
    }

    #[test]
    fn test_release_silences_voice() {
        let (mut pool, mut chip) = attached_pool(1, 16);
        let id = pool.allocate(8000).expect("channel");
        chip.load_samples(0, &[0x10; 32]);
        pool.commit(id, &mut chip, 8000, 200, 0x33);
        assert_eq!(chip.voice_registers(0).envelope, 200);

        pool.release(id, &mut chip);

        assert!(pool.get(id).is_some_and(|c| c.is_free()));
        assert_eq!(chip.voice_registers(0), VoiceRegisters::default());
        assert!(chip.memory(0, 32).iter().all(|b| *b == 0x80));
    }
}
