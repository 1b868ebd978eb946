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

//! PCM sound chip abstraction.
//!
//! The driver only touches the chip through [`PcmChip`]: per-voice registers,
//! the voice read pointer and the shared wave memory. Samples are handed to the
//! chip as unsigned 8-bit PCM; the chip stores them in its own sign-magnitude
//! format.

pub mod sim;

pub use sim::SimulatedChip;

/// Size of the chip's addressable wave memory in bytes.
pub const WAVE_MEMORY_SIZE: usize = 0x10000;

/// Unsigned 8-bit PCM silence.
pub const SILENCE_U8: u8 = 0x80;

/// Register values for a single voice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoiceRegisters {
    /// Playback rate in Hz. Zero keys the voice off.
    pub freq: u16,
    /// Envelope (volume), 0-255.
    pub envelope: u8,
    /// Pan register: low nibble is the left level, high nibble the right level.
    pub pan: u8,
}

/// The region of wave memory a voice loops over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoiceRegion {
    /// First byte of the region.
    pub start: u16,
    /// Length in bytes. The voice wraps back to `start` at the end of the region.
    pub len: u32,
}

/// A sound chip with a fixed number of voices reading from shared wave memory.
pub trait PcmChip: Send {
    /// Returns the number of hardware voices.
    fn voice_count(&self) -> usize;

    /// Sets the wave memory region the voice plays through.
    fn configure_voice(&mut self, voice: usize, region: VoiceRegion);

    /// Writes the voice registers. A zero frequency keys the voice off.
    fn write_voice(&mut self, voice: usize, registers: VoiceRegisters);

    /// Keys the voice off and parks its read pointer at the start of its region.
    fn stop_voice(&mut self, voice: usize);

    /// Returns the wave memory address the voice is currently reading.
    fn read_address(&self, voice: usize) -> u16;

    /// Copies unsigned 8-bit PCM samples into wave memory at the given address.
    fn load_samples(&mut self, address: u16, samples: &[u8]);

    /// Writes `count` samples of silence at the given address.
    fn load_silence(&mut self, address: u16, count: usize);

    /// Keys off every voice and silences wave memory. Voice regions are kept.
    fn reset(&mut self);
}

/// Converts unsigned 8-bit PCM into the chip's sign-magnitude format.
///
/// Bit 7 set means positive. 0xFF is reserved as the loop marker, so full-scale
/// positive saturates to 0xFE and full-scale negative to 0x7F.
pub fn to_sign_magnitude(sample: u8) -> u8 {
    if sample >= 0x80 {
        sample.min(0xFE)
    } else {
        (0x80 - sample).min(0x7F)
    }
}

/// Converts a sign-magnitude sample back to a signed level in -127..=127.
pub fn sign_magnitude_level(stored: u8) -> i32 {
    let magnitude = (stored & 0x7F) as i32;
    if stored & 0x80 != 0 {
        magnitude
    } else {
        -magnitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_magnitude_conversion() {
        assert_eq!(to_sign_magnitude(SILENCE_U8), 0x80);
        assert_eq!(to_sign_magnitude(0x81), 0x81);
        assert_eq!(to_sign_magnitude(0xFF), 0xFE);
        assert_eq!(to_sign_magnitude(0x7F), 0x01);
        assert_eq!(to_sign_magnitude(0x00), 0x7F);

        assert_eq!(sign_magnitude_level(0x80), 0);
        assert_eq!(sign_magnitude_level(0x85), 5);
        assert_eq!(sign_magnitude_level(0x05), -5);
        assert_eq!(sign_magnitude_level(to_sign_magnitude(0x00)), -127);
    }
}
