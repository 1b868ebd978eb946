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
use std::fmt;

use tracing::trace;

use super::{
    sign_magnitude_level, to_sign_magnitude, PcmChip, VoiceRegion, VoiceRegisters, SILENCE_U8,
    WAVE_MEMORY_SIZE,
};

/// Fixed-point fraction bits used for voice read positions.
const POSITION_FRACTION_BITS: u32 = 16;

/// Divisor applied to each voice's contribution when mixing.
const VOICE_MIX_SHIFT: u32 = 4;

/// Per-voice simulation state.
#[derive(Clone, Copy, Debug, Default)]
struct SimVoice {
    region: VoiceRegion,
    registers: VoiceRegisters,
    /// Read offset within the region, 16.16 fixed point.
    position: u64,
}

impl SimVoice {
    fn offset(&self) -> u32 {
        (self.position >> POSITION_FRACTION_BITS) as u32
    }

    fn address(&self) -> u16 {
        self.region.start.wrapping_add(self.offset() as u16)
    }

    fn is_keyed_on(&self) -> bool {
        self.registers.freq != 0 && self.region.len != 0
    }

    /// Left and right levels (0-15) from the pan register.
    fn pan_levels(&self) -> (i32, i32) {
        (
            (self.registers.pan & 0x0F) as i32,
            (self.registers.pan >> 4) as i32,
        )
    }
}

/// A software model of an 8-voice PCM chip with 64 KiB of wave memory.
///
/// Voices loop over their configured region at their register frequency. The
/// chip does not run on its own: [`SimulatedChip::render`] advances every voice
/// by a number of output frames and mixes them into interleaved stereo.
pub struct SimulatedChip {
    memory: Box<[u8]>,
    voices: Vec<SimVoice>,
    output_rate: u32,
}

impl SimulatedChip {
    /// Number of voices on the chip.
    pub const VOICE_COUNT: usize = 8;

    /// Creates a chip that renders at the given output sample rate.
    pub fn new(output_rate: u32) -> SimulatedChip {
        SimulatedChip {
            memory: vec![to_sign_magnitude(SILENCE_U8); WAVE_MEMORY_SIZE].into_boxed_slice(),
            voices: vec![SimVoice::default(); Self::VOICE_COUNT],
            output_rate: output_rate.max(1),
        }
    }

    /// Returns the output sample rate.
    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// Advances all voices by `frames` output frames, appending interleaved
    /// 16-bit stereo samples to `out`.
    pub fn render(&mut self, out: &mut Vec<i16>, frames: usize) {
        out.reserve(frames * 2);
        for _ in 0..frames {
            let mut left = 0i32;
            let mut right = 0i32;

            for voice in self.voices.iter_mut() {
                if !voice.is_keyed_on() {
                    continue;
                }

                let stored = self.memory[voice.address() as usize];
                let level = sign_magnitude_level(stored) * voice.registers.envelope as i32;
                let (pan_left, pan_right) = voice.pan_levels();
                left += (level * pan_left) >> VOICE_MIX_SHIFT;
                right += (level * pan_right) >> VOICE_MIX_SHIFT;

                let step = ((voice.registers.freq as u64) << POSITION_FRACTION_BITS)
                    / self.output_rate as u64;
                let region_len = (voice.region.len as u64) << POSITION_FRACTION_BITS;
                voice.position = (voice.position + step) % region_len;
            }

            out.push(left.clamp(i16::MIN as i32, i16::MAX as i32) as i16);
            out.push(right.clamp(i16::MIN as i32, i16::MAX as i32) as i16);
        }
    }

    /// Moves a voice's read pointer to the given byte offset within its region.
    #[cfg(test)]
    pub fn seek_voice(&mut self, voice: usize, offset: u32) {
        let voice = &mut self.voices[voice];
        let offset = if voice.region.len == 0 {
            0
        } else {
            offset % voice.region.len
        };
        voice.position = (offset as u64) << POSITION_FRACTION_BITS;
    }

    /// Returns the raw (sign-magnitude) wave memory contents.
    #[cfg(test)]
    pub fn memory(&self, address: u16, len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| self.memory[(address as usize + i) % WAVE_MEMORY_SIZE])
            .collect()
    }

    /// Returns the registers last written to a voice.
    #[cfg(test)]
    pub fn voice_registers(&self, voice: usize) -> VoiceRegisters {
        self.voices[voice].registers
    }
}

impl PcmChip for SimulatedChip {
    fn voice_count(&self) -> usize {
        self.voices.len()
    }

    fn configure_voice(&mut self, voice: usize, region: VoiceRegion) {
        let voice = &mut self.voices[voice];
        voice.region = region;
        voice.position = 0;
    }

    fn write_voice(&mut self, voice: usize, registers: VoiceRegisters) {
        trace!(
            voice,
            freq = registers.freq,
            envelope = registers.envelope,
            pan = registers.pan,
            "Voice registers written"
        );
        self.voices[voice].registers = registers;
    }

    fn stop_voice(&mut self, voice: usize) {
        let voice = &mut self.voices[voice];
        voice.registers = VoiceRegisters::default();
        voice.position = 0;
    }

    fn read_address(&self, voice: usize) -> u16 {
        self.voices[voice].address()
    }

    fn load_samples(&mut self, address: u16, samples: &[u8]) {
        for (i, sample) in samples.iter().enumerate() {
            self.memory[(address as usize + i) % WAVE_MEMORY_SIZE] = to_sign_magnitude(*sample);
        }
    }

    fn load_silence(&mut self, address: u16, count: usize) {
        let silence = to_sign_magnitude(SILENCE_U8);
        for i in 0..count {
            self.memory[(address as usize + i) % WAVE_MEMORY_SIZE] = silence;
        }
    }

    fn reset(&mut self) {
        self.memory.fill(to_sign_magnitude(SILENCE_U8));
        for voice in self.voices.iter_mut() {
            voice.registers = VoiceRegisters::default();
            voice.position = 0;
        }
    }
}

impl fmt::Display for SimulatedChip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "simulated PCM chip ({} voices, {}Hz output)",
            self.voices.len(),
            self.output_rate
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chip_with_voice(len: u32) -> SimulatedChip {
        let mut chip = SimulatedChip::new(8000);
        chip.configure_voice(0, VoiceRegion { start: 0x1000, len });
        chip
    }

    #[test]
    fn test_stopped_voice_does_not_move() {
        let mut chip = chip_with_voice(64);
        let mut out = Vec::new();
        chip.render(&mut out, 100);

        assert_eq!(chip.read_address(0), 0x1000);
        assert_eq!(out.len(), 200);
        assert!(out.iter().all(|s| *s == 0));
    }

    #[test]
    fn test_voice_wraps_within_region() {
        let mut chip = chip_with_voice(64);
        chip.write_voice(
            0,
            VoiceRegisters {
                freq: 8000,
                envelope: 255,
                pan: 0xFF,
            },
        );

        let mut out = Vec::new();
        chip.render(&mut out, 70);
        // One wave memory byte per output frame at matching rates.
        assert_eq!(chip.read_address(0), 0x1000 + 6);
    }

    #[test]
    fn test_pan_routes_levels() {
        let mut chip = chip_with_voice(16);
        chip.load_samples(0x1000, &[0xC0; 16]);
        chip.write_voice(
            0,
            VoiceRegisters {
                freq: 8000,
                envelope: 255,
                pan: 0x0F,
            },
        );

        let mut out = Vec::new();
        chip.render(&mut out, 4);
        assert!(out[0] > 0);
        assert_eq!(out[1], 0);
    }

    #[test]
    fn test_reset_silences_memory_and_voices() {
        let mut chip = chip_with_voice(16);
        chip.load_samples(0x1000, &[0x10; 16]);
        chip.write_voice(
            0,
            VoiceRegisters {
                freq: 1000,
                envelope: 10,
                pan: 0x11,
            },
        );

        chip.reset();

        assert_eq!(chip.voice_registers(0), VoiceRegisters::default());
        assert!(chip.memory(0x1000, 16).iter().all(|b| *b == 0x80));
        assert_eq!(chip.read_address(0), 0x1000);
    }
}
