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

//! Creative 4-bit ADPCM (WAV codec 0x0200), mono.
//!
//! Blocks carry no header; the predictor and step run on from one block to the
//! next and only reset on rewind. Nibbles are high first.

use super::{load_blocks, pcm16_to_u8, BlockCursor, DecodedBlock, SampleProducer};

const ADAPT_TABLE: [i32; 8] = [230, 230, 230, 230, 307, 409, 512, 614];

const MIN_STEP: i32 = 511;
const MAX_STEP: i32 = 32767;

#[derive(Debug, Clone, Copy)]
struct Sb4State {
    predictor: i32,
    step: i32,
}

impl Default for Sb4State {
    fn default() -> Self {
        Sb4State {
            predictor: 0,
            step: MIN_STEP,
        }
    }
}

impl Sb4State {
    fn decode(&mut self, nibble: u8) -> i16 {
        let delta = (nibble & 0x07) as i32;
        let diff = ((2 * delta + 1) * self.step) >> 3;

        let decayed = (self.predictor * 254) >> 8;
        self.predictor = if nibble & 0x08 != 0 {
            decayed - diff
        } else {
            decayed + diff
        }
        .clamp(i16::MIN as i32, i16::MAX as i32);

        self.step = ((ADAPT_TABLE[delta as usize] * self.step) >> 8).clamp(MIN_STEP, MAX_STEP);

        self.predictor as i16
    }
}

/// Streaming SB4 ADPCM decoder.
#[derive(Debug, Clone)]
pub struct Sb4Decoder {
    cursor: BlockCursor,
    block: DecodedBlock,
    state: Sb4State,
}

impl Sb4Decoder {
    pub fn new(block_size: u16) -> Sb4Decoder {
        Sb4Decoder {
            cursor: BlockCursor::new(block_size),
            block: DecodedBlock::default(),
            state: Sb4State::default(),
        }
    }
}

impl SampleProducer for Sb4Decoder {
    fn load_mono(&mut self, data: &[u8], dest: &mut [u8]) -> usize {
        let state = &mut self.state;
        load_blocks(&mut self.block, &mut self.cursor, data, dest, |block, out| {
            for byte in block {
                out.push(pcm16_to_u8(state.decode(byte >> 4)));
                out.push(pcm16_to_u8(state.decode(byte & 0x0F)));
            }
        })
    }

    fn rewind(&mut self, data_len: usize) {
        self.cursor.rewind(data_len);
        self.block.invalidate();
        self.state = Sb4State::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(decoder: &mut Sb4Decoder, data: &[u8], count: usize) -> Vec<u8> {
        let mut out = vec![0u8; count];
        let produced = decoder.load_mono(data, &mut out);
        out.truncate(produced);
        out
    }

    #[test]
    fn test_high_nibble_decodes_first() {
        let mut decoder = Sb4Decoder::new(16);
        decoder.rewind(1);
        assert_eq!(decode(&mut decoder, &[0x70], 8), vec![0x83, 0x84]);

        decoder.rewind(1);
        assert_eq!(decode(&mut decoder, &[0x07], 8), vec![0x80, 0x83]);
    }

    #[test]
    fn test_step_stays_in_range() {
        let mut state = Sb4State::default();
        for _ in 0..64 {
            state.decode(0x07);
            assert!(state.step <= MAX_STEP);
        }
        for _ in 0..64 {
            state.decode(0x00);
            assert!(state.step >= MIN_STEP);
        }
    }

    #[test]
    fn test_state_carries_across_blocks() {
        let data = [0x70u8, 0x70];

        let mut one_block = Sb4Decoder::new(2);
        one_block.rewind(data.len());
        let expected = decode(&mut one_block, &data, 8);

        let mut split = Sb4Decoder::new(1);
        split.rewind(data.len());
        assert_eq!(decode(&mut split, &data, 8), expected);
        assert_eq!(expected.len(), 4);
    }

    #[test]
    fn test_rewind_resets_predictor() {
        let data = [0x77u8, 0x77, 0x77];
        let mut decoder = Sb4Decoder::new(2);
        decoder.rewind(data.len());

        let first = decode(&mut decoder, &data, 6);
        assert_eq!(decode(&mut decoder, &data, 6), Vec::<u8>::new());

        decoder.rewind(data.len());
        assert_eq!(decode(&mut decoder, &data, 6), first);
    }
}
