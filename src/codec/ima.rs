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

//! IMA ADPCM (WAV codec 0x0011), mono.
//!
//! Each block starts with a 4-byte header: the initial predictor (i16 LE), the
//! step index and a reserved byte. The header predictor is the block's first
//! sample, followed by two samples per data byte, low nibble first.

use super::{load_blocks, pcm16_to_u8, BlockCursor, DecodedBlock, SampleProducer};

const BLOCK_HEADER_SIZE: usize = 4;

const INDEX_TABLE: [i32; 16] = [-1, -1, -1, -1, 2, 4, 6, 8, -1, -1, -1, -1, 2, 4, 6, 8];

const STEP_TABLE: [i32; 89] = [
    7, 8, 9, 10, 11, 12, 13, 14, 16, 17, 19, 21, 23, 25, 28, 31, 34, 37, 41, 45, 50, 55, 60, 66,
    73, 80, 88, 97, 107, 118, 130, 143, 157, 173, 190, 209, 230, 253, 279, 307, 337, 371, 408,
    449, 494, 544, 598, 658, 724, 796, 876, 963, 1060, 1166, 1282, 1411, 1552, 1707, 1878, 2066,
    2272, 2499, 2749, 3024, 3327, 3660, 4026, 4428, 4871, 5358, 5894, 6484, 7132, 7845, 8630,
    9493, 10442, 11487, 12635, 13899, 15289, 16818, 18500, 20350, 22385, 24623, 27086, 29794,
    32767,
];

/// Streaming IMA ADPCM decoder.
#[derive(Debug, Clone)]
pub struct ImaDecoder {
    cursor: BlockCursor,
    block: DecodedBlock,
}

impl ImaDecoder {
    pub fn new(block_size: u16) -> ImaDecoder {
        ImaDecoder {
            cursor: BlockCursor::new(block_size),
            block: DecodedBlock::default(),
        }
    }

    /// Number of samples a full block of `block_size` bytes decodes to.
    pub fn samples_per_block(block_size: u16) -> usize {
        (block_size as usize).saturating_sub(BLOCK_HEADER_SIZE) * 2 + 1
    }

    /// Samples decoded from a whole payload of `data_len` bytes.
    pub fn total_samples(data_len: usize, block_size: u16) -> usize {
        let block_size = (block_size as usize).max(BLOCK_HEADER_SIZE);
        let tail = data_len % block_size;
        let tail_samples = if tail >= BLOCK_HEADER_SIZE {
            Self::samples_per_block(tail as u16)
        } else {
            0
        };
        data_len / block_size * Self::samples_per_block(block_size as u16) + tail_samples
    }
}

impl SampleProducer for ImaDecoder {
    fn load_mono(&mut self, data: &[u8], dest: &mut [u8]) -> usize {
        load_blocks(&mut self.block, &mut self.cursor, data, dest, decode_block)
    }

    fn rewind(&mut self, data_len: usize) {
        self.cursor.rewind(data_len);
        self.block.invalidate();
    }
}

/// Decodes one block. Blocks shorter than the header decode to nothing.
fn decode_block(block: &[u8], out: &mut Vec<u8>) {
    if block.len() < BLOCK_HEADER_SIZE {
        return;
    }

    let mut predictor = i16::from_le_bytes([block[0], block[1]]) as i32;
    let mut index = (block[2] as i32).clamp(0, 88);
    out.push(pcm16_to_u8(predictor as i16));

    for byte in &block[BLOCK_HEADER_SIZE..] {
        for nibble in [byte & 0x0F, byte >> 4] {
            let sample = decode_nibble(nibble, &mut predictor, &mut index);
            out.push(pcm16_to_u8(sample));
        }
    }
}

fn decode_nibble(nibble: u8, predictor: &mut i32, index: &mut i32) -> i16 {
    let step = STEP_TABLE[*index as usize];
    let mut delta = step >> 3;
    if nibble & 0x01 != 0 {
        delta += step >> 2;
    }
    if nibble & 0x02 != 0 {
        delta += step >> 1;
    }
    if nibble & 0x04 != 0 {
        delta += step;
    }

    if nibble & 0x08 != 0 {
        *predictor -= delta;
    } else {
        *predictor += delta;
    }
    *predictor = (*predictor).clamp(i16::MIN as i32, i16::MAX as i32);
    *index = (*index + INDEX_TABLE[nibble as usize]).clamp(0, 88);

    *predictor as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(block_size: u16, data: &[u8]) -> Vec<u8> {
        let mut decoder = ImaDecoder::new(block_size);
        decoder.rewind(data.len());
        let mut out = vec![0u8; 1024];
        let count = decoder.load_mono(data, &mut out);
        out.truncate(count);
        out
    }

    #[test]
    fn test_header_predictor_is_first_sample() {
        // Predictor 0x1000, step index 0, a silent data byte.
        let samples = decode_all(5, &[0x00, 0x10, 0x00, 0x00, 0x00]);
        assert_eq!(samples, vec![0x90, 0x90, 0x90]);
    }

    #[test]
    fn test_low_nibble_decodes_first() {
        let low_first = decode_all(5, &[0x00, 0x00, 88, 0x00, 0x0F]);
        assert_eq!(low_first, vec![0x80, 0x00, 0x0F]);

        let high_first = decode_all(5, &[0x00, 0x00, 88, 0x00, 0xF0]);
        assert_eq!(high_first, vec![0x80, 0x8F, 0x00]);
    }

    #[test]
    fn test_block_boundaries_and_rewind() {
        let mut data = vec![0x00, 0x10, 0x00, 0x00, 0x00];
        data.extend_from_slice(&[0x00, 0xF0, 0x00, 0x00, 0x00]);
        // Too short to carry a header.
        data.extend_from_slice(&[0x00, 0x00, 0x00]);

        let mut decoder = ImaDecoder::new(5);
        decoder.rewind(data.len());

        let mut dest = [0u8; 4];
        assert_eq!(decoder.load_mono(&data, &mut dest), 4);
        assert_eq!(dest, [0x90, 0x90, 0x90, 0x70]);

        let mut rest = [0u8; 8];
        assert_eq!(decoder.load_mono(&data, &mut rest), 2);
        assert_eq!(decoder.load_mono(&data, &mut rest), 0);

        decoder.rewind(data.len());
        assert_eq!(decoder.load_mono(&data, &mut dest), 4);
        assert_eq!(dest[0], 0x90);
    }

    #[test]
    fn test_header_only_fragment_produces_nothing() {
        assert!(decode_all(36, &[0x00, 0x00, 0x00]).is_empty());
    }

    #[test]
    fn test_stereo_is_unsupported() {
        let data = [0u8; 10];
        let mut decoder = ImaDecoder::new(5);
        decoder.rewind(data.len());
        let mut left = [0u8; 4];
        let mut right = [0u8; 4];
        assert_eq!(decoder.load_stereo(&data, &mut left, &mut right), 0);
    }

    #[test]
    fn test_samples_per_block() {
        assert_eq!(ImaDecoder::samples_per_block(256), 505);
        assert_eq!(ImaDecoder::samples_per_block(5), 3);
    }

    #[test]
    fn test_total_samples() {
        assert_eq!(ImaDecoder::total_samples(512, 256), 1010);
        assert_eq!(ImaDecoder::total_samples(261, 256), 508);
        assert_eq!(ImaDecoder::total_samples(259, 256), 505);
        assert_eq!(ImaDecoder::total_samples(0, 256), 0);
    }
}
