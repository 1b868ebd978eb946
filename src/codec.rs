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

//! Incremental sample producers.
//!
//! A producer turns a buffer's payload into unsigned 8-bit PCM a chunk at a
//! time. Producers never own the payload: the caller passes the buffer data on
//! every call and the producer only keeps its cursor and decoder state.

use crate::buffers::BufferFormat;

mod ima;
mod raw;
mod sb4;

pub use ima::ImaDecoder;
pub use raw::RawPcm;
pub use sb4::Sb4Decoder;

/// Streams unsigned 8-bit samples out of a buffer payload.
pub trait SampleProducer {
    /// Fills up to `dest.len()` mono samples. Returns fewer than requested only
    /// once the payload is exhausted.
    fn load_mono(&mut self, data: &[u8], dest: &mut [u8]) -> usize;

    /// Fills up to `left.len()` frames of de-interleaved stereo. Producers that
    /// can't do stereo produce nothing.
    fn load_stereo(&mut self, _data: &[u8], _left: &mut [u8], _right: &mut [u8]) -> usize {
        0
    }

    /// Moves back to the start of a payload of `data_len` bytes.
    fn rewind(&mut self, data_len: usize);
}

/// The producer for a buffer format.
#[derive(Debug, Clone)]
pub enum Decoder {
    Raw(RawPcm),
    Ima(ImaDecoder),
    Sb4(Sb4Decoder),
}

impl Decoder {
    pub fn for_format(format: BufferFormat) -> Decoder {
        match format {
            BufferFormat::RawU8 => Decoder::Raw(RawPcm::default()),
            BufferFormat::ImaAdpcm { block_size } => Decoder::Ima(ImaDecoder::new(block_size)),
            BufferFormat::Sb4Adpcm { block_size } => Decoder::Sb4(Sb4Decoder::new(block_size)),
        }
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Decoder::Raw(RawPcm::default())
    }
}

impl SampleProducer for Decoder {
    fn load_mono(&mut self, data: &[u8], dest: &mut [u8]) -> usize {
        match self {
            Decoder::Raw(raw) => raw.load_mono(data, dest),
            Decoder::Ima(ima) => ima.load_mono(data, dest),
            Decoder::Sb4(sb4) => sb4.load_mono(data, dest),
        }
    }

    fn load_stereo(&mut self, data: &[u8], left: &mut [u8], right: &mut [u8]) -> usize {
        match self {
            Decoder::Raw(raw) => raw.load_stereo(data, left, right),
            Decoder::Ima(ima) => ima.load_stereo(data, left, right),
            Decoder::Sb4(sb4) => sb4.load_stereo(data, left, right),
        }
    }

    fn rewind(&mut self, data_len: usize) {
        match self {
            Decoder::Raw(raw) => raw.rewind(data_len),
            Decoder::Ima(ima) => ima.rewind(data_len),
            Decoder::Sb4(sb4) => sb4.rewind(data_len),
        }
    }
}

/// Walks a payload one codec block at a time.
#[derive(Debug, Clone, Default)]
pub(crate) struct BlockCursor {
    /// Offset of the next block.
    pos: usize,
    /// Payload bytes not yet handed out.
    remaining: usize,
    block_size: usize,
}

impl BlockCursor {
    pub(crate) fn new(block_size: u16) -> BlockCursor {
        BlockCursor {
            pos: 0,
            remaining: 0,
            block_size: block_size.max(1) as usize,
        }
    }

    pub(crate) fn rewind(&mut self, data_len: usize) {
        self.pos = 0;
        self.remaining = data_len;
    }

    /// Returns the next block, which is short at the end of the payload.
    pub(crate) fn next_block<'a>(&mut self, data: &'a [u8]) -> Option<&'a [u8]> {
        let available = data.len().saturating_sub(self.pos);
        let len = self.block_size.min(self.remaining).min(available);
        if len == 0 {
            return None;
        }

        let block = &data[self.pos..self.pos + len];
        self.pos += len;
        self.remaining -= len;
        Some(block)
    }
}

/// Decoded samples of the current block and how far they've been consumed.
#[derive(Debug, Clone, Default)]
pub(crate) struct DecodedBlock {
    samples: Vec<u8>,
    read: usize,
}

impl DecodedBlock {
    pub(crate) fn is_drained(&self) -> bool {
        self.read >= self.samples.len()
    }

    pub(crate) fn invalidate(&mut self) {
        self.samples.clear();
        self.read = 0;
    }

    /// Replaces the contents with freshly decoded samples.
    pub(crate) fn refill(&mut self) -> &mut Vec<u8> {
        self.invalidate();
        &mut self.samples
    }

    /// Copies as many pending samples as fit into `dest`.
    pub(crate) fn drain_into(&mut self, dest: &mut [u8]) -> usize {
        let count = dest.len().min(self.samples.len() - self.read);
        dest[..count].copy_from_slice(&self.samples[self.read..self.read + count]);
        self.read += count;
        count
    }
}

/// Fills `dest` from `block`, decoding new blocks with `decode` as needed.
pub(crate) fn load_blocks<F>(
    block: &mut DecodedBlock,
    cursor: &mut BlockCursor,
    data: &[u8],
    dest: &mut [u8],
    mut decode: F,
) -> usize
where
    F: FnMut(&[u8], &mut Vec<u8>),
{
    let mut produced = 0;
    while produced < dest.len() {
        if block.is_drained() {
            let Some(encoded) = cursor.next_block(data) else {
                break;
            };
            decode(encoded, block.refill());
            if block.is_drained() {
                // A block too short to carry any samples ends the stream.
                break;
            }
        }
        produced += block.drain_into(&mut dest[produced..]);
    }
    produced
}

/// Converts a signed 16-bit sample to unsigned 8-bit PCM.
pub fn pcm16_to_u8(sample: i16) -> u8 {
    ((sample >> 8) as i8 as u8) ^ 0x80
}
