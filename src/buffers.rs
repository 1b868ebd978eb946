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

//! Uploaded sample buffers.
//!
//! Buffers are immutable once uploaded. The registry hands them out as `Arc`s so
//! that replacing a buffer id never pulls data out from under a playing source.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::codec::ImaDecoder;

pub mod wav;

/// Highest valid buffer id. Ids start at 1.
pub const MAX_BUFFER_ID: u16 = 256;

/// Errors raised while uploading a buffer.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BufferError {
    #[error("Buffer id {0} is out of range (1-{MAX_BUFFER_ID})")]
    InvalidId(u16),

    #[error("Upload of {len} bytes exceeds the staging capacity of {capacity} bytes")]
    TooLarge { len: usize, capacity: usize },

    #[error("Staging range {offset}+{len} is outside the staging area of {capacity} bytes")]
    StagingRange {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    #[error("Malformed WAV file: {0}")]
    Malformed(&'static str),

    #[error("Unsupported WAV format tag {tag:#06x} with {bits} bits per sample")]
    UnsupportedFormat { tag: u16, bits: u16 },

    #[error("Compressed WAV data must be mono")]
    CompressedStereo,

    #[error("Unsupported channel count {0}")]
    UnsupportedChannels(u16),

    #[error("Sample rate {0}Hz is out of range")]
    SampleRateOutOfRange(u32),
}

/// The encoding of a buffer's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferFormat {
    /// Unsigned 8-bit PCM, mono or interleaved stereo.
    RawU8,
    /// IMA ADPCM (WAV codec 0x0011).
    ImaAdpcm { block_size: u16 },
    /// Creative 4-bit ADPCM (WAV codec 0x0200).
    Sb4Adpcm { block_size: u16 },
}

impl BufferFormat {
    /// Returns the WAV codec id, or 1 for plain PCM.
    pub fn codec_id(&self) -> u16 {
        match self {
            BufferFormat::RawU8 => wav::WAVE_FORMAT_PCM,
            BufferFormat::ImaAdpcm { .. } => wav::WAVE_FORMAT_IMA_ADPCM,
            BufferFormat::Sb4Adpcm { .. } => wav::WAVE_FORMAT_SB4_ADPCM,
        }
    }

    pub fn is_compressed(&self) -> bool {
        !matches!(self, BufferFormat::RawU8)
    }
}

impl fmt::Display for BufferFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferFormat::RawU8 => write!(f, "8-bit PCM"),
            BufferFormat::ImaAdpcm { block_size } => {
                write!(f, "IMA ADPCM (block size {})", block_size)
            }
            BufferFormat::Sb4Adpcm { block_size } => {
                write!(f, "SB4 ADPCM (block size {})", block_size)
            }
        }
    }
}

/// An uploaded sample asset.
pub struct Buffer {
    id: u16,
    format: BufferFormat,
    data: Vec<u8>,
    num_channels: u8,
    /// Native sample rate, 0 if the upload did not declare one.
    freq: u16,
}

impl Buffer {
    /// Builds a buffer from uploaded bytes. RIFF/WAVE files are parsed, anything
    /// else is taken as raw unsigned 8-bit mono PCM with no native frequency.
    pub fn from_upload(id: u16, bytes: &[u8]) -> Result<Buffer, BufferError> {
        if !wav::is_wave(bytes) {
            return Ok(Buffer::raw(id, bytes.to_vec(), 1, 0));
        }

        let parsed = wav::parse(bytes)?;
        Ok(Buffer {
            id,
            format: parsed.format,
            data: parsed.data.to_vec(),
            num_channels: parsed.num_channels,
            freq: parsed.freq,
        })
    }

    /// Builds a raw unsigned 8-bit PCM buffer.
    pub fn raw(id: u16, data: Vec<u8>, num_channels: u8, freq: u16) -> Buffer {
        Buffer {
            id,
            format: BufferFormat::RawU8,
            data,
            num_channels,
            freq,
        }
    }

    /// Builds a buffer of the given format from already extracted payload bytes.
    pub fn with_format(id: u16, format: BufferFormat, data: Vec<u8>, freq: u16) -> Buffer {
        Buffer {
            id,
            format,
            data,
            num_channels: 1,
            freq,
        }
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn format(&self) -> BufferFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_len(&self) -> usize {
        self.data.len()
    }

    pub fn num_channels(&self) -> u8 {
        self.num_channels
    }

    pub fn freq(&self) -> u16 {
        self.freq
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of sample frames the payload decodes to.
    pub fn frame_count(&self) -> usize {
        match self.format {
            BufferFormat::RawU8 => self.data.len() / self.num_channels.max(1) as usize,
            BufferFormat::ImaAdpcm { block_size } => {
                ImaDecoder::total_samples(self.data.len(), block_size)
            }
            BufferFormat::Sb4Adpcm { .. } => self.data.len() * 2,
        }
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("id", &self.id)
            .field("format", &self.format)
            .field("data_len", &self.data.len())
            .field("num_channels", &self.num_channels)
            .field("freq", &self.freq)
            .finish()
    }
}

/// Holds the uploaded buffers, indexed by id.
pub struct BufferRegistry {
    slots: Vec<Option<Arc<Buffer>>>,
    staging_size: usize,
}

impl BufferRegistry {
    /// Creates an empty registry. Uploads larger than `staging_size` are rejected.
    pub fn new(staging_size: usize) -> BufferRegistry {
        BufferRegistry {
            slots: vec![None; MAX_BUFFER_ID as usize],
            staging_size,
        }
    }

    /// Parses and stores an upload, replacing any previous buffer with the same id.
    pub fn upload(&mut self, id: u16, bytes: &[u8]) -> Result<Arc<Buffer>, BufferError> {
        let index = Self::index(id)?;
        if bytes.len() > self.staging_size {
            return Err(BufferError::TooLarge {
                len: bytes.len(),
                capacity: self.staging_size,
            });
        }

        let buffer = Arc::new(Buffer::from_upload(id, bytes)?);
        info!(
            buffer = id,
            format = %buffer.format(),
            len = buffer.data_len(),
            channels = buffer.num_channels(),
            freq = buffer.freq(),
            "Uploaded buffer"
        );
        self.slots[index] = Some(buffer.clone());
        Ok(buffer)
    }

    /// Stores an already built buffer under its id.
    pub fn insert(&mut self, buffer: Buffer) -> Result<Arc<Buffer>, BufferError> {
        let index = Self::index(buffer.id())?;
        let buffer = Arc::new(buffer);
        self.slots[index] = Some(buffer.clone());
        Ok(buffer)
    }

    /// Returns the buffer with the given id, if one was uploaded.
    pub fn get(&self, id: u16) -> Option<Arc<Buffer>> {
        let index = Self::index(id).ok()?;
        self.slots[index].clone()
    }

    /// Drops every buffer.
    pub fn clear(&mut self) {
        debug!("Clearing buffer registry");
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }

    /// Returns the number of payload bytes held by the registry.
    pub fn memory_usage(&self) -> usize {
        self.slots.iter().flatten().map(|b| b.data_len()).sum()
    }

    pub fn staging_size(&self) -> usize {
        self.staging_size
    }

    fn index(id: u16) -> Result<usize, BufferError> {
        if id == 0 || id > MAX_BUFFER_ID {
            return Err(BufferError::InvalidId(id));
        }
        Ok(id as usize - 1)
    }
}
