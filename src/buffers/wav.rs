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
use super::{BufferError, BufferFormat};

pub const WAVE_FORMAT_PCM: u16 = 0x0001;
pub const WAVE_FORMAT_IMA_ADPCM: u16 = 0x0011;
pub const WAVE_FORMAT_SB4_ADPCM: u16 = 0x0200;

/// Highest sample rate the chip frequency register can hold.
pub const MAX_SAMPLE_RATE: u32 = 32767;

/// IMA blocks start with a 4-byte header and need at least one data byte.
const MIN_IMA_BLOCK_SIZE: u16 = 5;

/// A parsed WAV upload. `data` borrows the payload of the `data` chunk.
#[derive(Debug)]
pub struct ParsedWav<'a> {
    pub format: BufferFormat,
    pub num_channels: u8,
    pub freq: u16,
    pub data: &'a [u8],
}

struct FmtChunk {
    tag: u16,
    channels: u16,
    sample_rate: u32,
    block_align: u16,
    bits_per_sample: u16,
}

/// Returns whether the bytes start with a RIFF/WAVE header.
pub fn is_wave(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

/// Parses a RIFF/WAVE file into a buffer format and payload.
pub fn parse(bytes: &[u8]) -> Result<ParsedWav<'_>, BufferError> {
    if !is_wave(bytes) {
        return Err(BufferError::Malformed("missing RIFF/WAVE header"));
    }

    let mut fmt = None;
    let mut data = None;
    let mut offset = 12usize;

    while offset + 8 <= bytes.len() {
        let id = &bytes[offset..offset + 4];
        let size = read_u32_le(bytes, offset + 4) as usize;
        let start = offset + 8;
        if size > bytes.len() - start {
            return Err(BufferError::Malformed("truncated chunk"));
        }
        let body = &bytes[start..start + size];

        match id {
            b"fmt " => fmt = Some(parse_fmt(body)?),
            b"data" => data = Some(body),
            _ => {}
        }

        // Chunks are padded to an even length.
        offset = start + size + (size & 1);
    }

    let fmt = fmt.ok_or(BufferError::Malformed("missing fmt chunk"))?;
    let data = data.ok_or(BufferError::Malformed("missing data chunk"))?;

    if fmt.channels == 0 || fmt.channels > 2 {
        return Err(BufferError::UnsupportedChannels(fmt.channels));
    }
    if fmt.sample_rate > MAX_SAMPLE_RATE {
        return Err(BufferError::SampleRateOutOfRange(fmt.sample_rate));
    }

    let format = match (fmt.tag, fmt.bits_per_sample) {
        (WAVE_FORMAT_PCM, 8) => BufferFormat::RawU8,
        (WAVE_FORMAT_IMA_ADPCM, 4) => {
            if fmt.block_align < MIN_IMA_BLOCK_SIZE {
                return Err(BufferError::Malformed("IMA ADPCM block size too small"));
            }
            BufferFormat::ImaAdpcm {
                block_size: fmt.block_align,
            }
        }
        (WAVE_FORMAT_SB4_ADPCM, 4) => {
            if fmt.block_align == 0 {
                return Err(BufferError::Malformed("SB4 ADPCM block size is zero"));
            }
            BufferFormat::Sb4Adpcm {
                block_size: fmt.block_align,
            }
        }
        (tag, bits) => return Err(BufferError::UnsupportedFormat { tag, bits }),
    };

    if format.is_compressed() && fmt.channels != 1 {
        return Err(BufferError::CompressedStereo);
    }

    Ok(ParsedWav {
        format,
        num_channels: fmt.channels as u8,
        freq: fmt.sample_rate as u16,
        data,
    })
}

fn parse_fmt(body: &[u8]) -> Result<FmtChunk, BufferError> {
    if body.len() < 16 {
        return Err(BufferError::Malformed("fmt chunk too small"));
    }

    Ok(FmtChunk {
        tag: read_u16_le(body, 0),
        channels: read_u16_le(body, 2),
        sample_rate: read_u32_le(body, 4),
        block_align: read_u16_le(body, 12),
        bits_per_sample: read_u16_le(body, 14),
    })
}

fn read_u16_le(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32_le(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::wav_bytes;

    #[test]
    fn test_parse_pcm() {
        let bytes = wav_bytes(WAVE_FORMAT_PCM, 1, 11025, 8, None, &[1, 2, 3]);
        let parsed = parse(&bytes).expect("parse");

        assert_eq!(parsed.format, BufferFormat::RawU8);
        assert_eq!(parsed.num_channels, 1);
        assert_eq!(parsed.freq, 11025);
        assert_eq!(parsed.data, &[1, 2, 3]);
    }

    #[test]
    fn test_parse_adpcm_formats() {
        let ima = wav_bytes(WAVE_FORMAT_IMA_ADPCM, 1, 22050, 4, Some(256), &[0; 256]);
        assert_eq!(
            parse(&ima).expect("ima").format,
            BufferFormat::ImaAdpcm { block_size: 256 }
        );

        let sb4 = wav_bytes(WAVE_FORMAT_SB4_ADPCM, 1, 22050, 4, Some(64), &[0; 128]);
        assert_eq!(
            parse(&sb4).expect("sb4").format,
            BufferFormat::Sb4Adpcm { block_size: 64 }
        );
    }

    #[test]
    fn test_skips_unknown_chunks() {
        let mut bytes = b"RIFF\0\0\0\0WAVE".to_vec();
        bytes.extend_from_slice(b"LIST");
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&[9, 9, 9, 0]);
        let inner = wav_bytes(WAVE_FORMAT_PCM, 2, 8000, 8, None, &[5, 6]);
        bytes.extend_from_slice(&inner[12..]);

        let parsed = parse(&bytes).expect("parse");
        assert_eq!(parsed.num_channels, 2);
        assert_eq!(parsed.data, &[5, 6]);
    }

    #[test]
    fn test_rejections() {
        let stereo_ima = wav_bytes(WAVE_FORMAT_IMA_ADPCM, 2, 22050, 4, Some(256), &[0; 16]);
        assert_eq!(parse(&stereo_ima).err(), Some(BufferError::CompressedStereo));

        let pcm16 = wav_bytes(WAVE_FORMAT_PCM, 1, 22050, 16, None, &[0; 16]);
        assert_eq!(
            parse(&pcm16).err(),
            Some(BufferError::UnsupportedFormat { tag: 1, bits: 16 })
        );

        let fast = wav_bytes(WAVE_FORMAT_PCM, 1, 44100, 8, None, &[0; 16]);
        assert_eq!(
            parse(&fast).err(),
            Some(BufferError::SampleRateOutOfRange(44100))
        );

        let surround = wav_bytes(WAVE_FORMAT_PCM, 6, 8000, 8, None, &[0; 12]);
        assert_eq!(parse(&surround).err(), Some(BufferError::UnsupportedChannels(6)));

        let mut truncated = wav_bytes(WAVE_FORMAT_PCM, 1, 8000, 8, None, &[0; 16]);
        truncated.truncate(truncated.len() - 4);
        assert_eq!(
            parse(&truncated).err(),
            Some(BufferError::Malformed("truncated chunk"))
        );

        let no_data = b"RIFF\0\0\0\0WAVE".to_vec();
        assert_eq!(
            parse(&no_data).err(),
            Some(BufferError::Malformed("missing fmt chunk"))
        );
    }
}
