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

//! Driver commands and their mailbox encoding.
//!
//! A command is a single opcode byte plus three 32-bit parameter words. Most
//! parameters pack two 16-bit fields as `high << 16 | low`.

use std::fmt;

use crate::sources::SourceParams;

/// Source id that asks the driver to pick a free source.
pub const WILDCARD_SOURCE: u8 = 255;

/// Position reported for a source with no channel.
pub const INVALID_POSITION: u16 = 0xFFFF;

/// Highest frequency accepted over the wire.
pub const MAX_FREQUENCY: u16 = 32767;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command byte {0:#04x}")]
    Unknown(u8),

    #[error("Source id {0} does not fit in a byte")]
    SourceOutOfRange(u16),

    #[error("Buffer id {0} does not fit in 16 bits")]
    BufferOutOfRange(u32),
}

/// A request from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Init,
    /// Copy `len` bytes at `offset` of the staging area into buffer `buffer`.
    Upload { buffer: u16, offset: u32, len: u32 },
    /// Play a buffer on a source. `source` may be [`WILDCARD_SOURCE`].
    Play {
        source: u8,
        buffer: u16,
        params: SourceParams,
    },
    SetPause { source: u8, paused: bool },
    Update { source: u8, params: SourceParams },
    Position { source: u8 },
    Stop { source: u8 },
    Rewind { source: u8 },
    Clear,
}

impl Command {
    /// Returns the mailbox opcode.
    pub fn opcode(&self) -> u8 {
        match self {
            Command::Init => b'I',
            Command::Upload { .. } => b'B',
            Command::Play { .. } => b'A',
            Command::SetPause { .. } => b'N',
            Command::Update { .. } => b'U',
            Command::Position { .. } => b'G',
            Command::Stop { .. } => b'O',
            Command::Rewind { .. } => b'W',
            Command::Clear => b'L',
        }
    }

    /// Packs the parameters into the three mailbox words.
    pub fn encode(&self) -> [u32; 3] {
        match *self {
            Command::Init | Command::Clear => [0; 3],
            Command::Upload {
                buffer,
                offset,
                len,
            } => [buffer as u32, offset, len],
            Command::Play {
                source,
                buffer,
                params,
            } => {
                let [p1, p2] = encode_params(params);
                [pack(source as u16, buffer), p1, p2]
            }
            Command::SetPause { source, paused } => [pack(source as u16, paused as u16), 0, 0],
            Command::Update { source, params } => {
                let [p1, p2] = encode_params(params);
                [pack(source as u16, 0), p1, p2]
            }
            Command::Position { source } | Command::Stop { source } | Command::Rewind { source } => {
                [pack(source as u16, 0), 0, 0]
            }
        }
    }

    /// Parses an opcode and its parameter words.
    pub fn decode(opcode: u8, words: [u32; 3]) -> Result<Command, CommandError> {
        let source = || {
            let source = high(words[0]);
            u8::try_from(source).map_err(|_| CommandError::SourceOutOfRange(source))
        };
        let command = match opcode {
            b'I' => Command::Init,
            b'B' => Command::Upload {
                buffer: u16::try_from(words[0])
                    .map_err(|_| CommandError::BufferOutOfRange(words[0]))?,
                offset: words[1],
                len: words[2],
            },
            b'A' => Command::Play {
                source: source()?,
                buffer: low(words[0]),
                params: decode_params(words[1], words[2]),
            },
            b'N' => Command::SetPause {
                source: source()?,
                paused: low(words[0]) != 0,
            },
            b'U' => Command::Update {
                source: source()?,
                params: decode_params(words[1], words[2]),
            },
            b'G' => Command::Position { source: source()? },
            b'O' => Command::Stop { source: source()? },
            b'W' => Command::Rewind { source: source()? },
            b'L' => Command::Clear,
            other => return Err(CommandError::Unknown(other)),
        };
        Ok(command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Init => write!(f, "init"),
            Command::Upload { buffer, len, .. } => write!(f, "upload buffer {} ({} bytes)", buffer, len),
            Command::Play { source, buffer, .. } => {
                write!(f, "play buffer {} on source {}", buffer, source)
            }
            Command::SetPause { source, paused } => {
                write!(f, "{} source {}", if *paused { "pause" } else { "resume" }, source)
            }
            Command::Update { source, .. } => write!(f, "update source {}", source),
            Command::Position { source } => write!(f, "position of source {}", source),
            Command::Stop { source } => write!(f, "stop source {}", source),
            Command::Rewind { source } => write!(f, "rewind source {}", source),
            Command::Clear => write!(f, "clear"),
        }
    }
}

fn pack(high: u16, low: u16) -> u32 {
    ((high as u32) << 16) | low as u32
}

fn high(word: u32) -> u16 {
    (word >> 16) as u16
}

fn low(word: u32) -> u16 {
    word as u16
}

fn encode_params(params: SourceParams) -> [u32; 2] {
    [
        pack(params.freq, params.pan as u16),
        pack(params.volume as u16, params.autoloop as u16),
    ]
}

fn decode_params(freq_pan: u32, vol_loop: u32) -> SourceParams {
    SourceParams {
        freq: high(freq_pan).min(MAX_FREQUENCY),
        pan: low(freq_pan) as u8,
        volume: high(vol_loop) as u8,
        autoloop: low(vol_loop) != 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_play_words() {
        let command = Command::Play {
            source: WILDCARD_SOURCE,
            buffer: 256,
            params: SourceParams {
                freq: 22050,
                pan: 200,
                volume: 10,
                autoloop: true,
            },
        };

        let words = command.encode();
        assert_eq!(words, [0x00FF_0100, (22050 << 16) | 200, (10 << 16) | 1]);
        assert_eq!(Command::decode(b'A', words), Ok(command));
    }

    #[test]
    fn test_frequency_is_clamped() {
        let decoded = Command::decode(b'U', [3 << 16, 0xFFFF_0080, 0]).expect("decode");
        assert_eq!(
            decoded,
            Command::Update {
                source: 3,
                params: SourceParams {
                    freq: MAX_FREQUENCY,
                    pan: 0x80,
                    volume: 0,
                    autoloop: false,
                },
            }
        );
    }

    #[test]
    fn test_source_commands() {
        assert_eq!(
            Command::decode(b'N', [(2 << 16) | 1, 0, 0]),
            Ok(Command::SetPause {
                source: 2,
                paused: true
            })
        );
        assert_eq!(
            Command::decode(b'G', [5 << 16, 0, 0]),
            Ok(Command::Position { source: 5 })
        );
        assert_eq!(Command::Stop { source: 7 }.encode(), [7 << 16, 0, 0]);
        assert_eq!(Command::Rewind { source: 1 }.opcode(), b'W');
    }

    #[test]
    fn test_wide_ids_are_rejected() {
        assert_eq!(
            Command::decode(b'O', [0x0101 << 16, 0, 0]),
            Err(CommandError::SourceOutOfRange(0x0101))
        );
        assert_eq!(
            Command::decode(b'A', [(0x01FF << 16) | 1, 0, 0]),
            Err(CommandError::SourceOutOfRange(0x01FF))
        );
        assert_eq!(
            Command::decode(b'B', [0x1_0001, 0, 4]),
            Err(CommandError::BufferOutOfRange(0x1_0001))
        );
        assert_eq!(
            Command::decode(b'O', [0x00FF << 16, 0, 0]),
            Ok(Command::Stop { source: WILDCARD_SOURCE })
        );
    }

    #[test]
    fn test_unknown_opcode() {
        assert_eq!(Command::decode(b'Z', [0; 3]), Err(CommandError::Unknown(b'Z')));
        assert_eq!(Command::decode(0x01, [0; 3]), Err(CommandError::Unknown(0x01)));
    }
}
