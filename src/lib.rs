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

//! A driver for an 8-voice PCM sound chip.
//!
//! Buffers of 8-bit PCM or 4-bit ADPCM are streamed through small per-voice
//! double buffers in wave memory. Sources are the logical streams; channels are
//! the hardware voices they claim. A host talks to the driver through a
//! command mailbox, see [`transport`].

pub mod buffers;
pub mod channels;
pub mod codec;
pub mod command;
pub mod config;
pub mod demo;
pub mod driver;
pub mod pcm;
pub mod render;
pub mod runner;
pub mod sources;
pub mod transport;
pub mod util;

#[cfg(test)]
mod testutil;
