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

//! Logical playback streams.
//!
//! A source binds a buffer to one channel per buffer channel and keeps those
//! channels' back halves fed, one bounded paint step at a time.

use std::fmt;

mod paint;
mod pool;
mod source;


pub use paint::{PaintScratch, PaintStatus};
pub use pool::SourcePool;
pub use source::Source;

/// Identifies a source. Ids are 1-based; 0 means "none" on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(u8);

impl SourceId {
    /// Returns the id, or None for 0.
    pub fn new(id: u8) -> Option<SourceId> {
        (id != 0).then_some(SourceId(id))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize - 1
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Playback parameters supplied with play and update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceParams {
    /// Playback rate in Hz, or 0 for the buffer's native rate.
    pub freq: u16,
    /// Linear pan: 0 full right, 128 center, 255 full left.
    pub pan: u8,
    pub volume: u8,
    pub autoloop: bool,
}

impl Default for SourceParams {
    fn default() -> Self {
        SourceParams {
            freq: 0,
            pan: 128,
            volume: 255,
            autoloop: false,
        }
    }
}
