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

//! The host/driver mailbox.
//!
//! The host writes a command byte and three parameter words; the driver runs
//! the command between frames, writes a result word and raises the status
//! byte. The host reads the result and clears the command, and the driver then
//! clears the status. Uploads pass their bytes through a shared staging area.

use thiserror::Error;

mod host;
mod mailbox;
mod server;

pub use host::HostClient;
pub use mailbox::{Mailbox, Request};
pub use server::CommandServer;

/// Status byte for a command that ran.
pub const ACK_SUCCESS: u8 = 0x01;

/// Status byte for a command that was rejected.
pub const ACK_FAILURE: u8 = 0xFF;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Timed out waiting for the driver to {stage} command {opcode:#04x}")]
    Timeout { opcode: u8, stage: &'static str },

    #[error("Driver rejected command {0:#04x}")]
    Rejected(u8),

    #[error("{len} bytes at offset {offset} do not fit the {capacity} byte staging area")]
    Staging {
        offset: usize,
        len: usize,
        capacity: usize,
    },
}
