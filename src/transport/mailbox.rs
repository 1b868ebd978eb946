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
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use parking_lot::{Mutex, RwLock, RwLockReadGuard};

use super::TransportError;

/// A posted command as the driver picks it up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Request {
    pub opcode: u8,
    pub params: [u32; 3],
    /// Echoed back with the acknowledge.
    pub sequence: u32,
}

/// Shared state between the host and the driver thread.
pub struct Mailbox {
    /// Host to driver. Only written with `request` locked.
    command: AtomicU8,
    /// Driver to host.
    status: AtomicU8,
    request: Mutex<Request>,
    result: AtomicU32,
    /// Sequence of the request the current status acknowledges.
    ack_sequence: AtomicU32,
    staging: RwLock<Vec<u8>>,
}

impl Mailbox {
    /// Creates an idle mailbox with a zeroed staging area.
    pub fn new(staging_size: usize) -> Mailbox {
        Mailbox {
            command: AtomicU8::new(0),
            status: AtomicU8::new(0),
            request: Mutex::new(Request::default()),
            result: AtomicU32::new(0),
            ack_sequence: AtomicU32::new(0),
            staging: RwLock::new(vec![0; staging_size]),
        }
    }

    pub fn command(&self) -> u8 {
        self.command.load(Ordering::Acquire)
    }

    pub fn status(&self) -> u8 {
        self.status.load(Ordering::Acquire)
    }

    pub fn set_status(&self, status: u8) {
        self.status.store(status, Ordering::Release);
    }

    /// Posts a command. The opcode, parameters and sequence change together.
    pub fn post(&self, opcode: u8, params: [u32; 3], sequence: u32) {
        let mut request = self.request.lock();
        *request = Request {
            opcode,
            params,
            sequence,
        };
        self.command.store(opcode, Ordering::Release);
    }

    /// Clears the command byte.
    pub fn withdraw(&self) {
        let _request = self.request.lock();
        self.command.store(0, Ordering::Release);
    }

    /// Returns the posted command, or None if it was withdrawn.
    pub fn take_request(&self) -> Option<Request> {
        let request = self.request.lock();
        match self.command.load(Ordering::Acquire) {
            0 => None,
            opcode => Some(Request { opcode, ..*request }),
        }
    }

    /// Publishes the result of the request with `sequence` and raises the status.
    pub fn acknowledge(&self, status: u8, result: u32, sequence: u32) {
        self.result.store(result, Ordering::Release);
        self.ack_sequence.store(sequence, Ordering::Release);
        self.status.store(status, Ordering::Release);
    }

    pub fn result(&self) -> u32 {
        self.result.load(Ordering::Acquire)
    }

    pub fn ack_sequence(&self) -> u32 {
        self.ack_sequence.load(Ordering::Acquire)
    }

    /// Copies bytes into the staging area.
    pub fn write_staging(&self, offset: usize, bytes: &[u8]) -> Result<(), TransportError> {
        let mut staging = self.staging.write();
        let capacity = staging.len();
        let dest = offset
            .checked_add(bytes.len())
            .and_then(|end| staging.get_mut(offset..end))
            .ok_or(TransportError::Staging {
                offset,
                len: bytes.len(),
                capacity,
            })?;
        dest.copy_from_slice(bytes);
        Ok(())
    }

    pub fn staging(&self) -> RwLockReadGuard<'_, Vec<u8>> {
        self.staging.read()
    }

    pub fn staging_size(&self) -> usize {
        self.staging.read().len()
    }
}
