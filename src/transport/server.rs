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
use std::sync::Arc;

use tracing::warn;

use crate::command::Command;
use crate::driver::Driver;
use crate::pcm::PcmChip;

use super::{Mailbox, Request, ACK_FAILURE, ACK_SUCCESS};

/// The driver side of the mailbox.
pub struct CommandServer {
    mailbox: Arc<Mailbox>,
    handled: u64,
}

impl CommandServer {
    pub fn new(mailbox: Arc<Mailbox>) -> CommandServer {
        CommandServer {
            mailbox,
            handled: 0,
        }
    }

    /// Services the mailbox once. Returns true if a command was run.
    pub fn poll<C: PcmChip>(&mut self, driver: &mut Driver<C>) -> bool {
        let command = self.mailbox.command();
        let status = self.mailbox.status();

        match (command, status) {
            (0, 0) => false,
            (0, _) => {
                self.mailbox.set_status(0);
                false
            }
            (_, 0) => {
                let Some(request) = self.mailbox.take_request() else {
                    return false;
                };
                let (ack, result) = self.execute(request, driver);
                self.handled += 1;
                self.mailbox.acknowledge(ack, result, request.sequence);
                true
            }
            // Acknowledged, waiting for the host to collect the result.
            _ => false,
        }
    }

    fn execute<C: PcmChip>(&self, request: Request, driver: &mut Driver<C>) -> (u8, u32) {
        let command = match Command::decode(request.opcode, request.params) {
            Ok(command) => command,
            Err(e) => {
                warn!(err = %e, "Rejected command");
                return (ACK_FAILURE, 0);
            }
        };

        let staging = self.mailbox.staging();
        match driver.execute(command, &staging) {
            Ok(result) => (ACK_SUCCESS, result),
            Err(e) => {
                warn!(%command, err = %e, "Command failed");
                (ACK_FAILURE, 0)
            }
        }
    }

    /// Number of commands run so far.
    pub fn handled(&self) -> u64 {
        self.handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::WILDCARD_SOURCE;
    use crate::config::DriverSettings;
    use crate::pcm::SimulatedChip;
    use crate::sources::SourceParams;
    use crate::testutil::ramp;

    fn setup() -> (Arc<Mailbox>, CommandServer, Driver<SimulatedChip>) {
        let mailbox = Arc::new(Mailbox::new(1024));
        let server = CommandServer::new(mailbox.clone());
        let settings = DriverSettings::default()
            .with_half_buffer_size(256)
            .with_staging_size(1024);
        let driver = Driver::new(SimulatedChip::new(8000), settings).unwrap();
        (mailbox, server, driver)
    }

    fn submit(mailbox: &Mailbox, command: Command) {
        mailbox.post(command.opcode(), command.encode(), 1);
    }

    #[test]
    fn test_handshake() {
        let (mailbox, mut server, mut driver) = setup();
        assert!(!server.poll(&mut driver));

        mailbox.write_staging(0, &ramp(100)).unwrap();
        submit(
            &mailbox,
            Command::Upload {
                buffer: 1,
                offset: 0,
                len: 100,
            },
        );
        assert!(server.poll(&mut driver));
        assert_eq!(mailbox.status(), ACK_SUCCESS);

        // Nothing happens until the host clears the command.
        assert!(!server.poll(&mut driver));
        assert_eq!(mailbox.status(), ACK_SUCCESS);

        mailbox.withdraw();
        assert!(!server.poll(&mut driver));
        assert_eq!(mailbox.status(), 0);

        submit(
            &mailbox,
            Command::Play {
                source: WILDCARD_SOURCE,
                buffer: 1,
                params: SourceParams {
                    freq: 8000,
                    ..SourceParams::default()
                },
            },
        );
        assert!(server.poll(&mut driver));
        assert_eq!(mailbox.result(), 1);
        assert_eq!(server.handled(), 2);
    }

    #[test]
    fn test_unknown_command_fails() {
        let (mailbox, mut server, mut driver) = setup();
        mailbox.post(b'?', [0; 3], 3);
        assert!(server.poll(&mut driver));
        assert_eq!(mailbox.status(), ACK_FAILURE);
        assert_eq!(mailbox.ack_sequence(), 3);
    }

    #[test]
    fn test_out_of_range_source_fails() {
        let (mailbox, mut server, mut driver) = setup();
        mailbox.post(b'O', [0x0101 << 16, 0, 0], 1);
        assert!(server.poll(&mut driver));
        assert_eq!(mailbox.status(), ACK_FAILURE);
    }

    #[test]
    fn test_bad_upload_fails() {
        let (mailbox, mut server, mut driver) = setup();
        submit(
            &mailbox,
            Command::Upload {
                buffer: 1,
                offset: 1000,
                len: 100,
            },
        );
        assert!(server.poll(&mut driver));
        assert_eq!(mailbox.status(), ACK_FAILURE);
        assert!(driver.buffers().get(1).is_none());
    }
}
