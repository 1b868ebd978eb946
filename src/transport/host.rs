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
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use crate::command::{Command, INVALID_POSITION};
use crate::sources::{SourceId, SourceParams};

use super::{Mailbox, TransportError, ACK_FAILURE};

/// How often the host checks the status byte.
const POLL_INTERVAL: Duration = Duration::from_micros(200);

/// The host side of the mailbox. Commands from several threads are serialized.
///
/// Every command carries a sequence number that the driver echoes with its
/// acknowledge. An acknowledge for a command the host already gave up on is
/// discarded and the current command is posted again.
pub struct HostClient {
    mailbox: Arc<Mailbox>,
    timeout: Duration,
    /// Sequence number of the last command posted.
    lock: Mutex<u32>,
}

impl HostClient {
    /// Creates a client that waits at most `timeout` for each handshake stage.
    pub fn new(mailbox: Arc<Mailbox>, timeout: Duration) -> HostClient {
        HostClient {
            mailbox,
            timeout,
            lock: Mutex::new(0),
        }
    }

    /// Sends a command and returns its result word.
    pub fn send(&self, command: Command) -> Result<u32, TransportError> {
        debug!(%command, "Sending command");
        self.send_raw(command.opcode(), command.encode())
    }

    /// Sends an opcode and parameter words without interpreting them.
    pub fn send_raw(&self, opcode: u8, params: [u32; 3]) -> Result<u32, TransportError> {
        let mut sequence = self.lock.lock();
        self.exchange(&mut sequence, opcode, params)
    }

    /// Runs one handshake with the sequence counter held.
    fn exchange(
        &self,
        sequence: &mut u32,
        opcode: u8,
        params: [u32; 3],
    ) -> Result<u32, TransportError> {
        *sequence = sequence.wrapping_add(1);
        let sequence = *sequence;

        self.wait_for(opcode, "go idle before", |status| status == 0)?;
        self.mailbox.post(opcode, params, sequence);

        loop {
            let ack = match self.wait_for(opcode, "acknowledge", |status| status != 0) {
                Ok(ack) => ack,
                Err(e) => {
                    self.mailbox.withdraw();
                    return Err(e);
                }
            };

            if self.mailbox.ack_sequence() == sequence {
                let result = self.mailbox.result();
                self.mailbox.withdraw();
                if ack == ACK_FAILURE {
                    return Err(TransportError::Rejected(opcode));
                }
                return Ok(result);
            }

            // Late acknowledge of an abandoned command: let the driver go idle
            // and post again.
            debug!(
                opcode,
                stale = self.mailbox.ack_sequence(),
                sequence,
                "Discarding stale acknowledge"
            );
            self.mailbox.withdraw();
            self.wait_for(opcode, "discard a stale acknowledge before", |status| {
                status == 0
            })?;
            self.mailbox.post(opcode, params, sequence);
        }
    }

    fn wait_for<F>(&self, opcode: u8, stage: &'static str, done: F) -> Result<u8, TransportError>
    where
        F: Fn(u8) -> bool,
    {
        let deadline = Instant::now() + self.timeout;
        loop {
            let status = self.mailbox.status();
            if done(status) {
                return Ok(status);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(TransportError::Timeout { opcode, stage });
            }
            spin_sleep::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }

    pub fn init(&self) -> Result<(), TransportError> {
        self.send(Command::Init).map(|_| ())
    }

    /// Copies `bytes` into the staging area and uploads them as buffer `buffer`.
    pub fn upload(&self, buffer: u16, bytes: &[u8]) -> Result<(), TransportError> {
        let command = Command::Upload {
            buffer,
            offset: 0,
            len: bytes.len() as u32,
        };
        debug!(%command, "Sending command");

        let mut sequence = self.lock.lock();
        self.mailbox.write_staging(0, bytes)?;
        self.exchange(&mut sequence, command.opcode(), command.encode())
            .map(|_| ())
    }

    /// Plays a buffer. Returns the source used, or None when none was free.
    pub fn play(
        &self,
        source: u8,
        buffer: u16,
        params: SourceParams,
    ) -> Result<Option<SourceId>, TransportError> {
        let result = self.send(Command::Play {
            source,
            buffer,
            params,
        })?;
        Ok(SourceId::new(result as u8))
    }

    pub fn set_pause(&self, source: u8, paused: bool) -> Result<(), TransportError> {
        self.send(Command::SetPause { source, paused }).map(|_| ())
    }

    pub fn update(&self, source: u8, params: SourceParams) -> Result<(), TransportError> {
        self.send(Command::Update { source, params }).map(|_| ())
    }

    /// Returns the source's playback address, or None when it has no channel.
    pub fn position(&self, source: u8) -> Result<Option<u16>, TransportError> {
        let result = self.send(Command::Position { source })? as u16;
        Ok((result != INVALID_POSITION).then_some(result))
    }

    pub fn stop(&self, source: u8) -> Result<(), TransportError> {
        self.send(Command::Stop { source }).map(|_| ())
    }

    pub fn rewind(&self, source: u8) -> Result<(), TransportError> {
        self.send(Command::Rewind { source }).map(|_| ())
    }

    pub fn clear(&self) -> Result<(), TransportError> {
        self.send(Command::Clear).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    use super::*;
    use crate::config::DriverSettings;
    use crate::driver::Driver;
    use crate::pcm::SimulatedChip;
    use crate::testutil::ramp;
    use crate::transport::{CommandServer, ACK_SUCCESS};

    #[test]
    fn test_timeout_without_driver() {
        let mailbox = Arc::new(Mailbox::new(64));
        let client = HostClient::new(mailbox.clone(), Duration::from_millis(20));

        assert_eq!(
            client.init(),
            Err(TransportError::Timeout {
                opcode: b'I',
                stage: "acknowledge"
            })
        );
        assert_eq!(mailbox.command(), 0);

        mailbox.set_status(0x01);
        assert_eq!(
            client.clear(),
            Err(TransportError::Timeout {
                opcode: b'L',
                stage: "go idle before"
            })
        );
    }

    #[test]
    fn test_late_acknowledge_is_not_taken_for_next_command() {
        let mailbox = Arc::new(Mailbox::new(64));
        let running = Arc::new(AtomicBool::new(true));
        let executed = Arc::new(Mutex::new(Vec::new()));

        // A driver that takes longer than the host timeout on its first position request.
        let handle = {
            let mailbox = mailbox.clone();
            let running = running.clone();
            let executed = executed.clone();
            thread::spawn(move || {
                let mut delayed = false;
                while running.load(Ordering::Relaxed) {
                    let (command, status) = (mailbox.command(), mailbox.status());
                    if command == 0 && status != 0 {
                        mailbox.set_status(0);
                    } else if command != 0 && status == 0 {
                        if let Some(request) = mailbox.take_request() {
                            if request.opcode == b'G' && !delayed {
                                delayed = true;
                                thread::sleep(Duration::from_millis(150));
                            }
                            executed.lock().push(request.opcode);
                            mailbox.acknowledge(
                                ACK_SUCCESS,
                                request.opcode as u32,
                                request.sequence,
                            );
                        }
                    }
                    thread::sleep(Duration::from_micros(100));
                }
            })
        };

        let client = HostClient::new(mailbox, Duration::from_millis(100));
        assert_eq!(
            client.send(Command::Position { source: 1 }),
            Err(TransportError::Timeout {
                opcode: b'G',
                stage: "acknowledge"
            })
        );
        assert_eq!(client.send(Command::Stop { source: 1 }), Ok(b'O' as u32));
        assert_eq!(*executed.lock(), vec![b'G', b'O']);

        running.store(false, Ordering::Relaxed);
        handle.join().unwrap();
    }

    #[test]
    fn test_commands_through_server() {
        let mailbox = Arc::new(Mailbox::new(4096));
        let running = Arc::new(AtomicBool::new(true));

        let handle = {
            let mailbox = mailbox.clone();
            let running = running.clone();
            thread::spawn(move || {
                let settings = DriverSettings::default()
                    .with_half_buffer_size(256)
                    .with_max_sources(2);
                let mut driver = Driver::new(SimulatedChip::new(8000), settings).unwrap();
                let mut server = CommandServer::new(mailbox);
                while running.load(Ordering::Relaxed) {
                    server.poll(&mut driver);
                    thread::sleep(Duration::from_micros(100));
                }
            })
        };

        let client = HostClient::new(mailbox, Duration::from_secs(2));
        let params = SourceParams {
            freq: 8000,
            ..SourceParams::default()
        };
        client.init().unwrap();
        client.upload(3, &ramp(1000)).unwrap();
        assert_eq!(client.play(255, 3, params), Ok(SourceId::new(1)));
        assert_eq!(client.play(255, 3, params), Ok(SourceId::new(2)));
        assert_eq!(client.play(255, 3, params), Ok(None));
        assert_eq!(client.position(1), Ok(Some(0)));

        client.stop(1).unwrap();
        assert_eq!(client.position(1), Ok(None));
        assert_eq!(client.send_raw(b'Z', [0; 3]), Err(TransportError::Rejected(b'Z')));
        assert_eq!(client.upload(0, &ramp(10)), Err(TransportError::Rejected(b'B')));
        client.clear().unwrap();

        running.store(false, Ordering::Relaxed);
        handle.join().unwrap();
    }
}
