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

//! Real-time playback of a session through the mailbox.

use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::{info, warn};

use crate::command::Command;
use crate::config::Session;
use crate::driver::Driver;
use crate::pcm::SimulatedChip;
use crate::render::read_buffers;
use crate::runner;
use crate::transport::{HostClient, Mailbox, TransportError};

/// How often source positions are logged while waiting for the next cue.
const POSITION_LOG_INTERVAL: Duration = Duration::from_millis(250);

/// Summary of a finished demo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoReport {
    pub frames: u64,
    pub commands: usize,
    pub rejected: usize,
    /// Stereo frames written to the recording, if any.
    pub recorded: u64,
}

/// Plays a session in real time, optionally recording the chip output.
pub fn run_demo(session: &Session, output: Option<&Path>) -> Result<DemoReport, Box<dyn Error>> {
    let settings = session.driver().clone();
    let timeout = settings.command_timeout()?;
    let max_sources = settings.max_sources();
    let sample_rate = settings.output_sample_rate();
    let schedule = session.schedule()?;
    let duration = session.duration()?;
    let buffers = read_buffers(session)?;

    let mailbox = Arc::new(Mailbox::new(settings.staging_size()));
    let driver = Driver::new(SimulatedChip::new(sample_rate), settings)?;

    let (tx, recorder) = match output {
        Some(path) => {
            let (tx, rx) = crossbeam_channel::unbounded();
            (Some(tx), Some(spawn_recorder(path, sample_rate, rx)?))
        }
        None => (None, None),
    };
    let thread = runner::spawn(driver, mailbox.clone(), tx)?;
    let client = HostClient::new(mailbox, timeout);

    client.init()?;
    for (id, bytes) in &buffers {
        client.upload(*id, bytes)?;
        info!(buffer = id, bytes = bytes.len(), "Uploaded buffer");
    }

    let start = Instant::now();
    let mut rejected = 0;
    for cue in &schedule {
        wait_until(start + cue.at, &client, max_sources)?;
        match client.send(cue.command) {
            Ok(result) => {
                if let Command::Play { .. } = cue.command {
                    info!(command = %cue.command, source = result, "Cue played");
                } else {
                    info!(command = %cue.command, "Cue sent");
                }
            }
            Err(TransportError::Rejected(opcode)) => {
                warn!(command = %cue.command, opcode, "Cue rejected");
                rejected += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
    wait_until(start + duration, &client, max_sources)?;
    client.clear()?;

    let driver = thread.shutdown()?;
    let frames = driver.frames();
    drop(driver);

    let recorded = match recorder {
        Some(handle) => handle.join().map_err(|_| "Recorder thread panicked")??,
        None => 0,
    };

    info!(frames, recorded, "Demo finished");
    Ok(DemoReport {
        frames,
        commands: schedule.len(),
        rejected,
        recorded,
    })
}

/// Sleeps until `deadline`, logging the position of every playing source.
fn wait_until(deadline: Instant, client: &HostClient, max_sources: u8) -> Result<(), TransportError> {
    loop {
        let now = Instant::now();
        if now >= deadline {
            return Ok(());
        }
        spin_sleep::sleep(POSITION_LOG_INTERVAL.min(deadline - now));

        for source in 1..=max_sources {
            if let Some(position) = client.position(source)? {
                info!(source, position, "Source position");
            }
        }
    }
}

/// Writes frames from `rx` to a WAV file until the sender hangs up.
fn spawn_recorder(
    path: &Path,
    sample_rate: u32,
    rx: Receiver<Vec<i16>>,
) -> Result<JoinHandle<Result<u64, hound::Error>>, Box<dyn Error>> {
    let spec = WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;

    let handle = thread::Builder::new()
        .name("pcm-recorder".to_string())
        .spawn(move || {
            for frame in rx {
                for sample in frame {
                    writer.write_sample(sample)?;
                }
            }
            let recorded = writer.len() as u64 / 2;
            writer.finalize()?;
            Ok(recorded)
        })?;
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::config::load_session;
    use crate::testutil::{ramp, wav_bytes};

    #[test]
    fn test_demo_records_output() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("tone.wav"),
            wav_bytes(1, 1, 8000, 8, None, &ramp(800)),
        )
        .unwrap();
        let path = dir.path().join("session.yaml");
        fs::write(
            &path,
            r#"
driver:
  half_buffer_size: 256
  output_sample_rate: 8000
  frame_rate_hz: 100
buffers:
  - id: 1
    file: tone.wav
cues:
  - at: 0s
    action: play
    buffer: 1
  - at: 50ms
    action: rewind
    source: 1
  - at: 60ms
    action: play
    source: 1
    buffer: 99
duration: 300ms
"#,
        )
        .unwrap();
        let session = load_session(&path).unwrap();

        let output = dir.path().join("demo.wav");
        let report = run_demo(&session, Some(&output)).unwrap();
        assert_eq!(report.commands, 3);
        assert_eq!(report.rejected, 0);
        assert!(report.frames >= 20);
        assert!(report.recorded > 0);

        let reader = hound::WavReader::open(&output).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.duration() as u64, report.recorded);
    }

    #[test]
    fn test_demo_rejects_oversized_upload() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("big.raw"), ramp(4096)).unwrap();
        let path = dir.path().join("session.yaml");
        fs::write(
            &path,
            r#"
driver:
  staging_size: 1024
buffers:
  - id: 1
    file: big.raw
duration: 10ms
"#,
        )
        .unwrap();
        let session = load_session(&path).unwrap();
        assert!(run_demo(&session, None).is_err());
    }
}
