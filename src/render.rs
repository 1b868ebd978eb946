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

//! Offline rendering of a session to a WAV file.
//!
//! Cues run through [`Driver::execute`] at the first frame boundary at or after
//! their time, so a render is deterministic for a given session.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use hound::{SampleFormat, WavSpec, WavWriter};
use thiserror::Error;
use tracing::{info, warn};

use crate::buffers::BufferError;
use crate::config::{ConfigError, Session};
use crate::driver::{Driver, DriverError};
use crate::pcm::{PcmChip, SimulatedChip};
use crate::runner::FrameClock;

const NANOS_PER_SECOND: u128 = 1_000_000_000;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("Unable to read buffer file {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("Buffer {id} rejected: {source}")]
    Buffer { id: u16, source: BufferError },

    #[error("Unable to write output: {0}")]
    Wav(#[from] hound::Error),
}

/// Summary of a finished render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderReport {
    pub frames: u64,
    pub samples: usize,
    pub sample_rate: u32,
}

/// Reads every buffer file named by the session.
pub fn read_buffers(session: &Session) -> Result<Vec<(u16, Vec<u8>)>, RenderError> {
    session
        .buffers()
        .iter()
        .map(|entry| {
            let path = session.buffer_path(entry);
            fs::read(&path)
                .map(|bytes| (entry.id(), bytes))
                .map_err(|source| RenderError::Read { path, source })
        })
        .collect()
}

/// Uploads the session's buffers into a driver.
pub fn upload_buffers<C: PcmChip>(
    driver: &mut Driver<C>,
    session: &Session,
) -> Result<(), RenderError> {
    for (id, bytes) in read_buffers(session)? {
        let buffer = driver
            .upload_buffer(id, &bytes)
            .map_err(|source| RenderError::Buffer { id, source })?;
        info!(buffer = id, format = %buffer.format(), "Uploaded buffer");
    }
    Ok(())
}

/// Number of frames needed to cover `duration` at `fps`.
fn frame_count(duration: Duration, fps: u32) -> u64 {
    let fps = fps as u128;
    (duration.as_nanos() * fps).div_ceil(NANOS_PER_SECOND) as u64
}

/// Start time of frame `frame` at `fps`.
fn frame_time(frame: u64, fps: u32) -> Duration {
    let nanos = frame as u128 * NANOS_PER_SECOND / fps as u128;
    Duration::from_nanos(nanos as u64)
}

/// Renders a session to a 16-bit stereo WAV file.
pub fn render_session(session: &Session, output: &Path) -> Result<RenderReport, RenderError> {
    let settings = session.driver().clone();
    settings.frame_period()?;
    let fps = settings.frame_rate_hz();
    let sample_rate = settings.output_sample_rate();

    let mut driver = Driver::new(SimulatedChip::new(sample_rate), settings)?;
    upload_buffers(&mut driver, session)?;

    let schedule = session.schedule()?;
    let frames = frame_count(session.duration()?, fps);
    let mut clock = FrameClock::new(sample_rate, fps);
    let mut cues = schedule.iter().peekable();

    let spec = WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(output, spec)?;

    info!(frames, sample_rate, output = ?output, "Rendering session");

    let mut samples = Vec::new();
    let mut written = 0;
    for frame in 0..frames {
        let now = frame_time(frame, fps);
        while let Some(cue) = cues.next_if(|cue| cue.at <= now) {
            if let Err(e) = driver.execute(cue.command, &[]) {
                warn!(command = %cue.command, err = %e, "Cue failed");
            }
        }

        driver.frame();

        samples.clear();
        driver.chip_mut().render(&mut samples, clock.next_frame());
        for sample in &samples {
            writer.write_sample(*sample)?;
        }
        written += samples.len() / 2;
    }
    writer.finalize()?;

    if cues.next().is_some() {
        warn!("Session ended before every cue ran");
    }
    info!(frames, samples = written, "Render finished");

    Ok(RenderReport {
        frames,
        samples: written,
        sample_rate,
    })
}
