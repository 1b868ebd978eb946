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

//! The driver thread.
//!
//! The thread owns the driver. Between frames it services the mailbox; at each
//! frame boundary it runs the paint steps and advances the simulated chip by
//! one frame's worth of output.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ConfigError;
use crate::driver::Driver;
use crate::pcm::SimulatedChip;
use crate::transport::{CommandServer, Mailbox};

mod priority;

/// How often the mailbox is checked between frames.
const MAILBOX_POLL_INTERVAL: Duration = Duration::from_micros(250);

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Unable to start the driver thread: {0}")]
    Spawn(#[from] io::Error),

    #[error("The driver thread panicked")]
    Panicked,
}

/// Splits an output sample rate into per-frame sample counts.
///
/// Each frame gets `rate / fps` samples, plus one whenever the remainder
/// accumulates, so a second of frames always yields exactly `rate` samples.
#[derive(Debug, Clone)]
pub struct FrameClock {
    rate: u32,
    fps: u32,
    remainder: u32,
}

impl FrameClock {
    pub fn new(rate: u32, fps: u32) -> FrameClock {
        FrameClock {
            rate,
            fps: fps.max(1),
            remainder: 0,
        }
    }

    /// Returns the number of output samples in the next frame.
    pub fn next_frame(&mut self) -> usize {
        let total = self.remainder + self.rate;
        self.remainder = total % self.fps;
        (total / self.fps) as usize
    }
}

/// A running driver thread.
pub struct DriverThread {
    shutdown: Sender<()>,
    handle: Option<JoinHandle<Driver<SimulatedChip>>>,
}

/// Starts the driver thread.
///
/// Rendered chip output (interleaved stereo, one `Vec` per frame) is sent to
/// `output` when given.
pub fn spawn(
    driver: Driver<SimulatedChip>,
    mailbox: Arc<Mailbox>,
    output: Option<Sender<Vec<i16>>>,
) -> Result<DriverThread, RunnerError> {
    let period = driver.settings().frame_period()?;
    let clock = FrameClock::new(
        driver.chip().output_rate(),
        driver.settings().frame_rate_hz(),
    );
    let (shutdown, shutdown_rx) = crossbeam_channel::bounded(1);

    let handle = thread::Builder::new()
        .name("pcm-driver".to_string())
        .spawn(move || run(driver, mailbox, output, shutdown_rx, period, clock))?;

    Ok(DriverThread {
        shutdown,
        handle: Some(handle),
    })
}

fn run(
    mut driver: Driver<SimulatedChip>,
    mailbox: Arc<Mailbox>,
    mut output: Option<Sender<Vec<i16>>>,
    shutdown: Receiver<()>,
    period: Duration,
    mut clock: FrameClock,
) -> Driver<SimulatedChip> {
    priority::configure_driver_thread();
    info!(period = ?period, chip = %driver.chip(), "Driver thread started");

    let mut server = CommandServer::new(mailbox);
    let mut next_frame = Instant::now() + period;

    'frames: loop {
        loop {
            match shutdown.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => break 'frames,
                Err(TryRecvError::Empty) => {}
            }
            server.poll(&mut driver);

            let now = Instant::now();
            if now >= next_frame {
                break;
            }
            spin_sleep::sleep(MAILBOX_POLL_INTERVAL.min(next_frame - now));
        }
        next_frame += period;

        let report = driver.frame();
        if report.frame % 600 == 0 {
            debug!(
                frame = report.frame,
                active_sources = report.active_sources,
                commands = server.handled(),
                "Driver frame"
            );
        }

        let mut samples = Vec::new();
        driver.chip_mut().render(&mut samples, clock.next_frame());
        if let Some(tx) = &output {
            if tx.send(samples).is_err() {
                debug!("Output receiver dropped");
                output = None;
            }
        }
    }

    info!(
        frames = driver.frames(),
        commands = server.handled(),
        "Driver thread stopped"
    );
    driver
}

impl DriverThread {
    /// Stops the thread and returns the driver.
    pub fn shutdown(mut self) -> Result<Driver<SimulatedChip>, RunnerError> {
        let _ = self.shutdown.try_send(());
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| RunnerError::Panicked),
            None => Err(RunnerError::Panicked),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }
}

impl Drop for DriverThread {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.shutdown.try_send(());
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DriverSettings;
    use crate::sources::{SourceId, SourceParams};
    use crate::testutil::{eventually, ramp};
    use crate::transport::HostClient;

    fn settings() -> DriverSettings {
        DriverSettings::default()
            .with_half_buffer_size(256)
            .with_frame_rate_hz(200)
            .with_staging_size(8192)
    }

    #[test]
    fn test_frame_clock() {
        let mut clock = FrameClock::new(44100, 60);
        let total: usize = (0..60).map(|_| clock.next_frame()).sum();
        assert_eq!(total, 44100);

        let mut clock = FrameClock::new(8000, 60);
        assert_eq!(clock.next_frame(), 133);
        assert_eq!(clock.next_frame(), 133);
        assert_eq!(clock.next_frame(), 134);
    }

    #[test]
    fn test_driver_thread_round_trip() {
        let settings = settings();
        let mailbox = Arc::new(Mailbox::new(settings.staging_size()));
        let driver = Driver::new(SimulatedChip::new(8000), settings).unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        let thread = spawn(driver, mailbox.clone(), Some(tx)).unwrap();

        let client = HostClient::new(mailbox, Duration::from_secs(2));
        client.upload(1, &ramp(2000)).unwrap();
        let source = client
            .play(
                255,
                1,
                SourceParams {
                    freq: 8000,
                    ..SourceParams::default()
                },
            )
            .unwrap();
        assert_eq!(source, SourceId::new(1));

        eventually(
            || client.position(1).unwrap().is_some_and(|pos| pos > 0),
            "Source never advanced",
        );
        eventually(
            || client.position(1).unwrap().is_none(),
            "Source never finished",
        );

        let driver = thread.shutdown().unwrap();
        assert!(driver.frames() > 0);
        assert_eq!(driver.active_sources(), 0);
        assert!(rx.try_iter().flatten().any(|s| s != 0));
    }

    #[test]
    fn test_drop_stops_thread() {
        let settings = settings();
        let mailbox = Arc::new(Mailbox::new(settings.staging_size()));
        let driver = Driver::new(SimulatedChip::new(8000), settings).unwrap();
        let thread = spawn(driver, mailbox, None).unwrap();
        assert!(!thread.is_finished());
        drop(thread);
    }
}
