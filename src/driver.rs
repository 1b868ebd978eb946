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

//! The driver: owns the chip, the buffers, the channels and the sources.
//!
//! Every lifecycle operation and every frame runs on whatever thread owns the
//! driver, so a source's control operations never interleave with its paint
//! steps.

use std::sync::Arc;

use tracing::{debug, info};

use crate::buffers::{Buffer, BufferError, BufferRegistry};
use crate::channels::ChannelPool;
use crate::command::{Command, INVALID_POSITION, WILDCARD_SOURCE};
use crate::config::DriverSettings;
use crate::pcm::{PcmChip, WAVE_MEMORY_SIZE};
use crate::sources::{PaintScratch, PaintStatus, Source, SourceId, SourceParams, SourcePool};

/// Errors raised when the settings don't fit the chip.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DriverError {
    #[error("{requested} channels requested but the chip has {available} voices")]
    TooManyChannels { requested: usize, available: usize },

    #[error("{needed} bytes of wave memory needed but the chip has {available}")]
    WaveMemory { needed: usize, available: usize },

    #[error("Half buffer size must be at least 1")]
    EmptyHalfBuffer,

    #[error("Paint chunk {chunk} must be between 1 and the half buffer size {half_size}")]
    InvalidChunk { chunk: u16, half_size: u16 },

    #[error("Source count {0} must be between 1 and 254")]
    InvalidSourceCount(u8),
}

/// Which source a play request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceSelector {
    /// The first idle source.
    Any,
    Id(SourceId),
}

impl SourceSelector {
    /// Interprets a wire source id. 0 selects nothing.
    pub fn from_wire(source: u8) -> Option<SourceSelector> {
        if source == WILDCARD_SOURCE {
            return Some(SourceSelector::Any);
        }
        SourceId::new(source).map(SourceSelector::Id)
    }
}

/// Summary of one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Frames run so far, including this one.
    pub frame: u64,
    /// Paint steps run this frame.
    pub paint_steps: usize,
    /// Sources still playing after the frame.
    pub active_sources: usize,
}

pub struct Driver<C: PcmChip> {
    settings: DriverSettings,
    chip: C,
    buffers: BufferRegistry,
    channels: ChannelPool,
    sources: SourcePool,
    scratch: PaintScratch,
    frames: u64,
}

impl<C: PcmChip> Driver<C> {
    /// Creates a driver and claims the chip's voices.
    pub fn new(mut chip: C, settings: DriverSettings) -> Result<Driver<C>, DriverError> {
        let channel_count = settings.max_channels();
        let half_size = settings.half_buffer_size();
        let chunk = settings.paint_chunk();
        let source_count = settings.max_sources();

        if channel_count > chip.voice_count() {
            return Err(DriverError::TooManyChannels {
                requested: channel_count,
                available: chip.voice_count(),
            });
        }
        if half_size == 0 {
            return Err(DriverError::EmptyHalfBuffer);
        }
        let needed = channel_count * 2 * half_size as usize;
        if needed > WAVE_MEMORY_SIZE {
            return Err(DriverError::WaveMemory {
                needed,
                available: WAVE_MEMORY_SIZE,
            });
        }
        if chunk == 0 || chunk > half_size {
            return Err(DriverError::InvalidChunk { chunk, half_size });
        }
        if source_count == 0 || source_count >= WILDCARD_SOURCE {
            return Err(DriverError::InvalidSourceCount(source_count));
        }

        let mut channels = ChannelPool::new(channel_count, half_size);
        channels.attach(&mut chip);

        info!(
            sources = source_count,
            channels = channel_count,
            half_size,
            chunk,
            "PCM driver ready"
        );

        Ok(Driver {
            buffers: BufferRegistry::new(settings.staging_size()),
            sources: SourcePool::new(source_count),
            scratch: PaintScratch::new(chunk),
            settings,
            chip,
            channels,
            frames: 0,
        })
    }

    /// Returns every source and channel to the power-on state. Buffers are kept.
    pub fn init(&mut self) {
        info!("Initializing PCM driver");
        self.chip.reset();
        self.channels.reset(&mut self.chip);
        self.sources.reset();
    }

    /// Stops every source and silences the chip.
    pub fn clear(&mut self) {
        info!("Clearing all sources");
        self.chip.reset();
        self.sources.stop_all(&mut self.chip, &mut self.channels);
    }

    /// Parses and stores an upload.
    pub fn upload_buffer(&mut self, id: u16, bytes: &[u8]) -> Result<Arc<Buffer>, BufferError> {
        self.buffers.upload(id, bytes)
    }

    /// Starts a buffer on a source and returns the source used. None when no
    /// source could be selected; a selected source whose buffer can't be
    /// played is left idle, see [`Driver::is_playing`].
    pub fn play(
        &mut self,
        selector: SourceSelector,
        buffer: u16,
        params: SourceParams,
    ) -> Option<SourceId> {
        let id = match selector {
            SourceSelector::Any => self.sources.allocate(),
            SourceSelector::Id(id) => Some(id),
        };
        let Some(id) = id else {
            debug!(buffer, "No idle source to play on");
            return None;
        };
        let buffer = self.buffers.get(buffer);
        let source = self.sources.get_mut(id)?;

        if !source.play(buffer, params, &mut self.chip, &mut self.channels) {
            debug!(source = id.get(), "Source left idle");
        }
        Some(id)
    }

    pub fn set_pause(&mut self, id: SourceId, paused: bool) {
        if let Some(source) = self.sources.get_mut(id) {
            source.set_pause(paused);
        }
    }

    pub fn update(&mut self, id: SourceId, params: SourceParams) {
        if let Some(source) = self.sources.get_mut(id) {
            source.update(params);
        }
    }

    pub fn stop(&mut self, id: SourceId) {
        if let Some(source) = self.sources.get_mut(id) {
            source.stop(&mut self.chip, &mut self.channels);
        }
    }

    pub fn rewind(&mut self, id: SourceId) {
        if let Some(source) = self.sources.get_mut(id) {
            source.rewind();
        }
    }

    /// Returns the chip read address of the source's primary channel.
    pub fn position(&self, id: SourceId) -> Option<u16> {
        self.sources
            .get(id)
            .and_then(|source| source.position(&self.chip, &self.channels))
    }

    pub fn is_playing(&self, id: SourceId) -> bool {
        self.sources.get(id).is_some_and(|s| s.is_playing())
    }

    pub fn source(&self, id: SourceId) -> Option<&Source> {
        self.sources.get(id)
    }

    /// Runs one frame: up to `paint_passes` paint steps per live source.
    pub fn frame(&mut self) -> FrameReport {
        let passes = self.settings.paint_passes();
        let mut paint_steps = 0;

        for source in self.sources.iter_mut().filter(|s| s.is_playing()) {
            for _ in 0..passes {
                paint_steps += 1;
                let status = source.paint(&mut self.chip, &mut self.channels, &mut self.scratch);
                if status == PaintStatus::Done {
                    break;
                }
            }
        }

        self.frames += 1;
        FrameReport {
            frame: self.frames,
            paint_steps,
            active_sources: self.sources.active_count(),
        }
    }

    /// Runs a decoded command. `staging` is the shared upload area.
    ///
    /// Returns the result word for the host.
    pub fn execute(&mut self, command: Command, staging: &[u8]) -> Result<u32, BufferError> {
        debug!(%command, "Executing command");
        let result = match command {
            Command::Init => {
                self.init();
                0
            }
            Command::Upload {
                buffer,
                offset,
                len,
            } => {
                let (offset, len) = (offset as usize, len as usize);
                let bytes = offset
                    .checked_add(len)
                    .and_then(|end| staging.get(offset..end))
                    .ok_or(BufferError::StagingRange {
                        offset,
                        len,
                        capacity: staging.len(),
                    })?;
                self.upload_buffer(buffer, bytes)?;
                0
            }
            Command::Play {
                source,
                buffer,
                params,
            } => SourceSelector::from_wire(source)
                .and_then(|selector| self.play(selector, buffer, params))
                .map_or(0, |id| id.get() as u32),
            Command::SetPause { source, paused } => {
                if let Some(id) = SourceId::new(source) {
                    self.set_pause(id, paused);
                }
                source as u32
            }
            Command::Update { source, params } => {
                if let Some(id) = SourceId::new(source) {
                    self.update(id, params);
                }
                0
            }
            Command::Position { source } => SourceId::new(source)
                .and_then(|id| self.position(id))
                .unwrap_or(INVALID_POSITION) as u32,
            Command::Stop { source } => {
                if let Some(id) = SourceId::new(source) {
                    self.stop(id);
                }
                0
            }
            Command::Rewind { source } => {
                if let Some(id) = SourceId::new(source) {
                    self.rewind(id);
                }
                0
            }
            Command::Clear => {
                self.clear();
                0
            }
        };
        Ok(result)
    }

    pub fn settings(&self) -> &DriverSettings {
        &self.settings
    }

    pub fn buffers(&self) -> &BufferRegistry {
        &self.buffers
    }

    pub fn chip(&self) -> &C {
        &self.chip
    }

    pub fn chip_mut(&mut self) -> &mut C {
        &mut self.chip
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn active_sources(&self) -> usize {
        self.sources.active_count()
    }

    pub fn free_channels(&self) -> usize {
        self.channels.free_count()
    }
}
