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

use tracing::debug;

use crate::buffers::Buffer;
use crate::channels::{map_linear_pan, ChannelId, ChannelPool, PAN_HARD_LEFT, PAN_HARD_RIGHT};
use crate::codec::{Decoder, SampleProducer};
use crate::pcm::PcmChip;

use super::{SourceId, SourceParams};

/// A logical playback stream.
#[derive(Debug)]
pub struct Source {
    pub(super) id: SourceId,
    pub(super) buffer: Option<Arc<Buffer>>,
    pub(super) decoder: Decoder,
    pub(super) num_channels: u8,
    pub(super) channels: [Option<ChannelId>; 2],
    pub(super) freq: u16,
    pub(super) pan: [u8; 2],
    pub(super) envelope: u8,
    pub(super) autoloop: bool,
    pub(super) paused: bool,
    /// Back half observed on the last paint step. None forces a refresh.
    pub(super) backbuf: Option<u8>,
    /// Samples still owed to the half being filled.
    pub(super) rem: u16,
    /// Samples painted since the last play or loop restart.
    pub(super) painted: u32,
    pub(super) eof: bool,
    /// Per-channel wave memory write cursors.
    pub(super) write_pos: [u16; 2],
}

impl Source {
    pub fn new(id: SourceId) -> Source {
        Source {
            id,
            buffer: None,
            decoder: Decoder::default(),
            num_channels: 0,
            channels: [None; 2],
            freq: 0,
            pan: [0; 2],
            envelope: 0,
            autoloop: false,
            paused: false,
            backbuf: None,
            rem: 0,
            painted: 0,
            eof: false,
            write_pos: [0; 2],
        }
    }

    /// Binds the buffer and claims one channel per buffer channel.
    ///
    /// Returns false and leaves the source unbound when the buffer is missing or
    /// empty, has no channels, has no usable frequency, or not enough channels
    /// are free.
    pub fn play(
        &mut self,
        buffer: Option<Arc<Buffer>>,
        params: SourceParams,
        chip: &mut dyn PcmChip,
        channels: &mut ChannelPool,
    ) -> bool {
        if self.is_playing() {
            self.stop(chip, channels);
        }

        self.pan = [map_linear_pan(params.pan), 0];
        self.envelope = params.volume;
        self.autoloop = params.autoloop;
        self.channels = [None; 2];
        self.paused = false;
        self.eof = false;
        self.backbuf = None;
        self.rem = 0;
        self.painted = 0;

        let Some(buffer) = buffer else {
            debug!(source = self.id.get(), "Play rejected: no buffer");
            self.unbind();
            return false;
        };

        self.freq = if params.freq != 0 {
            params.freq
        } else {
            buffer.freq()
        };

        let num_channels = buffer.num_channels();
        let playable = !buffer.is_empty()
            && (1..=2).contains(&num_channels)
            && self.freq != 0
            && !(num_channels == 2 && buffer.format().is_compressed());
        if !playable {
            debug!(
                source = self.id.get(),
                buffer = buffer.id(),
                freq = self.freq,
                "Play rejected: buffer not playable"
            );
            self.unbind();
            return false;
        }

        if num_channels == 2 {
            self.pan = [PAN_HARD_LEFT, PAN_HARD_RIGHT];
        }

        for i in 0..num_channels as usize {
            match channels.allocate(self.freq) {
                Some(channel) => self.channels[i] = Some(channel),
                None => {
                    debug!(
                        source = self.id.get(),
                        wanted = num_channels,
                        "Play rejected: out of channels"
                    );
                    for channel in self.channels.iter_mut().filter_map(|c| c.take()) {
                        channels.unclaim(channel);
                    }
                    self.unbind();
                    return false;
                }
            }
        }

        self.num_channels = num_channels;
        self.decoder = Decoder::for_format(buffer.format());
        self.buffer = Some(buffer);
        self.rewind();

        debug!(
            source = self.id.get(),
            buffer = self.buffer.as_ref().map(|b| b.id()),
            freq = self.freq,
            channels = self.num_channels,
            autoloop = self.autoloop,
            "Source playing"
        );
        true
    }

    /// Releases the channels and unbinds the buffer. Safe to call repeatedly.
    pub fn stop(&mut self, chip: &mut dyn PcmChip, channels: &mut ChannelPool) {
        for channel in self.channels.iter_mut().filter_map(|c| c.take()) {
            channels.release(channel, chip);
        }
        if self.buffer.is_some() {
            debug!(source = self.id.get(), "Source stopped");
        }
        self.buffer = None;
        self.freq = 0;
        self.painted = 0;
        self.num_channels = 0;
        self.rem = 0;
        self.eof = true;
    }

    /// Moves the stream back to its start.
    pub fn rewind(&mut self) {
        let Some(buffer) = &self.buffer else {
            return;
        };
        self.decoder.rewind(buffer.data_len());
        self.eof = false;
    }

    pub fn set_pause(&mut self, paused: bool) {
        if self.buffer.is_none() {
            return;
        }
        self.paused = paused;
    }

    /// Changes the live parameters. They reach the chip at the next commit.
    pub fn update(&mut self, params: SourceParams) {
        let Some(buffer) = &self.buffer else {
            return;
        };

        if params.freq != 0 {
            self.freq = params.freq;
        } else if buffer.freq() != 0 {
            self.freq = buffer.freq();
        }
        if self.num_channels == 1 {
            self.pan[0] = map_linear_pan(params.pan);
        }
        self.envelope = params.volume;
        self.autoloop = params.autoloop;
    }

    /// Returns the read address of the primary channel.
    pub fn position(&self, chip: &dyn PcmChip, channels: &ChannelPool) -> Option<u16> {
        self.channels[0].map(|channel| channels.position(channel, chip))
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn is_playing(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn buffer(&self) -> Option<&Arc<Buffer>> {
        self.buffer.as_ref()
    }

    pub fn num_channels(&self) -> u8 {
        self.num_channels
    }

    pub fn channels(&self) -> [Option<ChannelId>; 2] {
        self.channels
    }

    pub fn freq(&self) -> u16 {
        self.freq
    }

    pub fn pan(&self) -> [u8; 2] {
        self.pan
    }

    pub fn envelope(&self) -> u8 {
        self.envelope
    }

    pub fn autoloop(&self) -> bool {
        self.autoloop
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }

    pub fn rem(&self) -> u16 {
        self.rem
    }

    pub fn painted(&self) -> u32 {
        self.painted
    }

    fn unbind(&mut self) {
        self.buffer = None;
        self.num_channels = 0;
        self.channels = [None; 2];
    }
}
