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

//! The double-buffer paint step.
//!
//! Each call fills at most one chunk of the back half of a source's channels.
//! A half is refreshed when the chip crosses into the other half; once it is
//! completely written (decoded data, then silence), the source's parameters are
//! committed to its channels.

use tracing::trace;

use crate::channels::{ChannelId, ChannelPool};
use crate::codec::SampleProducer;
use crate::pcm::PcmChip;

use super::Source;

/// Outcome of a paint step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaintStatus {
    /// Nothing more to do until the chip moves to the other half.
    Done,
    /// The back half still owes samples; paint again.
    MoreWork,
}

/// Decode scratch shared by every source's paint step.
pub struct PaintScratch {
    left: Vec<u8>,
    right: Vec<u8>,
}

impl PaintScratch {
    /// Creates scratch for chunks of `chunk` samples.
    pub fn new(chunk: u16) -> PaintScratch {
        PaintScratch {
            left: vec![0; chunk as usize],
            right: vec![0; chunk as usize],
        }
    }

    /// Maximum samples painted per step.
    pub fn chunk(&self) -> u16 {
        self.left.len() as u16
    }
}

impl Source {
    /// Runs one paint step.
    pub fn paint(
        &mut self,
        chip: &mut dyn PcmChip,
        channels: &mut ChannelPool,
        scratch: &mut PaintScratch,
    ) -> PaintStatus {
        let (Some(buffer), Some(primary)) = (self.buffer.clone(), self.channels[0]) else {
            self.stop(chip, channels);
            return PaintStatus::Done;
        };
        if self.num_channels == 0 {
            self.stop(chip, channels);
            return PaintStatus::Done;
        }

        let back = channels.back_half(primary, chip);
        if self.backbuf != Some(back) {
            if self.eof {
                trace!(source = self.id.get(), "End of stream reached a half boundary");
                self.stop(chip, channels);
                return PaintStatus::Done;
            }

            self.backbuf = Some(back);
            self.rem = channels.half_size();
            for (i, channel) in bound(self.channels) {
                self.write_pos[i] = channels.half_offset(channel, back);
            }
            trace!(source = self.id.get(), half = back, "Refreshing back half");
        } else if self.rem == 0 {
            return PaintStatus::Done;
        }

        let chunk = scratch.chunk();
        let budget = self.rem.min(chunk);
        let mut painted = 0u16;

        if !self.paused {
            let mut restarted = false;
            loop {
                if !self.eof {
                    let wanted = budget - painted;
                    let produced = self.load_samples(buffer.data(), chip, scratch, wanted);
                    if produced < wanted {
                        self.eof = true;
                    }
                    painted += produced;
                }

                if self.eof && self.painted > 0 && self.autoloop && !restarted {
                    trace!(source = self.id.get(), "Looping");
                    self.eof = false;
                    self.painted = 0;
                    self.decoder.rewind(buffer.data_len());
                    restarted = true;
                    continue;
                }
                break;
            }
        }

        self.painted += painted as u32;
        self.rem -= painted;

        if painted < chunk {
            for (i, _) in bound(self.channels) {
                chip.load_silence(self.write_pos[i], self.rem as usize);
                self.write_pos[i] = self.write_pos[i].wrapping_add(self.rem);
            }
            self.rem = 0;
        }

        trace!(
            source = self.id.get(),
            painted,
            rem = self.rem,
            eof = self.eof,
            "Paint step"
        );

        if self.rem == 0 {
            for (i, channel) in bound(self.channels) {
                channels.commit(channel, chip, self.freq, self.envelope, self.pan[i]);
            }
            return PaintStatus::Done;
        }

        PaintStatus::MoreWork
    }

    /// Decodes up to `len` samples into every channel's write cursor.
    fn load_samples(
        &mut self,
        data: &[u8],
        chip: &mut dyn PcmChip,
        scratch: &mut PaintScratch,
        len: u16,
    ) -> u16 {
        let len = len as usize;
        let PaintScratch { left, right } = scratch;

        let produced = if self.num_channels == 2 {
            let produced = self
                .decoder
                .load_stereo(data, &mut left[..len], &mut right[..len]);
            chip.load_samples(self.write_pos[0], &left[..produced]);
            chip.load_samples(self.write_pos[1], &right[..produced]);
            produced
        } else {
            let produced = self.decoder.load_mono(data, &mut left[..len]);
            chip.load_samples(self.write_pos[0], &left[..produced]);
            produced
        };

        let produced = produced as u16;
        for pos in self.write_pos.iter_mut().take(self.num_channels as usize) {
            *pos = pos.wrapping_add(produced);
        }
        produced
    }
}

/// Yields each claimed channel with its slot index.
fn bound(channels: [Option<ChannelId>; 2]) -> impl Iterator<Item = (usize, ChannelId)> {
    channels
        .into_iter()
        .enumerate()
        .filter_map(|(i, channel)| channel.map(|c| (i, c)))
}
