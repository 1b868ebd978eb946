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
use crate::channels::ChannelPool;
use crate::pcm::PcmChip;

use super::{Source, SourceId};

/// The fixed set of source slots.
pub struct SourcePool {
    sources: Vec<Source>,
}

impl SourcePool {
    /// Creates `count` idle sources with ids 1..=count.
    pub fn new(count: u8) -> SourcePool {
        SourcePool {
            sources: (1..=count)
                .filter_map(SourceId::new)
                .map(Source::new)
                .collect(),
        }
    }

    /// Returns the first source with no bound buffer.
    pub fn allocate(&self) -> Option<SourceId> {
        self.sources
            .iter()
            .find(|source| !source.is_playing())
            .map(|source| source.id())
    }

    pub fn get(&self, id: SourceId) -> Option<&Source> {
        self.sources.get(id.index())
    }

    pub fn get_mut(&mut self, id: SourceId) -> Option<&mut Source> {
        self.sources.get_mut(id.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Source> {
        self.sources.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Source> {
        self.sources.iter_mut()
    }

    /// Number of sources with a bound buffer.
    pub fn active_count(&self) -> usize {
        self.sources.iter().filter(|s| s.is_playing()).count()
    }

    /// Stops every source.
    pub fn stop_all(&mut self, chip: &mut dyn PcmChip, channels: &mut ChannelPool) {
        for source in self.sources.iter_mut() {
            source.stop(chip, channels);
        }
    }

    /// Returns every slot to its power-on state without touching channels.
    pub fn reset(&mut self) {
        for source in self.sources.iter_mut() {
            *source = Source::new(source.id());
        }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
