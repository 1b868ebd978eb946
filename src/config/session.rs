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
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::command::{Command, WILDCARD_SOURCE};
use crate::sources::SourceParams;

use super::{parse_duration, ConfigError, DriverSettings};

/// Extra time rendered after the last cue when a session has no duration.
const DEFAULT_TAIL: Duration = Duration::from_secs(2);

/// A YAML representation of a playback session: buffers to upload and timed cues.
#[derive(Deserialize, Clone, Debug)]
pub struct Session {
    /// Driver settings for the session.
    #[serde(default)]
    driver: DriverSettings,

    /// Buffers uploaded before the first cue.
    #[serde(default)]
    buffers: Vec<BufferEntry>,

    /// Timed commands.
    #[serde(default)]
    cues: Vec<Cue>,

    /// Total length of the session.
    duration: Option<String>,

    /// Directory buffer files are resolved against.
    #[serde(skip)]
    base_dir: PathBuf,
}

/// A buffer file to upload.
#[derive(Deserialize, Clone, Debug)]
pub struct BufferEntry {
    id: u16,
    file: String,
}

impl BufferEntry {
    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn file(&self) -> &str {
        &self.file
    }
}

/// What a cue does.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CueAction {
    Play,
    Pause,
    Resume,
    Update,
    Stop,
    Rewind,
    Clear,
}

impl CueAction {
    fn name(&self) -> &'static str {
        match self {
            CueAction::Play => "play",
            CueAction::Pause => "pause",
            CueAction::Resume => "resume",
            CueAction::Update => "update",
            CueAction::Stop => "stop",
            CueAction::Rewind => "rewind",
            CueAction::Clear => "clear",
        }
    }
}

impl fmt::Display for CueAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A command issued at a point in the session.
#[derive(Deserialize, Clone, Debug)]
pub struct Cue {
    /// Offset from the start of the session, e.g. "1500ms".
    at: String,
    action: CueAction,
    source: Option<u8>,
    buffer: Option<u16>,
    freq: Option<u16>,
    pan: Option<u8>,
    volume: Option<u8>,
    autoloop: Option<bool>,
}

impl Cue {
    pub fn at(&self) -> Result<Duration, ConfigError> {
        parse_duration(&self.at)
    }

    pub fn action(&self) -> CueAction {
        self.action
    }

    /// Builds the driver command for this cue. `index` is only used in errors.
    pub fn to_command(&self, index: usize) -> Result<Command, ConfigError> {
        let source = || {
            self.source.ok_or(ConfigError::MissingField {
                index,
                action: self.action.name(),
                field: "source",
            })
        };

        Ok(match self.action {
            CueAction::Play => Command::Play {
                source: self.source.unwrap_or(WILDCARD_SOURCE),
                buffer: self.buffer.ok_or(ConfigError::MissingField {
                    index,
                    action: self.action.name(),
                    field: "buffer",
                })?,
                params: self.params(),
            },
            CueAction::Pause => Command::SetPause {
                source: source()?,
                paused: true,
            },
            CueAction::Resume => Command::SetPause {
                source: source()?,
                paused: false,
            },
            CueAction::Update => Command::Update {
                source: source()?,
                params: self.params(),
            },
            CueAction::Stop => Command::Stop { source: source()? },
            CueAction::Rewind => Command::Rewind { source: source()? },
            CueAction::Clear => Command::Clear,
        })
    }

    fn params(&self) -> SourceParams {
        let defaults = SourceParams::default();
        SourceParams {
            freq: self.freq.unwrap_or(defaults.freq),
            pan: self.pan.unwrap_or(defaults.pan),
            volume: self.volume.unwrap_or(defaults.volume),
            autoloop: self.autoloop.unwrap_or(defaults.autoloop),
        }
    }
}

/// A cue resolved to its time and command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledCommand {
    pub at: Duration,
    pub command: Command,
}

impl Session {
    pub fn driver(&self) -> &DriverSettings {
        &self.driver
    }

    pub fn buffers(&self) -> &[BufferEntry] {
        &self.buffers
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    /// Returns the path of a buffer file, relative to the session file.
    pub fn buffer_path(&self, entry: &BufferEntry) -> PathBuf {
        self.base_dir.join(&entry.file)
    }

    pub(super) fn set_base_dir(&mut self, path: &Path) {
        self.base_dir = path.to_path_buf();
    }

    /// Resolves every cue, ordered by time. Cues at the same time keep file order.
    pub fn schedule(&self) -> Result<Vec<ScheduledCommand>, ConfigError> {
        let mut scheduled = self
            .cues
            .iter()
            .enumerate()
            .map(|(index, cue)| {
                Ok(ScheduledCommand {
                    at: cue.at()?,
                    command: cue.to_command(index)?,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        scheduled.sort_by_key(|cue| cue.at);
        Ok(scheduled)
    }

    /// Returns the session length: the configured duration, or the last cue plus a tail.
    pub fn duration(&self) -> Result<Duration, ConfigError> {
        if let Some(duration) = &self.duration {
            return parse_duration(duration);
        }

        let last = self
            .cues
            .iter()
            .map(|cue| cue.at())
            .collect::<Result<Vec<_>, ConfigError>>()?
            .into_iter()
            .max()
            .unwrap_or(Duration::ZERO);
        Ok(last + DEFAULT_TAIL)
    }

    /// Checks that buffer ids are unique and every cue resolves.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for entry in &self.buffers {
            if !seen.insert(entry.id) {
                return Err(ConfigError::DuplicateBuffer(entry.id));
            }
        }
        self.schedule()?;
        self.duration()?;
        self.driver.command_timeout()?;
        self.driver.frame_period()?;
        Ok(())
    }
}
