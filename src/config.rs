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
use std::path::Path;
use std::time::Duration;

use config::{Config, File};
use duration_string::DurationString;
use tracing::debug;

mod driver;
mod error;
mod session;

pub use driver::DriverSettings;
pub use error::ConfigError;
pub use session::{BufferEntry, Cue, CueAction, ScheduledCommand, Session};

/// Loads a session from a YAML file. Buffer files are resolved relative to it.
pub fn load_session(path: &Path) -> Result<Session, ConfigError> {
    debug!(path = ?path, "Loading session");
    let mut session: Session = Config::builder()
        .add_source(File::from(path))
        .build()?
        .try_deserialize()?;

    session.set_base_dir(path.parent().unwrap_or_else(|| Path::new(".")));
    session.validate()?;
    Ok(session)
}

/// Parses a duration string such as "1s" or "250ms".
pub(crate) fn parse_duration(value: &str) -> Result<Duration, ConfigError> {
    DurationString::from_string(value.to_string())
        .map(Into::into)
        .map_err(|e| ConfigError::InvalidDuration {
            value: value.to_string(),
            reason: e.to_string(),
        })
}
