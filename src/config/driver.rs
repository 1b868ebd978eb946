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
use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use super::{parse_duration, ConfigError};

const DEFAULT_MAX_SOURCES: u8 = 8;
const DEFAULT_MAX_CHANNELS: usize = 8;
const DEFAULT_PAINT_CHUNK: u16 = 128;
const DEFAULT_HALF_BUFFER_SIZE: u16 = 2048;
const DEFAULT_PAINT_PASSES: usize = 16;
const DEFAULT_FRAME_RATE_HZ: u32 = 60;
const DEFAULT_STAGING_SIZE: usize = 128 * 1024;
const DEFAULT_OUTPUT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_COMMAND_TIMEOUT: &str = "2s";

/// A YAML representation of the driver settings. Every field is optional.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct DriverSettings {
    /// Number of source slots.
    max_sources: Option<u8>,

    /// Number of hardware voices the driver may use.
    max_channels: Option<usize>,

    /// Maximum samples decoded per paint step.
    paint_chunk: Option<u16>,

    /// Size in samples of each half of a voice's double buffer.
    half_buffer_size: Option<u16>,

    /// Paint steps a source may run in one frame.
    paint_passes: Option<usize>,

    /// Frame (vertical blank) rate of the driver thread.
    frame_rate_hz: Option<u32>,

    /// Capacity of the shared staging area used for uploads.
    staging_size: Option<usize>,

    /// Sample rate the simulated chip renders at.
    output_sample_rate: Option<u32>,

    /// How long the host waits for an acknowledge.
    command_timeout: Option<String>,
}

impl DriverSettings {
    pub fn max_sources(&self) -> u8 {
        self.max_sources.unwrap_or(DEFAULT_MAX_SOURCES)
    }

    pub fn max_channels(&self) -> usize {
        self.max_channels.unwrap_or(DEFAULT_MAX_CHANNELS)
    }

    pub fn paint_chunk(&self) -> u16 {
        self.paint_chunk.unwrap_or(DEFAULT_PAINT_CHUNK)
    }

    pub fn half_buffer_size(&self) -> u16 {
        self.half_buffer_size.unwrap_or(DEFAULT_HALF_BUFFER_SIZE)
    }

    /// Paint passes per frame, at least 1.
    pub fn paint_passes(&self) -> usize {
        self.paint_passes.unwrap_or(DEFAULT_PAINT_PASSES).max(1)
    }

    pub fn frame_rate_hz(&self) -> u32 {
        self.frame_rate_hz.unwrap_or(DEFAULT_FRAME_RATE_HZ)
    }

    /// Returns the time between frames.
    pub fn frame_period(&self) -> Result<Duration, ConfigError> {
        match self.frame_rate_hz() {
            0 => Err(ConfigError::InvalidSetting {
                name: "frame_rate_hz",
                reason: "must be greater than zero".to_string(),
            }),
            rate => Ok(Duration::from_secs(1) / rate),
        }
    }

    pub fn staging_size(&self) -> usize {
        self.staging_size.unwrap_or(DEFAULT_STAGING_SIZE)
    }

    pub fn output_sample_rate(&self) -> u32 {
        self.output_sample_rate.unwrap_or(DEFAULT_OUTPUT_SAMPLE_RATE)
    }

    pub fn command_timeout(&self) -> Result<Duration, ConfigError> {
        parse_duration(
            self.command_timeout
                .as_deref()
                .unwrap_or(DEFAULT_COMMAND_TIMEOUT),
        )
    }
}

#[cfg(test)]
impl DriverSettings {
    pub fn with_max_sources(mut self, value: u8) -> Self {
        self.max_sources = Some(value);
        self
    }

    pub fn with_max_channels(mut self, value: usize) -> Self {
        self.max_channels = Some(value);
        self
    }

    pub fn with_paint_chunk(mut self, value: u16) -> Self {
        self.paint_chunk = Some(value);
        self
    }

    pub fn with_half_buffer_size(mut self, value: u16) -> Self {
        self.half_buffer_size = Some(value);
        self
    }

    pub fn with_paint_passes(mut self, value: usize) -> Self {
        self.paint_passes = Some(value);
        self
    }

    pub fn with_frame_rate_hz(mut self, value: u32) -> Self {
        self.frame_rate_hz = Some(value);
        self
    }

    pub fn with_staging_size(mut self, value: usize) -> Self {
        self.staging_size = Some(value);
        self
    }

    pub fn with_command_timeout(mut self, value: &str) -> Self {
        self.command_timeout = Some(value.to_string());
        self
    }
}

impl fmt::Display for DriverSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "max_sources: {}", self.max_sources())?;
        writeln!(f, "max_channels: {}", self.max_channels())?;
        writeln!(f, "paint_chunk: {}", self.paint_chunk())?;
        writeln!(f, "half_buffer_size: {}", self.half_buffer_size())?;
        writeln!(f, "paint_passes: {}", self.paint_passes())?;
        writeln!(f, "frame_rate_hz: {}", self.frame_rate_hz())?;
        writeln!(f, "staging_size: {}", self.staging_size())?;
        writeln!(f, "output_sample_rate: {}", self.output_sample_rate())?;
        write!(
            f,
            "command_timeout: {}",
            self.command_timeout
                .as_deref()
                .unwrap_or(DEFAULT_COMMAND_TIMEOUT)
        )
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;

    #[test]
    fn test_defaults() {
        let settings = DriverSettings::default();
        assert_eq!(settings.max_sources(), 8);
        assert_eq!(settings.max_channels(), 8);
        assert_eq!(settings.paint_chunk(), 128);
        assert_eq!(settings.half_buffer_size(), 2048);
        assert_eq!(settings.paint_passes(), 16);
        assert_eq!(settings.staging_size(), 131072);
        assert_eq!(settings.output_sample_rate(), 44100);
        assert_eq!(settings.command_timeout().unwrap(), Duration::from_secs(2));
        assert_eq!(
            settings.frame_period().unwrap(),
            Duration::from_secs(1) / 60
        );
    }

    #[test]
    fn test_deserialize() {
        let yaml = r#"
            max_sources: 4
            half_buffer_size: 1024
            paint_passes: 0
            command_timeout: 250ms
        "#;

        let settings: DriverSettings = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.max_sources(), 4);
        assert_eq!(settings.half_buffer_size(), 1024);
        assert_eq!(settings.paint_passes(), 1);
        assert_eq!(settings.max_channels(), 8);
        assert_eq!(
            settings.command_timeout().unwrap(),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_invalid_values() {
        let settings = DriverSettings::default()
            .with_frame_rate_hz(0)
            .with_command_timeout("soon");
        assert!(matches!(
            settings.frame_period(),
            Err(ConfigError::InvalidSetting {
                name: "frame_rate_hz",
                ..
            })
        ));
        assert!(matches!(
            settings.command_timeout(),
            Err(ConfigError::InvalidDuration { .. })
        ));
    }
}
