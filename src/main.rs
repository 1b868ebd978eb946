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
use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::{crate_version, Parser, Subcommand};

use pcmdrv::buffers::Buffer;
use pcmdrv::config::{self, DriverSettings};
use pcmdrv::util::{duration_display, filename_display, samples_duration};
use pcmdrv::{demo, render};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A streaming PCM sound chip driver."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parses files as buffer uploads and prints their format.
    Inspect {
        /// The files to inspect.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Renders a session to a WAV file as fast as possible.
    Render {
        /// The path to the session file.
        session_path: PathBuf,
        /// The WAV file to write.
        output_path: PathBuf,
    },
    /// Plays a session in real time through the driver thread.
    Demo {
        /// The path to the session file.
        session_path: PathBuf,
        /// Records the chip output to this WAV file.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Prints the default driver settings.
    Defaults {},
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { files } => {
            for path in files {
                let bytes = fs::read(&path)?;
                match Buffer::from_upload(1, &bytes) {
                    Ok(buffer) => {
                        let length = samples_duration(buffer.frame_count(), buffer.freq() as u32)
                            .map(duration_display)
                            .unwrap_or_else(|| "unknown".to_string());
                        println!(
                            "- {}: {}, {} channel(s), {}Hz, {} bytes, {} frames, {}",
                            filename_display(&path),
                            buffer.format(),
                            buffer.num_channels(),
                            buffer.freq(),
                            buffer.data_len(),
                            buffer.frame_count(),
                            length,
                        );
                    }
                    Err(e) => println!("- {}: rejected: {}", filename_display(&path), e),
                }
            }
        }
        Commands::Render {
            session_path,
            output_path,
        } => {
            let session = config::load_session(&session_path)?;
            let report = render::render_session(&session, &output_path)?;
            let length = samples_duration(report.samples, report.sample_rate).unwrap_or_default();
            println!(
                "Rendered {} frames ({}) to {}",
                report.frames,
                duration_display(length),
                filename_display(&output_path)
            );
        }
        Commands::Demo {
            session_path,
            output,
        } => {
            let session = config::load_session(&session_path)?;
            let report = demo::run_demo(&session, output.as_deref())?;
            println!(
                "Ran {} frames, sent {} cues ({} rejected)",
                report.frames, report.commands, report.rejected
            );
            if let Some(path) = output {
                println!(
                    "Recorded {} frames to {}",
                    report.recorded,
                    filename_display(&path)
                );
            }
        }
        Commands::Defaults {} => {
            println!("{}", DriverSettings::default());
        }
    }

    Ok(())
}
