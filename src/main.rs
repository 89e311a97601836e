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
use std::path::{Path, PathBuf};
use std::time::Duration;

use beatgrid::audio;
use beatgrid::config::EngineConfig;
use beatgrid::pattern::{Proposal, ProposalRequest};
use beatgrid::project::Project;
use beatgrid::render::OfflineRenderer;
use beatgrid::samples::SampleStore;
use beatgrid::session::Session;
use beatgrid::util::duration_minutes_seconds;
use clap::{crate_version, Parser, Subcommand};
use duration_string::DurationString;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A step sequencer."
)]
struct Cli {
    /// The path to the engine config.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Prints a summary of a project: tempo, clips and the pattern.
    Inspect {
        /// The path to the project.
        project: PathBuf,
    },
    /// Renders a project to a WAV file.
    Render {
        /// The path to the project.
        project: PathBuf,
        /// Where to write the WAV file.
        output: PathBuf,
    },
    /// Plays a project through the configured output device.
    Play {
        /// The path to the project.
        project: PathBuf,
        /// How long to play, e.g. 30s. Defaults to one pass through the pattern.
        #[arg(short, long)]
        duration: Option<String>,
    },
    /// Rolls a new random pattern for some channels using their primary clips.
    Randomize {
        /// The path to the project.
        project: PathBuf,
        /// The channels to randomize, comma separated. Defaults to all channels.
        #[arg(long, value_delimiter = ',')]
        channels: Vec<usize>,
        /// Where to write the result. Defaults to overwriting the project.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Prints the JSON request a pattern proposer needs for a project.
    Request {
        /// The path to the project.
        project: PathBuf,
        /// The style prompt.
        prompt: String,
    },
    /// Applies a proposed pattern to a project.
    Propose {
        /// The path to the project.
        project: PathBuf,
        /// The path to the proposal JSON.
        proposal: PathBuf,
        /// Where to write the result. Defaults to overwriting the project.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Records a new clip from the default input device into a project.
    Capture {
        /// The path to the project.
        project: PathBuf,
        /// The clip name.
        #[arg(short, long)]
        name: String,
        /// Seconds to record.
        #[arg(short, long, default_value_t = 2.0)]
        seconds: f64,
        /// Makes the new clip the primary clip of this channel.
        #[arg(long)]
        channel: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Inspect { project } => {
            let project = Project::load(&project)?;
            inspect(&project).await;
        }
        Commands::Render { project, output } => {
            let project = Project::load(&project)?;
            let renderer = OfflineRenderer::with_sample_rate(
                config.export_sample_rate(),
                config.mixer_options()?,
            );
            let rendered = renderer
                .export(&project.track, &project.clips, &SampleStore::new(), &output)
                .await?;
            println!(
                "Rendered {} ({} frames, peak {:.3}) to {}",
                duration_minutes_seconds(rendered.duration()),
                rendered.frames(),
                rendered.peak(),
                output.display()
            );
        }
        Commands::Play { project, duration } => {
            let project = Project::load(&project)?;
            let duration = match duration {
                Some(duration) => Some(Duration::from(DurationString::from_string(duration)?)),
                None => None,
            };
            let session = Session::new(config, project).await?;
            let duration = duration.unwrap_or_else(|| session.track().duration());

            println!("Playing for {}", duration_minutes_seconds(duration));
            session.play().await?;
            tokio::time::sleep(duration).await;
            session.stop().await;
            // Let the last steps ring out.
            tokio::time::sleep(Duration::from_millis(500)).await;
            session.shutdown().await;
        }
        Commands::Randomize {
            project: path,
            channels,
            output,
        } => {
            let mut project = Project::load(&path)?;
            let channels = if channels.is_empty() {
                (0..project.track.channel_count()).collect()
            } else {
                channels
            };
            let activated = project.track.randomize_pattern(
                &channels,
                config.randomize_probability(),
                &mut rand::thread_rng(),
            );
            let output = output.unwrap_or(path);
            project.save(&output)?;
            println!("Activated {} steps, saved to {}", activated, output.display());
        }
        Commands::Request { project, prompt } => {
            let project = Project::load(&project)?;
            let request = ProposalRequest::new(prompt, &project.track, &project.clips);
            println!("{}", serde_json::to_string_pretty(&request)?);
        }
        Commands::Propose {
            project: path,
            proposal,
            output,
        } => {
            let mut project = Project::load(&path)?;
            let proposal = Proposal::from_json(&std::fs::read_to_string(&proposal)?)?;
            let report = proposal.apply_to(&mut project.track, &project.clips);
            let output = output.unwrap_or(path);
            project.save(&output)?;

            println!("Applied {} cells", report.cells_applied);
            for key in report.skipped_keys.iter() {
                println!("- skipped cell {}", key);
            }
            for clip in report.unknown_clips.iter() {
                println!("- skipped unknown clip {}", clip);
            }
        }
        Commands::Capture {
            project: path,
            name,
            seconds,
            channel,
        } => {
            if !seconds.is_finite() || seconds <= 0.0 {
                return Err("recording length must be a positive number of seconds".into());
            }
            let project = Project::load(&path)?;
            let session = Session::new(config, project).await?;
            println!("Recording {} for {:.1}s...", name, seconds);
            let id = session
                .capture(&name, Duration::from_secs_f64(seconds), channel)
                .await?;
            session.project().save(&path)?;
            session.shutdown().await;
            println!("Recorded clip {}", id);
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, Box<dyn Error>> {
    Ok(match path {
        Some(path) => EngineConfig::deserialize(path)?,
        None => EngineConfig::default(),
    })
}

async fn inspect(project: &Project) {
    let track = &project.track;
    println!("{}", track.title());
    println!(
        "  {} bpm, {} steps, {} channels, {} per pass",
        track.bpm(),
        track.step_count(),
        track.channel_count(),
        duration_minutes_seconds(track.duration())
    );

    let store = SampleStore::new();
    println!("\nClips (count: {}):", project.clips.len());
    for clip in project.clips.iter() {
        match store.get(clip).await {
            Ok(buffer) => println!(
                "- {} ({}): {}, {} channel(s) at {} Hz",
                clip.name(),
                clip.id(),
                duration_minutes_seconds(buffer.duration()),
                buffer.channel_count(),
                buffer.sample_rate()
            ),
            Err(e) => println!("- {} ({}): {}", clip.name(), clip.id(), e),
        }
    }

    println!("\nPattern:");
    for channel in 0..track.channel_count() {
        let row: String = (0..track.step_count())
            .map(|step| {
                let cell = if track.grid().cell(channel, step).is_empty() {
                    '.'
                } else {
                    'x'
                };
                if step > 0 && step % 4 == 0 {
                    format!("|{}", cell)
                } else {
                    cell.to_string()
                }
            })
            .collect();
        let clip = track
            .primary_clip(channel)
            .map(|clip| clip.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("  {:>2} {} {}", channel, row, clip);
    }
}
