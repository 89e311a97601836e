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
use std::{
    fmt,
    sync::atomic::{AtomicBool, Ordering},
    thread,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{error, info, span, Level};

use super::{Mixer, MixerOptions, OutputError};

/// Requests handled by the thread that owns the cpal stream.
enum Command {
    Resume(Sender<Result<(), OutputError>>),
    Shutdown,
}

/// A live output on a cpal device. The stream lives on a dedicated thread and is
/// created paused; it only starts pulling audio from the mixer once resumed.
pub struct Output {
    name: String,
    channels: u16,
    mixer: Mixer,
    commands: Sender<Command>,
    suspended: AtomicBool,
    stream_thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Output {
    /// Opens the named device ("default" for the host's default output).
    pub fn get(name: &str, options: MixerOptions) -> Result<Output, OutputError> {
        let host = cpal::default_host();
        let device = if name == "default" {
            host.default_output_device()
        } else {
            host.output_devices()
                .map_err(|e| OutputError::Config(e.to_string()))?
                .find(|device| device.name().is_ok_and(|n| n.trim() == name))
        }
        .ok_or_else(|| OutputError::NoDevice(name.to_string()))?;

        let supported = device
            .default_output_config()
            .map_err(|e| OutputError::Config(e.to_string()))?;
        let sample_format = supported.sample_format();
        let channels = supported.channels();
        let sample_rate = supported.sample_rate();
        let config: cpal::StreamConfig = supported.into();

        let mixer = Mixer::new(sample_rate, options);
        let (commands, command_rx) = crossbeam_channel::unbounded();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);

        let stream_mixer = mixer.clone();
        let stream_thread = thread::spawn(move || {
            let stream = match build_stream(&device, &config, sample_format, stream_mixer) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            // Some hosts start streams immediately. Hold it until resumed.
            if let Err(e) = stream.pause() {
                error!(err = %e, "Unable to pause new output stream");
            }
            let _ = ready_tx.send(Ok(()));
            run_stream(stream, command_rx);
        });

        ready_rx.recv().map_err(|_| OutputError::Disconnected)??;
        info!(
            device = name,
            sample_rate,
            channels,
            format = ?sample_format,
            "CPAL output stream created"
        );

        Ok(Output {
            name: name.to_string(),
            channels,
            mixer,
            commands,
            suspended: AtomicBool::new(true),
            stream_thread: Mutex::new(Some(stream_thread)),
        })
    }
}

/// Lists the output devices of the default host along with their channel counts.
pub fn list_devices() -> Result<Vec<String>, OutputError> {
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|e| OutputError::Config(e.to_string()))?;

    let mut listed = Vec::new();
    for device in devices {
        let Ok(name) = device.name() else {
            continue;
        };
        let channels = match device.default_output_config() {
            Ok(config) => config.channels(),
            Err(e) => {
                error!(err = %e, device = name, "Unable to read device configuration");
                continue;
            }
        };
        listed.push(format!("{} (Channels={})", name.trim(), channels));
    }
    Ok(listed)
}

/// Keeps the stream alive and serves commands until shutdown.
fn run_stream(stream: cpal::Stream, commands: Receiver<Command>) {
    let span = span!(Level::INFO, "cpal output");
    let _enter = span.enter();

    while let Ok(command) = commands.recv() {
        match command {
            Command::Resume(reply) => {
                let result = stream
                    .play()
                    .map_err(|e| OutputError::Play(e.to_string()));
                if result.is_ok() {
                    info!("CPAL output stream started successfully");
                }
                let _ = reply.send(result);
            }
            Command::Shutdown => break,
        }
    }
    info!("CPAL output stream closed");
}

fn build_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    mixer: Mixer,
) -> Result<cpal::Stream, OutputError> {
    match sample_format {
        cpal::SampleFormat::F32 => build_typed_stream::<f32>(device, config, mixer),
        cpal::SampleFormat::I16 => build_typed_stream::<i16>(device, config, mixer),
        cpal::SampleFormat::I32 => build_typed_stream::<i32>(device, config, mixer),
        cpal::SampleFormat::U16 => build_typed_stream::<u16>(device, config, mixer),
        other => Err(OutputError::UnsupportedFormat(format!("{:?}", other))),
    }
}

fn build_typed_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mixer: Mixer,
) -> Result<cpal::Stream, OutputError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels as usize;
    let mut scratch: Vec<f32> = Vec::new();
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                scratch.resize(data.len(), 0.0);
                mixer.process_into(&mut scratch, channels);
                for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
                    *dst = T::from_sample(src.clamp(-1.0, 1.0));
                }
            },
            |err| error!("CPAL output stream error: {}", err),
            None,
        )
        .map_err(|e| OutputError::Build(e.to_string()))
}

impl super::Output for Output {
    fn resume(&self) -> Result<(), OutputError> {
        if !self.is_suspended() {
            return Ok(());
        }
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.commands
            .send(Command::Resume(reply_tx))
            .map_err(|_| OutputError::Disconnected)?;
        reply_rx.recv().map_err(|_| OutputError::Disconnected)??;
        self.suspended.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    fn mixer(&self) -> &Mixer {
        &self.mixer
    }
}

impl Drop for Output {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(thread) = self.stream_thread.lock().take() {
            let _ = thread.join();
        }
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Channels={}) (CPAL)", self.name, self.channels)
    }
}
