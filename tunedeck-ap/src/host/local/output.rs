//! Output sinks
//!
//! A sink pulls blocks from a [`LocalMedia`], runs them through the
//! [`SoftwareGraph`] and writes them somewhere. Each sink lives on its own
//! thread and exits once the graph is closed.
//!
//! - Null sink: paces rendering against the wall clock and discards the audio
//! - Device sink (`device` feature): cpal output stream on the default device

use super::decoder::OUTPUT_CHANNELS;
use super::media::LocalMedia;
use crate::error::{Error, Result};
use crate::host::{AudioGraph, ContextState, SoftwareGraph};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Wake-up period of sink threads
const SINK_POLL: Duration = Duration::from_millis(10);

/// Render one interleaved stereo block through media and graph
fn render_block(media: &LocalMedia, graph: &SoftwareGraph, block: &mut [f32]) {
    media.render(block);
    graph.process(block, OUTPUT_CHANNELS);
}

/// Render in real time without an audio device
pub fn spawn_null_sink(media: Arc<LocalMedia>, graph: Arc<SoftwareGraph>) -> Result<()> {
    let rate = graph.sample_rate() as f64;

    std::thread::Builder::new()
        .name("tunedeck-null-sink".to_string())
        .spawn(move || {
            info!("Null output sink started at {}Hz", rate);
            let started = Instant::now();
            let mut rendered: u64 = 0;
            let mut block = Vec::new();

            while graph.state() != ContextState::Closed {
                std::thread::sleep(SINK_POLL);

                let due = (started.elapsed().as_secs_f64() * rate) as u64;
                let frames = due.saturating_sub(rendered) as usize;
                if frames == 0 {
                    continue;
                }
                block.resize(frames * OUTPUT_CHANNELS, 0.0);
                render_block(&media, &graph, &mut block);
                rendered += frames as u64;
            }
            debug!("Null output sink stopped");
        })
        .map_err(|e| Error::AudioOutput(format!("Failed to spawn sink thread: {}", e)))?;

    Ok(())
}

#[cfg(feature = "device")]
pub use device::{probe_device_rate, spawn_device_sink};

#[cfg(feature = "device")]
mod device {
    use super::*;
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use cpal::{FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
    use std::sync::mpsc;
    use tracing::{error, warn};

    fn default_device() -> Result<(cpal::Device, StreamConfig, SampleFormat)> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?;
        let supported = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;
        let format = supported.sample_format();
        Ok((device, supported.config(), format))
    }

    /// Sample rate of the default output device
    pub fn probe_device_rate() -> Result<u32> {
        let (device, config, _) = default_device()?;
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!(
            "Using default audio device: {} ({}Hz, {} channels)",
            name, config.sample_rate.0, config.channels
        );
        Ok(config.sample_rate.0)
    }

    fn build_stream<T>(
        device: &cpal::Device,
        config: &StreamConfig,
        media: Arc<LocalMedia>,
        graph: Arc<SoftwareGraph>,
    ) -> Result<Stream>
    where
        T: SizedSample + FromSample<f32>,
    {
        let channels = config.channels as usize;
        let mut block: Vec<f32> = Vec::new();

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let frames = data.len() / channels.max(1);
                    block.resize(frames * OUTPUT_CHANNELS, 0.0);
                    render_block(&media, &graph, &mut block);

                    for (out, stereo) in data
                        .chunks_mut(channels.max(1))
                        .zip(block.chunks(OUTPUT_CHANNELS))
                    {
                        for (ch, sample) in out.iter_mut().enumerate() {
                            let value = match ch {
                                0 => stereo[0],
                                1 => stereo[1],
                                _ => 0.0,
                            };
                            *sample = T::from_sample(value.clamp(-1.0, 1.0));
                        }
                    }
                },
                |err| error!("Audio stream error: {}", err),
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
    }

    /// Render through the default device until the graph closes
    pub fn spawn_device_sink(media: Arc<LocalMedia>, graph: Arc<SoftwareGraph>) -> Result<()> {
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<()>>(1);

        std::thread::Builder::new()
            .name("tunedeck-device-sink".to_string())
            .spawn(move || {
                // cpal streams are not Send; build and own it on this thread
                let stream = default_device().and_then(|(device, config, format)| {
                    let stream = match format {
                        SampleFormat::F32 => build_stream::<f32>(&device, &config, media, graph.clone())?,
                        SampleFormat::I16 => build_stream::<i16>(&device, &config, media, graph.clone())?,
                        SampleFormat::U16 => build_stream::<u16>(&device, &config, media, graph.clone())?,
                        other => {
                            return Err(Error::AudioOutput(format!(
                                "Unsupported sample format: {:?}",
                                other
                            )))
                        }
                    };
                    stream
                        .play()
                        .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;
                    Ok(stream)
                });

                let stream = match stream {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                info!("Audio stream started");
                while graph.state() != ContextState::Closed {
                    std::thread::sleep(SINK_POLL);
                }
                drop(stream);
                debug!("Audio stream stopped");
            })
            .map_err(|e| Error::AudioOutput(format!("Failed to spawn sink thread: {}", e)))?;

        ready_rx.recv().unwrap_or_else(|_| {
            warn!("Device sink thread exited before reporting");
            Err(Error::AudioOutput("device sink thread exited".to_string()))
        })
    }
}
