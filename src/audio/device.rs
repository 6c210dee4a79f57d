use crate::error::DeviceError;

use super::clip::Clip;

pub trait Recorder {
    /// Blocks for `seconds` and returns mono audio at `sample_rate`.
    fn record(&mut self, seconds: u32, sample_rate: u32) -> Result<Clip, DeviceError>;
}

pub trait AudioPlayer {
    /// Blocks until the clip has finished playing.
    fn play(&mut self, clip: &Clip) -> Result<(), DeviceError>;
}

/// Player used when operator playback is turned off.
#[derive(Debug, Default)]
pub struct NullPlayer;

impl AudioPlayer for NullPlayer {
    fn play(&mut self, clip: &Clip) -> Result<(), DeviceError> {
        tracing::debug!(seconds = clip.duration_secs(), "playback disabled; skipping");
        Ok(())
    }
}

pub fn default_recorder() -> Box<dyn Recorder> {
    Box::new(MicrophoneRecorder::new())
}

pub fn default_player() -> Box<dyn AudioPlayer> {
    Box::new(SpeakerPlayer::new())
}

#[cfg(feature = "device-audio")]
mod imp {
    use anyhow::{anyhow, Context};
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::{Duration, Instant};

    use crate::audio::clip::Clip;
    use crate::audio::device::{AudioPlayer, Recorder};
    use crate::error::DeviceError;

    const CAPTURE_GRACE: Duration = Duration::from_secs(2);

    #[derive(Debug, Default)]
    pub struct MicrophoneRecorder;

    impl MicrophoneRecorder {
        pub fn new() -> Self {
            Self
        }

        fn capture(seconds: u32) -> anyhow::Result<Clip> {
            let host = cpal::default_host();
            let device = host
                .default_input_device()
                .context("no default input device")?;
            let config = device
                .default_input_config()
                .context("query default input config")?;

            let channels = config.channels();
            let rate = config.sample_rate().0;
            let wanted = seconds as usize * rate as usize * usize::from(channels);
            tracing::debug!(
                device = %device.name().unwrap_or_else(|_| "(unnamed)".to_string()),
                rate,
                channels,
                "recording"
            );

            let buffer = Arc::new(Mutex::new(Vec::<f32>::with_capacity(wanted)));
            let on_error = |err: cpal::StreamError| tracing::error!(error = %err, "input stream error");

            let stream = match config.sample_format() {
                cpal::SampleFormat::F32 => {
                    let sink = Arc::clone(&buffer);
                    device.build_input_stream(
                        &config.config(),
                        move |data: &[f32], _: &cpal::InputCallbackInfo| {
                            push_samples(&sink, data.iter().copied(), wanted)
                        },
                        on_error,
                        None,
                    )
                }
                cpal::SampleFormat::I16 => {
                    let sink = Arc::clone(&buffer);
                    device.build_input_stream(
                        &config.config(),
                        move |data: &[i16], _: &cpal::InputCallbackInfo| {
                            push_samples(
                                &sink,
                                data.iter().map(|s| f32::from(*s) / f32::from(i16::MAX)),
                                wanted,
                            )
                        },
                        on_error,
                        None,
                    )
                }
                other => return Err(anyhow!("unsupported input sample format {other:?}")),
            }
            .context("build input stream")?;

            stream.play().context("start input stream")?;
            thread::sleep(Duration::from_secs(u64::from(seconds)));

            let deadline = Instant::now() + CAPTURE_GRACE;
            loop {
                let filled = buffer
                    .lock()
                    .map_err(|_| anyhow!("capture buffer poisoned"))?
                    .len();
                if filled >= wanted || Instant::now() >= deadline {
                    break;
                }
                thread::sleep(Duration::from_millis(10));
            }
            drop(stream);

            let samples = std::mem::take(
                &mut *buffer
                    .lock()
                    .map_err(|_| anyhow!("capture buffer poisoned"))?,
            );
            Ok(Clip::from_f32(rate, channels, &samples))
        }
    }

    fn push_samples(buffer: &Mutex<Vec<f32>>, data: impl Iterator<Item = f32>, limit: usize) {
        if let Ok(mut buf) = buffer.lock() {
            let room = limit.saturating_sub(buf.len());
            buf.extend(data.take(room));
        }
    }

    impl Recorder for MicrophoneRecorder {
        fn record(&mut self, seconds: u32, sample_rate: u32) -> Result<Clip, DeviceError> {
            let clip =
                Self::capture(seconds).map_err(|err| DeviceError::Capture(format!("{err:#}")))?;
            Ok(clip.conform(sample_rate).fit_duration(seconds))
        }
    }

    #[derive(Default)]
    pub struct SpeakerPlayer {
        stream: Option<rodio::OutputStream>,
    }

    impl SpeakerPlayer {
        pub fn new() -> Self {
            Self::default()
        }

        fn open_stream() -> Result<rodio::OutputStream, DeviceError> {
            let mut stream = rodio::OutputStreamBuilder::open_default_stream()
                .map_err(|err| DeviceError::Playback(format!("open default output: {err}")))?;
            stream.log_on_drop(false);
            Ok(stream)
        }
    }

    impl AudioPlayer for SpeakerPlayer {
        fn play(&mut self, clip: &Clip) -> Result<(), DeviceError> {
            if clip.samples.is_empty() {
                return Ok(());
            }
            if self.stream.is_none() {
                self.stream = Some(Self::open_stream()?);
            }
            let Some(stream) = self.stream.as_ref() else {
                return Err(DeviceError::Playback("output stream not open".to_string()));
            };

            let sink = rodio::Sink::connect_new(stream.mixer());
            sink.append(rodio::buffer::SamplesBuffer::new(
                clip.channels,
                clip.sample_rate,
                clip.to_f32(),
            ));
            sink.sleep_until_end();
            Ok(())
        }
    }
}

#[cfg(feature = "device-audio")]
pub use imp::{MicrophoneRecorder, SpeakerPlayer};

#[cfg(not(feature = "device-audio"))]
#[derive(Debug, Default)]
pub struct MicrophoneRecorder;

#[cfg(not(feature = "device-audio"))]
impl MicrophoneRecorder {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(not(feature = "device-audio"))]
impl Recorder for MicrophoneRecorder {
    fn record(&mut self, _seconds: u32, _sample_rate: u32) -> Result<Clip, DeviceError> {
        Err(DeviceError::Unavailable(
            "microphone capture not enabled; rebuild with --features device-audio".to_string(),
        ))
    }
}

#[cfg(not(feature = "device-audio"))]
#[derive(Debug, Default)]
pub struct SpeakerPlayer;

#[cfg(not(feature = "device-audio"))]
impl SpeakerPlayer {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(not(feature = "device-audio"))]
impl AudioPlayer for SpeakerPlayer {
    fn play(&mut self, _clip: &Clip) -> Result<(), DeviceError> {
        Err(DeviceError::Unavailable(
            "playback not enabled; rebuild with --features device-audio or pass --no-playback"
                .to_string(),
        ))
    }
}
