use std::io::{Cursor, Read};
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::error::AudioError;

/// Interleaved 16-bit PCM audio held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clip {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

pub fn segment_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

impl Clip {
    pub fn new(sample_rate: u32, channels: u16, samples: Vec<i16>) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
            samples,
        }
    }

    pub fn silence(sample_rate: u32, frames: usize) -> Self {
        Self::new(sample_rate, 1, vec![0; frames])
    }

    pub fn from_f32(sample_rate: u32, channels: u16, samples: &[f32]) -> Self {
        Self::new(
            sample_rate,
            channels,
            samples.iter().map(|s| f32_to_i16(*s)).collect(),
        )
    }

    /// Wraps headerless little-endian PCM16 as returned by several TTS APIs.
    pub fn from_pcm16_le(bytes: &[u8], sample_rate: u32, channels: u16) -> Self {
        let samples = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Self::new(sample_rate, channels, samples)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, AudioError> {
        let reader = WavReader::new(Cursor::new(bytes)).map_err(AudioError::Decode)?;
        Self::from_reader(reader)
    }

    pub fn read(path: &Path) -> Result<Self, AudioError> {
        let reader = WavReader::open(path).map_err(AudioError::Decode)?;
        Self::from_reader(reader)
    }

    fn from_reader<R: Read>(mut reader: WavReader<R>) -> Result<Self, AudioError> {
        let spec = reader.spec();
        let samples: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Int, 16) => reader
                .samples::<i16>()
                .collect::<Result<_, _>>()
                .map_err(AudioError::Decode)?,
            (SampleFormat::Int, 8) => reader
                .samples::<i8>()
                .map(|s| s.map(|v| i16::from(v) << 8))
                .collect::<Result<_, _>>()
                .map_err(AudioError::Decode)?,
            (SampleFormat::Int, bits @ 17..=32) => {
                let shift = bits - 16;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| (v >> shift) as i16))
                    .collect::<Result<_, _>>()
                    .map_err(AudioError::Decode)?
            }
            (SampleFormat::Float, 32) => reader
                .samples::<f32>()
                .map(|s| s.map(f32_to_i16))
                .collect::<Result<_, _>>()
                .map_err(AudioError::Decode)?,
            (format, bits) => {
                return Err(AudioError::Unsupported(format!("{format:?} {bits}-bit")));
            }
        };

        Ok(Self::new(spec.sample_rate, spec.channels, samples))
    }

    pub fn spec(&self) -> WavSpec {
        WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        }
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels)
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    pub fn encode(&self) -> Result<Vec<u8>, AudioError> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, self.spec()).map_err(AudioError::Encode)?;
            for sample in &self.samples {
                writer.write_sample(*sample).map_err(AudioError::Encode)?;
            }
            writer.finalize().map_err(AudioError::Encode)?;
        }
        Ok(cursor.into_inner())
    }

    pub fn write(&self, path: &Path) -> Result<(), AudioError> {
        let mut writer = WavWriter::create(path, self.spec()).map_err(AudioError::Encode)?;
        for sample in &self.samples {
            writer.write_sample(*sample).map_err(AudioError::Encode)?;
        }
        writer.finalize().map_err(AudioError::Encode)
    }

    pub fn to_f32(&self) -> Vec<f32> {
        self.samples
            .iter()
            .map(|s| f32::from(*s) / f32::from(i16::MAX))
            .collect()
    }

    pub fn to_mono(self) -> Self {
        if self.channels == 1 {
            return self;
        }
        let channels = usize::from(self.channels);
        let samples = self
            .samples
            .chunks_exact(channels)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|s| i32::from(*s)).sum();
                (sum / channels as i32) as i16
            })
            .collect();
        Self::new(self.sample_rate, 1, samples)
    }

    /// Linear-interpolation resampling.
    pub fn resample(self, target_rate: u32) -> Self {
        if self.sample_rate == target_rate || self.sample_rate == 0 || self.samples.is_empty() {
            return Self {
                sample_rate: target_rate,
                ..self
            };
        }

        let channels = usize::from(self.channels);
        let in_frames = self.frames();
        let out_frames =
            (in_frames as u64 * u64::from(target_rate) / u64::from(self.sample_rate)) as usize;
        let step = f64::from(self.sample_rate) / f64::from(target_rate);

        let mut samples = Vec::with_capacity(out_frames * channels);
        for frame in 0..out_frames {
            let pos = frame as f64 * step;
            let idx = (pos.floor() as usize).min(in_frames - 1);
            let next = (idx + 1).min(in_frames - 1);
            let frac = pos - idx as f64;
            for ch in 0..channels {
                let a = f64::from(self.samples[idx * channels + ch]);
                let b = f64::from(self.samples[next * channels + ch]);
                samples.push((a + (b - a) * frac).round() as i16);
            }
        }

        Self::new(target_rate, self.channels, samples)
    }

    /// Converts to the mono segment format at `sample_rate`.
    pub fn conform(self, sample_rate: u32) -> Self {
        self.to_mono().resample(sample_rate)
    }

    /// Pads with silence or truncates so the clip lasts exactly `seconds`.
    pub fn fit_duration(mut self, seconds: u32) -> Self {
        let frames = self.sample_rate as usize * seconds as usize;
        self.samples.resize(frames * usize::from(self.channels), 0);
        self
    }
}

fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16
}
