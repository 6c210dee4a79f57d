use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::error::AssembleError;

/// Sequential concatenation of WAV segments that share one sample format.
#[derive(Debug, Clone, Copy)]
pub struct Assembler {
    spec: WavSpec,
}

impl Assembler {
    pub fn new(spec: WavSpec) -> Self {
        Self { spec }
    }

    /// Takes the format of the first segment, or `fallback` when there are none.
    pub fn for_segments<P: AsRef<Path>>(
        segments: &[P],
        fallback: WavSpec,
    ) -> Result<Self, AssembleError> {
        let Some(first) = segments.first() else {
            return Ok(Self::new(fallback));
        };
        let path = first.as_ref();
        let reader = WavReader::open(path).map_err(|source| AssembleError::ReadSegment {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(reader.spec()))
    }

    pub fn spec(&self) -> WavSpec {
        self.spec
    }

    /// Writes the concatenation to a temporary file beside `output` and moves
    /// it into place, so a failed write never leaves a partial output file.
    pub fn assemble<P: AsRef<Path>>(
        &self,
        segments: &[P],
        output: &Path,
    ) -> Result<PathBuf, AssembleError> {
        let write_err = |source: std::io::Error| AssembleError::OutputWrite {
            path: output.to_path_buf(),
            source,
        };
        let encode_err = |source: hound::Error| AssembleError::Encode {
            path: output.to_path_buf(),
            source,
        };

        let parent = match output.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let temp = tempfile::Builder::new()
            .prefix(".vision-clip-")
            .suffix(".wav")
            .tempfile_in(parent)
            .map_err(write_err)?;

        {
            let mut writer =
                WavWriter::new(BufWriter::new(temp.as_file()), self.spec).map_err(encode_err)?;
            for segment in segments {
                self.append(segment.as_ref(), &mut writer, output)?;
            }
            writer.finalize().map_err(encode_err)?;
        }

        temp.persist(output).map_err(|err| write_err(err.error))?;
        tracing::debug!(
            segments = segments.len(),
            path = %output.display(),
            "assembled output"
        );
        Ok(output.to_path_buf())
    }

    fn append<W>(
        &self,
        path: &Path,
        writer: &mut WavWriter<W>,
        output: &Path,
    ) -> Result<(), AssembleError>
    where
        W: std::io::Write + std::io::Seek,
    {
        let read_err = |source: hound::Error| AssembleError::ReadSegment {
            path: path.to_path_buf(),
            source,
        };
        let encode_err = |source: hound::Error| AssembleError::Encode {
            path: output.to_path_buf(),
            source,
        };

        let mut reader: WavReader<BufReader<File>> = WavReader::open(path).map_err(read_err)?;
        let found = reader.spec();
        if found != self.spec {
            return Err(AssembleError::FormatMismatch {
                path: path.to_path_buf(),
                expected: describe(self.spec),
                found: describe(found),
            });
        }

        match found.sample_format {
            SampleFormat::Int => {
                for sample in reader.samples::<i32>() {
                    writer
                        .write_sample(sample.map_err(read_err)?)
                        .map_err(encode_err)?;
                }
            }
            SampleFormat::Float => {
                for sample in reader.samples::<f32>() {
                    writer
                        .write_sample(sample.map_err(read_err)?)
                        .map_err(encode_err)?;
                }
            }
        }
        Ok(())
    }
}

fn describe(spec: WavSpec) -> String {
    let format = match spec.sample_format {
        SampleFormat::Int => "int",
        SampleFormat::Float => "float",
    };
    format!(
        "{} Hz, {} ch, {}-bit {}",
        spec.sample_rate, spec.channels, spec.bits_per_sample, format
    )
}
