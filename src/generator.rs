//! Turns classified script events into numbered WAV segments and assembles
//! them into the finished clip.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::audio::device::{default_player, default_recorder};
use crate::audio::{segment_spec, Assembler, AudioPlayer, Clip, EffectLibrary, NullPlayer, Recorder};
use crate::error::{Error, ScriptError};
use crate::script::{DialogScript, EffectKind, LineEvent, ScriptEvent};
use crate::tts::{SpeechProvider, SynthesisRequest, VoiceProfile, Voices};

pub const DEFAULT_TEMP_DIR: &str = ".temp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentTag {
    Assistant,
    Caller,
    Effect(EffectKind),
}

impl SegmentTag {
    pub fn as_str(self) -> &'static str {
        match self {
            SegmentTag::Assistant => "va",
            SegmentTag::Caller => "caller",
            SegmentTag::Effect(kind) => kind.name(),
        }
    }
}

impl fmt::Display for SegmentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub sequence: u32,
    pub tag: SegmentTag,
    pub path: PathBuf,
}

impl Segment {
    pub fn file_name(sequence: u32, tag: SegmentTag) -> String {
        format!("{sequence:03}_{tag}.wav")
    }
}

/// How caller lines become audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallerMode {
    #[default]
    Synthesize,
    Record,
}

fn segment_file_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{3,}_[a-z]+\.wav$").expect("segment pattern is valid"))
}

/// Directory holding the segment files of one run.
#[derive(Debug, Clone)]
pub struct Workspace {
    dir: PathBuf,
}

impl Workspace {
    /// Creates `dir` if needed and removes segment files left by an earlier
    /// run. Other files are left alone.
    pub fn prepare(dir: impl Into<PathBuf>) -> Result<Self, Error> {
        let dir = dir.into();
        let io_err = |source| Error::Workspace {
            path: dir.clone(),
            source,
        };
        fs::create_dir_all(&dir).map_err(io_err)?;

        for stale in Self::segment_files(&dir)? {
            tracing::debug!(path = %stale.display(), "removing stale segment");
            fs::remove_file(&stale).map_err(|source| Error::Workspace {
                path: stale.clone(),
                source,
            })?;
        }
        tracing::debug!(path = %dir.display(), "workspace ready");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn segment_path(&self, sequence: u32, tag: SegmentTag) -> PathBuf {
        self.dir.join(Segment::file_name(sequence, tag))
    }

    /// Segment files in `dir`, in playback order.
    pub fn segment_files(dir: &Path) -> Result<Vec<PathBuf>, Error> {
        let io_err = |source| Error::Workspace {
            path: dir.to_path_buf(),
            source,
        };
        let mut files = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            let name = entry.file_name();
            let is_segment = name
                .to_str()
                .is_some_and(|name| segment_file_pattern().is_match(name));
            if is_segment && entry.path().is_file() {
                files.push(entry.path());
            }
        }
        files.sort_by_key(|path| segment_order(path));
        Ok(files)
    }

    /// Removes the given segments, then the directory if nothing else is left.
    /// Failures are logged and otherwise ignored.
    pub fn cleanup(&self, segments: &[Segment]) {
        for segment in segments {
            if let Err(err) = fs::remove_file(&segment.path) {
                tracing::warn!(path = %segment.path.display(), error = %err, "could not remove segment");
            }
        }
        let empty = fs::read_dir(&self.dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if empty {
            match fs::remove_dir(&self.dir) {
                Ok(()) => tracing::debug!(path = %self.dir.display(), "removed workspace"),
                Err(err) => {
                    tracing::warn!(path = %self.dir.display(), error = %err, "could not remove workspace")
                }
            }
        }
    }
}

fn segment_order(path: &Path) -> (u64, String) {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string();
    let sequence = name
        .split('_')
        .next()
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(u64::MAX);
    (sequence, name)
}

/// What every segment in a run shares.
#[derive(Clone, Copy)]
pub struct SegmentContext<'a> {
    pub effects: &'a EffectLibrary,
    pub workspace: &'a Workspace,
    pub voices: &'a Voices,
    pub mode: CallerMode,
    pub sample_rate: u32,
}

/// Produces one segment file per event, numbering them from 1.
pub struct SegmentMaterializer<'a> {
    provider: &'a dyn SpeechProvider,
    recorder: &'a mut dyn Recorder,
    player: &'a mut dyn AudioPlayer,
    context: SegmentContext<'a>,
    segments: Vec<Segment>,
}

impl<'a> SegmentMaterializer<'a> {
    pub fn new(
        provider: &'a dyn SpeechProvider,
        recorder: &'a mut dyn Recorder,
        player: &'a mut dyn AudioPlayer,
        context: SegmentContext<'a>,
    ) -> Self {
        Self {
            provider,
            recorder,
            player,
            context,
            segments: Vec::new(),
        }
    }

    pub fn finish(self) -> Vec<Segment> {
        self.segments
    }

    pub fn materialize(&mut self, event: &ScriptEvent) -> Result<Option<&Segment>, Error> {
        let line = event.line;
        let (tag, clip, play) = match &event.event {
            LineEvent::Ignored => return Ok(None),
            LineEvent::AssistantSpeech { text } => {
                tracing::info!("IVA: {text}");
                let clip = self.speak(line, text, &self.context.voices.assistant)?;
                (SegmentTag::Assistant, clip, true)
            }
            LineEvent::CallerSpeech {
                text,
                duration_secs,
            } => {
                tracing::info!("Caller:{duration_secs}: {text}");
                match self.context.mode {
                    CallerMode::Record => {
                        println!("Speak now");
                        let clip = self
                            .recorder
                            .record(*duration_secs, self.context.sample_rate)
                            .map_err(|source| Error::Device { line, source })?;
                        (SegmentTag::Caller, clip, false)
                    }
                    CallerMode::Synthesize => {
                        if text.is_empty() {
                            return Err(ScriptError::Malformed {
                                line,
                                reason: "caller line has no text to synthesize".to_string(),
                            }
                            .into());
                        }
                        let clip = self.speak(line, text, &self.context.voices.caller)?;
                        (SegmentTag::Caller, clip, true)
                    }
                }
            }
            LineEvent::Effect(kind) => {
                tracing::debug!(kind = %kind, "inserting effect");
                let clip = self.context.effects.load(*kind)?.conform(self.context.sample_rate);
                (SegmentTag::Effect(*kind), clip, false)
            }
        };

        let sequence = self.segments.len() as u32 + 1;
        let path = self.context.workspace.segment_path(sequence, tag);
        tracing::debug!(path = %path.display(), seconds = clip.duration_secs(), "writing segment");
        clip.write(&path).map_err(|source| Error::Segment {
            path: path.clone(),
            source,
        })?;

        if play {
            self.player
                .play(&clip)
                .map_err(|source| Error::Device { line, source })?;
        }

        self.segments.push(Segment {
            sequence,
            tag,
            path,
        });
        Ok(self.segments.last())
    }

    fn speak(&self, line: usize, text: &str, profile: &VoiceProfile) -> Result<Clip, Error> {
        let request = SynthesisRequest {
            text,
            voice: &profile.voice,
            locale: &profile.locale,
            rate: self.context.voices.rate,
        };
        let ssml = text.starts_with("<speak") && self.provider.capabilities().ssml;
        tracing::debug!(provider = self.provider.name(), voice = %profile.voice, ssml, "synthesizing");

        let wav = if ssml {
            self.provider.synthesize_ssml(&request)
        } else {
            self.provider.synthesize(&request)
        }
        .map_err(|source| Error::Synthesis { line, source })?;

        let clip = Clip::decode(&wav).map_err(|err| Error::Synthesis {
            line,
            source: crate::error::SynthesisError::InvalidResponse {
                provider: self.provider.name().to_string(),
                reason: err.to_string(),
            },
        })?;
        Ok(clip.conform(self.context.sample_rate))
    }
}

#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    pub effects_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub sample_rate: u32,
    pub keep_temp: bool,
    pub mode: CallerMode,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            effects_dir: PathBuf::from(crate::audio::effects::DEFAULT_EFFECTS_DIR),
            temp_dir: PathBuf::from(DEFAULT_TEMP_DIR),
            sample_rate: crate::audio::DEFAULT_SAMPLE_RATE,
            keep_temp: false,
            mode: CallerMode::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub output: PathBuf,
    pub segments: Vec<Segment>,
    /// Present when segment files were kept on disk.
    pub workspace: Option<PathBuf>,
}

pub struct ClipGenerator {
    provider: Box<dyn SpeechProvider>,
    recorder: Box<dyn Recorder>,
    player: Box<dyn AudioPlayer>,
    voices: Voices,
    options: GeneratorOptions,
}

impl ClipGenerator {
    /// Uses the default microphone and speaker, or no playback when
    /// `playback` is false.
    pub fn new(
        provider: Box<dyn SpeechProvider>,
        voices: Voices,
        options: GeneratorOptions,
        playback: bool,
    ) -> Self {
        let player: Box<dyn AudioPlayer> = if playback {
            default_player()
        } else {
            Box::new(NullPlayer)
        };
        Self::with_devices(provider, default_recorder(), player, voices, options)
    }

    pub fn with_devices(
        provider: Box<dyn SpeechProvider>,
        recorder: Box<dyn Recorder>,
        player: Box<dyn AudioPlayer>,
        voices: Voices,
        options: GeneratorOptions,
    ) -> Self {
        Self {
            provider,
            recorder,
            player,
            voices,
            options,
        }
    }

    /// Runs the whole script and writes the clip to `output`. On failure the
    /// workspace is left in place for inspection.
    pub fn generate(
        &mut self,
        script: &DialogScript,
        output: &Path,
    ) -> Result<GenerationReport, Error> {
        if let Some(path) = script.path() {
            tracing::info!("Processing dialog file: {}", path.display());
        }
        let events = script.parse()?;

        let effects = EffectLibrary::new(&self.options.effects_dir);
        effects.ensure_available(events.iter().filter_map(|event| match event.event {
            LineEvent::Effect(kind) => Some(kind),
            _ => None,
        }))?;

        let workspace = Workspace::prepare(&self.options.temp_dir)?;
        let mut materializer = SegmentMaterializer::new(
            self.provider.as_ref(),
            self.recorder.as_mut(),
            self.player.as_mut(),
            SegmentContext {
                effects: &effects,
                workspace: &workspace,
                voices: &self.voices,
                mode: self.options.mode,
                sample_rate: self.options.sample_rate,
            },
        );
        for event in &events {
            materializer.materialize(event)?;
        }
        let segments = materializer.finish();

        tracing::info!(
            "Concatenating {} audio segments into {}",
            segments.len(),
            output.display()
        );
        let paths: Vec<&Path> = segments.iter().map(|s| s.path.as_path()).collect();
        Assembler::new(segment_spec(self.options.sample_rate)).assemble(&paths, output)?;

        let kept = if self.options.keep_temp {
            tracing::info!("Temporary files preserved in: {}", workspace.dir().display());
            Some(workspace.dir().to_path_buf())
        } else {
            workspace.cleanup(&segments);
            None
        };

        Ok(GenerationReport {
            output: output.to_path_buf(),
            segments,
            workspace: kept,
        })
    }
}
