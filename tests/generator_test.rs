use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use hound::WavReader;
use vision_clip::audio::{AudioPlayer, Clip, NullPlayer, Recorder};
use vision_clip::error::{
    AssembleError, ConfigError, DeviceError, Error, ScriptError, SynthesisError,
};
use vision_clip::generator::{CallerMode, ClipGenerator, GeneratorOptions, Workspace};
use vision_clip::script::{DialogScript, EffectKind};
use vision_clip::tts::{
    Capabilities, ProviderOptions, SpeechProvider, SynthesisRequest, VoiceProfile, Voices,
};

const RATE: u32 = 24_000;
const SCENARIO: &str = "<ringback>\nIVA: Hello\nCaller:3: Hi\n<backend>\n<hangup>\nIVA: never\n";

#[derive(Debug, Clone, PartialEq)]
struct Call {
    text: String,
    voice: String,
    ssml: bool,
}

#[derive(Clone, Default)]
struct FakeProvider {
    calls: Arc<Mutex<Vec<Call>>>,
    ssml: bool,
    fail_on: Option<String>,
}

impl FakeProvider {
    fn respond(&self, request: &SynthesisRequest<'_>, ssml: bool) -> Result<Vec<u8>, SynthesisError> {
        self.calls.lock().unwrap().push(Call {
            text: request.text.to_string(),
            voice: request.voice.to_string(),
            ssml,
        });
        if self.fail_on.as_deref() == Some(request.text) {
            return Err(SynthesisError::Status {
                provider: "fake".to_string(),
                status: 500,
                body: "boom".to_string(),
            });
        }
        // Half a second at 16 kHz so the generator has to resample.
        Ok(Clip::new(16_000, 1, vec![1000; 8000]).encode().unwrap())
    }
}

impl SpeechProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            ssml: self.ssml,
            ..Capabilities::default()
        }
    }

    fn configure(&mut self, _options: &ProviderOptions) -> Result<(), ConfigError> {
        Ok(())
    }

    fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<Vec<u8>, SynthesisError> {
        self.respond(request, false)
    }

    fn synthesize_ssml(&self, request: &SynthesisRequest<'_>) -> Result<Vec<u8>, SynthesisError> {
        self.respond(request, true)
    }
}

#[derive(Clone, Default)]
struct FakeRecorder {
    captures: Arc<Mutex<Vec<u32>>>,
}

impl Recorder for FakeRecorder {
    fn record(&mut self, seconds: u32, sample_rate: u32) -> Result<Clip, DeviceError> {
        self.captures.lock().unwrap().push(seconds);
        Ok(Clip::silence(sample_rate, (seconds * sample_rate) as usize))
    }
}

#[derive(Clone, Default)]
struct CountingPlayer {
    played: Arc<Mutex<usize>>,
}

impl AudioPlayer for CountingPlayer {
    fn play(&mut self, _clip: &Clip) -> Result<(), DeviceError> {
        *self.played.lock().unwrap() += 1;
        Ok(())
    }
}

fn voices() -> Voices {
    Voices {
        assistant: VoiceProfile {
            voice: "va-voice".to_string(),
            locale: "en-US".to_string(),
        },
        caller: VoiceProfile {
            voice: "caller-voice".to_string(),
            locale: "en-US".to_string(),
        },
        rate: 1.0,
    }
}

fn effects_dir(root: &Path) -> PathBuf {
    let dir = root.join("audio");
    std::fs::create_dir_all(&dir).unwrap();
    for name in ["ringback.wav", "backend.wav", "swoosh.wav", "text-received.wav"] {
        // One second of stereo 8 kHz, so effects are conformed too.
        Clip::new(8000, 2, vec![500; 16_000])
            .write(&dir.join(name))
            .unwrap();
    }
    dir
}

fn options(root: &Path) -> GeneratorOptions {
    GeneratorOptions {
        effects_dir: effects_dir(root),
        temp_dir: root.join(".temp"),
        sample_rate: RATE,
        keep_temp: false,
        mode: CallerMode::Synthesize,
    }
}

fn generator(provider: FakeProvider, options: GeneratorOptions) -> ClipGenerator {
    ClipGenerator::with_devices(
        Box::new(provider),
        Box::new(FakeRecorder::default()),
        Box::new(NullPlayer),
        voices(),
        options,
    )
}

#[test]
fn scenario_produces_four_segments_in_order() {
    let root = tempfile::tempdir().unwrap();
    let provider = FakeProvider::default();
    let calls = Arc::clone(&provider.calls);
    let mut options = options(root.path());
    options.keep_temp = true;
    let output = root.path().join("call.wav");

    let report = generator(provider, options)
        .generate(&DialogScript::from_text(SCENARIO), &output)
        .unwrap();

    let names: Vec<String> = report
        .segments
        .iter()
        .map(|s| s.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec!["001_ringback.wav", "002_va.wav", "003_caller.wav", "004_backend.wav"]
    );
    assert_eq!(
        *calls.lock().unwrap(),
        vec![
            Call {
                text: "Hello".to_string(),
                voice: "va-voice".to_string(),
                ssml: false,
            },
            Call {
                text: "Hi".to_string(),
                voice: "caller-voice".to_string(),
                ssml: false,
            },
        ]
    );

    // 1s ringback + 0.5s + 0.5s + 1s backend, all at 24 kHz mono.
    let reader = WavReader::open(&output).unwrap();
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.spec().sample_rate, RATE);
    assert_eq!(reader.duration(), 3 * RATE);
    assert!(report.workspace.is_some());
}

#[test]
fn segments_are_played_back_except_effects() {
    let root = tempfile::tempdir().unwrap();
    let player = CountingPlayer::default();
    let played = Arc::clone(&player.played);

    ClipGenerator::with_devices(
        Box::new(FakeProvider::default()),
        Box::new(FakeRecorder::default()),
        Box::new(player),
        voices(),
        options(root.path()),
    )
    .generate(&DialogScript::from_text(SCENARIO), &root.path().join("call.wav"))
    .unwrap();

    assert_eq!(*played.lock().unwrap(), 2);
}

#[test]
fn record_mode_captures_for_the_given_duration() {
    let root = tempfile::tempdir().unwrap();
    let provider = FakeProvider::default();
    let calls = Arc::clone(&provider.calls);
    let recorder = FakeRecorder::default();
    let captures = Arc::clone(&recorder.captures);
    let mut options = options(root.path());
    options.mode = CallerMode::Record;
    let output = root.path().join("call.wav");

    let report = ClipGenerator::with_devices(
        Box::new(provider),
        Box::new(recorder),
        Box::new(NullPlayer),
        voices(),
        options,
    )
    .generate(&DialogScript::from_text("<ringback>\nCaller:7: hello\n"), &output)
    .unwrap();

    assert_eq!(*captures.lock().unwrap(), vec![7]);
    assert!(calls.lock().unwrap().is_empty());
    assert_eq!(report.segments.len(), 2);
    assert_eq!(
        report.segments[1].path.file_name().unwrap(),
        "002_caller.wav"
    );
    assert_eq!(WavReader::open(&output).unwrap().duration(), 8 * RATE);
}

#[test]
fn workspace_is_removed_after_success() {
    let root = tempfile::tempdir().unwrap();
    let options = options(root.path());
    let temp_dir = options.temp_dir.clone();

    let report = generator(FakeProvider::default(), options)
        .generate(&DialogScript::from_text(SCENARIO), &root.path().join("call.wav"))
        .unwrap();

    assert!(report.workspace.is_none());
    assert!(!temp_dir.exists());
}

#[test]
fn unrelated_workspace_files_survive_cleanup() {
    let root = tempfile::tempdir().unwrap();
    let options = options(root.path());
    let temp_dir = options.temp_dir.clone();
    std::fs::create_dir_all(&temp_dir).unwrap();
    std::fs::write(temp_dir.join("notes.txt"), "keep me").unwrap();
    std::fs::write(temp_dir.join("009_va.wav"), "stale").unwrap();

    generator(FakeProvider::default(), options)
        .generate(&DialogScript::from_text(SCENARIO), &root.path().join("call.wav"))
        .unwrap();

    assert!(temp_dir.join("notes.txt").exists());
    assert!(!temp_dir.join("009_va.wav").exists());
    assert!(Workspace::segment_files(&temp_dir).unwrap().is_empty());
}

#[test]
fn synthesis_failure_keeps_workspace_and_skips_output() {
    let root = tempfile::tempdir().unwrap();
    let provider = FakeProvider {
        fail_on: Some("Hi".to_string()),
        ..FakeProvider::default()
    };
    let options = options(root.path());
    let temp_dir = options.temp_dir.clone();
    let output = root.path().join("call.wav");

    let err = generator(provider, options)
        .generate(&DialogScript::from_text(SCENARIO), &output)
        .unwrap_err();

    assert!(matches!(err, Error::Synthesis { line: 3, .. }));
    assert_eq!(err.exit_code(), 6);
    assert!(!output.exists());
    let kept = Workspace::segment_files(&temp_dir).unwrap();
    assert_eq!(kept.len(), 2);
}

#[test]
fn unwritable_output_keeps_segments_for_reassembly() {
    let root = tempfile::tempdir().unwrap();
    let options = options(root.path());
    let temp_dir = options.temp_dir.clone();
    let output = root.path().join("missing").join("call.wav");

    let err = generator(FakeProvider::default(), options)
        .generate(&DialogScript::from_text(SCENARIO), &output)
        .unwrap_err();

    assert!(matches!(err, Error::Assemble(AssembleError::OutputWrite { .. })));
    assert_eq!(err.exit_code(), 5);
    assert!(!output.exists());
    assert_eq!(Workspace::segment_files(&temp_dir).unwrap().len(), 4);
}

#[test]
fn missing_effect_asset_fails_before_synthesis() {
    let root = tempfile::tempdir().unwrap();
    let provider = FakeProvider::default();
    let calls = Arc::clone(&provider.calls);
    let options = options(root.path());
    std::fs::remove_file(options.effects_dir.join("swoosh.wav")).unwrap();

    let err = generator(provider, options)
        .generate(
            &DialogScript::from_text("<ringback>\nIVA: Hello\n<sendmail>\n"),
            &root.path().join("call.wav"),
        )
        .unwrap_err();

    match &err {
        Error::MissingEffectAsset { kind, path } => {
            assert_eq!(*kind, EffectKind::Sendmail);
            assert!(path.ends_with("swoosh.wav"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.exit_code(), 5);
    assert!(calls.lock().unwrap().is_empty());
}

#[test]
fn malformed_script_fails_before_any_audio() {
    let root = tempfile::tempdir().unwrap();
    let provider = FakeProvider::default();
    let calls = Arc::clone(&provider.calls);
    let options = options(root.path());
    let temp_dir = options.temp_dir.clone();

    let err = generator(provider, options)
        .generate(
            &DialogScript::from_text("<ringback>\nIVA: Hello\nCaller: x: broken\n"),
            &root.path().join("call.wav"),
        )
        .unwrap_err();

    assert!(matches!(err, Error::Script(ScriptError::Malformed { line: 3, .. })));
    assert_eq!(err.exit_code(), 4);
    assert!(calls.lock().unwrap().is_empty());
    assert!(!temp_dir.exists());
}

#[test]
fn empty_caller_text_needs_record_mode() {
    let root = tempfile::tempdir().unwrap();
    let err = generator(FakeProvider::default(), options(root.path()))
        .generate(
            &DialogScript::from_text("<ringback>\nCaller:2:\n"),
            &root.path().join("call.wav"),
        )
        .unwrap_err();
    assert!(matches!(err, Error::Script(ScriptError::Malformed { line: 2, .. })));
}

#[test]
fn ssml_lines_use_ssml_path_only_when_supported() {
    let script = "<ringback>\nIVA: <speak>Hi <break time=\"1s\"/></speak>\n";

    for (supported, expected) in [(true, true), (false, false)] {
        let root = tempfile::tempdir().unwrap();
        let provider = FakeProvider {
            ssml: supported,
            ..FakeProvider::default()
        };
        let calls = Arc::clone(&provider.calls);
        generator(provider, options(root.path()))
            .generate(&DialogScript::from_text(script), &root.path().join("call.wav"))
            .unwrap();
        assert_eq!(calls.lock().unwrap()[0].ssml, expected);
    }
}

#[test]
fn script_without_ringback_writes_empty_clip() {
    let root = tempfile::tempdir().unwrap();
    let output = root.path().join("call.wav");
    let report = generator(FakeProvider::default(), options(root.path()))
        .generate(&DialogScript::from_text("IVA: Hello\n"), &output)
        .unwrap();

    assert!(report.segments.is_empty());
    let reader = WavReader::open(&output).unwrap();
    assert_eq!(reader.duration(), 0);
    assert_eq!(reader.spec().sample_rate, RATE);
}
