use std::path::PathBuf;

use thiserror::Error;

use crate::script::EffectKind;

pub const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("read script {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown TTS provider '{name}' (available: {available})")]
    UnknownProvider { name: String, available: String },

    #[error("{provider} provider requires `{field}`; set {env_var} or `{field}` in the [{provider}] config table")]
    MissingField {
        provider: &'static str,
        field: &'static str,
        env_var: &'static str,
    },

    #[error("{provider} provider does not recognize option `{key}`")]
    UnknownOption { provider: String, key: String },

    #[error("invalid value '{value}' for `{key}`: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("config file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("read config at {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("write config at {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config at {}: {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("render configuration: {0}")]
    Render(String),

    #[error("unable to resolve home directory")]
    NoHomeDir,

    #[error("build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("{provider} request failed: {source}")]
    Request {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("{provider} rate limit exceeded")]
    RateLimited { provider: String },

    #[error("{provider} audio stream interrupted: {source}")]
    Stream {
        provider: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{provider} request signing failed: {reason}")]
    Signing { provider: String, reason: String },

    #[error("{provider} returned an unusable response: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("{provider} does not support {feature}")]
    Unsupported {
        provider: String,
        feature: &'static str,
    },

    #[error("{provider} accepts at most {max} characters per request, got {len}")]
    TextTooLong {
        provider: String,
        len: usize,
        max: usize,
    },
}

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("audio device unavailable: {0}")]
    Unavailable(String),

    #[error("microphone capture failed: {0}")]
    Capture(String),

    #[error("playback failed: {0}")]
    Playback(String),
}

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("decode wav: {0}")]
    Decode(#[source] hound::Error),

    #[error("encode wav: {0}")]
    Encode(#[source] hound::Error),

    #[error("unsupported sample format: {0}")]
    Unsupported(String),
}

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("read segment {}: {source}", .path.display())]
    ReadSegment {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("segment {} is {found}, expected {expected}", .path.display())]
    FormatMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("write output {}: {source}", .path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("encode output {}: {source}", .path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("script error: {0}")]
    Script(#[from] ScriptError),

    #[error("synthesis failed for line {line}: {source}")]
    Synthesis {
        line: usize,
        #[source]
        source: SynthesisError,
    },

    #[error("audio device error for line {line}: {source}")]
    Device {
        line: usize,
        #[source]
        source: DeviceError,
    },

    #[error("effect asset for <{kind}> missing at {}; check the effects directory", .path.display())]
    MissingEffectAsset { kind: EffectKind, path: PathBuf },

    #[error("effect asset {} unreadable: {source}", .path.display())]
    EffectAsset {
        path: PathBuf,
        #[source]
        source: AudioError,
    },

    #[error("workspace {}: {source}", .path.display())]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("write segment {}: {source}", .path.display())]
    Segment {
        path: PathBuf,
        #[source]
        source: AudioError,
    },

    #[error("assembly failed: {0}")]
    Assemble(#[from] AssembleError),

    #[error("output directory {}: {reason}", .path.display())]
    OutputDir { path: PathBuf, reason: String },

    #[error("{0}")]
    Cancelled(String),
}

impl Error {
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Cancelled(_) => 1,
            Error::Config(_) => 3,
            Error::Script(_) => 4,
            Error::Device { .. }
            | Error::MissingEffectAsset { .. }
            | Error::EffectAsset { .. }
            | Error::Workspace { .. }
            | Error::Segment { .. }
            | Error::Assemble(_)
            | Error::OutputDir { .. } => 5,
            Error::Synthesis { .. } => 6,
        }
    }
}
