//! Dialog script loading and line classification.
//!
//! A script is free text until the first `<ringback>` tag. From there each line
//! is classified into a [`LineEvent`] until `<hangup>` ends the call.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::error::ScriptError;

const RINGBACK_TAG: &str = "<ringback>";
const HANGUP_TAG: &str = "<hangup>";
const ASSISTANT_PREFIX: &str = "IVA:";
const CALLER_PREFIX: &str = "Caller:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    Ringback,
    Backend,
    Sendmail,
    Transfer,
    Text,
}

impl EffectKind {
    pub const ALL: [EffectKind; 5] = [
        EffectKind::Ringback,
        EffectKind::Backend,
        EffectKind::Sendmail,
        EffectKind::Transfer,
        EffectKind::Text,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EffectKind::Ringback => "ringback",
            EffectKind::Backend => "backend",
            EffectKind::Sendmail => "sendmail",
            EffectKind::Transfer => "transfer",
            EffectKind::Text => "text",
        }
    }

    /// Tags that insert an effect mid-call. `<ringback>` is handled by the
    /// state machine since it also opens the call.
    fn from_inline_tag(line: &str) -> Option<Self> {
        [
            EffectKind::Backend,
            EffectKind::Sendmail,
            EffectKind::Transfer,
            EffectKind::Text,
        ]
        .into_iter()
        .find(|kind| line.starts_with(&format!("<{}>", kind.name())))
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    AssistantSpeech { text: String },
    CallerSpeech { text: String, duration_secs: u32 },
    Effect(EffectKind),
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptEvent {
    /// 1-based line number in the source script.
    pub line: usize,
    pub event: LineEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingState {
    #[default]
    Suppressed,
    Active,
    HungUp,
}

#[derive(Debug, Default)]
pub struct LineClassifier {
    state: ProcessingState,
}

impl LineClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ProcessingState {
        self.state
    }

    pub fn classify(&mut self, line_no: usize, line: &str) -> Result<LineEvent, ScriptError> {
        match self.state {
            ProcessingState::HungUp => Ok(LineEvent::Ignored),
            ProcessingState::Suppressed => {
                if line.starts_with(RINGBACK_TAG) {
                    self.state = ProcessingState::Active;
                    Ok(LineEvent::Effect(EffectKind::Ringback))
                } else {
                    Ok(LineEvent::Ignored)
                }
            }
            ProcessingState::Active => self.classify_active(line_no, line),
        }
    }

    fn classify_active(&mut self, line_no: usize, line: &str) -> Result<LineEvent, ScriptError> {
        if line.starts_with(RINGBACK_TAG) {
            return Ok(LineEvent::Ignored);
        }

        if line.starts_with(HANGUP_TAG) {
            self.state = ProcessingState::HungUp;
            return Ok(LineEvent::Ignored);
        }

        if let Some(rest) = line.strip_prefix(ASSISTANT_PREFIX) {
            let text = rest.trim();
            if text.is_empty() {
                return Err(ScriptError::Malformed {
                    line: line_no,
                    reason: "IVA line has no text".to_string(),
                });
            }
            return Ok(LineEvent::AssistantSpeech {
                text: text.to_string(),
            });
        }

        if line.starts_with(CALLER_PREFIX) {
            return parse_caller(line_no, line);
        }

        if let Some(kind) = EffectKind::from_inline_tag(line) {
            return Ok(LineEvent::Effect(kind));
        }

        Ok(LineEvent::Ignored)
    }
}

fn caller_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^Caller:\s*(\d+)\s*:(.*)$").expect("caller line pattern is valid")
    })
}

fn parse_caller(line_no: usize, line: &str) -> Result<LineEvent, ScriptError> {
    let malformed = |reason: String| ScriptError::Malformed {
        line: line_no,
        reason,
    };

    let captures = caller_pattern().captures(line).ok_or_else(|| {
        malformed(format!(
            "expected `Caller:<seconds>: <text>`, found `{}`",
            line.trim_end()
        ))
    })?;

    let duration_secs = captures[1]
        .parse::<u32>()
        .map_err(|err| malformed(format!("caller duration `{}`: {err}", &captures[1])))?;

    Ok(LineEvent::CallerSpeech {
        text: captures[2].trim().to_string(),
        duration_secs,
    })
}

/// An immutable, fully loaded dialog script.
#[derive(Debug, Clone)]
pub struct DialogScript {
    path: Option<PathBuf>,
    lines: Vec<String>,
}

impl DialogScript {
    pub fn load(path: &Path) -> Result<Self, ScriptError> {
        let raw = fs::read_to_string(path).map_err(|source| ScriptError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut script = Self::from_text(&raw);
        script.path = Some(path.to_path_buf());
        Ok(script)
    }

    pub fn from_text(text: &str) -> Self {
        Self {
            path: None,
            lines: text.lines().map(str::to_string).collect(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn events(&self) -> ScriptEvents<'_> {
        ScriptEvents {
            lines: self.lines.iter().enumerate(),
            classifier: LineClassifier::new(),
            failed: false,
        }
    }

    /// Classifies the whole script up front so a malformed line fails the run
    /// before any audio is produced.
    pub fn parse(&self) -> Result<Vec<ScriptEvent>, ScriptError> {
        self.events().collect()
    }
}

pub struct ScriptEvents<'a> {
    lines: std::iter::Enumerate<std::slice::Iter<'a, String>>,
    classifier: LineClassifier,
    failed: bool,
}

impl ScriptEvents<'_> {
    pub fn state(&self) -> ProcessingState {
        self.classifier.state()
    }
}

impl Iterator for ScriptEvents<'_> {
    type Item = Result<ScriptEvent, ScriptError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.failed || self.classifier.state() == ProcessingState::HungUp {
                return None;
            }

            let (idx, line) = self.lines.next()?;
            let line_no = idx + 1;
            match self.classifier.classify(line_no, line) {
                Ok(LineEvent::Ignored) => continue,
                Ok(event) => {
                    return Some(Ok(ScriptEvent {
                        line: line_no,
                        event,
                    }))
                }
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            }
        }
    }
}
