use vision_clip::error::ScriptError;
use vision_clip::script::{
    DialogScript, EffectKind, LineClassifier, LineEvent, ProcessingState, ScriptEvent,
};

fn events(text: &str) -> Vec<ScriptEvent> {
    DialogScript::from_text(text).parse().unwrap()
}

#[test]
fn lines_before_ringback_are_ignored() {
    let parsed = events("Title\nIVA: never spoken\nCaller:3: nor this\n<backend>\n");
    assert!(parsed.is_empty());
}

#[test]
fn ringback_opens_the_call_and_is_an_effect() {
    let parsed = events("intro\n<ringback>\nIVA: Hello\n");
    assert_eq!(
        parsed,
        vec![
            ScriptEvent {
                line: 2,
                event: LineEvent::Effect(EffectKind::Ringback),
            },
            ScriptEvent {
                line: 3,
                event: LineEvent::AssistantSpeech {
                    text: "Hello".to_string(),
                },
            },
        ]
    );
}

#[test]
fn scenario_yields_four_events_in_order() {
    let parsed = events("<ringback>\nIVA: Hello\nCaller:3: Hi\n<backend>\n<hangup>\nIVA: after\n");
    let kinds: Vec<_> = parsed.into_iter().map(|e| e.event).collect();
    assert_eq!(
        kinds,
        vec![
            LineEvent::Effect(EffectKind::Ringback),
            LineEvent::AssistantSpeech {
                text: "Hello".to_string()
            },
            LineEvent::CallerSpeech {
                text: "Hi".to_string(),
                duration_secs: 3,
            },
            LineEvent::Effect(EffectKind::Backend),
        ]
    );
}

#[test]
fn hangup_stops_reading_even_malformed_lines() {
    let parsed = events("<ringback>\n<hangup>\nCaller: not a duration\n");
    assert_eq!(parsed.len(), 1);

    let script = DialogScript::from_text("<ringback>\n<hangup>\nIVA: late\n");
    let mut iter = script.events();
    assert!(iter.next().is_some());
    assert!(iter.next().is_none());
    assert_eq!(iter.state(), ProcessingState::HungUp);
}

#[test]
fn caller_duration_and_text_are_parsed() {
    let parsed = events("<ringback>\nCaller: 12 :  I need help  \n");
    assert_eq!(
        parsed[1].event,
        LineEvent::CallerSpeech {
            text: "I need help".to_string(),
            duration_secs: 12,
        }
    );
}

#[test]
fn caller_without_text_is_allowed_by_the_parser() {
    let parsed = events("<ringback>\nCaller:4:\n");
    assert_eq!(
        parsed[1].event,
        LineEvent::CallerSpeech {
            text: String::new(),
            duration_secs: 4,
        }
    );
}

#[test]
fn malformed_caller_line_reports_line_number() {
    let err = DialogScript::from_text("<ringback>\nIVA: ok\nCaller: soon: hello\n")
        .parse()
        .unwrap_err();
    match err {
        ScriptError::Malformed { line, .. } => assert_eq!(line, 3),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn caller_duration_overflow_is_malformed() {
    let err = DialogScript::from_text("<ringback>\nCaller:99999999999: hello\n")
        .parse()
        .unwrap_err();
    assert!(matches!(err, ScriptError::Malformed { line: 2, .. }));
}

#[test]
fn empty_assistant_line_is_malformed() {
    let err = DialogScript::from_text("<ringback>\nIVA:   \n").parse().unwrap_err();
    assert!(matches!(err, ScriptError::Malformed { line: 2, .. }));
}

#[test]
fn assistant_text_is_trimmed_and_crlf_accepted() {
    let parsed = events("<ringback>\r\nIVA:   Welcome back.  \r\n");
    assert_eq!(
        parsed[1].event,
        LineEvent::AssistantSpeech {
            text: "Welcome back.".to_string()
        }
    );
}

#[test]
fn second_ringback_is_a_no_op() {
    let parsed = events("<ringback>\n<ringback>\nIVA: hi\n");
    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed[1].line, 3);
}

#[test]
fn inline_tags_map_to_effects() {
    let parsed = events("<ringback>\n<sendmail>\n<transfer> to billing\n<text>\n<backend>\n");
    let kinds: Vec<_> = parsed
        .into_iter()
        .skip(1)
        .map(|e| e.event)
        .collect();
    assert_eq!(
        kinds,
        vec![
            LineEvent::Effect(EffectKind::Sendmail),
            LineEvent::Effect(EffectKind::Transfer),
            LineEvent::Effect(EffectKind::Text),
            LineEvent::Effect(EffectKind::Backend),
        ]
    );
}

#[test]
fn unrecognized_lines_while_active_are_ignored() {
    let parsed = events("<ringback>\n# a note\n\nNarrator: hmm\nIVA: hi\n");
    assert_eq!(parsed.len(), 2);
}

#[test]
fn classifier_tracks_state() {
    let mut classifier = LineClassifier::new();
    assert_eq!(classifier.state(), ProcessingState::Suppressed);
    assert_eq!(classifier.classify(1, "IVA: x").unwrap(), LineEvent::Ignored);
    classifier.classify(2, "<ringback>").unwrap();
    assert_eq!(classifier.state(), ProcessingState::Active);
    classifier.classify(3, "<hangup>").unwrap();
    assert_eq!(classifier.state(), ProcessingState::HungUp);
    assert_eq!(classifier.classify(4, "IVA: y").unwrap(), LineEvent::Ignored);
}

#[test]
fn load_missing_script_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = DialogScript::load(&dir.path().join("absent.txt")).unwrap_err();
    assert!(matches!(err, ScriptError::Read { .. }));
}
