//! Unit tests for event dispatch.
//!
//! Every `InboundEvent` variant must reach exactly one `EventHandler` hook.

use worker_harness::protocol::codec::{DecodeError, InboundEvent};
use worker_harness::protocol::dispatcher::{dispatch, EventHandler, LoggingHandler};

/// Records which hook fired, with its arguments.
#[derive(Debug, Default)]
struct Recorder {
    calls: Vec<String>,
}

impl EventHandler for Recorder {
    fn on_process_image_response(&mut self, status: &str, message: &str) {
        self.calls.push(format!("response:{status}:{message}"));
    }

    fn on_parse_error(&mut self, message: &str, error: Option<&str>) {
        self.calls
            .push(format!("parse_error:{message}:{}", error.unwrap_or("-")));
    }

    fn on_unknown_event_error(&mut self, message: &str) {
        self.calls.push(format!("unknown_event_error:{message}"));
    }

    fn on_unknown(&mut self, event_type: &str, _raw: &str) {
        self.calls.push(format!("unknown:{event_type}"));
    }

    fn on_malformed(&mut self, raw: &str, _reason: &DecodeError) {
        self.calls.push(format!("malformed:{raw}"));
    }
}

#[test]
fn process_image_response_routes_status_and_message() {
    let mut recorder = Recorder::default();
    let event = InboundEvent::from_text(
        r#"{"event_type":"PROCESS_IMAGE_RESPONSE","processing_status":"OK","message":"done"}"#,
    );

    dispatch(&event, &mut recorder);

    assert_eq!(recorder.calls, vec!["response:OK:done"]);
}

#[test]
fn parse_error_routes_to_parse_error_hook() {
    let mut recorder = Recorder::default();
    let event = InboundEvent::from_text(r#"{"event_type":"PARSE_ERROR","message":"bad field"}"#);

    dispatch(&event, &mut recorder);

    assert_eq!(recorder.calls, vec!["parse_error:bad field:-"]);
}

#[test]
fn each_variant_reaches_exactly_one_hook() {
    let events = [
        InboundEvent::ProcessImageResponse {
            status: "DONE".into(),
            message: "m".into(),
        },
        InboundEvent::ParseError {
            message: "p".into(),
            error: Some("e".into()),
        },
        InboundEvent::UnknownEventError {
            message: "u".into(),
        },
        InboundEvent::Unknown {
            event_type: "NEW_THING".into(),
            raw: "{}".into(),
        },
        InboundEvent::Malformed {
            raw: "garbage".into(),
            reason: DecodeError::ParseError("eof".into()),
        },
    ];

    let mut recorder = Recorder::default();
    for event in &events {
        dispatch(event, &mut recorder);
    }

    assert_eq!(
        recorder.calls,
        vec![
            "response:DONE:m",
            "parse_error:p:e",
            "unknown_event_error:u",
            "unknown:NEW_THING",
            "malformed:garbage",
        ]
    );
}

#[test]
fn logging_handler_accepts_every_variant() {
    let mut handler = LoggingHandler;
    for text in [
        r#"{"event_type":"PROCESS_IMAGE_RESPONSE","processing_status":"OK","message":"done"}"#,
        r#"{"event_type":"PARSE_ERROR","message":"bad"}"#,
        r#"{"event_type":"UNKNOWN_EVENT_ERROR","message":"what"}"#,
        r#"{"event_type":"SOMETHING_ELSE"}"#,
        "not json at all",
    ] {
        let event = InboundEvent::from_text(text);
        dispatch(&event, &mut handler);
    }
}

#[test]
fn dispatch_works_through_a_trait_object() {
    let mut recorder = Recorder::default();
    {
        let handler: &mut dyn EventHandler = &mut recorder;
        let event = InboundEvent::UnknownEventError {
            message: "x".into(),
        };
        dispatch(&event, handler);
    }
    assert_eq!(recorder.calls, vec!["unknown_event_error:x"]);
}
