//! JSON codec for the worker's event protocol.
//!
//! Every message on the wire is one JSON object carrying a string
//! `event_type` member. Outbound requests put their fields next to
//! `event_type`; inbound events are decoded into [`InboundEvent`] by
//! reading the members each `event_type` requires.
//!
//! # Known inbound events
//!
//! | `event_type`             | Required members                  | Maps to                                  |
//! |--------------------------|-----------------------------------|------------------------------------------|
//! | `PROCESS_IMAGE_RESPONSE` | `processing_status`, `message`    | [`InboundEvent::ProcessImageResponse`]   |
//! | `PARSE_ERROR`            | `message` (`error` optional)      | [`InboundEvent::ParseError`]             |
//! | `UNKNOWN_EVENT_ERROR`    | `message`                         | [`InboundEvent::UnknownEventError`]      |
//! | *(any other)*            | none                              | [`InboundEvent::Unknown`]                |

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde_json::{Map, Value};

/// `event_type` of the request sent by the harness.
pub const PROCESS_IMAGE_REQUEST: &str = "PROCESS_IMAGE_REQUEST";
/// `event_type` of a completed processing response.
pub const PROCESS_IMAGE_RESPONSE: &str = "PROCESS_IMAGE_RESPONSE";
/// `event_type` sent when the worker could not parse our frame.
pub const PARSE_ERROR: &str = "PARSE_ERROR";
/// `event_type` sent when the worker did not recognise our event.
pub const UNKNOWN_EVENT_ERROR: &str = "UNKNOWN_EVENT_ERROR";

const EVENT_TYPE: &str = "event_type";

// ── Outbound ──────────────────────────────────────────────────────────────────

/// A request to the worker: an `event_type` tag plus string fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    event_type: String,
    fields: BTreeMap<String, String>,
}

impl OutboundRequest {
    /// Build a request from its tag and fields.
    ///
    /// A field named `event_type` never overrides the tag on the wire.
    #[must_use]
    pub fn new(event_type: impl Into<String>, fields: BTreeMap<String, String>) -> Self {
        Self {
            event_type: event_type.into(),
            fields,
        }
    }

    /// `PROCESS_IMAGE_REQUEST` for `filename`.
    #[must_use]
    pub fn process_image(filename: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert("filename".to_owned(), filename.into());
        Self::new(PROCESS_IMAGE_REQUEST, fields)
    }

    /// The request's `event_type`.
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Fields sent next to `event_type`.
    #[must_use]
    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }
}

/// Serialise `request` to a compact JSON object.
///
/// Keys are emitted in sorted order, so equal requests always encode to
/// identical text.
#[must_use]
pub fn encode(request: &OutboundRequest) -> String {
    let mut object = Map::new();
    for (key, value) in &request.fields {
        object.insert(key.clone(), Value::String(value.clone()));
    }
    object.insert(
        EVENT_TYPE.to_owned(),
        Value::String(request.event_type.clone()),
    );
    Value::Object(object).to_string()
}

/// Parse a request previously produced by [`encode`].
///
/// Non-string members other than `event_type` are rejected as missing.
///
/// # Errors
///
/// - [`DecodeError::ParseError`] if `text` is not a JSON object.
/// - [`DecodeError::MissingField`] if `event_type` is absent, or any other
///   member is not a string.
pub fn decode_request(text: &str) -> Result<OutboundRequest, DecodeError> {
    let mut object = parse_object(text)?;
    let event_type = take_string(&mut object, EVENT_TYPE)?;

    let mut fields = BTreeMap::new();
    for (key, value) in object {
        match value {
            Value::String(s) => {
                fields.insert(key, s);
            }
            _ => return Err(DecodeError::MissingField(key)),
        }
    }

    Ok(OutboundRequest { event_type, fields })
}

// ── Inbound ───────────────────────────────────────────────────────────────────

/// A decoded frame from the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// The worker finished (or failed) processing a file.
    ProcessImageResponse {
        /// Worker-defined status, e.g. `DONE`.
        status: String,
        /// Human-readable detail.
        message: String,
    },
    /// The worker could not parse a frame we sent.
    ParseError {
        /// Human-readable detail.
        message: String,
        /// Parser diagnostic, when the worker includes one.
        error: Option<String>,
    },
    /// The worker did not recognise the `event_type` we sent.
    UnknownEventError {
        /// Human-readable detail.
        message: String,
    },
    /// Well-formed event with an `event_type` this harness does not know.
    Unknown {
        /// The unrecognised tag.
        event_type: String,
        /// Frame text as received.
        raw: String,
    },
    /// Frame that failed to decode.
    Malformed {
        /// Frame text as received.
        raw: String,
        /// Why decoding failed.
        reason: DecodeError,
    },
}

impl InboundEvent {
    /// Decode a text frame, folding any [`DecodeError`] into
    /// [`InboundEvent::Malformed`] so every frame yields one event.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        decode(text).unwrap_or_else(|reason| Self::Malformed {
            raw: text.to_owned(),
            reason,
        })
    }

    /// Short label for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ProcessImageResponse { .. } => PROCESS_IMAGE_RESPONSE,
            Self::ParseError { .. } => PARSE_ERROR,
            Self::UnknownEventError { .. } => UNKNOWN_EVENT_ERROR,
            Self::Unknown { .. } => "unknown",
            Self::Malformed { .. } => "malformed",
        }
    }
}

/// Why an inbound frame could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// A member required for the frame's `event_type` is absent or not a
    /// string. Carries the member name.
    MissingField(String),
    /// The frame is not syntactically valid JSON, or not a JSON object.
    ParseError(String),
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField(name) => write!(f, "missing required field: {name}"),
            Self::ParseError(msg) => write!(f, "malformed json: {msg}"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Decode one inbound text frame.
///
/// Unrecognised `event_type` values are not errors: they come back as
/// [`InboundEvent::Unknown`] with the raw text so the caller can log them.
///
/// # Errors
///
/// - [`DecodeError::ParseError`] if `text` is not a JSON object.
/// - [`DecodeError::MissingField`] if `event_type`, or a member required by
///   its value, is absent or not a string.
pub fn decode(text: &str) -> Result<InboundEvent, DecodeError> {
    let mut object = parse_object(text)?;
    let event_type = take_string(&mut object, EVENT_TYPE)?;

    match event_type.as_str() {
        PROCESS_IMAGE_RESPONSE => Ok(InboundEvent::ProcessImageResponse {
            status: take_string(&mut object, "processing_status")?,
            message: take_string(&mut object, "message")?,
        }),
        PARSE_ERROR => Ok(InboundEvent::ParseError {
            message: take_string(&mut object, "message")?,
            error: object
                .remove("error")
                .and_then(|v| v.as_str().map(str::to_owned)),
        }),
        UNKNOWN_EVENT_ERROR => Ok(InboundEvent::UnknownEventError {
            message: take_string(&mut object, "message")?,
        }),
        _ => Ok(InboundEvent::Unknown {
            event_type,
            raw: text.to_owned(),
        }),
    }
}

// ── Private helpers ───────────────────────────────────────────────────────────

fn parse_object(text: &str) -> Result<Map<String, Value>, DecodeError> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(other) => Err(DecodeError::ParseError(format!(
            "expected a json object, found {}",
            json_kind(&other)
        ))),
        Err(err) => Err(DecodeError::ParseError(err.to_string())),
    }
}

fn take_string(object: &mut Map<String, Value>, name: &str) -> Result<String, DecodeError> {
    match object.remove(name) {
        Some(Value::String(s)) => Ok(s),
        _ => Err(DecodeError::MissingField(name.to_owned())),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
