//! Routes decoded inbound events to handlers.
//!
//! [`dispatch`] is an exhaustive match over [`InboundEvent`]: each variant
//! goes to exactly one [`EventHandler`] method. Handlers are advisory; no
//! event asks the run loop to retry, reconnect, or stop.

use tracing::{info, warn};

use crate::protocol::codec::{DecodeError, InboundEvent};

/// Per-variant hooks invoked by [`dispatch`].
///
/// [`LoggingHandler`] is the stock implementation. Business logic such as
/// reacting to a finished file belongs in a custom implementation of
/// [`EventHandler::on_process_image_response`].
pub trait EventHandler {
    /// The worker reported a processing result.
    fn on_process_image_response(&mut self, status: &str, message: &str);

    /// The worker failed to parse a frame we sent.
    fn on_parse_error(&mut self, message: &str, error: Option<&str>);

    /// The worker did not recognise the event we sent.
    fn on_unknown_event_error(&mut self, message: &str);

    /// A well-formed event with an unrecognised `event_type` arrived.
    fn on_unknown(&mut self, event_type: &str, raw: &str);

    /// A frame failed to decode.
    fn on_malformed(&mut self, raw: &str, reason: &DecodeError);
}

/// Route `event` to the matching `handler` method.
pub fn dispatch<H>(event: &InboundEvent, handler: &mut H)
where
    H: EventHandler + ?Sized,
{
    match event {
        InboundEvent::ProcessImageResponse { status, message } => {
            handler.on_process_image_response(status, message);
        }
        InboundEvent::ParseError { message, error } => {
            handler.on_parse_error(message, error.as_deref());
        }
        InboundEvent::UnknownEventError { message } => {
            handler.on_unknown_event_error(message);
        }
        InboundEvent::Unknown { event_type, raw } => {
            handler.on_unknown(event_type, raw);
        }
        InboundEvent::Malformed { raw, reason } => {
            handler.on_malformed(raw, reason);
        }
    }
}

/// Handler that reports every event through `tracing`.
#[derive(Debug, Default)]
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_process_image_response(&mut self, status: &str, message: &str) {
        info!(
            processing_status = status,
            detail = message,
            "received PROCESS_IMAGE_RESPONSE"
        );
    }

    fn on_parse_error(&mut self, message: &str, error: Option<&str>) {
        warn!(detail = message, error, "received PARSE_ERROR");
    }

    fn on_unknown_event_error(&mut self, message: &str) {
        warn!(detail = message, "received UNKNOWN_EVENT_ERROR");
    }

    fn on_unknown(&mut self, event_type: &str, raw: &str) {
        warn!(event_type, raw, "received unrecognised event, ignoring");
    }

    fn on_malformed(&mut self, raw: &str, reason: &DecodeError) {
        warn!(%reason, raw, "failed to decode frame, ignoring");
    }
}
