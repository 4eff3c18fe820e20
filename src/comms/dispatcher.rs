//! Command dispatch: payload → bounded buffer → JSON → command → handler.
//!
//! Malformed input is a local event: it is logged and reported as a
//! [`DispatchOutcome`], never propagated. The node keeps listening.

use core::marker::PhantomData;

use log::{info, warn};
use serde_json::Value;

use crate::app::commands::CommandSet;
use crate::app::ports::CommandHandler;
use crate::comms::buffer::{RECEIVE_BUFFER_LEN, TerminatedBuffer};
use crate::comms::router::MessageHandler;
use crate::error::Error;

/// What happened to one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome<C> {
    /// Decoded and accepted by the handler.
    Executed(C),
    /// Decoded, but the handler refused it (e.g. barrier busy).
    Rejected(C, Error),
    /// Not a JSON object.
    InvalidDocument,
    /// The recognised field is absent.
    MissingField,
    /// The field holds something outside the command set.
    UnknownValue,
}

/// Why a payload did not decode into a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    InvalidDocument,
    MissingField,
    UnknownValue,
}

/// Decode one payload into a command of set `C`.
pub fn decode<C: CommandSet>(payload: &[u8]) -> Result<C, DecodeError> {
    let doc: Value = serde_json::from_slice(payload).map_err(|_| DecodeError::InvalidDocument)?;
    let obj = doc.as_object().ok_or(DecodeError::InvalidDocument)?;
    let field = obj.get(C::FIELD).ok_or(DecodeError::MissingField)?;
    field
        .as_str()
        .and_then(C::parse)
        .ok_or(DecodeError::UnknownValue)
}

/// Routes one command set to its handler.
pub struct CommandDispatcher<C, H> {
    handler: H,
    _set: PhantomData<fn() -> C>,
}

impl<C: CommandSet, H: CommandHandler<C>> CommandDispatcher<C, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _set: PhantomData,
        }
    }

    pub fn dispatch(&self, topic: &str, payload: &[u8]) -> DispatchOutcome<C> {
        let mut buf = TerminatedBuffer::<RECEIVE_BUFFER_LEN>::new();
        buf.fill(payload);
        if buf.was_truncated() {
            warn!(
                "Payload on '{}' truncated from {} to {} bytes",
                topic,
                payload.len(),
                buf.len()
            );
        }
        let bytes = buf.as_bytes();

        let command = match decode::<C>(bytes) {
            Ok(c) => c,
            Err(DecodeError::InvalidDocument) => {
                warn!("Invalid JSON on '{}'", topic);
                return DispatchOutcome::InvalidDocument;
            }
            Err(DecodeError::MissingField) => {
                warn!("No '{}' field in message on '{}'", C::FIELD, topic);
                return DispatchOutcome::MissingField;
            }
            Err(DecodeError::UnknownValue) => {
                warn!("Unknown '{}' value on '{}'", C::FIELD, topic);
                return DispatchOutcome::UnknownValue;
            }
        };

        match self.handler.handle(command) {
            Ok(()) => {
                info!("Accepted {:?} from '{}'", command, topic);
                DispatchOutcome::Executed(command)
            }
            Err(e) => {
                warn!("Rejected {:?} from '{}': {}", command, topic, e);
                DispatchOutcome::Rejected(command, e)
            }
        }
    }
}

impl<C: CommandSet, H: CommandHandler<C>> MessageHandler for CommandDispatcher<C, H> {
    fn on_message(&self, topic: &str, payload: &[u8]) {
        let _ = self.dispatch(topic, payload);
    }
}
