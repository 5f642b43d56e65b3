//! engine.io / socket.io text frame taxonomy and codec.
//!
//! Frames are UTF-8 text. The first character is the engine.io packet type;
//! socket.io packets ride inside engine.io `message` packets (`4`) and carry a
//! second type character:
//!
//! | raw          | [`MessageType`]              |
//! |--------------|------------------------------|
//! | `0{...}`     | [`MessageType::Open`]        |
//! | `1`          | [`MessageType::Close`]       |
//! | `2`          | [`MessageType::Ping`]        |
//! | `3`          | [`MessageType::Pong`]        |
//! | `5`          | [`MessageType::Upgrade`]     |
//! | `40`         | [`MessageType::Empty`]       |
//! | `42["e",a]`  | [`MessageType::Emit`]        |
//! | `42N["e",a]` | [`MessageType::AckRequest`]  |
//! | `43N[a]`     | [`MessageType::AckResponse`] |

pub mod handshake;

use serde_json::{Value, json};
use thiserror::Error;

/// Close frame, sent to a peer when the engine wants it gone.
pub const CLOSE_FRAME: &str = "1";
/// Keepalive ping frame.
pub const PING_FRAME: &str = "2";
/// Keepalive pong frame (auto-reply to a peer ping).
pub const PONG_FRAME: &str = "3";

/// Kind of a decoded frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Handshake carrying the session header.
    Open,
    /// Peer requested close.
    Close,
    /// Keepalive ping.
    Ping,
    /// Keepalive pong.
    Pong,
    /// Transport upgrade probe.
    Upgrade,
    /// Namespace connect with no payload.
    Empty,
    /// Application event that expects no reply.
    Emit,
    /// Application event that expects exactly one correlated reply.
    AckRequest,
    /// Reply to an earlier [`MessageType::AckRequest`].
    AckResponse,
}

impl MessageType {
    /// Whether frames of this kind are handed to the application dispatcher.
    pub fn is_application(self) -> bool {
        matches!(
            self,
            Self::Empty | Self::Emit | Self::AckRequest | Self::Upgrade
        )
    }
}

/// A decoded frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    /// Frame kind.
    pub kind: MessageType,
    /// Correlation id for `AckRequest` / `AckResponse`.
    pub ack_id: Option<u64>,
    /// Event name for `Emit` / `AckRequest`.
    pub event: Option<String>,
    /// Event argument(s); `Null` when the frame carries none.
    pub args: Value,
    /// The raw frame as received.
    pub source: String,
}

impl Message {
    fn bare(kind: MessageType, raw: &str) -> Self {
        Self {
            kind,
            ack_id: None,
            event: None,
            args: Value::Null,
            source: raw.to_owned(),
        }
    }
}

/// Codec failures. A frame that fails to decode is never partially processed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Zero-length frame.
    #[error("empty frame")]
    Empty,
    /// Unrecognized packet type character.
    #[error("unknown packet type {0:?}")]
    UnknownType(char),
    /// `4` with nothing after it.
    #[error("truncated socket.io packet")]
    Truncated,
    /// Correlation id does not fit in 64 bits.
    #[error("invalid ack id")]
    InvalidAckId,
    /// `43` without a correlation id.
    #[error("ack response without ack id")]
    MissingAckId,
    /// Payload is not a JSON array.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    /// Event array whose first element is not a string.
    #[error("missing event name")]
    MissingEvent,
}

/// Decode a raw text frame.
pub fn decode(raw: &str) -> Result<Message, DecodeError> {
    let first = raw.chars().next().ok_or(DecodeError::Empty)?;
    let kind = match first {
        '0' => MessageType::Open,
        '1' => MessageType::Close,
        '2' => MessageType::Ping,
        '3' => MessageType::Pong,
        '5' => MessageType::Upgrade,
        '4' => return decode_socket_packet(raw),
        other => return Err(DecodeError::UnknownType(other)),
    };
    Ok(Message::bare(kind, raw))
}

fn decode_socket_packet(raw: &str) -> Result<Message, DecodeError> {
    let body = &raw[1..];
    let packet = body.chars().next().ok_or(DecodeError::Truncated)?;
    match packet {
        '0' => Ok(Message::bare(MessageType::Empty, raw)),
        '2' => {
            let (ack_id, rest) = split_ack_id(&body[1..])?;
            let mut items = parse_array(rest)?.into_iter();
            let event = match items.next() {
                Some(Value::String(event)) => event,
                _ => return Err(DecodeError::MissingEvent),
            };
            Ok(Message {
                kind: if ack_id.is_some() {
                    MessageType::AckRequest
                } else {
                    MessageType::Emit
                },
                ack_id,
                event: Some(event),
                args: collapse_args(items.collect()),
                source: raw.to_owned(),
            })
        }
        '3' => {
            let (ack_id, rest) = split_ack_id(&body[1..])?;
            let ack_id = ack_id.ok_or(DecodeError::MissingAckId)?;
            let items = parse_array(rest)?;
            Ok(Message {
                kind: MessageType::AckResponse,
                ack_id: Some(ack_id),
                event: None,
                args: collapse_args(items),
                source: raw.to_owned(),
            })
        }
        other => Err(DecodeError::UnknownType(other)),
    }
}

fn split_ack_id(s: &str) -> Result<(Option<u64>, &str), DecodeError> {
    let digits = s.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return Ok((None, s));
    }
    let id = s[..digits]
        .parse::<u64>()
        .map_err(|_| DecodeError::InvalidAckId)?;
    Ok((Some(id), &s[digits..]))
}

fn parse_array(s: &str) -> Result<Vec<Value>, DecodeError> {
    serde_json::from_str::<Vec<Value>>(s).map_err(|e| DecodeError::MalformedPayload(e.to_string()))
}

// Zero args → Null, one → itself, several → array.
fn collapse_args(mut items: Vec<Value>) -> Value {
    match items.len() {
        0 => Value::Null,
        1 => items.remove(0),
        _ => Value::Array(items),
    }
}

fn event_array(event: &str, args: &Value) -> String {
    match args {
        Value::Null => json!([event]).to_string(),
        other => json!([event, other]).to_string(),
    }
}

/// Encode an application event: `42["event",args]`.
pub fn encode_emit(event: &str, args: &Value) -> String {
    format!("42{}", event_array(event, args))
}

/// Encode an event that expects a correlated reply: `42N["event",args]`.
pub fn encode_ack_request(id: u64, event: &str, args: &Value) -> String {
    format!("42{id}{}", event_array(event, args))
}

/// Encode the reply to a peer's ack request: `43N[args]`.
pub fn encode_ack_response(id: u64, args: &Value) -> String {
    match args {
        Value::Null => format!("43{id}[]"),
        other => format!("43{id}{}", json!([other])),
    }
}
