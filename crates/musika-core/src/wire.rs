//! OSC 1.0 message mapping for the trigger protocol.
//!
//! Inbound:
//! - `/trigger_musika (truncation: float, seconds: float, model: string)`
//! - `/musika_ping ()`
//!
//! Outbound:
//! - `/status <string>` for progress and errors (errors prefixed `Error: `)
//! - `/musika_done <path>` for the final artifact

use rosc::{OscMessage, OscPacket, OscType};

use crate::domain::{StatusChannel, StatusEvent, Trigger};

pub const TRIGGER_ADDR: &str = "/trigger_musika";
pub const PING_ADDR: &str = "/musika_ping";
pub const STATUS_ADDR: &str = "/status";
pub const DONE_ADDR: &str = "/musika_done";

/// Prefix applied to error payloads on the `/status` address.
pub const ERROR_PREFIX: &str = "Error: ";

/// Largest datagram we expect to receive.
pub const MAX_DATAGRAM: usize = rosc::decoder::MTU;

/// A decoded inbound request.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Trigger(Trigger),
    Ping,
}

/// A decoded outbound notification, as seen by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Status(String),
    Done(String),
}

impl Reply {
    /// Whether this reply ends an episode from the client's point of view.
    pub fn is_terminal(&self) -> bool {
        match self {
            Reply::Done(_) => true,
            Reply::Status(text) => text.starts_with(ERROR_PREFIX),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("malformed OSC packet: {0}")]
    Decode(String),

    #[error("failed to encode OSC packet: {0}")]
    Encode(String),

    #[error("unhandled address {0}")]
    UnknownAddress(String),

    #[error("bad arguments for {addr}: {reason}")]
    BadArguments { addr: String, reason: String },
}

/// Decode one datagram into its messages, flattening bundles.
pub fn decode_datagram(buf: &[u8]) -> Result<Vec<OscMessage>, WireError> {
    let (_, packet) =
        rosc::decoder::decode_udp(buf).map_err(|e| WireError::Decode(format!("{e:?}")))?;
    let mut out = Vec::new();
    flatten(packet, &mut out);
    Ok(out)
}

fn flatten(packet: OscPacket, out: &mut Vec<OscMessage>) {
    match packet {
        OscPacket::Message(msg) => out.push(msg),
        OscPacket::Bundle(bundle) => {
            for inner in bundle.content {
                flatten(inner, out);
            }
        }
    }
}

/// Interpret a message sent to the daemon.
pub fn parse_inbound(msg: &OscMessage) -> Result<InboundMessage, WireError> {
    match msg.addr.as_str() {
        TRIGGER_ADDR => parse_trigger(msg).map(InboundMessage::Trigger),
        PING_ADDR => Ok(InboundMessage::Ping),
        other => Err(WireError::UnknownAddress(other.to_string())),
    }
}

fn parse_trigger(msg: &OscMessage) -> Result<Trigger, WireError> {
    let bad = |reason: String| WireError::BadArguments {
        addr: msg.addr.clone(),
        reason,
    };

    let [truncation, seconds, model] = msg.args.as_slice() else {
        return Err(bad(format!("expected 3 arguments, got {}", msg.args.len())));
    };

    let truncation = number(truncation).ok_or_else(|| bad("truncation is not a number".into()))?;
    let seconds = number(seconds).ok_or_else(|| bad("seconds is not a number".into()))?;
    let model = match model {
        OscType::String(s) => s.clone(),
        _ => return Err(bad("model is not a string".into())),
    };

    Ok(Trigger::new(model, truncation, seconds))
}

fn number(arg: &OscType) -> Option<f32> {
    match arg {
        OscType::Float(f) => Some(*f),
        OscType::Double(d) => Some(*d as f32),
        OscType::Int(i) => Some(*i as f32),
        OscType::Long(l) => Some(*l as f32),
        _ => None,
    }
}

/// Interpret a message sent by the daemon.
pub fn parse_reply(msg: &OscMessage) -> Option<Reply> {
    let text = match msg.args.first() {
        Some(OscType::String(s)) => s.clone(),
        _ => return None,
    };
    match msg.addr.as_str() {
        STATUS_ADDR => Some(Reply::Status(text)),
        DONE_ADDR => Some(Reply::Done(text)),
        _ => None,
    }
}

/// OSC message for a status event.
pub fn event_message(event: &StatusEvent) -> OscMessage {
    let (addr, text) = match event.channel {
        StatusChannel::Status => (STATUS_ADDR, event.payload.clone()),
        StatusChannel::Error => (STATUS_ADDR, format!("{ERROR_PREFIX}{}", event.payload)),
        StatusChannel::Result => (DONE_ADDR, event.payload.clone()),
    };
    OscMessage {
        addr: addr.to_string(),
        args: vec![OscType::String(text)],
    }
}

pub fn trigger_message(trigger: &Trigger) -> OscMessage {
    OscMessage {
        addr: TRIGGER_ADDR.to_string(),
        args: vec![
            OscType::Float(trigger.truncation),
            OscType::Float(trigger.duration_seconds),
            OscType::String(trigger.model_selector.clone()),
        ],
    }
}

pub fn ping_message() -> OscMessage {
    OscMessage {
        addr: PING_ADDR.to_string(),
        args: Vec::new(),
    }
}

pub fn status_message(text: &str) -> OscMessage {
    OscMessage {
        addr: STATUS_ADDR.to_string(),
        args: vec![OscType::String(text.to_string())],
    }
}

pub fn encode(msg: OscMessage) -> Result<Vec<u8>, WireError> {
    rosc::encoder::encode(&OscPacket::Message(msg)).map_err(|e| WireError::Encode(format!("{e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosc::{OscBundle, OscTime};

    fn msg(addr: &str, args: Vec<OscType>) -> OscMessage {
        OscMessage {
            addr: addr.to_string(),
            args,
        }
    }

    #[test]
    fn test_trigger_decodes_from_datagram() {
        let bytes = encode(trigger_message(&Trigger::new("techno", 0.5, 10.0))).unwrap();
        let msgs = decode_datagram(&bytes).unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(
            parse_inbound(&msgs[0]).unwrap(),
            InboundMessage::Trigger(Trigger::new("techno", 0.5, 10.0))
        );
    }

    #[test]
    fn test_trigger_accepts_integer_and_double_numbers() {
        let m = msg(
            TRIGGER_ADDR,
            vec![
                OscType::Double(0.75),
                OscType::Int(20),
                OscType::String("misc".into()),
            ],
        );
        assert_eq!(
            parse_inbound(&m).unwrap(),
            InboundMessage::Trigger(Trigger::new("misc", 0.75, 20.0))
        );
    }

    #[test]
    fn test_trigger_with_wrong_arity_rejected() {
        let m = msg(TRIGGER_ADDR, vec![OscType::Float(0.5)]);
        assert!(matches!(
            parse_inbound(&m),
            Err(WireError::BadArguments { .. })
        ));
    }

    #[test]
    fn test_trigger_with_wrong_types_rejected() {
        let m = msg(
            TRIGGER_ADDR,
            vec![
                OscType::String("0.5".into()),
                OscType::Float(10.0),
                OscType::String("techno".into()),
            ],
        );
        let err = parse_inbound(&m).unwrap_err();
        assert!(err.to_string().contains("truncation"));

        let m = msg(
            TRIGGER_ADDR,
            vec![OscType::Float(0.5), OscType::Float(10.0), OscType::Int(3)],
        );
        assert!(parse_inbound(&m).unwrap_err().to_string().contains("model"));
    }

    #[test]
    fn test_unknown_address_rejected() {
        let err = parse_inbound(&msg("/something_else", vec![])).unwrap_err();
        assert!(matches!(err, WireError::UnknownAddress(a) if a == "/something_else"));
    }

    #[test]
    fn test_bundles_are_flattened() {
        let packet = OscPacket::Bundle(OscBundle {
            timetag: OscTime::from((0, 1)),
            content: vec![
                OscPacket::Message(ping_message()),
                OscPacket::Message(trigger_message(&Trigger::new("techno", 1.0, 2.0))),
            ],
        });
        let bytes = rosc::encoder::encode(&packet).unwrap();
        let msgs = decode_datagram(&bytes).unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(parse_inbound(&msgs[0]).unwrap(), InboundMessage::Ping);
    }

    #[test]
    fn test_garbage_is_decode_error() {
        assert!(matches!(
            decode_datagram(b"not osc"),
            Err(WireError::Decode(_))
        ));
    }

    #[test]
    fn test_event_addresses() {
        let status = event_message(&StatusEvent::status("starting"));
        assert_eq!(status.addr, STATUS_ADDR);
        assert_eq!(parse_reply(&status), Some(Reply::Status("starting".into())));

        let error = event_message(&StatusEvent::error("busy"));
        assert_eq!(parse_reply(&error), Some(Reply::Status("Error: busy".into())));
        assert!(parse_reply(&error).unwrap().is_terminal());

        let done = event_message(&StatusEvent::result("/out/a.wav"));
        assert_eq!(done.addr, DONE_ADDR);
        assert!(parse_reply(&done).unwrap().is_terminal());
    }

    #[test]
    fn test_non_reply_messages_ignored() {
        assert_eq!(parse_reply(&ping_message()), None);
        assert_eq!(parse_reply(&msg(STATUS_ADDR, vec![OscType::Int(1)])), None);
    }
}
