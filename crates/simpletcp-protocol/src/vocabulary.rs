//! Frame markers and reserved control payloads.

/// Opens every frame.
pub const FRAME_START: &str = "<#mi>";

/// Closes every frame.
pub const FRAME_END: &str = "<#me>";

/// Keepalive probe.
pub const PING_REQUEST: &str = "#ps";

/// Answer to a keepalive probe.
pub const PING_REPLY: &str = "#pr";

/// Client asks the server to close the connection.
pub const CLOSE_REQUEST: &str = "#cl";

/// Server confirms a close request; the connection is going away.
pub const CLOSE_ACKNOWLEDGED: &str = "#cla";

/// Server is shutting down; clients should send a close request.
pub const SERVER_CLOSING: &str = "#csv";

/// Payloads interpreted by the protocol engine and never handed to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlMessage {
    PingRequest,
    PingReply,
    CloseRequest,
    CloseAcknowledged,
    ServerClosing,
}

impl ControlMessage {
    /// Every control message, in wire order of the vocabulary.
    pub const ALL: [ControlMessage; 5] = [
        Self::PingRequest,
        Self::PingReply,
        Self::CloseRequest,
        Self::CloseAcknowledged,
        Self::ServerClosing,
    ];

    /// Recognises a control payload. Matching is exact; anything else is an
    /// application message.
    pub fn from_payload(payload: &str) -> Option<Self> {
        match payload {
            PING_REQUEST => Some(Self::PingRequest),
            PING_REPLY => Some(Self::PingReply),
            CLOSE_REQUEST => Some(Self::CloseRequest),
            CLOSE_ACKNOWLEDGED => Some(Self::CloseAcknowledged),
            SERVER_CLOSING => Some(Self::ServerClosing),
            _ => None,
        }
    }

    /// The payload sent on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PingRequest => PING_REQUEST,
            Self::PingReply => PING_REPLY,
            Self::CloseRequest => CLOSE_REQUEST,
            Self::CloseAcknowledged => CLOSE_ACKNOWLEDGED,
            Self::ServerClosing => SERVER_CLOSING,
        }
    }
}

impl std::fmt::Display for ControlMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payloads_round_trip() {
        for control in ControlMessage::ALL {
            assert_eq!(ControlMessage::from_payload(control.as_str()), Some(control));
        }
    }

    #[test]
    fn near_misses_are_application_messages() {
        assert_eq!(ControlMessage::from_payload("#ps "), None);
        assert_eq!(ControlMessage::from_payload("#PS"), None);
        assert_eq!(ControlMessage::from_payload("#c"), None);
        assert_eq!(ControlMessage::from_payload(""), None);
    }

    #[test]
    fn markers_differ() {
        assert_ne!(FRAME_START, FRAME_END);
        assert_eq!(FRAME_START.len(), FRAME_END.len());
    }
}
