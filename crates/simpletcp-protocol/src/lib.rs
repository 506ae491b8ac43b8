//! Wire protocol for simpletcp.
//!
//! # Protocol Overview
//!
//! Every message, control traffic included, travels as text wrapped in frame
//! markers and encoded with a configurable [`TextCodec`]:
//!
//! ```text
//! <#mi>payload<#me>
//! ```
//!
//! The byte stream has no other structure. A [`FrameAssembler`] per connection
//! turns arbitrarily split decoded text back into whole messages, and
//! [`Inbound`] separates the reserved [`ControlMessage`] payloads from
//! application messages.
//!
//! # Example
//!
//! ```rust
//! use simpletcp_protocol::{FrameAssembler, TextCodec, encode_frame};
//!
//! let codec = TextCodec::Utf8;
//! let bytes = encode_frame("hello", codec);
//!
//! let mut decoder = codec.decoder();
//! let mut assembler = FrameAssembler::new();
//! let text = decoder.decode(&bytes);
//! let messages: Vec<String> = assembler.feed(&text).collect();
//! assert_eq!(messages, vec!["hello".to_string()]);
//! ```

mod codec;
mod endpoint;
mod error;
mod framing;
mod vocabulary;

pub use codec::{TextCodec, TextDecoder};
pub use endpoint::{FrameReader, FrameWriter, Inbound};
pub use error::{ProtocolError, ProtocolResult};
pub use framing::{FrameAssembler, Frames, encode_frame, wrap_frame};
pub use vocabulary::{
    CLOSE_ACKNOWLEDGED, CLOSE_REQUEST, ControlMessage, FRAME_END, FRAME_START, PING_REPLY,
    PING_REQUEST, SERVER_CLOSING,
};

/// Default receive buffer size in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Default TCP port for both roles.
pub const DEFAULT_PORT: u16 = 9000;
