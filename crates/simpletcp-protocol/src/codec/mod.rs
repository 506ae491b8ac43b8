//! Text codecs for the wire.
//!
//! Both ends must agree on the codec; a mismatch produces garbage, not an
//! error. Decoding is streaming: a [`TextDecoder`] holds back an incomplete
//! trailing sequence until the next read completes it, so a multi-byte
//! character split across TCP segments is never mangled.

mod utf7;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Character encodings supported on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextCodec {
    /// UTF-16, little endian, no byte order mark.
    #[serde(rename = "utf-16le", alias = "unicode")]
    Utf16Le,
    /// UTF-16, big endian, no byte order mark.
    #[serde(rename = "utf-16be", alias = "bigendianunicode")]
    Utf16Be,
    /// UTF-7 (RFC 2152).
    #[serde(rename = "utf-7", alias = "utf7")]
    Utf7,
    /// UTF-8.
    #[default]
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
    /// UTF-32, little endian.
    #[serde(rename = "utf-32", alias = "utf32")]
    Utf32,
    /// 7-bit ASCII; anything else becomes `?`.
    #[serde(rename = "ascii")]
    Ascii,
}

impl TextCodec {
    /// Every supported codec.
    pub const ALL: [TextCodec; 6] = [
        Self::Utf16Le,
        Self::Utf16Be,
        Self::Utf7,
        Self::Utf8,
        Self::Utf32,
        Self::Ascii,
    ];

    /// Canonical configuration name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Utf16Le => "utf-16le",
            Self::Utf16Be => "utf-16be",
            Self::Utf7 => "utf-7",
            Self::Utf8 => "utf-8",
            Self::Utf32 => "utf-32",
            Self::Ascii => "ascii",
        }
    }

    /// Encodes text to bytes.
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Self::Utf16Le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            Self::Utf16Be => text.encode_utf16().flat_map(u16::to_be_bytes).collect(),
            Self::Utf7 => utf7::encode(text),
            Self::Utf8 => text.as_bytes().to_vec(),
            Self::Utf32 => text.chars().flat_map(|c| u32::from(c).to_le_bytes()).collect(),
            Self::Ascii => text
                .chars()
                .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                .collect(),
        }
    }

    /// Creates a streaming decoder for one connection.
    pub fn decoder(self) -> TextDecoder {
        TextDecoder::new(self)
    }
}

impl fmt::Display for TextCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TextCodec {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utf-16le" | "utf16le" | "utf-16" | "unicode" => Ok(Self::Utf16Le),
            "utf-16be" | "utf16be" | "bigendianunicode" => Ok(Self::Utf16Be),
            "utf-7" | "utf7" => Ok(Self::Utf7),
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "utf-32" | "utf32" | "utf-32le" => Ok(Self::Utf32),
            "ascii" | "us-ascii" => Ok(Self::Ascii),
            _ => Err(ProtocolError::UnknownCodec(s.to_string())),
        }
    }
}

/// Per-connection streaming decoder.
#[derive(Debug)]
pub struct TextDecoder {
    codec: TextCodec,
    /// Bytes of an incomplete trailing sequence.
    pending: Vec<u8>,
    utf7: utf7::Utf7Decoder,
}

impl TextDecoder {
    /// Creates a decoder with no buffered input.
    pub fn new(codec: TextCodec) -> Self {
        Self {
            codec,
            pending: Vec::new(),
            utf7: utf7::Utf7Decoder::default(),
        }
    }

    /// Decodes the next chunk of bytes.
    ///
    /// Returns all text that is complete so far; an unfinished trailing
    /// sequence is kept and prepended to the next chunk. Invalid input decodes
    /// to U+FFFD.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let decode: fn(&[u8]) -> (String, usize) = match self.codec {
            TextCodec::Utf7 => return self.utf7.decode(bytes),
            TextCodec::Ascii => return decode_ascii(bytes),
            TextCodec::Utf8 => decode_utf8,
            TextCodec::Utf16Le => |input| decode_utf16(input, u16::from_le_bytes),
            TextCodec::Utf16Be => |input| decode_utf16(input, u16::from_be_bytes),
            TextCodec::Utf32 => decode_utf32,
        };

        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(bytes);

        let (text, consumed) = decode(&input);
        input.drain(..consumed);
        self.pending = input;
        text
    }

    /// Discards any buffered partial sequence.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.utf7 = utf7::Utf7Decoder::default();
    }
}

fn decode_ascii(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if b.is_ascii() { char::from(b) } else { '?' })
        .collect()
}

/// Returns the decoded text and how many input bytes it used.
fn decode_utf8(input: &[u8]) -> (String, usize) {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    loop {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                out.push_str(valid);
                return (out, input.len());
            }
            Err(e) => {
                let (valid, after) = rest.split_at(e.valid_up_to());
                out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                match e.error_len() {
                    Some(len) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        rest = &after[len..];
                    }
                    // Truncated sequence at the end of the chunk.
                    None => return (out, input.len() - after.len()),
                }
            }
        }
    }
}

fn decode_utf16(input: &[u8], unit: fn([u8; 2]) -> u16) -> (String, usize) {
    let mut consumed = input.len() - input.len() % 2;
    let mut units: Vec<u16> = input[..consumed]
        .chunks_exact(2)
        .map(|pair| unit([pair[0], pair[1]]))
        .collect();

    // A high surrogate at the end may pair with the next chunk.
    if let Some(&last) = units.last()
        && (0xD800..=0xDBFF).contains(&last)
    {
        units.pop();
        consumed -= 2;
    }

    let text = char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect();
    (text, consumed)
}

fn decode_utf32(input: &[u8]) -> (String, usize) {
    let consumed = input.len() - input.len() % 4;
    let text = input[..consumed]
        .chunks_exact(4)
        .map(|quad| {
            char::from_u32(u32::from_le_bytes([quad[0], quad[1], quad[2], quad[3]]))
                .unwrap_or(char::REPLACEMENT_CHARACTER)
        })
        .collect();
    (text, consumed)
}
