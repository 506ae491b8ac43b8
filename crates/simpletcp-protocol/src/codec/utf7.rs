//! UTF-7 (RFC 2152).
//!
//! Characters outside the direct set are sent as UTF-16BE in modified base64
//! between `+` and `-`. The encoder always closes a run with `-`, and sends the
//! optional direct characters (including the frame marker characters `<#>`)
//! as themselves so frames stay visible on the wire.

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

const RUN_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::RequireNone)
        .with_decode_allow_trailing_bits(true),
);

/// Set D, Set O minus `\` and `~`, and whitespace.
const DIRECT_PUNCTUATION: &str = "'(),-./:? \t\r\n!\"#$%&*;<=>@[]^_`{|}";

fn is_direct(c: char) -> bool {
    c.is_ascii_alphanumeric() || DIRECT_PUNCTUATION.contains(c)
}

fn is_base64(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'+' || byte == b'/'
}

pub(super) fn encode(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut run: Vec<u16> = Vec::new();

    for c in text.chars() {
        if c == '+' {
            flush_run(&mut run, &mut out);
            out.extend_from_slice(b"+-");
        } else if is_direct(c) {
            flush_run(&mut run, &mut out);
            out.push(c as u8);
        } else {
            let mut units = [0u16; 2];
            run.extend_from_slice(c.encode_utf16(&mut units));
        }
    }
    flush_run(&mut run, &mut out);
    out
}

fn flush_run(run: &mut Vec<u16>, out: &mut Vec<u8>) {
    if run.is_empty() {
        return;
    }
    let bytes: Vec<u8> = run.drain(..).flat_map(u16::to_be_bytes).collect();
    out.push(b'+');
    out.extend_from_slice(RUN_ENGINE.encode(bytes).as_bytes());
    out.push(b'-');
}

/// Streaming UTF-7 decoder. An open base64 run is carried across chunks and
/// decoded once its terminator arrives.
#[derive(Debug, Default)]
pub(super) struct Utf7Decoder {
    run: Option<String>,
}

impl Utf7Decoder {
    pub(super) fn decode(&mut self, bytes: &[u8]) -> String {
        let mut out = String::with_capacity(bytes.len());

        for &byte in bytes {
            match self.run.take() {
                None if byte == b'+' => self.run = Some(String::new()),
                None => out.push(direct_char(byte)),
                Some(mut run) if is_base64(byte) => {
                    run.push(char::from(byte));
                    self.run = Some(run);
                }
                Some(run) if run.is_empty() && byte == b'-' => out.push('+'),
                Some(run) => {
                    decode_run(&run, &mut out);
                    if byte != b'-' {
                        out.push(direct_char(byte));
                    }
                }
            }
        }
        out
    }
}

fn direct_char(byte: u8) -> char {
    if byte.is_ascii() {
        char::from(byte)
    } else {
        char::REPLACEMENT_CHARACTER
    }
}

fn decode_run(run: &str, out: &mut String) {
    match RUN_ENGINE.decode(run) {
        Ok(bytes) => {
            let units = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
            out.extend(char::decode_utf16(units).map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER)));
        }
        Err(_) => out.push(char::REPLACEMENT_CHARACTER),
    }
}
