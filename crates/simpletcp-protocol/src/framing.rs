//! Marker-delimited message framing.
//!
//! Messages are framed by a start and an end marker around the payload:
//!
//! ```text
//! +--------+-----------------+--------+
//! | <#mi>  |  payload (text) | <#me>  |
//! +--------+-----------------+--------+
//! ```
//!
//! Payloads are not escaped, so a payload must never contain either marker.

use crate::codec::TextCodec;
use crate::vocabulary::{FRAME_END, FRAME_START};

/// Wraps a payload in frame markers.
///
/// # Example
///
/// ```rust
/// use simpletcp_protocol::wrap_frame;
///
/// assert_eq!(wrap_frame("hi"), "<#mi>hi<#me>");
/// ```
pub fn wrap_frame(payload: &str) -> String {
    let mut frame = String::with_capacity(FRAME_START.len() + payload.len() + FRAME_END.len());
    frame.push_str(FRAME_START);
    frame.push_str(payload);
    frame.push_str(FRAME_END);
    frame
}

/// Wraps a payload in frame markers and encodes it for the wire.
pub fn encode_frame(payload: &str, codec: TextCodec) -> Vec<u8> {
    codec.encode(&wrap_frame(payload))
}

/// Incremental frame parser for one connection.
///
/// Text is appended with [`feed`](Self::feed); complete frames are pulled out
/// lazily through the returned iterator. Anything not yet complete stays
/// buffered, including frames the caller did not pull before dropping the
/// iterator, so no input is ever lost between calls.
///
/// Each byte is searched for a marker at most a constant number of times, so
/// a large frame arriving in small chunks costs time linear in its size.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buffer: String,
    /// Bytes at the front that belong to frames already handed out.
    consumed: usize,
    /// Start marker of the frame being assembled.
    start: Option<usize>,
    /// Bytes already searched for the marker currently looked for.
    scanned: usize,
}

impl FrameAssembler {
    /// Creates an empty assembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends decoded text and returns an iterator over completed messages.
    pub fn feed(&mut self, text: &str) -> Frames<'_> {
        self.compact();
        self.buffer.push_str(text);
        Frames { assembler: self }
    }

    /// Returns the text that has not formed a complete frame yet.
    pub fn pending(&self) -> &str {
        &self.buffer[self.consumed..]
    }

    /// Returns true if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.consumed == self.buffer.len()
    }

    /// Discards buffered partial input.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.consumed = 0;
        self.start = None;
        self.scanned = 0;
    }

    /// Drops handed-out frames from the front of the buffer.
    fn compact(&mut self) {
        if self.consumed == 0 {
            return;
        }
        self.buffer.drain(..self.consumed);
        self.start = self.start.map(|start| start - self.consumed);
        self.scanned -= self.consumed;
        self.consumed = 0;
    }

    /// Finds `marker` at or after the last scanned position.
    ///
    /// The search backs up far enough to catch a marker that straddled the
    /// previous end of the buffer.
    fn search(&mut self, marker: &str, floor: usize) -> Option<usize> {
        let mut from = self.scanned.saturating_sub(marker.len() - 1).max(floor);
        while !self.buffer.is_char_boundary(from) {
            from -= 1;
        }
        match self.buffer[from..].find(marker) {
            Some(at) => Some(from + at),
            None => {
                self.scanned = self.buffer.len();
                None
            }
        }
    }

    /// Extracts the first complete frame, if any.
    ///
    /// Everything up to and including the end marker is consumed. Text before
    /// the start marker cannot belong to any frame and goes with it.
    fn next_frame(&mut self) -> Option<String> {
        let start = match self.start {
            Some(start) => start,
            None => {
                let start = self.search(FRAME_START, self.consumed)?;
                self.start = Some(start);
                self.scanned = start + FRAME_START.len();
                start
            }
        };
        let body_start = start + FRAME_START.len();
        let body_end = self.search(FRAME_END, body_start)?;

        let message = self.buffer[body_start..body_end].to_string();
        self.consumed = body_end + FRAME_END.len();
        self.start = None;
        self.scanned = self.consumed;
        Some(message)
    }
}

/// Lazy iterator over the messages completed by one [`FrameAssembler::feed`].
#[derive(Debug)]
pub struct Frames<'a> {
    assembler: &'a mut FrameAssembler,
}

impl Iterator for Frames<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.assembler.next_frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(assembler: &mut FrameAssembler, text: &str) -> Vec<String> {
        assembler.feed(text).collect()
    }

    #[test]
    fn single_frame() {
        let mut assembler = FrameAssembler::new();
        assert_eq!(feed_all(&mut assembler, "<#mi>hello<#me>"), vec!["hello"]);
        assert!(assembler.is_empty());
    }

    #[test]
    fn several_frames_in_one_chunk() {
        let mut assembler = FrameAssembler::new();
        let messages = feed_all(&mut assembler, "<#mi>one<#me><#mi>two<#me><#mi>three<#me>");
        assert_eq!(messages, vec!["one", "two", "three"]);
        assert!(assembler.is_empty());
    }

    #[test]
    fn empty_payload_is_a_message() {
        let mut assembler = FrameAssembler::new();
        assert_eq!(feed_all(&mut assembler, "<#mi><#me>"), vec![""]);
    }

    #[test]
    fn unpaired_start_waits_for_end() {
        let mut assembler = FrameAssembler::new();
        assert!(feed_all(&mut assembler, "<#mi>partial").is_empty());
        assert!(feed_all(&mut assembler, " still partial").is_empty());
        assert_eq!(assembler.pending(), "<#mi>partial still partial");

        assert_eq!(
            feed_all(&mut assembler, " done<#me>"),
            vec!["partial still partial done"]
        );
        assert!(assembler.is_empty());
    }

    #[test]
    fn markers_split_across_chunks() {
        let mut assembler = FrameAssembler::new();
        assert!(feed_all(&mut assembler, "<#m").is_empty());
        assert!(feed_all(&mut assembler, "i>abc<#").is_empty());
        assert_eq!(feed_all(&mut assembler, "me>"), vec!["abc"]);
    }

    #[test]
    fn chunk_boundary_independence() {
        let payloads = ["alpha", "", "gamma delta", "ünïcödé 🦀", "#ps"];
        let stream: String = payloads.iter().map(|p| wrap_frame(p)).collect();
        let boundaries: Vec<usize> = stream.char_indices().map(|(i, _)| i).collect();

        for &a in &boundaries {
            for &b in boundaries.iter().filter(|&&b| b >= a) {
                let mut assembler = FrameAssembler::new();
                let mut messages = feed_all(&mut assembler, &stream[..a]);
                messages.extend(feed_all(&mut assembler, &stream[a..b]));
                messages.extend(feed_all(&mut assembler, &stream[b..]));
                assert_eq!(messages, payloads, "split at {a} and {b}");
                assert!(assembler.is_empty());
            }
        }
    }

    #[test]
    fn stray_end_marker_is_inert() {
        let mut assembler = FrameAssembler::new();
        assert!(feed_all(&mut assembler, "noise<#me>").is_empty());
        assert_eq!(assembler.pending(), "noise<#me>");

        assert_eq!(feed_all(&mut assembler, "<#mi>real<#me>"), vec!["real"]);
        assert!(assembler.is_empty());
    }

    #[test]
    fn frames_are_lazy_and_restartable() {
        let mut assembler = FrameAssembler::new();
        let first = assembler.feed("<#mi>a<#me><#mi>b<#me>").next();
        assert_eq!(first.as_deref(), Some("a"));

        // "b" was never pulled; it comes out with the next feed.
        assert_eq!(feed_all(&mut assembler, "<#mi>c<#me>"), vec!["b", "c"]);
    }

    #[test]
    fn clear_discards_partial_frame() {
        let mut assembler = FrameAssembler::new();
        assert!(feed_all(&mut assembler, "<#mi>half").is_empty());
        assembler.clear();
        assert!(assembler.is_empty());
        assert!(feed_all(&mut assembler, "<#me>").is_empty());
    }

    #[test]
    fn large_frame_in_small_chunks() {
        let payload = "x".repeat(4 * 1024 * 1024);
        let stream = wrap_frame(&payload);

        let mut assembler = FrameAssembler::new();
        let mut messages = Vec::new();
        for chunk in stream.as_bytes().chunks(1024) {
            let chunk = std::str::from_utf8(chunk).unwrap();
            messages.extend(assembler.feed(chunk));
            if messages.is_empty() {
                // Only the tail of each chunk is searched again.
                assert_eq!(assembler.scanned, assembler.buffer.len());
            }
        }
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].len(), payload.len());
        assert!(assembler.is_empty());
    }

    #[test]
    fn search_resumes_inside_multibyte_text() {
        let mut assembler = FrameAssembler::new();
        assert!(feed_all(&mut assembler, "<#mi>日本").is_empty());
        assert!(feed_all(&mut assembler, "語<").is_empty());
        assert!(feed_all(&mut assembler, "#me").is_empty());
        assert_eq!(feed_all(&mut assembler, ">🦀<#mi>x<#me>"), vec!["日本語", "x"]);
        assert_eq!(assembler.pending(), "");
    }

    #[test]
    fn unpulled_frames_survive_compaction() {
        let mut assembler = FrameAssembler::new();
        let mut frames = assembler.feed("<#mi>a<#me><#mi>b<#me><#mi>c");
        assert_eq!(frames.next().as_deref(), Some("a"));
        drop(frames);
        assert_eq!(assembler.pending(), "<#mi>b<#me><#mi>c");

        assert_eq!(feed_all(&mut assembler, "<#me>"), vec!["b", "c"]);
        assert!(assembler.is_empty());
    }

    #[test]
    fn round_trip_through_every_codec() {
        let unicode = "héllo wörld 日本 🦀 ~+\\";
        let ascii = "plain ascii payload 123";

        for codec in TextCodec::ALL {
            let payload = if codec == TextCodec::Ascii { ascii } else { unicode };
            let bytes = encode_frame(payload, codec);

            for at in 0..=bytes.len() {
                let mut decoder = codec.decoder();
                let mut assembler = FrameAssembler::new();
                let mut messages = feed_all(&mut assembler, &decoder.decode(&bytes[..at]));
                messages.extend(feed_all(&mut assembler, &decoder.decode(&bytes[at..])));
                assert_eq!(messages, vec![payload], "{codec} split at {at}");
            }
        }
    }
}
