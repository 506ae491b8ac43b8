//! Per-connection send and receive halves.
//!
//! [`FrameWriter`] owns the write side of a transport and serialises whole
//! frames onto it; [`FrameReader`] owns the read side together with the
//! connection's decoder and assembler. Both are generic over tokio's I/O
//! traits so they work with TCP halves as well as in-memory pipes.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::debug;

use crate::codec::{TextCodec, TextDecoder};
use crate::error::ProtocolResult;
use crate::framing::{FrameAssembler, encode_frame};
use crate::vocabulary::ControlMessage;

/// A received message after control interception.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Reserved payload, handled by the protocol engine.
    Control(ControlMessage),
    /// Anything else, delivered to the host verbatim.
    Message(String),
}

impl From<String> for Inbound {
    fn from(message: String) -> Self {
        match ControlMessage::from_payload(&message) {
            Some(control) => Self::Control(control),
            None => Self::Message(message),
        }
    }
}

/// Reads framed messages from a byte stream.
pub struct FrameReader<R> {
    reader: R,
    buffer: Vec<u8>,
    decoder: TextDecoder,
    assembler: FrameAssembler,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Creates a reader that pulls at most `buffer_size` bytes per read.
    pub fn new(reader: R, codec: TextCodec, buffer_size: usize) -> Self {
        Self {
            reader,
            buffer: vec![0u8; buffer_size.max(1)],
            decoder: codec.decoder(),
            assembler: FrameAssembler::new(),
        }
    }

    /// Reads the next chunk and returns every message it completed.
    ///
    /// The returned vector is empty when the chunk only extended a partial
    /// frame. Returns `Ok(None)` at end of stream, after clearing any partial
    /// frame. Cancel safe: dropping the future loses no data.
    pub async fn read_messages(&mut self) -> ProtocolResult<Option<Vec<String>>> {
        let read = self.reader.read(&mut self.buffer).await?;
        if read == 0 {
            self.assembler.clear();
            self.decoder.reset();
            return Ok(None);
        }

        let text = self.decoder.decode(&self.buffer[..read]);
        Ok(Some(self.assembler.feed(&text).collect()))
    }

    /// Returns the text buffered towards an incomplete frame.
    pub fn pending(&self) -> &str {
        self.assembler.pending()
    }
}

/// Writes framed messages to a byte stream.
///
/// Each frame is written in full while holding an internal lock, so
/// concurrent senders on the same connection never interleave bytes.
pub struct FrameWriter<W> {
    writer: Mutex<W>,
    codec: TextCodec,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Creates a new FrameWriter wrapping the given writer.
    pub fn new(writer: W, codec: TextCodec) -> Self {
        Self {
            writer: Mutex::new(writer),
            codec,
        }
    }

    /// Writes a single framed message.
    pub async fn write_frame(&self, payload: &str) -> ProtocolResult<()> {
        let frame = encode_frame(payload, self.codec);
        let mut writer = self.writer.lock().await;
        writer.write_all(&frame).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Sends a message, reporting failure as `false`.
    pub async fn send(&self, payload: &str) -> bool {
        match self.write_frame(payload).await {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "frame write failed");
                false
            }
        }
    }

    /// Sends a control message.
    pub async fn send_control(&self, control: ControlMessage) -> bool {
        self.send(control.as_str()).await
    }

    /// Shuts down the write side of the stream.
    pub async fn shutdown(&self) -> ProtocolResult<()> {
        self.writer.lock().await.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::io::duplex;

    #[test]
    fn inbound_classification() {
        assert_eq!(
            Inbound::from("#ps".to_string()),
            Inbound::Control(ControlMessage::PingRequest)
        );
        assert_eq!(
            Inbound::from("#csv".to_string()),
            Inbound::Control(ControlMessage::ServerClosing)
        );
        assert_eq!(
            Inbound::from("#unknown".to_string()),
            Inbound::Message("#unknown".to_string())
        );
        assert_eq!(Inbound::from(String::new()), Inbound::Message(String::new()));
    }

    #[tokio::test]
    async fn writer_reader_roundtrip() {
        let (client, server) = duplex(64);
        let writer = FrameWriter::new(client, TextCodec::Utf16Be);
        let mut reader = FrameReader::new(server, TextCodec::Utf16Be, 7);

        assert!(writer.send("first").await);
        assert!(writer.send_control(ControlMessage::PingReply).await);
        writer.shutdown().await.unwrap();

        let mut received = Vec::new();
        while let Some(messages) = reader.read_messages().await.unwrap() {
            received.extend(messages);
        }
        assert_eq!(received, vec!["first", "#pr"]);
    }

    #[tokio::test]
    async fn partial_frame_returns_empty_batch() {
        let (mut client, server) = duplex(64);
        let mut reader = FrameReader::new(server, TextCodec::Utf8, 64);

        client.write_all(b"<#mi>hal").await.unwrap();
        assert_eq!(reader.read_messages().await.unwrap(), Some(vec![]));
        assert_eq!(reader.pending(), "<#mi>hal");

        client.write_all(b"f<#me>").await.unwrap();
        assert_eq!(
            reader.read_messages().await.unwrap(),
            Some(vec!["half".to_string()])
        );
    }

    #[tokio::test]
    async fn end_of_stream_clears_partial_frame() {
        let (mut client, server) = duplex(64);
        let mut reader = FrameReader::new(server, TextCodec::Utf8, 64);

        client.write_all(b"<#mi>never finished").await.unwrap();
        drop(client);

        assert_eq!(reader.read_messages().await.unwrap(), Some(vec![]));
        assert_eq!(reader.read_messages().await.unwrap(), None);
        assert_eq!(reader.pending(), "");
    }

    #[tokio::test]
    async fn send_to_closed_peer_reports_false() {
        let (client, server) = duplex(64);
        drop(server);
        let writer = FrameWriter::new(client, TextCodec::Utf8);
        assert!(!writer.send("lost").await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_sends_do_not_interleave() {
        let (client, server) = duplex(16);
        let writer = Arc::new(FrameWriter::new(client, TextCodec::Utf32));
        let mut reader = FrameReader::new(server, TextCodec::Utf32, 5);

        let long_a = "a".repeat(500);
        let long_b = "b".repeat(500);

        let sends = {
            let (wa, wb) = (writer.clone(), writer.clone());
            let (a, b) = (long_a.clone(), long_b.clone());
            tokio::spawn(async move {
                let (ra, rb) = tokio::join!(
                    tokio::spawn(async move { wa.send(&a).await }),
                    tokio::spawn(async move { wb.send(&b).await }),
                );
                assert!(ra.unwrap());
                assert!(rb.unwrap());
            })
        };

        let mut received = Vec::new();
        while received.len() < 2 {
            let batch = reader.read_messages().await.unwrap().unwrap();
            received.extend(batch);
        }
        sends.await.unwrap();

        received.sort();
        assert_eq!(received, vec![long_a, long_b]);
    }
}
