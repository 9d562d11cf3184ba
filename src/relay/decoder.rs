use log::debug;
use serde::de::IgnoredAny;

use crate::error::{RelayError, RelayResult};

/// Splits a chunked NDJSON byte stream into complete, trimmed lines.
///
/// Bytes after the last `\n` are held until a later chunk completes them.
/// Splitting happens on raw bytes, so a multi-byte UTF-8 sequence cut by a
/// chunk boundary is only decoded once the whole line is present.
#[derive(Debug)]
pub struct FrameDecoder {
    pending: Vec<u8>,
    // Prefix of `pending` already known to hold no `\n`.
    scanned: usize,
    max_pending: usize,
}

impl FrameDecoder {
    pub fn new(max_pending: usize) -> Self {
        Self {
            pending: Vec::new(),
            scanned: 0,
            max_pending,
        }
    }

    /// Append one chunk and return every line it completed, in order.
    ///
    /// Blank lines are dropped. Fails if the unterminated remainder grows past
    /// the configured cap.
    pub fn feed(&mut self, chunk: &[u8]) -> RelayResult<Vec<String>> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        let mut cursor = self.scanned;
        while let Some(offset) = self.pending[cursor..].iter().position(|b| *b == b'\n') {
            let end = cursor + offset;
            if let Some(line) = decode_line(&self.pending[start..end]) {
                lines.push(line);
            }
            start = end + 1;
            cursor = start;
        }
        self.pending.drain(..start);
        self.scanned = self.pending.len();

        if self.pending.len() > self.max_pending {
            return Err(RelayError::FrameTooLarge {
                limit: self.max_pending,
            });
        }
        Ok(lines)
    }

    #[cfg(test)]
    fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Close the decoder at end of stream.
    ///
    /// An unterminated remainder is returned only when it is already a complete
    /// JSON value; a truncated frame is dropped.
    pub fn finish(&mut self) -> Option<String> {
        let pending = std::mem::take(&mut self.pending);
        self.scanned = 0;
        let line = decode_line(&pending)?;
        if serde_json::from_str::<IgnoredAny>(&line).is_ok() {
            Some(line)
        } else {
            debug!("Discarding truncated trailing frame ({} bytes)", line.len());
            None
        }
    }
}

fn decode_line(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const STREAM: &str = concat!(
        "{\"message\":{\"role\":\"assistant\",\"content\":\"Hel\"},\"done\":false}\n",
        "{\"message\":{\"role\":\"assistant\",\"content\":\"lo \u{1F999}\"},\"done\":false}\n",
        "\n",
        "{\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true}\n",
    );

    fn decode_all(chunks: &[&[u8]]) -> Vec<String> {
        let mut decoder = FrameDecoder::new(1024);
        let mut lines = Vec::new();
        for chunk in chunks {
            lines.extend(decoder.feed(chunk).unwrap());
        }
        lines.extend(decoder.finish());
        lines
    }

    #[test]
    fn whole_stream_yields_every_non_blank_line() {
        let lines = decode_all(&[STREAM.as_bytes()]);
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("lo \u{1F999}"));
    }

    #[test]
    fn any_split_point_yields_the_same_lines() {
        let bytes = STREAM.as_bytes();
        let expected = decode_all(&[bytes]);
        for split in 0..=bytes.len() {
            let (head, tail) = bytes.split_at(split);
            assert_eq!(decode_all(&[head, tail]), expected, "split at byte {split}");
        }
    }

    #[test]
    fn byte_at_a_time_yields_the_same_lines() {
        let bytes = STREAM.as_bytes();
        let pieces: Vec<&[u8]> = bytes.chunks(1).collect();
        assert_eq!(decode_all(&pieces), decode_all(&[bytes]));
    }

    #[test]
    fn delimiter_in_its_own_chunk_emits_line_once() {
        let mut decoder = FrameDecoder::new(1024);
        assert!(decoder.feed(b"{\"done\":false}").unwrap().is_empty());
        assert_eq!(decoder.pending_len(), 14);
        assert_eq!(decoder.feed(b"\n").unwrap(), vec!["{\"done\":false}".to_string()]);
        assert_eq!(decoder.pending_len(), 0);
        assert!(decoder.feed(b"").unwrap().is_empty());
    }

    #[test]
    fn crlf_and_surrounding_whitespace_are_trimmed() {
        let mut decoder = FrameDecoder::new(1024);
        let lines = decoder.feed(b"  {\"done\":true}\r\n\r\n").unwrap();
        assert_eq!(lines, vec!["{\"done\":true}".to_string()]);
    }

    #[test]
    fn complete_trailing_frame_without_newline_is_kept() {
        let lines = decode_all(&[b"{\"message\":{\"content\":\"A\"}}\n{\"done\":true}".as_slice()]);
        assert_eq!(lines.last().map(String::as_str), Some("{\"done\":true}"));
    }

    #[test]
    fn truncated_trailing_frame_is_discarded() {
        let lines = decode_all(&[b"{\"message\":{\"content\":\"A\"}}\n{\"don".as_slice()]);
        assert_eq!(lines, vec!["{\"message\":{\"content\":\"A\"}}".to_string()]);
    }

    #[test]
    fn long_line_in_small_chunks_is_scanned_once() {
        let line = format!("{{\"message\":{{\"content\":\"{}\"}}}}", "x".repeat(300));
        let mut decoder = FrameDecoder::new(1024);
        for piece in line.as_bytes().chunks(7) {
            assert!(decoder.feed(piece).unwrap().is_empty());
            assert_eq!(decoder.scanned, decoder.pending_len());
        }
        assert_eq!(decoder.feed(b"\n{\"do").unwrap(), vec![line]);
        assert_eq!(decoder.scanned, 4);
        assert_eq!(decoder.feed(b"ne\":true}\n").unwrap(), vec!["{\"done\":true}".to_string()]);
        assert_eq!(decoder.scanned, 0);
    }

    #[test]
    fn oversized_partial_line_is_rejected() {
        let mut decoder = FrameDecoder::new(8);
        assert!(decoder.feed(b"{\"a\":1}\n").is_ok());
        let err = decoder.feed(b"{\"message\":").unwrap_err();
        assert_eq!(err, RelayError::FrameTooLarge { limit: 8 });
    }
}
