use log::{debug, warn};
use serde::Deserialize;

/// One observable step of a relayed generation, in backend order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Generated text to forward to the client.
    ContentFragment(String),
    /// The backend finished generating.
    StreamEnd,
    /// A line that is not a chat frame, or a backend diagnostic; logged and skipped.
    DecodeWarning(String),
}

// Subset of an Ollama `/api/chat` stream line; everything else is ignored.
#[derive(Debug, Deserialize)]
struct ChatFrame {
    message: Option<FrameMessage>,
    #[serde(default)]
    done: bool,
    error: Option<String>,
    done_reason: Option<String>,
    eval_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FrameMessage {
    #[serde(default)]
    content: String,
}

/// Turn one NDJSON line into zero or more events.
///
/// A frame yields at most one fragment, followed by `StreamEnd` when the
/// frame is marked done. Lines that do not parse become a single warning.
pub fn map_line(line: &str) -> Vec<StreamEvent> {
    let frame: ChatFrame = match serde_json::from_str(line) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("Skipping malformed backend line ({}): {}", e, line);
            return vec![StreamEvent::DecodeWarning(line.to_string())];
        }
    };

    // Diagnostics do not end the stream; a backend that really stops will
    // close the body without a done frame.
    if let Some(message) = frame.error {
        warn!("Backend diagnostic on stream: {}", message);
        return vec![StreamEvent::DecodeWarning(line.to_string())];
    }

    let mut events = Vec::with_capacity(2);
    if let Some(message) = frame.message {
        if !message.content.is_empty() {
            events.push(StreamEvent::ContentFragment(message.content));
        }
    }
    if frame.done {
        debug!(
            "Backend finished (reason: {}, eval_count: {})",
            frame.done_reason.as_deref().unwrap_or("unknown"),
            frame.eval_count.map_or_else(|| "n/a".to_string(), |c| c.to_string())
        );
        events.push(StreamEvent::StreamEnd);
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn content_frame_becomes_fragment() {
        let events = map_line(r#"{"model":"llama3","message":{"role":"assistant","content":"Hi"},"done":false}"#);
        assert_eq!(events, vec![StreamEvent::ContentFragment("Hi".into())]);
    }

    #[test]
    fn done_frame_with_content_emits_fragment_then_end() {
        let events = map_line(r#"{"message":{"content":"!"},"done":true,"done_reason":"stop"}"#);
        assert_eq!(
            events,
            vec![
                StreamEvent::ContentFragment("!".into()),
                StreamEvent::StreamEnd
            ]
        );
    }

    #[test]
    fn empty_content_is_not_forwarded() {
        assert_eq!(
            map_line(r#"{"message":{"role":"assistant","content":""},"done":true,"eval_count":42}"#),
            vec![StreamEvent::StreamEnd]
        );
        assert!(map_line(r#"{"message":{"role":"assistant","content":""},"done":false}"#).is_empty());
    }

    #[test]
    fn frame_without_message_or_done_is_silent() {
        assert!(map_line(r#"{"status":"loading model"}"#).is_empty());
    }

    #[test]
    fn invalid_json_is_a_warning() {
        let events = map_line("not json at all");
        assert_eq!(events, vec![StreamEvent::DecodeWarning("not json at all".into())]);
    }

    #[test]
    fn wrong_shape_is_a_warning() {
        assert_eq!(
            map_line(r#"{"message":{"content":17}}"#),
            vec![StreamEvent::DecodeWarning(r#"{"message":{"content":17}}"#.into())]
        );
        assert_eq!(map_line("42"), vec![StreamEvent::DecodeWarning("42".into())]);
    }

    #[test]
    fn error_frame_is_only_a_warning() {
        let line = r#"{"error":"model runner has unexpectedly stopped"}"#;
        assert_eq!(map_line(line), vec![StreamEvent::DecodeWarning(line.into())]);
    }
}
