//! Streaming relay core: NDJSON framing, frame interpretation and the
//! per-request pump between the inference backend and the client.

mod decoder;
mod mapper;
mod session;

pub use decoder::FrameDecoder;
pub use mapper::{map_line, StreamEvent};
pub use session::{ChunkStream, Delivery, FragmentStream, RelaySession, SessionOutcome};
