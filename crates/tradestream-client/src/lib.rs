pub mod accumulator;
pub mod classify;
pub mod controller;
pub mod decoder;
pub mod error;
pub mod normalize;
pub mod recorder;
pub mod transport;

pub mod test_support;

pub use accumulator::apply_update;
pub use classify::classify;
pub use controller::{Run, RunController};
pub use decoder::{decode_stream, FrameDecoder};
pub use error::StreamError;
pub use normalize::normalize_content;
pub use recorder::{LogRecorder, Recorded};
pub use transport::{ChunkStream, HttpTransport, Transport};
