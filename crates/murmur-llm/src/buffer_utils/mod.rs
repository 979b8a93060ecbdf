mod buffering;
mod sse_parser;

pub use buffering::CircularLineBuffer;
pub use sse_parser::{LineDecoder, LineOutcome, decode_lines, decode_byte_stream};
