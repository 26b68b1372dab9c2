//! Flit decompression
//!
//! This module parses flit headers, decodes flit bodies back into symbol
//! blocks, and models the clocked five-stage decompressor around that decoder.

mod decoder;
mod header;
mod pipeline;

pub use decoder::{DecodedLength, FlitDecoder};
pub use header::{decode_length_byte, frame_headers, FrameHeader};
pub use pipeline::{DecompState, Decompressor, DecompressorConfig};

use crate::common::SymbolCount;
use crate::Result;

/// Convenience function to decode a stream of flits with default tables
pub fn decompress_bytes(data: &[u8], num_sym: SymbolCount) -> Result<Vec<u8>> {
    FlitDecoder::new(num_sym).decompress_stream(data)
}
