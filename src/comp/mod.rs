//! Flit compression
//!
//! This module classifies symbol blocks, picks the cheapest framing and
//! models the clocked compressor that feeds the holding stages.

mod encoder;
mod pipeline;

pub use encoder::{EncodedData, EncodedLength, FlitEncoder, SymbolScan};
pub use pipeline::{CompState, Compressor, CompressorConfig};

use crate::common::{BusWidth, SymbolCount};
use crate::Result;

/// Convenience function to compress whole blocks with default tables and layer 0
pub fn compress_bytes(data: &[u8], num_sym: SymbolCount) -> Result<Vec<u8>> {
    FlitEncoder::new(num_sym, BusWidth::W32)?.compress_stream(data)
}
