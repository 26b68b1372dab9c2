//! MaskPack - cycle-level model of a mask-payload flit codec
//!
//! This crate models a hardware compressor/decompressor pair that packs fixed
//! blocks of 64 or 128 byte-wide symbols into variable-length flits. Frequent
//! symbols collapse to a single mask bit (PRI0) or a 4-bit lookup-table code
//! (PRI1/PRI2); everything else travels verbatim.
//!
//! # Features
//!
//! - Synchronous encoder and decoder for the three framings (UNCOMPRESSED,
//!   ALL_PRI0, COMPRESSED)
//! - Eight runtime-loadable LUT sets and eight predefined classification layers
//! - Clocked five-stage pipelines with bus-width metering and backpressure
//! - Byte FIFOs with all-or-nothing transfers
//!
//! # Example - Block codec
//!
//! ```
//! use maskpack::{compress_bytes, decompress_bytes, SymbolCount};
//!
//! let block = [0u8; 64];
//! let flit = compress_bytes(&block, SymbolCount::Sym64)?;
//! assert_eq!(flit, [0x01, 0x00]);
//!
//! let symbols = decompress_bytes(&flit, SymbolCount::Sym64)?;
//! assert_eq!(symbols, block);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Example - Clocked pipeline
//!
//! ```
//! use maskpack::{Decompressor, DecompressorConfig};
//!
//! let config = DecompressorConfig::new(32, 32, 64)?;
//! let mut decomp = Decompressor::new(config)?;
//!
//! decomp.write_input(&[0x01, 0x00])?;
//! decomp.run_until_idle(100);
//! assert_eq!(decomp.drain_output(), vec![0u8; 64]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

// Public modules
pub mod bits;
pub mod common;
pub mod comp;
pub mod decomp;
pub mod error;
pub mod fifo;
pub mod stage;
pub mod tables;

// Re-export commonly used types
pub use common::{
    BusWidth, ClockConfig, DecoderSettings, EncoderSettings, FrameFormat, MaskPackError,
    PipelineStats, Result, SymbolCount, SymbolType, HEADER_LEN, NUM_LAYERS, NUM_LUTS,
    PIPELINE_DEPTH,
};
pub use comp::{CompState, Compressor, CompressorConfig, EncodedData, FlitEncoder};
pub use decomp::{
    frame_headers, DecompState, Decompressor, DecompressorConfig, FlitDecoder, FrameHeader,
};
pub use fifo::ByteFifo;
pub use stage::{FlitBuffer, TickReport};
pub use tables::{LookupTables, Lut16, SymbolClassifier, SymbolTypeTable};

// Convenience functions

/// Compress whole symbol blocks with default tables and layer 0
///
/// # Arguments
/// * `data` - Symbols; the length must be a multiple of `num_sym`
/// * `num_sym` - Symbols per block
///
/// # Returns
/// The flits of every block, back to back
pub fn compress_bytes(data: &[u8], num_sym: SymbolCount) -> Result<Vec<u8>> {
    comp::compress_bytes(data, num_sym)
}

/// Decompress back-to-back flits with default tables
///
/// # Arguments
/// * `data` - Concatenated flits
/// * `num_sym` - Symbols per block
///
/// # Returns
/// The decoded symbols of every flit, in order
pub fn decompress_bytes(data: &[u8], num_sym: SymbolCount) -> Result<Vec<u8>> {
    decomp::decompress_bytes(data, num_sym)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reexports() {
        let _ = BusWidth::W32;
        let _ = SymbolCount::Sym128;
        let _ = LookupTables::default();

        let data = vec![0u8; 128];
        let flits = compress_bytes(&data, SymbolCount::Sym64).unwrap();
        assert_eq!(flits, [0x01, 0x00, 0x01, 0x00]);
        assert_eq!(decompress_bytes(&flits, SymbolCount::Sym64).unwrap(), data);
    }
}
