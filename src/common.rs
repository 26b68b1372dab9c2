//! Common types and constants for the mask-payload flit codec
//!
//! This module defines the configuration types, wire constants and the error
//! type shared by both the compression and decompression pipelines.

use std::time::Duration;
use thiserror::Error;

/// Width of a bus beat in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BusWidth {
    /// 16 bytes per beat
    W16 = 16,
    /// 32 bytes per beat
    W32 = 32,
    /// 64 bytes per beat
    W64 = 64,
    /// 128 bytes per beat
    W128 = 128,
}

impl BusWidth {
    /// Create a BusWidth from a byte count
    pub fn from_bytes(bytes: u32) -> Result<Self> {
        match bytes {
            16 => Ok(BusWidth::W16),
            32 => Ok(BusWidth::W32),
            64 => Ok(BusWidth::W64),
            128 => Ok(BusWidth::W128),
            _ => Err(MaskPackError::InvalidBusWidth(bytes)),
        }
    }

    /// Number of bytes carried by one beat
    pub fn bytes(&self) -> usize {
        *self as usize
    }

    /// Round `len` up to a whole number of beats
    pub fn round_up(&self, len: usize) -> usize {
        let width = self.bytes();
        len.div_ceil(width) * width
    }
}

/// Number of symbol slots carried by one flit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SymbolCount {
    /// 64 symbols per flit
    Sym64 = 64,
    /// 128 symbols per flit
    Sym128 = 128,
}

impl SymbolCount {
    /// Create a SymbolCount from a raw symbol count
    pub fn from_count(count: u32) -> Result<Self> {
        match count {
            64 => Ok(SymbolCount::Sym64),
            128 => Ok(SymbolCount::Sym128),
            _ => Err(MaskPackError::InvalidSymbolCount(count)),
        }
    }

    /// Number of symbols in one block
    pub fn count(&self) -> usize {
        *self as usize
    }

    /// Size of the mask0 region in bytes (one bit per slot)
    pub fn mask0_bytes(&self) -> usize {
        self.count() / 8
    }

    /// Length of an UNCOMPRESSED flit (header plus one byte per symbol)
    pub fn uncompressed_len(&self) -> usize {
        HEADER_LEN + self.count()
    }

    /// Smallest legal flit length
    pub fn min_flit_len(&self) -> usize {
        HEADER_LEN
    }

    /// Largest legal flit length
    pub fn max_flit_len(&self) -> usize {
        self.uncompressed_len()
    }

    /// Smallest legal COMPRESSED flit: one present symbol costs a bundle byte
    /// and a payload byte
    pub fn min_compressed_len(&self) -> usize {
        HEADER_LEN + self.mask0_bytes() + 2
    }
}

/// Simulated clock driving the pipeline adapters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockConfig {
    /// Duration of one clock period
    pub period: Duration,
}

impl ClockConfig {
    /// Create a clock with the given period
    pub fn new(period: Duration) -> Result<Self> {
        if period.is_zero() {
            return Err(MaskPackError::InvalidClockPeriod);
        }
        Ok(Self { period })
    }

    /// Simulated time after `cycles` clock edges
    pub fn time_at(&self, cycles: u64) -> Duration {
        let nanos = self.period.as_nanos().saturating_mul(cycles as u128);
        let secs = (nanos / 1_000_000_000).min(u64::MAX as u128) as u64;
        Duration::new(secs, (nanos % 1_000_000_000) as u32)
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_nanos(1),
        }
    }
}

/// Framing chosen for a flit, derived from its header bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameFormat {
    /// Header followed by every symbol verbatim
    Uncompressed,
    /// Header only; every slot carries the PRI0 value
    AllPri0,
    /// Header, masks and packed payload regions
    Compressed,
    /// Header bit pattern matches no known format
    UnknownFormat,
}

/// Priority class of a symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SymbolType {
    /// Constant symbol carried by mask0 alone
    Pri0,
    /// 4-bit code looked up in a pri1 table
    Pri1,
    /// 4-bit code looked up in a pri2 table
    Pri2,
    /// Symbol carried verbatim in the 8-bit payload region
    Uncoded,
    /// No class assigned
    #[default]
    Unknown,
}

/// Error type for codec and pipeline operations
#[derive(Debug, Error)]
pub enum MaskPackError {
    /// Unsupported bus width
    #[error("Invalid bus width: {0} bytes (expected 16, 32, 64 or 128)")]
    InvalidBusWidth(u32),

    /// Bus width not supported by this pipeline direction
    #[error("Unsupported bus width for {direction}: {width} bytes")]
    UnsupportedBusWidth {
        /// Which side of the codec rejected the width
        direction: &'static str,
        /// Offending width in bytes
        width: u32,
    },

    /// Unsupported symbol count
    #[error("Invalid symbol count: {0} (expected 64 or 128)")]
    InvalidSymbolCount(u32),

    /// Clock period of zero
    #[error("Invalid clock period: must be non-zero")]
    InvalidClockPeriod,

    /// Layer selector outside 0..=7
    #[error("Invalid layer selector: {0} (expected 0-7)")]
    InvalidLayer(u8),

    /// LUT number outside 0..=7
    #[error("Invalid LUT number: {0} (expected 0-7)")]
    InvalidLutNumber(u8),

    /// FIFO geometry cannot be built
    #[error("Invalid FIFO geometry: capacity {capacity} bytes, entry size {entry_size} bytes")]
    InvalidFifoGeometry {
        /// Requested capacity
        capacity: usize,
        /// Requested entry size
        entry_size: usize,
    },

    /// FIFO too shallow for the largest frame it must hold
    #[error("FIFO depth of {depth} bytes cannot hold a {required}-byte frame")]
    FifoTooShallow {
        /// Configured depth in bytes
        depth: usize,
        /// Bytes needed for one maximum frame
        required: usize,
    },

    /// Write larger than the free space
    #[error("FIFO overflow: {requested} bytes requested, {free} free")]
    FifoOverflow {
        /// Bytes the caller tried to write
        requested: usize,
        /// Bytes that were free
        free: usize,
    },

    /// Read larger than the available data
    #[error("FIFO underflow: {requested} bytes requested, {available} available")]
    FifoUnderflow {
        /// Bytes the caller tried to read
        requested: usize,
        /// Bytes that were available
        available: usize,
    },

    /// Header bit pattern matches no format
    #[error("Unknown frame format: header {byte0:02X} {byte1:02X}")]
    UnknownFormat {
        /// Length byte
        byte0: u8,
        /// LUT/pointer byte
        byte1: u8,
    },

    /// Frame length outside the configured bounds
    #[error("Frame length {length} outside [{min}, {max}]")]
    LengthOutOfBounds {
        /// Decoded length
        length: usize,
        /// Minimum legal length
        min: usize,
        /// Maximum legal length
        max: usize,
    },

    /// Frame body inconsistent with its header
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Compressor met a symbol whose class is unassigned
    #[error("Symbol {symbol:#04X} has no class assigned in the active symbol table")]
    UnknownSymbolClass {
        /// Offending symbol
        symbol: u8,
    },

    /// Block does not hold exactly `num_total_sym` symbols
    #[error("Invalid block size: {actual} bytes (expected {expected})")]
    InvalidBlockSize {
        /// Configured block size
        expected: usize,
        /// Supplied block size
        actual: usize,
    },

    /// A finished flit found `hs0` still occupied
    #[error("Holding stage hs0 is occupied")]
    StageOccupied,

    /// Pipeline is in its error sink state
    #[error("Pipeline is faulted; reset required")]
    Faulted,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for codec operations
pub type Result<T> = std::result::Result<T, MaskPackError>;

/// Bytes in a flit header
pub const HEADER_LEN: usize = 2;

/// Number of selectable LUT sets
pub const NUM_LUTS: usize = 8;

/// Entries in each pri1/pri2 table
pub const LUT_ENTRIES: usize = 16;

/// Number of predefined classification layers
pub const NUM_LAYERS: usize = 8;

/// Default FIFO depth, in bus entries
pub const DEFAULT_FIFO_DEPTH: usize = 16;

/// Number of holding stages in each pipeline
pub const PIPELINE_DEPTH: usize = 5;

/// Runtime controls of the decompression side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecoderSettings {
    /// Emit the raw PRI0 code (zero) instead of the pri0 table value
    pub filt_uncomp: bool,
    /// Route every 4-bit code through this pri1 table
    pub direct_lut: Option<u8>,
}

impl DecoderSettings {
    /// Check that every selector is in range
    pub fn validate(&self) -> Result<()> {
        if let Some(lut) = self.direct_lut {
            check_lut_num(lut)?;
        }
        Ok(())
    }
}

/// Runtime controls of the compression side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncoderSettings {
    /// LUT set written into every flit header (0-7)
    pub lut_num: u8,
    /// Active classification layer (0-7)
    pub layer: u8,
    /// Match every 4-bit candidate against this pri1 table
    pub direct_lut: Option<u8>,
}

impl EncoderSettings {
    /// Check that every selector is in range
    pub fn validate(&self) -> Result<()> {
        check_lut_num(self.lut_num)?;
        check_layer(self.layer)?;
        if let Some(lut) = self.direct_lut {
            check_lut_num(lut)?;
        }
        Ok(())
    }
}

/// Validate a LUT number
pub fn check_lut_num(lut_num: u8) -> Result<()> {
    if (lut_num as usize) < NUM_LUTS {
        Ok(())
    } else {
        Err(MaskPackError::InvalidLutNumber(lut_num))
    }
}

/// Validate a layer selector
pub fn check_layer(layer: u8) -> Result<()> {
    if (layer as usize) < NUM_LAYERS {
        Ok(())
    } else {
        Err(MaskPackError::InvalidLayer(layer))
    }
}

/// Counters kept by a pipeline
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineStats {
    /// Frames (or blocks) taken from the input FIFO
    pub frames_in: u64,
    /// Frames fully written to the output FIFO
    pub frames_out: u64,
    /// Bytes read from the input FIFO
    pub bytes_in: u64,
    /// Bytes written to the output FIFO
    pub bytes_out: u64,
    /// Cycles lost to a full output FIFO
    pub stall_cycles: u64,
    /// Frames per format: uncompressed, all-PRI0, compressed
    pub uncompressed_frames: u64,
    /// ALL_PRI0 frames handled
    pub all_pri0_frames: u64,
    /// COMPRESSED frames handled
    pub compressed_frames: u64,
}

impl PipelineStats {
    pub(crate) fn count_format(&mut self, format: FrameFormat) {
        match format {
            FrameFormat::Uncompressed => self.uncompressed_frames += 1,
            FrameFormat::AllPri0 => self.all_pri0_frames += 1,
            FrameFormat::Compressed => self.compressed_frames += 1,
            FrameFormat::UnknownFormat => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_width() {
        assert_eq!(BusWidth::from_bytes(16).unwrap(), BusWidth::W16);
        assert_eq!(BusWidth::from_bytes(128).unwrap(), BusWidth::W128);
        assert!(BusWidth::from_bytes(8).is_err());
        assert!(BusWidth::from_bytes(48).is_err());

        assert_eq!(BusWidth::W32.bytes(), 32);
        assert_eq!(BusWidth::W32.round_up(0), 0);
        assert_eq!(BusWidth::W32.round_up(2), 32);
        assert_eq!(BusWidth::W32.round_up(32), 32);
        assert_eq!(BusWidth::W16.round_up(66), 80);
    }

    #[test]
    fn test_symbol_count() {
        assert_eq!(SymbolCount::from_count(64).unwrap(), SymbolCount::Sym64);
        assert_eq!(SymbolCount::from_count(128).unwrap(), SymbolCount::Sym128);
        assert!(SymbolCount::from_count(96).is_err());

        assert_eq!(SymbolCount::Sym64.mask0_bytes(), 8);
        assert_eq!(SymbolCount::Sym128.mask0_bytes(), 16);
        assert_eq!(SymbolCount::Sym64.max_flit_len(), 66);
        assert_eq!(SymbolCount::Sym128.max_flit_len(), 130);
        assert_eq!(SymbolCount::Sym64.min_compressed_len(), 12);
    }

    #[test]
    fn test_settings_validation() {
        assert!(EncoderSettings::default().validate().is_ok());
        assert!(DecoderSettings::default().validate().is_ok());

        let bad_lut = EncoderSettings {
            lut_num: 8,
            ..Default::default()
        };
        assert!(matches!(
            bad_lut.validate(),
            Err(MaskPackError::InvalidLutNumber(8))
        ));

        let bad_direct = DecoderSettings {
            direct_lut: Some(9),
            ..Default::default()
        };
        assert!(bad_direct.validate().is_err());

        let bad_layer = EncoderSettings {
            layer: 8,
            ..Default::default()
        };
        assert!(matches!(
            bad_layer.validate(),
            Err(MaskPackError::InvalidLayer(8))
        ));
    }

    #[test]
    fn test_clock() {
        assert!(ClockConfig::new(Duration::ZERO).is_err());
        let clock = ClockConfig::new(Duration::from_nanos(2)).unwrap();
        assert_eq!(clock.time_at(5), Duration::from_nanos(10));

        // Long runs keep counting past the 32-bit cycle range
        let clock = ClockConfig::new(Duration::from_nanos(1)).unwrap();
        let cycles = (1u64 << 32) + 9;
        assert_eq!(clock.time_at(cycles), Duration::from_nanos(cycles));
        let clock = ClockConfig::new(Duration::from_secs(3)).unwrap();
        assert_eq!(clock.time_at(cycles), Duration::from_secs(3 * cycles));
    }
}
